//! Drawing tools and the state machine that turns gestures into shapes.
//!
//! Polygons and lines are built click by click; clicking back near the
//! first vertex closes the shape. Rectangles, circles and the AI-assist box
//! are built by dragging. The machine edits the store through a
//! [`ShapeTarget`] without recording history; the finished shape is recorded
//! by whoever handles [`ToolEvent::FinalizeRequested`].

use crate::history::Command;
use crate::media::FileContext;
use crate::scale::Scale;
use crate::shapes::{
    BoxGeometry, Circle, Display, DisplayPoint, Face, Line, Polygon, Rectangle, Shape, ShapeId,
    ShapeKind, ShapeMeta, ShapePatch, StrokeColor,
};
use crate::store::ShapeTarget;
use serde::{Deserialize, Serialize};

/// Per-axis distance (display pixels) from the first vertex within which a
/// click closes the shape instead of adding a vertex.
pub const CLOSE_THRESHOLD: f64 = 10.0;

/// Available drawing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawingTool {
    Polygon,
    Line,
    Rectangle,
    Circle,
    AiBox,
}

impl DrawingTool {
    /// Shape kind this tool produces. The AI box produces no shape.
    pub fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            DrawingTool::Polygon => Some(ShapeKind::Polygon),
            DrawingTool::Line => Some(ShapeKind::Line),
            DrawingTool::Rectangle => Some(ShapeKind::Rectangle),
            DrawingTool::Circle => Some(ShapeKind::Circle),
            DrawingTool::AiBox => None,
        }
    }

    pub fn for_kind(kind: ShapeKind) -> Option<Self> {
        match kind {
            ShapeKind::Polygon => Some(DrawingTool::Polygon),
            ShapeKind::Line => Some(DrawingTool::Line),
            ShapeKind::Rectangle => Some(DrawingTool::Rectangle),
            ShapeKind::Circle => Some(DrawingTool::Circle),
            ShapeKind::Face => None,
        }
    }

    /// Click-to-append tools, as opposed to drag tools.
    pub fn is_freehand(self) -> bool {
        matches!(self, DrawingTool::Polygon | DrawingTool::Line)
    }
}

/// Whether clicks build a new shape or extend a finished one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreehandMode {
    #[default]
    Create,
    AddPoints,
}

/// State of the drawing machine.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ToolState {
    #[default]
    Idle,
    /// A drag tool waiting for mouse-down.
    Armed(DrawingTool),
    /// A click tool; `shape_id` is `None` until the first click.
    Freehand {
        tool: DrawingTool,
        shape_id: Option<ShapeId>,
        mode: FreehandMode,
    },
    /// Mouse is down on a drag tool. `shape_id` is `None` for the AI box.
    Dragging {
        tool: DrawingTool,
        anchor: DisplayPoint,
        shape_id: Option<ShapeId>,
    },
}

/// Outcome of a gesture, for the caller to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent {
    Armed(DrawingTool),
    Disarmed,
    /// A new in-progress shape was inserted.
    Started { kind: ShapeKind, id: ShapeId },
    PointAppended { kind: ShapeKind, id: ShapeId },
    BoxResized { kind: ShapeKind, id: ShapeId },
    /// The shape is geometrically complete and needs its naming step.
    FinalizeRequested { kind: ShapeKind, id: ShapeId },
    /// The in-progress shape was removed; it was never persisted.
    Discarded { kind: ShapeKind, id: ShapeId },
    /// Add-points mode ended with new vertices; a history entry was recorded.
    PointsAdded { kind: ShapeKind, id: ShapeId },
    AiBoxChanged(BoxGeometry<Display>),
    AiBoxCompleted(BoxGeometry<Display>),
    AiBoxCleared,
}

/// Stroke applied to shapes while they are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawStyle {
    pub stroke: StrokeColor,
    pub stroke_width: f64,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            stroke: StrokeColor::black(),
            stroke_width: 2.0,
        }
    }
}

/// Manages the current tool and its state.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    /// Current state of the tool.
    pub state: ToolState,
    /// Style to apply to new shapes.
    pub current_style: DrawStyle,
    last_tool: Option<DrawingTool>,
    context: FileContext,
    /// The shape as it was when add-points mode began.
    add_points_origin: Option<Shape>,
}

impl ToolManager {
    pub fn new(context: FileContext, style: DrawStyle) -> Self {
        Self {
            current_style: style,
            context,
            ..Self::default()
        }
    }

    /// Owner fields stamped onto new shapes.
    pub fn set_context(&mut self, context: FileContext) {
        self.context = context;
    }

    pub fn current_tool(&self) -> Option<DrawingTool> {
        match &self.state {
            ToolState::Idle => None,
            ToolState::Armed(tool) => Some(*tool),
            ToolState::Freehand { tool, .. } | ToolState::Dragging { tool, .. } => Some(*tool),
        }
    }

    pub fn last_tool(&self) -> Option<DrawingTool> {
        self.last_tool
    }

    /// The in-progress shape, if any.
    pub fn active_shape(&self) -> Option<(ShapeKind, ShapeId)> {
        match &self.state {
            ToolState::Freehand {
                tool,
                shape_id: Some(id),
                ..
            }
            | ToolState::Dragging {
                tool,
                shape_id: Some(id),
                ..
            } => tool.shape_kind().map(|kind| (kind, *id)),
            _ => None,
        }
    }

    /// The shape being created right now. Unlike [`ToolManager::active_shape`]
    /// this excludes a finished shape reopened in add-points mode.
    pub fn new_shape_in_progress(&self) -> Option<(ShapeKind, ShapeId)> {
        match &self.state {
            ToolState::Freehand {
                mode: FreehandMode::AddPoints,
                ..
            } => None,
            _ => self.active_shape(),
        }
    }

    pub fn is_drawing(&self) -> bool {
        matches!(
            self.state,
            ToolState::Freehand {
                shape_id: Some(_),
                ..
            } | ToolState::Dragging { .. }
        )
    }

    /// Back to idle, forgetting any in-progress shape. The caller is
    /// responsible for the store (used on file switch).
    pub fn reset(&mut self) {
        self.state = ToolState::Idle;
        self.add_points_origin = None;
    }

    fn arm(&mut self, tool: DrawingTool) -> ToolEvent {
        self.last_tool = Some(tool);
        self.state = if tool.is_freehand() {
            ToolState::Freehand {
                tool,
                shape_id: None,
                mode: FreehandMode::Create,
            }
        } else {
            ToolState::Armed(tool)
        };
        log::debug!("tool armed: {tool:?}");
        ToolEvent::Armed(tool)
    }

    fn disarm(&mut self) -> ToolEvent {
        self.state = ToolState::Idle;
        ToolEvent::Disarmed
    }

    fn new_shape(&self, kind: ShapeKind, at: &DisplayPoint) -> Shape {
        let meta = ShapeMeta::new(
            &self.context,
            self.current_style.stroke,
            self.current_style.stroke_width,
        );
        match kind {
            ShapeKind::Polygon => Polygon::new(meta, vec![*at]).into(),
            ShapeKind::Line => Line::new(meta, vec![*at]).into(),
            ShapeKind::Face => Face::new(meta, vec![*at]).into(),
            ShapeKind::Rectangle => Rectangle::anchored(meta, at).into(),
            ShapeKind::Circle => Circle::anchored(meta, at).into(),
        }
    }

    /// Select a tool from the toolbar (or its shortcut).
    ///
    /// From idle this arms the tool. Toggling the active tool again closes
    /// an open shape (or just disarms when nothing was started) and drops a
    /// box still being dragged. Toggling a different tool closes the open
    /// shape, keeping a dragged box as last resized, and arms the new tool.
    pub fn toggle(&mut self, tool: DrawingTool, target: &mut dyn ShapeTarget) -> Vec<ToolEvent> {
        let same = self.current_tool() == Some(tool);
        let mut events = Vec::new();
        match self.state.clone() {
            ToolState::Idle => {
                events.push(self.arm(tool));
                return events;
            }
            ToolState::Freehand {
                tool: current,
                shape_id: Some(id),
                mode,
            } => events.extend(self.close(current, id, mode, target)),
            ToolState::Dragging {
                tool: current,
                shape_id,
                ..
            } if same => events.extend(self.abandon_drag(current, shape_id, target)),
            ToolState::Dragging {
                tool: current,
                shape_id,
                ..
            } => events.extend(self.finish_drag(current, shape_id, target)),
            ToolState::Armed(_) | ToolState::Freehand { shape_id: None, .. } => {}
        }
        if same {
            events.push(self.disarm());
        } else {
            events.push(self.arm(tool));
        }
        events
    }

    /// A click with a freehand tool.
    pub fn click(&mut self, point: DisplayPoint, target: &mut dyn ShapeTarget) -> Vec<ToolEvent> {
        let ToolState::Freehand {
            tool,
            shape_id,
            mode,
        } = self.state.clone()
        else {
            return Vec::new();
        };
        let Some(kind) = tool.shape_kind() else {
            return Vec::new();
        };

        let existing = shape_id.and_then(|id| target.find(kind, id).map(|shape| (id, shape)));
        let Some((id, shape)) = existing else {
            if mode == FreehandMode::AddPoints {
                // The shape went away underneath us.
                self.add_points_origin = None;
                return vec![self.disarm()];
            }
            let shape = self.new_shape(kind, &point);
            let id = shape.id();
            target.insert(shape);
            self.state = ToolState::Freehand {
                tool,
                shape_id: Some(id),
                mode,
            };
            return vec![ToolEvent::Started { kind, id }];
        };

        let closes = shape
            .points()
            .and_then(|points| points.first())
            .is_some_and(|first| point.within_axes(first, CLOSE_THRESHOLD));
        if !closes {
            target.append_point(kind, id, point);
            return vec![ToolEvent::PointAppended { kind, id }];
        }

        let mut events = self.close(tool, id, mode, target);
        match mode {
            FreehandMode::Create => {
                self.state = ToolState::Freehand {
                    tool,
                    shape_id: None,
                    mode,
                };
            }
            FreehandMode::AddPoints => events.push(self.disarm()),
        }
        events
    }

    /// Finish the open freehand shape. Does not change `state`.
    fn close(
        &mut self,
        tool: DrawingTool,
        id: ShapeId,
        mode: FreehandMode,
        target: &mut dyn ShapeTarget,
    ) -> Vec<ToolEvent> {
        let Some(kind) = tool.shape_kind() else {
            return Vec::new();
        };
        match mode {
            FreehandMode::Create => {
                let count = target
                    .find(kind, id)
                    .and_then(|shape| shape.points().map(<[DisplayPoint]>::len))
                    .unwrap_or(0);
                if count < kind.min_points() {
                    target.remove(kind, id);
                    log::debug!("discarded {kind} with {count} points");
                    vec![ToolEvent::Discarded { kind, id }]
                } else {
                    vec![ToolEvent::FinalizeRequested { kind, id }]
                }
            }
            FreehandMode::AddPoints => {
                let origin = self.add_points_origin.take();
                match (origin, target.find(kind, id)) {
                    (Some(before), Some(after)) if before != after => {
                        let frame = target.frame();
                        target.record(Command::Replace {
                            frame,
                            before,
                            after,
                        });
                        vec![ToolEvent::PointsAdded { kind, id }]
                    }
                    _ => Vec::new(),
                }
            }
        }
    }

    fn abandon_drag(
        &mut self,
        tool: DrawingTool,
        shape_id: Option<ShapeId>,
        target: &mut dyn ShapeTarget,
    ) -> Vec<ToolEvent> {
        match (tool.shape_kind(), shape_id) {
            (Some(kind), Some(id)) => {
                target.remove(kind, id);
                vec![ToolEvent::Discarded { kind, id }]
            }
            _ => vec![ToolEvent::AiBoxCleared],
        }
    }

    /// Settle a drag interrupted by another tool: keep the box as last
    /// resized, normalised, unless it has no area.
    fn finish_drag(
        &mut self,
        tool: DrawingTool,
        shape_id: Option<ShapeId>,
        target: &mut dyn ShapeTarget,
    ) -> Vec<ToolEvent> {
        let (Some(kind), Some(id)) = (tool.shape_kind(), shape_id) else {
            return vec![ToolEvent::AiBoxCleared];
        };
        let bounds = target
            .find(kind, id)
            .and_then(|shape| shape.box_geometry().map(BoxGeometry::normalized));
        match bounds {
            Some(bounds) if !bounds.is_degenerate() => {
                target.patch(kind, id, &ShapePatch::with_bounds(bounds));
                vec![ToolEvent::FinalizeRequested { kind, id }]
            }
            _ => {
                target.remove(kind, id);
                log::debug!("discarded zero-area {kind}");
                vec![ToolEvent::Discarded { kind, id }]
            }
        }
    }

    /// Re-enter click accumulation on a finished polygon or line. Refused
    /// while another shape is being drawn or when the shape does not exist.
    pub fn begin_add_points(
        &mut self,
        kind: ShapeKind,
        id: ShapeId,
        target: &mut dyn ShapeTarget,
    ) -> bool {
        if self.is_drawing() {
            return false;
        }
        let Some(tool) = DrawingTool::for_kind(kind).filter(|t| t.is_freehand()) else {
            return false;
        };
        let Some(shape) = target.find(kind, id) else {
            return false;
        };
        self.add_points_origin = Some(shape);
        self.last_tool = Some(tool);
        self.state = ToolState::Freehand {
            tool,
            shape_id: Some(id),
            mode: FreehandMode::AddPoints,
        };
        true
    }

    /// Escape key. While drawing, drops the unfinished shape; while idle,
    /// re-arms the last used tool.
    pub fn escape(&mut self, target: &mut dyn ShapeTarget) -> Vec<ToolEvent> {
        let mut events = Vec::new();
        match self.state.clone() {
            ToolState::Idle => {
                if let Some(tool) = self.last_tool {
                    events.push(self.arm(tool));
                }
                return events;
            }
            ToolState::Freehand {
                tool,
                shape_id: Some(id),
                mode: FreehandMode::Create,
            } => {
                if let Some(kind) = tool.shape_kind() {
                    target.remove(kind, id);
                    events.push(ToolEvent::Discarded { kind, id });
                }
            }
            ToolState::Freehand {
                tool,
                shape_id: Some(id),
                mode: FreehandMode::AddPoints,
            } => events.extend(self.close(tool, id, FreehandMode::AddPoints, target)),
            ToolState::Dragging { tool, shape_id, .. } => {
                events.extend(self.abandon_drag(tool, shape_id, target));
            }
            ToolState::Armed(_) | ToolState::Freehand { shape_id: None, .. } => {}
        }
        events.push(self.disarm());
        events
    }

    /// Mouse-down with a drag tool: anchor a zero-size box.
    pub fn pointer_down(
        &mut self,
        point: DisplayPoint,
        target: &mut dyn ShapeTarget,
    ) -> Vec<ToolEvent> {
        let ToolState::Armed(tool) = self.state else {
            return Vec::new();
        };
        match tool.shape_kind() {
            Some(kind) => {
                let shape = self.new_shape(kind, &point);
                let id = shape.id();
                target.insert(shape);
                self.state = ToolState::Dragging {
                    tool,
                    anchor: point,
                    shape_id: Some(id),
                };
                vec![ToolEvent::Started { kind, id }]
            }
            None => {
                self.state = ToolState::Dragging {
                    tool,
                    anchor: point,
                    shape_id: None,
                };
                vec![ToolEvent::AiBoxChanged(BoxGeometry::at(&point))]
            }
        }
    }

    /// Mouse-move while dragging: resize live from the anchor.
    pub fn pointer_move(
        &mut self,
        point: DisplayPoint,
        target: &mut dyn ShapeTarget,
    ) -> Vec<ToolEvent> {
        let ToolState::Dragging {
            tool,
            anchor,
            shape_id,
        } = &self.state
        else {
            return Vec::new();
        };
        let span = BoxGeometry::span(anchor, &point);
        match (tool.shape_kind(), *shape_id) {
            (Some(kind), Some(id)) => {
                target.patch(kind, id, &ShapePatch::with_bounds(span));
                vec![ToolEvent::BoxResized { kind, id }]
            }
            _ => vec![ToolEvent::AiBoxChanged(span)],
        }
    }

    /// Mouse-up: normalise the box, or drop it if it has no area. The tool
    /// stays armed for the next box.
    pub fn pointer_up(
        &mut self,
        point: DisplayPoint,
        target: &mut dyn ShapeTarget,
    ) -> Vec<ToolEvent> {
        let ToolState::Dragging {
            tool,
            anchor,
            shape_id,
        } = self.state.clone()
        else {
            return Vec::new();
        };
        self.state = ToolState::Armed(tool);
        let bounds = BoxGeometry::from_corners(&anchor, &point);
        match (tool.shape_kind(), shape_id) {
            (Some(kind), Some(id)) if bounds.is_degenerate() => {
                target.remove(kind, id);
                log::debug!("discarded zero-area {kind}");
                vec![ToolEvent::Discarded { kind, id }]
            }
            (Some(kind), Some(id)) => {
                target.patch(kind, id, &ShapePatch::with_bounds(bounds));
                vec![ToolEvent::FinalizeRequested { kind, id }]
            }
            _ if bounds.is_degenerate() => vec![ToolEvent::AiBoxCleared],
            _ => vec![ToolEvent::AiBoxCompleted(bounds)],
        }
    }

    /// Carry drag anchor and add-points origin over to a new display scale.
    pub fn rescale(&mut self, from: &Scale, to: &Scale) {
        if let ToolState::Dragging { anchor, .. } = &mut self.state {
            *anchor = from.rescale_point(anchor, to);
        }
        if let Some(origin) = &mut self.add_points_origin {
            from.rescale_shape(origin, to);
        }
    }
}
