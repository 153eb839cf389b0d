//! The annotation session: one explicitly owned instance of all engine
//! state for the media file being annotated.
//!
//! Every interaction updates the local store synchronously, then queues
//! whatever the backend needs to hear about in the sync outbox. Nothing here
//! awaits persistence except [`AnnotationSession::dispatch_sync`] and
//! [`AnnotationSession::load_file`].

use crate::class::ClassRegistry;
use crate::config::{ConfigError, EngineConfig};
use crate::debounce::{DirtyText, TextDebouncer};
use crate::events::{EngineEvent, EventBus, SubscriberId, Topic};
use crate::history::Command;
use crate::media::{MediaFile, MediaKind};
use crate::scale::{MediaDimensions, Scale};
use crate::selection::{PointSelection, SelectionState};
use crate::shapes::{
    BoxGeometry, Display, DisplayPoint, PointId, Shape, ShapeId, ShapeKind, ShapePatch,
};
use crate::store::{ImageShapeStore, ShapeCollection, ShapeTarget, VideoShapeStore};
use crate::sync::{fetch_annotations, DispatchReport, Intent, Outbox, SyncBridge, DEFAULT_FRAME};
use crate::storage::{Persistence, PersistenceResult};
use crate::tagger::BatchTagger;
use crate::tools::{DrawStyle, DrawingTool, ToolEvent, ToolManager};
use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

/// The store matching the open file's media kind.
#[derive(Debug, Clone)]
pub enum MediaStore {
    Image(ImageShapeStore),
    Video(VideoShapeStore),
}

impl MediaStore {
    pub fn new(kind: MediaKind, history_depth: usize) -> Self {
        match kind {
            MediaKind::Image => MediaStore::Image(ImageShapeStore::new(history_depth)),
            MediaKind::Video => MediaStore::Video(VideoShapeStore::new(history_depth)),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaStore::Image(_) => MediaKind::Image,
            MediaStore::Video(_) => MediaKind::Video,
        }
    }

    pub fn as_image(&self) -> Option<&ImageShapeStore> {
        match self {
            MediaStore::Image(store) => Some(store),
            MediaStore::Video(_) => None,
        }
    }

    pub fn as_video(&self) -> Option<&VideoShapeStore> {
        match self {
            MediaStore::Video(store) => Some(store),
            MediaStore::Image(_) => None,
        }
    }

    /// Shapes shown at `frame`. Images ignore the frame.
    pub fn collection(&self, frame: u32) -> Option<&ShapeCollection> {
        match self {
            MediaStore::Image(store) => Some(store.shapes()),
            MediaStore::Video(store) => store.frame(frame),
        }
    }

    pub fn find(&self, frame: u32, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        self.collection(frame)?.find(kind, id)
    }

    /// Total shapes across every frame.
    pub fn len(&self) -> usize {
        match self {
            MediaStore::Image(store) => store.shapes().len(),
            MediaStore::Video(store) => store.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn can_undo(&self) -> bool {
        match self {
            MediaStore::Image(store) => store.can_undo(),
            MediaStore::Video(store) => store.can_undo(),
        }
    }

    pub fn can_redo(&self) -> bool {
        match self {
            MediaStore::Image(store) => store.can_redo(),
            MediaStore::Video(store) => store.can_redo(),
        }
    }

    fn update_shape(
        &mut self,
        frame: u32,
        kind: ShapeKind,
        id: ShapeId,
        patch: &ShapePatch,
    ) -> Option<Shape> {
        match self {
            MediaStore::Image(store) => store.update_shape(kind, id, patch),
            MediaStore::Video(store) => store.update_shape(frame, kind, id, patch),
        }
    }

    fn delete_shape(&mut self, frame: u32, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        match self {
            MediaStore::Image(store) => store.delete_shape(kind, id),
            MediaStore::Video(store) => store.delete_shape(frame, kind, id),
        }
    }

    fn delete_shape_point(
        &mut self,
        frame: u32,
        kind: ShapeKind,
        id: ShapeId,
        point_id: PointId,
    ) -> Option<Shape> {
        match self {
            MediaStore::Image(store) => store.delete_shape_point(kind, id, point_id),
            MediaStore::Video(store) => store.delete_shape_point(frame, kind, id, point_id),
        }
    }

    fn undo(&mut self) -> Option<Command> {
        match self {
            MediaStore::Image(store) => store.undo(),
            MediaStore::Video(store) => store.undo(),
        }
    }

    fn redo(&mut self) -> Option<Command> {
        match self {
            MediaStore::Image(store) => store.redo(),
            MediaStore::Video(store) => store.redo(),
        }
    }

    fn map_shapes(&mut self, f: impl FnMut(&mut Shape)) {
        match self {
            MediaStore::Image(store) => store.map_shapes(f),
            MediaStore::Video(store) => store.map_shapes(f),
        }
    }

    /// Run `f` against the store as seen from `frame`.
    fn with_target<R>(&mut self, frame: u32, f: impl FnOnce(&mut dyn ShapeTarget) -> R) -> R {
        match self {
            MediaStore::Image(store) => f(store),
            MediaStore::Video(store) => f(&mut store.frame_view(frame)),
        }
    }
}

/// Name and classification entered in the confirmation step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeDetails {
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "ID")]
    pub id_field: Option<String>,
}

impl ShapeDetails {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_class(mut self, class_id: impl Into<String>) -> Self {
        self.class_id = Some(class_id.into());
        self
    }

    fn to_patch(&self) -> ShapePatch {
        ShapePatch {
            name: Some(self.name.clone()),
            notes: Some(self.notes.clone()),
            class_id: Some(self.class_id.clone()),
            attribute: Some(self.attribute.clone()),
            text: Some(self.text.clone()),
            id_field: Some(self.id_field.clone()),
            ..ShapePatch::default()
        }
    }
}

/// A finished shape waiting for its confirmation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingShape {
    pub kind: ShapeKind,
    pub id: ShapeId,
    pub frame: u32,
}

pub struct AnnotationSession {
    config: EngineConfig,
    classes: ClassRegistry,
    file: Option<MediaFile>,
    store: MediaStore,
    selection: SelectionState,
    tools: ToolManager,
    dimensions: Option<MediaDimensions>,
    scale: Scale,
    frame: u32,
    sync: SyncBridge,
    tagger: BatchTagger,
    events: EventBus,
    text: TextDebouncer,
    pending: VecDeque<PendingShape>,
}

impl AnnotationSession {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let style = DrawStyle {
            stroke: config.stroke()?,
            stroke_width: config.default_stroke_width,
        };
        Ok(Self {
            classes: ClassRegistry::new(),
            file: None,
            store: MediaStore::new(MediaKind::Image, config.history_depth),
            selection: SelectionState::new(),
            tools: ToolManager::new(Default::default(), style),
            dimensions: None,
            scale: Scale::identity(),
            frame: DEFAULT_FRAME,
            sync: SyncBridge::new(config.sync.clone()),
            tagger: BatchTagger::new(),
            events: EventBus::new(),
            text: TextDebouncer::new(config.text_debounce()),
            pending: VecDeque::new(),
            config,
        })
    }

    pub fn with_classes(mut self, classes: ClassRegistry) -> Self {
        self.classes = classes;
        self
    }

    /// Resume a saved outbox. Call before opening a file.
    pub fn restore_outbox(&mut self, outbox: Outbox) {
        self.sync = SyncBridge::with_outbox(outbox);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn classes_mut(&mut self) -> &mut ClassRegistry {
        &mut self.classes
    }

    pub fn file(&self) -> Option<&MediaFile> {
        self.file.as_ref()
    }

    pub fn store(&self) -> &MediaStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn sync(&self) -> &SyncBridge {
        &self.sync
    }

    pub fn tagger(&self) -> &BatchTagger {
        &self.tagger
    }

    pub fn tagger_mut(&mut self) -> &mut BatchTagger {
        &mut self.tagger
    }

    pub fn pending_shapes(&self) -> impl Iterator<Item = &PendingShape> {
        self.pending.iter()
    }

    /// Shapes to render: the current frame for video, everything for images.
    pub fn visible_shapes(&self) -> Vec<Shape> {
        self.store
            .collection(self.frame)
            .map(|shapes| shapes.iter().collect())
            .unwrap_or_default()
    }

    pub fn find(&self, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        self.store.find(self.frame, kind, id)
    }

    /// History key of the current frame.
    fn history_frame(&self) -> Option<u32> {
        match self.store.kind() {
            MediaKind::Image => None,
            MediaKind::Video => Some(self.frame),
        }
    }

    pub fn subscribe(&mut self, topics: &[Topic]) -> SubscriberId {
        self.events.subscribe(topics)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn poll_events(&mut self, id: SubscriberId) -> Vec<EngineEvent> {
        self.events.poll(id)
    }

    fn publish_selection(&mut self) {
        self.events.publish(EngineEvent::SelectionChanged {
            shape: self.selection.shape(),
            point: self.selection.point(),
        });
    }

    fn publish_queued(&mut self) {
        self.events.publish(EngineEvent::Queued {
            pending: self.sync.outbox().len(),
        });
    }

    /// Switch to another media file.
    ///
    /// Everything belonging to the previous file is torn down and a reset
    /// event goes out before any of the new file's shapes are loaded, so no
    /// observer ever sees old shapes against the new media.
    pub fn open_file(&mut self, file: MediaFile) {
        let flushed = self.flush_all_text_edits();
        if flushed > 0 {
            log::debug!("flushed {} text edits before file switch", flushed);
        }

        self.store = MediaStore::new(file.kind, self.config.history_depth);
        self.selection.clear();
        self.tools.reset();
        self.tools.set_context(file.context.clone());
        self.pending.clear();
        self.sync.clear_tracking();
        self.frame = DEFAULT_FRAME;
        self.scale = match (file.natural_size, self.dimensions) {
            (Some(natural), Some(previous)) => {
                let dims = MediaDimensions::new(natural, previous.rendered);
                self.dimensions = Some(dims);
                dims.scale()
            }
            _ => {
                self.dimensions = None;
                Scale::identity()
            }
        };
        self.events.publish(EngineEvent::Reset {
            file_id: file.id().to_string(),
        });
        self.publish_selection();

        let records = file.metadata.clone().into_records();
        let mut shapes: BTreeMap<u32, Vec<Shape>> = BTreeMap::new();
        for record in &records {
            match self.scale.record_to_shape(record) {
                Some(shape) => shapes.entry(record.at_frame).or_default().push(shape),
                None => log::warn!("skipping {} record {} without geometry", record.kind, record.id),
            }
        }
        let count: usize = shapes.values().map(Vec::len).sum();
        match &mut self.store {
            MediaStore::Image(store) => {
                store.load(ShapeCollection::from_shapes(shapes.into_values().flatten()))
            }
            MediaStore::Video(store) => store.load(
                shapes
                    .into_iter()
                    .map(|(frame, shapes)| (frame, ShapeCollection::from_shapes(shapes)))
                    .collect(),
            ),
        }
        self.sync.load_file(file.id(), records);

        log::info!("opened {} ({:?}, {} shapes)", file.id(), file.kind, count);
        self.events.publish(EngineEvent::Loaded {
            file_id: file.id().to_string(),
            shapes: count,
        });
        self.file = Some(file);
    }

    /// Fetch a file's shapes from the backend, then open it.
    pub async fn load_file(
        &mut self,
        persistence: &dyn Persistence,
        file: MediaFile,
    ) -> PersistenceResult<()> {
        let metadata = fetch_annotations(persistence, file.kind, file.id()).await?;
        self.open_file(file.with_metadata(metadata));
        Ok(())
    }

    /// The media element was (re)laid out. Every display-space value is
    /// carried over to the new scale.
    pub fn set_media_dimensions(&mut self, dimensions: MediaDimensions) {
        self.dimensions = Some(dimensions);
        let old = self.scale;
        let new = dimensions.scale();
        if old == new {
            return;
        }
        self.store.map_shapes(|shape| old.rescale_shape(shape, &new));
        self.tools.rescale(&old, &new);
        if let Some(ai_box) = &mut self.selection.ai_box {
            *ai_box = new.box_to_display(&old.box_to_native(ai_box));
        }
        self.scale = new;
        log::debug!("display scale now {:.4} x {:.4}", new.scale_x, new.scale_y);
        self.events.publish(EngineEvent::Rescaled);
    }

    /// Convenience for hosts that report sizes separately.
    pub fn set_rendered_size(&mut self, natural: Size, rendered: Size) {
        self.set_media_dimensions(MediaDimensions::new(natural, rendered));
    }

    /// Jump to another video frame. Any unfinished shape is discarded and
    /// the selection cleared. Ignored for images.
    pub fn set_frame(&mut self, frame: u32) -> bool {
        if self.store.kind() != MediaKind::Video || frame == self.frame {
            return false;
        }
        if self.tools.is_drawing() {
            self.escape();
        }
        self.selection.clear();
        self.frame = frame;
        self.events.publish(EngineEvent::FrameChanged(frame));
        self.publish_selection();
        true
    }

    fn gesture(
        &mut self,
        f: impl FnOnce(&mut ToolManager, &mut dyn ShapeTarget) -> Vec<ToolEvent>,
    ) -> Vec<ToolEvent> {
        let frame = self.frame;
        let tools = &mut self.tools;
        let events = self.store.with_target(frame, |target| f(tools, target));
        self.handle_tool_events(events.clone());
        events
    }

    fn handle_tool_events(&mut self, events: Vec<ToolEvent>) {
        let frame = self.history_frame();
        for event in events {
            match &event {
                ToolEvent::Started { kind, id } => {
                    self.events.publish(EngineEvent::ShapeAdded {
                        kind: *kind,
                        id: *id,
                        frame,
                    });
                }
                ToolEvent::PointAppended { kind, id } | ToolEvent::BoxResized { kind, id } => {
                    self.events.publish(EngineEvent::ShapeChanged {
                        kind: *kind,
                        id: *id,
                        frame,
                    });
                }
                ToolEvent::FinalizeRequested { kind, id } => {
                    self.pending.push_back(PendingShape {
                        kind: *kind,
                        id: *id,
                        frame: self.frame,
                    });
                    self.events.publish(EngineEvent::AwaitingDetails {
                        kind: *kind,
                        id: *id,
                    });
                }
                ToolEvent::Discarded { kind, id } => {
                    self.selection.forget(*id);
                    self.events.publish(EngineEvent::ShapeRemoved {
                        kind: *kind,
                        id: *id,
                        frame,
                    });
                }
                ToolEvent::PointsAdded { kind, id } => {
                    if let Some(points) = self.find(*kind, *id).and_then(|s| s.points().map(<[_]>::to_vec)) {
                        if self.sync.shape_updated(*id, &ShapePatch::with_points(points), &self.scale) {
                            self.publish_queued();
                        }
                    }
                    self.events.publish(EngineEvent::ShapeChanged {
                        kind: *kind,
                        id: *id,
                        frame,
                    });
                }
                ToolEvent::AiBoxChanged(b) | ToolEvent::AiBoxCompleted(b) => {
                    self.selection.ai_box = Some(*b);
                }
                ToolEvent::AiBoxCleared => self.selection.ai_box = None,
                ToolEvent::Armed(_) | ToolEvent::Disarmed => {}
            }
            self.events.publish(EngineEvent::Tool(event));
        }
    }

    pub fn toggle_tool(&mut self, tool: DrawingTool) -> Vec<ToolEvent> {
        self.gesture(|tools, target| tools.toggle(tool, target))
    }

    pub fn click(&mut self, point: DisplayPoint) -> Vec<ToolEvent> {
        self.gesture(|tools, target| tools.click(point, target))
    }

    pub fn pointer_down(&mut self, point: DisplayPoint) -> Vec<ToolEvent> {
        self.gesture(|tools, target| tools.pointer_down(point, target))
    }

    pub fn pointer_move(&mut self, point: DisplayPoint) -> Vec<ToolEvent> {
        self.gesture(|tools, target| tools.pointer_move(point, target))
    }

    pub fn pointer_up(&mut self, point: DisplayPoint) -> Vec<ToolEvent> {
        self.gesture(|tools, target| tools.pointer_up(point, target))
    }

    pub fn escape(&mut self) -> Vec<ToolEvent> {
        self.gesture(|tools, target| tools.escape(target))
    }

    /// Start appending vertices to a finished polygon or line.
    pub fn begin_add_points(&mut self, kind: ShapeKind, id: ShapeId) -> bool {
        let frame = self.frame;
        let tools = &mut self.tools;
        self.store
            .with_target(frame, |target| tools.begin_add_points(kind, id, target))
    }

    /// Complete the oldest finished shape with its name and class, record
    /// it in history and queue its create.
    ///
    /// The stroke comes from the class colour as it is right now.
    pub fn confirm_shape(&mut self, details: ShapeDetails) -> Option<Shape> {
        let pending = self.pending.pop_front()?;
        let mut patch = details.to_patch();
        patch.stroke = self.classes.stroke_for(details.class_id.as_deref());

        let frame_key = match self.store.kind() {
            MediaKind::Image => None,
            MediaKind::Video => Some(pending.frame),
        };
        let (shape, index) = self.store.with_target(pending.frame, |target| {
            let shape = target.patch(pending.kind, pending.id, &patch)?;
            let index = target.position(pending.kind, pending.id)?;
            Some((shape, index))
        })?;
        self.store_record(Command::Insert {
            frame: frame_key,
            index,
            shape: shape.clone(),
        });
        self.sync.shape_created(&shape, pending.frame, &self.scale);

        log::debug!("confirmed {} {}", shape.kind(), shape.id());
        self.events.publish(EngineEvent::ShapeChanged {
            kind: pending.kind,
            id: pending.id,
            frame: frame_key,
        });
        self.publish_queued();
        Some(shape)
    }

    fn store_record(&mut self, command: Command) {
        let frame = command.frame().unwrap_or(self.frame);
        self.store.with_target(frame, |target| target.record(command));
    }

    /// Drop the oldest finished shape without saving it.
    pub fn cancel_pending(&mut self) -> Option<Shape> {
        let pending = self.pending.pop_front()?;
        let removed = self
            .store
            .with_target(pending.frame, |target| target.remove(pending.kind, pending.id));
        self.selection.forget(pending.id);
        self.text.forget(pending.id);
        self.events.publish(EngineEvent::ShapeRemoved {
            kind: pending.kind,
            id: pending.id,
            frame: self.history_frame().map(|_| pending.frame),
        });
        removed
    }

    pub fn select_shape(&mut self, kind: ShapeKind, id: ShapeId) -> bool {
        if self.find(kind, id).is_none() {
            return false;
        }
        self.selection.select_shape(kind, id);
        self.publish_selection();
        true
    }

    /// Select the vertex of a shape nearest to `at`.
    pub fn pick_point(
        &mut self,
        kind: ShapeKind,
        id: ShapeId,
        at: &DisplayPoint,
    ) -> Option<PointSelection> {
        let shape = self.find(kind, id)?;
        let picked = self.selection.pick_point(&shape, at)?;
        self.publish_selection();
        Some(picked)
    }

    pub fn select_point(&mut self, kind: ShapeKind, id: ShapeId, point_id: PointId) -> bool {
        let exists = self
            .find(kind, id)
            .and_then(|shape| shape.points().map(|p| p.iter().any(|p| p.id == point_id)))
            .unwrap_or(false);
        if !exists {
            return false;
        }
        self.selection.select_point(kind, id, point_id);
        self.publish_selection();
        true
    }

    pub fn clear_selection(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        self.selection.clear();
        self.publish_selection();
    }

    /// Drop selection entries whose shape or vertex no longer exists.
    fn prune_selection(&mut self) {
        let before = (self.selection.shape(), self.selection.point());
        if let Some(sel) = self.selection.shape() {
            if self.find(sel.kind, sel.shape_id).is_none() {
                self.selection.forget(sel.shape_id);
            }
        }
        if let Some(point) = self.selection.point() {
            let alive = self
                .find(point.kind, point.shape_id)
                .and_then(|s| s.points().map(|p| p.iter().any(|p| p.id == point.point_id)))
                .unwrap_or(false);
            if !alive {
                self.selection.clear_point();
            }
        }
        if before != (self.selection.shape(), self.selection.point()) {
            self.publish_selection();
        }
    }

    /// Frame of a shape that is still being drawn or awaits its details.
    /// Such shapes are edited untracked and never synced.
    fn unconfirmed_frame(&self, id: ShapeId) -> Option<u32> {
        if let Some(pending) = self.pending.iter().find(|p| p.id == id) {
            return Some(pending.frame);
        }
        self.tools
            .new_shape_in_progress()
            .filter(|(_, drawing)| *drawing == id)
            .map(|_| self.frame)
    }

    /// Tracked store update followed by an immediate sync of the patch.
    /// Unconfirmed shapes are patched without history.
    fn commit(&mut self, kind: ShapeKind, id: ShapeId, patch: &ShapePatch) -> Option<Shape> {
        if let Some(frame) = self.unconfirmed_frame(id) {
            let shape = self
                .store
                .with_target(frame, |target| target.patch(kind, id, patch))?;
            self.events.publish(EngineEvent::ShapeChanged {
                kind,
                id,
                frame: self.history_frame().map(|_| frame),
            });
            return Some(shape);
        }
        let shape = self.store.update_shape(self.frame, kind, id, patch)?;
        if self.sync.shape_updated(id, patch, &self.scale) {
            self.publish_queued();
        }
        self.events.publish(EngineEvent::ShapeChanged {
            kind,
            id,
            frame: self.history_frame(),
        });
        Some(shape)
    }

    /// Drag end: move a whole shape.
    pub fn move_shape(&mut self, kind: ShapeKind, id: ShapeId, dx: f64, dy: f64) -> Option<Shape> {
        let mut moved = self.find(kind, id)?;
        moved.translate(dx, dy);
        let patch = ShapePatch {
            points: moved.points().map(<[DisplayPoint]>::to_vec),
            bounds: moved.box_geometry().copied(),
            ..ShapePatch::default()
        };
        self.commit(kind, id, &patch)
    }

    /// Resize end for rectangles and circles. A box without area is refused.
    pub fn resize_shape(
        &mut self,
        kind: ShapeKind,
        id: ShapeId,
        bounds: BoxGeometry<Display>,
    ) -> Option<Shape> {
        let bounds = bounds.normalized();
        if kind.has_points() || bounds.is_degenerate() {
            return None;
        }
        self.commit(kind, id, &ShapePatch::with_bounds(bounds))
    }

    /// Vertex drag end.
    pub fn move_point(
        &mut self,
        kind: ShapeKind,
        id: ShapeId,
        point_id: PointId,
        to: DisplayPoint,
    ) -> Option<Shape> {
        let shape = self.find(kind, id)?;
        let points = shape.points()?;
        if !points.iter().any(|p| p.id == point_id) {
            return None;
        }
        let points = points
            .iter()
            .map(|p| {
                if p.id == point_id {
                    DisplayPoint::with_id(point_id, to.x, to.y)
                } else {
                    *p
                }
            })
            .collect();
        self.commit(kind, id, &ShapePatch::with_points(points))
    }

    /// Delete the selected vertex. Refused when the shape would fall below
    /// its kind's minimum vertex count.
    pub fn delete_selected_point(&mut self) -> Option<Shape> {
        let sel = self.selection.point()?;
        let count = self.find(sel.kind, sel.shape_id)?.points()?.len();
        if count <= sel.kind.min_points() {
            log::debug!("refusing to drop {} below {} points", sel.kind, sel.kind.min_points());
            return None;
        }
        if self.unconfirmed_frame(sel.shape_id).is_some() {
            let points = self
                .find(sel.kind, sel.shape_id)?
                .points()?
                .iter()
                .filter(|p| p.id != sel.point_id)
                .copied()
                .collect();
            let shape = self.commit(sel.kind, sel.shape_id, &ShapePatch::with_points(points))?;
            self.selection.clear_point();
            self.publish_selection();
            return Some(shape);
        }
        let shape = self
            .store
            .delete_shape_point(self.frame, sel.kind, sel.shape_id, sel.point_id)?;
        self.selection.clear_point();
        if let Some(points) = shape.points() {
            if self
                .sync
                .shape_updated(sel.shape_id, &ShapePatch::with_points(points.to_vec()), &self.scale)
            {
                self.publish_queued();
            }
        }
        self.events.publish(EngineEvent::ShapeChanged {
            kind: sel.kind,
            id: sel.shape_id,
            frame: self.history_frame(),
        });
        self.publish_selection();
        Some(shape)
    }

    /// Save edited details of an existing shape. The stroke follows the
    /// class colour as it is right now.
    pub fn update_details(
        &mut self,
        kind: ShapeKind,
        id: ShapeId,
        details: ShapeDetails,
    ) -> Option<Shape> {
        let mut patch = details.to_patch();
        patch.stroke = self.classes.stroke_for(details.class_id.as_deref());
        self.text.forget(id);
        self.commit(kind, id, &patch)
    }

    /// Typing in a shape's notes. Applied locally at once, synced after the
    /// debounce interval. Not undoable.
    pub fn edit_notes(
        &mut self,
        kind: ShapeKind,
        id: ShapeId,
        notes: impl Into<String>,
        now: Instant,
    ) -> bool {
        let patch = ShapePatch {
            notes: Some(notes.into()),
            ..ShapePatch::default()
        };
        let frame = self.frame;
        let patched = self
            .store
            .with_target(frame, |target| target.patch(kind, id, &patch))
            .is_some();
        if patched {
            let frame = self.history_frame();
            self.text.mark(id, kind, frame, now);
        }
        patched
    }

    pub fn delete_shape(&mut self, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        if let Some(index) = self.pending.iter().position(|p| p.id == id) {
            // Never confirmed: drop it like a cancelled draw.
            if let Some(pending) = self.pending.remove(index) {
                self.pending.push_front(pending);
            }
            return self.cancel_pending();
        }
        if self
            .tools
            .new_shape_in_progress()
            .is_some_and(|(_, drawing)| drawing == id)
        {
            let shape = self.find(kind, id)?;
            self.escape();
            self.text.forget(id);
            return Some(shape);
        }
        let removed = self.store.delete_shape(self.frame, kind, id)?;
        self.selection.forget(id);
        self.text.forget(id);
        if self.sync.shape_deleted(id) {
            self.publish_queued();
        }
        self.events.publish(EngineEvent::ShapeRemoved {
            kind,
            id,
            frame: self.history_frame(),
        });
        self.publish_selection();
        Some(removed)
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    pub fn undo(&mut self) -> Option<Command> {
        let applied = self.store.undo()?;
        self.after_history(&applied, true);
        Some(applied)
    }

    pub fn redo(&mut self) -> Option<Command> {
        let applied = self.store.redo()?;
        self.after_history(&applied, false);
        Some(applied)
    }

    fn after_history(&mut self, applied: &Command, undo: bool) {
        for id in applied.shape_ids() {
            let gone = match applied {
                Command::Remove { .. } => true,
                Command::ReplaceBucket { after, .. } => after.iter().all(|s| s.id() != id),
                Command::Insert { .. } | Command::Replace { .. } => false,
            };
            if gone {
                self.text.forget(id);
            }
        }
        self.prune_selection();
        if self.config.reconcile_undo && self.sync.reconcile(applied, &self.scale) > 0 {
            self.publish_queued();
        }
        log::debug!("{} {}", if undo { "undo" } else { "redo" }, applied.description());
        self.events.publish(EngineEvent::HistoryApplied {
            undo,
            description: applied.description(),
        });
    }

    /// Apply `tags` to every selected file in one batched call.
    pub fn apply_tags(&mut self, tags: Vec<String>) -> bool {
        let Some(intent) = self.tagger.apply(tags) else {
            return false;
        };
        let file_ids = match &intent {
            Intent::TagFiles { file_ids, .. } => file_ids.clone(),
            _ => Vec::new(),
        };
        self.sync.tag_files(intent);
        self.events.publish(EngineEvent::FilesTagged { file_ids });
        self.publish_queued();
        true
    }

    pub fn skip_files(&mut self) -> bool {
        self.apply_tags(Vec::new())
    }

    /// Sync the text edits that have been idle long enough. Returns how many
    /// shapes were queued.
    pub fn flush_text_edits(&mut self, now: Instant) -> usize {
        let due = self.text.due(now);
        self.sync_text(due)
    }

    fn flush_all_text_edits(&mut self) -> usize {
        let due = self.text.flush_all();
        self.sync_text(due)
    }

    fn sync_text(&mut self, due: Vec<(ShapeId, DirtyText)>) -> usize {
        let mut queued = 0;
        for (id, dirty) in due {
            let frame = dirty.frame.unwrap_or(self.frame);
            let Some(shape) = self.store.find(frame, dirty.kind, id) else {
                continue;
            };
            let patch = ShapePatch {
                notes: Some(shape.meta().notes.clone()),
                ..ShapePatch::default()
            };
            if self.sync.shape_updated(id, &patch, &self.scale) {
                queued += 1;
            }
        }
        if queued > 0 {
            self.publish_queued();
        }
        queued
    }

    /// Send due outbox entries to the backend.
    pub async fn dispatch_sync(
        &mut self,
        persistence: &dyn Persistence,
        now: Instant,
    ) -> DispatchReport {
        let report = self.sync.dispatch(persistence, now).await;
        self.events.publish(EngineEvent::Dispatched(report.clone()));
        report
    }
}
