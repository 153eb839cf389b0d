//! Ephemeral selection state. Never part of undo history.

use crate::shapes::{BoxGeometry, Display, DisplayPoint, PointId, Shape, ShapeId, ShapeKind};
use serde::{Deserialize, Serialize};

/// Vertex hit tolerance in display pixels.
pub const POINT_HIT_TOLERANCE: f64 = 8.0;

/// A selected shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeSelection {
    pub kind: ShapeKind,
    pub shape_id: ShapeId,
}

/// A selected vertex of a polygon or line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointSelection {
    pub kind: ShapeKind,
    pub shape_id: ShapeId,
    pub point_id: PointId,
}

/// What is currently selected.
///
/// There is a single point slot, so selecting a vertex on one shape kind
/// replaces any vertex selected on another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    shape: Option<ShapeSelection>,
    point: Option<PointSelection>,
    /// Bounds of the AI-assist box being dragged.
    pub ai_box: Option<BoxGeometry<Display>>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape(&self) -> Option<ShapeSelection> {
        self.shape
    }

    pub fn point(&self) -> Option<PointSelection> {
        self.point
    }

    pub fn select_shape(&mut self, kind: ShapeKind, shape_id: ShapeId) {
        self.shape = Some(ShapeSelection { kind, shape_id });
        if self.point.is_some_and(|p| p.shape_id != shape_id) {
            self.point = None;
        }
    }

    /// Select a vertex; the owning shape becomes the selected shape.
    pub fn select_point(&mut self, kind: ShapeKind, shape_id: ShapeId, point_id: PointId) {
        self.shape = Some(ShapeSelection { kind, shape_id });
        self.point = Some(PointSelection {
            kind,
            shape_id,
            point_id,
        });
    }

    /// Pick the vertex of `shape` under `at`, if there is one.
    pub fn pick_point(&mut self, shape: &Shape, at: &DisplayPoint) -> Option<PointSelection> {
        let point_id = shape.point_near(at, POINT_HIT_TOLERANCE)?;
        self.select_point(shape.kind(), shape.id(), point_id);
        self.point
    }

    pub fn clear_point(&mut self) {
        self.point = None;
    }

    /// Drop any reference to a shape that no longer exists.
    pub fn forget(&mut self, shape_id: ShapeId) {
        if self.shape.is_some_and(|s| s.shape_id == shape_id) {
            self.shape = None;
        }
        if self.point.is_some_and(|p| p.shape_id == shape_id) {
            self.point = None;
        }
    }

    pub fn is_selected(&self, shape_id: ShapeId) -> bool {
        self.shape.is_some_and(|s| s.shape_id == shape_id)
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_none() && self.point.is_none() && self.ai_box.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileContext;
    use crate::shapes::{Line, Polygon, ShapeMeta, StrokeColor};
    use uuid::Uuid;

    fn meta() -> ShapeMeta {
        ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 2.0)
    }

    #[test]
    fn test_point_selection_is_single_slot() {
        let mut sel = SelectionState::new();
        let (poly, line) = (Uuid::new_v4(), Uuid::new_v4());
        sel.select_point(ShapeKind::Polygon, poly, Uuid::new_v4());
        sel.select_point(ShapeKind::Line, line, Uuid::new_v4());

        let point = sel.point().unwrap();
        assert_eq!(point.kind, ShapeKind::Line);
        assert_eq!(point.shape_id, line);
        assert!(sel.is_selected(line));
    }

    #[test]
    fn test_selecting_other_shape_drops_point() {
        let mut sel = SelectionState::new();
        let a = Uuid::new_v4();
        sel.select_point(ShapeKind::Polygon, a, Uuid::new_v4());
        sel.select_shape(ShapeKind::Polygon, a);
        assert!(sel.point().is_some());
        sel.select_shape(ShapeKind::Rectangle, Uuid::new_v4());
        assert!(sel.point().is_none());
    }

    #[test]
    fn test_pick_point() {
        let line: Shape = Line::new(
            meta(),
            vec![DisplayPoint::new(0.0, 0.0), DisplayPoint::new(50.0, 0.0)],
        )
        .into();
        let end = line.points().unwrap()[1].id;
        let mut sel = SelectionState::new();
        assert!(sel.pick_point(&line, &DisplayPoint::new(25.0, 0.0)).is_none());
        let picked = sel.pick_point(&line, &DisplayPoint::new(48.0, 3.0)).unwrap();
        assert_eq!(picked.point_id, end);
    }

    #[test]
    fn test_forget_and_clear() {
        let mut sel = SelectionState::new();
        let poly: Shape = Polygon::new(meta(), vec![DisplayPoint::new(1.0, 1.0)]).into();
        sel.select_shape(poly.kind(), poly.id());
        sel.ai_box = Some(BoxGeometry::new(0.0, 0.0, 4.0, 4.0));
        sel.forget(poly.id());
        assert!(sel.shape().is_none());
        assert!(!sel.is_empty());
        sel.clear();
        assert!(sel.is_empty());
    }
}
