//! Shape definitions for annotations.

mod circle;
mod color;
mod face;
mod line;
mod point;
mod polygon;
mod rectangle;

pub use circle::Circle;
pub use color::{ColorParseError, StrokeColor};
pub use face::Face;
pub use line::Line;
pub use point::{
    BoxGeometry, Display, DisplayPoint, Native, NativePoint, Point, PointId, Space,
};
pub use polygon::Polygon;
pub use rectangle::Rectangle;

use crate::media::FileContext;
use crate::store::ShapeCollection;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// The five annotation shape kinds. Serialized with their wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Polygon,
    Rectangle,
    Circle,
    Face,
    Line,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 5] = [
        ShapeKind::Polygon,
        ShapeKind::Rectangle,
        ShapeKind::Circle,
        ShapeKind::Face,
        ShapeKind::Line,
    ];

    /// Minimum vertex count of a finalized shape (0 for box and face kinds).
    pub fn min_points(self) -> usize {
        match self {
            ShapeKind::Polygon => 3,
            ShapeKind::Line => 2,
            ShapeKind::Rectangle | ShapeKind::Circle | ShapeKind::Face => 0,
        }
    }

    /// Whether the geometry is a point list rather than a box.
    pub fn has_points(self) -> bool {
        matches!(self, ShapeKind::Polygon | ShapeKind::Line | ShapeKind::Face)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Polygon => "polygon",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Circle => "circle",
            ShapeKind::Face => "face",
            ShapeKind::Line => "line",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every shape kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeMeta {
    pub id: ShapeId,
    pub name: String,
    pub notes: String,
    pub stroke: StrokeColor,
    pub stroke_width: f64,
    pub class_id: Option<String>,
    pub attribute: Option<String>,
    pub text: Option<String>,
    /// User-defined identifier, distinct from `id`.
    pub id_field: Option<String>,
    pub org_id: String,
    pub project_id: String,
    pub file_id: String,
}

impl ShapeMeta {
    /// Unnamed metadata for a shape that is still being drawn.
    pub fn new(context: &FileContext, stroke: StrokeColor, stroke_width: f64) -> Self {
        Self::with_id(Uuid::new_v4(), context, stroke, stroke_width)
    }

    pub fn with_id(
        id: ShapeId,
        context: &FileContext,
        stroke: StrokeColor,
        stroke_width: f64,
    ) -> Self {
        Self {
            id,
            name: String::new(),
            notes: String::new(),
            stroke,
            stroke_width,
            class_id: None,
            attribute: None,
            text: None,
            id_field: None,
            org_id: context.org_id.clone(),
            project_id: context.project_id.clone(),
            file_id: context.file_id.clone(),
        }
    }

    /// Apply the non-geometric part of a patch.
    pub fn apply_patch(&mut self, patch: &ShapePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        if let Some(stroke) = patch.stroke {
            self.stroke = stroke;
        }
        if let Some(width) = patch.stroke_width {
            self.stroke_width = width;
        }
        if let Some(class_id) = &patch.class_id {
            self.class_id = class_id.clone();
        }
        if let Some(attribute) = &patch.attribute {
            self.attribute = attribute.clone();
        }
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(id_field) = &patch.id_field {
            self.id_field = id_field.clone();
        }
    }
}

/// Partial update for a shape. `None` leaves a field untouched; for the
/// optional metadata fields `Some(None)` clears the value.
///
/// `points` only applies to polygons, lines and faces; `bounds` only to
/// rectangles and circles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapePatch {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub stroke: Option<StrokeColor>,
    pub stroke_width: Option<f64>,
    pub class_id: Option<Option<String>>,
    pub attribute: Option<Option<String>>,
    pub text: Option<Option<String>>,
    pub id_field: Option<Option<String>>,
    pub points: Option<Vec<DisplayPoint>>,
    pub bounds: Option<BoxGeometry<Display>>,
}

impl ShapePatch {
    /// Patch replacing the vertex list.
    pub fn with_points(points: Vec<DisplayPoint>) -> Self {
        Self {
            points: Some(points),
            ..Self::default()
        }
    }

    /// Patch replacing the box.
    pub fn with_bounds(bounds: BoxGeometry<Display>) -> Self {
        Self {
            bounds: Some(bounds),
            ..Self::default()
        }
    }

    /// Patch carrying every field of `shape`, so applying it anywhere
    /// reproduces the shape's current state.
    pub fn snapshot(shape: &Shape) -> Self {
        let meta = shape.meta();
        Self {
            name: Some(meta.name.clone()),
            notes: Some(meta.notes.clone()),
            stroke: Some(meta.stroke),
            stroke_width: Some(meta.stroke_width),
            class_id: Some(meta.class_id.clone()),
            attribute: Some(meta.attribute.clone()),
            text: Some(meta.text.clone()),
            id_field: Some(meta.id_field.clone()),
            points: shape.points().map(<[DisplayPoint]>::to_vec),
            bounds: shape.box_geometry().copied(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn touches_geometry(&self) -> bool {
        self.points.is_some() || self.bounds.is_some()
    }
}

/// Behaviour shared by the concrete shape structs. Stores are generic over
/// this trait so one implementation serves all five kinds.
pub trait ShapeVariant: Clone + fmt::Debug + Into<Shape> {
    const KIND: ShapeKind;

    fn meta(&self) -> &ShapeMeta;

    fn meta_mut(&mut self) -> &mut ShapeMeta;

    /// The collection bucket holding shapes of this kind.
    fn bucket(collection: &ShapeCollection) -> &Vec<Self>;

    fn bucket_mut(collection: &mut ShapeCollection) -> &mut Vec<Self>;

    /// Unwrap from the tagged union; `None` for another kind.
    fn from_shape(shape: Shape) -> Option<Self>;

    /// Merge a partial update into this shape.
    fn apply_patch(&mut self, patch: &ShapePatch);

    /// Vertex list, for kinds that have one.
    fn points_mut(&mut self) -> Option<&mut Vec<DisplayPoint>> {
        None
    }

    fn id(&self) -> ShapeId {
        self.meta().id
    }
}

/// Tagged union over every shape kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Polygon(Polygon),
    Rectangle(Rectangle),
    Circle(Circle),
    Face(Face),
    Line(Line),
}

impl Shape {
    pub fn id(&self) -> ShapeId {
        self.meta().id
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Polygon(_) => ShapeKind::Polygon,
            Shape::Rectangle(_) => ShapeKind::Rectangle,
            Shape::Circle(_) => ShapeKind::Circle,
            Shape::Face(_) => ShapeKind::Face,
            Shape::Line(_) => ShapeKind::Line,
        }
    }

    pub fn meta(&self) -> &ShapeMeta {
        match self {
            Shape::Polygon(s) => &s.meta,
            Shape::Rectangle(s) => &s.meta,
            Shape::Circle(s) => &s.meta,
            Shape::Face(s) => &s.meta,
            Shape::Line(s) => &s.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ShapeMeta {
        match self {
            Shape::Polygon(s) => &mut s.meta,
            Shape::Rectangle(s) => &mut s.meta,
            Shape::Circle(s) => &mut s.meta,
            Shape::Face(s) => &mut s.meta,
            Shape::Line(s) => &mut s.meta,
        }
    }

    /// Vertex list for polygons, lines and faces.
    pub fn points(&self) -> Option<&[DisplayPoint]> {
        match self {
            Shape::Polygon(s) => Some(&s.points),
            Shape::Line(s) => Some(&s.points),
            Shape::Face(s) => Some(&s.points),
            Shape::Rectangle(_) | Shape::Circle(_) => None,
        }
    }

    /// Box for rectangles and circles.
    pub fn box_geometry(&self) -> Option<&BoxGeometry<Display>> {
        match self {
            Shape::Rectangle(s) => Some(&s.bounds),
            Shape::Circle(s) => Some(&s.bounds),
            _ => None,
        }
    }

    /// Bounding box in display space.
    pub fn bounds(&self) -> kurbo::Rect {
        match self.points() {
            Some(points) => points_bounds(points),
            None => self
                .box_geometry()
                .map(|b| b.as_rect().abs())
                .unwrap_or(kurbo::Rect::ZERO),
        }
    }

    /// Move the whole shape.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            Shape::Polygon(s) => translate_points(&mut s.points, dx, dy),
            Shape::Line(s) => translate_points(&mut s.points, dx, dy),
            Shape::Face(s) => translate_points(&mut s.points, dx, dy),
            Shape::Rectangle(s) => s.bounds = s.bounds.translated(dx, dy),
            Shape::Circle(s) => s.bounds = s.bounds.translated(dx, dy),
        }
    }

    pub fn apply_patch(&mut self, patch: &ShapePatch) {
        match self {
            Shape::Polygon(s) => s.apply_patch(patch),
            Shape::Rectangle(s) => s.apply_patch(patch),
            Shape::Circle(s) => s.apply_patch(patch),
            Shape::Face(s) => s.apply_patch(patch),
            Shape::Line(s) => s.apply_patch(patch),
        }
    }

    /// The vertex nearest to `point` within `tolerance` (Euclidean), if any.
    pub fn point_near(&self, point: &DisplayPoint, tolerance: f64) -> Option<PointId> {
        self.points()?
            .iter()
            .map(|p| (p.id, p.distance(point)))
            .filter(|(_, d)| *d <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}

/// Bounding box of a vertex list.
pub fn points_bounds(points: &[DisplayPoint]) -> kurbo::Rect {
    let mut iter = points.iter();
    let Some(first) = iter.next() else {
        return kurbo::Rect::ZERO;
    };
    iter.fold(
        kurbo::Rect::from_points(first.to_kurbo(), first.to_kurbo()),
        |rect, p| rect.union_pt(p.to_kurbo()),
    )
}

fn translate_points(points: &mut [DisplayPoint], dx: f64, dy: f64) {
    for p in points.iter_mut() {
        *p = p.translated(dx, dy);
    }
}

/// Remove a vertex by id. Returns false when the id is not present.
pub(crate) fn remove_point(points: &mut Vec<DisplayPoint>, point_id: PointId) -> bool {
    let before = points.len();
    points.retain(|p| p.id != point_id);
    points.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> FileContext {
        FileContext::new("org", "proj", "file-a")
    }

    fn square() -> Shape {
        let meta = ShapeMeta::new(&context(), StrokeColor::black(), 2.0);
        Shape::Polygon(Polygon::new(
            meta,
            vec![
                DisplayPoint::new(0.0, 0.0),
                DisplayPoint::new(10.0, 0.0),
                DisplayPoint::new(10.0, 10.0),
                DisplayPoint::new(0.0, 10.0),
            ],
        ))
    }

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&ShapeKind::Circle).unwrap();
        assert_eq!(json, "\"circle\"");
        for kind in ShapeKind::ALL {
            assert_eq!(
                serde_json::to_string(&kind).unwrap(),
                format!("\"{}\"", kind.as_str())
            );
        }
    }

    #[test]
    fn test_bounds_and_translate() {
        let mut shape = square();
        let b = shape.bounds();
        assert!((b.width() - 10.0).abs() < f64::EPSILON);

        shape.translate(5.0, -5.0);
        let b = shape.bounds();
        assert!((b.x0 - 5.0).abs() < f64::EPSILON);
        assert!((b.y0 + 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_meta_patch_clears_optional_fields() {
        let mut meta = ShapeMeta::new(&context(), StrokeColor::black(), 2.0);
        meta.class_id = Some("cls".into());
        let patch = ShapePatch {
            name: Some("car".into()),
            class_id: Some(None),
            ..ShapePatch::default()
        };
        meta.apply_patch(&patch);
        assert_eq!(meta.name, "car");
        assert_eq!(meta.class_id, None);
        assert_eq!(meta.file_id, "file-a");
    }

    #[test]
    fn test_point_near() {
        let shape = square();
        let target = shape.points().unwrap()[2].id;
        let hit = shape.point_near(&DisplayPoint::new(11.0, 9.0), 3.0);
        assert_eq!(hit, Some(target));
        assert_eq!(shape.point_near(&DisplayPoint::new(50.0, 50.0), 3.0), None);
    }

    #[test]
    fn test_empty_patch() {
        assert!(ShapePatch::default().is_empty());
        assert!(!ShapePatch::with_points(Vec::new()).is_empty());
        assert!(ShapePatch::with_points(Vec::new()).touches_geometry());
    }
}
