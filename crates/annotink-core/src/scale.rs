//! Mapping between media-native and display coordinates.
//!
//! Persisted shapes live in the media's own pixel space; shapes held by the
//! stores live in the space of the element as currently rendered. The scale
//! must be recomputed whenever the rendered size changes, and every payload
//! sent to persistence is converted with the scale in effect at that moment.

use crate::shapes::{
    BoxGeometry, Circle, Display, DisplayPoint, Face, Line, Native, NativePoint, Polygon,
    Rectangle, Shape, ShapeKind, ShapeMeta, ShapePatch,
};
use crate::sync::{RecordPatch, ShapeRecord};
use kurbo::Size;
use serde::{Deserialize, Serialize};

/// Natural size of the media and the size it is rendered at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaDimensions {
    pub natural: Size,
    pub rendered: Size,
}

impl MediaDimensions {
    pub fn new(natural: Size, rendered: Size) -> Self {
        Self { natural, rendered }
    }

    pub fn scale(&self) -> Scale {
        Scale::from_dimensions(self)
    }
}

/// Display-per-native ratio on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for Scale {
    fn default() -> Self {
        Self::identity()
    }
}

/// Ratio for one axis; zero-sized media falls back to 1.
fn axis_ratio(rendered: f64, natural: f64) -> f64 {
    if natural > 0.0 && rendered > 0.0 && natural.is_finite() && rendered.is_finite() {
        rendered / natural
    } else {
        1.0
    }
}

impl Scale {
    pub fn identity() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    pub fn from_dimensions(dims: &MediaDimensions) -> Self {
        Self {
            scale_x: axis_ratio(dims.rendered.width, dims.natural.width),
            scale_y: axis_ratio(dims.rendered.height, dims.natural.height),
        }
    }

    pub fn to_display(&self, point: &NativePoint) -> DisplayPoint {
        DisplayPoint::with_id(point.id, point.x * self.scale_x, point.y * self.scale_y)
    }

    pub fn to_native(&self, point: &DisplayPoint) -> NativePoint {
        NativePoint::with_id(point.id, point.x / self.scale_x, point.y / self.scale_y)
    }

    pub fn box_to_display(&self, b: &BoxGeometry<Native>) -> BoxGeometry<Display> {
        BoxGeometry::new(
            b.x * self.scale_x,
            b.y * self.scale_y,
            b.width * self.scale_x,
            b.height * self.scale_y,
        )
    }

    pub fn box_to_native(&self, b: &BoxGeometry<Display>) -> BoxGeometry<Native> {
        BoxGeometry::new(
            b.x / self.scale_x,
            b.y / self.scale_y,
            b.width / self.scale_x,
            b.height / self.scale_y,
        )
    }

    pub fn points_to_native(&self, points: &[DisplayPoint]) -> Vec<NativePoint> {
        points.iter().map(|p| self.to_native(p)).collect()
    }

    pub fn points_to_display(&self, points: &[NativePoint]) -> Vec<DisplayPoint> {
        points.iter().map(|p| self.to_display(p)).collect()
    }

    /// Carry a display point over to another display scale.
    pub fn rescale_point(&self, point: &DisplayPoint, to: &Scale) -> DisplayPoint {
        to.to_display(&self.to_native(point))
    }

    /// Carry a display-space shape over to another display scale, in place.
    pub fn rescale_shape(&self, shape: &mut Shape, to: &Scale) {
        let patch = match (shape.points(), shape.box_geometry()) {
            (Some(points), _) => {
                ShapePatch::with_points(points.iter().map(|p| self.rescale_point(p, to)).collect())
            }
            (None, Some(b)) => ShapePatch::with_bounds(to.box_to_display(&self.box_to_native(b))),
            (None, None) => return,
        };
        shape.apply_patch(&patch);
    }

    /// Native-space record for a display-space shape. Boxes are normalised so
    /// stored rectangles never have negative dimensions.
    pub fn shape_to_record(&self, shape: &Shape, at_frame: u32) -> ShapeRecord {
        let meta = shape.meta();
        let mut record = ShapeRecord {
            id: meta.id,
            name: meta.name.clone(),
            kind: shape.kind(),
            org_id: meta.org_id.clone(),
            project_id: meta.project_id.clone(),
            file_id: meta.file_id.clone(),
            class_id: meta.class_id.clone(),
            notes: (!meta.notes.is_empty()).then(|| meta.notes.clone()),
            stroke_width: meta.stroke_width,
            x: None,
            y: None,
            height: None,
            width: None,
            points: None,
            text_field: meta.text.clone(),
            id_field: meta.id_field.clone(),
            attribute: meta.attribute.clone(),
            at_frame,
            stroke: meta.stroke,
        };
        if let Some(points) = shape.points() {
            record.points = Some(self.points_to_native(points));
        }
        if let Some(b) = shape.box_geometry() {
            let native = self.box_to_native(&b.normalized());
            record.x = Some(native.x);
            record.y = Some(native.y);
            record.width = Some(native.width);
            record.height = Some(native.height);
        }
        record
    }

    /// Display-space shape for a persisted record. Returns `None` when a box
    /// record lacks one of its four fields.
    pub fn record_to_shape(&self, record: &ShapeRecord) -> Option<Shape> {
        let meta = ShapeMeta {
            id: record.id,
            name: record.name.clone(),
            notes: record.notes.clone().unwrap_or_default(),
            stroke: record.stroke,
            stroke_width: record.stroke_width,
            class_id: record.class_id.clone(),
            attribute: record.attribute.clone(),
            text: record.text_field.clone(),
            id_field: record.id_field.clone(),
            org_id: record.org_id.clone(),
            project_id: record.project_id.clone(),
            file_id: record.file_id.clone(),
        };
        let points = || {
            record
                .points
                .as_deref()
                .map(|p| self.points_to_display(p))
                .unwrap_or_default()
        };
        let shape = match record.kind {
            ShapeKind::Polygon => Shape::Polygon(Polygon::new(meta, points())),
            ShapeKind::Line => Shape::Line(Line::new(meta, points())),
            ShapeKind::Face => Shape::Face(Face::new(meta, points())),
            ShapeKind::Rectangle => Shape::Rectangle(Rectangle::new(
                meta,
                self.box_to_display(&record.box_geometry()?),
            )),
            ShapeKind::Circle => Shape::Circle(Circle::new(
                meta,
                self.box_to_display(&record.box_geometry()?),
            )),
        };
        Some(shape)
    }

    /// Native-space patch carrying only the fields set on `patch`.
    pub fn patch_to_native(&self, patch: &ShapePatch) -> RecordPatch {
        let mut out = RecordPatch {
            name: patch.name.clone(),
            notes: patch.notes.clone(),
            stroke: patch.stroke,
            stroke_width: patch.stroke_width,
            class_id: patch.class_id.clone(),
            attribute: patch.attribute.clone(),
            text_field: patch.text.clone(),
            id_field: patch.id_field.clone(),
            ..RecordPatch::default()
        };
        if let Some(points) = &patch.points {
            out.points = Some(self.points_to_native(points));
        }
        if let Some(b) = &patch.bounds {
            let native = self.box_to_native(&b.normalized());
            out.x = Some(native.x);
            out.y = Some(native.y);
            out.width = Some(native.width);
            out.height = Some(native.height);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileContext;
    use crate::shapes::StrokeColor;

    fn dims(nw: f64, nh: f64, rw: f64, rh: f64) -> MediaDimensions {
        MediaDimensions::new(Size::new(nw, nh), Size::new(rw, rh))
    }

    #[test]
    fn test_scale_ratios() {
        let s = dims(1920.0, 1080.0, 960.0, 540.0).scale();
        assert!((s.scale_x - 0.5).abs() < f64::EPSILON);
        assert!((s.scale_y - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_degenerate_media_is_identity() {
        assert_eq!(dims(0.0, 0.0, 0.0, 0.0).scale(), Scale::identity());
        let s = dims(0.0, 100.0, 50.0, 50.0).scale();
        assert!((s.scale_x - 1.0).abs() < f64::EPSILON);
        assert!((s.scale_y - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_roundtrip_points() {
        let scales = [
            dims(1920.0, 1080.0, 800.0, 450.0).scale(),
            dims(640.0, 480.0, 1337.0, 999.0).scale(),
            dims(3.0, 7.0, 11.0, 13.0).scale(),
        ];
        let samples = [(0.0, 0.0), (1.0, 1.0), (123.456, 789.012), (1919.0, 1079.5)];
        for s in scales {
            for (x, y) in samples {
                let p = NativePoint::new(x, y);
                let back = s.to_native(&s.to_display(&p));
                assert_eq!(back.id, p.id);
                assert!((back.x - p.x).abs() < 1e-9);
                assert!((back.y - p.y).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_record_normalizes_negative_box() {
        let s = dims(200.0, 200.0, 100.0, 100.0).scale();
        let meta = ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 2.0);
        let rect = Shape::Rectangle(Rectangle::new(meta, BoxGeometry::new(50.0, 50.0, -40.0, -40.0)));
        let record = s.shape_to_record(&rect, 1);
        assert_eq!(record.x, Some(20.0));
        assert_eq!(record.y, Some(20.0));
        assert_eq!(record.width, Some(80.0));
        assert_eq!(record.height, Some(80.0));
    }

    #[test]
    fn test_record_roundtrip_shape() {
        let s = dims(1000.0, 500.0, 250.0, 125.0).scale();
        let mut meta = ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 3.0);
        meta.name = "road".into();
        meta.notes = "wet".into();
        let shape = Shape::Line(Line::new(
            meta,
            vec![DisplayPoint::new(10.0, 10.0), DisplayPoint::new(20.0, 5.0)],
        ));
        let record = s.shape_to_record(&shape, 7);
        assert_eq!(record.at_frame, 7);
        assert_eq!(record.notes.as_deref(), Some("wet"));
        let pts = record.points.as_ref().unwrap();
        assert!((pts[0].x - 40.0).abs() < 1e-9);

        let back = s.record_to_shape(&record).unwrap();
        assert_eq!(back.id(), shape.id());
        let p = &back.points().unwrap()[1];
        assert!((p.x - 20.0).abs() < 1e-9);
        assert!((p.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_incomplete_box_record() {
        let s = Scale::identity();
        let meta = ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 2.0);
        let mut record = s.shape_to_record(
            &Shape::Circle(Circle::new(meta, BoxGeometry::new(0.0, 0.0, 5.0, 5.0))),
            1,
        );
        record.width = None;
        assert!(s.record_to_shape(&record).is_none());
    }

    #[test]
    fn test_rescale_shape_between_scales() {
        let small = dims(1000.0, 1000.0, 500.0, 500.0).scale();
        let large = dims(1000.0, 1000.0, 1000.0, 1000.0).scale();
        let meta = ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 2.0);
        let mut rect = Shape::Rectangle(Rectangle::new(meta, BoxGeometry::new(10.0, 20.0, 30.0, 40.0)));
        small.rescale_shape(&mut rect, &large);
        let b = rect.box_geometry().unwrap();
        assert_eq!((b.x, b.y, b.width, b.height), (20.0, 40.0, 60.0, 80.0));
    }

    #[test]
    fn test_patch_to_native_only_changed_fields() {
        let s = dims(100.0, 100.0, 50.0, 50.0).scale();
        let patch = ShapePatch::with_bounds(BoxGeometry::new(10.0, 10.0, 5.0, 5.0));
        let native = s.patch_to_native(&patch);
        assert_eq!(native.x, Some(20.0));
        assert_eq!(native.width, Some(10.0));
        assert!(native.name.is_none());
        assert!(native.points.is_none());
    }
}
