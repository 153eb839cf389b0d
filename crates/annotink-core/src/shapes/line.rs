//! Polyline shape.

use super::{DisplayPoint, Shape, ShapeKind, ShapeMeta, ShapePatch, ShapeVariant};
use crate::store::ShapeCollection;
use serde::{Deserialize, Serialize};

/// An open polyline through ordered vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub meta: ShapeMeta,
    pub points: Vec<DisplayPoint>,
}

impl Line {
    pub fn new(meta: ShapeMeta, points: Vec<DisplayPoint>) -> Self {
        Self { meta, points }
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() >= ShapeKind::Line.min_points()
    }

    /// Total length of all segments.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }
}

impl ShapeVariant for Line {
    const KIND: ShapeKind = ShapeKind::Line;

    fn meta(&self) -> &ShapeMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ShapeMeta {
        &mut self.meta
    }

    fn bucket(collection: &ShapeCollection) -> &Vec<Self> {
        &collection.lines
    }

    fn bucket_mut(collection: &mut ShapeCollection) -> &mut Vec<Self> {
        &mut collection.lines
    }

    fn from_shape(shape: Shape) -> Option<Self> {
        match shape {
            Shape::Line(l) => Some(l),
            _ => None,
        }
    }

    fn apply_patch(&mut self, patch: &ShapePatch) {
        self.meta.apply_patch(patch);
        if let Some(points) = &patch.points {
            self.points = points.clone();
        }
    }

    fn points_mut(&mut self) -> Option<&mut Vec<DisplayPoint>> {
        Some(&mut self.points)
    }
}

impl From<Line> for Shape {
    fn from(line: Line) -> Self {
        Shape::Line(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileContext;
    use crate::shapes::StrokeColor;

    #[test]
    fn test_length() {
        let meta = ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 2.0);
        let line = Line::new(
            meta,
            vec![
                DisplayPoint::new(0.0, 0.0),
                DisplayPoint::new(3.0, 4.0),
                DisplayPoint::new(3.0, 10.0),
            ],
        );
        assert!((line.length() - 11.0).abs() < 1e-9);
        assert!(line.is_complete());
    }
}
