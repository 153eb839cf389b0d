//! Polygon shape.

use super::{DisplayPoint, Shape, ShapeKind, ShapeMeta, ShapePatch, ShapeVariant};
use crate::store::ShapeCollection;
use serde::{Deserialize, Serialize};

/// A closed ring of vertices. The closing edge from the last vertex back to
/// the first is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub meta: ShapeMeta,
    pub points: Vec<DisplayPoint>,
}

impl Polygon {
    pub fn new(meta: ShapeMeta, points: Vec<DisplayPoint>) -> Self {
        Self { meta, points }
    }

    /// Enough vertices to be persisted.
    pub fn is_complete(&self) -> bool {
        self.points.len() >= ShapeKind::Polygon.min_points()
    }

    /// Signed-area magnitude (shoelace formula).
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: f64 = (0..n)
            .map(|i| {
                let a = &self.points[i];
                let b = &self.points[(i + 1) % n];
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice.abs() / 2.0
    }
}

impl ShapeVariant for Polygon {
    const KIND: ShapeKind = ShapeKind::Polygon;

    fn meta(&self) -> &ShapeMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ShapeMeta {
        &mut self.meta
    }

    fn bucket(collection: &ShapeCollection) -> &Vec<Self> {
        &collection.polygons
    }

    fn bucket_mut(collection: &mut ShapeCollection) -> &mut Vec<Self> {
        &mut collection.polygons
    }

    fn from_shape(shape: Shape) -> Option<Self> {
        match shape {
            Shape::Polygon(p) => Some(p),
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

impl From<Polygon> for Shape {
    fn from(polygon: Polygon) -> Self {
        Shape::Polygon(polygon)
    }
}
