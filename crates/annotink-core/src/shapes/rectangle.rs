//! Rectangle shape.

use super::{BoxGeometry, Display, DisplayPoint, Shape, ShapeKind, ShapeMeta, ShapePatch, ShapeVariant};
use crate::store::ShapeCollection;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub meta: ShapeMeta,
    pub bounds: BoxGeometry<Display>,
}

impl Rectangle {
    pub fn new(meta: ShapeMeta, bounds: BoxGeometry<Display>) -> Self {
        Self { meta, bounds }
    }

    /// Zero-size rectangle anchored at a point, as created on mouse-down.
    pub fn anchored(meta: ShapeMeta, anchor: &DisplayPoint) -> Self {
        Self::new(meta, BoxGeometry::at(anchor))
    }

    pub fn hit_test(&self, point: &DisplayPoint, tolerance: f64) -> bool {
        self.bounds
            .as_rect()
            .abs()
            .inflate(tolerance, tolerance)
            .contains(point.to_kurbo())
    }
}

impl ShapeVariant for Rectangle {
    const KIND: ShapeKind = ShapeKind::Rectangle;

    fn meta(&self) -> &ShapeMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ShapeMeta {
        &mut self.meta
    }

    fn bucket(collection: &ShapeCollection) -> &Vec<Self> {
        &collection.rectangles
    }

    fn bucket_mut(collection: &mut ShapeCollection) -> &mut Vec<Self> {
        &mut collection.rectangles
    }

    fn from_shape(shape: Shape) -> Option<Self> {
        match shape {
            Shape::Rectangle(r) => Some(r),
            _ => None,
        }
    }

    fn apply_patch(&mut self, patch: &ShapePatch) {
        self.meta.apply_patch(patch);
        if let Some(bounds) = patch.bounds {
            self.bounds = bounds;
        }
    }
}

impl From<Rectangle> for Shape {
    fn from(rect: Rectangle) -> Self {
        Shape::Rectangle(rect)
    }
}
