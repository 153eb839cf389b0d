//! Face landmark shape.

use super::{DisplayPoint, Shape, ShapeKind, ShapeMeta, ShapePatch, ShapeVariant};
use crate::store::ShapeCollection;
use serde::{Deserialize, Serialize};

/// A landmark mesh. The engine treats the vertices as an opaque list and does
/// not check their count or layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub meta: ShapeMeta,
    pub points: Vec<DisplayPoint>,
}

impl Face {
    pub fn new(meta: ShapeMeta, points: Vec<DisplayPoint>) -> Self {
        Self { meta, points }
    }
}

impl ShapeVariant for Face {
    const KIND: ShapeKind = ShapeKind::Face;

    fn meta(&self) -> &ShapeMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ShapeMeta {
        &mut self.meta
    }

    fn bucket(collection: &ShapeCollection) -> &Vec<Self> {
        &collection.faces
    }

    fn bucket_mut(collection: &mut ShapeCollection) -> &mut Vec<Self> {
        &mut collection.faces
    }

    fn from_shape(shape: Shape) -> Option<Self> {
        match shape {
            Shape::Face(f) => Some(f),
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

impl From<Face> for Shape {
    fn from(face: Face) -> Self {
        Shape::Face(face)
    }
}
