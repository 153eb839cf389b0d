//! Shape stores for still images and frame-indexed video.
//!
//! Both stores keep shapes in display space and own a bounded [`History`].
//! Tracked operations record a [`Command`]; the `*_untracked` operations and
//! the [`ShapeTarget`] seam exist for drawing-in-progress edits that must
//! never be undoable.

mod collection;
mod image;
mod video;

pub use collection::ShapeCollection;
pub(crate) use collection::by_kind;
pub use image::ImageShapeStore;
pub use video::{FrameView, VideoShapeStore};

use crate::history::{Command, History};
use crate::shapes::{
    remove_point, DisplayPoint, PointId, Shape, ShapeId, ShapeKind, ShapePatch, ShapeVariant,
};

/// What the drawing state machine needs from a store: untracked edits of the
/// shape being drawn, plus a way to record the finished result.
pub trait ShapeTarget {
    /// Frame the target is bound to (`None` for still images).
    fn frame(&self) -> Option<u32>;

    fn find(&self, kind: ShapeKind, id: ShapeId) -> Option<Shape>;

    fn position(&self, kind: ShapeKind, id: ShapeId) -> Option<usize>;

    fn insert(&mut self, shape: Shape);

    fn remove(&mut self, kind: ShapeKind, id: ShapeId) -> Option<Shape>;

    fn patch(&mut self, kind: ShapeKind, id: ShapeId, patch: &ShapePatch) -> Option<Shape>;

    fn append_point(&mut self, kind: ShapeKind, id: ShapeId, point: DisplayPoint) -> bool;

    /// Push a command onto the store's history without applying it.
    fn record(&mut self, command: Command);
}

/// History-recording mutations of one collection.
pub(crate) struct Tracked<'a> {
    pub(crate) shapes: &'a mut ShapeCollection,
    pub(crate) history: &'a mut History,
    pub(crate) frame: Option<u32>,
}

impl Tracked<'_> {
    pub(crate) fn set<K: ShapeVariant>(self, shapes: Vec<K>) {
        let after: Vec<Shape> = shapes.into_iter().map(Into::into).collect();
        let before = self.shapes.replace_bucket(K::KIND, after.clone());
        if before != after {
            self.history.push(Command::ReplaceBucket {
                frame: self.frame,
                kind: K::KIND,
                before,
                after,
            });
        }
    }

    pub(crate) fn add<K: ShapeVariant>(self, shape: K) {
        let index = K::bucket(self.shapes).len();
        let shape: Shape = shape.into();
        self.shapes.insert_at(index, shape.clone());
        self.history.push(Command::Insert {
            frame: self.frame,
            index,
            shape,
        });
    }

    pub(crate) fn update<K: ShapeVariant>(self, id: ShapeId, patch: &ShapePatch) -> Option<K> {
        let slot = self.shapes.get_mut::<K>(id)?;
        let before: Shape = slot.clone().into();
        slot.apply_patch(patch);
        let after = slot.clone();
        let after_shape: Shape = after.clone().into();
        if before != after_shape {
            self.history.push(Command::Replace {
                frame: self.frame,
                before,
                after: after_shape,
            });
        }
        Some(after)
    }

    pub(crate) fn delete<K: ShapeVariant>(self, id: ShapeId) -> Option<K> {
        let index = self.shapes.index_of::<K>(id)?;
        let removed = K::bucket_mut(self.shapes).remove(index);
        self.history.push(Command::Remove {
            frame: self.frame,
            index,
            shape: removed.clone().into(),
        });
        Some(removed)
    }

    pub(crate) fn add_points<K: ShapeVariant>(
        self,
        id: ShapeId,
        points: Vec<DisplayPoint>,
    ) -> Option<K> {
        let slot = self.shapes.get_mut::<K>(id)?;
        let before: Shape = slot.clone().into();
        let list = slot.points_mut()?;
        if points.is_empty() {
            return Some(slot.clone());
        }
        list.extend(points);
        let after = slot.clone();
        self.history.push(Command::Replace {
            frame: self.frame,
            before,
            after: after.clone().into(),
        });
        Some(after)
    }

    pub(crate) fn delete_point<K: ShapeVariant>(self, id: ShapeId, point_id: PointId) -> Option<K> {
        let slot = self.shapes.get_mut::<K>(id)?;
        let before: Shape = slot.clone().into();
        if !remove_point(slot.points_mut()?, point_id) {
            return None;
        }
        let after = slot.clone();
        self.history.push(Command::Replace {
            frame: self.frame,
            before,
            after: after.clone().into(),
        });
        Some(after)
    }

    pub(crate) fn update_any<K: ShapeVariant>(self, id: ShapeId, patch: &ShapePatch) -> Option<Shape> {
        self.update::<K>(id, patch).map(Into::into)
    }

    pub(crate) fn delete_any<K: ShapeVariant>(self, id: ShapeId) -> Option<Shape> {
        self.delete::<K>(id).map(Into::into)
    }

    pub(crate) fn delete_point_any<K: ShapeVariant>(
        self,
        id: ShapeId,
        point_id: PointId,
    ) -> Option<Shape> {
        self.delete_point::<K>(id, point_id).map(Into::into)
    }
}
