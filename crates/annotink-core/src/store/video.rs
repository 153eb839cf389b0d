//! Shape store for a video, indexed by frame number.
//!
//! Each frame owns an independent [`ShapeCollection`]; nothing is carried
//! over or interpolated between frames. Frames are created lazily on first
//! write and a frame that was never written reads as empty.

use super::{by_kind, ShapeCollection, ShapeTarget, Tracked};
use crate::history::{Command, History};
use crate::shapes::{
    DisplayPoint, Line, PointId, Polygon, Shape, ShapeId, ShapeKind, ShapePatch, ShapeVariant,
};
use std::collections::BTreeMap;

/// Frame-indexed annotation sets of one video, with a single shared history.
#[derive(Debug, Clone, Default)]
pub struct VideoShapeStore {
    frames: BTreeMap<u32, ShapeCollection>,
    history: History,
}

impl VideoShapeStore {
    pub fn new(history_depth: usize) -> Self {
        Self {
            frames: BTreeMap::new(),
            history: History::new(history_depth),
        }
    }

    fn tracked(&mut self, frame: u32) -> Tracked<'_> {
        Tracked {
            shapes: self.frames.entry(frame).or_default(),
            history: &mut self.history,
            frame: Some(frame),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Shapes of one frame, if that frame was ever written.
    pub fn frame(&self, frame: u32) -> Option<&ShapeCollection> {
        self.frames.get(&frame)
    }

    /// Frame numbers that currently hold at least one shape, ascending.
    pub fn frames(&self) -> impl Iterator<Item = u32> + '_ {
        self.frames
            .iter()
            .filter(|(_, shapes)| !shapes.is_empty())
            .map(|(frame, _)| *frame)
    }

    pub fn set<K: ShapeVariant>(&mut self, frame: u32, shapes: Vec<K>) {
        self.tracked(frame).set(shapes);
    }

    pub fn add<K: ShapeVariant>(&mut self, frame: u32, shape: K) {
        self.tracked(frame).add(shape);
    }

    pub fn update<K: ShapeVariant>(
        &mut self,
        frame: u32,
        id: ShapeId,
        patch: &ShapePatch,
    ) -> Option<K> {
        self.tracked(frame).update(id, patch)
    }

    pub fn delete<K: ShapeVariant>(&mut self, frame: u32, id: ShapeId) -> Option<K> {
        self.tracked(frame).delete(id)
    }

    pub fn get<K: ShapeVariant>(&self, frame: u32, id: ShapeId) -> Option<&K> {
        self.frames.get(&frame)?.get(id)
    }

    /// Shapes of kind `K` at `frame`; empty for a frame never written.
    pub fn at<K: ShapeVariant>(&self, frame: u32) -> &[K] {
        self.frames
            .get(&frame)
            .map(|shapes| K::bucket(shapes).as_slice())
            .unwrap_or(&[])
    }

    /// Shapes of kind `K` across every frame, in ascending frame order.
    pub fn all<'a, K: ShapeVariant + 'a>(&'a self) -> impl Iterator<Item = &'a K> + 'a {
        self.frames.values().flat_map(|shapes| K::bucket(shapes).iter())
    }

    /// Like [`VideoShapeStore::all`], paired with each shape's frame.
    pub fn all_with_frames<'a, K: ShapeVariant + 'a>(
        &'a self,
    ) -> impl Iterator<Item = (u32, &'a K)> + 'a {
        self.frames
            .iter()
            .flat_map(|(frame, shapes)| K::bucket(shapes).iter().map(move |s| (*frame, s)))
    }

    pub fn add_points<K: ShapeVariant>(
        &mut self,
        frame: u32,
        id: ShapeId,
        points: Vec<DisplayPoint>,
    ) -> Option<K> {
        self.tracked(frame).add_points(id, points)
    }

    pub fn delete_point<K: ShapeVariant>(
        &mut self,
        frame: u32,
        id: ShapeId,
        point_id: PointId,
    ) -> Option<K> {
        self.tracked(frame).delete_point(id, point_id)
    }

    pub fn add_points_to_polygon(
        &mut self,
        frame: u32,
        id: ShapeId,
        points: Vec<DisplayPoint>,
    ) -> Option<Polygon> {
        self.add_points(frame, id, points)
    }

    pub fn delete_point_from_polygon(
        &mut self,
        frame: u32,
        id: ShapeId,
        point_id: PointId,
    ) -> Option<Polygon> {
        self.delete_point(frame, id, point_id)
    }

    pub fn add_points_to_line(
        &mut self,
        frame: u32,
        id: ShapeId,
        points: Vec<DisplayPoint>,
    ) -> Option<Line> {
        self.add_points(frame, id, points)
    }

    pub fn delete_point_from_line(
        &mut self,
        frame: u32,
        id: ShapeId,
        point_id: PointId,
    ) -> Option<Line> {
        self.delete_point(frame, id, point_id)
    }

    pub fn update_shape(
        &mut self,
        frame: u32,
        kind: ShapeKind,
        id: ShapeId,
        patch: &ShapePatch,
    ) -> Option<Shape> {
        let tracked = self.tracked(frame);
        by_kind!(kind, tracked.update_any(id, patch))
    }

    pub fn delete_shape(&mut self, frame: u32, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        let tracked = self.tracked(frame);
        by_kind!(kind, tracked.delete_any(id))
    }

    pub fn delete_shape_point(
        &mut self,
        frame: u32,
        kind: ShapeKind,
        id: ShapeId,
        point_id: PointId,
    ) -> Option<Shape> {
        let tracked = self.tracked(frame);
        by_kind!(kind, tracked.delete_point_any(id, point_id))
    }

    pub fn find(&self, frame: u32, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        self.frames.get(&frame)?.find(kind, id)
    }

    /// Total number of shapes across all frames.
    pub fn len(&self) -> usize {
        self.frames.values().map(ShapeCollection::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&mut self) {
        self.frames.clear();
        self.history.clear();
        log::debug!("video store reset");
    }

    /// Populate from persisted shapes without recording history.
    pub fn load(&mut self, frames: BTreeMap<u32, ShapeCollection>) {
        self.frames = frames;
    }

    fn apply(&mut self, command: &Command) {
        match command.frame() {
            Some(frame) => command.apply(self.frames.entry(frame).or_default()),
            None => log::warn!("video history entry without a frame: {}", command.description()),
        }
    }

    /// Undo the latest command, whichever frame it touched.
    pub fn undo(&mut self) -> Option<Command> {
        let inverse = self.history.pop_undo()?.invert();
        self.apply(&inverse);
        Some(inverse)
    }

    pub fn redo(&mut self) -> Option<Command> {
        let command = self.history.pop_redo()?;
        self.apply(&command);
        Some(command)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn insert_untracked(&mut self, frame: u32, shape: Shape) {
        self.frames.entry(frame).or_default().insert_shape(shape);
    }

    pub fn remove_untracked(&mut self, frame: u32, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        self.frames
            .get_mut(&frame)?
            .remove_shape(kind, id)
            .map(|(_, shape)| shape)
    }

    pub fn replace_untracked(&mut self, frame: u32, shape: Shape) -> Option<Shape> {
        self.frames.get_mut(&frame)?.replace_shape(shape)
    }

    pub fn record(&mut self, command: Command) {
        self.history.push(command);
    }

    pub fn map_shapes(&mut self, mut f: impl FnMut(&mut Shape)) {
        for shapes in self.frames.values_mut() {
            shapes.for_each_mut(&mut f);
        }
        self.history.map_shapes(f);
    }

    /// Borrow the store as a [`ShapeTarget`] bound to one frame.
    pub fn frame_view(&mut self, frame: u32) -> FrameView<'_> {
        FrameView { store: self, frame }
    }
}

/// A video store seen through a single frame.
#[derive(Debug)]
pub struct FrameView<'a> {
    store: &'a mut VideoShapeStore,
    frame: u32,
}

impl ShapeTarget for FrameView<'_> {
    fn frame(&self) -> Option<u32> {
        Some(self.frame)
    }

    fn find(&self, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        self.store.find(self.frame, kind, id)
    }

    fn position(&self, kind: ShapeKind, id: ShapeId) -> Option<usize> {
        self.store.frames.get(&self.frame)?.position(kind, id)
    }

    fn insert(&mut self, shape: Shape) {
        self.store.insert_untracked(self.frame, shape);
    }

    fn remove(&mut self, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        self.store.remove_untracked(self.frame, kind, id)
    }

    fn patch(&mut self, kind: ShapeKind, id: ShapeId, patch: &ShapePatch) -> Option<Shape> {
        self.store
            .frames
            .get_mut(&self.frame)?
            .patch_shape(kind, id, patch)
    }

    fn append_point(&mut self, kind: ShapeKind, id: ShapeId, point: DisplayPoint) -> bool {
        self.store
            .frames
            .get_mut(&self.frame)
            .is_some_and(|shapes| shapes.append_point(kind, id, point))
    }

    fn record(&mut self, command: Command) {
        self.store.record(command);
    }
}
