//! Shape store for a single still image.

use super::{by_kind, ShapeCollection, ShapeTarget, Tracked};
use crate::history::{Command, History};
use crate::shapes::{
    DisplayPoint, Line, PointId, Polygon, Shape, ShapeId, ShapeKind, ShapePatch, ShapeVariant,
};

/// Flat annotation set of one image, with undo/redo.
#[derive(Debug, Clone, Default)]
pub struct ImageShapeStore {
    shapes: ShapeCollection,
    history: History,
}

impl ImageShapeStore {
    pub fn new(history_depth: usize) -> Self {
        Self {
            shapes: ShapeCollection::new(),
            history: History::new(history_depth),
        }
    }

    fn tracked(&mut self) -> Tracked<'_> {
        Tracked {
            shapes: &mut self.shapes,
            history: &mut self.history,
            frame: None,
        }
    }

    pub fn shapes(&self) -> &ShapeCollection {
        &self.shapes
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Replace all shapes of kind `K`. Setting the same contents twice
    /// records nothing the second time.
    pub fn set<K: ShapeVariant>(&mut self, shapes: Vec<K>) {
        self.tracked().set(shapes);
    }

    pub fn add<K: ShapeVariant>(&mut self, shape: K) {
        self.tracked().add(shape);
    }

    /// Merge `patch` into a shape and return the merged result, or `None`
    /// when no shape of kind `K` has that id.
    pub fn update<K: ShapeVariant>(&mut self, id: ShapeId, patch: &ShapePatch) -> Option<K> {
        self.tracked().update(id, patch)
    }

    pub fn delete<K: ShapeVariant>(&mut self, id: ShapeId) -> Option<K> {
        self.tracked().delete(id)
    }

    pub fn get<K: ShapeVariant>(&self, id: ShapeId) -> Option<&K> {
        self.shapes.get(id)
    }

    pub fn all<K: ShapeVariant>(&self) -> &[K] {
        K::bucket(&self.shapes)
    }

    /// Append vertices to a polygon, line or face.
    pub fn add_points<K: ShapeVariant>(
        &mut self,
        id: ShapeId,
        points: Vec<DisplayPoint>,
    ) -> Option<K> {
        self.tracked().add_points(id, points)
    }

    /// Remove one vertex. `None` if either id is unknown.
    pub fn delete_point<K: ShapeVariant>(&mut self, id: ShapeId, point_id: PointId) -> Option<K> {
        self.tracked().delete_point(id, point_id)
    }

    pub fn add_points_to_polygon(
        &mut self,
        id: ShapeId,
        points: Vec<DisplayPoint>,
    ) -> Option<Polygon> {
        self.add_points(id, points)
    }

    pub fn delete_point_from_polygon(&mut self, id: ShapeId, point_id: PointId) -> Option<Polygon> {
        self.delete_point(id, point_id)
    }

    pub fn add_points_to_line(&mut self, id: ShapeId, points: Vec<DisplayPoint>) -> Option<Line> {
        self.add_points(id, points)
    }

    pub fn delete_point_from_line(&mut self, id: ShapeId, point_id: PointId) -> Option<Line> {
        self.delete_point(id, point_id)
    }

    /// Kind-dispatched [`ImageShapeStore::update`].
    pub fn update_shape(
        &mut self,
        kind: ShapeKind,
        id: ShapeId,
        patch: &ShapePatch,
    ) -> Option<Shape> {
        let tracked = self.tracked();
        by_kind!(kind, tracked.update_any(id, patch))
    }

    /// Kind-dispatched [`ImageShapeStore::delete`].
    pub fn delete_shape(&mut self, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        let tracked = self.tracked();
        by_kind!(kind, tracked.delete_any(id))
    }

    /// Kind-dispatched [`ImageShapeStore::delete_point`].
    pub fn delete_shape_point(
        &mut self,
        kind: ShapeKind,
        id: ShapeId,
        point_id: PointId,
    ) -> Option<Shape> {
        let tracked = self.tracked();
        by_kind!(kind, tracked.delete_point_any(id, point_id))
    }

    pub fn find(&self, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        self.shapes.find(kind, id)
    }

    /// Drop every shape and the history (file switch).
    pub fn reset(&mut self) {
        self.shapes.clear();
        self.history.clear();
        log::debug!("image store reset");
    }

    /// Populate from persisted shapes without recording history.
    pub fn load(&mut self, shapes: ShapeCollection) {
        self.shapes = shapes;
    }

    /// Undo the latest command. Returns the command that was applied to
    /// the shapes (the inverse of the recorded one).
    pub fn undo(&mut self) -> Option<Command> {
        let inverse = self.history.pop_undo()?.invert();
        inverse.apply(&mut self.shapes);
        Some(inverse)
    }

    pub fn redo(&mut self) -> Option<Command> {
        let command = self.history.pop_redo()?;
        command.apply(&mut self.shapes);
        Some(command)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn insert_untracked(&mut self, shape: Shape) {
        self.shapes.insert_shape(shape);
    }

    pub fn remove_untracked(&mut self, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        self.shapes.remove_shape(kind, id).map(|(_, shape)| shape)
    }

    pub fn replace_untracked(&mut self, shape: Shape) -> Option<Shape> {
        self.shapes.replace_shape(shape)
    }

    pub fn record(&mut self, command: Command) {
        self.history.push(command);
    }

    /// Rewrite every shape, including the ones held by history.
    pub fn map_shapes(&mut self, mut f: impl FnMut(&mut Shape)) {
        self.shapes.for_each_mut(&mut f);
        self.history.map_shapes(f);
    }
}

impl ShapeTarget for ImageShapeStore {
    fn frame(&self) -> Option<u32> {
        None
    }

    fn find(&self, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        self.shapes.find(kind, id)
    }

    fn position(&self, kind: ShapeKind, id: ShapeId) -> Option<usize> {
        self.shapes.position(kind, id)
    }

    fn insert(&mut self, shape: Shape) {
        self.insert_untracked(shape);
    }

    fn remove(&mut self, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        self.remove_untracked(kind, id)
    }

    fn patch(&mut self, kind: ShapeKind, id: ShapeId, patch: &ShapePatch) -> Option<Shape> {
        self.shapes.patch_shape(kind, id, patch)
    }

    fn append_point(&mut self, kind: ShapeKind, id: ShapeId, point: DisplayPoint) -> bool {
        self.shapes.append_point(kind, id, point)
    }

    fn record(&mut self, command: Command) {
        self.history.push(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileContext;
    use crate::shapes::{BoxGeometry, Rectangle, ShapeMeta, StrokeColor};

    fn meta() -> ShapeMeta {
        ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 2.0)
    }

    fn rect(x: f64) -> Rectangle {
        Rectangle::new(meta(), BoxGeometry::new(x, 0.0, 10.0, 10.0))
    }

    fn triangle() -> Polygon {
        Polygon::new(
            meta(),
            vec![
                DisplayPoint::new(0.0, 0.0),
                DisplayPoint::new(10.0, 0.0),
                DisplayPoint::new(5.0, 8.0),
            ],
        )
    }

    #[test]
    fn test_update_returns_merged_shape() {
        let mut store = ImageShapeStore::new(10);
        let r = rect(0.0);
        let id = r.meta.id;
        store.add(r);

        let patch = ShapePatch {
            name: Some("car".into()),
            ..ShapePatch::default()
        };
        let merged: Rectangle = store.update(id, &patch).unwrap();
        assert_eq!(merged.meta.name, "car");
        assert_eq!(store.get::<Rectangle>(id).unwrap().meta.name, "car");
    }

    #[test]
    fn test_missing_ids_are_noops() {
        let mut store = ImageShapeStore::new(10);
        store.add(triangle());
        let ghost = uuid::Uuid::new_v4();
        assert!(store.update::<Rectangle>(ghost, &ShapePatch::default()).is_none());
        assert!(store.delete::<Polygon>(ghost).is_none());
        assert!(store.add_points_to_polygon(ghost, vec![DisplayPoint::new(1.0, 1.0)]).is_none());
        assert!(store.delete_point_from_line(ghost, ghost).is_none());
        // Only the add was recorded.
        assert_eq!(store.history().undo_len(), 1);
    }

    #[test]
    fn test_point_ops() {
        let mut store = ImageShapeStore::new(10);
        let poly = triangle();
        let id = poly.meta.id;
        let second = poly.points[1].id;
        store.add(poly);

        let grown = store
            .add_points_to_polygon(id, vec![DisplayPoint::new(1.0, 9.0)])
            .unwrap();
        assert_eq!(grown.points.len(), 4);

        let shrunk = store.delete_point_from_polygon(id, second).unwrap();
        assert_eq!(shrunk.points.len(), 3);
        assert!(shrunk.points.iter().all(|p| p.id != second));
        assert!(store.delete_point_from_polygon(id, second).is_none());
    }

    #[test]
    fn test_set_empty_is_idempotent() {
        let mut store = ImageShapeStore::new(10);
        store.add(rect(0.0));
        store.set::<Rectangle>(Vec::new());
        store.set::<Rectangle>(Vec::new());
        assert!(store.all::<Rectangle>().is_empty());
        assert_eq!(store.history().undo_len(), 2);
    }

    #[test]
    fn test_undo_bound_after_twelve_adds() {
        let mut store = ImageShapeStore::new(10);
        for i in 0..12 {
            store.add(rect(i as f64));
        }
        let mut undone = 0;
        while store.undo().is_some() {
            undone += 1;
        }
        assert_eq!(undone, 10);
        assert_eq!(store.all::<Rectangle>().len(), 2);
    }

    #[test]
    fn test_undo_redo_delete_restores_position() {
        let mut store = ImageShapeStore::new(10);
        let shapes: Vec<Rectangle> = (0..3).map(|i| rect(i as f64)).collect();
        let middle = shapes[1].meta.id;
        store.set(shapes);
        store.delete::<Rectangle>(middle);

        let applied = store.undo().unwrap();
        assert!(matches!(applied, Command::Insert { index: 1, .. }));
        assert_eq!(store.all::<Rectangle>()[1].meta.id, middle);

        store.redo();
        assert!(store.get::<Rectangle>(middle).is_none());
    }

    #[test]
    fn test_untracked_edits_skip_history() {
        let mut store = ImageShapeStore::new(10);
        let r = rect(0.0);
        let id = r.meta.id;
        store.insert_untracked(r.into());
        assert!(!store.can_undo());
        assert!(store.remove_untracked(ShapeKind::Rectangle, id).is_some());
        assert!(!store.can_undo());
    }

    #[test]
    fn test_reset_clears_history() {
        let mut store = ImageShapeStore::new(10);
        store.add(rect(0.0));
        store.reset();
        assert!(store.shapes().is_empty());
        assert!(!store.can_undo());
        assert!(store.undo().is_none());
    }
}
