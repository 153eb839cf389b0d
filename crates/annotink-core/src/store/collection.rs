//! The five per-kind shape arrays that make up one annotation set.

use crate::shapes::{
    Circle, DisplayPoint, Face, Line, Polygon, Rectangle, Shape, ShapeId, ShapeKind, ShapePatch,
    ShapeVariant,
};
use serde::{Deserialize, Serialize};

/// Run a generic `ShapeCollection` method for the concrete type of `kind`.
macro_rules! by_kind {
    ($kind:expr, $self:ident . $method:ident ( $($arg:expr),* )) => {
        match $kind {
            $crate::shapes::ShapeKind::Polygon => $self.$method::<$crate::shapes::Polygon>($($arg),*),
            $crate::shapes::ShapeKind::Rectangle => {
                $self.$method::<$crate::shapes::Rectangle>($($arg),*)
            }
            $crate::shapes::ShapeKind::Circle => $self.$method::<$crate::shapes::Circle>($($arg),*),
            $crate::shapes::ShapeKind::Face => $self.$method::<$crate::shapes::Face>($($arg),*),
            $crate::shapes::ShapeKind::Line => $self.$method::<$crate::shapes::Line>($($arg),*),
        }
    };
}

pub(crate) use by_kind;

/// One annotation set: an image, or a single frame of a video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeCollection {
    #[serde(default)]
    pub polygons: Vec<Polygon>,
    #[serde(default)]
    pub rectangles: Vec<Rectangle>,
    #[serde(default)]
    pub circles: Vec<Circle>,
    #[serde(default)]
    pub faces: Vec<Face>,
    #[serde(default)]
    pub lines: Vec<Line>,
}

impl ShapeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from shapes of any kind, in order.
    pub fn from_shapes(shapes: impl IntoIterator<Item = Shape>) -> Self {
        let mut collection = Self::new();
        for shape in shapes {
            collection.insert_shape(shape);
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
            + self.rectangles.len()
            + self.circles.len()
            + self.faces.len()
            + self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get<K: ShapeVariant>(&self, id: ShapeId) -> Option<&K> {
        K::bucket(self).iter().find(|s| s.id() == id)
    }

    pub fn get_mut<K: ShapeVariant>(&mut self, id: ShapeId) -> Option<&mut K> {
        K::bucket_mut(self).iter_mut().find(|s| s.id() == id)
    }

    pub fn index_of<K: ShapeVariant>(&self, id: ShapeId) -> Option<usize> {
        K::bucket(self).iter().position(|s| s.id() == id)
    }

    /// Position of a shape within its kind's array.
    pub fn position(&self, kind: ShapeKind, id: ShapeId) -> Option<usize> {
        by_kind!(kind, self.index_of(id))
    }

    fn find_in<K: ShapeVariant>(&self, id: ShapeId) -> Option<Shape> {
        self.get::<K>(id).cloned().map(Into::into)
    }

    /// Owned copy of a shape, looked up by kind and id.
    pub fn find(&self, kind: ShapeKind, id: ShapeId) -> Option<Shape> {
        by_kind!(kind, self.find_in(id))
    }

    /// Look up a shape when its kind is not known.
    pub fn find_any(&self, id: ShapeId) -> Option<Shape> {
        ShapeKind::ALL.into_iter().find_map(|kind| self.find(kind, id))
    }

    pub fn contains(&self, kind: ShapeKind, id: ShapeId) -> bool {
        self.position(kind, id).is_some()
    }

    /// Append a shape to its kind's array.
    pub fn insert_shape(&mut self, shape: Shape) {
        self.insert_at(usize::MAX, shape);
    }

    /// Insert a shape at `index` of its kind's array, clamped to the end.
    pub fn insert_at(&mut self, index: usize, shape: Shape) {
        fn put<K>(bucket: &mut Vec<K>, index: usize, value: K) {
            let index = index.min(bucket.len());
            bucket.insert(index, value);
        }
        match shape {
            Shape::Polygon(s) => put(&mut self.polygons, index, s),
            Shape::Rectangle(s) => put(&mut self.rectangles, index, s),
            Shape::Circle(s) => put(&mut self.circles, index, s),
            Shape::Face(s) => put(&mut self.faces, index, s),
            Shape::Line(s) => put(&mut self.lines, index, s),
        }
    }

    fn remove_from<K: ShapeVariant>(&mut self, id: ShapeId) -> Option<(usize, Shape)> {
        let bucket = K::bucket_mut(self);
        let index = bucket.iter().position(|s| s.id() == id)?;
        Some((index, bucket.remove(index).into()))
    }

    /// Remove a shape, returning where it was and what it was.
    pub fn remove_shape(&mut self, kind: ShapeKind, id: ShapeId) -> Option<(usize, Shape)> {
        by_kind!(kind, self.remove_from(id))
    }

    /// Swap in a new version of an existing shape (matched by id and kind).
    /// Returns the previous version, or `None` if there was nothing to replace.
    pub fn replace_shape(&mut self, shape: Shape) -> Option<Shape> {
        fn swap<K: ShapeVariant>(bucket: &mut [K], value: K) -> Option<Shape> {
            let slot = bucket.iter_mut().find(|s| s.id() == value.id())?;
            Some(std::mem::replace(slot, value).into())
        }
        match shape {
            Shape::Polygon(s) => swap(&mut self.polygons, s),
            Shape::Rectangle(s) => swap(&mut self.rectangles, s),
            Shape::Circle(s) => swap(&mut self.circles, s),
            Shape::Face(s) => swap(&mut self.faces, s),
            Shape::Line(s) => swap(&mut self.lines, s),
        }
    }

    fn patch_in<K: ShapeVariant>(&mut self, id: ShapeId, patch: &ShapePatch) -> Option<Shape> {
        let shape = self.get_mut::<K>(id)?;
        shape.apply_patch(patch);
        Some(shape.clone().into())
    }

    /// Merge a patch into a shape in place and return the merged shape.
    pub fn patch_shape(&mut self, kind: ShapeKind, id: ShapeId, patch: &ShapePatch) -> Option<Shape> {
        by_kind!(kind, self.patch_in(id, patch))
    }

    fn append_to<K: ShapeVariant>(&mut self, id: ShapeId, point: DisplayPoint) -> bool {
        match self.get_mut::<K>(id).and_then(|s| s.points_mut()) {
            Some(points) => {
                points.push(point);
                true
            }
            None => false,
        }
    }

    /// Push one vertex onto a point-list shape.
    pub fn append_point(&mut self, kind: ShapeKind, id: ShapeId, point: DisplayPoint) -> bool {
        by_kind!(kind, self.append_to(id, point))
    }

    fn swap_bucket<K: ShapeVariant>(&mut self, shapes: Vec<Shape>) -> Vec<Shape> {
        let next: Vec<K> = shapes.into_iter().filter_map(K::from_shape).collect();
        std::mem::replace(K::bucket_mut(self), next)
            .into_iter()
            .map(Into::into)
            .collect()
    }

    /// Replace one kind's whole array, returning the old contents. Shapes of
    /// another kind in `shapes` are dropped.
    pub fn replace_bucket(&mut self, kind: ShapeKind, shapes: Vec<Shape>) -> Vec<Shape> {
        by_kind!(kind, self.swap_bucket(shapes))
    }

    fn bucket_of<K: ShapeVariant>(&self) -> Vec<Shape> {
        K::bucket(self).iter().cloned().map(Into::into).collect()
    }

    /// Owned copies of one kind's array.
    pub fn bucket_shapes(&self, kind: ShapeKind) -> Vec<Shape> {
        by_kind!(kind, self.bucket_of())
    }

    /// Every shape, kinds in [`ShapeKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = Shape> + '_ {
        ShapeKind::ALL
            .into_iter()
            .flat_map(move |kind| self.bucket_shapes(kind))
    }

    /// Mutate every shape in place.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut Shape)) {
        for kind in ShapeKind::ALL {
            let mut shapes = self.bucket_shapes(kind);
            shapes.iter_mut().for_each(&mut f);
            self.replace_bucket(kind, shapes);
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileContext;
    use crate::shapes::{BoxGeometry, ShapeMeta, StrokeColor};

    fn meta() -> ShapeMeta {
        ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 2.0)
    }

    fn rect(x: f64) -> Shape {
        Rectangle::new(meta(), BoxGeometry::new(x, 0.0, 10.0, 10.0)).into()
    }

    fn line() -> Shape {
        Line::new(meta(), vec![DisplayPoint::new(0.0, 0.0)]).into()
    }

    #[test]
    fn test_insert_routes_by_kind() {
        let mut c = ShapeCollection::new();
        c.insert_shape(rect(0.0));
        c.insert_shape(line());
        assert_eq!(c.rectangles.len(), 1);
        assert_eq!(c.lines.len(), 1);
        assert_eq!(c.len(), 2);
        assert_eq!(c.iter().count(), 2);
    }

    #[test]
    fn test_remove_and_reinsert_keeps_position() {
        let shapes = [rect(0.0), rect(1.0), rect(2.0)];
        let mut c = ShapeCollection::from_shapes(shapes.clone());
        let middle = shapes[1].id();

        let (index, removed) = c.remove_shape(ShapeKind::Rectangle, middle).unwrap();
        assert_eq!(index, 1);
        assert_eq!(c.rectangles.len(), 2);

        c.insert_at(index, removed);
        assert_eq!(c.position(ShapeKind::Rectangle, middle), Some(1));
    }

    #[test]
    fn test_missing_ids_are_none() {
        let mut c = ShapeCollection::from_shapes([rect(0.0)]);
        let id = uuid::Uuid::new_v4();
        assert!(c.find(ShapeKind::Rectangle, id).is_none());
        assert!(c.remove_shape(ShapeKind::Rectangle, id).is_none());
        assert!(c.replace_shape(rect(5.0)).is_none());
        assert!(!c.append_point(ShapeKind::Line, id, DisplayPoint::new(1.0, 1.0)));
    }

    #[test]
    fn test_wrong_kind_lookup() {
        let shape = rect(0.0);
        let c = ShapeCollection::from_shapes([shape.clone()]);
        assert!(c.find(ShapeKind::Circle, shape.id()).is_none());
        assert_eq!(c.find_any(shape.id()), Some(shape));
    }

    #[test]
    fn test_append_point_only_for_point_kinds() {
        let l = line();
        let r = rect(0.0);
        let mut c = ShapeCollection::from_shapes([l.clone(), r.clone()]);
        assert!(c.append_point(ShapeKind::Line, l.id(), DisplayPoint::new(5.0, 5.0)));
        assert_eq!(c.lines[0].points.len(), 2);
        assert!(!c.append_point(ShapeKind::Rectangle, r.id(), DisplayPoint::new(5.0, 5.0)));
    }

    #[test]
    fn test_replace_bucket() {
        let mut c = ShapeCollection::from_shapes([rect(0.0), line()]);
        let old = c.replace_bucket(ShapeKind::Rectangle, vec![rect(1.0), rect(2.0), line()]);
        assert_eq!(old.len(), 1);
        assert_eq!(c.rectangles.len(), 2);
        // The stray line was dropped, the existing line untouched.
        assert_eq!(c.lines.len(), 1);
    }
}
