//! Circle shape.

use super::{BoxGeometry, Display, DisplayPoint, Shape, ShapeKind, ShapeMeta, ShapePatch, ShapeVariant};
use crate::store::ShapeCollection;
use kurbo::Ellipse as KurboEllipse;
use serde::{Deserialize, Serialize};

/// A "circle" annotation: geometrically the ellipse inscribed in its box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub meta: ShapeMeta,
    pub bounds: BoxGeometry<Display>,
}

impl Circle {
    pub fn new(meta: ShapeMeta, bounds: BoxGeometry<Display>) -> Self {
        Self { meta, bounds }
    }

    pub fn anchored(meta: ShapeMeta, anchor: &DisplayPoint) -> Self {
        Self::new(meta, BoxGeometry::at(anchor))
    }

    /// Get as a kurbo Ellipse.
    pub fn as_kurbo(&self) -> KurboEllipse {
        KurboEllipse::from_rect(self.bounds.as_rect().abs())
    }

    /// Horizontal and vertical radii.
    pub fn radii(&self) -> (f64, f64) {
        (self.bounds.width.abs() / 2.0, self.bounds.height.abs() / 2.0)
    }

    pub fn contains(&self, point: &DisplayPoint) -> bool {
        let (rx, ry) = self.radii();
        if rx == 0.0 || ry == 0.0 {
            return false;
        }
        let center = self.bounds.as_rect().abs().center();
        let nx = (point.x - center.x) / rx;
        let ny = (point.y - center.y) / ry;
        nx * nx + ny * ny <= 1.0
    }
}

impl ShapeVariant for Circle {
    const KIND: ShapeKind = ShapeKind::Circle;

    fn meta(&self) -> &ShapeMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ShapeMeta {
        &mut self.meta
    }

    fn bucket(collection: &ShapeCollection) -> &Vec<Self> {
        &collection.circles
    }

    fn bucket_mut(collection: &mut ShapeCollection) -> &mut Vec<Self> {
        &mut collection.circles
    }

    fn from_shape(shape: Shape) -> Option<Self> {
        match shape {
            Shape::Circle(c) => Some(c),
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

impl From<Circle> for Shape {
    fn from(circle: Circle) -> Self {
        Shape::Circle(circle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileContext;
    use crate::shapes::StrokeColor;

    #[test]
    fn test_ellipse_containment() {
        let meta = ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 2.0);
        let circle = Circle::new(meta, BoxGeometry::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(circle.radii(), (50.0, 25.0));
        assert!(circle.contains(&DisplayPoint::new(50.0, 25.0)));
        assert!(circle.contains(&DisplayPoint::new(95.0, 25.0)));
        // Inside the box but outside the inscribed ellipse.
        assert!(!circle.contains(&DisplayPoint::new(95.0, 45.0)));
    }
}
