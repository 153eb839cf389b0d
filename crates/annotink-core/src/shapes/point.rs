//! Points and boxes tagged with the coordinate space they live in.
//!
//! A value in media-native pixels and a value in rendered (display) pixels
//! have different types, so the scaler is the only place that can turn one
//! into the other.

use kurbo::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use uuid::Uuid;

/// Unique identifier for a vertex of a polygon, line or face.
pub type PointId = Uuid;

/// Coordinate space marker.
pub trait Space: fmt::Debug + Clone + Copy + PartialEq + 'static {
    /// Human-readable name used in logs.
    const NAME: &'static str;
}

/// Media-native pixel space, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Native {}

/// Pixel space of the currently rendered media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {}

impl Space for Native {
    const NAME: &'static str = "native";
}

impl Space for Display {
    const NAME: &'static str = "display";
}

/// A vertex with a stable id, in coordinate space `S`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Point<S: Space> {
    pub id: PointId,
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

/// A point in media-native pixels.
pub type NativePoint = Point<Native>;
/// A point in rendered pixels.
pub type DisplayPoint = Point<Display>;

impl<S: Space> Point<S> {
    /// Create a point with a fresh id.
    pub fn new(x: f64, y: f64) -> Self {
        Self::with_id(Uuid::new_v4(), x, y)
    }

    /// Create a point keeping an existing id.
    pub fn with_id(id: PointId, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            space: PhantomData,
        }
    }

    /// Same point moved by a delta, id preserved.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::with_id(self.id, self.x + dx, self.y + dy)
    }

    /// The bare position, dropping id and space.
    pub fn to_kurbo(&self) -> kurbo::Point {
        kurbo::Point::new(self.x, self.y)
    }

    /// True when both axis deltas to `other` are at most `threshold`.
    ///
    /// The axes are checked independently, so this is a square window and not
    /// a Euclidean radius.
    pub fn within_axes(&self, other: &Self, threshold: f64) -> bool {
        (self.x - other.x).abs() <= threshold && (self.y - other.y).abs() <= threshold
    }

    /// Euclidean distance to another point in the same space.
    pub fn distance(&self, other: &Self) -> f64 {
        self.to_kurbo().distance(other.to_kurbo())
    }
}

/// Axis-aligned box (`x, y, width, height`) in coordinate space `S`.
///
/// While a drag is in progress `width`/`height` may be negative; call
/// [`BoxGeometry::normalized`] before persisting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct BoxGeometry<S: Space> {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

impl<S: Space> BoxGeometry<S> {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            space: PhantomData,
        }
    }

    /// Zero-size box at a point.
    pub fn at(point: &Point<S>) -> Self {
        Self::new(point.x, point.y, 0.0, 0.0)
    }

    /// Raw span from an anchor to the current pointer. Dimensions keep their
    /// sign, which is what a live drag preview needs.
    pub fn span(anchor: &Point<S>, current: &Point<S>) -> Self {
        Self::new(
            anchor.x,
            anchor.y,
            current.x - anchor.x,
            current.y - anchor.y,
        )
    }

    /// Canonical box spanned by two corners.
    pub fn from_corners(a: &Point<S>, b: &Point<S>) -> Self {
        Self::from_rect(Rect::from_points(a.to_kurbo(), b.to_kurbo()))
    }

    fn from_rect(rect: Rect) -> Self {
        Self::new(rect.x0, rect.y0, rect.width(), rect.height())
    }

    /// Same extents with `x <= x + width` and `y <= y + height`.
    pub fn normalized(&self) -> Self {
        Self::from_rect(self.as_rect().abs())
    }

    /// True when width or height is exactly zero.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }

    pub fn as_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn contains(&self, point: &Point<S>) -> bool {
        let rect = self.as_rect().abs();
        // kurbo's contains excludes the far edges
        point.x >= rect.x0 && point.x <= rect.x1 && point.y >= rect.y0 && point.y <= rect.y1
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_axes_is_square_window() {
        let first = DisplayPoint::new(100.0, 100.0);
        assert!(DisplayPoint::new(105.0, 104.0).within_axes(&first, 10.0));
        assert!(DisplayPoint::new(110.0, 90.0).within_axes(&first, 10.0));
        assert!(!DisplayPoint::new(100.0, 111.0).within_axes(&first, 10.0));
        // 14px on each axis is ~19.8px away but also fails per-axis.
        assert!(!DisplayPoint::new(114.0, 114.0).within_axes(&first, 10.0));
    }

    #[test]
    fn test_translated_keeps_id() {
        let p = NativePoint::new(1.0, 2.0);
        let q = p.translated(3.0, 4.0);
        assert_eq!(p.id, q.id);
        assert!((q.x - 4.0).abs() < f64::EPSILON);
        assert!((q.y - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_box_normalization() {
        let anchor = DisplayPoint::new(50.0, 50.0);
        let current = DisplayPoint::new(10.0, 10.0);
        let raw = BoxGeometry::span(&anchor, &current);
        assert!((raw.width + 40.0).abs() < f64::EPSILON);

        let b = raw.normalized();
        assert!((b.x - 10.0).abs() < f64::EPSILON);
        assert!((b.y - 10.0).abs() < f64::EPSILON);
        assert!((b.width - 40.0).abs() < f64::EPSILON);
        assert!((b.height - 40.0).abs() < f64::EPSILON);
        assert_eq!(b, BoxGeometry::from_corners(&anchor, &current));
    }

    #[test]
    fn test_degenerate_box() {
        let p = DisplayPoint::new(5.0, 5.0);
        assert!(BoxGeometry::at(&p).is_degenerate());
        assert!(BoxGeometry::<Display>::new(0.0, 0.0, 10.0, 0.0).is_degenerate());
        assert!(!BoxGeometry::<Display>::new(0.0, 0.0, 10.0, 1.0).is_degenerate());
    }

    #[test]
    fn test_point_serializes_without_space() {
        let p = NativePoint::new(3.5, 4.0);
        let json = serde_json::to_value(p).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        let back: NativePoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }
}
