//! Integer pixel primitives and the bounds calculator.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A pixel coordinate on the originating frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn to_f32(self) -> Point2<f32> {
        Point2::new(self.x as f32, self.y as f32)
    }

    /// Translate into a frame whose origin is `origin`.
    #[inline]
    pub fn relative_to(self, origin: Point) -> Point {
        Point::new(
            self.x.saturating_sub(origin.x),
            self.y.saturating_sub(origin.y),
        )
    }

    /// Square of side `size` centred on the point, as `(min, max)` corners.
    pub fn square(self, size: i32) -> (Point, Point) {
        let half = size as f32 / 2.0;
        (
            Point::new((self.x as f32 - half) as i32, (self.y as f32 - half) as i32),
            Point::new((self.x as f32 + half) as i32, (self.y as f32 + half) as i32),
        )
    }

    /// Strict interior test against the square of side `size` around `self`.
    pub fn in_square(self, size: i32, p: Point) -> bool {
        let (lo, hi) = self.square(size);
        lo.x < p.x && p.x < hi.x && lo.y < p.y && p.y < hi.y
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned rectangle stored as min/max corners.
///
/// `x1`/`y1` are exclusive slice bounds. The zero rect is the "not yet
/// computed" sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Rect {
    /// Build from an origin and an extent. Corners saturate at the `i32` range.
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x.saturating_add(w),
            y1: y.saturating_add(h),
        }
    }

    #[inline]
    pub fn origin(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.x1.saturating_sub(self.x0)
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.y1.saturating_sub(self.y0)
    }

    #[inline]
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// True when the rect has no positive extent on either axis.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// `(x0, y0, x1, y1)`.
    #[inline]
    pub fn expand(&self) -> (i32, i32, i32, i32) {
        (self.x0, self.y0, self.x1, self.y1)
    }

    /// Whether the rect lies within a `width` x `height` frame.
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        self.x0 >= 0
            && self.y0 >= 0
            && self.x1 as i64 <= width as i64
            && self.y1 as i64 <= height as i64
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}) ({}, {})", self.x0, self.y0, self.x1, self.y1)
    }
}

/// Bounding box of `points` as `(min_x, min_y, max_x - min_x, max_y - min_y)`.
///
/// Fewer than three points yield `(0, 0, 0, 0)`: two points are still treated
/// as "no bounds yet". Extents wider than `i32::MAX` saturate.
pub fn bounds(points: &[Point]) -> (i32, i32, i32, i32) {
    if points.len() < 3 {
        return (0, 0, 0, 0);
    }

    let first = points[0];
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    (min_x, min_y, extent(min_x, max_x), extent(min_y, max_y))
}

fn extent(min: i32, max: i32) -> i32 {
    i32::try_from(max as i64 - min as i64).unwrap_or(i32::MAX)
}

/// [`bounds`] packed into a [`Rect`].
pub fn bounding_rect(points: &[Point]) -> Rect {
    let (x, y, w, h) = bounds(points);
    Rect::new(x, y, w, h)
}

/// Scale a coordinate pair into `[0, 1]` relative to a `width` x `height` box.
pub fn normalize(x: f32, y: f32, width: f32, height: f32) -> (f32, f32) {
    (x / width, y / height)
}
