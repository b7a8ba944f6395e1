//! Axis-aligned rectangles in frame pixel coordinates.
//!
//! Both parking spots and detection boxes are `Rect`s. Coordinates are
//! inclusive-exclusive in the usual image sense: a rectangle covers
//! `x1..x2` horizontally and `y1..y2` vertically.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle `(x1, y1, x2, y2)`.
///
/// A well-formed rectangle has `x1 < x2` and `y1 < y2`. Rectangles read from
/// disk or clamped to a frame may end up degenerate (zero area); those are
/// kept so that spot indices stay stable, and they never intersect anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    /// Build a rectangle, rejecting inverted or empty extents.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self> {
        if x2 <= x1 || y2 <= y1 {
            return Err(anyhow!(
                "rectangle [{}, {}, {}, {}] must satisfy x1 < x2 and y1 < y2",
                x1,
                y1,
                x2,
                y2
            ));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Build a rectangle without checking extents.
    pub const fn raw(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Rectangle spanned by two drag corners given in any order.
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Self {
        Self {
            x1: a.0.min(b.0),
            y1: a.1.min(b.1),
            x2: a.0.max(b.0),
            y2: a.1.max(b.1),
        }
    }

    /// Truncate float box coordinates (model output) to pixels.
    pub fn from_f32(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1 as i32,
            y1: y1 as i32,
            x2: x2 as i32,
            y2: y2 as i32,
        }
    }

    pub fn width(&self) -> i64 {
        (self.x2 as i64 - self.x1 as i64).max(0)
    }

    pub fn height(&self) -> i64 {
        (self.y2 as i64 - self.y1 as i64).max(0)
    }

    /// Area in pixels. Zero for degenerate rectangles, never negative.
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    pub fn is_degenerate(&self) -> bool {
        self.area() == 0
    }

    /// Overlapping region of two rectangles, if they share a non-empty area.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        if ix2 > ix1 && iy2 > iy1 {
            Some(Rect::raw(ix1, iy1, ix2, iy2))
        } else {
            None
        }
    }

    /// Clamp into a `width` x `height` frame. May produce a degenerate rectangle.
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        Rect {
            x1: self.x1.clamp(0, w),
            y1: self.y1.clamp(0, h),
            x2: self.x2.clamp(0, w),
            y2: self.y2.clamp(0, h),
        }
    }

    pub fn as_array(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl From<[i32; 4]> for Rect {
    fn from(v: [i32; 4]) -> Self {
        Rect::raw(v[0], v[1], v[2], v[3])
    }
}

impl From<Rect> for [i32; 4] {
    fn from(r: Rect) -> Self {
        r.as_array()
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x1, self.y1, self.x2, self.y2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_inverted_extents() {
        assert!(Rect::new(0, 0, 10, 10).is_ok());
        assert!(Rect::new(10, 0, 0, 10).is_err());
        assert!(Rect::new(0, 5, 10, 5).is_err());
    }

    #[test]
    fn from_corners_normalises_drag_direction() {
        let r = Rect::from_corners((40, 30), (10, 50));
        assert_eq!(r, Rect::raw(10, 30, 40, 50));
    }

    #[test]
    fn intersection_of_overlapping_and_disjoint() {
        let a = Rect::raw(0, 0, 10, 10);
        let b = Rect::raw(5, 5, 20, 20);
        assert_eq!(a.intersection(&b), Some(Rect::raw(5, 5, 10, 10)));

        // Touching edges share no area.
        let c = Rect::raw(10, 0, 20, 10);
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn clamp_can_degenerate() {
        let r = Rect::raw(-5, -5, 700, 20);
        assert_eq!(r.clamp_to(640, 480), Rect::raw(0, 0, 640, 20));

        let outside = Rect::raw(700, 10, 800, 20);
        let clamped = outside.clamp_to(640, 480);
        assert!(clamped.is_degenerate());
        assert_eq!(clamped.area(), 0);
    }

    #[test]
    fn serde_uses_flat_array() {
        let r: Rect = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(r, Rect::raw(1, 2, 3, 4));
        assert_eq!(serde_json::to_string(&r).unwrap(), "[1,2,3,4]");
    }
}
