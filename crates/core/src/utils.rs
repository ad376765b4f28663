//! Geometric primitives shared by every detector.
//!
//! Provides:
//! - `Bbox`, an axis-aligned rectangle in page pixel coordinates (origin top-left)
//! - the `HasBbox` trait for anything that occupies a rectangle on the page
//! - `DistanceCache`, pair-memoised edge distances for iterative clustering

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A 2D point (x, y).
pub type Point = (f64, f64);

/// Axis-aligned bounding box.
///
/// The empty box has `min_x = min_y = +inf` and `max_x = max_y = -inf`; it only
/// ever grows through [`Bbox::update`]. Predicates on an unbounded box return
/// `false` instead of computing with infinities.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for Bbox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bbox {
    pub const EMPTY: Bbox = Bbox {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };

    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest box covering all `points`; empty if there are none.
    pub fn from_points(points: &[Point]) -> Self {
        let mut b = Self::EMPTY;
        b.update(points);
        b
    }

    /// Expands the box to cover `points`. Never shrinks.
    pub fn update(&mut self, points: &[Point]) {
        for &(x, y) in points {
            self.min_x = self.min_x.min(x);
            self.min_y = self.min_y.min(y);
            self.max_x = self.max_x.max(x);
            self.max_y = self.max_y.max(y);
        }
    }

    /// Expands the box to cover `other`. An unbounded `other` is a no-op.
    pub fn update_box(&mut self, other: &Bbox) {
        if other.is_unbounded() {
            return;
        }
        self.update(&[(other.min_x, other.min_y), (other.max_x, other.max_y)]);
    }

    pub fn union(&self, other: &Bbox) -> Bbox {
        let mut b = *self;
        b.update_box(other);
        b
    }

    pub fn is_unbounded(&self) -> bool {
        self.min_x == f64::INFINITY || self.max_x == f64::NEG_INFINITY
    }

    /// Strictly positive extent in both directions.
    pub fn is_valid(&self) -> bool {
        !self.is_unbounded() && self.min_x < self.max_x && self.min_y < self.max_y
    }

    /// The two defining corners, or nothing for the empty box.
    pub fn points(&self) -> Vec<Point> {
        if self.is_unbounded() {
            Vec::new()
        } else {
            vec![(self.min_x, self.min_y), (self.max_x, self.max_y)]
        }
    }

    pub fn width(&self) -> f64 {
        if self.is_unbounded() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_unbounded() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    pub fn center(&self) -> Point {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// True iff `other` lies fully inside `self` (edges inclusive).
    pub fn contains(&self, other: &Bbox) -> bool {
        if self.is_unbounded() || other.is_unbounded() {
            return false;
        }
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    /// True if any corner of `self` lies within `other`.
    pub fn corners_within(&self, other: &Bbox) -> bool {
        if self.is_unbounded() || other.is_unbounded() {
            return false;
        }
        let inside = |x: f64, y: f64| {
            x >= other.min_x && x <= other.max_x && y >= other.min_y && y <= other.max_y
        };
        inside(self.min_x, self.min_y)
            || inside(self.max_x, self.max_y)
            || inside(self.max_x, self.min_y)
            || inside(self.min_x, self.max_y)
    }

    /// Corner-based overlap: some corner of either box lies within the other.
    ///
    /// This is not a separating-axis test. A wide short box crossing a tall
    /// narrow one with no corner inside the other reports `false`.
    pub fn overlap(&self, other: &Bbox) -> bool {
        self.corners_within(other) || other.corners_within(self)
    }

    /// True if the centre of `other` lies inside `self`.
    pub fn center_contains(&self, other: &Bbox) -> bool {
        if self.is_unbounded() || other.is_unbounded() {
            return false;
        }
        let (cx, cy) = other.center();
        cx >= self.min_x && cx <= self.max_x && cy >= self.min_y && cy <= self.max_y
    }

    /// Inclusive overlap of the vertical extents.
    pub fn vertical_overlap(a: &Bbox, b: &Bbox) -> bool {
        !a.is_unbounded() && !b.is_unbounded() && a.min_y <= b.max_y && b.min_y <= a.max_y
    }

    /// Inclusive overlap of the horizontal extents.
    pub fn horizontal_overlap(a: &Bbox, b: &Bbox) -> bool {
        !a.is_unbounded() && !b.is_unbounded() && a.min_x <= b.max_x && b.min_x <= a.max_x
    }

    /// Horizontal gap between the boxes; negative when they overlap.
    pub fn h_distance(a: &Bbox, b: &Bbox) -> f64 {
        a.min_x.max(b.min_x) - a.max_x.min(b.max_x)
    }

    /// Vertical gap between the boxes; negative when they overlap.
    pub fn v_distance(a: &Bbox, b: &Bbox) -> f64 {
        a.min_y.max(b.min_y) - a.max_y.min(b.max_y)
    }

    /// Euclidean distance between the nearest edges or corners, 0 when the
    /// boxes touch or overlap. Infinite if either box is unbounded.
    pub fn distance(a: &Bbox, b: &Bbox) -> f64 {
        if a.is_unbounded() || b.is_unbounded() {
            return f64::INFINITY;
        }
        fn dist(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
            ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt()
        }
        let left = b.max_x < a.min_x;
        let right = a.max_x < b.min_x;
        let above = b.max_y < a.min_y;
        let below = a.max_y < b.min_y;
        match (left, right, above, below) {
            (true, _, _, true) => dist(a.min_x, a.max_y, b.max_x, b.min_y),
            (true, _, true, _) => dist(a.min_x, a.min_y, b.max_x, b.max_y),
            (_, true, true, _) => dist(a.max_x, a.min_y, b.min_x, b.max_y),
            (_, true, _, true) => dist(a.max_x, a.max_y, b.min_x, b.min_y),
            (true, ..) => a.min_x - b.max_x,
            (_, true, ..) => b.min_x - a.max_x,
            (_, _, true, _) => a.min_y - b.max_y,
            (_, _, _, true) => b.min_y - a.max_y,
            _ => 0.0,
        }
    }

    /// True if the boxes share a row and are horizontally closer than
    /// `h_threshold`, or share a column and are vertically closer than
    /// `v_threshold`.
    pub fn nearby(a: &Bbox, b: &Bbox, h_threshold: f64, v_threshold: f64) -> bool {
        (Self::vertical_overlap(a, b) && Self::h_distance(a, b) <= h_threshold)
            || (Self::horizontal_overlap(a, b) && Self::v_distance(a, b) <= v_threshold)
    }
}

/// Trait for objects that occupy a rectangle on the page.
pub trait HasBbox {
    fn bbox(&self) -> Bbox;
}

impl HasBbox for Bbox {
    fn bbox(&self) -> Bbox {
        *self
    }
}

impl<T: HasBbox> HasBbox for &T {
    fn bbox(&self) -> Bbox {
        (*self).bbox()
    }
}

/// Union of the boxes of `items`.
pub fn bbox_of<T: HasBbox>(items: &[T]) -> Bbox {
    let mut b = Bbox::EMPTY;
    for item in items {
        b.update_box(&item.bbox());
    }
    b
}

/// The items whose box lies fully inside `region`, in input order.
pub fn items_in_box<'a, T: HasBbox>(region: &Bbox, items: &'a [T]) -> Vec<&'a T> {
    items
        .iter()
        .filter(|item| region.contains(&item.bbox()))
        .collect()
}

/// Memoised `Bbox::distance` keyed by item index pair.
///
/// Distances are symmetric so `(i, j)` and `(j, i)` share an entry.
#[derive(Default)]
pub struct DistanceCache {
    cache: FxHashMap<(usize, usize), f64>,
}

impl DistanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distance(&mut self, i: usize, j: usize, a: &Bbox, b: &Bbox) -> f64 {
        let key = if i <= j { (i, j) } else { (j, i) };
        *self
            .cache
            .entry(key)
            .or_insert_with(|| Bbox::distance(a, b))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg(seed: &mut u64) -> f64 {
        *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((*seed >> 33) % 1000) as f64 - 500.0
    }

    #[test]
    fn update_is_monotonic() {
        let mut seed = 7u64;
        let mut b = Bbox::EMPTY;
        for _ in 0..200 {
            let prev = b;
            let p = (lcg(&mut seed), lcg(&mut seed));
            b.update(&[p]);
            assert!(b.contains(&Bbox::new(p.0, p.1, p.0, p.1)));
            if !prev.is_unbounded() {
                assert!(b.contains(&prev));
            }
        }
    }

    #[test]
    fn contains_implies_overlap() {
        let outer = Bbox::new(0.0, 0.0, 100.0, 100.0);
        let inner = Bbox::new(10.0, 10.0, 20.0, 20.0);
        assert!(outer.contains(&inner));
        assert!(outer.overlap(&inner));
        assert!(inner.overlap(&outer));
    }

    #[test]
    fn unbounded_guards() {
        let b = Bbox::new(0.0, 0.0, 10.0, 10.0);
        assert!(!Bbox::EMPTY.contains(&b));
        assert!(!b.contains(&Bbox::EMPTY));
        assert!(!b.overlap(&Bbox::EMPTY));
        assert_eq!(Bbox::EMPTY.width(), 0.0);
        assert!(Bbox::distance(&b, &Bbox::EMPTY).is_infinite());
        assert!(Bbox::EMPTY.points().is_empty());
    }

    #[test]
    fn corner_overlap_misses_crossing_boxes() {
        let wide = Bbox::new(0.0, 45.0, 100.0, 55.0);
        let tall = Bbox::new(45.0, 0.0, 55.0, 100.0);
        assert!(!wide.overlap(&tall));
    }

    #[test]
    fn distance_cases() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(Bbox::distance(&a, &Bbox::new(20.0, 0.0, 30.0, 10.0)), 10.0);
        assert_eq!(Bbox::distance(&a, &Bbox::new(0.0, 15.0, 10.0, 20.0)), 5.0);
        assert_eq!(Bbox::distance(&a, &Bbox::new(13.0, 14.0, 20.0, 20.0)), 5.0);
        assert_eq!(Bbox::distance(&a, &Bbox::new(5.0, 5.0, 20.0, 20.0)), 0.0);
        assert_eq!(
            Bbox::distance(&a, &Bbox::new(20.0, 0.0, 30.0, 10.0)),
            Bbox::distance(&Bbox::new(20.0, 0.0, 30.0, 10.0), &a)
        );
    }

    #[test]
    fn nearby_thresholds() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0);
        let right = Bbox::new(14.0, 2.0, 20.0, 8.0);
        let below = Bbox::new(2.0, 16.0, 8.0, 20.0);
        assert!(Bbox::nearby(&a, &right, 4.0, 0.0));
        assert!(!Bbox::nearby(&a, &right, 3.0, 100.0));
        assert!(Bbox::nearby(&a, &below, 0.0, 6.0));
        assert!(!Bbox::nearby(&a, &below, 100.0, 5.0));
    }

    #[test]
    fn distance_cache_is_symmetric() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0);
        let b = Bbox::new(20.0, 0.0, 30.0, 10.0);
        let mut cache = DistanceCache::new();
        assert_eq!(cache.distance(0, 1, &a, &b), 10.0);
        assert_eq!(cache.distance(1, 0, &b, &a), 10.0);
        assert_eq!(cache.len(), 1);
    }
}
