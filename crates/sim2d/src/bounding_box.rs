//! Generic N-D axis-aligned bounding box.

use glam::Vec2;
use num_traits::Float;

/// Axis-aligned box over `[T; N]` points.
///
/// The default (reset) box has `lower = +inf` and `upper = -inf`, which makes
/// it the identity for [`BoundingBox::merge`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox<T, const N: usize> {
    pub lower_corner: [T; N],
    pub upper_corner: [T; N],
}

pub type BoundingBox2F = BoundingBox<f32, 2>;
pub type BoundingBox2D = BoundingBox<f64, 2>;
pub type BoundingBox3F = BoundingBox<f32, 3>;
pub type BoundingBox3D = BoundingBox<f64, 3>;

impl<T: Float, const N: usize> BoundingBox<T, N> {
    /// Box that tightly covers two points.
    pub fn new(point1: [T; N], point2: [T; N]) -> Self {
        Self {
            lower_corner: std::array::from_fn(|a| point1[a].min(point2[a])),
            upper_corner: std::array::from_fn(|a| point1[a].max(point2[a])),
        }
    }

    /// The empty box (identity element of `merge`).
    pub fn empty() -> Self {
        Self {
            lower_corner: [T::infinity(); N],
            upper_corner: [T::neg_infinity(); N],
        }
    }

    /// True if this box and `other` intersect. Touching boxes overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        (0..N).all(|a| {
            self.upper_corner[a] >= other.lower_corner[a]
                && self.lower_corner[a] <= other.upper_corner[a]
        })
    }

    /// True if `point` is inside the closed box.
    pub fn contains(&self, point: &[T; N]) -> bool {
        (0..N).all(|a| self.lower_corner[a] <= point[a] && point[a] <= self.upper_corner[a])
    }

    pub fn mid_point(&self) -> [T; N] {
        let two = T::one() + T::one();
        std::array::from_fn(|a| (self.lower_corner[a] + self.upper_corner[a]) / two)
    }

    pub fn diagonal_length(&self) -> T {
        self.diagonal_length_squared().sqrt()
    }

    pub fn diagonal_length_squared(&self) -> T {
        (0..N).fold(T::zero(), |acc, a| {
            let d = self.upper_corner[a] - self.lower_corner[a];
            acc + d * d
        })
    }

    /// Extent along `axis`.
    pub fn width(&self, axis: usize) -> T {
        self.upper_corner[axis] - self.lower_corner[axis]
    }

    /// True if lower > upper on any axis (reset or inverted by `expand`).
    pub fn is_empty(&self) -> bool {
        (0..N).any(|a| self.lower_corner[a] > self.upper_corner[a])
    }

    /// Reset to the empty box.
    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    /// Grow to include `point`.
    pub fn merge_point(&mut self, point: &[T; N]) {
        for a in 0..N {
            self.lower_corner[a] = self.lower_corner[a].min(point[a]);
            self.upper_corner[a] = self.upper_corner[a].max(point[a]);
        }
    }

    /// Grow to include `other`.
    pub fn merge(&mut self, other: &Self) {
        for a in 0..N {
            self.lower_corner[a] = self.lower_corner[a].min(other.lower_corner[a]);
            self.upper_corner[a] = self.upper_corner[a].max(other.upper_corner[a]);
        }
    }

    /// Move every face outwards by `delta`. Negative values shrink and may invert.
    pub fn expand(&mut self, delta: T) {
        for a in 0..N {
            self.lower_corner[a] = self.lower_corner[a] - delta;
            self.upper_corner[a] = self.upper_corner[a] + delta;
        }
    }

    /// Corner selected by the low `N` bits of `idx` (bit set = upper).
    pub fn corner(&self, idx: usize) -> [T; N] {
        std::array::from_fn(|a| {
            if idx & (1 << a) != 0 {
                self.upper_corner[a]
            } else {
                self.lower_corner[a]
            }
        })
    }

    /// Nearest point inside the box.
    pub fn clamp(&self, point: &[T; N]) -> [T; N] {
        std::array::from_fn(|a| point[a].max(self.lower_corner[a]).min(self.upper_corner[a]))
    }
}

impl<T: Float, const N: usize> Default for BoundingBox<T, N> {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox<f32, 2> {
    pub fn from_vec2(point1: Vec2, point2: Vec2) -> Self {
        Self::new(point1.to_array(), point2.to_array())
    }

    pub fn lower_vec2(&self) -> Vec2 {
        Vec2::from_array(self.lower_corner)
    }

    pub fn upper_vec2(&self) -> Vec2 {
        Vec2::from_array(self.upper_corner)
    }

    pub fn mid_point_vec2(&self) -> Vec2 {
        Vec2::from_array(self.mid_point())
    }

    pub fn contains_vec2(&self, point: Vec2) -> bool {
        self.contains(&point.to_array())
    }

    pub fn merge_vec2(&mut self, point: Vec2) {
        self.merge_point(&point.to_array());
    }

    pub fn clamp_vec2(&self, point: Vec2) -> Vec2 {
        Vec2::from_array(self.clamp(&point.to_array()))
    }
}
