//! Implicit surfaces: signed distance plus closest point/normal queries.
//!
//! Signed distance is negative inside the surface.

use glam::Vec2;

use crate::bounding_box::BoundingBox2F;
use crate::geometry::transform::Transform2;

/// A closed 2D surface that can be queried implicitly.
pub trait Surface2: Send + Sync + std::fmt::Debug {
    /// Signed distance from `point` to the surface (negative inside).
    fn signed_distance(&self, point: Vec2) -> f32;

    /// Closest point on the surface to `point`.
    fn closest_point(&self, point: Vec2) -> Vec2;

    /// Outward normal at the surface point closest to `point`.
    fn closest_normal(&self, point: Vec2) -> Vec2;

    /// World-space bounds. Unbounded surfaces return an infinite box.
    fn bounding_box(&self) -> BoundingBox2F;

    fn is_bounded(&self) -> bool {
        true
    }

    /// Frame of the surface; rigid body colliders rotate around its origin.
    fn transform(&self) -> Transform2 {
        Transform2::IDENTITY
    }

    fn is_inside(&self, point: Vec2) -> bool {
        self.signed_distance(point) < 0.0
    }
}

fn infinite_box() -> BoundingBox2F {
    BoundingBox2F::new([f32::NEG_INFINITY; 2], [f32::INFINITY; 2])
}

/// Infinite line; the half-space behind `normal` is inside.
#[derive(Clone, Copy, Debug)]
pub struct Plane2 {
    pub normal: Vec2,
    pub point: Vec2,
}

impl Plane2 {
    pub fn new(normal: Vec2, point: Vec2) -> Self {
        Self {
            normal: normal.try_normalize().unwrap_or(Vec2::Y),
            point,
        }
    }
}

impl Surface2 for Plane2 {
    fn signed_distance(&self, point: Vec2) -> f32 {
        self.normal.dot(point - self.point)
    }

    fn closest_point(&self, point: Vec2) -> Vec2 {
        point - self.signed_distance(point) * self.normal
    }

    fn closest_normal(&self, _point: Vec2) -> Vec2 {
        self.normal
    }

    fn bounding_box(&self) -> BoundingBox2F {
        infinite_box()
    }

    fn is_bounded(&self) -> bool {
        false
    }
}

/// Circle.
#[derive(Clone, Copy, Debug)]
pub struct Sphere2 {
    pub center: Vec2,
    pub radius: f32,
}

impl Sphere2 {
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }
}

impl Surface2 for Sphere2 {
    fn signed_distance(&self, point: Vec2) -> f32 {
        (point - self.center).length() - self.radius
    }

    fn closest_point(&self, point: Vec2) -> Vec2 {
        self.center + self.radius * self.closest_normal(point)
    }

    fn closest_normal(&self, point: Vec2) -> Vec2 {
        (point - self.center).try_normalize().unwrap_or(Vec2::X)
    }

    fn bounding_box(&self) -> BoundingBox2F {
        let r = Vec2::splat(self.radius);
        BoundingBox2F::from_vec2(self.center - r, self.center + r)
    }

    fn transform(&self) -> Transform2 {
        Transform2::from_translation(self.center)
    }
}

/// Oriented box: an axis-aligned `bound` in the local frame of `transform`.
#[derive(Clone, Copy, Debug)]
pub struct Box2 {
    pub bound: BoundingBox2F,
    pub transform: Transform2,
    /// Flip inside/outside, e.g. for a container whose interior is free space.
    pub is_normal_flipped: bool,
}

impl Box2 {
    pub fn new(lower: Vec2, upper: Vec2) -> Self {
        Self {
            bound: BoundingBox2F::from_vec2(lower, upper),
            transform: Transform2::IDENTITY,
            is_normal_flipped: false,
        }
    }

    pub fn with_transform(mut self, transform: Transform2) -> Self {
        self.transform = transform;
        self
    }

    pub fn flipped(mut self) -> Self {
        self.is_normal_flipped = !self.is_normal_flipped;
        self
    }

    fn sign(&self) -> f32 {
        if self.is_normal_flipped {
            -1.0
        } else {
            1.0
        }
    }

    /// Unsigned closest point and outward normal in the local frame.
    fn local_closest(&self, q: Vec2) -> (Vec2, Vec2) {
        let lower = self.bound.lower_vec2();
        let upper = self.bound.upper_vec2();

        if !self.bound.contains_vec2(q) {
            let clamped = q.clamp(lower, upper);
            let normal = (q - clamped).try_normalize().unwrap_or(Vec2::X);
            return (clamped, normal);
        }

        // Inside: project to the nearest face.
        let candidates = [
            (q.x - lower.x, Vec2::new(lower.x, q.y), Vec2::NEG_X),
            (upper.x - q.x, Vec2::new(upper.x, q.y), Vec2::X),
            (q.y - lower.y, Vec2::new(q.x, lower.y), Vec2::NEG_Y),
            (upper.y - q.y, Vec2::new(q.x, upper.y), Vec2::Y),
        ];
        let mut best = candidates[0];
        for c in &candidates[1..] {
            if c.0 < best.0 {
                best = *c;
            }
        }
        (best.1, best.2)
    }
}

impl Surface2 for Box2 {
    fn signed_distance(&self, point: Vec2) -> f32 {
        let q = self.transform.to_local(point);
        let center = self.bound.mid_point_vec2();
        let half = 0.5 * (self.bound.upper_vec2() - self.bound.lower_vec2());
        let d = (q - center).abs() - half;
        let outside = d.max(Vec2::ZERO).length();
        let inside = d.x.max(d.y).min(0.0);
        self.sign() * (outside + inside)
    }

    fn closest_point(&self, point: Vec2) -> Vec2 {
        let q = self.transform.to_local(point);
        self.transform.to_world(self.local_closest(q).0)
    }

    fn closest_normal(&self, point: Vec2) -> Vec2 {
        let q = self.transform.to_local(point);
        self.sign() * self.transform.to_world_direction(self.local_closest(q).1)
    }

    fn bounding_box(&self) -> BoundingBox2F {
        let mut bound = BoundingBox2F::empty();
        for c in 0..4 {
            let corner = Vec2::from_array(self.bound.corner(c));
            bound.merge_vec2(self.transform.to_world(corner));
        }
        bound
    }

    fn is_bounded(&self) -> bool {
        !self.is_normal_flipped
    }

    fn transform(&self) -> Transform2 {
        self.transform
    }
}
