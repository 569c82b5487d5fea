//! Union of implicit surfaces.

use std::sync::Arc;

use glam::Vec2;

use crate::bounding_box::BoundingBox2F;
use crate::geometry::surface::Surface2;

/// Union of several surfaces. Queries answer for the nearest member.
///
/// An empty set has no inside and an infinite signed distance.
#[derive(Clone, Debug, Default)]
pub struct ImplicitSurfaceSet2 {
    surfaces: Vec<Arc<dyn Surface2>>,
}

impl ImplicitSurfaceSet2 {
    pub fn new(surfaces: Vec<Arc<dyn Surface2>>) -> Self {
        Self { surfaces }
    }

    pub fn add_surface(&mut self, surface: Arc<dyn Surface2>) {
        self.surfaces.push(surface);
    }

    pub fn number_of_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    pub fn surface_at(&self, i: usize) -> Option<&Arc<dyn Surface2>> {
        self.surfaces.get(i)
    }

    fn nearest(&self, point: Vec2) -> Option<(&dyn Surface2, f32)> {
        self.surfaces
            .iter()
            .map(|s| (s.as_ref(), s.signed_distance(point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

impl Surface2 for ImplicitSurfaceSet2 {
    fn signed_distance(&self, point: Vec2) -> f32 {
        self.nearest(point).map_or(f32::INFINITY, |(_, d)| d)
    }

    fn closest_point(&self, point: Vec2) -> Vec2 {
        self.nearest(point)
            .map_or(point, |(s, _)| s.closest_point(point))
    }

    fn closest_normal(&self, point: Vec2) -> Vec2 {
        self.nearest(point)
            .map_or(Vec2::X, |(s, _)| s.closest_normal(point))
    }

    fn bounding_box(&self) -> BoundingBox2F {
        let mut bound = BoundingBox2F::empty();
        for s in &self.surfaces {
            bound.merge(&s.bounding_box());
        }
        bound
    }

    fn is_bounded(&self) -> bool {
        !self.surfaces.is_empty() && self.surfaces.iter().all(|s| s.is_bounded())
    }
}
