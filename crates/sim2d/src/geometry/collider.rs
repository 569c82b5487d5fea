//! Colliders: surfaces with a velocity field, used for boundary conditions.

use std::sync::Arc;

use glam::Vec2;

use crate::error::{SimError, SimResult};
use crate::geometry::surface::Surface2;

/// A solid obstacle that particles and grid velocities must respect.
pub trait Collider2: Send + Sync {
    fn surface(&self) -> &dyn Surface2;

    /// Velocity of the collider material at `point`.
    fn velocity_at(&self, point: Vec2) -> Vec2;

    fn friction_coefficient(&self) -> f32 {
        0.0
    }

    /// True if a particle of `radius` at `position` overlaps the collider.
    fn is_penetrating(&self, position: Vec2, radius: f32) -> bool {
        self.surface().signed_distance(position) < radius
    }

    /// Push a penetrating particle back onto the surface and reflect the normal
    /// component of its velocity relative to the collider.
    ///
    /// Tangential velocity is reduced by Coulomb friction proportional to the
    /// normal velocity change.
    fn resolve_collision(
        &self,
        radius: f32,
        restitution: f32,
        position: &mut Vec2,
        velocity: &mut Vec2,
    ) {
        if !self.is_penetrating(*position, radius) {
            return;
        }

        let surface = self.surface();
        let normal = surface.closest_normal(*position);
        let target = surface.closest_point(*position) + radius * normal;
        let collider_vel = self.velocity_at(target);

        let relative = *velocity - collider_vel;
        let normal_dot = normal.dot(relative);
        let mut relative_n = normal_dot * normal;
        let mut relative_t = relative - relative_n;

        if normal_dot < 0.0 {
            let delta_n = (-restitution - 1.0) * relative_n;
            relative_n *= -restitution;

            let t_len_sq = relative_t.length_squared();
            if t_len_sq > 0.0 {
                let scale = (1.0
                    - self.friction_coefficient() * delta_n.length() / t_len_sq.sqrt())
                .max(0.0);
                relative_t *= scale;
            }

            *velocity = relative_n + relative_t + collider_vel;
        }

        *position = target;
    }
}

/// Collider moving as a rigid body.
#[derive(Clone, Debug)]
pub struct RigidBodyCollider2 {
    surface: Arc<dyn Surface2>,
    pub linear_velocity: Vec2,
    /// Counter-clockwise, radians per second, around the surface origin.
    pub angular_velocity: f32,
    pub friction_coefficient: f32,
}

impl RigidBodyCollider2 {
    pub fn new(surface: Arc<dyn Surface2>) -> Self {
        Self {
            surface,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            friction_coefficient: 0.0,
        }
    }

    pub fn builder() -> RigidBodyCollider2Builder {
        RigidBodyCollider2Builder::default()
    }

    pub fn set_surface(&mut self, surface: Arc<dyn Surface2>) {
        self.surface = surface;
    }
}

impl Collider2 for RigidBodyCollider2 {
    fn surface(&self) -> &dyn Surface2 {
        self.surface.as_ref()
    }

    fn velocity_at(&self, point: Vec2) -> Vec2 {
        let r = point - self.surface.transform().translation;
        self.linear_velocity + self.angular_velocity * r.perp()
    }

    fn friction_coefficient(&self) -> f32 {
        self.friction_coefficient
    }
}

/// Step-by-step construction of [`RigidBodyCollider2`].
#[derive(Clone, Debug, Default)]
pub struct RigidBodyCollider2Builder {
    surface: Option<Arc<dyn Surface2>>,
    linear_velocity: Vec2,
    angular_velocity: f32,
    friction_coefficient: f32,
}

impl RigidBodyCollider2Builder {
    pub fn with_surface(mut self, surface: Arc<dyn Surface2>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, velocity: f32) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn with_friction_coefficient(mut self, friction: f32) -> Self {
        self.friction_coefficient = friction;
        self
    }

    pub fn build(self) -> SimResult<RigidBodyCollider2> {
        let surface = self
            .surface
            .ok_or_else(|| SimError::configuration("surface", "collider needs a surface"))?;
        if self.friction_coefficient < 0.0 {
            return Err(SimError::configuration(
                "friction_coefficient",
                format!("must be non-negative, got {}", self.friction_coefficient),
            ));
        }
        Ok(RigidBodyCollider2 {
            surface,
            linear_velocity: self.linear_velocity,
            angular_velocity: self.angular_velocity,
            friction_coefficient: self.friction_coefficient,
        })
    }

    pub fn build_shared(self) -> SimResult<Arc<RigidBodyCollider2>> {
        self.build().map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::surface::{Plane2, Sphere2};

    fn floor() -> Arc<dyn Surface2> {
        Arc::new(Plane2::new(Vec2::Y, Vec2::ZERO))
    }

    #[test]
    fn test_builder_requires_surface() {
        let err = RigidBodyCollider2::builder().build().unwrap_err();
        assert!(err.is_configuration());

        let c = RigidBodyCollider2::builder()
            .with_surface(floor())
            .with_linear_velocity(Vec2::new(1.0, 0.0))
            .build()
            .unwrap();
        assert_eq!(c.velocity_at(Vec2::new(10.0, 3.0)), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_angular_velocity_around_origin() {
        let c = RigidBodyCollider2::builder()
            .with_surface(Arc::new(Sphere2::new(Vec2::new(1.0, 1.0), 0.5)))
            .with_angular_velocity(2.0)
            .build()
            .unwrap();
        // r = (1, 0) from the center, w x r = (0, 2)
        let v = c.velocity_at(Vec2::new(2.0, 1.0));
        assert!((v - Vec2::new(0.0, 2.0)).length() < 1e-6);
    }

    #[test]
    fn test_resolve_collision_bounces() {
        let c = RigidBodyCollider2::new(floor());
        let mut pos = Vec2::new(0.5, -0.1);
        let mut vel = Vec2::new(0.0, -2.0);
        c.resolve_collision(0.0, 0.5, &mut pos, &mut vel);
        assert!((pos.y - 0.0).abs() < 1e-6);
        assert!((vel.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_friction_removes_tangential_velocity() {
        let mut c = RigidBodyCollider2::new(floor());
        c.friction_coefficient = 10.0;
        let mut pos = Vec2::new(0.0, -0.01);
        let mut vel = Vec2::new(1.0, -1.0);
        c.resolve_collision(0.0, 0.0, &mut pos, &mut vel);
        assert!(vel.x.abs() < 1e-6, "friction should stop sliding, vx={}", vel.x);
        assert!(vel.y.abs() < 1e-6);
    }

    #[test]
    fn test_non_penetrating_untouched() {
        let c = RigidBodyCollider2::new(floor());
        let mut pos = Vec2::new(0.0, 1.0);
        let mut vel = Vec2::new(0.3, -1.0);
        c.resolve_collision(0.1, 0.5, &mut pos, &mut vel);
        assert_eq!(pos, Vec2::new(0.0, 1.0));
        assert_eq!(vel, Vec2::new(0.3, -1.0));
    }
}
