//! Stream particles from a single point.

use glam::{Mat2, Vec2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{SimError, SimResult};
use crate::particle::emitter::{EmitterState, ParticleEmitter2};
use crate::particle::particle_system::ParticleSystemData2;

/// Emits particles at `origin` moving along `direction`, randomly rotated
/// within the spread angle, at a bounded rate.
pub struct PointParticleEmitter2 {
    state: EmitterState,
    origin: Vec2,
    direction: Vec2,
    speed: f32,
    spread_angle: f32,
    max_particles_per_second: f32,
    max_number_of_particles: usize,
    number_of_emitted: usize,
    first_frame_time: Option<f64>,
    rng: ChaCha8Rng,
}

impl PointParticleEmitter2 {
    /// `spread_angle_degrees` is the full opening angle of the emission cone.
    pub fn new(
        origin: Vec2,
        direction: Vec2,
        speed: f32,
        spread_angle_degrees: f32,
        max_particles_per_second: f32,
        max_number_of_particles: usize,
        seed: u64,
    ) -> SimResult<Self> {
        let direction = direction.try_normalize().ok_or_else(|| {
            SimError::configuration("direction", "emission direction must be non-zero")
        })?;
        if !(max_particles_per_second.is_finite() && max_particles_per_second >= 0.0) {
            return Err(SimError::configuration(
                "max_particles_per_second",
                format!("must be non-negative, got {}", max_particles_per_second),
            ));
        }
        Ok(Self {
            state: EmitterState::default(),
            origin,
            direction,
            speed,
            spread_angle: spread_angle_degrees.to_radians(),
            max_particles_per_second,
            max_number_of_particles,
            number_of_emitted: 0,
            first_frame_time: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn number_of_emitted_particles(&self) -> usize {
        self.number_of_emitted
    }

    fn sample_direction(&mut self) -> Vec2 {
        if self.spread_angle <= 0.0 {
            return self.direction;
        }
        let angle = self.spread_angle * (self.rng.gen::<f32>() - 0.5);
        Mat2::from_angle(angle) * self.direction
    }
}

impl ParticleEmitter2 for PointParticleEmitter2 {
    fn state(&self) -> &EmitterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EmitterState {
        &mut self.state
    }

    fn emit(
        &mut self,
        particles: &mut ParticleSystemData2,
        current_time: f64,
        dt: f32,
    ) -> SimResult<usize> {
        let first = *self.first_frame_time.get_or_insert(current_time);
        let elapsed = current_time - first + dt as f64;

        let allowed = (elapsed * self.max_particles_per_second as f64).ceil() as usize;
        let allowed = allowed.min(self.max_number_of_particles);
        let count = allowed.saturating_sub(self.number_of_emitted);
        if count == 0 {
            return Ok(0);
        }

        let positions = vec![self.origin; count];
        let velocities: Vec<Vec2> = (0..count)
            .map(|_| self.speed * self.sample_direction())
            .collect();
        particles.add_particles(&positions, &velocities, &[])?;
        self.number_of_emitted += count;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_emission() {
        let mut particles = ParticleSystemData2::default();
        let mut emitter =
            PointParticleEmitter2::new(Vec2::ZERO, Vec2::Y, 2.0, 0.0, 10.0, 100, 1).unwrap();
        emitter.set_target(particles.id());

        assert_eq!(emitter.update(&mut particles, 0.0, 0.5).unwrap(), 5);
        assert_eq!(emitter.update(&mut particles, 0.5, 0.5).unwrap(), 5);
        assert_eq!(particles.number_of_particles(), 10);
        assert!(particles
            .velocities()
            .iter()
            .all(|v| (*v - Vec2::new(0.0, 2.0)).length() < 1e-6));
    }

    #[test]
    fn test_total_cap() {
        let mut particles = ParticleSystemData2::default();
        let mut emitter =
            PointParticleEmitter2::new(Vec2::ONE, Vec2::X, 1.0, 0.0, 1000.0, 3, 1).unwrap();
        emitter.set_target(particles.id());
        assert_eq!(emitter.update(&mut particles, 0.0, 1.0).unwrap(), 3);
        assert_eq!(emitter.update(&mut particles, 1.0, 1.0).unwrap(), 0);
        assert_eq!(emitter.number_of_emitted_particles(), 3);
    }

    #[test]
    fn test_spread_stays_in_cone() {
        let mut particles = ParticleSystemData2::default();
        let mut emitter =
            PointParticleEmitter2::new(Vec2::ZERO, Vec2::X, 1.0, 90.0, 100.0, 100, 3).unwrap();
        emitter.set_target(particles.id());
        emitter.update(&mut particles, 0.0, 1.0).unwrap();
        let cos_half = (45.0f32).to_radians().cos();
        for v in particles.velocities() {
            assert!((v.length() - 1.0).abs() < 1e-5);
            assert!(v.dot(Vec2::X) >= cos_half - 1e-5);
        }
    }

    #[test]
    fn test_zero_direction_rejected() {
        assert!(PointParticleEmitter2::new(Vec2::ZERO, Vec2::ZERO, 1.0, 0.0, 1.0, 1, 0).is_err());
    }
}
