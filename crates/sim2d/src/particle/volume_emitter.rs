//! Fill a region with particles on a regular lattice.

use std::sync::Arc;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::bounding_box::BoundingBox2F;
use crate::constants::MAX_EMITTER_LATTICE_POINTS;
use crate::error::{SimError, SimResult};
use crate::geometry::Surface2;
use crate::particle::emitter::{EmitterState, ParticleEmitter2};
use crate::particle::neighbor::PointHashGridSearcher2;
use crate::particle::particle_system::ParticleSystemData2;

/// Emits particles inside `surface`, clipped to `bounds`.
///
/// Candidate points lie on a lattice of `spacing` starting at the lower
/// corner of the region, filled row by row. Each point is optionally jittered
/// by up to `jitter * spacing / 2` per axis.
pub struct VolumeParticleEmitter2 {
    state: EmitterState,
    surface: Arc<dyn Surface2>,
    bounds: BoundingBox2F,
    spacing: f32,
    initial_velocity: Vec2,
    max_number_of_particles: usize,
    jitter: f32,
    is_one_shot: bool,
    allow_overlapping: bool,
    number_of_emitted: usize,
    rng: ChaCha8Rng,
}

impl VolumeParticleEmitter2 {
    pub fn builder() -> VolumeParticleEmitter2Builder {
        VolumeParticleEmitter2Builder::default()
    }

    pub fn number_of_emitted_particles(&self) -> usize {
        self.number_of_emitted
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn set_initial_velocity(&mut self, velocity: Vec2) {
        self.initial_velocity = velocity;
    }

    fn region(&self) -> BoundingBox2F {
        if !self.surface.is_bounded() {
            return self.bounds;
        }
        let sb = self.surface.bounding_box();
        BoundingBox2F::from_vec2(
            sb.lower_vec2().max(self.bounds.lower_vec2()),
            sb.upper_vec2().min(self.bounds.upper_vec2()),
        )
    }
}

impl ParticleEmitter2 for VolumeParticleEmitter2 {
    fn state(&self) -> &EmitterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EmitterState {
        &mut self.state
    }

    fn emit(
        &mut self,
        particles: &mut ParticleSystemData2,
        _current_time: f64,
        _dt: f32,
    ) -> SimResult<usize> {
        let budget = self
            .max_number_of_particles
            .saturating_sub(self.number_of_emitted);
        let region = self.region();
        if budget == 0 || region.is_empty() {
            if self.is_one_shot {
                self.set_is_enabled(false);
            }
            return Ok(0);
        }

        let searcher = if self.allow_overlapping || self.is_one_shot {
            None
        } else {
            let mut s = PointHashGridSearcher2::new(2.0 * self.spacing);
            s.build(particles.positions());
            Some(s)
        };

        let lower = region.lower_vec2();
        let upper = region.upper_vec2();
        let extent = upper - lower;
        let nx = (extent.x / self.spacing).floor() as usize + 1;
        let ny = (extent.y / self.spacing).floor() as usize + 1;
        let half_jitter = 0.5 * self.jitter * self.spacing;

        let mut new_positions = Vec::new();
        'fill: for j in 0..ny {
            for i in 0..nx {
                if new_positions.len() >= budget {
                    break 'fill;
                }
                let mut p = lower + self.spacing * Vec2::new(i as f32, j as f32);
                if half_jitter > 0.0 {
                    let offset = Vec2::new(
                        self.rng.gen_range(-1.0..=1.0),
                        self.rng.gen_range(-1.0..=1.0),
                    );
                    p += half_jitter * offset;
                }

                if !self.bounds.contains_vec2(p) || self.surface.signed_distance(p) > 0.0 {
                    continue;
                }
                if let Some(s) = &searcher {
                    if s.has_nearby_point(p, self.spacing) {
                        continue;
                    }
                }
                new_positions.push(p);
            }
        }

        let velocities = vec![self.initial_velocity; new_positions.len()];
        particles.add_particles(&new_positions, &velocities, &[])?;
        self.number_of_emitted += new_positions.len();

        if self.is_one_shot {
            self.set_is_enabled(false);
        }

        log::debug!(
            "Volume emitter added {} particles ({} total)",
            new_positions.len(),
            self.number_of_emitted
        );
        Ok(new_positions.len())
    }
}

/// Candidate points of a `spacing` lattice over `bounds`. Infinite or NaN
/// for non-finite bounds.
fn lattice_point_count(bounds: &BoundingBox2F, spacing: f32) -> f64 {
    let extent = bounds.upper_vec2().as_dvec2() - bounds.lower_vec2().as_dvec2();
    let per_axis = |e: f64| ((e / spacing as f64).floor() + 1.0).max(0.0);
    per_axis(extent.x) * per_axis(extent.y)
}

/// Builder for [`VolumeParticleEmitter2`].
pub struct VolumeParticleEmitter2Builder {
    surface: Option<Arc<dyn Surface2>>,
    bounds: Option<BoundingBox2F>,
    spacing: f32,
    initial_velocity: Vec2,
    max_number_of_particles: usize,
    jitter: f32,
    is_one_shot: bool,
    allow_overlapping: bool,
    seed: u64,
}

impl Default for VolumeParticleEmitter2Builder {
    fn default() -> Self {
        Self {
            surface: None,
            bounds: None,
            spacing: 0.1,
            initial_velocity: Vec2::ZERO,
            max_number_of_particles: usize::MAX,
            jitter: 0.0,
            is_one_shot: true,
            allow_overlapping: false,
            seed: 0,
        }
    }
}

impl VolumeParticleEmitter2Builder {
    pub fn with_surface(mut self, surface: Arc<dyn Surface2>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Defaults to the surface's bounding box.
    pub fn with_max_region(mut self, bounds: BoundingBox2F) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_initial_velocity(mut self, velocity: Vec2) -> Self {
        self.initial_velocity = velocity;
        self
    }

    pub fn with_max_number_of_particles(mut self, n: usize) -> Self {
        self.max_number_of_particles = n;
        self
    }

    /// Jitter as a fraction of the spacing, in `[0, 1]`.
    pub fn with_jitter(mut self, jitter: f32) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_is_one_shot(mut self, one_shot: bool) -> Self {
        self.is_one_shot = one_shot;
        self
    }

    pub fn with_allow_overlapping(mut self, allow: bool) -> Self {
        self.allow_overlapping = allow;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> SimResult<VolumeParticleEmitter2> {
        let surface = self
            .surface
            .ok_or_else(|| SimError::configuration("surface", "volume emitter needs a surface"))?;
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(SimError::configuration(
                "spacing",
                format!("must be positive, got {}", self.spacing),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(SimError::configuration(
                "jitter",
                format!("must be in [0, 1], got {}", self.jitter),
            ));
        }
        let bounds = match self.bounds {
            Some(b) => b,
            None if surface.is_bounded() => surface.bounding_box(),
            None => {
                return Err(SimError::configuration(
                    "max_region",
                    "an unbounded surface needs an explicit region",
                ))
            }
        };
        let candidates = lattice_point_count(&bounds, self.spacing);
        if !(candidates <= MAX_EMITTER_LATTICE_POINTS as f64) {
            return Err(SimError::configuration(
                "spacing",
                format!(
                    "a spacing of {} gives {:e} lattice points in {:?}, more than {}",
                    self.spacing, candidates, bounds, MAX_EMITTER_LATTICE_POINTS
                ),
            ));
        }

        Ok(VolumeParticleEmitter2 {
            state: EmitterState::default(),
            surface,
            bounds,
            spacing: self.spacing,
            initial_velocity: self.initial_velocity,
            max_number_of_particles: self.max_number_of_particles,
            jitter: self.jitter,
            is_one_shot: self.is_one_shot,
            allow_overlapping: self.allow_overlapping,
            number_of_emitted: 0,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
        })
    }
}
