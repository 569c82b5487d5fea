//! Particle emitters.
//!
//! An emitter is bound to one particle system by id. The owning solver calls
//! [`ParticleEmitter2::update`] once per sub-step, before transferring
//! particles to the grid.

use crate::error::{SimError, SimResult};
use crate::particle::particle_system::{ParticleSystemData2, ParticleSystemId};

/// Target and on/off switch shared by all emitters.
#[derive(Clone, Copy, Debug)]
pub struct EmitterState {
    pub target: Option<ParticleSystemId>,
    pub is_enabled: bool,
}

impl Default for EmitterState {
    fn default() -> Self {
        Self {
            target: None,
            is_enabled: true,
        }
    }
}

/// Fail unless `target` is the id of `particles`.
fn check_target(target: Option<ParticleSystemId>, particles: &ParticleSystemData2) -> SimResult<()> {
    match target {
        Some(id) if id == particles.id() => Ok(()),
        Some(id) => Err(SimError::invariant(
            "ParticleEmitter2::update",
            format!(
                "emitter targets {:?} but was given {:?}",
                id,
                particles.id()
            ),
        )),
        None => Err(SimError::invariant(
            "ParticleEmitter2::update",
            "emitter has no target particle system",
        )),
    }
}

pub trait ParticleEmitter2: Send {
    fn state(&self) -> &EmitterState;

    fn state_mut(&mut self) -> &mut EmitterState;

    /// Emit into `particles`, returning how many particles were added.
    fn emit(
        &mut self,
        particles: &mut ParticleSystemData2,
        current_time: f64,
        dt: f32,
    ) -> SimResult<usize>;

    fn target(&self) -> Option<ParticleSystemId> {
        self.state().target
    }

    fn set_target(&mut self, target: ParticleSystemId) {
        self.state_mut().target = Some(target);
    }

    fn is_enabled(&self) -> bool {
        self.state().is_enabled
    }

    fn set_is_enabled(&mut self, enabled: bool) {
        self.state_mut().is_enabled = enabled;
    }

    /// Check the target, then emit if enabled.
    fn update(
        &mut self,
        particles: &mut ParticleSystemData2,
        current_time: f64,
        dt: f32,
    ) -> SimResult<usize> {
        check_target(self.target(), particles)?;

        if !self.is_enabled() {
            return Ok(0);
        }
        self.emit(particles, current_time, dt)
    }
}

/// Several emitters driven as one.
#[derive(Default)]
pub struct ParticleEmitterSet2 {
    state: EmitterState,
    emitters: Vec<Box<dyn ParticleEmitter2>>,
}

impl ParticleEmitterSet2 {
    pub fn new(emitters: Vec<Box<dyn ParticleEmitter2>>) -> Self {
        Self {
            state: EmitterState::default(),
            emitters,
        }
    }

    /// Add an emitter; it picks up the set's current target.
    pub fn add_emitter(&mut self, mut emitter: Box<dyn ParticleEmitter2>) {
        if let Some(target) = self.state.target {
            emitter.set_target(target);
        }
        self.emitters.push(emitter);
    }

    pub fn number_of_emitters(&self) -> usize {
        self.emitters.len()
    }
}

impl ParticleEmitter2 for ParticleEmitterSet2 {
    fn state(&self) -> &EmitterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EmitterState {
        &mut self.state
    }

    fn set_target(&mut self, target: ParticleSystemId) {
        self.state.target = Some(target);
        for emitter in &mut self.emitters {
            emitter.set_target(target);
        }
    }

    /// Every child's target is checked before any child emits, so a
    /// mistargeted child leaves `particles` untouched. An error from a
    /// child's own `emit` still leaves the particles added by the children
    /// before it.
    fn emit(
        &mut self,
        particles: &mut ParticleSystemData2,
        current_time: f64,
        dt: f32,
    ) -> SimResult<usize> {
        for emitter in &self.emitters {
            check_target(emitter.target(), particles)?;
        }
        let mut emitted = 0;
        for emitter in &mut self.emitters {
            emitted += emitter.update(particles, current_time, dt)?;
        }
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    /// Adds one particle per call.
    #[derive(Default)]
    struct Dripper {
        state: EmitterState,
    }

    impl ParticleEmitter2 for Dripper {
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
            particles.add_particle(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO);
            Ok(1)
        }
    }

    #[test]
    fn test_update_requires_matching_target() {
        let mut particles = ParticleSystemData2::default();
        let other = ParticleSystemData2::default();
        let mut emitter = Dripper::default();

        assert!(emitter.update(&mut particles, 0.0, 0.1).is_err());

        emitter.set_target(other.id());
        let err = emitter.update(&mut particles, 0.0, 0.1).unwrap_err();
        assert!(matches!(err, SimError::InvariantViolation { .. }));
        assert_eq!(particles.number_of_particles(), 0);

        emitter.set_target(particles.id());
        assert_eq!(emitter.update(&mut particles, 0.0, 0.1).unwrap(), 1);
    }

    #[test]
    fn test_disabled_emitter_is_skipped() {
        let mut particles = ParticleSystemData2::default();
        let mut emitter = Dripper::default();
        emitter.set_target(particles.id());
        emitter.set_is_enabled(false);
        assert_eq!(emitter.update(&mut particles, 0.0, 0.1).unwrap(), 0);
        assert!(particles.is_empty());
    }

    #[test]
    fn test_set_propagates_target() {
        let mut particles = ParticleSystemData2::default();
        let mut set = ParticleEmitterSet2::new(vec![Box::new(Dripper::default())]);
        set.set_target(particles.id());
        set.add_emitter(Box::new(Dripper::default()));
        assert_eq!(set.number_of_emitters(), 2);
        assert_eq!(set.update(&mut particles, 0.0, 0.1).unwrap(), 2);
        assert_eq!(particles.number_of_particles(), 2);
    }

    #[test]
    fn test_set_checks_every_target_before_emitting() {
        let mut particles = ParticleSystemData2::default();
        let other = ParticleSystemData2::default();
        let mut set = ParticleEmitterSet2::default();
        set.set_target(particles.id());
        set.add_emitter(Box::new(Dripper::default()));

        let mut stray = Dripper::default();
        stray.set_target(other.id());
        set.emitters.push(Box::new(stray));

        let err = set.update(&mut particles, 0.0, 0.1).unwrap_err();
        assert!(matches!(err, SimError::InvariantViolation { .. }));
        assert!(particles.is_empty());
    }
}
