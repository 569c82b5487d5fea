//! Lagrangian side: particle storage, neighbor search and emitters.

pub mod emitter;
pub mod neighbor;
pub mod particle_system;
pub mod point_emitter;
pub mod volume_emitter;

pub use emitter::{EmitterState, ParticleEmitter2, ParticleEmitterSet2};
pub use neighbor::PointHashGridSearcher2;
pub use particle_system::{ParticleSystemData2, ParticleSystemId};
pub use point_emitter::PointParticleEmitter2;
pub use volume_emitter::{VolumeParticleEmitter2, VolumeParticleEmitter2Builder};
