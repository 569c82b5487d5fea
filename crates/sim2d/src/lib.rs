//! 2D grid/particle hybrid solvers
//!
//! A staggered MAC grid solver with pluggable stages, and hybrid solvers that
//! carry material on particles and solve forces and pressure on the grid:
//! snow MPM, APIC, FLIP and PIC.
//!
//! # Example
//!
//! ```
//! use sim2d::{HybridSolver2, PhysicsAnimation, Vec2};
//!
//! let mut solver = HybridSolver2::flip_builder()
//!     .with_resolution([16, 16])
//!     .with_grid_spacing(Vec2::splat(0.1))
//!     .build()
//!     .unwrap();
//!
//! // A block of water in the lower left corner
//! let particles = solver.particle_system_data_mut();
//! for j in 0..8 {
//!     for i in 0..8 {
//!         let p = Vec2::new(i as f32 + 0.5, j as f32 + 0.5) * 0.05;
//!         particles.add_particle(p, Vec2::ZERO, Vec2::ZERO);
//!     }
//! }
//!
//! let report = solver.advance(1.0 / 60.0).unwrap();
//! assert_eq!(report.particle_count, 64);
//! ```

pub mod array;
pub mod bounding_box;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod kernels;
pub mod particle;
pub mod serde_utils;
pub mod solver;

pub use array::{Array, Array1, Array2, Array3};
pub use bounding_box::{BoundingBox, BoundingBox2D, BoundingBox2F, BoundingBox3D, BoundingBox3F};
pub use error::{SimError, SimResult};
pub use geometry::{
    Box2, Collider2, ImplicitSurfaceSet2, Plane2, RigidBodyCollider2, Sphere2, Surface2,
    Transform2,
};
pub use glam::{Mat2, Vec2};
pub use grid::{
    CellType, ClosedBoundaries, ConvergenceWarning, GridSystemData2, PressureSolveReport,
    PressureSolverConfig, PressureSolverKind,
};
pub use particle::{
    ParticleEmitter2, ParticleEmitterSet2, ParticleSystemData2, PointParticleEmitter2,
    VolumeParticleEmitter2,
};
pub use solver::{
    GridFluidSolver2, GridFluidSolverConfig, HybridSolver2, HybridSolverConfig, PhysicsAnimation,
    SnowMaterial, StepReport, TransferKind,
};
