//! Time stepping: the pure grid solver, the particle-grid transfers and the
//! hybrid solver that composes them.

pub mod animation;
pub mod config;
pub mod constitutive;
pub mod grid_fluid_solver;
pub mod hybrid;
pub mod mpm;
pub mod stages;
pub mod transfer;

pub use animation::{PhysicsAnimation, SolverDiagnostics, StepReport};
pub use config::{GridFluidSolverConfig, GridSolverParams, HybridSolverConfig, TransferKind};
pub use constitutive::SnowMaterial;
pub use grid_fluid_solver::{GridFluidSolver2, GridFluidSolverBuilder};
pub use hybrid::{HybridSolver2, HybridSolverBuilder};
pub use mpm::MpmTransfer;
pub use stages::{DefaultGridStages, GridStages};
pub use transfer::{ApicTransfer, ParticleTransfer, TransferScheme};
