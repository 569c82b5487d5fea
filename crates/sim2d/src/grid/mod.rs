//! Eulerian side: the staggered grid and the operators that act on it.

pub mod advection;
pub mod boundary;
pub mod extrapolation;
pub mod forces;
mod grid_system;
pub mod pressure;
pub mod viscosity;

pub use boundary::ClosedBoundaries;
pub use grid_system::{sample_bilinear, CellType, GridSystemData2};
pub use pressure::{
    ConvergenceWarning, PressureSolveReport, PressureSolverConfig, PressureSolverKind,
};
