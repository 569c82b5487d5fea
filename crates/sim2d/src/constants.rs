//! Physical and numerical constants for the 2D solvers.
//!
//! ## Units
//!
//! Everything is SI (meters, seconds, kilograms). Grid spacing is per axis,
//! so "cell size" always means the component along the axis in question.

/// Gravity acceleration (m/s^2) - negative Y direction
pub const GRAVITY: f32 = -9.8;

/// Density of water (kg/m^3)
pub const WATER_DENSITY: f32 = 1000.0;

/// Rest density of fresh snow (kg/m^3)
pub const SNOW_DENSITY: f32 = 400.0;

/// Default particle radius (m)
pub const DEFAULT_PARTICLE_RADIUS: f32 = 1e-3;

/// Default particle mass (kg)
pub const DEFAULT_PARTICLE_MASS: f32 = 1e-3;

/// Support radius of the quadratic B-spline, in cells.
pub const BSPLINE_SUPPORT_RADIUS: f32 = 1.5;

/// Weights and masses below this are treated as empty.
pub const MASS_EPSILON: f32 = 1e-10;

/// Hard cap on particle speed after G2P (m/s).
pub const MAX_PARTICLE_VELOCITY: f32 = 100.0;

/// Default CFL number used for adaptive sub-stepping.
pub const DEFAULT_MAX_CFL: f32 = 5.0;

/// Default pressure solver iteration budget.
pub const DEFAULT_PRESSURE_ITERATIONS: usize = 200;

/// Default relative tolerance of the pressure solve.
pub const DEFAULT_PRESSURE_TOLERANCE: f32 = 1e-4;

/// Explicit diffusion sub-steps keep nu*dt*(1/dx^2 + 1/dy^2) below this.
pub const VISCOSITY_STABILITY_LIMIT: f32 = 0.25;

/// Upper bound on adaptive sub-steps per `advance` call.
pub const MAX_SUBSTEPS: usize = 64;

/// Upper bound on candidate lattice points of one volume emitter.
pub const MAX_EMITTER_LATTICE_POINTS: usize = 1 << 24;
