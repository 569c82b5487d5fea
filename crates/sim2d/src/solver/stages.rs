//! Pluggable sub-stages of a grid step.

use crate::geometry::Collider2;
use crate::grid::advection::advect_velocity;
use crate::grid::boundary::apply_boundary_conditions;
use crate::grid::forces::apply_gravity;
use crate::grid::pressure::project;
use crate::grid::viscosity::apply_viscosity;
use crate::grid::{GridSystemData2, PressureSolveReport};
use crate::solver::config::GridSolverParams;

/// The stages of one grid step. Every stage has a default implementation;
/// a custom solver overrides only the stages it changes.
pub trait GridStages: Send {
    /// Self-advection of the velocity field. Only the pure grid solver calls
    /// this; hybrid solvers move velocity with their particles.
    fn advect(&mut self, grid: &mut GridSystemData2, _params: &GridSolverParams, dt: f32) {
        advect_velocity(grid, dt);
    }

    fn apply_forces(&mut self, grid: &mut GridSystemData2, params: &GridSolverParams, dt: f32) {
        apply_gravity(grid, params.gravity, dt);
    }

    fn apply_boundary_conditions(
        &mut self,
        grid: &mut GridSystemData2,
        params: &GridSolverParams,
        collider: Option<&dyn Collider2>,
    ) {
        apply_boundary_conditions(grid, params.closed_boundaries, collider);
    }

    fn project(
        &mut self,
        grid: &mut GridSystemData2,
        params: &GridSolverParams,
        dt: f32,
    ) -> Option<PressureSolveReport> {
        project(grid, params.closed_boundaries, &params.pressure, params.density, dt)
    }

    fn post_process(&mut self, grid: &mut GridSystemData2, params: &GridSolverParams, dt: f32) {
        apply_viscosity(grid, params.viscosity, dt);
    }
}

/// Gravity, wall/collider boundaries, pressure projection and viscosity.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultGridStages;

impl GridStages for DefaultGridStages {}
