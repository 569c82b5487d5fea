//! Pure grid fluid solver; also the grid half of the hybrid solver.

use std::sync::Arc;

use glam::Vec2;
use parking_lot::Mutex;

use crate::constants::MAX_SUBSTEPS;
use crate::error::SimResult;
use crate::geometry::Collider2;
use crate::grid::boundary::update_collider_cells;
use crate::grid::extrapolation::extrapolate_velocities;
use crate::grid::{ClosedBoundaries, GridSystemData2, PressureSolveReport, PressureSolverConfig};
use crate::solver::animation::{validate_time_step, PhysicsAnimation, SolverDiagnostics, StepReport};
use crate::solver::config::{GridFluidSolverConfig, GridSolverParams};
use crate::solver::stages::{DefaultGridStages, GridStages};

/// Sub-steps needed to keep `cfl` under `max_cfl`, at least one.
pub(crate) fn substeps_for_cfl(cfl: f32, max_cfl: f32) -> usize {
    let n = (cfl / max_cfl).ceil();
    if n.is_finite() && n > 1.0 {
        (n as usize).min(MAX_SUBSTEPS)
    } else if n.is_finite() {
        1
    } else {
        MAX_SUBSTEPS
    }
}

pub struct GridFluidSolver2 {
    grid: GridSystemData2,
    params: GridSolverParams,
    stages: Box<dyn GridStages>,
    collider: Option<Arc<dyn Collider2>>,
    pub(crate) current_frame: u64,
    pub(crate) current_time: f64,
    pub(crate) diagnostics: SolverDiagnostics,
}

impl std::fmt::Debug for GridFluidSolver2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridFluidSolver2")
            .field("grid", &self.grid)
            .field("params", &self.params)
            .field("has_collider", &self.collider.is_some())
            .field("current_frame", &self.current_frame)
            .field("current_time", &self.current_time)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

impl GridFluidSolver2 {
    pub fn builder() -> GridFluidSolverBuilder {
        GridFluidSolverBuilder::default()
    }

    fn from_config(config: &GridFluidSolverConfig) -> SimResult<Self> {
        config.validate()?;
        let grid = GridSystemData2::new(config.resolution, config.grid_spacing, config.grid_origin)?;
        Ok(Self {
            grid,
            params: config.params,
            stages: Box::new(DefaultGridStages),
            collider: None,
            current_frame: 0,
            current_time: 0.0,
            diagnostics: SolverDiagnostics::default(),
        })
    }

    pub fn grid(&self) -> &GridSystemData2 {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut GridSystemData2 {
        &mut self.grid
    }

    pub fn params(&self) -> &GridSolverParams {
        &self.params
    }

    pub fn set_params(&mut self, params: GridSolverParams) -> SimResult<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn collider(&self) -> Option<&Arc<dyn Collider2>> {
        self.collider.as_ref()
    }

    pub fn set_collider(&mut self, collider: Option<Arc<dyn Collider2>>) {
        self.collider = collider;
    }

    /// Replace the grid step strategy.
    pub fn set_grid_stages(&mut self, stages: Box<dyn GridStages>) {
        self.stages = stages;
    }

    /// Change the grid geometry. Every field is reset.
    pub fn resize_grid(&mut self, resolution: [usize; 2], spacing: Vec2, origin: Vec2) -> SimResult<()> {
        self.grid.resize(resolution, spacing, origin)
    }

    /// Sub-steps for a step of `dt` at the current grid velocities.
    pub fn number_of_substeps(&self, dt: f32) -> usize {
        if self.params.use_adaptive_substeps {
            substeps_for_cfl(self.grid.cfl(dt), self.params.max_cfl)
        } else {
            1
        }
    }

    /// Resample the collider onto the grid and mark its cells solid.
    pub fn update_collider(&mut self) {
        update_collider_cells(&mut self.grid, self.collider.as_deref());
    }

    /// Forces, boundaries, projection, post-processing and extrapolation on
    /// the current grid velocities. Boundaries are applied last so walls stay
    /// closed after extrapolation.
    pub fn step_grid_physics(&mut self, dt: f32) -> Option<PressureSolveReport> {
        let collider = self.collider.as_deref();
        let stages = self.stages.as_mut();

        stages.apply_forces(&mut self.grid, &self.params, dt);
        stages.apply_boundary_conditions(&mut self.grid, &self.params, collider);
        let report = stages.project(&mut self.grid, &self.params, dt);
        stages.post_process(&mut self.grid, &self.params, dt);
        extrapolate_velocities(&mut self.grid, self.params.extrapolation_depth);
        stages.apply_boundary_conditions(&mut self.grid, &self.params, collider);

        self.diagnostics.record_pressure(&report);
        report
    }

    fn substep(&mut self, dt: f32) -> Option<PressureSolveReport> {
        self.update_collider();
        self.grid.fill_fluid();
        self.stages.advect(&mut self.grid, &self.params, dt);
        self.step_grid_physics(dt)
    }

    pub(crate) fn finish_frame(&mut self, dt: f32, substeps: usize) {
        self.current_frame += 1;
        self.current_time += dt as f64;
        self.diagnostics.frames += 1;
        self.diagnostics.substeps += substeps as u64;
    }
}

impl PhysicsAnimation for GridFluidSolver2 {
    fn advance(&mut self, dt: f32) -> SimResult<StepReport> {
        validate_time_step(dt)?;
        let mut report = StepReport::default();
        if dt == 0.0 {
            return Ok(report);
        }

        let substeps = self.number_of_substeps(dt);
        let sub_dt = dt / substeps as f32;
        for _ in 0..substeps {
            let pressure = self.substep(sub_dt);
            report.record_pressure(pressure);
        }
        report.substeps = substeps;

        self.finish_frame(dt, substeps);
        log::debug!(
            "grid frame {}: {} substeps, max velocity {:?}",
            self.current_frame,
            substeps,
            self.grid.max_velocity()
        );
        Ok(report)
    }

    fn current_frame(&self) -> u64 {
        self.current_frame
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }

    fn grid(&self) -> &GridSystemData2 {
        &self.grid
    }

    fn diagnostics(&self) -> &SolverDiagnostics {
        &self.diagnostics
    }
}

/// Fluent construction of a [`GridFluidSolver2`]. Nothing is validated
/// until [`GridFluidSolverBuilder::build`].
#[derive(Default)]
pub struct GridFluidSolverBuilder {
    config: GridFluidSolverConfig,
    domain_size_x: Option<f32>,
    stages: Option<Box<dyn GridStages>>,
    collider: Option<Arc<dyn Collider2>>,
}

impl GridFluidSolverBuilder {
    pub fn with_config(mut self, config: GridFluidSolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_resolution(mut self, resolution: [usize; 2]) -> Self {
        self.config.resolution = resolution;
        self
    }

    pub fn with_grid_spacing(mut self, spacing: Vec2) -> Self {
        self.config.grid_spacing = spacing;
        self.domain_size_x = None;
        self
    }

    /// Square cells sized so the grid spans `size` along x.
    pub fn with_domain_size_x(mut self, size: f32) -> Self {
        self.domain_size_x = Some(size);
        self
    }

    pub fn with_grid_origin(mut self, origin: Vec2) -> Self {
        self.config.grid_origin = origin;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.config.params.gravity = gravity;
        self
    }

    pub fn with_viscosity(mut self, viscosity: f32) -> Self {
        self.config.params.viscosity = viscosity;
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.config.params.density = density;
        self
    }

    pub fn with_pressure_solver(mut self, pressure: PressureSolverConfig) -> Self {
        self.config.params.pressure = pressure;
        self
    }

    pub fn with_max_cfl(mut self, max_cfl: f32) -> Self {
        self.config.params.max_cfl = max_cfl;
        self
    }

    pub fn with_adaptive_substeps(mut self, adaptive: bool) -> Self {
        self.config.params.use_adaptive_substeps = adaptive;
        self
    }

    pub fn with_closed_boundaries(mut self, walls: ClosedBoundaries) -> Self {
        self.config.params.closed_boundaries = walls;
        self
    }

    pub fn with_extrapolation_depth(mut self, depth: usize) -> Self {
        self.config.params.extrapolation_depth = depth;
        self
    }

    pub fn with_collider(mut self, collider: Arc<dyn Collider2>) -> Self {
        self.collider = Some(collider);
        self
    }

    pub fn with_grid_stages(mut self, stages: Box<dyn GridStages>) -> Self {
        self.stages = Some(stages);
        self
    }

    /// The configuration `build` will validate, with the domain size applied.
    pub fn config(&self) -> GridFluidSolverConfig {
        let mut config = self.config;
        if let Some(size) = self.domain_size_x {
            let width = config.resolution[0].max(1) as f32;
            config.grid_spacing = Vec2::splat(size / width);
        }
        config
    }

    pub fn build(self) -> SimResult<GridFluidSolver2> {
        let config = self.config();
        let mut solver = GridFluidSolver2::from_config(&config)?;
        if let Some(stages) = self.stages {
            solver.stages = stages;
        }
        solver.collider = self.collider;
        solver.update_collider();

        log::info!(
            "built grid solver: resolution {:?}, spacing {:?}, origin {:?}",
            config.resolution,
            config.grid_spacing,
            config.grid_origin
        );
        Ok(solver)
    }

    pub fn build_shared(self) -> SimResult<Arc<Mutex<GridFluidSolver2>>> {
        Ok(Arc::new(Mutex::new(self.build()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GRAVITY;
    use crate::geometry::{Box2, RigidBodyCollider2};
    use crate::grid::CellType;

    #[test]
    fn test_builder_rejects_bad_spacing() {
        let result = GridFluidSolver2::builder()
            .with_resolution([4, 4])
            .with_grid_spacing(Vec2::new(0.0, 1.0))
            .build();
        assert!(result.unwrap_err().is_configuration());

        let result = GridFluidSolver2::builder()
            .with_resolution([4, 4])
            .with_domain_size_x(-1.0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_domain_size_sets_square_cells() {
        let solver = GridFluidSolver2::builder()
            .with_resolution([8, 4])
            .with_domain_size_x(2.0)
            .build()
            .unwrap();
        assert_eq!(solver.grid().spacing(), Vec2::splat(0.25));
        let bounds = solver.grid().bounding_box();
        assert!((bounds.upper_vec2() - Vec2::new(2.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn test_zero_dt_is_noop() {
        let mut solver = GridFluidSolver2::builder().with_resolution([4, 4]).build().unwrap();
        let report = solver.advance(0.0).unwrap();
        assert_eq!(report.substeps, 0);
        assert_eq!(solver.current_frame(), 0);
        assert_eq!(solver.current_time(), 0.0);
        assert!(solver.grid().v().iter().all(|v| *v == 0.0));
        assert!(solver.advance(-1.0).unwrap_err().is_configuration());
    }

    #[test]
    fn test_gravity_without_projection() {
        let mut solver = GridFluidSolver2::builder()
            .with_resolution([4, 4])
            .with_pressure_solver(PressureSolverConfig::none())
            .build()
            .unwrap();
        let report = solver.advance(0.1).unwrap();
        assert_eq!(report.substeps, 1);
        assert!(report.pressure.is_none());
        // Interior faces accelerate, closed walls stay at zero
        let v = solver.grid().v();
        assert!((v[(1, 2)] - GRAVITY * 0.1).abs() < 1e-5);
        assert_eq!(v[(1, 0)], 0.0);
        assert_eq!(v[(1, 4)], 0.0);
        assert_eq!(solver.current_frame(), 1);
        assert!((solver.current_time() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_closed_box_stays_at_rest() {
        let mut solver = GridFluidSolver2::builder()
            .with_resolution([6, 6])
            .build()
            .unwrap();
        let report = solver.advance(0.05).unwrap();
        assert!(report.pressure.unwrap().converged);
        let max = solver.grid().max_velocity();
        assert!(max.max_element() < 1e-2, "max velocity {:?}", max);
        // Hydrostatic: pressure grows with depth
        let p = solver.grid().pressure();
        assert!(p[(2, 0)] > p[(2, 5)]);
        assert_eq!(solver.diagnostics().pressure_solves, 1);
    }

    #[test]
    fn test_collider_cells_are_solid() {
        let obstacle = Box2::new(Vec2::ZERO, Vec2::new(4.0, 1.0));
        let collider = RigidBodyCollider2::new(Arc::new(obstacle));
        let solver = GridFluidSolver2::builder()
            .with_resolution([4, 4])
            .with_collider(Arc::new(collider))
            .build()
            .unwrap();
        let cells = solver.grid().cell_type();
        assert_eq!(cells[(1, 0)], CellType::Solid);
        assert_ne!(cells[(1, 2)], CellType::Solid);
    }

    #[test]
    fn test_substeps_follow_cfl() {
        assert_eq!(substeps_for_cfl(0.0, 5.0), 1);
        assert_eq!(substeps_for_cfl(5.0, 5.0), 1);
        assert_eq!(substeps_for_cfl(5.1, 5.0), 2);
        assert_eq!(substeps_for_cfl(f32::INFINITY, 5.0), MAX_SUBSTEPS);
        assert_eq!(substeps_for_cfl(1e9, 1.0), MAX_SUBSTEPS);

        let mut solver = GridFluidSolver2::builder()
            .with_resolution([4, 4])
            .with_max_cfl(1.0)
            .build()
            .unwrap();
        solver.grid_mut().u_mut().fill(10.0);
        assert_eq!(solver.number_of_substeps(0.25), 3);
        let mut params = *solver.params();
        params.use_adaptive_substeps = false;
        solver.set_params(params).unwrap();
        assert_eq!(solver.number_of_substeps(0.25), 1);
    }

    #[test]
    fn test_build_shared() {
        let shared = GridFluidSolver2::builder().with_resolution([2, 2]).build_shared().unwrap();
        shared.lock().advance(0.01).unwrap();
        assert_eq!(shared.lock().current_frame(), 1);
    }
}
