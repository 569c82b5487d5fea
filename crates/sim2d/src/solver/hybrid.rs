//! Particle-grid hybrid solver (MPM, APIC, FLIP, PIC).
//!
//! Material state lives on the particles; forces, boundaries and pressure are
//! solved on the grid of the inner [`GridFluidSolver2`]. One sub-step:
//!
//! 1. emit into the particle system, clamp stray particles into the domain
//! 2. classify cells from particle positions
//! 3. P2G, then snapshot the grid velocities
//! 4. grid physics (forces, boundaries, projection, post-processing)
//! 5. G2P
//! 6. advect particles, resolve collider contacts, drop non-finite
//!    particles and clamp the rest to the domain

use std::sync::Arc;

use glam::Vec2;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::error::SimResult;
use crate::geometry::Collider2;
use crate::grid::advection::{advect_particles, clamp_particles_to_domain};
use crate::grid::{ClosedBoundaries, GridSystemData2, PressureSolverConfig};
use crate::particle::{ParticleEmitter2, ParticleSystemData2};
use crate::solver::animation::{validate_time_step, PhysicsAnimation, SolverDiagnostics, StepReport};
use crate::solver::config::{HybridSolverConfig, TransferKind};
use crate::solver::constitutive::SnowMaterial;
use crate::solver::grid_fluid_solver::{substeps_for_cfl, GridFluidSolver2, GridFluidSolverBuilder};
use crate::solver::mpm::MpmTransfer;
use crate::solver::stages::GridStages;
use crate::solver::transfer::{ApicTransfer, ParticleTransfer, TransferScheme};

pub struct HybridSolver2 {
    base: GridFluidSolver2,
    particles: ParticleSystemData2,
    emitter: Option<Box<dyn ParticleEmitter2>>,
    transfer: Box<dyn ParticleTransfer>,
    restitution: f32,
}

impl std::fmt::Debug for HybridSolver2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSolver2")
            .field("base", &self.base)
            .field("particles", &self.particles)
            .field("has_emitter", &self.emitter.is_some())
            .field("restitution", &self.restitution)
            .finish_non_exhaustive()
    }
}

impl HybridSolver2 {
    /// Builder with FLIP transfer and default parameters.
    pub fn builder() -> HybridSolverBuilder {
        HybridSolverBuilder::default()
    }

    /// Snow MPM. Stress comes from the particles, so pressure projection is off.
    pub fn mpm_builder() -> HybridSolverBuilder {
        Self::builder()
            .with_transfer(TransferKind::Mpm)
            .with_pressure_solver(PressureSolverConfig::none())
    }

    pub fn apic_builder() -> HybridSolverBuilder {
        Self::builder().with_transfer(TransferKind::Apic)
    }

    pub fn flip_builder() -> HybridSolverBuilder {
        Self::builder().with_transfer(TransferKind::default())
    }

    pub fn pic_builder() -> HybridSolverBuilder {
        Self::builder().with_transfer(TransferKind::Pic)
    }

    pub fn from_config(config: &HybridSolverConfig) -> SimResult<Self> {
        Self::builder().with_config(*config).build()
    }

    pub fn grid_solver(&self) -> &GridFluidSolver2 {
        &self.base
    }

    pub fn grid_solver_mut(&mut self) -> &mut GridFluidSolver2 {
        &mut self.base
    }

    pub fn particle_system_data(&self) -> &ParticleSystemData2 {
        &self.particles
    }

    pub fn particle_system_data_mut(&mut self) -> &mut ParticleSystemData2 {
        &mut self.particles
    }

    pub fn transfer(&self) -> &dyn ParticleTransfer {
        self.transfer.as_ref()
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn particle_emitter(&self) -> Option<&dyn ParticleEmitter2> {
        self.emitter.as_deref()
    }

    pub fn particle_emitter_mut(&mut self) -> Option<&mut (dyn ParticleEmitter2 + 'static)> {
        self.emitter.as_deref_mut()
    }

    /// Attach `emitter`, retargeting it to this solver's particle system.
    /// Returns the emitter it replaces.
    pub fn set_particle_emitter(
        &mut self,
        mut emitter: Box<dyn ParticleEmitter2>,
    ) -> Option<Box<dyn ParticleEmitter2>> {
        emitter.set_target(self.particles.id());
        self.emitter.replace(emitter)
    }

    pub fn take_particle_emitter(&mut self) -> Option<Box<dyn ParticleEmitter2>> {
        self.emitter.take()
    }

    /// Sub-steps for a step of `dt`: enough to keep the particle CFL under
    /// the configured maximum (when adaptive) and to respect the transfer's
    /// own stability bound.
    pub fn number_of_substeps(&self, dt: f32) -> usize {
        let params = self.base.params();
        let grid = self.base.grid();

        let mut substeps = 1;
        if params.use_adaptive_substeps {
            let spacing = grid.spacing();
            let cfl = self
                .particles
                .velocities()
                .par_iter()
                .map(|v| (v.abs() * dt / spacing).max_element())
                .reduce(|| 0.0, f32::max);
            substeps = substeps_for_cfl(cfl, params.max_cfl);
        }
        if let Some(limit) = self.transfer.max_stable_dt(grid) {
            if limit > 0.0 {
                substeps = substeps.max(substeps_for_cfl(dt, limit));
            }
        }
        substeps
    }

    fn resolve_collisions(&mut self) {
        let Some(collider) = self.base.collider().cloned() else {
            return;
        };
        let radius = self.particles.radius();
        let restitution = self.restitution;
        let (positions, velocities) = self.particles.positions_and_velocities_mut();
        positions
            .par_iter_mut()
            .zip(velocities.par_iter_mut())
            .for_each(|(p, v)| collider.resolve_collision(radius, restitution, p, v));
    }

    fn substep(&mut self, dt: f32, time: f64, report: &mut StepReport) -> SimResult<()> {
        // 1. Emit
        if let Some(emitter) = self.emitter.as_mut() {
            report.emitted += emitter.update(&mut self.particles, time, dt)?;
        }
        self.transfer.prepare(&mut self.particles);
        self.particles.validate()?;
        // Particles added or emitted outside the grid would not reach any node
        self.confine_particles();

        // 2. Classify cells (collider cells first, so particles never mark them fluid)
        self.base.update_collider();
        self.base.grid_mut().mark_fluid_cells(self.particles.positions());

        // 3. P2G
        self.transfer
            .particles_to_grid(self.base.grid_mut(), &self.particles, dt);
        self.base.grid_mut().store_old_velocities();

        // 4. Grid physics
        report.record_pressure(self.base.step_grid_physics(dt));

        // 5. G2P
        self.transfer
            .grid_to_particles(self.base.grid(), &mut self.particles, dt);

        // 6. Advect and keep particles out of solids
        advect_particles(&mut self.particles, dt);
        self.resolve_collisions();
        self.confine_particles();
        Ok(())
    }

    /// Drop particles with non-finite state, then clamp the rest into the
    /// grid domain.
    fn confine_particles(&mut self) {
        let removed = self
            .particles
            .retain(|p, v| p.is_finite() && v.is_finite());
        if removed > 0 {
            log::warn!("removed {} particles with non-finite state", removed);
            self.base.diagnostics.particles_removed += removed as u64;
        }

        let bounds = self.base.grid().bounding_box();
        let radius = self.particles.radius();
        let clamped = clamp_particles_to_domain(&mut self.particles, &bounds, radius);
        self.base.diagnostics.particles_clamped += clamped as u64;
    }
}

impl PhysicsAnimation for HybridSolver2 {
    fn advance(&mut self, dt: f32) -> SimResult<StepReport> {
        validate_time_step(dt)?;
        let mut report = StepReport {
            particle_count: self.particles.number_of_particles(),
            ..StepReport::default()
        };
        if dt == 0.0 {
            return Ok(report);
        }

        let substeps = self.number_of_substeps(dt);
        let sub_dt = dt / substeps as f32;
        for k in 0..substeps {
            let time = self.base.current_time + (k as f64) * sub_dt as f64;
            self.substep(sub_dt, time, &mut report)?;
        }
        report.substeps = substeps;
        report.particle_count = self.particles.number_of_particles();

        self.base.finish_frame(dt, substeps);
        log::debug!(
            "{} frame {}: {} substeps, {} particles ({} emitted)",
            self.transfer.name(),
            self.base.current_frame,
            substeps,
            report.particle_count,
            report.emitted
        );
        Ok(report)
    }

    fn current_frame(&self) -> u64 {
        self.base.current_frame
    }

    fn current_time(&self) -> f64 {
        self.base.current_time
    }

    fn grid(&self) -> &GridSystemData2 {
        self.base.grid()
    }

    fn diagnostics(&self) -> &SolverDiagnostics {
        &self.base.diagnostics
    }
}

/// Fluent construction of a [`HybridSolver2`]. Grid settings go to an inner
/// [`GridFluidSolverBuilder`]; nothing is validated until `build`.
#[derive(Default)]
pub struct HybridSolverBuilder {
    grid: GridFluidSolverBuilder,
    config: HybridSolverConfig,
    emitter: Option<Box<dyn ParticleEmitter2>>,
}

impl HybridSolverBuilder {
    pub fn with_config(mut self, config: HybridSolverConfig) -> Self {
        self.grid = self.grid.with_config(config.grid);
        self.config = config;
        self
    }

    pub fn with_transfer(mut self, transfer: TransferKind) -> Self {
        self.config.transfer = transfer;
        self
    }

    pub fn with_resolution(mut self, resolution: [usize; 2]) -> Self {
        self.grid = self.grid.with_resolution(resolution);
        self
    }

    pub fn with_grid_spacing(mut self, spacing: Vec2) -> Self {
        self.grid = self.grid.with_grid_spacing(spacing);
        self
    }

    pub fn with_domain_size_x(mut self, size: f32) -> Self {
        self.grid = self.grid.with_domain_size_x(size);
        self
    }

    pub fn with_grid_origin(mut self, origin: Vec2) -> Self {
        self.grid = self.grid.with_grid_origin(origin);
        self
    }

    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.grid = self.grid.with_gravity(gravity);
        self
    }

    pub fn with_viscosity(mut self, viscosity: f32) -> Self {
        self.grid = self.grid.with_viscosity(viscosity);
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.grid = self.grid.with_density(density);
        self
    }

    pub fn with_pressure_solver(mut self, pressure: PressureSolverConfig) -> Self {
        self.grid = self.grid.with_pressure_solver(pressure);
        self
    }

    pub fn with_max_cfl(mut self, max_cfl: f32) -> Self {
        self.grid = self.grid.with_max_cfl(max_cfl);
        self
    }

    pub fn with_adaptive_substeps(mut self, adaptive: bool) -> Self {
        self.grid = self.grid.with_adaptive_substeps(adaptive);
        self
    }

    pub fn with_closed_boundaries(mut self, walls: ClosedBoundaries) -> Self {
        self.grid = self.grid.with_closed_boundaries(walls);
        self
    }

    pub fn with_extrapolation_depth(mut self, depth: usize) -> Self {
        self.grid = self.grid.with_extrapolation_depth(depth);
        self
    }

    pub fn with_collider(mut self, collider: Arc<dyn Collider2>) -> Self {
        self.grid = self.grid.with_collider(collider);
        self
    }

    pub fn with_grid_stages(mut self, stages: Box<dyn GridStages>) -> Self {
        self.grid = self.grid.with_grid_stages(stages);
        self
    }

    pub fn with_particle_radius(mut self, radius: f32) -> Self {
        self.config.particle_radius = radius;
        self
    }

    pub fn with_particle_mass(mut self, mass: f32) -> Self {
        self.config.particle_mass = mass;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.config.restitution = restitution;
        self
    }

    pub fn with_snow_material(mut self, material: SnowMaterial) -> Self {
        self.config.material = material;
        self
    }

    pub fn with_emitter(mut self, emitter: Box<dyn ParticleEmitter2>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn build(self) -> SimResult<HybridSolver2> {
        let config = HybridSolverConfig {
            grid: self.grid.config(),
            ..self.config
        };
        config.validate()?;
        let base = self.grid.build()?;

        let mut particles = ParticleSystemData2::new(0);
        particles.set_radius(config.particle_radius);
        particles.set_mass(config.particle_mass);

        let transfer: Box<dyn ParticleTransfer> = match config.transfer {
            TransferKind::Pic => Box::new(ApicTransfer::new(TransferScheme::Pic)),
            TransferKind::Flip { ratio } => Box::new(ApicTransfer::new(TransferScheme::Flip { ratio })),
            TransferKind::Apic => Box::new(ApicTransfer::new(TransferScheme::Apic)),
            TransferKind::Mpm => Box::new(MpmTransfer::new(config.material)),
        };

        let mut solver = HybridSolver2 {
            base,
            particles,
            emitter: None,
            transfer,
            restitution: config.restitution,
        };
        solver.transfer.prepare(&mut solver.particles);
        if let Some(emitter) = self.emitter {
            solver.set_particle_emitter(emitter);
        }

        log::info!(
            "built {} solver: resolution {:?}, spacing {:?}",
            solver.transfer.name(),
            config.grid.resolution,
            config.grid.grid_spacing
        );
        Ok(solver)
    }

    pub fn build_shared(self) -> SimResult<Arc<Mutex<HybridSolver2>>> {
        Ok(Arc::new(Mutex::new(self.build()?)))
    }
}
