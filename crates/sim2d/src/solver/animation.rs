//! Common stepping interface of the solvers.

use crate::error::{SimError, SimResult};
use crate::grid::{GridSystemData2, PressureSolveReport};

/// A simulation that can be advanced in time.
///
/// `advance` calls are strictly sequential; a call returns only after grid
/// and particle state are fully updated.
pub trait PhysicsAnimation {
    /// Advance by `dt` seconds. `dt == 0` is a no-op; negative or non-finite
    /// `dt` is a configuration error.
    fn advance(&mut self, dt: f32) -> SimResult<StepReport>;

    /// Number of completed non-empty `advance` calls.
    fn current_frame(&self) -> u64;

    /// Simulated time in seconds.
    fn current_time(&self) -> f64;

    fn grid(&self) -> &GridSystemData2;

    fn diagnostics(&self) -> &SolverDiagnostics;
}

/// Summary of one `advance` call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    pub substeps: usize,
    /// Particles added by the emitter during this call.
    pub emitted: usize,
    pub particle_count: usize,
    /// The first non-converged pressure solve of the call, otherwise the last.
    pub pressure: Option<PressureSolveReport>,
}

impl StepReport {
    pub(crate) fn record_pressure(&mut self, report: Option<PressureSolveReport>) {
        let Some(report) = report else {
            return;
        };
        let keep_existing = matches!(self.pressure, Some(existing) if !existing.converged);
        if !keep_existing {
            self.pressure = Some(report);
        }
    }
}

/// Running counters over the lifetime of a solver.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolverDiagnostics {
    pub frames: u64,
    pub substeps: u64,
    pub pressure_solves: u64,
    pub non_converged_solves: u64,
    pub particles_clamped: u64,
    pub particles_removed: u64,
    pub last_pressure: Option<PressureSolveReport>,
}

impl SolverDiagnostics {
    pub(crate) fn record_pressure(&mut self, report: &Option<PressureSolveReport>) {
        if let Some(report) = report {
            self.pressure_solves += 1;
            if !report.converged {
                self.non_converged_solves += 1;
            }
            self.last_pressure = Some(*report);
        }
    }
}

/// Reject negative or non-finite time steps.
pub(crate) fn validate_time_step(dt: f32) -> SimResult<()> {
    if !dt.is_finite() || dt < 0.0 {
        return Err(SimError::configuration(
            "dt",
            format!("time step must be finite and non-negative, got {}", dt),
        ));
    }
    Ok(())
}
