//! Pressure projection for incompressible flow on the MAC grid.
//!
//! Solves `L phi = -div(u)` on fluid cells, where `phi = p * dt / rho`, then
//! subtracts `grad(phi)` from the face velocities. Air neighbors and open
//! domain sides are Dirichlet (`phi = 0`); solid neighbors and closed walls
//! drop out of the stencil (Neumann).
//!
//! Two solvers share the same matrix: plain Jacobi iteration and conjugate
//! gradient with a diagonal preconditioner. A solve that runs out of
//! iterations keeps its best iterate and reports a [`ConvergenceWarning`].

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::array::Array2;
use crate::constants::{DEFAULT_PRESSURE_ITERATIONS, DEFAULT_PRESSURE_TOLERANCE};
use crate::error::{SimError, SimResult};
use crate::grid::boundary::{is_u_face_solid, is_v_face_solid, ClosedBoundaries};
use crate::grid::grid_system::{CellType, GridSystemData2};

/// Linear solver used for the pressure Poisson equation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureSolverKind {
    Jacobi,
    #[default]
    ConjugateGradient,
    /// Skip projection entirely (compressible materials).
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PressureSolverConfig {
    pub kind: PressureSolverKind,
    pub max_iterations: usize,
    /// Relative to the largest right-hand-side entry.
    pub tolerance: f32,
}

impl Default for PressureSolverConfig {
    fn default() -> Self {
        Self {
            kind: PressureSolverKind::default(),
            max_iterations: DEFAULT_PRESSURE_ITERATIONS,
            tolerance: DEFAULT_PRESSURE_TOLERANCE,
        }
    }
}

impl PressureSolverConfig {
    pub fn none() -> Self {
        Self {
            kind: PressureSolverKind::None,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.kind == PressureSolverKind::None {
            return Ok(());
        }
        if self.max_iterations == 0 {
            return Err(SimError::configuration(
                "pressure.max_iterations",
                "must be at least 1",
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(SimError::configuration(
                "pressure.tolerance",
                format!("must be positive, got {}", self.tolerance),
            ));
        }
        Ok(())
    }
}

/// Soft failure: the solve hit its iteration budget above tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvergenceWarning {
    pub iterations: usize,
    pub residual: f32,
    pub tolerance: f32,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pressure solve did not converge after {} iterations (residual {:.3e}, tolerance {:.3e})",
            self.iterations, self.residual, self.tolerance
        )
    }
}

/// Outcome of one projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PressureSolveReport {
    pub kind: PressureSolverKind,
    pub iterations: usize,
    /// Max-norm of the final residual, relative to the right-hand side.
    pub residual: f32,
    pub converged: bool,
    pub warning: Option<ConvergenceWarning>,
}

/// div(u) at fluid cells, zero elsewhere.
pub fn compute_divergence(grid: &mut GridSystemData2) {
    let spacing = grid.spacing();
    let (w, h) = (grid.width(), grid.height());
    for j in 0..h {
        for i in 0..w {
            let div = if grid.cell_type[(i, j)] == CellType::Fluid {
                (grid.u[(i + 1, j)] - grid.u[(i, j)]) / spacing.x
                    + (grid.v[(i, j + 1)] - grid.v[(i, j)]) / spacing.y
            } else {
                0.0
            };
            grid.divergence[(i, j)] = div;
        }
    }
}

const NOT_FLUID: usize = usize::MAX;

#[derive(Clone, Copy, Debug)]
struct PoissonRow {
    diag: f32,
    neighbors: [(usize, f32); 4],
    count: usize,
}

impl PoissonRow {
    #[inline]
    fn neighbors(&self) -> &[(usize, f32)] {
        &self.neighbors[..self.count]
    }
}

/// Matrix over fluid cells only, numbered row-major.
struct PoissonSystem {
    cells: Vec<(usize, usize)>,
    rows: Vec<PoissonRow>,
    rhs: Vec<f32>,
    index: Array2<usize>,
}

impl PoissonSystem {
    fn build(grid: &GridSystemData2, walls: ClosedBoundaries) -> Self {
        let (w, h) = (grid.width(), grid.height());
        let mut index = Array2::new([w, h], NOT_FLUID);
        let mut cells = Vec::new();
        for j in 0..h {
            for i in 0..w {
                if grid.cell_type[(i, j)] == CellType::Fluid {
                    index[(i, j)] = cells.len();
                    cells.push((i, j));
                }
            }
        }

        let spacing = grid.spacing();
        let wx = 1.0 / (spacing.x * spacing.x);
        let wy = 1.0 / (spacing.y * spacing.y);

        let mut rows = Vec::with_capacity(cells.len());
        let mut rhs = Vec::with_capacity(cells.len());
        for &(i, j) in &cells {
            let mut row = PoissonRow {
                diag: 0.0,
                neighbors: [(0, 0.0); 4],
                count: 0,
            };
            // (face is solid, neighbor cell, weight)
            let faces = [
                (is_u_face_solid(grid, walls, i, j), i.checked_sub(1).map(|ni| (ni, j)), wx),
                (is_u_face_solid(grid, walls, i + 1, j), Some((i + 1, j)), wx),
                (is_v_face_solid(grid, walls, i, j), j.checked_sub(1).map(|nj| (i, nj)), wy),
                (is_v_face_solid(grid, walls, i, j + 1), Some((i, j + 1)), wy),
            ];
            for (solid, neighbor, weight) in faces {
                if solid {
                    continue;
                }
                row.diag += weight;
                if let Some((ni, nj)) = neighbor {
                    if ni < w && nj < h && index[(ni, nj)] != NOT_FLUID {
                        row.neighbors[row.count] = (index[(ni, nj)], weight);
                        row.count += 1;
                    }
                }
            }
            rows.push(row);
            rhs.push(-grid.divergence[(i, j)]);
        }

        Self {
            cells,
            rows,
            rhs,
            index,
        }
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    /// y = A x
    fn apply(&self, x: &[f32], y: &mut [f32]) {
        y.par_iter_mut()
            .zip(self.rows.par_iter())
            .enumerate()
            .for_each(|(r, (yr, row))| {
                let mut sum = row.diag * x[r];
                for &(n, weight) in row.neighbors() {
                    sum -= weight * x[n];
                }
                *yr = sum;
            });
    }

    /// Max-norm of b - A x.
    fn residual_norm(&self, x: &[f32], scratch: &mut [f32]) -> f32 {
        self.apply(x, scratch);
        self.rhs
            .par_iter()
            .zip(scratch.par_iter())
            .map(|(b, ax)| (b - ax).abs())
            .reduce(|| 0.0, f32::max)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.par_iter()
        .zip(b.par_iter())
        .map(|(x, y)| *x as f64 * *y as f64)
        .sum()
}

fn max_abs(a: &[f32]) -> f32 {
    a.par_iter().map(|x| x.abs()).reduce(|| 0.0, f32::max)
}

struct SolveOutcome {
    iterations: usize,
    residual: f32,
}

fn solve_jacobi(
    system: &PoissonSystem,
    phi: &mut Vec<f32>,
    max_iterations: usize,
    threshold: f32,
) -> SolveOutcome {
    let n = system.len();
    let mut next = vec![0.0; n];
    let mut scratch = vec![0.0; n];
    let mut residual = system.residual_norm(phi, &mut scratch);
    let mut iterations = 0;

    while iterations < max_iterations && residual > threshold {
        {
            let current = &*phi;
            next.par_iter_mut()
                .zip(system.rows.par_iter())
                .zip(system.rhs.par_iter())
                .for_each(|((out, row), b)| {
                    if row.diag <= 0.0 {
                        *out = 0.0;
                        return;
                    }
                    let mut sum = *b;
                    for &(nb, weight) in row.neighbors() {
                        sum += weight * current[nb];
                    }
                    *out = sum / row.diag;
                });
        }
        // Swap buffers
        std::mem::swap(phi, &mut next);
        iterations += 1;
        residual = system.residual_norm(phi, &mut scratch);
    }

    SolveOutcome {
        iterations,
        residual,
    }
}

fn solve_pcg(
    system: &PoissonSystem,
    phi: &mut [f32],
    max_iterations: usize,
    threshold: f32,
) -> SolveOutcome {
    let n = system.len();
    let inv_diag: Vec<f32> = system
        .rows
        .iter()
        .map(|row| if row.diag > 0.0 { 1.0 / row.diag } else { 0.0 })
        .collect();

    // r = b - A x
    let mut r = vec![0.0; n];
    system.apply(phi, &mut r);
    r.par_iter_mut()
        .zip(system.rhs.par_iter())
        .for_each(|(ri, b)| *ri = b - *ri);

    let mut residual = max_abs(&r);
    if residual <= threshold {
        return SolveOutcome {
            iterations: 0,
            residual,
        };
    }

    let mut z: Vec<f32> = r.iter().zip(&inv_diag).map(|(ri, m)| ri * m).collect();
    let mut p = z.clone();
    let mut ap = vec![0.0; n];
    let mut rz = dot(&r, &z);
    let mut iterations = 0;

    while iterations < max_iterations {
        system.apply(&p, &mut ap);
        let pap = dot(&p, &ap);
        if pap <= 0.0 || !pap.is_finite() {
            break;
        }
        let alpha = (rz / pap) as f32;

        phi.par_iter_mut()
            .zip(p.par_iter())
            .for_each(|(x, pi)| *x += alpha * pi);
        r.par_iter_mut()
            .zip(ap.par_iter())
            .for_each(|(ri, api)| *ri -= alpha * api);
        iterations += 1;

        residual = max_abs(&r);
        if residual <= threshold {
            break;
        }

        z.par_iter_mut()
            .zip(r.par_iter().zip(inv_diag.par_iter()))
            .for_each(|(zi, (ri, m))| *zi = ri * m);
        let rz_next = dot(&r, &z);
        let beta = (rz_next / rz) as f32;
        rz = rz_next;
        p.par_iter_mut()
            .zip(z.par_iter())
            .for_each(|(pi, zi)| *pi = zi + beta * *pi);
    }

    SolveOutcome {
        iterations,
        residual,
    }
}

/// Subtract grad(phi) from every non-solid face next to a fluid cell.
fn apply_pressure_gradient(grid: &mut GridSystemData2, walls: ClosedBoundaries, system: &PoissonSystem, phi: &[f32]) {
    let spacing = grid.spacing();
    let (w, h) = (grid.width(), grid.height());
    // phi at a cell; air and outside the domain are 0
    let phi_at = |i: i32, j: i32| -> Option<f32> {
        if i < 0 || j < 0 || i as usize >= w || j as usize >= h {
            return None;
        }
        match system.index[(i as usize, j as usize)] {
            NOT_FLUID => None,
            idx => Some(phi[idx]),
        }
    };

    for j in 0..h {
        for i in 0..=w {
            if is_u_face_solid(grid, walls, i, j) {
                continue;
            }
            let left = phi_at(i as i32 - 1, j as i32);
            let right = phi_at(i as i32, j as i32);
            if left.is_none() && right.is_none() {
                continue;
            }
            let grad = (right.unwrap_or(0.0) - left.unwrap_or(0.0)) / spacing.x;
            grid.u[(i, j)] -= grad;
        }
    }

    for j in 0..=h {
        for i in 0..w {
            if is_v_face_solid(grid, walls, i, j) {
                continue;
            }
            let bottom = phi_at(i as i32, j as i32 - 1);
            let top = phi_at(i as i32, j as i32);
            if bottom.is_none() && top.is_none() {
                continue;
            }
            let grad = (top.unwrap_or(0.0) - bottom.unwrap_or(0.0)) / spacing.y;
            grid.v[(i, j)] -= grad;
        }
    }
}

/// Make the velocity field divergence-free on fluid cells.
///
/// Returns `None` when projection is disabled or `dt` is not positive.
/// Non-convergence is logged and reported, never an error.
pub fn project(
    grid: &mut GridSystemData2,
    walls: ClosedBoundaries,
    config: &PressureSolverConfig,
    density: f32,
    dt: f32,
) -> Option<PressureSolveReport> {
    if config.kind == PressureSolverKind::None || dt <= 0.0 {
        return None;
    }

    compute_divergence(grid);
    let system = PoissonSystem::build(grid, walls);

    let to_phi = dt / density;
    // Warm start from the previous pressure
    let mut phi: Vec<f32> = system
        .cells
        .iter()
        .map(|&(i, j)| grid.pressure[(i, j)] * to_phi)
        .collect();

    let rhs_norm = max_abs(&system.rhs);
    let outcome = if rhs_norm == 0.0 {
        phi.fill(0.0);
        SolveOutcome {
            iterations: 0,
            residual: 0.0,
        }
    } else {
        let threshold = config.tolerance * rhs_norm;
        match config.kind {
            PressureSolverKind::Jacobi => {
                solve_jacobi(&system, &mut phi, config.max_iterations, threshold)
            }
            _ => solve_pcg(&system, &mut phi, config.max_iterations, threshold),
        }
    };

    let relative = if rhs_norm > 0.0 {
        outcome.residual / rhs_norm
    } else {
        0.0
    };
    let converged = relative <= config.tolerance;
    let warning = (!converged).then(|| ConvergenceWarning {
        iterations: outcome.iterations,
        residual: relative,
        tolerance: config.tolerance,
    });
    if let Some(warning) = &warning {
        log::warn!("{} on {} fluid cells", warning, system.len());
    }

    apply_pressure_gradient(grid, walls, &system, &phi);

    grid.pressure.fill(0.0);
    for (&(i, j), value) in system.cells.iter().zip(&phi) {
        grid.pressure[(i, j)] = value / to_phi;
    }

    Some(PressureSolveReport {
        kind: config.kind,
        iterations: outcome.iterations,
        residual: relative,
        converged,
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WATER_DENSITY;
    use crate::grid::boundary::apply_boundary_conditions;
    use glam::Vec2;

    fn max_fluid_divergence(grid: &mut GridSystemData2) -> f32 {
        compute_divergence(grid);
        grid.divergence().iter().fold(0.0f32, |m, d| m.max(d.abs()))
    }

    fn swirly_grid(walls: ClosedBoundaries) -> GridSystemData2 {
        let mut grid = GridSystemData2::new([8, 8], Vec2::splat(0.5), Vec2::ZERO).unwrap();
        grid.fill_fluid();
        for j in 0..8 {
            for i in 0..9 {
                grid.u[(i, j)] = ((i * 7 + j * 3) % 5) as f32 - 2.0;
            }
        }
        for j in 0..9 {
            for i in 0..8 {
                grid.v[(i, j)] = ((i * 2 + j * 5) % 7) as f32 - 3.0;
            }
        }
        apply_boundary_conditions(&mut grid, walls, None);
        grid
    }

    #[test]
    fn test_divergence_zero_velocity() {
        let mut grid = GridSystemData2::new([4, 4], Vec2::ONE, Vec2::ZERO).unwrap();
        grid.fill_fluid();
        assert_eq!(max_fluid_divergence(&mut grid), 0.0);

        let report = project(
            &mut grid,
            ClosedBoundaries::ALL,
            &PressureSolverConfig::default(),
            WATER_DENSITY,
            0.01,
        )
        .unwrap();
        assert!(report.converged);
        assert_eq!(report.iterations, 0);
        assert!(grid.pressure().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_pcg_removes_divergence() {
        let walls = ClosedBoundaries {
            top: false,
            ..ClosedBoundaries::ALL
        };
        let mut grid = swirly_grid(walls);
        let before = max_fluid_divergence(&mut grid);
        assert!(before > 1.0);

        let config = PressureSolverConfig {
            kind: PressureSolverKind::ConjugateGradient,
            max_iterations: 500,
            tolerance: 1e-5,
        };
        let report = project(&mut grid, walls, &config, 1.0, 0.1).unwrap();
        assert!(report.converged, "{:?}", report);
        assert!(report.warning.is_none());

        let after = max_fluid_divergence(&mut grid);
        assert!(after < 1e-3 * before, "divergence {} -> {}", before, after);
    }

    #[test]
    fn test_jacobi_reduces_divergence() {
        let walls = ClosedBoundaries {
            top: false,
            ..ClosedBoundaries::ALL
        };
        let mut grid = swirly_grid(walls);
        let before = max_fluid_divergence(&mut grid);

        let config = PressureSolverConfig {
            kind: PressureSolverKind::Jacobi,
            max_iterations: 2000,
            tolerance: 1e-4,
        };
        let report = project(&mut grid, walls, &config, 1.0, 0.1).unwrap();
        assert!(report.iterations > 0);
        let after = max_fluid_divergence(&mut grid);
        assert!(after < 0.05 * before, "divergence {} -> {}", before, after);
    }

    #[test]
    fn test_non_convergence_is_soft() {
        let walls = ClosedBoundaries::ALL;
        let mut grid = swirly_grid(walls);
        let config = PressureSolverConfig {
            kind: PressureSolverKind::Jacobi,
            max_iterations: 1,
            tolerance: 1e-9,
        };
        let report = project(&mut grid, walls, &config, 1.0, 0.1).unwrap();
        assert!(!report.converged);
        assert_eq!(report.iterations, 1);
        let warning = report.warning.unwrap();
        assert_eq!(warning.iterations, 1);
        assert!(warning.to_string().contains("did not converge"));
        assert!(grid.u().iter().chain(grid.v().iter()).all(|x| x.is_finite()));
    }

    #[test]
    fn test_free_surface_column_keeps_falling() {
        // A fluid blob surrounded by air falls freely: uniform velocity is
        // already divergence-free, so projection leaves it alone.
        let mut grid = GridSystemData2::new([4, 4], Vec2::ONE, Vec2::ZERO).unwrap();
        grid.mark_fluid_cells(&[Vec2::new(1.5, 1.5), Vec2::new(2.5, 1.5), Vec2::new(1.5, 2.5), Vec2::new(2.5, 2.5)]);
        grid.v.fill(-0.1);
        apply_boundary_conditions(&mut grid, ClosedBoundaries::ALL, None);

        let report = project(&mut grid, ClosedBoundaries::ALL, &PressureSolverConfig::default(), WATER_DENSITY, 0.01)
            .unwrap();
        assert!(report.converged);
        for j in 1..=3 {
            for i in 1..=2 {
                assert!((grid.v[(i, j)] + 0.1).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_none_and_validation() {
        let mut grid = GridSystemData2::new([2, 2], Vec2::ONE, Vec2::ZERO).unwrap();
        assert!(project(&mut grid, ClosedBoundaries::ALL, &PressureSolverConfig::none(), 1.0, 0.1).is_none());

        let bad = PressureSolverConfig {
            tolerance: 0.0,
            ..PressureSolverConfig::default()
        };
        assert!(bad.validate().unwrap_err().is_configuration());
        assert!(PressureSolverConfig::none().validate().is_ok());
    }
}
