//! Explicit viscous diffusion of the face velocities.

use crate::array::Array2;
use crate::constants::VISCOSITY_STABILITY_LIMIT;
use crate::grid::grid_system::GridSystemData2;

/// One forward-Euler diffusion step: `f += k * laplacian(f)` with per-axis
/// factors `k = nu * dt / dx^2`. Edges use zero-gradient neighbors.
fn diffuse_once(field: &mut Array2<f32>, kx: f32, ky: f32) {
    let src = field.clone();
    let (w, h) = (src.width(), src.height());
    field.par_for_each_index_mut(|[i, j], value| {
        let c = src[(i, j)];
        let left = if i > 0 { src[(i - 1, j)] } else { c };
        let right = if i + 1 < w { src[(i + 1, j)] } else { c };
        let down = if j > 0 { src[(i, j - 1)] } else { c };
        let up = if j + 1 < h { src[(i, j + 1)] } else { c };
        *value = c + kx * (left + right - 2.0 * c) + ky * (down + up - 2.0 * c);
    });
}

/// Diffuse both velocity components with kinematic viscosity `viscosity`.
///
/// The step is split into sub-steps so each stays within the explicit
/// stability limit. Returns the number of sub-steps taken.
pub fn apply_viscosity(grid: &mut GridSystemData2, viscosity: f32, dt: f32) -> usize {
    if viscosity <= 0.0 || dt <= 0.0 {
        return 0;
    }
    let spacing = grid.spacing();
    let inv_dx2 = 1.0 / (spacing.x * spacing.x) + 1.0 / (spacing.y * spacing.y);
    let k_total = viscosity * dt * inv_dx2;
    let substeps = (k_total / VISCOSITY_STABILITY_LIMIT).ceil().max(1.0) as usize;
    let sub_dt = dt / substeps as f32;

    let kx = viscosity * sub_dt / (spacing.x * spacing.x);
    let ky = viscosity * sub_dt / (spacing.y * spacing.y);
    for _ in 0..substeps {
        diffuse_once(&mut grid.u, kx, ky);
        diffuse_once(&mut grid.v, kx, ky);
    }
    substeps
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_uniform_field_unchanged() {
        let mut grid = GridSystemData2::new([4, 4], Vec2::ONE, Vec2::ZERO).unwrap();
        grid.u.fill(2.0);
        apply_viscosity(&mut grid, 0.1, 0.1);
        assert!(grid.u().iter().all(|&u| (u - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_spike_spreads_and_conserves_sum() {
        let mut grid = GridSystemData2::new([8, 8], Vec2::ONE, Vec2::ZERO).unwrap();
        grid.v[(4, 4)] = 1.0;
        let substeps = apply_viscosity(&mut grid, 1.0, 1.0);
        assert!(substeps >= 8, "should sub-cycle, got {}", substeps);

        let peak = grid.v[(4, 4)];
        assert!(peak < 1.0 && peak > 0.0);
        assert!(grid.v[(5, 4)] > 0.0);
        let sum: f32 = grid.v().iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(grid.v().iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn test_zero_viscosity_is_noop() {
        let mut grid = GridSystemData2::new([2, 2], Vec2::ONE, Vec2::ZERO).unwrap();
        grid.u[(1, 1)] = 3.0;
        assert_eq!(apply_viscosity(&mut grid, 0.0, 1.0), 0);
        assert_eq!(grid.u[(1, 1)], 3.0);
    }
}
