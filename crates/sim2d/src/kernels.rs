//! Quadratic B-spline kernel functions for particle/grid transfers.

use glam::Vec2;

use crate::constants::BSPLINE_SUPPORT_RADIUS;

/// 1D Quadratic B-spline weight.
/// Support: [-1.5, 1.5] (covers 3 grid nodes)
#[inline]
pub fn quadratic_bspline_1d(r: f32) -> f32 {
    let r_abs = r.abs();
    if r_abs < 0.5 {
        0.75 - r_abs * r_abs
    } else if r_abs < BSPLINE_SUPPORT_RADIUS {
        let t = BSPLINE_SUPPORT_RADIUS - r_abs;
        0.5 * t * t
    } else {
        0.0
    }
}

/// 2D Quadratic B-spline (tensor product of 1D).
#[inline]
pub fn quadratic_bspline_2d(delta: Vec2) -> f32 {
    quadratic_bspline_1d(delta.x) * quadratic_bspline_1d(delta.y)
}

/// Lattice coordinates beyond this magnitude get an all-zero stencil.
const MAX_LATTICE_COORD: f32 = (1 << 24) as f32;

/// Three-node stencil for one axis.
///
/// `x` is the sample position in lattice units. The stencil starts at node
/// `base` and the three weights sum to one. Non-finite or huge `x` yields
/// zero weights at a far-away base, so every node is skipped as out of
/// bounds.
#[derive(Clone, Copy, Debug)]
pub struct Stencil1D {
    pub base: i32,
    pub weights: [f32; 3],
}

impl Stencil1D {
    #[inline]
    pub fn new(x: f32) -> Self {
        let base = (x - 0.5).floor();
        if !(base.abs() < MAX_LATTICE_COORD) {
            let far = if base > 0.0 { MAX_LATTICE_COORD } else { -MAX_LATTICE_COORD };
            return Self {
                base: far as i32,
                weights: [0.0; 3],
            };
        }
        let fx = x - base;
        Self {
            base: base as i32,
            weights: [
                0.5 * (1.5 - fx) * (1.5 - fx),
                0.75 - (fx - 1.0) * (fx - 1.0),
                0.5 * (fx - 0.5) * (fx - 0.5),
            ],
        }
    }
}

/// Tensor-product stencil over a 2D lattice.
#[derive(Clone, Copy, Debug)]
pub struct Stencil2D {
    pub x: Stencil1D,
    pub y: Stencil1D,
}

impl Stencil2D {
    #[inline]
    pub fn new(lattice_pos: Vec2) -> Self {
        Self {
            x: Stencil1D::new(lattice_pos.x),
            y: Stencil1D::new(lattice_pos.y),
        }
    }

    /// Visit the nine nodes as `(i, j, weight)`. Indices may be negative.
    #[inline]
    pub fn for_each(&self, mut f: impl FnMut(i32, i32, f32)) {
        for (dj, wy) in self.y.weights.iter().enumerate() {
            for (di, wx) in self.x.weights.iter().enumerate() {
                f(self.x.base + di as i32, self.y.base + dj as i32, wx * wy);
            }
        }
    }
}

/// APIC D matrix inverse for quadratic B-splines, per axis.
/// D = (1/4) * dx^2 * I, so D_inv = 4 / dx^2
#[inline]
pub fn apic_d_inverse(grid_spacing: Vec2) -> Vec2 {
    Vec2::new(
        4.0 / (grid_spacing.x * grid_spacing.x),
        4.0 / (grid_spacing.y * grid_spacing.y),
    )
}
