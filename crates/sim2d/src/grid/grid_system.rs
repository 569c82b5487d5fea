//! 2D MAC (Marker-and-Cell) staggered grid.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::array::Array2;
use crate::bounding_box::BoundingBox2F;
use crate::constants::MASS_EPSILON;
use crate::error::{SimError, SimResult};

/// Cell classification for pressure solve.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Inside a collider (no flow)
    Solid,
    /// Contains fluid
    Fluid,
    /// Empty
    #[default]
    Air,
}

/// Grid geometry plus every field sampled on it.
///
/// Velocity components are stored on cell faces:
/// - u (X-velocity) on vertical faces at x = origin.x + i * dx
/// - v (Y-velocity) on horizontal faces at y = origin.y + j * dy
///
/// Pressure, divergence, cell type and collider distance live at cell
/// centers. Field sizes always follow from the resolution; they are only
/// changed through [`GridSystemData2::resize`].
#[derive(Clone, Debug)]
pub struct GridSystemData2 {
    resolution: [usize; 2],
    spacing: Vec2,
    origin: Vec2,

    /// Size: (w+1, h)
    pub(crate) u: Array2<f32>,
    /// Size: (w, h+1)
    pub(crate) v: Array2<f32>,
    pub(crate) u_old: Array2<f32>,
    pub(crate) v_old: Array2<f32>,
    /// Transferred mass per u face (hybrid solvers only)
    pub(crate) u_mass: Array2<f32>,
    pub(crate) v_mass: Array2<f32>,

    /// Pressure at cell centers (Pa)
    pub(crate) pressure: Array2<f32>,
    pub(crate) divergence: Array2<f32>,
    pub(crate) cell_type: Array2<CellType>,
    /// Collider signed distance at cell centers, +inf without a collider
    pub(crate) collider_sdf: Array2<f32>,
}

fn validate_geometry(spacing: Vec2, origin: Vec2) -> SimResult<()> {
    if !(spacing.x > 0.0 && spacing.y > 0.0 && spacing.is_finite()) {
        return Err(SimError::configuration(
            "grid_spacing",
            format!("must be positive and finite, got {:?}", spacing),
        ));
    }
    if !origin.is_finite() {
        return Err(SimError::configuration(
            "grid_origin",
            format!("must be finite, got {:?}", origin),
        ));
    }
    Ok(())
}

impl GridSystemData2 {
    pub fn new(resolution: [usize; 2], spacing: Vec2, origin: Vec2) -> SimResult<Self> {
        validate_geometry(spacing, origin)?;
        let mut grid = Self {
            resolution,
            spacing,
            origin,
            u: Array2::default(),
            v: Array2::default(),
            u_old: Array2::default(),
            v_old: Array2::default(),
            u_mass: Array2::default(),
            v_mass: Array2::default(),
            pressure: Array2::default(),
            divergence: Array2::default(),
            cell_type: Array2::default(),
            collider_sdf: Array2::default(),
        };
        grid.allocate_fields();
        Ok(grid)
    }

    /// Change the geometry. Every field is re-derived and reset.
    pub fn resize(&mut self, resolution: [usize; 2], spacing: Vec2, origin: Vec2) -> SimResult<()> {
        validate_geometry(spacing, origin)?;
        self.resolution = resolution;
        self.spacing = spacing;
        self.origin = origin;
        self.allocate_fields();
        Ok(())
    }

    fn allocate_fields(&mut self) {
        let [w, h] = self.resolution;
        let u_size = [w + 1, h];
        let v_size = [w, h + 1];
        let c_size = [w, h];

        for (field, size) in [
            (&mut self.u, u_size),
            (&mut self.u_old, u_size),
            (&mut self.u_mass, u_size),
            (&mut self.v, v_size),
            (&mut self.v_old, v_size),
            (&mut self.v_mass, v_size),
            (&mut self.pressure, c_size),
            (&mut self.divergence, c_size),
        ] {
            *field = Array2::new(size, 0.0);
        }
        self.cell_type = Array2::new(c_size, CellType::Air);
        self.collider_sdf = Array2::new(c_size, f32::INFINITY);
    }

    // ========== Geometry ==========

    pub fn resolution(&self) -> [usize; 2] {
        self.resolution
    }

    pub fn width(&self) -> usize {
        self.resolution[0]
    }

    pub fn height(&self) -> usize {
        self.resolution[1]
    }

    pub fn spacing(&self) -> Vec2 {
        self.spacing
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// World-space extent of the domain.
    pub fn bounding_box(&self) -> BoundingBox2F {
        let extent = self.spacing * Vec2::new(self.width() as f32, self.height() as f32);
        BoundingBox2F::from_vec2(self.origin, self.origin + extent)
    }

    /// Position of u face (i, j).
    #[inline]
    pub fn u_position(&self, i: usize, j: usize) -> Vec2 {
        self.origin + self.spacing * Vec2::new(i as f32, j as f32 + 0.5)
    }

    /// Position of v face (i, j).
    #[inline]
    pub fn v_position(&self, i: usize, j: usize) -> Vec2 {
        self.origin + self.spacing * Vec2::new(i as f32 + 0.5, j as f32)
    }

    #[inline]
    pub fn cell_center(&self, i: usize, j: usize) -> Vec2 {
        self.origin + self.spacing * Vec2::new(i as f32 + 0.5, j as f32 + 0.5)
    }

    /// Cell containing `pos` (may be out of bounds).
    #[inline]
    pub fn world_to_cell(&self, pos: Vec2) -> (i32, i32) {
        let c = ((pos - self.origin) / self.spacing).floor();
        (c.x as i32, c.y as i32)
    }

    #[inline]
    pub fn cell_in_bounds(&self, i: i32, j: i32) -> bool {
        i >= 0 && j >= 0 && (i as usize) < self.width() && (j as usize) < self.height()
    }

    /// `pos` in continuous u-lattice coordinates.
    #[inline]
    pub fn u_lattice(&self, pos: Vec2) -> Vec2 {
        (pos - self.origin) / self.spacing - Vec2::new(0.0, 0.5)
    }

    /// `pos` in continuous v-lattice coordinates.
    #[inline]
    pub fn v_lattice(&self, pos: Vec2) -> Vec2 {
        (pos - self.origin) / self.spacing - Vec2::new(0.5, 0.0)
    }

    // ========== Field accessors ==========

    pub fn u(&self) -> &Array2<f32> {
        &self.u
    }

    pub fn u_mut(&mut self) -> &mut [f32] {
        self.u.as_mut_slice()
    }

    pub fn v(&self) -> &Array2<f32> {
        &self.v
    }

    pub fn v_mut(&mut self) -> &mut [f32] {
        self.v.as_mut_slice()
    }

    pub fn u_old(&self) -> &Array2<f32> {
        &self.u_old
    }

    pub fn v_old(&self) -> &Array2<f32> {
        &self.v_old
    }

    pub fn u_mass(&self) -> &Array2<f32> {
        &self.u_mass
    }

    pub fn v_mass(&self) -> &Array2<f32> {
        &self.v_mass
    }

    pub fn pressure(&self) -> &Array2<f32> {
        &self.pressure
    }

    pub fn divergence(&self) -> &Array2<f32> {
        &self.divergence
    }

    pub fn cell_type(&self) -> &Array2<CellType> {
        &self.cell_type
    }

    pub fn cell_type_mut(&mut self) -> &mut [CellType] {
        self.cell_type.as_mut_slice()
    }

    pub fn collider_sdf(&self) -> &Array2<f32> {
        &self.collider_sdf
    }

    // ========== Sampling ==========

    /// Bilinear sample of the u field at a world position.
    pub fn sample_u(&self, pos: Vec2) -> f32 {
        sample_bilinear(&self.u, self.u_lattice(pos))
    }

    /// Bilinear sample of the v field at a world position.
    pub fn sample_v(&self, pos: Vec2) -> f32 {
        sample_bilinear(&self.v, self.v_lattice(pos))
    }

    /// Velocity at a world position, interpolated from both face grids.
    pub fn sample_velocity(&self, pos: Vec2) -> Vec2 {
        Vec2::new(self.sample_u(pos), self.sample_v(pos))
    }

    /// Largest face speed per axis.
    pub fn max_velocity(&self) -> Vec2 {
        let max_abs = |a: &Array2<f32>| a.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        Vec2::new(max_abs(&self.u), max_abs(&self.v))
    }

    /// CFL number of a step of `dt` at the current velocities.
    pub fn cfl(&self, dt: f32) -> f32 {
        let per_axis = self.max_velocity() * dt / self.spacing;
        per_axis.x.max(per_axis.y)
    }

    // ========== Reset/clear ==========

    pub fn clear_velocities(&mut self) {
        self.u.fill(0.0);
        self.v.fill(0.0);
    }

    pub fn clear_masses(&mut self) {
        self.u_mass.fill(0.0);
        self.v_mass.fill(0.0);
    }

    /// Store current velocities as old (for FLIP).
    pub fn store_old_velocities(&mut self) {
        self.u_old.set_from(&self.u);
        self.v_old.set_from(&self.v);
    }

    /// Total transferred mass on the u and v face grids.
    pub fn total_mass(&self) -> Vec2 {
        Vec2::new(self.u_mass.iter().sum(), self.v_mass.iter().sum())
    }

    /// Mark every non-solid cell that contains a position as fluid, and
    /// every other non-solid cell as air.
    pub fn mark_fluid_cells(&mut self, positions: &[Vec2]) {
        for ct in self.cell_type.iter_mut() {
            if *ct != CellType::Solid {
                *ct = CellType::Air;
            }
        }
        for &p in positions {
            let (i, j) = self.world_to_cell(p);
            if !self.cell_in_bounds(i, j) {
                continue;
            }
            let ct = &mut self.cell_type[(i as usize, j as usize)];
            if *ct != CellType::Solid {
                *ct = CellType::Fluid;
            }
        }
    }

    /// Mark every non-solid cell as fluid.
    pub fn fill_fluid(&mut self) {
        for ct in self.cell_type.iter_mut() {
            if *ct != CellType::Solid {
                *ct = CellType::Fluid;
            }
        }
    }

    /// True if the u face has received particle mass.
    #[inline]
    pub fn u_has_mass(&self, i: usize, j: usize) -> bool {
        self.u_mass[(i, j)] > MASS_EPSILON
    }

    #[inline]
    pub fn v_has_mass(&self, i: usize, j: usize) -> bool {
        self.v_mass[(i, j)] > MASS_EPSILON
    }

    pub fn number_of_fluid_cells(&self) -> usize {
        self.cell_type.iter().filter(|c| **c == CellType::Fluid).count()
    }
}

/// Bilinear interpolation at continuous lattice coordinates, clamped to the
/// array extent.
pub fn sample_bilinear(field: &Array2<f32>, lattice: Vec2) -> f32 {
    let (w, h) = (field.width(), field.height());
    if w == 0 || h == 0 {
        return 0.0;
    }
    let x = lattice.x.clamp(0.0, (w - 1) as f32);
    let y = lattice.y.clamp(0.0, (h - 1) as f32);
    let i0 = (x.floor() as usize).min(w.saturating_sub(2));
    let j0 = (y.floor() as usize).min(h.saturating_sub(2));
    let i1 = (i0 + 1).min(w - 1);
    let j1 = (j0 + 1).min(h - 1);
    let fx = x - i0 as f32;
    let fy = y - j0 as f32;

    let bottom = field[(i0, j0)] * (1.0 - fx) + field[(i1, j0)] * fx;
    let top = field[(i0, j1)] * (1.0 - fx) + field[(i1, j1)] * fx;
    bottom * (1.0 - fy) + top * fy
}
