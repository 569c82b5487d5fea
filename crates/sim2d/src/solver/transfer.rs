//! Particle <-> grid transfers on the staggered grid.
//!
//! Each velocity component is transferred to its own face lattice with
//! quadratic B-spline weights. Weights are renormalized over the nodes that
//! fall inside the grid, so a particle near a wall still deposits its full
//! mass.
//!
//! ## Parallelism
//!
//! P2G is a reduction: rayon folds particles into per-task accumulators and
//! the accumulators are summed pairwise. G2P only reads the grid and is a
//! plain parallel map.

use glam::{Mat2, Vec2};
use rayon::prelude::*;

use crate::constants::{MASS_EPSILON, MAX_PARTICLE_VELOCITY};
use crate::grid::GridSystemData2;
use crate::kernels::{apic_d_inverse, Stencil2D};
use crate::particle::ParticleSystemData2;

/// Name of the per-particle affine velocity matrix column.
pub const AFFINE_COLUMN: &str = "affine";

/// Moves particle state onto the grid and back.
pub trait ParticleTransfer: Send {
    fn name(&self) -> &'static str;

    /// Register the particle columns this transfer needs.
    fn prepare(&mut self, _particles: &mut ParticleSystemData2) {}

    /// Overwrite grid velocities and face masses from the particles.
    fn particles_to_grid(
        &mut self,
        grid: &mut GridSystemData2,
        particles: &ParticleSystemData2,
        dt: f32,
    );

    /// Update particle velocities (and any per-particle tensors) from the grid.
    fn grid_to_particles(
        &mut self,
        grid: &GridSystemData2,
        particles: &mut ParticleSystemData2,
        dt: f32,
    );

    /// Largest time step the transfer itself tolerates, if bounded.
    fn max_stable_dt(&self, _grid: &GridSystemData2) -> Option<f32> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FaceAxis {
    U,
    V,
}

/// Visit the in-bounds face nodes around `position` as
/// `(linear index, node - position, normalized weight)`.
pub(crate) fn for_each_face_node(
    grid: &GridSystemData2,
    axis: FaceAxis,
    position: Vec2,
    mut f: impl FnMut(usize, Vec2, f32),
) {
    let (lattice, field) = match axis {
        FaceAxis::U => (grid.u_lattice(position), grid.u()),
        FaceAxis::V => (grid.v_lattice(position), grid.v()),
    };
    let (w, h) = (field.width(), field.height());

    let mut nodes = [(0usize, Vec2::ZERO, 0.0f32); 9];
    let mut count = 0;
    let mut total = 0.0;
    Stencil2D::new(lattice).for_each(|i, j, weight| {
        if weight <= 0.0 || i < 0 || j < 0 || i as usize >= w || j as usize >= h {
            return;
        }
        let (i, j) = (i as usize, j as usize);
        let node = match axis {
            FaceAxis::U => grid.u_position(i, j),
            FaceAxis::V => grid.v_position(i, j),
        };
        nodes[count] = (i + w * j, node - position, weight);
        count += 1;
        total += weight;
    });

    if total <= MASS_EPSILON {
        return;
    }
    for &(index, offset, weight) in &nodes[..count] {
        f(index, offset, weight / total);
    }
}

/// What one particle contributes to the grid.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ParticleSample {
    pub position: Vec2,
    pub mass: f32,
    pub velocity: Vec2,
    /// Affine momentum: row `a` maps `node - position` to extra momentum of
    /// component `a`.
    pub affine: Mat2,
}

/// Per-task momentum and mass sums on both face grids.
#[derive(Clone, Debug)]
pub(crate) struct FaceAccumulator {
    u_momentum: Vec<f32>,
    u_mass: Vec<f32>,
    v_momentum: Vec<f32>,
    v_mass: Vec<f32>,
}

impl FaceAccumulator {
    pub fn new(grid: &GridSystemData2) -> Self {
        let (nu, nv) = (grid.u().len(), grid.v().len());
        Self {
            u_momentum: vec![0.0; nu],
            u_mass: vec![0.0; nu],
            v_momentum: vec![0.0; nv],
            v_mass: vec![0.0; nv],
        }
    }

    pub fn splat(&mut self, grid: &GridSystemData2, sample: &ParticleSample) {
        let momentum = sample.velocity * sample.mass;
        let (u_momentum, u_mass) = (&mut self.u_momentum, &mut self.u_mass);
        for_each_face_node(grid, FaceAxis::U, sample.position, |index, offset, weight| {
            u_mass[index] += weight * sample.mass;
            u_momentum[index] += weight * (momentum.x + sample.affine.row(0).dot(offset));
        });
        let (v_momentum, v_mass) = (&mut self.v_momentum, &mut self.v_mass);
        for_each_face_node(grid, FaceAxis::V, sample.position, |index, offset, weight| {
            v_mass[index] += weight * sample.mass;
            v_momentum[index] += weight * (momentum.y + sample.affine.row(1).dot(offset));
        });
    }

    pub fn merge(mut self, other: Self) -> Self {
        let add = |a: &mut Vec<f32>, b: &[f32]| a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
        add(&mut self.u_momentum, &other.u_momentum);
        add(&mut self.u_mass, &other.u_mass);
        add(&mut self.v_momentum, &other.v_momentum);
        add(&mut self.v_mass, &other.v_mass);
        self
    }

    /// Velocity = momentum / mass on faces with mass, zero elsewhere.
    pub fn write_to(self, grid: &mut GridSystemData2) {
        let finish = |velocity: &mut [f32], mass_out: &mut [f32], momentum: &[f32], mass: &[f32]| {
            for (k, (vel, m_out)) in velocity.iter_mut().zip(mass_out.iter_mut()).enumerate() {
                *m_out = mass[k];
                *vel = if mass[k] > MASS_EPSILON {
                    momentum[k] / mass[k]
                } else {
                    0.0
                };
            }
        };
        finish(
            grid.u.as_mut_slice(),
            grid.u_mass.as_mut_slice(),
            &self.u_momentum,
            &self.u_mass,
        );
        finish(
            grid.v.as_mut_slice(),
            grid.v_mass.as_mut_slice(),
            &self.v_momentum,
            &self.v_mass,
        );
    }
}

/// Scatter `count` particles described by `sample` onto the grid.
pub(crate) fn scatter(
    grid: &mut GridSystemData2,
    count: usize,
    sample: impl Fn(usize) -> ParticleSample + Sync + Send,
) {
    let accumulated = {
        let grid_ref = &*grid;
        (0..count)
            .into_par_iter()
            .fold(
                || FaceAccumulator::new(grid_ref),
                |mut acc, p| {
                    acc.splat(grid_ref, &sample(p));
                    acc
                },
            )
            .reduce(|| FaceAccumulator::new(grid_ref), FaceAccumulator::merge)
    };
    accumulated.write_to(grid);
}

/// Grid velocity around one particle.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct GridSample {
    pub velocity: Vec2,
    /// Interpolated change since `store_old_velocities`.
    pub delta: Vec2,
    /// Velocity gradient estimate; row `a` is the gradient of component `a`.
    pub affine: Mat2,
}

pub(crate) fn gather(grid: &GridSystemData2, position: Vec2) -> GridSample {
    let d_inv = apic_d_inverse(grid.spacing());

    let gather_axis = |axis: FaceAxis| {
        let (current, old) = match axis {
            FaceAxis::U => (grid.u().as_slice(), grid.u_old().as_slice()),
            FaceAxis::V => (grid.v().as_slice(), grid.v_old().as_slice()),
        };
        let mut value = 0.0;
        let mut delta = 0.0;
        let mut gradient = Vec2::ZERO;
        for_each_face_node(grid, axis, position, |index, offset, weight| {
            value += weight * current[index];
            delta += weight * (current[index] - old[index]);
            gradient += weight * current[index] * offset * d_inv;
        });
        (value, delta, gradient)
    };

    let (u, du, c_u) = gather_axis(FaceAxis::U);
    let (v, dv, c_v) = gather_axis(FaceAxis::V);
    GridSample {
        velocity: Vec2::new(u, v),
        delta: Vec2::new(du, dv),
        affine: Mat2::from_cols(c_u, c_v).transpose(),
    }
}

/// Cap the speed at [`MAX_PARTICLE_VELOCITY`]; non-finite velocities become zero.
#[inline]
pub(crate) fn sanitize_velocity(velocity: Vec2) -> Vec2 {
    if !velocity.is_finite() {
        return Vec2::ZERO;
    }
    velocity.clamp_length_max(MAX_PARTICLE_VELOCITY)
}

/// Velocity blending used by [`ApicTransfer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransferScheme {
    /// Particles take the grid velocity.
    Pic,
    /// Blend of the FLIP update (old particle velocity plus the grid change)
    /// and PIC. `ratio = 1` is pure FLIP.
    Flip { ratio: f32 },
    /// PIC with a per-particle affine velocity field.
    Apic,
}

/// PIC, FLIP and APIC transfers of particle momentum.
#[derive(Clone, Debug)]
pub struct ApicTransfer {
    scheme: TransferScheme,
    affine: Option<usize>,
}

impl ApicTransfer {
    pub fn new(scheme: TransferScheme) -> Self {
        Self {
            scheme,
            affine: None,
        }
    }

    pub fn scheme(&self) -> TransferScheme {
        self.scheme
    }
}

impl ParticleTransfer for ApicTransfer {
    fn name(&self) -> &'static str {
        match self.scheme {
            TransferScheme::Pic => "pic",
            TransferScheme::Flip { .. } => "flip",
            TransferScheme::Apic => "apic",
        }
    }

    fn prepare(&mut self, particles: &mut ParticleSystemData2) {
        if self.scheme == TransferScheme::Apic {
            self.affine = Some(particles.add_matrix_data(AFFINE_COLUMN, Mat2::ZERO));
        }
    }

    fn particles_to_grid(
        &mut self,
        grid: &mut GridSystemData2,
        particles: &ParticleSystemData2,
        _dt: f32,
    ) {
        let positions = particles.positions();
        let velocities = particles.velocities();
        let masses = particles.masses();
        let affine = self.affine.map(|handle| particles.matrix_data(handle));

        scatter(grid, particles.number_of_particles(), |p| ParticleSample {
            position: positions[p],
            mass: masses[p],
            velocity: velocities[p],
            affine: affine.map_or(Mat2::ZERO, |c| c[p] * masses[p]),
        });
    }

    fn grid_to_particles(
        &mut self,
        grid: &GridSystemData2,
        particles: &mut ParticleSystemData2,
        _dt: f32,
    ) {
        let scheme = self.scheme;
        let updated: Vec<(Vec2, Mat2)> = {
            let positions = particles.positions();
            let velocities = particles.velocities();
            (0..particles.number_of_particles())
                .into_par_iter()
                .map(|p| {
                    let sample = gather(grid, positions[p]);
                    let velocity = match scheme {
                        TransferScheme::Pic | TransferScheme::Apic => sample.velocity,
                        TransferScheme::Flip { ratio } => {
                            let flip = velocities[p] + sample.delta;
                            ratio * flip + (1.0 - ratio) * sample.velocity
                        }
                    };
                    let velocity = sanitize_velocity(velocity);
                    let affine = if sample.affine.is_finite() {
                        sample.affine
                    } else {
                        Mat2::ZERO
                    };
                    (velocity, affine)
                })
                .collect()
        };

        for (v, (velocity, _)) in particles.velocities_mut().iter_mut().zip(&updated) {
            *v = *velocity;
        }
        if let Some(handle) = self.affine {
            for (c, (_, affine)) in particles.matrix_data_mut(handle).iter_mut().zip(&updated) {
                *c = *affine;
            }
        }
    }
}
