//! MLS-MPM transfer for elasto-plastic snow.
//!
//! Particles carry an affine velocity matrix `C`, the elastic deformation
//! gradient `F`, the plastic volume ratio `Jp` and their rest volume. Stress
//! enters the grid as an affine momentum term during P2G, so the grid step
//! itself only adds gravity and boundaries.

use glam::{Mat2, Vec2};
use rayon::prelude::*;

use crate::grid::GridSystemData2;
use crate::kernels::apic_d_inverse;
use crate::particle::ParticleSystemData2;
use crate::solver::constitutive::SnowMaterial;
use crate::solver::transfer::{
    gather, sanitize_velocity, scatter, ParticleSample, ParticleTransfer, AFFINE_COLUMN,
};

pub const DEFORMATION_GRADIENT_COLUMN: &str = "deformation_gradient";
pub const PLASTIC_JACOBIAN_COLUMN: &str = "plastic_jacobian";
pub const VOLUME_COLUMN: &str = "volume";

/// Fraction of the elastic wave crossing time used as the step bound.
const ELASTIC_CFL: f32 = 0.5;

#[derive(Clone, Copy, Debug)]
struct Columns {
    affine: usize,
    deformation: usize,
    plastic_jacobian: usize,
    volume: usize,
}

#[derive(Clone, Debug)]
pub struct MpmTransfer {
    material: SnowMaterial,
    columns: Option<Columns>,
}

impl MpmTransfer {
    pub fn new(material: SnowMaterial) -> Self {
        Self {
            material,
            columns: None,
        }
    }

    pub fn material(&self) -> &SnowMaterial {
        &self.material
    }

    fn columns(&mut self, particles: &mut ParticleSystemData2) -> Columns {
        if let Some(columns) = self.columns {
            return columns;
        }
        let columns = Columns {
            affine: particles.add_matrix_data(AFFINE_COLUMN, Mat2::ZERO),
            deformation: particles.add_matrix_data(DEFORMATION_GRADIENT_COLUMN, Mat2::IDENTITY),
            plastic_jacobian: particles.add_scalar_data(PLASTIC_JACOBIAN_COLUMN, 1.0),
            volume: particles.add_scalar_data(VOLUME_COLUMN, 0.0),
        };
        self.columns = Some(columns);
        columns
    }
}

impl ParticleTransfer for MpmTransfer {
    fn name(&self) -> &'static str {
        "mpm"
    }

    /// Registers the columns and gives newly emitted particles their rest
    /// volume `mass / density`.
    fn prepare(&mut self, particles: &mut ParticleSystemData2) {
        let columns = self.columns(particles);
        let density = self.material.density;
        let masses = particles.masses().to_vec();
        for (volume, mass) in particles.scalar_data_mut(columns.volume).iter_mut().zip(masses) {
            if *volume <= 0.0 {
                *volume = mass / density;
            }
        }
    }

    fn particles_to_grid(
        &mut self,
        grid: &mut GridSystemData2,
        particles: &ParticleSystemData2,
        dt: f32,
    ) {
        let Some(columns) = self.columns else {
            log::warn!("mpm transfer used before prepare; skipping P2G");
            return;
        };
        let material = self.material;
        let stress_scale = Mat2::from_diagonal(apic_d_inverse(grid.spacing()));

        let positions = particles.positions();
        let velocities = particles.velocities();
        let masses = particles.masses();
        let affine = particles.matrix_data(columns.affine);
        let deformation = particles.matrix_data(columns.deformation);
        let plastic_jacobian = particles.scalar_data(columns.plastic_jacobian);
        let volume = particles.scalar_data(columns.volume);

        scatter(grid, particles.number_of_particles(), |p| {
            let tau = material.kirchhoff_stress(deformation[p], plastic_jacobian[p]);
            let stress = tau * stress_scale * (-dt * volume[p]);
            ParticleSample {
                position: positions[p],
                mass: masses[p],
                velocity: velocities[p],
                affine: stress + affine[p] * masses[p],
            }
        });
    }

    fn grid_to_particles(
        &mut self,
        grid: &GridSystemData2,
        particles: &mut ParticleSystemData2,
        dt: f32,
    ) {
        let columns = self.columns(particles);
        let material = self.material;

        let updated: Vec<(Vec2, Mat2, Mat2, f32)> = {
            let positions = particles.positions();
            let deformation = particles.matrix_data(columns.deformation);
            let plastic_jacobian = particles.scalar_data(columns.plastic_jacobian);
            (0..particles.number_of_particles())
                .into_par_iter()
                .map(|p| {
                    let sample = gather(grid, positions[p]);
                    let trial = (Mat2::IDENTITY + sample.affine * dt) * deformation[p];
                    let (f, plastic_ratio) = material.project_plastic(trial);
                    let jp = plastic_jacobian[p] * plastic_ratio;

                    if sample.velocity.is_finite()
                        && sample.affine.is_finite()
                        && f.is_finite()
                        && jp.is_finite()
                    {
                        (sanitize_velocity(sample.velocity), sample.affine, f, jp)
                    } else {
                        (Vec2::ZERO, Mat2::ZERO, Mat2::IDENTITY, 1.0)
                    }
                })
                .collect()
        };

        for (v, state) in particles.velocities_mut().iter_mut().zip(&updated) {
            *v = state.0;
        }
        for (c, state) in particles.matrix_data_mut(columns.affine).iter_mut().zip(&updated) {
            *c = state.1;
        }
        for (f, state) in particles
            .matrix_data_mut(columns.deformation)
            .iter_mut()
            .zip(&updated)
        {
            *f = state.2;
        }
        for (jp, state) in particles
            .scalar_data_mut(columns.plastic_jacobian)
            .iter_mut()
            .zip(&updated)
        {
            *jp = state.3;
        }
    }

    /// Time for an elastic wave to cross a fraction of the smallest cell.
    fn max_stable_dt(&self, grid: &GridSystemData2) -> Option<f32> {
        let dx = grid.spacing().min_element();
        let wave_speed = (self.material.youngs_modulus / self.material.density).sqrt();
        Some(ELASTIC_CFL * dx / wave_speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snow_block() -> ParticleSystemData2 {
        let mut particles = ParticleSystemData2::default();
        particles.set_mass(0.1);
        for j in 0..4 {
            for i in 0..4 {
                let p = Vec2::new(1.5 + 0.25 * i as f32, 1.5 + 0.25 * j as f32);
                particles.add_particle(p, Vec2::ZERO, Vec2::ZERO);
            }
        }
        particles
    }

    #[test]
    fn test_prepare_sets_rest_volume() {
        let mut particles = snow_block();
        let mut transfer = MpmTransfer::new(SnowMaterial::default());
        transfer.prepare(&mut particles);

        let volume = particles.scalar_data_index(VOLUME_COLUMN).unwrap();
        assert!(particles
            .scalar_data(volume)
            .iter()
            .all(|v| (*v - 0.1 / 400.0).abs() < 1e-9));
        let f = particles.matrix_data_index(DEFORMATION_GRADIENT_COLUMN).unwrap();
        assert!(particles.matrix_data(f).iter().all(|m| *m == Mat2::IDENTITY));

        // New particles get a volume on the next prepare, old ones keep theirs
        particles.scalar_data_mut(volume)[0] = 1.0;
        particles.add_particle(Vec2::new(2.0, 2.0), Vec2::ZERO, Vec2::ZERO);
        transfer.prepare(&mut particles);
        assert_eq!(particles.scalar_data(volume)[0], 1.0);
        assert!(particles.scalar_data(volume)[16] > 0.0);
    }

    #[test]
    fn test_rest_block_stays_at_rest() {
        let mut grid = GridSystemData2::new([4, 4], Vec2::ONE, Vec2::ZERO).unwrap();
        let mut particles = snow_block();
        let mut transfer = MpmTransfer::new(SnowMaterial::default());
        transfer.prepare(&mut particles);

        transfer.particles_to_grid(&mut grid, &particles, 0.01);
        let total = particles.total_mass();
        assert!((grid.total_mass().x - total).abs() < 1e-4);
        assert!(grid.u().iter().all(|u| u.abs() < 1e-6));

        grid.store_old_velocities();
        transfer.grid_to_particles(&grid, &mut particles, 0.01);
        assert!(particles.velocities().iter().all(|v| v.length() < 1e-6));
        let f = particles.matrix_data_index(DEFORMATION_GRADIENT_COLUMN).unwrap();
        for m in particles.matrix_data(f) {
            assert!((m.determinant() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_compressed_particle_pushes_out() {
        let mut grid = GridSystemData2::new([4, 4], Vec2::ONE, Vec2::ZERO).unwrap();
        let mut particles = ParticleSystemData2::default();
        particles.set_mass(1.0);
        particles.add_particle(Vec2::new(2.0, 2.0), Vec2::ZERO, Vec2::ZERO);
        let mut transfer = MpmTransfer::new(SnowMaterial::default());
        transfer.prepare(&mut particles);
        let f = particles.matrix_data_index(DEFORMATION_GRADIENT_COLUMN).unwrap();
        particles.matrix_data_mut(f)[0] = Mat2::from_diagonal(Vec2::new(0.98, 1.0));

        transfer.particles_to_grid(&mut grid, &particles, 1e-3);
        // Faces left of the particle move left, faces right of it move right
        assert!(grid.u()[(1, 1)] < 0.0);
        assert!(grid.u()[(3, 1)] > 0.0);
    }

    #[test]
    fn test_stable_dt_from_wave_speed() {
        let grid = GridSystemData2::new([4, 4], Vec2::new(1.0, 0.5), Vec2::ZERO).unwrap();
        let transfer = MpmTransfer::new(SnowMaterial::default());
        let dt = transfer.max_stable_dt(&grid).unwrap();
        let expected = 0.5 * 0.5 / (1.4e5f32 / 400.0).sqrt();
        assert!((dt - expected).abs() < 1e-6);
    }
}
