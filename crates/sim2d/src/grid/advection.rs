//! Advection: semi-Lagrangian transport of the face velocities, and particle
//! position integration with domain clamping.

use glam::Vec2;

use crate::array::Array2;
use crate::bounding_box::BoundingBox2F;
use crate::grid::grid_system::GridSystemData2;
use crate::particle::ParticleSystemData2;

/// Trace `pos` back through the velocity field over `dt` (midpoint rule).
#[inline]
fn backtrace(grid: &GridSystemData2, pos: Vec2, dt: f32) -> Vec2 {
    let v1 = grid.sample_velocity(pos);
    let mid = pos - 0.5 * dt * v1;
    let v2 = grid.sample_velocity(mid);
    pos - dt * v2
}

/// Semi-Lagrangian self-advection of the velocity field.
pub fn advect_velocity(grid: &mut GridSystemData2, dt: f32) {
    if dt == 0.0 {
        return;
    }

    let mut new_u = Array2::new(grid.u.size(), 0.0);
    {
        let src = &*grid;
        new_u.par_for_each_index_mut(|[i, j], value| {
            let origin = backtrace(src, src.u_position(i, j), dt);
            *value = src.sample_u(origin);
        });
    }

    let mut new_v = Array2::new(grid.v.size(), 0.0);
    {
        let src = &*grid;
        new_v.par_for_each_index_mut(|[i, j], value| {
            let origin = backtrace(src, src.v_position(i, j), dt);
            *value = src.sample_v(origin);
        });
    }

    grid.u.swap(&mut new_u);
    grid.v.swap(&mut new_v);
}

/// Move particles with their velocities.
pub fn advect_particles(particles: &mut ParticleSystemData2, dt: f32) {
    use rayon::prelude::*;

    let (positions, velocities) = particles.positions_and_velocities_mut();
    positions
        .par_iter_mut()
        .zip(velocities.par_iter())
        .for_each(|(p, v)| *p += *v * dt);
}

/// Clamp particles into `bounds` shrunk by `radius`, zeroing the velocity
/// component that pointed outward. Returns how many particles were clamped.
pub fn clamp_particles_to_domain(
    particles: &mut ParticleSystemData2,
    bounds: &BoundingBox2F,
    radius: f32,
) -> usize {
    let mut lower = bounds.lower_vec2() + Vec2::splat(radius);
    let mut upper = bounds.upper_vec2() - Vec2::splat(radius);
    // A radius wider than the domain collapses to the center line
    let mid = bounds.mid_point_vec2();
    for axis in 0..2 {
        if lower[axis] > upper[axis] {
            lower[axis] = mid[axis];
            upper[axis] = mid[axis];
        }
    }

    let mut clamped = 0;
    let (positions, velocities) = particles.positions_and_velocities_mut();
    for (p, v) in positions.iter_mut().zip(velocities.iter_mut()) {
        let mut hit = false;
        for axis in 0..2 {
            if p[axis] < lower[axis] {
                p[axis] = lower[axis];
                v[axis] = v[axis].max(0.0);
                hit = true;
            } else if p[axis] > upper[axis] {
                p[axis] = upper[axis];
                v[axis] = v[axis].min(0.0);
                hit = true;
            }
        }
        if hit {
            clamped += 1;
        }
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_flow_is_preserved() {
        let mut grid = GridSystemData2::new([6, 6], Vec2::ONE, Vec2::ZERO).unwrap();
        grid.u.fill(0.5);
        grid.v.fill(-0.25);
        advect_velocity(&mut grid, 0.3);
        assert!(grid.u().iter().all(|&u| (u - 0.5).abs() < 1e-6));
        assert!(grid.v().iter().all(|&v| (v + 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_shear_is_transported() {
        // u(y) increases with y, v = 1 moves the profile upward
        let mut grid = GridSystemData2::new([4, 8], Vec2::ONE, Vec2::ZERO).unwrap();
        for j in 0..8 {
            for i in 0..5 {
                grid.u[(i, j)] = grid.u_position(i, j).y;
            }
        }
        grid.v.fill(1.0);
        advect_velocity(&mut grid, 1.0);
        // Interior sample now carries the value from one cell below
        let expected = grid.u_position(2, 4).y - 1.0;
        assert!((grid.u[(2, 4)] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_advect_and_clamp_particles() {
        let mut particles = ParticleSystemData2::default();
        particles
            .add_particles(
                &[Vec2::new(0.5, 0.5), Vec2::new(3.9, 1.0)],
                &[Vec2::new(0.0, -10.0), Vec2::new(1.0, 0.0)],
                &[],
            )
            .unwrap();
        advect_particles(&mut particles, 0.1);
        assert_eq!(particles.positions()[0], Vec2::new(0.5, -0.5));

        let bounds = BoundingBox2F::from_vec2(Vec2::ZERO, Vec2::splat(4.0));
        let clamped = clamp_particles_to_domain(&mut particles, &bounds, 0.01);
        assert_eq!(clamped, 2);
        assert!((particles.positions()[0].y - 0.01).abs() < 1e-6);
        assert_eq!(particles.velocities()[0].y, 0.0);
        assert!((particles.positions()[1].x - 3.99).abs() < 1e-5);
        assert_eq!(particles.velocities()[1].x, 0.0);
        assert!(particles.positions().iter().all(|p| bounds.contains_vec2(*p)));
    }
}
