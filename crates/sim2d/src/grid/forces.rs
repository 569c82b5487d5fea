//! External forces on the face grids.

use glam::Vec2;

use crate::grid::grid_system::GridSystemData2;

/// Add `gravity * dt` to every face velocity.
pub fn apply_gravity(grid: &mut GridSystemData2, gravity: Vec2, dt: f32) {
    let du = gravity.x * dt;
    let dv = gravity.y * dt;
    if du != 0.0 {
        grid.u.par_for_each(|u| *u += du);
    }
    if dv != 0.0 {
        grid.v.par_for_each(|v| *v += dv);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GRAVITY;

    #[test]
    fn test_gravity_only_touches_v() {
        let mut grid = GridSystemData2::new([3, 3], Vec2::ONE, Vec2::ZERO).unwrap();
        apply_gravity(&mut grid, Vec2::new(0.0, GRAVITY), 0.1);
        assert!(grid.u().iter().all(|&u| u == 0.0));
        assert!(grid.v().iter().all(|&v| (v - GRAVITY * 0.1).abs() < 1e-6));
    }
}
