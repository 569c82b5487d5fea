//! Domain walls and collider boundary conditions on the face grids.

use serde::{Deserialize, Serialize};

use crate::geometry::Collider2;
use crate::grid::grid_system::{CellType, GridSystemData2};

/// Which sides of the domain are solid walls. Open sides act as free
/// surface (zero pressure) for the projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedBoundaries {
    pub left: bool,
    pub right: bool,
    pub bottom: bool,
    pub top: bool,
}

impl ClosedBoundaries {
    pub const ALL: Self = Self {
        left: true,
        right: true,
        bottom: true,
        top: true,
    };

    pub const NONE: Self = Self {
        left: false,
        right: false,
        bottom: false,
        top: false,
    };
}

impl Default for ClosedBoundaries {
    fn default() -> Self {
        Self::ALL
    }
}

/// Sample the collider's signed distance at cell centers and mark the cells
/// inside it as solid. Cells that were solid and no longer are become air.
pub fn update_collider_cells(grid: &mut GridSystemData2, collider: Option<&dyn Collider2>) {
    let (w, h) = (grid.width(), grid.height());
    for j in 0..h {
        for i in 0..w {
            let sdf = match collider {
                Some(c) => c.surface().signed_distance(grid.cell_center(i, j)),
                None => f32::INFINITY,
            };
            grid.collider_sdf[(i, j)] = sdf;

            let ct = &mut grid.cell_type[(i, j)];
            if sdf < 0.0 {
                *ct = CellType::Solid;
            } else if *ct == CellType::Solid {
                *ct = CellType::Air;
            }
        }
    }
}

#[inline]
fn is_solid(grid: &GridSystemData2, i: i32, j: i32) -> bool {
    grid.cell_in_bounds(i, j) && grid.cell_type[(i as usize, j as usize)] == CellType::Solid
}

/// True if u face (i, j) touches a solid cell or a closed wall.
pub fn is_u_face_solid(grid: &GridSystemData2, walls: ClosedBoundaries, i: usize, j: usize) -> bool {
    if i == 0 && walls.left || i == grid.width() && walls.right {
        return true;
    }
    is_solid(grid, i as i32 - 1, j as i32) || is_solid(grid, i as i32, j as i32)
}

/// True if v face (i, j) touches a solid cell or a closed wall.
pub fn is_v_face_solid(grid: &GridSystemData2, walls: ClosedBoundaries, i: usize, j: usize) -> bool {
    if j == 0 && walls.bottom || j == grid.height() && walls.top {
        return true;
    }
    is_solid(grid, i as i32, j as i32 - 1) || is_solid(grid, i as i32, j as i32)
}

/// Enforce no-penetration on solid faces.
///
/// Faces next to a solid cell take the collider's velocity; faces on a closed
/// wall get a zero normal component.
pub fn apply_boundary_conditions(
    grid: &mut GridSystemData2,
    walls: ClosedBoundaries,
    collider: Option<&dyn Collider2>,
) {
    let (w, h) = (grid.width(), grid.height());

    if let Some(collider) = collider {
        for j in 0..h {
            for i in 0..=w {
                if is_solid(grid, i as i32 - 1, j as i32) || is_solid(grid, i as i32, j as i32) {
                    grid.u[(i, j)] = collider.velocity_at(grid.u_position(i, j)).x;
                }
            }
        }
        for j in 0..=h {
            for i in 0..w {
                if is_solid(grid, i as i32, j as i32 - 1) || is_solid(grid, i as i32, j as i32) {
                    grid.v[(i, j)] = collider.velocity_at(grid.v_position(i, j)).y;
                }
            }
        }
    }

    // Domain walls
    for j in 0..h {
        if walls.left {
            grid.u[(0, j)] = 0.0;
        }
        if walls.right {
            grid.u[(w, j)] = 0.0;
        }
    }
    for i in 0..w {
        if walls.bottom {
            grid.v[(i, 0)] = 0.0;
        }
        if walls.top {
            grid.v[(i, h)] = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Box2, RigidBodyCollider2};
    use glam::Vec2;
    use std::sync::Arc;

    #[test]
    fn test_closed_walls_zero_normal_velocity() {
        let mut grid = GridSystemData2::new([4, 4], Vec2::ONE, Vec2::ZERO).unwrap();
        grid.u.fill(1.0);
        grid.v.fill(1.0);

        apply_boundary_conditions(&mut grid, ClosedBoundaries::ALL, None);

        for j in 0..4 {
            assert_eq!(grid.u[(0, j)], 0.0);
            assert_eq!(grid.u[(4, j)], 0.0);
            assert_eq!(grid.u[(2, j)], 1.0);
        }
        for i in 0..4 {
            assert_eq!(grid.v[(i, 0)], 0.0);
            assert_eq!(grid.v[(i, 4)], 0.0);
            assert_eq!(grid.v[(i, 2)], 1.0);
        }
    }

    #[test]
    fn test_open_walls_untouched() {
        let mut grid = GridSystemData2::new([2, 2], Vec2::ONE, Vec2::ZERO).unwrap();
        grid.v.fill(-1.0);
        let walls = ClosedBoundaries {
            top: false,
            ..ClosedBoundaries::ALL
        };
        apply_boundary_conditions(&mut grid, walls, None);
        assert_eq!(grid.v[(0, 2)], -1.0);
        assert_eq!(grid.v[(0, 0)], 0.0);
        assert!(!is_v_face_solid(&grid, walls, 0, 2));
        assert!(is_v_face_solid(&grid, walls, 0, 0));
    }

    #[test]
    fn test_collider_cells_and_velocity() {
        let mut grid = GridSystemData2::new([4, 4], Vec2::ONE, Vec2::ZERO).unwrap();
        let collider = RigidBodyCollider2::builder()
            .with_surface(Arc::new(Box2::new(Vec2::new(0.0, 0.0), Vec2::new(4.0, 1.0))))
            .with_linear_velocity(Vec2::new(0.5, 0.25))
            .build()
            .unwrap();

        update_collider_cells(&mut grid, Some(&collider as &dyn Collider2));
        for i in 0..4 {
            assert_eq!(grid.cell_type[(i, 0)], CellType::Solid);
            assert_eq!(grid.cell_type[(i, 1)], CellType::Air);
        }
        assert!(grid.collider_sdf[(0, 0)] < 0.0);

        let walls = ClosedBoundaries::NONE;
        apply_boundary_conditions(&mut grid, walls, Some(&collider as &dyn Collider2));
        // Face between the solid row and the first free row moves with the collider
        assert_eq!(grid.v[(1, 1)], 0.25);
        assert_eq!(grid.u[(2, 0)], 0.5);
        assert_eq!(grid.v[(1, 2)], 0.0);
        assert!(is_v_face_solid(&grid, walls, 1, 1));
        assert!(!is_v_face_solid(&grid, walls, 1, 2));

        // Removing the collider frees the cells again
        update_collider_cells(&mut grid, None);
        assert_eq!(grid.cell_type[(0, 0)], CellType::Air);
        assert_eq!(grid.collider_sdf[(0, 0)], f32::INFINITY);
    }
}
