//! Extend face velocities from fluid faces into neighboring air faces, so
//! particles near the free surface sample meaningful velocities.

use crate::array::Array2;
use crate::grid::grid_system::{CellType, GridSystemData2};

/// Breadth-first layers: each pass fills invalid entries that have at least
/// one valid 4-neighbor with the average of those neighbors.
pub fn extrapolate_field(field: &mut Array2<f32>, valid: &mut Array2<bool>, depth: usize) {
    let (w, h) = (field.width(), field.height());
    for _ in 0..depth {
        let mut updates = Vec::new();
        for j in 0..h {
            for i in 0..w {
                if valid[(i, j)] {
                    continue;
                }
                let mut sum = 0.0;
                let mut count = 0;
                let neighbors = [
                    (i.wrapping_sub(1), j),
                    (i + 1, j),
                    (i, j.wrapping_sub(1)),
                    (i, j + 1),
                ];
                for (ni, nj) in neighbors {
                    if ni < w && nj < h && valid[(ni, nj)] {
                        sum += field[(ni, nj)];
                        count += 1;
                    }
                }
                if count > 0 {
                    updates.push((i, j, sum / count as f32));
                }
            }
        }
        if updates.is_empty() {
            break;
        }
        for (i, j, value) in updates {
            field[(i, j)] = value;
            valid[(i, j)] = true;
        }
    }
}

/// Faces adjacent to at least one fluid cell are valid; every other face is
/// overwritten by extrapolation up to `depth` layers away.
pub fn extrapolate_velocities(grid: &mut GridSystemData2, depth: usize) {
    if depth == 0 {
        return;
    }
    let (w, h) = (grid.width(), grid.height());
    let is_fluid = |i: i32, j: i32| {
        grid.cell_in_bounds(i, j) && grid.cell_type[(i as usize, j as usize)] == CellType::Fluid
    };

    let mut u_valid = Array2::new([w + 1, h], false);
    for j in 0..h {
        for i in 0..=w {
            u_valid[(i, j)] = is_fluid(i as i32 - 1, j as i32) || is_fluid(i as i32, j as i32);
        }
    }
    let mut v_valid = Array2::new([w, h + 1], false);
    for j in 0..=h {
        for i in 0..w {
            v_valid[(i, j)] = is_fluid(i as i32, j as i32 - 1) || is_fluid(i as i32, j as i32);
        }
    }

    // Nothing to extend from
    if !u_valid.iter().any(|v| *v) && !v_valid.iter().any(|v| *v) {
        return;
    }

    extrapolate_field(&mut grid.u, &mut u_valid, depth);
    extrapolate_field(&mut grid.v, &mut v_valid, depth);
}
