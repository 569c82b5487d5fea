//! Hash-grid neighbor search over particle positions.

use glam::Vec2;
use rustc_hash::FxHashMap;

/// Buckets point indices by the grid cell they fall into.
///
/// Cells are `grid_spacing` wide; a spacing of twice the typical query radius
/// keeps each query within a 3x3 block of buckets.
#[derive(Clone, Debug)]
pub struct PointHashGridSearcher2 {
    grid_spacing: f32,
    buckets: FxHashMap<(i32, i32), Vec<usize>>,
    points: Vec<Vec2>,
}

impl PointHashGridSearcher2 {
    pub fn new(grid_spacing: f32) -> Self {
        Self {
            grid_spacing: grid_spacing.max(f32::EPSILON),
            buckets: FxHashMap::default(),
            points: Vec::new(),
        }
    }

    pub fn grid_spacing(&self) -> f32 {
        self.grid_spacing
    }

    #[inline]
    fn bucket_of(&self, p: Vec2) -> (i32, i32) {
        let c = (p / self.grid_spacing).floor();
        (c.x as i32, c.y as i32)
    }

    /// Rebuild from scratch; index `i` refers to `points[i]`.
    pub fn build(&mut self, points: &[Vec2]) {
        self.buckets.clear();
        self.points.clear();
        self.points.extend_from_slice(points);
        for (i, &p) in points.iter().enumerate() {
            let key = self.bucket_of(p);
            self.buckets.entry(key).or_default().push(i);
        }
    }

    /// Insert one more point, returning its index.
    pub fn add(&mut self, point: Vec2) -> usize {
        let idx = self.points.len();
        self.points.push(point);
        let key = self.bucket_of(point);
        self.buckets.entry(key).or_default().push(idx);
        idx
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Call `f(index, position)` for every point within `radius` of `origin`.
    pub fn for_each_nearby_point(&self, origin: Vec2, radius: f32, mut f: impl FnMut(usize, Vec2)) {
        let (lo_i, lo_j) = self.bucket_of(origin - Vec2::splat(radius));
        let (hi_i, hi_j) = self.bucket_of(origin + Vec2::splat(radius));
        let radius_sq = radius * radius;

        for j in lo_j..=hi_j {
            for i in lo_i..=hi_i {
                let Some(bucket) = self.buckets.get(&(i, j)) else {
                    continue;
                };
                for &idx in bucket {
                    let p = self.points[idx];
                    if (p - origin).length_squared() <= radius_sq {
                        f(idx, p);
                    }
                }
            }
        }
    }

    /// True if any point lies within `radius` of `origin`.
    pub fn has_nearby_point(&self, origin: Vec2, radius: f32) -> bool {
        let mut found = false;
        self.for_each_nearby_point(origin, radius, |_, _| found = true);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearby_matches_brute_force() {
        let mut points = Vec::new();
        for j in 0..10 {
            for i in 0..10 {
                points.push(Vec2::new(i as f32 * 0.3, j as f32 * 0.17 - 0.5));
            }
        }
        let mut searcher = PointHashGridSearcher2::new(0.4);
        searcher.build(&points);

        let origin = Vec2::new(1.1, 0.2);
        let radius = 0.45;
        let mut found = Vec::new();
        searcher.for_each_nearby_point(origin, radius, |i, _| found.push(i));
        found.sort_unstable();

        let expected: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| (**p - origin).length() <= radius)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_has_nearby_point_and_add() {
        let mut searcher = PointHashGridSearcher2::new(1.0);
        searcher.build(&[Vec2::new(-3.5, 2.0)]);
        assert!(searcher.has_nearby_point(Vec2::new(-3.0, 2.0), 0.6));
        assert!(!searcher.has_nearby_point(Vec2::new(0.0, 0.0), 1.0));

        assert_eq!(searcher.add(Vec2::new(0.2, 0.1)), 1);
        assert!(searcher.has_nearby_point(Vec2::new(0.0, 0.0), 1.0));
        assert_eq!(searcher.len(), 2);
    }
}
