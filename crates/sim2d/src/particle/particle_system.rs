//! Structure-of-arrays particle storage.
//!
//! Every attribute is a named column. All columns share one row count, so
//! particle `i` is row `i` of each column. Columns are only ever handed out
//! as slices; the row count changes through [`ParticleSystemData2`] methods
//! that resize every column together.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat2, Vec2};
use rayon::prelude::*;

use crate::constants::{DEFAULT_PARTICLE_MASS, DEFAULT_PARTICLE_RADIUS};
use crate::error::{SimError, SimResult};
use crate::particle::neighbor::PointHashGridSearcher2;

/// Identity of a particle system, used by emitters to check their target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParticleSystemId(u64);

impl ParticleSystemId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Debug)]
struct Column<T> {
    name: String,
    init: T,
    data: Vec<T>,
}

impl<T: Copy> Column<T> {
    fn new(name: &str, init: T, len: usize) -> Self {
        Self {
            name: name.to_owned(),
            init,
            data: vec![init; len],
        }
    }

    fn resize(&mut self, len: usize) {
        self.data.resize(len, self.init);
    }

    fn compact(&mut self, keep: &[bool]) {
        let mut k = keep.iter();
        self.data.retain(|_| k.next().copied().unwrap_or(false));
    }
}

fn find<T>(columns: &[Column<T>], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.name == name)
}

/// Particle attributes in structure-of-arrays form.
#[derive(Debug)]
pub struct ParticleSystemData2 {
    id: ParticleSystemId,
    radius: f32,
    mass: f32,
    number_of_particles: usize,
    scalar_columns: Vec<Column<f32>>,
    vector_columns: Vec<Column<Vec2>>,
    matrix_columns: Vec<Column<Mat2>>,
    neighbor_searcher: Option<PointHashGridSearcher2>,
    neighbor_lists: Vec<Vec<usize>>,
}

impl ParticleSystemData2 {
    /// Handle of the built-in `position` vector column.
    pub const POSITION: usize = 0;
    /// Handle of the built-in `velocity` vector column.
    pub const VELOCITY: usize = 1;
    /// Handle of the built-in `force` vector column.
    pub const FORCE: usize = 2;
    /// Handle of the built-in `mass` scalar column.
    pub const MASS: usize = 0;

    pub fn new(number_of_particles: usize) -> Self {
        let n = number_of_particles;
        Self {
            id: ParticleSystemId::next(),
            radius: DEFAULT_PARTICLE_RADIUS,
            mass: DEFAULT_PARTICLE_MASS,
            number_of_particles: n,
            scalar_columns: vec![Column::new("mass", DEFAULT_PARTICLE_MASS, n)],
            vector_columns: vec![
                Column::new("position", Vec2::ZERO, n),
                Column::new("velocity", Vec2::ZERO, n),
                Column::new("force", Vec2::ZERO, n),
            ],
            matrix_columns: Vec::new(),
            neighbor_searcher: None,
            neighbor_lists: Vec::new(),
        }
    }

    pub fn id(&self) -> ParticleSystemId {
        self.id
    }

    pub fn number_of_particles(&self) -> usize {
        self.number_of_particles
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_particles == 0
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.max(0.0);
    }

    /// Default particle mass.
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Set the default mass and overwrite the mass of every particle.
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass.max(0.0);
        let column = &mut self.scalar_columns[Self::MASS];
        column.init = self.mass;
        column.data.fill(self.mass);
    }

    /// Change the row count of every column. New rows take each column's
    /// initial value.
    pub fn resize(&mut self, new_len: usize) {
        self.number_of_particles = new_len;
        self.scalar_columns.iter_mut().for_each(|c| c.resize(new_len));
        self.vector_columns.iter_mut().for_each(|c| c.resize(new_len));
        self.matrix_columns.iter_mut().for_each(|c| c.resize(new_len));
        self.invalidate_neighbors();
    }

    // ------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------

    pub fn add_scalar_data(&mut self, name: &str, init: f32) -> usize {
        if let Some(idx) = find(&self.scalar_columns, name) {
            return idx;
        }
        let n = self.number_of_particles;
        self.scalar_columns.push(Column::new(name, init, n));
        self.scalar_columns.len() - 1
    }

    pub fn add_vector_data(&mut self, name: &str, init: Vec2) -> usize {
        if let Some(idx) = find(&self.vector_columns, name) {
            return idx;
        }
        let n = self.number_of_particles;
        self.vector_columns.push(Column::new(name, init, n));
        self.vector_columns.len() - 1
    }

    pub fn add_matrix_data(&mut self, name: &str, init: Mat2) -> usize {
        if let Some(idx) = find(&self.matrix_columns, name) {
            return idx;
        }
        let n = self.number_of_particles;
        self.matrix_columns.push(Column::new(name, init, n));
        self.matrix_columns.len() - 1
    }

    pub fn scalar_data_index(&self, name: &str) -> Option<usize> {
        find(&self.scalar_columns, name)
    }

    pub fn vector_data_index(&self, name: &str) -> Option<usize> {
        find(&self.vector_columns, name)
    }

    pub fn matrix_data_index(&self, name: &str) -> Option<usize> {
        find(&self.matrix_columns, name)
    }

    /// # Panics
    /// If `handle` was not returned by [`Self::add_scalar_data`].
    pub fn scalar_data(&self, handle: usize) -> &[f32] {
        &self.scalar_columns[handle].data
    }

    pub fn scalar_data_mut(&mut self, handle: usize) -> &mut [f32] {
        &mut self.scalar_columns[handle].data
    }

    pub fn vector_data(&self, handle: usize) -> &[Vec2] {
        &self.vector_columns[handle].data
    }

    /// Mutable access to a vector column. Borrowing the position column
    /// drops the neighbor searcher and lists.
    pub fn vector_data_mut(&mut self, handle: usize) -> &mut [Vec2] {
        if handle == Self::POSITION {
            self.invalidate_neighbors();
        }
        &mut self.vector_columns[handle].data
    }

    pub fn matrix_data(&self, handle: usize) -> &[Mat2] {
        &self.matrix_columns[handle].data
    }

    pub fn matrix_data_mut(&mut self, handle: usize) -> &mut [Mat2] {
        &mut self.matrix_columns[handle].data
    }

    pub fn positions(&self) -> &[Vec2] {
        self.vector_data(Self::POSITION)
    }

    pub fn positions_mut(&mut self) -> &mut [Vec2] {
        self.vector_data_mut(Self::POSITION)
    }

    pub fn velocities(&self) -> &[Vec2] {
        self.vector_data(Self::VELOCITY)
    }

    pub fn velocities_mut(&mut self) -> &mut [Vec2] {
        self.vector_data_mut(Self::VELOCITY)
    }

    pub fn forces(&self) -> &[Vec2] {
        self.vector_data(Self::FORCE)
    }

    pub fn forces_mut(&mut self) -> &mut [Vec2] {
        self.vector_data_mut(Self::FORCE)
    }

    pub fn masses(&self) -> &[f32] {
        self.scalar_data(Self::MASS)
    }

    pub fn masses_mut(&mut self) -> &mut [f32] {
        self.scalar_data_mut(Self::MASS)
    }

    /// Positions and velocities borrowed mutably at the same time. Drops the
    /// neighbor searcher and lists.
    pub fn positions_and_velocities_mut(&mut self) -> (&mut [Vec2], &mut [Vec2]) {
        self.invalidate_neighbors();
        let (head, tail) = self.vector_columns.split_at_mut(Self::VELOCITY);
        (
            &mut head[Self::POSITION].data,
            &mut tail[0].data,
        )
    }

    pub fn total_mass(&self) -> f32 {
        self.masses().iter().sum()
    }

    // ------------------------------------------------------------------
    // Insertion and removal
    // ------------------------------------------------------------------

    pub fn add_particle(&mut self, position: Vec2, velocity: Vec2, force: Vec2) {
        self.resize(self.number_of_particles + 1);
        let last = self.number_of_particles - 1;
        self.vector_columns[Self::POSITION].data[last] = position;
        self.vector_columns[Self::VELOCITY].data[last] = velocity;
        self.vector_columns[Self::FORCE].data[last] = force;
    }

    /// Append particles. `velocities` and `forces` may be empty (zero), and
    /// otherwise must match `positions` in length.
    pub fn add_particles(
        &mut self,
        positions: &[Vec2],
        velocities: &[Vec2],
        forces: &[Vec2],
    ) -> SimResult<()> {
        let n = positions.len();
        for (name, len) in [("velocities", velocities.len()), ("forces", forces.len())] {
            if len != 0 && len != n {
                return Err(SimError::invariant(
                    "ParticleSystemData2::add_particles",
                    format!("{} has {} entries but positions has {}", name, len, n),
                ));
            }
        }

        let start = self.number_of_particles;
        self.resize(start + n);
        self.vector_columns[Self::POSITION].data[start..].copy_from_slice(positions);
        if !velocities.is_empty() {
            self.vector_columns[Self::VELOCITY].data[start..].copy_from_slice(velocities);
        }
        if !forces.is_empty() {
            self.vector_columns[Self::FORCE].data[start..].copy_from_slice(forces);
        }
        Ok(())
    }

    /// Keep particles for which `keep(position, velocity)` is true. Survivors
    /// are renumbered in order. Returns the number removed.
    pub fn retain(&mut self, mut keep: impl FnMut(Vec2, Vec2) -> bool) -> usize {
        let mask: Vec<bool> = self
            .positions()
            .iter()
            .zip(self.velocities())
            .map(|(&p, &v)| keep(p, v))
            .collect();
        let kept = mask.iter().filter(|k| **k).count();
        let removed = self.number_of_particles - kept;
        if removed == 0 {
            return 0;
        }

        self.scalar_columns.iter_mut().for_each(|c| c.compact(&mask));
        self.vector_columns.iter_mut().for_each(|c| c.compact(&mask));
        self.matrix_columns.iter_mut().for_each(|c| c.compact(&mask));
        self.number_of_particles = kept;
        self.invalidate_neighbors();
        removed
    }

    /// Check that every column has exactly one row per particle.
    pub fn validate(&self) -> SimResult<()> {
        let n = self.number_of_particles;
        let lengths = self
            .scalar_columns
            .iter()
            .map(|c| (c.name.as_str(), c.data.len()))
            .chain(self.vector_columns.iter().map(|c| (c.name.as_str(), c.data.len())))
            .chain(self.matrix_columns.iter().map(|c| (c.name.as_str(), c.data.len())));
        for (name, len) in lengths {
            if len != n {
                return Err(SimError::invariant(
                    "ParticleSystemData2::validate",
                    format!("column '{}' has {} rows, expected {}", name, len, n),
                ));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Neighbors
    // ------------------------------------------------------------------

    fn invalidate_neighbors(&mut self) {
        self.neighbor_searcher = None;
        self.neighbor_lists.clear();
    }

    /// Bucket current positions into a hash grid sized for `max_search_radius`.
    pub fn build_neighbor_searcher(&mut self, max_search_radius: f32) {
        let mut searcher = PointHashGridSearcher2::new(2.0 * max_search_radius);
        searcher.build(self.positions());
        self.neighbor_searcher = Some(searcher);
    }

    /// Searcher from the last [`Self::build_neighbor_searcher`] call. `None`
    /// once positions were borrowed mutably or the particle count changed.
    pub fn neighbor_searcher(&self) -> Option<&PointHashGridSearcher2> {
        self.neighbor_searcher.as_ref()
    }

    /// For each particle, the other particles within `max_search_radius`.
    pub fn build_neighbor_lists(&mut self, max_search_radius: f32) {
        self.build_neighbor_searcher(max_search_radius);
        let Some(searcher) = self.neighbor_searcher.as_ref() else {
            return;
        };
        let positions = &self.vector_columns[Self::POSITION].data;
        self.neighbor_lists = positions
            .par_iter()
            .enumerate()
            .map(|(i, &p)| {
                let mut list = Vec::new();
                searcher.for_each_nearby_point(p, max_search_radius, |j, _| {
                    if j != i {
                        list.push(j);
                    }
                });
                list
            })
            .collect();
    }

    pub fn neighbor_lists(&self) -> &[Vec<usize>] {
        &self.neighbor_lists
    }
}

impl Default for ParticleSystemData2 {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clone for ParticleSystemData2 {
    /// The copy is a distinct particle system with its own id.
    fn clone(&self) -> Self {
        Self {
            id: ParticleSystemId::next(),
            radius: self.radius,
            mass: self.mass,
            number_of_particles: self.number_of_particles,
            scalar_columns: self.scalar_columns.clone(),
            vector_columns: self.vector_columns.clone(),
            matrix_columns: self.matrix_columns.clone(),
            neighbor_searcher: self.neighbor_searcher.clone(),
            neighbor_lists: self.neighbor_lists.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_columns() {
        let p = ParticleSystemData2::new(3);
        assert_eq!(p.number_of_particles(), 3);
        assert_eq!(p.vector_data_index("position"), Some(ParticleSystemData2::POSITION));
        assert_eq!(p.vector_data_index("velocity"), Some(ParticleSystemData2::VELOCITY));
        assert_eq!(p.vector_data_index("force"), Some(ParticleSystemData2::FORCE));
        assert_eq!(p.scalar_data_index("mass"), Some(ParticleSystemData2::MASS));
        assert!(p.masses().iter().all(|&m| m == DEFAULT_PARTICLE_MASS));
        p.validate().unwrap();
    }

    #[test]
    fn test_custom_columns_follow_resize() {
        let mut p = ParticleSystemData2::new(2);
        let density = p.add_scalar_data("density", 1000.0);
        let again = p.add_scalar_data("density", 5.0);
        assert_eq!(density, again);
        let c = p.add_matrix_data("affine", Mat2::IDENTITY);

        p.scalar_data_mut(density)[1] = 2.0;
        p.resize(4);
        assert_eq!(p.scalar_data(density), &[1000.0, 2.0, 1000.0, 1000.0]);
        assert_eq!(p.matrix_data(c).len(), 4);
        assert_eq!(p.matrix_data(c)[3], Mat2::IDENTITY);
        p.validate().unwrap();
    }

    #[test]
    fn test_add_particles_lengths() {
        let mut p = ParticleSystemData2::default();
        p.add_particles(&[Vec2::ZERO, Vec2::ONE], &[], &[]).unwrap();
        assert_eq!(p.number_of_particles(), 2);
        assert_eq!(p.velocities(), &[Vec2::ZERO, Vec2::ZERO]);

        p.add_particles(&[Vec2::X], &[Vec2::Y], &[Vec2::NEG_Y]).unwrap();
        assert_eq!(p.positions()[2], Vec2::X);
        assert_eq!(p.velocities()[2], Vec2::Y);
        assert_eq!(p.forces()[2], Vec2::NEG_Y);

        let err = p
            .add_particles(&[Vec2::ZERO, Vec2::ONE], &[Vec2::X], &[])
            .unwrap_err();
        assert!(matches!(err, SimError::InvariantViolation { .. }));
        assert_eq!(p.number_of_particles(), 3);
    }

    #[test]
    fn test_retain_renumbers() {
        let mut p = ParticleSystemData2::default();
        let tag = p.add_scalar_data("tag", 0.0);
        for i in 0..5 {
            p.add_particle(Vec2::new(i as f32, 0.0), Vec2::ZERO, Vec2::ZERO);
            p.scalar_data_mut(tag)[i] = i as f32;
        }
        let removed = p.retain(|pos, _| pos.x != 1.0 && pos.x != 3.0);
        assert_eq!(removed, 2);
        assert_eq!(p.number_of_particles(), 3);
        assert_eq!(p.scalar_data(tag), &[0.0, 2.0, 4.0]);
        assert_eq!(p.positions()[2], Vec2::new(4.0, 0.0));
        p.validate().unwrap();
    }

    #[test]
    fn test_set_mass_updates_rows_and_init() {
        let mut p = ParticleSystemData2::new(2);
        p.set_mass(0.5);
        assert_eq!(p.masses(), &[0.5, 0.5]);
        p.resize(3);
        assert_eq!(p.masses()[2], 0.5);
        assert!((p.total_mass() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ParticleSystemData2::default();
        let b = a.clone();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_neighbor_lists() {
        let mut p = ParticleSystemData2::default();
        p.add_particles(
            &[Vec2::ZERO, Vec2::new(0.1, 0.0), Vec2::new(1.0, 1.0)],
            &[],
            &[],
        )
        .unwrap();
        p.build_neighbor_lists(0.2);
        let lists = p.neighbor_lists();
        assert_eq!(lists[0], vec![1]);
        assert_eq!(lists[1], vec![0]);
        assert!(lists[2].is_empty());
        assert!(p.neighbor_searcher().is_some());

        p.resize(4);
        assert!(p.neighbor_searcher().is_none());
    }

    #[test]
    fn test_moving_particles_drops_stale_neighbors() {
        let mut p = ParticleSystemData2::default();
        p.add_particles(&[Vec2::ZERO, Vec2::new(0.1, 0.0)], &[], &[])
            .unwrap();

        p.build_neighbor_lists(0.2);
        p.positions_mut()[1] = Vec2::new(5.0, 5.0);
        assert!(p.neighbor_searcher().is_none());
        assert!(p.neighbor_lists().is_empty());

        p.build_neighbor_searcher(0.2);
        let (pos, _) = p.positions_and_velocities_mut();
        pos[0] = Vec2::new(-5.0, 0.0);
        assert!(p.neighbor_searcher().is_none());

        // Velocities alone keep the searcher
        p.build_neighbor_searcher(0.2);
        p.velocities_mut()[0] = Vec2::ONE;
        assert!(p.neighbor_searcher().is_some());
    }

    #[test]
    fn test_positions_and_velocities_split() {
        let mut p = ParticleSystemData2::new(1);
        let (pos, vel) = p.positions_and_velocities_mut();
        vel[0] = Vec2::new(1.0, 2.0);
        pos[0] += vel[0];
        assert_eq!(p.positions()[0], Vec2::new(1.0, 2.0));
    }
}
