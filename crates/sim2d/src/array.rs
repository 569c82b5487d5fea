//! Dense N-dimensional arrays backed by linear memory.
//!
//! Element `[x0, x1, .., xn]` is stored at `x0 + s0 * (x1 + s1 * (x2 + ..))`,
//! so axis 0 varies fastest. For 2-D arrays that is `i + width * j`, and
//! iterating `i` in the inner loop walks memory contiguously:
//!
//! ```
//! use sim2d::Array2;
//!
//! let mut a = Array2::new([3, 2], 0.0f32);
//! for j in 0..a.height() {
//!     for i in 0..a.width() {
//!         a[(i, j)] = (i + 10 * j) as f32;
//!     }
//! }
//! assert_eq!(a.as_slice(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
//! ```

use std::ops::{Index, IndexMut};

use rayon::prelude::*;

use crate::error::{SimError, SimResult};

/// Dense array with `N` axes.
#[derive(Clone, Debug, PartialEq)]
pub struct Array<T, const N: usize> {
    size: [usize; N],
    data: Vec<T>,
}

pub type Array1<T> = Array<T, 1>;
pub type Array2<T> = Array<T, 2>;
pub type Array3<T> = Array<T, 3>;

/// Number of elements for the given extents.
#[inline]
pub fn element_count<const N: usize>(size: &[usize; N]) -> usize {
    size.iter().product()
}

/// Linear offset of `idx`, without bounds checks.
#[inline]
fn linear_offset<const N: usize>(size: &[usize; N], idx: &[usize; N]) -> usize {
    let mut offset = 0;
    for axis in (0..N).rev() {
        offset = offset * size[axis] + idx[axis];
    }
    offset
}

#[inline]
fn in_bounds<const N: usize>(size: &[usize; N], idx: &[usize; N]) -> bool {
    idx.iter().zip(size.iter()).all(|(i, s)| i < s)
}

/// Inverse of [`linear_offset`].
#[inline]
fn unravel<const N: usize>(size: &[usize; N], mut linear: usize) -> [usize; N] {
    let mut idx = [0; N];
    for axis in 0..N {
        if size[axis] == 0 {
            break;
        }
        idx[axis] = linear % size[axis];
        linear /= size[axis];
    }
    idx
}

/// Advance a multi-index by one in row-major order. Returns false on wrap-around.
#[inline]
fn increment<const N: usize>(size: &[usize; N], idx: &mut [usize; N]) -> bool {
    for axis in 0..N {
        idx[axis] += 1;
        if idx[axis] < size[axis] {
            return true;
        }
        idx[axis] = 0;
    }
    false
}

/// Visit every multi-index inside `size`, axis 0 fastest.
pub fn for_each_multi_index<const N: usize>(size: [usize; N], mut f: impl FnMut([usize; N])) {
    if element_count(&size) == 0 {
        return;
    }
    let mut idx = [0; N];
    loop {
        f(idx);
        if !increment(&size, &mut idx) {
            break;
        }
    }
}

impl<T, const N: usize> Array<T, N> {
    /// Wrap existing data. `data.len()` must equal the product of `size`.
    pub fn from_vec(size: [usize; N], data: Vec<T>) -> SimResult<Self> {
        let expected = element_count(&size);
        if data.len() != expected {
            return Err(SimError::invariant(
                "Array::from_vec",
                format!(
                    "size {:?} needs {} elements, got {}",
                    size,
                    expected,
                    data.len()
                ),
            ));
        }
        Ok(Self { size, data })
    }

    /// Extent along each axis.
    #[inline]
    pub fn size(&self) -> [usize; N] {
        self.size
    }

    /// Total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop all elements and set every extent to zero.
    pub fn clear(&mut self) {
        self.size = [0; N];
        self.data.clear();
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.data.iter_mut()
    }

    /// Linear offset of a multi-index, or `None` when any component is out of range.
    #[inline]
    pub fn linear_index(&self, idx: [usize; N]) -> Option<usize> {
        in_bounds(&self.size, &idx).then(|| linear_offset(&self.size, &idx))
    }

    /// Multi-index of a linear offset.
    #[inline]
    pub fn multi_index(&self, linear: usize) -> [usize; N] {
        unravel(&self.size, linear)
    }

    pub fn at(&self, idx: [usize; N]) -> SimResult<&T> {
        match self.linear_index(idx) {
            Some(i) => Ok(&self.data[i]),
            None => Err(SimError::out_of_range(idx, self.size)),
        }
    }

    pub fn at_mut(&mut self, idx: [usize; N]) -> SimResult<&mut T> {
        match self.linear_index(idx) {
            Some(i) => Ok(&mut self.data[i]),
            None => Err(SimError::out_of_range(idx, self.size)),
        }
    }

    pub fn at_linear(&self, i: usize) -> SimResult<&T> {
        let size = self.len();
        self.data
            .get(i)
            .ok_or_else(|| SimError::out_of_range(i, size))
    }

    pub fn at_linear_mut(&mut self, i: usize) -> SimResult<&mut T> {
        let size = self.len();
        self.data
            .get_mut(i)
            .ok_or_else(|| SimError::out_of_range(i, size))
    }

    /// Exchange contents with `other` without copying elements.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.size, &mut other.size);
        std::mem::swap(&mut self.data, &mut other.data);
    }

    /// Visit every element in storage order.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        self.data.iter().for_each(|v| f(v));
    }

    /// Visit every multi-index in storage order (axis 0 fastest).
    pub fn for_each_index(&self, f: impl FnMut([usize; N])) {
        for_each_multi_index(self.size, f);
    }

    /// Visit every element mutably together with its multi-index.
    pub fn for_each_index_mut(&mut self, mut f: impl FnMut([usize; N], &mut T)) {
        if self.data.is_empty() {
            return;
        }
        let size = self.size;
        let mut idx = [0; N];
        for value in self.data.iter_mut() {
            f(idx, value);
            increment(&size, &mut idx);
        }
    }
}

impl<T: Clone, const N: usize> Array<T, N> {
    /// Create an array of the given extents filled with `init`.
    pub fn new(size: [usize; N], init: T) -> Self {
        Self {
            size,
            data: vec![init; element_count(&size)],
        }
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Copy size and contents from `other`.
    pub fn set_from(&mut self, other: &Self) {
        self.size = other.size;
        self.data.clone_from(&other.data);
    }

    /// Change the extents. Elements in the overlap of the old and new extents
    /// keep their multi-index; everything else becomes `init`.
    pub fn resize(&mut self, size: [usize; N], init: T) {
        if size == self.size {
            return;
        }
        let mut resized = Array::new(size, init);
        let overlap: [usize; N] = std::array::from_fn(|axis| self.size[axis].min(size[axis]));
        let old_size = self.size;
        for_each_multi_index(overlap, |idx| {
            resized.data[linear_offset(&size, &idx)] =
                self.data[linear_offset(&old_size, &idx)].clone();
        });
        self.swap(&mut resized);
    }
}

impl<T: Send + Sync, const N: usize> Array<T, N> {
    /// Parallel version of [`Array::for_each`] with mutable access. Order is unspecified.
    pub fn par_for_each(&mut self, f: impl Fn(&mut T) + Sync + Send) {
        self.data.par_iter_mut().for_each(f);
    }

    /// Parallel version of [`Array::for_each_index`]. Order is unspecified.
    pub fn par_for_each_index(&self, f: impl Fn([usize; N]) + Sync + Send) {
        let size = self.size;
        (0..self.len())
            .into_par_iter()
            .for_each(|linear| f(unravel(&size, linear)));
    }

    /// Parallel version of [`Array::for_each_index_mut`]; each call owns its element.
    pub fn par_for_each_index_mut(&mut self, f: impl Fn([usize; N], &mut T) + Sync + Send) {
        let size = self.size;
        self.data
            .par_iter_mut()
            .enumerate()
            .for_each(|(linear, value)| f(unravel(&size, linear), value));
    }
}

impl<T> Array<T, 2> {
    #[inline]
    pub fn width(&self) -> usize {
        self.size[0]
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.size[1]
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<&T> {
        self.linear_index([i, j]).map(|idx| &self.data[idx])
    }

    #[inline]
    pub fn get_mut(&mut self, i: usize, j: usize) -> Option<&mut T> {
        self.linear_index([i, j]).map(move |idx| &mut self.data[idx])
    }

    /// Build from nested rows; `rows[j][i]` becomes element `(i, j)`.
    ///
    /// `[[1, 2, 4], [9, 3, 5]]` yields a 3 x 2 array.
    pub fn from_rows(rows: Vec<Vec<T>>) -> SimResult<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(width * height);
        for (j, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(SimError::invariant(
                    "Array2::from_rows",
                    format!("row {} has {} elements, expected {}", j, row.len(), width),
                ));
            }
            data.extend(row);
        }
        Ok(Self {
            size: [width, height],
            data,
        })
    }
}

impl<T, const N: usize> Default for Array<T, N> {
    fn default() -> Self {
        Self {
            size: [0; N],
            data: Vec::new(),
        }
    }
}

impl<T, const N: usize> Index<[usize; N]> for Array<T, N> {
    type Output = T;

    #[inline]
    fn index(&self, idx: [usize; N]) -> &T {
        debug_assert!(
            in_bounds(&self.size, &idx),
            "index {:?} out of range for size {:?}",
            idx,
            self.size
        );
        &self.data[linear_offset(&self.size, &idx)]
    }
}

impl<T, const N: usize> IndexMut<[usize; N]> for Array<T, N> {
    #[inline]
    fn index_mut(&mut self, idx: [usize; N]) -> &mut T {
        debug_assert!(
            in_bounds(&self.size, &idx),
            "index {:?} out of range for size {:?}",
            idx,
            self.size
        );
        let offset = linear_offset(&self.size, &idx);
        &mut self.data[offset]
    }
}

impl<T> Index<(usize, usize)> for Array<T, 2> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &T {
        &self[[i, j]]
    }
}

impl<T> IndexMut<(usize, usize)> for Array<T, 2> {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        &mut self[[i, j]]
    }
}

impl<T, const N: usize> Index<usize> for Array<T, N> {
    type Output = T;

    #[inline]
    fn index(&self, i: usize) -> &T {
        &self.data[i]
    }
}

impl<T, const N: usize> IndexMut<usize> for Array<T, N> {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.data[i]
    }
}
