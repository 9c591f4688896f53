// field.rs
// Dense 3D node-centered grid container used for mesh quantities.

use std::ops::{Add, Index, IndexMut, Mul};

use ultraviolet::DVec3;

/// Owned 3D array of per-node values, addressed by node triple `(i, j, k)`.
///
/// The shape is fixed at construction and every access is validated against
/// it. A particle whose logical coordinate falls outside the node lattice
/// indicates the boundary policy failed upstream, so out-of-range access
/// panics instead of being papered over.
#[derive(Clone, Debug)]
pub struct Field<T> {
    ni: usize,
    nj: usize,
    nk: usize,
    data: Vec<T>,
}

impl<T: Copy> Field<T> {
    pub fn filled(ni: usize, nj: usize, nk: usize, value: T) -> Self {
        assert!(ni >= 2 && nj >= 2 && nk >= 2, "grid needs at least 2 nodes per axis");
        Self { ni, nj, nk, data: vec![value; ni * nj * nk] }
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.ni, self.nj, self.nk)
    }

    pub fn node_count(&self) -> usize {
        self.data.len()
    }

    /// Flat storage, i-major with k varying fastest.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Node triple for a flat storage index; inverse of the internal layout.
    pub fn node_of(&self, flat: usize) -> (usize, usize, usize) {
        debug_assert!(flat < self.data.len());
        let k = flat % self.nk;
        let j = (flat / self.nk) % self.nj;
        let i = flat / (self.nk * self.nj);
        (i, j, k)
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    #[inline]
    fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        assert!(
            i < self.ni && j < self.nj && k < self.nk,
            "node ({i},{j},{k}) outside {}x{}x{} grid",
            self.ni,
            self.nj,
            self.nk
        );
        (i * self.nj + j) * self.nk + k
    }
}

impl<T: Copy + Default> Field<T> {
    pub fn new(ni: usize, nj: usize, nk: usize) -> Self {
        Self::filled(ni, nj, nk, T::default())
    }
}

impl<T: Copy> Index<(usize, usize, usize)> for Field<T> {
    type Output = T;

    fn index(&self, (i, j, k): (usize, usize, usize)) -> &T {
        &self.data[self.idx(i, j, k)]
    }
}

impl<T: Copy> IndexMut<(usize, usize, usize)> for Field<T> {
    fn index_mut(&mut self, (i, j, k): (usize, usize, usize)) -> &mut T {
        let n = self.idx(i, j, k);
        &mut self.data[n]
    }
}

impl<T: Copy + Add<Output = T> + Mul<f64, Output = T>> Field<T> {
    /// `self += other * scale`, elementwise. Shapes must match.
    pub fn scaled_add(&mut self, other: &Field<T>, scale: f64) {
        assert_eq!(self.dims(), other.dims(), "field shape mismatch");
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a = *a + *b * scale;
        }
    }

    /// Trilinear (cloud-in-cell) interpolation at a fractional logical
    /// coordinate. Uses the same eight-node weights as [`Field::scatter`];
    /// keeping the two consistent is what makes force interpolation and
    /// charge deposition momentum-conserving.
    pub fn gather(&self, lc: DVec3) -> T {
        let (i, j, k, di, dj, dk) = self.cell_of(lc);
        self[(i, j, k)] * ((1.0 - di) * (1.0 - dj) * (1.0 - dk))
            + self[(i + 1, j, k)] * (di * (1.0 - dj) * (1.0 - dk))
            + self[(i, j + 1, k)] * ((1.0 - di) * dj * (1.0 - dk))
            + self[(i + 1, j + 1, k)] * (di * dj * (1.0 - dk))
            + self[(i, j, k + 1)] * ((1.0 - di) * (1.0 - dj) * dk)
            + self[(i + 1, j, k + 1)] * (di * (1.0 - dj) * dk)
            + self[(i, j + 1, k + 1)] * ((1.0 - di) * dj * dk)
            + self[(i + 1, j + 1, k + 1)] * (di * dj * dk)
    }
}

impl<T: Copy> Field<T> {
    /// Base node of the cell containing `lc` plus fractional offsets.
    /// A coordinate exactly on the top node folds into the last cell.
    fn cell_of(&self, lc: DVec3) -> (usize, usize, usize, f64, f64, f64) {
        let clamp = |l: f64, n: usize| -> (usize, f64) {
            assert!(
                l >= 0.0 && l <= (n - 1) as f64,
                "logical coordinate {l} outside node range 0..={}",
                n - 1
            );
            let mut i = l.floor() as usize;
            if i >= n - 1 {
                i = n - 2;
            }
            (i, l - i as f64)
        };
        let (i, di) = clamp(lc.x, self.ni);
        let (j, dj) = clamp(lc.y, self.nj);
        let (k, dk) = clamp(lc.z, self.nk);
        (i, j, k, di, dj, dk)
    }
}

impl Field<f64> {
    /// Deposit `value` onto the eight nodes enclosing `lc` with trilinear
    /// weights. The weights sum to one, so total deposited weight is exact.
    pub fn scatter(&mut self, lc: DVec3, value: f64) {
        let (i, j, k, di, dj, dk) = self.cell_of(lc);
        self[(i, j, k)] += value * (1.0 - di) * (1.0 - dj) * (1.0 - dk);
        self[(i + 1, j, k)] += value * di * (1.0 - dj) * (1.0 - dk);
        self[(i, j + 1, k)] += value * (1.0 - di) * dj * (1.0 - dk);
        self[(i + 1, j + 1, k)] += value * di * dj * (1.0 - dk);
        self[(i, j, k + 1)] += value * (1.0 - di) * (1.0 - dj) * dk;
        self[(i + 1, j, k + 1)] += value * di * (1.0 - dj) * dk;
        self[(i, j + 1, k + 1)] += value * (1.0 - di) * dj * dk;
        self[(i + 1, j + 1, k + 1)] += value * di * dj * dk;
    }

    /// Elementwise division, used to turn accumulated weights into densities.
    pub fn divide_by(&mut self, other: &Field<f64>) {
        assert_eq!(self.dims(), other.dims(), "field shape mismatch");
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a /= *b;
        }
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}
