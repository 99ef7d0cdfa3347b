/// Sparse symmetric matrices used to accumulate the quadratic part of the
/// pairwise interactions.
///
/// Only the upper triangle (`col >= row`) is stored; the multiplication
/// routines apply the symmetric matrix. Entries are kept in short per-row
/// lists, which is efficient here because interactions couple each point to
/// a handful of others at most.
#[derive(Clone, Default)]
pub struct SparseSymmetric {
    size: usize,
    rows: Vec<Vec<(u32, f64)>>,
}

impl SparseSymmetric {
    pub fn new() -> SparseSymmetric {
        SparseSymmetric { size: 0, rows: Vec::new() }
    }

    /// Drops all values and resizes the matrix to `size` rows/columns
    pub fn reset(&mut self, size: usize) {
        self.size = size;
        if self.rows.len() < size {
            self.rows.resize(size, Vec::new());
        }
        for r in self.rows.iter_mut() {
            r.clear();
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Accumulates `val` into element `(i, j)`.
    ///
    /// The element is stored at `(min, max)`: callers may address either
    /// triangle, consistently with writing a symmetric matrix.
    pub fn add(&mut self, i: usize, j: usize, val: f64) {
        assert!(i < self.size && j < self.size);
        let (r, c) = if i <= j { (i, j as u32) } else { (j, i as u32) };
        for e in self.rows[r].iter_mut() {
            if e.0 == c {
                e.1 += val;
                return;
            }
        }
        self.rows[r].push((c, val));
    }

    /// true if no element was accumulated since the last `reset()`
    pub fn is_empty(&self) -> bool {
        self.rows[..self.size].iter().all(|r| r.is_empty())
    }

    pub fn nb_elements(&self) -> usize {
        self.rows[..self.size].iter().map(|r| r.len()).sum()
    }

    /// `y += M·x` where indices address scalars
    pub fn vec_mul_add(&self, x: &[f64], y: &mut [f64]) {
        assert!(x.len() >= self.size && y.len() >= self.size);
        for i in 0..self.size {
            for &(j, v) in self.rows[i].iter() {
                let j = j as usize;
                y[i] += v * x[j];
                if j != i {
                    y[j] += v * x[i];
                }
            }
        }
    }

    /// `y += M·x` where each index addresses an isotropic 3-vector block:
    /// the scalar element `(i, j)` couples `x[3j..3j+3]` into `y[3i..3i+3]`
    pub fn vec_mul_add_iso3(&self, x: &[f64], y: &mut [f64]) {
        assert!(x.len() >= 3 * self.size && y.len() >= 3 * self.size);
        for i in 0..self.size {
            for &(j, v) in self.rows[i].iter() {
                let j = j as usize;
                for d in 0..3 {
                    y[3 * i + d] += v * x[3 * j + d];
                }
                if j != i {
                    for d in 0..3 {
                        y[3 * j + d] += v * x[3 * i + d];
                    }
                }
            }
        }
    }

    /// Enumerates the stored (upper triangle) elements with `i, j` restricted
    /// to `[start, start+n)`, reporting indices relative to `start`.
    pub fn for_each_in_block<F: FnMut(usize, usize, f64)>(&self, start: usize, n: usize, mut f: F) {
        let end = start + n;
        for i in start..end.min(self.size) {
            for &(j, v) in self.rows[i].iter() {
                let j = j as usize;
                if j >= start && j < end {
                    f(i - start, j - start, v);
                }
            }
        }
    }

    /// Enumerates all stored (upper triangle) elements
    pub fn for_each<F: FnMut(usize, usize, f64)>(&self, mut f: F) {
        for i in 0..self.size {
            for &(j, v) in self.rows[i].iter() {
                f(i, j as usize, v);
            }
        }
    }
}
