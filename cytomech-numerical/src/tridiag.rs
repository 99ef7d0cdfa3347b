/// Symmetric positive definite tridiagonal systems, factorized once and
/// solved repeatedly.
///
/// The factorization is the `L·D·Lᵀ` decomposition used by LAPACK's
/// `pttrf`/`ptts2` pair: `diag` holds `D` and `off` holds the unit
/// sub-diagonal of `L` after a successful call to [`factorize()`](SymTridiag::factorize).
#[derive(Clone, Default)]
pub struct SymTridiag {
    diag: Vec<f64>,
    off: Vec<f64>,
    factorized: bool,
}

impl SymTridiag {
    pub fn new() -> SymTridiag {
        SymTridiag { diag: Vec::new(), off: Vec::new(), factorized: false }
    }

    /// Dimension of the factorized system
    pub fn size(&self) -> usize {
        self.diag.len()
    }

    /// Loads the matrix (main diagonal of length `n`, sub-diagonal of length `n-1`)
    /// and computes its `L·D·Lᵀ` factorization in place.
    ///
    /// Returns `false` if the matrix is not positive definite, in which case
    /// the factors are unusable.
    pub fn factorize(&mut self, diag: &[f64], off: &[f64]) -> bool {
        assert!(!diag.is_empty());
        assert_eq!(off.len() + 1, diag.len());

        self.diag.clear();
        self.diag.extend_from_slice(diag);
        self.off.clear();
        self.off.extend_from_slice(off);
        self.factorized = false;

        let n = self.diag.len();
        for i in 0..n - 1 {
            if self.diag[i] <= 0.0 {
                return false;
            }
            let ei = self.off[i] / self.diag[i];
            self.diag[i + 1] -= ei * self.off[i];
            self.off[i] = ei;
        }
        if self.diag[n - 1] <= 0.0 {
            return false;
        }
        self.factorized = true;
        return true;
    }

    /// Solves `A·x = b` in place, overwriting `b` with the solution.
    pub fn solve(&self, b: &mut [f64]) {
        assert!(self.factorized);
        let n = self.diag.len();
        assert_eq!(b.len(), n);

        // forward substitution with the unit lower factor
        for i in 1..n {
            b[i] -= self.off[i - 1] * b[i - 1];
        }
        // diagonal scaling and back substitution
        b[n - 1] /= self.diag[n - 1];
        for i in (0..n - 1).rev() {
            b[i] = b[i] / self.diag[i] - self.off[i] * b[i + 1];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mul(diag: &[f64], off: &[f64], x: &[f64]) -> Vec<f64> {
        let n = diag.len();
        let mut y = vec![0.0; n];
        for i in 0..n {
            y[i] = diag[i] * x[i];
            if i > 0 {
                y[i] += off[i - 1] * x[i - 1];
            }
            if i + 1 < n {
                y[i] += off[i] * x[i + 1];
            }
        }
        y
    }

    #[test]
    fn factorize_and_solve() {
        // the fiber projection matrix for straight tangents: 2 on the
        // diagonal, -1 off diagonal
        let diag = [2.0; 6];
        let off = [-1.0; 5];
        let x = [1.0, -0.5, 2.0, 0.25, -3.0, 1.5];
        let b = mul(&diag, &off, &x);

        let mut f = SymTridiag::new();
        assert!(f.factorize(&diag, &off));
        let mut sol = b.clone();
        f.solve(&mut sol);
        for i in 0..6 {
            assert!((sol[i] - x[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_indefinite() {
        let mut f = SymTridiag::new();
        assert!(!f.factorize(&[1.0, -2.0], &[0.5]));
    }

    #[test]
    fn scalar_system() {
        let mut f = SymTridiag::new();
        assert!(f.factorize(&[4.0], &[]));
        let mut b = [8.0];
        f.solve(&mut b);
        assert!((b[0] - 2.0).abs() < 1e-14);
    }
}
