//! Constrained-dynamics projection of the fiber.
//!
//! The `N-1` constraints `|p[i+1] - p[i]|² = h²` define a manifold; forces
//! are mapped to admissible velocities by the projector
//! `P = I - Jᵀ·(J·Jᵀ)⁻¹·J`, where `J` is the constraint Jacobian expressed
//! with unit tangents. `J·Jᵀ` is symmetric positive definite tridiagonal and
//! is factorized once per step; the intermediate `(J·Jᵀ)⁻¹·J·x` is the
//! vector of Lagrange multipliers, i.e. the segment tensions associated
//! with the force vector `x`.

use rand_distr::{Distribution, StandardNormal};

use crate::{Fiber, MechError};

impl Fiber {
    /// Recomputes the normalized differences between successive points:
    /// `diff[i] = (p[i+1] - p[i]) / h`
    pub fn store_differences(&mut self) {
        let n = self.nb_points();
        let sc = 1.0 / self.segmentation();
        self.diff.resize(3 * (n - 1), 0.0);
        let pos = self.points().as_slice().to_vec();
        for k in 0..3 * (n - 1) {
            self.diff[k] = sc * (pos[k + 3] - pos[k]);
        }
    }

    /// Builds and factorizes the tridiagonal `J·Jᵀ`.
    ///
    /// With unit tangents the diagonal is `2·tᵢ·tᵢ = 2` and the
    /// off-diagonal `-tᵢ·tᵢ₊₁`; the matrix stays positive definite as long
    /// as consecutive segments are not folded back onto each other.
    pub fn make_projection(&mut self) -> Result<(), MechError> {
        let nbs = self.nb_segments();
        let mut diag = vec![0.0; nbs];
        let mut off = vec![0.0; nbs.saturating_sub(1)];
        for j in 0..nbs {
            let t = &self.diff[3 * j..3 * j + 3];
            diag[j] = 2.0 * (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]);
        }
        for j in 0..nbs.saturating_sub(1) {
            let t = &self.diff[3 * j..3 * j + 3];
            let u = &self.diff[3 * j + 3..3 * j + 6];
            off[j] = -(t[0] * u[0] + t[1] * u[1] + t[2] * u[2]);
        }
        if !self.jjt.factorize(&diag, &off) {
            return Err(MechError::ProjectionFailure);
        }
        Ok(())
    }

    /// `tmp := J·x` — the component of `x` along each constrained segment
    fn project_forces_a(&self, x: &[f64], tmp: &mut [f64]) {
        let nbs = self.nb_segments();
        for j in 0..nbs {
            let k = 3 * j;
            tmp[j] = self.diff[k] * (x[k + 3] - x[k])
                + self.diff[k + 1] * (x[k + 4] - x[k + 1])
                + self.diff[k + 2] * (x[k + 5] - x[k + 2]);
        }
    }

    /// `y := s·(x - Jᵀ·tmp)`
    fn project_forces_b(&self, x: &[f64], y: &mut [f64], s: f64, tmp: &[f64]) {
        let nbs = self.nb_segments();
        let kk = 3 * nbs;
        for d in 0..3 {
            y[d] = s * (x[d] + self.diff[d] * tmp[0]);
            y[kk + d] = s * (x[kk + d] - self.diff[kk - 3 + d] * tmp[nbs - 1]);
        }
        for j in 1..nbs {
            let k = 3 * j;
            for d in 0..3 {
                y[k + d] = s * (x[k + d] + self.diff[k + d] * tmp[j] - self.diff[k - 3 + d] * tmp[j - 1]);
            }
        }
    }

    /// Computes `y := s·P·x` and writes the Lagrange multipliers of `x`
    /// into `lag` (one per segment).
    pub fn project_forces(&self, x: &[f64], y: &mut [f64], s: f64, lag: &mut [f64]) {
        debug_assert_eq!(lag.len(), self.nb_segments());
        self.project_forces_a(x, lag);
        self.jjt.solve(lag);
        self.project_forces_b(x, y, s, lag);
    }

    /// Maps forces to speeds: `y := s·μ·P·x`.
    ///
    /// When `store` is true, `x` is understood to hold the true forces of
    /// the system and the multipliers are kept as the fiber's segment
    /// tensions; otherwise a scratch buffer is used.
    pub fn set_speeds_from_forces(&mut self, x: &[f64], y: &mut [f64], s: f64, store: bool) {
        let sc = s * self.mobility;
        if store {
            let mut lag = std::mem::take(&mut self.lagrange);
            self.project_forces(x, y, sc, &mut lag);
            self.lagrange = lag;
        } else {
            let mut tmp = vec![0.0; self.nb_segments()];
            self.project_forces(x, y, sc, &mut tmp);
        }
    }

    /// Computes and stores the segment tensions for a given force vector
    pub fn compute_tensions(&mut self, forces: &[f64]) {
        let mut lag = std::mem::take(&mut self.lagrange);
        self.project_forces_a(forces, &mut lag);
        self.jjt.solve(&mut lag);
        self.lagrange = lag;
    }

    // ---------- projection correction (linearized constraint forces)

    /// Prepares the correction capturing the first-order dependence of the
    /// projection on the point positions: each segment under positive
    /// tension `λ` acts as a spring of stiffness `λ/h`; compressive
    /// multipliers are clamped to zero, which avoids feeding the buckling
    /// instability into the linearization.
    pub fn make_projection_diff(&mut self) {
        let h = self.segmentation();
        self.proj_diff.resize(self.nb_segments(), 0.0);
        for j in 0..self.nb_segments() {
            self.proj_diff[j] = self.lagrange[j].max(0.0) / h;
        }
    }

    /// Adds the projection-correction force response: `y += P'·x`
    pub fn add_projection_diff(&self, x: &[f64], y: &mut [f64]) {
        for j in 0..self.nb_segments() {
            let g = self.proj_diff[j];
            if g > 0.0 {
                let k = 3 * j;
                for d in 0..3 {
                    let f = g * (x[k + 3 + d] - x[k + d]);
                    y[k + d] += f;
                    y[k + 3 + d] -= f;
                }
            }
        }
    }

    // ---------- bending elasticity

    /// Adds the bending force response `y += R·x`: the second difference of
    /// `x` with stencil `(-1, 2, -1)`, scaled by `κ/h³`, with natural
    /// (no moment) boundaries.
    pub fn add_rigidity(&self, x: &[f64], y: &mut [f64]) {
        let n = self.nb_points();
        if n <= 2 {
            return;
        }
        let rigid = self.rigidity_scaled;
        for k in 0..3 * (n - 2) {
            let f = rigid * (x[k] - 2.0 * x[k + 3] + x[k + 6]);
            y[k] -= f;
            y[k + 3] += 2.0 * f;
            y[k + 6] -= f;
        }
    }

    /// Stamps the bending response into a point-indexed symmetric matrix
    /// (upper triangle), at the diagonal block starting at `off`.
    /// The coefficients agree exactly with [`add_rigidity()`](Fiber::add_rigidity).
    pub fn add_rigidity_mat_up(&self, mat: &mut cytomech_numerical::SparseSymmetric, off: usize) {
        let sz = self.nb_points();
        if sz < 3 {
            return;
        }
        let r = self.rigidity_scaled;
        let s = off;
        let e = off + sz;

        for i in s + 2..e - 2 {
            mat.add(i, i, -6.0 * r);
        }
        for i in s + 1..e - 2 {
            mat.add(i, i + 1, 4.0 * r);
        }
        for i in s..e - 2 {
            mat.add(i, i + 2, -r);
        }
        mat.add(s, s, -r);
        mat.add(e - 1, e - 1, -r);
        if sz == 3 {
            mat.add(s + 1, s + 1, -4.0 * r);
        } else {
            mat.add(s + 1, s + 1, -5.0 * r);
            mat.add(e - 2, e - 2, -5.0 * r);
        }
        mat.add(s, s + 1, 2.0 * r);
        mat.add(e - 2, e - 1, 2.0 * r);
    }

    /// The discrete bending energy `½·κ/h³·Σ|p[i-1] - 2p[i] + p[i+1]|²`
    pub fn bending_energy(&self) -> f64 {
        let n = self.nb_points();
        if n <= 2 {
            return 0.0;
        }
        let mut e = 0.0;
        for p in 1..n - 1 {
            let d = self.pos_point(p - 1) - self.pos_point(p) * 2.0 + self.pos_point(p + 1);
            e += d.length_squared();
        }
        0.5 * self.rigidity_scaled * e
    }

    // ---------- stochastic forcing

    /// Adds uncorrelated Gaussian forces of standard deviation
    /// `√(2·sc/μ)` to every coordinate (`sc` should be `kT/dt`), and
    /// returns the scale mapping these forces to displacements.
    pub fn add_brownian_forces<R: rand::Rng>(&self, rhs: &mut [f64], sc: f64, rng: &mut R) -> f64 {
        let b = (2.0 * sc / self.mobility).sqrt();
        for v in rhs[..3 * self.nb_points()].iter_mut() {
            let g: f64 = StandardNormal.sample(rng);
            *v += b * g;
        }
        self.mobility * b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FiberEnd, FiberMechanics};
    use cytomech_numerical::{SparseSymmetric, Vec3};

    fn straight_fiber(n_seg: usize) -> Fiber {
        let len = n_seg as f64;
        let mut f = Fiber::new(1.0, len, &Vec3::zero(), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Minus).unwrap();
        f.prepare(&FiberMechanics::default()).unwrap();
        f
    }

    #[test]
    fn projection_is_idempotent() {
        let f = straight_fiber(5);
        let n = 3 * f.nb_points();
        let x: Vec<f64> = (0..n).map(|i| ((i * 7 + 3) % 11) as f64 - 5.0).collect();
        let mut y = vec![0.0; n];
        let mut lag = vec![0.0; f.nb_segments()];
        f.project_forces(&x, &mut y, 1.0, &mut lag);
        let mut y2 = vec![0.0; n];
        let mut lag2 = vec![0.0; f.nb_segments()];
        f.project_forces(&y, &mut y2, 1.0, &mut lag2);
        for i in 0..n {
            assert!((y[i] - y2[i]).abs() < 1e-10, "P²x must equal Px");
        }
        // projected motion does not stretch any segment
        for j in 0..f.nb_segments() {
            let k = 3 * j;
            let stretch: f64 = (0..3).map(|d| f.diff[k + d] * (y[k + 3 + d] - y[k + d])).sum();
            assert!(stretch.abs() < 1e-10);
        }
    }

    #[test]
    fn tensions_of_axial_pull() {
        // pulling the two ends of a straight fiber apart puts every
        // segment under the same positive tension
        let mut f = straight_fiber(4);
        let n = 3 * f.nb_points();
        let mut forces = vec![0.0; n];
        forces[0] = -1.0; // minus end pulled backwards
        forces[n - 3] = 1.0; // plus end pulled forwards
        f.compute_tensions(&forces);
        for j in 0..f.nb_segments() {
            assert!((f.tension(j) - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn two_point_fiber_projects_on_its_axis() {
        let f = straight_fiber(1);
        assert_eq!(f.nb_points(), 2);
        assert_eq!(f.tensions().len(), 1);
        let x = [1.0, 2.0, 0.0, 0.0, -1.0, 3.0];
        let mut y = [0.0; 6];
        let mut lag = [0.0];
        f.project_forces(&x, &mut y, 1.0, &mut lag);
        // the segment along x must not change length
        assert!((y[3] - y[0]).abs() < 1e-12);
        // transverse components pass through
        assert!((y[1] - 2.0).abs() < 1e-12 && (y[4] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn rigidity_matrix_matches_operator() {
        for n_seg in [2usize, 3, 5] {
            let mut f = straight_fiber(n_seg);
            f.rigidity_scaled = 1.7;
            let n = f.nb_points();
            let mut mat = SparseSymmetric::new();
            mat.reset(n);
            f.add_rigidity_mat_up(&mut mat, 0);
            // compare R·x against the stamped matrix applied per dimension
            let x: Vec<f64> = (0..3 * n).map(|i| ((i * 5 + 1) % 7) as f64 - 3.0).collect();
            let mut y_op = vec![0.0; 3 * n];
            f.add_rigidity(&x, &mut y_op);
            let mut y_mat = vec![0.0; 3 * n];
            mat.vec_mul_add_iso3(&x, &mut y_mat);
            for i in 0..3 * n {
                assert!((y_op[i] - y_mat[i]).abs() < 1e-10, "n_seg={} i={}", n_seg, i);
            }
        }
    }

    #[test]
    fn rigidity_straightens_a_bent_chain() {
        let mut f = straight_fiber(2);
        f.rigidity_scaled = 1.0;
        // bend the middle point upward
        let mut pos = f.points().as_slice().to_vec();
        pos[4] += 0.1;
        f.points_mut().get_points(&pos);
        let mut y = vec![0.0; 9];
        f.add_rigidity(&pos, &mut y);
        // the restoring force pushes the middle point back down
        assert!(y[4] < 0.0);
        assert!(y[1] > 0.0 && y[7] > 0.0);
    }

    #[test]
    fn projection_diff_clamps_compression() {
        let mut f = straight_fiber(3);
        f.lagrange = vec![2.0, -1.0, 0.5];
        f.make_projection_diff();
        assert!((f.proj_diff[0] - 2.0).abs() < 1e-12);
        assert_eq!(f.proj_diff[1], 0.0);
        assert!((f.proj_diff[2] - 0.5).abs() < 1e-12);
    }
}
