//! The global implicit solver.
//!
//! Every time step, the simulation registers its mechanical objects,
//! stamps the pairwise interactions, and calls [`Meca::solve`], which
//! integrates
//!
//! ```text
//! (I - dt·P·μ·K) · x = x₀ + dt·P·μ·(F(x₀) + ξ)
//! ```
//!
//! where `K` gathers the linear force terms (bending rigidity, the
//! interaction matrices and the projection correction), `P·μ` is the
//! per-object projected mobility and `ξ` the Brownian forcing. The operator
//! is applied matrix free and the system is solved by BiCGStab with a
//! block-Jacobi preconditioner whose blocks are LU-factorized per object.

use nalgebra::{DMatrix, DVector, Dynamic};

use cytomech_numerical::{bicgstab, Monitor, SolverOutcome, SparseSymmetric, Vec3};

use crate::{MecableMut, MechError};

/// A model point of a registered object, by registration index
#[derive(Clone, Copy, Debug)]
pub struct PointExact {
    pub mec: usize,
    pub point: usize,
}

/// A position interpolated between points `point` and `point + 1` of a
/// registered object; `coef = 0` designates `point` itself.
#[derive(Clone, Copy, Debug)]
pub struct PointInterpolated {
    pub mec: usize,
    pub point: usize,
    pub coef: f64,
}

impl From<PointExact> for PointInterpolated {
    fn from(p: PointExact) -> PointInterpolated {
        PointInterpolated { mec: p.mec, point: p.point, coef: 0.0 }
    }
}

/// Parameters of one implicit integration step.
#[derive(Clone, Debug)]
pub struct SolveOptions {
    pub time_step: f64,
    /// thermal energy `kT`; zero disables the Brownian forcing
    pub kt: f64,
    /// relative residual target; scaled by the Brownian displacement when
    /// noise is active, used as an absolute target otherwise
    pub tolerance: f64,
    pub max_iterations: usize,
    pub precondition: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            time_step: 0.001,
            kt: 0.0,
            tolerance: 1e-6,
            max_iterations: 2000,
            precondition: true,
        }
    }
}

/// Outcome of a successful solve.
#[derive(Clone, Debug, Default)]
pub struct SolveInfo {
    pub iterations: usize,
    pub residual: f64,
}

/// Gathers all mechanical objects and advances them by one time step.
#[derive(Default)]
pub struct Meca {
    sizes: Vec<usize>,
    offsets: Vec<usize>,
    nb_points: usize,
    /// concatenated coordinates at the start of the step
    pts: Vec<f64>,
    /// constant part of the interaction forces
    base: Vec<f64>,
    /// isotropic interaction terms, point indexed
    mat_iso: SparseSymmetric,
    /// anisotropic interaction terms, coordinate indexed
    mat_dim: SparseSymmetric,
}

impl Meca {
    pub fn new() -> Meca {
        Meca::default()
    }

    /// Registers the objects for this step and snapshots their coordinates.
    /// Any previously stamped interaction is dropped.
    pub fn register(&mut self, objs: &[MecableMut]) {
        self.sizes.clear();
        self.offsets.clear();
        self.nb_points = 0;
        for o in objs {
            self.offsets.push(self.nb_points);
            let n = o.nb_points();
            self.sizes.push(n);
            self.nb_points += n;
        }
        self.pts.resize(3 * self.nb_points, 0.0);
        for (i, o) in objs.iter().enumerate() {
            o.put_points(&mut self.pts[3 * self.offsets[i]..]);
        }
        self.base.clear();
        self.base.resize(3 * self.nb_points, 0.0);
        self.mat_iso.reset(self.nb_points);
        self.mat_dim.reset(3 * self.nb_points);
    }

    pub fn nb_objects(&self) -> usize {
        self.sizes.len()
    }

    pub fn nb_points(&self) -> usize {
        self.nb_points
    }

    /// Index of the first point of a registered object
    pub fn point_offset(&self, mec: usize) -> usize {
        self.offsets[mec]
    }

    fn global_point(&self, p: &PointInterpolated) -> usize {
        self.offsets[p.mec] + p.point
    }

    /// Position of a model point, as registered
    pub fn pos_exact(&self, p: &PointExact) -> Vec3 {
        let g = self.offsets[p.mec] + p.point;
        Vec3::from_slice(&self.pts[3 * g..3 * g + 3])
    }

    /// Position of an interpolated point, as registered
    pub fn pos_inter(&self, p: &PointInterpolated) -> Vec3 {
        let g = self.global_point(p);
        let a = Vec3::from_slice(&self.pts[3 * g..3 * g + 3]);
        if p.coef == 0.0 {
            return a;
        }
        let b = Vec3::from_slice(&self.pts[3 * (g + 1)..3 * (g + 1) + 3]);
        a + (b - a) * p.coef
    }

    /// The (point, weight) decomposition of an interpolated position
    fn spread(&self, p: &PointInterpolated, sign: f64) -> [(usize, f64); 2] {
        let g = self.global_point(p);
        if p.coef == 0.0 {
            return [(g, sign), (g, 0.0)];
        }
        [(g, sign * (1.0 - p.coef)), (g + 1, sign * p.coef)]
    }

    /// Stamps the quadratic form `-k·(Σ wᵤ·xᵤ)²/2` into the isotropic
    /// matrix. Ordered pairs landing on the same stored element (both on
    /// the diagonal) accumulate twice, which is what the symmetric form
    /// requires when two weights address the same point.
    fn stamp_iso(&mut self, weights: &[(usize, f64)], k: f64) {
        for i in 0..weights.len() {
            for j in 0..weights.len() {
                let (gi, wi) = weights[i];
                let (gj, wj) = weights[j];
                if wi == 0.0 || wj == 0.0 || gi > gj {
                    continue;
                }
                self.mat_iso.add(gi, gj, -k * wi * wj);
            }
        }
    }

    /// Ties a (possibly interpolated) point to a fixed position with a
    /// Hooke spring of zero resting length.
    pub fn add_clamp(&mut self, p: &PointInterpolated, target: &Vec3, k: f64) {
        debug_assert!(k >= 0.0);
        let w = self.spread(p, 1.0);
        self.stamp_iso(&w, k);
        for (g, wg) in w {
            if wg != 0.0 {
                self.base[3 * g] += k * wg * target.x;
                self.base[3 * g + 1] += k * wg * target.y;
                self.base[3 * g + 2] += k * wg * target.z;
            }
        }
    }

    /// Adds a constant force on a (possibly interpolated) point
    pub fn add_force(&mut self, p: &PointInterpolated, force: &Vec3) {
        for (g, wg) in self.spread(p, 1.0) {
            if wg != 0.0 {
                self.base[3 * g] += wg * force.x;
                self.base[3 * g + 1] += wg * force.y;
                self.base[3 * g + 2] += wg * force.z;
            }
        }
    }

    /// Hooke link of zero resting length between two points
    pub fn add_link(&mut self, a: &PointInterpolated, b: &PointInterpolated, k: f64) {
        debug_assert!(k >= 0.0);
        let wa = self.spread(a, -1.0);
        let wb = self.spread(b, 1.0);
        let w = [wa[0], wa[1], wb[0], wb[1]];
        self.stamp_iso(&w, k);
    }

    /// Hooke link with a finite resting length, linearized around the
    /// current axis: the stiffness acts along the line joining the two
    /// points, and the constant part of the force goes into the base
    /// vector. Degenerate geometry (coincident points) is skipped.
    pub fn add_long_link(&mut self, a: &PointInterpolated, b: &PointInterpolated, rest: f64, k: f64) {
        debug_assert!(k >= 0.0 && rest >= 0.0);
        let axis = self.pos_inter(b) - self.pos_inter(a);
        let d = axis.length();
        if d < 1e-9 {
            return;
        }
        let axis = axis / d;
        let u = [axis.x, axis.y, axis.z];

        let wa = self.spread(a, -1.0);
        let wb = self.spread(b, 1.0);
        let w = [wa[0], wa[1], wb[0], wb[1]];

        // rank-one stiffness along the axis, at coordinate level
        for i in 0..4 {
            for j in 0..4 {
                let (gi, wi) = w[i];
                let (gj, wj) = w[j];
                if wi == 0.0 || wj == 0.0 {
                    continue;
                }
                for da in 0..3 {
                    for db in 0..3 {
                        let ci = 3 * gi + da;
                        let cj = 3 * gj + db;
                        if ci > cj {
                            continue;
                        }
                        self.mat_dim.add(ci, cj, -k * wi * wj * u[da] * u[db]);
                    }
                }
            }
        }
        // base force such that F(x₀) = k·(d - rest)·axis on `a`
        for (g, wg) in w {
            if wg != 0.0 {
                for da in 0..3 {
                    self.base[3 * g + da] += k * wg * rest * u[da];
                }
            }
        }
    }

    /// Total force for the coordinate vector `x`:
    /// `f = base + mB⊗I₃·x + mC·x + Σ R·x`
    fn apply_forces(&self, objs: &[MecableMut], x: &[f64], f: &mut [f64], with_base: bool) {
        if with_base {
            f.copy_from_slice(&self.base);
        } else {
            f.fill(0.0);
        }
        self.mat_iso.vec_mul_add_iso3(x, f);
        self.mat_dim.vec_mul_add(x, f);
        for (i, o) in objs.iter().enumerate() {
            let r = 3 * self.offsets[i]..3 * (self.offsets[i] + self.sizes[i]);
            o.add_rigidity(&x[r.clone()], &mut f[r]);
        }
    }

    /// Builds the per-object LU blocks of `I - dt·P·μ·K`
    fn build_blocks(
        &self,
        objs: &mut [MecableMut],
        dt: f64,
    ) -> Vec<Option<nalgebra::linalg::LU<f64, Dynamic, Dynamic>>> {
        let mut blocks = Vec::with_capacity(objs.len());
        for (i, o) in objs.iter_mut().enumerate() {
            if !o.use_block() {
                blocks.push(None);
                continue;
            }
            let np = self.sizes[i];
            let m = 3 * np;
            let off = self.offsets[i];

            let mut iso_entries = Vec::new();
            self.mat_iso.for_each_in_block(off, np, |r, c, v| iso_entries.push((r, c, v)));
            let mut dim_entries = Vec::new();
            self.mat_dim.for_each_in_block(3 * off, m, |r, c, v| dim_entries.push((r, c, v)));

            let mut dense = DMatrix::<f64>::zeros(m, m);
            let mut e = vec![0.0; m];
            let mut f = vec![0.0; m];
            let mut speed = vec![0.0; m];
            for col in 0..m {
                e.fill(0.0);
                e[col] = 1.0;
                f.fill(0.0);
                for &(r, c, v) in iso_entries.iter() {
                    for d in 0..3 {
                        f[3 * r + d] += v * e[3 * c + d];
                        if r != c {
                            f[3 * c + d] += v * e[3 * r + d];
                        }
                    }
                }
                for &(r, c, v) in dim_entries.iter() {
                    f[r] += v * e[c];
                    if r != c {
                        f[c] += v * e[r];
                    }
                }
                o.add_rigidity(&e, &mut f);
                o.add_projection_diff(&e, &mut f);
                o.set_speeds_from_forces(&f, &mut speed, 1.0, false);
                for row in 0..m {
                    dense[(row, col)] = (if row == col { 1.0 } else { 0.0 }) - dt * speed[row];
                }
            }
            blocks.push(Some(nalgebra::linalg::LU::new(dense)));
        }
        blocks
    }

    /// Advances all registered objects by `opts.time_step`.
    ///
    /// On success, positions are written back into the objects (which also
    /// restores each class's exact geometry), net forces and fiber tensions
    /// are refreshed, and the iteration statistics are returned. With no
    /// registered object this is a successful no-op.
    pub fn solve<R: rand::Rng>(
        &mut self,
        objs: &mut [MecableMut],
        opts: &SolveOptions,
        rng: &mut R,
    ) -> Result<SolveInfo, MechError> {
        assert_eq!(objs.len(), self.sizes.len(), "register() must precede solve()");
        let n3 = 3 * self.nb_points;
        if n3 == 0 {
            return Ok(SolveInfo::default());
        }
        let dt = opts.time_step;

        // ---------- forces at the starting point, and the linearization data
        let mut forces = vec![0.0; n3];
        let pts0 = self.pts.clone();
        self.apply_forces(objs, &pts0, &mut forces, true);
        for (i, o) in objs.iter_mut().enumerate() {
            let r = 3 * self.offsets[i]..3 * (self.offsets[i] + self.sizes[i]);
            o.prepare_projection_diff(&forces[r]);
        }

        // ---------- Brownian forcing, once per step
        let mut brownian_scale = f64::INFINITY;
        if opts.kt > 0.0 {
            let sc = opts.kt / dt;
            for (i, o) in objs.iter().enumerate() {
                let r = 3 * self.offsets[i]..3 * (self.offsets[i] + self.sizes[i]);
                let s = o.add_brownian_forces(&mut forces[r], sc, rng);
                if s < brownian_scale {
                    brownian_scale = s;
                }
            }
        }

        // ---------- right-hand side: x₀ + dt·P·μ·(F + ξ)
        let mut rhs = vec![0.0; n3];
        {
            let mut speed = vec![0.0; n3];
            for (i, o) in objs.iter_mut().enumerate() {
                let r = 3 * self.offsets[i]..3 * (self.offsets[i] + self.sizes[i]);
                o.set_speeds_from_forces(&forces[r.clone()], &mut speed[r], 1.0, true);
            }
            for i in 0..n3 {
                rhs[i] = self.pts[i] + dt * speed[i];
            }
        }

        // ---------- preconditioner
        let blocks = if opts.precondition {
            self.build_blocks(objs, dt)
        } else {
            Vec::new()
        };

        // ---------- matrix-free BiCGStab on (I - dt·P·μ·K)·x = rhs
        let tol = if opts.kt > 0.0 {
            opts.tolerance * dt * brownian_scale
        } else {
            opts.tolerance
        };
        let mut monitor = Monitor::new(tol, opts.max_iterations);
        let mut sol = self.pts.clone();

        let offsets = &self.offsets;
        let sizes = &self.sizes;
        let mat_iso = &self.mat_iso;
        let mat_dim = &self.mat_dim;
        let outcome = {
            let mut f_buf = vec![0.0; n3];
            let mut s_buf = vec![0.0; n3];
            let mat_vec = |x: &[f64], y: &mut [f64]| {
                f_buf.fill(0.0);
                mat_iso.vec_mul_add_iso3(x, &mut f_buf);
                mat_dim.vec_mul_add(x, &mut f_buf);
                for (i, o) in objs.iter_mut().enumerate() {
                    let r = 3 * offsets[i]..3 * (offsets[i] + sizes[i]);
                    o.add_rigidity(&x[r.clone()], &mut f_buf[r.clone()]);
                    o.add_projection_diff(&x[r.clone()], &mut f_buf[r]);
                }
                for (i, o) in objs.iter_mut().enumerate() {
                    let r = 3 * offsets[i]..3 * (offsets[i] + sizes[i]);
                    o.set_speeds_from_forces(&f_buf[r.clone()], &mut s_buf[r], 1.0, false);
                }
                for i in 0..n3 {
                    y[i] = x[i] - dt * s_buf[i];
                }
            };
            let precond = |v: &mut [f64]| {
                for (i, block) in blocks.iter().enumerate() {
                    if let Some(lu) = block {
                        let r = 3 * offsets[i]..3 * (offsets[i] + sizes[i]);
                        let local = DVector::from_column_slice(&v[r.clone()]);
                        if let Some(x) = lu.solve(&local) {
                            v[r].copy_from_slice(x.as_slice());
                        }
                    }
                }
            };
            bicgstab(&rhs, &mut sol, mat_vec, precond, &mut monitor)
        };

        match outcome {
            SolverOutcome::Converged => {}
            SolverOutcome::ExceededIterations | SolverOutcome::Breakdown => {
                return Err(MechError::SolverNonConvergence {
                    iterations: monitor.iterations,
                    residual: monitor.residual,
                });
            }
            SolverOutcome::NotFinite => {
                return Err(MechError::InvalidState("solver residual".to_string()));
            }
        }
        if !sol.iter().all(|x| x.is_finite()) {
            return Err(MechError::InvalidState("updated positions".to_string()));
        }

        // ---------- net forces of the completed step, and position write-back
        let mut f_final = vec![0.0; n3];
        self.apply_forces(objs, &sol, &mut f_final, true);
        for (i, o) in objs.iter_mut().enumerate() {
            let r = 3 * self.offsets[i]..3 * (self.offsets[i] + self.sizes[i]);
            o.store_forces(&f_final[r.clone()]);
            o.get_points(&sol[r]);
        }
        self.pts.copy_from_slice(&sol);

        log::debug!(
            "meca: {} points, {} iterations, residual {:.3e}",
            self.nb_points,
            monitor.iterations,
            monitor.residual
        );
        Ok(SolveInfo { iterations: monitor.iterations, residual: monitor.residual })
    }
}
