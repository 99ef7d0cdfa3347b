use cytomech_numerical::SparseSymmetric;

use crate::{Bead, Fiber, Solid, Sphere};

/// One mechanical object registered for a solve, as a tagged variant.
///
/// The solver needs only a handful of operations per object; dispatching
/// over this enum keeps the per-class code in the class modules and avoids
/// holding heterogeneous collections of trait objects across the step.
pub enum MecableMut<'a> {
    Fiber(&'a mut Fiber),
    Solid(&'a mut Solid),
    Sphere(&'a mut Sphere),
    Bead(&'a mut Bead),
}

impl<'a> MecableMut<'a> {
    pub fn nb_points(&self) -> usize {
        match self {
            MecableMut::Fiber(f) => f.nb_points(),
            MecableMut::Solid(s) => s.nb_points(),
            MecableMut::Sphere(s) => s.nb_points(),
            MecableMut::Bead(b) => b.nb_points(),
        }
    }

    /// Copies the current coordinates into `dst`
    pub fn put_points(&self, dst: &mut [f64]) {
        match self {
            MecableMut::Fiber(f) => f.points().put_points(dst),
            MecableMut::Solid(s) => s.points().put_points(dst),
            MecableMut::Sphere(s) => s.points().put_points(dst),
            MecableMut::Bead(b) => b.points().put_points(dst),
        }
    }

    /// Adopts the coordinates computed by the solver, restoring each
    /// class's exact internal geometry (segment lengths, rigid shape,
    /// orthonormal frame).
    pub fn get_points(&mut self, src: &[f64]) {
        match self {
            MecableMut::Fiber(f) => {
                f.points_mut().get_points(src);
                f.reshape();
            }
            MecableMut::Solid(s) => {
                s.points_mut().get_points(src);
                s.reshape();
            }
            MecableMut::Sphere(s) => {
                s.points_mut().get_points(src);
                s.reshape();
            }
            MecableMut::Bead(b) => b.points_mut().get_points(src),
        }
    }

    /// `y := s · P · μ · x` for this object
    pub fn set_speeds_from_forces(&mut self, x: &[f64], y: &mut [f64], s: f64, store: bool) {
        match self {
            MecableMut::Fiber(f) => f.set_speeds_from_forces(x, y, s, store),
            MecableMut::Solid(so) => so.set_speeds_from_forces(x, y, s),
            MecableMut::Sphere(sp) => sp.set_speeds_from_forces(x, y, s),
            MecableMut::Bead(b) => b.set_speeds_from_forces(x, y, s),
        }
    }

    /// `y += R·x` — internal elasticity (fibers only)
    pub fn add_rigidity(&self, x: &[f64], y: &mut [f64]) {
        if let MecableMut::Fiber(f) = self {
            f.add_rigidity(x, y);
        }
    }

    /// Stamps the elasticity into a point-indexed symmetric matrix
    pub fn add_rigidity_mat_up(&self, mat: &mut SparseSymmetric, off: usize) {
        if let MecableMut::Fiber(f) = self {
            f.add_rigidity_mat_up(mat, off);
        }
    }

    /// Prepares the projection-correction term from the given force vector
    pub fn prepare_projection_diff(&mut self, forces: &[f64]) {
        if let MecableMut::Fiber(f) = self {
            f.compute_tensions(forces);
            f.make_projection_diff();
        }
    }

    /// `y += P'·x` — linearized constraint-force correction
    pub fn add_projection_diff(&self, x: &[f64], y: &mut [f64]) {
        if let MecableMut::Fiber(f) = self {
            f.add_projection_diff(x, y);
        }
    }

    /// Adds the Brownian force realization; returns the scale mapping the
    /// injected forces to displacements (the solver uses the smallest over
    /// all objects to normalize its residual target).
    pub fn add_brownian_forces<R: rand::Rng>(&self, rhs: &mut [f64], sc: f64, rng: &mut R) -> f64 {
        match self {
            MecableMut::Fiber(f) => f.add_brownian_forces(rhs, sc, rng),
            MecableMut::Solid(s) => s.add_brownian_forces(rhs, sc, rng),
            MecableMut::Sphere(s) => s.add_brownian_forces(rhs, sc, rng),
            MecableMut::Bead(b) => b.add_brownian_forces(rhs, sc, rng),
        }
    }

    /// Records the net forces of the completed step; fibers also refresh
    /// their segment tensions from them.
    pub fn store_forces(&mut self, forces: &[f64]) {
        match self {
            MecableMut::Fiber(f) => {
                let n = 3 * f.nb_points();
                f.forces_mut()[..n].copy_from_slice(&forces[..n]);
                f.compute_tensions(forces);
            }
            MecableMut::Solid(s) => {
                let n = 3 * s.nb_points();
                s.forces_mut()[..n].copy_from_slice(&forces[..n]);
            }
            MecableMut::Sphere(s) => {
                s.forces_mut()[..12].copy_from_slice(&forces[..12]);
            }
            MecableMut::Bead(b) => {
                b.forces_mut()[..3].copy_from_slice(&forces[..3]);
            }
        }
    }

    /// Whether the block-Jacobi preconditioner should factorize a dense
    /// block for this object. Single points are left to the identity.
    pub fn use_block(&self) -> bool {
        match self {
            MecableMut::Fiber(_) => true,
            MecableMut::Solid(s) => s.nb_points() > 1,
            MecableMut::Sphere(_) => true,
            MecableMut::Bead(_) => false,
        }
    }
}
