use rand_distr::{Distribution, StandardNormal};

use cytomech_numerical::{Rototranslation, Vec3};

use crate::{MechError, PointArray};

/// An undeformable cloud of points.
///
/// Each point may carry a Stokes radius; the radii define the viscous drag
/// and weigh the centroid around which the object rotates. The solver moves
/// the points freely, and [`reshape()`](Solid::reshape) then restores the reference shape
/// recorded by [`fix_shape()`](Solid::fix_shape) with the best-fitting isometry, which
/// removes the numerical drift of the pairwise distances.
pub struct Solid {
    points: PointArray,
    forces: Vec<f64>,
    radius: Vec<f64>,
    /// reference shape recorded by fix_shape()
    shape: Vec<Vec3>,

    // ---------- per-step data
    center: Vec3,
    drag: f64,
    drag_rot: f64,
    mobility: f64,
}

impl Solid {
    pub fn new() -> Solid {
        Solid {
            points: PointArray::new(),
            forces: Vec::new(),
            radius: Vec::new(),
            shape: Vec::new(),
            center: Vec3::zero(),
            drag: 0.0,
            drag_rot: 0.0,
            mobility: 0.0,
        }
    }

    /// Adds a point carrying a sphere of the given radius (`radius = 0`
    /// marks a point without hydrodynamic drag). Returns the point index.
    pub fn add_sphere(&mut self, pos: &Vec3, radius: f64) -> usize {
        assert!(radius >= 0.0);
        let i = self.points.add_point(pos);
        self.radius.push(radius);
        self.forces.extend_from_slice(&[0.0; 3]);
        return i;
    }

    pub fn nb_points(&self) -> usize {
        self.points.nb_points()
    }

    pub fn points(&self) -> &PointArray {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut PointArray {
        &mut self.points
    }

    pub fn pos_point(&self, p: usize) -> Vec3 {
        self.points.pos_point(p)
    }

    pub fn radius(&self, p: usize) -> f64 {
        self.radius[p]
    }

    pub fn net_force(&self, p: usize) -> Vec3 {
        Vec3::from_slice(&self.forces[3 * p..3 * p + 3])
    }

    pub(crate) fn forces_mut(&mut self) -> &mut [f64] {
        &mut self.forces
    }

    /// Records the current configuration as the reference shape
    pub fn fix_shape(&mut self) {
        assert!(self.nb_points() > 0);
        self.shape = (0..self.nb_points()).map(|p| self.points.pos_point(p)).collect();
    }

    /// The drag-weighted centroid computed by the last `prepare()`
    pub fn centroid(&self) -> Vec3 {
        self.center
    }

    /// Total translational drag coefficient
    pub fn drag_coefficient(&self) -> f64 {
        self.drag
    }

    pub fn mobility(&self) -> f64 {
        self.mobility
    }

    /// Recomputes the drag-weighted centroid and the drag coefficients for
    /// the current configuration.
    ///
    /// Translation obeys the sum of Stokes drags; rotation adds, for every
    /// drag-carrying point, the drag of its sphere spinning in place and
    /// the drag of carrying it around the centroid.
    pub fn prepare(&mut self, viscosity: f64) -> Result<(), MechError> {
        let rsum: f64 = self.radius.iter().sum();
        if rsum <= 0.0 {
            return Err(MechError::InvalidParameter(
                "a solid needs at least one point with a positive radius".to_string(),
            ));
        }
        let mut c = Vec3::zero();
        for p in 0..self.nb_points() {
            c += self.points.pos_point(p) * self.radius[p];
        }
        self.center = c / rsum;

        let two_pi_visc = 2.0 * std::f64::consts::PI * viscosity;
        self.drag = 3.0 * two_pi_visc * rsum;
        let mut rot = 0.0;
        for p in 0..self.nb_points() {
            let r = self.radius[p];
            if r > 0.0 {
                rot += 4.0 * r * r * r;
                rot += 3.0 * r * self.points.pos_point(p).distance_squared(&self.center);
            }
        }
        self.drag_rot = two_pi_visc * rot;
        self.mobility = self.nb_points() as f64 / self.drag;
        Ok(())
    }

    /// Maps forces to the speeds of rigid motion: the net force translates
    /// the cloud, the net torque about the centroid rotates it.
    pub fn set_speeds_from_forces(&self, x: &[f64], y: &mut [f64], s: f64) {
        let n = self.nb_points();
        let mut force = Vec3::zero();
        let mut torque = Vec3::zero();
        for p in 0..n {
            let f = Vec3::from_slice(&x[3 * p..3 * p + 3]);
            force += f;
            torque += (self.points.pos_point(p) - self.center).cross(&f);
        }
        let v = force / self.drag;
        let w = if self.drag_rot > 0.0 { torque / self.drag_rot } else { Vec3::zero() };
        for p in 0..n {
            let arm = self.points.pos_point(p) - self.center;
            let speed = (v + w.cross(&arm)) * s;
            speed.store(&mut y[3 * p..3 * p + 3]);
        }
    }

    /// Adds Gaussian forces of standard deviation `√(2·sc/μ)` per
    /// coordinate; returns the force-to-displacement scale.
    pub fn add_brownian_forces<R: rand::Rng>(&self, rhs: &mut [f64], sc: f64, rng: &mut R) -> f64 {
        let b = (2.0 * sc / self.mobility).sqrt();
        for v in rhs[..3 * self.nb_points()].iter_mut() {
            let g: f64 = StandardNormal.sample(rng);
            *v += b * g;
        }
        self.mobility * b
    }

    /// Restores the reference shape in the current place and orientation:
    /// the best isometry mapping the reference onto the current points is
    /// applied to the reference.
    pub fn reshape(&mut self) {
        if self.shape.len() != self.nb_points() || self.shape.len() < 2 {
            return;
        }
        let current: Vec<Vec3> = (0..self.nb_points()).map(|p| self.points.pos_point(p)).collect();
        let weights = vec![1.0; self.shape.len()];
        let fit = Rototranslation::superpose(&self.shape, &current, &weights);
        for p in 0..self.nb_points() {
            let w = fit.apply(&self.shape[p]);
            self.points.set_point(p, &w);
        }
    }
}

impl Default for Solid {
    fn default() -> Self {
        Solid::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn tetrahedron() -> Solid {
        let mut s = Solid::new();
        s.add_sphere(&Vec3::new(0.0, 0.0, 0.0), 1.0);
        s.add_sphere(&Vec3::new(2.0, 0.0, 0.0), 1.0);
        s.add_sphere(&Vec3::new(0.0, 2.0, 0.0), 1.0);
        s.add_sphere(&Vec3::new(0.0, 0.0, 2.0), 1.0);
        s.fix_shape();
        s
    }

    #[test]
    fn drag_is_sum_of_stokes() {
        let mut s = tetrahedron();
        s.prepare(1.0).unwrap();
        let expected = 6.0 * std::f64::consts::PI * 4.0;
        assert!((s.drag_coefficient() - expected).abs() < 1e-9);
    }

    #[test]
    fn uniform_force_translates_without_rotation() {
        let mut s = tetrahedron();
        s.prepare(1.0).unwrap();
        let n = s.nb_points();
        let mut x = vec![0.0; 3 * n];
        for p in 0..n {
            x[3 * p] = 1.0; // unit force along x on every point
        }
        let mut y = vec![0.0; 3 * n];
        s.set_speeds_from_forces(&x, &mut y, 1.0);
        let v0 = Vec3::from_slice(&y[0..3]);
        for p in 1..n {
            let v = Vec3::from_slice(&y[3 * p..3 * p + 3]);
            assert!(v.distance(&v0) < 1e-12);
        }
        assert!((v0.x - 4.0 / s.drag_coefficient()).abs() < 1e-12);
    }

    #[test]
    fn rigid_speeds_preserve_distances() {
        let mut s = tetrahedron();
        s.prepare(1.0).unwrap();
        let n = s.nb_points();
        let x: Vec<f64> = (0..3 * n).map(|i| ((i * 3 + 2) % 5) as f64 - 2.0).collect();
        let mut y = vec![0.0; 3 * n];
        s.set_speeds_from_forces(&x, &mut y, 1.0);
        // for a rigid velocity field, d/dt |pi - pj|^2 = 0
        for p in 0..n {
            for q in p + 1..n {
                let dp = s.pos_point(p) - s.pos_point(q);
                let dv = Vec3::from_slice(&y[3 * p..3 * p + 3]) - Vec3::from_slice(&y[3 * q..3 * q + 3]);
                assert!(dp.dot(&dv).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn reshape_removes_drift() {
        let mut s = tetrahedron();
        let mut rng = SmallRng::seed_from_u64(5);
        s.points_mut().add_noise(&mut rng, 0.05);
        s.reshape();
        // pairwise distances of the reference shape are restored
        let d01 = s.pos_point(0).distance(&s.pos_point(1));
        assert!((d01 - 2.0).abs() < 1e-9);
        let d23 = s.pos_point(2).distance(&s.pos_point(3));
        assert!((d23 - 2.0 * 2.0_f64.sqrt()).abs() < 1e-9);
    }
}
