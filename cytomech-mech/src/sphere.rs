use rand_distr::{Distribution, StandardNormal};

use cytomech_numerical::Vec3;

use crate::PointArray;

/// A sphere with an orientation.
///
/// Stored as a center point plus three reference points at distance
/// `radius` along an orthonormal frame; the frame provides the orientation
/// and rotates rigidly with the sphere. Translational and rotational drags
/// follow Stokes' law for a sphere of that radius.
pub struct Sphere {
    points: PointArray,
    forces: Vec<f64>,
    radius: f64,

    // ---------- per-step data
    drag: f64,
    drag_rot: f64,
    mobility: f64,
}

impl Sphere {
    pub fn new(center: &Vec3, radius: f64) -> Sphere {
        assert!(radius > 0.0);
        let mut points = PointArray::new();
        points.add_point(center);
        points.add_point(&(*center + Vec3::new(radius, 0.0, 0.0)));
        points.add_point(&(*center + Vec3::new(0.0, radius, 0.0)));
        points.add_point(&(*center + Vec3::new(0.0, 0.0, radius)));
        Sphere {
            points,
            forces: vec![0.0; 12],
            radius,
            drag: 0.0,
            drag_rot: 0.0,
            mobility: 0.0,
        }
    }

    pub fn nb_points(&self) -> usize {
        4
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn center(&self) -> Vec3 {
        self.points.pos_point(0)
    }

    /// Unit vector of the orientation frame, `axis` in `0..3`
    pub fn orientation(&self, axis: usize) -> Vec3 {
        (self.points.pos_point(1 + axis) - self.center()).normalized()
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

    pub fn net_force(&self, p: usize) -> Vec3 {
        Vec3::from_slice(&self.forces[3 * p..3 * p + 3])
    }

    pub(crate) fn forces_mut(&mut self) -> &mut [f64] {
        &mut self.forces
    }

    pub fn drag_coefficient(&self) -> f64 {
        self.drag
    }

    pub fn mobility(&self) -> f64 {
        self.mobility
    }

    pub fn prepare(&mut self, viscosity: f64) {
        let pi = std::f64::consts::PI;
        self.drag = 6.0 * pi * viscosity * self.radius;
        self.drag_rot = 8.0 * pi * viscosity * self.radius.powi(3);
        self.mobility = self.nb_points() as f64 / self.drag;
        self.reshape();
    }

    /// Rigid-motion speeds: net force over all four points translates the
    /// sphere, the torque of the reference points rotates the frame.
    pub fn set_speeds_from_forces(&self, x: &[f64], y: &mut [f64], s: f64) {
        let c = self.center();
        let mut force = Vec3::zero();
        let mut torque = Vec3::zero();
        for p in 0..4 {
            let f = Vec3::from_slice(&x[3 * p..3 * p + 3]);
            force += f;
            if p > 0 {
                torque += (self.points.pos_point(p) - c).cross(&f);
            }
        }
        let v = force / self.drag;
        let w = torque / self.drag_rot;
        (v * s).store(&mut y[0..3]);
        for p in 1..4 {
            let arm = self.points.pos_point(p) - c;
            let speed = (v + w.cross(&arm)) * s;
            speed.store(&mut y[3 * p..3 * p + 3]);
        }
    }

    pub fn add_brownian_forces<R: rand::Rng>(&self, rhs: &mut [f64], sc: f64, rng: &mut R) -> f64 {
        let b = (2.0 * sc / self.mobility).sqrt();
        for v in rhs[..12].iter_mut() {
            let g: f64 = StandardNormal.sample(rng);
            *v += b * g;
        }
        self.mobility * b
    }

    /// Restores an exact orthonormal frame at distance `radius` from the
    /// center (Gram-Schmidt), removing the drift of the reference points.
    pub fn reshape(&mut self) {
        let c = self.center();
        let mut e0 = self.points.pos_point(1) - c;
        if e0.length_squared() == 0.0 {
            e0 = Vec3::new(1.0, 0.0, 0.0);
        }
        let u0 = e0.normalized();
        let e1 = self.points.pos_point(2) - c;
        let mut u1 = e1 - u0 * e1.dot(&u0);
        if u1.length_squared() < 1e-20 {
            u1 = u0.orthogonal();
        }
        let u1 = u1.normalized();
        let u2 = u0.cross(&u1);
        let r = self.radius;
        self.points.set_point(1, &(c + u0 * r));
        self.points.set_point(2, &(c + u1 * r));
        self.points.set_point(3, &(c + u2 * r));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drags_follow_stokes() {
        let mut s = Sphere::new(&Vec3::zero(), 2.0);
        s.prepare(1.5);
        let pi = std::f64::consts::PI;
        assert!((s.drag_coefficient() - 6.0 * pi * 1.5 * 2.0).abs() < 1e-9);
        assert!((s.drag_rot - 8.0 * pi * 1.5 * 8.0).abs() < 1e-9);
    }

    #[test]
    fn frame_stays_orthonormal() {
        let mut s = Sphere::new(&Vec3::new(1.0, 1.0, 1.0), 1.0);
        // disturb the reference points
        let p = s.points.pos_point(1) + Vec3::new(0.05, -0.02, 0.01);
        s.points_mut().set_point(1, &p);
        s.reshape();
        for a in 0..3 {
            let u = s.orientation(a);
            assert!((u.length() - 1.0).abs() < 1e-12);
            assert!((s.pos_point(1 + a).distance(&s.center()) - 1.0).abs() < 1e-12);
            for b in a + 1..3 {
                assert!(u.dot(&s.orientation(b)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn pure_torque_spins_in_place() {
        let mut s = Sphere::new(&Vec3::zero(), 1.0);
        s.prepare(1.0);
        // force couple on the reference points 1 and 2: torque around z
        let mut x = [0.0; 12];
        x[3 + 1] = 1.0; // +y force on the +x reference point
        x[6] = -1.0; // -x force on the +y reference point
        let mut y = [0.0; 12];
        s.set_speeds_from_forces(&x, &mut y, 1.0);
        // torque has no net force along z and the center barely moves
        let vc = Vec3::from_slice(&y[0..3]);
        assert!(vc.z.abs() < 1e-12);
        // the two reference points move oppositely in the xy plane
        let v1 = Vec3::from_slice(&y[3..6]);
        let v2 = Vec3::from_slice(&y[6..9]);
        assert!(v1.y > 0.0 && v2.x < 0.0);
    }
}
