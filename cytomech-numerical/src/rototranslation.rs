use nalgebra::{Matrix3, Vector3};

use crate::Vec3;

/// A rigid transformation of space: rotation followed by translation.
#[derive(Clone)]
pub struct Rototranslation {
    rot: Matrix3<f64>,
    trans: Vector3<f64>,
}

impl Default for Rototranslation {
    /// The identity transformation
    fn default() -> Self {
        Rototranslation { rot: Matrix3::identity(), trans: Vector3::zeros() }
    }
}

fn to_na(v: &Vec3) -> Vector3<f64> {
    Vector3::new(v.x, v.y, v.z)
}

fn from_na(v: &Vector3<f64>) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

impl Rototranslation {
    /// Creates a rotation by `angle` around the axis `(begin, end)`,
    /// leaving points on the axis unmoved.
    pub fn around_axis(begin: &Vec3, end: &Vec3, angle: f64) -> Rototranslation {
        let axis = (*end - *begin).normalized();
        let (s, c) = angle.sin_cos();
        let u = to_na(&axis);
        // Rodrigues formula
        let ux = Matrix3::new(0.0, -u[2], u[1], u[2], 0.0, -u[0], -u[1], u[0], 0.0);
        let rot = Matrix3::identity() * c + ux * s + u * u.transpose() * (1.0 - c);
        let b = to_na(begin);
        let trans = b - rot * b;
        Rototranslation { rot, trans }
    }

    /// The transformation `x -> R·(x - com_a) + com_b` that best superposes
    /// (in the weighted least-squares sense) the point cloud `a` onto `b`.
    ///
    /// This is the Kabsch algorithm: the optimal rotation comes from the SVD
    /// of the weighted covariance of the two centered clouds, with the sign
    /// of the last singular direction flipped if needed to exclude
    /// reflections.
    ///
    /// # Arguments
    /// * `a` - the reference point cloud
    /// * `b` - the target point cloud, same length as `a`
    /// * `weights` - per-point non-negative weights; their sum must be positive
    pub fn superpose(a: &[Vec3], b: &[Vec3], weights: &[f64]) -> Rototranslation {
        assert_eq!(a.len(), b.len());
        assert_eq!(a.len(), weights.len());

        let wsum: f64 = weights.iter().sum();
        assert!(wsum > 0.0);

        let mut com_a = Vector3::zeros();
        let mut com_b = Vector3::zeros();
        for i in 0..a.len() {
            com_a += to_na(&a[i]) * weights[i];
            com_b += to_na(&b[i]) * weights[i];
        }
        com_a /= wsum;
        com_b /= wsum;

        let mut h = Matrix3::zeros();
        for i in 0..a.len() {
            let pa = to_na(&a[i]) - com_a;
            let pb = to_na(&b[i]) - com_b;
            h += pb * pa.transpose() * weights[i];
        }

        let svd = h.svd(true, true);
        let u = svd.u.unwrap();
        let v_t = svd.v_t.unwrap();
        let mut d = Matrix3::identity();
        if (u * v_t).determinant() < 0.0 {
            d[(2, 2)] = -1.0;
        }
        let rot = u * d * v_t;
        let trans = com_b - rot * com_a;
        Rototranslation { rot, trans }
    }

    /// Returns a transformed copy of a given vector
    pub fn apply(&self, v: &Vec3) -> Vec3 {
        from_na(&(self.rot * to_na(v) + self.trans))
    }

    /// Applies this transformation to a given vector in place
    pub fn apply_mut(&self, v: &mut Vec3) {
        *v = self.apply(v);
    }

    /// Applies the inverse transformation; rotations are orthogonal so the
    /// inverse rotation is the transpose.
    pub fn apply_inverse(&self, v: &Vec3) -> Vec3 {
        from_na(&(self.rot.transpose() * (to_na(v) - self.trans)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_around_axis() {
        let r = Rototranslation::around_axis(
            &Vec3::zero(),
            &Vec3::new(0.0, 0.0, 1.0),
            std::f64::consts::FRAC_PI_2,
        );
        let v = r.apply(&Vec3::new(1.0, 0.0, 0.0));
        assert!((v.x - 0.0).abs() < 1e-12);
        assert!((v.y - 1.0).abs() < 1e-12);
        // points on the axis do not move
        let w = r.apply(&Vec3::new(0.0, 0.0, 2.5));
        assert!(w.distance(&Vec3::new(0.0, 0.0, 2.5)) < 1e-12);
    }

    #[test]
    fn superposition_recovers_transform() {
        let pts = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(0.0, 0.0, 3.0),
        ];
        let truth = Rototranslation::around_axis(
            &Vec3::new(1.0, -1.0, 0.5),
            &Vec3::new(2.0, 0.0, 1.5),
            0.8,
        );
        let moved: Vec<Vec3> = pts.iter().map(|p| truth.apply(p) + Vec3::new(0.1, 0.2, -0.3)).collect();
        let w = [1.0; 4];
        let fit = Rototranslation::superpose(&pts, &moved, &w);
        for p in pts.iter() {
            assert!(fit.apply(p).distance(&(truth.apply(p) + Vec3::new(0.1, 0.2, -0.3))) < 1e-9);
        }
    }

    #[test]
    fn inverse_round_trip() {
        let r = Rototranslation::around_axis(&Vec3::new(1.0, 2.0, 3.0), &Vec3::new(0.0, 1.0, 1.0), 1.1);
        let v = Vec3::new(-0.4, 0.9, 2.2);
        assert!(r.apply_inverse(&r.apply(&v)).distance(&v) < 1e-12);
    }
}
