use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use rand::Rng;
use rand_distr::{Distribution, UnitSphere};

/// A point or displacement in three-dimensional space.
#[derive(Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3 { x, y, z }
    }

    /// A vector with all three components set to zero
    pub fn zero() -> Vec3 {
        Vec3 { x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Builds a vector from a coordinate slice of length 3
    pub fn from_slice(s: &[f64]) -> Vec3 {
        Vec3 { x: s[0], y: s[1], z: s[2] }
    }

    /// Copies the three components into a coordinate slice
    pub fn store(&self, s: &mut [f64]) {
        s[0] = self.x;
        s[1] = self.y;
        s[2] = self.z;
    }

    pub fn dot(&self, rhs: &Vec3) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(&self, rhs: &Vec3) -> Vec3 {
        Vec3 {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Euclidean distance to another point
    pub fn distance(&self, rhs: &Vec3) -> f64 {
        (*self - *rhs).length()
    }

    pub fn distance_squared(&self, rhs: &Vec3) -> f64 {
        (*self - *rhs).length_squared()
    }

    /// Returns a unit vector pointing in the same direction.
    ///
    /// The zero vector is returned unchanged.
    pub fn normalized(&self) -> Vec3 {
        let n = self.length();
        if n > 0.0 {
            return *self / n;
        }
        return *self;
    }

    /// Rescales this vector to the requested length
    pub fn with_length(&self, len: f64) -> Vec3 {
        let n = self.length();
        assert!(n > 0.0);
        *self * (len / n)
    }

    /// true if all three components are finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// A random vector distributed uniformly on the unit sphere
    pub fn random_unit<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
        let v: [f64; 3] = UnitSphere.sample(rng);
        Vec3 { x: v[0], y: v[1], z: v[2] }
    }

    /// A random vector with each component drawn uniformly from `[-amount, amount]`
    pub fn random_square<R: Rng + ?Sized>(rng: &mut R, amount: f64) -> Vec3 {
        Vec3 {
            x: rng.gen_range(-amount..amount),
            y: rng.gen_range(-amount..amount),
            z: rng.gen_range(-amount..amount),
        }
    }

    /// Any unit vector orthogonal to this one; the input must not be zero
    pub fn orthogonal(&self) -> Vec3 {
        // pick the axis least aligned with self to avoid degeneracy
        let other = if self.x.abs() < 0.5 * self.length() {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            Vec3::new(0.0, 1.0, 0.0)
        };
        self.cross(&other).normalized()
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Vec3) {
        self.x -= rhs.x;
        self.y -= rhs.y;
        self.z -= rhs.z;
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self * rhs.x, self * rhs.y, self * rhs.z)
    }
}

impl Div<f64> for Vec3 {
    type Output = Vec3;
    fn div(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl fmt::Debug for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6} {:.6} {:.6})", self.x, self.y, self.z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} {:.4} {:.4}", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_algebra() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-1.0, 0.5, 2.0);
        assert!((a.dot(&b) - 6.0).abs() < 1e-12);
        let c = a.cross(&b);
        assert!(c.dot(&a).abs() < 1e-12);
        assert!(c.dot(&b).abs() < 1e-12);
        assert!((a.normalized().length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn orthogonal_vector() {
        for v in [Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.3, -2.0, 0.7)] {
            let o = v.orthogonal();
            assert!(v.dot(&o).abs() < 1e-12);
            assert!((o.length() - 1.0).abs() < 1e-12);
        }
    }
}
