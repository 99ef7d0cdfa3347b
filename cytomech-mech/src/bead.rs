use rand_distr::{Distribution, StandardNormal};

use cytomech_numerical::Vec3;

use crate::PointArray;

/// A sphere without orientation: one point and a radius.
///
/// The drag follows Stokes' law; there is no rotation and no internal
/// elasticity.
pub struct Bead {
    points: PointArray,
    forces: Vec<f64>,
    radius: f64,

    // ---------- per-step data
    drag: f64,
}

impl Bead {
    pub fn new(center: &Vec3, radius: f64) -> Bead {
        assert!(radius > 0.0);
        let mut points = PointArray::new();
        points.add_point(center);
        Bead { points, forces: vec![0.0; 3], radius, drag: 0.0 }
    }

    pub fn nb_points(&self) -> usize {
        1
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn position(&self) -> Vec3 {
        self.points.pos_point(0)
    }

    pub fn set_position(&mut self, w: &Vec3) {
        self.points.set_point(0, w);
    }

    pub fn points(&self) -> &PointArray {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut PointArray {
        &mut self.points
    }

    pub fn net_force(&self) -> Vec3 {
        Vec3::from_slice(&self.forces)
    }

    pub(crate) fn forces_mut(&mut self) -> &mut [f64] {
        &mut self.forces
    }

    pub fn drag_coefficient(&self) -> f64 {
        self.drag
    }

    pub fn mobility(&self) -> f64 {
        1.0 / self.drag
    }

    pub fn prepare(&mut self, viscosity: f64) {
        self.drag = 6.0 * std::f64::consts::PI * viscosity * self.radius;
    }

    pub fn set_speeds_from_forces(&self, x: &[f64], y: &mut [f64], s: f64) {
        let sc = s / self.drag;
        for d in 0..3 {
            y[d] = sc * x[d];
        }
    }

    pub fn add_brownian_forces<R: rand::Rng>(&self, rhs: &mut [f64], sc: f64, rng: &mut R) -> f64 {
        let b = (2.0 * sc * self.drag).sqrt();
        for v in rhs[..3].iter_mut() {
            let g: f64 = StandardNormal.sample(rng);
            *v += b * g;
        }
        b / self.drag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stokes_drag_and_speed() {
        let mut b = Bead::new(&Vec3::zero(), 1.0);
        b.prepare(1.0);
        assert!((b.drag_coefficient() - 6.0 * std::f64::consts::PI).abs() < 1e-12);
        let x = [3.0, 0.0, 0.0];
        let mut y = [0.0; 3];
        b.set_speeds_from_forces(&x, &mut y, 2.0);
        assert!((y[0] - 6.0 / b.drag_coefficient()).abs() < 1e-12);
    }
}
