use cytomech_numerical::{Rototranslation, Vec3};
use cytomech_space::Modulo;
use rand::Rng;

/// Flat storage for the model points of one mechanical object.
///
/// Coordinates are packed `x0 y0 z0 x1 y1 z1 ...` so that the whole object
/// can be handed to the solver as one contiguous slice.
#[derive(Clone, Default)]
pub struct PointArray {
    pos: Vec<f64>,
}

impl PointArray {
    pub fn new() -> PointArray {
        PointArray { pos: Vec::new() }
    }

    pub fn with_points(n: usize) -> PointArray {
        PointArray { pos: vec![0.0; 3 * n] }
    }

    pub fn nb_points(&self) -> usize {
        self.pos.len() / 3
    }

    pub fn last_point(&self) -> usize {
        self.nb_points() - 1
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.pos
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.pos
    }

    pub fn pos_point(&self, p: usize) -> Vec3 {
        Vec3::from_slice(&self.pos[3 * p..3 * p + 3])
    }

    pub fn set_point(&mut self, p: usize, w: &Vec3) {
        w.store(&mut self.pos[3 * p..3 * p + 3]);
    }

    pub fn move_point(&mut self, p: usize, w: &Vec3) {
        self.pos[3 * p] += w.x;
        self.pos[3 * p + 1] += w.y;
        self.pos[3 * p + 2] += w.z;
    }

    /// Appends a point, returning its index
    pub fn add_point(&mut self, w: &Vec3) -> usize {
        self.pos.extend_from_slice(&[w.x, w.y, w.z]);
        self.nb_points() - 1
    }

    /// Difference of two consecutive points: `P[p+1] - P[p]`
    pub fn diff_points(&self, p: usize) -> Vec3 {
        self.pos_point(p + 1) - self.pos_point(p)
    }

    /// Intermediate position `P[p] + a * (P[q] - P[p])`
    pub fn interpolate_points(&self, p: usize, q: usize, a: f64) -> Vec3 {
        self.pos_point(p) + (self.pos_point(q) - self.pos_point(p)) * a
    }

    /// Keeps points `[p, nb_points())`, discarding the head of the chain
    pub fn truncate_m(&mut self, p: usize) {
        self.pos.drain(0..3 * p);
    }

    /// Keeps points `[0, p]`, discarding the tail of the chain
    pub fn truncate_p(&mut self, p: usize) {
        self.pos.truncate(3 * (p + 1));
    }

    /// Center of gravity of the points, unweighted
    pub fn centroid(&self) -> Vec3 {
        let n = self.nb_points();
        assert!(n > 0);
        let mut c = Vec3::zero();
        for p in 0..n {
            c += self.pos_point(p);
        }
        c / (n as f64)
    }

    pub fn translate(&mut self, w: &Vec3) {
        for p in 0..self.nb_points() {
            self.move_point(p, w);
        }
    }

    pub fn transform(&mut self, rt: &Rototranslation) {
        for p in 0..self.nb_points() {
            let v = rt.apply(&self.pos_point(p));
            self.set_point(p, &v);
        }
    }

    /// Folds the whole object rigidly into the periodic cell, using the
    /// offset of the centroid so that the shape is preserved when it
    /// straddles a boundary.
    pub fn fold(&mut self, modulo: &Modulo) {
        let off = modulo.offset(&self.centroid());
        if off.length_squared() > 0.0 {
            self.translate(&-off);
        }
    }

    /// Copies the coordinates into `dst`
    pub fn put_points(&self, dst: &mut [f64]) {
        dst[..self.pos.len()].copy_from_slice(&self.pos);
    }

    /// Replaces the coordinates from `src`
    pub fn get_points(&mut self, src: &[f64]) {
        let n = self.pos.len();
        self.pos.copy_from_slice(&src[..n]);
    }

    /// true if every coordinate is finite
    pub fn is_finite(&self) -> bool {
        self.pos.iter().all(|x| x.is_finite())
    }

    /// Adds uniform noise to every coordinate, for tests
    pub fn add_noise<R: Rng>(&mut self, rng: &mut R, amount: f64) {
        for x in self.pos.iter_mut() {
            *x += rng.gen_range(-amount..amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation() {
        let mut pts = PointArray::new();
        for i in 0..5 {
            pts.add_point(&Vec3::new(i as f64, 0.0, 0.0));
        }
        let mut head = pts.clone();
        head.truncate_p(2);
        assert_eq!(head.nb_points(), 3);
        assert!((head.pos_point(2).x - 2.0).abs() < 1e-12);

        pts.truncate_m(3);
        assert_eq!(pts.nb_points(), 2);
        assert!((pts.pos_point(0).x - 3.0).abs() < 1e-12);
    }

    #[test]
    fn rigid_fold_preserves_shape() {
        let modulo = Modulo::periodic_x(10.0);
        let mut pts = PointArray::new();
        pts.add_point(&Vec3::new(4.0, 0.0, 0.0));
        pts.add_point(&Vec3::new(6.0, 0.0, 0.0)); // centroid at 5 -> folds by one period
        pts.fold(&modulo);
        let d = pts.diff_points(0);
        assert!((d.x - 2.0).abs() < 1e-12);
        assert!((-5.0..5.0).contains(&pts.centroid().x));
    }
}
