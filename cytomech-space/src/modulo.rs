use cytomech_numerical::Vec3;

/// Periodic wrapping along a subset of the axes.
///
/// The reference cell is centered on the origin: a periodic coordinate is
/// folded into `[-period/2, period/2)`. Non-periodic axes have period zero
/// and are left untouched.
#[derive(Clone, Copy, Default, Debug)]
pub struct Modulo {
    period: [f64; 3],
}

fn fold_coord(x: f64, period: f64) -> f64 {
    if period <= 0.0 {
        return x;
    }
    let mut f = x - period * (x / period).round();
    // round() maps half-integers away from zero; keep the half-open interval
    if f >= 0.5 * period {
        f -= period;
    }
    return f;
}

impl Modulo {
    /// Periodicity along x only
    pub fn periodic_x(period: f64) -> Modulo {
        assert!(period > 0.0);
        Modulo { period: [period, 0.0, 0.0] }
    }

    /// Periodicity along an arbitrary subset of axes; zero disables an axis
    pub fn new(px: f64, py: f64, pz: f64) -> Modulo {
        Modulo { period: [px, py, pz] }
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.period[axis] > 0.0
    }

    pub fn period(&self, axis: usize) -> f64 {
        self.period[axis]
    }

    /// Brings `pos` into the reference cell
    pub fn fold(&self, pos: &mut Vec3) {
        pos.x = fold_coord(pos.x, self.period[0]);
        pos.y = fold_coord(pos.y, self.period[1]);
        pos.z = fold_coord(pos.z, self.period[2]);
    }

    /// Replaces `diff` by the shortest periodic image of the same separation
    pub fn fold_diff(&self, diff: &mut Vec3) {
        self.fold(diff);
    }

    /// The offset that `fold` would subtract from `pos`
    pub fn offset(&self, pos: &Vec3) -> Vec3 {
        let mut folded = *pos;
        self.fold(&mut folded);
        *pos - folded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_into_reference_cell() {
        let m = Modulo::periodic_x(10.0);
        let mut p = Vec3::new(12.5, 3.0, -8.0);
        m.fold(&mut p);
        assert!((p.x - 2.5).abs() < 1e-12);
        assert!((p.y - 3.0).abs() < 1e-12);
        assert!((p.z + 8.0).abs() < 1e-12);

        let mut q = Vec3::new(5.0, 0.0, 0.0);
        m.fold(&mut q);
        assert!((-5.0..5.0).contains(&q.x));
    }

    #[test]
    fn shortest_image_difference() {
        let m = Modulo::periodic_x(10.0);
        let mut d = Vec3::new(9.0, 0.0, 0.0);
        m.fold_diff(&mut d);
        assert!((d.x + 1.0).abs() < 1e-12);
    }
}
