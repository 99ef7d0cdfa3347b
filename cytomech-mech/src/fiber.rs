use cytomech_numerical::{SymTridiag, Vec3};

use crate::{MechError, PointArray};

/// Designates one end of a fiber, or its middle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FiberEnd {
    Minus,
    Plus,
    Center,
}

/// Physical constants needed to simulate a fiber, copied from its class
/// parameters before each step.
#[derive(Clone, Debug)]
pub struct FiberMechanics {
    /// bending elastic modulus `κ` (force × length²)
    pub rigidity: f64,
    /// viscosity of the medium
    pub viscosity: f64,
    /// hydrodynamic radius of the filament
    pub radius: f64,
    /// length above which the drag stops growing logarithmically
    pub drag_length_cutoff: f64,
    /// height above a wall; when set, the near-surface drag formula is used
    pub surface_height: Option<f64>,
}

impl Default for FiberMechanics {
    fn default() -> Self {
        FiberMechanics {
            rigidity: 0.0,
            viscosity: 1.0,
            radius: 0.0125,
            drag_length_cutoff: 20.0,
            surface_height: None,
        }
    }
}

/// An incompressible semi-flexible filament.
///
/// The fiber is a chain of model points separated by exactly
/// [`segmentation()`](Fiber::segmentation); the equal-distance constraints are maintained by the
/// projection built in [`make_projection()`](Fiber::make_projection) and applied at every
/// force-to-velocity conversion.
///
/// Positions along the fiber are measured by a curvilinear abscissa counted
/// from an origin that belongs to the fiber: growing or cutting either end
/// changes `abscissa_m()`/`abscissa_p()` but never the abscissa of existing
/// material, so attachment positions survive length changes.
pub struct Fiber {
    points: PointArray,
    forces: Vec<f64>,
    /// actual distance between consecutive points
    segmentation: f64,
    /// ideal segmentation, a class parameter
    target_segmentation: f64,
    /// abscissa of the minus end
    origin: f64,
    /// cuts (abscissa from origin) to be performed at end of step
    pending_cuts: Vec<f64>,

    // ---------- per-step data, refreshed by prepare()
    pub(crate) diff: Vec<f64>,
    pub(crate) jjt: SymTridiag,
    pub(crate) lagrange: Vec<f64>,
    pub(crate) proj_diff: Vec<f64>,
    pub(crate) mobility: f64,
    pub(crate) rigidity_scaled: f64,
}

/// The number of model points that best represents a fiber of relative
/// length `ratio = length / target_segmentation`: the integer `n` of
/// segments minimizing `|length/n - target|`, plus one.
pub(crate) fn best_nb_points(ratio: f64) -> usize {
    let n = ratio as usize;
    if (2 * n + 1) as f64 * ratio > (2 * n * (n + 1)) as f64 {
        return n + 2;
    }
    return n + 1;
}

fn polyline_length(pts: &[Vec3]) -> f64 {
    let mut len = 0.0;
    for i in 1..pts.len() {
        len += pts[i].distance(&pts[i - 1]);
    }
    len
}

/// Keeps the leading `keep` of arclength of a polyline
fn trim_tail(pts: &[Vec3], keep: f64) -> Vec<Vec3> {
    assert!(keep > 0.0);
    let mut out = vec![pts[0]];
    let mut rest = keep;
    for i in 1..pts.len() {
        let d = pts[i].distance(&pts[i - 1]);
        if d >= rest {
            out.push(pts[i - 1] + (pts[i] - pts[i - 1]) * (rest / d));
            return out;
        }
        out.push(pts[i]);
        rest -= d;
    }
    return out;
}

/// Drops the leading `drop` of arclength of a polyline
fn trim_head(pts: &[Vec3], drop: f64) -> Vec<Vec3> {
    let mut rest = drop;
    for i in 1..pts.len() {
        let d = pts[i].distance(&pts[i - 1]);
        if d > rest {
            let mut out = vec![pts[i - 1] + (pts[i] - pts[i - 1]) * (rest / d)];
            out.extend_from_slice(&pts[i..]);
            return out;
        }
        rest -= d;
    }
    vec![*pts.last().unwrap()]
}

impl Fiber {
    /// Creates a straight fiber.
    ///
    /// # Arguments
    /// * `target_segmentation` - the ideal distance between model points
    /// * `length` - initial fiber length, must be positive
    /// * `pos` - position of the reference end (or of the center)
    /// * `dir` - direction from the minus end towards the plus end
    /// * `reference` - which part of the fiber `pos` refers to
    pub fn new(
        target_segmentation: f64,
        length: f64,
        pos: &Vec3,
        dir: &Vec3,
        reference: FiberEnd,
    ) -> Result<Fiber, MechError> {
        if length <= 0.0 {
            return Err(MechError::InvalidParameter("fiber length must be > 0".to_string()));
        }
        if target_segmentation <= 0.0 {
            return Err(MechError::InvalidParameter("fiber segmentation must be > 0".to_string()));
        }
        let nbp = best_nb_points(length / target_segmentation);
        debug_assert!(nbp > 1);

        let mut fib = Fiber {
            points: PointArray::with_points(nbp),
            forces: vec![0.0; 3 * nbp],
            segmentation: length / (nbp - 1) as f64,
            target_segmentation,
            origin: 0.0,
            pending_cuts: Vec::new(),
            diff: Vec::new(),
            jjt: SymTridiag::new(),
            lagrange: vec![0.0; nbp - 1],
            proj_diff: vec![0.0; nbp - 1],
            mobility: 0.0,
            rigidity_scaled: 0.0,
        };
        fib.set_straight(pos, dir, reference);
        Ok(fib)
    }

    /// Rebuilds a fiber from recorded state: explicit points, segmentation
    /// and origin abscissa, plus the persisted segment tensions.
    pub fn from_points(
        target_segmentation: f64,
        segmentation: f64,
        origin: f64,
        pts: &[Vec3],
        tensions: &[f64],
    ) -> Result<Fiber, MechError> {
        if pts.len() < 2 {
            return Err(MechError::InvalidParameter("a fiber needs at least 2 points".to_string()));
        }
        if segmentation <= 0.0 || target_segmentation <= 0.0 {
            return Err(MechError::InvalidParameter("fiber segmentation must be > 0".to_string()));
        }
        let mut points = PointArray::with_points(pts.len());
        for (p, w) in pts.iter().enumerate() {
            points.set_point(p, w);
        }
        let nbs = pts.len() - 1;
        let mut lagrange = vec![0.0; nbs];
        lagrange[..tensions.len().min(nbs)].copy_from_slice(&tensions[..tensions.len().min(nbs)]);
        Ok(Fiber {
            points,
            forces: vec![0.0; 3 * pts.len()],
            segmentation,
            target_segmentation,
            origin,
            pending_cuts: Vec::new(),
            diff: Vec::new(),
            jjt: SymTridiag::new(),
            lagrange,
            proj_diff: vec![0.0; nbs],
            mobility: 0.0,
            rigidity_scaled: 0.0,
        })
    }

    /// Places the points on a straight line without changing length or
    /// point count.
    pub fn set_straight(&mut self, pos: &Vec3, dir: &Vec3, reference: FiberEnd) {
        let d = dir.normalized();
        assert!(d.length() > 0.9, "fiber direction must not vanish");
        let minus = match reference {
            FiberEnd::Minus => *pos,
            FiberEnd::Plus => *pos - d * self.length(),
            FiberEnd::Center => *pos - d * (0.5 * self.length()),
        };
        let step = d * self.segmentation;
        for p in 0..self.nb_points() {
            let w = minus + step * p as f64;
            self.points.set_point(p, &w);
        }
    }

    /// Replaces the shape by resampling the given polyline at equal
    /// intervals. The number of points is chosen automatically from the
    /// polyline length and the target segmentation; minus and plus ends
    /// land on the first and last input points.
    pub fn set_shape(&mut self, pts: &[Vec3]) {
        assert!(pts.len() > 1);
        let len = polyline_length(pts);
        let np = best_nb_points(len / self.target_segmentation);
        self.segmentation = len / (np - 1) as f64;

        let mut points = PointArray::with_points(np);
        points.set_point(0, &pts[0]);

        let mut a = pts[0];
        let mut b = pts[1];
        let mut seg = 1usize;
        let mut seg_len = b.distance(&a);
        let mut h = 0.0;
        for n in 1..np - 1 {
            h += self.segmentation;
            // rounding can push h past the last input segment by an epsilon
            while h > seg_len && seg + 1 < pts.len() {
                h -= seg_len;
                a = b;
                seg += 1;
                b = pts[seg];
                seg_len = b.distance(&a);
            }
            let w = a + (b - a) * (h / seg_len);
            points.set_point(n, &w);
        }
        points.set_point(np - 1, &pts[pts.len() - 1]);

        self.points = points;
        self.forces = vec![0.0; 3 * np];
        self.lagrange.resize(np - 1, 0.0);
        self.proj_diff.resize(np - 1, 0.0);
        self.reshape();
    }

    /// The current shape as a list of points
    pub fn polyline(&self) -> Vec<Vec3> {
        (0..self.nb_points()).map(|p| self.points.pos_point(p)).collect()
    }

    // ---------- geometry accessors

    pub fn nb_points(&self) -> usize {
        self.points.nb_points()
    }

    pub fn nb_segments(&self) -> usize {
        self.points.nb_points() - 1
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

    /// The actual distance between consecutive model points
    pub fn segmentation(&self) -> f64 {
        self.segmentation
    }

    pub fn target_segmentation(&self) -> f64 {
        self.target_segmentation
    }

    pub fn length(&self) -> f64 {
        self.segmentation * self.nb_segments() as f64
    }

    /// Abscissa of the minus end
    pub fn abscissa_m(&self) -> f64 {
        self.origin
    }

    /// Abscissa of the plus end
    pub fn abscissa_p(&self) -> f64 {
        self.origin + self.length()
    }

    /// Abscissa of the model point (or fractional point) `p`
    pub fn abscissa_point(&self, p: f64) -> f64 {
        self.origin + self.segmentation * p
    }

    pub fn within(&self, ab: f64) -> bool {
        self.abscissa_m() <= ab && ab <= self.abscissa_p()
    }

    /// Locates an abscissa: segment index plus interpolation coefficient in
    /// `[0, 1]`. Out-of-range abscissae clamp to the closest end.
    pub fn interpolate(&self, ab: f64) -> (usize, f64) {
        let s = (ab - self.origin) / self.segmentation;
        if s <= 0.0 {
            return (0, 0.0);
        }
        let last = self.nb_segments() - 1;
        if s >= self.nb_segments() as f64 {
            return (last, 1.0);
        }
        let seg = (s as usize).min(last);
        (seg, s - seg as f64)
    }

    /// Position of the material point at the given abscissa
    pub fn pos_at(&self, ab: f64) -> Vec3 {
        let (seg, c) = self.interpolate(ab);
        self.points.interpolate_points(seg, seg + 1, c)
    }

    /// Unit tangent of the fiber at the given abscissa
    pub fn dir_at(&self, ab: f64) -> Vec3 {
        let (seg, _) = self.interpolate(ab);
        self.points.diff_points(seg).normalized()
    }

    pub fn pos_end(&self, end: FiberEnd) -> Vec3 {
        match end {
            FiberEnd::Minus => self.points.pos_point(0),
            FiberEnd::Plus => self.points.pos_point(self.points.last_point()),
            FiberEnd::Center => self.pos_at(self.origin + 0.5 * self.length()),
        }
    }

    /// Unit tangent at an end, pointing from the minus towards the plus end
    pub fn dir_end(&self, end: FiberEnd) -> Vec3 {
        match end {
            FiberEnd::Minus => self.points.diff_points(0).normalized(),
            FiberEnd::Plus => self.points.diff_points(self.nb_segments() - 1).normalized(),
            FiberEnd::Center => self.dir_at(self.origin + 0.5 * self.length()),
        }
    }

    /// Component of the force on an end point along the direction of growth
    /// of that end (positive = pulling outwards).
    pub fn projected_force_on_end(&self, end: FiberEnd) -> f64 {
        match end {
            FiberEnd::Plus => self.net_force(self.points.last_point()).dot(&self.dir_end(FiberEnd::Plus)),
            FiberEnd::Minus => -self.net_force(0).dot(&self.dir_end(FiberEnd::Minus)),
            FiberEnd::Center => 0.0,
        }
    }

    // ---------- forces and tensions

    /// Net force on point `p` computed by the last solve
    pub fn net_force(&self, p: usize) -> Vec3 {
        Vec3::from_slice(&self.forces[3 * p..3 * p + 3])
    }

    pub(crate) fn forces_mut(&mut self) -> &mut [f64] {
        &mut self.forces
    }

    /// Tension of segment `s`: the Lagrange multiplier of its length
    /// constraint, positive under extension.
    pub fn tension(&self, s: usize) -> f64 {
        self.lagrange[s]
    }

    pub fn tensions(&self) -> &[f64] {
        &self.lagrange
    }

    pub(crate) fn set_tensions(&mut self, lag: &[f64]) {
        self.lagrange.copy_from_slice(lag);
    }

    // ---------- growing, shrinking, cutting

    /// Elongates (`dlen > 0`) or shortens (`dlen < 0`) the fiber at its
    /// plus end; the added material extends along the end tangent.
    pub fn grow_p(&mut self, dlen: f64) {
        if dlen == 0.0 {
            return;
        }
        let mut poly = self.polyline();
        if dlen > 0.0 {
            let tip = *poly.last().unwrap() + self.dir_end(FiberEnd::Plus) * dlen;
            poly.push(tip);
        } else {
            assert!(self.length() + dlen > 0.0, "fiber would shrink to nothing");
            poly = trim_tail(&poly, self.length() + dlen);
        }
        self.set_shape(&poly);
    }

    /// Elongates or shortens the fiber at its minus end; the origin moves
    /// with the end so that abscissae of existing material do not change.
    pub fn grow_m(&mut self, dlen: f64) {
        if dlen == 0.0 {
            return;
        }
        let mut poly = self.polyline();
        if dlen > 0.0 {
            let tip = poly[0] - self.dir_end(FiberEnd::Minus) * dlen;
            poly.insert(0, tip);
        } else {
            assert!(self.length() + dlen > 0.0, "fiber would shrink to nothing");
            poly = trim_head(&poly, -dlen);
        }
        self.origin -= dlen;
        self.set_shape(&poly);
    }

    /// Removes a piece of length `dlen >= 0` at the plus end
    pub fn cut_p(&mut self, dlen: f64) {
        assert!(dlen >= 0.0);
        self.grow_p(-dlen);
    }

    /// Removes a piece of length `dlen >= 0` at the minus end
    pub fn cut_m(&mut self, dlen: f64) {
        assert!(dlen >= 0.0);
        self.grow_m(-dlen);
    }

    /// Changes the length while keeping the position of `reference` fixed
    pub fn set_length(&mut self, len: f64, reference: FiberEnd) {
        assert!(len > 0.0);
        let dlen = len - self.length();
        match reference {
            FiberEnd::Plus => self.grow_m(dlen),
            FiberEnd::Minus => self.grow_p(dlen),
            FiberEnd::Center => {
                self.grow_p(0.5 * dlen);
                self.grow_m(0.5 * dlen);
            }
        }
    }

    /// Cuts the fiber at the given abscissa, keeping the proximal part in
    /// `self` and returning the distal part as a new fiber whose minus-end
    /// abscissa equals the cut abscissa.
    ///
    /// Returns `None` if `ab` is not strictly inside the fiber.
    pub fn sever_at(&mut self, ab: f64) -> Option<Fiber> {
        if ab <= self.abscissa_m() || ab >= self.abscissa_p() {
            return None;
        }
        let poly = self.polyline();
        let from_minus = ab - self.abscissa_m();
        let distal_poly = trim_head(&poly, from_minus);

        let mut distal = Fiber {
            points: PointArray::new(),
            forces: Vec::new(),
            segmentation: self.segmentation,
            target_segmentation: self.target_segmentation,
            origin: ab,
            pending_cuts: Vec::new(),
            diff: Vec::new(),
            jjt: SymTridiag::new(),
            lagrange: Vec::new(),
            proj_diff: Vec::new(),
            mobility: 0.0,
            rigidity_scaled: 0.0,
        };
        distal.set_shape(&distal_poly);

        self.set_shape(&trim_tail(&poly, from_minus));
        Some(distal)
    }

    /// Registers a cut to be performed when the set flushes severing at the
    /// end of the step.
    pub fn request_cut(&mut self, ab: f64) {
        self.pending_cuts.push(ab);
    }

    pub fn has_pending_cuts(&self) -> bool {
        !self.pending_cuts.is_empty()
    }

    /// Takes the registered cuts, sorted by decreasing abscissa so that
    /// performing them in order leaves earlier abscissae valid.
    pub fn take_pending_cuts(&mut self) -> Vec<f64> {
        let mut cuts = std::mem::take(&mut self.pending_cuts);
        cuts.sort_by(|a, b| b.partial_cmp(a).unwrap());
        cuts
    }

    /// Abscissae at which the fiber crosses the plane `n·x + a = 0`,
    /// in decreasing order.
    pub fn plane_intersections(&self, n: &Vec3, a: f64) -> Vec<f64> {
        let mut cuts = Vec::new();
        for s in 0..self.nb_segments() {
            let h0 = self.pos_point(s).dot(n) + a;
            let h1 = self.pos_point(s + 1).dot(n) + a;
            if (h0 < 0.0) != (h1 < 0.0) {
                let t = h0 / (h0 - h1);
                cuts.push(self.abscissa_point(s as f64 + t));
            }
        }
        cuts.sort_by(|x, y| y.partial_cmp(x).unwrap());
        cuts
    }

    /// Interior joints bent by 90 degrees or more, candidates for the
    /// kink-severing policy.
    pub fn kink_abscissae(&self) -> Vec<f64> {
        let mut out = Vec::new();
        for p in 1..self.nb_segments() {
            if self.points.diff_points(p - 1).dot(&self.points.diff_points(p)) < 0.0 {
                out.push(self.abscissa_point(p as f64));
            }
        }
        out
    }

    /// Merges `donor` into this fiber: the donor's plus end is joined onto
    /// this fiber's minus end, and this fiber keeps its origin. Returns the
    /// abscissa shift to apply to positions formerly expressed on the donor.
    pub fn join(&mut self, donor: &Fiber) -> f64 {
        let shift = self.abscissa_m() - donor.abscissa_p();
        let mut poly = donor.polyline();
        poly.extend(self.polyline().into_iter());
        self.origin -= donor.length();
        self.set_shape(&poly);
        shift
    }

    /// Re-establishes the exact distance between successive points by
    /// re-chaining along the current tangents; the center of gravity is
    /// preserved.
    pub fn reshape(&mut self) {
        let n = self.nb_points();
        let c0 = self.points.centroid();
        for p in 0..n - 1 {
            let d = self.points.diff_points(p);
            let w = self.points.pos_point(p) + d.with_length(self.segmentation);
            self.points.set_point(p + 1, &w);
        }
        let shift = c0 - self.points.centroid();
        self.points.translate(&shift);
    }

    // ---------- drag and per-step preparation

    /// Translational drag of a cylinder moving in an unbounded fluid,
    /// floored by the Stokes drag of a sphere with the same radius.
    fn drag_coefficient_volume(&self, mech: &FiberMechanics) -> f64 {
        let len = self.length();
        let lenc = len.min(mech.drag_length_cutoff);
        let drag_sphere = 6.0 * mech.radius;
        let drag_cylinder = 3.0 * len / ((0.5 * lenc / mech.radius).ln() + 0.312);
        std::f64::consts::PI * mech.viscosity * drag_cylinder.max(drag_sphere)
    }

    /// Drag of a cylinder moving parallel to a nearby wall, at height
    /// `surface_height` above it.
    fn drag_coefficient_surface(&self, mech: &FiberMechanics, height: f64) -> f64 {
        2.0 * std::f64::consts::PI * mech.viscosity * self.length()
            / (1.0 + height / mech.radius).acosh()
    }

    /// Total translational drag of the fiber
    pub fn drag_coefficient(&self, mech: &FiberMechanics) -> f64 {
        match mech.surface_height {
            Some(h) => self.drag_coefficient_surface(mech, h),
            None => self.drag_coefficient_volume(mech),
        }
    }

    /// Refreshes the per-step data: mobility, unit tangents, the factorized
    /// constraint projection and the scaled bending coefficient.
    pub fn prepare(&mut self, mech: &FiberMechanics) -> Result<(), MechError> {
        let drag = self.drag_coefficient(mech);
        debug_assert!(drag > 0.0);
        // forces are spread over all points, hence the factor nb_points
        self.mobility = self.nb_points() as f64 / drag;
        self.rigidity_scaled = mech.rigidity / (self.segmentation * self.segmentation * self.segmentation);
        self.store_differences();
        self.make_projection()?;
        let nbs = self.nb_segments();
        self.lagrange.resize(nbs, 0.0);
        self.proj_diff.resize(nbs, 0.0);
        Ok(())
    }

    pub fn mobility(&self) -> f64 {
        self.mobility
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nb_points_tie_break() {
        // length equal to the target picks two points
        assert_eq!(best_nb_points(1.0), 2);
        // anything shorter still does
        assert_eq!(best_nb_points(0.3), 2);
        // |10/10 - 1| beats |10/9 - 1| and |10/11 - 1|
        assert_eq!(best_nb_points(10.0), 11);
        assert_eq!(best_nb_points(10.4), 11);
        assert_eq!(best_nb_points(10.6), 12);
    }

    #[test]
    fn straight_construction() {
        let f = Fiber::new(1.0, 10.0, &Vec3::zero(), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Minus).unwrap();
        assert_eq!(f.nb_points(), 11);
        assert!((f.segmentation() - 1.0).abs() < 1e-12);
        assert!((f.length() - 10.0).abs() < 1e-12);
        assert!(f.pos_end(FiberEnd::Plus).distance(&Vec3::new(10.0, 0.0, 0.0)) < 1e-12);
        assert!((f.abscissa_m() - 0.0).abs() < 1e-12);
        assert!((f.abscissa_p() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn growth_keeps_abscissae() {
        let mut f = Fiber::new(1.0, 10.0, &Vec3::zero(), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Minus).unwrap();
        f.grow_p(2.0);
        assert!((f.abscissa_p() - 12.0).abs() < 1e-9);
        assert!((f.abscissa_m() - 0.0).abs() < 1e-9);
        f.grow_m(3.0);
        assert!((f.abscissa_m() + 3.0).abs() < 1e-9);
        // the point that was at abscissa 5 has not moved
        assert!(f.pos_at(5.0).distance(&Vec3::new(5.0, 0.0, 0.0)) < 1e-9);
        f.cut_m(3.0);
        assert!((f.abscissa_m() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn severing_splits_lengths_and_abscissae() {
        let mut f = Fiber::new(1.0, 10.0, &Vec3::zero(), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Minus).unwrap();
        let distal = f.sever_at(4.0).unwrap();
        assert!((f.length() - 4.0).abs() < 1e-9);
        assert!((distal.length() - 6.0).abs() < 1e-9);
        assert!((distal.abscissa_m() - 4.0).abs() < 1e-9);
        assert!((distal.abscissa_p() - 10.0).abs() < 1e-9);
        // material at abscissa 7 is on the distal part, at the same place
        assert!(distal.pos_at(7.0).distance(&Vec3::new(7.0, 0.0, 0.0)) < 1e-9);
        // cutting outside the range is refused
        assert!(f.sever_at(4.5).is_none() || f.within(4.5));
    }

    #[test]
    fn join_restores_severed_fiber() {
        let mut f = Fiber::new(1.0, 10.0, &Vec3::zero(), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Minus).unwrap();
        let distal = f.sever_at(4.0).unwrap();
        // re-attach the proximal part under the distal one
        let mut merged = distal;
        let shift = merged.join(&f);
        assert!((shift - 0.0).abs() < 1e-9);
        assert!((merged.length() - 10.0).abs() < 1e-9);
        assert!((merged.abscissa_m() - 0.0).abs() < 1e-9);
        assert!(merged.pos_at(7.0).distance(&Vec3::new(7.0, 0.0, 0.0)) < 1e-6);
    }

    #[test]
    fn reshape_restores_segment_lengths() {
        let mut f = Fiber::new(1.0, 5.0, &Vec3::zero(), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Minus).unwrap();
        let mut rng = <rand::rngs::SmallRng as rand::SeedableRng>::seed_from_u64(3);
        f.points_mut().add_noise(&mut rng, 0.1);
        f.reshape();
        for s in 0..f.nb_segments() {
            let d = f.points().diff_points(s).length();
            assert!((d - f.segmentation()).abs() < 1e-12);
        }
    }

    #[test]
    fn plane_intersection_abscissae() {
        let f = Fiber::new(1.0, 10.0, &Vec3::zero(), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Minus).unwrap();
        // plane x = 4.5
        let cuts = f.plane_intersections(&Vec3::new(1.0, 0.0, 0.0), -4.5);
        assert_eq!(cuts.len(), 1);
        assert!((cuts[0] - 4.5).abs() < 1e-9);
    }
}
