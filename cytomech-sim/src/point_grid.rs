//! The steric grid.
//!
//! Rebuilt every step: each steric-enabled entity drops its points and
//! segments into the cell containing them, and pairwise soft-contact
//! interactions are generated between entries of the same cell and of a
//! fixed half-stencil of forward neighbors, so that every pair is visited
//! exactly once. The cell edge must cover the longest segment plus twice
//! the largest interaction reach, which the driver guarantees when sizing
//! the grid.

use itertools::iproduct;

use cytomech_mech::{Meca, PointInterpolated};
use cytomech_numerical::Vec3;

/// One entry of the steric grid, in solver coordinates: the object's
/// registration index plus the point (or segment start point) index.
#[derive(Clone, Copy, Debug)]
pub enum StericEntry {
    Point { mec: usize, point: usize, pos: Vec3, radius: f64, reach: f64 },
    Segment { mec: usize, point: usize, a: Vec3, b: Vec3, radius: f64, reach: f64 },
}

impl StericEntry {
    fn anchor(&self) -> Vec3 {
        match self {
            StericEntry::Point { pos, .. } => *pos,
            StericEntry::Segment { a, b, .. } => (*a + *b) * 0.5,
        }
    }
}

/// Soft-contact stiffnesses: `push` below contact, `pull` in the
/// attractive tail.
#[derive(Clone, Copy, Debug)]
pub struct StericStiffness {
    pub push: f64,
    pub pull: f64,
}

pub struct StericGrid {
    origin: Vec3,
    edge: f64,
    dims: [usize; 3],
    periodic: [bool; 3],
    cells: Vec<Vec<StericEntry>>,
}

/// Closest points of two segments `[p, p+d]` and `[q, q+e]`, returned as
/// the clamped parameters `(s, t)`.
fn closest_segment_points(p: &Vec3, d: &Vec3, q: &Vec3, e: &Vec3) -> (f64, f64) {
    let r = *p - *q;
    let a = d.dot(d);
    let b = d.dot(e);
    let c = e.dot(e);
    let f = e.dot(&r);
    let g = d.dot(&r);

    let denom = a * c - b * b;
    let mut s = if denom.abs() > 1e-12 * a * c + 1e-30 {
        ((b * f - c * g) / denom).clamp(0.0, 1.0)
    } else {
        // nearly parallel segments
        0.0
    };
    let mut t = if c > 0.0 { ((b * s + f) / c).clamp(0.0, 1.0) } else { 0.0 };
    // re-project s for the clamped t
    if a > 0.0 {
        s = ((b * t - g) / a).clamp(0.0, 1.0);
    }
    (s, t)
}

impl StericGrid {
    pub fn new(min: Vec3, max: Vec3, min_edge: f64, periodic: [bool; 3], max_cells: usize) -> StericGrid {
        assert!(min_edge > 0.0);
        let extent = [max.x - min.x, max.y - min.y, max.z - min.z];
        let mut edge = min_edge;
        let mut dims;
        loop {
            dims = [0usize; 3];
            for a in 0..3 {
                dims[a] = ((extent[a] / edge).ceil() as usize).max(1);
            }
            if dims[0] * dims[1] * dims[2] <= max_cells {
                break;
            }
            edge *= 2.0;
        }
        let nb = dims[0] * dims[1] * dims[2];
        StericGrid { origin: min, edge, dims, periodic, cells: vec![Vec::new(); nb] }
    }

    pub fn edge(&self) -> f64 {
        self.edge
    }

    pub fn clear(&mut self) {
        for c in self.cells.iter_mut() {
            c.clear();
        }
    }

    fn cell_coords(&self, pos: &Vec3) -> [usize; 3] {
        let o = [self.origin.x, self.origin.y, self.origin.z];
        let p = [pos.x, pos.y, pos.z];
        let mut out = [0usize; 3];
        for a in 0..3 {
            let i = ((p[a] - o[a]) / self.edge).floor() as isize;
            let n = self.dims[a] as isize;
            out[a] = if self.periodic[a] { i.rem_euclid(n) as usize } else { i.clamp(0, n - 1) as usize };
        }
        out
    }

    fn cell_index(&self, c: [usize; 3]) -> usize {
        (c[0] * self.dims[1] + c[1]) * self.dims[2] + c[2]
    }

    /// Inserts an entry in the cell of its anchor point (the midpoint for
    /// segments).
    pub fn add(&mut self, entry: StericEntry) {
        let c = self.cell_coords(&entry.anchor());
        let i = self.cell_index(c);
        self.cells[i].push(entry);
    }

    /// The forward half of the 26-neighborhood: every pair of cells is
    /// visited from exactly one side.
    fn forward_neighbors(&self, c: [usize; 3]) -> Vec<usize> {
        let mut out = Vec::with_capacity(13);
        for (dx, dy, dz) in iproduct!(-1isize..=1, -1isize..=1, -1isize..=1) {
            if (dx, dy, dz) <= (0, 0, 0) {
                continue;
            }
            let mut ok = true;
            let mut n = [0usize; 3];
            let d = [dx, dy, dz];
            for a in 0..3 {
                let i = c[a] as isize + d[a];
                let dim = self.dims[a] as isize;
                if self.periodic[a] {
                    if dim > 1 {
                        n[a] = i.rem_euclid(dim) as usize;
                    } else {
                        n[a] = 0;
                    }
                } else if i < 0 || i >= dim {
                    ok = false;
                    break;
                } else {
                    n[a] = i as usize;
                }
            }
            if ok {
                let idx = self.cell_index(n);
                // a thin periodic axis can alias onto the cell itself
                if idx != self.cell_index(c) && !out.contains(&idx) {
                    out.push(idx);
                }
            }
        }
        out
    }

    /// Emits a soft contact between two located points: repulsion below
    /// the contact distance, attraction up to the combined reach.
    fn interact(
        meca: &mut Meca,
        pa: PointInterpolated,
        pb: PointInterpolated,
        pos_a: &Vec3,
        pos_b: &Vec3,
        contact: f64,
        reach: f64,
        stiff: &StericStiffness,
    ) {
        let d = pos_a.distance(pos_b);
        if d < contact {
            meca.add_long_link(&pa, &pb, contact, stiff.push);
        } else if d < reach && stiff.pull > 0.0 {
            meca.add_long_link(&pa, &pb, contact, stiff.pull);
        }
    }

    fn interact_pair(meca: &mut Meca, x: &StericEntry, y: &StericEntry, stiff: &StericStiffness) {
        // segments of the same fiber closer than two points apart are
        // connected material and are not steric partners
        let (mx, px) = match x {
            StericEntry::Point { mec, point, .. } | StericEntry::Segment { mec, point, .. } => (*mec, *point),
        };
        let (my, py) = match y {
            StericEntry::Point { mec, point, .. } | StericEntry::Segment { mec, point, .. } => (*mec, *point),
        };
        if mx == my && px.abs_diff(py) <= 2 {
            return;
        }

        match (x, y) {
            (
                StericEntry::Point { mec: ma, point: ia, pos: va, radius: ra, reach: ea },
                StericEntry::Point { mec: mb, point: ib, pos: vb, radius: rb, reach: eb },
            ) => {
                let pa = PointInterpolated { mec: *ma, point: *ia, coef: 0.0 };
                let pb = PointInterpolated { mec: *mb, point: *ib, coef: 0.0 };
                Self::interact(meca, pa, pb, va, vb, ra + rb, ea + eb, stiff);
            }
            (
                StericEntry::Point { mec: ma, point: ia, pos: va, radius: ra, reach: ea },
                StericEntry::Segment { mec: mb, point: ib, a, b, radius: rb, reach: eb },
            )
            | (
                StericEntry::Segment { mec: mb, point: ib, a, b, radius: rb, reach: eb },
                StericEntry::Point { mec: ma, point: ia, pos: va, radius: ra, reach: ea },
            ) => {
                let d = *b - *a;
                let h2 = d.length_squared();
                let t = if h2 > 0.0 { ((*va - *a).dot(&d) / h2).clamp(0.0, 1.0) } else { 0.0 };
                let foot = *a + d * t;
                let pa = PointInterpolated { mec: *ma, point: *ia, coef: 0.0 };
                let pb = PointInterpolated { mec: *mb, point: *ib, coef: t };
                Self::interact(meca, pa, pb, va, &foot, ra + rb, ea + eb, stiff);
            }
            (
                StericEntry::Segment { mec: ma, point: ia, a: a1, b: b1, radius: ra, reach: ea },
                StericEntry::Segment { mec: mb, point: ib, a: a2, b: b2, radius: rb, reach: eb },
            ) => {
                let d1 = *b1 - *a1;
                let d2 = *b2 - *a2;
                let (s, t) = closest_segment_points(a1, &d1, a2, &d2);
                let pos_a = *a1 + d1 * s;
                let pos_b = *a2 + d2 * t;
                let pa = PointInterpolated { mec: *ma, point: *ia, coef: s };
                let pb = PointInterpolated { mec: *mb, point: *ib, coef: t };
                Self::interact(meca, pa, pb, &pos_a, &pos_b, ra + rb, ea + eb, stiff);
            }
        }
    }

    /// Generates the contact interactions for all populated cells.
    pub fn set_interactions(&self, meca: &mut Meca, stiff: &StericStiffness) {
        for ci in 0..self.cells.len() {
            let list = &self.cells[ci];
            if list.is_empty() {
                continue;
            }
            // pairs within the cell
            for i in 0..list.len() {
                for j in i + 1..list.len() {
                    Self::interact_pair(meca, &list[i], &list[j], stiff);
                }
            }
            // pairs with the forward neighbor cells
            let c = [
                ci / (self.dims[1] * self.dims[2]),
                (ci / self.dims[2]) % self.dims[1],
                ci % self.dims[2],
            ];
            for ni in self.forward_neighbors(c) {
                for x in list.iter() {
                    for y in self.cells[ni].iter() {
                        Self::interact_pair(meca, x, y, stiff);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_points_of_crossing_segments() {
        // two orthogonal segments crossing at distance 1
        let p = Vec3::new(-1.0, 0.0, 0.0);
        let d = Vec3::new(2.0, 0.0, 0.0);
        let q = Vec3::new(0.0, -1.0, 1.0);
        let e = Vec3::new(0.0, 2.0, 0.0);
        let (s, t) = closest_segment_points(&p, &d, &q, &e);
        assert!((s - 0.5).abs() < 1e-9);
        assert!((t - 0.5).abs() < 1e-9);
    }

    #[test]
    fn closest_points_clamp_to_ends() {
        let p = Vec3::new(0.0, 0.0, 0.0);
        let d = Vec3::new(1.0, 0.0, 0.0);
        let q = Vec3::new(3.0, 1.0, 0.0);
        let e = Vec3::new(1.0, 0.0, 0.0);
        let (s, t) = closest_segment_points(&p, &d, &q, &e);
        assert!((s - 1.0).abs() < 1e-9);
        assert!((t - 0.0).abs() < 1e-9);
    }

    #[test]
    fn forward_stencil_covers_each_pair_once() {
        let grid = StericGrid::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 4.0, 4.0), 1.0, [false; 3], 1_000_000);
        // collect all (cell, neighbor) pairs; no pair may appear in both directions
        let mut seen = std::collections::HashSet::new();
        for i in 0..grid.dims[0] {
            for j in 0..grid.dims[1] {
                for k in 0..grid.dims[2] {
                    let c = [i, j, k];
                    let ci = grid.cell_index(c);
                    for ni in grid.forward_neighbors(c) {
                        assert!(!seen.contains(&(ni, ci)), "pair visited from both sides");
                        seen.insert((ci, ni));
                    }
                }
            }
        }
    }
}
