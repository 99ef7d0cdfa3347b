//! The fiber-binding grid.
//!
//! Once per step, every fiber segment is painted into all cells whose
//! region lies within the maximal binding range of the segment. A free
//! hand then samples attachment candidates from the single cell containing
//! it, making the cost of a binding attempt independent of the total
//! amount of filament. Correctness rests on the painting radius covering
//! the binding range of every hand class: any segment within range of a
//! position is guaranteed to appear in that position's cell.

use rand::rngs::SmallRng;
use rand::Rng;

use cytomech_datastructures::SlotKey;
use cytomech_numerical::Vec3;
use cytomech_space::Modulo;

use crate::{FiberSet, HandProp, Properties};

pub struct FiberGrid {
    origin: Vec3,
    edge: f64,
    dims: [usize; 3],
    periodic: [bool; 3],
    modulo: Option<Modulo>,
    cells: Vec<Vec<(SlotKey, u32)>>,
    painted_range: f64,
}

impl FiberGrid {
    /// Builds a grid covering `[min, max]` with cubic cells of edge at
    /// least `min_edge`; the edge is doubled until the cell count fits
    /// under `max_cells`.
    pub fn new(
        min: Vec3,
        max: Vec3,
        min_edge: f64,
        periodic: [bool; 3],
        modulo: Option<Modulo>,
        max_cells: usize,
    ) -> FiberGrid {
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
        let nb_cells = dims[0] * dims[1] * dims[2];
        log::debug!("binding grid: {}x{}x{} cells of edge {:.3}", dims[0], dims[1], dims[2], edge);
        FiberGrid {
            origin: min,
            edge,
            dims,
            periodic,
            modulo,
            cells: vec![Vec::new(); nb_cells],
            painted_range: 0.0,
        }
    }

    pub fn edge(&self) -> f64 {
        self.edge
    }

    pub fn painted_range(&self) -> f64 {
        self.painted_range
    }

    fn index_on_axis(&self, x: f64, axis: usize) -> isize {
        let o = [self.origin.x, self.origin.y, self.origin.z][axis];
        ((x - o) / self.edge).floor() as isize
    }

    fn wrap(&self, i: isize, axis: usize) -> Option<usize> {
        let n = self.dims[axis] as isize;
        if self.periodic[axis] {
            return Some(i.rem_euclid(n) as usize);
        }
        // clamp: border cells also collect what lies slightly outside
        Some(i.clamp(0, n - 1) as usize)
    }

    fn cell_index(&self, pos: &Vec3) -> usize {
        let i = self.wrap(self.index_on_axis(pos.x, 0), 0).unwrap();
        let j = self.wrap(self.index_on_axis(pos.y, 1), 1).unwrap();
        let k = self.wrap(self.index_on_axis(pos.z, 2), 2).unwrap();
        (i * self.dims[1] + j) * self.dims[2] + k
    }

    /// The number of painted entries in the cell containing `pos`
    pub fn cell_occupancy(&self, pos: &Vec3) -> usize {
        self.cells[self.cell_index(pos)].len()
    }

    /// Clears all visit lists and paints every fiber segment into the
    /// cells whose region, inflated by `range`, intersects it.
    pub fn paint(&mut self, fibers: &FiberSet, range: f64) {
        for c in self.cells.iter_mut() {
            c.clear();
        }
        self.painted_range = range;

        for (key, fobj) in fibers.iter() {
            for s in 0..fobj.fiber.nb_segments() {
                let a = fobj.fiber.pos_point(s);
                let b = fobj.fiber.pos_point(s + 1);
                self.paint_segment(key, s as u32, &a, &b, range);
            }
        }
    }

    fn paint_segment(&mut self, key: SlotKey, seg: u32, a: &Vec3, b: &Vec3, range: f64) {
        let lo = [
            a.x.min(b.x) - range,
            a.y.min(b.y) - range,
            a.z.min(b.z) - range,
        ];
        let hi = [
            a.x.max(b.x) + range,
            a.y.max(b.y) + range,
            a.z.max(b.z) + range,
        ];
        let mut i0 = [0isize; 3];
        let mut i1 = [0isize; 3];
        for ax in 0..3 {
            i0[ax] = self.index_on_axis(lo[ax], ax);
            i1[ax] = self.index_on_axis(hi[ax], ax);
            if self.periodic[ax] {
                // never cover the same periodic image twice
                let n = self.dims[ax] as isize;
                if i1[ax] - i0[ax] >= n {
                    i1[ax] = i0[ax] + n - 1;
                }
            } else {
                let n = self.dims[ax] as isize;
                i0[ax] = i0[ax].clamp(0, n - 1);
                i1[ax] = i1[ax].clamp(0, n - 1);
            }
        }
        for i in i0[0]..=i1[0] {
            let iw = self.wrap(i, 0).unwrap();
            for j in i0[1]..=i1[1] {
                let jw = self.wrap(j, 1).unwrap();
                for k in i0[2]..=i1[2] {
                    let kw = self.wrap(k, 2).unwrap();
                    let c = (iw * self.dims[1] + jw) * self.dims[2] + kw;
                    self.cells[c].push((key, seg));
                }
            }
        }
    }

    /// Vector from `from` to `to`, folded to the nearest periodic image
    fn folded(&self, from: &Vec3, to: &Vec3) -> Vec3 {
        let mut d = *to - *from;
        if let Some(m) = &self.modulo {
            m.fold_diff(&mut d);
        }
        return d;
    }

    /// One attachment attempt for a free hand at `pos`.
    ///
    /// The entries of the cell are visited from a random start; each is
    /// submitted to a Bernoulli trial of the hand's binding probability,
    /// then to the geometric test (foot of perpendicular within the
    /// segment, distance within the class range) and to the binding-key
    /// match. The first candidate that passes wins.
    pub fn try_attach(
        &self,
        pos: &Vec3,
        hand: &HandProp,
        fibers: &FiberSet,
        props: &Properties,
        rng: &mut SmallRng,
    ) -> Option<(SlotKey, f64)> {
        debug_assert!(hand.binding_range <= self.painted_range + 1e-12);
        let list = &self.cells[self.cell_index(pos)];
        if list.is_empty() {
            return None;
        }
        let start = rng.gen_range(0..list.len());
        for n in 0..list.len() {
            if rng.gen::<f64>() >= hand.binding_prob {
                continue;
            }
            let (key, seg) = list[(start + n) % list.len()];
            let Some(fobj) = fibers.get(key) else {
                continue;
            };
            if hand.binding_key & props.fibers[fobj.prop].binding_key == 0 {
                continue;
            }
            let seg = seg as usize;
            let a = fobj.fiber.pos_point(seg);
            let d = fobj.fiber.points().diff_points(seg);
            let h2 = d.length_squared();
            let w = self.folded(&a, pos);
            let t = w.dot(&d) / h2;
            if !(0.0..=1.0).contains(&t) {
                continue;
            }
            let dist2 = (w - d * t).length_squared();
            if dist2 > hand.binding_range * hand.binding_range {
                continue;
            }
            let ab = fobj.fiber.abscissa_point(seg as f64 + t);
            return Some((key, ab));
        }
        return None;
    }
}
