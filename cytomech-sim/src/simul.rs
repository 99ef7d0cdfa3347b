//! The simulation driver: owns the world (properties, object sets,
//! spaces, grids, the random generator) and advances it step by step.
//!
//! One step runs the sub-stages in fixed order: list shuffling, fiber
//! assembly dynamics, grid painting, binder attachment and detachment,
//! the implicit mechanical solve, then the periodic fold and the severing
//! flush. Stochastic draws consume the single seeded generator in this
//! documented order, so a run is reproducible for a given seed and build.

use std::collections::HashMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use cytomech_datastructures::SlotKey;
use cytomech_mech::{
    Bead, Fiber, FiberEnd, MecableMut, PointExact, PointInterpolated, Solid, SolveInfo,
    SolveOptions, Sphere,
};
use cytomech_numerical::Vec3;
use cytomech_space::{Confinement, Space};

use crate::binder;
use crate::{
    detachment_rate, motor_speed, BeadSet, CoupleSet, FiberGrid, FiberSet, Properties, SimError,
    SingleSet, SolidSet, SphereSet, StericEntry, StericGrid, StericStiffness, TipState,
};
use crate::tip::{catastrophe_rate, growth_speed};

/// How many grid cells the automatic sizing may allocate
const MAX_GRID_CELLS: usize = 100_000;

#[derive(Clone, Copy)]
enum MecKind {
    Fiber,
    Solid,
    Bead,
    Sphere,
}

/// Solver-facing description of one registered object
struct MecMeta {
    kind: MecKind,
    prop: usize,
    key: SlotKey,
    /// per-point radii (solids) or the single radius (beads, spheres)
    radii: Vec<f64>,
}

/// Geometry of a registered fiber, for placing interpolated points
#[derive(Clone, Copy)]
struct FiberInfo {
    mec: usize,
    origin: f64,
    segmentation: f64,
    nb_segments: usize,
}

impl FiberInfo {
    /// Segment index and coefficient for an abscissa, clamped to the ends
    fn locate(&self, ab: f64) -> (usize, f64) {
        let s = (ab - self.origin) / self.segmentation;
        if s <= 0.0 {
            return (0, 0.0);
        }
        if s >= self.nb_segments as f64 {
            return (self.nb_segments - 1, 1.0);
        }
        let seg = (s as usize).min(self.nb_segments - 1);
        (seg, s - seg as f64)
    }
}

pub struct Simul {
    pub props: Properties,
    pub fibers: FiberSet,
    pub solids: SolidSet,
    pub beads: BeadSet,
    pub spheres: SphereSet,
    pub singles: SingleSet,
    pub couples: CoupleSet,
    spaces: Vec<Box<dyn Space>>,
    meca: cytomech_mech::Meca,
    fiber_grid: Option<FiberGrid>,
    steric_grid: Option<StericGrid>,
    rng: SmallRng,
    time: f64,
}

impl Simul {
    /// Builds an empty simulation; the properties are validated first.
    pub fn new(mut props: Properties) -> Result<Simul, SimError> {
        props.complete()?;
        let rng = SmallRng::seed_from_u64(props.simul.seed);
        Ok(Simul {
            props,
            fibers: FiberSet::new(),
            solids: SolidSet::new(),
            beads: BeadSet::new(),
            spheres: SphereSet::new(),
            singles: SingleSet::new(),
            couples: CoupleSet::new(),
            spaces: Vec::new(),
            meca: cytomech_mech::Meca::new(),
            fiber_grid: None,
            steric_grid: None,
            rng,
            time: 0.0,
        })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub(crate) fn set_time(&mut self, t: f64) {
        self.time = t;
    }

    pub fn add_space(&mut self, space: Box<dyn Space>) -> usize {
        self.spaces.push(space);
        self.spaces.len() - 1
    }

    pub fn space(&self, index: usize) -> &dyn Space {
        self.spaces[index].as_ref()
    }

    pub fn nb_spaces(&self) -> usize {
        self.spaces.len()
    }

    pub fn rng_mut(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    // ---------- object creation

    pub fn new_fiber(
        &mut self,
        prop: usize,
        length: f64,
        pos: &Vec3,
        dir: &Vec3,
        reference: FiberEnd,
    ) -> Result<SlotKey, SimError> {
        let fp = &self.props.fibers[prop];
        let fiber = Fiber::new(fp.segmentation, length, pos, dir, reference)?;
        let dynamic = fp.dynamic;
        let key = self.fibers.add(fiber, prop);
        if dynamic {
            self.fibers.get_mut(key).unwrap().tip_state = TipState::Growing;
        }
        Ok(key)
    }

    pub fn new_bead(&mut self, prop: usize, pos: &Vec3, radius: f64) -> SlotKey {
        self.beads.add(Bead::new(pos, radius), prop)
    }

    /// Registers a solid; its reference shape is frozen here
    pub fn new_solid(&mut self, prop: usize, mut solid: Solid) -> SlotKey {
        solid.fix_shape();
        self.solids.add(solid, prop)
    }

    pub fn new_sphere(&mut self, prop: usize, center: &Vec3, radius: f64) -> SlotKey {
        self.spheres.add(Sphere::new(center, radius), prop)
    }

    pub fn new_single(&mut self, prop: usize, pos: &Vec3) -> SlotKey {
        self.singles.add(prop, *pos)
    }

    /// A single anchored on a point of a solid
    pub fn new_wrist(&mut self, prop: usize, solid: SlotKey, point: usize) -> SlotKey {
        let pos = self.solids.get(solid).map(|s| s.solid.pos_point(point)).unwrap_or(Vec3::zero());
        self.singles.add_wrist(prop, solid, point, pos)
    }

    pub fn new_couple(&mut self, prop: usize, pos: &Vec3) -> SlotKey {
        self.couples.add(prop, *pos)
    }

    /// Attaches the hand of a single at a given abscissa, as when placing
    /// an initial configuration.
    pub fn attach_single_at(&mut self, single: SlotKey, fiber: SlotKey, ab: f64) {
        binder::attach_single(&mut self.singles, &mut self.fibers, single, fiber, ab);
    }

    /// Attaches one hand of a couple at a given abscissa
    pub fn attach_couple_at(&mut self, couple: SlotKey, hand: u8, fiber: SlotKey, ab: f64) {
        binder::attach_couple(&mut self.couples, &mut self.fibers, couple, hand, fiber, ab);
    }

    /// Severs a fiber at an abscissa, transferring binders to the distal
    /// piece; returns the new fiber.
    pub fn sever_fiber(&mut self, fiber: SlotKey, ab: f64) -> Option<SlotKey> {
        binder::sever_fiber(&mut self.fibers, &mut self.singles, &mut self.couples, fiber, ab)
    }

    /// Joins `donor` onto the minus end of `receiver`
    pub fn join_fibers(&mut self, receiver: SlotKey, donor: SlotKey) {
        binder::join_fibers(&mut self.fibers, &mut self.singles, &mut self.couples, receiver, donor);
    }

    /// Queues a cut wherever a fiber crosses the plane `n·x + a = 0`;
    /// the cuts are performed with the end-of-step severing flush.
    pub fn cut_along_plane(&mut self, n: &Vec3, a: f64) {
        for key in self.fibers.list.snapshot() {
            let Some(fobj) = self.fibers.get_mut(key) else { continue };
            let cuts = fobj.fiber.plane_intersections(n, a);
            for ab in cuts {
                fobj.fiber.request_cut(ab);
            }
        }
    }

    /// Consistency audit used by the tests: every binder sits in the list
    /// of its state and inside the abscissa range of its fiber.
    pub fn bad(&self) -> bool {
        if self.singles.bad() || self.couples.bad() {
            return true;
        }
        for (_, s) in self.singles.iter() {
            if let Some((f, ab)) = s.hand.attachment() {
                match self.fibers.get(f) {
                    Some(fobj) if fobj.fiber.within(ab) => {}
                    _ => return true,
                }
            }
        }
        for (_, c) in self.couples.iter() {
            for h in 0..2u8 {
                if let Some((f, ab)) = c.hand(h).attachment() {
                    match self.fibers.get(f) {
                        Some(fobj) if fobj.fiber.within(ab) => {}
                        _ => return true,
                    }
                }
            }
        }
        return false;
    }

    // ---------- the step

    /// Advances the simulation by one time step.
    pub fn step(&mut self) -> Result<(), SimError> {
        let dt = self.props.simul.time_step;
        self.time += dt;

        // object lists are reshuffled so that no fixed ordering can bias
        // the stochastic sub-stages
        self.fibers.mix(&mut self.rng);
        self.solids.mix(&mut self.rng);
        self.beads.mix(&mut self.rng);
        self.spheres.mix(&mut self.rng);
        self.singles.mix(&mut self.rng);
        self.couples.mix(&mut self.rng);

        self.step_fibers();
        self.paint_binding_grid()?;
        self.step_couples();
        self.step_singles();
        self.solve()?;
        self.post_step();
        Ok(())
    }

    /// Plus-end assembly dynamics and the resulting binder range checks
    fn step_fibers(&mut self) {
        let dt = self.props.simul.time_step;
        for key in self.fibers.list.snapshot() {
            let Some(fobj) = self.fibers.get(key) else { continue };
            let prop = fobj.prop;
            let fp = &self.props.fibers[prop];
            if !fp.dynamic {
                continue;
            }
            let state = fobj.tip_state;
            match state {
                TipState::Static => {}
                TipState::Growing => {
                    let (fp_growing_speed, fp_growing_force) = (fp.growing_speed, fp.growing_force);
                    let (fp_cat, _fp_min) = (fp.catastrophe_rate, fp.min_length);
                    let fobj = self.fibers.get_mut(key).unwrap();
                    let load = fobj.fiber.projected_force_on_end(FiberEnd::Plus).min(0.0);
                    let v = growth_speed(fp_growing_speed, load, fp_growing_force);
                    if v * dt > 0.0 {
                        fobj.fiber.grow_p(v * dt);
                    }
                    fobj.fresh_growth = v * dt;
                    let cat = catastrophe_rate(fp_cat, v, fp_growing_speed);
                    if self.rng.gen::<f64>() < cat * dt {
                        self.fibers.get_mut(key).unwrap().tip_state = TipState::Shrinking;
                    }
                }
                TipState::Shrinking => {
                    let (fp_shrink, fp_min, fp_rescue) =
                        (fp.shrinking_speed, fp.min_length, fp.rescue_rate);
                    let dlen = fp_shrink * dt;
                    let too_short = {
                        let fobj = self.fibers.get(key).unwrap();
                        fobj.fiber.length() - dlen < fp_min
                    };
                    if too_short {
                        binder::destroy_fiber(
                            &mut self.fibers,
                            &mut self.singles,
                            &mut self.couples,
                            key,
                        );
                        continue;
                    }
                    let fobj = self.fibers.get_mut(key).unwrap();
                    fobj.fiber.cut_p(dlen);
                    fobj.fresh_growth = -dlen;
                    if self.rng.gen::<f64>() < fp_rescue * dt {
                        fobj.tip_state = TipState::Growing;
                    }
                }
            }
            binder::check_binder_ranges(
                &mut self.fibers,
                &mut self.singles,
                &mut self.couples,
                &self.props,
                key,
            );
        }
    }

    /// Creates the binding grid on first use and repaints it
    fn paint_binding_grid(&mut self) -> Result<(), SimError> {
        let range = self.props.binding_range_max();
        if range <= 0.0 {
            return Ok(());
        }
        if self.fiber_grid.is_none() {
            let Some(space) = self.spaces.first() else {
                return Err(SimError::conf("simul", "hands are defined but no space is set"));
            };
            let (min, max) = space.bounding_box();
            let periodic = match space.modulo() {
                Some(m) => [m.is_periodic(0), m.is_periodic(1), m.is_periodic(2)],
                None => [false; 3],
            };
            // the cell must cover twice the maximal binding range
            let edge = (2.0 * range).max(self.props.simul.binding_grid_step);
            self.fiber_grid = Some(FiberGrid::new(
                min,
                max,
                edge,
                periodic,
                space.modulo().copied(),
                MAX_GRID_CELLS,
            ));
        }
        self.fiber_grid.as_mut().unwrap().paint(&self.fibers, range);
        Ok(())
    }

    /// Diffusion, attachment and detachment of singles
    fn step_singles(&mut self) {
        let dt = self.props.simul.time_step;

        // both lists are snapshot before anything moves, so that an object
        // transferred during its own sub-step is handled exactly once
        let free_snapshot = self.singles.free.snapshot();
        let attached_snapshot = self.singles.attached.snapshot();

        // ---------- free singles: diffuse, then attempt to attach
        for key in free_snapshot {
            let Some(s) = self.singles.get(key) else { continue };
            if s.hand.attached() {
                continue;
            }
            let prop = s.prop;
            let sp = &self.props.singles[prop];
            let (hand_idx, diffusion_dt, confine, confine_space) =
                (sp.hand, sp.diffusion_dt, sp.confine, sp.confine_space);
            let anchor = s.anchor;

            {
                let s = self.singles.get_mut(key).unwrap();
                if let Some((solid, pt)) = anchor {
                    if let Some(so) = self.solids.get(solid) {
                        s.pos = so.solid.pos_point(pt);
                    }
                } else if diffusion_dt > 0.0 {
                    let step = Vec3::random_square(&mut self.rng, diffusion_dt);
                    s.pos += step;
                }
            }
            if anchor.is_none() && confine != Confinement::Off {
                let space = self.spaces[confine_space].as_ref();
                let mut pos = self.singles.get(key).unwrap().pos;
                match confine {
                    Confinement::Surface => pos = space.project(&pos),
                    _ => space.bounce(&mut pos),
                }
                self.singles.get_mut(key).unwrap().pos = pos;
            }

            let hp = &self.props.hands[hand_idx];
            if hp.binding_prob > 0.0 {
                if let Some(grid) = &self.fiber_grid {
                    let pos = self.singles.get(key).unwrap().pos;
                    if let Some((fk, ab)) =
                        grid.try_attach(&pos, hp, &self.fibers, &self.props, &mut self.rng)
                    {
                        binder::attach_single(&mut self.singles, &mut self.fibers, key, fk, ab);
                    }
                }
            }
        }

        // ---------- attached singles: walk, then the detachment hazard
        for key in attached_snapshot {
            let Some(s) = self.singles.get(key) else { continue };
            let Some((fk, ab)) = s.hand.attachment() else { continue };
            let sp = &self.props.singles[s.prop];
            let (hand_idx, stiffness) = (sp.hand, sp.stiffness);
            let anchor = s.anchor;
            let base_pos = match anchor {
                Some((solid, pt)) => match self.solids.get(solid) {
                    Some(so) => so.solid.pos_point(pt),
                    None => s.pos,
                },
                None => s.pos,
            };
            let Some(fobj) = self.fibers.get(fk) else { continue };
            let hand_pos = fobj.fiber.pos_at(ab);
            let dir = fobj.fiber.dir_at(ab);
            let (ab_m, ab_p) = (fobj.fiber.abscissa_m(), fobj.fiber.abscissa_p());
            let force = (base_pos - hand_pos) * stiffness;

            let hp = &self.props.hands[hand_idx];
            // motor displacement along the fiber
            let mut new_ab = ab;
            if hp.speed != 0.0 {
                let sign = hp.speed.signum();
                let f_par = sign * force.dot(&dir);
                new_ab += sign * dt * motor_speed(hp.speed.abs(), f_par, hp.stall_force);
            }
            if new_ab < ab_m || new_ab > ab_p {
                if hp.hold_growing_end {
                    new_ab = new_ab.clamp(ab_m, ab_p);
                } else {
                    binder::detach_single(&mut self.singles, &mut self.fibers, key);
                    continue;
                }
            }
            if new_ab != ab {
                self.singles.get_mut(key).unwrap().hand.move_to(new_ab);
            }

            let rate_dt = detachment_rate(hp.unbinding_rate, force.length(), hp.unbinding_force) * dt;
            if rate_dt > 0.0 && self.rng.gen::<f64>() < rate_dt {
                binder::detach_single(&mut self.singles, &mut self.fibers, key);
            }
        }
    }

    /// Diffusion, attachment, walking and detachment of couples
    fn step_couples(&mut self) {
        let dt = self.props.simul.time_step;

        // snapshots of all four lists, taken before any transfer happens
        let free_snapshot = self.couples.free.snapshot();
        let attached1_snapshot = self.couples.attached1.snapshot();
        let attached2_snapshot = self.couples.attached2.snapshot();
        let bridging_snapshot = self.couples.bridging.snapshot();

        // ---------- both hands free: diffuse and try one hand
        for key in free_snapshot {
            let Some(c) = self.couples.get(key) else { continue };
            if c.hand1.attached() || c.hand2.attached() {
                continue;
            }
            let cp = &self.props.couples[c.prop];
            let (h1, h2, diffusion_dt, confine, confine_space) =
                (cp.hand1, cp.hand2, cp.diffusion_dt, cp.confine, cp.confine_space);

            {
                let c = self.couples.get_mut(key).unwrap();
                if diffusion_dt > 0.0 {
                    let step = Vec3::random_square(&mut self.rng, diffusion_dt);
                    c.pos += step;
                }
            }
            if confine != Confinement::Off {
                let space = self.spaces[confine_space].as_ref();
                let mut pos = self.couples.get(key).unwrap().pos;
                match confine {
                    Confinement::Surface => pos = space.project(&pos),
                    _ => space.bounce(&mut pos),
                }
                self.couples.get_mut(key).unwrap().pos = pos;
            }

            // a random hand gets the first chance, the other follows only
            // if the first one failed
            let order: [(u8, usize); 2] =
                if self.rng.gen::<bool>() { [(0, h1), (1, h2)] } else { [(1, h2), (0, h1)] };
            for (hand, hidx) in order {
                let hp = &self.props.hands[hidx];
                if hp.binding_prob <= 0.0 {
                    continue;
                }
                let Some(grid) = &self.fiber_grid else { break };
                let pos = self.couples.get(key).unwrap().pos;
                if let Some((fk, ab)) =
                    grid.try_attach(&pos, hp, &self.fibers, &self.props, &mut self.rng)
                {
                    binder::attach_couple(&mut self.couples, &mut self.fibers, key, hand, fk, ab);
                    break;
                }
            }
        }

        // ---------- one hand attached: the complex tracks it while the
        // other hand searches from there
        for (snapshot, hand_att) in [(attached1_snapshot, 0u8), (attached2_snapshot, 1)] {
            for key in snapshot {
                let Some(c) = self.couples.get(key) else { continue };
                // a transfer may have happened earlier in this step
                if c.bridging() || !c.hand(hand_att).attached() {
                    continue;
                }
                let cp = &self.props.couples[c.prop];
                let (h_idx, other_idx) = if hand_att == 0 {
                    (cp.hand1, cp.hand2)
                } else {
                    (cp.hand2, cp.hand1)
                };
                let (fk, ab) = c.hand(hand_att).attachment().unwrap();
                let Some(fobj) = self.fibers.get(fk) else { continue };
                let hand_pos = fobj.fiber.pos_at(ab);
                let (ab_m, ab_p) = (fobj.fiber.abscissa_m(), fobj.fiber.abscissa_p());
                self.couples.get_mut(key).unwrap().pos = hand_pos;

                // unloaded walk of the attached hand
                let hp = &self.props.hands[h_idx];
                if hp.speed != 0.0 {
                    let mut new_ab = ab + hp.speed * dt;
                    if new_ab < ab_m || new_ab > ab_p {
                        if hp.hold_growing_end {
                            new_ab = new_ab.clamp(ab_m, ab_p);
                        } else {
                            binder::detach_couple(&mut self.couples, &mut self.fibers, key, hand_att);
                            continue;
                        }
                    }
                    self.couples.get_mut(key).unwrap().hand_mut(hand_att).move_to(new_ab);
                }

                // detachment of the attached hand, at the unloaded rate
                let hp = &self.props.hands[h_idx];
                if hp.unbinding_rate_dt > 0.0 && self.rng.gen::<f64>() < hp.unbinding_rate_dt {
                    binder::detach_couple(&mut self.couples, &mut self.fibers, key, hand_att);
                    continue;
                }

                // the free hand attempts to bind
                let op = &self.props.hands[other_idx];
                if op.binding_prob > 0.0 {
                    if let Some(grid) = &self.fiber_grid {
                        let pos = self.couples.get(key).unwrap().pos;
                        if let Some((fk2, ab2)) =
                            grid.try_attach(&pos, op, &self.fibers, &self.props, &mut self.rng)
                        {
                            binder::attach_couple(
                                &mut self.couples,
                                &mut self.fibers,
                                key,
                                1 - hand_att,
                                fk2,
                                ab2,
                            );
                        }
                    }
                }
            }
        }

        // ---------- bridging couples: loaded walking and detachment
        for key in bridging_snapshot {
            let Some(c) = self.couples.get(key) else { continue };
            if !c.bridging() {
                continue;
            }
            let cp = &self.props.couples[c.prop];
            let (h_indices, stiffness, rest) = ([cp.hand1, cp.hand2], cp.stiffness, cp.length);

            let mut positions = [Vec3::zero(); 2];
            let mut ranges = [(0.0, 0.0); 2];
            let mut dirs = [Vec3::zero(); 2];
            let mut abs = [0.0; 2];
            let mut keys = [None; 2];
            for h in 0..2usize {
                let (fk, ab) = c.hand(h as u8).attachment().unwrap();
                let Some(fobj) = self.fibers.get(fk) else { continue };
                positions[h] = fobj.fiber.pos_at(ab);
                dirs[h] = fobj.fiber.dir_at(ab);
                ranges[h] = (fobj.fiber.abscissa_m(), fobj.fiber.abscissa_p());
                abs[h] = ab;
                keys[h] = Some(fk);
            }
            if keys[0].is_none() || keys[1].is_none() {
                continue;
            }
            let axis = positions[1] - positions[0];
            let d = axis.length();
            // force exerted on hand 1; the opposite acts on hand 2
            let force = if d > 1e-12 && rest > 0.0 {
                axis * (stiffness * (d - rest) / d)
            } else {
                axis * stiffness
            };
            self.couples.get_mut(key).unwrap().pos = (positions[0] + positions[1]) * 0.5;

            let mut detached = false;
            for h in 0..2usize {
                let hp = &self.props.hands[h_indices[h]];
                let f_on_hand = if h == 0 { force } else { -force };
                let mut new_ab = abs[h];
                if hp.speed != 0.0 {
                    let sign = hp.speed.signum();
                    let f_par = sign * f_on_hand.dot(&dirs[h]);
                    new_ab += sign * dt * motor_speed(hp.speed.abs(), f_par, hp.stall_force);
                }
                if new_ab < ranges[h].0 || new_ab > ranges[h].1 {
                    if hp.hold_growing_end {
                        new_ab = new_ab.clamp(ranges[h].0, ranges[h].1);
                    } else {
                        binder::detach_couple(&mut self.couples, &mut self.fibers, key, h as u8);
                        detached = true;
                        break;
                    }
                }
                if new_ab != abs[h] {
                    self.couples.get_mut(key).unwrap().hand_mut(h as u8).move_to(new_ab);
                }
            }
            if detached {
                continue;
            }
            for h in 0..2usize {
                let hp = &self.props.hands[h_indices[h]];
                let rate_dt =
                    detachment_rate(hp.unbinding_rate, force.length(), hp.unbinding_force) * dt;
                if rate_dt > 0.0 && self.rng.gen::<f64>() < rate_dt {
                    binder::detach_couple(&mut self.couples, &mut self.fibers, key, h as u8);
                    break;
                }
            }
        }
    }

    /// Assembles and solves the implicit step for all mechanical objects.
    pub fn solve(&mut self) -> Result<SolveInfo, SimError> {
        let simul_visc = self.props.simul.viscosity;

        // ---------- per-object preparation
        for (_, fobj) in self.fibers.iter_mut() {
            let mech = self.props.fibers[fobj.prop].mechanics(&self.props.simul);
            fobj.fiber.prepare(&mech)?;
        }
        for (_, so) in self.solids.iter_mut() {
            let visc = self.props.solids[so.prop].viscosity;
            so.solid.prepare(if visc > 0.0 { visc } else { simul_visc })?;
        }
        for (_, bo) in self.beads.iter_mut() {
            bo.bead.prepare(simul_visc);
        }
        for (_, so) in self.spheres.iter_mut() {
            so.sphere.prepare(simul_visc);
        }

        // ---------- registration: fibers, solids, beads, spheres
        let mut objs: Vec<MecableMut> = Vec::new();
        let mut meta: Vec<MecMeta> = Vec::new();
        let mut fiber_info: HashMap<SlotKey, FiberInfo> = HashMap::new();
        let mut solid_mec: HashMap<SlotKey, usize> = HashMap::new();
        let mut max_seg_len: f64 = 0.0;

        for (key, fobj) in self.fibers.iter_mut() {
            let mec = objs.len();
            fiber_info.insert(
                key,
                FiberInfo {
                    mec,
                    origin: fobj.fiber.abscissa_m(),
                    segmentation: fobj.fiber.segmentation(),
                    nb_segments: fobj.fiber.nb_segments(),
                },
            );
            max_seg_len = max_seg_len.max(fobj.fiber.segmentation());
            meta.push(MecMeta { kind: MecKind::Fiber, prop: fobj.prop, key, radii: Vec::new() });
            objs.push(MecableMut::Fiber(&mut fobj.fiber));
        }
        for (key, so) in self.solids.iter_mut() {
            solid_mec.insert(key, objs.len());
            let radii = (0..so.solid.nb_points()).map(|p| so.solid.radius(p)).collect();
            meta.push(MecMeta { kind: MecKind::Solid, prop: so.prop, key, radii });
            objs.push(MecableMut::Solid(&mut so.solid));
        }
        for (key, bo) in self.beads.iter_mut() {
            meta.push(MecMeta { kind: MecKind::Bead, prop: bo.prop, key, radii: vec![bo.bead.radius()] });
            objs.push(MecableMut::Bead(&mut bo.bead));
        }
        for (key, so) in self.spheres.iter_mut() {
            meta.push(MecMeta {
                kind: MecKind::Sphere,
                prop: so.prop,
                key,
                radii: vec![so.sphere.radius()],
            });
            objs.push(MecableMut::Sphere(&mut so.sphere));
        }

        let meca = &mut self.meca;
        meca.register(&objs);

        // ---------- confinement springs
        for (i, m) in meta.iter().enumerate() {
            let (confine, stiffness, space_idx, radius) = match m.kind {
                MecKind::Fiber => {
                    let p = &self.props.fibers[m.prop];
                    (p.confine, p.confine_stiffness, p.confine_space, 0.0)
                }
                MecKind::Solid => {
                    let p = &self.props.solids[m.prop];
                    (p.confine, p.confine_stiffness, p.confine_space, 0.0)
                }
                MecKind::Bead => {
                    let p = &self.props.beads[m.prop];
                    (p.confine, p.confine_stiffness, p.confine_space, m.radii[0])
                }
                MecKind::Sphere => {
                    let p = &self.props.spheres[m.prop];
                    (p.confine, p.confine_stiffness, p.confine_space, m.radii[0])
                }
            };
            if confine == Confinement::Off {
                continue;
            }
            let space = self.spaces[space_idx].as_ref();
            let nb_points = objs[i].nb_points();
            let confined_points: Vec<usize> = match (confine, m.kind) {
                (Confinement::PlusEnd, MecKind::Fiber) => vec![nb_points - 1],
                (Confinement::MinusEnd, MecKind::Fiber) => vec![0],
                // only the center of a sphere is confined
                (_, MecKind::Sphere) => vec![0],
                _ => (0..nb_points).collect(),
            };
            for p in confined_points {
                let pe = PointExact { mec: i, point: p };
                let pos = meca.pos_exact(&pe);
                let engaged = match confine {
                    Confinement::Inside => space.outside(&pos),
                    Confinement::AllInside => !space.all_inside(&pos, radius),
                    Confinement::Outside => space.inside(&pos),
                    Confinement::Surface | Confinement::PlusEnd | Confinement::MinusEnd => true,
                    Confinement::Off => false,
                };
                if engaged {
                    let mut target = space.project(&pos);
                    if confine == Confinement::AllInside && radius > 0.0 {
                        // pull back to the surface eroded by the radius
                        let inward = if space.inside(&pos) {
                            (pos - target).normalized()
                        } else {
                            (target - pos).normalized()
                        };
                        target += inward * radius;
                    }
                    meca.add_clamp(&pe.into(), &target, stiffness);
                }
            }
        }

        // ---------- links held by attached singles
        for key in self.singles.attached.iter() {
            let Some(s) = self.singles.get(key) else { continue };
            let Some((fk, ab)) = s.hand.attachment() else { continue };
            let Some(info) = fiber_info.get(&fk) else { continue };
            let (seg, coef) = info.locate(ab);
            let hand_pt = PointInterpolated { mec: info.mec, point: seg, coef };
            let sp = &self.props.singles[s.prop];
            if sp.stiffness <= 0.0 {
                continue;
            }
            match s.anchor {
                Some((solid, pt)) => {
                    if let Some(mec2) = solid_mec.get(&solid) {
                        let base = PointExact { mec: *mec2, point: pt };
                        meca.add_link(&hand_pt, &base.into(), sp.stiffness);
                    }
                }
                None => {
                    meca.add_clamp(&hand_pt, &s.pos, sp.stiffness);
                }
            }
        }

        // ---------- links of bridging couples
        for key in self.couples.bridging.iter() {
            let Some(c) = self.couples.get(key) else { continue };
            let cp = &self.props.couples[c.prop];
            if cp.stiffness <= 0.0 {
                continue;
            }
            let (f1, a1) = c.hand1.attachment().unwrap();
            let (f2, a2) = c.hand2.attachment().unwrap();
            let (Some(i1), Some(i2)) = (fiber_info.get(&f1), fiber_info.get(&f2)) else {
                continue;
            };
            let (s1, c1) = i1.locate(a1);
            let (s2, c2) = i2.locate(a2);
            let p1 = PointInterpolated { mec: i1.mec, point: s1, coef: c1 };
            let p2 = PointInterpolated { mec: i2.mec, point: s2, coef: c2 };
            if cp.length > 0.0 {
                meca.add_long_link(&p1, &p2, cp.length, cp.stiffness);
            } else {
                meca.add_link(&p1, &p2, cp.stiffness);
            }
        }

        // ---------- steric interactions
        if self.props.simul.steric {
            let mut max_reach: f64 = 0.0;
            for m in meta.iter() {
                match m.kind {
                    MecKind::Fiber => {
                        let p = &self.props.fibers[m.prop];
                        if p.steric {
                            max_reach = max_reach.max(p.steric_radius + p.steric_range);
                        }
                    }
                    _ => {
                        let p = match m.kind {
                            MecKind::Solid => &self.props.solids[m.prop],
                            MecKind::Bead => &self.props.beads[m.prop],
                            MecKind::Sphere => &self.props.spheres[m.prop],
                            MecKind::Fiber => unreachable!(),
                        };
                        if p.steric {
                            let r = m.radii.iter().cloned().fold(0.0, f64::max);
                            max_reach = max_reach.max(r + p.steric_range);
                        }
                    }
                }
            }
            if max_reach > 0.0 {
                let min_edge = (max_seg_len + 2.0 * max_reach).max(self.props.simul.steric_max_range);
                if self.steric_grid.as_ref().map_or(true, |g| g.edge() < min_edge) {
                    let Some(space) = self.spaces.first() else {
                        return Err(SimError::conf("simul", "steric is enabled but no space is set"));
                    };
                    let (min, max) = space.bounding_box();
                    let periodic = match space.modulo() {
                        Some(mo) => [mo.is_periodic(0), mo.is_periodic(1), mo.is_periodic(2)],
                        None => [false; 3],
                    };
                    self.steric_grid =
                        Some(StericGrid::new(min, max, min_edge, periodic, MAX_GRID_CELLS));
                }
                let grid = self.steric_grid.as_mut().unwrap();
                grid.clear();
                for (i, m) in meta.iter().enumerate() {
                    match m.kind {
                        MecKind::Fiber => {
                            let p = &self.props.fibers[m.prop];
                            if !p.steric {
                                continue;
                            }
                            let info = fiber_info.get(&m.key).unwrap();
                            for s in 0..info.nb_segments {
                                let a = meca.pos_exact(&PointExact { mec: i, point: s });
                                let b = meca.pos_exact(&PointExact { mec: i, point: s + 1 });
                                grid.add(StericEntry::Segment {
                                    mec: i,
                                    point: s,
                                    a,
                                    b,
                                    radius: p.steric_radius,
                                    reach: p.steric_radius + p.steric_range,
                                });
                            }
                        }
                        MecKind::Solid => {
                            let p = &self.props.solids[m.prop];
                            if !p.steric {
                                continue;
                            }
                            for (pt, r) in m.radii.iter().enumerate() {
                                if *r > 0.0 {
                                    let pos = meca.pos_exact(&PointExact { mec: i, point: pt });
                                    grid.add(StericEntry::Point {
                                        mec: i,
                                        point: pt,
                                        pos,
                                        radius: *r,
                                        reach: *r + p.steric_range,
                                    });
                                }
                            }
                        }
                        MecKind::Bead | MecKind::Sphere => {
                            let p = match m.kind {
                                MecKind::Bead => &self.props.beads[m.prop],
                                _ => &self.props.spheres[m.prop],
                            };
                            if !p.steric {
                                continue;
                            }
                            let pos = meca.pos_exact(&PointExact { mec: i, point: 0 });
                            grid.add(StericEntry::Point {
                                mec: i,
                                point: 0,
                                pos,
                                radius: m.radii[0],
                                reach: m.radii[0] + p.steric_range,
                            });
                        }
                    }
                }
                let stiff = StericStiffness {
                    push: self.props.simul.steric_stiffness_push,
                    pull: self.props.simul.steric_stiffness_pull,
                };
                grid.set_interactions(meca, &stiff);
            }
        }

        // ---------- the implicit solve
        let opts = SolveOptions {
            time_step: self.props.simul.time_step,
            kt: self.props.simul.kt,
            tolerance: self.props.simul.tolerance,
            max_iterations: self.props.simul.max_iterations,
            precondition: self.props.simul.precondition,
        };
        let info = meca.solve(&mut objs, &opts, &mut self.rng)?;
        Ok(info)
    }

    /// Periodic folding and the severing flush
    fn post_step(&mut self) {
        if let Some(modulo) = self.spaces.first().and_then(|s| s.modulo().copied()) {
            for (_, fobj) in self.fibers.iter_mut() {
                fobj.fiber.points_mut().fold(&modulo);
            }
            for (_, so) in self.solids.iter_mut() {
                so.solid.points_mut().fold(&modulo);
            }
            for (_, bo) in self.beads.iter_mut() {
                bo.bead.points_mut().fold(&modulo);
            }
            for (_, so) in self.spheres.iter_mut() {
                so.sphere.points_mut().fold(&modulo);
            }
            for key in self.singles.free.snapshot() {
                if let Some(s) = self.singles.get_mut(key) {
                    modulo.fold(&mut s.pos);
                }
            }
            for key in self.couples.free.snapshot() {
                if let Some(c) = self.couples.get_mut(key) {
                    modulo.fold(&mut c.pos);
                }
            }
        }

        // the kink policy queues its cuts with the user-requested ones
        for key in self.fibers.list.snapshot() {
            let Some(fobj) = self.fibers.get(key) else { continue };
            if self.props.fibers[fobj.prop].sever_kinked {
                let kinks = fobj.fiber.kink_abscissae();
                let fobj = self.fibers.get_mut(key).unwrap();
                for ab in kinks {
                    fobj.fiber.request_cut(ab);
                }
            }
        }
        // flush all pending cuts, each fiber in decreasing abscissa order
        for key in self.fibers.list.snapshot() {
            let Some(fobj) = self.fibers.get_mut(key) else { continue };
            if !fobj.fiber.has_pending_cuts() {
                continue;
            }
            let cuts = fobj.fiber.take_pending_cuts();
            for ab in cuts {
                binder::sever_fiber(&mut self.fibers, &mut self.singles, &mut self.couples, key, ab);
            }
        }
    }
}
