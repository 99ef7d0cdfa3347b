use cytomech_mech::FiberEnd;
use cytomech_numerical::Vec3;
use cytomech_space::{Confinement, SphereSpace, StripSpace};
use cytomech_sim::{
    CoupleProp, FiberProp, HandProp, Properties, SimulProp, Simul, SingleProp,
};

fn quiet_simul_prop() -> SimulProp {
    SimulProp { kt: 0.0, time_step: 0.001, tolerance: 1e-9, seed: 11, ..Default::default() }
}

#[test]
fn empty_simulation_steps_successfully() {
    let props = Properties::new(quiet_simul_prop());
    let mut simul = Simul::new(props).unwrap();
    for _ in 0..10 {
        simul.step().unwrap();
    }
    assert!((simul.time() - 0.01).abs() < 1e-12);
}

/// Two antiparallel fibers connected by one bridging couple: without
/// noise, the link contracts until the two attachment points coincide and
/// the residual force on the couple vanishes.
#[test]
fn bridging_couple_pulls_fibers_together() {
    let mut props = Properties::new(quiet_simul_prop());
    let fp = props.add_fiber(FiberProp::new("fiber"));
    let h = props.add_hand(HandProp::new("binder"));
    let mut cp = CoupleProp::new("crosslinker", h, h);
    cp.stiffness = 100.0;
    let cp = props.add_couple(cp);

    let mut simul = Simul::new(props).unwrap();
    let f1 = simul
        .new_fiber(fp, 10.0, &Vec3::new(-5.0, 0.5, 0.0), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Minus)
        .unwrap();
    let f2 = simul
        .new_fiber(fp, 10.0, &Vec3::new(5.0, -0.5, 0.0), &Vec3::new(-1.0, 0.0, 0.0), FiberEnd::Minus)
        .unwrap();
    let c = simul.new_couple(cp, &Vec3::zero());
    simul.attach_couple_at(c, 0, f1, 5.0);
    simul.attach_couple_at(c, 1, f2, 5.0);

    for _ in 0..3000 {
        simul.step().unwrap();
    }
    assert!(!simul.bad());

    let cobj = simul.couples.get(c).unwrap();
    assert!(cobj.bridging(), "the couple must stay bridging without a detachment hazard");
    let p1 = simul.fibers.get(f1).unwrap().fiber.pos_at(5.0);
    let p2 = simul.fibers.get(f2).unwrap().fiber.pos_at(5.0);
    let gap = p1.distance(&p2);
    assert!(gap < 1e-4, "attachment points should coincide, gap = {}", gap);
    // residual force on the couple
    assert!(100.0 * gap < 1e-2);
    // equal drags: the fibers met halfway
    assert!(p1.y.abs() < 1e-3);
}

/// Binding statistics on the grid: only hands within range of a fiber can
/// attach, and they do so at `binding_rate · dt` per step.
#[test]
fn binding_grid_rates_and_eligibility() {
    let mut props = Properties::new(SimulProp {
        kt: 0.0,
        time_step: 0.01,
        tolerance: 1e-6,
        seed: 5,
        ..Default::default()
    });
    let fp = props.add_fiber(FiberProp::new("fiber"));
    let mut h = HandProp::new("binder");
    h.binding_rate = 1.0;
    h.binding_range = 0.5;
    let h = props.add_hand(h);
    let sp = props.add_single(SingleProp::new("grafted", h));

    let mut simul = Simul::new(props).unwrap();
    simul.add_space(Box::new(SphereSpace::new(8.0)));
    simul
        .new_fiber(fp, 10.0, &Vec3::new(-5.0, 0.0, 0.0), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Minus)
        .unwrap();

    // half the singles within range of the fiber, half far away
    let nb = 2000;
    let mut near = Vec::new();
    let mut far = Vec::new();
    for i in 0..nb {
        let x = -4.5 + 9.0 * (i as f64) / (nb as f64);
        near.push(simul.new_single(sp, &Vec3::new(x, 0.3, 0.0)));
        far.push(simul.new_single(sp, &Vec3::new(x, 3.0, 0.0)));
    }
    simul.step().unwrap();
    assert!(!simul.bad());

    let attached_far = far
        .iter()
        .filter(|k| simul.singles.get(**k).map_or(false, |s| s.hand.attached()))
        .count();
    assert_eq!(attached_far, 0, "hands out of range must never attach");

    let attached_near = near
        .iter()
        .filter(|k| simul.singles.get(**k).map_or(false, |s| s.hand.attached()))
        .count();
    // expectation: nb * rate * dt = 20; allow a generous statistical band
    assert!(
        (5..=45).contains(&attached_near),
        "{} attachments for an expectation of 20",
        attached_near
    );
    // every attached hand is within its binding range of the fiber
    for k in near.iter() {
        let s = simul.singles.get(*k).unwrap();
        if let Some((fk, ab)) = s.hand.attachment() {
            let pos = simul.fibers.get(fk).unwrap().fiber.pos_at(ab);
            assert!(pos.distance(&s.pos) <= 0.5 + 1e-9);
        }
    }
}

/// Severing a straight fiber of length 10 at abscissa 4: pieces of length
/// 4 and 6, and a binder at abscissa 7 follows the distal piece with its
/// abscissa unchanged.
#[test]
fn severing_preserves_binder_abscissae() {
    let mut props = Properties::new(quiet_simul_prop());
    let fp = props.add_fiber(FiberProp::new("fiber"));
    let h = props.add_hand(HandProp::new("binder"));
    let sp = props.add_single(SingleProp::new("grafted", h));

    let mut simul = Simul::new(props).unwrap();
    let f = simul
        .new_fiber(fp, 10.0, &Vec3::zero(), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Minus)
        .unwrap();
    let s_prox = simul.new_single(sp, &Vec3::new(2.0, 0.0, 0.0));
    let s_dist = simul.new_single(sp, &Vec3::new(7.0, 0.0, 0.0));
    simul.attach_single_at(s_prox, f, 2.0);
    simul.attach_single_at(s_dist, f, 7.0);

    let distal = simul.sever_fiber(f, 4.0).expect("cut inside the fiber");
    assert!(!simul.bad());

    let prox = simul.fibers.get(f).unwrap();
    let dist = simul.fibers.get(distal).unwrap();
    assert!((prox.fiber.length() - 4.0).abs() < 1e-9);
    assert!((dist.fiber.length() - 6.0).abs() < 1e-9);
    assert!((dist.fiber.abscissa_m() - 4.0).abs() < 1e-9);

    let sp_obj = simul.singles.get(s_prox).unwrap();
    assert_eq!(sp_obj.hand.fiber(), Some(f));
    assert!((sp_obj.hand.abscissa() - 2.0).abs() < 1e-9);
    let sd_obj = simul.singles.get(s_dist).unwrap();
    assert_eq!(sd_obj.hand.fiber(), Some(distal));
    assert!((sd_obj.hand.abscissa() - 7.0).abs() < 1e-9);
    // the binder sits at the same material point as before the cut
    let pos = dist.fiber.pos_at(7.0);
    assert!(pos.distance(&Vec3::new(7.0, 0.0, 0.0)) < 1e-9);

    // joining the pieces back restores the original abscissa range
    simul.join_fibers(distal, f);
    assert!(simul.fibers.get(f).is_none());
    let merged = simul.fibers.get(distal).unwrap();
    assert!((merged.fiber.length() - 10.0).abs() < 1e-6);
    assert!((merged.fiber.abscissa_m() - 0.0).abs() < 1e-6);
    let sp_obj = simul.singles.get(s_prox).unwrap();
    assert_eq!(sp_obj.hand.fiber(), Some(distal));
    assert!((sp_obj.hand.abscissa() - 2.0).abs() < 1e-6);
    assert!(!simul.bad());
}

/// A fiber crossing the boundary of a periodic strip is folded back into
/// the reference cell without deforming, and its binders follow.
#[test]
fn periodic_strip_folds_objects_rigidly() {
    let mut props = Properties::new(quiet_simul_prop());
    let fp = props.add_fiber(FiberProp::new("fiber"));
    let h = props.add_hand(HandProp::new("binder"));
    let sp = props.add_single(SingleProp::new("grafted", h));

    let mut simul = Simul::new(props).unwrap();
    simul.add_space(Box::new(StripSpace::new(10.0, 4.0, 4.0)));
    // centered at x = 5.3: the center itself lies beyond the boundary
    let f = simul
        .new_fiber(fp, 4.0, &Vec3::new(5.3, 0.0, 0.0), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Center)
        .unwrap();
    let s = simul.new_single(sp, &Vec3::new(5.8, 0.0, 0.0));
    // bound near the plus end, on the protruding half
    simul.attach_single_at(s, f, 3.5);
    let before = simul.fibers.get(f).unwrap().fiber.pos_at(3.5).x
        - simul.fibers.get(f).unwrap().fiber.pos_at(2.0).x;

    simul.step().unwrap();

    let fobj = simul.fibers.get(f).unwrap();
    let center = fobj.fiber.pos_end(FiberEnd::Center);
    assert!((-5.0..5.0).contains(&center.x), "fiber center must be in the reference cell");
    // the shape is intact: exact segment lengths
    for seg in 0..fobj.fiber.nb_segments() {
        let d = fobj.fiber.points().diff_points(seg).length();
        assert!((d - fobj.fiber.segmentation()).abs() < 1e-9);
    }
    // the binder is still on the same side of the fiber
    let after = fobj.fiber.pos_at(3.5).x - fobj.fiber.pos_at(2.0).x;
    assert!(before > 0.0 && after > 0.0);
    assert!(!simul.bad());
}

/// Dynamic instability: a growing fiber lengthens, a catastrophic one
/// shrinks and is eventually removed together with its attachments.
#[test]
fn dynamic_tips_grow_shrink_and_delete() {
    let mut props = Properties::new(quiet_simul_prop());
    let mut fprop = FiberProp::new("dynamic");
    fprop.dynamic = true;
    fprop.growing_speed = 1.0;
    fprop.growing_force = 1.67;
    fprop.catastrophe_rate = 0.0;
    fprop.shrinking_speed = 10.0;
    fprop.min_length = 0.5;
    let fp = props.add_fiber(fprop);
    let h = props.add_hand(HandProp::new("binder"));
    let sp = props.add_single(SingleProp::new("grafted", h));

    let mut simul = Simul::new(props).unwrap();
    let f = simul
        .new_fiber(fp, 2.0, &Vec3::zero(), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Minus)
        .unwrap();
    let s = simul.new_single(sp, &Vec3::new(1.0, 0.0, 0.0));
    simul.attach_single_at(s, f, 1.0);

    for _ in 0..100 {
        simul.step().unwrap();
    }
    let len = simul.fibers.get(f).unwrap().fiber.length();
    assert!((len - 2.1).abs() < 1e-6, "100 steps at speed 1: +0.1, got {}", len);

    // force a catastrophe and let the fiber disassemble completely
    simul.fibers.get_mut(f).unwrap().tip_state = cytomech_sim::TipState::Shrinking;
    for _ in 0..300 {
        simul.step().unwrap();
    }
    assert!(simul.fibers.get(f).is_none(), "the fiber should have been deleted");
    assert!(!simul.singles.get(s).unwrap().hand.attached());
    assert!(!simul.bad());
}

/// A bead confined with `all_inside` relaxes until it fits entirely
/// inside the space.
#[test]
fn all_inside_confinement_contains_the_bead_radius() {
    let mut props = Properties::new(quiet_simul_prop());
    let mut bp = cytomech_sim::SolidProp::new("bead");
    bp.confine = Confinement::AllInside;
    bp.confine_stiffness = 100.0;
    let bp = props.add_bead(bp);

    let mut simul = Simul::new(props).unwrap();
    simul.add_space(Box::new(SphereSpace::new(5.0)));
    let b = simul.new_bead(bp, &Vec3::new(4.9, 0.0, 0.0), 1.0);

    for _ in 0..2000 {
        simul.step().unwrap();
    }
    let r = simul.beads.get(b).unwrap().bead.position().length();
    assert!(r < 4.0 + 1e-3, "bead at {} does not fit inside", r);
}
