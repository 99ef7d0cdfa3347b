use cytomech_mech::{FiberEnd, Solid};
use cytomech_numerical::Vec3;
use cytomech_sim::{
    CoupleProp, FiberProp, HandProp, Properties, SimulProp, Simul, SingleProp,
};

fn build_props() -> Properties {
    let mut props = Properties::new(SimulProp {
        kt: 0.0042,
        time_step: 0.001,
        seed: 71,
        ..Default::default()
    });
    props.add_fiber(FiberProp::new("fiber"));
    let h = props.add_hand(HandProp::new("binder"));
    let mut sp = SingleProp::new("grafted", h);
    sp.stiffness = 10.0;
    props.add_single(sp);
    let mut cp = CoupleProp::new("crosslinker", h, h);
    cp.stiffness = 20.0;
    props.add_couple(cp);
    props
}

fn build_simul() -> Simul {
    let mut simul = Simul::new(build_props()).unwrap();
    let f1 = simul
        .new_fiber(0, 7.0, &Vec3::new(-3.0, 0.2, 0.0), &Vec3::new(1.0, 0.0, 0.0), FiberEnd::Minus)
        .unwrap();
    let f2 = simul
        .new_fiber(0, 5.0, &Vec3::new(2.0, -1.0, 0.5), &Vec3::new(0.0, 1.0, 0.0), FiberEnd::Minus)
        .unwrap();
    simul.new_bead(0, &Vec3::new(1.0, 2.0, -1.0), 0.8);
    let mut solid = Solid::new();
    solid.add_sphere(&Vec3::new(-2.0, -2.0, 0.0), 0.5);
    solid.add_sphere(&Vec3::new(-1.0, -2.0, 0.0), 0.5);
    solid.add_sphere(&Vec3::new(-2.0, -1.0, 0.0), 0.0);
    let solid_key = simul.new_solid(0, solid);
    simul.new_sphere(0, &Vec3::new(3.0, 3.0, 3.0), 1.2);

    let s1 = simul.new_single(0, &Vec3::new(0.0, 0.5, 0.0));
    simul.attach_single_at(s1, f1, 2.5);
    simul.new_single(0, &Vec3::new(1.0, 1.0, 1.0));
    let w = simul.new_wrist(0, solid_key, 2);
    let _ = w;
    let c = simul.new_couple(0, &Vec3::zero());
    simul.attach_couple_at(c, 0, f1, 4.0);
    simul.attach_couple_at(c, 1, f2, 1.0);
    simul
}

#[test]
fn frame_round_trip_restores_the_state() {
    let original = build_simul();

    let mut buf: Vec<u8> = Vec::new();
    original.write_frame(&mut buf).unwrap();

    let mut restored = Simul::new(build_props()).unwrap();
    restored.read_frame(&mut std::io::Cursor::new(&buf)).unwrap();

    assert_eq!(restored.fibers.len(), original.fibers.len());
    assert_eq!(restored.beads.len(), 1);
    assert_eq!(restored.solids.len(), 1);
    assert_eq!(restored.spheres.len(), 1);
    assert_eq!(restored.singles.len(), original.singles.len());
    assert_eq!(restored.couples.len(), original.couples.len());
    assert!(!restored.bad());

    // fibers come back bit-identical, serial by serial
    for (_, fo) in original.fibers.iter() {
        let rk = restored.fibers.find_serial(fo.serial).expect("serial must resolve");
        let rf = &restored.fibers.get(rk).unwrap().fiber;
        assert_eq!(rf.nb_points(), fo.fiber.nb_points());
        assert_eq!(rf.abscissa_m(), fo.fiber.abscissa_m());
        assert_eq!(rf.segmentation(), fo.fiber.segmentation());
        for p in 0..rf.nb_points() {
            assert_eq!(rf.pos_point(p), fo.fiber.pos_point(p));
        }
    }

    // attachments are re-established with the same abscissae
    for (_, s) in original.singles.iter() {
        let rk = restored.singles.find_serial(s.serial).unwrap();
        let rs = restored.singles.get(rk).unwrap();
        assert_eq!(rs.hand.attached(), s.hand.attached());
        if s.hand.attached() {
            assert_eq!(rs.hand.abscissa(), s.hand.abscissa());
        }
        assert_eq!(rs.anchor.is_some(), s.anchor.is_some());
    }
    for (_, c) in original.couples.iter() {
        let rk = restored.couples.find_serial(c.serial).unwrap();
        let rc = restored.couples.get(rk).unwrap();
        assert_eq!(rc.bridging(), c.bridging());
    }
}

/// A frame written at step zero reproduces the original trajectory: the
/// restored world carries the same state and the same generator seed, so
/// both runs make identical draws.
#[test]
fn restored_state_reproduces_the_trajectory() {
    let mut a = build_simul();
    let mut buf: Vec<u8> = Vec::new();
    a.write_frame(&mut buf).unwrap();

    let mut b = Simul::new(build_props()).unwrap();
    b.read_frame(&mut std::io::Cursor::new(&buf)).unwrap();

    for _ in 0..5 {
        a.step().unwrap();
        b.step().unwrap();
    }
    for (_, fa) in a.fibers.iter() {
        let bk = b.fibers.find_serial(fa.serial).unwrap();
        let fb = &b.fibers.get(bk).unwrap().fiber;
        for p in 0..fb.nb_points() {
            let d = fb.pos_point(p).distance(&fa.fiber.pos_point(p));
            assert!(d < 1e-12, "trajectories diverged by {}", d);
        }
    }
}

#[test]
fn truncated_and_corrupt_frames_are_rejected() {
    let original = build_simul();
    let mut buf: Vec<u8> = Vec::new();
    original.write_frame(&mut buf).unwrap();

    // truncation
    let mut short = buf.clone();
    short.truncate(buf.len() / 2);
    let mut restored = Simul::new(build_props()).unwrap();
    assert!(restored.read_frame(&mut std::io::Cursor::new(&short)).is_err());

    // corrupted magic
    let mut bad = buf.clone();
    bad[0] = b'X';
    let mut restored = Simul::new(build_props()).unwrap();
    assert!(restored.read_frame(&mut std::io::Cursor::new(&bad)).is_err());

    // a frame referencing an undefined property index
    let mut props = Properties::new(SimulProp::default());
    props.add_fiber(FiberProp::new("only")); // no single/couple classes
    let mut restored = Simul::new(props).unwrap();
    assert!(restored.read_frame(&mut std::io::Cursor::new(&buf)).is_err());
}
