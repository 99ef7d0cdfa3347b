use rand::rngs::SmallRng;
use rand::SeedableRng;

use cytomech_numerical::Vec3;
use cytomech_space::{CylinderSpace, Space, SphereSpace, StripSpace};

fn all_spaces() -> Vec<Box<dyn Space>> {
    vec![
        Box::new(SphereSpace::new(3.0)),
        Box::new(CylinderSpace::new(5.0, 2.0)),
        Box::new(StripSpace::new(12.0, 3.0, 1.5)),
    ]
}

/// The projection lands on the boundary: it is inside, and moving a bit
/// further along the same direction leaves the space.
#[test]
fn projections_sit_on_the_edge() {
    let mut rng = SmallRng::seed_from_u64(31);
    for space in all_spaces() {
        for _ in 0..200 {
            let p = space.random_place(&mut rng) * 1.8; // inside and outside samples
            let proj = space.project(&p);
            assert!(
                space.distance_to_edge(&proj) < 1e-6,
                "projection must lie on the surface"
            );
            // the projection is never farther than the point we started from
            let d = space.distance_to_edge(&p);
            assert!(p.distance(&proj) <= d + 1e-6);
        }
    }
}

#[test]
fn margin_tests_agree_with_projection() {
    let mut rng = SmallRng::seed_from_u64(37);
    for space in all_spaces() {
        for _ in 0..200 {
            let p = space.random_place(&mut rng);
            let edge = space.distance_to_edge(&p);
            assert!(space.all_inside(&p, 0.9 * edge));
            assert!(!space.all_inside(&p, 1.1 * edge + 1e-9));
        }
    }
}

#[test]
fn folding_preserves_separations_within_half_period() {
    let strip = StripSpace::new(12.0, 3.0, 1.5);
    let modulo = strip.modulo().unwrap();
    let a = Vec3::new(5.5, 0.0, 0.0);
    let b = Vec3::new(-5.5, 1.0, 0.0);
    // across the boundary, the folded separation is the short way around
    let mut d = b - a;
    modulo.fold_diff(&mut d);
    assert!((d.x - 1.0).abs() < 1e-12);
    assert!((d.y - 1.0).abs() < 1e-12);
}

#[test]
fn cylinder_projection_picks_the_nearest_face() {
    let c = CylinderSpace::new(2.0, 1.0);
    // near the cap
    let p = c.project(&Vec3::new(1.9, 0.1, 0.0));
    assert!((p.x - 2.0).abs() < 1e-12);
    // near the side wall
    let p = c.project(&Vec3::new(0.0, 0.9, 0.0));
    assert!((p.y - 1.0).abs() < 1e-12);
    // outside, beyond a corner
    let p = c.project(&Vec3::new(3.0, 2.0, 0.0));
    assert!(c.distance_to_edge(&p) < 1e-9);
}
