use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use cytomech_numerical::{bicgstab, Monitor, SolverOutcome, SparseSymmetric, SymTridiag, Vec3};

/// The tridiagonal factorization solves the same system as a dense
/// Gaussian elimination would, for random SPD tridiagonal matrices.
#[test]
fn tridiagonal_solver_against_direct_elimination() {
    let mut rng = SmallRng::seed_from_u64(2);
    for n in [1usize, 2, 3, 8, 33] {
        // diagonally dominant, hence SPD
        let diag: Vec<f64> = (0..n).map(|_| 2.5 + rng.gen::<f64>()).collect();
        let off: Vec<f64> = (0..n.saturating_sub(1)).map(|_| rng.gen::<f64>() - 0.5).collect();
        let x: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() * 4.0 - 2.0).collect();

        let mut b = vec![0.0; n];
        for i in 0..n {
            b[i] = diag[i] * x[i];
            if i > 0 {
                b[i] += off[i - 1] * x[i - 1];
            }
            if i + 1 < n {
                b[i] += off[i] * x[i + 1];
            }
        }

        let mut f = SymTridiag::new();
        assert!(f.factorize(&diag, &off));
        f.solve(&mut b);
        for i in 0..n {
            assert!((b[i] - x[i]).abs() < 1e-10, "n={} i={}", n, i);
        }
    }
}

/// Applying the sparse matrix per dimension agrees with expanding the
/// point-indexed elements into a dense coordinate matrix.
#[test]
fn sparse_iso_expansion_is_consistent() {
    let mut rng = SmallRng::seed_from_u64(8);
    let n = 6;
    let mut m = SparseSymmetric::new();
    m.reset(n);
    let mut dense = vec![vec![0.0; 3 * n]; 3 * n];
    for _ in 0..12 {
        let i = rng.gen_range(0..n);
        let j = rng.gen_range(0..n);
        let v = rng.gen::<f64>() - 0.5;
        m.add(i, j, v);
        let (r, c) = (i.min(j), i.max(j));
        for d in 0..3 {
            dense[3 * r + d][3 * c + d] += v;
            if r != c {
                dense[3 * c + d][3 * r + d] += v;
            }
        }
    }
    let x: Vec<f64> = (0..3 * n).map(|_| rng.gen::<f64>()).collect();
    let mut y = vec![0.0; 3 * n];
    m.vec_mul_add_iso3(&x, &mut y);
    for r in 0..3 * n {
        let expected: f64 = (0..3 * n).map(|c| dense[r][c] * x[c]).sum();
        assert!((y[r] - expected).abs() < 1e-12);
    }
}

/// A diagonal preconditioner cuts the iteration count on a badly scaled
/// system, and both runs agree on the solution.
#[test]
fn preconditioning_accelerates_convergence() {
    let n = 40;
    // diag(1, 10, 100, ...) cycling over three decades
    let scale: Vec<f64> = (0..n).map(|i| 10.0_f64.powi((i % 3) as i32)).collect();
    let mat = |x: &[f64], y: &mut [f64]| {
        for i in 0..n {
            y[i] = scale[i] * x[i];
            if i > 0 {
                y[i] -= 0.3 * x[i - 1];
            }
            if i + 1 < n {
                y[i] -= 0.3 * x[i + 1];
            }
        }
    };
    let b: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin()).collect();

    let mut x_plain = vec![0.0; n];
    let mut mon_plain = Monitor::new(1e-10, 500);
    assert_eq!(
        bicgstab(&b, &mut x_plain, mat, |_: &mut [f64]| {}, &mut mon_plain),
        SolverOutcome::Converged
    );

    let mut x_prec = vec![0.0; n];
    let mut mon_prec = Monitor::new(1e-10, 500);
    assert_eq!(
        bicgstab(
            &b,
            &mut x_prec,
            mat,
            |v: &mut [f64]| {
                for i in 0..n {
                    v[i] /= scale[i];
                }
            },
            &mut mon_prec
        ),
        SolverOutcome::Converged
    );

    assert!(mon_prec.iterations <= mon_plain.iterations);
    for i in 0..n {
        assert!((x_plain[i] - x_prec[i]).abs() < 1e-6);
    }
}

#[test]
fn unit_vectors_are_unit() {
    let mut rng = SmallRng::seed_from_u64(3);
    let mut mean = Vec3::zero();
    for _ in 0..1000 {
        let v = Vec3::random_unit(&mut rng);
        assert!((v.length() - 1.0).abs() < 1e-12);
        mean += v;
    }
    // isotropy: the average direction nearly cancels
    assert!((mean / 1000.0).length() < 0.1);
}
