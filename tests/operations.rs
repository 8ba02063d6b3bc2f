use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing_subscriber::EnvFilter;
use tutorica::{
    domains::rational::Rational,
    function::Function,
    operations::{self, find_root, func_deriv, mat_invert, solve, vec_cross, vec_dot, vec_magnitude},
    roots::{ConvergenceFlag, RootMethod, RootOutcome},
    solve::{Solution, SolveMethod},
    tensors::{matrix::Matrix, vector::Vector},
};

/// Show the engine's debug events with `TUTORICA_LOG=debug cargo test`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("TUTORICA_LOG"))
        .with_test_writer()
        .try_init();
}

fn m(rows: &[&[i64]]) -> Matrix {
    Matrix::from_nested_vec(
        rows.iter()
            .map(|r| r.iter().map(|&e| e.into()).collect())
            .collect(),
    )
    .unwrap()
}

fn v(data: &[i64]) -> Vector {
    Vector::new(data.iter().map(|&e| e.into()).collect()).unwrap()
}

fn random_matrix(rng: &mut StdRng, nrows: usize, ncols: usize) -> Matrix {
    let data = (0..nrows * ncols)
        .map(|_| {
            let num = rng.gen_range(-9..=9i64);
            let den = rng.gen_range(1..=4i64);
            Rational::from((num, den))
        })
        .collect();
    Matrix::from_linear(data, nrows, ncols).unwrap()
}

#[test]
fn invert_two_by_two() {
    init_logging();
    let a = m(&[&[1, 2], &[3, 4]]);
    let r = mat_invert(("A", &a)).unwrap();

    assert_eq!(r.name, "A_i");
    assert_eq!(
        r.value,
        Matrix::from_nested_vec(vec![
            vec![(-2).into(), 1.into()],
            vec![(3, 2).into(), (-1, 2).into()],
        ])
        .unwrap()
    );
    assert!(r.trace.contains("| A | = −2"));
    assert!((&a * &r.value).is_identity());

    let det = operations::mat_det(("A", &a)).unwrap();
    assert_eq!(det.value, Rational::from(-2));
}

#[test]
fn unique_system_both_methods() {
    init_logging();
    let s = Matrix::augmented(vec![
        vec![2.into(), 1.into(), 5.into()],
        vec![1.into(), (-1).into(), 1.into()],
    ])
    .unwrap();

    for method in [SolveMethod::GaussJordan, SolveMethod::Cramer] {
        let r = solve(("S", &s), method).unwrap();
        assert_eq!(r.method, method);
        assert_eq!(r.solution, Solution::Unique(vec![2.into(), 1.into()]));
        assert_eq!(r.solution_string, "x₁ = 2\nx₂ = 1");
        assert!(r.trace.starts_with("S =\n"));
    }
}

#[test]
fn inconsistent_system() {
    let s = Matrix::augmented(vec![
        vec![1.into(), 1.into(), 2.into()],
        vec![2.into(), 2.into(), 5.into()],
    ])
    .unwrap();

    let r = solve(("S", &s), SolveMethod::GaussJordan).unwrap();
    assert!(matches!(r.solution, Solution::Inconsistent { .. }));
    assert_eq!(r.solution_string, "0 ≠ 1");
}

#[test]
fn bisection_on_square_root_of_two() {
    init_logging();
    let f = Function::new("f(x)", "x^2 - 2").unwrap();
    let RootOutcome::Finished(r) =
        find_root(&f, RootMethod::Bisection, &[0.into(), 2.into()], Some(1e-4), None).unwrap()
    else {
        panic!("bisection should run");
    };

    assert_eq!(r.flag, ConvergenceFlag::Converged);
    assert!((r.root - 1.41421).abs() < 1e-3);
    assert!(r.value.abs() < 1e-4);
    assert!(r.terminal_iter <= 20);
}

#[test]
fn newton_on_cubic() {
    init_logging();
    let f = Function::new("f(x)", "x^3 - x - 2").unwrap();
    let RootOutcome::Finished(r) = find_root(
        &f,
        RootMethod::Newton,
        &["1.5".parse().unwrap()],
        None,
        None,
    )
    .unwrap() else {
        panic!("Newton's method should run");
    };

    assert_eq!(r.flag.code(), 0);
    assert!((r.root - 1.52137).abs() < 1e-4);
    assert!(r.terminal_iter <= 5);
}

#[test]
fn vectors() {
    let u = v(&[1, 2, 3]);
    let w = v(&[4, 5, 6]);

    assert_eq!(vec_cross(3, &[("u", &u), ("v", &w)]).unwrap(), v(&[-3, 6, -3]));

    let dot = vec_dot(("u", &u), ("v", &w)).unwrap();
    assert_eq!(dot.name, "u.v");
    assert_eq!(dot.value, Rational::from(32));

    let mag = vec_magnitude(("u", &u));
    assert_eq!(mag.to_string(), "√14");
    assert_eq!(mag.squared, Rational::from(14));

    let sum = operations::vec_add(("u", &u), ("v", &w)).unwrap();
    assert_eq!(sum.name, "u + v");
    assert_eq!(sum.value, v(&[5, 7, 9]));
}

#[test]
fn matrix_identities() {
    let mut rng = StdRng::seed_from_u64(17);

    for _ in 0..20 {
        let (p, q, r, s) = (
            rng.gen_range(1..=4),
            rng.gen_range(1..=4),
            rng.gen_range(1..=4),
            rng.gen_range(1..=4),
        );
        let a = random_matrix(&mut rng, p, q);
        let b = random_matrix(&mut rng, p, q);

        assert_eq!(&(&a + &b) - &b, a);
        assert!((&a - &a).is_zero());
        assert_eq!(a.transpose().transpose(), a);
        assert_eq!(a.mul_scalar(&Rational::one()), a);
        assert!(a.mul_scalar(&Rational::zero()).is_zero());

        let b = random_matrix(&mut rng, q, r);
        let c = random_matrix(&mut rng, r, s);
        assert_eq!(&(&a * &b) * &c, &a * &(&b * &c));
    }
}

#[test]
fn determinant_identities() {
    let mut rng = StdRng::seed_from_u64(3);

    for n in 1..=5 {
        for _ in 0..5 {
            let a = random_matrix(&mut rng, n, n);
            let b = random_matrix(&mut rng, n, n);

            let det_a = a.determinant().unwrap();
            assert_eq!(a.transpose().determinant().unwrap(), det_a);
            assert_eq!(
                (&a * &b).determinant().unwrap(),
                &det_a * &b.determinant().unwrap()
            );

            if !det_a.is_zero() {
                let inv = a.inverse().unwrap().inverse;
                assert!((&a * &inv).is_identity());
                assert!((&inv * &a).is_identity());
            }

            match n {
                1 => assert_eq!(det_a, a[(0, 0)]),
                2 => assert_eq!(det_a, &a[(0, 0)] * &a[(1, 1)] - &a[(0, 1)] * &a[(1, 0)]),
                _ => {}
            }
        }
    }

    assert!(Matrix::identity(4).inverse().unwrap().inverse.is_identity());
}

#[test]
fn unique_solutions_satisfy_the_system() {
    let mut rng = StdRng::seed_from_u64(99);

    for n in 1..=4 {
        for _ in 0..5 {
            let s = random_matrix(&mut rng, n, n + 1).with_augmented(true).unwrap();
            let r = solve(("S", &s), SolveMethod::GaussJordan).unwrap();

            let Solution::Unique(x) = &r.solution else {
                continue;
            };
            for row in s.row_iter() {
                let lhs: Rational = row[..n].iter().zip(x).map(|(a, b)| a * b).sum();
                assert_eq!(lhs, row[n]);
            }

            let c = solve(("S", &s), SolveMethod::Cramer).unwrap();
            assert_eq!(c.solution, r.solution);
        }
    }
}

#[test]
fn derivative_matches_difference_quotient() {
    let f = Function::new("f(x)", "x^3*sin(x) + e^(2x)/(x^2 + 1)").unwrap();
    let df = func_deriv(&f);
    assert_eq!(df.name(), "f'(x)");

    for x in [-1.5, -0.2, 0.4, 2.] {
        let h = 1e-6;
        let approx = (f.evaluate(x + h).unwrap() - f.evaluate(x - h).unwrap()) / (2. * h);
        assert!((df.evaluate(x).unwrap() - approx).abs() < 1e-3);
    }
}

#[test]
fn root_boundaries() {
    let f = Function::new("f(x)", "x").unwrap();
    let RootOutcome::Finished(r) =
        find_root(&f, RootMethod::Bisection, &[(-1).into(), 1.into()], None, None).unwrap()
    else {
        panic!("bisection should run");
    };
    assert_eq!(r.terminal_iter, 1);

    assert!(find_root(&f, RootMethod::Secant, &[1.into(), 1.into()], None, None).is_err());
}
