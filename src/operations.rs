//! The operations offered to the driver.
//!
//! Entities are passed in as `(name, &value)` pairs, since the driver owns the registries.
//! Most operations return an [Operation]: the procedure that was followed, the name of
//! the result, such as `A + B`, and the result itself.

use tracing::debug;

use crate::{
    domains::rational::Rational,
    error::{Error, Result},
    function::Function,
    printer::{format_factor, format_grid, format_step, FactorOptions, Trace, MINUS},
    roots::{self, RootMethod, RootOptions, RootOutcome},
    solve::{self, SolveMethod, SolvedSystem},
    tensors::{
        matrix::Matrix,
        vector::{Magnitude, Vector},
    },
};

/// The result of an operation together with its procedure.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation<T> {
    pub trace: String,
    pub name: String,
    pub value: T,
}

impl<T> Operation<T> {
    fn new(trace: Trace, name: String, value: T) -> Self {
        debug!(name = %name, "operation finished");
        Operation {
            trace: trace.finish(),
            name,
            value,
        }
    }
}

/// Write `name = ` followed by a multi-line block.
fn labelled(trace: &mut Trace, name: &str, block: impl std::fmt::Display) {
    trace.line(format!("{} =", name));
    trace.block(block);
    trace.blank();
}

/// Write a dot product of two rows as `a₁•b₁ + a₂•b₂ + …`.
fn dot_terms<'a>(
    a: impl IntoIterator<Item = &'a Rational>,
    b: impl IntoIterator<Item = &'a Rational>,
) -> String {
    a.into_iter()
        .zip(b)
        .map(|(x, y)| {
            format!(
                "{}{}",
                format_factor(x, FactorOptions::operand().trailing_bullet(true)),
                format_factor(y, FactorOptions::operand())
            )
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

fn entrywise(a: &Matrix, b: &Matrix, op: char) -> Vec<Vec<String>> {
    a.row_iter()
        .zip(b.row_iter())
        .map(|(ra, rb)| {
            ra.iter()
                .zip(rb)
                .map(|(x, y)| format_step(x, y, op))
                .collect()
        })
        .collect()
}

fn mat_entrywise(
    (a_name, a): (&str, &Matrix),
    (b_name, b): (&str, &Matrix),
    op: char,
) -> Result<Operation<Matrix>> {
    let value = if op == '+' {
        a.checked_add(b)?
    } else {
        a.checked_sub(b)?
    };

    let op_char = if op == '+' { '+' } else { MINUS };
    let name = format!("{} {} {}", a_name, op_char, b_name);

    let mut trace = Trace::new();
    labelled(&mut trace, a_name, a);
    labelled(&mut trace, b_name, b);
    trace.line(format!("{} is taken entry by entry:", name));
    trace.line(format_grid(&entrywise(a, b, op), None));
    trace.blank();
    labelled(&mut trace, &name, &value);

    Ok(Operation::new(trace, name, value))
}

pub fn mat_add(a: (&str, &Matrix), b: (&str, &Matrix)) -> Result<Operation<Matrix>> {
    mat_entrywise(a, b, '+')
}

pub fn mat_sub(a: (&str, &Matrix), b: (&str, &Matrix)) -> Result<Operation<Matrix>> {
    mat_entrywise(a, b, '-')
}

/// Multiply every entry of the matrix by `k`.
pub fn mat_scalar(k: &Rational, (a_name, a): (&str, &Matrix)) -> Operation<Matrix> {
    let value = a.mul_scalar(k);
    let name = format!("{}{}", format_factor(k, FactorOptions::coefficient()), a_name);

    let mut trace = Trace::new();
    labelled(&mut trace, a_name, a);
    trace.line(format!("Every entry of {} is multiplied by {}:", a_name, k.display()));
    let steps: Vec<Vec<String>> = a
        .row_iter()
        .map(|r| r.iter().map(|x| format_step(k, x, '·')).collect())
        .collect();
    trace.line(format_grid(&steps, None));
    trace.blank();
    labelled(&mut trace, &name, &value);

    Operation::new(trace, name, value)
}

pub fn mat_mul(
    (a_name, a): (&str, &Matrix),
    (b_name, b): (&str, &Matrix),
) -> Result<Operation<Matrix>> {
    let value = a.checked_mul(b)?;
    let name = format!("{} · {}", a_name, b_name);

    let mut trace = Trace::new();
    labelled(&mut trace, a_name, a);
    labelled(&mut trace, b_name, b);
    trace.line(format!(
        "Entry (i, j) of {} is row i of {} times column j of {}:",
        name, a_name, b_name
    ));
    let steps: Vec<Vec<String>> = a
        .row_iter()
        .map(|r| {
            (0..b.ncols())
                .map(|j| format!("[ {} ]", dot_terms(r, &b.column(j))))
                .collect()
        })
        .collect();
    trace.line(format_grid(&steps, None));
    trace.blank();
    labelled(&mut trace, &name, &value);

    Ok(Operation::new(trace, name, value))
}

pub fn mat_det((a_name, a): (&str, &Matrix)) -> Result<Operation<Rational>> {
    let det = a.det()?;
    let name = format!("| {} |", a_name);

    let mut trace = Trace::new();
    labelled(&mut trace, a_name, a);

    match (&det.elimination, a.nrows()) {
        (None, 1) => {
            trace.line(format!("{} = {}", name, det.value.display()));
        }
        (None, _) => {
            let ad = &a[(0, 0)] * &a[(1, 1)];
            let bc = &a[(0, 1)] * &a[(1, 0)];
            trace.line(format!(
                "{} = [ {} ] {} [ {} ] = {} = {}",
                name,
                dot_terms([&a[(0, 0)]], [&a[(1, 1)]]),
                MINUS,
                dot_terms([&a[(0, 1)]], [&a[(1, 0)]]),
                format_step(&ad, &bc, '-'),
                det.value.display()
            ));
        }
        (Some(t), _) => {
            trace.line(format!("{} is brought to upper-triangular form:", a_name));
            for step in &t.steps {
                trace.line(step.to_string());
            }
            trace.blank();
            trace.block(&t.upper);
            trace.blank();

            let diagonal: Vec<String> = (0..a.nrows())
                .map(|i| format_factor(&t.upper[(i, i)], FactorOptions::operand()))
                .collect();
            let product = diagonal.join("•");
            if t.odd_parity {
                trace.line("An odd number of row swaps flips the sign.");
                trace.line(format!(
                    "{} = {}({}) = {}",
                    name,
                    MINUS,
                    product,
                    det.value.display()
                ));
            } else {
                trace.line(format!("{} = {} = {}", name, product, det.value.display()));
            }
        }
    }

    Ok(Operation::new(trace, name, det.value))
}

pub fn mat_transpose((a_name, a): (&str, &Matrix)) -> Operation<Matrix> {
    let value = a.transpose();
    let name = format!("{}_t", a_name);

    let mut trace = Trace::new();
    labelled(&mut trace, a_name, a);
    trace.line(format!("The rows of {} become the columns of {}.", a_name, name));
    trace.blank();
    labelled(&mut trace, &name, &value);

    Operation::new(trace, name, value)
}

/// Invert a square matrix through its adjugate.
pub fn mat_invert((a_name, a): (&str, &Matrix)) -> Result<Operation<Matrix>> {
    let inv = a.inverse()?;
    let name = format!("{}_i", a_name);

    let mut trace = Trace::new();
    labelled(&mut trace, a_name, a);
    trace.line(format!("| {} | = {}", a_name, inv.det.display()));
    trace.blank();
    labelled(&mut trace, &format!("adj({})", a_name), &inv.adjugate);
    trace.line(format!(
        "{} = {}adj({})",
        name,
        format_factor(&inv.det.inv()?, FactorOptions::coefficient()),
        a_name
    ));
    trace.block(&inv.inverse);

    Ok(Operation::new(trace, name, inv.inverse))
}

/// Multiply a matrix by a column vector, giving an `n×1` matrix.
pub fn mat_by_vec(
    (a_name, a): (&str, &Matrix),
    (v_name, v): (&str, &Vector),
) -> Result<Operation<Matrix>> {
    let value = a.mul_vector(v)?;
    let name = format!("{}{}", a_name, v_name);

    let mut trace = Trace::new();
    labelled(&mut trace, a_name, a);
    labelled(&mut trace, v_name, v);
    trace.line(format!("Row i of {} is multiplied by {}:", a_name, v_name));
    let steps: Vec<Vec<String>> = a
        .row_iter()
        .map(|r| vec![format!("[ {} ]", dot_terms(r, v.iter()))])
        .collect();
    trace.line(format_grid(&steps, None));
    trace.blank();
    labelled(&mut trace, &name, &value);

    Ok(Operation::new(trace, name, value))
}

fn vec_entrywise(
    (u_name, u): (&str, &Vector),
    (v_name, v): (&str, &Vector),
    op: char,
) -> Result<Operation<Vector>> {
    let value = if op == '+' {
        u.checked_add(v)?
    } else {
        u.checked_sub(v)?
    };

    let op_char = if op == '+' { '+' } else { MINUS };
    let name = format!("{} {} {}", u_name, op_char, v_name);

    let mut trace = Trace::new();
    labelled(&mut trace, u_name, u);
    labelled(&mut trace, v_name, v);
    let steps: Vec<Vec<String>> = u
        .iter()
        .zip(v.iter())
        .map(|(x, y)| vec![format_step(x, y, op)])
        .collect();
    trace.line(format_grid(&steps, None));
    trace.blank();
    labelled(&mut trace, &name, &value);

    Ok(Operation::new(trace, name, value))
}

pub fn vec_add(u: (&str, &Vector), v: (&str, &Vector)) -> Result<Operation<Vector>> {
    vec_entrywise(u, v, '+')
}

pub fn vec_sub(u: (&str, &Vector), v: (&str, &Vector)) -> Result<Operation<Vector>> {
    vec_entrywise(u, v, '-')
}

pub fn vec_scalar(k: &Rational, (u_name, u): (&str, &Vector)) -> Operation<Vector> {
    let value = u.mul_scalar(k);
    let name = format!("{}{}", format_factor(k, FactorOptions::coefficient()), u_name);

    let mut trace = Trace::new();
    labelled(&mut trace, u_name, u);
    let steps: Vec<Vec<String>> = u.iter().map(|x| vec![format_step(k, x, '·')]).collect();
    trace.line(format_grid(&steps, None));
    trace.blank();
    labelled(&mut trace, &name, &value);

    Operation::new(trace, name, value)
}

pub fn vec_dot(
    (u_name, u): (&str, &Vector),
    (v_name, v): (&str, &Vector),
) -> Result<Operation<Rational>> {
    let value = u.dot(v)?;
    let name = format!("{}.{}", u_name, v_name);

    let mut trace = Trace::new();
    labelled(&mut trace, u_name, u);
    labelled(&mut trace, v_name, v);
    trace.line(format!(
        "{} = {} = {}",
        name,
        dot_terms(u.iter(), v.iter()),
        value.display()
    ));

    Ok(Operation::new(trace, name, value))
}

/// The generalized cross product of `dim − 1` vectors in `dim` dimensions, or of two
/// vectors in the plane.
pub fn vec_cross(dim: usize, vectors: &[(&str, &Vector)]) -> Result<Vector> {
    let vs: Vec<Vector> = vectors.iter().map(|(_, v)| (*v).clone()).collect();
    Vector::cross(dim, &vs)
}

pub fn vec_magnitude((_, u): (&str, &Vector)) -> Magnitude {
    u.magnitude()
}

/// Solve a stored system. The trace starts with the system itself.
pub fn solve(
    (s_name, system): (&str, &Matrix),
    method: SolveMethod,
) -> Result<SolvedSystem> {
    if !system.is_augmented() {
        return Err(Error::Shape(format!(
            "{} is not an augmented matrix",
            s_name
        )));
    }

    let mut s = solve::solve(system, method)?;
    s.trace = format!("{} =\n{}\n\n{}", s_name, system, s.trace);
    Ok(s)
}

pub fn func_deriv(f: &Function) -> Function {
    f.derivative()
}

/// Find a root of `f`, using the default tolerance and cap unless given.
pub fn find_root(
    f: &Function,
    method: RootMethod,
    seeds: &[Rational],
    tolerance: Option<f64>,
    max_iterations: Option<usize>,
) -> Result<RootOutcome> {
    let defaults = RootOptions::default();
    roots::find_root(
        f,
        method,
        seeds,
        RootOptions {
            tolerance: tolerance.unwrap_or(defaults.tolerance),
            max_iterations: max_iterations.unwrap_or(defaults.max_iterations),
        },
    )
}

#[cfg(test)]
mod test {
    use crate::{domains::rational::Rational, tensors::matrix::Matrix};

    use super::{mat_det, mat_scalar, mat_sub};

    fn m(rows: &[&[i64]]) -> Matrix {
        Matrix::from_nested_vec(
            rows.iter()
                .map(|r| r.iter().map(|&e| e.into()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn names() {
        let a = m(&[&[1, 2], &[3, 4]]);
        let b = m(&[&[0, 1], &[1, 0]]);

        let r = mat_sub(("A", &a), ("B", &b)).unwrap();
        assert_eq!(r.name, "A − B");
        assert!(r.trace.contains("[ 2 − 1 ]"));

        assert_eq!(mat_scalar(&Rational::from((1, 2)), ("A", &a)).name, "(1/2)A");
        assert_eq!(mat_scalar(&Rational::from(-1), ("A", &a)).name, "−A");
        assert_eq!(mat_scalar(&Rational::from(3), ("A", &a)).name, "3A");
    }

    #[test]
    fn determinant_traces() {
        let r = mat_det(("A", &m(&[&[1, 2], &[3, 4]]))).unwrap();
        assert_eq!(r.name, "| A |");
        assert_eq!(r.value, Rational::from(-2));
        assert!(r.trace.contains("= [ 4 − 6 ] = −2"));

        let r = mat_det(("B", &m(&[&[0, 1, 2], &[1, 0, 3], &[4, -3, 8]]))).unwrap();
        assert_eq!(r.value, Rational::from(-2));
        assert!(r.trace.contains("R₁ ↔ R₃"));
    }
}
