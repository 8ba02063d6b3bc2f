//! Solving linear systems given as augmented matrices.
//!
//! Both methods work in exact rational arithmetic and return the procedure they
//! followed as text, alongside the classified solution.

use std::{fmt::Display, str::FromStr};

use tracing::{debug, instrument};

use crate::{
    domains::rational::Rational,
    error::{Error, Result},
    printer::{format_factor, format_step, subscript, FactorOptions, Trace, MINUS},
    tensors::matrix::{Matrix, RowOperation},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SolveMethod {
    GaussJordan,
    Cramer,
}

impl Display for SolveMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveMethod::GaussJordan => f.write_str("Gauss–Jordan elimination"),
            SolveMethod::Cramer => f.write_str("Cramer's rule"),
        }
    }
}

impl FromStr for SolveMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<SolveMethod> {
        match s.trim().to_lowercase().as_str() {
            "gauss-jordan" | "gauss–jordan" | "gauss_jordan" | "gaussjordan" => {
                Ok(SolveMethod::GaussJordan)
            }
            "cramer" => Ok(SolveMethod::Cramer),
            _ => Err(Error::Parse(format!("unknown solving method '{}'", s))),
        }
    }
}

/// The classified solution set of a linear system in `n` unknowns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Solution {
    Unique(Vec<Rational>),
    /// `x = particular + Σ tⱼ · directions[j]`, with one parameter per free unknown.
    Infinite {
        particular: Vec<Rational>,
        directions: Vec<Vec<Rational>>,
        free: Vec<usize>,
    },
    /// A row reduced to `0 = constant` with a non-zero constant.
    Inconsistent { constant: Rational },
}

impl Solution {
    /// Render the solution, one unknown per line.
    pub fn describe(&self) -> String {
        match self {
            Solution::Unique(x) => x
                .iter()
                .enumerate()
                .map(|(i, v)| format!("x{} = {}", subscript(i + 1), v.display()))
                .collect::<Vec<_>>()
                .join("\n"),
            Solution::Infinite {
                particular,
                directions,
                ..
            } => (0..particular.len())
                .map(|i| {
                    let mut s = String::new();
                    for (j, d) in directions.iter().enumerate() {
                        if d[i].is_zero() {
                            continue;
                        }

                        let term = format!(
                            "{}t{}",
                            format_factor(&d[i].abs(), FactorOptions::coefficient()),
                            subscript(j + 1)
                        );
                        if s.is_empty() {
                            if d[i].is_negative() {
                                s.push(MINUS);
                            }
                        } else {
                            s.push_str(if d[i].is_negative() { " − " } else { " + " });
                        }
                        s.push_str(&term);
                    }

                    let c = &particular[i];
                    let rhs = if s.is_empty() {
                        c.display()
                    } else if c.is_zero() {
                        s
                    } else if let Some(rest) = s.strip_prefix(MINUS) {
                        format!("{} − {}", c.display(), rest)
                    } else {
                        format!("{} + {}", c.display(), s)
                    };

                    format!("x{} = {}", subscript(i + 1), rhs)
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Solution::Inconsistent { constant } => format!("0 ≠ {}", constant.display()),
        }
    }
}

/// A solved system with the procedure that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolvedSystem {
    pub trace: String,
    /// The method that was actually used, which differs from the requested one after a fallback.
    pub method: SolveMethod,
    pub solution: Solution,
    pub solution_string: String,
    /// The reduced row-echelon form, for Gauss–Jordan.
    pub reduced: Option<Matrix>,
}

/// Why Cramer's rule cannot be applied to a system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CramerRejection {
    /// Every entry of the system is zero.
    AllZero,
    NotSquare { equations: usize, unknowns: usize },
    Singular,
}

impl Display for CramerRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CramerRejection::AllZero => {
                f.write_str("every row is zero, so each equation collapses to 0 = 0")
            }
            CramerRejection::NotSquare {
                equations,
                unknowns,
            } => write!(
                f,
                "the system has {} equations in {} unknowns, but the coefficient matrix must be square",
                equations, unknowns
            ),
            CramerRejection::Singular => {
                f.write_str("the determinant of the coefficient matrix is zero")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CramerOutcome {
    Solved(SolvedSystem),
    NotApplicable(CramerRejection),
}

fn check_augmented(system: &Matrix) -> Result<()> {
    if !system.is_augmented() {
        return Err(Error::Shape(
            "a linear system must be given as an augmented matrix".to_owned(),
        ));
    }
    Ok(())
}

/// Reduce the system to reduced row-echelon form and classify its solutions.
///
/// Pivots are the first non-zero entry at or below the current row. Before each swap,
/// scaling and elimination the current matrix is written to the trace.
#[instrument(level = "debug", skip_all, fields(rows = system.nrows(), cols = system.ncols()))]
pub fn gauss_jordan(system: &Matrix) -> Result<SolvedSystem> {
    check_augmented(system)?;

    let mut trace = Trace::new();
    trace.line(format!("Solving by {}.", SolveMethod::GaussJordan));
    trace.block(system);

    let mut m = system.clone();
    let unknowns = m.ncols() - 1;

    if m.is_zero() {
        trace.line("Every row is zero: each equation collapses to 0 = 0, so every unknown is free.");
    }

    let mut pivots = vec![];
    let mut pivot_row = 0;
    for col in 0..unknowns {
        if pivot_row >= m.nrows() {
            break;
        }

        let Some(r) = (pivot_row..m.nrows()).find(|&r| !m[(r, col)].is_zero()) else {
            debug!("No pivot in column {}", col + 1);
            continue;
        };

        if r != pivot_row {
            let op = RowOperation::Swap(pivot_row, r);
            trace.blank();
            trace.line(format!(
                "Swap row {} and row {}: {}",
                pivot_row + 1,
                r + 1,
                op
            ));
            op.apply(&mut m);
            trace.block(&m);
        }

        let p = m[(pivot_row, col)].clone();
        if !p.is_one() {
            let factor = p.inv()?;
            let op = RowOperation::Scale {
                row: pivot_row,
                factor: factor.clone(),
            };
            trace.blank();
            trace.line(format!(
                "Scale row {} by {}: {}",
                pivot_row + 1,
                factor.display(),
                op
            ));
            let steps: Vec<_> = m
                .row(pivot_row)
                .iter()
                .map(|e| format_step(e, &factor, '·'))
                .collect();
            trace.line(steps.join("  "));
            op.apply(&mut m);
            trace.block(&m);
        }

        let eliminations: Vec<_> = (0..m.nrows())
            .filter(|&k| k != pivot_row && !m[(k, col)].is_zero())
            .map(|k| RowOperation::AddMultiple {
                target: k,
                source: pivot_row,
                factor: -m[(k, col)].clone(),
            })
            .collect();

        if !eliminations.is_empty() {
            trace.blank();
            trace.line(format!(
                "Eliminate column {} using row {}:",
                col + 1,
                pivot_row + 1
            ));

            for op in &eliminations {
                if let RowOperation::AddMultiple { target, factor, .. } = op {
                    let steps: Vec<_> = m
                        .row(*target)
                        .iter()
                        .zip(m.row(pivot_row))
                        .map(|(a, b)| format_step(a, &(b * factor), '+'))
                        .collect();
                    trace.line(format!("{}    {}", op, steps.join("  ")));
                }
                debug!("{}", op);
                op.apply(&mut m);
            }
            trace.block(&m);
        }

        pivots.push(col);
        pivot_row += 1;
    }

    trace.blank();
    trace.line("Reduced row-echelon form:");
    trace.block(&m);

    let solution = classify(&m, &pivots);
    debug!("Classified as {:?}", solution);

    let solution_string = solution.describe();
    trace.blank();
    match &solution {
        Solution::Unique(_) => trace.line("Every unknown has a pivot, so the solution is unique:"),
        Solution::Infinite { free, .. } => trace.line(format!(
            "The system has infinitely many solutions; free unknowns {} become parameters:",
            free.iter()
                .map(|f| format!("x{}", subscript(f + 1)))
                .collect::<Vec<_>>()
                .join(", ")
        )),
        Solution::Inconsistent { .. } => {
            trace.line("A row reads 0 = b with b non-zero, so the system is inconsistent:")
        }
    }
    trace.line(&solution_string);

    Ok(SolvedSystem {
        trace: trace.finish(),
        method: SolveMethod::GaussJordan,
        solution,
        solution_string,
        reduced: Some(m),
    })
}

/// Classify a matrix in reduced row-echelon form, given its pivot columns in row order.
fn classify(m: &Matrix, pivots: &[usize]) -> Solution {
    let unknowns = m.ncols() - 1;

    for row in m.row_iter() {
        let (coefficients, constant) = row.split_at(unknowns);
        if coefficients.iter().all(|e| e.is_zero()) && !constant[0].is_zero() {
            return Solution::Inconsistent {
                constant: constant[0].clone(),
            };
        }
    }

    if pivots.len() == unknowns {
        let mut x = vec![Rational::zero(); unknowns];
        for (r, &c) in pivots.iter().enumerate() {
            x[c] = m[(r, unknowns)].clone();
        }
        return Solution::Unique(x);
    }

    let free: Vec<usize> = (0..unknowns).filter(|c| !pivots.contains(c)).collect();

    let mut particular = vec![Rational::zero(); unknowns];
    for (r, &c) in pivots.iter().enumerate() {
        particular[c] = m[(r, unknowns)].clone();
    }

    let directions = free
        .iter()
        .map(|&f| {
            let mut d = vec![Rational::zero(); unknowns];
            d[f] = Rational::one();
            for (r, &c) in pivots.iter().enumerate() {
                d[c] = -&m[(r, f)];
            }
            d
        })
        .collect();

    Solution::Infinite {
        particular,
        directions,
        free,
    }
}

/// Solve a square system with Cramer's rule, `xᵢ = det(Aᵢ) / det(A)`.
///
/// A system that is all zero, not square, or singular is reported as not applicable
/// instead of failing, so the caller can choose another method.
#[instrument(level = "debug", skip_all, fields(rows = system.nrows(), cols = system.ncols()))]
pub fn cramer(system: &Matrix) -> Result<CramerOutcome> {
    check_augmented(system)?;

    if system.is_zero() {
        return Ok(CramerOutcome::NotApplicable(CramerRejection::AllZero));
    }

    let a = system.coefficients();
    if !a.is_square() {
        return Ok(CramerOutcome::NotApplicable(CramerRejection::NotSquare {
            equations: a.nrows(),
            unknowns: a.ncols(),
        }));
    }

    let det = a.determinant()?;
    if det.is_zero() {
        return Ok(CramerOutcome::NotApplicable(CramerRejection::Singular));
    }

    let constants = system.column(system.ncols() - 1);

    let mut trace = Trace::new();
    trace.line(format!("Solving by {}.", SolveMethod::Cramer));
    trace.line("A =");
    trace.block(&a);
    trace.line(format!("| A | = {}", det.display()));

    let mut x = Vec::with_capacity(a.ncols());
    for i in 0..a.ncols() {
        let ai = a.replace_column(i, &constants);
        let di = ai.determinant()?;
        let xi = di.checked_div(&det)?;

        let name = format!("A{}", subscript(i + 1));
        trace.blank();
        trace.line(format!(
            "{} is A with column {} replaced by the constants:",
            name,
            i + 1
        ));
        trace.block(&ai);
        trace.line(format!("| {} | = {}", name, di.display()));
        trace.line(format!(
            "x{} = | {} | / | A | = {} = {}",
            subscript(i + 1),
            name,
            format_step(&di, &det, '/'),
            xi.display()
        ));

        debug!("x{} = {}", i + 1, xi);
        x.push(xi);
    }

    let solution = Solution::Unique(x);
    let solution_string = solution.describe();
    trace.blank();
    trace.line(&solution_string);

    Ok(CramerOutcome::Solved(SolvedSystem {
        trace: trace.finish(),
        method: SolveMethod::Cramer,
        solution,
        solution_string,
        reduced: None,
    }))
}

/// Solve with the requested method. When Cramer's rule does not apply, the reason is
/// recorded and the system is solved by Gauss–Jordan elimination instead.
pub fn solve(system: &Matrix, method: SolveMethod) -> Result<SolvedSystem> {
    match method {
        SolveMethod::GaussJordan => gauss_jordan(system),
        SolveMethod::Cramer => match cramer(system)? {
            CramerOutcome::Solved(s) => Ok(s),
            CramerOutcome::NotApplicable(reason) => {
                debug!("Cramer's rule not applicable: {}", reason);
                let mut s = gauss_jordan(system)?;
                s.trace = format!(
                    "{} does not apply: {}.\nFalling back to {}.\n\n{}",
                    SolveMethod::Cramer,
                    reason,
                    SolveMethod::GaussJordan,
                    s.trace
                );
                Ok(s)
            }
        },
    }
}

#[cfg(test)]
mod test {
    use crate::{domains::rational::Rational, tensors::matrix::Matrix};

    use super::{cramer, gauss_jordan, solve, CramerOutcome, CramerRejection, Solution, SolveMethod};

    fn system(rows: &[&[i64]]) -> Matrix {
        Matrix::augmented(
            rows.iter()
                .map(|r| r.iter().map(|&e| e.into()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn unique() {
        let s = system(&[&[2, 1, 5], &[1, -1, 1]]);

        let gj = gauss_jordan(&s).unwrap();
        assert_eq!(gj.solution, Solution::Unique(vec![2.into(), 1.into()]));
        assert_eq!(gj.solution_string, "x₁ = 2\nx₂ = 1");
        assert!(gj.trace.contains("Scale row 1 by 1/2"));
        assert!(gj.trace.contains("Eliminate column 1 using row 1"));

        let CramerOutcome::Solved(c) = cramer(&s).unwrap() else {
            panic!("Cramer's rule should apply");
        };
        assert_eq!(c.solution, gj.solution);
        assert_eq!(c.method, SolveMethod::Cramer);
        assert!(c.trace.contains("| A | = −3"));
    }

    #[test]
    fn inconsistent() {
        let s = system(&[&[1, 1, 2], &[2, 2, 5]]);
        let gj = gauss_jordan(&s).unwrap();
        assert_eq!(
            gj.solution,
            Solution::Inconsistent {
                constant: 1.into()
            }
        );
        assert_eq!(gj.solution_string, "0 ≠ 1");

        assert_eq!(
            cramer(&s).unwrap(),
            CramerOutcome::NotApplicable(CramerRejection::Singular)
        );
    }

    #[test]
    fn infinite() {
        let s = system(&[&[1, 2, -1, 3], &[2, 4, -2, 6]]);
        let gj = gauss_jordan(&s).unwrap();

        let Solution::Infinite {
            particular,
            directions,
            free,
        } = &gj.solution
        else {
            panic!("expected a parametric family");
        };
        assert_eq!(free, &vec![1usize, 2]);
        assert_eq!(particular, &vec![Rational::from(3), 0.into(), 0.into()]);
        assert_eq!(directions[0], vec![Rational::from(-2), 1.into(), 0.into()]);
        assert_eq!(gj.solution_string, "x₁ = 3 − 2t₁ + t₂\nx₂ = t₁\nx₃ = t₂");

        // every member of the family solves the system
        let t: [Rational; 2] = [5.into(), (-1, 3).into()];
        let x: Vec<Rational> = (0..3)
            .map(|i| &particular[i] + &(&(&t[0] * &directions[0][i]) + &(&t[1] * &directions[1][i])))
            .collect();
        for row in s.row_iter() {
            let lhs: Rational = row.iter().zip(&x).map(|(a, b)| a * b).sum();
            assert_eq!(lhs, row[3]);
        }
    }

    #[test]
    fn fallback() {
        let s = system(&[&[0, 0, 0], &[0, 0, 0]]);
        assert_eq!(
            cramer(&s).unwrap(),
            CramerOutcome::NotApplicable(CramerRejection::AllZero)
        );

        let r = solve(&s, SolveMethod::Cramer).unwrap();
        assert_eq!(r.method, SolveMethod::GaussJordan);
        assert!(r.trace.contains("0 = 0"));
        assert!(matches!(r.solution, Solution::Infinite { .. }));

        let s = system(&[&[1, 1, 1, 1]]);
        let r = solve(&s, SolveMethod::Cramer).unwrap();
        assert!(r.trace.starts_with("Cramer's rule does not apply"));

        let plain = Matrix::identity(2);
        assert!(gauss_jordan(&plain).is_err());
        assert_eq!("gauss-jordan".parse::<SolveMethod>().unwrap(), SolveMethod::GaussJordan);
    }
}
