//! Real roots of single-variable functions by bisection, regula falsi, Newton's method
//! and the secant method.
//!
//! Iterates are `f64`. Preconditions that the caller got wrong are errors, while the way
//! an iteration ended is reported through [ConvergenceFlag].

use std::{fmt::Display, str::FromStr};

use tracing::{debug, instrument};

use crate::{
    domain::Membership,
    domains::rational::Rational,
    error::{Error, Result},
    function::Function,
    printer::{format_decimal, Trace},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RootMethod {
    Bisection,
    RegulaFalsi,
    Newton,
    Secant,
}

impl RootMethod {
    /// The number of seeds the method starts from.
    pub fn seed_count(&self) -> usize {
        match self {
            RootMethod::Newton => 1,
            _ => 2,
        }
    }

    /// Return true iff the method keeps a bracketing interval.
    pub fn is_closed(&self) -> bool {
        matches!(self, RootMethod::Bisection | RootMethod::RegulaFalsi)
    }
}

impl Display for RootMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RootMethod::Bisection => "bisection",
            RootMethod::RegulaFalsi => "regula falsi",
            RootMethod::Newton => "Newton's method",
            RootMethod::Secant => "secant method",
        })
    }
}

impl FromStr for RootMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bisection" => Ok(RootMethod::Bisection),
            "regula-falsi" | "regula falsi" | "false-position" => Ok(RootMethod::RegulaFalsi),
            "newton" | "newton-raphson" => Ok(RootMethod::Newton),
            "secant" => Ok(RootMethod::Secant),
            _ => Err(Error::Parse(format!("unknown root-finding method '{}'", s))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RootOptions {
    /// Iteration stops once `|f(x)|` is below this.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for RootOptions {
    fn default() -> Self {
        RootOptions {
            tolerance: 1e-4,
            max_iterations: 100,
        }
    }
}

/// How an iteration ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConvergenceFlag {
    Converged,
    Exhausted,
    LeftDerivativeDomain,
    LeftDomain,
}

impl ConvergenceFlag {
    pub fn code(&self) -> i8 {
        match self {
            ConvergenceFlag::Converged => 0,
            ConvergenceFlag::Exhausted => -1,
            ConvergenceFlag::LeftDerivativeDomain => 1,
            ConvergenceFlag::LeftDomain => 2,
        }
    }
}

/// A table with one row per iteration. Values are formatted with the Unicode minus.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IterationLog {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl IterationLog {
    pub fn new(header: &[&str]) -> IterationLog {
        IterationLog {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: vec![],
        }
    }

    fn push(&mut self, iteration: usize, values: &[f64]) {
        let mut row = Vec::with_capacity(values.len() + 1);
        row.push(iteration.to_string());
        row.extend(values.iter().map(|v| format_decimal(*v)));
        self.rows.push(row);
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Display for IterationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
        for r in &self.rows {
            for (w, c) in widths.iter_mut().zip(r) {
                *w = (*w).max(c.chars().count());
            }
        }

        for (i, r) in std::iter::once(&self.header).chain(&self.rows).enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            for (j, (c, w)) in r.iter().zip(&widths).enumerate() {
                if j > 0 {
                    f.write_str("  ")?;
                }
                write!(f, "{:>1$}", c, w)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RootResult {
    pub root: f64,
    /// `f(root)`, or NaN when the last iterate left the domain.
    pub value: f64,
    pub log: IterationLog,
    /// The iteration at which the method stopped, or −1 when it ran out of iterations.
    pub terminal_iter: i64,
    pub flag: ConvergenceFlag,
    pub trace: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RootOutcome {
    /// `f(a)` and `f(b)` have the same sign.
    NoSignChange,
    /// The function is not continuous on the bracketing interval.
    NotContinuous,
    Finished(RootResult),
}

/// Check that `x` lies in the domain of `f`, naming the failure.
fn require_in_domain(f: &Function, x: f64) -> Result<()> {
    match f.contains(x) {
        Membership::In => Ok(()),
        Membership::Out => Err(Error::Domain(format!(
            "{} is not in the domain of {}",
            format_decimal(x),
            f.name()
        ))),
        Membership::Unknown => Err(Error::Domain(format!(
            "cannot decide whether {} is in the domain of {}",
            format_decimal(x),
            f.name()
        ))),
    }
}

fn finish(
    f: &Function,
    mut trace: Trace,
    log: IterationLog,
    root: f64,
    value: f64,
    terminal_iter: i64,
    flag: ConvergenceFlag,
) -> RootOutcome {
    trace.block(&log);
    trace.blank();
    match flag {
        ConvergenceFlag::Converged => trace.line(format!(
            "Converged after {} iterations: x ≈ {}, {} ≈ {}",
            terminal_iter.max(0),
            format_decimal(root),
            f.name().replace(f.var(), &format_decimal(root)),
            format_decimal(value)
        )),
        ConvergenceFlag::Exhausted => trace.line(format!(
            "No convergence after {} iterations; the last iterate is x ≈ {}",
            log.len(),
            format_decimal(root)
        )),
        ConvergenceFlag::LeftDerivativeDomain => trace.line(format!(
            "The iterate x ≈ {} left the domain of the derivative",
            format_decimal(root)
        )),
        ConvergenceFlag::LeftDomain => trace.line(format!(
            "The iterate x ≈ {} left the domain of {}",
            format_decimal(root),
            f.name()
        )),
    }

    RootOutcome::Finished(RootResult {
        root,
        value,
        log,
        terminal_iter,
        flag,
        trace: trace.finish(),
    })
}

/// Locate a root of `f` with `method`, starting from `seeds`: the interval `[a, b]` for
/// the bracketing methods and the secant method, and `x₀` for Newton's method.
#[instrument(level = "debug", skip_all, fields(function = %f.name(), method = %method))]
pub fn find_root(
    f: &Function,
    method: RootMethod,
    seeds: &[Rational],
    options: RootOptions,
) -> Result<RootOutcome> {
    if seeds.len() != method.seed_count() {
        return Err(Error::Arithmetic(format!(
            "{} needs {} starting values, not {}",
            method,
            method.seed_count(),
            seeds.len()
        )));
    }
    if !(options.tolerance > 0.) {
        return Err(Error::Arithmetic(
            "the tolerance must be positive".to_owned(),
        ));
    }

    let x: Vec<f64> = seeds.iter().map(Rational::to_f64).collect();
    match method {
        RootMethod::Bisection | RootMethod::RegulaFalsi => {
            bracketing(f, method, x[0], x[1], options)
        }
        RootMethod::Newton => newton(f, x[0], options),
        RootMethod::Secant => secant(f, x[0], x[1], options),
    }
}

/// Bisection and regula falsi on `[a, b]`.
fn bracketing(
    f: &Function,
    method: RootMethod,
    mut a: f64,
    mut b: f64,
    options: RootOptions,
) -> Result<RootOutcome> {
    if !(a < b) {
        return Err(Error::Arithmetic(format!(
            "the interval [{}, {}] needs a < b",
            format_decimal(a),
            format_decimal(b)
        )));
    }

    require_in_domain(f, a)?;
    require_in_domain(f, b)?;

    if !f.is_continuous_on(a, b) {
        debug!(a, b, "not continuous");
        return Ok(RootOutcome::NotContinuous);
    }

    let (mut fa, mut fb) = (f.evaluate(a)?, f.evaluate(b)?);
    if fa * fb > 0. {
        debug!(fa, fb, "no sign change");
        return Ok(RootOutcome::NoSignChange);
    }

    let mut trace = Trace::new();
    trace.line(format!(
        "Applying {} to {} on [{}, {}] with ε = {}",
        method,
        f,
        format_decimal(a),
        format_decimal(b),
        options.tolerance
    ));
    trace.blank();

    let mut log = if method == RootMethod::Bisection {
        IterationLog::new(&["n", "a", "b", "c", "f(c)"])
    } else {
        IterationLog::new(&["n", "a", "b", "xr", "f(xr)"])
    };

    let (mut c, mut fc) = (a, fa);
    for k in 1..=options.max_iterations {
        c = if method == RootMethod::Bisection || fa == fb {
            (a + b) / 2.
        } else {
            b - fb * (a - b) / (fa - fb)
        };
        fc = f.evaluate(c)?;

        log.push(k, &[a, b, c, fc]);
        debug!(k, a, b, c, fc, "iteration");

        if fc.abs() < options.tolerance {
            return Ok(finish(f, trace, log, c, fc, k as i64, ConvergenceFlag::Converged));
        }

        if fa * fc > 0. {
            a = c;
            fa = fc;
        } else {
            b = c;
            fb = fc;
        }
    }

    Ok(finish(f, trace, log, c, fc, -1, ConvergenceFlag::Exhausted))
}

#[instrument(level = "debug", skip(f, options))]
fn newton(f: &Function, x0: f64, options: RootOptions) -> Result<RootOutcome> {
    let df = f.derivative();
    if df.contains(x0) != Membership::In {
        return Err(Error::Domain(format!(
            "{} is not in the domain of {}",
            format_decimal(x0),
            df.name()
        )));
    }
    require_in_domain(f, x0)?;

    let mut trace = Trace::new();
    trace.line(format!(
        "Applying {} to {} from x₀ = {} with ε = {}",
        RootMethod::Newton,
        f,
        format_decimal(x0),
        options.tolerance
    ));
    trace.line(df.to_string());
    trace.blank();

    let mut log = IterationLog::new(&["n", "xₙ", "f(xₙ)", "f'(xₙ)", "xₙ₊₁"]);
    let mut x = x0;
    let mut fx = f.evaluate(x)?;
    if fx.abs() < options.tolerance {
        debug!(x, fx, "seed is already a root");
        return Ok(finish(f, trace, log, x, fx, 0, ConvergenceFlag::Converged));
    }

    for k in 1..=options.max_iterations {
        let dfx = df.evaluate(x)?;
        if dfx == 0. {
            debug!(k, x, "zero derivative");
            return Ok(finish(f, trace, log, x, fx, k as i64, ConvergenceFlag::Converged));
        }

        let next = x - fx / dfx;
        log.push(k, &[x, fx, dfx, next]);
        debug!(k, x, fx, dfx, next, "iteration");

        if f.contains(next) != Membership::In {
            return Ok(finish(f, trace, log, next, f64::NAN, k as i64, ConvergenceFlag::LeftDomain));
        }

        x = next;
        fx = f.evaluate(x)?;
        if fx.abs() < options.tolerance {
            return Ok(finish(f, trace, log, x, fx, k as i64, ConvergenceFlag::Converged));
        }

        if df.contains(x) != Membership::In {
            return Ok(finish(
                f,
                trace,
                log,
                x,
                fx,
                k as i64,
                ConvergenceFlag::LeftDerivativeDomain,
            ));
        }
    }

    Ok(finish(f, trace, log, x, fx, -1, ConvergenceFlag::Exhausted))
}

#[instrument(level = "debug", skip(f, options))]
fn secant(f: &Function, mut xi: f64, mut xn: f64, options: RootOptions) -> Result<RootOutcome> {
    if xi == xn {
        return Err(Error::Arithmetic(
            "the secant method needs two different starting values".to_owned(),
        ));
    }
    require_in_domain(f, xi)?;
    require_in_domain(f, xn)?;

    let mut trace = Trace::new();
    trace.line(format!(
        "Applying the {} to {} from x₀ = {}, x₁ = {} with ε = {}",
        RootMethod::Secant,
        f,
        format_decimal(xi),
        format_decimal(xn),
        options.tolerance
    ));
    trace.blank();

    let mut log = IterationLog::new(&["n", "xₙ₋₁", "xₙ", "f(xₙ)", "xₙ₊₁"]);
    let mut fi = f.evaluate(xi)?;
    let mut fxn = f.evaluate(xn)?;
    for k in 1..=options.max_iterations {
        let denom = fi - fxn;
        if denom == 0. {
            debug!(k, xn, "flat secant");
            return Ok(finish(f, trace, log, xn, fxn, k as i64, ConvergenceFlag::Converged));
        }

        let next = xn - fxn * (xi - xn) / denom;
        log.push(k, &[xi, xn, fxn, next]);
        debug!(k, xi, xn, fxn, next, "iteration");

        if f.contains(next) != Membership::In {
            return Ok(finish(f, trace, log, next, f64::NAN, k as i64, ConvergenceFlag::LeftDomain));
        }

        (xi, fi) = (xn, fxn);
        xn = next;
        fxn = f.evaluate(xn)?;
        if fxn.abs() < options.tolerance {
            return Ok(finish(f, trace, log, xn, fxn, k as i64, ConvergenceFlag::Converged));
        }
    }

    Ok(finish(f, trace, log, xn, fxn, -1, ConvergenceFlag::Exhausted))
}

#[cfg(test)]
mod test {
    use crate::{
        domains::rational::Rational, error::Error, function::Function, printer::format_decimal,
    };

    use super::{find_root, ConvergenceFlag, RootMethod, RootOptions, RootOutcome, RootResult};

    fn finished(outcome: RootOutcome) -> RootResult {
        match outcome {
            RootOutcome::Finished(r) => r,
            o => panic!("expected a result, got {:?}", o),
        }
    }

    fn seeds(x: &[i64]) -> Vec<Rational> {
        x.iter().map(|&x| x.into()).collect()
    }

    #[test]
    fn bisection() {
        let f = Function::new("f(x)", "x^2 - 2").unwrap();
        let r = finished(
            find_root(&f, RootMethod::Bisection, &seeds(&[0, 2]), RootOptions::default()).unwrap(),
        );
        assert_eq!(r.flag, ConvergenceFlag::Converged);
        assert!((r.root - 2f64.sqrt()).abs() < 1e-3);
        assert!(r.value.abs() < 1e-4);
        assert!(r.terminal_iter > 0 && r.terminal_iter <= 20);
        assert_eq!(r.log.len() as i64, r.terminal_iter);
    }

    #[test]
    fn bisection_boundaries() {
        let f = Function::new("f(x)", "x").unwrap();
        let r = finished(
            find_root(&f, RootMethod::Bisection, &seeds(&[-1, 1]), RootOptions::default()).unwrap(),
        );
        assert_eq!(r.terminal_iter, 1);
        assert_eq!(r.root, 0.);

        let f = Function::new("f(x)", "x^2 + 1").unwrap();
        assert_eq!(
            find_root(&f, RootMethod::Bisection, &seeds(&[-1, 1]), RootOptions::default()).unwrap(),
            RootOutcome::NoSignChange
        );

        let f = Function::new("f(x)", "1/x").unwrap();
        assert_eq!(
            find_root(&f, RootMethod::RegulaFalsi, &seeds(&[-1, 1]), RootOptions::default())
                .unwrap(),
            RootOutcome::NotContinuous
        );

        let f = Function::new("f(x)", "ln(x)").unwrap();
        assert!(matches!(
            find_root(&f, RootMethod::Bisection, &seeds(&[-1, 2]), RootOptions::default()),
            Err(Error::Domain(_))
        ));
        assert!(matches!(
            find_root(&f, RootMethod::Bisection, &seeds(&[2, 1]), RootOptions::default()),
            Err(Error::Arithmetic(_))
        ));
    }

    #[test]
    fn exhausted() {
        let f = Function::new("f(x)", "x^2 - 2").unwrap();
        let options = RootOptions {
            tolerance: 1e-12,
            max_iterations: 3,
        };
        let r = finished(find_root(&f, RootMethod::Bisection, &seeds(&[0, 2]), options).unwrap());
        assert_eq!(r.terminal_iter, -1);
        assert_eq!(r.flag, ConvergenceFlag::Exhausted);
        assert_eq!(r.flag.code(), -1);
        assert_eq!(r.log.len(), 3);
    }

    #[test]
    fn regula_falsi() {
        let f = Function::new("f(x)", "x^3 - x - 2").unwrap();
        let r = finished(
            find_root(&f, RootMethod::RegulaFalsi, &seeds(&[1, 2]), RootOptions::default())
                .unwrap(),
        );
        assert_eq!(r.flag, ConvergenceFlag::Converged);
        assert!((r.root - 1.52138).abs() < 1e-3);
    }

    #[test]
    fn newton() {
        let f = Function::new("f(x)", "x^3 - x - 2").unwrap();
        let r = finished(
            find_root(&f, RootMethod::Newton, &["1.5".parse().unwrap()], RootOptions::default())
                .unwrap(),
        );
        assert_eq!(r.flag.code(), 0);
        assert!((r.root - 1.52138).abs() < 1e-4);
        assert!(r.terminal_iter <= 5);

        let f = Function::new("f(x)", "sqrt(x) - 3").unwrap();
        assert!(matches!(
            find_root(&f, RootMethod::Newton, &seeds(&[0]), RootOptions::default()),
            Err(Error::Domain(_))
        ));

        let f = Function::new("f(x)", "ln(x)").unwrap();
        let r = finished(
            find_root(&f, RootMethod::Newton, &seeds(&[5]), RootOptions::default()).unwrap(),
        );
        assert_eq!(r.flag, ConvergenceFlag::LeftDomain);
        assert_eq!(r.flag.code(), 2);
    }

    #[test]
    fn secant() {
        let f = Function::new("f(x)", "x^2 - 2").unwrap();
        let r = finished(
            find_root(&f, RootMethod::Secant, &seeds(&[1, 2]), RootOptions::default()).unwrap(),
        );
        assert_eq!(r.flag, ConvergenceFlag::Converged);
        assert!((r.root - 2f64.sqrt()).abs() < 1e-4);
        assert!(r.trace.contains("Converged"));

        assert!(matches!(
            find_root(&f, RootMethod::Secant, &seeds(&[1, 1]), RootOptions::default()),
            Err(Error::Arithmetic(_))
        ));
        assert!(matches!(
            find_root(&f, RootMethod::Secant, &seeds(&[1]), RootOptions::default()),
            Err(Error::Arithmetic(_))
        ));
    }

    #[test]
    fn closed_domain_boundary() {
        let f = Function::new("f(x)", "sqrt(x) - 1/2").unwrap();
        let r = finished(
            find_root(&f, RootMethod::Bisection, &seeds(&[0, 1]), RootOptions::default()).unwrap(),
        );
        assert_eq!(r.flag, ConvergenceFlag::Converged);
        assert!((r.root - 0.25).abs() < 1e-4);
    }

    #[test]
    fn regula_falsi_equal_endpoints() {
        // f(a) = f(b) = 0, so the first step falls back to the midpoint.
        let f = Function::new("f(x)", "x^2 - 1").unwrap();
        let r = finished(
            find_root(&f, RootMethod::RegulaFalsi, &seeds(&[-1, 1]), RootOptions::default())
                .unwrap(),
        );
        assert_eq!(r.flag, ConvergenceFlag::Converged);
        assert_eq!(r.terminal_iter, 2);
        assert_eq!(r.root, -1.);
        assert_eq!(r.log.rows()[0][3], format_decimal(0.));
    }

    #[test]
    fn newton_seed_is_root() {
        let f = Function::new("f(x)", "x - 1").unwrap();
        let r = finished(
            find_root(&f, RootMethod::Newton, &seeds(&[1]), RootOptions::default()).unwrap(),
        );
        assert_eq!(r.flag, ConvergenceFlag::Converged);
        assert_eq!(r.terminal_iter, 0);
        assert_eq!(r.root, 1.);
        assert!(r.log.is_empty());
    }

    #[test]
    fn newton_leaves_derivative_domain() {
        // From 4 the step lands exactly on 0, where sqrt is defined but its derivative is not.
        let f = Function::new("f(x)", "sqrt(x) - 1").unwrap();
        let r = finished(
            find_root(&f, RootMethod::Newton, &seeds(&[4]), RootOptions::default()).unwrap(),
        );
        assert_eq!(r.flag, ConvergenceFlag::LeftDerivativeDomain);
        assert_eq!(r.flag.code(), 1);
        assert_eq!(r.root, 0.);
        assert_eq!(r.terminal_iter, 1);
        assert!(r.trace.contains("left the domain of the derivative"));
    }

    #[test]
    fn open_methods_exhausted() {
        let f = Function::new("f(x)", "x^2 + 1").unwrap();
        let options = RootOptions {
            tolerance: 1e-4,
            max_iterations: 5,
        };

        let r = finished(
            find_root(&f, RootMethod::Newton, &["0.5".parse().unwrap()], options).unwrap(),
        );
        assert_eq!(r.flag, ConvergenceFlag::Exhausted);
        assert_eq!(r.flag.code(), -1);
        assert_eq!(r.terminal_iter, -1);
        assert_eq!(r.log.len(), 5);

        let r = finished(find_root(&f, RootMethod::Secant, &seeds(&[1, 2]), options).unwrap());
        assert_eq!(r.flag, ConvergenceFlag::Exhausted);
        assert_eq!(r.terminal_iter, -1);
        assert_eq!(r.log.len(), 5);
    }

    #[test]
    fn secant_flat() {
        let f = Function::new("f(x)", "x^2 - 4").unwrap();
        let r = finished(
            find_root(&f, RootMethod::Secant, &seeds(&[-1, 1]), RootOptions::default()).unwrap(),
        );
        assert_eq!(r.flag, ConvergenceFlag::Converged);
        assert_eq!(r.terminal_iter, 1);
        assert_eq!(r.root, 1.);
        assert!(r.log.is_empty());
    }

    #[test]
    fn log_layout() {
        let f = Function::new("f(x)", "x - 1").unwrap();
        let r = finished(
            find_root(&f, RootMethod::Bisection, &seeds(&[-1, 3]), RootOptions::default()).unwrap(),
        );
        let table = r.log.to_string();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("f(c)"));
        assert!(lines[1].contains("−1.000"));
        assert_eq!(lines[0].chars().count(), lines[1].chars().count());
    }
}
