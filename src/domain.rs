//! Real domains of functions, inferred from the operations in their expressions.

use std::fmt::Display;

use tracing::debug;

use crate::{
    domains::rational::Rational,
    function::{Builtin, Constant, Expr, Function},
    printer::unicode_minus,
};

/// Values closer to zero than this cannot be told apart from zero.
pub const ZERO_THRESHOLD: f64 = 1e-12;
/// Number of interior samples used by the continuity check.
pub const CONTINUITY_SAMPLES: usize = 1000;

/// A restriction on the variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    Positive(Expr),
    NonNegative(Expr),
    NonZero(Expr),
}

impl Condition {
    pub fn expr(&self) -> &Expr {
        match self {
            Condition::Positive(e) | Condition::NonNegative(e) | Condition::NonZero(e) => e,
        }
    }

    fn holds(&self, v: f64) -> bool {
        match self {
            Condition::Positive(_) => v > 0.,
            Condition::NonNegative(_) => v >= 0.,
            Condition::NonZero(_) => v != 0.,
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let e = unicode_minus(&self.expr().to_string());
        match self {
            Condition::Positive(_) => write!(f, "{} > 0", e),
            Condition::NonNegative(_) => write!(f, "{} ≥ 0", e),
            Condition::NonZero(_) => write!(f, "{} ≠ 0", e),
        }
    }
}

/// Whether a point lies in a domain.
///
/// Points where a restricting expression is too close to its boundary to decide are
/// `Unknown` rather than in or out.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Membership {
    In,
    Out,
    Unknown,
}

/// The subset of ℝ on which a function is defined, as a conjunction of conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    var: char,
    expr: Expr,
    conditions: Vec<Condition>,
}

impl Domain {
    /// Infer the domain of `expr` in the variable `var`.
    pub fn of(expr: &Expr, var: char) -> Domain {
        let mut conditions = vec![];
        collect_conditions(expr, &mut conditions);
        debug!(expr = %expr, conditions = conditions.len(), "inferred domain");
        Domain {
            var,
            expr: expr.clone(),
            conditions,
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Return true iff the domain is all of ℝ.
    pub fn is_everywhere(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Decide whether `x` lies in the domain.
    pub fn contains(&self, x: f64) -> Membership {
        let mut unknown = false;
        for c in &self.conditions {
            let v = match c.expr().eval(x) {
                Ok(v) => v,
                Err(_) => return Membership::Out,
            };

            if v != 0. && v.abs() < ZERO_THRESHOLD {
                unknown = true;
            } else if !c.holds(v) {
                return Membership::Out;
            }
        }

        if self.expr.eval(x).is_err() {
            return Membership::Out;
        }

        if unknown {
            Membership::Unknown
        } else {
            Membership::In
        }
    }

    /// Decide by sampling whether the function is continuous on `[a, b]`: every sample
    /// must lie in the domain and no expression that must be nonzero may cross zero.
    pub fn is_continuous_on(&self, a: f64, b: f64) -> bool {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let step = (b - a) / CONTINUITY_SAMPLES as f64;

        let mut signs: Vec<Option<bool>> = vec![None; self.conditions.len()];
        for i in 0..=CONTINUITY_SAMPLES {
            let x = if i == CONTINUITY_SAMPLES { b } else { a + step * i as f64 };

            if self.contains(x) == Membership::Out {
                debug!(x, "continuity sample outside the domain");
                return false;
            }

            // `contains` already enforces the inequalities, and a closed boundary where
            // one of them is zero is part of the interval.
            for (c, sign) in self.conditions.iter().zip(&mut signs) {
                let Condition::NonZero(e) = c else {
                    continue;
                };
                let Ok(v) = e.eval(x) else {
                    return false;
                };
                if v.abs() < 1e-9 {
                    return false;
                }

                let positive = v > 0.;
                match sign {
                    Some(s) if *s != positive => {
                        debug!(x, condition = %c, "sign change between samples");
                        return false;
                    }
                    _ => *sign = Some(positive),
                }
            }
        }

        true
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.conditions.is_empty() {
            return f.write_str("ℝ");
        }

        write!(f, "{{{} ∈ ℝ : ", self.var)?;
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", c)?;
        }
        f.write_str("}")
    }
}

fn push_condition(c: Condition, out: &mut Vec<Condition>) {
    if c.expr().has_var() && !out.contains(&c) {
        out.push(c);
    }
}

/// A base that is positive whatever the variable is.
fn is_positive_constant(e: &Expr) -> bool {
    match e {
        Expr::Const(Constant::E | Constant::Pi) => true,
        Expr::Num(r) => !r.is_negative() && !r.is_zero(),
        _ => false,
    }
}

fn collect_conditions(e: &Expr, out: &mut Vec<Condition>) {
    match e {
        Expr::Num(_) | Expr::Var(_) | Expr::Const(_) => {}
        Expr::Add(a) | Expr::Mul(a) => {
            for t in a {
                collect_conditions(t, out);
            }
        }
        Expr::Pow(b, p) => {
            collect_conditions(b, out);
            collect_conditions(p, out);

            match p.as_num() {
                Some(r) => {
                    let even_root = !r.is_integer() && r.denominator().is_even();
                    if even_root {
                        let c = if r.is_negative() {
                            Condition::Positive((**b).clone())
                        } else {
                            Condition::NonNegative((**b).clone())
                        };
                        push_condition(c, out);
                    } else if r.is_negative() {
                        push_condition(Condition::NonZero((**b).clone()), out);
                    }
                }
                None => {
                    if !is_positive_constant(b) {
                        push_condition(Condition::Positive((**b).clone()), out);
                    }
                }
            }
        }
        Expr::Fn(f, u) => {
            collect_conditions(u, out);
            match f {
                Builtin::Ln => push_condition(Condition::Positive((**u).clone()), out),
                Builtin::Sqrt => push_condition(Condition::NonNegative((**u).clone()), out),
                Builtin::Tan => push_condition(
                    Condition::NonZero(Expr::func(Builtin::Cos, (**u).clone())),
                    out,
                ),
                Builtin::Sin | Builtin::Cos | Builtin::Exp => {}
            }
        }
    }
}

impl Function {
    pub fn domain(&self) -> Domain {
        Domain::of(self.expr(), self.var())
    }

    /// Decide whether `x` lies in the domain of the function.
    pub fn contains(&self, x: f64) -> Membership {
        self.domain().contains(x)
    }

    pub fn contains_rational(&self, x: &Rational) -> Membership {
        self.domain().contains(x.to_f64())
    }

    pub fn is_continuous_on(&self, a: f64, b: f64) -> bool {
        self.domain().is_continuous_on(a, b)
    }
}

#[cfg(test)]
mod test {
    use crate::function::Function;

    use super::Membership;

    #[test]
    fn inference() {
        let f = Function::new("f(x)", "x^2 - 2").unwrap();
        assert!(f.domain().is_everywhere());
        assert_eq!(f.domain().to_string(), "ℝ");

        let f = Function::new("f(x)", "ln(x - 1) + sqrt(x)").unwrap();
        assert_eq!(f.domain().conditions().len(), 2);
        assert_eq!(f.domain().to_string(), "{x ∈ ℝ : x − 1 > 0, x ≥ 0}");

        let f = Function::new("f(x)", "1/x + 1/x").unwrap();
        assert_eq!(f.domain().to_string(), "{x ∈ ℝ : x ≠ 0}");

        let f = Function::new("f(x)", "e^x + 2^x").unwrap();
        assert!(f.domain().is_everywhere());

        let f = Function::new("f(x)", "x^x").unwrap();
        assert_eq!(f.domain().to_string(), "{x ∈ ℝ : x > 0}");
    }

    #[test]
    fn membership() {
        let f = Function::new("f(x)", "ln(x)").unwrap();
        assert_eq!(f.contains(1.), Membership::In);
        assert_eq!(f.contains(0.), Membership::Out);
        assert_eq!(f.contains(-2.), Membership::Out);
        assert_eq!(f.contains(1e-13), Membership::Unknown);

        let f = Function::new("f(x)", "x^(1/3)").unwrap();
        assert_eq!(f.contains(-8.), Membership::In);
        let f = Function::new("f(x)", "x^(1/2)").unwrap();
        assert_eq!(f.contains(-8.), Membership::Out);

        let f = Function::new("f(x)", "tan(x)").unwrap();
        assert_eq!(f.contains(std::f64::consts::FRAC_PI_2), Membership::Out);
    }

    #[test]
    fn continuity() {
        let f = Function::new("f(x)", "x^3 - x - 2").unwrap();
        assert!(f.is_continuous_on(-10., 10.));

        let f = Function::new("f(x)", "1/x").unwrap();
        assert!(!f.is_continuous_on(-1., 1.));
        assert!(f.is_continuous_on(0.5, 2.));

        let f = Function::new("f(x)", "tan(x)").unwrap();
        assert!(!f.is_continuous_on(1., 2.));

        let f = Function::new("f(x)", "sqrt(x)").unwrap();
        assert!(!f.is_continuous_on(-1., 1.));
        assert!(f.is_continuous_on(0., 1.));

        let f = Function::new("f(x)", "sqrt(x^2)").unwrap();
        assert!(f.is_continuous_on(-1., 1.));

        let f = Function::new("f(x)", "ln(x)").unwrap();
        assert!(!f.is_continuous_on(0., 1.));
    }
}
