//! Single-variable functions and the expression trees they are built from.

use std::fmt::{Display, Write};

use crate::{
    domains::rational::Rational,
    error::{Error, Result},
    parser,
    printer::unicode_minus,
    settings,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    E,
    Pi,
}

impl Constant {
    pub fn value(&self) -> f64 {
        match self {
            Constant::E => std::f64::consts::E,
            Constant::Pi => std::f64::consts::PI,
        }
    }
}

/// An elementary function of one argument.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Builtin {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Sin => "sin",
            Builtin::Cos => "cos",
            Builtin::Tan => "tan",
            Builtin::Exp => "exp",
            Builtin::Ln => "ln",
            Builtin::Sqrt => "sqrt",
        }
    }

    pub fn eval(&self, u: f64) -> Result<f64> {
        match self {
            Builtin::Sin => Ok(u.sin()),
            Builtin::Cos => Ok(u.cos()),
            Builtin::Tan => {
                if u.cos().abs() < 1e-12 {
                    Err(Error::Arithmetic(
                        "tan is undefined at odd multiples of π/2".to_owned(),
                    ))
                } else {
                    Ok(u.tan())
                }
            }
            Builtin::Exp => Ok(u.exp()),
            Builtin::Ln => {
                if u <= 0. {
                    Err(Error::Arithmetic(
                        "ln is undefined for non-positive values".to_owned(),
                    ))
                } else {
                    Ok(u.ln())
                }
            }
            Builtin::Sqrt => {
                if u < 0. {
                    Err(Error::Arithmetic(
                        "the square root of a negative number is not real".to_owned(),
                    ))
                } else {
                    Ok(u.sqrt())
                }
            }
        }
    }
}

/// A symbolic expression in a single variable.
///
/// Subtraction is a sum with a negated term and division is a power with exponent `−1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Num(Rational),
    Var(char),
    Const(Constant),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Fn(Builtin, Box<Expr>),
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Num(value.into())
    }
}

impl From<Rational> for Expr {
    fn from(value: Rational) -> Self {
        Expr::Num(value)
    }
}

/// Raise `base` to the rational power `r`, taking the real root of a negative base when
/// the denominator of `r` is odd.
fn pow_rational(base: f64, r: &Rational) -> Result<f64> {
    if base == 0. && r.is_negative() {
        return Err(Error::Arithmetic("division by zero".to_owned()));
    }

    if r.is_integer() {
        return Ok(match r.numerator().to_i32() {
            Some(n) => base.powi(n),
            None => base.powf(r.to_f64()),
        });
    }

    if base < 0. {
        if r.denominator().is_even() {
            return Err(Error::Arithmetic(
                "an even root of a negative number is not real".to_owned(),
            ));
        }

        let mag = (-base).powf(r.abs().to_f64());
        let mag = if r.is_negative() { 1. / mag } else { mag };
        return Ok(if r.numerator().is_odd() { -mag } else { mag });
    }

    Ok(base.powf(r.to_f64()))
}

/// An integer exponent small enough to raise a rational to exactly.
pub(crate) fn small_integer(r: &Rational) -> Option<i32> {
    if !r.is_integer() {
        return None;
    }
    r.numerator().to_i32().filter(|n| n.abs() <= 256)
}

impl Expr {
    pub fn pow(base: Expr, exp: Expr) -> Expr {
        Expr::Pow(Box::new(base), Box::new(exp))
    }

    pub fn func(f: Builtin, arg: Expr) -> Expr {
        Expr::Fn(f, Box::new(arg))
    }

    pub fn as_num(&self) -> Option<&Rational> {
        match self {
            Expr::Num(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_num().map_or(false, Rational::is_zero)
    }

    pub fn is_one(&self) -> bool {
        self.as_num().map_or(false, Rational::is_one)
    }

    /// Replace every purely numeric subtree by its exact value, so that `1/3` becomes a
    /// single rational.
    pub fn fold_numbers(self) -> Expr {
        match self {
            Expr::Add(a) => {
                let a: Vec<Expr> = a.into_iter().map(Expr::fold_numbers).collect();
                if a.iter().all(|t| t.as_num().is_some()) {
                    Expr::Num(a.iter().filter_map(Expr::as_num).sum())
                } else {
                    Expr::Add(a)
                }
            }
            Expr::Mul(a) => {
                let a: Vec<Expr> = a.into_iter().map(Expr::fold_numbers).collect();
                if a.iter().all(|t| t.as_num().is_some()) {
                    let mut p = Rational::one();
                    for r in a.iter().filter_map(Expr::as_num) {
                        p *= r;
                    }
                    Expr::Num(p)
                } else {
                    Expr::Mul(a)
                }
            }
            Expr::Pow(b, e) => {
                let (b, e) = (b.fold_numbers(), e.fold_numbers());
                if let (Some(x), Some(n)) = (b.as_num(), e.as_num().and_then(small_integer)) {
                    if let Ok(v) = x.pow(n) {
                        return Expr::Num(v);
                    }
                }
                Expr::pow(b, e)
            }
            Expr::Fn(f, u) => Expr::func(f, u.fold_numbers()),
            e => e,
        }
    }

    /// Return true iff the expression mentions the variable.
    pub fn has_var(&self) -> bool {
        match self {
            Expr::Num(_) | Expr::Const(_) => false,
            Expr::Var(_) => true,
            Expr::Add(a) | Expr::Mul(a) => a.iter().any(Expr::has_var),
            Expr::Pow(b, e) => b.has_var() || e.has_var(),
            Expr::Fn(_, u) => u.has_var(),
        }
    }

    /// Evaluate the expression at `x`. Undefined operations and non-finite results are
    /// arithmetic errors.
    pub fn eval(&self, x: f64) -> Result<f64> {
        let v = match self {
            Expr::Num(r) => r.to_f64(),
            Expr::Var(_) => x,
            Expr::Const(c) => c.value(),
            Expr::Add(a) => {
                let mut s = 0.;
                for t in a {
                    s += t.eval(x)?;
                }
                s
            }
            Expr::Mul(a) => {
                let mut p = 1.;
                for t in a {
                    p *= t.eval(x)?;
                }
                p
            }
            Expr::Pow(b, e) => {
                let base = b.eval(x)?;
                match e.as_num() {
                    Some(r) => pow_rational(base, r)?,
                    None => {
                        let exp = e.eval(x)?;
                        if base == 0. && exp < 0. {
                            return Err(Error::Arithmetic("division by zero".to_owned()));
                        }
                        if base < 0. && exp.fract() != 0. {
                            return Err(Error::Arithmetic(
                                "a negative number cannot be raised to a non-integer power"
                                    .to_owned(),
                            ));
                        }
                        base.powf(exp)
                    }
                }
            }
            Expr::Fn(f, u) => f.eval(u.eval(x)?)?,
        };

        if !v.is_finite() {
            return Err(Error::Arithmetic(format!(
                "{} is not finite at x = {}",
                unicode_minus(&self.to_string()),
                x
            )));
        }

        Ok(v)
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(_) => 1,
            Expr::Mul(_) => 2,
            Expr::Num(r) if r.is_negative() || !r.is_integer() => 2,
            Expr::Pow(_, e) if e.as_num().map_or(false, Rational::is_negative) => 2,
            Expr::Pow(..) => 3,
            _ => 4,
        }
    }

    /// Whether the term is printed with a leading minus.
    fn is_negative_term(&self) -> bool {
        match self {
            Expr::Num(r) => r.is_negative(),
            Expr::Mul(a) => a.iter().filter(|f| f.is_negative_term()).count() % 2 == 1,
            _ => false,
        }
    }

    /// The term with its sign flipped.
    fn negated(&self) -> Expr {
        match self {
            Expr::Num(r) => Expr::Num(-r),
            e => Expr::Mul(vec![Expr::Num((-1).into()), e.clone()]),
        }
    }

    fn fmt_child(&self, f: &mut std::fmt::Formatter<'_>, min_precedence: u8) -> std::fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }

    /// Write a product as a quotient, with the numeric coefficient in front.
    fn fmt_product(factors: &[Expr], f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn collect(fac: &Expr, coeff: &mut Rational, num: &mut Vec<Expr>, den: &mut Vec<Expr>) {
            match fac {
                Expr::Num(r) => *coeff *= r,
                Expr::Mul(a) => {
                    for f in a {
                        collect(f, coeff, num, den);
                    }
                }
                Expr::Pow(b, e) if e.as_num().map_or(false, Rational::is_negative) => {
                    let r = e.as_num().map(|r| -r).unwrap_or_else(Rational::one);
                    if r.is_one() {
                        den.push((**b).clone());
                    } else {
                        den.push(Expr::pow((**b).clone(), Expr::Num(r)));
                    }
                }
                _ => num.push(fac.clone()),
            }
        }

        let mut coeff = Rational::one();
        let mut num = vec![];
        let mut den = vec![];
        for fac in factors {
            collect(fac, &mut coeff, &mut num, &mut den);
        }

        if coeff.is_negative() {
            f.write_char('-')?;
        }

        let p = Rational::from(coeff.numerator().clone()).abs();
        let q = Rational::from(coeff.denominator().clone());

        let mut first = true;
        if !p.is_one() || num.is_empty() {
            write!(f, "{}", Expr::Num(p))?;
            first = false;
        }
        for n in &num {
            if !first {
                f.write_char('*')?;
            }
            first = false;
            n.fmt_child(f, 3)?;
        }

        if !q.is_one() {
            den.insert(0, Expr::Num(q));
        }
        match den.as_slice() {
            [] => Ok(()),
            [d] => {
                f.write_char('/')?;
                d.fmt_child(f, 3)
            }
            ds => {
                f.write_str("/(")?;
                for (i, d) in ds.iter().enumerate() {
                    if i > 0 {
                        f.write_char('*')?;
                    }
                    d.fmt_child(f, 3)?;
                }
                f.write_char(')')
            }
        }
    }
}

impl Display for Expr {
    /// Write the expression in a form the parser reads back.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Num(r) => {
                if r.is_negative() {
                    f.write_char('-')?;
                }
                if r.is_integer() {
                    write!(f, "{}", r.numerator().clone().abs())
                } else {
                    write!(f, "{}/{}", r.numerator().clone().abs(), r.denominator())
                }
            }
            Expr::Var(v) => f.write_char(*v),
            Expr::Const(Constant::E) => f.write_char('e'),
            Expr::Const(Constant::Pi) => f.write_char('π'),
            Expr::Add(terms) => {
                for (i, t) in terms.iter().enumerate() {
                    if i == 0 {
                        t.fmt_child(f, 2)?;
                    } else if t.is_negative_term() {
                        f.write_str(" - ")?;
                        t.negated().fmt_child(f, 2)?;
                    } else {
                        f.write_str(" + ")?;
                        t.fmt_child(f, 2)?;
                    }
                }
                Ok(())
            }
            Expr::Mul(factors) => Expr::fmt_product(factors, f),
            Expr::Pow(_, e) if e.as_num().map_or(false, Rational::is_negative) => {
                Expr::fmt_product(std::slice::from_ref(self), f)
            }
            Expr::Pow(b, e) => {
                b.fmt_child(f, 4)?;
                f.write_char('^')?;
                e.fmt_child(f, 4)
            }
            Expr::Fn(func, u) => write!(f, "{}({})", func.name(), u),
        }
    }
}

/// Extract the variable from a name of the form `f(x)`, optionally with primes after the
/// function letter.
fn name_variable(name: &str, allow_primes: bool) -> Option<char> {
    let mut chars = name.chars();
    let head = chars.next()?;
    if !head.is_ascii_lowercase() {
        return None;
    }

    let mut rest = chars.as_str();
    if allow_primes {
        rest = rest.trim_start_matches('\'');
    }

    let mut chars = rest.chars();
    match (chars.next(), chars.next(), chars.next(), chars.next()) {
        (Some('('), Some(v), Some(')'), None) if v.is_ascii_lowercase() => Some(v),
        _ => None,
    }
}

/// Check a function name such as `f(x)`, returning its variable.
pub fn parse_name(name: &str) -> Result<char> {
    name_variable(name, false).ok_or_else(|| {
        Error::Parse(format!(
            "'{}' is not a valid function name; use a letter followed by the variable, as in f(x)",
            name
        ))
    })
}

/// Bring `expr` to the shape the parser gives its printed text, so that a function
/// reads back from its text as an equal value.
fn canonical(expr: Expr, var: char) -> Expr {
    let mut e = expr;
    for _ in 0..8 {
        match parser::parse(&e.to_string(), var) {
            Ok(next) if next != e => e = next,
            _ => break,
        }
    }
    e
}

/// A named function of one variable, such as `f(x) = x^2 - 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    name: String,
    var: char,
    expr: Expr,
    rendered: bool,
}

impl Function {
    /// Parse `text` as the body of the function called `name`.
    ///
    /// The name must have the form `f(x)` and the body must mention its variable.
    pub fn new(name: &str, text: &str) -> Result<Function> {
        let var = parse_name(name)?;
        Function::with_var(name, var, text, true)
    }

    /// Recreate a stored function. Names of derivatives, such as `f'(x)`, are accepted, and
    /// so are constant bodies, since a derivative may be constant.
    pub fn restore(name: &str, text: &str, rendered: bool) -> Result<Function> {
        let var = name_variable(name, true).ok_or_else(|| {
            Error::Parse(format!("'{}' is not a valid function name", name))
        })?;
        let mut f = Function::with_var(name, var, text, false)?;
        f.rendered = rendered;
        Ok(f)
    }

    fn with_var(name: &str, var: char, text: &str, require_var: bool) -> Result<Function> {
        let expr = parser::parse(text, var)?;
        if require_var && !expr.has_var() {
            return Err(Error::Parse(format!(
                "the expression '{}' does not mention the variable {}",
                text.trim(),
                var
            )));
        }

        Ok(Function {
            name: name.to_owned(),
            var,
            expr: canonical(expr, var),
            rendered: false,
        })
    }

    pub(crate) fn from_expr(name: String, var: char, expr: Expr) -> Function {
        Function {
            name,
            var,
            expr: canonical(expr, var),
            rendered: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn var(&self) -> char {
        self.var
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// The body in a form the parser reads back.
    pub fn text(&self) -> String {
        self.expr.to_string()
    }

    /// Whether the collaborator has produced a rendered form of this function.
    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    pub fn set_rendered(&mut self, rendered: bool) {
        self.rendered = rendered;
    }

    pub fn evaluate(&self, x: f64) -> Result<f64> {
        self.expr.eval(x)
    }

    pub fn evaluate_rational(&self, x: &Rational) -> Result<f64> {
        self.expr.eval(x.to_f64())
    }

    /// The value at `x`, rounded to the process-wide decimal precision.
    pub fn decimal(&self, x: f64) -> Result<f64> {
        Ok(settings::round_to_precision(self.evaluate(x)?))
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.name, unicode_minus(&self.expr.to_string()))
    }
}
