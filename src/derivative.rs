use tracing::debug;

use crate::{
    domains::rational::Rational,
    function::{small_integer, Builtin, Constant, Expr, Function},
};

impl Function {
    /// Take the derivative, named by adding a prime: `f(x)` becomes `f'(x)`.
    ///
    /// The result may be constant, as for `f(x) = 2x`.
    pub fn derivative(&self) -> Function {
        let name = match self.name().find('(') {
            Some(i) => format!("{}'{}", &self.name()[..i], &self.name()[i..]),
            None => format!("{}'", self.name()),
        };

        let d = self.expr().derivative();
        debug!(name = %name, derivative = %d, "took derivative");
        Function::from_expr(name, self.var(), d)
    }
}

impl Expr {
    /// Take the derivative with respect to the variable and simplify the result.
    pub fn derivative(&self) -> Expr {
        self.derivative_raw().simplify()
    }

    fn derivative_raw(&self) -> Expr {
        match self {
            Expr::Num(_) | Expr::Const(_) => Expr::from(0),
            Expr::Var(_) => Expr::from(1),
            Expr::Add(a) => Expr::Add(a.iter().map(Expr::derivative_raw).collect()),
            Expr::Mul(a) => {
                let mut terms = vec![];
                for (i, f) in a.iter().enumerate() {
                    if !f.has_var() {
                        continue;
                    }

                    let mut t = a.clone();
                    t[i] = f.derivative_raw();
                    terms.push(Expr::Mul(t));
                }
                Expr::Add(terms)
            }
            Expr::Pow(b, e) => {
                if !e.has_var() {
                    // c b^(c-1) b'
                    Expr::Mul(vec![
                        (**e).clone(),
                        Expr::pow((**b).clone(), Expr::Add(vec![(**e).clone(), Expr::from(-1)])),
                        b.derivative_raw(),
                    ])
                } else if !b.has_var() {
                    // b^e ln(b) e'
                    Expr::Mul(vec![
                        self.clone(),
                        Expr::func(Builtin::Ln, (**b).clone()),
                        e.derivative_raw(),
                    ])
                } else {
                    // b^e (e' ln(b) + e b' / b)
                    Expr::Mul(vec![
                        self.clone(),
                        Expr::Add(vec![
                            Expr::Mul(vec![
                                e.derivative_raw(),
                                Expr::func(Builtin::Ln, (**b).clone()),
                            ]),
                            Expr::Mul(vec![
                                (**e).clone(),
                                b.derivative_raw(),
                                Expr::pow((**b).clone(), Expr::from(-1)),
                            ]),
                        ]),
                    ])
                }
            }
            Expr::Fn(f, u) => {
                let u = &**u;
                let outer = match f {
                    Builtin::Sin => Expr::func(Builtin::Cos, u.clone()),
                    Builtin::Cos => {
                        Expr::Mul(vec![Expr::from(-1), Expr::func(Builtin::Sin, u.clone())])
                    }
                    Builtin::Tan => Expr::pow(Expr::func(Builtin::Cos, u.clone()), Expr::from(-2)),
                    Builtin::Exp => Expr::func(Builtin::Exp, u.clone()),
                    Builtin::Ln => Expr::pow(u.clone(), Expr::from(-1)),
                    Builtin::Sqrt => Expr::Mul(vec![
                        Expr::Num((1, 2).into()),
                        Expr::pow(Expr::func(Builtin::Sqrt, u.clone()), Expr::from(-1)),
                    ]),
                };
                Expr::Mul(vec![outer, u.derivative_raw()])
            }
        }
    }

    /// Split a term into its numerical coefficient and the rest.
    fn split_coefficient(self) -> (Rational, Expr) {
        match self {
            Expr::Mul(mut a) => match a.first().and_then(Expr::as_num).cloned() {
                Some(c) => {
                    a.remove(0);
                    let rest = if a.len() == 1 {
                        a.pop().unwrap_or_else(|| Expr::from(1))
                    } else {
                        Expr::Mul(a)
                    };
                    (c, rest)
                }
                None => (Rational::one(), Expr::Mul(a)),
            },
            e => (Rational::one(), e),
        }
    }

    fn scaled(c: Rational, rest: Expr) -> Expr {
        if c.is_one() {
            return rest;
        }

        match rest {
            Expr::Mul(mut a) => {
                a.insert(0, Expr::Num(c));
                Expr::Mul(a)
            }
            e => Expr::Mul(vec![Expr::Num(c), e]),
        }
    }

    /// Apply light algebraic simplifications: flatten nested sums and products, fold
    /// numbers, drop neutral terms, collect like terms and merge powers of equal bases.
    pub fn simplify(&self) -> Expr {
        match self {
            Expr::Num(_) | Expr::Var(_) | Expr::Const(_) => self.clone(),
            Expr::Add(a) => {
                let mut constant = Rational::zero();
                let mut terms: Vec<(Rational, Expr)> = vec![];

                let mut add_term = |t: Expr, constant: &mut Rational| {
                    if let Expr::Num(r) = t {
                        *constant += &r;
                        return;
                    }

                    let (c, rest) = t.split_coefficient();
                    if let Some(m) = terms.iter_mut().find(|(_, r)| *r == rest) {
                        m.0 += &c;
                    } else {
                        terms.push((c, rest));
                    }
                };

                for t in a {
                    match t.simplify() {
                        Expr::Add(inner) => {
                            for t in inner {
                                add_term(t, &mut constant);
                            }
                        }
                        t => add_term(t, &mut constant),
                    }
                }

                let mut out: Vec<Expr> = terms
                    .into_iter()
                    .filter(|(c, _)| !c.is_zero())
                    .map(|(c, rest)| Expr::scaled(c, rest))
                    .collect();
                if !constant.is_zero() {
                    out.push(Expr::Num(constant));
                }

                match out.len() {
                    0 => Expr::from(0),
                    1 => out.pop().unwrap_or_else(|| Expr::from(0)),
                    _ => Expr::Add(out),
                }
            }
            Expr::Mul(a) => {
                let mut coeff = Rational::one();
                let mut factors: Vec<(Expr, Expr)> = vec![];

                let mut absorb = |f: Expr, coeff: &mut Rational| {
                    let (base, exp) = match f {
                        Expr::Num(r) => {
                            *coeff *= &r;
                            return;
                        }
                        Expr::Pow(b, e) if e.as_num().is_some() => (*b, *e),
                        f => (f, Expr::from(1)),
                    };

                    if let Some(m) = factors.iter_mut().find(|(b, _)| *b == base) {
                        if let (Some(x), Some(y)) = (m.1.as_num(), exp.as_num()) {
                            m.1 = Expr::Num(x + y);
                            return;
                        }
                    }
                    factors.push((base, exp));
                };

                for f in a {
                    match f.simplify() {
                        Expr::Mul(inner) => {
                            for f in inner {
                                absorb(f, &mut coeff);
                            }
                        }
                        f => absorb(f, &mut coeff),
                    }
                }

                if coeff.is_zero() {
                    return Expr::from(0);
                }

                let mut out = vec![];
                for (b, e) in factors {
                    match power(b, e) {
                        Expr::Num(r) => coeff *= &r,
                        Expr::Mul(inner) => {
                            for f in inner {
                                match f {
                                    Expr::Num(r) => coeff *= &r,
                                    f => out.push(f),
                                }
                            }
                        }
                        f => out.push(f),
                    }
                }

                if coeff.is_zero() {
                    return Expr::from(0);
                }
                if !coeff.is_one() || out.is_empty() {
                    out.insert(0, Expr::Num(coeff));
                }

                match out.len() {
                    1 => out.pop().unwrap_or_else(|| Expr::from(1)),
                    _ => Expr::Mul(out),
                }
            }
            Expr::Pow(b, e) => power(b.simplify(), e.simplify()),
            Expr::Fn(f, u) => {
                let u = u.simplify();
                match (f, &u) {
                    (Builtin::Ln, Expr::Const(Constant::E)) => Expr::from(1),
                    (Builtin::Ln, Expr::Fn(Builtin::Exp, v)) => (**v).clone(),
                    (Builtin::Ln, Expr::Num(r)) if r.is_one() => Expr::from(0),
                    (Builtin::Sin | Builtin::Tan, Expr::Num(r)) if r.is_zero() => Expr::from(0),
                    (Builtin::Cos | Builtin::Exp, Expr::Num(r)) if r.is_zero() => Expr::from(1),
                    (Builtin::Sqrt, Expr::Num(r)) if r.sqrt_exact().is_some() => {
                        Expr::Num(r.sqrt_exact().unwrap_or_else(Rational::zero))
                    }
                    _ => Expr::func(*f, u),
                }
            }
        }
    }
}

/// Build `b^e` from simplified parts.
fn power(b: Expr, e: Expr) -> Expr {
    if e.is_zero() || b.is_one() {
        return Expr::from(1);
    }
    if e.is_one() {
        return b;
    }

    if let (Some(x), Some(n)) = (b.as_num(), e.as_num().and_then(small_integer)) {
        if let Ok(v) = x.pow(n) {
            return Expr::Num(v);
        }
    }

    if let Some(n) = e.as_num().filter(|r| r.is_integer()) {
        match b {
            // (b^a)^n = b^(an) for integer n
            Expr::Pow(bb, a) if a.as_num().is_some() => {
                let a = a.as_num().cloned().unwrap_or_else(Rational::one);
                return power(*bb, Expr::Num(&a * n));
            }
            Expr::Mul(fs) => {
                return Expr::Mul(fs.into_iter().map(|f| power(f, e.clone())).collect())
                    .simplify();
            }
            b => return Expr::pow(b, e),
        }
    }

    Expr::pow(b, e)
}

#[cfg(test)]
mod test {
    use crate::{function::Function, parser::parse};

    fn d(text: &str) -> String {
        parse(text, 'x').unwrap().derivative().to_string()
    }

    #[test]
    fn polynomials() {
        assert_eq!(d("x^2 - 2"), "2*x");
        assert_eq!(d("x^3"), "3*x^2");
        assert_eq!(d("3x^2 + 2x + 1"), "6*x + 2");
        assert_eq!(d("1/x"), "-1/x^2");
        assert_eq!(d("5"), "0");
        assert_eq!(d("x*x"), "2*x");
    }

    #[test]
    fn elementary_functions() {
        assert_eq!(d("sin(x)"), "cos(x)");
        assert_eq!(d("cos(x)"), "-sin(x)");
        assert_eq!(d("e^x"), "e^x");
        assert_eq!(d("exp(2x)"), "2*exp(2*x)");
        assert_eq!(d("ln(x)"), "1/x");
    }

    /// Compare with a central difference quotient.
    #[test]
    fn numerical_agreement() {
        for text in [
            "sin(x)*x^2",
            "tan(x) + sqrt(x)",
            "x^x",
            "2^x - ln(x^2 + 1)",
            "cos(3x)/x",
            "x^(1/3) + log(x, 2)",
        ] {
            let e = parse(text, 'x').unwrap();
            let de = e.derivative();
            for x in [0.3, 0.7, 1.1] {
                let h = 1e-6;
                let approx = (e.eval(x + h).unwrap() - e.eval(x - h).unwrap()) / (2. * h);
                let exact = de.eval(x).unwrap();
                assert!(
                    (approx - exact).abs() < 1e-5 * (1. + exact.abs()),
                    "{}: {} vs {} ({})",
                    text,
                    approx,
                    exact,
                    de
                );
            }
        }
    }

    #[test]
    fn naming() {
        let f = Function::new("g(t)", "t^2").unwrap();
        let df = f.derivative();
        assert_eq!(df.name(), "g'(t)");
        assert_eq!(df.derivative().name(), "g''(t)");
        assert_eq!(df.derivative().to_string(), "g''(t) = 2");
    }
}
