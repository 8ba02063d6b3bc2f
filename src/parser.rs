//! An operator-precedence parser for single-variable expressions.
//!
//! The input is first tokenized and reduced into a [`Token`] tree with a shift-reduce
//! loop, which is then lowered to an [`Expr`] for a given variable.

use std::fmt::Write;

use ahash::HashMap;
use once_cell::sync::Lazy;
use smallvec::SmallVec;
use smartstring::{LazyCompact, SmartString};

use crate::{
    domains::rational::Rational,
    error::{Error, Result},
    function::{Builtin, Constant, Expr},
};

static BUILTINS: Lazy<HashMap<&'static str, Builtin>> = Lazy::new(|| {
    let mut m = HashMap::default();
    m.insert("sin", Builtin::Sin);
    m.insert("cos", Builtin::Cos);
    m.insert("tan", Builtin::Tan);
    m.insert("exp", Builtin::Exp);
    m.insert("ln", Builtin::Ln);
    m.insert("log", Builtin::Ln);
    m.insert("sqrt", Builtin::Sqrt);
    m
});

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ParseState {
    Identifier,
    Number,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    Mul,
    Add,
    Pow,
    Argument, // comma
    Neg,      // left side should be tagged as 'finished'
    Inv,      // left side should be tagged as 'finished', for internal use
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Mul => f.write_char('*'),
            Operator::Add => f.write_char('+'),
            Operator::Pow => f.write_char('^'),
            Operator::Argument => f.write_char(','),
            Operator::Neg => f.write_char('-'),
            Operator::Inv => f.write_char('/'),
        }
    }
}

impl Operator {
    #[inline]
    pub fn get_precedence(&self) -> u8 {
        match self {
            Operator::Mul => 8,
            Operator::Add => 7,
            Operator::Pow => 11,
            Operator::Argument => 6,
            Operator::Neg => 10,
            Operator::Inv => 9,
        }
    }

    #[inline]
    pub fn right_associative(&self) -> bool {
        !matches!(self, Operator::Pow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Number(SmartString<LazyCompact>),
    ID(SmartString<LazyCompact>),
    Op(bool, bool, Operator, Vec<Token>),
    Fn(bool, Vec<Token>),
    Start,
    OpenParenthesis,
    CloseParenthesis,
    EOF,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => f.write_str(n),
            Token::ID(v) => f.write_str(v),
            Token::Op(_, _, o, m) => {
                let mut first = true;
                f.write_char('(')?;

                for mm in m {
                    if !first {
                        match o {
                            Operator::Inv => f.write_str("1/")?,
                            o => write!(f, "{}", o)?,
                        }
                    } else if *o == Operator::Neg {
                        f.write_char('-')?;
                    } else if *o == Operator::Inv {
                        f.write_str("1/")?;
                    }
                    first = false;

                    mm.fmt(f)?;
                }
                f.write_char(')')
            }
            Token::Fn(_, args) => {
                if let Some(name) = args.first() {
                    name.fmt(f)?;
                }

                f.write_char('(')?;
                for (i, aa) in args.iter().skip(1).enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    aa.fmt(f)?;
                }
                f.write_char(')')
            }
            Token::Start => f.write_str("START"),
            Token::OpenParenthesis => f.write_char('('),
            Token::CloseParenthesis => f.write_char(')'),
            Token::EOF => f.write_str("EOF"),
        }
    }
}

/// Whether a `+`, `-` or `/` read after `t` is a unary operator.
fn expects_operand(t: Option<&Token>) -> bool {
    matches!(
        t,
        Some(Token::Start | Token::OpenParenthesis | Token::Fn(true, _) | Token::Op(_, true, _, _))
    )
}

impl Token {
    /// Return if the token does not require any further arguments.
    fn is_normal(&self) -> bool {
        match self {
            Token::Number(_) => true,
            Token::ID(_) => true,
            Token::Op(more_left, more_right, _, _) => !more_left && !more_right,
            Token::Fn(more_right, _) => !more_right,
            _ => false,
        }
    }

    /// Get the precedence of the token.
    #[inline]
    fn get_precedence(&self) -> u8 {
        match self {
            Token::Number(_) => 11,
            Token::ID(_) => 11,
            Token::Op(_, _, o, _) => o.get_precedence(),
            Token::Fn(_, _) | Token::OpenParenthesis | Token::CloseParenthesis => 5,
            Token::Start | Token::EOF => 4,
        }
    }

    /// Add `other` to the left side of `self`, where `self` is a binary operation.
    #[inline]
    fn add_left(&mut self, other: Token) -> std::result::Result<(), String> {
        if let Token::Op(ml, _, o1, args) = self {
            *ml = false;

            if let Token::Op(_, _, o2, mut args2) = other {
                if *o1 == o2 {
                    // add from the left by swapping and then extending from the right
                    std::mem::swap(args, &mut args2);
                    args.append(&mut args2);
                } else {
                    args.insert(0, Token::Op(false, false, o2, args2));
                }
            } else {
                args.insert(0, other);
            }
            Ok(())
        } else {
            Err(format!(
                "operator expected, but found '{}'. Are parentheses unbalanced?",
                self
            ))
        }
    }

    fn distribute_neg(&mut self) {
        match self {
            Token::Op(_, _, Operator::Neg, args3) if args3.len() == 1 => {
                if let Some(t) = args3.pop() {
                    *self = t;
                }
            }
            Token::Op(_, _, Operator::Mul, args2) if !args2.is_empty() => {
                args2[0].distribute_neg();
            }
            Token::Op(_, _, Operator::Add, args2) => {
                for a in args2 {
                    a.distribute_neg();
                }
            }
            Token::Number(n) => {
                if n.starts_with('-') {
                    n.remove(0);
                } else {
                    n.insert(0, '-');
                }
            }
            _ => {
                let t = std::mem::replace(self, Token::EOF);
                *self = Token::Op(false, false, Operator::Neg, vec![t]);
            }
        }
    }

    /// Add `other` to right side of `self`, where `self` is a binary operation.
    #[inline]
    fn add_right(&mut self, mut other: Token) -> std::result::Result<(), String> {
        if let Token::Op(_, mr, o1, args) = self {
            *mr = false;

            if *o1 == Operator::Neg {
                other.distribute_neg();
                *self = other;
                return Ok(());
            }

            if let Token::Op(_, _, o2, mut args2) = other {
                if *o1 == o2 && o2.right_associative() {
                    if o2 == Operator::Inv && args2.len() == 1 {
                        // twice inv cancels out
                        if let Some(t) = args2.pop() {
                            *self = t;
                        }
                    } else {
                        args.append(&mut args2)
                    }
                } else {
                    args.push(Token::Op(false, false, o2, args2));
                }
            } else {
                args.push(other);
            }

            Ok(())
        } else {
            Err(format!(
                "operator expected, but found '{}'. Are parentheses unbalanced?",
                self
            ))
        }
    }

    /// Tokenize and reduce `input` into a single token tree.
    ///
    /// Implicit multiplication is inserted between adjacent operands, so that `2x`,
    /// `x y` and `2(x + 1)` are products.
    pub fn parse(input: &str) -> std::result::Result<Token, String> {
        let mut stack: Vec<_> = Vec::with_capacity(20);
        stack.push(Token::Start);
        let mut state = ParseState::Any;

        let whitespace = [' ', '\t', '\n', '\r'];

        let mut char_iter = input.chars();
        let mut c = char_iter.next().unwrap_or('\0'); // add EOF as a token
        let mut extra_ops: SmallVec<[char; 6]> = SmallVec::new();

        let mut id_buffer = String::with_capacity(30);

        let mut column_counter = 1;

        loop {
            match state {
                ParseState::Identifier => {
                    if c.is_alphabetic() || c == '_' {
                        id_buffer.push(c);
                    } else {
                        state = ParseState::Any;
                        stack.push(Token::ID(id_buffer.as_str().into()));
                        id_buffer.clear();
                    }
                }
                ParseState::Number => {
                    if c.is_ascii_digit() || c == '.' {
                        id_buffer.push(c);
                    } else {
                        state = ParseState::Any;
                        stack.push(Token::Number(id_buffer.as_str().into()));
                        id_buffer.clear();
                    }
                }
                ParseState::Any => {}
            }

            if state == ParseState::Any {
                if whitespace.contains(&c) {
                    column_counter += 1;
                    c = char_iter.next().unwrap_or('\0');
                    continue;
                }

                match c {
                    '+' => {
                        if !expects_operand(stack.last()) {
                            stack.push(Token::Op(true, true, Operator::Add, vec![]))
                        }
                        // a unary + can be ignored as plus is the default
                    }
                    '^' => stack.push(Token::Op(true, true, Operator::Pow, vec![])),
                    '*' => stack.push(Token::Op(true, true, Operator::Mul, vec![])),
                    '-' => {
                        if expects_operand(stack.last()) {
                            // unary minus only requires an argument to the right
                            stack.push(Token::Op(false, true, Operator::Neg, vec![]));
                        } else {
                            stack.push(Token::Op(true, true, Operator::Add, vec![]));
                            extra_ops.push('-'); // push a unary minus
                        }
                    }
                    '(' => {
                        // check if the opening bracket belongs to a function
                        if let Some(Token::ID(_)) = stack.last() {
                            if let Some(name) = stack.pop() {
                                stack.push(Token::Fn(true, vec![name])); // serves as open paren
                            }
                        } else if stack.last().map_or(false, Token::is_normal) {
                            // insert multiplication: 2(...) -> 2*(...)
                            stack.push(Token::Op(true, true, Operator::Mul, vec![]));
                            extra_ops.push(c);
                        } else {
                            stack.push(Token::OpenParenthesis)
                        }
                    }
                    ')' => stack.push(Token::CloseParenthesis),
                    '/' => {
                        if expects_operand(stack.last()) {
                            // unary inv only requires an argument to the right
                            stack.push(Token::Op(false, true, Operator::Inv, vec![]));
                        } else {
                            stack.push(Token::Op(true, true, Operator::Mul, vec![]));
                            extra_ops.push('/'); // push a (unary) inverse
                        }
                    }
                    ',' => stack.push(Token::Op(true, true, Operator::Argument, vec![])),
                    '\0' => stack.push(Token::EOF),
                    _ => {
                        if !(c.is_alphanumeric() || c == '.' || c == '_') {
                            Err(format!("unexpected '{}' at position {}", c, column_counter))?;
                        }

                        if stack.last().map_or(false, Token::is_normal) {
                            // insert multiplication: x y -> x*y
                            stack.push(Token::Op(true, true, Operator::Mul, vec![]));
                            extra_ops.push(c);
                        } else if c.is_ascii_digit() || c == '.' {
                            state = ParseState::Number;
                            id_buffer.push(c);
                        } else {
                            state = ParseState::Identifier;
                            id_buffer.push(c);
                        }
                    }
                }
            }

            // match on triplets of type operator identifier operator
            while state == ParseState::Any && stack.len() > 2 {
                if !stack[stack.len() - 2].is_normal() {
                    // check if the left operator needs a right-hand side and the new operator still needs a left-hand side
                    if let Some(Token::Op(true, _, op, _)) = stack.last() {
                        Err(format!(
                            "operator '{}' at position {} is missing a left-hand side",
                            op, column_counter,
                        ))?;
                    }

                    if let Some(Token::CloseParenthesis) = stack.last() {
                        let pos = stack.len() - 2;
                        // check if we have an empty function
                        if let Token::Fn(f, _) = &mut stack[pos] {
                            *f = false;
                            stack.pop();
                        } else {
                            Err(format!("unexpected ')' at position {}", column_counter))?;
                        }
                    }

                    // no simplification, get new token
                    break;
                }

                let (Some(mut last), Some(middle)) = (stack.pop(), stack.pop()) else {
                    return Err("unexpected end of the token stack".to_owned());
                };
                let Some(mut first) = stack.last_mut() else {
                    return Err("unexpected end of the token stack".to_owned());
                };

                match first.get_precedence().cmp(&last.get_precedence()) {
                    std::cmp::Ordering::Greater => {
                        first
                            .add_right(middle)
                            .map_err(|e| format!("error at position {}: {}", column_counter, e))?;
                        stack.push(last);
                    }
                    std::cmp::Ordering::Less => {
                        last.add_left(middle)
                            .map_err(|e| format!("error at position {}: {}", column_counter, e))?;
                        stack.push(last);
                    }
                    std::cmp::Ordering::Equal => {
                        // same degree, special merges!
                        match (&mut first, middle, last) {
                            (Token::Start, mid, Token::EOF) => {
                                *first = mid;
                            }
                            (Token::Fn(mr, args), mid, Token::CloseParenthesis) => {
                                *mr = false;

                                if let Token::Op(_, _, Operator::Argument, arg2) = mid {
                                    args.extend(arg2);
                                } else {
                                    args.push(mid);
                                }
                            }
                            (Token::OpenParenthesis, mid, Token::CloseParenthesis) => {
                                *first = mid;
                            }
                            (Token::Op(_, mr1, o1, m), mid, Token::Op(_, mr2, mut o2, mut mm)) => {
                                // same precedence, so left associate

                                // flatten if middle identifier is also a binary operator of the same type that
                                // is also right associative
                                if let Token::Op(_, _, o_mid, mut m_mid) = mid {
                                    if o_mid == *o1 && o_mid.right_associative() {
                                        m.append(&mut m_mid);
                                    } else {
                                        m.push(Token::Op(false, false, o_mid, m_mid));
                                    }
                                } else {
                                    m.push(mid)
                                }

                                // may not be the same operator, in the case of * and /
                                if *o1 == o2 {
                                    m.append(&mut mm);
                                    *mr1 = mr2;
                                } else {
                                    // embed operator 1 in operator 2
                                    *mr1 = mr2;
                                    std::mem::swap(o1, &mut o2);
                                    std::mem::swap(m, &mut mm);
                                    m.insert(0, Token::Op(false, false, o2, mm));
                                }
                            }
                            (_, _, last) => {
                                return Err(format!(
                                    "unbalanced expression near '{}' at position {}",
                                    last, column_counter
                                ))
                            }
                        }
                    }
                }
            }

            if c == '\0' {
                break;
            }

            // first drain the queue of extra operators
            if extra_ops.is_empty() {
                column_counter += 1;
                c = char_iter.next().unwrap_or('\0');
            } else {
                c = extra_ops.remove(0);
            }
        }

        if stack.len() == 1 {
            stack.pop().ok_or_else(|| "expression is empty".to_owned())
        } else {
            match stack.get(stack.len().saturating_sub(2)) {
                Some(Token::Op(false, true, op, _)) => Err(format!(
                    "unexpected end of input: missing right-hand side for operator '{}'",
                    op
                )),
                Some(Token::OpenParenthesis) => {
                    Err("unexpected end of input: open parenthesis is not closed".to_string())
                }
                Some(Token::Fn(true, args)) => Err(format!(
                    "unexpected end of input: missing closing parenthesis for function '{}'",
                    args.first().map(|a| a.to_string()).unwrap_or_default()
                )),
                Some(Token::Start) => Err("expression is empty".to_string()),
                _ => Err("malformed expression".to_string()),
            }
        }
    }

    /// Lower the token tree to an expression in the variable `var`.
    pub fn to_expr(&self, var: char) -> Result<Expr> {
        match self {
            Token::Number(n) => Ok(Expr::Num(n.parse::<Rational>()?)),
            Token::ID(name) => lower_symbol(name, var).ok_or_else(|| {
                if BUILTINS.contains_key(name.as_str()) {
                    Error::Parse(format!("function '{}' needs an argument", name))
                } else {
                    Error::Parse(format!("unknown symbol '{}'", name))
                }
            }),
            Token::Op(_, _, op, args) => match op {
                Operator::Mul => Ok(Expr::Mul(
                    args.iter()
                        .map(|a| a.to_expr(var))
                        .collect::<Result<_>>()?,
                )),
                Operator::Add => Ok(Expr::Add(
                    args.iter()
                        .map(|a| a.to_expr(var))
                        .collect::<Result<_>>()?,
                )),
                Operator::Pow => {
                    // pow is right associative
                    let mut it = args.iter().rev();
                    let Some(last) = it.next() else {
                        return Err(Error::Parse("empty power".to_owned()));
                    };

                    let mut out = last.to_expr(var)?;
                    for a in it {
                        out = Expr::pow(a.to_expr(var)?, out);
                    }
                    Ok(out)
                }
                Operator::Argument => Err(Error::Parse("unexpected ','".to_owned())),
                Operator::Neg => match args.as_slice() {
                    [a] => Ok(Expr::Mul(vec![Expr::Num((-1).into()), a.to_expr(var)?])),
                    _ => Err(Error::Parse("malformed negation".to_owned())),
                },
                Operator::Inv => match args.as_slice() {
                    [a] => Ok(Expr::pow(a.to_expr(var)?, Expr::Num((-1).into()))),
                    _ => Err(Error::Parse("malformed division".to_owned())),
                },
            },
            Token::Fn(_, args) => {
                let Some((Token::ID(name), rest)) = args.split_first() else {
                    return Err(Error::Parse("malformed function call".to_owned()));
                };

                let rest = rest
                    .iter()
                    .map(|a| a.to_expr(var))
                    .collect::<Result<Vec<_>>>()?;

                // the variable or a constant followed by parentheses is a product
                if let Some(s) = lower_symbol(name, var) {
                    return match <[Expr; 1]>::try_from(rest) {
                        Ok([a]) => Ok(Expr::Mul(vec![s, a])),
                        Err(_) => Err(Error::Parse(format!(
                            "'{}' cannot be called with several arguments",
                            name
                        ))),
                    };
                }

                let Some(&builtin) = BUILTINS.get(name.as_str()) else {
                    return Err(Error::Parse(format!("unknown function '{}'", name)));
                };

                match <[Expr; 2]>::try_from(rest) {
                    // log(u, b) is the logarithm of u in base b
                    Ok([u, b]) if name.as_str() == "log" => Ok(Expr::Mul(vec![
                        Expr::Fn(Builtin::Ln, Box::new(u)),
                        Expr::pow(Expr::Fn(Builtin::Ln, Box::new(b)), Expr::Num((-1).into())),
                    ])),
                    Ok(_) => Err(Error::Parse(format!(
                        "function '{}' takes one argument",
                        name
                    ))),
                    Err(rest) => match <[Expr; 1]>::try_from(rest) {
                        Ok([u]) => Ok(Expr::Fn(builtin, Box::new(u))),
                        Err(_) => Err(Error::Parse(format!(
                            "function '{}' takes one argument",
                            name
                        ))),
                    },
                }
            }
            x => Err(Error::Parse(format!("unexpected token {}", x))),
        }
    }
}

/// The expression for a bare symbol: the variable or a named constant.
fn lower_symbol(name: &str, var: char) -> Option<Expr> {
    let mut chars = name.chars();
    if chars.next() == Some(var) && chars.next().is_none() {
        return Some(Expr::Var(var));
    }

    match name {
        "e" => Some(Expr::Const(Constant::E)),
        "pi" | "π" => Some(Expr::Const(Constant::Pi)),
        _ => None,
    }
}

/// Map the typographic operators a user may paste to their ASCII form.
fn normalize_input(input: &str) -> String {
    input
        .replace("**", "^")
        .chars()
        .map(|c| match c {
            '−' | '–' => '-',
            '·' | '×' | '⋅' | '•' => '*',
            c => c,
        })
        .collect()
}

/// Parse `input` as an expression in the variable `var`.
pub fn parse(input: &str, var: char) -> Result<Expr> {
    let token = Token::parse(&normalize_input(input)).map_err(Error::Parse)?;
    Ok(token.to_expr(var)?.fold_numbers())
}

#[cfg(test)]
mod test {
    use crate::{
        error::Error,
        function::{Builtin, Constant, Expr},
    };

    use super::{parse, Token};

    #[test]
    fn precedence() {
        let e = parse("1 + 2*x^2", 'x').unwrap();
        assert_eq!(
            e,
            Expr::Add(vec![
                Expr::Num(1.into()),
                Expr::Mul(vec![
                    Expr::Num(2.into()),
                    Expr::pow(Expr::Var('x'), Expr::Num(2.into()))
                ])
            ])
        );

        let e = parse("-x^2", 'x').unwrap();
        assert_eq!(e.eval(3.).unwrap(), -9.);

        assert_eq!(parse("2^3^2", 'x').unwrap().eval(0.).unwrap(), 512.);
        assert_eq!(parse("x^-1", 'x').unwrap().eval(4.).unwrap(), 0.25);
    }

    #[test]
    fn implicit_multiplication() {
        for (input, expected) in [
            ("2x", 6.),
            ("2(x + 1)", 8.),
            ("x(x - 1)", 6.),
            ("(x)(x)", 9.),
            ("3x^2 − 2·x", 21.),
            ("x/2/3", 0.5),
            ("1.5x", 4.5),
        ] {
            assert_eq!(parse(input, 'x').unwrap().eval(3.).unwrap(), expected, "{}", input);
        }
    }

    #[test]
    fn functions_and_constants() {
        let e = parse("sin(x) + e^x + pi", 't');
        assert!(matches!(e, Err(Error::Parse(_))));

        let e = parse("sin(t) + e^t + π", 't').unwrap();
        let Expr::Add(terms) = &e else {
            panic!("expected a sum");
        };
        assert_eq!(terms[0], Expr::Fn(Builtin::Sin, Box::new(Expr::Var('t'))));
        assert_eq!(terms[2], Expr::Const(Constant::Pi));

        let e = parse("log(x, 2)", 'x').unwrap();
        assert!((e.eval(8.).unwrap() - 3.).abs() < 1e-12);
        assert!((parse("log(x)", 'x').unwrap().eval(1.).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn errors() {
        for input in ["", "x +", "(x", "sin(x", "x + )", "y", "sin", "sin()", "x; 2", "1.2.3x", "*x"] {
            assert!(parse(input, 'x').is_err(), "{}", input);
        }
        assert!(Token::parse("(x").is_err());
    }
}
