//! Formatting helpers shared by every procedure trace.
//!
//! None of these functions keep state. The Unicode minus `−` is used for every
//! negative quantity; the ASCII hyphen never appears in procedure text.

use std::fmt::{self, Display};

use crate::{
    domains::rational::Rational,
    settings,
    tensors::{matrix::Matrix, vector::Vector},
};

pub const MINUS: char = '−';
pub const BULLET: char = '•';

/// Policy switches for rendering a rational that multiplies something else.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FactorOptions {
    /// Render `1` as the empty string and `−1` as a bare sign.
    pub hide_unit: bool,
    pub parenthesize_negative: bool,
    pub parenthesize_fraction: bool,
    /// Append a `•` after a non-empty factor.
    pub trailing_bullet: bool,
}

impl Default for FactorOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl FactorOptions {
    /// Render the factor as a plain number.
    pub const fn new() -> Self {
        FactorOptions {
            hide_unit: false,
            parenthesize_negative: false,
            parenthesize_fraction: false,
            trailing_bullet: false,
        }
    }

    /// Options for a coefficient written directly in front of a name, as in `2A` or `(1/2)R₁`.
    pub const fn coefficient() -> Self {
        FactorOptions {
            hide_unit: true,
            parenthesize_negative: false,
            parenthesize_fraction: true,
            trailing_bullet: false,
        }
    }

    /// Options for the right operand of a binary operation, as in `3 · (−2)`.
    pub const fn operand() -> Self {
        FactorOptions {
            hide_unit: false,
            parenthesize_negative: true,
            parenthesize_fraction: false,
            trailing_bullet: false,
        }
    }

    pub const fn hide_unit(mut self, hide: bool) -> Self {
        self.hide_unit = hide;
        self
    }

    pub const fn parenthesize_negative(mut self, parenthesize: bool) -> Self {
        self.parenthesize_negative = parenthesize;
        self
    }

    pub const fn parenthesize_fraction(mut self, parenthesize: bool) -> Self {
        self.parenthesize_fraction = parenthesize;
        self
    }

    pub const fn trailing_bullet(mut self, bullet: bool) -> Self {
        self.trailing_bullet = bullet;
        self
    }
}

/// Render a rational factor according to `opts`.
pub fn format_factor(r: &Rational, opts: FactorOptions) -> String {
    if opts.hide_unit {
        if r.is_one() {
            return String::new();
        }
        if (-r).is_one() {
            return MINUS.to_string();
        }
    }

    let text = r.display();
    let mut out = if (r.is_negative() && opts.parenthesize_negative)
        || (text.contains('/') && opts.parenthesize_fraction)
    {
        format!("({})", text)
    } else {
        text
    };

    if opts.trailing_bullet {
        out.push(BULLET);
    }
    out
}

/// Normalize an operator character to the one used in traces.
fn normalize_operator(op: char) -> char {
    match op {
        '-' => MINUS,
        '*' | '×' => '·',
        c => c,
    }
}

/// Render the binary sub-step `[ a op b ]`.
///
/// Adding a negative is written as a subtraction and subtracting a negative as an
/// addition, so `+ (−x)` becomes `− x`.
pub fn format_step(a: &Rational, b: &Rational, op: char) -> String {
    let op = normalize_operator(op);

    match op {
        '+' | MINUS if b.is_negative() => {
            let flipped = if op == '+' { MINUS } else { '+' };
            format!("[ {} {} {} ]", a.display(), flipped, b.abs().display())
        }
        '+' | MINUS => format!("[ {} {} {} ]", a.display(), op, b.display()),
        _ => format!(
            "[ {} {} {} ]",
            a.display(),
            op,
            format_factor(b, FactorOptions::operand())
        ),
    }
}

/// Render a decimal with `precision` digits after the point.
pub fn format_decimal_with(x: f64, precision: usize) -> String {
    if x.is_nan() {
        return "NaN".to_owned();
    }
    if x.is_infinite() {
        return if x < 0. {
            format!("{}∞", MINUS)
        } else {
            "∞".to_owned()
        };
    }

    let s = format!("{:.*}", precision, x);
    match s.strip_prefix('-') {
        // a value that rounds to zero carries no sign
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => rest.to_owned(),
        Some(rest) => format!("{}{}", MINUS, rest),
        None => s,
    }
}

/// Render a decimal with the process-wide precision.
pub fn format_decimal(x: f64) -> String {
    format_decimal_with(x, settings::decimal_precision() as usize)
}

/// Replace the ASCII hyphen by the Unicode minus.
pub fn unicode_minus(s: &str) -> String {
    s.replace('-', &MINUS.to_string())
}

/// Write `n` with Unicode subscript digits.
pub fn subscript(n: usize) -> String {
    const DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];
    n.to_string()
        .chars()
        .map(|c| DIGITS[c.to_digit(10).unwrap_or(0) as usize])
        .collect()
}

/// Lay out a grid of cells as bracketed rows with right-aligned columns.
/// A `|` is inserted before column `separator`, if given.
pub fn format_grid(rows: &[Vec<String>], separator: Option<usize>) -> String {
    let ncols = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut widths = vec![0; ncols];
    for r in rows {
        for (w, c) in widths.iter_mut().zip(r) {
            *w = (*w).max(c.chars().count());
        }
    }

    let mut out = String::new();
    for (ri, r) in rows.iter().enumerate() {
        if ri > 0 {
            out.push('\n');
        }

        out.push_str("[ ");
        for (ci, (c, w)) in r.iter().zip(&widths).enumerate() {
            if ci > 0 {
                if separator == Some(ci) {
                    out.push_str(" | ");
                } else {
                    out.push_str("  ");
                }
            }

            let pad = w - c.chars().count();
            out.extend(std::iter::repeat(' ').take(pad));
            out.push_str(c);
        }
        out.push_str(" ]");
    }
    out
}

/// A write-only accumulator for procedure text.
#[derive(Debug, Default, Clone)]
pub struct Trace {
    text: String,
}

impl Trace {
    pub fn new() -> Trace {
        Trace {
            text: String::new(),
        }
    }

    /// Append one line.
    pub fn line(&mut self, line: impl AsRef<str>) {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    /// Append a multi-line block, such as a matrix.
    pub fn block(&mut self, block: impl Display) {
        self.text.push_str(&block.to_string());
        self.text.push('\n');
    }

    pub fn blank(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with("\n\n") {
            self.text.push('\n');
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Return the finished text, without the trailing newline.
    pub fn finish(mut self) -> String {
        while self.text.ends_with('\n') {
            self.text.pop();
        }
        self.text
    }
}

/// Pretty-print a matrix with right-aligned columns and an optional constants separator.
pub struct MatrixPrinter<'a> {
    matrix: &'a Matrix,
}

impl<'a> MatrixPrinter<'a> {
    pub fn new(matrix: &'a Matrix) -> MatrixPrinter<'a> {
        MatrixPrinter { matrix }
    }
}

impl<'a> Display for MatrixPrinter<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rows: Vec<Vec<String>> = self
            .matrix
            .row_iter()
            .map(|r| r.iter().map(|e| e.display()).collect())
            .collect();

        let separator = if self.matrix.is_augmented() {
            Some(self.matrix.ncols() - 1)
        } else {
            None
        };

        f.write_str(&format_grid(&rows, separator))
    }
}

/// Print a vector as a column.
pub struct VectorPrinter<'a> {
    vector: &'a Vector,
}

impl<'a> VectorPrinter<'a> {
    pub fn new(vector: &'a Vector) -> VectorPrinter<'a> {
        VectorPrinter { vector }
    }
}

impl<'a> Display for VectorPrinter<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rows: Vec<Vec<String>> = self.vector.iter().map(|e| vec![e.display()]).collect();
        f.write_str(&format_grid(&rows, None))
    }
}

#[cfg(test)]
mod test {
    use super::{
        format_decimal_with, format_factor, format_grid, format_step, subscript, FactorOptions,
        Trace,
    };
    use crate::domains::rational::Rational;

    #[test]
    fn factors() {
        let half = Rational::from((1, 2));
        let neg = Rational::from(-3);

        assert_eq!(format_factor(&Rational::one(), FactorOptions::coefficient()), "");
        assert_eq!(format_factor(&Rational::one(), FactorOptions::new()), "1");
        assert_eq!(format_factor(&Rational::from(-1), FactorOptions::coefficient()), "−");
        assert_eq!(format_factor(&half, FactorOptions::coefficient()), "(1/2)");
        assert_eq!(format_factor(&neg, FactorOptions::operand()), "(−3)");
        assert_eq!(
            format_factor(&neg, FactorOptions::new().trailing_bullet(true)),
            "−3•"
        );
    }

    #[test]
    fn steps() {
        let a = Rational::from(1);
        let b = Rational::from(-2);
        assert_eq!(format_step(&a, &b, '+'), "[ 1 − 2 ]");
        assert_eq!(format_step(&a, &b, '-'), "[ 1 + 2 ]");
        assert_eq!(format_step(&a, &b, '*'), "[ 1 · (−2) ]");
        assert_eq!(format_step(&b, &a, '+'), "[ −2 + 1 ]");
    }

    #[test]
    fn decimals() {
        assert_eq!(format_decimal_with(-1.23456, 3), "−1.235");
        assert_eq!(format_decimal_with(-0.0001, 3), "0.000");
        assert_eq!(format_decimal_with(2.0, 6), "2.000000");
    }

    #[test]
    fn grid() {
        let rows = vec![
            vec!["1".to_owned(), "−2".to_owned(), "5".to_owned()],
            vec!["10".to_owned(), "3".to_owned(), "1".to_owned()],
        ];
        assert_eq!(
            format_grid(&rows, Some(2)),
            "[  1  −2 | 5 ]\n[ 10   3 | 1 ]"
        );
        assert_eq!(subscript(12), "₁₂");
    }

    #[test]
    fn trace_blocks() {
        let mut t = Trace::new();
        t.line("Start");
        t.block("[ 1 ]\n[ 2 ]");
        t.blank();
        t.blank();
        t.line("End");
        assert_eq!(t.finish(), "Start\n[ 1 ]\n[ 2 ]\n\nEnd");
    }
}
