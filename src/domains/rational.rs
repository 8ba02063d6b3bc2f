use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    iter::Sum,
    ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use rug::{ops::Pow, Integer};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    error::{Error, Result},
    settings,
};

/// An exact rational number of arbitrary precision, always in lowest terms.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Rational(rug::Rational);

impl Rational {
    /// Create the rational `num/den`. A zero denominator is an error.
    pub fn new<T: Into<Integer>>(num: T, den: T) -> Result<Rational> {
        let den = den.into();
        if den.cmp0() == Ordering::Equal {
            return Err(Error::Arithmetic(
                "the denominator of a rational cannot be zero".to_owned(),
            ));
        }

        Ok(Rational(rug::Rational::from((num.into(), den))))
    }

    pub fn zero() -> Rational {
        Rational(rug::Rational::new())
    }

    pub fn one() -> Rational {
        Rational(rug::Rational::from(1))
    }

    pub fn is_zero(&self) -> bool {
        self.0.cmp0() == Ordering::Equal
    }

    pub fn is_one(&self) -> bool {
        *self.0.numer() == 1 && *self.0.denom() == 1
    }

    pub fn is_negative(&self) -> bool {
        self.0.cmp0() == Ordering::Less
    }

    pub fn is_integer(&self) -> bool {
        *self.0.denom() == 1
    }

    pub fn numerator(&self) -> &Integer {
        self.0.numer()
    }

    pub fn denominator(&self) -> &Integer {
        self.0.denom()
    }

    pub fn abs(&self) -> Rational {
        Rational(self.0.clone().abs())
    }

    /// The multiplicative inverse. Zero has none.
    pub fn inv(&self) -> Result<Rational> {
        if self.is_zero() {
            return Err(Error::ZeroDivision("division by zero".to_owned()));
        }

        Ok(Rational(self.0.clone().recip()))
    }

    /// Divide by `other`, failing when `other` is zero.
    pub fn checked_div(&self, other: &Rational) -> Result<Rational> {
        if other.is_zero() {
            return Err(Error::ZeroDivision("division by zero".to_owned()));
        }

        Ok(Rational(rug::Rational::from(&self.0 / &other.0)))
    }

    /// Raise to an integer power. Negative powers of zero are an error.
    pub fn pow(&self, e: i32) -> Result<Rational> {
        if e < 0 && self.is_zero() {
            return Err(Error::ZeroDivision(
                "zero cannot be raised to a negative power".to_owned(),
            ));
        }

        Ok(Rational(self.0.clone().pow(e)))
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64()
    }

    /// Convert a finite floating point number to its exact rational equivalent.
    pub fn from_f64(f: f64) -> Option<Rational> {
        rug::Rational::from_f64(f).map(Rational)
    }

    /// Return the exact square root if both numerator and denominator are perfect squares.
    pub fn sqrt_exact(&self) -> Option<Rational> {
        if self.is_negative() {
            return None;
        }

        let (n, d) = (self.0.numer(), self.0.denom());
        if n.is_perfect_square() && d.is_perfect_square() {
            Some(Rational(rug::Rational::from((
                n.clone().sqrt(),
                d.clone().sqrt(),
            ))))
        } else {
            None
        }
    }

    /// Return the best approximation of the rational number whose denominator
    /// is less than or equal to `max_denominator`.
    pub fn limit_denominator(&self, max_denominator: u64) -> Result<Rational> {
        if max_denominator == 0 {
            return Err(Error::Arithmetic(
                "the denominator limit must be at least 1".to_owned(),
            ));
        }

        let max = Integer::from(max_denominator);
        if *self.0.denom() <= max {
            return Ok(self.clone());
        }

        let (mut p0, mut q0, mut p1, mut q1) = (
            Integer::new(),
            Integer::from(1),
            Integer::from(1),
            Integer::new(),
        );

        let mut n = self.0.numer().clone().abs();
        let mut d = self.0.denom().clone();
        loop {
            let a = Integer::from(&n / &d);
            let q2 = Integer::from(&a * &q1) + &q0;
            if q2 > max {
                break;
            }

            let p2 = Integer::from(&a * &p1) + &p0;
            (p0, q0, p1, q1) = (p1, q1, p2, q2);

            let r = Integer::from(&a * &d);
            let r = n - r;
            n = std::mem::replace(&mut d, r);
        }

        let k = (max - &q0) / &q1;
        let bound1 = rug::Rational::from((
            Integer::from(&k * &p1) + &p0,
            Integer::from(&k * &q1) + &q0,
        ));
        let bound2 = rug::Rational::from((p1, q1));

        let target = self.0.clone().abs();
        let dist1 = rug::Rational::from(&bound1 - &target).abs();
        let dist2 = rug::Rational::from(&bound2 - &target).abs();

        let res = if dist2 <= dist1 { bound2 } else { bound1 };

        if self.is_negative() {
            Ok(Rational(-res))
        } else {
            Ok(Rational(res))
        }
    }

    /// Render the value after limiting the denominator to the process-wide display limit.
    /// The stored value is never changed.
    pub fn display(&self) -> String {
        match self.limit_denominator(settings::display_limit() as u64) {
            Ok(r) => r.to_string(),
            Err(_) => self.to_string(),
        }
    }

    /// Parse a decimal literal such as `12`, `-1.25` or `3e-2`.
    fn parse_decimal(s: &str) -> Result<Rational> {
        let err = || Error::Parse(format!("'{}' is not a number", s));

        let (mantissa, exponent) = match s.find(['e', 'E']) {
            Some(pos) => (
                &s[..pos],
                s[pos + 1..].parse::<i32>().map_err(|_| err())?,
            ),
            None => (s, 0),
        };

        let (negative, digits) = match mantissa.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
        };

        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty()
            || !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit())
        {
            return Err(err());
        }

        let mut num: Integer = format!("{}{}", int_part, frac_part)
            .parse()
            .map_err(|_| err())?;
        if negative {
            num = -num;
        }

        let scale = frac_part.len() as i64 - exponent as i64;
        let scale_u32 = u32::try_from(scale.unsigned_abs()).map_err(|_| err())?;
        let power = Integer::from(10).pow(scale_u32);
        if scale >= 0 {
            Ok(Rational(rug::Rational::from((num, power))))
        } else {
            Ok(Rational(rug::Rational::from(num * power)))
        }
    }
}

impl FromStr for Rational {
    type Err = Error;

    /// Parse `n`, `n/d`, or a decimal literal. Both `-` and `−` are accepted as a sign.
    fn from_str(s: &str) -> Result<Rational> {
        let s = s.trim().replace('−', "-");
        if s.is_empty() {
            return Err(Error::Parse("expected a number".to_owned()));
        }

        match s.split_once('/') {
            Some((n, d)) => {
                let n = Rational::parse_decimal(n.trim())?;
                let d = Rational::parse_decimal(d.trim())?;
                n.checked_div(&d).map_err(|_| {
                    Error::Arithmetic("the denominator of a rational cannot be zero".to_owned())
                })
            }
            None => Rational::parse_decimal(&s),
        }
    }
}

impl Display for Rational {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_negative() {
            f.write_str("−")?;
        }

        let num = self.0.numer().clone().abs();
        if self.is_integer() {
            write!(f, "{}", num)
        } else {
            write!(f, "{}/{}", num, self.0.denom())
        }
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Rational(rug::Rational::from(value))
    }
}

impl From<Integer> for Rational {
    fn from(value: Integer) -> Self {
        Rational(rug::Rational::from(value))
    }
}

impl From<(i64, i64)> for Rational {
    /// Create `num/den`. Panics when `den` is zero; use [`Rational::new`] for a checked version.
    fn from((num, den): (i64, i64)) -> Self {
        Rational(rug::Rational::from((num, den)))
    }
}

impl From<rug::Rational> for Rational {
    fn from(value: rug::Rational) -> Self {
        Rational(value)
    }
}

impl Add<Rational> for Rational {
    type Output = Rational;

    fn add(self, other: Rational) -> Self::Output {
        Rational(self.0 + other.0)
    }
}

impl Sub<Rational> for Rational {
    type Output = Rational;

    fn sub(self, other: Rational) -> Self::Output {
        Rational(self.0 - other.0)
    }
}

impl Mul<Rational> for Rational {
    type Output = Rational;

    fn mul(self, other: Rational) -> Self::Output {
        Rational(self.0 * other.0)
    }
}

impl Div<Rational> for Rational {
    type Output = Rational;

    /// Divide two rationals. Panics when `other` is zero; use [`Rational::checked_div`] instead
    /// when the divisor is not known to be non-zero.
    fn div(self, other: Rational) -> Self::Output {
        Rational(self.0 / other.0)
    }
}

impl<'a> Add<&'a Rational> for &Rational {
    type Output = Rational;

    fn add(self, other: &'a Rational) -> Self::Output {
        Rational(rug::Rational::from(&self.0 + &other.0))
    }
}

impl<'a> Sub<&'a Rational> for &Rational {
    type Output = Rational;

    fn sub(self, other: &'a Rational) -> Self::Output {
        Rational(rug::Rational::from(&self.0 - &other.0))
    }
}

impl<'a> Mul<&'a Rational> for &Rational {
    type Output = Rational;

    fn mul(self, other: &'a Rational) -> Self::Output {
        Rational(rug::Rational::from(&self.0 * &other.0))
    }
}

impl<'a> Div<&'a Rational> for &Rational {
    type Output = Rational;

    fn div(self, other: &'a Rational) -> Self::Output {
        Rational(rug::Rational::from(&self.0 / &other.0))
    }
}

impl<'a> Add<&'a Rational> for Rational {
    type Output = Rational;

    fn add(self, other: &'a Rational) -> Self::Output {
        Rational(self.0 + &other.0)
    }
}

impl<'a> Sub<&'a Rational> for Rational {
    type Output = Rational;

    fn sub(self, other: &'a Rational) -> Self::Output {
        Rational(self.0 - &other.0)
    }
}

impl<'a> Mul<&'a Rational> for Rational {
    type Output = Rational;

    fn mul(self, other: &'a Rational) -> Self::Output {
        Rational(self.0 * &other.0)
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Self::Output {
        Rational(-self.0)
    }
}

impl Neg for &Rational {
    type Output = Rational;

    fn neg(self) -> Self::Output {
        Rational(rug::Rational::from(-&self.0))
    }
}

impl<'a> AddAssign<&'a Rational> for Rational {
    fn add_assign(&mut self, other: &'a Rational) {
        self.0 += &other.0;
    }
}

impl<'a> SubAssign<&'a Rational> for Rational {
    fn sub_assign(&mut self, other: &'a Rational) {
        self.0 -= &other.0;
    }
}

impl<'a> MulAssign<&'a Rational> for Rational {
    fn mul_assign(&mut self, other: &'a Rational) {
        self.0 *= &other.0;
    }
}

impl<'a> Sum<&'a Rational> for Rational {
    fn sum<I: Iterator<Item = &'a Rational>>(iter: I) -> Self {
        let mut total = Rational::zero();
        for x in iter {
            total += x;
        }
        total
    }
}

impl Sum<Rational> for Rational {
    fn sum<I: Iterator<Item = Rational>>(iter: I) -> Self {
        let mut total = Rational::zero();
        for x in iter {
            total += &x;
        }
        total
    }
}

/// An integer in the persisted format: a JSON number when it fits, a decimal string otherwise.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredInteger {
    Small(i64),
    Large(String),
}

impl StoredInteger {
    fn new(i: &Integer) -> StoredInteger {
        match i.to_i64() {
            Some(n) => StoredInteger::Small(n),
            None => StoredInteger::Large(i.to_string()),
        }
    }

    fn into_integer(self) -> std::result::Result<Integer, String> {
        match self {
            StoredInteger::Small(n) => Ok(Integer::from(n)),
            StoredInteger::Large(s) => s
                .parse::<Integer>()
                .map_err(|e| format!("invalid integer '{}': {}", s, e)),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoredRational {
    #[serde(rename = "type")]
    kind: String,
    num: StoredInteger,
    den: StoredInteger,
}

impl Serialize for Rational {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        StoredRational {
            kind: "Rational".to_owned(),
            num: StoredInteger::new(self.0.numer()),
            den: StoredInteger::new(self.0.denom()),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Rational {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let stored = StoredRational::deserialize(deserializer)?;
        if stored.kind != "Rational" {
            return Err(de::Error::custom(format!(
                "expected an entry of type Rational, found {}",
                stored.kind
            )));
        }

        let num = stored.num.into_integer().map_err(de::Error::custom)?;
        let den = stored.den.into_integer().map_err(de::Error::custom)?;
        Rational::new(num, den).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::Rational;
    use crate::error::Error;

    #[test]
    fn parse() {
        assert_eq!("3".parse::<Rational>().unwrap(), 3.into());
        assert_eq!("-6/8".parse::<Rational>().unwrap(), (-3, 4).into());
        assert_eq!("−1.25".parse::<Rational>().unwrap(), (-5, 4).into());
        assert_eq!("2.5e-1".parse::<Rational>().unwrap(), (1, 4).into());
        assert_eq!("1e3".parse::<Rational>().unwrap(), 1000.into());
        assert!(matches!(
            "1/0".parse::<Rational>(),
            Err(Error::Arithmetic(_))
        ));
        assert!(matches!("1.2.3".parse::<Rational>(), Err(Error::Parse(_))));
        assert!(matches!(Rational::new(1, 0), Err(Error::Arithmetic(_))));
    }

    #[test]
    fn display_uses_unicode_minus() {
        assert_eq!(Rational::from((-3, 4)).to_string(), "−3/4");
        assert_eq!(Rational::from(7).to_string(), "7");
    }

    #[test]
    fn limit_denominator() {
        let pi: Rational = "3.141592653589793".parse().unwrap();
        assert_eq!(pi.limit_denominator(10).unwrap(), (22, 7).into());
        assert_eq!(pi.limit_denominator(100).unwrap(), (311, 99).into());
        assert_eq!((-pi).limit_denominator(1000).unwrap(), (-355, 113).into());

        let small = Rational::from((3, 7));
        assert_eq!(small.limit_denominator(100).unwrap(), small);
        assert!(small.limit_denominator(0).is_err());
    }

    #[test]
    fn arithmetic() {
        let a = Rational::from((1, 2));
        let b = Rational::from((1, 3));
        assert_eq!(&a + &b, (5, 6).into());
        assert_eq!(&a - &b, (1, 6).into());
        assert_eq!(&a * &b, (1, 6).into());
        assert_eq!(a.checked_div(&b).unwrap(), (3, 2).into());
        assert!(a.checked_div(&Rational::zero()).is_err());
        assert_eq!(b.pow(-2).unwrap(), 9.into());
        assert_eq!(Rational::from((9, 4)).sqrt_exact(), Some((3, 2).into()));
        assert_eq!(Rational::from(14).sqrt_exact(), None);
    }

    #[test]
    fn serialize() {
        let r = Rational::from((-3, 4));
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"type":"Rational","num":-3,"den":4}"#);

        let back: Rational = serde_json::from_str(r#"{"type":"Rational","num":6,"den":-8}"#).unwrap();
        assert_eq!(back, r);

        let big: Rational = "123456789012345678901234567890".parse().unwrap();
        let json = serde_json::to_string(&big).unwrap();
        assert_eq!(serde_json::from_str::<Rational>(&json).unwrap(), big);
    }
}
