//! Typed answer values.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

/// Precision used when converting a decimal into a fraction.
const FRACTION_SCALE: i64 = 1_000_000;

/// A strongly-typed answer value.
///
/// Absence of an answer is modeled as `Option::None` by callers; there is no
/// null variant.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Fraction(Fraction),
    Date(NaiveDateTime),
    Data(Vec<u8>),
    Sequence(Vec<AnswerValue>),
}

impl AnswerValue {
    /// Short name of the value kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Fraction(_) => "fraction",
            Self::Date(_) => "date",
            Self::Data(_) => "data",
            Self::Sequence(_) => "sequence",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view of integer, decimal and fraction values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(d) => Some(*d),
            Self::Fraction(f) => Some(f.to_f64()),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[AnswerValue]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Sequence membership; a scalar "contains" only itself.
    pub fn contains(&self, other: &AnswerValue) -> bool {
        match self {
            Self::Sequence(items) => items.iter().any(|item| item == other),
            value => value == other,
        }
    }

    /// Returns true for an empty sequence.
    pub fn is_empty_sequence(&self) -> bool {
        matches!(self, Self::Sequence(items) if items.is_empty())
    }
}

impl From<&str> for AnswerValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for AnswerValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for AnswerValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for AnswerValue {
    fn from(d: f64) -> Self {
        Self::Decimal(d)
    }
}

impl From<Fraction> for AnswerValue {
    fn from(f: Fraction) -> Self {
        Self::Fraction(f)
    }
}

impl From<Vec<AnswerValue>> for AnswerValue {
    fn from(items: Vec<AnswerValue>) -> Self {
        Self::Sequence(items)
    }
}

/// A rational number kept in lowest terms with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fraction {
    numerator: i64,
    denominator: i64,
}

impl Fraction {
    /// Create a reduced fraction. Returns `None` for a zero denominator or
    /// when a reduced term does not fit in an `i64`.
    pub fn new(numerator: i64, denominator: i64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let divisor = gcd(numerator.unsigned_abs(), denominator.unsigned_abs()).max(1);
        let numerator = reduce(numerator, divisor)?;
        let denominator = reduce(denominator, divisor)?;
        // Reduced terms are above i64::MIN, so negation cannot overflow.
        if denominator < 0 {
            Some(Self {
                numerator: -numerator,
                denominator: -denominator,
            })
        } else {
            Some(Self {
                numerator,
                denominator,
            })
        }
    }

    /// Approximate a decimal to six places.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * FRACTION_SCALE as f64).round();
        if scaled.abs() >= i64::MAX as f64 {
            return None;
        }
        Self::new(scaled as i64, FRACTION_SCALE)
    }

    pub fn numerator(&self) -> i64 {
        self.numerator
    }

    pub fn denominator(&self) -> i64 {
        self.denominator
    }

    pub fn to_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

impl FromStr for Fraction {
    type Err = String;

    /// Parses `"n/d"` or a plain decimal such as `"0.25"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('/') {
            Some((n, d)) => {
                let n: i64 = n.trim().parse().map_err(|_| format!("bad numerator in '{s}'"))?;
                let d: i64 = d.trim().parse().map_err(|_| format!("bad denominator in '{s}'"))?;
                Fraction::new(n, d).ok_or_else(|| format!("'{s}' has a zero denominator or is out of range"))
            }
            None => {
                let value: f64 = s.parse().map_err(|_| format!("'{s}' is not a fraction"))?;
                Fraction::from_f64(value).ok_or_else(|| format!("'{s}' is not finite"))
            }
        }
    }
}

fn reduce(value: i64, divisor: u64) -> Option<i64> {
    let magnitude = i64::try_from(value.unsigned_abs() / divisor).ok()?;
    Some(if value < 0 { -magnitude } else { magnitude })
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_reduces() {
        let f = Fraction::new(25, 100).unwrap();
        assert_eq!(f.numerator(), 1);
        assert_eq!(f.denominator(), 4);
        assert_eq!(f.to_string(), "1/4");
    }

    #[test]
    fn test_fraction_negative_denominator() {
        let f = Fraction::new(1, -2).unwrap();
        assert_eq!(f.numerator(), -1);
        assert_eq!(f.denominator(), 2);
    }

    #[test]
    fn test_fraction_extreme_terms() {
        assert!(Fraction::new(i64::MIN, 1).is_none());
        assert!(Fraction::new(1, i64::MIN).is_none());
        let half = Fraction::new(i64::MIN, 2).unwrap();
        assert_eq!(half.numerator(), i64::MIN / 2);
        assert_eq!(half.denominator(), 1);
        assert_eq!(Fraction::new(i64::MIN, i64::MIN), Fraction::new(1, 1));
        assert!("-9223372036854775808/1".parse::<Fraction>().is_err());
    }

    #[test]
    fn test_fraction_from_decimal() {
        assert_eq!(Fraction::from_f64(0.75), Fraction::new(3, 4));
        assert_eq!(Fraction::from_f64(2.0).unwrap().to_string(), "2");
        assert!(Fraction::from_f64(f64::NAN).is_none());
    }

    #[test]
    fn test_fraction_parse() {
        assert_eq!("3/6".parse::<Fraction>(), Ok(Fraction::new(1, 2).unwrap()));
        assert_eq!("0.5".parse::<Fraction>(), Ok(Fraction::new(1, 2).unwrap()));
        assert!("1/0".parse::<Fraction>().is_err());
        assert!("abc".parse::<Fraction>().is_err());
    }

    #[test]
    fn test_sequence_contains() {
        let seq = AnswerValue::Sequence(vec![1i64.into(), 3i64.into()]);
        assert!(seq.contains(&AnswerValue::Integer(3)));
        assert!(!seq.contains(&AnswerValue::Integer(2)));
        assert!(AnswerValue::from("a").contains(&AnswerValue::from("a")));
    }
}
