//! Fixed-point hour amounts (two fractional digits).
//!
//! Stored as integer hundredths so summed monthly totals never drift.

use serde::{Deserialize, Serialize};
use crate::domain::text::fold_fullwidth_digits;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;
use thiserror::Error;

/// Longest accepted integer part. Keeps `int * 100` far away from overflow.
const MAX_INT_DIGITS: usize = 9;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseHoursError {
    #[error("empty hours value")]
    Empty,
    #[error("invalid hours value: {0}")]
    Invalid(String),
    #[error("hours must be positive: {0}")]
    NotPositive(String),
}

/// A positive amount of hours with two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hours(i64);

impl Hours {
    /// Build from hundredths of an hour (e.g. 250 = 2.5h).
    pub fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    pub fn hundredths(self) -> i64 {
        self.0
    }

    pub fn zero() -> Self {
        Self(0)
    }
}

impl FromStr for Hours {
    type Err = ParseHoursError;

    /// Accepts `D`, `D.`, `D.F` and `.F`. Digits past the second fractional place
    /// round half away from zero. Full-width digits and full stop are read as ASCII.
    /// Signs, exponents and unit suffixes are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = fold_fullwidth_digits(s.trim());
        let s = folded.as_str();
        if s.is_empty() {
            return Err(ParseHoursError::Empty);
        }
        let invalid = || ParseHoursError::Invalid(s.to_string());

        let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) || int_part.len() > MAX_INT_DIGITS {
            return Err(invalid());
        }

        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        let digit = |i: usize| {
            frac_part
                .as_bytes()
                .get(i)
                .map(|b| i64::from(b - b'0'))
                .unwrap_or(0)
        };
        let mut hundredths = whole * 100 + digit(0) * 10 + digit(1);
        if digit(2) >= 5 {
            hundredths += 1;
        }

        if hundredths <= 0 {
            return Err(ParseHoursError::NotPositive(s.to_string()));
        }
        Ok(Self(hundredths))
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = (self.0 % 100).abs();
        if frac == 0 {
            write!(f, "{}", whole)
        } else if frac % 10 == 0 {
            write!(f, "{}.{}", whole, frac / 10)
        } else {
            write!(f, "{}.{:02}", whole, frac)
        }
    }
}

impl Add for Hours {
    type Output = Hours;

    fn add(self, rhs: Hours) -> Hours {
        Hours(self.0 + rhs.0)
    }
}

impl Sum for Hours {
    fn sum<I: Iterator<Item = Hours>>(iter: I) -> Hours {
        iter.fold(Hours::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(s: &str) -> Result<Hours, ParseHoursError> {
        s.parse()
    }

    #[test]
    fn test_parse_integer_and_fraction() {
        assert_eq!(h("2").unwrap().hundredths(), 200);
        assert_eq!(h("2.5").unwrap().hundredths(), 250);
        assert_eq!(h(" 0.25 ").unwrap().hundredths(), 25);
        assert_eq!(h(".5").unwrap().hundredths(), 50);
        assert_eq!(h("3.").unwrap().hundredths(), 300);
    }

    #[test]
    fn test_parse_rounds_third_digit() {
        assert_eq!(h("1.234").unwrap().hundredths(), 123);
        assert_eq!(h("1.235").unwrap().hundredths(), 124);
        assert_eq!(h("0.999").unwrap().hundredths(), 100);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(h(""), Err(ParseHoursError::Empty));
        assert!(matches!(h("."), Err(ParseHoursError::Invalid(_))));
        assert!(matches!(h("2h"), Err(ParseHoursError::Invalid(_))));
        assert!(matches!(h("-1"), Err(ParseHoursError::Invalid(_))));
        assert!(matches!(h("1e3"), Err(ParseHoursError::Invalid(_))));
        assert!(matches!(h("1,5"), Err(ParseHoursError::Invalid(_))));
        assert!(matches!(h("9999999999"), Err(ParseHoursError::Invalid(_))));
    }

    #[test]
    fn test_parse_fullwidth_digits() {
        assert_eq!(h("２").unwrap().hundredths(), 200);
        assert_eq!(h("２.５").unwrap().hundredths(), 250);
        assert_eq!(h("１．２５").unwrap().hundredths(), 125);
        assert!(matches!(h("－１"), Err(ParseHoursError::Invalid(_))));
        assert!(matches!(h("０"), Err(ParseHoursError::NotPositive(_))));
    }

    #[test]
    fn test_parse_rejects_zero() {
        assert!(matches!(h("0"), Err(ParseHoursError::NotPositive(_))));
        assert!(matches!(h("0.004"), Err(ParseHoursError::NotPositive(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(Hours::from_hundredths(200).to_string(), "2");
        assert_eq!(Hours::from_hundredths(250).to_string(), "2.5");
        assert_eq!(Hours::from_hundredths(225).to_string(), "2.25");
        assert_eq!(Hours::from_hundredths(5).to_string(), "0.05");
    }

    #[test]
    fn test_sum_is_exact() {
        let total: Hours = std::iter::repeat(Hours::from_hundredths(10))
            .take(10)
            .sum();
        assert_eq!(total, Hours::from_hundredths(100));
        assert_eq!(total.to_string(), "1");
    }
}
