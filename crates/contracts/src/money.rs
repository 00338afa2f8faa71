//! Fixed-point money in whole cents.
//!
//! All engine arithmetic happens on `Money` so item prices never drift against
//! the game's total through repeated float rounding. On the wire the value is
//! a two-decimal string ("40.00"), matching what pricing clients expect.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Central tolerance policy: two totals agree when their absolute
    /// difference is below one cent. With integer cents this is equality.
    pub const EPSILON: Money = Money(1);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn from_major(units: i64) -> Self {
        Money(units * 100)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn abs(self) -> Money {
        Money(self.0.abs())
    }

    pub fn approx_eq(self, other: Money) -> bool {
        (self - other).abs() < Money::EPSILON
    }

    /// Split into `parts` amounts that sum back to `self` exactly.
    /// The truncated remainder is handed out one cent at a time to the lowest
    /// indexes, so the split is deterministic.
    pub fn split_even(self, parts: usize) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }
        let n = parts as i64;
        let per = self.0 / n;
        let rem = self.0 - per * n;
        let step = if rem >= 0 { 1 } else { -1 };
        (0..n)
            .map(|index| Money(per + if index < rem.abs() { step } else { 0 }))
            .collect()
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, value| acc + value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMoneyError {
    raw: String,
}

impl fmt::Display for ParseMoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid money literal: {}", self.raw)
    }
}

impl std::error::Error for ParseMoneyError {}

impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let error = || ParseMoneyError {
            raw: raw.to_string(),
        };

        let trimmed = raw.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (units_part, frac_part) = match body.split_once('.') {
            Some((units, frac)) => (units, frac),
            None => (body, ""),
        };

        if units_part.is_empty() || !units_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(error());
        }
        if frac_part.len() > 2 || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(error());
        }

        let units = units_part.parse::<i64>().map_err(|_| error())?;
        let frac_cents = match frac_part.len() {
            0 => 0,
            1 => frac_part.parse::<i64>().map_err(|_| error())? * 10,
            _ => frac_part.parse::<i64>().map_err(|_| error())?,
        };

        let cents = units
            .checked_mul(100)
            .and_then(|value| value.checked_add(frac_cents))
            .ok_or_else(error)?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<Money>().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_two_decimal_strings() {
        let price = "40.00".parse::<Money>().expect("parse");
        assert_eq!(price, Money::from_cents(4000));
        assert_eq!(price.to_string(), "40.00");

        assert_eq!("12".parse::<Money>().unwrap(), Money::from_cents(1200));
        assert_eq!("12.3".parse::<Money>().unwrap(), Money::from_cents(1230));
        assert_eq!("-0.05".parse::<Money>().unwrap(), Money::from_cents(-5));
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn rejects_malformed_literals() {
        for raw in ["", ".", "1.234", "1.2.3", "abc", "1,50", "--1"] {
            assert!(raw.parse::<Money>().is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn split_even_conserves_the_total() {
        let total = Money::from_cents(10_000);
        let parts = total.split_even(3);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().copied().sum::<Money>(), total);
        assert_eq!(parts[0], Money::from_cents(3334));
        assert_eq!(parts[1], Money::from_cents(3333));
        assert_eq!(parts[2], Money::from_cents(3333));
    }

    #[test]
    fn split_even_handles_zero_parts_and_negatives() {
        assert!(Money::from_cents(500).split_even(0).is_empty());

        let total = Money::from_cents(-10);
        let parts = total.split_even(3);
        assert_eq!(parts.iter().copied().sum::<Money>(), total);
    }

    #[test]
    fn serde_round_trips_as_string() {
        let price = Money::from_cents(1234);
        let encoded = serde_json::to_string(&price).expect("serialize");
        assert_eq!(encoded, "\"12.34\"");
        let decoded: Money = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded, price);
    }
}
