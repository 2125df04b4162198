//! Fixed-point monetary amounts.
//!
//! Amounts and fees are carried as integer micro-coins (1 coin =
//! 1,000,000 µ) so that balance arithmetic is exact and equality is
//! well-defined. JSON keeps the human-friendly decimal number form at
//! the API boundary; the canonical decimal rendering below is what goes
//! into signed transaction headers, so it must stay stable.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Micro-coins per whole coin.
pub const MICROS_PER_COIN: i64 = 1_000_000;

/// A signed fixed-point amount of currency, in micro-coins.
///
/// Transaction amounts and fees are non-negative; balances may go
/// negative transiently when unconfirmed mempool spending is folded in,
/// which is why the representation is signed.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Constructs an amount from raw micro-coins.
    pub const fn from_micros(micros: i64) -> Self {
        Amount(micros)
    }

    /// Constructs an amount from a whole number of coins.
    pub const fn from_whole(coins: i64) -> Self {
        Amount(coins * MICROS_PER_COIN)
    }

    /// Returns the raw micro-coin value.
    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Converts to a floating-point coin count for the JSON boundary.
    ///
    /// Exact below 2^53 micro-coins.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / MICROS_PER_COIN as f64
    }

    /// Converts from a floating-point coin count, rounding to the nearest
    /// micro-coin.
    pub fn from_f64(coins: f64) -> Self {
        Amount((coins * MICROS_PER_COIN as f64).round() as i64)
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

/// Canonical decimal rendering: optional sign, integer part, and iff the
/// fractional part is non-zero a `.` followed by up to six digits with
/// trailing zeros trimmed. `1` -> "1", `0.9` -> "0.9", `0.010000` -> "0.01".
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / MICROS_PER_COIN as u64;
        let frac = abs % MICROS_PER_COIN as u64;
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let digits = format!("{frac:06}");
            write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

/// Error parsing a decimal amount string.
#[derive(Debug, Eq, PartialEq)]
pub struct ParseAmountError;

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid decimal amount")
    }
}

impl std::error::Error for ParseAmountError {}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sign, rest) = match s.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, s),
        };
        let (whole, frac) = match rest.split_once('.') {
            Some((w, f)) => (w, f),
            None => (rest, ""),
        };
        if whole.is_empty() || frac.len() > 6 {
            return Err(ParseAmountError);
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseAmountError);
        }
        let whole: i64 = whole.parse().map_err(|_| ParseAmountError)?;
        let mut micros = whole * MICROS_PER_COIN;
        if !frac.is_empty() {
            let padded = format!("{frac:0<6}");
            let frac: i64 = padded.parse().map_err(|_| ParseAmountError)?;
            micros += frac;
        }
        Ok(Amount(sign * micros))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let coins = f64::deserialize(deserializer)?;
        Ok(Amount::from_f64(coins))
    }
}
