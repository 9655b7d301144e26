use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const BRL_CURRENCY_CODE: &str = "BRL";

//--------------------------------------        Brl          ---------------------------------------------------------
/// An amount of Brazilian reais, held as a whole number of centavos.
///
/// Amounts are signed: a wallet balance may legitimately be negative after an administrative debit.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Brl(i64);

op!(binary Brl, Add, add);
op!(binary Brl, Sub, sub);
op!(inplace Brl, AddAssign, add_assign);
op!(inplace Brl, SubAssign, sub_assign);
op!(unary Brl, Neg, neg);

impl Mul<i64> for Brl {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Brl {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for Brl {
    fn from(centavos: i64) -> Self {
        Self(centavos)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in reais: {0}")]
pub struct BrlParseError(String);

/// Parses decimal strings such as `"7.50"`, `"7,5"` or `"12"`.
impl FromStr for Brl {
    type Err = BrlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let mut parts = digits.splitn(2, ['.', ',']);
        let whole = parts
            .next()
            .filter(|w| !w.is_empty())
            .ok_or_else(|| BrlParseError(s.to_string()))?
            .parse::<i64>()
            .map_err(|e| BrlParseError(format!("{s}. {e}")))?;
        let cents = match parts.next() {
            None => 0,
            Some(frac) if frac.len() == 1 => frac.parse::<i64>().map_err(|e| BrlParseError(format!("{s}. {e}")))? * 10,
            Some(frac) if frac.len() == 2 => frac.parse::<i64>().map_err(|e| BrlParseError(format!("{s}. {e}")))?,
            Some(_) => return Err(BrlParseError(format!("{s} has more than two decimal places"))),
        };
        let value = whole.checked_mul(100).and_then(|v| v.checked_add(cents)).ok_or_else(|| BrlParseError(s.to_string()))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

/// Formats the amount the way receipts and tickets show it, e.g. `R$ 7,50`.
impl Display for Brl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}R$ {},{:02}", abs / 100, abs % 100)
    }
}

impl Brl {
    pub const fn from_centavos(centavos: i64) -> Self {
        Self(centavos)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_reais(reais: i64) -> Self {
        Self(reais * 100)
    }

    /// Payment gateways exchange amounts as JSON decimals. Rounds to the nearest centavo.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_decimal(amount: f64) -> Self {
        Self((amount * 100.0).round() as i64)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// `None` on overflow.
    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}
