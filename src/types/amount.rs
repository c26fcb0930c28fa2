//! Fixed-point token amounts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal places of every token handled by the chain
pub const TOKEN_DECIMALS: u32 = 18;

const ONE_TOKEN: u128 = 10u128.pow(TOKEN_DECIMALS);

/// A token amount in base units (18 decimals)
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TokenAmount(u128);

impl TokenAmount {
    /// Zero tokens
    pub const ZERO: Self = Self(0);

    /// Create from base units
    #[must_use]
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from whole tokens
    #[must_use]
    pub const fn from_tokens(tokens: u64) -> Self {
        Self(tokens as u128 * ONE_TOKEN)
    }

    /// Base units
    #[must_use]
    pub const fn raw(self) -> u128 {
        self.0
    }

    /// True for zero
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Debug for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenAmount({self})")
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / ONE_TOKEN;
        let frac = self.0 % ONE_TOKEN;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{:0width$}", frac, width = TOKEN_DECIMALS as usize);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// Amount parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// Not a decimal number
    #[error("invalid amount: {0}")]
    Invalid(String),
    /// More fractional digits than the token supports
    #[error("too many decimal places (max 18)")]
    TooPrecise,
    /// Value does not fit in 128 bits
    #[error("amount overflows")]
    Overflow,
}

impl FromStr for TokenAmount {
    type Err = AmountError;

    /// Parse a decimal token string such as `"100"` or `"0.25"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(AmountError::Invalid(s.to_string()));
        }
        if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(AmountError::Invalid(s.to_string()));
        }
        if frac.len() > TOKEN_DECIMALS as usize {
            return Err(AmountError::TooPrecise);
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Overflow)?
        };
        let frac_units: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = TOKEN_DECIMALS as usize);
            padded.parse().map_err(|_| AmountError::Overflow)?
        };

        whole
            .checked_mul(ONE_TOKEN)
            .and_then(|w| w.checked_add(frac_units))
            .map(Self)
            .ok_or(AmountError::Overflow)
    }
}
