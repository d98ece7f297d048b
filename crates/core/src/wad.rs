//! 18-decimal fixed-point amounts
//!
//! Prices and quantities travel through the keeper as `Wad`s: decimal
//! numbers carrying at most 18 fractional digits, so that values read off
//! the wire compare and hash exactly.

use rust_decimal::{prelude::*, Decimal};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Number of fractional digits a `Wad` keeps.
pub const WAD_DECIMALS: u32 = 18;

/// Fixed-point decimal with 18 fractional digits.
///
/// Equality, ordering and hashing are by numeric value, so `1.50` and `1.5`
/// are the same `Wad`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wad {
    value: Decimal,
}

/// Fixed-point errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WadError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Overflow in arithmetic operation")]
    Overflow,
}

impl Wad {
    pub const ZERO: Wad = Wad { value: Decimal::ZERO };

    pub const ONE: Wad = Wad { value: Decimal::ONE };

    fn rounded(value: Decimal) -> Self {
        Wad {
            value: value.round_dp(WAD_DECIMALS),
        }
    }

    /// Create a `Wad` from a float, keeping its shortest decimal form.
    pub fn from_number(value: f64) -> Result<Self, WadError> {
        if !value.is_finite() {
            return Err(WadError::InvalidValue(value.to_string()));
        }
        let decimal =
            Decimal::from_f64(value).ok_or_else(|| WadError::InvalidValue(value.to_string()))?;
        Ok(Self::rounded(decimal))
    }

    pub fn from_i64(value: i64) -> Self {
        Wad {
            value: Decimal::from(value),
        }
    }

    /// Parse a decimal string such as `"185.10"` or `"-0.25"`.
    pub fn from_str_exact(s: &str) -> Result<Self, WadError> {
        let decimal = Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .map_err(|_| WadError::InvalidValue(s.to_string()))?;
        Ok(Self::rounded(decimal))
    }

    pub fn to_decimal(&self) -> Decimal {
        self.value
    }

    /// Convert to f64 (may lose precision)
    pub fn to_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_sign_negative() && !self.value.is_zero()
    }

    pub fn abs(&self) -> Self {
        Wad {
            value: self.value.abs(),
        }
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, WadError> {
        self.value
            .checked_add(rhs.value)
            .map(Self::rounded)
            .ok_or(WadError::Overflow)
    }

    pub fn checked_mul(self, rhs: Self) -> Result<Self, WadError> {
        self.value
            .checked_mul(rhs.value)
            .map(Self::rounded)
            .ok_or(WadError::Overflow)
    }

    pub fn checked_div(self, rhs: Self) -> Result<Self, WadError> {
        if rhs.is_zero() {
            return Err(WadError::DivisionByZero);
        }
        self.value
            .checked_div(rhs.value)
            .map(Self::rounded)
            .ok_or(WadError::Overflow)
    }
}

impl Add for Wad {
    type Output = Wad;

    fn add(self, rhs: Self) -> Self::Output {
        Wad::rounded(self.value + rhs.value)
    }
}

impl Sub for Wad {
    type Output = Wad;

    fn sub(self, rhs: Self) -> Self::Output {
        Wad::rounded(self.value - rhs.value)
    }
}

impl Mul for Wad {
    type Output = Wad;

    fn mul(self, rhs: Self) -> Self::Output {
        Wad::rounded(self.value * rhs.value)
    }
}

impl Div for Wad {
    type Output = Wad;

    /// Panics on division by zero; use [`Wad::checked_div`] for untrusted input.
    fn div(self, rhs: Self) -> Self::Output {
        Wad::rounded(self.value / rhs.value)
    }
}

impl Neg for Wad {
    type Output = Wad;

    fn neg(self) -> Self::Output {
        Wad { value: -self.value }
    }
}

impl AddAssign for Wad {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Wad {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Wad {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for Wad {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value.normalize())
    }
}

impl FromStr for Wad {
    type Err = WadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_exact(s)
    }
}

impl From<Decimal> for Wad {
    fn from(value: Decimal) -> Self {
        Wad::rounded(value)
    }
}

impl From<Wad> for Decimal {
    fn from(wad: Wad) -> Self {
        wad.value
    }
}

impl Default for Wad {
    fn default() -> Self {
        Wad::ZERO
    }
}

/// `wad!(185.1)` builds a `Wad` from a numeric literal.
#[macro_export]
macro_rules! wad {
    ($value:expr) => {
        $crate::wad::Wad::from_str_exact(stringify!($value)).unwrap()
    };
}
