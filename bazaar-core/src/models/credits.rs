use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign},
};

/// An amount of virtual currency.
///
/// Balances are fixed-point with six decimal places and stored as unsigned
/// micro-credits, so a balance can never be negative by construction. Amounts
/// and decay round *down*, so decay never leaves a balance larger than the exact
/// product of balance and factor. Charges round *up* with
/// [`from_f64_ceil`](Credits::from_f64_ceil): no fill is worth less than it costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "f64", into = "f64")
)]
pub struct Credits(u64);

impl Credits {
    /// Number of micro-credits in one credit
    pub const SCALE: u64 = 1_000_000;

    /// The empty balance
    pub const ZERO: Self = Self(0);

    /// Construct from a raw count of micro-credits
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Construct from a whole number of credits, saturating on overflow
    pub const fn from_whole(credits: u64) -> Self {
        Self(credits.saturating_mul(Self::SCALE))
    }

    /// Convert a floating point amount, rounding down.
    ///
    /// Negative and NaN inputs map to zero; amounts too large to represent saturate.
    pub fn from_f64(amount: f64) -> Self {
        Self::from_scaled((amount * Self::SCALE as f64).floor())
    }

    /// Convert a floating point amount, rounding up.
    ///
    /// Any positive amount, however small, costs at least one micro-credit.
    pub fn from_f64_ceil(amount: f64) -> Self {
        Self::from_scaled((amount * Self::SCALE as f64).ceil())
    }

    fn from_scaled(micros: f64) -> Self {
        if micros.is_nan() || micros <= 0.0 {
            Self::ZERO
        } else if micros >= u64::MAX as f64 {
            Self(u64::MAX)
        } else {
            Self::from_micros(micros as u64)
        }
    }

    /// The raw count of micro-credits
    pub const fn micros(self) -> u64 {
        self.0
    }

    /// The amount as a floating point number of credits
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// Is this the empty balance?
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtract, returning `None` if the result would be negative
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Subtract, flooring at zero
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Add, saturating at the largest representable amount
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Multiply by a non-negative factor, rounding down.
    ///
    /// Factors outside `[0, 1]` are permitted, but NaN or negative factors yield zero.
    pub fn scale(self, factor: f64) -> Self {
        if factor.is_nan() || factor <= 0.0 {
            return Self::ZERO;
        }
        if factor == 1.0 {
            return self;
        }
        let scaled = (self.0 as f64 * factor).floor();
        if scaled >= u64::MAX as f64 {
            Self(u64::MAX)
        } else {
            Self(scaled as u64)
        }
    }
}

impl Add for Credits {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl AddAssign for Credits {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(rhs);
    }
}

impl Sum for Credits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}",
            self.0 / Self::SCALE,
            self.0 % Self::SCALE
        )
    }
}

/// Errors that can occur when converting a configured amount into credits
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CreditsError {
    /// The amount was NaN or infinite
    #[error("amount must be finite")]
    NonFinite,
    /// The amount was negative
    #[error("amount must be non-negative, got {0}")]
    Negative(f64),
}

impl TryFrom<f64> for Credits {
    type Error = CreditsError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            Err(CreditsError::NonFinite)
        } else if value < 0.0 {
            Err(CreditsError::Negative(value))
        } else {
            Ok(Self::from_f64(value))
        }
    }
}

impl From<Credits> for f64 {
    fn from(value: Credits) -> Self {
        value.as_f64()
    }
}
