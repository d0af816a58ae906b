use std::fmt;
use thiserror::Error;

/// Number of decimal places carried by every [`FixedPoint`] value.
pub const DECIMAL_PLACES: u8 = 10;

/// Scale factor implied by [`DECIMAL_PLACES`].
const SCALE: u64 = 10_000_000_000;

/// Exact powers of ten for exponents 0..=10. Larger exponents are rejected
/// rather than approximated.
const POW10: [u64; 11] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
];

#[inline(always)]
fn pow10(exp: u8) -> Result<u64, FixedPointError> {
    POW10
        .get(exp as usize)
        .copied()
        .ok_or(FixedPointError::DecimalsOutOfRange(exp))
}

/// RoundingMode selects what happens when an operation cannot represent its
/// result exactly at the target precision.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum RoundingMode {
    /// Drop the unrepresentable remainder.
    Trunc,
    /// Add one unit at the target precision when anything was dropped.
    RoundUp,
    /// Fail with [`FixedPointError::PrecisionLoss`] when anything would be dropped.
    ErrorOnLoss,
}

/// Errors produced by fixed-point arithmetic.
#[derive(Debug, Error, PartialEq, Eq, Copy, Clone)]
pub enum FixedPointError {
    /// The result does not fit in the 64-bit representation.
    #[error("fixed-point overflow")]
    Overflow,
    /// Subtraction went below zero; values are unsigned.
    #[error("fixed-point underflow")]
    Underflow,
    /// The operation would lose precision under `ErrorOnLoss`.
    #[error("fixed-point operation would lose precision")]
    PrecisionLoss,
    /// Division by zero.
    #[error("fixed-point division by zero")]
    DivideByZero,
    /// A decimal exponent beyond the supported maximum of 10.
    #[error("decimal exponent {0} exceeds the supported maximum of 10")]
    DecimalsOutOfRange(u8),
}

/// FixedPoint is a non-negative rational stored as an unsigned integer with an
/// implicit scale of 10^10.
///
/// Every intermediate product and quotient is computed in 128-bit arithmetic
/// and checked back against the exact wide result, so arithmetic either
/// returns an exact value, applies the caller's [`RoundingMode`], or fails.
/// Comparison, `min`, and `max` come from the derived total order on the raw
/// representation.
#[derive(PartialEq, Eq, PartialOrd, Ord, Default, Copy, Clone, Debug, Hash)]
pub struct FixedPoint {
    raw: u64,
}

impl FixedPoint {
    pub const ZERO: FixedPoint = FixedPoint { raw: 0 };
    pub const ONE: FixedPoint = FixedPoint { raw: SCALE };

    /// Build a value directly from its 10^10-scaled representation.
    #[inline(always)]
    pub const fn from_raw(raw: u64) -> Self {
        FixedPoint { raw }
    }

    /// The 10^10-scaled representation.
    #[inline(always)]
    pub const fn raw(self) -> u64 {
        self.raw
    }

    #[inline(always)]
    pub const fn is_zero(self) -> bool {
        self.raw == 0
    }

    /// Interpret `value` as an integer carrying `decimals` fractional digits.
    ///
    /// Fails with [`FixedPointError::DecimalsOutOfRange`] when `decimals > 10`
    /// and with [`FixedPointError::Overflow`] when the scaled value does not
    /// fit the representation.
    pub fn from_u64(value: u64, decimals: u8) -> Result<Self, FixedPointError> {
        if decimals > DECIMAL_PLACES {
            return Err(FixedPointError::DecimalsOutOfRange(decimals));
        }
        let factor = pow10(DECIMAL_PLACES - decimals)?;
        let wide = value as u128 * factor as u128;
        if wide > u64::MAX as u128 {
            return Err(FixedPointError::Overflow);
        }
        Ok(FixedPoint { raw: wide as u64 })
    }

    /// Convert to an integer carrying `decimals` fractional digits.
    ///
    /// When the target precision cannot hold the value exactly the remainder
    /// is handled per `mode`.
    pub fn to_u64(self, decimals: u8, mode: RoundingMode) -> Result<u64, FixedPointError> {
        if decimals > DECIMAL_PLACES {
            return Err(FixedPointError::DecimalsOutOfRange(decimals));
        }
        let factor = pow10(DECIMAL_PLACES - decimals)?;
        let quotient = self.raw / factor;
        let remainder = self.raw % factor;
        match mode {
            RoundingMode::Trunc => Ok(quotient),
            RoundingMode::RoundUp => {
                if remainder == 0 {
                    Ok(quotient)
                } else {
                    quotient.checked_add(1).ok_or(FixedPointError::Overflow)
                }
            }
            RoundingMode::ErrorOnLoss => {
                if remainder == 0 {
                    Ok(quotient)
                } else {
                    Err(FixedPointError::PrecisionLoss)
                }
            }
        }
    }

    pub fn add(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.raw
            .checked_add(rhs.raw)
            .map(|raw| FixedPoint { raw })
            .ok_or(FixedPointError::Overflow)
    }

    pub fn sub(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.raw
            .checked_sub(rhs.raw)
            .map(|raw| FixedPoint { raw })
            .ok_or(FixedPointError::Underflow)
    }

    /// Multiply, computing `(a * b) / 10^10` in 128-bit arithmetic.
    ///
    /// Loss is detected by reconstructing the wide product from the narrowed
    /// quotient and comparing it against the exact operand product.
    pub fn mul(self, rhs: Self, mode: RoundingMode) -> Result<Self, FixedPointError> {
        let exact = self.raw as u128 * rhs.raw as u128;
        let quotient = exact / SCALE as u128;
        let lossless = quotient * SCALE as u128 == exact;
        Self::narrow(quotient, lossless, mode)
    }

    /// Divide, computing `(a * 10^10) / b` in 128-bit arithmetic.
    pub fn div(self, rhs: Self, mode: RoundingMode) -> Result<Self, FixedPointError> {
        if rhs.raw == 0 {
            return Err(FixedPointError::DivideByZero);
        }
        let exact = self.raw as u128 * SCALE as u128;
        let quotient = exact / rhs.raw as u128;
        let lossless = quotient * rhs.raw as u128 == exact;
        Self::narrow(quotient, lossless, mode)
    }

    /// Snap to the nearest lower multiple of 10^(10 - decimals); `RoundUp`
    /// snaps upward instead when the snap lost value.
    pub fn round_to_decimals(
        self,
        decimals: u8,
        mode: RoundingMode,
    ) -> Result<Self, FixedPointError> {
        if decimals > DECIMAL_PLACES {
            return Err(FixedPointError::DecimalsOutOfRange(decimals));
        }
        let factor = pow10(DECIMAL_PLACES - decimals)?;
        let remainder = self.raw % factor;
        let floor = self.raw - remainder;
        match mode {
            RoundingMode::Trunc => Ok(FixedPoint { raw: floor }),
            RoundingMode::RoundUp => {
                if remainder == 0 {
                    Ok(FixedPoint { raw: floor })
                } else {
                    floor
                        .checked_add(factor)
                        .map(|raw| FixedPoint { raw })
                        .ok_or(FixedPointError::Overflow)
                }
            }
            RoundingMode::ErrorOnLoss => {
                if remainder == 0 {
                    Ok(FixedPoint { raw: floor })
                } else {
                    Err(FixedPointError::PrecisionLoss)
                }
            }
        }
    }

    /// The arithmetic mean of two values, truncating the final half-ulp.
    ///
    /// Computed in 128-bit arithmetic so the sum cannot overflow.
    #[inline(always)]
    pub fn midpoint(self, other: Self) -> Self {
        FixedPoint {
            raw: ((self.raw as u128 + other.raw as u128) / 2) as u64,
        }
    }

    #[inline(always)]
    fn narrow(
        quotient: u128,
        lossless: bool,
        mode: RoundingMode,
    ) -> Result<Self, FixedPointError> {
        let adjusted = match mode {
            RoundingMode::Trunc => quotient,
            RoundingMode::RoundUp => {
                if lossless {
                    quotient
                } else {
                    quotient + 1
                }
            }
            RoundingMode::ErrorOnLoss => {
                if lossless {
                    quotient
                } else {
                    return Err(FixedPointError::PrecisionLoss);
                }
            }
        };
        if adjusted > u64::MAX as u128 {
            return Err(FixedPointError::Overflow);
        }
        Ok(FixedPoint {
            raw: adjusted as u64,
        })
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.raw / SCALE;
        let frac = self.raw % SCALE;
        if frac == 0 {
            write!(f, "{whole}")
        } else {
            let digits = format!("{frac:010}");
            write!(f, "{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}
