use serde::{Deserialize, Serialize};

// ============================================================================
// Money - exact fixed-point amounts
// ============================================================================
//
// A value is `units + nanos / 10^9` in `currency_code`. Arithmetic happens in
// i128 nano space and is normalised back, so sums and products are exact.
// Floats are only produced by `as_f64` for telemetry and threshold display.
//
// ============================================================================

pub const NANOS_PER_UNIT: i64 = 1_000_000_000;

const NANOS_MIN: i32 = -999_999_999;
const NANOS_MAX: i32 = 999_999_999;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("one of the specified money values is invalid")]
    InvalidValue,

    #[error("mismatching currency codes: {0} != {1}")]
    CurrencyMismatch(String, String),

    #[error("money value out of range")]
    Overflow,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Money {
    pub currency_code: String,
    pub units: i64,
    pub nanos: i32,
}

impl Money {
    pub fn new(currency_code: impl Into<String>, units: i64, nanos: i32) -> Self {
        Self {
            currency_code: currency_code.into(),
            units,
            nanos,
        }
    }

    #[cfg(test)]
    pub fn zero(currency_code: impl Into<String>) -> Self {
        Self::new(currency_code, 0, 0)
    }

    /// Nanos in range and carrying the same sign as units
    pub fn is_valid(&self) -> bool {
        let in_range = (NANOS_MIN..=NANOS_MAX).contains(&self.nanos);
        let same_sign = (self.units >= 0 && self.nanos >= 0) || (self.units <= 0 && self.nanos <= 0);
        in_range && same_sign
    }

    /// Adds two amounts of the same currency
    pub fn sum(&self, other: &Money) -> Result<Money, MoneyError> {
        if !self.is_valid() || !other.is_valid() {
            return Err(MoneyError::InvalidValue);
        }
        if self.currency_code != other.currency_code {
            return Err(MoneyError::CurrencyMismatch(
                self.currency_code.clone(),
                other.currency_code.clone(),
            ));
        }

        Self::from_total_nanos(&self.currency_code, self.total_nanos() + other.total_nanos())
    }

    /// Scales the amount by a line-item quantity
    pub fn multiply(&self, factor: u32) -> Result<Money, MoneyError> {
        if !self.is_valid() {
            return Err(MoneyError::InvalidValue);
        }

        Self::from_total_nanos(&self.currency_code, self.total_nanos() * i128::from(factor))
    }

    /// Lossy float view, only for telemetry and messages
    pub fn as_f64(&self) -> f64 {
        self.units as f64 + f64::from(self.nanos) / 1e9
    }

    fn total_nanos(&self) -> i128 {
        i128::from(self.units) * i128::from(NANOS_PER_UNIT) + i128::from(self.nanos)
    }

    fn from_total_nanos(currency_code: &str, total: i128) -> Result<Money, MoneyError> {
        let per_unit = i128::from(NANOS_PER_UNIT);
        // Truncating division keeps quotient and remainder on the same side of zero
        let units = i64::try_from(total / per_unit).map_err(|_| MoneyError::Overflow)?;
        let nanos = i32::try_from(total % per_unit).map_err(|_| MoneyError::Overflow)?;

        Ok(Money::new(currency_code, units, nanos))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
