//! Value Objects for checkout

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Money value object, held as integer US cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self { Self(cents) }
    pub const fn cents(&self) -> i64 { self.0 }
    pub fn multiply(&self, qty: u32) -> Money { Money(self.0 * i64::from(qty)) }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0 + rhs.0) }
}

/// Formats as a US currency string, e.g. `$59.98`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

/// Item quantity for a single-product checkout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 10;

    /// Clamps any integer into `[MIN, MAX]`.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u32)
    }

    /// Interprets raw form input. Anything that is not an integer becomes 1.
    pub fn parse_input(input: &str) -> Self {
        match input.trim().parse::<i64>() {
            Ok(v) => Self::clamped(v),
            Err(_) => Self(Self::MIN),
        }
    }

    pub fn value(&self) -> u32 { self.0 }
}

impl Default for Quantity { fn default() -> Self { Self(Self::MIN) } }

/// Token attached to a placement request so retries can be deduplicated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub const MAX_LEN: usize = 255;

    /// Mints a fresh random key.
    pub fn generate() -> Self { Self(Uuid::new_v4().to_string()) }

    /// Accepts a key received from a caller.
    pub fn parse(value: &str) -> Result<Self, IdempotencyKeyError> {
        let value = value.trim();
        if value.is_empty() { return Err(IdempotencyKeyError::Empty); }
        if value.len() > Self::MAX_LEN { return Err(IdempotencyKeyError::TooLong); }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdempotencyKeyError {
    #[error("Idempotency-Key is empty")]
    Empty,
    #[error("Idempotency-Key exceeds 255 characters")]
    TooLong,
}
