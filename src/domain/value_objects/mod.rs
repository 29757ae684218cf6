//! Value Objects for the storefront

use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Money value object, whole rupiah with no sub-unit precision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn new(amount: i64) -> Self { Self(amount) }
    pub const fn zero() -> Self { Self(0) }
    pub const fn amount(&self) -> i64 { self.0 }
    pub fn add(&self, other: Money) -> Money { Money(self.0.saturating_add(other.0)) }
    pub fn subtract(&self, other: Money) -> Money { Money(self.0.saturating_sub(other.0)) }
    pub fn multiply(&self, qty: u32) -> Money { Money(self.0.saturating_mul(i64::from(qty))) }
    pub fn min(self, other: Money) -> Money { if other.0 < self.0 { other } else { self } }

    /// Scales by `rate` and rounds half away from zero, saturating at the `i64` bounds.
    pub fn scale(&self, rate: Decimal) -> Money {
        let scaled = (Decimal::from(self.0) * rate).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Money(scaled.to_i64().unwrap_or(if scaled.is_sign_negative() { i64::MIN } else { i64::MAX }))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Rp {}", self.0) }
}

/// Requested quantity of one catalog item, `1..=999`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub const MAX: u32 = 999;

    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 { return Err(QuantityError::Zero); }
        if value > Self::MAX { return Err(QuantityError::TooLarge(value)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Result<Self, QuantityError> { Self::new(self.0.saturating_add(other.0)) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { Zero, TooLarge(u32) }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => write!(f, "quantity must be at least 1"),
            Self::TooLarge(v) => write!(f, "quantity {} exceeds maximum of {}", v, Quantity::MAX),
        }
    }
}

/// Redeemable discount code, always exactly ten characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscountCode(String);

impl DiscountCode {
    pub const LEN: usize = 10;

    pub fn new(value: impl Into<String>) -> Result<Self, DiscountCodeError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(DiscountCodeError::Empty); }
        if value.chars().count() != Self::LEN { return Err(DiscountCodeError::WrongLength); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DiscountCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum DiscountCodeError { Empty, WrongLength }
impl std::error::Error for DiscountCodeError {}
impl fmt::Display for DiscountCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "discount code empty"),
            Self::WrongLength => write!(f, "discount code must be {} characters", DiscountCode::LEN),
        }
    }
}

/// Customer-facing transaction identifier, `JOINVPR` followed by four digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrxId(String);

impl TrxId {
    pub const PREFIX: &'static str = "JOINVPR";

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(format!("{}{}", Self::PREFIX, rng.gen_range(1000..=9999)))
    }

    pub fn parse(value: &str) -> Result<Self, TrxIdError> {
        let value = value.trim();
        let digits = value.strip_prefix(Self::PREFIX).ok_or(TrxIdError::BadPrefix)?;
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) { return Err(TrxIdError::BadSuffix); }
        Ok(Self(value.to_string()))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TrxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum TrxIdError { BadPrefix, BadSuffix }
impl std::error::Error for TrxIdError {}
impl fmt::Display for TrxIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::BadPrefix => write!(f, "transaction id prefix invalid"), Self::BadSuffix => write!(f, "transaction id suffix invalid") }
    }
}
