//! Discount Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use crate::domain::value_objects::{DiscountCode, Money};

#[derive(Clone, Debug)]
pub struct Discount {
    id: i64,
    code: DiscountCode,
    kind: DiscountKind,
    value: i64,
    min_order_value: Money,
    max_order_value: Money,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    description: String,
    is_active: bool,
}

/// Stored as `0` (percentage) and `1` (fixed amount).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscountKind { Percentage, Fixed }

impl DiscountKind {
    pub fn from_code(code: i16) -> Option<Self> {
        match code { 0 => Some(Self::Percentage), 1 => Some(Self::Fixed), _ => None }
    }
    pub fn code(&self) -> i16 { match self { Self::Percentage => 0, Self::Fixed => 1 } }
}

/// Persisted columns of a discount, as loaded from storage.
#[derive(Clone, Debug)]
pub struct DiscountParts {
    pub id: i64,
    pub code: DiscountCode,
    pub kind: DiscountKind,
    pub value: i64,
    pub min_order_value: Money,
    pub max_order_value: Money,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: String,
    pub is_active: bool,
}

impl Discount {
    /// New inactive discount. A fixed discount caps itself at its own value.
    pub fn create(code: DiscountCode, kind: DiscountKind, value: i64, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Result<Self, DiscountError> {
        if value <= 0 { return Err(DiscountError::InvalidValue); }
        if kind == DiscountKind::Percentage && value > 100 { return Err(DiscountError::InvalidValue); }
        if end_date < start_date { return Err(DiscountError::InvalidWindow); }
        let max_order_value = match kind { DiscountKind::Fixed => Money::new(value), DiscountKind::Percentage => Money::zero() };
        Ok(Self {
            id: 0, code, kind, value, min_order_value: Money::zero(), max_order_value,
            start_date, end_date, description: String::new(), is_active: false,
        })
    }

    pub fn restore(parts: DiscountParts) -> Self {
        Self {
            id: parts.id, code: parts.code, kind: parts.kind, value: parts.value,
            min_order_value: parts.min_order_value, max_order_value: parts.max_order_value,
            start_date: parts.start_date, end_date: parts.end_date,
            description: parts.description, is_active: parts.is_active,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self { self.id = id; self }
    pub fn with_min_order_value(mut self, min: Money) -> Self { self.min_order_value = min; self }
    pub fn with_max_order_value(mut self, max: Money) -> Self { self.max_order_value = max; self }
    pub fn activate(mut self) -> Self { self.is_active = true; self }

    pub fn id(&self) -> i64 { self.id }
    pub fn code(&self) -> &DiscountCode { &self.code }
    pub fn kind(&self) -> DiscountKind { self.kind }
    pub fn value(&self) -> i64 { self.value }
    pub fn min_order_value(&self) -> Money { self.min_order_value }
    pub fn max_order_value(&self) -> Money { self.max_order_value }
    pub fn start_date(&self) -> DateTime<Utc> { self.start_date }
    pub fn end_date(&self) -> DateTime<Utc> { self.end_date }
    pub fn description(&self) -> &str { &self.description }
    pub fn is_active(&self) -> bool { self.is_active }

    /// Both window bounds are inclusive.
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool { self.start_date <= now && now <= self.end_date }

    /// Whether the code may be redeemed right now, ignoring the order value.
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), DiscountError> {
        if !self.is_active { return Err(DiscountError::Inactive); }
        if !self.is_within_window(now) { return Err(DiscountError::OutsideWindow); }
        Ok(())
    }

    pub fn check(&self, subtotal: Money, now: DateTime<Utc>) -> Result<(), DiscountError> {
        self.check_redeemable(now)?;
        if subtotal < self.min_order_value { return Err(DiscountError::BelowMinimum { min_order_value: self.min_order_value }); }
        Ok(())
    }

    /// Reduction for `subtotal`, clamped to the configured cap and to the subtotal itself.
    pub fn amount_for(&self, subtotal: Money) -> Money {
        let raw = match self.kind {
            DiscountKind::Percentage => subtotal.scale(Decimal::new(self.value.clamp(0, 100), 2)),
            DiscountKind::Fixed => Money::new(self.value.max(0)),
        };
        let capped = if self.max_order_value.amount() > 0 { raw.min(self.max_order_value) } else { raw };
        capped.min(subtotal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountError { Inactive, OutsideWindow, BelowMinimum { min_order_value: Money }, InvalidValue, InvalidWindow }
impl std::error::Error for DiscountError {}
impl std::fmt::Display for DiscountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => write!(f, "Discount inactive"),
            Self::OutsideWindow => write!(f, "Discount not valid at this time"),
            Self::BelowMinimum { min_order_value } => write!(f, "Order below minimum of {}", min_order_value),
            Self::InvalidValue => write!(f, "Invalid discount value"),
            Self::InvalidWindow => write!(f, "Discount ends before it starts"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code() -> DiscountCode { DiscountCode::new("VAPORDAY10").unwrap() }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now - Duration::days(1), now + Duration::days(1))
    }

    #[test]
    fn test_percentage_without_cap() {
        let (start, end) = window();
        let d = Discount::create(code(), DiscountKind::Percentage, 20, start, end).unwrap().activate();
        assert_eq!(d.amount_for(Money::new(1_000_000)), Money::new(200_000));
    }

    #[test]
    fn test_percentage_with_cap() {
        let (start, end) = window();
        let d = Discount::create(code(), DiscountKind::Percentage, 20, start, end).unwrap().with_max_order_value(Money::new(150_000));
        assert_eq!(d.amount_for(Money::new(1_000_000)), Money::new(150_000));
    }

    #[test]
    fn test_fixed_caps_itself() {
        let (start, end) = window();
        let d = Discount::create(code(), DiscountKind::Fixed, 500_000, start, end).unwrap();
        assert_eq!(d.max_order_value(), Money::new(500_000));
        assert_eq!(d.amount_for(Money::new(2_000_000)), Money::new(500_000));
    }

    #[test]
    fn test_fixed_with_lower_cap_still_clamped() {
        let (start, end) = window();
        let d = Discount::create(code(), DiscountKind::Fixed, 500_000, start, end).unwrap().with_max_order_value(Money::new(300_000));
        assert_eq!(d.amount_for(Money::new(2_000_000)), Money::new(300_000));
    }

    #[test]
    fn test_never_exceeds_subtotal() {
        let (start, end) = window();
        let d = Discount::create(code(), DiscountKind::Fixed, 500_000, start, end).unwrap();
        assert_eq!(d.amount_for(Money::new(120_000)), Money::new(120_000));
    }

    #[test]
    fn test_check_rules() {
        let (start, end) = window();
        let now = Utc::now();
        let d = Discount::create(code(), DiscountKind::Percentage, 10, start, end).unwrap().with_min_order_value(Money::new(1_000_000));
        assert_eq!(d.check(Money::new(2_000_000), now), Err(DiscountError::Inactive));
        let d = d.activate();
        assert_eq!(d.check(Money::new(50_000), now), Err(DiscountError::BelowMinimum { min_order_value: Money::new(1_000_000) }));
        assert!(d.check(Money::new(1_000_000), now).is_ok());
        assert_eq!(d.check(Money::new(2_000_000), end + Duration::seconds(1)), Err(DiscountError::OutsideWindow));
        assert!(d.check(Money::new(2_000_000), end).is_ok());
        assert_eq!(d.check(Money::new(2_000_000), start - Duration::seconds(1)), Err(DiscountError::OutsideWindow));
        assert!(d.check(Money::new(2_000_000), start).is_ok());
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let (start, end) = window();
        assert_eq!(Discount::create(code(), DiscountKind::Percentage, 101, start, end).unwrap_err(), DiscountError::InvalidValue);
        assert_eq!(Discount::create(code(), DiscountKind::Fixed, 0, start, end).unwrap_err(), DiscountError::InvalidValue);
        assert_eq!(Discount::create(code(), DiscountKind::Fixed, 10, end, start).unwrap_err(), DiscountError::InvalidWindow);
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(DiscountKind::from_code(0), Some(DiscountKind::Percentage));
        assert_eq!(DiscountKind::from_code(1), Some(DiscountKind::Fixed));
        assert_eq!(DiscountKind::from_code(2), None);
        assert_eq!(DiscountKind::Fixed.code(), 1);
    }
}
