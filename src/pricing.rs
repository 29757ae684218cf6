//! Order pricing
//!
//! Turns a [`Cart`] into quantity, subtotal, tax, discount and grand total.
//! Unit prices always come from the catalog at calculation time; nothing the
//! client sends about prices or discount amounts is trusted.
//!
//! ```text
//! subtotal    = Σ unit_price × quantity
//! tax         = round(subtotal × 0.3%)
//! discount    = percentage or fixed, capped by max_order_value and subtotal
//! grand_total = subtotal + tax - discount
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::aggregates::{Cart, Discount, DiscountError};
use crate::domain::value_objects::{DiscountCode, Money, Quantity};
use crate::store::{Catalog, DbError, DiscountLookup};

/// Flat 0.3% tax on the subtotal.
pub fn tax_rate() -> Decimal { Decimal::new(3, 3) }

/// A cart line with its authoritative unit price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineItem {
    pub item_id: i64,
    pub unit_price: Money,
    pub quantity: Quantity,
}

impl LineItem {
    pub fn total(&self) -> Money { self.unit_price.multiply(self.quantity.value()) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PricingResult {
    pub total_quantity: u32,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub grand_total: Money,
}

/// What happened to the discount the customer asked for. Never fatal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscountOutcome {
    NotRequested,
    Applied { discount_id: i64, amount: Money },
    /// Unknown code, inactive, or outside its validity window.
    Invalid,
    BelowMinimum { min_order_value: Money },
}

impl DiscountOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::NotRequested => "none",
            Self::Applied { .. } => "applied",
            Self::Invalid => "invalid",
            Self::BelowMinimum { .. } => "below_minimum",
        }
    }

    pub fn discount_id(&self) -> Option<i64> {
        match self { Self::Applied { discount_id, .. } => Some(*discount_id), _ => None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pricing {
    pub lines: Vec<LineItem>,
    pub result: PricingResult,
    pub discount: DiscountOutcome,
}

/// How the customer referred to a discount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscountSelector {
    Code(DiscountCode),
    Id(i64),
    /// A code that cannot exist, e.g. of the wrong length.
    Malformed(String),
}

impl DiscountSelector {
    pub fn from_code(raw: &str) -> Self {
        DiscountCode::new(raw).map(Self::Code).unwrap_or_else(|_| Self::Malformed(raw.to_string()))
    }
}

#[derive(Error, Debug)]
pub enum PricingError {
    #[error("Item {0} not found")]
    ItemNotFound(i64),

    #[error(transparent)]
    Store(#[from] DbError),
}

/// Prices already-resolved lines. Pure apart from `now`, which only decides
/// whether the discount window is open.
pub fn calculate(lines: Vec<LineItem>, discount: Option<&Discount>, now: DateTime<Utc>) -> Pricing {
    let subtotal = lines.iter().fold(Money::zero(), |acc, l| acc.add(l.total()));
    let total_quantity = lines.iter().map(|l| l.quantity.value()).sum();
    let tax_amount = subtotal.scale(tax_rate());

    let outcome = match discount {
        None => DiscountOutcome::NotRequested,
        Some(d) => match d.check(subtotal, now) {
            Ok(()) => DiscountOutcome::Applied { discount_id: d.id(), amount: d.amount_for(subtotal) },
            Err(DiscountError::BelowMinimum { min_order_value }) => DiscountOutcome::BelowMinimum { min_order_value },
            Err(_) => DiscountOutcome::Invalid,
        },
    };
    let discount_amount = match outcome { DiscountOutcome::Applied { amount, .. } => amount, _ => Money::zero() };

    Pricing {
        lines,
        result: PricingResult {
            total_quantity,
            subtotal,
            tax_amount,
            discount_amount,
            grand_total: subtotal.add(tax_amount).subtract(discount_amount),
        },
        discount: outcome,
    }
}

/// Looks up current prices and the requested discount, then calculates.
pub async fn price_cart<C, D>(
    catalog: &C,
    discounts: &D,
    cart: &Cart,
    selector: Option<&DiscountSelector>,
    now: DateTime<Utc>,
) -> Result<Pricing, PricingError>
where
    C: Catalog + ?Sized,
    D: DiscountLookup + ?Sized,
{
    let prices = catalog.item_prices(&cart.item_ids()).await?;
    let lines = cart
        .lines()
        .iter()
        .map(|l| {
            let unit_price = *prices.get(&l.item_id).ok_or(PricingError::ItemNotFound(l.item_id))?;
            Ok(LineItem { item_id: l.item_id, unit_price, quantity: l.quantity })
        })
        .collect::<Result<Vec<_>, PricingError>>()?;

    let discount = match selector {
        None => None,
        Some(DiscountSelector::Code(code)) => discounts.discount_by_code(code).await?,
        Some(DiscountSelector::Id(id)) => discounts.discount_by_id(*id).await?,
        Some(DiscountSelector::Malformed(_)) => None,
    };
    if selector.is_some() && discount.is_none() {
        debug!(?selector, "requested discount does not exist");
        let mut pricing = calculate(lines, None, now);
        pricing.discount = DiscountOutcome::Invalid;
        return Ok(pricing);
    }
    Ok(calculate(lines, discount.as_ref(), now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::DiscountKind;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::HashMap;

    fn line(item_id: i64, price: i64, qty: u32) -> LineItem {
        LineItem { item_id, unit_price: Money::new(price), quantity: Quantity::new(qty).unwrap() }
    }

    fn discount(kind: DiscountKind, value: i64) -> Discount {
        let now = Utc::now();
        Discount::create(DiscountCode::new("VAPORDAY10").unwrap(), kind, value, now - Duration::days(1), now + Duration::days(1))
            .unwrap()
            .with_id(7)
            .activate()
    }

    #[test]
    fn test_end_to_end_without_discount() {
        let p = calculate(vec![line(1, 100_000, 2), line(2, 250_000, 1)], None, Utc::now());
        assert_eq!(p.result.total_quantity, 3);
        assert_eq!(p.result.subtotal, Money::new(450_000));
        assert_eq!(p.result.tax_amount, Money::new(1_350));
        assert_eq!(p.result.discount_amount, Money::zero());
        assert_eq!(p.result.grand_total, Money::new(451_350));
        assert_eq!(p.discount, DiscountOutcome::NotRequested);
    }

    #[test]
    fn test_empty_lines_price_to_zero() {
        let p = calculate(vec![], None, Utc::now());
        assert_eq!(p.result, PricingResult::default());
    }

    #[test]
    fn test_percentage_discount() {
        let d = discount(DiscountKind::Percentage, 20);
        let p = calculate(vec![line(1, 1_000_000, 1)], Some(&d), Utc::now());
        assert_eq!(p.result.discount_amount, Money::new(200_000));
        assert_eq!(p.discount, DiscountOutcome::Applied { discount_id: 7, amount: Money::new(200_000) });
        assert_eq!(p.result.grand_total, Money::new(1_000_000 + 3_000 - 200_000));
    }

    #[test]
    fn test_fixed_discount_at_cap() {
        let d = discount(DiscountKind::Fixed, 500_000);
        let p = calculate(vec![line(1, 1_000_000, 2)], Some(&d), Utc::now());
        assert_eq!(p.result.discount_amount, Money::new(500_000));
    }

    #[test]
    fn test_below_minimum_drops_discount() {
        let d = discount(DiscountKind::Percentage, 20).with_min_order_value(Money::new(1_000_000));
        let p = calculate(vec![line(1, 50_000, 1)], Some(&d), Utc::now());
        assert_eq!(p.discount, DiscountOutcome::BelowMinimum { min_order_value: Money::new(1_000_000) });
        assert_eq!(p.result.discount_amount, Money::zero());
        assert_eq!(p.result.grand_total, p.result.subtotal.add(p.result.tax_amount));
    }

    #[test]
    fn test_expired_discount_not_applied() {
        let d = discount(DiscountKind::Percentage, 20);
        let later = d.end_date() + Duration::minutes(1);
        let p = calculate(vec![line(1, 1_000_000, 1)], Some(&d), later);
        assert_eq!(p.discount, DiscountOutcome::Invalid);
        assert_eq!(p.result.discount_amount, Money::zero());
    }

    #[test]
    fn test_not_yet_started_discount_not_applied() {
        let d = discount(DiscountKind::Fixed, 50_000);
        let earlier = d.start_date() - Duration::minutes(1);
        let p = calculate(vec![line(1, 1_000_000, 1)], Some(&d), earlier);
        assert_eq!(p.discount, DiscountOutcome::Invalid);
        assert_eq!(p.result.discount_amount, Money::zero());
        assert_eq!(p.result.grand_total, Money::new(1_003_000));
    }

    #[test]
    fn test_idempotent() {
        let lines = vec![line(1, 123_457, 3), line(9, 5, 999)];
        let now = Utc::now();
        assert_eq!(calculate(lines.clone(), None, now), calculate(lines, None, now));
    }

    struct Fixture { prices: HashMap<i64, Money>, discount: Option<Discount> }

    #[async_trait]
    impl Catalog for Fixture {
        async fn item_prices(&self, ids: &[i64]) -> Result<HashMap<i64, Money>, DbError> {
            Ok(ids.iter().filter_map(|id| self.prices.get(id).map(|p| (*id, *p))).collect())
        }
    }

    #[async_trait]
    impl DiscountLookup for Fixture {
        async fn discount_by_code(&self, code: &DiscountCode) -> Result<Option<Discount>, DbError> {
            Ok(self.discount.clone().filter(|d| d.code() == code))
        }
        async fn discount_by_id(&self, id: i64) -> Result<Option<Discount>, DbError> {
            Ok(self.discount.clone().filter(|d| d.id() == id))
        }
    }

    fn fixture() -> Fixture {
        Fixture { prices: HashMap::from([(1, Money::new(100_000)), (2, Money::new(250_000))]), discount: Some(discount(DiscountKind::Fixed, 50_000)) }
    }

    #[tokio::test]
    async fn test_price_cart_uses_catalog_prices() {
        let f = fixture();
        let cart = Cart::from_requests([(1, 2), (2, 1)]).unwrap();
        let p = price_cart(&f, &f, &cart, None, Utc::now()).await.unwrap();
        assert_eq!(p.result.subtotal, Money::new(450_000));
        assert_eq!(p.lines[1].unit_price, Money::new(250_000));
    }

    #[tokio::test]
    async fn test_price_cart_unknown_item() {
        let f = fixture();
        let cart = Cart::from_requests([(1, 1), (42, 1)]).unwrap();
        let err = price_cart(&f, &f, &cart, None, Utc::now()).await.unwrap_err();
        assert!(matches!(err, PricingError::ItemNotFound(42)));
    }

    #[tokio::test]
    async fn test_price_cart_resolves_discount_by_code_and_id() {
        let f = fixture();
        let cart = Cart::from_requests([(2, 1)]).unwrap();
        let by_code = DiscountSelector::Code(DiscountCode::new("VAPORDAY10").unwrap());
        let p = price_cart(&f, &f, &cart, Some(&by_code), Utc::now()).await.unwrap();
        assert_eq!(p.result.discount_amount, Money::new(50_000));
        let p = price_cart(&f, &f, &cart, Some(&DiscountSelector::Id(7)), Utc::now()).await.unwrap();
        assert_eq!(p.discount.discount_id(), Some(7));
    }

    #[tokio::test]
    async fn test_price_cart_unknown_discount_is_invalid() {
        let f = fixture();
        let cart = Cart::from_requests([(2, 1)]).unwrap();
        let unknown = DiscountSelector::Code(DiscountCode::new("NOSUCHCODE").unwrap());
        let p = price_cart(&f, &f, &cart, Some(&unknown), Utc::now()).await.unwrap();
        assert_eq!(p.discount, DiscountOutcome::Invalid);
        assert_eq!(p.result.grand_total, Money::new(250_750));
        let malformed = DiscountSelector::from_code("SHORT");
        assert_eq!(malformed, DiscountSelector::Malformed("SHORT".into()));
        let p = price_cart(&f, &f, &cart, Some(&malformed), Utc::now()).await.unwrap();
        assert_eq!(p.discount, DiscountOutcome::Invalid);
    }
}
