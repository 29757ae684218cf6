//! Order Aggregate
//!
//! An order is written once at checkout and never repriced afterwards.

use chrono::{DateTime, Utc};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, TrxId};
use crate::pricing::{LineItem, PricingResult};

#[derive(Clone, Debug)]
pub struct Order {
    trx_id: TrxId,
    customer: Customer,
    lines: Vec<LineItem>,
    pricing: PricingResult,
    discount_id: Option<i64>,
    payment_proof: String,
    is_paid: bool,
    on_store: bool,
    created_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Customer { pub name: String, pub email: String, pub phone: String, pub address: String, pub city: String, pub post_code: String }

impl Order {
    pub fn place(
        trx_id: TrxId,
        customer: Customer,
        lines: Vec<LineItem>,
        pricing: PricingResult,
        discount_id: Option<i64>,
        payment_proof: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() { return Err(OrderError::NoItems); }
        let mut order = Self {
            trx_id, customer, lines, pricing, discount_id, payment_proof: payment_proof.into(),
            is_paid: false, on_store: false, created_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Created {
            trx_id: order.trx_id.clone(),
            email: order.customer.email.clone(),
            quantity: order.pricing.total_quantity,
            total: order.pricing.grand_total,
        }));
        Ok(order)
    }

    pub fn trx_id(&self) -> &TrxId { &self.trx_id }
    pub fn customer(&self) -> &Customer { &self.customer }
    pub fn lines(&self) -> &[LineItem] { &self.lines }
    pub fn pricing(&self) -> &PricingResult { &self.pricing }
    pub fn discount_id(&self) -> Option<i64> { self.discount_id }
    pub fn discount_amount(&self) -> Money { self.pricing.discount_amount }
    pub fn total(&self) -> Money { self.pricing.grand_total }
    pub fn payment_proof(&self) -> &str { &self.payment_proof }
    pub fn is_paid(&self) -> bool { self.is_paid }
    pub fn on_store(&self) -> bool { self.on_store }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::NoItems => write!(f, "No items") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Quantity;
    use crate::pricing::calculate;

    fn customer() -> Customer {
        Customer { name: "Budi".into(), email: "budi@example.com".into(), phone: "081234567890".into(), address: "Jl. Ahmad Yani 12".into(), city: "Bontang".into(), post_code: "75311".into() }
    }

    #[test]
    fn test_place_order() {
        let lines = vec![LineItem { item_id: 1, unit_price: Money::new(100_000), quantity: Quantity::new(2).unwrap() }];
        let pricing = calculate(lines.clone(), None, Utc::now());
        let mut order = Order::place(TrxId::parse("JOINVPR1234").unwrap(), customer(), lines, pricing.result, None, "payment_proof/a.png", Utc::now()).unwrap();
        assert!(!order.is_paid());
        assert!(!order.on_store());
        assert_eq!(order.total(), Money::new(200_600));
        let events = order.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DomainEvent::Order(OrderEvent::Created { quantity: 2, .. })));
        assert!(order.take_events().is_empty());
    }

    #[test]
    fn test_order_requires_items() {
        let err = Order::place(TrxId::parse("JOINVPR1234").unwrap(), customer(), vec![], PricingResult::default(), None, "p.png", Utc::now()).unwrap_err();
        assert_eq!(err, OrderError::NoItems);
    }
}
