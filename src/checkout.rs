//! Checkout workflow
//!
//! ```text
//! request ──► validate proof ──► price_cart (authoritative)
//!                                   │
//!                                   ▼
//!            store proof ──► unique trx id ──► insert order + lines
//!                                   │                   │
//!                   (failure) discard proof        OrderEvent::Created
//! ```

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::domain::aggregates::{Cart, Customer, Order};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::TrxId;
use crate::pricing::{price_cart, DiscountOutcome, DiscountSelector, Pricing};
use crate::storage::{ProofStorage, ProofUpload};
use crate::store::{DbError, OrderStore, Store, TrxIdRegistry};
use crate::{OrderDetail, ShopError};

/// Upper bound on trx-id draws before giving up.
pub const MAX_TRX_ID_ATTEMPTS: usize = 32;

#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    pub customer: Customer,
    pub cart: Cart,
    pub discount: Option<DiscountSelector>,
    pub payment_proof: ProofUpload,
}

#[derive(Clone, Debug)]
pub struct PlacedOrder {
    pub order: OrderDetail,
    pub pricing: Pricing,
    pub events: Vec<DomainEvent>,
}

/// Draws `JOINVPR####` ids until one is not yet taken.
pub async fn generate_unique_trx_id<R, G>(registry: &R, rng: &mut G) -> Result<TrxId, ShopError>
where
    R: TrxIdRegistry + ?Sized,
    G: Rng + Send + ?Sized,
{
    for attempt in 1..=MAX_TRX_ID_ATTEMPTS {
        let candidate = TrxId::random(rng);
        if !registry.trx_id_exists(&candidate).await? {
            return Ok(candidate);
        }
        warn!(attempt, trx_id = %candidate, "transaction id collision");
    }
    Err(ShopError::TrxIdExhausted)
}

/// Prices the cart server-side and records the order.
///
/// A discount that turns out invalid or below its minimum is dropped and the
/// order goes through without it.
pub async fn place_order<S>(store: &S, storage: &ProofStorage, request: CheckoutRequest, now: DateTime<Utc>) -> Result<PlacedOrder, ShopError>
where
    S: Store + ?Sized,
{
    if request.cart.is_empty() {
        return Err(ShopError::EmptyCart);
    }
    request.payment_proof.validate()?;

    let pricing = price_cart(store, store, &request.cart, request.discount.as_ref(), now).await?;
    match &pricing.discount {
        DiscountOutcome::Invalid => warn!(discount = ?request.discount, "discount invalid, checking out without it"),
        DiscountOutcome::BelowMinimum { min_order_value } => {
            warn!(discount = ?request.discount, %min_order_value, subtotal = %pricing.result.subtotal, "order below discount minimum")
        }
        DiscountOutcome::Applied { .. } | DiscountOutcome::NotRequested => {}
    }

    let proof_path = storage.save(&request.payment_proof).await?;
    match record_order(store, request.customer, &pricing, &proof_path, now).await {
        Ok((order, events)) => Ok(PlacedOrder { order, pricing, events }),
        Err(e) => {
            storage.discard(&proof_path).await;
            Err(e)
        }
    }
}

/// Inserts the order under a fresh trx id, drawing again when a concurrent
/// checkout claimed the same id between the existence check and the insert.
async fn record_order<S>(
    store: &S,
    customer: Customer,
    pricing: &Pricing,
    proof_path: &str,
    now: DateTime<Utc>,
) -> Result<(OrderDetail, Vec<DomainEvent>), ShopError>
where
    S: OrderStore + ?Sized,
{
    let mut rng = StdRng::from_entropy();
    for attempt in 1..=MAX_TRX_ID_ATTEMPTS {
        let trx_id = generate_unique_trx_id(store, &mut rng).await?;
        let mut order = Order::place(trx_id, customer.clone(), pricing.lines.clone(), pricing.result, pricing.discount.discount_id(), proof_path, now)
            .map_err(|_| ShopError::EmptyCart)?;

        match store.insert_order(&order).await {
            Ok(detail) => {
                info!(trx_id = %order.trx_id(), total = %order.total(), items = order.lines().len(), "order placed");
                return Ok((detail, order.take_events()));
            }
            Err(DbError::Conflict(_)) => warn!(attempt, trx_id = %order.trx_id(), "transaction id taken on insert"),
            Err(e) => return Err(ShopError::Database(e)),
        }
    }
    Err(ShopError::TrxIdConflict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{Money, Quantity};
    use crate::pricing::{calculate, LineItem};
    use crate::OrderRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports the first `taken` draws as already used.
    struct Registry { taken: usize, calls: AtomicUsize }

    #[async_trait]
    impl TrxIdRegistry for Registry {
        async fn trx_id_exists(&self, _trx_id: &TrxId) -> Result<bool, DbError> {
            Ok(self.calls.fetch_add(1, Ordering::SeqCst) < self.taken)
        }
    }

    #[tokio::test]
    async fn test_retries_past_collisions() {
        let registry = Registry { taken: 3, calls: AtomicUsize::new(0) };
        let mut rng = StdRng::seed_from_u64(1);
        let id = generate_unique_trx_id(&registry, &mut rng).await.unwrap();
        assert!(id.as_str().starts_with(TrxId::PREFIX));
        assert_eq!(registry.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_gives_up_after_bound() {
        let registry = Registry { taken: usize::MAX, calls: AtomicUsize::new(0) };
        let mut rng = StdRng::seed_from_u64(1);
        let err = generate_unique_trx_id(&registry, &mut rng).await.unwrap_err();
        assert!(matches!(err, ShopError::TrxIdExhausted));
        assert_eq!(registry.calls.load(Ordering::SeqCst), MAX_TRX_ID_ATTEMPTS);
    }

    /// Rejects the first `conflicts` inserts as if another checkout took the id.
    struct RacingOrders { conflicts: usize, inserts: AtomicUsize }

    #[async_trait]
    impl TrxIdRegistry for RacingOrders {
        async fn trx_id_exists(&self, _trx_id: &TrxId) -> Result<bool, DbError> { Ok(false) }
    }

    #[async_trait]
    impl OrderStore for RacingOrders {
        async fn insert_order(&self, order: &Order) -> Result<OrderDetail, DbError> {
            if self.inserts.fetch_add(1, Ordering::SeqCst) < self.conflicts {
                return Err(DbError::Conflict("item_trx_id"));
            }
            let c = order.customer();
            let p = order.pricing();
            Ok(OrderDetail {
                order: OrderRecord {
                    id: 1,
                    name: c.name.clone(),
                    email: c.email.clone(),
                    phone: c.phone.clone(),
                    address: c.address.clone(),
                    city: c.city.clone(),
                    post_code: c.post_code.clone(),
                    quantity: p.total_quantity as i32,
                    sub_total_amount: p.subtotal.amount(),
                    total_tax_amount: p.tax_amount.amount(),
                    discount_id: order.discount_id(),
                    discount_amount: p.discount_amount.amount(),
                    total_amount: p.grand_total.amount(),
                    item_trx_id: order.trx_id().to_string(),
                    payment_proof: order.payment_proof().to_string(),
                    is_paid: false,
                    on_store: false,
                    created_at: order.created_at(),
                },
                transaction_details: vec![],
            })
        }

        async fn find_order(&self, _email: &str, _trx_id: &str) -> Result<Option<OrderDetail>, DbError> { Ok(None) }
    }

    fn priced() -> Pricing {
        let line = LineItem { item_id: 1, unit_price: Money::new(100_000), quantity: Quantity::new(2).unwrap() };
        calculate(vec![line], None, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_conflict_draws_new_id() {
        let store = RacingOrders { conflicts: 1, inserts: AtomicUsize::new(0) };
        let (detail, events) = record_order(&store, Customer::default(), &priced(), "payment_proof/a.png", Utc::now()).await.unwrap();
        assert_eq!(store.inserts.load(Ordering::SeqCst), 2);
        assert!(TrxId::parse(&detail.order.item_trx_id).is_ok());
        assert_eq!(detail.order.total_amount, 200_600);
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_conflicts_are_bounded() {
        let store = RacingOrders { conflicts: usize::MAX, inserts: AtomicUsize::new(0) };
        let err = record_order(&store, Customer::default(), &priced(), "payment_proof/a.png", Utc::now()).await.unwrap_err();
        assert!(matches!(err, ShopError::TrxIdConflict));
        assert_eq!(store.inserts.load(Ordering::SeqCst), MAX_TRX_ID_ATTEMPTS);
    }
}
