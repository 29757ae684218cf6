//! Repository seams
//!
//! Pricing, checkout and the HTTP layer only see these traits. The
//! PostgreSQL implementation lives in [`postgres`].

pub mod postgres;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::aggregates::{Discount, Order};
use crate::domain::value_objects::{DiscountCode, Money, TrxId};
use crate::{CatalogGroup, CatalogGroupDetail, GroupKind, ItemDetail, ItemFilter, ItemRecord, OrderDetail};

pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("duplicate {0}")]
    Conflict(&'static str),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Current catalog prices.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Prices of the requested items. Unknown ids are simply absent.
    async fn item_prices(&self, ids: &[i64]) -> Result<HashMap<i64, Money>, DbError>;
}

/// Discount records, returned whatever their validity; callers check it.
#[async_trait]
pub trait DiscountLookup: Send + Sync {
    async fn discount_by_code(&self, code: &DiscountCode) -> Result<Option<Discount>, DbError>;
    async fn discount_by_id(&self, id: i64) -> Result<Option<Discount>, DbError>;
}

#[async_trait]
pub trait TrxIdRegistry: Send + Sync {
    async fn trx_id_exists(&self, trx_id: &TrxId) -> Result<bool, DbError>;
}

#[async_trait]
pub trait OrderStore: TrxIdRegistry {
    /// Writes the order and its lines atomically.
    async fn insert_order(&self, order: &Order) -> Result<OrderDetail, DbError>;
    async fn find_order(&self, email: &str, trx_id: &str) -> Result<Option<OrderDetail>, DbError>;
}

#[async_trait]
pub trait CatalogBrowser: Send + Sync {
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<ItemRecord>, DbError>;
    async fn item_by_slug(&self, slug: &str) -> Result<Option<ItemDetail>, DbError>;
    async fn list_groups(&self, kind: GroupKind, limit: Option<u32>) -> Result<Vec<CatalogGroup>, DbError>;
    async fn group_by_slug(&self, kind: GroupKind, slug: &str) -> Result<Option<CatalogGroupDetail>, DbError>;
}

/// Everything the HTTP layer needs from storage.
pub trait Store: Catalog + DiscountLookup + OrderStore + CatalogBrowser {}

impl<T> Store for T where T: Catalog + DiscountLookup + OrderStore + CatalogBrowser {}
