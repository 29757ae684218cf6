//! Join Vapor Bontang Storefront
//!
//! Backend for a single-shop vape storefront.
//!
//! ## Features
//! - Catalog browsing (items, categories, brands)
//! - Discount codes with percentage or fixed reductions
//! - Server-side order pricing with tax and discount
//! - Checkout with manual payment-proof upload
//! - Order lookup by email and transaction id

pub mod api;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod pricing;
pub mod storage;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::CartError;
use crate::pricing::PricingError;
use crate::store::DbError;

// =============================================================================
// Read Models
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ItemRecord {
    pub id: i64,
    pub category_id: i64,
    pub brand_id: i64,
    pub name: String,
    pub slug: String,
    pub thumbnail: String,
    pub description: String,
    pub stock: i16,
    pub price: i64,
    pub is_popular: bool,
    pub is_displayed: bool,
    pub avg_rating: f64,
    pub category_name: String,
    pub brand_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ItemPhoto { pub id: i64, pub photo: String }

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ItemSpecification { pub id: i64, pub name: String }

#[derive(Clone, Debug, Serialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: ItemRecord,
    pub item_photos: Vec<ItemPhoto>,
    pub item_specifications: Vec<ItemSpecification>,
}

/// Query filters accepted by the item listing.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ItemFilter {
    pub category_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub is_popular: Option<bool>,
    pub limit: Option<u32>,
}

/// Categories and brands share one shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupKind { Category, Brand }

/// A category or brand. `items_count` only counts displayed items.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct CatalogGroup {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub photo: String,
    pub items_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct CatalogGroupDetail {
    #[serde(flatten)]
    pub group: CatalogGroup,
    pub items: Vec<ItemRecord>,
    pub popular_items: Vec<ItemRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub post_code: String,
    pub quantity: i32,
    pub sub_total_amount: i64,
    pub total_tax_amount: i64,
    pub discount_id: Option<i64>,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub item_trx_id: String,
    pub payment_proof: String,
    pub is_paid: bool,
    pub on_store: bool,
    pub created_at: DateTime<Utc>,
}

/// One purchased item with the unit price it was sold at.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderLineRecord {
    pub id: i64,
    pub item_id: i64,
    pub quantity: i32,
    pub price: i64,
    pub item_name: String,
    pub item_slug: String,
    pub item_thumbnail: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderRecord,
    pub transaction_details: Vec<OrderLineRecord>,
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("Item {0} not found")]
    ItemNotFound(i64),

    #[error("Transaction not found")]
    OrderNotFound,

    #[error("Discount code not found or no longer valid")]
    DiscountNotFound,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("{0}")]
    InvalidCart(#[from] CartError),

    #[error("Validation failed")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Invalid payment proof: {0}")]
    InvalidPaymentProof(String),

    #[error("Could not allocate a unique transaction id")]
    TrxIdExhausted,

    #[error("Transaction id already taken")]
    TrxIdConflict,

    #[error("File storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<PricingError> for ShopError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::ItemNotFound(id) => ShopError::ItemNotFound(id),
            PricingError::Store(e) => ShopError::Database(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;
