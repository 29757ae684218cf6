//! PostgreSQL repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::debug;

use super::{Catalog, CatalogBrowser, DbError, DiscountLookup, OrderStore, TrxIdRegistry};
use crate::config::AppConfig;
use crate::domain::aggregates::{Discount, DiscountKind, DiscountParts, Order};
use crate::domain::value_objects::{DiscountCode, Money, TrxId};
use crate::{CatalogGroup, CatalogGroupDetail, GroupKind, ItemDetail, ItemFilter, ItemPhoto, ItemRecord, ItemSpecification, OrderDetail, OrderLineRecord, OrderRecord};

const ITEM_SELECT: &str = "SELECT i.id, i.category_id, i.brand_id, i.name, i.slug, i.thumbnail, i.description, i.stock, i.price, \
    i.is_popular, i.is_displayed, i.avg_rating, c.name AS category_name, b.name AS brand_name, i.created_at, i.updated_at \
    FROM items i JOIN categories c ON c.id = i.category_id JOIN brands b ON b.id = i.brand_id";

const ORDER_COLUMNS: &str = "id, name, email, phone, address, city, post_code, quantity, sub_total_amount, total_tax_amount, \
    discount_id, discount_amount, total_amount, item_trx_id, payment_proof, is_paid, on_store, created_at";

const DISCOUNT_SELECT: &str = "SELECT id, code, type, value, min_order_value, max_order_value, start_date, end_date, description, is_active FROM discounts";

impl GroupKind {
    fn table(&self) -> &'static str { match self { Self::Category => "categories", Self::Brand => "brands" } }
    fn item_column(&self) -> &'static str { match self { Self::Category => "category_id", Self::Brand => "brand_id" } }
}

#[derive(Debug, sqlx::FromRow)]
struct DiscountRow {
    id: i64,
    code: String,
    #[sqlx(rename = "type")]
    kind: i16,
    value: i64,
    min_order_value: i64,
    max_order_value: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    description: String,
    is_active: bool,
}

impl TryFrom<DiscountRow> for Discount {
    type Error = DbError;

    fn try_from(row: DiscountRow) -> Result<Self, Self::Error> {
        let code = DiscountCode::new(row.code).map_err(|e| DbError::Corrupt(format!("discount {}: {}", row.id, e)))?;
        let kind = DiscountKind::from_code(row.kind).ok_or_else(|| DbError::Corrupt(format!("discount {}: type {}", row.id, row.kind)))?;
        Ok(Discount::restore(DiscountParts {
            id: row.id,
            code,
            kind,
            value: row.value,
            min_order_value: Money::new(row.min_order_value),
            max_order_value: Money::new(row.max_order_value),
            start_date: row.start_date,
            end_date: row.end_date,
            description: row.description,
            is_active: row.is_active,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Opens the pool and applies pending migrations.
    pub async fn connect(config: &AppConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new().max_connections(config.database_max_connections).connect(&config.database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }

    async fn order_lines(&self, order_id: i64) -> Result<Vec<OrderLineRecord>, DbError> {
        let lines = sqlx::query_as::<_, OrderLineRecord>(
            "SELECT t.id, t.item_id, t.quantity, t.price, i.name AS item_name, i.slug AS item_slug, i.thumbnail AS item_thumbnail \
             FROM transaction_details t JOIN items i ON i.id = t.item_id \
             WHERE t.billing_detail_id = $1 AND t.deleted_at IS NULL ORDER BY t.id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    async fn displayed_items(&self, kind: GroupKind, group_id: i64, popular_only: bool) -> Result<Vec<ItemRecord>, DbError> {
        let sql = format!(
            "{ITEM_SELECT} WHERE i.{} = $1 AND i.is_displayed AND (NOT $2 OR i.is_popular) ORDER BY i.created_at DESC",
            kind.item_column()
        );
        Ok(sqlx::query_as::<_, ItemRecord>(&sql).bind(group_id).bind(popular_only).fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn item_prices(&self, ids: &[i64]) -> Result<HashMap<i64, Money>, DbError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as("SELECT id, price FROM items WHERE id = ANY($1)").bind(ids).fetch_all(&self.pool).await?;
        debug!(requested = ids.len(), found = rows.len(), "loaded item prices");
        Ok(rows.into_iter().map(|(id, price)| (id, Money::new(price))).collect())
    }
}

#[async_trait]
impl DiscountLookup for PgStore {
    async fn discount_by_code(&self, code: &DiscountCode) -> Result<Option<Discount>, DbError> {
        // Codes are not unique in storage; prefer an active record, then the newest.
        let sql = format!("{DISCOUNT_SELECT} WHERE code = $1 ORDER BY is_active DESC, id DESC LIMIT 1");
        let row = sqlx::query_as::<_, DiscountRow>(&sql).bind(code.as_str()).fetch_optional(&self.pool).await?;
        row.map(Discount::try_from).transpose()
    }

    async fn discount_by_id(&self, id: i64) -> Result<Option<Discount>, DbError> {
        let sql = format!("{DISCOUNT_SELECT} WHERE id = $1");
        let row = sqlx::query_as::<_, DiscountRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(Discount::try_from).transpose()
    }
}

#[async_trait]
impl TrxIdRegistry for PgStore {
    async fn trx_id_exists(&self, trx_id: &TrxId) -> Result<bool, DbError> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM billing_details WHERE item_trx_id = $1)")
            .bind(trx_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<OrderDetail, DbError> {
        let customer = order.customer();
        let pricing = order.pricing();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO billing_details (name, email, phone, address, city, post_code, quantity, sub_total_amount, total_tax_amount, \
             discount_id, discount_amount, total_amount, item_trx_id, payment_proof, is_paid, on_store, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $17) RETURNING {ORDER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(&customer.name)
            .bind(&customer.email)
            .bind(&customer.phone)
            .bind(&customer.address)
            .bind(&customer.city)
            .bind(&customer.post_code)
            .bind(i32::try_from(pricing.total_quantity).unwrap_or(i32::MAX))
            .bind(pricing.subtotal.amount())
            .bind(pricing.tax_amount.amount())
            .bind(order.discount_id())
            .bind(order.discount_amount().amount())
            .bind(order.total().amount())
            .bind(order.trx_id().as_str())
            .bind(order.payment_proof())
            .bind(order.is_paid())
            .bind(order.on_store())
            .bind(order.created_at())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => DbError::Conflict("item_trx_id"),
                e => DbError::Query(e),
            })?;

        for line in order.lines() {
            sqlx::query("INSERT INTO transaction_details (billing_detail_id, item_id, quantity, price, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $5)")
                .bind(record.id)
                .bind(line.item_id)
                .bind(i32::try_from(line.quantity.value()).unwrap_or(i32::MAX))
                .bind(line.unit_price.amount())
                .bind(order.created_at())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        let transaction_details = self.order_lines(record.id).await?;
        Ok(OrderDetail { order: record, transaction_details })
    }

    async fn find_order(&self, email: &str, trx_id: &str) -> Result<Option<OrderDetail>, DbError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM billing_details WHERE email = $1 AND item_trx_id = $2 AND deleted_at IS NULL");
        let Some(order) = sqlx::query_as::<_, OrderRecord>(&sql).bind(email).bind(trx_id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let transaction_details = self.order_lines(order.id).await?;
        Ok(Some(OrderDetail { order, transaction_details }))
    }
}

#[async_trait]
impl CatalogBrowser for PgStore {
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<ItemRecord>, DbError> {
        let sql = format!(
            "{ITEM_SELECT} WHERE i.is_displayed \
             AND ($1::BIGINT IS NULL OR i.category_id = $1) \
             AND ($2::BIGINT IS NULL OR i.brand_id = $2) \
             AND ($3::BOOLEAN IS NULL OR i.is_popular = $3) \
             ORDER BY i.created_at DESC LIMIT $4"
        );
        let items = sqlx::query_as::<_, ItemRecord>(&sql)
            .bind(filter.category_id)
            .bind(filter.brand_id)
            .bind(filter.is_popular)
            .bind(filter.limit.map(i64::from))
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn item_by_slug(&self, slug: &str) -> Result<Option<ItemDetail>, DbError> {
        let sql = format!("{ITEM_SELECT} WHERE i.slug = $1");
        let Some(item) = sqlx::query_as::<_, ItemRecord>(&sql).bind(slug).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let item_photos = sqlx::query_as::<_, ItemPhoto>("SELECT id, photo FROM item_photos WHERE item_id = $1 ORDER BY id")
            .bind(item.id)
            .fetch_all(&self.pool)
            .await?;
        let item_specifications = sqlx::query_as::<_, ItemSpecification>("SELECT id, name FROM item_specifications WHERE item_id = $1 ORDER BY id")
            .bind(item.id)
            .fetch_all(&self.pool)
            .await?;
        Ok(Some(ItemDetail { item, item_photos, item_specifications }))
    }

    async fn list_groups(&self, kind: GroupKind, limit: Option<u32>) -> Result<Vec<CatalogGroup>, DbError> {
        let sql = format!(
            "SELECT g.id, g.name, g.slug, g.photo, COUNT(i.id) FILTER (WHERE i.is_displayed) AS items_count \
             FROM {} g LEFT JOIN items i ON i.{} = g.id GROUP BY g.id ORDER BY g.name LIMIT $1",
            kind.table(),
            kind.item_column()
        );
        Ok(sqlx::query_as::<_, CatalogGroup>(&sql).bind(limit.map(i64::from)).fetch_all(&self.pool).await?)
    }

    async fn group_by_slug(&self, kind: GroupKind, slug: &str) -> Result<Option<CatalogGroupDetail>, DbError> {
        let sql = format!(
            "SELECT g.id, g.name, g.slug, g.photo, COUNT(i.id) FILTER (WHERE i.is_displayed) AS items_count \
             FROM {} g LEFT JOIN items i ON i.{} = g.id WHERE g.slug = $1 GROUP BY g.id",
            kind.table(),
            kind.item_column()
        );
        let Some(group) = sqlx::query_as::<_, CatalogGroup>(&sql).bind(slug).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let items = self.displayed_items(kind, group.id, false).await?;
        let popular_items = self.displayed_items(kind, group.id, true).await?;
        Ok(Some(CatalogGroupDetail { group, items, popular_items }))
    }
}
