//! HTTP surface of the storefront

pub mod forms;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use validator::Validate;

use crate::checkout::place_order;
use crate::domain::aggregates::Discount;
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{DiscountCode, Money};
use crate::pricing::{price_cart, DiscountOutcome, DiscountSelector, Pricing};
use crate::storage::{ProofStorage, MAX_PROOF_BYTES};
use crate::store::Store;
use crate::{CatalogGroup, CatalogGroupDetail, GroupKind, ItemDetail, ItemFilter, ItemRecord, OrderDetail, ShopError};
use forms::{read_billing_form, CheckTransactionRequest, PricingPreviewRequest};

/// Room for the largest proof plus the text fields around it.
const BODY_LIMIT: usize = MAX_PROOF_BYTES * 2;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub storage: ProofStorage,
    pub nats: Option<async_nats::Client>,
}

#[derive(Debug, Serialize)]
pub struct Data<T> { pub data: T }

#[derive(Debug, Deserialize)]
pub struct LimitParams { pub limit: Option<u32> }

#[derive(Debug, Serialize)]
pub struct PricingResponse {
    pub quantity: u32,
    pub sub_total_amount: Money,
    pub total_tax_amount: Money,
    pub total_amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<Money>,
    pub discount_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_order_value: Option<Money>,
}

impl From<&Pricing> for PricingResponse {
    fn from(p: &Pricing) -> Self {
        Self {
            quantity: p.result.total_quantity,
            sub_total_amount: p.result.subtotal,
            total_tax_amount: p.result.tax_amount,
            total_amount: p.result.grand_total,
            discount_amount: matches!(p.discount, DiscountOutcome::Applied { .. }).then_some(p.result.discount_amount),
            discount_status: p.discount.status(),
            min_order_value: match p.discount { DiscountOutcome::BelowMinimum { min_order_value } => Some(min_order_value), _ => None },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DiscountResource {
    pub id: i64,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: i16,
    pub value: i64,
    pub min_order_value: Money,
    pub max_order_value: Money,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: String,
    pub is_active: bool,
}

impl From<&Discount> for DiscountResource {
    fn from(d: &Discount) -> Self {
        Self {
            id: d.id(),
            code: d.code().to_string(),
            kind: d.kind().code(),
            value: d.value(),
            min_order_value: d.min_order_value(),
            max_order_value: d.max_order_value(),
            start_date: d.start_date(),
            end_date: d.end_date(),
            description: d.description().to_string(),
            is_active: d.is_active(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub data: OrderDetail,
    pub discount_status: &'static str,
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let status = match &self {
            ShopError::Validation(_)
            | ShopError::InvalidField { .. }
            | ShopError::InvalidCart(_)
            | ShopError::InvalidPaymentProof(_)
            | ShopError::EmptyCart
            | ShopError::ItemNotFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ShopError::OrderNotFound | ShopError::DiscountNotFound | ShopError::NotFound(_) => StatusCode::NOT_FOUND,
            ShopError::TrxIdExhausted | ShopError::TrxIdConflict => StatusCode::CONFLICT,
            ShopError::Storage(_) | ShopError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = match &self {
            ShopError::Validation(errors) => serde_json::json!({ "message": self.to_string(), "errors": errors }),
            _ if status.is_server_error() => {
                error!(error = %self, "request failed");
                serde_json::json!({ "message": "An error occurred" })
            }
            _ => serde_json::json!({ "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ShopError {
    fn from(rejection: JsonRejection) -> Self {
        ShopError::InvalidField { field: "body", reason: rejection.body_text() }
    }
}

impl From<QueryRejection> for ShopError {
    fn from(rejection: QueryRejection) -> Self {
        ShopError::InvalidField { field: "query", reason: rejection.body_text() }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "joinvapor-store"})) }))
        .route("/api/items", get(list_items))
        .route("/api/item/:slug", get(show_item))
        .route("/api/categories", get(list_categories))
        .route("/api/category/:slug", get(show_category))
        .route("/api/brands", get(list_brands))
        .route("/api/brand/:slug", get(show_brand))
        .route("/api/discount/:code", get(show_discount))
        .route("/api/pricing", post(preview_pricing))
        .route("/api/billing-detail", post(create_billing_detail))
        .route("/api/check-transaction", post(check_transaction))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn list_items(State(s): State<AppState>, filter: Result<Query<ItemFilter>, QueryRejection>) -> Result<Json<Data<Vec<ItemRecord>>>, ShopError> {
    let Query(filter) = filter?;
    Ok(Json(Data { data: s.store.list_items(&filter).await? }))
}

async fn show_item(State(s): State<AppState>, Path(slug): Path<String>) -> Result<Json<Data<ItemDetail>>, ShopError> {
    let item = s.store.item_by_slug(&slug).await?.ok_or(ShopError::NotFound("Item"))?;
    Ok(Json(Data { data: item }))
}

async fn list_categories(State(s): State<AppState>, params: Result<Query<LimitParams>, QueryRejection>) -> Result<Json<Data<Vec<CatalogGroup>>>, ShopError> {
    let Query(p) = params?;
    Ok(Json(Data { data: s.store.list_groups(GroupKind::Category, p.limit).await? }))
}

async fn show_category(State(s): State<AppState>, Path(slug): Path<String>) -> Result<Json<Data<CatalogGroupDetail>>, ShopError> {
    let group = s.store.group_by_slug(GroupKind::Category, &slug).await?.ok_or(ShopError::NotFound("Category"))?;
    Ok(Json(Data { data: group }))
}

async fn list_brands(State(s): State<AppState>, params: Result<Query<LimitParams>, QueryRejection>) -> Result<Json<Data<Vec<CatalogGroup>>>, ShopError> {
    let Query(p) = params?;
    Ok(Json(Data { data: s.store.list_groups(GroupKind::Brand, p.limit).await? }))
}

async fn show_brand(State(s): State<AppState>, Path(slug): Path<String>) -> Result<Json<Data<CatalogGroupDetail>>, ShopError> {
    let group = s.store.group_by_slug(GroupKind::Brand, &slug).await?.ok_or(ShopError::NotFound("Brand"))?;
    Ok(Json(Data { data: group }))
}

/// Only codes that are active and inside their window are returned.
async fn show_discount(State(s): State<AppState>, Path(code): Path<String>) -> Result<Json<Data<DiscountResource>>, ShopError> {
    let code = DiscountCode::new(code).map_err(|_| ShopError::DiscountNotFound)?;
    let discount = s.store.discount_by_code(&code).await?.ok_or(ShopError::DiscountNotFound)?;
    discount.check_redeemable(Utc::now()).map_err(|_| ShopError::DiscountNotFound)?;
    Ok(Json(Data { data: DiscountResource::from(&discount) }))
}

async fn preview_pricing(State(s): State<AppState>, body: Result<Json<PricingPreviewRequest>, JsonRejection>) -> Result<Json<PricingResponse>, ShopError> {
    let Json(r) = body?;
    let cart = r.cart()?;
    let selector = r.discount_code.as_deref().map(DiscountSelector::from_code);
    let pricing = price_cart(&*s.store, &*s.store, &cart, selector.as_ref(), Utc::now()).await?;
    Ok(Json(PricingResponse::from(&pricing)))
}

async fn create_billing_detail(State(s): State<AppState>, multipart: Multipart) -> Result<(StatusCode, Json<CheckoutResponse>), ShopError> {
    let request = read_billing_form(multipart).await?.into_checkout()?;
    let placed = place_order(&*s.store, &s.storage, request, Utc::now()).await?;
    publish_events(s.nats.as_ref(), &placed.events).await;
    Ok((StatusCode::CREATED, Json(CheckoutResponse { data: placed.order, discount_status: placed.pricing.discount.status() })))
}

async fn check_transaction(State(s): State<AppState>, body: Result<Json<CheckTransactionRequest>, JsonRejection>) -> Result<Json<Data<OrderDetail>>, ShopError> {
    let Json(r) = body?;
    r.validate()?;
    let order = s.store.find_order(r.email.trim(), r.item_trx_id.trim()).await?.ok_or(ShopError::OrderNotFound)?;
    Ok(Json(Data { data: order }))
}

async fn publish_events(nats: Option<&async_nats::Client>, events: &[DomainEvent]) {
    let Some(client) = nats else { return };
    for event in events {
        let payload = match event.to_json() {
            Ok(p) => p,
            Err(e) => { warn!(error = %e, "could not encode event"); continue; }
        };
        match client.publish(event.subject().to_string(), payload.into()).await {
            Ok(()) => info!(subject = event.subject(), "event published"),
            Err(e) => warn!(subject = event.subject(), error = %e, "event publish failed"),
        }
    }
}
