//! Request bodies and their validation

use axum::extract::multipart::{Multipart, MultipartError};
use serde::Deserialize;
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

use crate::checkout::CheckoutRequest;
use crate::domain::aggregates::{Cart, Customer};
use crate::pricing::DiscountSelector;
use crate::storage::ProofUpload;
use crate::ShopError;

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct LineRequest {
    pub id: i64,
    pub quantity: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PricingPreviewRequest {
    pub items: Vec<LineRequest>,
    #[serde(default)]
    pub discount_code: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CheckTransactionRequest {
    #[validate(email, length(min = 3, max = 45))]
    pub email: String,
    #[validate(length(min = 5, max = 12))]
    pub item_trx_id: String,
}

/// Checkout form as posted by the storefront, before it becomes a [`CheckoutRequest`].
#[derive(Clone, Debug, Default, Validate)]
pub struct BillingForm {
    #[validate(length(min = 3, max = 45))]
    pub name: String,
    #[validate(length(min = 11, max = 15))]
    pub phone: String,
    #[validate(email, length(min = 8, max = 45))]
    pub email: String,
    #[validate(length(min = 3, max = 45))]
    pub city: String,
    #[validate(length(min = 10))]
    pub address: String,
    #[validate(custom = "validate_post_code")]
    pub post_code: String,
    pub items: Vec<(i64, u32)>,
    pub discount_code: Option<String>,
    pub discount_id: Option<i64>,
    pub payment_proof: Option<ProofUpload>,
}

fn validate_post_code(value: &str) -> Result<(), ValidationError> {
    if value.len() == 5 && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("post_code_digits"))
    }
}

/// Discount reference from optional raw code / id fields. A code wins over an id.
pub fn discount_selector(code: Option<&str>, id: Option<i64>) -> Option<DiscountSelector> {
    match (code.map(str::trim).filter(|c| !c.is_empty()), id) {
        (Some(code), _) => Some(DiscountSelector::from_code(code)),
        (None, Some(id)) => Some(DiscountSelector::Id(id)),
        (None, None) => None,
    }
}

impl PricingPreviewRequest {
    pub fn cart(&self) -> Result<Cart, ShopError> {
        if self.items.is_empty() { return Err(ShopError::EmptyCart); }
        Ok(Cart::from_requests(self.items.iter().map(|l| (l.id, l.quantity)))?)
    }
}

impl BillingForm {
    pub fn into_checkout(self) -> Result<CheckoutRequest, ShopError> {
        self.validate()?;
        let payment_proof = self.payment_proof.ok_or(ShopError::InvalidField { field: "payment_proof", reason: "required".into() })?;
        if self.items.is_empty() { return Err(ShopError::EmptyCart); }
        let cart = Cart::from_requests(self.items)?;
        let discount = discount_selector(self.discount_code.as_deref(), self.discount_id);
        Ok(CheckoutRequest {
            customer: Customer { name: self.name, email: self.email, phone: self.phone, address: self.address, city: self.city, post_code: self.post_code },
            cart,
            discount,
            payment_proof,
        })
    }
}

/// Splits `item_ids[3][quantity]` into `(3, "quantity")`.
pub fn parse_item_key(key: &str) -> Option<(usize, &str)> {
    let rest = key.strip_prefix("item_ids[")?;
    let (index, rest) = rest.split_once(']')?;
    let attr = rest.strip_prefix('[')?.strip_suffix(']')?;
    Some((index.parse().ok()?, attr))
}

fn invalid_items(reason: impl Into<String>) -> ShopError {
    ShopError::InvalidField { field: "item_ids", reason: reason.into() }
}

fn multipart_error(e: MultipartError) -> ShopError {
    ShopError::InvalidField { field: "form", reason: e.body_text() }
}

/// Reads the multipart checkout form. Items may arrive either as indexed
/// `item_ids[N][id]` / `item_ids[N][quantity]` fields or as one `item_ids`
/// JSON array. Unknown fields, including a client-computed
/// `discount_amount`, are ignored.
pub async fn read_billing_form(mut multipart: Multipart) -> Result<BillingForm, ShopError> {
    let mut form = BillingForm::default();
    let mut indexed: BTreeMap<usize, (Option<i64>, Option<u32>)> = BTreeMap::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "payment_proof" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
            form.payment_proof = Some(ProofUpload { file_name, content_type, bytes });
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        let value = value.trim();
        match name.as_str() {
            "name" => form.name = value.to_string(),
            "email" => form.email = value.to_string(),
            "phone" => form.phone = value.to_string(),
            "city" => form.city = value.to_string(),
            "address" => form.address = value.to_string(),
            "post_code" => form.post_code = value.to_string(),
            "discount_code" => form.discount_code = Some(value.to_string()).filter(|v| !v.is_empty()),
            "discount_id" if !value.is_empty() => {
                form.discount_id = Some(value.parse().map_err(|_| ShopError::InvalidField { field: "discount_id", reason: "not a number".into() })?);
            }
            "item_ids" => {
                let lines: Vec<LineRequest> = serde_json::from_str(value).map_err(|e| invalid_items(e.to_string()))?;
                form.items.extend(lines.into_iter().map(|l| (l.id, l.quantity)));
            }
            other => {
                let Some((index, attr)) = parse_item_key(other) else { continue };
                let entry = indexed.entry(index).or_default();
                match attr {
                    "id" => entry.0 = Some(value.parse().map_err(|_| invalid_items(format!("item {index}: id is not a number")))?),
                    "quantity" => entry.1 = Some(value.parse().map_err(|_| invalid_items(format!("item {index}: quantity is not a number")))?),
                    _ => {}
                }
            }
        }
    }

    for (index, entry) in indexed {
        match entry {
            (Some(id), Some(quantity)) => form.items.push((id, quantity)),
            _ => return Err(invalid_items(format!("item {index} needs both id and quantity"))),
        }
    }
    Ok(form)
}
