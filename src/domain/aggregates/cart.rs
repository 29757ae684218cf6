//! Cart Aggregate

use crate::domain::value_objects::{Quantity, QuantityError};

/// Items a customer asks to buy. Prices are never carried here; they are
/// looked up from the catalog when the cart is priced.
#[derive(Clone, Debug, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CartLine {
    pub item_id: i64,
    pub quantity: Quantity,
}

impl Cart {
    /// Builds a cart from raw `(item_id, quantity)` pairs, merging repeated ids.
    pub fn from_requests<I>(requests: I) -> Result<Self, CartError>
    where
        I: IntoIterator<Item = (i64, u32)>,
    {
        let mut cart = Self::default();
        for (item_id, quantity) in requests {
            let quantity = Quantity::new(quantity).map_err(|e| CartError::InvalidQuantity { item_id, source: e })?;
            cart.add_item(item_id, quantity)?;
        }
        Ok(cart)
    }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn len(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn item_ids(&self) -> Vec<i64> { self.lines.iter().map(|l| l.item_id).collect() }

    pub fn add_item(&mut self, item_id: i64, quantity: Quantity) -> Result<(), CartError> {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.item_id == item_id) {
            existing.quantity = existing.quantity.add(quantity).map_err(|e| CartError::InvalidQuantity { item_id, source: e })?;
        } else {
            self.lines.push(CartLine { item_id, quantity });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartError { InvalidQuantity { item_id: i64, source: QuantityError } }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::InvalidQuantity { item_id, source } => write!(f, "Item {}: {}", item_id, source) }
    }
}
