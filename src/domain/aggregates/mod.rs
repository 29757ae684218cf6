//! Aggregates module
pub mod cart;
pub mod discount;
pub mod order;

pub use cart::{Cart, CartError, CartLine};
pub use discount::{Discount, DiscountError, DiscountKind, DiscountParts};
pub use order::{Customer, Order, OrderError};
