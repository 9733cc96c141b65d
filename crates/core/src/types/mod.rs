//! Core types for cartsync.
//!
//! This module provides type-safe wrappers for cart domain concepts.

pub mod cart;
pub mod id;
pub mod price;

pub use cart::{
    CartIssue, CartItem, CartSummary, MAX_ITEM_QUANTITY, MIN_ITEM_QUANTITY, clamp_quantity,
    quantity_ceiling,
};
pub use id::*;
pub use price::money;
