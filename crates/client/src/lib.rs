//! cartsync client - Guest/authenticated cart reconciliation.
//!
//! A shopper can fill a cart before signing in. That cart lives on the
//! client; once they sign in, the cart service owns the cart and the guest
//! lines are merged into it. [`CartReconciler`] keeps both and routes every
//! read and write to whichever is authoritative.
//!
//! # Modules
//!
//! - [`api`] - Remote cart service trait and its `reqwest` implementation
//! - [`auth`] - Signed-in user and the provider the reconciler reads it from
//! - [`store`] - Guest cart persistence
//! - [`reconciler`] - The dual-mode cart state
//! - [`config`] - Environment configuration
//! - [`error`] - Errors surfaced by cart operations

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod reconciler;
pub mod store;

pub use api::{
    AddItemRequest, ApiError, CartApi, CartSnapshot, HttpCartApi, MergeLine, MergeReport,
};
pub use auth::{AuthProvider, SessionAuth, User};
pub use config::{CartApiConfig, ClientConfig, ConfigError};
pub use error::CartError;
pub use reconciler::{AddToCart, CartReconciler, CartView, Mode, ProductSnapshot, VariantSnapshot};
pub use store::{GuestCartStore, JsonFileStore, MemoryStore, StoreError};
