//! Remote cart service boundary.
//!
//! # Architecture
//!
//! - [`CartApi`] is the seam between the reconciler and the network; every
//!   call can fail and is treated as such
//! - [`HttpCartApi`] talks JSON over HTTP with `reqwest`
//! - Session credentials ride along as a cookie; callers never handle tokens
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |---|---|
//! | fetch cart | `GET /cart` |
//! | add item | `POST /cart/add-to-cart` |
//! | update item | `PATCH /cart/update-item/{itemId}` |
//! | remove item | `DELETE /cart/remove-item/{itemId}` |
//! | clear | `DELETE /cart/clear-cart` |
//! | merge | `POST /cart/merge` |
//! | apply coupon | `POST /coupons/apply` |
//! | remove coupon | `DELETE /coupons/remove` |

mod http;

pub use http::HttpCartApi;

use async_trait::async_trait;
use cartsync_core::{CartIssue, CartItem, CartItemId, CartSummary, VariantId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when talking to the cart service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("(no error details provided)"))]
    Status {
        /// HTTP status code.
        status: u16,
        /// `message` or `error` field from the response body, if any.
        message: Option<String>,
    },

    /// Rate limited by the cart service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An endpoint URL could not be built from the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// The message the server attached to the failure, verbatim.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Whether the service reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Full authenticated cart as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    /// Cart record (coupon, totals, ids); opaque to the client.
    #[serde(default)]
    pub cart: Option<serde_json::Value>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub summary: Option<CartSummary>,
    #[serde(default)]
    pub issues: Vec<CartIssue>,
}

/// Body of an add-to-cart request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub variant_id: VariantId,
    pub quantity: u32,
}

/// A guest line projected down to what the server needs for a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeLine {
    pub variant_id: VariantId,
    pub quantity: u32,
}

/// Result of a guest cart merge, as decided by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// Lines the server accepted.
    #[serde(default)]
    pub merged_count: usize,
    /// Lines the server rejected (already present, out of stock, unknown variant).
    #[serde(default)]
    pub skipped_count: usize,
    #[serde(default)]
    pub merged: Vec<serde_json::Value>,
    #[serde(default)]
    pub skipped: Vec<serde_json::Value>,
}

/// Operations exposed by the remote cart service.
///
/// All calls are made on behalf of the session the implementation was
/// configured with.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartApi: Send + Sync {
    /// Fetch the full cart: items, summary and item-level issues.
    async fn fetch_cart(&self) -> Result<CartSnapshot, ApiError>;

    /// Add a variant to the cart.
    async fn add_item(&self, request: AddItemRequest) -> Result<serde_json::Value, ApiError>;

    /// Set the quantity of a cart line.
    async fn update_item(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<serde_json::Value, ApiError>;

    /// Remove a cart line.
    async fn remove_item(&self, item_id: CartItemId) -> Result<(), ApiError>;

    /// Remove every line from the cart.
    async fn clear_cart(&self) -> Result<(), ApiError>;

    /// Merge guest lines into the cart in one batch.
    async fn merge_items(&self, items: Vec<MergeLine>) -> Result<MergeReport, ApiError>;

    /// Apply a coupon code to the cart.
    async fn apply_coupon(&self, code: String) -> Result<serde_json::Value, ApiError>;

    /// Remove the applied coupon.
    async fn remove_coupon(&self) -> Result<(), ApiError>;
}
