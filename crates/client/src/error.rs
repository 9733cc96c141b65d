//! Errors returned across the reconciler boundary.
//!
//! Every public cart operation returns `Result<_, CartError>`; nothing panics
//! or unwinds into the caller. The display text of an error is the message a
//! UI should show, and is also what the reconciler keeps as its last error.

use thiserror::Error;

use crate::api::ApiError;

/// Cart operation error.
#[derive(Debug, Error)]
pub enum CartError {
    /// Input rejected before any network call.
    #[error("{0}")]
    Validation(String),

    /// Operation requires a signed-in user.
    #[error("{0}")]
    NotAuthenticated(String),

    /// A merge was requested but no user could be resolved.
    #[error("No authenticated user available to merge the guest cart")]
    MissingUser,

    /// The cart service call failed.
    #[error("{message}")]
    Remote {
        /// Server message when available, otherwise a per-operation fallback.
        message: String,
        #[source]
        source: ApiError,
    },
}

impl CartError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wrap a service failure, surfacing the server's own message verbatim
    /// when it sent one.
    pub(crate) fn remote(source: ApiError, fallback: &str) -> Self {
        let message = source
            .server_message()
            .map_or_else(|| fallback.to_string(), str::to_string);
        tracing::error!(error = %source, message = %message, "Cart service call failed");
        Self::Remote { message, source }
    }

    /// Whether the error was detected locally, before any network call.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        !matches!(self, Self::Remote { .. })
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_uses_server_message() {
        let err = CartError::remote(
            ApiError::Status {
                status: 409,
                message: Some("Only 2 left in stock".to_string()),
            },
            "Failed to add item to cart",
        );
        assert_eq!(err.to_string(), "Only 2 left in stock");
        assert!(!err.is_local());
    }

    #[test]
    fn test_remote_error_falls_back() {
        let err = CartError::remote(ApiError::RateLimited(3), "Failed to add item to cart");
        assert_eq!(err.to_string(), "Failed to add item to cart");
    }

    #[test]
    fn test_validation_display() {
        let err = CartError::validation("Quantity must be between 1 and 99");
        assert_eq!(err.to_string(), "Quantity must be between 1 and 99");
        assert!(err.is_local());
    }
}
