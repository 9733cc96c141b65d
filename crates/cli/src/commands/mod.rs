//! Cart commands.
//!
//! Each command opens the reconciler from configuration, loads the server
//! cart when a user is configured, runs one operation and prints the cart.

pub mod cart;
pub mod render;

use cartsync_client::{ApiError, CartError, ConfigError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The cart service client could not be built.
    #[error("Cart service client error: {0}")]
    Client(#[from] ApiError),

    /// A cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),
}

impl CommandError {
    /// Process exit code: `2` when the cart rejected the request before any
    /// network call, `1` for everything else.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Cart(e) if e.is_local() => 2,
            _ => 1,
        }
    }
}
