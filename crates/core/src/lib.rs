//! cartsync core - Shared cart types.
//!
//! This crate provides the types used across all cartsync components:
//! - `client` - Cart reconciler, remote cart API client, guest cart store
//! - `cli` - Command-line driver for the reconciler
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money helpers, cart items and summaries

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
