//! Durable storage for the guest cart.
//!
//! The only state that outlives a process is the guest cart, written as a
//! single record: `{"guestCart": [...]}`. Authenticated state is always
//! re-fetched from the cart service and never persisted.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use cartsync_core::CartItem;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the guest cart store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Guest cart I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored record could not be encoded or decoded.
    #[error("Guest cart is not valid JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-value storage for the guest cart.
///
/// Calls are synchronous. Concurrent writers are not coordinated; the last
/// write wins.
pub trait GuestCartStore: Send + Sync {
    /// Load the persisted guest cart. A store that was never written loads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read or decoded.
    fn load(&self) -> Result<Vec<CartItem>, StoreError>;

    /// Replace the persisted guest cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    fn save(&self, items: &[CartItem]) -> Result<(), StoreError>;
}

/// The persisted record. Only the guest cart is included.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCart {
    #[serde(default)]
    guest_cart: Vec<CartItem>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCartRef<'a> {
    guest_cart: &'a [CartItem],
}

fn encode(items: &[CartItem]) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(&PersistedCartRef { guest_cart: items })?)
}

fn decode(raw: &str) -> Result<Vec<CartItem>, StoreError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let record: PersistedCart = serde_json::from_str(raw)?;
    Ok(record.guest_cart)
}

// =============================================================================
// JsonFileStore
// =============================================================================

/// Guest cart persisted to a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by `path`. Nothing is touched until the first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl GuestCartStore for JsonFileStore {
    fn load(&self) -> Result<Vec<CartItem>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => decode(&raw),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, items: &[CartItem]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        // Write then rename so a crash never leaves a half-written record
        let temp = self.temp_path();
        fs::write(&temp, encode(items)?)?;
        fs::rename(&temp, &self.path)?;

        tracing::debug!(path = %self.path.display(), items = items.len(), "Guest cart saved");
        Ok(())
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// Guest cart kept in memory, encoded exactly as the file store would write it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a raw record, as if written by an earlier session.
    #[must_use]
    pub fn with_record(raw: impl Into<String>) -> Self {
        Self {
            record: Mutex::new(Some(raw.into())),
        }
    }

    /// The raw stored record, if anything was written.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl GuestCartStore for MemoryStore {
    fn load(&self) -> Result<Vec<CartItem>, StoreError> {
        self.raw().map_or_else(|| Ok(Vec::new()), |raw| decode(&raw))
    }

    fn save(&self, items: &[CartItem]) -> Result<(), StoreError> {
        let raw = encode(items)?;
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw);
        Ok(())
    }
}

impl<S: GuestCartStore + ?Sized> GuestCartStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Vec<CartItem>, StoreError> {
        (**self).load()
    }

    fn save(&self, items: &[CartItem]) -> Result<(), StoreError> {
        (**self).save(items)
    }
}
