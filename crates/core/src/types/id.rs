//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. IDs are opaque
//! strings: the remote cart service owns their format.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Default`, `PartialEq`, `Eq`, `Hash`
/// - Accessors: `new()`, `as_str()`, `is_empty()`
/// - `From<String>`, `From<&str>` and `Into<String>` implementations
///
/// # Example
///
/// ```rust
/// # use cartsync_core::define_id;
/// define_id!(ProductId);
/// define_id!(OrderId);
///
/// let product_id = ProductId::new("p-1");
/// let order_id = OrderId::new("p-1");
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = order_id;
/// assert_eq!(product_id.as_str(), order_id.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Default,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the ID is blank (missing or whitespace only).
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(UserId);
define_id!(VariantId);
define_id!(CartItemId);

impl CartItemId {
    /// Prefix for identifiers synthesized by the client for guest items.
    pub const GUEST_PREFIX: &'static str = "guest-";

    /// Generate a locally unique ID for a guest cart item.
    #[must_use]
    pub fn generate_guest() -> Self {
        Self(format!("{}{}", Self::GUEST_PREFIX, uuid::Uuid::new_v4()))
    }

    /// Whether this ID was synthesized locally rather than assigned by the server.
    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.0.starts_with(Self::GUEST_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_ids_are_empty() {
        assert!(VariantId::default().is_empty());
        assert!(VariantId::new("   ").is_empty());
        assert!(!VariantId::new("v1").is_empty());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = VariantId::new("gid://variant/42");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"gid://variant/42\"");
    }

    #[test]
    fn test_guest_ids_are_unique_and_prefixed() {
        let a = CartItemId::generate_guest();
        let b = CartItemId::generate_guest();
        assert_ne!(a, b);
        assert!(a.is_guest());
        assert!(!CartItemId::new("srv-1").is_guest());
    }
}
