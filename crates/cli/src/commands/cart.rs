//! Cart operations driven from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Add two units of a variant as a guest
//! cartsync add var_123 -q 2 --name "Canvas Tote" --price 12.50 --stock 8
//!
//! # Sign in (via env) and merge the guest cart into the server cart
//! CARTSYNC_USER_ID=user_1 CARTSYNC_SESSION_COOKIE=sid=... cartsync merge
//!
//! # Apply a coupon (signed-in only)
//! cartsync coupon apply SAVE10
//! ```

use cartsync_client::{
    AddToCart, CartReconciler, ClientConfig, HttpCartApi, JsonFileStore, MergeReport, User,
};
use cartsync_core::CartItemId;
use clap::Args;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::CommandError;

/// Reconciler wired to the HTTP cart service and the on-disk guest cart.
pub type Cart = CartReconciler<HttpCartApi, JsonFileStore, Option<User>>;

/// Arguments for `add`.
#[derive(Debug, Args)]
pub struct AddArgs {
    /// Variant ID
    pub variant: String,

    /// Units to add
    #[arg(short, long, default_value_t = 1)]
    pub quantity: u32,

    /// Product name shown in the guest cart
    #[arg(long, default_value = "")]
    pub name: String,

    /// Product description shown in the guest cart
    #[arg(long)]
    pub description: Option<String>,

    /// Variant SKU
    #[arg(long)]
    pub sku: Option<String>,

    /// Unit price
    #[arg(long, default_value_t = Decimal::ZERO)]
    pub price: Decimal,

    /// Units in stock; caps the guest quantity
    #[arg(long)]
    pub stock: Option<u32>,
}

impl From<AddArgs> for AddToCart {
    fn from(args: AddArgs) -> Self {
        Self::new(args.variant, args.quantity)
            .with_product(args.name, args.description)
            .with_variant(args.sku, args.price, args.stock)
    }
}

/// Build a reconciler from configuration. Nothing is fetched yet.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn open(config: &ClientConfig) -> Result<Cart, CommandError> {
    let api = HttpCartApi::new(&config.api)?;
    let store = JsonFileStore::new(&config.store_path);
    debug!(path = %store.path().display(), "Using guest cart store");
    Ok(CartReconciler::new(api, store, config.user.clone()))
}

/// Load the current cart.
pub async fn show(cart: &mut Cart) -> Result<(), CommandError> {
    cart.initialize_cart(None).await?;
    Ok(())
}

pub async fn add(cart: &mut Cart, args: AddArgs) -> Result<(), CommandError> {
    let request = AddToCart::from(args);
    info!(variant_id = %request.variant_id, quantity = request.quantity, "Adding to cart");
    cart.add_to_cart(request).await?;
    Ok(())
}

pub async fn update(cart: &mut Cart, item: &str, quantity: i64) -> Result<(), CommandError> {
    cart.update_cart_item(&CartItemId::new(item), quantity).await?;
    Ok(())
}

pub async fn remove(cart: &mut Cart, item: &str) -> Result<(), CommandError> {
    cart.remove_cart_item(&CartItemId::new(item)).await?;
    Ok(())
}

pub async fn clear(cart: &mut Cart) -> Result<(), CommandError> {
    cart.clear_cart().await?;
    info!("Cart cleared");
    Ok(())
}

pub async fn apply_coupon(cart: &mut Cart, code: &str) -> Result<(), CommandError> {
    cart.apply_coupon(code).await?;
    Ok(())
}

pub async fn remove_coupon(cart: &mut Cart) -> Result<(), CommandError> {
    cart.remove_coupon().await?;
    Ok(())
}

/// Merge pending guest lines into the configured user's cart.
pub async fn merge(cart: &mut Cart) -> Result<MergeReport, CommandError> {
    let report = cart.merge_guest_cart(None).await?;
    if report == MergeReport::default() {
        // Nothing was sent, so the server cart was not re-fetched
        cart.initialize_cart(None).await?;
    }
    Ok(report)
}

pub fn reset(cart: &mut Cart) {
    cart.reset_cart();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_args_into_request() {
        let args = AddArgs {
            variant: "var_1".to_string(),
            quantity: 3,
            name: "Canvas Tote".to_string(),
            description: None,
            sku: Some("TOTE-1".to_string()),
            price: Decimal::new(1250, 2),
            stock: Some(8),
        };

        let request = AddToCart::from(args);

        assert_eq!(request.variant_id.as_str(), "var_1");
        assert_eq!(request.quantity, 3);
        assert_eq!(request.product.name, "Canvas Tote");
        assert_eq!(request.variant.price, Decimal::new(1250, 2));
        assert_eq!(request.variant.available_stock, Some(8));
    }
}
