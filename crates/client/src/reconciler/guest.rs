//! Guest-mode cart mutations.
//!
//! Pure functions over the local item list. Quantities are always clamped
//! into `[1, min(99, stock)]`; nothing here can fail.

use cartsync_core::{CartItem, CartItemId, clamp_quantity, money};
use chrono::{DateTime, Utc};

use super::AddToCart;

/// Add a variant, merging into an existing line for the same variant.
pub(super) fn add(items: &mut Vec<CartItem>, request: AddToCart, now: DateTime<Utc>) {
    let requested = i64::from(request.quantity);

    if let Some(existing) = items
        .iter_mut()
        .find(|item| item.variant_id == request.variant_id)
    {
        let quantity = clamp_quantity(
            i64::from(existing.quantity) + requested,
            existing.available_stock,
        );
        existing.set_quantity(quantity, now);
        return;
    }

    let AddToCart {
        variant_id,
        product,
        variant,
        ..
    } = request;
    let quantity = clamp_quantity(requested, variant.available_stock);

    items.push(CartItem {
        id: CartItemId::generate_guest(),
        variant_id,
        name: product.name,
        description: product.description,
        sku: variant.sku,
        quantity,
        price: variant.price,
        item_total: money::line_total(variant.price, quantity),
        available_stock: variant.available_stock,
        has_issues: false,
        issues: Vec::new(),
        created_at: Some(now),
        updated_at: Some(now),
        extra: serde_json::Map::new(),
    });
}

/// Set a line's quantity, clamped. Returns `false` if no line has that ID.
pub(super) fn update(
    items: &mut [CartItem],
    item_id: &CartItemId,
    quantity: i64,
    now: DateTime<Utc>,
) -> bool {
    let Some(item) = items.iter_mut().find(|item| &item.id == item_id) else {
        return false;
    };
    let quantity = clamp_quantity(quantity, item.available_stock);
    item.set_quantity(quantity, now);
    true
}

/// Remove a line. Returns `false` if no line has that ID.
pub(super) fn remove(items: &mut Vec<CartItem>, item_id: &CartItemId) -> bool {
    let before = items.len();
    items.retain(|item| &item.id != item_id);
    items.len() != before
}
