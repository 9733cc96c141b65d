//! Projection of the guest cart into a merge payload.

use cartsync_core::CartItem;

use crate::api::MergeLine;

/// Reduce guest lines to `{variantId, quantity}` pairs.
///
/// Display fields are dropped; the server re-resolves them from its own
/// catalog. Lines without a variant ID (corrupted storage) are skipped.
pub(super) fn project(items: &[CartItem]) -> Vec<MergeLine> {
    items
        .iter()
        .filter(|item| {
            let keep = !item.variant_id.is_empty();
            if !keep {
                tracing::warn!(item_id = %item.id, "Skipping guest line without a variant ID");
            }
            keep
        })
        .map(|item| MergeLine {
            variant_id: item.variant_id.clone(),
            quantity: item.quantity,
        })
        .collect()
}
