//! Plain-text cart output.

use std::fmt::Write as _;

use cartsync_client::{AuthProvider, CartApi, CartReconciler, GuestCartStore, MergeReport, Mode};
use cartsync_core::money;

/// Format the authoritative cart, its summary and any issues.
pub fn cart<A, S, P>(cart: &CartReconciler<A, S, P>) -> String
where
    A: CartApi,
    S: GuestCartStore,
    P: AuthProvider,
{
    let mut out = String::new();
    let mode = cart.mode();
    let heading = match &mode {
        Mode::Guest => "guest".to_string(),
        Mode::Authenticated(user) => format!(
            "signed in as {}",
            user.email.as_deref().unwrap_or_else(|| user.id.as_str())
        ),
    };
    let _ = writeln!(out, "Cart ({heading})");

    let items = cart.cart_items();
    if items.is_empty() {
        let _ = writeln!(out, "  (empty)");
    }
    for item in items {
        let _ = writeln!(
            out,
            "  {}  {}  x{}  @ {}  = {}",
            item.id,
            if item.name.is_empty() {
                item.variant_id.as_str()
            } else {
                item.name.as_str()
            },
            item.quantity,
            money::format(item.price),
            money::format(item.item_total),
        );
        for issue in &item.issues {
            let _ = writeln!(out, "      ! {issue}");
        }
    }
    for issue in cart.issues() {
        let _ = writeln!(out, "  ! {}", issue.message);
    }

    let summary = cart.cart_summary();
    let _ = writeln!(
        out,
        "  {} line(s), {} unit(s), subtotal {}",
        summary.item_count,
        summary.total_quantity,
        summary.formatted_subtotal()
    );

    let pending = cart.guest_items().len();
    if mode.is_authenticated() && pending > 0 {
        let _ = writeln!(out, "  {pending} guest line(s) waiting to be merged");
    }
    out
}

/// Format the outcome of a merge.
pub fn merge_report(report: &MergeReport) -> String {
    let mut out = format!(
        "Merged {} line(s), skipped {}\n",
        report.merged_count, report.skipped_count
    );
    for skipped in &report.skipped {
        let reason = skipped
            .get("reason")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("skipped by the cart service");
        let variant = skipped
            .get("variantId")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("?");
        let _ = writeln!(out, "  - {variant}: {reason}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_report_lists_skipped_lines() {
        let report = MergeReport {
            merged_count: 1,
            skipped_count: 1,
            merged: Vec::new(),
            skipped: vec![serde_json::json!({ "variantId": "v2", "reason": "Out of stock" })],
        };

        let text = merge_report(&report);

        assert!(text.starts_with("Merged 1 line(s), skipped 1"));
        assert!(text.contains("v2: Out of stock"));
    }
}
