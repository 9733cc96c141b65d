//! Cart items, summaries and quantity bounds.
//!
//! The same [`CartItem`] shape is used for guest items (synthesized on the
//! client) and for authenticated items (returned by the cart service). Server
//! fields the client does not model are kept in `extra` so a server record
//! survives a round trip unchanged.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartItemId, VariantId};
use super::price::money;

/// Smallest quantity a cart line may hold.
pub const MIN_ITEM_QUANTITY: u32 = 1;

/// Largest quantity a cart line may hold, regardless of stock.
pub const MAX_ITEM_QUANTITY: u32 = 99;

/// Upper quantity bound for a line given the stock captured at add time.
///
/// Unknown stock falls back to [`MAX_ITEM_QUANTITY`]. The ceiling never drops
/// below [`MIN_ITEM_QUANTITY`], so an item in the cart always holds at least one unit.
#[must_use]
pub fn quantity_ceiling(available_stock: Option<u32>) -> u32 {
    available_stock
        .map_or(MAX_ITEM_QUANTITY, |stock| stock.min(MAX_ITEM_QUANTITY))
        .max(MIN_ITEM_QUANTITY)
}

/// Clamp a requested quantity into `[1, quantity_ceiling(stock)]`.
///
/// Takes `i64` so zero and negative requests can be corrected rather than rejected.
#[must_use]
pub fn clamp_quantity(requested: i64, available_stock: Option<u32>) -> u32 {
    let ceiling = quantity_ceiling(available_stock);
    let clamped = requested.clamp(i64::from(MIN_ITEM_QUANTITY), i64::from(ceiling));
    u32::try_from(clamped).unwrap_or(MIN_ITEM_QUANTITY)
}

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Line ID (locally generated for guest items).
    #[serde(default)]
    pub id: CartItemId,
    /// Purchasable variant this line refers to.
    #[serde(default)]
    pub variant_id: VariantId,
    /// Product name at add time.
    #[serde(default)]
    pub name: String,
    /// Product description at add time.
    #[serde(default)]
    pub description: Option<String>,
    /// Variant SKU at add time.
    #[serde(default)]
    pub sku: Option<String>,
    /// Units in the cart.
    #[serde(default)]
    pub quantity: u32,
    /// Unit price snapshot.
    #[serde(default)]
    pub price: Decimal,
    /// `price * quantity`, rounded to cents.
    #[serde(default)]
    pub item_total: Decimal,
    /// Stock ceiling captured at add time.
    #[serde(default)]
    pub available_stock: Option<u32>,
    /// Whether the line has problems (stock, price changes).
    #[serde(default)]
    pub has_issues: bool,
    /// Human-readable descriptions of the line's problems.
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Server fields not modelled above, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CartItem {
    /// Set the quantity, recomputing the line total and touching `updated_at`.
    pub fn set_quantity(&mut self, quantity: u32, now: DateTime<Utc>) {
        self.quantity = quantity;
        self.item_total = money::line_total(self.price, quantity);
        self.updated_at = Some(now);
    }

    /// Upper quantity bound for this line.
    #[must_use]
    pub fn quantity_ceiling(&self) -> u32 {
        quantity_ceiling(self.available_stock)
    }

    /// Pull a stored line back within bounds: clamp the quantity and
    /// recompute the line total. Returns `true` if anything changed.
    ///
    /// `updated_at` is left alone; the line was repaired, not edited.
    pub fn normalize(&mut self) -> bool {
        let quantity = self
            .quantity
            .clamp(MIN_ITEM_QUANTITY, self.quantity_ceiling());
        let item_total = money::line_total(self.price, quantity);
        if quantity == self.quantity && item_total == self.item_total {
            return false;
        }
        self.quantity = quantity;
        self.item_total = item_total;
        true
    }
}

/// Aggregate cart figures.
///
/// Guest summaries are derived from the items on every read. Authenticated
/// summaries come from the cart service and may carry extra figures
/// (discounts, totals, applied coupon) in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    /// Number of distinct lines.
    #[serde(default)]
    pub item_count: usize,
    /// Sum of quantities over all lines.
    #[serde(default)]
    pub total_quantity: u32,
    /// Sum of line totals, rounded to cents.
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CartSummary {
    /// Fold a summary over a set of items. Zeroed for an empty slice.
    #[must_use]
    pub fn from_items(items: &[CartItem]) -> Self {
        let (total_quantity, subtotal) = items
            .iter()
            .fold((0_u32, Decimal::ZERO), |(qty, sum), item| {
                (qty.saturating_add(item.quantity), sum + item.item_total)
            });

        Self {
            item_count: items.len(),
            total_quantity,
            subtotal: money::round(subtotal),
            extra: serde_json::Map::new(),
        }
    }

    /// Subtotal formatted with two decimals.
    #[must_use]
    pub fn formatted_subtotal(&self) -> String {
        money::format(self.subtotal)
    }
}

/// An item-level problem reported by the cart service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartIssue {
    /// Affected line, if the issue is line-specific.
    #[serde(default)]
    pub item_id: Option<CartItemId>,
    /// Affected variant.
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    /// Machine-readable kind (e.g. `out_of_stock`, `price_changed`).
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(price: Decimal, quantity: u32) -> CartItem {
        CartItem {
            id: CartItemId::generate_guest(),
            variant_id: VariantId::new("v1"),
            name: "Tee".to_string(),
            description: None,
            sku: None,
            quantity,
            price,
            item_total: money::line_total(price, quantity),
            available_stock: Some(10),
            has_issues: false,
            issues: Vec::new(),
            created_at: None,
            updated_at: None,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_ceiling_bounds() {
        assert_eq!(quantity_ceiling(None), 99);
        assert_eq!(quantity_ceiling(Some(10)), 10);
        assert_eq!(quantity_ceiling(Some(500)), 99);
        assert_eq!(quantity_ceiling(Some(0)), 1);
    }

    #[test]
    fn test_clamp_quantity() {
        assert_eq!(clamp_quantity(500, Some(10)), 10);
        assert_eq!(clamp_quantity(0, Some(10)), 1);
        assert_eq!(clamp_quantity(-4, None), 1);
        assert_eq!(clamp_quantity(150, None), 99);
        assert_eq!(clamp_quantity(7, Some(10)), 7);
    }

    #[test]
    fn test_set_quantity_recomputes_total() {
        let mut line = item(Decimal::new(1999, 2), 1);
        let now = Utc::now();
        line.set_quantity(3, now);
        assert_eq!(line.item_total, Decimal::new(5997, 2));
        assert_eq!(line.updated_at, Some(now));
    }

    #[test]
    fn test_normalize_clamps_and_recomputes_total() {
        let mut line = item(Decimal::new(200, 2), 1);
        line.quantity = 500;
        line.item_total = Decimal::new(100, 2);

        assert!(line.normalize());
        assert_eq!(line.quantity, 10);
        assert_eq!(line.item_total, Decimal::new(2000, 2));

        line.quantity = 0;
        assert!(line.normalize());
        assert_eq!(line.quantity, 1);
        assert_eq!(line.item_total, Decimal::new(200, 2));
    }

    #[test]
    fn test_normalize_leaves_valid_line_alone() {
        let mut line = item(Decimal::new(1999, 2), 3);
        let before = line.clone();
        assert!(!line.normalize());
        assert_eq!(line, before);
    }

    #[test]
    fn test_summary_from_items() {
        let items = vec![item(Decimal::new(1000, 2), 2), item(Decimal::new(250, 2), 3)];
        let summary = CartSummary::from_items(&items);
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.total_quantity, 5);
        assert_eq!(summary.subtotal, Decimal::new(2750, 2));
        assert_eq!(summary.formatted_subtotal(), "27.50");
    }

    #[test]
    fn test_summary_of_empty_cart_is_zeroed() {
        let summary = CartSummary::from_items(&[]);
        assert_eq!(summary, CartSummary::default());
        assert_eq!(summary.formatted_subtotal(), "0.00");
    }

    #[test]
    fn test_server_item_keeps_unknown_fields() {
        let json = serde_json::json!({
            "id": "line-9",
            "variantId": "v9",
            "quantity": 2,
            "price": "5.00",
            "itemTotal": "10.00",
            "product": { "slug": "tee" }
        });
        let line: CartItem = serde_json::from_value(json).unwrap();
        assert_eq!(line.variant_id, VariantId::new("v9"));
        assert!(line.extra.contains_key("product"));
        let back = serde_json::to_value(&line).unwrap();
        assert_eq!(back["product"]["slug"], "tee");
    }

    #[test]
    fn test_stored_item_without_variant_deserializes() {
        let json = serde_json::json!({ "id": "guest-1", "quantity": 1 });
        let line: CartItem = serde_json::from_value(json).unwrap();
        assert!(line.variant_id.is_empty());
    }

    #[test]
    fn test_issue_kind_uses_type_key() {
        let json = serde_json::json!({ "itemId": "line-1", "type": "out_of_stock", "message": "Gone" });
        let issue: CartIssue = serde_json::from_value(json).unwrap();
        assert_eq!(issue.kind.as_deref(), Some("out_of_stock"));
    }
}
