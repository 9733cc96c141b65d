//! Decimal money arithmetic.
//!
//! Prices are unit prices captured when an item enters the cart. All totals
//! are rounded to cents with midpoint-away-from-zero so that
//! `item_total == round(price * quantity, 2)` holds after every mutation.

/// Money helpers on [`rust_decimal::Decimal`].
pub mod money {
    use rust_decimal::{Decimal, RoundingStrategy};

    /// Number of decimal places carried by cart amounts.
    pub const SCALE: u32 = 2;

    /// Round an amount to cents.
    #[must_use]
    pub fn round(amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Total for a line: unit price times quantity, rounded to cents.
    #[must_use]
    pub fn line_total(price: Decimal, quantity: u32) -> Decimal {
        round(price * Decimal::from(quantity))
    }

    /// Format an amount with exactly two decimal places (e.g. `"19.90"`).
    #[must_use]
    pub fn format(amount: Decimal) -> String {
        format!("{:.2}", round(amount))
    }
}
