//! Dual-mode cart state.
//!
//! # Architecture
//!
//! - A guest cart lives on the client and is persisted through a
//!   [`GuestCartStore`]; quantities are clamped, never rejected
//! - An authenticated cart lives on the cart service; every mutation is a
//!   remote call followed by a full re-fetch, and the server's view wins
//! - The [`Mode`] is resolved from the [`AuthProvider`] once per operation and
//!   picks which cart a call reads or writes ([`CartView`])
//! - On login the guest cart is merged into the server cart in one batch and
//!   then drained, so it is never replayed
//!
//! Mutating operations take `&mut self`, which serializes each
//! mutate-then-refresh sequence. Share a reconciler across tasks behind a
//! `tokio::sync::Mutex`.

mod guest;
mod merge;

use cartsync_core::{
    CartIssue, CartItem, CartItemId, CartSummary, MAX_ITEM_QUANTITY, MIN_ITEM_QUANTITY, VariantId,
};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::api::{AddItemRequest, CartApi, CartSnapshot, MergeReport};
use crate::auth::{AuthProvider, User};
use crate::error::{CartError, Result};
use crate::store::GuestCartStore;

/// Which cart is authoritative for an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// No one is signed in; the local cart is authoritative.
    Guest,
    /// A user is signed in; the server cart is authoritative.
    Authenticated(User),
}

impl Mode {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Read-only view of the cart that is authoritative in the current mode.
#[derive(Debug, Clone, Copy)]
pub enum CartView<'a> {
    Guest(&'a [CartItem]),
    Authenticated(&'a CartSnapshot),
}

impl<'a> CartView<'a> {
    #[must_use]
    pub fn items(self) -> &'a [CartItem] {
        match self {
            Self::Guest(items) => items,
            Self::Authenticated(snapshot) => &snapshot.items,
        }
    }

    /// Server summary verbatim when one was reported, otherwise folded over
    /// the items.
    #[must_use]
    pub fn summary(self) -> CartSummary {
        match self {
            Self::Authenticated(CartSnapshot {
                summary: Some(summary),
                ..
            }) => summary.clone(),
            other => CartSummary::from_items(other.items()),
        }
    }

    /// Item-level issues. Guest carts never have any.
    #[must_use]
    pub fn issues(self) -> &'a [CartIssue] {
        match self {
            Self::Guest(_) => &[],
            Self::Authenticated(snapshot) => &snapshot.issues,
        }
    }
}

/// Product fields captured when a guest adds an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub name: String,
    pub description: Option<String>,
}

/// Variant fields captured when a guest adds an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantSnapshot {
    pub sku: Option<String>,
    pub price: Decimal,
    /// Stock at add time; caps the line's quantity in guest mode.
    pub available_stock: Option<u32>,
}

/// An add-to-cart request.
///
/// The snapshots are only used in guest mode; the server resolves display
/// fields from its own catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddToCart {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub product: ProductSnapshot,
    pub variant: VariantSnapshot,
}

impl AddToCart {
    /// A request with empty snapshots.
    #[must_use]
    pub fn new(variant_id: impl Into<VariantId>, quantity: u32) -> Self {
        Self {
            variant_id: variant_id.into(),
            quantity,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_product(mut self, name: impl Into<String>, description: Option<String>) -> Self {
        self.product = ProductSnapshot {
            name: name.into(),
            description,
        };
        self
    }

    #[must_use]
    pub fn with_variant(
        mut self,
        sku: Option<String>,
        price: Decimal,
        available_stock: Option<u32>,
    ) -> Self {
        self.variant = VariantSnapshot {
            sku,
            price,
            available_stock,
        };
        self
    }
}

/// Keeps the guest and authenticated carts and routes every operation to
/// the one that is authoritative.
pub struct CartReconciler<A, S, P> {
    api: A,
    store: S,
    auth: P,
    guest: Vec<CartItem>,
    server: CartSnapshot,
    last_error: Option<String>,
}

impl<A, S, P> std::fmt::Debug for CartReconciler<A, S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartReconciler")
            .field("guest_items", &self.guest.len())
            .field("server_items", &self.server.items.len())
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl<A, S, P> CartReconciler<A, S, P>
where
    A: CartApi,
    S: GuestCartStore,
    P: AuthProvider,
{
    /// Create a reconciler, restoring the guest cart from `store`.
    ///
    /// An unreadable record is logged and replaced by an empty cart. Lines
    /// whose quantity or total are out of bounds are repaired and written back.
    pub fn new(api: A, store: S, auth: P) -> Self {
        let mut guest = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable guest cart");
            Vec::new()
        });
        let repaired = guest
            .iter_mut()
            .fold(0_usize, |count, item| count + usize::from(item.normalize()));
        debug!(items = guest.len(), repaired, "Guest cart restored");

        let cart = Self {
            api,
            store,
            auth,
            guest,
            server: CartSnapshot::default(),
            last_error: None,
        };
        if repaired > 0 {
            warn!(repaired, "Repaired out-of-bounds guest cart lines");
            cart.persist_guest();
        }
        cart
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Resolve the mode from the current authentication state.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.auth
            .current_user()
            .map_or(Mode::Guest, Mode::Authenticated)
    }

    /// The authoritative cart for the current mode.
    #[must_use]
    pub fn view(&self) -> CartView<'_> {
        self.view_for(&self.mode())
    }

    fn view_for(&self, mode: &Mode) -> CartView<'_> {
        match mode {
            Mode::Guest => CartView::Guest(&self.guest),
            Mode::Authenticated(_) => CartView::Authenticated(&self.server),
        }
    }

    #[must_use]
    pub fn cart_items(&self) -> &[CartItem] {
        self.view().items()
    }

    #[must_use]
    pub fn cart_summary(&self) -> CartSummary {
        self.view().summary()
    }

    /// Guest lines waiting to be merged, whatever the current mode.
    #[must_use]
    pub fn guest_items(&self) -> &[CartItem] {
        &self.guest
    }

    /// The last server cart fetched, whatever the current mode.
    #[must_use]
    pub const fn server_cart(&self) -> &CartSnapshot {
        &self.server
    }

    #[must_use]
    pub fn item_by_variant_id(&self, variant_id: &VariantId) -> Option<&CartItem> {
        self.cart_items()
            .iter()
            .find(|item| &item.variant_id == variant_id)
    }

    #[must_use]
    pub fn is_in_cart(&self, variant_id: &VariantId) -> bool {
        self.item_by_variant_id(variant_id).is_some()
    }

    /// Units of a variant in the cart, zero if absent.
    #[must_use]
    pub fn variant_quantity(&self, variant_id: &VariantId) -> u32 {
        self.item_by_variant_id(variant_id)
            .map_or(0, |item| item.quantity)
    }

    /// Whether the service reported any issue or flagged any line.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        let view = self.view();
        !view.issues().is_empty() || view.items().iter().any(|item| item.has_issues)
    }

    #[must_use]
    pub fn issues(&self) -> &[CartIssue] {
        self.view().issues()
    }

    /// Message of the last failed operation, cleared by the next success.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a variant to the cart.
    ///
    /// # Errors
    ///
    /// Authenticated only: a missing variant ID, or a failed service call.
    pub async fn add_to_cart(&mut self, request: AddToCart) -> Result<()> {
        let result = match self.mode() {
            Mode::Guest => {
                guest::add(&mut self.guest, request, Utc::now());
                self.persist_guest();
                Ok(())
            }
            Mode::Authenticated(_) => self.remote_add(request).await,
        };
        self.settle(result)
    }

    #[instrument(skip(self, request), fields(variant_id = %request.variant_id, quantity = request.quantity))]
    async fn remote_add(&mut self, request: AddToCart) -> Result<()> {
        if request.variant_id.is_empty() {
            return Err(CartError::validation("Variant ID is required"));
        }

        self.api
            .add_item(AddItemRequest {
                variant_id: request.variant_id,
                quantity: request.quantity,
            })
            .await
            .map_err(|e| CartError::remote(e, "Failed to add item to cart"))?;

        self.refresh().await
    }

    /// Change a line's quantity.
    ///
    /// Guest quantities are clamped into range; authenticated quantities
    /// outside `[1, 99]` are rejected.
    ///
    /// # Errors
    ///
    /// Authenticated only: an out-of-range quantity, or a failed service call.
    pub async fn update_cart_item(&mut self, item_id: &CartItemId, quantity: i64) -> Result<()> {
        let result = match self.mode() {
            Mode::Guest => {
                if guest::update(&mut self.guest, item_id, quantity, Utc::now()) {
                    self.persist_guest();
                } else {
                    debug!(item_id = %item_id, "No guest line to update");
                }
                Ok(())
            }
            Mode::Authenticated(_) => self.remote_update(item_id, quantity).await,
        };
        self.settle(result)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn remote_update(&mut self, item_id: &CartItemId, quantity: i64) -> Result<()> {
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| (MIN_ITEM_QUANTITY..=MAX_ITEM_QUANTITY).contains(q))
            .ok_or_else(|| {
                CartError::validation(format!(
                    "Quantity must be between {MIN_ITEM_QUANTITY} and {MAX_ITEM_QUANTITY}"
                ))
            })?;

        self.api
            .update_item(item_id.clone(), quantity)
            .await
            .map_err(|e| CartError::remote(e, "Failed to update cart item"))?;

        self.refresh().await
    }

    /// Remove a line. Removing a line that is not there succeeds.
    ///
    /// # Errors
    ///
    /// Authenticated only: a failed service call.
    pub async fn remove_cart_item(&mut self, item_id: &CartItemId) -> Result<()> {
        let result = match self.mode() {
            Mode::Guest => {
                if guest::remove(&mut self.guest, item_id) {
                    self.persist_guest();
                }
                Ok(())
            }
            Mode::Authenticated(_) => self.remote_remove(item_id).await,
        };
        self.settle(result)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn remote_remove(&mut self, item_id: &CartItemId) -> Result<()> {
        match self.api.remove_item(item_id.clone()).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("Line already gone from server cart"),
            Err(e) => return Err(CartError::remote(e, "Failed to remove item from cart")),
        }

        self.refresh().await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Authenticated only: a failed service call.
    pub async fn clear_cart(&mut self) -> Result<()> {
        let result = match self.mode() {
            Mode::Guest => {
                self.guest.clear();
                self.persist_guest();
                Ok(())
            }
            Mode::Authenticated(_) => self.remote_clear().await,
        };
        self.settle(result)
    }

    #[instrument(skip(self))]
    async fn remote_clear(&mut self) -> Result<()> {
        self.api
            .clear_cart()
            .await
            .map_err(|e| CartError::remote(e, "Failed to clear cart"))?;

        // An emptied cart needs no re-fetch
        self.server = CartSnapshot::default();
        Ok(())
    }

    /// Apply a coupon code to the server cart.
    ///
    /// # Errors
    ///
    /// Fails for guests, for a blank code, or when the service rejects it.
    pub async fn apply_coupon(&mut self, code: &str) -> Result<()> {
        let result = match self.mode() {
            Mode::Guest => Err(CartError::NotAuthenticated(
                "Please log in to apply coupons".to_string(),
            )),
            Mode::Authenticated(user) => self.remote_apply_coupon(&user, code).await,
        };
        self.settle(result)
    }

    #[instrument(skip(self, user, code), fields(user_id = %user.id))]
    async fn remote_apply_coupon(&mut self, user: &User, code: &str) -> Result<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CartError::validation("Coupon code is required"));
        }

        self.api
            .apply_coupon(code.to_string())
            .await
            .map_err(|e| CartError::remote(e, "Failed to apply coupon"))?;
        info!("Coupon applied");

        self.refresh().await
    }

    /// Remove the applied coupon from the server cart.
    ///
    /// # Errors
    ///
    /// Fails for guests or when the service call fails.
    pub async fn remove_coupon(&mut self) -> Result<()> {
        let result = match self.mode() {
            Mode::Guest => Err(CartError::NotAuthenticated(
                "Please log in to remove coupons".to_string(),
            )),
            Mode::Authenticated(user) => self.remote_remove_coupon(&user).await,
        };
        self.settle(result)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn remote_remove_coupon(&mut self, user: &User) -> Result<()> {
        self.api
            .remove_coupon()
            .await
            .map_err(|e| CartError::remote(e, "Failed to remove coupon"))?;
        info!("Coupon removed");

        self.refresh().await
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Merge the guest cart into the server cart of `user` (or of the
    /// signed-in user when `None`).
    ///
    /// On success the guest cart is drained and persisted empty before the
    /// server cart is re-fetched. A failed re-fetch is recorded in
    /// [`last_error`](Self::last_error) but does not fail the merge. On
    /// failure the guest cart is left untouched for a later retry.
    ///
    /// # Errors
    ///
    /// Fails when no user can be resolved or the merge call fails.
    pub async fn merge_guest_cart(&mut self, user: Option<&User>) -> Result<MergeReport> {
        if self.guest.is_empty() {
            debug!("Guest cart is empty, nothing to merge");
            return self.settle(Ok(MergeReport::default()));
        }

        let Some(user) = self.resolve_user(user) else {
            warn!(items = self.guest.len(), "Merge requested without a signed-in user");
            return self.settle(Err(CartError::MissingUser));
        };

        let lines = merge::project(&self.guest);
        if lines.is_empty() {
            warn!(
                user_id = %user.id,
                dropped = self.guest.len(),
                "Guest cart has no mergeable lines, discarding it"
            );
            self.drain_guest();
            return self.settle(Ok(MergeReport::default()));
        }

        let report = match self.api.merge_items(lines).await {
            Ok(report) => report,
            Err(e) => {
                let err = CartError::remote(e, "Failed to merge guest cart");
                return self.settle(Err(err));
            }
        };

        self.drain_guest();
        self.last_error = None;
        info!(
            user_id = %user.id,
            merged = report.merged_count,
            skipped = report.skipped_count,
            "Guest cart merged"
        );

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Cart refresh after merge failed");
            self.last_error = Some(e.to_string());
        }

        Ok(report)
    }

    /// Load the server cart for `user` (or the signed-in user when `None`).
    /// With no user, only the server state is reset.
    ///
    /// # Errors
    ///
    /// Fails when the fetch fails; the previous server state is kept.
    pub async fn initialize_cart(&mut self, user: Option<&User>) -> Result<()> {
        let Some(user) = self.resolve_user(user) else {
            debug!("No signed-in user, resetting server cart");
            self.server = CartSnapshot::default();
            return self.settle(Ok(()));
        };

        debug!(user_id = %user.id, "Loading server cart");
        let result = self.refresh().await;
        self.settle(result)
    }

    /// Bring the cart in line with a fresh login or registration.
    ///
    /// Pending guest lines are merged; with nothing to merge the server cart
    /// is simply loaded. A failed merge keeps the guest lines for a retry and
    /// still loads the server cart so the signed-in view is current.
    ///
    /// # Errors
    ///
    /// Fails when the merge or the load fails. A merge failure takes
    /// precedence over a load failure that follows it.
    pub async fn handle_login(&mut self, user: &User) -> Result<MergeReport> {
        if self.guest.is_empty() {
            self.initialize_cart(Some(user)).await?;
            return Ok(MergeReport::default());
        }

        match self.merge_guest_cart(Some(user)).await {
            Ok(report) => Ok(report),
            Err(err) => {
                if let Err(load) = self.refresh().await {
                    warn!(error = %load, "Failed to load server cart after failed merge");
                }
                self.settle(Err(err))
            }
        }
    }

    /// Forget the server cart after a logout. Guest lines are kept.
    pub fn handle_logout(&mut self) {
        debug!("Session ended, dropping server cart");
        self.server = CartSnapshot::default();
        self.last_error = None;
    }

    /// Forget everything: guest lines (persisted), server cart and errors.
    pub fn reset_cart(&mut self) {
        self.guest.clear();
        self.persist_guest();
        self.server = CartSnapshot::default();
        self.last_error = None;
        info!("Cart reset");
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn resolve_user(&self, user: Option<&User>) -> Option<User> {
        user.cloned().or_else(|| self.auth.current_user())
    }

    /// Replace the server state with a fresh fetch. Prior state survives a failure.
    async fn refresh(&mut self) -> Result<()> {
        let snapshot = self
            .api
            .fetch_cart()
            .await
            .map_err(|e| CartError::remote(e, "Failed to load cart"))?;

        debug!(
            items = snapshot.items.len(),
            issues = snapshot.issues.len(),
            "Server cart refreshed"
        );
        self.server = snapshot;
        Ok(())
    }

    fn drain_guest(&mut self) {
        self.guest.clear();
        self.persist_guest();
    }

    /// The in-memory guest cart stays authoritative when the store fails.
    fn persist_guest(&self) {
        if let Err(e) = self.store.save(&self.guest) {
            warn!(error = %e, "Failed to persist guest cart");
        }
    }

    /// Record the outcome of a public operation in `last_error`.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => self.last_error = Some(e.to_string()),
        }
        result
    }
}
