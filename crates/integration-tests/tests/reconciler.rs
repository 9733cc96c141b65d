//! Guest, authenticated and merge flows against the fake cart service.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use cartsync_client::{
    AddToCart, CartError, CartReconciler, GuestCartStore, HttpCartApi, JsonFileStore,
    SessionAuth, User,
};
use cartsync_core::{CartItemId, VariantId};
use cartsync_integration_tests::{FakeCartService, VALID_COUPON};
use rust_decimal::Decimal;
use serde_json::json;
use testresult::TestResult;

type Cart = CartReconciler<HttpCartApi, JsonFileStore, Arc<SessionAuth>>;

struct Session {
    service: FakeCartService,
    auth: Arc<SessionAuth>,
    store_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

impl Session {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            service: FakeCartService::start().await,
            auth: Arc::new(SessionAuth::new()),
            store_path: dir.path().join("guest_cart.json"),
            _dir: dir,
        }
    }

    /// A fresh reconciler, as if the process had just started.
    fn cart(&self) -> Cart {
        CartReconciler::new(
            HttpCartApi::new(&self.service.api_config()).unwrap(),
            JsonFileStore::new(&self.store_path),
            Arc::clone(&self.auth),
        )
    }
}

fn shopper() -> User {
    User {
        id: "user-42".into(),
        email: Some("shopper@example.com".to_string()),
    }
}

fn tote(quantity: u32) -> AddToCart {
    AddToCart::new("var_tote", quantity)
        .with_product("Canvas Tote", Some("Heavy cotton".to_string()))
        .with_variant(Some("TOTE-1".to_string()), Decimal::new(1250, 2), Some(10))
}

fn mug(quantity: u32) -> AddToCart {
    AddToCart::new("var_mug", quantity)
        .with_product("Enamel Mug", None)
        .with_variant(None, Decimal::new(800, 2), Some(3))
}

#[tokio::test]
async fn test_guest_cart_never_touches_the_network() -> TestResult {
    let session = Session::start().await;
    let mut cart = session.cart();

    cart.add_to_cart(tote(2)).await?;
    cart.add_to_cart(mug(9)).await?;
    let mug_id = cart.item_by_variant_id(&VariantId::new("var_mug")).unwrap().id.clone();
    cart.update_cart_item(&mug_id, 2).await?;
    cart.remove_cart_item(&CartItemId::new("guest-missing")).await?;

    assert!(session.service.requests().is_empty());
    let summary = cart.cart_summary();
    assert_eq!(summary.item_count, 2);
    assert_eq!(summary.total_quantity, 4);
    assert_eq!(summary.subtotal, Decimal::new(4100, 2));
    Ok(())
}

#[tokio::test]
async fn test_guest_cart_survives_restart() -> TestResult {
    let session = Session::start().await;
    session.cart().add_to_cart(tote(3)).await?;

    let restarted = session.cart();

    assert_eq!(restarted.variant_quantity(&VariantId::new("var_tote")), 3);
    Ok(())
}

#[tokio::test]
async fn test_guest_add_then_login_merges_once() -> TestResult {
    let session = Session::start().await;
    let mut cart = session.cart();
    cart.add_to_cart(tote(3)).await?;

    session.auth.login(shopper());
    let report = cart.merge_guest_cart(Some(&shopper())).await?;

    assert_eq!(report.merged_count, 1);
    assert_eq!(report.skipped_count, 0);
    assert!(cart.guest_items().is_empty());
    assert!(JsonFileStore::new(&session.store_path).load()?.is_empty());
    assert_eq!(session.service.line_quantity("var_tote"), Some(3));

    let items = cart.cart_items();
    assert_eq!(items.len(), 1);
    assert!(!items[0].id.is_guest());
    assert_eq!(items[0].quantity, 3);

    // A second login with nothing pending sends no merge
    cart.merge_guest_cart(Some(&shopper())).await?;
    assert_eq!(session.service.request_count("POST /cart/merge"), 1);
    assert_eq!(session.service.line_quantity("var_tote"), Some(3));
    Ok(())
}

#[tokio::test]
async fn test_merge_into_existing_server_cart_reports_skips() -> TestResult {
    let session = Session::start().await;
    session.service.seed_line("var_mug", 2);
    let mut cart = session.cart();
    cart.add_to_cart(mug(3)).await?;
    cart.add_to_cart(tote(1)).await?;

    session.auth.login(shopper());
    let report = cart.handle_login(&shopper()).await?;

    assert_eq!(report.merged_count, 1);
    assert_eq!(report.skipped_count, 1);
    assert_eq!(report.skipped[0]["variantId"], "var_mug");
    assert!(cart.guest_items().is_empty());
    assert_eq!(cart.variant_quantity(&VariantId::new("var_mug")), 2);
    assert_eq!(cart.variant_quantity(&VariantId::new("var_tote")), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_merge_keeps_guest_cart_for_retry() -> TestResult {
    let session = Session::start().await;
    let mut cart = session.cart();
    cart.add_to_cart(tote(1)).await?;
    cart.add_to_cart(mug(1)).await?;
    session.auth.login(shopper());

    session
        .service
        .fail_next(503, json!({ "message": "Cart service unavailable" }));
    let err = cart.merge_guest_cart(None).await.unwrap_err();

    assert_eq!(err.to_string(), "Cart service unavailable");
    assert_eq!(cart.guest_items().len(), 2);
    assert_eq!(JsonFileStore::new(&session.store_path).load()?.len(), 2);

    let report = cart.merge_guest_cart(None).await?;
    assert_eq!(report.merged_count, 2);
    assert!(cart.last_error().is_none());
    Ok(())
}

#[tokio::test]
async fn test_login_with_failed_merge_still_shows_server_cart() -> TestResult {
    let session = Session::start().await;
    session.service.seed_line("var_tote", 2);
    let mut cart = session.cart();
    cart.add_to_cart(mug(1)).await?;

    session.auth.login(shopper());
    session
        .service
        .fail_next(503, json!({ "message": "Cart service unavailable" }));
    let err = cart.handle_login(&shopper()).await.unwrap_err();

    assert_eq!(err.to_string(), "Cart service unavailable");
    assert_eq!(cart.variant_quantity(&VariantId::new("var_tote")), 2);
    assert_eq!(cart.guest_items().len(), 1);
    assert_eq!(session.service.request_count("GET /cart"), 1);
    Ok(())
}

#[tokio::test]
async fn test_authenticated_operations_follow_the_server() -> TestResult {
    let session = Session::start().await;
    session.auth.login(shopper());
    let mut cart = session.cart();
    cart.initialize_cart(None).await?;

    cart.add_to_cart(AddToCart::new("var_tote", 2)).await?;
    let line = cart.cart_items()[0].clone();
    assert_eq!(line.name, "Canvas Tote");

    cart.update_cart_item(&line.id, 5).await?;
    assert_eq!(cart.variant_quantity(&VariantId::new("var_tote")), 5);

    let err = cart.update_cart_item(&line.id, 150).await.unwrap_err();
    assert_eq!(err.to_string(), "Quantity must be between 1 and 99");
    assert_eq!(session.service.request_count("PATCH /cart/update-item"), 1);

    cart.remove_cart_item(&line.id).await?;
    assert!(cart.cart_items().is_empty());

    // Already gone on the server
    cart.remove_cart_item(&line.id).await?;
    assert!(cart.last_error().is_none());
    Ok(())
}

#[tokio::test]
async fn test_server_rejection_surfaces_message_and_keeps_state() -> TestResult {
    let session = Session::start().await;
    session.service.seed_line("var_mug", 2);
    session.auth.login(shopper());
    let mut cart = session.cart();
    cart.initialize_cart(None).await?;
    let before = cart.server_cart().clone();

    let err = cart.add_to_cart(AddToCart::new("var_mug", 5)).await.unwrap_err();

    assert!(matches!(err, CartError::Remote { .. }));
    assert_eq!(cart.last_error(), Some("Only 3 left in stock"));
    assert_eq!(cart.server_cart(), &before);
    Ok(())
}

#[tokio::test]
async fn test_coupons_require_login_then_apply() -> TestResult {
    let session = Session::start().await;
    session.service.seed_line("var_tote", 4);
    let mut cart = session.cart();

    let err = cart.apply_coupon(VALID_COUPON).await.unwrap_err();
    assert!(matches!(err, CartError::NotAuthenticated(_)));
    assert!(session.service.requests().is_empty());

    session.auth.login(shopper());
    cart.apply_coupon(VALID_COUPON).await?;
    let summary = cart.cart_summary();
    assert_eq!(summary.subtotal, Decimal::new(5000, 2));
    assert_eq!(summary.extra["discount"], "5.00");
    assert_eq!(summary.extra["total"], "45.00");

    let err = cart.apply_coupon("NOPE").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid coupon code");

    cart.remove_coupon().await?;
    assert_eq!(cart.cart_summary().extra["discount"], "0");
    Ok(())
}

#[tokio::test]
async fn test_clear_does_not_refetch() -> TestResult {
    let session = Session::start().await;
    session.service.seed_line("var_tote", 1);
    session.auth.login(shopper());
    let mut cart = session.cart();
    cart.initialize_cart(None).await?;

    cart.clear_cart().await?;

    assert!(cart.cart_items().is_empty());
    assert_eq!(session.service.request_count("GET /cart"), 1);
    Ok(())
}

#[tokio::test]
async fn test_issues_reported_by_server() -> TestResult {
    let session = Session::start().await;
    session.service.seed_line("var_mug", 5);
    session.auth.login(shopper());
    let mut cart = session.cart();

    cart.initialize_cart(None).await?;

    assert!(cart.has_issues());
    assert_eq!(cart.issues()[0].kind.as_deref(), Some("insufficient_stock"));
    assert!(cart.cart_items()[0].has_issues);
    Ok(())
}

#[tokio::test]
async fn test_logout_returns_to_guest_cart() -> TestResult {
    let session = Session::start().await;
    session.service.seed_line("var_tote", 1);
    session.auth.login(shopper());
    let mut cart = session.cart();
    cart.initialize_cart(None).await?;

    session.auth.logout();
    cart.handle_logout();
    cart.add_to_cart(mug(1)).await?;

    assert_eq!(cart.cart_items().len(), 1);
    assert_eq!(cart.cart_items()[0].variant_id, VariantId::new("var_mug"));
    assert!(cart.server_cart().items.is_empty());
    Ok(())
}
