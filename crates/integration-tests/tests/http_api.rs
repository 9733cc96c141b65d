//! `HttpCartApi` against the fake cart service.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use cartsync_client::{AddItemRequest, ApiError, CartApi, CartApiConfig, HttpCartApi, MergeLine};
use cartsync_core::{CartItemId, VariantId};
use cartsync_integration_tests::{FakeCartService, VALID_COUPON};
use rust_decimal::Decimal;
use serde_json::json;
use testresult::TestResult;
use url::Url;

fn client(service: &FakeCartService) -> HttpCartApi {
    HttpCartApi::new(&service.api_config()).unwrap()
}

#[tokio::test]
async fn test_fetch_empty_cart() -> TestResult {
    let service = FakeCartService::start().await;

    let snapshot = client(&service).fetch_cart().await?;

    assert!(snapshot.items.is_empty());
    assert_eq!(snapshot.summary.map(|s| s.item_count), Some(0));
    assert_eq!(snapshot.cart.unwrap()["id"], "cart-1");
    Ok(())
}

#[tokio::test]
async fn test_session_cookie_is_sent() -> TestResult {
    let service = FakeCartService::start().await;

    let anonymous = HttpCartApi::new(&service.anonymous_config())?;
    let err = anonymous.fetch_cart().await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 401, .. }));
    assert_eq!(err.server_message(), Some("Authentication required"));

    assert!(client(&service).fetch_cart().await.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_add_item_then_fetch() -> TestResult {
    let service = FakeCartService::start().await;
    let api = client(&service);

    let line = api
        .add_item(AddItemRequest {
            variant_id: VariantId::new("var_tote"),
            quantity: 2,
        })
        .await?;
    assert_eq!(line["variantId"], "var_tote");

    let snapshot = api.fetch_cart().await?;
    assert_eq!(snapshot.items.len(), 1);
    let item = &snapshot.items[0];
    assert_eq!(item.name, "Canvas Tote");
    assert_eq!(item.item_total, Decimal::new(2500, 2));
    assert_eq!(item.extra["product"]["slug"], "tote");
    assert_eq!(snapshot.summary.unwrap().subtotal, Decimal::new(2500, 2));
    Ok(())
}

#[tokio::test]
async fn test_stock_conflict_carries_server_message() -> TestResult {
    let service = FakeCartService::start().await;

    let err = client(&service)
        .add_item(AddItemRequest {
            variant_id: VariantId::new("var_mug"),
            quantity: 5,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 409, .. }));
    assert_eq!(err.server_message(), Some("Only 3 left in stock"));
    Ok(())
}

#[tokio::test]
async fn test_update_and_remove_use_item_path() -> TestResult {
    let service = FakeCartService::start().await;
    let id = service.seed_line("var_tote", 1);
    let api = client(&service);

    api.update_item(CartItemId::new(id.as_str()), 4).await?;
    assert_eq!(service.line_quantity("var_tote"), Some(4));

    api.remove_item(CartItemId::new(id.as_str())).await?;
    assert_eq!(service.line_count(), 0);

    let err = api.remove_item(CartItemId::new(id)).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_merge_reports_merged_and_skipped() -> TestResult {
    let service = FakeCartService::start().await;

    let report = client(&service)
        .merge_items(vec![
            MergeLine {
                variant_id: VariantId::new("var_tote"),
                quantity: 2,
            },
            MergeLine {
                variant_id: VariantId::new("var_cap"),
                quantity: 1,
            },
            MergeLine {
                variant_id: VariantId::new("var_gone"),
                quantity: 1,
            },
        ])
        .await?;

    assert_eq!(report.merged_count, 1);
    assert_eq!(report.skipped_count, 2);
    assert_eq!(report.skipped[0]["reason"], "Out of stock");
    assert_eq!(report.skipped[1]["reason"], "Variant not found");
    assert_eq!(service.request_count("POST /cart/merge"), 1);
    Ok(())
}

#[tokio::test]
async fn test_coupon_apply_and_remove() -> TestResult {
    let service = FakeCartService::start().await;
    service.seed_line("var_tote", 4);
    let api = client(&service);

    let err = api.apply_coupon("BOGUS".to_string()).await.unwrap_err();
    assert_eq!(err.server_message(), Some("Invalid coupon code"));

    api.apply_coupon(VALID_COUPON.to_string()).await?;
    let summary = api.fetch_cart().await?.summary.unwrap();
    assert_eq!(summary.extra["discount"], "5.00");
    assert_eq!(summary.extra["couponCode"], VALID_COUPON);

    api.remove_coupon().await?;
    let summary = api.fetch_cart().await?.summary.unwrap();
    assert_eq!(summary.extra.get("couponCode").and_then(|v| v.as_str()), None);
    Ok(())
}

#[tokio::test]
async fn test_clear_cart() -> TestResult {
    let service = FakeCartService::start().await;
    service.seed_line("var_tote", 1);
    service.seed_line("var_mug", 1);

    client(&service).clear_cart().await?;

    assert_eq!(service.line_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_server_error_without_message() -> TestResult {
    let service = FakeCartService::start().await;
    service.fail_next(500, json!({}));

    let err = client(&service).fetch_cart().await.unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 500, message: None }));
    Ok(())
}

#[tokio::test]
async fn test_rate_limit_is_reported() -> TestResult {
    let service = FakeCartService::start().await;
    service.fail_next(429, json!({ "message": "Slow down" }));

    let err = client(&service).fetch_cart().await.unwrap_err();

    assert!(matches!(err, ApiError::RateLimited(_)));
    Ok(())
}

#[tokio::test]
async fn test_transport_failure() -> TestResult {
    // Reserve a port, then close it so nothing is listening
    let addr = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?;
    let config = CartApiConfig::new(Url::parse(&format!("http://{addr}/api/"))?);

    let api = HttpCartApi::new(&config)?;
    let err = api.fetch_cart().await.unwrap_err();

    assert!(matches!(err, ApiError::Http(_)));
    Ok(())
}
