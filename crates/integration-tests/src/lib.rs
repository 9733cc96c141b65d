//! Integration tests for cartsync.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartsync-integration-tests
//! ```
//!
//! No external services are needed: [`FakeCartService`] serves the cart API
//! from an in-process axum router bound to `127.0.0.1:0`, with one cart
//! behind one session cookie and a small fixed catalog.
//!
//! # Test Categories
//!
//! - `http_api` - `HttpCartApi` request and response handling
//! - `reconciler` - Guest, authenticated and merge flows end to end

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use cartsync_client::{AddItemRequest, CartApiConfig, MergeLine};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

/// Session cookie the fake service accepts.
pub const SESSION_COOKIE: &str = "sid=integration-session";

/// Coupon code the fake service accepts; takes 10% off the subtotal.
pub const VALID_COUPON: &str = "SAVE10";

/// A variant in the fake catalog.
#[derive(Debug, Clone)]
pub struct CatalogVariant {
    pub name: String,
    pub price: Decimal,
    pub stock: u32,
}

#[derive(Debug, Clone)]
struct Line {
    id: String,
    variant_id: String,
    quantity: u32,
}

#[derive(Debug)]
struct Failure {
    status: StatusCode,
    body: Value,
}

#[derive(Debug, Default)]
struct BackendState {
    catalog: BTreeMap<String, CatalogVariant>,
    lines: Vec<Line>,
    coupon: Option<String>,
    next_line: u32,
    requests: Vec<String>,
    failures: Vec<Failure>,
}

type Shared = Arc<Mutex<BackendState>>;

/// An in-process cart service.
///
/// The server task is aborted when the value is dropped.
pub struct FakeCartService {
    base_url: Url,
    state: Shared,
    server: JoinHandle<()>,
}

impl Drop for FakeCartService {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl FakeCartService {
    /// Start a service with the default catalog.
    ///
    /// | Variant | Name | Price | Stock |
    /// |---|---|---|---|
    /// | `var_tote` | Canvas Tote | 12.50 | 10 |
    /// | `var_mug` | Enamel Mug | 8.00 | 3 |
    /// | `var_cap` | Field Cap | 21.00 | 0 |
    pub async fn start() -> Self {
        let mut catalog = BTreeMap::new();
        catalog.insert("var_tote".to_string(), variant("Canvas Tote", 1250, 10));
        catalog.insert("var_mug".to_string(), variant("Enamel Mug", 800, 3));
        catalog.insert("var_cap".to_string(), variant("Field Cap", 2100, 0));

        let state: Shared = Arc::new(Mutex::new(BackendState {
            catalog,
            next_line: 1,
            ..BackendState::default()
        }));

        let api = Router::new()
            .route("/cart", get(get_cart))
            .route("/cart/add-to-cart", post(add_to_cart))
            .route("/cart/update-item/{id}", patch(update_item))
            .route("/cart/remove-item/{id}", delete(remove_item))
            .route("/cart/clear-cart", delete(clear_cart))
            .route("/cart/merge", post(merge))
            .route("/coupons/apply", post(apply_coupon))
            .route("/coupons/remove", delete(remove_coupon));
        let app = Router::new().nest("/api", api).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake cart service");
        let addr = listener.local_addr().expect("Listener has no address");
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Fake cart service failed");
        });

        let base_url =
            Url::parse(&format!("http://{addr}/api/")).expect("Fake service URL is valid");

        Self {
            base_url,
            state,
            server,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Client settings carrying the accepted session cookie.
    #[must_use]
    pub fn api_config(&self) -> CartApiConfig {
        let mut config = CartApiConfig::new(self.base_url.clone());
        config.session_cookie = Some(SecretString::from(SESSION_COOKIE));
        config
    }

    /// Client settings without a session; every call is rejected with 401.
    #[must_use]
    pub fn anonymous_config(&self) -> CartApiConfig {
        CartApiConfig::new(self.base_url.clone())
    }

    /// Put a line in the server cart directly. Returns its ID.
    pub fn seed_line(&self, variant_id: &str, quantity: u32) -> String {
        let mut state = self.lock();
        let id = state.new_line_id();
        state.lines.push(Line {
            id: id.clone(),
            variant_id: variant_id.to_string(),
            quantity,
        });
        id
    }

    /// Quantity of a variant in the server cart.
    #[must_use]
    pub fn line_quantity(&self, variant_id: &str) -> Option<u32> {
        self.lock()
            .lines
            .iter()
            .find(|line| line.variant_id == variant_id)
            .map(|line| line.quantity)
    }

    /// Number of lines in the server cart.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lock().lines.len()
    }

    /// Make the next request fail with `status` and a JSON body.
    pub fn fail_next(&self, status: u16, body: Value) {
        self.lock().failures.push(Failure {
            status: StatusCode::from_u16(status).expect("Valid status code"),
            body,
        });
    }

    /// Requests received so far, as `METHOD /path`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// How many times a route was hit.
    #[must_use]
    pub fn request_count(&self, route: &str) -> usize {
        self.lock().requests.iter().filter(|r| *r == route).count()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn variant(name: &str, cents: i64, stock: u32) -> CatalogVariant {
    CatalogVariant {
        name: name.to_string(),
        price: Decimal::new(cents, 2),
        stock,
    }
}

// =============================================================================
// Cart model
// =============================================================================

impl BackendState {
    fn new_line_id(&mut self) -> String {
        let id = format!("line-{}", self.next_line);
        self.next_line += 1;
        id
    }

    fn line_json(&self, line: &Line) -> Value {
        let entry = self.catalog.get(&line.variant_id);
        let price = entry.map_or(Decimal::ZERO, |v| v.price);
        let stock = entry.map_or(0, |v| v.stock);
        let mut issues = Vec::new();
        if line.quantity > stock {
            issues.push(format!("Only {stock} left in stock"));
        }

        json!({
            "id": line.id,
            "variantId": line.variant_id,
            "name": entry.map_or("Unknown", |v| v.name.as_str()),
            "quantity": line.quantity,
            "price": price,
            "itemTotal": (price * Decimal::from(line.quantity)).round_dp(2),
            "availableStock": stock,
            "hasIssues": !issues.is_empty(),
            "issues": issues,
            "product": { "slug": line.variant_id.trim_start_matches("var_") },
        })
    }

    fn cart_json(&self) -> Value {
        let items: Vec<Value> = self.lines.iter().map(|line| self.line_json(line)).collect();
        let subtotal: Decimal = self
            .lines
            .iter()
            .map(|line| {
                let price = self.catalog.get(&line.variant_id).map_or(Decimal::ZERO, |v| v.price);
                price * Decimal::from(line.quantity)
            })
            .sum::<Decimal>()
            .round_dp(2);
        let discount = if self.coupon.is_some() {
            (subtotal * Decimal::new(1, 1)).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let issues: Vec<Value> = self
            .lines
            .iter()
            .filter(|line| {
                line.quantity > self.catalog.get(&line.variant_id).map_or(0, |v| v.stock)
            })
            .map(|line| {
                json!({
                    "itemId": line.id,
                    "variantId": line.variant_id,
                    "type": "insufficient_stock",
                    "message": "Requested quantity exceeds available stock",
                })
            })
            .collect();

        json!({
            "data": {
                "cart": { "id": "cart-1", "couponCode": self.coupon },
                "items": items,
                "summary": {
                    "itemCount": self.lines.len(),
                    "totalQuantity": self.lines.iter().map(|l| l.quantity).sum::<u32>(),
                    "subtotal": subtotal,
                    "discount": discount,
                    "total": subtotal - discount,
                    "couponCode": self.coupon,
                },
                "issues": issues,
            }
        })
    }

    /// Add units of a variant, merging into an existing line. Fails when the
    /// variant is unknown or the stock would be exceeded.
    fn add(&mut self, variant_id: &str, quantity: u32) -> Result<Value, (StatusCode, String)> {
        let Some(stock) = self.catalog.get(variant_id).map(|v| v.stock) else {
            return Err((StatusCode::NOT_FOUND, "Variant not found".to_string()));
        };
        let existing = self
            .lines
            .iter()
            .position(|line| line.variant_id == variant_id);
        let current = existing
            .and_then(|i| self.lines.get(i))
            .map_or(0, |line| line.quantity);
        if stock == 0 {
            return Err((StatusCode::CONFLICT, "Out of stock".to_string()));
        }
        if current + quantity > stock {
            return Err((StatusCode::CONFLICT, format!("Only {stock} left in stock")));
        }

        let line = if let Some(line) = existing.and_then(|i| self.lines.get_mut(i)) {
            line.quantity += quantity;
            line.clone()
        } else {
            let line = Line {
                id: self.new_line_id(),
                variant_id: variant_id.to_string(),
                quantity,
            };
            self.lines.push(line.clone());
            line
        };
        Ok(self.line_json(&line))
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Record the request, then apply scripted failures and the session check.
fn enter<'a>(
    shared: &'a Shared,
    headers: &HeaderMap,
    route: &str,
) -> Result<MutexGuard<'a, BackendState>, Response> {
    let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
    state.requests.push(route.to_string());

    if !state.failures.is_empty() {
        let failure = state.failures.remove(0);
        return Err((failure.status, Json(failure.body)).into_response());
    }

    let has_session = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .any(|pair| pair.trim() == SESSION_COOKIE);
    if !has_session {
        return Err(error(StatusCode::UNAUTHORIZED, "Authentication required"));
    }

    Ok(state)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

async fn get_cart(State(shared): State<Shared>, headers: HeaderMap) -> Response {
    match enter(&shared, &headers, "GET /cart") {
        Ok(state) => Json(state.cart_json()).into_response(),
        Err(response) => response,
    }
}

async fn add_to_cart(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<AddItemRequest>,
) -> Response {
    let mut state = match enter(&shared, &headers, "POST /cart/add-to-cart") {
        Ok(state) => state,
        Err(response) => return response,
    };
    match state.add(body.variant_id.as_str(), body.quantity) {
        Ok(line) => (StatusCode::CREATED, Json(json!({ "data": line }))).into_response(),
        Err((status, message)) => error(status, &message),
    }
}

#[derive(Deserialize)]
struct UpdateItem {
    quantity: u32,
}

async fn update_item(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateItem>,
) -> Response {
    let mut state = match enter(&shared, &headers, "PATCH /cart/update-item") {
        Ok(state) => state,
        Err(response) => return response,
    };
    let Some(line) = state.lines.iter_mut().find(|line| line.id == id) else {
        return error(StatusCode::NOT_FOUND, "Cart item not found");
    };
    line.quantity = body.quantity;
    let line = line.clone();
    Json(json!({ "data": state.line_json(&line) })).into_response()
}

async fn remove_item(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut state = match enter(&shared, &headers, "DELETE /cart/remove-item") {
        Ok(state) => state,
        Err(response) => return response,
    };
    let before = state.lines.len();
    state.lines.retain(|line| line.id != id);
    if state.lines.len() == before {
        return error(StatusCode::NOT_FOUND, "Cart item not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn clear_cart(State(shared): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = match enter(&shared, &headers, "DELETE /cart/clear-cart") {
        Ok(state) => state,
        Err(response) => return response,
    };
    state.lines.clear();
    state.coupon = None;
    Json(json!({ "message": "Cart cleared" })).into_response()
}

#[derive(Deserialize)]
struct MergeBody {
    items: Vec<MergeLine>,
}

async fn merge(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<MergeBody>,
) -> Response {
    let mut state = match enter(&shared, &headers, "POST /cart/merge") {
        Ok(state) => state,
        Err(response) => return response,
    };

    let mut merged = Vec::new();
    let mut skipped = Vec::new();
    for line in body.items {
        let variant_id = line.variant_id.as_str();
        match state.add(variant_id, line.quantity) {
            Ok(item) => merged.push(item),
            Err((_, reason)) => skipped.push(json!({
                "variantId": variant_id,
                "quantity": line.quantity,
                "reason": reason,
            })),
        }
    }

    Json(json!({
        "data": {
            "mergedCount": merged.len(),
            "skippedCount": skipped.len(),
            "merged": merged,
            "skipped": skipped,
        }
    }))
    .into_response()
}

#[derive(Deserialize)]
struct ApplyCoupon {
    code: String,
}

async fn apply_coupon(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<ApplyCoupon>,
) -> Response {
    let mut state = match enter(&shared, &headers, "POST /coupons/apply") {
        Ok(state) => state,
        Err(response) => return response,
    };
    if body.code != VALID_COUPON {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid coupon code" })),
        )
            .into_response();
    }
    state.coupon = Some(body.code.clone());
    Json(json!({ "data": { "code": body.code, "discountPercent": 10 } })).into_response()
}

async fn remove_coupon(State(shared): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = match enter(&shared, &headers, "DELETE /coupons/remove") {
        Ok(state) => state,
        Err(response) => return response,
    };
    state.coupon = None;
    StatusCode::NO_CONTENT.into_response()
}
