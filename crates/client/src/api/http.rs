//! HTTP implementation of [`CartApi`].
//!
//! Uses `reqwest` with a cookie jar holding the session cookie, so every
//! request carries the session without the reconciler knowing about it.

use std::sync::Arc;

use async_trait::async_trait;
use cartsync_core::CartItemId;
use reqwest::cookie::Jar;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::{AddItemRequest, ApiError, CartApi, CartSnapshot, MergeLine, MergeReport};
use crate::config::CartApiConfig;

/// Longest slice of a response body that ends up in logs.
const LOGGED_BODY_CHARS: usize = 500;

/// Client for the remote cart service.
#[derive(Clone)]
pub struct HttpCartApi {
    inner: Arc<HttpCartApiInner>,
}

struct HttpCartApiInner {
    client: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for HttpCartApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartApi")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpCartApi {
    /// Create a new cart service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the base URL
    /// cannot carry paths.
    pub fn new(config: &CartApiConfig) -> Result<Self, ApiError> {
        if config.base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.base_url.to_string()));
        }

        let jar = Jar::default();
        if let Some(cookie) = config.session_cookie_str() {
            jar.add_cookie_str(cookie, &config.base_url);
        }

        let client = reqwest::Client::builder()
            .cookie_provider(Arc::new(jar))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpCartApiInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// Build an endpoint URL from path segments. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the raw body of a successful response.
    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<String, ApiError> {
        let url = self.endpoint(segments)?;
        let mut request = self
            .inner
            .client
            .request(method.clone(), url)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                method = %method,
                status = %status,
                body = %response_text.chars().take(LOGGED_BODY_CHARS).collect::<String>(),
                "Cart service returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&response_text),
            });
        }

        Ok(response_text)
    }

    async fn send_empty(&self, method: Method, segments: &[&str]) -> Result<String, ApiError> {
        self.send::<()>(method, segments, None).await
    }
}

/// Parse a JSON body, logging the body when it does not match.
fn parse<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(LOGGED_BODY_CHARS).collect::<String>(),
            "Failed to parse cart service response"
        );
        ApiError::Parse(e)
    })
}

/// Unwrap the `data` member of a mutation response. Empty bodies yield `null`.
fn parse_data(body: &str) -> Result<serde_json::Value, ApiError> {
    if body.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    let mut value: serde_json::Value = parse(body)?;
    Ok(value
        .get_mut("data")
        .map_or(serde_json::Value::Null, serde_json::Value::take))
}

/// Accept a payload either bare or wrapped in `{"data": ...}`.
fn parse_enveloped<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let mut value: serde_json::Value = parse(body)?;
    let payload = match value.get_mut("data") {
        Some(data) if data.is_object() => data.take(),
        _ => value,
    };
    Ok(serde_json::from_value(payload)?)
}

/// Extract a human-readable message from an error body.
///
/// Looks for `message`, then `error` (as a string or an object with a
/// `message`).
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .or_else(|| match value.get("error")? {
            serde_json::Value::String(s) => Some(s.as_str()),
            other => other.get("message").and_then(serde_json::Value::as_str),
        })?;

    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

#[async_trait]
impl CartApi for HttpCartApi {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<CartSnapshot, ApiError> {
        let body = self.send_empty(Method::GET, &["cart"]).await?;
        let snapshot: CartSnapshot = parse_enveloped(&body)?;
        debug!(items = snapshot.items.len(), issues = snapshot.issues.len(), "Fetched cart");
        Ok(snapshot)
    }

    #[instrument(skip(self), fields(variant_id = %request.variant_id, quantity = request.quantity))]
    async fn add_item(&self, request: AddItemRequest) -> Result<serde_json::Value, ApiError> {
        let body = self
            .send(Method::POST, &["cart", "add-to-cart"], Some(&request))
            .await?;
        parse_data(&body)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn update_item(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<serde_json::Value, ApiError> {
        #[derive(Serialize)]
        struct UpdateItem {
            quantity: u32,
        }

        let body = self
            .send(
                Method::PATCH,
                &["cart", "update-item", item_id.as_str()],
                Some(&UpdateItem { quantity }),
            )
            .await?;
        parse_data(&body)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn remove_item(&self, item_id: CartItemId) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &["cart", "remove-item", item_id.as_str()])
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &["cart", "clear-cart"]).await?;
        Ok(())
    }

    #[instrument(skip(self, items), fields(lines = items.len()))]
    async fn merge_items(&self, items: Vec<MergeLine>) -> Result<MergeReport, ApiError> {
        #[derive(Serialize)]
        struct MergeBody {
            items: Vec<MergeLine>,
        }

        let body = self
            .send(Method::POST, &["cart", "merge"], Some(&MergeBody { items }))
            .await?;
        if body.trim().is_empty() {
            return Ok(MergeReport::default());
        }
        parse_enveloped(&body)
    }

    #[instrument(skip(self, code))]
    async fn apply_coupon(&self, code: String) -> Result<serde_json::Value, ApiError> {
        #[derive(Serialize)]
        struct ApplyCoupon {
            code: String,
        }

        let body = self
            .send(Method::POST, &["coupons", "apply"], Some(&ApplyCoupon { code }))
            .await?;
        parse_data(&body)
    }

    #[instrument(skip(self))]
    async fn remove_coupon(&self) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &["coupons", "remove"]).await?;
        Ok(())
    }
}
