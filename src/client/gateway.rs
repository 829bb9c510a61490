//! Transport between the checkout controller and the order endpoint.

use serde::Deserialize;
use uuid::Uuid;

use super::CheckoutError;
use crate::domain::aggregates::{OrderConfirmation, OrderRequest, ShippingAddress};
use crate::domain::value_objects::IdempotencyKey;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
pub const PLACE_ORDER_PATH: &str = "/functions/v1/place-order";
pub const LATEST_ORDER_PATH: &str = "/functions/v1/latest-order";

/// Signed-in shopper, as resolved from the auth provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub access_token: String,
}

#[allow(async_fn_in_trait)]
pub trait SessionProvider {
    /// `None` means guest checkout.
    async fn current_session(&self) -> Option<Session>;
}

/// A session that never changes; `FixedSession(None)` is a guest.
#[derive(Clone, Debug, Default)]
pub struct FixedSession(pub Option<Session>);

impl SessionProvider for FixedSession {
    async fn current_session(&self) -> Option<Session> { self.0.clone() }
}

#[allow(async_fn_in_trait)]
pub trait OrderGateway {
    /// Sends exactly one placement request.
    async fn place_order(&self, request: &OrderRequest, key: &IdempotencyKey, session: Option<&Session>) -> Result<OrderConfirmation, CheckoutError>;

    /// Shipping address of the shopper's most recent order, if any.
    async fn latest_shipping(&self, session: &Session) -> Result<Option<ShippingAddress>, CheckoutError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LatestOrderBody {
    #[serde(default)]
    shipping: Option<ShippingAddress>,
}

/// Maps a non-2xx response to an error, falling back to `HTTP <status>: <statusText>`
/// when the body is not a JSON `{ "error": ... }` object.
pub fn error_from_response(status: u16, status_text: &str, body: &str) -> CheckoutError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => CheckoutError::Server {
            status,
            message: parsed.error,
            details: parsed.details.map(|d| match d {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
        },
        Err(_) => CheckoutError::MalformedResponse { status, message: format!("HTTP {status}: {status_text}") },
    }
}

/// `reqwest` client for the functions host.
#[derive(Clone, Debug)]
pub struct HttpOrderGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderGateway {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(base_url: impl Into<String>) -> Result<Self, CheckoutError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String { format!("{}{path}", self.base_url) }
}

impl OrderGateway for HttpOrderGateway {
    async fn place_order(&self, request: &OrderRequest, key: &IdempotencyKey, session: Option<&Session>) -> Result<OrderConfirmation, CheckoutError> {
        let mut builder = self.client.post(self.url(PLACE_ORDER_PATH)).header(IDEMPOTENCY_KEY_HEADER, key.as_str()).json(request);
        if let Some(session) = session {
            builder = builder.bearer_auth(&session.access_token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), status.canonical_reason().unwrap_or(""), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(status = status.as_u16(), error = %e, "unparseable order confirmation");
            CheckoutError::MalformedResponse { status: status.as_u16(), message: "Received an unexpected response from the order service.".to_string() }
        })
    }

    async fn latest_shipping(&self, session: &Session) -> Result<Option<ShippingAddress>, CheckoutError> {
        let response = self.client.get(self.url(LATEST_ORDER_PATH)).bearer_auth(&session.access_token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), status.canonical_reason().unwrap_or(""), &body));
        }

        let parsed: LatestOrderBody = serde_json::from_str(&body)
            .map_err(|e| CheckoutError::MalformedResponse { status: status.as_u16(), message: e.to_string() })?;
        Ok(parsed.shipping)
    }
}
