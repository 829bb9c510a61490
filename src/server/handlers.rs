//! Order placement and prefill handlers.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{ApiError, Result};
use super::store::{Inserted, NewOrder};
use super::AppState;
use crate::client::IDEMPOTENCY_KEY_HEADER;
use crate::domain::aggregates::{validate_shipping, OrderRequest, PlacedOrder};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::IdempotencyKey;

pub const REPLAYED_HEADER: &str = "idempotent-replayed";

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy", "service": "storefront-checkout"}))
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else { return Ok(None) };
    let value = value.to_str().map_err(|_| ApiError::Unauthorized("Invalid Authorization header".into()))?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(ApiError::Unauthorized("Invalid Authorization header".into())),
    }
}

/// Resolves the caller. No header means guest; a header that names no live session is rejected.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Option<Uuid>> {
    let Some(token) = bearer_token(headers)? else { return Ok(None) };
    match state.store.session_user(token).await? {
        Some(user_id) => Ok(Some(user_id)),
        None => Err(ApiError::Unauthorized("Invalid session".into())),
    }
}

fn idempotency_key(headers: &HeaderMap) -> Result<IdempotencyKey> {
    let raw = headers.get(IDEMPOTENCY_KEY_HEADER)
        .ok_or_else(|| ApiError::bad_request("Missing Idempotency-Key header"))?
        .to_str()
        .map_err(|_| ApiError::bad_request("Invalid Idempotency-Key header"))?;
    IdempotencyKey::parse(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

fn replay(order: PlacedOrder, user_id: Option<Uuid>, request: &OrderRequest) -> Result<Response> {
    if !order.matches(user_id, request) {
        warn!(order_number = %order.order_number, "idempotency key reused with a different request");
        return Err(ApiError::IdempotencyConflict);
    }
    debug!(order_number = %order.order_number, "replaying stored order");
    Ok((StatusCode::OK, [(REPLAYED_HEADER, "true")], Json(order.confirmation())).into_response())
}

async fn publish(state: &AppState, order: &PlacedOrder) {
    let Some(nats) = &state.events else { return };
    let event = OrderEvent::Placed {
        order_id: order.id,
        order_number: order.order_number.clone(),
        user_id: order.user_id,
        quantity: order.quantity,
        total_cents: order.totals.total.cents(),
    };
    let payload = match serde_json::to_vec(&event) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "failed to encode order event");
            return;
        }
    };
    if let Err(e) = nats.publish(event.subject().to_string(), payload.into()).await {
        warn!(order_number = %order.order_number, error = %e, "failed to publish order event");
    }
}

/// `POST /functions/v1/place-order`
pub async fn place_order(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let key = idempotency_key(&headers)?;
    let user_id = authenticate(&state, &headers).await?;

    let request: OrderRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest { message: "Invalid order request".into(), details: Some(e.to_string()) })?;

    match (user_id, request.user_id) {
        (Some(session_user), Some(claimed)) if session_user != claimed => return Err(ApiError::Forbidden),
        (None, Some(claimed)) => debug!(%claimed, "userId without session, placing as guest"),
        _ => {}
    }

    validate_shipping(&request.shipping).map_err(|e| ApiError::bad_request(e.to_string()))?;
    if request.quantity < 1 || request.quantity > state.max_quantity {
        return Err(ApiError::BadRequest {
            message: format!("Quantity must be between 1 and {}", state.max_quantity),
            details: Some(format!("received {}", request.quantity)),
        });
    }

    if let Some(existing) = state.store.find_by_key(key.as_str()).await? {
        return replay(existing, user_id, &request);
    }

    let totals = state.pricing.quote_units(request.quantity);
    let inserted = state.store.insert(NewOrder {
        idempotency_key: key.to_string(),
        user_id,
        quantity: request.quantity,
        shipping: request.shipping.clone(),
        notes: request.notes.clone(),
        source: request.source.clone(),
        totals,
    }).await?;

    let order = match inserted {
        Inserted::Created(order) => order,
        // Lost a race with a concurrent request carrying the same key.
        Inserted::Existing(order) => return replay(order, user_id, &request),
    };

    info!(order_number = %order.order_number, total_cents = order.totals.total.cents(), guest = user_id.is_none(), "order placed");
    publish(&state, &order).await;

    Ok((StatusCode::CREATED, Json(order.confirmation())).into_response())
}

/// `GET /functions/v1/latest-order`
pub async fn latest_order(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>> {
    let user_id = authenticate(&state, &headers).await?
        .ok_or_else(|| ApiError::Unauthorized("Sign-in required".into()))?;
    let latest = state.store.latest_for_user(user_id).await?;
    Ok(Json(json!({ "shipping": latest.map(|o| o.shipping) })))
}
