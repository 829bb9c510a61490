//! End-to-end checkout against a live endpoint on an ephemeral port.

use std::sync::{Arc, Mutex};

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use storefront_checkout::client::{CheckoutController, CheckoutView, FixedSession, HttpOrderGateway, Session};
use storefront_checkout::domain::value_objects::Money;
use storefront_checkout::server::{router, AppState, MemoryOrderStore, OrderStore};
use storefront_checkout::{PricingRules, ShippingField};
use uuid::Uuid;

const PLACE_ORDER_PATH: &str = "/functions/v1/place-order";

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

async fn endpoint(pricing: PricingRules) -> (String, Arc<MemoryOrderStore>) {
    let mem = Arc::new(MemoryOrderStore::new("GG", 1001));
    let state = AppState { store: OrderStore::Memory(mem.clone()), pricing, max_quantity: 10, events: None };
    (serve(router(state)).await, mem)
}

fn fill(c: &CheckoutController<HttpOrderGateway, FixedSession>) {
    c.set_field(ShippingField::Name, "Ada Lovelace");
    c.set_field(ShippingField::Phone, "555-0100");
    c.set_field(ShippingField::Address1, "1 Main St");
    c.set_field(ShippingField::City, "Springfield");
    c.set_field(ShippingField::State, "IL");
    c.set_field(ShippingField::Postal, "62701");
}

fn controller(base: &str, session: Option<Session>) -> CheckoutController<HttpOrderGateway, FixedSession> {
    CheckoutController::new(HttpOrderGateway::new(base).unwrap(), FixedSession(session), PricingRules::default())
}

#[tokio::test]
async fn places_order_and_shows_server_confirmation() {
    let (base, mem) = endpoint(PricingRules::default()).await;
    let c = controller(&base, None);
    fill(&c);
    c.set_quantity(2);

    let preview = c.preview();
    assert_eq!((preview.subtotal.cents(), preview.shipping.cents(), preview.tax.cents(), preview.total.cents()), (5998, 599, 420, 7017));

    let confirmation = c.place_order().await.unwrap();
    assert_eq!(confirmation.order.order_number, "GG-1001");
    let human = &confirmation.totals.human;
    assert_eq!((human.subtotal.as_str(), human.shipping.as_str(), human.tax.as_str(), human.total.as_str()), ("$59.98", "$5.99", "$4.20", "$70.17"));

    let text = c.view().to_string();
    assert!(text.contains("Order GG-1001 placed"));
    assert!(text.contains("Total: $70.17"));
    assert_eq!(mem.len(), 1);
    assert!(!c.is_submitting());
}

#[tokio::test]
async fn server_totals_win_over_local_preview() {
    let server_pricing = PricingRules { shipping: Money::from_cents(800), ..PricingRules::default() };
    let (base, _) = endpoint(server_pricing).await;
    let c = controller(&base, None);
    fill(&c);
    c.set_quantity(2);
    assert_eq!(c.preview().total.cents(), 7017);

    let confirmation = c.place_order().await.unwrap();
    assert_eq!(confirmation.totals.total_cents, Some(7218));
    match c.view() {
        CheckoutView::Confirmation(shown) => assert_eq!(shown.totals.human.total, "$72.18"),
        other => panic!("expected confirmation, got {other:?}"),
    }
}

#[tokio::test]
async fn validation_failure_never_reaches_endpoint() {
    let (base, mem) = endpoint(PricingRules::default()).await;
    let c = controller(&base, None);
    fill(&c);
    c.set_field(ShippingField::Country, "CA");

    let err = c.place_order().await.unwrap_err();
    assert_eq!(err.to_string(), "Only US shipping is supported.");
    assert!(mem.is_empty());
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_status_line() {
    let app = Router::new().route(PLACE_ORDER_PATH, post(|| async { (StatusCode::BAD_GATEWAY, "<html>upstream down</html>") }));
    let base = serve(app).await;
    let c = controller(&base, None);
    fill(&c);

    let err = c.place_order().await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");
    assert_eq!(c.error().as_deref(), Some("HTTP 502: Bad Gateway"));
}

#[tokio::test]
async fn every_click_sends_a_fresh_idempotency_key() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let recorder = seen.clone();
    let app = Router::new().route(PLACE_ORDER_PATH, post(move |headers: HeaderMap| {
        let recorder = recorder.clone();
        async move {
            let key = headers.get("idempotency-key").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
            recorder.lock().unwrap().push(key);
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "Try again shortly", "details": "db pool exhausted"})))
        }
    }));
    let base = serve(app).await;
    let c = controller(&base, None);
    fill(&c);

    assert_eq!(c.place_order().await.unwrap_err().to_string(), "Try again shortly");
    assert_eq!(c.place_order().await.unwrap_err().to_string(), "Try again shortly");

    let keys = seen.lock().unwrap().clone();
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|k| !k.is_empty()));
    assert_ne!(keys[0], keys[1]);
}

#[tokio::test]
async fn signed_in_shopper_gets_prefilled_shipping() {
    let (base, mem) = endpoint(PricingRules::default()).await;
    let session = Session { user_id: Uuid::new_v4(), access_token: "tok-abc".into() };
    mem.add_session(session.access_token.clone(), session.user_id);

    let first = controller(&base, Some(session.clone()));
    first.prefill().await;
    assert_eq!(first.shipping().name, "");
    fill(&first);
    first.place_order().await.unwrap();

    let second = controller(&base, Some(session));
    second.prefill().await;
    let shipping = second.shipping();
    assert_eq!(shipping.name, "Ada Lovelace");
    assert_eq!(shipping.postal, "62701");
}
