//! Checkout form controller.
//!
//! Holds the shipping form and quantity, shows a local price preview, and
//! places the order with one request per user action. The preview never
//! travels to the endpoint; after a successful placement only the
//! endpoint's totals are shown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::gateway::{OrderGateway, SessionProvider};
use super::view::{CheckoutView, OrderSummary};
use super::CheckoutError;
use crate::domain::aggregates::{validate_shipping, OrderConfirmation, OrderRequest, ShippingAddress, ShippingField, ShippingValidationError, ORDER_SOURCE};
use crate::domain::pricing::{PriceBreakdown, PricingRules};
use crate::domain::value_objects::{IdempotencyKey, Quantity};

/// When the controller mints a new idempotency key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyPolicy {
    /// A fresh key on every call to `place_order`, retries included.
    #[default]
    PerSubmission,
    /// Reuse the key while the order is unchanged; rotate on edit or success.
    PerLogicalOrder,
}

#[derive(Debug, Default)]
struct FormState {
    shipping: ShippingAddress,
    quantity: Quantity,
    notes: String,
    error: Option<String>,
    confirmation: Option<OrderConfirmation>,
    pending: Option<(IdempotencyKey, OrderRequest)>,
}

/// Clears the submitting flag when dropped.
struct SubmittingGuard<'a>(&'a AtomicBool);

impl<'a> SubmittingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok().map(|_| Self(flag))
    }
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

pub struct CheckoutController<G, S> {
    gateway: G,
    sessions: S,
    pricing: PricingRules,
    key_policy: KeyPolicy,
    submitting: AtomicBool,
    state: Mutex<FormState>,
}

impl<G: OrderGateway, S: SessionProvider> CheckoutController<G, S> {
    pub fn new(gateway: G, sessions: S, pricing: PricingRules) -> Self {
        Self { gateway, sessions, pricing, key_policy: KeyPolicy::default(), submitting: AtomicBool::new(false), state: Mutex::new(FormState::default()) }
    }

    pub fn with_key_policy(mut self, policy: KeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    fn state(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the shipping address of the shopper's latest order into the form.
    /// Best effort: guests, first-time buyers and lookup failures leave it blank.
    pub async fn prefill(&self) {
        let Some(session) = self.sessions.current_session().await else { return };
        match self.gateway.latest_shipping(&session).await {
            Ok(Some(shipping)) => {
                debug!(user_id = %session.user_id, "prefilled shipping from previous order");
                self.state().shipping = shipping;
            }
            Ok(None) => debug!(user_id = %session.user_id, "no previous order to prefill from"),
            Err(e) => debug!(user_id = %session.user_id, error = %e, "shipping prefill failed"),
        }
    }

    pub fn set_field(&self, field: ShippingField, value: impl Into<String>) { self.state().shipping.set(field, value); }
    pub fn set_notes(&self, notes: impl Into<String>) { self.state().notes = notes.into(); }
    pub fn set_quantity(&self, value: i64) { self.state().quantity = Quantity::clamped(value); }
    pub fn set_quantity_input(&self, input: &str) { self.state().quantity = Quantity::parse_input(input); }

    pub fn shipping(&self) -> ShippingAddress { self.state().shipping.clone() }
    pub fn quantity(&self) -> Quantity { self.state().quantity }
    pub fn error(&self) -> Option<String> { self.state().error.clone() }
    pub fn confirmation(&self) -> Option<OrderConfirmation> { self.state().confirmation.clone() }
    pub fn is_submitting(&self) -> bool { self.submitting.load(Ordering::Acquire) }

    /// Display-only totals for the current quantity.
    pub fn preview(&self) -> PriceBreakdown { self.pricing.quote(self.quantity()) }

    /// Validates the form, recording the message on failure.
    pub fn validate(&self) -> Result<(), ShippingValidationError> {
        let mut state = self.state();
        let result = validate_shipping(&state.shipping);
        if let Err(e) = &result {
            state.error = Some(e.to_string());
        }
        result
    }

    pub fn view(&self) -> CheckoutView {
        let state = self.state();
        match &state.confirmation {
            Some(c) => CheckoutView::Confirmation(c.clone()),
            None => CheckoutView::Summary(OrderSummary {
                quantity: state.quantity,
                preview: self.pricing.quote(state.quantity),
                submitting: self.is_submitting(),
                error: state.error.clone(),
            }),
        }
    }

    fn key_for(&self, request: &OrderRequest) -> IdempotencyKey {
        let mut state = self.state();
        match self.key_policy {
            KeyPolicy::PerSubmission => IdempotencyKey::generate(),
            KeyPolicy::PerLogicalOrder => match &state.pending {
                Some((key, pending)) if pending == request => key.clone(),
                _ => {
                    let key = IdempotencyKey::generate();
                    state.pending = Some((key.clone(), request.clone()));
                    key
                }
            },
        }
    }

    /// Places the order. At most one call is in flight at a time; a call made
    /// while another is pending fails with `AlreadySubmitting` and sends nothing.
    pub async fn place_order(&self) -> Result<OrderConfirmation, CheckoutError> {
        let _guard = SubmittingGuard::acquire(&self.submitting).ok_or(CheckoutError::AlreadySubmitting)?;

        self.validate()?;

        let (shipping, quantity, notes) = {
            let mut state = self.state();
            state.error = None;
            state.confirmation = None;
            (state.shipping.clone(), state.quantity, state.notes.clone())
        };

        let session = self.sessions.current_session().await;
        let request = OrderRequest {
            user_id: session.as_ref().map(|s| s.user_id),
            quantity: quantity.value(),
            shipping,
            notes,
            source: ORDER_SOURCE.to_string(),
        };
        let key = self.key_for(&request);

        match self.gateway.place_order(&request, &key, session.as_ref()).await {
            Ok(confirmation) => {
                info!(order_number = %confirmation.order.order_number, guest = session.is_none(), "order placed");
                let mut state = self.state();
                state.confirmation = Some(confirmation.clone());
                state.pending = None;
                state.shipping = ShippingAddress::default();
                state.notes.clear();
                Ok(confirmation)
            }
            Err(e) => {
                match &e {
                    CheckoutError::Server { status, details, .. } => warn!(status, details = ?details, error = %e, "order placement rejected"),
                    CheckoutError::MalformedResponse { status, .. } => warn!(status, error = %e, "order placement returned malformed response"),
                    other => warn!(error = %other, "order placement failed"),
                }
                self.state().error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Notify;
    use uuid::Uuid;

    use super::*;
    use crate::client::gateway::{FixedSession, Session};
    use crate::domain::aggregates::{ConfirmationTotals, ConfirmedOrder, OrderStatus};
    use crate::domain::pricing::HumanTotals;

    #[derive(Clone, Debug)]
    struct Call {
        request: OrderRequest,
        key: IdempotencyKey,
        bearer: Option<String>,
    }

    #[derive(Default)]
    struct FakeGateway {
        calls: Mutex<Vec<Call>>,
        responses: Mutex<Vec<Result<OrderConfirmation, CheckoutError>>>,
        latest: Option<Result<Option<ShippingAddress>, CheckoutError>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeGateway {
        fn respond(self, r: Result<OrderConfirmation, CheckoutError>) -> Self {
            self.responses.lock().unwrap().push(r);
            self
        }
        fn calls(&self) -> Vec<Call> { self.calls.lock().unwrap().clone() }
    }

    impl OrderGateway for FakeGateway {
        async fn place_order(&self, request: &OrderRequest, key: &IdempotencyKey, session: Option<&Session>) -> Result<OrderConfirmation, CheckoutError> {
            self.calls.lock().unwrap().push(Call { request: request.clone(), key: key.clone(), bearer: session.map(|s| s.access_token.clone()) });
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() { Err(CheckoutError::Transport("no response scripted".into())) } else { responses.remove(0) }
        }

        async fn latest_shipping(&self, _session: &Session) -> Result<Option<ShippingAddress>, CheckoutError> {
            self.latest.clone().unwrap_or(Ok(None))
        }
    }

    fn confirmation(number: &str, total: &str) -> OrderConfirmation {
        OrderConfirmation {
            order: ConfirmedOrder { id: None, order_number: number.into(), status: OrderStatus::Pending, placed_at: None },
            totals: ConfirmationTotals {
                subtotal_cents: None, shipping_cents: None, tax_cents: None, total_cents: None, currency: None,
                human: HumanTotals { subtotal: "$59.98".into(), shipping: "$5.99".into(), tax: "$4.20".into(), total: total.into() },
            },
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Ada Lovelace".into(), phone: "555-0100".into(), address1: "1 Main St".into(), address2: Some("Apt 2".into()),
            city: "Springfield".into(), state: "IL".into(), postal: "62701".into(), country: "US".into(),
        }
    }

    fn session() -> Session { Session { user_id: Uuid::new_v4(), access_token: "tok-123".into() } }

    fn filled<G: OrderGateway>(gateway: G, sessions: FixedSession) -> CheckoutController<G, FixedSession> {
        let c = CheckoutController::new(gateway, sessions, PricingRules::default());
        let a = address();
        for (field, value) in [
            (ShippingField::Name, a.name), (ShippingField::Phone, a.phone), (ShippingField::Address1, a.address1),
            (ShippingField::City, a.city), (ShippingField::State, a.state), (ShippingField::Postal, a.postal),
        ] {
            c.set_field(field, value);
        }
        c
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_request() {
        let c = CheckoutController::new(FakeGateway::default(), FixedSession(None), PricingRules::default());
        c.set_field(ShippingField::Name, "Ada");
        c.set_field(ShippingField::City, "Springfield");

        let err = c.place_order().await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(c.error().as_deref(), Some("Missing required fields: phone, address1, state, postal"));
        assert!(c.gateway.calls().is_empty());
        assert!(!c.is_submitting());
    }

    #[tokio::test]
    async fn test_non_us_country_rejected_locally() {
        let c = filled(FakeGateway::default(), FixedSession(None));
        c.set_field(ShippingField::Country, "CA");
        let err = c.place_order().await.unwrap_err();
        assert_eq!(err.to_string(), "Only US shipping is supported.");
        assert!(c.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_request_carries_raw_inputs_and_bearer() {
        let s = session();
        let c = filled(FakeGateway::default().respond(Ok(confirmation("GG-1001", "$70.17"))), FixedSession(Some(s.clone())));
        c.set_quantity(2);
        c.set_notes("leave at door");
        c.place_order().await.unwrap();

        let calls = c.gateway.calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.request.user_id, Some(s.user_id));
        assert_eq!(call.request.quantity, 2);
        assert_eq!(call.request.notes, "leave at door");
        assert_eq!(call.request.source, "site_checkout");
        assert_eq!(call.bearer.as_deref(), Some("tok-123"));
        assert!(!call.key.as_str().is_empty());
        let body = serde_json::to_value(&call.request).unwrap();
        assert!(body.get("total").is_none() && body.get("subtotal").is_none());
    }

    #[tokio::test]
    async fn test_guest_checkout_sends_null_user() {
        let c = filled(FakeGateway::default().respond(Ok(confirmation("GG-1001", "$70.17"))), FixedSession(None));
        c.place_order().await.unwrap();
        let call = &c.gateway.calls()[0];
        assert_eq!(call.request.user_id, None);
        assert_eq!(call.bearer, None);
    }

    #[tokio::test]
    async fn test_each_click_mints_new_key() {
        let gateway = FakeGateway::default()
            .respond(Err(CheckoutError::Transport("connection reset".into())))
            .respond(Ok(confirmation("GG-1001", "$70.17")));
        let c = filled(gateway, FixedSession(None));

        let first = c.place_order().await.unwrap_err();
        assert_eq!(first.to_string(), "connection reset");
        assert_eq!(c.error().as_deref(), Some("connection reset"));
        c.place_order().await.unwrap();

        let calls = c.gateway.calls();
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0].key, calls[1].key);
        assert_eq!(c.error(), None);
    }

    #[tokio::test]
    async fn test_logical_order_policy_reuses_key_until_changed() {
        let gateway = FakeGateway::default()
            .respond(Err(CheckoutError::Transport("timeout".into())))
            .respond(Err(CheckoutError::Transport("timeout".into())))
            .respond(Err(CheckoutError::Transport("timeout".into())));
        let c = filled(gateway, FixedSession(None)).with_key_policy(KeyPolicy::PerLogicalOrder);

        let _ = c.place_order().await;
        let _ = c.place_order().await;
        c.set_quantity(3);
        let _ = c.place_order().await;

        let calls = c.gateway.calls();
        assert_eq!(calls[0].key, calls[1].key);
        assert_ne!(calls[1].key, calls[2].key);
    }

    #[tokio::test]
    async fn test_server_totals_take_precedence() {
        // Server total differs from the local $70.17 preview.
        let c = filled(FakeGateway::default().respond(Ok(confirmation("GG-2002", "$72.00"))), FixedSession(None));
        c.set_quantity(2);
        assert_eq!(c.preview().total.cents(), 7017);

        c.place_order().await.unwrap();
        let text = c.view().to_string();
        assert!(text.contains("Order GG-2002 placed"));
        assert!(text.contains("Total: $72.00"));
        assert!(!text.contains("$70.17"));
    }

    #[tokio::test]
    async fn test_server_error_shows_message_only() {
        let err = CheckoutError::Server { status: 400, message: "Address rejected".into(), details: Some("postal mismatch".into()) };
        let c = filled(FakeGateway::default().respond(Err(err)), FixedSession(None));
        c.place_order().await.unwrap_err();
        assert_eq!(c.error().as_deref(), Some("Address rejected"));
        assert!(c.confirmation().is_none());
        assert!(matches!(c.view(), CheckoutView::Summary(_)));
    }

    #[tokio::test]
    async fn test_second_submission_while_pending_is_blocked() {
        let gate = Arc::new(Notify::new());
        let gateway = FakeGateway { gate: Some(gate.clone()), ..Default::default() }.respond(Ok(confirmation("GG-1001", "$70.17")));
        let c = filled(gateway, FixedSession(None));

        let (first, second) = tokio::join!(c.place_order(), async {
            tokio::task::yield_now().await;
            assert!(c.is_submitting());
            let r = c.place_order().await;
            gate.notify_one();
            r
        });

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), CheckoutError::AlreadySubmitting);
        assert_eq!(c.gateway.calls().len(), 1);
        assert!(!c.is_submitting());
    }

    #[tokio::test]
    async fn test_prefill_copies_latest_shipping() {
        let gateway = FakeGateway { latest: Some(Ok(Some(address()))), ..Default::default() };
        let c = CheckoutController::new(gateway, FixedSession(Some(session())), PricingRules::default());
        c.prefill().await;
        assert_eq!(c.shipping(), address());
    }

    #[tokio::test]
    async fn test_prefill_failure_is_silent() {
        let gateway = FakeGateway { latest: Some(Err(CheckoutError::Transport("down".into()))), ..Default::default() };
        let c = CheckoutController::new(gateway, FixedSession(Some(session())), PricingRules::default());
        c.prefill().await;
        assert_eq!(c.shipping(), ShippingAddress::default());
        assert_eq!(c.error(), None);
    }

    #[tokio::test]
    async fn test_prefill_skipped_for_guest() {
        let gateway = FakeGateway { latest: Some(Ok(Some(address()))), ..Default::default() };
        let c = CheckoutController::new(gateway, FixedSession(None), PricingRules::default());
        c.prefill().await;
        assert_eq!(c.shipping(), ShippingAddress::default());
    }

    #[tokio::test]
    async fn test_quantity_input_drives_preview() {
        let c = CheckoutController::new(FakeGateway::default(), FixedSession(None), PricingRules::default());
        assert_eq!(c.preview().subtotal.cents(), 2999);
        c.set_quantity_input("2");
        let p = c.preview();
        assert_eq!((p.subtotal.cents(), p.shipping.cents(), p.tax.cents(), p.total.cents()), (5998, 599, 420, 7017));
        c.set_quantity_input("lots");
        assert_eq!(c.quantity().value(), 1);
        c.set_quantity_input("99");
        assert_eq!(c.quantity().value(), 10);
    }
}
