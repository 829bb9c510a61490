//! Errors surfaced by the checkout controller.

use thiserror::Error;

use crate::domain::aggregates::ShippingValidationError;

/// Every way a placement attempt can end without a confirmation.
///
/// `Display` yields the single message shown to the shopper. Diagnostic
/// detail (`details`, HTTP status) is logged, never displayed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// Form input rejected before any request was made.
    #[error(transparent)]
    Validation(#[from] ShippingValidationError),

    /// A placement request is already in flight.
    #[error("Your order is already being placed.")]
    AlreadySubmitting,

    /// The request could not be completed.
    #[error("{0}")]
    Transport(String),

    /// The endpoint answered non-2xx with a structured error body.
    #[error("{message}")]
    Server { status: u16, message: String, details: Option<String> },

    /// The endpoint answered with a body we could not interpret.
    #[error("{message}")]
    MalformedResponse { status: u16, message: String },
}

impl CheckoutError {
    pub fn is_validation(&self) -> bool { matches!(self, Self::Validation(_)) }
}

impl From<reqwest::Error> for CheckoutError {
    fn from(err: reqwest::Error) -> Self { Self::Transport(err.to_string()) }
}
