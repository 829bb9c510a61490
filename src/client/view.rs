//! What the checkout shows: the order summary before placement and the
//! confirmation after it.

use std::fmt;

use crate::domain::aggregates::OrderConfirmation;
use crate::domain::pricing::PriceBreakdown;
use crate::domain::value_objects::Quantity;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutView {
    Summary(OrderSummary),
    Confirmation(OrderConfirmation),
}

/// Pre-submission summary built from the local preview.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderSummary {
    pub quantity: Quantity,
    pub preview: PriceBreakdown,
    pub submitting: bool,
    pub error: Option<String>,
}

impl fmt::Display for OrderSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Quantity: {}", self.quantity.value())?;
        writeln!(f, "Subtotal: {}", self.preview.subtotal)?;
        writeln!(f, "Shipping: {}", self.preview.shipping)?;
        writeln!(f, "Tax: {}", self.preview.tax)?;
        write!(f, "Estimated total: {}", self.preview.total)?;
        if self.submitting {
            write!(f, "\nPlacing order...")?;
        }
        if let Some(error) = &self.error {
            write!(f, "\nError: {error}")?;
        }
        Ok(())
    }
}

impl fmt::Display for CheckoutView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summary(summary) => fmt::Display::fmt(summary, f),
            // Server strings are shown as-is.
            Self::Confirmation(c) => {
                writeln!(f, "Order {} placed", c.order.order_number)?;
                writeln!(f, "Subtotal: {}", c.totals.human.subtotal)?;
                writeln!(f, "Shipping: {}", c.totals.human.shipping)?;
                writeln!(f, "Tax: {}", c.totals.human.tax)?;
                write!(f, "Total: {}", c.totals.human.total)
            }
        }
    }
}
