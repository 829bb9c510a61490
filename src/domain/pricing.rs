//! Price breakdown for a single-product order.
//!
//! The same rules drive the client's preview and the endpoint's authoritative
//! totals, but each side holds its own copy of [`PricingRules`], so the two
//! breakdowns can drift. Callers must treat the endpoint's numbers as final.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Money, Quantity};

pub const DEFAULT_UNIT_PRICE_CENTS: i64 = 2999;
pub const DEFAULT_SHIPPING_CENTS: i64 = 599;
pub const DEFAULT_TAX_RATE: Decimal = dec!(0.07);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingRules {
    pub unit_price: Money,
    pub shipping: Money,
    pub tax_rate: Decimal,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            unit_price: Money::from_cents(DEFAULT_UNIT_PRICE_CENTS),
            shipping: Money::from_cents(DEFAULT_SHIPPING_CENTS),
            tax_rate: DEFAULT_TAX_RATE,
        }
    }
}

impl PricingRules {
    pub fn quote(&self, quantity: Quantity) -> PriceBreakdown {
        self.quote_units(quantity.value())
    }

    /// Like [`quote`](Self::quote) but without the form's quantity clamp.
    pub fn quote_units(&self, units: u32) -> PriceBreakdown {
        let subtotal = self.unit_price.multiply(units);
        PriceBreakdown::new(subtotal, self.shipping, tax_on(subtotal, self.tax_rate))
    }
}

/// `round-half-up(subtotal × rate)` in whole cents.
pub fn tax_on(subtotal: Money, rate: Decimal) -> Money {
    let raw = Decimal::from(subtotal.cents()) * rate;
    let cents = raw.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    Money::from_cents(cents.to_i64().unwrap_or(i64::MAX))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl PriceBreakdown {
    pub fn new(subtotal: Money, shipping: Money, tax: Money) -> Self {
        Self { subtotal, shipping, tax, total: subtotal + shipping + tax }
    }

    pub fn human(&self) -> HumanTotals {
        HumanTotals {
            subtotal: self.subtotal.to_string(),
            shipping: self.shipping.to_string(),
            tax: self.tax.to_string(),
            total: self.total.to_string(),
        }
    }
}

/// Currency-formatted totals as returned by the endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanTotals {
    pub subtotal: String,
    pub shipping: String,
    pub tax: String,
    pub total: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_is_sum_of_parts() {
        for subtotal in [0_i64, 1, 99, 5998, 123_456] {
            for shipping in [0_i64, 599, 1000] {
                for tax in [0_i64, 7, 420] {
                    let b = PriceBreakdown::new(Money::from_cents(subtotal), Money::from_cents(shipping), Money::from_cents(tax));
                    assert_eq!(b.total.cents(), subtotal + shipping + tax);
                }
            }
        }
    }

    #[test]
    fn test_tax_rounds_half_up() {
        assert_eq!(tax_on(Money::from_cents(5998), dec!(0.07)), Money::from_cents(420));
        // 50 * 0.07 = 3.5
        assert_eq!(tax_on(Money::from_cents(50), dec!(0.07)), Money::from_cents(4));
        // 2999 * 0.07 = 209.93
        assert_eq!(tax_on(Money::from_cents(2999), dec!(0.07)), Money::from_cents(210));
        assert_eq!(tax_on(Money::from_cents(10), dec!(0.07)), Money::from_cents(1));
        assert_eq!(tax_on(Money::ZERO, dec!(0.07)), Money::ZERO);
    }

    #[test]
    fn test_quote_for_two_units() {
        let b = PricingRules::default().quote(Quantity::clamped(2));
        assert_eq!(b.subtotal.cents(), 5998);
        assert_eq!(b.shipping.cents(), 599);
        assert_eq!(b.tax.cents(), 420);
        assert_eq!(b.total.cents(), 7017);
        let human = b.human();
        assert_eq!((human.subtotal.as_str(), human.total.as_str()), ("$59.98", "$70.17"));
    }
}
