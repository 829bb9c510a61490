//! Shipping address and checkout form validation

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use validator::Validate;

pub const SUPPORTED_COUNTRY: &str = "US";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(custom = "not_blank")]
    pub phone: String,
    #[validate(custom = "not_blank")]
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    #[validate(custom = "not_blank")]
    pub city: String,
    #[validate(custom = "not_blank")]
    pub state: String,
    #[validate(custom = "not_blank")]
    pub postal: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String { SUPPORTED_COUNTRY.to_string() }

fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() { Err(validator::ValidationError::new("required")) } else { Ok(()) }
}

impl Default for ShippingAddress {
    fn default() -> Self {
        Self {
            name: String::new(), phone: String::new(), address1: String::new(), address2: None,
            city: String::new(), state: String::new(), postal: String::new(), country: default_country(),
        }
    }
}

/// Editable form fields, in the order they are reported when missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShippingField { Name, Phone, Address1, Address2, City, State, Postal, Country }

impl ShippingField {
    pub const REQUIRED: [ShippingField; 6] = [Self::Name, Self::Phone, Self::Address1, Self::City, Self::State, Self::Postal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name", Self::Phone => "phone", Self::Address1 => "address1", Self::Address2 => "address2",
            Self::City => "city", Self::State => "state", Self::Postal => "postal", Self::Country => "country",
        }
    }
}

impl fmt::Display for ShippingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShippingValidationError {
    #[error("Missing required fields: {}", join_fields(.0))]
    MissingFields(Vec<ShippingField>),
    #[error("Only US shipping is supported.")]
    UnsupportedCountry,
}

fn join_fields(fields: &[ShippingField]) -> String {
    fields.iter().map(ShippingField::as_str).collect::<Vec<_>>().join(", ")
}

impl ShippingAddress {
    pub fn set(&mut self, field: ShippingField, value: impl Into<String>) {
        let value = value.into();
        match field {
            ShippingField::Name => self.name = value,
            ShippingField::Phone => self.phone = value,
            ShippingField::Address1 => self.address1 = value,
            ShippingField::Address2 => self.address2 = Some(value).filter(|v| !v.trim().is_empty()),
            ShippingField::City => self.city = value,
            ShippingField::State => self.state = value,
            ShippingField::Postal => self.postal = value,
            ShippingField::Country => self.country = value,
        }
    }

    pub fn is_supported_country(&self) -> bool { self.country.trim().eq_ignore_ascii_case(SUPPORTED_COUNTRY) }
}

/// Checks required fields, then the country gate.
pub fn validate_shipping(address: &ShippingAddress) -> Result<(), ShippingValidationError> {
    if let Err(errors) = address.validate() {
        let failed = errors.field_errors();
        let missing: Vec<ShippingField> = ShippingField::REQUIRED.into_iter().filter(|f| failed.contains_key(f.as_str())).collect();
        if !missing.is_empty() { return Err(ShippingValidationError::MissingFields(missing)); }
    }
    if !address.is_supported_country() { return Err(ShippingValidationError::UnsupportedCountry); }
    Ok(())
}
