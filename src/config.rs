//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Endpoint (all optional)
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `DATABASE_URL` - `PostgreSQL` connection string; in-memory store when unset
//! - `NATS_URL` - NATS server for order events
//! - `UNIT_PRICE_CENTS` - Unit price (default: 2999)
//! - `SHIPPING_CENTS` - Flat shipping fee (default: 599)
//! - `TAX_RATE` - Decimal tax rate (default: 0.07)
//! - `ORDER_PREFIX` - Order number prefix (default: GG)
//! - `ORDER_NUMBER_START` - First order number (default: 1001)
//! - `MAX_QUANTITY` - Largest quantity accepted per order (default: 10)
//!
//! ## Checkout client
//! - `FUNCTIONS_BASE_URL` - Base URL of the functions host (required)

use std::net::IpAddr;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::pricing::PricingRules;
use crate::domain::value_objects::{Money, Quantity};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub pricing: PricingRules,
    pub order_prefix: String,
    pub order_number_start: i64,
    pub max_quantity: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8083,
            database_url: None,
            nats_url: None,
            pricing: PricingRules::default(),
            order_prefix: "GG".to_string(),
            order_number_start: 1001,
            max_quantity: Quantity::MAX,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

impl ServerConfig {
    /// # Errors
    ///
    /// Returns an error when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let unit_price: i64 = parse_or(&lookup, "UNIT_PRICE_CENTS", defaults.pricing.unit_price.cents())?;
        if unit_price <= 0 {
            return Err(ConfigError::InvalidEnvVar("UNIT_PRICE_CENTS".into(), "must be a positive number of cents".into()));
        }
        let shipping: i64 = parse_or(&lookup, "SHIPPING_CENTS", defaults.pricing.shipping.cents())?;
        if shipping < 0 {
            return Err(ConfigError::InvalidEnvVar("SHIPPING_CENTS".into(), "must not be negative".into()));
        }
        let tax_rate: Decimal = parse_or(&lookup, "TAX_RATE", defaults.pricing.tax_rate)?;
        if tax_rate.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar("TAX_RATE".into(), "must not be negative".into()));
        }
        let max_quantity: u32 = parse_or(&lookup, "MAX_QUANTITY", defaults.max_quantity)?;
        if max_quantity == 0 {
            return Err(ConfigError::InvalidEnvVar("MAX_QUANTITY".into(), "must be at least 1".into()));
        }

        Ok(Self {
            host: parse_or(&lookup, "HOST", defaults.host)?,
            port: parse_or(&lookup, "PORT", defaults.port)?,
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            nats_url: lookup("NATS_URL").filter(|v| !v.is_empty()),
            pricing: PricingRules { unit_price: Money::from_cents(unit_price), shipping: Money::from_cents(shipping), tax_rate },
            order_prefix: lookup("ORDER_PREFIX").filter(|v| !v.is_empty()).unwrap_or(defaults.order_prefix),
            order_number_start: parse_or(&lookup, "ORDER_NUMBER_START", defaults.order_number_start)?,
            max_quantity,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub functions_base_url: String,
    pub pricing: PricingRules,
}

impl ClientConfig {
    /// # Errors
    ///
    /// Returns an error when `FUNCTIONS_BASE_URL` is missing or pricing variables are invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let functions_base_url = lookup("FUNCTIONS_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("FUNCTIONS_BASE_URL".into()))?;
        let pricing = ServerConfig::from_lookup(&lookup)?.pricing;
        Ok(Self { functions_base_url, pricing })
    }
}
