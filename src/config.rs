//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `PORT` - Listen port (default: 8083)
//! - `DATABASE_URL` - `PostgreSQL` connection string; unset runs on the in-memory store
//! - `NATS_URL` - Event bus; unset disables event publishing
//! - `STRIPE_SECRET_KEY` - Payment provider key; unset uses the offline gateway
//! - `STRIPE_API_BASE` - Payment provider base URL (default: https://api.stripe.com)
//! - `CLIENT_URL` - Storefront URL used for checkout redirects (default: http://localhost:5173)
//! - `STORE_CURRENCY` - ISO currency code (default: USD)

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
    pub client_url: String,
    pub currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8083,
            database_url: None,
            nats_url: None,
            stripe_secret_key: None,
            stripe_api_base: "https://api.stripe.com".to_string(),
            client_url: "http://localhost:5173".to_string(),
            currency: "USD".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => defaults.port,
        };
        let currency = match get("STORE_CURRENCY") {
            Some(value) if value.len() == 3 && value.chars().all(|c| c.is_ascii_alphabetic()) => value.to_ascii_uppercase(),
            Some(value) => return Err(ConfigError::Invalid { name: "STORE_CURRENCY", value }),
            None => defaults.currency,
        };

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            nats_url: get("NATS_URL"),
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            stripe_api_base: get("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            client_url: get("CLIENT_URL").map(|u| u.trim_end_matches('/').to_string()).unwrap_or(defaults.client_url),
            currency,
        })
    }

    pub fn success_url(&self) -> String {
        format!("{}/purchase-success?session_id={{CHECKOUT_SESSION_ID}}", self.client_url)
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/purchase-cancel", self.client_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8083);
        assert!(config.database_url.is_none());
        assert_eq!(config.currency, "USD");
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "9000"), ("DATABASE_URL", "  "), ("CLIENT_URL", "https://shop.test/"), ("STORE_CURRENCY", "eur"),
        ])).unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.database_url.is_none());
        assert_eq!(config.cancel_url(), "https://shop.test/purchase-cancel");
        assert_eq!(config.currency, "EUR");
    }

    #[test]
    fn test_invalid_port() {
        assert!(matches!(Config::from_lookup(lookup(&[("PORT", "http")])), Err(ConfigError::Invalid { name: "PORT", .. })));
    }
}
