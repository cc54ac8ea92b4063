#![forbid(unsafe_code)]

//! Cart store configuration.

use serde::Deserialize;
use storefront_reactive::RuntimeConfig;

use crate::error::{CartError, Result};
use crate::money::CurrencyCode;

/// Minor units per major unit for amounts reported by the commerce API.
pub const DEFAULT_MINOR_UNIT_DIVISOR: u32 = 100;

/// Configuration for a [`CartStore`](crate::CartStore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CartConfig {
    /// Currency used when a cart omits or garbles its `currency_code`.
    pub default_currency: CurrencyCode,
    /// Stored minor units per displayed major unit.
    pub minor_unit_divisor: u32,
    /// Propagation settings for the store's runtime.
    pub runtime: RuntimeConfig,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            default_currency: CurrencyCode::usd(),
            minor_unit_divisor: DEFAULT_MINOR_UNIT_DIVISOR,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl CartConfig {
    /// Load a configuration from JSON, filling unspecified fields with
    /// defaults, and validate it.
    pub fn from_json(body: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(body)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.minor_unit_divisor == 0 {
            return Err(CartError::invalid_config("minor_unit_divisor must be non-zero"));
        }
        if self.runtime.max_flush_rounds == 0 {
            return Err(CartError::invalid_config("runtime.max_flush_rounds must be non-zero"));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_default_currency(mut self, currency: CurrencyCode) -> Self {
        self.default_currency = currency;
        self
    }

    #[must_use]
    pub fn with_minor_unit_divisor(mut self, divisor: u32) -> Self {
        self.minor_unit_divisor = divisor;
        self
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CartConfig::default();
        assert_eq!(config.default_currency.as_str(), "USD");
        assert_eq!(config.minor_unit_divisor, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_json_is_default() {
        assert_eq!(CartConfig::from_json("{}").unwrap(), CartConfig::default());
    }

    #[test]
    fn json_overrides() {
        let config = CartConfig::from_json(
            r#"{"default_currency": "eur", "runtime": {"max_flush_rounds": 8}}"#,
        )
        .unwrap();
        assert_eq!(config.default_currency.as_str(), "EUR");
        assert_eq!(config.minor_unit_divisor, 100);
        assert_eq!(config.runtime.max_flush_rounds, 8);
    }

    #[test]
    fn invalid_currency_rejected() {
        let err = CartConfig::from_json(r#"{"default_currency": "dollars"}"#).unwrap_err();
        assert!(matches!(err, CartError::Json(_)));
        assert!(err.to_string().contains("invalid currency code"));
    }

    #[test]
    fn zero_divisor_rejected() {
        let err = CartConfig::from_json(r#"{"minor_unit_divisor": 0}"#).unwrap_err();
        assert!(matches!(err, CartError::InvalidConfig { .. }));

        let err = CartConfig::from_json(r#"{"runtime": {"max_flush_rounds": 0}}"#).unwrap_err();
        assert!(matches!(err, CartError::InvalidConfig { .. }));
    }

    #[test]
    fn builders() {
        let config = CartConfig::default()
            .with_default_currency(CurrencyCode::parse("gbp").unwrap())
            .with_minor_unit_divisor(1000)
            .with_runtime(RuntimeConfig::default().with_max_flush_rounds(2));
        assert_eq!(config.default_currency.as_str(), "GBP");
        assert_eq!(config.minor_unit_divisor, 1000);
        assert_eq!(config.runtime.max_flush_rounds, 2);
    }
}
