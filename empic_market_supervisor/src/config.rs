//! Device configuration, as handed over by the host framework.
//!
//! The host owns file loading; these types only describe the JSON it passes
//! in. Every field has a default so a partial config still builds a device.

use empic_market_core::{DeliveryMode, Payload, SelectionPolicy, DEFAULT_MAX_PRICE_USDC};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub device_id: String,
    /// Overrides the plugin's own service tag.
    pub service_tag: Option<String>,
    pub max_price_usdc: f64,
    pub delivery_mode: DeliveryMode,
    /// Forwarded with the escrow request to the provider's `collect`.
    pub request_params: Payload,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            device_id: "consumer".to_string(),
            service_tag: None,
            max_price_usdc: DEFAULT_MAX_PRICE_USDC,
            delivery_mode: DeliveryMode::Pull,
            request_params: Payload::new(),
        }
    }
}

impl ConsumerConfig {
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Selection policy for a plugin whose own tag is `default_tag`.
    pub fn policy(&self, default_tag: &str) -> SelectionPolicy {
        let tag = self.service_tag.as_deref().unwrap_or(default_tag);
        SelectionPolicy::new(tag)
            .with_max_price(self.max_price_usdc)
            .with_delivery_mode(self.delivery_mode)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherServiceConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl WeatherServiceConfig {
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
