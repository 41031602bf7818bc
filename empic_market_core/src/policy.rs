use std::fmt;

use serde::{Deserialize, Serialize};

/// Price ceiling used by the reference consumers.
pub const DEFAULT_MAX_PRICE_USDC: f64 = 0.50;

/// Transport discipline for data delivery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Consumer requests.
    #[default]
    Pull,
    /// Provider pushes.
    Pubsub,
}

impl DeliveryMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Pull => "pull",
            DeliveryMode::Pubsub => "pubsub",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-consumer selection constraints. Built once at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    pub service_tag: String,
    pub max_price_usdc: f64,
    #[serde(default)]
    pub preferred_delivery_mode: DeliveryMode,
}

impl SelectionPolicy {
    pub fn new(service_tag: impl Into<String>) -> Self {
        Self {
            service_tag: service_tag.into(),
            max_price_usdc: DEFAULT_MAX_PRICE_USDC,
            preferred_delivery_mode: DeliveryMode::default(),
        }
    }

    pub fn with_max_price(mut self, max_price_usdc: f64) -> Self {
        self.max_price_usdc = max_price_usdc;
        self
    }

    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.preferred_delivery_mode = mode;
        self
    }
}
