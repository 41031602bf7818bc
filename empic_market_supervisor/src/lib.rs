//! empic_market_supervisor
//!
//! Host-facing layer around `empic_market_core`.
//!
//! Responsibilities:
//! - capability traits for consumer and provider plugins
//! - compose the escrow-repair decorator around the host's escrow call
//! - run selection, escrow initiation and acceptance-gated handling
//! - reference temperature and weather plugins
//!
//! Non-goals:
//! - no transport, retry or settlement (owned by the host)
//! - no config file loading

pub mod capability;
pub mod client;
pub mod config;
pub mod error;
pub mod escrow;
pub mod plugins;
pub mod telemetry;

pub use capability::{DataConsumer, DataProvider};
pub use client::{Delivery, NegotiationClient, Negotiated};
pub use config::{ConsumerConfig, WeatherServiceConfig};
pub use error::{MarketError, Result};
pub use escrow::{EscrowInitiator, RepairingEscrow};
pub use plugins::{
    TemperatureConsumer, TemperatureSensor, TemperatureService, WeatherConsumer, WeatherQuery,
    WeatherService, WeatherSource, TEMPERATURE_TAG, WEATHER_TAG,
};
pub use telemetry::init_tracing;
