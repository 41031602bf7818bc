//! Extension points for device plugins.
//!
//! The negotiation client stays closed; plugins implement one of these
//! capability traits:
//! - `DataConsumer`: select a provider, gate delivered data, handle it
//! - `DataProvider`: collect raw data, process it for delivery
//!
//! Retry, backoff, caching and delivery belong to the host and are not
//! modelled here.

use async_trait::async_trait;
use empic_market_core::{DeliveredPayload, Payload, ServiceAdvertisement};

use crate::error::Result;

#[async_trait]
pub trait DataConsumer: Send + Sync {
    /// Identifier of the device running this consumer.
    fn device_id(&self) -> &str;

    /// Tag of the services this consumer buys.
    fn service_tag(&self) -> &str;

    /// Choose at most one provider for this round. Empty means skip.
    fn select_services(&self, candidates: &[ServiceAdvertisement]) -> Vec<String>;

    /// Parameters sent with the escrow request and forwarded to the provider.
    fn request_params(&self) -> Payload {
        Payload::new()
    }

    /// Gate on the provider's processed data.
    fn accept(&self, data: &Payload) -> bool;

    /// React to accepted data. Only called after `accept` returned true.
    ///
    /// Returns the record the consumer produced from the payload.
    async fn handle(&self, payload: &DeliveredPayload) -> Result<Payload>;
}

#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Perform exactly one fetch of raw data.
    async fn collect(&self, request_params: &Payload) -> Result<Payload>;

    /// Normalise raw data before delivery. Identity by default.
    fn process(&self, raw: &Payload, _request_params: &Payload) -> Payload {
        raw.clone()
    }

    /// One `collect` followed by `process`.
    async fn produce(&self, request_params: &Payload) -> Result<Payload> {
        let raw = self.collect(request_params).await?;
        Ok(self.process(&raw, request_params))
    }
}
