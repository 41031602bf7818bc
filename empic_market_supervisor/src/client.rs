//! Consumer-side negotiation client.
//!
//! Host-facing orchestration around `empic_market_core`:
//! - runs the consumer's provider selection for a round
//! - opens escrow through a `RepairingEscrow` composed at construction
//! - gates delivered payloads with `accept` before `handle`
//!
//! No transport: delivery and settlement stay with the host.

use empic_market_core::{DeliveredPayload, EscrowResponse, Payload, ServiceAdvertisement};
use serde_json::{json, Value};
use tracing::{debug, info_span, Instrument};

use crate::capability::DataConsumer;
use crate::error::Result;
use crate::escrow::{EscrowInitiator, RepairingEscrow};

/// A provider chosen for this round together with its (repaired) escrow.
#[derive(Clone, Debug, PartialEq)]
pub struct Negotiated {
    pub service_id: String,
    pub escrow: EscrowResponse,
}

/// What happened to one delivered payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    /// Accepted and handled; carries the handler's record.
    Handled(Payload),
    /// Failed the consumer's acceptance rule and was discarded.
    Rejected,
}

#[derive(Debug)]
pub struct NegotiationClient<C, E> {
    consumer: C,
    escrow: RepairingEscrow<E>,
}

impl<C, E> NegotiationClient<C, E>
where
    C: DataConsumer,
    E: EscrowInitiator,
{
    /// The escrow initiator is always wrapped in [`RepairingEscrow`].
    pub fn new(consumer: C, escrow: E) -> Self {
        Self {
            consumer,
            escrow: RepairingEscrow::new(escrow),
        }
    }

    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    pub fn escrow(&self) -> &RepairingEscrow<E> {
        &self.escrow
    }

    /// Provider selection for one round.
    pub fn choose(&self, candidates: &[ServiceAdvertisement]) -> Vec<String> {
        let chosen = self.consumer.select_services(candidates);
        debug!(
            device_id = self.consumer.device_id(),
            service_tag = self.consumer.service_tag(),
            ?chosen,
            "selection round"
        );
        chosen
    }

    /// Object sent to the escrow initiator for `service_id`.
    pub fn service_info(&self, service_id: &str) -> Value {
        json!({
            "service_id": service_id,
            "request_params": Value::Object(self.consumer.request_params()),
        })
    }

    pub async fn open_escrow(&self, service_id: &str) -> Result<EscrowResponse> {
        let info = self.service_info(service_id);
        self.escrow.initiate_escrow(&info).await
    }

    /// Select a provider and open escrow with it. `None` skips the round.
    pub async fn negotiate(&self, candidates: &[ServiceAdvertisement]) -> Result<Option<Negotiated>> {
        let Some(service_id) = self.choose(candidates).into_iter().next() else {
            return Ok(None);
        };
        let escrow = self.open_escrow(&service_id).await?;
        Ok(Some(Negotiated { service_id, escrow }))
    }

    /// Gate a delivered payload and hand it to the consumer if accepted.
    pub async fn deliver(&self, payload: &DeliveredPayload) -> Result<Delivery> {
        let span = info_span!(
            "delivery",
            device_id = self.consumer.device_id(),
            escrow_id = %payload.escrow_id
        );
        if !span.in_scope(|| self.consumer.accept(&payload.data)) {
            return Ok(Delivery::Rejected);
        }
        let record = self.consumer.handle(payload).instrument(span).await?;
        Ok(Delivery::Handled(record))
    }
}
