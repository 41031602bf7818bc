//! Escrow initiation and the identifier-repairing decorator.

use std::sync::Arc;

use async_trait::async_trait;
use empic_market_core::{repair_in_place, EscrowResponse};
use serde_json::Value;
use tracing::info;

use crate::error::Result;

/// The host's escrow-initiation call.
#[async_trait]
pub trait EscrowInitiator: Send + Sync {
    async fn initiate_escrow(&self, service_info: &Value) -> Result<EscrowResponse>;
}

#[async_trait]
impl<T: EscrowInitiator + ?Sized> EscrowInitiator for Arc<T> {
    async fn initiate_escrow(&self, service_info: &Value) -> Result<EscrowResponse> {
        (**self).initiate_escrow(service_info).await
    }
}

/// Wraps an [`EscrowInitiator`] so every response it yields carries a
/// non-empty `escrow_id` for each present variant.
///
/// The wrapped initiator is unaware of the repair. Stateless and reentrant:
/// concurrent calls share nothing but the inner initiator.
#[derive(Clone, Debug)]
pub struct RepairingEscrow<E> {
    inner: E,
}

impl<E> RepairingEscrow<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

#[async_trait]
impl<E: EscrowInitiator> EscrowInitiator for RepairingEscrow<E> {
    async fn initiate_escrow(&self, service_info: &Value) -> Result<EscrowResponse> {
        let mut response = self.inner.initiate_escrow(service_info).await?;
        info!(%response, "original escrow response");

        let report = repair_in_place(&mut response);
        for generated in &report.generated {
            info!(kind = generated.kind.key(), escrow_id = %generated.escrow_id, "generated escrow id");
        }
        if report.is_patched() {
            info!(%response, "patched escrow response");
        }
        Ok(response)
    }
}
