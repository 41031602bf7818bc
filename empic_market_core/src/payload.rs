use serde::{Deserialize, Serialize};

use crate::accept::Payload;

/// Final artifact handed to a consumer once delivery and settlement are done.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveredPayload {
    #[serde(default)]
    pub data: Payload,
    pub escrow_id: String,
}

impl DeliveredPayload {
    pub fn new(data: Payload, escrow_id: impl Into<String>) -> Self {
        Self {
            data,
            escrow_id: escrow_id.into(),
        }
    }
}
