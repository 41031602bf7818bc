//! Escrow response repair.
//!
//! The escrow service may answer with a well-formed response whose
//! `escrow_id` is `null` or empty for one or both variants. Delivery and
//! settlement are correlated by that identifier, so every present variant is
//! given a surrogate before the response reaches consumer code:
//!
//! `"<kind>:0x" + 32 lowercase hex digits` from a uniformly random `u128`.
//!
//! Existing non-empty identifiers, other fields and unrelated top-level keys
//! are never touched.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ESCROW_ID_FIELD: &str = "escrow_id";

/// The two escrow variants a response can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowKind {
    Standard,
    Intent,
}

impl EscrowKind {
    pub const ALL: [EscrowKind; 2] = [EscrowKind::Standard, EscrowKind::Intent];

    /// Top-level key of this variant in a response.
    pub const fn key(self) -> &'static str {
        match self {
            EscrowKind::Standard => "standard_escrow",
            EscrowKind::Intent => "intent_escrow",
        }
    }

    /// Prefix used for surrogate identifiers.
    pub const fn prefix(self) -> &'static str {
        match self {
            EscrowKind::Standard => "standard",
            EscrowKind::Intent => "intent",
        }
    }
}

/// Raw escrow response. Unknown keys are carried through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EscrowResponse(Map<String, Value>);

impl EscrowResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn with_variant(self, kind: EscrowKind, record: Value) -> Self {
        self.with_field(kind.key(), record)
    }

    /// The variant object, if present and an object.
    pub fn variant(&self, kind: EscrowKind) -> Option<&Map<String, Value>> {
        self.0.get(kind.key()).and_then(Value::as_object)
    }

    /// Non-empty identifier of a variant.
    pub fn escrow_id(&self, kind: EscrowKind) -> Option<&str> {
        self.variant(kind)
            .and_then(|v| v.get(ESCROW_ID_FIELD))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// True when no present object variant lacks an identifier.
    pub fn is_complete(&self) -> bool {
        EscrowKind::ALL
            .iter()
            .filter_map(|k| self.variant(*k))
            .all(|v| !needs_escrow_id(v))
    }
}

impl fmt::Display for EscrowResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("{..}"),
        }
    }
}

/// A surrogate identifier written into one variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedId {
    pub kind: EscrowKind,
    pub escrow_id: String,
}

/// What a repair pass changed. Empty when the response was already complete.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub generated: Vec<GeneratedId>,
}

impl RepairReport {
    #[inline]
    pub fn is_patched(&self) -> bool {
        !self.generated.is_empty()
    }
}

/// `null`, `""` and absent all count as missing.
fn needs_escrow_id(record: &Map<String, Value>) -> bool {
    match record.get(ESCROW_ID_FIELD) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

pub fn surrogate_escrow_id<R: Rng + ?Sized>(kind: EscrowKind, rng: &mut R) -> String {
    format!("{}:0x{:032x}", kind.prefix(), rng.gen::<u128>())
}

/// Fill missing identifiers in place using `rng`.
pub fn repair_in_place_with_rng<R: Rng + ?Sized>(response: &mut EscrowResponse, rng: &mut R) -> RepairReport {
    let mut report = RepairReport::default();
    for kind in EscrowKind::ALL {
        let Some(Value::Object(record)) = response.0.get_mut(kind.key()) else {
            continue;
        };
        if !needs_escrow_id(record) {
            continue;
        }
        let escrow_id = surrogate_escrow_id(kind, rng);
        record.insert(ESCROW_ID_FIELD.to_string(), Value::String(escrow_id.clone()));
        report.generated.push(GeneratedId { kind, escrow_id });
    }
    report
}

/// Fill missing identifiers in place from the thread-local RNG.
pub fn repair_in_place(response: &mut EscrowResponse) -> RepairReport {
    repair_in_place_with_rng(response, &mut rand::thread_rng())
}

pub fn repair_with_rng<R: Rng + ?Sized>(mut response: EscrowResponse, rng: &mut R) -> EscrowResponse {
    repair_in_place_with_rng(&mut response, rng);
    response
}

/// Return `response` with every present variant carrying a non-empty `escrow_id`.
pub fn repair(response: EscrowResponse) -> EscrowResponse {
    repair_with_rng(response, &mut rand::thread_rng())
}

/// [`repair`] over an untyped value. Non-object values are returned unchanged.
pub fn repair_value(value: Value) -> Value {
    match value {
        Value::Object(map) => repair(EscrowResponse(map)).into_value(),
        other => other,
    }
}
