use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Processed data as delivered by a provider.
pub type Payload = Map<String, Value>;

pub const TEMPERATURE_FIELD: &str = "temperature_c";

pub const BODY_TEMPERATURE_MIN_C: f64 = 25.0;
pub const BODY_TEMPERATURE_MAX_C: f64 = 43.0;

/// Outcome of checking one payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Accepted,
    /// Field absent or `null`.
    Missing { field: String },
    /// Field present but outside the accepted range (or not a number).
    OutOfRange { field: String, value: Value },
}

impl Verdict {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Domain-specific gate on delivered data.
///
/// Implementations must be pure: no I/O, no shared state.
pub trait AcceptanceRule {
    fn evaluate(&self, payload: &Payload) -> Verdict;

    /// Evaluate and emit a diagnostic event on rejection.
    fn accept(&self, payload: &Payload) -> bool {
        match self.evaluate(payload) {
            Verdict::Accepted => true,
            Verdict::Missing { field } => {
                let shown = Value::Object(payload.clone());
                tracing::info!(%field, payload = %shown, "field missing in data");
                false
            }
            Verdict::OutOfRange { field, value } => {
                tracing::info!(%field, %value, "invalid value in data");
                false
            }
        }
    }
}

/// Accepts a payload when one numeric field lies in `[min_inclusive, max_exclusive)`.
/// Either bound may be open.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeRule {
    pub field: String,
    pub min_inclusive: Option<f64>,
    pub max_exclusive: Option<f64>,
}

impl RangeRule {
    /// Temperature-domain rule: `temperature_c` in `[25.0, 43.0)`.
    pub fn body_temperature() -> Self {
        Self {
            field: TEMPERATURE_FIELD.to_string(),
            min_inclusive: Some(BODY_TEMPERATURE_MIN_C),
            max_exclusive: Some(BODY_TEMPERATURE_MAX_C),
        }
    }

    /// Weather-domain rule: `temperature_c >= 0`.
    pub fn non_negative_temperature() -> Self {
        Self {
            field: TEMPERATURE_FIELD.to_string(),
            min_inclusive: Some(0.0),
            max_exclusive: None,
        }
    }

    #[inline]
    pub fn contains(&self, v: f64) -> bool {
        let above = self.min_inclusive.map_or(true, |lo| v >= lo);
        let below = self.max_exclusive.map_or(true, |hi| v < hi);
        above && below
    }
}

impl AcceptanceRule for RangeRule {
    fn evaluate(&self, payload: &Payload) -> Verdict {
        let value = match payload.get(&self.field) {
            None | Some(Value::Null) => {
                return Verdict::Missing { field: self.field.clone() };
            }
            Some(v) => v,
        };
        match value.as_f64() {
            Some(v) if self.contains(v) => Verdict::Accepted,
            _ => Verdict::OutOfRange {
                field: self.field.clone(),
                value: value.clone(),
            },
        }
    }
}
