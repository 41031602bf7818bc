use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Price marker for advertisements whose price is missing or unusable.
///
/// Infinite, so it never satisfies a `<= max_price` filter.
pub const USDC_INVALID_PRICE: f64 = f64::INFINITY;

fn invalid_price() -> f64 {
    USDC_INVALID_PRICE
}

/// A provider's published offer for one tagged data service.
///
/// Records come straight from the registry snapshot, so deserialisation never
/// rejects a record for a bad `tags`, `delivery_modes` or `price_usdc` field.
/// Absent or `null` collections become empty, malformed tags are dropped and
/// an unusable price becomes [`USDC_INVALID_PRICE`]. Malformed delivery modes
/// are kept as their JSON text, so they match no [`DeliveryMode`].
///
/// [`DeliveryMode`]: crate::DeliveryMode
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceAdvertisement {
    #[serde(default)]
    pub service_id: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub tags: Vec<String>,
    #[serde(default = "invalid_price", deserialize_with = "lenient_price")]
    pub price_usdc: f64,
    #[serde(default, deserialize_with = "lenient_modes")]
    pub delivery_modes: Vec<String>,
}

impl ServiceAdvertisement {
    /// Convenience constructor with no tags and no declared delivery modes.
    pub fn new(service_id: impl Into<String>, price_usdc: f64) -> Self {
        Self {
            service_id: service_id.into(),
            tags: Vec::new(),
            price_usdc,
            delivery_modes: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_delivery_mode(mut self, mode: impl Into<String>) -> Self {
        self.delivery_modes.push(mode.into());
        self
    }

    /// True when the price is a usable, non-negative amount.
    #[inline]
    pub fn has_valid_price(&self) -> bool {
        self.price_usdc.is_finite() && self.price_usdc >= 0.0
    }

    #[inline]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Parse a registry snapshot. Entries that are not objects are dropped.
pub fn parse_candidates(snapshot: &Value) -> Vec<ServiceAdvertisement> {
    match snapshot {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| ServiceAdvertisement::deserialize(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn lenient_strings<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(d)?;
    Ok(match raw {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

// An empty list means "pull only", so anything present but unreadable must
// stay non-empty.
fn lenient_modes<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(d)?;
    Ok(match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Some(other) => vec![other.to_string()],
    })
}

fn lenient_price<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite() && *p >= 0.0)
        .unwrap_or(USDC_INVALID_PRICE))
}
