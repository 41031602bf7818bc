use async_trait::async_trait;
use chrono::Local;
use empic_market_core::{
    select_services, DeliveredPayload, Payload, RangeRule, SelectionPolicy,
    ServiceAdvertisement,
};
use serde_json::Value;

use super::{accept_as, celsius_and_fahrenheit, log_snapshot};
use crate::capability::{DataConsumer, DataProvider};
use crate::config::ConsumerConfig;
use crate::error::Result;

pub const TEMPERATURE_TAG: &str = "temperature";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Buys the cheapest temperature service under its price ceiling and accepts
/// readings in `[25.0, 43.0)` °C.
#[derive(Clone, Debug)]
pub struct TemperatureConsumer {
    device_id: String,
    policy: SelectionPolicy,
    rule: RangeRule,
    request_params: Payload,
}

impl TemperatureConsumer {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self::from_config(&ConsumerConfig {
            device_id: device_id.into(),
            ..ConsumerConfig::default()
        })
    }

    pub fn from_config(cfg: &ConsumerConfig) -> Self {
        Self {
            device_id: cfg.device_id.clone(),
            policy: cfg.policy(TEMPERATURE_TAG),
            rule: RangeRule::body_temperature(),
            request_params: cfg.request_params.clone(),
        }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }
}

#[async_trait]
impl DataConsumer for TemperatureConsumer {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn service_tag(&self) -> &str {
        &self.policy.service_tag
    }

    fn select_services(&self, candidates: &[ServiceAdvertisement]) -> Vec<String> {
        select_services(candidates, &self.policy)
    }

    fn request_params(&self) -> Payload {
        self.request_params.clone()
    }

    fn accept(&self, data: &Payload) -> bool {
        accept_as(&self.device_id, &self.rule, data)
    }

    /// Tags the reading with this sensor and the escrow it was paid through.
    async fn handle(&self, payload: &DeliveredPayload) -> Result<Payload> {
        let mut record = payload.data.clone();
        record.insert("sensor_id".to_string(), Value::from(self.device_id.as_str()));
        record.insert("escrow_id".to_string(), Value::from(payload.escrow_id.as_str()));
        log_snapshot("Received temperature update:", &record);
        Ok(record)
    }
}

/// Source of raw temperature readings. `None` when the sensor has no value.
pub trait TemperatureSensor: Send + Sync {
    fn read_temperature(&self) -> Option<f64>;
}

/// Provider side: one sensor read per request, reported in °C and °F.
#[derive(Clone, Debug)]
pub struct TemperatureService<S> {
    sensor: S,
}

impl<S: TemperatureSensor> TemperatureService<S> {
    pub fn new(sensor: S) -> Self {
        Self { sensor }
    }
}

#[async_trait]
impl<S: TemperatureSensor> DataProvider for TemperatureService<S> {
    async fn collect(&self, _request_params: &Payload) -> Result<Payload> {
        let mut raw = Payload::new();
        raw.insert(
            "temperature".to_string(),
            self.sensor.read_temperature().map_or(Value::Null, Value::from),
        );
        raw.insert(
            "time".to_string(),
            Value::from(Local::now().format(TIMESTAMP_FORMAT).to_string()),
        );
        Ok(raw)
    }

    fn process(&self, raw: &Payload, _request_params: &Payload) -> Payload {
        if raw.is_empty() {
            return Payload::new();
        }
        let (celsius, fahrenheit) = celsius_and_fahrenheit(raw);
        let mut out = Payload::new();
        out.insert("temperature_c".to_string(), celsius);
        out.insert("temperature_f".to_string(), fahrenheit);
        out.insert("timestamp".to_string(), raw.get("time").cloned().unwrap_or(Value::Null));
        out
    }
}
