use async_trait::async_trait;
use empic_market_core::{
    select_services, DeliveredPayload, Payload, RangeRule, SelectionPolicy,
    ServiceAdvertisement,
};
use serde_json::Value;
use tracing::debug;

use super::{accept_as, celsius_and_fahrenheit, log_snapshot};
use crate::capability::{DataConsumer, DataProvider};
use crate::config::{ConsumerConfig, WeatherServiceConfig};
use crate::error::{MarketError, Result};

pub const WEATHER_TAG: &str = "weather";

const FORECAST_ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";

/// Buys the cheapest weather service under its price ceiling and accepts
/// non-negative temperatures only.
#[derive(Clone, Debug)]
pub struct WeatherConsumer {
    device_id: String,
    policy: SelectionPolicy,
    rule: RangeRule,
    request_params: Payload,
}

impl WeatherConsumer {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self::from_config(&ConsumerConfig {
            device_id: device_id.into(),
            ..ConsumerConfig::default()
        })
    }

    pub fn from_config(cfg: &ConsumerConfig) -> Self {
        Self {
            device_id: cfg.device_id.clone(),
            policy: cfg.policy(WEATHER_TAG),
            rule: RangeRule::non_negative_temperature(),
            request_params: cfg.request_params.clone(),
        }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }
}

#[async_trait]
impl DataConsumer for WeatherConsumer {
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

    async fn handle(&self, payload: &DeliveredPayload) -> Result<Payload> {
        let mut record = payload.data.clone();
        record.insert("station".to_string(), Value::from(self.device_id.as_str()));
        log_snapshot("Received weather update:", &record);
        Ok(record)
    }
}

/// Coordinates for one current-weather lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeatherQuery {
    pub latitude: f64,
    pub longitude: f64,
}

impl WeatherQuery {
    /// Request-time `lat` / `lon` override the configured defaults.
    pub fn resolve(defaults: &WeatherServiceConfig, request_params: &Payload) -> Result<Self> {
        Ok(Self {
            latitude: coordinate(request_params, "lat", defaults.latitude)?,
            longitude: coordinate(request_params, "lon", defaults.longitude)?,
        })
    }

    pub fn forecast_url(&self) -> String {
        format!(
            "{FORECAST_ENDPOINT}?latitude={}&longitude={}&current_weather=true",
            self.latitude, self.longitude
        )
    }
}

// numbers and numeric strings are both accepted
fn coordinate(params: &Payload, name: &str, default: f64) -> Result<f64> {
    let invalid = |value: &Value| MarketError::InvalidRequestParam {
        name: name.to_string(),
        value: value.clone(),
    };
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v @ Value::Number(n)) => n.as_f64().ok_or_else(|| invalid(v)),
        Some(v @ Value::String(s)) => s.trim().parse::<f64>().map_err(|_| invalid(v)),
        Some(v) => Err(invalid(v)),
    }
}

/// Upstream current-weather lookup. Returns the `current_weather` object,
/// or an empty map when the upstream has none.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current_weather(&self, query: &WeatherQuery) -> Result<Payload>;
}

/// Provider side: current weather at the requested (or configured) location.
#[derive(Clone, Debug)]
pub struct WeatherService<W> {
    config: WeatherServiceConfig,
    source: W,
}

impl<W: WeatherSource> WeatherService<W> {
    pub fn new(config: WeatherServiceConfig, source: W) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &WeatherServiceConfig {
        &self.config
    }

    pub fn source(&self) -> &W {
        &self.source
    }
}

#[async_trait]
impl<W: WeatherSource> DataProvider for WeatherService<W> {
    async fn collect(&self, request_params: &Payload) -> Result<Payload> {
        let query = WeatherQuery::resolve(&self.config, request_params)?;
        debug!(url = %query.forecast_url(), "fetching current weather");
        self.source.current_weather(&query).await
    }

    /// Flattens the upstream record to the fields consumers read.
    fn process(&self, raw: &Payload, _request_params: &Payload) -> Payload {
        if raw.is_empty() {
            return Payload::new();
        }
        let field = |key: &str| raw.get(key).cloned().unwrap_or(Value::Null);
        let (celsius, fahrenheit) = celsius_and_fahrenheit(raw);

        let mut out = Payload::new();
        out.insert("temperature_c".to_string(), celsius);
        out.insert("temperature_f".to_string(), fahrenheit);
        out.insert("windspeed_kmh".to_string(), field("windspeed"));
        out.insert("winddirection_deg".to_string(), field("winddirection"));
        out.insert("timestamp".to_string(), field("time"));
        out
    }
}
