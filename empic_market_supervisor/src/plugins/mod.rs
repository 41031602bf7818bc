//! Reference consumer and provider plugins.

pub mod temperature;
pub mod weather;

use empic_market_core::{AcceptanceRule, Payload};
use serde_json::Value;
use tracing::{info, info_span};

pub use temperature::{TemperatureConsumer, TemperatureSensor, TemperatureService, TEMPERATURE_TAG};
pub use weather::{WeatherConsumer, WeatherQuery, WeatherService, WeatherSource, WEATHER_TAG};

const BANNER: &str = "********************************";

/// Pretty-print a handled record between banners.
fn log_snapshot(title: &str, record: &Payload) {
    let pretty = serde_json::to_string_pretty(record).unwrap_or_default();
    info!("{BANNER}");
    info!("{title}");
    info!("{pretty}");
    info!("{BANNER}");
}

/// Evaluate `rule` inside a `consumer` span carrying `device_id`.
fn accept_as(device_id: &str, rule: &impl AcceptanceRule, data: &Payload) -> bool {
    info_span!("consumer", device_id = %device_id).in_scope(|| rule.accept(data))
}

/// `(temperature_c, temperature_f)` from a raw `temperature` reading.
/// Fahrenheit is `null` when the reading is missing or not a number.
fn celsius_and_fahrenheit(raw: &Payload) -> (Value, Value) {
    let celsius = raw.get("temperature").cloned().unwrap_or(Value::Null);
    let fahrenheit = celsius
        .as_f64()
        .map_or(Value::Null, |c| Value::from(c * 9.0 / 5.0 + 32.0));
    (celsius, fahrenheit)
}
