//! Negotiation client and plugin tests.
//!
//! Collaborators (escrow service, sensors, upstream weather) are small
//! in-test doubles implementing the boundary traits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use empic_market_core::{
    DeliveredPayload, DeliveryMode, EscrowKind, EscrowResponse, Payload, ServiceAdvertisement,
    DEFAULT_MAX_PRICE_USDC,
};
use empic_market_supervisor::*;
use serde_json::{json, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

struct ScriptedEscrow {
    response: EscrowResponse,
    calls: Mutex<Vec<Value>>,
}

impl ScriptedEscrow {
    fn new(response: EscrowResponse) -> Self {
        Self { response, calls: Mutex::new(Vec::new()) }
    }

    fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EscrowInitiator for ScriptedEscrow {
    async fn initiate_escrow(&self, service_info: &Value) -> Result<EscrowResponse> {
        self.calls.lock().unwrap().push(service_info.clone());
        Ok(self.response.clone())
    }
}

struct DownEscrow;

#[async_trait]
impl EscrowInitiator for DownEscrow {
    async fn initiate_escrow(&self, _service_info: &Value) -> Result<EscrowResponse> {
        Err(MarketError::Escrow("connection refused".into()))
    }
}

/// Wraps a real consumer and counts `handle` calls.
struct CountingConsumer {
    inner: TemperatureConsumer,
    handled: AtomicUsize,
}

#[async_trait]
impl DataConsumer for CountingConsumer {
    fn device_id(&self) -> &str {
        self.inner.device_id()
    }
    fn service_tag(&self) -> &str {
        self.inner.service_tag()
    }
    fn select_services(&self, candidates: &[ServiceAdvertisement]) -> Vec<String> {
        self.inner.select_services(candidates)
    }
    fn accept(&self, data: &Payload) -> bool {
        self.inner.accept(data)
    }
    async fn handle(&self, payload: &DeliveredPayload) -> Result<Payload> {
        self.handled.fetch_add(1, Ordering::SeqCst);
        self.inner.handle(payload).await
    }
}

struct FixedSensor(Option<f64>);

impl TemperatureSensor for FixedSensor {
    fn read_temperature(&self) -> Option<f64> {
        self.0
    }
}

struct StubWeather {
    current: Payload,
    queries: Mutex<Vec<WeatherQuery>>,
}

#[async_trait]
impl WeatherSource for StubWeather {
    async fn current_weather(&self, query: &WeatherQuery) -> Result<Payload> {
        self.queries.lock().unwrap().push(*query);
        Ok(self.current.clone())
    }
}

/// Remembers a span's `device_id` field.
struct DeviceId(String);

struct FieldText {
    name: &'static str,
    text: Option<String>,
}

impl FieldText {
    fn new(name: &'static str) -> Self {
        Self { name, text: None }
    }
}

impl Visit for FieldText {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == self.name {
            self.text = Some(format!("{value:?}"));
        }
    }
}

/// Captures each event's message with the nearest `device_id` in scope.
#[derive(Clone, Default)]
struct DeviceEvents(Arc<Mutex<Vec<(String, Option<String>)>>>);

impl DeviceEvents {
    fn seen(&self) -> Vec<(String, Option<String>)> {
        self.0.lock().unwrap().clone()
    }
}

impl<S> Layer<S> for DeviceEvents
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut device = FieldText::new("device_id");
        attrs.record(&mut device);
        if let (Some(text), Some(span)) = (device.text, ctx.span(id)) {
            span.extensions_mut().insert(DeviceId(text));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut message = FieldText::new("message");
        event.record(&mut message);
        let device = ctx.event_scope(event).and_then(|scope| {
            scope
                .into_iter()
                .find_map(|span| span.extensions().get::<DeviceId>().map(|d| d.0.clone()))
        });
        self.0.lock().unwrap().push((message.text.unwrap_or_default(), device));
    }
}

fn obj(v: Value) -> Payload {
    v.as_object().cloned().unwrap()
}

fn temperature_ads() -> Vec<ServiceAdvertisement> {
    serde_json::from_value(json!([
        {"service_id": "A", "tags": ["temperature"], "price_usdc": 0.40, "delivery_modes": ["pull"]},
        {"service_id": "B", "tags": ["temperature"], "price_usdc": 0.30, "delivery_modes": ["pull"]},
        {"service_id": "C", "tags": ["temperature"], "price_usdc": 0.10, "delivery_modes": ["pubsub"]},
    ]))
    .unwrap()
}

fn thermometer() -> TemperatureConsumer {
    let cfg = ConsumerConfig::from_value(json!({
        "device_id": "thermo-1",
        "request_params": {"unit": "c"}
    }))
    .unwrap();
    TemperatureConsumer::from_config(&cfg)
}

#[tokio::test]
async fn negotiate_selects_and_repairs_escrow() {
    let escrow = ScriptedEscrow::new(
        EscrowResponse::new()
            .with_variant(EscrowKind::Standard, json!({"escrow_id": null, "amount": 300000}))
            .with_field("status", json!("created")),
    );
    let client = NegotiationClient::new(thermometer(), escrow);

    let negotiated = client.negotiate(&temperature_ads()).await.unwrap().unwrap();
    assert_eq!(negotiated.service_id, "B");

    let id = negotiated.escrow.escrow_id(EscrowKind::Standard).unwrap();
    assert!(id.starts_with("standard:0x"));
    assert_eq!(id.len(), "standard:0x".len() + 32);
    assert!(negotiated.escrow.get("intent_escrow").is_none());
    assert_eq!(negotiated.escrow.get("status"), Some(&json!("created")));

    let calls = client.escrow().inner().calls();
    assert_eq!(calls, vec![json!({"service_id": "B", "request_params": {"unit": "c"}})]);
}

#[tokio::test]
async fn decorator_returns_the_host_initiator() {
    let escrow = RepairingEscrow::new(ScriptedEscrow::new(
        EscrowResponse::new().with_variant(EscrowKind::Standard, json!({})),
    ));
    let info = json!({"service_id": "A", "request_params": {}});
    let resp = escrow.initiate_escrow(&info).await.unwrap();
    assert!(resp.is_complete());

    let host = escrow.into_inner();
    assert_eq!(host.calls(), vec![info]);
    // the host's canned response was never modified
    assert_eq!(host.response.escrow_id(EscrowKind::Standard), None);
}

#[tokio::test]
async fn nothing_eligible_skips_escrow() {
    let escrow = ScriptedEscrow::new(EscrowResponse::new());
    let client = NegotiationClient::new(TemperatureConsumer::new("t"), escrow);

    let pricey = vec![ServiceAdvertisement::new("X", 0.90).with_tag("temperature")];
    assert!(client.negotiate(&pricey).await.unwrap().is_none());
    assert!(client.negotiate(&[]).await.unwrap().is_none());
    assert!(client.escrow().inner().calls().is_empty());
}

#[tokio::test]
async fn escrow_failure_propagates() {
    let client = NegotiationClient::new(thermometer(), DownEscrow);
    let err = client.negotiate(&temperature_ads()).await.unwrap_err();
    assert!(matches!(err, MarketError::Escrow(_)));
}

#[tokio::test]
async fn genuine_escrow_ids_pass_through() {
    let escrow = ScriptedEscrow::new(
        EscrowResponse::new()
            .with_variant(EscrowKind::Standard, json!({"escrow_id": "0xe84f445c3d0a49a78fd2ae4c2d6627d1"}))
            .with_variant(EscrowKind::Intent, json!({"escrow_id": ""})),
    );
    let client = NegotiationClient::new(thermometer(), escrow);
    let resp = client.open_escrow("B").await.unwrap();

    assert_eq!(resp.escrow_id(EscrowKind::Standard), Some("0xe84f445c3d0a49a78fd2ae4c2d6627d1"));
    assert!(resp.escrow_id(EscrowKind::Intent).unwrap().starts_with("intent:0x"));
}

#[tokio::test]
async fn concurrent_escrows_get_distinct_ids() {
    let escrow = Arc::new(ScriptedEscrow::new(
        EscrowResponse::new().with_variant(EscrowKind::Intent, json!({})),
    ));
    let client = NegotiationClient::new(thermometer(), Arc::clone(&escrow));

    let (a, b) = tokio::join!(client.open_escrow("A"), client.open_escrow("B"));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.escrow_id(EscrowKind::Intent), b.escrow_id(EscrowKind::Intent));
    assert_eq!(escrow.calls().len(), 2);
}

#[tokio::test]
async fn accepted_payload_is_handled_and_tagged() {
    let client = NegotiationClient::new(thermometer(), DownEscrow);
    let payload = DeliveredPayload::new(
        obj(json!({"temperature_c": 37.5, "temperature_f": 99.5, "timestamp": "2025-01-01 10:00:00"})),
        "standard:0x00000000000000000000000000000001",
    );

    let Delivery::Handled(record) = client.deliver(&payload).await.unwrap() else {
        panic!("expected the payload to be handled");
    };
    assert_eq!(record["sensor_id"], json!("thermo-1"));
    assert_eq!(record["escrow_id"], json!("standard:0x00000000000000000000000000000001"));
    assert_eq!(record["temperature_c"], json!(37.5));
    // the delivered payload itself is left alone
    assert!(payload.data.get("sensor_id").is_none());
}

#[tokio::test]
async fn rejected_payload_never_reaches_handle() {
    let consumer = CountingConsumer { inner: thermometer(), handled: AtomicUsize::new(0) };
    let client = NegotiationClient::new(consumer, DownEscrow);

    for data in [json!({"temperature_c": 43.0}), json!({"temperature_c": null}), json!({})] {
        let payload = DeliveredPayload::new(obj(data), "e1");
        assert_eq!(client.deliver(&payload).await.unwrap(), Delivery::Rejected);
    }
    assert_eq!(client.consumer().handled.load(Ordering::SeqCst), 0);

    let ok = DeliveredPayload::new(obj(json!({"temperature_c": 36.6})), "e2");
    assert!(matches!(client.deliver(&ok).await.unwrap(), Delivery::Handled(_)));
    assert_eq!(client.consumer().handled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn weather_consumer_flow() {
    let ads: Vec<ServiceAdvertisement> = serde_json::from_value(json!([
        {"service_id": "nyc", "tags": ["weather"], "price_usdc": 0.25},
        {"service_id": "cheap-temp", "tags": ["temperature"], "price_usdc": 0.01},
        {"service_id": "bos", "tags": ["weather"], "price_usdc": 0.25, "delivery_modes": ["pull", "pubsub"]},
    ]))
    .unwrap();
    let client = NegotiationClient::new(
        WeatherConsumer::new("station-9"),
        ScriptedEscrow::new(EscrowResponse::new()),
    );
    assert_eq!(client.choose(&ads), vec!["nyc".to_string()]);
    assert_eq!(client.consumer().policy().service_tag, "weather");
    assert_eq!(client.consumer().policy().max_price_usdc, DEFAULT_MAX_PRICE_USDC);

    let cold = DeliveredPayload::new(obj(json!({"temperature_c": -3.0})), "e");
    assert_eq!(client.deliver(&cold).await.unwrap(), Delivery::Rejected);

    let mild = DeliveredPayload::new(obj(json!({"temperature_c": 12.0})), "e");
    let Delivery::Handled(record) = client.deliver(&mild).await.unwrap() else {
        panic!("expected the payload to be handled");
    };
    assert_eq!(record["station"], json!("station-9"));
    assert!(record.get("escrow_id").is_none());
}

#[tokio::test]
async fn temperature_service_produces_both_scales() {
    let service = TemperatureService::new(FixedSensor(Some(38.0)));
    let data = service.produce(&Payload::new()).await.unwrap();
    assert_eq!(data["temperature_c"], json!(38.0));
    assert!((data["temperature_f"].as_f64().unwrap() - 100.4).abs() < 1e-9);
    assert!(data["timestamp"].is_string());

    let broken = TemperatureService::new(FixedSensor(None));
    let data = broken.produce(&Payload::new()).await.unwrap();
    assert_eq!(data["temperature_c"], Value::Null);
    assert_eq!(data["temperature_f"], Value::Null);
    assert!(!TemperatureConsumer::new("t").accept(&data));
}

#[tokio::test]
async fn weather_service_resolves_location() {
    let source = StubWeather {
        current: obj(json!({
            "temperature": 20.0,
            "windspeed": 11.2,
            "winddirection": 270,
            "time": "2025-06-01T12:00"
        })),
        queries: Mutex::new(Vec::new()),
    };
    let cfg = WeatherServiceConfig { latitude: 40.7128, longitude: -74.006 };
    let service = WeatherService::new(cfg, source);
    assert_eq!(service.config().latitude, 40.7128);

    let data = service.produce(&obj(json!({"lat": "51.5", "lon": -0.12}))).await.unwrap();
    assert_eq!(data["temperature_c"], json!(20.0));
    assert_eq!(data["temperature_f"], json!(68.0));
    assert_eq!(data["windspeed_kmh"], json!(11.2));
    assert_eq!(data["winddirection_deg"], json!(270));
    assert_eq!(data["timestamp"], json!("2025-06-01T12:00"));

    service.produce(&Payload::new()).await.unwrap();

    let err = service.produce(&obj(json!({"lat": "north"}))).await.unwrap_err();
    assert!(matches!(err, MarketError::InvalidRequestParam { ref name, .. } if name == "lat"));

    let queries = service.source().queries.lock().unwrap().clone();
    assert_eq!(queries[0], WeatherQuery { latitude: 51.5, longitude: -0.12 });
    assert_eq!(queries[1], WeatherQuery { latitude: 40.7128, longitude: -74.006 });
    assert_eq!(queries.len(), 2);
}

#[tokio::test]
async fn empty_upstream_record_stays_empty() {
    let source = StubWeather { current: Payload::new(), queries: Mutex::new(Vec::new()) };
    let service = WeatherService::new(WeatherServiceConfig::default(), source);
    assert!(service.produce(&Payload::new()).await.unwrap().is_empty());
}

#[test]
fn consumer_policy_follows_config() {
    let cfg = ConsumerConfig::from_value(json!({
        "service_tag": "body-temperature",
        "max_price_usdc": 0.2,
        "delivery_mode": "pubsub"
    }))
    .unwrap();
    let policy = TemperatureConsumer::from_config(&cfg).policy().clone();
    assert_eq!(policy.service_tag, "body-temperature");
    assert_eq!(policy.max_price_usdc, 0.2);
    assert_eq!(policy.preferred_delivery_mode, DeliveryMode::Pubsub);

    assert_eq!(thermometer().policy().service_tag, TEMPERATURE_TAG);
}

#[test]
fn direct_rejections_name_the_consumer() {
    let events = DeviceEvents::default();
    let subscriber = tracing_subscriber::registry().with(events.clone());
    tracing::subscriber::with_default(subscriber, || {
        assert!(!thermometer().accept(&obj(json!({"temperature_f": 99.5}))));
        assert!(!WeatherConsumer::new("station-9").accept(&obj(json!({"temperature_c": -1.0}))));
        assert!(WeatherConsumer::new("station-9").accept(&obj(json!({"temperature_c": 1.0}))));
    });

    assert_eq!(
        events.seen(),
        vec![
            ("field missing in data".to_string(), Some("thermo-1".to_string())),
            ("invalid value in data".to_string(), Some("station-9".to_string())),
        ]
    );
}

#[test]
fn forecast_url_shape() {
    let q = WeatherQuery { latitude: 40.7128, longitude: -74.006 };
    assert_eq!(
        q.forecast_url(),
        "https://api.open-meteo.com/v1/forecast?latitude=40.7128&longitude=-74.006&current_weather=true"
    );
}
