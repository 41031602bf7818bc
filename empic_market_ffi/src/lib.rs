#![allow(clippy::missing_safety_doc)]

//! C ABI for hosts that are not written in Rust.
//!
//! Structured values cross the boundary as UTF-8 JSON. Buffers returned by
//! this library are owned by the caller and must be released with
//! `empic_market_bytes_free`; consumer handles with
//! `empic_market_consumer_free`.

use std::ptr;

use empic_market_core::{parse_candidates, repair_value, Payload};
use empic_market_supervisor::{
    init_tracing, ConsumerConfig, DataConsumer, TemperatureConsumer, WeatherConsumer,
};
use serde_json::Value;

/// FFI ABI version for empic_market_ffi.
///
/// Bump this when any `#[repr(C)]` struct layout or exported function signature changes.
pub const EMPIC_MARKET_FFI_VERSION: u32 = 1;

/// Domain codes accepted by `empic_market_consumer_new`.
pub const EMPIC_DOMAIN_TEMPERATURE: u32 = 0;
pub const EMPIC_DOMAIN_WEATHER: u32 = 1;

/// Return codes of `empic_market_accept`.
pub const EMPIC_ACCEPTED: i32 = 1;
pub const EMPIC_REJECTED: i32 = 0;
pub const EMPIC_ERR_ARG: i32 = -1;
pub const EMPIC_ERR_PAYLOAD: i32 = -2;

#[no_mangle]
pub extern "C" fn empic_market_ffi_version() -> u32 {
    EMPIC_MARKET_FFI_VERSION
}

/// Opaque consumer handle exposed over FFI.
pub struct MarketConsumer {
    inner: Box<dyn DataConsumer>,
}

/// FFI string view (UTF-8 bytes).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct MarketStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl MarketStr {
    unsafe fn as_str(&self) -> Option<&str> {
        if self.ptr.is_null() {
            return None;
        }
        let bytes = std::slice::from_raw_parts(self.ptr, self.len);
        std::str::from_utf8(bytes).ok()
    }

    unsafe fn parse_json(&self) -> Option<Value> {
        serde_json::from_str(self.as_str()?).ok()
    }
}

/// Owned byte buffer (UTF-8 JSON). Null `ptr` signals failure.
#[repr(C)]
pub struct MarketBytes {
    pub ptr: *mut u8,
    pub len: usize,
}

impl MarketBytes {
    fn null() -> Self {
        MarketBytes { ptr: ptr::null_mut(), len: 0 }
    }

    fn from_json(value: &Value) -> Self {
        let buf = match serde_json::to_vec(value) {
            Ok(buf) => buf,
            Err(err) => {
                tracing::warn!(%err, "failed to encode ffi response");
                return Self::null();
            }
        };
        let mut boxed = buf.into_boxed_slice();
        let ptr = boxed.as_mut_ptr();
        let len = boxed.len();
        // Leak to caller; freed by empic_market_bytes_free
        std::mem::forget(boxed);
        MarketBytes { ptr, len }
    }
}

#[no_mangle]
pub unsafe extern "C" fn empic_market_bytes_free(b: MarketBytes) {
    if !b.ptr.is_null() {
        let slice_ptr = std::ptr::slice_from_raw_parts_mut(b.ptr, b.len);
        drop(Box::from_raw(slice_ptr));
    }
}

/// Install the `RUST_LOG`-filtered log subscriber. Returns 1 if installed,
/// 0 if the process already had one.
#[no_mangle]
pub extern "C" fn empic_market_init_logging() -> u8 {
    init_tracing() as u8
}

/// Create a consumer for `domain` from a JSON `ConsumerConfig`.
///
/// A null or empty config uses defaults. Returns null on an unknown domain or
/// a config that is not UTF-8 JSON describing a valid `ConsumerConfig`.
#[no_mangle]
pub unsafe extern "C" fn empic_market_consumer_new(domain: u32, config_json: MarketStr) -> *mut MarketConsumer {
    let cfg = if config_json.ptr.is_null() || config_json.len == 0 {
        ConsumerConfig::default()
    } else {
        let Some(s) = config_json.as_str() else {
            tracing::warn!(len = config_json.len, "consumer config is not UTF-8");
            return ptr::null_mut();
        };
        match serde_json::from_str::<Value>(s).map(ConsumerConfig::from_value) {
            Ok(Ok(cfg)) => cfg,
            Ok(Err(err)) => {
                tracing::warn!(%err, "rejected consumer config");
                return ptr::null_mut();
            }
            Err(err) => {
                tracing::warn!(%err, "consumer config is not JSON");
                return ptr::null_mut();
            }
        }
    };

    let inner: Box<dyn DataConsumer> = match domain {
        EMPIC_DOMAIN_TEMPERATURE => Box::new(TemperatureConsumer::from_config(&cfg)),
        EMPIC_DOMAIN_WEATHER => Box::new(WeatherConsumer::from_config(&cfg)),
        _ => return ptr::null_mut(),
    };
    Box::into_raw(Box::new(MarketConsumer { inner }))
}

#[no_mangle]
pub unsafe extern "C" fn empic_market_consumer_free(h: *mut MarketConsumer) {
    if !h.is_null() {
        drop(Box::from_raw(h));
    }
}

/// Select a provider from a JSON array of advertisements.
///
/// Returns a JSON array with at most one `service_id`; `[]` skips the round.
#[no_mangle]
pub unsafe extern "C" fn empic_market_select(h: *const MarketConsumer, candidates_json: MarketStr) -> MarketBytes {
    if h.is_null() {
        return MarketBytes::null();
    }
    let handle = &*h;
    let Some(snapshot) = candidates_json.parse_json() else {
        return MarketBytes::null();
    };
    let candidates = parse_candidates(&snapshot);
    let chosen = handle.inner.select_services(&candidates);
    MarketBytes::from_json(&Value::from(chosen))
}

/// Check a provider's processed data against the consumer's acceptance rule.
#[no_mangle]
pub unsafe extern "C" fn empic_market_accept(h: *const MarketConsumer, payload_json: MarketStr) -> i32 {
    if h.is_null() {
        return EMPIC_ERR_ARG;
    }
    let handle = &*h;
    let Some(value) = payload_json.parse_json() else {
        return EMPIC_ERR_ARG;
    };
    let Value::Object(data) = value else {
        return EMPIC_ERR_PAYLOAD;
    };
    if handle.inner.accept(&data) {
        EMPIC_ACCEPTED
    } else {
        EMPIC_REJECTED
    }
}

/// Request parameters to include with the escrow request (JSON object).
#[no_mangle]
pub unsafe extern "C" fn empic_market_request_params(h: *const MarketConsumer) -> MarketBytes {
    if h.is_null() {
        return MarketBytes::null();
    }
    let params: Payload = (*h).inner.request_params();
    MarketBytes::from_json(&Value::Object(params))
}

/// Fill missing escrow identifiers in a raw escrow response.
///
/// Stateless; the response is returned with every present variant carrying a
/// non-empty `escrow_id`. Null buffer only when the input is not JSON.
#[no_mangle]
pub unsafe extern "C" fn empic_market_repair_escrow(response_json: MarketStr) -> MarketBytes {
    let Some(response) = response_json.parse_json() else {
        return MarketBytes::null();
    };
    MarketBytes::from_json(&repair_value(response))
}
