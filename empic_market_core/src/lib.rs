pub mod advert;
pub mod policy;
pub mod select;

pub mod accept;
pub mod escrow;
pub mod payload;

pub use advert::{ServiceAdvertisement, USDC_INVALID_PRICE, parse_candidates};
pub use policy::{DeliveryMode, SelectionPolicy, DEFAULT_MAX_PRICE_USDC};
pub use select::{is_eligible, mode_compatible, select, select_advertisement, select_services};

pub use accept::{AcceptanceRule, Payload, RangeRule, Verdict, TEMPERATURE_FIELD};
pub use escrow::{
    EscrowKind, EscrowResponse, GeneratedId, RepairReport, ESCROW_ID_FIELD,
    repair, repair_in_place, repair_in_place_with_rng, repair_value, repair_with_rng,
    surrogate_escrow_id,
};
pub use payload::DeliveredPayload;
