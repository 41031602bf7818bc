//empic_market_core/select.rs

use crate::{advert::ServiceAdvertisement, policy::DeliveryMode, policy::SelectionPolicy};

/// Delivery-mode compatibility between an advertisement and a preferred mode.
///
/// An advertisement that declares no modes is assumed to serve the default
/// (`pull`) only.
pub fn mode_compatible(ad: &ServiceAdvertisement, preferred: DeliveryMode) -> bool {
    if ad.delivery_modes.is_empty() {
        preferred == DeliveryMode::default()
    } else {
        ad.delivery_modes.iter().any(|m| m == preferred.as_str())
    }
}

/// Whether one advertisement passes every filter of `policy`.
pub fn is_eligible(ad: &ServiceAdvertisement, policy: &SelectionPolicy) -> bool {
    let tag_ok   = ad.has_tag(&policy.service_tag);
    let price_ok = ad.has_valid_price() && ad.price_usdc <= policy.max_price_usdc;
    let mode_ok  = mode_compatible(ad, policy.preferred_delivery_mode);

    tag_ok && price_ok && mode_ok
}

/// Cheapest eligible advertisement. Ties go to the earliest candidate.
pub fn select_advertisement<'a>(
    candidates: &'a [ServiceAdvertisement],
    policy: &SelectionPolicy,
) -> Option<&'a ServiceAdvertisement> {
    let mut best: Option<&ServiceAdvertisement> = None;
    for ad in candidates.iter().filter(|ad| is_eligible(ad, policy)) {
        match best {
            Some(b) if b.price_usdc <= ad.price_usdc => {}
            _ => best = Some(ad),
        }
    }
    best
}

/// Pick at most one provider for this round.
pub fn select<'a>(candidates: &'a [ServiceAdvertisement], policy: &SelectionPolicy) -> Option<&'a str> {
    let chosen = select_advertisement(candidates, policy);
    tracing::debug!(
        service_tag = %policy.service_tag,
        candidates = candidates.len(),
        chosen = chosen.map(|ad| ad.service_id.as_str()),
        "provider selection"
    );
    chosen.map(|ad| ad.service_id.as_str())
}

/// Host-facing form of [`select`]: an empty vector means "skip this round".
pub fn select_services(candidates: &[ServiceAdvertisement], policy: &SelectionPolicy) -> Vec<String> {
    select(candidates, policy).map(str::to_string).into_iter().collect()
}
