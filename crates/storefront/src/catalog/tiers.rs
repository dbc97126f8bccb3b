//! Static bundle tier metadata.
//!
//! Prices come from Shopify; everything else about a tier (handle, display
//! name, reference price, badge) is fixed here.

use chargecart_core::{BundleTier, CableType};

/// Fixed metadata for one bundle tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSpec {
    pub tier: BundleTier,
    /// Display name.
    pub name: &'static str,
    /// Suffix appended to the cable's base handle.
    pub handle_suffix: &'static str,
    /// Pre-discount reference price in cents.
    pub compare_at_cents: i64,
    pub badge: Option<&'static str>,
}

/// Tiers in display order.
pub static TIERS: [TierSpec; 3] = [
    TierSpec {
        tier: BundleTier::Single,
        name: "Single",
        handle_suffix: "",
        compare_at_cents: 4990,
        badge: None,
    },
    TierSpec {
        tier: BundleTier::Duo,
        name: "Duo Pack",
        handle_suffix: "-duo",
        compare_at_cents: 9980,
        badge: Some("Most Popular"),
    },
    TierSpec {
        tier: BundleTier::Family,
        name: "Family Pack",
        handle_suffix: "-family",
        compare_at_cents: 14970,
        badge: Some("Best Value"),
    },
];

/// Metadata for `tier`.
#[must_use]
pub fn spec(tier: BundleTier) -> &'static TierSpec {
    match tier {
        BundleTier::Single => &TIERS[0],
        BundleTier::Duo => &TIERS[1],
        BundleTier::Family => &TIERS[2],
    }
}

/// Shopify handle of the product sold for `(cable, tier)`.
#[must_use]
pub fn handle_for(cable: CableType, tier: BundleTier) -> String {
    format!(
        "fast-charge-{}-cable{}",
        cable.as_str(),
        spec(tier).handle_suffix
    )
}
