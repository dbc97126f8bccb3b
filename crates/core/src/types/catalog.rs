//! Catalog classification enums.
//!
//! Bundle tiers and cable types are the two axes of the promotional catalog.
//! Product categories separate the core product (cables) from add-ons that
//! the upsell flow may offer.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a catalog enum cannot be parsed from text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseCatalogError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// A packaging tier of the core product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BundleTier {
    /// One cable.
    #[default]
    Single,
    /// Two cables.
    Duo,
    /// Three cables.
    Family,
}

impl BundleTier {
    /// All tiers in display order.
    pub const ALL: [Self; 3] = [Self::Single, Self::Duo, Self::Family];

    /// Number of cables in the tier.
    #[must_use]
    pub const fn units(self) -> u32 {
        match self {
            Self::Single => 1,
            Self::Duo => 2,
            Self::Family => 3,
        }
    }

    /// Stable lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Duo => "duo",
            Self::Family => "family",
        }
    }
}

impl fmt::Display for BundleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BundleTier {
    type Err = ParseCatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "1x" => Ok(Self::Single),
            "duo" | "2x" => Ok(Self::Duo),
            "family" | "3x" => Ok(Self::Family),
            _ => Err(ParseCatalogError {
                kind: "bundle tier",
                value: s.to_owned(),
            }),
        }
    }
}

/// Connector type of the cable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CableType {
    /// USB-C connector.
    Usbc,
    /// Apple Lightning connector.
    Lightning,
}

impl CableType {
    /// Stable lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usbc => "usbc",
            Self::Lightning => "lightning",
        }
    }

    /// Human-readable connector name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Usbc => "USB-C",
            Self::Lightning => "Lightning",
        }
    }
}

impl fmt::Display for CableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CableType {
    type Err = ParseCatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usbc" | "usb-c" | "type-c" => Ok(Self::Usbc),
            "lightning" => Ok(Self::Lightning),
            _ => Err(ParseCatalogError {
                kind: "cable type",
                value: s.to_owned(),
            }),
        }
    }
}

/// Structured product category, read from catalog tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    /// The core product.
    Cable,
    /// Add-ons such as wall chargers.
    Accessory,
}

impl FromStr for ProductCategory {
    type Err = ParseCatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cable" => Ok(Self::Cable),
            "accessory" => Ok(Self::Accessory),
            _ => Err(ParseCatalogError {
                kind: "product category",
                value: s.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tier_aliases() {
        assert_eq!("Family".parse::<BundleTier>().unwrap(), BundleTier::Family);
        assert_eq!("2x".parse::<BundleTier>().unwrap(), BundleTier::Duo);
        assert!("trio".parse::<BundleTier>().is_err());
    }

    #[test]
    fn test_parse_cable_type() {
        assert_eq!("USB-C".parse::<CableType>().unwrap(), CableType::Usbc);
        assert_eq!(
            "lightning".parse::<CableType>().unwrap(),
            CableType::Lightning
        );

        let err = "micro-usb".parse::<CableType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown cable type: micro-usb");
    }

    #[test]
    fn test_tier_units_and_order() {
        let units: Vec<u32> = BundleTier::ALL.iter().map(|t| t.units()).collect();
        assert_eq!(units, vec![1, 2, 3]);
    }

    #[test]
    fn test_serde_is_snake_case() {
        let json = serde_json::to_string(&ProductCategory::Accessory).unwrap();
        assert_eq!(json, "\"accessory\"");
    }
}
