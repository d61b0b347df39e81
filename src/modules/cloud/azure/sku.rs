//! App Service Plan pricing tiers.

use super::error::{AzureError, AzureResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pricing tier category of an App Service Plan sku.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SkuTier {
    Free,
    Shared,
    Basic,
    Standard,
    Premium,
    PremiumV2,
}

impl SkuTier {
    /// Tier name as sent in the plan's `sku.tier` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkuTier::Free => "FREE",
            SkuTier::Shared => "SHARED",
            SkuTier::Basic => "BASIC",
            SkuTier::Standard => "STANDARD",
            SkuTier::Premium => "PREMIUM",
            SkuTier::PremiumV2 => "PREMIUMV2",
        }
    }
}

impl fmt::Display for SkuTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SKU_TABLE: &[(&str, SkuTier)] = &[
    ("F1", SkuTier::Free),
    ("D1", SkuTier::Shared),
    ("B1", SkuTier::Basic),
    ("B2", SkuTier::Basic),
    ("B3", SkuTier::Basic),
    ("S1", SkuTier::Standard),
    ("S2", SkuTier::Standard),
    ("S3", SkuTier::Standard),
    ("P1", SkuTier::Premium),
    ("P2", SkuTier::Premium),
    ("P3", SkuTier::Premium),
    ("P1V2", SkuTier::PremiumV2),
    ("P2V2", SkuTier::PremiumV2),
    ("P3V2", SkuTier::PremiumV2),
];

/// Normalize the `FREE` and `SHARED` aliases to their sku codes.
///
/// Matching is case-insensitive; every other input is returned unchanged.
pub fn normalize_sku(sku: &str) -> String {
    if sku.eq_ignore_ascii_case("FREE") {
        "F1".to_string()
    } else if sku.eq_ignore_ascii_case("SHARED") {
        "D1".to_string()
    } else {
        sku.to_string()
    }
}

/// Classify a sku code into its pricing tier.
pub fn get_sku_name(sku: &str) -> AzureResult<SkuTier> {
    let code = normalize_sku(sku).to_uppercase();
    SKU_TABLE
        .iter()
        .find(|(name, _)| *name == code)
        .map(|(_, tier)| *tier)
        .ok_or_else(|| AzureError::InvalidSku(sku.to_string()))
}
