use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::marketplace::domain::{PricingRuleId, PropertySize};
use crate::marketplace::region::DistanceBand;

/// Admin-maintained pricing configuration. At most one rule is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: PricingRuleId,
    pub name: String,
    pub base_price: Decimal,
    #[serde(default)]
    pub property_size_modifiers: BTreeMap<PropertySize, Decimal>,
    pub short_notice_days: u32,
    pub short_notice_surcharge: Decimal,
    #[serde(default)]
    pub distance_band_modifiers: BTreeMap<DistanceBand, Decimal>,
    #[serde(default)]
    pub active: bool,
}

pub const DEFAULT_RULE_ID: &str = "default";

impl PricingRule {
    /// Built-in rule used when no rule is active.
    pub fn fallback() -> Self {
        let property_size_modifiers = BTreeMap::from([
            (PropertySize::Studio, Decimal::ZERO),
            (PropertySize::OneBed, Decimal::new(50, 2)),
            (PropertySize::TwoBed, Decimal::new(100, 2)),
            (PropertySize::ThreeBed, Decimal::new(150, 2)),
            (PropertySize::FourBed, Decimal::new(200, 2)),
            (PropertySize::FivePlusBed, Decimal::new(300, 2)),
        ]);
        let distance_band_modifiers = BTreeMap::from([
            (DistanceBand::Local, Decimal::ZERO),
            (DistanceBand::Medium, Decimal::new(100, 2)),
            (DistanceBand::Long, Decimal::new(200, 2)),
        ]);

        Self {
            id: PricingRuleId(DEFAULT_RULE_ID.to_string()),
            name: "Built-in default".to_string(),
            base_price: Decimal::new(500, 2),
            property_size_modifiers,
            short_notice_days: 7,
            short_notice_surcharge: Decimal::new(200, 2),
            distance_band_modifiers,
            active: false,
        }
    }

    pub fn size_modifier(&self, size: PropertySize) -> Decimal {
        self.property_size_modifiers
            .get(&size)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn distance_modifier(&self, band: DistanceBand) -> Decimal {
        self.distance_band_modifiers
            .get(&band)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

impl Default for PricingRule {
    fn default() -> Self {
        Self::fallback()
    }
}
