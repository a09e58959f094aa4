//! Coarse distance estimation from postcode areas.
//!
//! The region table is a hand-maintained approximation. Areas missing from it (Wales,
//! Scotland, Northern Ireland and a few English fringes) resolve to no region and therefore
//! always price as a long move.

use serde::{Deserialize, Serialize};

use super::postcode::area_code;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    London,
    Midlands,
    NorthWest,
    NorthEast,
    SouthEast,
    SouthWest,
}

const LONDON: &[&str] = &[
    "E", "EC", "N", "NW", "SE", "SW", "W", "WC", "BR", "CR", "DA", "EN", "HA", "IG", "KT", "RM",
    "SM", "TW", "UB",
];
const MIDLANDS: &[&str] = &[
    "B", "CV", "DE", "DY", "LE", "LN", "NG", "NN", "ST", "WS", "WV", "WR",
];
const NORTH_WEST: &[&str] = &[
    "M", "L", "BB", "BL", "CA", "CH", "CW", "FY", "LA", "OL", "PR", "SK", "WA", "WN",
];
const NORTH_EAST: &[&str] = &[
    "NE", "DH", "DL", "SR", "TS", "LS", "BD", "HD", "HX", "HU", "S", "DN", "WF", "YO",
];
const SOUTH_EAST: &[&str] = &[
    "BN", "CT", "GU", "ME", "MK", "OX", "PO", "RG", "RH", "SL", "SO", "TN", "HP", "LU", "AL",
    "SG", "CM", "SS", "CO",
];
const SOUTH_WEST: &[&str] = &[
    "BA", "BH", "BS", "DT", "EX", "GL", "PL", "SN", "SP", "TA", "TQ", "TR",
];

const REGIONS: [(Region, &[&str]); 6] = [
    (Region::London, LONDON),
    (Region::Midlands, MIDLANDS),
    (Region::NorthWest, NORTH_WEST),
    (Region::NorthEast, NORTH_EAST),
    (Region::SouthEast, SOUTH_EAST),
    (Region::SouthWest, SOUTH_WEST),
];

/// Macro-region for an area code, `None` when the area is not in the table.
pub fn region_of(area: &str) -> Option<Region> {
    REGIONS
        .iter()
        .find(|(_, areas)| areas.contains(&area))
        .map(|(region, _)| *region)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceBand {
    Local,
    Medium,
    Long,
}

impl DistanceBand {
    pub const fn label(self) -> &'static str {
        match self {
            DistanceBand::Local => "local",
            DistanceBand::Medium => "medium",
            DistanceBand::Long => "long",
        }
    }
}

/// Same area is local, same known region is medium, anything else is long.
pub fn estimate_distance_band(from_postcode: &str, to_postcode: &str) -> DistanceBand {
    let from_area = area_code(from_postcode);
    let to_area = area_code(to_postcode);

    if from_area == to_area {
        return DistanceBand::Local;
    }

    match (region_of(&from_area), region_of(&to_area)) {
        (Some(from), Some(to)) if from == to => DistanceBand::Medium,
        _ => DistanceBand::Long,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn regions_do_not_overlap() {
        let mut seen = HashSet::new();
        for (_, areas) in REGIONS {
            for area in areas {
                assert!(seen.insert(*area), "{area} listed twice");
            }
        }
    }

    #[test]
    fn classifies_known_areas() {
        assert_eq!(region_of("SW"), Some(Region::London));
        assert_eq!(region_of("M"), Some(Region::NorthWest));
        assert_eq!(region_of("BS"), Some(Region::SouthWest));
        assert_eq!(region_of("CF"), None);
        assert_eq!(region_of(""), None);
    }

    #[test]
    fn estimates_bands_between_postcodes() {
        assert_eq!(
            estimate_distance_band("SW1A 1AA", "SE1 9GF"),
            DistanceBand::Medium
        );
        assert_eq!(
            estimate_distance_band("SW1A 1AA", "M1 1AE"),
            DistanceBand::Long
        );
        assert_eq!(
            estimate_distance_band("SW1A 1AA", "SW2 2AA"),
            DistanceBand::Local
        );
    }

    #[test]
    fn unknown_regions_fall_back_to_long() {
        assert_eq!(
            estimate_distance_band("CF10 1AA", "SA1 1AA"),
            DistanceBand::Long
        );
        assert_eq!(
            estimate_distance_band("CF10 1AA", "CF24 3AA"),
            DistanceBand::Local
        );
        assert_eq!(estimate_distance_band("", "SW1A 1AA"), DistanceBand::Long);
    }
}
