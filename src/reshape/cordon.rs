//! Manual cordon-count reshaper.
//!
//! Counts arrive as one record per travel mode with location-name keys;
//! coordinates come from a separate zone listing. The zone file stores
//! latitude in its `Longitude` column and vice versa, which is corrected
//! here so nothing downstream ever sees the swapped order.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::extract::{field_f64, field_str, value_f64};

#[derive(Debug, Clone, Serialize)]
pub struct CordonZone {
    pub site_no: f64,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// One counted location with its zone coordinates and per-mode counts.
#[derive(Debug, Clone, Serialize)]
pub struct CordonSite {
    #[serde(flatten)]
    pub zone: CordonZone,
    /// mode -> year -> raw count
    pub counts: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Default, Serialize)]
pub struct CordonData {
    pub by_location: BTreeMap<String, CordonSite>,
    /// mode -> year -> city-wide yearly total, from the bare-number keys
    /// of the count records.
    pub yearly_totals: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Canonical mode label for a count record's `Mode` column.
fn canonical_mode(raw: &str) -> String {
    match raw.to_lowercase().as_str() {
        "pedestrians" => "walking".to_string(),
        "cyclists" => "cycling".to_string(),
        "cars / lvgs" => "cars".to_string(),
        other => other.to_string(),
    }
}

/// Joins cordon count records with zone coordinates by location name.
///
/// Location keys suffixed `_22` are 2022 counts; plain location keys are
/// 2023. Locations with no zone record are dropped — a count that cannot
/// be placed on the map is useless to every consumer.
pub fn reshape_cordon(counts: &[Value], zones: &[Value]) -> CordonData {
    let mut zone_lookup: BTreeMap<String, CordonZone> = BTreeMap::new();
    for zone in zones {
        let Some(obj) = zone.as_object() else {
            continue;
        };
        let Some(location) = field_str(obj, "Location") else {
            continue;
        };
        zone_lookup.insert(
            location.to_string(),
            CordonZone {
                site_no: field_f64(obj, "Site No"),
                location: location.to_string(),
                // swapped at source
                latitude: field_f64(obj, "Longitude"),
                longitude: field_f64(obj, "Latitude"),
            },
        );
    }

    let mut data = CordonData::default();

    for record in counts {
        let Some(obj) = record.as_object() else {
            continue;
        };
        let Some(raw_mode) = field_str(obj, "Mode") else {
            debug!("cordon record without Mode column skipped");
            continue;
        };
        let mode = canonical_mode(raw_mode);

        for (key, value) in obj {
            if key == "Mode" {
                continue;
            }

            // bare-number keys are city-wide yearly totals
            if key.parse::<i64>().is_ok() {
                data.yearly_totals
                    .entry(mode.clone())
                    .or_default()
                    .insert(key.clone(), value_f64(value));
                continue;
            }

            let (location, year) = match key.strip_suffix("_22") {
                Some(location) => (location, "2022"),
                None => (key.as_str(), "2023"),
            };

            let Some(zone) = zone_lookup.get(location) else {
                debug!(location, "cordon count without zone coordinates skipped");
                continue;
            };

            data.by_location
                .entry(location.to_string())
                .or_insert_with(|| CordonSite {
                    zone: zone.clone(),
                    counts: BTreeMap::new(),
                })
                .counts
                .entry(mode.clone())
                .or_default()
                .insert(year.to_string(), value_f64(value));
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zones() -> Vec<Value> {
        vec![
            json!({"Site No": 4, "Location": "Baggot St", "Longitude": "53.333", "Latitude": "-6.249"}),
            json!({"Site No": 9, "Location": "North Quays", "Longitude": 53.348, "Latitude": -6.27}),
        ]
    }

    fn counts() -> Vec<Value> {
        vec![
            json!({
                "Mode": "Pedestrians",
                "Baggot St": 1200,
                "Baggot St_22": 1100,
                "North Quays": 900,
                "2023": 2100
            }),
            json!({"Mode": "Cyclists", "Baggot St": 300}),
            json!({"Mode": "Cars / LVGs", "Baggot St": 5000}),
        ]
    }

    #[test]
    fn test_zone_coordinate_swap_is_corrected() {
        let data = reshape_cordon(&counts(), &zones());
        let site = &data.by_location["Baggot St"];
        assert!((site.zone.latitude - 53.333).abs() < 1e-9);
        assert!((site.zone.longitude - -6.249).abs() < 1e-9);
    }

    #[test]
    fn test_mode_labels_are_canonicalized() {
        let data = reshape_cordon(&counts(), &zones());
        let site = &data.by_location["Baggot St"];
        assert!(site.counts.contains_key("walking"));
        assert!(site.counts.contains_key("cycling"));
        assert!(site.counts.contains_key("cars"));
    }

    #[test]
    fn test_year_suffix_splits_counts() {
        let data = reshape_cordon(&counts(), &zones());
        let walking = &data.by_location["Baggot St"].counts["walking"];
        assert_eq!(walking["2023"], 1200.0);
        assert_eq!(walking["2022"], 1100.0);
    }

    #[test]
    fn test_numeric_keys_become_yearly_totals() {
        let data = reshape_cordon(&counts(), &zones());
        assert_eq!(data.yearly_totals["walking"]["2023"], 2100.0);
        assert!(!data.by_location.contains_key("2023"));
    }

    #[test]
    fn test_count_without_zone_is_dropped() {
        let records = vec![json!({"Mode": "Pedestrians", "Unknown Bridge": 50})];
        let data = reshape_cordon(&records, &zones());
        assert!(data.by_location.is_empty());
    }
}
