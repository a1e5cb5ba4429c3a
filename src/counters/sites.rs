//! Counter site/traffic normalization and the site-reading combiner.
//!
//! The two counter networks list their sites in different containers and
//! spell coordinates differently; both normalize to `{latitude, longitude}`
//! here so the marker layer never sees a vendor shape.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::extract::{field_flag, field_str, value_f64, value_string};

/// Which counter network a listing came from. The networks default their
/// travel modes differently when the listing omits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterVendor {
    /// Flow-based network: sites declare their own travel modes.
    Flow,
    /// Countline network: every sensor watches both modes.
    Countline,
}

impl CounterVendor {
    fn default_modes(self) -> Vec<String> {
        match self {
            CounterVendor::Flow => Vec::new(),
            CounterVendor::Countline => vec!["pedestrian".to_string(), "bike".to_string()],
        }
    }
}

/// A countline attached to a sensor's view point, needed for the
/// time-series API calls.
#[derive(Debug, Clone, Serialize)]
pub struct Countline {
    pub id: String,
    pub name: String,
    pub description: String,
    pub direction: Option<String>,
}

/// One counter site, normalized across vendors.
#[derive(Debug, Clone, Serialize)]
pub struct Site {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    pub travel_modes: Vec<String>,
    pub directional: bool,
    pub countlines: Vec<Countline>,
}

/// One average-daily-traffic reading for a site and travel mode.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficReading {
    pub site_id: String,
    pub site_name: String,
    pub travel_mode: String,
    pub average_daily_traffic: f64,
}

/// A site with its per-mode readings attached.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedSite {
    #[serde(flatten)]
    pub site: Site,
    pub traffic: BTreeMap<String, TrafficReading>,
    pub total_traffic: f64,
}

/// Containers tried in order: a bare array, `data`, `countlines`,
/// `sensors`, and finally an object keyed by sensor id.
fn unwrap_listing(payload: &Value) -> Vec<Value> {
    if let Some(list) = payload.as_array() {
        return list.clone();
    }
    if let Some(obj) = payload.as_object() {
        for key in ["data", "countlines", "sensors"] {
            if let Some(list) = obj.get(key).and_then(Value::as_array) {
                return list.clone();
            }
        }
        // metadata object keyed by sensor id: lift the key into the entry
        return obj
            .iter()
            .map(|(id, body)| {
                let mut entry = body.as_object().cloned().unwrap_or_default();
                entry
                    .entry("id".to_string())
                    .or_insert_with(|| Value::String(id.clone()));
                Value::Object(entry)
            })
            .collect();
    }
    Vec::new()
}

/// Coordinate layouts tried in order; the first match wins. The caller
/// skips records matching none.
fn coordinates(site: &Map<String, Value>) -> Option<(f64, f64)> {
    if let Some(location) = site.get("location").and_then(Value::as_object) {
        if let (Some(lat), Some(lon)) = (num(location, "lat"), num(location, "lon")) {
            return Some((lat, lon));
        }
        if let (Some(lat), Some(lon)) = (num(location, "latitude"), num(location, "longitude")) {
            return Some((lat, lon));
        }
    }
    if let (Some(lat), Some(lon)) = (num(site, "lat"), num(site, "lon")) {
        return Some((lat, lon));
    }
    // one network writes `long` for longitude
    if let (Some(lat), Some(lon)) = (num(site, "lat"), num(site, "long")) {
        return Some((lat, lon));
    }
    if let (Some(lat), Some(lon)) = (num(site, "latitude"), num(site, "longitude")) {
        return Some((lat, lon));
    }
    if let Some(coords) = site.get("coordinates").and_then(Value::as_array) {
        if coords.len() >= 2 {
            // GeoJSON order: [longitude, latitude]
            return Some((value_f64(&coords[1]), value_f64(&coords[0])));
        }
    }
    None
}

fn num(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).filter(|v| !v.is_null()).map(value_f64)
}

fn countlines_of(site: &Map<String, Value>) -> Vec<Countline> {
    let mut countlines = Vec::new();
    let Some(view_points) = site.get("view_points").and_then(Value::as_object) else {
        return countlines;
    };
    for view_point in view_points.values() {
        let Some(lines) = view_point.get("countlines").and_then(Value::as_object) else {
            continue;
        };
        for (id, body) in lines {
            countlines.push(Countline {
                id: id.clone(),
                name: body
                    .get("name")
                    .and_then(value_string)
                    .unwrap_or_else(|| format!("Countline {id}")),
                description: body
                    .get("description")
                    .and_then(value_string)
                    .unwrap_or_default(),
                direction: body.get("direction").and_then(value_string),
            });
        }
    }
    countlines
}

/// Normalizes a vendor site listing into [`Site`] records.
///
/// Sites with no id or no resolvable coordinates are skipped; everything
/// else is defaulted rather than rejected.
pub fn normalize_sites(payload: &Value, vendor: CounterVendor) -> Vec<Site> {
    let entries = unwrap_listing(payload);
    let mut sites = Vec::with_capacity(entries.len());

    for entry in &entries {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let Some(id) = obj.get("id").and_then(value_string) else {
            debug!("site entry without id skipped");
            continue;
        };
        let Some((latitude, longitude)) = coordinates(obj) else {
            warn!(site = %id, "site has no recognizable coordinates, skipped");
            continue;
        };

        let travel_modes = match obj.get("travelModes").and_then(Value::as_array) {
            Some(modes) => modes.iter().filter_map(value_string).collect(),
            None => vendor.default_modes(),
        };

        sites.push(Site {
            name: field_str(obj, "name")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Site {id}")),
            latitude,
            longitude,
            description: field_str(obj, "description").unwrap_or_default().to_string(),
            travel_modes,
            directional: field_flag(obj, "directional"),
            countlines: countlines_of(obj),
            id,
        });
    }

    sites
}

/// Normalizes `{siteId, travelMode, averageDailyTraffic}` records,
/// resolving site names with a `Site {id}` fallback for unknown sites.
pub fn normalize_traffic(payload: &Value, sites: &[Site]) -> Vec<TrafficReading> {
    let Some(records) = payload.get("data").and_then(Value::as_array) else {
        debug!("traffic payload without data array");
        return Vec::new();
    };

    let names: BTreeMap<&str, &str> = sites
        .iter()
        .map(|site| (site.id.as_str(), site.name.as_str()))
        .collect();

    records
        .iter()
        .filter_map(|record| {
            let obj = record.as_object()?;
            let site_id = obj.get("siteId").and_then(value_string)?;
            Some(TrafficReading {
                site_name: names
                    .get(site_id.as_str())
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| format!("Site {site_id}")),
                travel_mode: obj
                    .get("travelMode")
                    .and_then(value_string)
                    .unwrap_or_default(),
                average_daily_traffic: obj
                    .get("averageDailyTraffic")
                    .map(value_f64)
                    .unwrap_or(0.0),
                site_id,
            })
        })
        .collect()
}

/// Joins locations with their per-mode readings.
///
/// One reading per mode per site is expected; duplicates resolve
/// last-write-wins. A reading whose site id matches no location is
/// unused; a location with no readings keeps an empty traffic map and a
/// zero total.
pub fn combine(locations: &[Site], readings: &[TrafficReading]) -> Vec<CombinedSite> {
    let mut by_site: BTreeMap<&str, BTreeMap<String, &TrafficReading>> = BTreeMap::new();
    for reading in readings {
        by_site
            .entry(reading.site_id.as_str())
            .or_default()
            .insert(reading.travel_mode.clone(), reading);
    }

    locations
        .iter()
        .map(|site| {
            let traffic: BTreeMap<String, TrafficReading> = by_site
                .get(site.id.as_str())
                .map(|modes| {
                    modes
                        .iter()
                        .map(|(mode, reading)| (mode.clone(), (*reading).clone()))
                        .collect()
                })
                .unwrap_or_default();
            let total_traffic = traffic.values().map(|r| r.average_daily_traffic).sum();
            CombinedSite {
                site: site.clone(),
                traffic,
                total_traffic,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_containers_in_priority_order() {
        let wrapped = json!({"data": [{"id": 1, "lat": 53.3, "lon": -6.2}]});
        assert_eq!(normalize_sites(&wrapped, CounterVendor::Flow).len(), 1);

        let bare = json!([{"id": 2, "lat": 53.3, "lon": -6.2}]);
        assert_eq!(normalize_sites(&bare, CounterVendor::Flow).len(), 1);

        let keyed = json!({
            "s-100": {"lat": 53.31, "long": -6.21},
            "s-101": {"lat": 53.32, "long": -6.22}
        });
        let sites = normalize_sites(&keyed, CounterVendor::Countline);
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].id, "s-100");
        // countline vendor defaults both modes
        assert_eq!(sites[0].travel_modes, vec!["pedestrian", "bike"]);
    }

    #[test]
    fn test_coordinate_variants() {
        let nested = json!([{"id": 1, "location": {"lat": 53.3, "lon": -6.2}}]);
        let site = &normalize_sites(&nested, CounterVendor::Flow)[0];
        assert_eq!((site.latitude, site.longitude), (53.3, -6.2));

        let long_spelling = json!([{"id": 2, "lat": 53.4, "long": -6.3}]);
        let site = &normalize_sites(&long_spelling, CounterVendor::Flow)[0];
        assert_eq!((site.latitude, site.longitude), (53.4, -6.3));

        // GeoJSON arrays come [longitude, latitude]
        let geojson = json!([{"id": 3, "coordinates": [-6.4, 53.5]}]);
        let site = &normalize_sites(&geojson, CounterVendor::Flow)[0];
        assert_eq!((site.latitude, site.longitude), (53.5, -6.4));
    }

    #[test]
    fn test_site_without_coordinates_is_skipped() {
        let payload = json!([
            {"id": 1, "name": "No fix"},
            {"id": 2, "lat": 53.3, "lon": -6.2}
        ]);
        let sites = normalize_sites(&payload, CounterVendor::Flow);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].id, "2");
    }

    #[test]
    fn test_countlines_lifted_from_view_points() {
        let payload = json!([{
            "id": "s-1",
            "lat": 53.3,
            "long": -6.2,
            "view_points": {
                "vp1": {"countlines": {"cl-9": {"name": "Quay inbound", "direction": "north"}}}
            }
        }]);
        let sites = normalize_sites(&payload, CounterVendor::Countline);
        assert_eq!(sites[0].countlines.len(), 1);
        assert_eq!(sites[0].countlines[0].id, "cl-9");
        assert_eq!(sites[0].countlines[0].direction.as_deref(), Some("north"));
    }

    fn site(id: &str) -> Site {
        Site {
            id: id.to_string(),
            name: format!("Site {id}"),
            latitude: 53.3,
            longitude: -6.2,
            description: String::new(),
            travel_modes: vec![],
            directional: false,
            countlines: vec![],
        }
    }

    fn reading(site_id: &str, mode: &str, adt: f64) -> TrafficReading {
        TrafficReading {
            site_id: site_id.to_string(),
            site_name: format!("Site {site_id}"),
            travel_mode: mode.to_string(),
            average_daily_traffic: adt,
        }
    }

    #[test]
    fn test_combine_sums_modes_per_site() {
        let sites = vec![site("1")];
        let readings = vec![reading("1", "pedestrian", 120.0), reading("1", "bike", 30.0)];
        let combined = combine(&sites, &readings);
        assert_eq!(combined[0].traffic.len(), 2);
        assert_eq!(combined[0].total_traffic, 150.0);
    }

    #[test]
    fn test_combine_tolerates_missing_readings_and_unknown_sites() {
        let sites = vec![site("1")];
        // reading for a site that is not in the listing is simply unused
        let readings = vec![reading("99", "pedestrian", 500.0)];
        let combined = combine(&sites, &readings);
        assert_eq!(combined.len(), 1);
        assert!(combined[0].traffic.is_empty());
        assert_eq!(combined[0].total_traffic, 0.0);
    }

    #[test]
    fn test_combine_duplicate_mode_last_write_wins() {
        let sites = vec![site("1")];
        let readings = vec![reading("1", "bike", 10.0), reading("1", "bike", 25.0)];
        let combined = combine(&sites, &readings);
        assert_eq!(combined[0].total_traffic, 25.0);
    }

    #[test]
    fn test_traffic_name_fallback() {
        let payload = json!({"data": [{"siteId": 7, "travelMode": "bike", "averageDailyTraffic": 40}]});
        let readings = normalize_traffic(&payload, &[]);
        assert_eq!(readings[0].site_id, "7");
        assert_eq!(readings[0].site_name, "Site 7");
    }

    #[test]
    fn test_traffic_without_data_array_is_empty() {
        assert!(normalize_traffic(&json!({"rows": []}), &[]).is_empty());
    }
}
