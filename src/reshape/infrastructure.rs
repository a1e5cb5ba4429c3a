//! Cycling-infrastructure and parking reshapers.
//!
//! These layers carry no percentages; the dashboard wants the filtered
//! feature set plus categorical tallies for the legend panels.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};

use super::{features_of, properties_of};
use crate::extract::{field_f64, field_flag, field_label, field_str};
use crate::stats::ValueRange;

/// Summary of the cycle-network layer.
#[derive(Debug, Serialize)]
pub struct CycleNetwork {
    pub features: Vec<Value>,
    pub feature_count: usize,
    pub lane_types: BTreeMap<String, usize>,
    pub directions: BTreeMap<String, usize>,
    pub total_length: f64,
}

/// Reshapes the cycle-network layer, dropping shared-road segments which
/// the dashboard never draws. Returns `None` when the payload has no
/// feature list.
pub fn reshape_cycle_network(payload: &Value) -> Option<CycleNetwork> {
    payload.get("features").and_then(Value::as_array)?;

    let mut lane_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut directions: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_length = 0.0;
    let mut features = Vec::new();

    for feature in features_of(payload) {
        let Some(properties) = properties_of(feature) else {
            continue;
        };
        if field_str(properties, "BIKE") == Some("SHARED_ROAD") {
            continue;
        }

        *lane_types
            .entry(field_label(properties, "cdo_1"))
            .or_default() += 1;
        *directions
            .entry(field_label(properties, "twoway"))
            .or_default() += 1;
        total_length += field_f64(properties, "Shape_Leng");
        features.push(feature.clone());
    }

    Some(CycleNetwork {
        feature_count: features.len(),
        features,
        lane_types,
        directions,
        total_length,
    })
}

/// Summary of the bus-corridor cycle-lane layer.
#[derive(Debug, Serialize)]
pub struct BusCorridors {
    pub feature_count: usize,
    pub surface_types: BTreeMap<String, usize>,
    pub twoway_types: BTreeMap<String, usize>,
    pub bollard_types: BTreeMap<String, usize>,
    pub total_length: f64,
}

pub fn reshape_bus_corridors(payload: &Value) -> Option<BusCorridors> {
    payload.get("features").and_then(Value::as_array)?;

    let mut surface_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut twoway_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut bollard_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_length = 0.0;
    let mut feature_count = 0;

    for feature in features_of(payload) {
        let Some(properties) = properties_of(feature) else {
            continue;
        };
        feature_count += 1;

        *surface_types
            .entry(field_label(properties, "cdo_1"))
            .or_default() += 1;

        let twoway = if properties.contains_key("twoway") {
            if field_flag(properties, "twoway") {
                "Bidirectional"
            } else {
                "Unidirectional"
            }
        } else {
            "Unknown"
        };
        *twoway_types.entry(twoway.to_string()).or_default() += 1;

        let bollard = if properties.contains_key("bollardpro") {
            if field_flag(properties, "bollardpro") {
                "With Bollards"
            } else {
                "No Bollards"
            }
        } else {
            "Unknown"
        };
        *bollard_types.entry(bollard.to_string()).or_default() += 1;

        total_length += field_f64(properties, "Shape_Leng");
    }

    Some(BusCorridors {
        feature_count,
        surface_types,
        twoway_types,
        bollard_types,
        total_length,
    })
}

/// Parking-stand inventory reshaped for the marker layer.
#[derive(Debug, Serialize)]
pub struct ParkingStands {
    pub features: Vec<Value>,
    pub total_stands: f64,
    pub total_locations: usize,
    /// stand type -> total stand count
    pub stand_types: BTreeMap<String, f64>,
    /// stand type -> number of locations
    pub stand_type_counts: BTreeMap<String, usize>,
    /// min/max stands per location, for marker sizing
    pub stands_range: Option<ValueRange>,
}

/// Converts flat parking records into point features plus per-type stats.
pub fn reshape_parking(records: &[Value]) -> ParkingStands {
    let mut features = Vec::with_capacity(records.len());
    let mut stand_types: BTreeMap<String, f64> = BTreeMap::new();
    let mut stand_type_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_stands = 0.0;
    let mut stands_range: Option<ValueRange> = None;

    for record in records {
        let Some(obj) = record.as_object() else {
            continue;
        };
        let stand_type = field_label(obj, "type_stands");
        let stands = field_f64(obj, "no_stands");

        *stand_type_counts.entry(stand_type.clone()).or_default() += 1;
        *stand_types.entry(stand_type).or_default() += stands;
        total_stands += stands;
        match stands_range.as_mut() {
            Some(range) => range.observe(stands),
            None => stands_range = Some(ValueRange::new(stands)),
        }

        features.push(json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": [field_f64(obj, "X"), field_f64(obj, "Y")]
            },
            "properties": {
                "type_stands": obj.get("type_stands").cloned().unwrap_or(Value::Null),
                "location_stand": obj.get("location_stand").cloned().unwrap_or(Value::Null),
                "no_stands": stands
            }
        }));
    }

    ParkingStands {
        total_locations: features.len(),
        features,
        total_stands,
        stand_types,
        stand_type_counts,
        stands_range,
    }
}
