//! Route-history reshaper for crowd-sourced ride counts.
//!
//! The history file carries one record per date with a column per route;
//! the geometry file maps route names to their line geometries. Route
//! names come from the geometry map, so adding a route upstream needs no
//! code change here.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::extract::{field_f64, field_str};
use crate::stats::{ValueRange, mean};

#[derive(Debug, Clone, Serialize)]
pub struct RoutePoint {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteTotals {
    pub total: f64,
    pub average: f64,
    pub count: usize,
    pub range: Option<ValueRange>,
}

#[derive(Debug, Serialize)]
pub struct RouteSeries {
    pub name: String,
    pub geometry: Value,
    pub points: Vec<RoutePoint>,
    pub totals: RouteTotals,
}

/// Pivots per-date history records into one series per route.
pub fn reshape_route_history(
    records: &[Value],
    geometries: &Map<String, Value>,
) -> BTreeMap<String, RouteSeries> {
    let mut routes: BTreeMap<String, RouteSeries> = geometries
        .iter()
        .map(|(name, geometry)| {
            (
                name.clone(),
                RouteSeries {
                    name: name.clone(),
                    geometry: geometry.clone(),
                    points: Vec::new(),
                    totals: RouteTotals {
                        total: 0.0,
                        average: 0.0,
                        count: 0,
                        range: None,
                    },
                },
            )
        })
        .collect();

    for record in records {
        let Some(obj) = record.as_object() else {
            continue;
        };
        let Some(date) = field_str(obj, "date") else {
            continue;
        };
        for series in routes.values_mut() {
            series.points.push(RoutePoint {
                date: date.to_string(),
                value: field_f64(obj, &series.name),
            });
        }
    }

    for series in routes.values_mut() {
        let values: Vec<f64> = series.points.iter().map(|p| p.value).collect();
        series.totals = RouteTotals {
            total: values.iter().sum(),
            average: mean(&values),
            count: values.len(),
            range: ValueRange::from_values(values.iter().copied()),
        };
    }

    routes
}
