//! View-model assembly for the rendering layer.
//!
//! Everything the map and chart components consume is built here: scale
//! ranges for color/size interpolation, filtered marker sets, and
//! presentation-formatted dates and figures. This is the only place dates
//! leave their canonical internal representation.

use chrono::NaiveDate;
use serde::Serialize;

use crate::counters::sites::CombinedSite;
use crate::counters::{DatedValue, HourlyAverage, PerMode};
use crate::extract::MobilityMetric;
use crate::reshape::StatTable;
use crate::reshape::cordon::CordonData;
use crate::stats::ValueRange;

/// Min/max of area percentages for one combination key, excluding the
/// synthetic `_TOTAL` entry, which would otherwise stretch the color ramp
/// over the dataset-wide aggregate.
pub fn choropleth_scale(table: &StatTable, combo: &str) -> Option<ValueRange> {
    ValueRange::from_values(table.areas(combo).map(|(_, stat)| stat.percentage))
}

/// A marker collection together with the range its sizes interpolate over.
#[derive(Debug, Serialize)]
pub struct MarkerSet<T> {
    pub markers: Vec<T>,
    pub scale: Option<ValueRange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterMarker {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub total_traffic: f64,
}

/// Counter-site markers. Sites with zero traffic do not render.
pub fn counter_markers(combined: &[CombinedSite]) -> MarkerSet<CounterMarker> {
    let markers: Vec<CounterMarker> = combined
        .iter()
        .filter(|site| site.total_traffic > 0.0)
        .map(|site| CounterMarker {
            id: site.site.id.clone(),
            name: site.site.name.clone(),
            latitude: site.site.latitude,
            longitude: site.site.longitude,
            total_traffic: site.total_traffic,
        })
        .collect();
    let scale = ValueRange::from_values(markers.iter().map(|m| m.total_traffic));
    MarkerSet { markers, scale }
}

#[derive(Debug, Clone, Serialize)]
pub struct CordonMarker {
    pub site_no: f64,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub mode: String,
    pub year: String,
    pub value: f64,
}

/// Cordon markers with both scales the marker layer needs.
#[derive(Debug, Serialize)]
pub struct CordonMarkerSet {
    pub markers: Vec<CordonMarker>,
    /// Range of the current mode/year selection.
    pub scale: Option<ValueRange>,
    /// Range across every mode/year combination. Sizing against this one
    /// keeps markers comparable when the user toggles filters, instead of
    /// re-stretching to each selection.
    pub global_scale: Option<ValueRange>,
}

/// Markers for one mode/year selection; zero counts do not render.
pub fn cordon_markers(data: &CordonData, mode: &str, year: &str) -> CordonMarkerSet {
    let markers: Vec<CordonMarker> = data
        .by_location
        .values()
        .filter_map(|site| {
            let value = *site.counts.get(mode)?.get(year)?;
            if value <= 0.0 {
                return None;
            }
            Some(CordonMarker {
                site_no: site.zone.site_no,
                location: site.zone.location.clone(),
                latitude: site.zone.latitude,
                longitude: site.zone.longitude,
                mode: mode.to_string(),
                year: year.to_string(),
                value,
            })
        })
        .collect();

    CordonMarkerSet {
        scale: ValueRange::from_values(markers.iter().map(|m| m.value)),
        global_scale: cordon_global_scale(data),
        markers,
    }
}

/// Positive counts across every location, mode, and year.
pub fn cordon_global_scale(data: &CordonData) -> Option<ValueRange> {
    ValueRange::from_values(
        data.by_location
            .values()
            .flat_map(|site| site.counts.values())
            .flat_map(|years| years.values())
            .copied()
            .filter(|value| *value > 0.0),
    )
}

/// `DD/MM/YYYY`, the label format the chart component expects.
pub fn format_date_dmy(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: String,
    pub value: f64,
}

/// Formats a dated series for the chart component.
pub fn chart_points(series: &[DatedValue]) -> Vec<ChartPoint> {
    series
        .iter()
        .map(|point| ChartPoint {
            date: format_date_dmy(point.date),
            value: point.value,
        })
        .collect()
}

/// Chart-ready pedestrian/bike series pair.
pub fn chart_series(series: &PerMode<Vec<DatedValue>>) -> PerMode<Vec<ChartPoint>> {
    PerMode {
        pedestrian: chart_points(&series.pedestrian),
        bike: chart_points(&series.bike),
    }
}

/// Peak hour of an hourly profile, for the summary strip.
pub fn peak_hour(series: &[HourlyAverage]) -> Option<HourlyAverage> {
    series
        .iter()
        .filter(|hour| hour.average_daily_count > 0.0)
        .max_by(|a, b| {
            a.average_daily_count
                .partial_cmp(&b.average_daily_count)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .copied()
}

/// Human-readable figure for one mobility-report metric value.
pub fn format_metric(metric: MobilityMetric, raw: f64) -> String {
    match metric {
        MobilityMetric::Trips => group_thousands(raw),
        MobilityMetric::Distance => format!("{:.1}K km", raw / 1000.0),
        MobilityMetric::Co2 => format!("{raw:.1} tons"),
    }
}

fn group_thousands(value: f64) -> String {
    let whole = value.round().abs() as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if value < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}
