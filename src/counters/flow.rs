//! Flow-schema bucketer.
//!
//! This network serves 15-minute interval counts grouped by travel mode
//! and direction. Directions are merged implicitly: every flow whose mode
//! matches contributes to the same hourly buckets. The hourly series
//! covers a fixed caller-supplied window, so the per-hour daily average is
//! `total * intervals_per_hour / window_days`.

use chrono::{NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{DatedValue, HourlyAverage, PerMode, parse_stamp};
use crate::extract::value_f64;

/// Sampling window the flow API serves: interval density per hour and the
/// number of days covered by the hourly series.
#[derive(Debug, Clone, Copy)]
pub struct FlowWindow {
    pub intervals_per_hour: u32,
    pub window_days: u32,
}

impl Default for FlowWindow {
    fn default() -> Self {
        FlowWindow {
            intervals_per_hour: 4,
            window_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowSeries {
    #[serde(default)]
    travel_mode: String,
    #[serde(default)]
    data: Vec<FlowInterval>,
}

#[derive(Debug, Clone, Deserialize)]
struct FlowInterval {
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    counts: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct HourBucket {
    total: f64,
    count: u32,
}

#[derive(Debug, Serialize)]
pub struct FlowSummary {
    pub total_pedestrian_data_points: u32,
    pub total_bike_data_points: u32,
    pub days_of_data: u32,
}

#[derive(Debug, Serialize)]
pub struct FlowTimeSeries {
    pub hourly_averages: PerMode<Vec<HourlyAverage>>,
    pub monthly: Option<PerMode<Vec<DatedValue>>>,
    pub summary: FlowSummary,
}

/// Buckets a flow-network payload into hourly averages and an optional
/// monthly series. Returns `None` when the payload carries no hourly
/// series at all.
pub fn bucket_flow_payload(payload: &Value, window: FlowWindow) -> Option<FlowTimeSeries> {
    let hourly = payload.get("hourly_30days")?.as_array()?;

    let mut buckets = PerMode {
        pedestrian: vec![HourBucket::default(); 24],
        bike: vec![HourBucket::default(); 24],
    };

    for flow in hourly
        .iter()
        .filter_map(|v| serde_json::from_value::<FlowSeries>(v.clone()).ok())
    {
        if flow.data.is_empty() {
            debug!(mode = %flow.travel_mode, "empty flow series skipped");
            continue;
        }
        let Some(slot) = buckets.slot_mut(&flow.travel_mode) else {
            continue;
        };
        for interval in &flow.data {
            let Some(stamp) = parse_stamp(&interval.timestamp) else {
                continue;
            };
            let bucket = &mut slot[stamp.hour() as usize];
            bucket.total += interval.counts.unwrap_or(0.0);
            bucket.count += 1;
        }
    }

    let averages = |series: &[HourBucket]| -> Vec<HourlyAverage> {
        series
            .iter()
            .enumerate()
            .map(|(hour, bucket)| HourlyAverage {
                hour: hour as u32,
                average_daily_count: if bucket.count > 0 {
                    bucket.total * window.intervals_per_hour as f64 / window.window_days as f64
                } else {
                    0.0
                },
            })
            .collect()
    };

    let summary = FlowSummary {
        total_pedestrian_data_points: buckets.pedestrian.iter().map(|b| b.count).sum(),
        total_bike_data_points: buckets.bike.iter().map(|b| b.count).sum(),
        days_of_data: window.window_days,
    };

    let monthly = payload
        .get("monthly_3years")
        .and_then(Value::as_array)
        .map(|flows| bucket_monthly(flows));

    Some(FlowTimeSeries {
        hourly_averages: PerMode {
            pedestrian: averages(&buckets.pedestrian),
            bike: averages(&buckets.bike),
        },
        monthly,
        summary,
    })
}

/// Ordered shape strategies for one monthly record. The first extractor
/// that recognizes the record wins; records matching none are skipped.
const MONTHLY_SHAPES: &[fn(&Value) -> Option<(NaiveDate, f64)>] = &[
    shape_timestamp_traffic,
    shape_period,
    shape_timestamp_counts,
    shape_date_value,
];

/// `YYYY-MM` becomes the first of that month; anything longer goes
/// through the shared timestamp parser.
fn month_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() <= 7 && raw.contains('-') {
        return NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok();
    }
    parse_stamp(raw).map(|stamp| stamp.date())
}

// { "timestamp": "2022-09-01T00:00:00+01:00", "traffic": { "counts": 204140 } }
fn shape_timestamp_traffic(record: &Value) -> Option<(NaiveDate, f64)> {
    let date = month_date(record.get("timestamp")?.as_str()?)?;
    let counts = record.get("traffic")?.get("counts")?;
    Some((date, value_f64(counts)))
}

// { "period": "2023-01", "counts": 123 }
fn shape_period(record: &Value) -> Option<(NaiveDate, f64)> {
    let date = month_date(record.get("period")?.as_str()?)?;
    let counts = record.get("counts").map(value_f64).unwrap_or(0.0);
    Some((date, counts))
}

// { "timestamp": "2023-01-01T00:00:00", "counts": 123 }
fn shape_timestamp_counts(record: &Value) -> Option<(NaiveDate, f64)> {
    let date = month_date(record.get("timestamp")?.as_str()?)?;
    let counts = record.get("counts").map(value_f64).unwrap_or(0.0);
    Some((date, counts))
}

// { "date": "2023-01-01", "value": 123 }
fn shape_date_value(record: &Value) -> Option<(NaiveDate, f64)> {
    let date = month_date(record.get("date")?.as_str()?)?;
    let counts = record
        .get("value")
        .or_else(|| record.get("counts"))
        .map(value_f64)
        .unwrap_or(0.0);
    Some((date, counts))
}

fn bucket_monthly(flows: &[Value]) -> PerMode<Vec<DatedValue>> {
    let mut series = PerMode::<Vec<DatedValue>>::default();

    for flow in flows {
        let Some(mode) = flow.get("travelMode").and_then(Value::as_str) else {
            continue;
        };
        let Some(data) = flow.get("data").and_then(Value::as_array) else {
            continue;
        };
        let Some(slot) = series.slot_mut(mode) else {
            continue;
        };
        for record in data {
            let Some((date, value)) = MONTHLY_SHAPES.iter().find_map(|shape| shape(record))
            else {
                debug!("unrecognized monthly record shape skipped");
                continue;
            };
            slot.push(DatedValue { date, value });
        }
    }

    series.pedestrian.sort_by_key(|point| point.date);
    series.bike.sort_by_key(|point| point.date);
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hourly_average_over_window() {
        // two 15-minute readings at hour 9 totaling 12, over a 30-day
        // window with 4 intervals per hour: (12 * 4) / 30 = 1.6
        let payload = json!({
            "hourly_30days": [
                {
                    "travelMode": "bike",
                    "direction": "in",
                    "data": [
                        {"timestamp": "2024-03-04T09:00:00", "counts": 5},
                        {"timestamp": "2024-03-04T09:15:00", "counts": 7}
                    ]
                }
            ]
        });
        let series = bucket_flow_payload(&payload, FlowWindow::default()).unwrap();
        let hour9 = series.hourly_averages.bike[9];
        assert_eq!(hour9.hour, 9);
        assert!((hour9.average_daily_count - 1.6).abs() < 1e-9);
        // untouched hours stay zero, never NaN
        assert_eq!(series.hourly_averages.bike[3].average_daily_count, 0.0);
        assert_eq!(series.summary.total_bike_data_points, 2);
    }

    #[test]
    fn test_directions_merge_into_one_mode() {
        let payload = json!({
            "hourly_30days": [
                {
                    "travelMode": "pedestrian",
                    "direction": "in",
                    "data": [{"timestamp": "2024-03-04T08:00:00", "counts": 10}]
                },
                {
                    "travelMode": "pedestrian",
                    "direction": "out",
                    "data": [{"timestamp": "2024-03-04T08:15:00", "counts": 20}]
                }
            ]
        });
        let series = bucket_flow_payload(&payload, FlowWindow::default()).unwrap();
        let hour8 = series.hourly_averages.pedestrian[8];
        assert!((hour8.average_daily_count - 4.0).abs() < 1e-9); // 30*4/30
    }

    #[test]
    fn test_missing_hourly_series_is_none() {
        assert!(bucket_flow_payload(&json!({"daily": []}), FlowWindow::default()).is_none());
    }

    #[test]
    fn test_monthly_shape_priority() {
        let payload = json!({
            "hourly_30days": [],
            "monthly_3years": [
                {
                    "travelMode": "bike",
                    "data": [
                        {"timestamp": "2022-09-01T00:00:00+01:00", "traffic": {"counts": 204140}},
                        {"period": "2023-01", "counts": 150},
                        {"timestamp": "2022-11-01T00:00:00", "counts": 99},
                        {"date": "2023-03-01", "value": 42},
                        {"shrug": true}
                    ]
                }
            ]
        });
        let series = bucket_flow_payload(&payload, FlowWindow::default()).unwrap();
        let monthly = series.monthly.unwrap();
        let bike = &monthly.bike;
        // unmatched record dropped; remainder sorted ascending by date
        assert_eq!(bike.len(), 4);
        assert_eq!(bike[0].date, NaiveDate::from_ymd_opt(2022, 9, 1).unwrap());
        assert_eq!(bike[0].value, 204140.0);
        assert_eq!(bike[1].value, 99.0);
        assert_eq!(bike[2].value, 150.0);
        assert_eq!(bike[3].value, 42.0);
    }

    #[test]
    fn test_unknown_travel_mode_is_ignored() {
        let payload = json!({
            "hourly_30days": [
                {
                    "travelMode": "horse",
                    "data": [{"timestamp": "2024-03-04T09:00:00", "counts": 5}]
                }
            ]
        });
        let series = bucket_flow_payload(&payload, FlowWindow::default()).unwrap();
        assert_eq!(series.summary.total_pedestrian_data_points, 0);
        assert_eq!(series.summary.total_bike_data_points, 0);
    }
}
