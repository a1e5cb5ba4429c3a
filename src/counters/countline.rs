//! Countline-schema bucketer.
//!
//! This network's computer-vision counters report per-class counts per
//! countline, either split by direction (`clockwise` / `anti_clockwise`
//! maps) or pre-aggregated at the top level of the record. Both record
//! shapes reduce to the same hourly/daily chart series.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Timelike};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{DatedValue, HourlyAverage, PerMode, parse_stamp};
use crate::extract::{value_f64, value_string};
use crate::stats::pct;

/// Classes folded into the pedestrian series.
const PEDESTRIAN_CLASSES: [&str; 2] = ["pedestrian", "jogger"];

/// Classes folded into the cyclist series.
const CYCLIST_CLASSES: [&str; 3] = ["cyclist", "cargo_bicycle", "rental_bicycle"];

/// Every class the network reports; the denominator for traffic shares.
const ALL_TRAFFIC_CLASSES: [&str; 9] = [
    "pedestrian",
    "cyclist",
    "car",
    "bus",
    "agricultural_vehicle",
    "cargo_bicycle",
    "dog",
    "electric_hackney_cab",
    "emergency_car",
];

/// Count for one class in one record: directional records sum both
/// directions, pre-aggregated records carry the class at the top level.
fn class_count(record: &Value, class: &str) -> f64 {
    let clockwise = record.get("clockwise");
    let anti_clockwise = record.get("anti_clockwise");
    if clockwise.is_some() || anti_clockwise.is_some() {
        direction_count(clockwise, class) + direction_count(anti_clockwise, class)
    } else {
        record.get(class).map(value_f64).unwrap_or(0.0)
    }
}

fn direction_count(direction: Option<&Value>, class: &str) -> f64 {
    direction
        .and_then(|counts| counts.get(class))
        .map(value_f64)
        .unwrap_or(0.0)
}

fn pedestrian_count(record: &Value) -> f64 {
    PEDESTRIAN_CLASSES
        .iter()
        .map(|class| class_count(record, class))
        .sum()
}

fn cyclist_count(record: &Value) -> f64 {
    CYCLIST_CLASSES
        .iter()
        .map(|class| class_count(record, class))
        .sum()
}

fn all_traffic_count(record: &Value) -> f64 {
    ALL_TRAFFIC_CLASSES
        .iter()
        .map(|class| class_count(record, class))
        .sum()
}

fn record_date(record: &Value) -> Option<chrono::NaiveDateTime> {
    record.get("from").and_then(Value::as_str).and_then(parse_stamp)
}

#[derive(Debug, Default, Clone, Copy)]
struct HourBucket {
    total: f64,
    count: u32,
}

/// Buckets hourly countline records by hour of day.
///
/// The divisor is the number of distinct calendar days observed across
/// the whole series, so a day with missing hours cannot inflate the
/// average the way dividing by the reading count would.
fn bucket_hourly(records: &[Value]) -> PerMode<Vec<HourlyAverage>> {
    let mut pedestrian = vec![HourBucket::default(); 24];
    let mut bike = vec![HourBucket::default(); 24];
    let mut days: BTreeSet<NaiveDate> = BTreeSet::new();

    for record in records {
        let Some(stamp) = record_date(record) else {
            debug!("countline record without usable `from` timestamp skipped");
            continue;
        };
        let hour = stamp.hour() as usize;
        days.insert(stamp.date());

        pedestrian[hour].total += pedestrian_count(record);
        pedestrian[hour].count += 1;
        bike[hour].total += cyclist_count(record);
        bike[hour].count += 1;
    }

    let day_count = days.len().max(1) as f64;
    let averages = |buckets: &[HourBucket]| -> Vec<HourlyAverage> {
        buckets
            .iter()
            .enumerate()
            .map(|(hour, bucket)| HourlyAverage {
                hour: hour as u32,
                average_daily_count: if bucket.count > 0 {
                    bucket.total / day_count
                } else {
                    0.0
                },
            })
            .collect()
    };

    PerMode {
        pedestrian: averages(&pedestrian),
        bike: averages(&bike),
    }
}

/// Daily series truncated to the most recent `last_n_days` records:
/// newest-first sort, cut, then chronological re-sort.
fn bucket_daily(records: &[Value], last_n_days: usize) -> PerMode<Vec<DatedValue>> {
    let mut pedestrian = Vec::new();
    let mut bike = Vec::new();

    for record in records {
        let Some(stamp) = record_date(record) else {
            continue;
        };
        let date = stamp.date();
        pedestrian.push(DatedValue {
            date,
            value: pedestrian_count(record),
        });
        bike.push(DatedValue {
            date,
            value: cyclist_count(record),
        });
    }

    let recent = |mut series: Vec<DatedValue>| -> Vec<DatedValue> {
        series.sort_by(|a, b| b.date.cmp(&a.date));
        series.truncate(last_n_days);
        series.sort_by_key(|point| point.date);
        series
    };

    PerMode {
        pedestrian: recent(pedestrian),
        bike: recent(bike),
    }
}

/// Share of pedestrians and cyclists in all counted traffic over the most
/// recent `last_n_days` daily records.
fn traffic_share(records: &[Value], last_n_days: usize) -> (f64, f64, f64, f64) {
    let mut dated: Vec<(NaiveDate, &Value)> = records
        .iter()
        .filter_map(|record| record_date(record).map(|stamp| (stamp.date(), record)))
        .collect();
    dated.sort_by(|a, b| b.0.cmp(&a.0));
    dated.truncate(last_n_days);

    let mut all_traffic = 0.0;
    let mut pedestrians = 0.0;
    let mut cyclists = 0.0;
    for (_, record) in &dated {
        all_traffic += all_traffic_count(record);
        pedestrians += class_count(record, "pedestrian");
        cyclists += class_count(record, "cyclist");
    }

    (
        pct(pedestrians, all_traffic),
        pct(cyclists, all_traffic),
        pedestrians,
        cyclists,
    )
}

/// Whole days covered by the payload's advertised date range.
fn window_days(payload: &Value) -> i64 {
    let Some(range) = payload.get("dateRange") else {
        return 0;
    };
    let inner = range.get("hourly").unwrap_or(range);
    let parsed = |key: &str| {
        inner
            .get(key)
            .and_then(Value::as_str)
            .and_then(parse_stamp)
    };
    match (parsed("from"), parsed("to")) {
        (Some(from), Some(to)) => {
            let seconds = (to - from).num_seconds();
            (seconds + 86_399) / 86_400
        }
        _ => 0,
    }
}

#[derive(Debug, Serialize)]
pub struct CountlineSummary {
    /// Hours of the day with a positive pedestrian average.
    pub total_pedestrian_data_points: u32,
    pub total_bike_data_points: u32,
    pub days_of_data: i64,
    pub pedestrian_percentage: f64,
    pub cyclist_percentage: f64,
    pub total_pedestrian_count: f64,
    pub total_cyclist_count: f64,
    /// True when the all-class denominator was unavailable and the share
    /// was computed against pedestrian + cyclist only. Known
    /// approximation, kept so historical figures stay reproducible.
    pub approximate: bool,
}

#[derive(Debug, Serialize)]
pub struct CountlineTimeSeries {
    pub hourly_averages: Option<PerMode<Vec<HourlyAverage>>>,
    pub daily: PerMode<Vec<DatedValue>>,
    pub summary: CountlineSummary,
}

/// Buckets a countline payload into hourly averages, a recent daily
/// series, and a traffic-share summary.
///
/// Prefers the aggregated `hourly_7days` / `daily_3months` series and
/// falls back to the legacy per-countline `hourly_30days` map. Returns
/// `None` when no recognizable series is present.
pub fn bucket_countline_payload(payload: &Value, last_n_days: usize) -> Option<CountlineTimeSeries> {
    let hourly_aggregated = payload.get("hourly_7days").and_then(Value::as_array);
    let daily_aggregated = payload.get("daily_3months").and_then(Value::as_array);
    let legacy = payload.get("hourly_30days");

    if hourly_aggregated.is_none() && daily_aggregated.is_none() && legacy.is_none() {
        return None;
    }

    let hourly_averages = match (hourly_aggregated, legacy) {
        (Some(records), _) => Some(bucket_hourly(records)),
        (None, Some(legacy)) => legacy_hourly(payload, legacy),
        (None, None) => None,
    };

    let daily = daily_aggregated
        .map(|records| bucket_daily(records, last_n_days))
        .unwrap_or_default();

    let (pedestrian_percentage, cyclist_percentage, total_pedestrian_count, total_cyclist_count, approximate) =
        match daily_aggregated {
            Some(records) => {
                let (ped_pct, cyc_pct, ped, cyc) = traffic_share(records, last_n_days);
                (ped_pct, cyc_pct, ped, cyc, false)
            }
            None => {
                // degraded path: only the two tracked series exist, so the
                // share denominator is pedestrian + cyclist rather than
                // all traffic
                warn!("no per-class daily records, traffic share is approximate");
                let pedestrians: f64 = daily.pedestrian.iter().map(|p| p.value).sum();
                let cyclists: f64 = daily.bike.iter().map(|p| p.value).sum();
                let tracked = pedestrians + cyclists;
                (
                    pct(pedestrians, tracked),
                    pct(cyclists, tracked),
                    pedestrians,
                    cyclists,
                    true,
                )
            }
        };

    let positive_hours = |series: &Option<PerMode<Vec<HourlyAverage>>>,
                          pick: fn(&PerMode<Vec<HourlyAverage>>) -> &Vec<HourlyAverage>|
     -> u32 {
        series.as_ref().map_or(0, |pair| {
            pick(pair)
                .iter()
                .filter(|hour| hour.average_daily_count > 0.0)
                .count() as u32
        })
    };

    let summary = CountlineSummary {
        total_pedestrian_data_points: positive_hours(&hourly_averages, |pair| &pair.pedestrian),
        total_bike_data_points: positive_hours(&hourly_averages, |pair| &pair.bike),
        days_of_data: window_days(payload),
        pedestrian_percentage,
        cyclist_percentage,
        total_pedestrian_count,
        total_cyclist_count,
        approximate,
    };

    Some(CountlineTimeSeries {
        hourly_averages,
        daily,
        summary,
    })
}

/// Legacy payloads key the hourly records by countline id; the first
/// listed countline (or the first key) is the one displayed.
fn legacy_hourly(payload: &Value, legacy: &Value) -> Option<PerMode<Vec<HourlyAverage>>> {
    let map = legacy.as_object()?;
    let id = payload
        .get("countlineIds")
        .and_then(Value::as_array)
        .and_then(|ids| ids.first())
        .and_then(value_string)
        .or_else(|| map.keys().next().cloned())?;
    let records = map.get(&id)?.as_array()?;
    Some(bucket_hourly(records))
}
