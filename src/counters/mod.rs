//! Counter-network normalization and time-series bucketing.
//!
//! Two vendor schemas reduce to the same chart contract: 24 hour-of-day
//! averages per travel mode, plus dated daily or monthly series.

pub mod countline;
pub mod flow;
pub mod sites;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// One value per calendar date. Dates stay [`NaiveDate`] internally and
/// are formatted only at the view boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

/// Average daily count for one hour of the day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyAverage {
    pub hour: u32,
    pub average_daily_count: f64,
}

/// Pedestrian/bike pair used for every bucketed output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerMode<T> {
    pub pedestrian: T,
    pub bike: T,
}

impl<T> PerMode<T> {
    /// Selects the slot for a vendor travel-mode label, `None` for modes
    /// the dashboard does not chart.
    pub fn slot_mut(&mut self, mode: &str) -> Option<&mut T> {
        match mode {
            "pedestrian" => Some(&mut self.pedestrian),
            "bike" | "cyclist" => Some(&mut self.bike),
            _ => None,
        }
    }
}

/// Parses a vendor timestamp, trying RFC 3339, then a naive datetime,
/// then a bare date. The wall-clock time written in the stamp is kept
/// as-is: hour-of-day bucketing follows the sensor's clock, not UTC.
pub fn parse_stamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.naive_local());
    }
    if let Ok(stamp) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(stamp);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}
