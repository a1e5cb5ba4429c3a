//! Per-source reshapers that turn raw feature collections into the
//! normalized statistical model.

pub mod census;
pub mod cordon;
pub mod infrastructure;
pub mod mobility;
pub mod strava;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::stats::NormalizedStat;

/// Reserved entity name holding the dataset-wide aggregate for each
/// combination key. Synthesized by the reshapers, never present in a
/// source payload.
pub const TOTAL_KEY: &str = "_TOTAL";

/// Normalized statistics table: combination key -> area name -> stat.
///
/// Every combination key a dataset declares is present even when the
/// payload is empty, and every area appears under every combination key.
/// `BTreeMap` keeps iteration deterministic so identical inputs serialize
/// identically.
#[derive(Debug, Default, Serialize)]
pub struct StatTable {
    pub combos: BTreeMap<String, BTreeMap<String, NormalizedStat>>,
    /// Number of real areas; the `_TOTAL` entry is not counted.
    pub area_count: usize,
}

impl StatTable {
    /// Pre-registers a combination key so consumers never see a missing map.
    pub(crate) fn init_combo(&mut self, key: String) {
        self.combos.entry(key).or_default();
    }

    pub(crate) fn insert(&mut self, combo: &str, area: &str, stat: NormalizedStat) {
        self.combos
            .entry(combo.to_string())
            .or_default()
            .insert(area.to_string(), stat);
    }

    /// Sums every real area's numerator and denominator per combination
    /// and stores the population-weighted aggregate under [`TOTAL_KEY`].
    ///
    /// The aggregate percentage divides the summed numerator by the summed
    /// denominator. Averaging the per-area percentages instead would let a
    /// sparsely populated area count as much as the city centre.
    pub(crate) fn synthesize_totals(&mut self) {
        self.area_count = self
            .combos
            .values()
            .next()
            .map_or(0, |areas| areas.len());

        for areas in self.combos.values_mut() {
            let mut raw_sum = 0.0;
            let mut total_sum = 0.0;
            for (name, stat) in areas.iter() {
                if name == TOTAL_KEY {
                    continue;
                }
                raw_sum += stat.raw;
                total_sum += stat.total;
            }
            areas.insert(
                TOTAL_KEY.to_string(),
                NormalizedStat::from_parts(raw_sum, total_sum),
            );
        }
    }

    /// Stats for one combination key, without the synthetic total.
    pub fn areas<'a>(
        &'a self,
        combo: &str,
    ) -> impl Iterator<Item = (&'a str, &'a NormalizedStat)> + 'a {
        self.combos.get(combo).into_iter().flat_map(|areas| {
            areas
                .iter()
                .filter(|(name, _)| name.as_str() != TOTAL_KEY)
                .map(|(name, stat)| (name.as_str(), stat))
        })
    }

    /// The synthetic dataset-wide aggregate for one combination key.
    pub fn total(&self, combo: &str) -> Option<&NormalizedStat> {
        self.combos.get(combo)?.get(TOTAL_KEY)
    }
}

/// Features array of an RFC 7946 feature collection, empty when the
/// payload has no recognizable feature list.
pub(crate) fn features_of(payload: &Value) -> &[Value] {
    payload
        .get("features")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub(crate) fn properties_of(feature: &Value) -> Option<&Map<String, Value>> {
    feature.get("properties").and_then(Value::as_object)
}
