//! Mobility-report reshaper.
//!
//! The report ships one feature per named area with `MODE_metric` columns.
//! Trip counts get a share-of-all-modes percentage; distance and CO2 are
//! raw quantities only, so their stats carry a zero denominator.

use serde_json::Value;
use tracing::debug;

use super::census::BoundaryKey;
use super::{StatTable, features_of, properties_of};
use crate::extract::{
    MobilityMetric, MobilityMode, MobilityScope, field_str, mobility_raw, mobility_trips_policy,
};
use crate::stats::NormalizedStat;

/// Composite key for one mobility combination, e.g. `cycling_trips_full`.
pub fn mobility_combo_key(
    mode: MobilityMode,
    metric: MobilityMetric,
    scope: MobilityScope,
) -> String {
    format!("{}_{}_{}", mode.key(), metric.key(), scope.key())
}

/// Reshapes mobility-report features into a [`StatTable`].
///
/// For the trips metric every mode's denominator is the all-mode trip sum
/// of that area and scope; the synthesized `_TOTAL` percentage is then the
/// dataset-wide mode share.
pub fn reshape_mobility(payload: &Value) -> StatTable {
    let mut table = StatTable::default();

    for mode in MobilityMode::ALL {
        for metric in MobilityMetric::ALL {
            for scope in MobilityScope::ALL {
                table.init_combo(mobility_combo_key(mode, metric, scope));
            }
        }
    }

    for feature in features_of(payload) {
        let Some(properties) = properties_of(feature) else {
            continue;
        };
        let Some(area) = field_str(properties, BoundaryKey::NamedArea.property()) else {
            debug!("mobility feature without area name skipped");
            continue;
        };

        for scope in MobilityScope::ALL {
            let all_mode_trips = mobility_trips_policy(scope).resolve(properties);

            for mode in MobilityMode::ALL {
                for metric in MobilityMetric::ALL {
                    let raw = mobility_raw(properties, mode, metric, scope);
                    let stat = match metric {
                        MobilityMetric::Trips => NormalizedStat::from_parts(raw, all_mode_trips),
                        _ => NormalizedStat::from_parts(raw, 0.0),
                    };
                    table.insert(&mobility_combo_key(mode, metric, scope), area, stat);
                }
            }
        }
    }

    table.synthesize_totals();
    table
}
