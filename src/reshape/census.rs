//! Census commute-mode reshaper.
//!
//! Builds the statistic-first table the choropleth reads: every
//! mode/place/year combination is materialized for every area, then the
//! dataset-wide `_TOTAL` aggregate is synthesized per combination.

use serde_json::Value;
use tracing::debug;

use super::{StatTable, features_of, properties_of};
use crate::extract::{CensusMode, CensusYear, PlaceOfBusiness, census_stat, field_str};

/// Which property names the area in a boundary dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKey {
    /// Local electoral area boundaries.
    LocalElectoralArea,
    /// Electoral division boundaries.
    ElectoralDivision,
    /// Named-area boundaries used by the mobility report.
    NamedArea,
}

impl BoundaryKey {
    pub fn property(self) -> &'static str {
        match self {
            BoundaryKey::LocalElectoralArea => "CSO_LEA",
            BoundaryKey::ElectoralDivision => "ED_ENGLISH",
            BoundaryKey::NamedArea => "ENG_NAME_VALUE",
        }
    }
}

/// Composite key for one census combination, e.g. `cycling_work_2016`.
pub fn combo_key(mode: CensusMode, place: PlaceOfBusiness, year: CensusYear) -> String {
    format!("{}_{}_{}", mode.key(), place.key(), year.key())
}

/// Reshapes census features into a [`StatTable`].
///
/// Features missing the boundary property are skipped; areas whose stated
/// total is zero still appear (with a zero percentage) and still count
/// toward the aggregate.
pub fn reshape_census(payload: &Value, boundary: BoundaryKey) -> StatTable {
    let mut table = StatTable::default();

    for mode in CensusMode::ALL {
        for place in PlaceOfBusiness::ALL {
            for year in CensusYear::ALL {
                table.init_combo(combo_key(mode, place, year));
            }
        }
    }

    for feature in features_of(payload) {
        let Some(properties) = properties_of(feature) else {
            continue;
        };
        let Some(area) = field_str(properties, boundary.property()) else {
            debug!(
                property = boundary.property(),
                "feature without boundary name skipped"
            );
            continue;
        };

        for mode in CensusMode::ALL {
            for place in PlaceOfBusiness::ALL {
                for year in CensusYear::ALL {
                    table.insert(
                        &combo_key(mode, place, year),
                        area,
                        census_stat(properties, mode, place, year),
                    );
                }
            }
        }
    }

    table.synthesize_totals();
    table
}
