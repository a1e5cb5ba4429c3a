//! Field extraction from raw property bags.
//!
//! Every source ships a flat JSON object per entity, each with its own
//! field-naming convention. The helpers here pull values out of those bags
//! with zero-defaulting (a missing or malformed field is 0, never an
//! error), and build the literal column names for the census and
//! mobility-report datasets.

use serde_json::{Map, Value};

use crate::stats::NormalizedStat;

/// Numeric value of a JSON field. Numbers pass through; numeric strings
/// are parsed (one source serializes counts and coordinates as strings);
/// anything else is 0.0.
pub fn value_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// String form of a JSON scalar, used for identifiers that arrive as
/// either strings or numbers depending on the vendor.
pub fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric field of a property bag, 0.0 when missing.
pub fn field_f64(properties: &Map<String, Value>, name: &str) -> f64 {
    properties.get(name).map(value_f64).unwrap_or(0.0)
}

/// String field of a property bag.
pub fn field_str<'a>(properties: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    properties.get(name).and_then(Value::as_str)
}

/// Boolean-ish flag: `true`, or the number 1.
pub fn field_flag(properties: &Map<String, Value>, name: &str) -> bool {
    match properties.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() == Some(1.0),
        _ => false,
    }
}

/// Display label for a categorical field, `"Unknown"` when absent.
pub fn field_label(properties: &Map<String, Value>, name: &str) -> String {
    properties
        .get(name)
        .and_then(value_string)
        .unwrap_or_else(|| "Unknown".to_string())
}

/// How a dataset derives its percentage denominator.
///
/// Census columns state their own total; the mobility report does not, so
/// its trip shares divide by the sum over every competing mode. A dataset
/// commits to one policy — mixing them within one table produces
/// percentages that are not comparable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenominatorPolicy {
    /// The denominator is a single stated total column.
    SingleField(String),
    /// The denominator is the sum of an exhaustive list of columns.
    SumOfEnumeratedFields(Vec<String>),
}

impl DenominatorPolicy {
    pub fn resolve(&self, properties: &Map<String, Value>) -> f64 {
        match self {
            DenominatorPolicy::SingleField(name) => field_f64(properties, name),
            DenominatorPolicy::SumOfEnumeratedFields(names) => {
                names.iter().map(|name| field_f64(properties, name)).sum()
            }
        }
    }
}

/// Commute modes tracked by the census dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CensusMode {
    Cycling,
    Walking,
}

impl CensusMode {
    pub const ALL: [CensusMode; 2] = [CensusMode::Cycling, CensusMode::Walking];

    /// Literal fragment used in the census column names.
    pub fn column_fragment(self) -> &'static str {
        match self {
            CensusMode::Cycling => "Bicycle",
            CensusMode::Walking => "On foot",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            CensusMode::Cycling => "cycling",
            CensusMode::Walking => "walking",
        }
    }
}

/// Commute-destination axis of the census dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOfBusiness {
    WorkSchoolCollege,
    Work,
    SchoolCollege,
}

impl PlaceOfBusiness {
    pub const ALL: [PlaceOfBusiness; 3] = [
        PlaceOfBusiness::WorkSchoolCollege,
        PlaceOfBusiness::Work,
        PlaceOfBusiness::SchoolCollege,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PlaceOfBusiness::WorkSchoolCollege => "work_school_college",
            PlaceOfBusiness::Work => "work",
            PlaceOfBusiness::SchoolCollege => "school_college",
        }
    }

    fn mode_column(self, fragment: &str, suffix: &str) -> String {
        match self {
            PlaceOfBusiness::WorkSchoolCollege => format!("{fragment} - Total{suffix}"),
            PlaceOfBusiness::Work => format!("{fragment} - Work{suffix}"),
            PlaceOfBusiness::SchoolCollege => {
                format!("{fragment} - School, college or childcare{suffix}")
            }
        }
    }

    fn total_column(self, suffix: &str) -> String {
        match self {
            PlaceOfBusiness::WorkSchoolCollege => format!("Total{suffix}"),
            PlaceOfBusiness::Work => format!("Total - Work{suffix}"),
            PlaceOfBusiness::SchoolCollege => {
                format!("Total - School, college or childcare{suffix}")
            }
        }
    }
}

/// Census years present in the boundary files. The 2016 columns carry a
/// `_16` suffix; the 2022 columns are unsuffixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CensusYear {
    Y2016,
    Y2022,
}

impl CensusYear {
    pub const ALL: [CensusYear; 2] = [CensusYear::Y2016, CensusYear::Y2022];

    pub fn column_suffix(self) -> &'static str {
        match self {
            CensusYear::Y2016 => "_16",
            CensusYear::Y2022 => "",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            CensusYear::Y2016 => "2016",
            CensusYear::Y2022 => "2022",
        }
    }
}

/// Extracts one mode/place/year statistic from a census property bag.
///
/// Census columns carry their own stated denominator, so this is the
/// [`DenominatorPolicy::SingleField`] policy.
pub fn census_stat(
    properties: &Map<String, Value>,
    mode: CensusMode,
    place: PlaceOfBusiness,
    year: CensusYear,
) -> NormalizedStat {
    let suffix = year.column_suffix();
    let raw = field_f64(properties, &place.mode_column(mode.column_fragment(), suffix));
    let policy = DenominatorPolicy::SingleField(place.total_column(suffix));
    NormalizedStat::from_parts(raw, policy.resolve(properties))
}

/// Transport modes present in the mobility report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobilityMode {
    Automobile,
    Bus,
    Cycling,
    Walking,
    Rail,
    Tram,
}

impl MobilityMode {
    pub const ALL: [MobilityMode; 6] = [
        MobilityMode::Automobile,
        MobilityMode::Bus,
        MobilityMode::Cycling,
        MobilityMode::Walking,
        MobilityMode::Rail,
        MobilityMode::Tram,
    ];

    pub fn column_prefix(self) -> &'static str {
        match self {
            MobilityMode::Automobile => "AUTOMOBILE",
            MobilityMode::Bus => "BUS",
            MobilityMode::Cycling => "CYCLING",
            MobilityMode::Walking => "ON FOOT",
            MobilityMode::Rail => "RAIL",
            MobilityMode::Tram => "TRAM",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            MobilityMode::Automobile => "automobile",
            MobilityMode::Bus => "bus",
            MobilityMode::Cycling => "cycling",
            MobilityMode::Walking => "walking",
            MobilityMode::Rail => "rail",
            MobilityMode::Tram => "tram",
        }
    }
}

/// Metrics reported per mode in the mobility report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobilityMetric {
    Trips,
    Distance,
    Co2,
}

impl MobilityMetric {
    pub const ALL: [MobilityMetric; 3] = [
        MobilityMetric::Trips,
        MobilityMetric::Distance,
        MobilityMetric::Co2,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MobilityMetric::Trips => "trips",
            MobilityMetric::Distance => "distance",
            MobilityMetric::Co2 => "co2",
        }
    }

    fn column_suffix(self, scope: MobilityScope) -> String {
        match self {
            MobilityMetric::Trips => "trips".to_string(),
            MobilityMetric::Distance => format!("{}_distance_km", scope.key()),
            MobilityMetric::Co2 => format!("{}_co2e_tons", scope.key()),
        }
    }
}

/// Geographic scope axis: the full journey, or only the portion inside
/// the reporting boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobilityScope {
    Full,
    Gpc,
}

impl MobilityScope {
    pub const ALL: [MobilityScope; 2] = [MobilityScope::Full, MobilityScope::Gpc];

    pub fn key(self) -> &'static str {
        match self {
            MobilityScope::Full => "full",
            MobilityScope::Gpc => "gpc",
        }
    }
}

/// Literal column name for one mode/metric/scope cell of the mobility
/// report, e.g. `AUTOMOBILE_full_distance_km` or `ON FOOT_trips`.
pub fn mobility_column(mode: MobilityMode, metric: MobilityMetric, scope: MobilityScope) -> String {
    format!("{}_{}", mode.column_prefix(), metric.column_suffix(scope))
}

/// Raw value of one mobility-report cell, 0.0 when the column is absent.
pub fn mobility_raw(
    properties: &Map<String, Value>,
    mode: MobilityMode,
    metric: MobilityMetric,
    scope: MobilityScope,
) -> f64 {
    field_f64(properties, &mobility_column(mode, metric, scope))
}

/// Denominator policy for mobility trip shares: the report states no
/// total column, so the denominator is the sum over every mode.
pub fn mobility_trips_policy(scope: MobilityScope) -> DenominatorPolicy {
    DenominatorPolicy::SumOfEnumeratedFields(
        MobilityMode::ALL
            .iter()
            .map(|mode| mobility_column(*mode, MobilityMetric::Trips, scope))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_census_stat_work_school_college() {
        let properties = props(json!({"Bicycle - Total": 40, "Total": 200}));
        let stat = census_stat(
            &properties,
            CensusMode::Cycling,
            PlaceOfBusiness::WorkSchoolCollege,
            CensusYear::Y2022,
        );
        assert_eq!(stat.raw, 40.0);
        assert_eq!(stat.total, 200.0);
        assert!((stat.percentage - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_census_stat_year_suffix() {
        let properties = props(json!({
            "On foot - Work_16": 30,
            "Total - Work_16": 120,
            "On foot - Work": 99,
            "Total - Work": 100
        }));
        let stat = census_stat(
            &properties,
            CensusMode::Walking,
            PlaceOfBusiness::Work,
            CensusYear::Y2016,
        );
        assert_eq!(stat.raw, 30.0);
        assert_eq!(stat.total, 120.0);
        assert!((stat.percentage - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_census_stat_missing_fields_default_to_zero() {
        let properties = props(json!({}));
        let stat = census_stat(
            &properties,
            CensusMode::Cycling,
            PlaceOfBusiness::SchoolCollege,
            CensusYear::Y2022,
        );
        assert_eq!(stat.raw, 0.0);
        assert_eq!(stat.total, 0.0);
        assert_eq!(stat.percentage, 0.0);
    }

    #[test]
    fn test_field_f64_parses_numeric_strings() {
        let properties = props(json!({"count": "12.5", "junk": "n/a", "null": null}));
        assert_eq!(field_f64(&properties, "count"), 12.5);
        assert_eq!(field_f64(&properties, "junk"), 0.0);
        assert_eq!(field_f64(&properties, "null"), 0.0);
        assert_eq!(field_f64(&properties, "absent"), 0.0);
    }

    #[test]
    fn test_mobility_column_names() {
        assert_eq!(
            mobility_column(
                MobilityMode::Walking,
                MobilityMetric::Trips,
                MobilityScope::Full
            ),
            "ON FOOT_trips"
        );
        assert_eq!(
            mobility_column(
                MobilityMode::Automobile,
                MobilityMetric::Distance,
                MobilityScope::Gpc
            ),
            "AUTOMOBILE_gpc_distance_km"
        );
        assert_eq!(
            mobility_column(
                MobilityMode::Bus,
                MobilityMetric::Co2,
                MobilityScope::Full
            ),
            "BUS_full_co2e_tons"
        );
    }

    #[test]
    fn test_sum_of_enumerated_fields_policy() {
        let properties = props(json!({
            "AUTOMOBILE_trips": 60,
            "CYCLING_trips": 25,
            "ON FOOT_trips": 15
        }));
        let total = mobility_trips_policy(MobilityScope::Full).resolve(&properties);
        assert_eq!(total, 100.0);
    }
}
