use serde_json::Value;

use active_travel_stats::counters::countline::bucket_countline_payload;
use active_travel_stats::counters::flow::{FlowWindow, bucket_flow_payload};
use active_travel_stats::counters::sites::{
    CounterVendor, combine, normalize_sites, normalize_traffic,
};
use active_travel_stats::reshape::TOTAL_KEY;
use active_travel_stats::reshape::census::{BoundaryKey, reshape_census};
use active_travel_stats::view;

fn fixture(raw: &str) -> Value {
    serde_json::from_str(raw).expect("fixture is valid JSON")
}

#[test]
fn test_census_pipeline() {
    let payload = fixture(include_str!("fixtures/census_lea.json"));
    let table = reshape_census(&payload, BoundaryKey::LocalElectoralArea);

    assert_eq!(table.area_count, 3);
    // every combination holds all areas plus the synthetic total
    assert_eq!(table.combos.len(), 12);
    for areas in table.combos.values() {
        assert_eq!(areas.len(), 4);
    }

    let combo = "cycling_work_school_college_2022";
    let total = table.total(combo).unwrap();
    assert_eq!(total.raw, 520.0 + 980.0 + 1500.0);
    assert_eq!(total.total, 13000.0 + 14000.0);
    // population-weighted aggregate, zero-denominator area included
    assert!((total.percentage - 3000.0 / 27000.0 * 100.0).abs() < 1e-9);

    // per-area invariant: percentage recomputed from raw/total
    for (_, stat) in table.areas(combo) {
        if stat.total > 0.0 {
            assert!((stat.percentage - stat.raw / stat.total * 100.0).abs() < 1e-9);
        } else {
            assert_eq!(stat.percentage, 0.0);
        }
    }

    // the zero-denominator area pins the scale floor; _TOTAL is excluded
    let scale = view::choropleth_scale(&table, combo).unwrap();
    assert_eq!(scale.min, 0.0);
    assert!((scale.max - 7.0).abs() < 1e-9);
}

#[test]
fn test_countline_pipeline() {
    let payload = fixture(include_str!("fixtures/countline_timeseries.json"));
    let series = bucket_countline_payload(&payload, 3).unwrap();

    let hourly = series.hourly_averages.as_ref().unwrap();
    // hour 8 observed on three distinct days: (79 + 86 + 70) / 3
    assert!((hourly.pedestrian[8].average_daily_count - 235.0 / 3.0).abs() < 1e-9);
    // hour 9 observed once, still averaged over the three observed days
    assert!((hourly.pedestrian[9].average_daily_count - 50.0 / 3.0).abs() < 1e-9);
    assert!((hourly.bike[8].average_daily_count - 39.0).abs() < 1e-9);

    // most recent three days, chronological order
    let daily: Vec<f64> = series.daily.pedestrian.iter().map(|p| p.value).collect();
    assert_eq!(daily, vec![820.0, 910.0, 870.0]);

    // share denominator covers every traffic class, not just the tracked two
    let all_traffic = 5535.0 + 6022.0 + 5740.0;
    assert!((series.summary.pedestrian_percentage - 2600.0 / all_traffic * 100.0).abs() < 1e-9);
    assert!((series.summary.cyclist_percentage - 990.0 / all_traffic * 100.0).abs() < 1e-9);
    assert!(!series.summary.approximate);
    assert_eq!(series.summary.days_of_data, 7);

    // nothing in the output may be NaN
    for hour in hourly.pedestrian.iter().chain(hourly.bike.iter()) {
        assert!(hour.average_daily_count.is_finite());
    }
}

#[test]
fn test_countline_pipeline_is_idempotent() {
    let payload = fixture(include_str!("fixtures/countline_timeseries.json"));
    let first = bucket_countline_payload(&payload, 3).unwrap();
    let second = bucket_countline_payload(&payload, 3).unwrap();
    assert_eq!(first.hourly_averages, second.hourly_averages);
    assert_eq!(first.daily, second.daily);
}

#[test]
fn test_flow_pipeline() {
    let payload = fixture(include_str!("fixtures/flow_timeseries.json"));
    let series = bucket_flow_payload(&payload, FlowWindow::default()).unwrap();

    // both directions merge: (90 total * 4 intervals) / 30 days
    assert!((series.hourly_averages.pedestrian[8].average_daily_count - 12.0).abs() < 1e-9);
    assert!((series.hourly_averages.bike[9].average_daily_count - 1.6).abs() < 1e-9);

    let monthly = series.monthly.unwrap();
    let bike: Vec<f64> = monthly.bike.iter().map(|p| p.value).collect();
    // three different record shapes, sorted chronologically
    assert_eq!(bike, vec![204140.0, 189300.0, 168200.0]);

    assert_eq!(series.summary.total_pedestrian_data_points, 6);
    assert_eq!(series.summary.total_bike_data_points, 2);
}

#[test]
fn test_counter_pipeline() {
    let sites_payload = fixture(include_str!("fixtures/counter_sites.json"));
    let traffic_payload = fixture(include_str!("fixtures/counter_traffic.json"));

    let sites = normalize_sites(&sites_payload, CounterVendor::Flow);
    // the site without coordinates is skipped
    assert_eq!(sites.len(), 2);

    let readings = normalize_traffic(&traffic_payload, &sites);
    // the reading for an unknown site still normalizes, with a fallback name
    assert_eq!(readings.len(), 4);
    assert_eq!(readings[3].site_name, "Site 999999999");

    let combined = combine(&sites, &readings);
    assert_eq!(combined.len(), 2);
    let greenway = combined
        .iter()
        .find(|c| c.site.name == "Grand Canal Greenway")
        .unwrap();
    assert_eq!(greenway.total_traffic, 1450.0 + 620.0);
    assert_eq!(greenway.traffic.len(), 2);

    let markers = view::counter_markers(&combined);
    assert_eq!(markers.markers.len(), 2);
    let scale = markers.scale.unwrap();
    assert_eq!(scale.min, 2070.0);
    assert_eq!(scale.max, 2890.0);
}

#[test]
fn test_stat_table_serializes_with_total_entry() {
    let payload = fixture(include_str!("fixtures/census_lea.json"));
    let table = reshape_census(&payload, BoundaryKey::LocalElectoralArea);
    let rendered = serde_json::to_value(&table).unwrap();

    let combo = &rendered["combos"]["cycling_work_school_college_2022"];
    assert!(combo.get(TOTAL_KEY).is_some());
    assert!(combo.get("Artane-Whitehall").is_some());
}
