//! CLI entry point for the active-travel statistics tool.
//!
//! Each subcommand loads one source payload (from a file path or URL),
//! runs the matching reshaper or bucketer, and prints the resulting
//! view-model as JSON.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use active_travel_stats::counters::countline::bucket_countline_payload;
use active_travel_stats::counters::flow::{FlowWindow, bucket_flow_payload};
use active_travel_stats::counters::sites::{
    CounterVendor, combine, normalize_sites, normalize_traffic,
};
use active_travel_stats::fetch::{BasicClient, auth::ApiKey, fetch_json};
use active_travel_stats::output::{append_stat_rows, print_json};
use active_travel_stats::reshape::census::{BoundaryKey, reshape_census};
use active_travel_stats::reshape::cordon::reshape_cordon;
use active_travel_stats::reshape::infrastructure::{
    reshape_bus_corridors, reshape_cycle_network, reshape_parking,
};
use active_travel_stats::reshape::mobility::reshape_mobility;
use active_travel_stats::reshape::strava::reshape_route_history;
use active_travel_stats::view;

#[derive(Parser)]
#[command(name = "active_travel_stats")]
#[command(about = "Aggregate and normalize active-travel statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BoundaryArg {
    /// Local electoral areas
    Lea,
    /// Electoral divisions
    Ed,
    /// Named areas (mobility-report boundaries)
    Named,
}

impl From<BoundaryArg> for BoundaryKey {
    fn from(arg: BoundaryArg) -> Self {
        match arg {
            BoundaryArg::Lea => BoundaryKey::LocalElectoralArea,
            BoundaryArg::Ed => BoundaryKey::ElectoralDivision,
            BoundaryArg::Named => BoundaryKey::NamedArea,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VendorArg {
    /// Flow-based counter network (15-minute interval flows)
    Flow,
    /// Countline counter network (directional class counts)
    Countline,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NetworkArg {
    /// Cycle-network layer
    CycleNetwork,
    /// Bus-corridor cycle lanes
    BusCorridors,
}

#[derive(Subcommand)]
enum Commands {
    /// Reshape census commute data into the per-area statistics table
    Census {
        /// Path to a GeoJSON file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Boundary dataset the features come from
        #[arg(short, long, value_enum, default_value = "lea")]
        boundary: BoundaryArg,

        /// CSV file to append flattened rows to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Reshape mobility-report data into the per-area statistics table
    Mobility {
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        #[arg(short, long)]
        output: Option<String>,
    },
    /// Join cordon counts with zone coordinates and emit markers
    Cordon {
        /// Cordon count records (file or URL)
        counts: String,

        /// Zone coordinate records (file or URL)
        zones: String,

        #[arg(short, long, default_value = "walking")]
        mode: String,

        #[arg(short, long, default_value = "2023")]
        year: String,
    },
    /// Combine counter sites with traffic readings and emit markers
    Counters {
        /// Site listing payload (file or URL)
        sites: String,

        /// Traffic readings payload (file or URL)
        traffic: String,

        #[arg(short, long, value_enum)]
        vendor: VendorArg,
    },
    /// Bucket a counter time-series payload into chart series
    Timeseries {
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        #[arg(short, long, value_enum)]
        vendor: VendorArg,

        /// Days covered by the flow network's hourly series
        #[arg(long, default_value_t = 30)]
        window_days: u32,

        /// Most recent days kept in the countline daily series
        #[arg(long, default_value_t = 30)]
        last_days: usize,
    },
    /// Summarize a cycling-infrastructure layer
    Infrastructure {
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        #[arg(short, long, value_enum, default_value = "cycle-network")]
        network: NetworkArg,
    },
    /// Summarize bicycle parking stands
    Parking {
        #[arg(value_name = "FILE_OR_URL")]
        source: String,
    },
    /// Pivot route ride histories into per-route chart series
    Routes {
        /// Per-date history records (file or URL)
        history: String,

        /// Route-name to geometry map (file or URL)
        geometries: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/active_travel_stats.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("active_travel_stats.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Census {
            source,
            boundary,
            output,
        } => {
            let payload = load_json(&source, None).await?;
            let table = reshape_census(&payload, boundary.into());
            info!(areas = table.area_count, "census table built");
            if let Some(path) = output {
                append_stat_rows(&path, &table)?;
            }
            print_json(&table)?;
        }
        Commands::Mobility { source, output } => {
            let payload = load_json(&source, None).await?;
            let table = reshape_mobility(&payload);
            info!(areas = table.area_count, "mobility table built");
            if let Some(path) = output {
                append_stat_rows(&path, &table)?;
            }
            print_json(&table)?;
        }
        Commands::Cordon {
            counts,
            zones,
            mode,
            year,
        } => {
            let count_records = load_records(&counts).await?;
            let zone_records = load_records(&zones).await?;
            let data = reshape_cordon(&count_records, &zone_records);
            let markers = view::cordon_markers(&data, &mode, &year);
            info!(
                locations = data.by_location.len(),
                markers = markers.markers.len(),
                "cordon data combined"
            );
            print_json(&json!({
                "markers": markers,
                "yearly_totals": data.yearly_totals,
            }))?;
        }
        Commands::Counters {
            sites,
            traffic,
            vendor,
        } => {
            let vendor_kind = match vendor {
                VendorArg::Flow => CounterVendor::Flow,
                VendorArg::Countline => CounterVendor::Countline,
            };
            let site_payload = load_json(&sites, vendor_client(vendor)).await?;
            let traffic_payload = load_json(&traffic, vendor_client(vendor)).await?;

            let locations = normalize_sites(&site_payload, vendor_kind);
            let readings = normalize_traffic(&traffic_payload, &locations);
            let combined = combine(&locations, &readings);
            info!(
                sites = locations.len(),
                readings = readings.len(),
                "counter data combined"
            );
            print_json(&view::counter_markers(&combined))?;
        }
        Commands::Timeseries {
            source,
            vendor,
            window_days,
            last_days,
        } => {
            let payload = load_json(&source, vendor_client(vendor)).await?;
            match vendor {
                VendorArg::Flow => {
                    let window = FlowWindow {
                        intervals_per_hour: 4,
                        window_days,
                    };
                    match bucket_flow_payload(&payload, window) {
                        Some(series) => {
                            let monthly = series.monthly.as_ref().map(view::chart_series);
                            print_json(&json!({
                                "hourly_averages": series.hourly_averages,
                                "monthly": monthly,
                                "summary": series.summary,
                            }))?;
                        }
                        None => warn!("payload has no hourly series"),
                    }
                }
                VendorArg::Countline => match bucket_countline_payload(&payload, last_days) {
                    Some(series) => {
                        print_json(&json!({
                            "hourly_averages": series.hourly_averages,
                            "daily": view::chart_series(&series.daily),
                            "summary": series.summary,
                        }))?;
                    }
                    None => warn!("payload has no recognizable time series"),
                },
            }
        }
        Commands::Infrastructure { source, network } => {
            let payload = load_json(&source, None).await?;
            match network {
                NetworkArg::CycleNetwork => match reshape_cycle_network(&payload) {
                    Some(summary) => print_json(&summary)?,
                    None => warn!("payload has no feature list"),
                },
                NetworkArg::BusCorridors => match reshape_bus_corridors(&payload) {
                    Some(summary) => print_json(&summary)?,
                    None => warn!("payload has no feature list"),
                },
            }
        }
        Commands::Parking { source } => {
            let records = load_records(&source).await?;
            print_json(&reshape_parking(&records))?;
        }
        Commands::Routes {
            history,
            geometries,
        } => {
            let history_records = load_records(&history).await?;
            let geometry_payload = load_json(&geometries, None).await?;
            let Some(geometry_map) = geometry_payload.as_object() else {
                warn!("geometry payload is not an object, nothing to do");
                return Ok(());
            };
            print_json(&reshape_route_history(&history_records, geometry_map))?;
        }
    }

    Ok(())
}

/// Authenticated client for a vendor API, keyed from the environment.
/// Both counter networks carry their key in a header.
fn vendor_client(vendor: VendorArg) -> Option<ApiKey<BasicClient>> {
    match vendor {
        VendorArg::Flow => std::env::var("ECO_API_KEY")
            .ok()
            .map(|key| ApiKey::x_api_key(BasicClient::new(), key)),
        VendorArg::Countline => std::env::var("COUNTLINE_API_KEY").ok().map(|key| ApiKey {
            inner: BasicClient::new(),
            header_name: "api-key".to_string(),
            key,
        }),
    }
}

/// Loads a payload from a local file path or fetches it over HTTP,
/// through the vendor's authenticated client when one is configured.
#[tracing::instrument(skip(client), fields(source = %source))]
async fn load_json(source: &str, client: Option<ApiKey<BasicClient>>) -> Result<Value> {
    if source.starts_with("http") {
        return match client {
            Some(client) => fetch_json(&client, source).await,
            None => fetch_json(&BasicClient::new(), source).await,
        };
    }
    Ok(serde_json::from_slice(&std::fs::read(source)?)?)
}

/// Loads a payload expected to be a flat JSON array of records.
async fn load_records(source: &str) -> Result<Vec<Value>> {
    let payload = load_json(source, None).await?;
    Ok(payload.as_array().cloned().unwrap_or_default())
}
