//! Output formatting and persistence for normalized statistics.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::reshape::StatTable;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs a view-model using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Prints a view-model as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One flattened CSV row of a [`StatTable`].
#[derive(Debug, Serialize)]
struct StatRow<'a> {
    combination: &'a str,
    area: &'a str,
    raw: f64,
    percentage: f64,
    total: f64,
}

/// Appends every row of a table to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_stat_rows(path: &str, table: &StatTable) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV rows");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for (combination, areas) in &table.combos {
        for (area, stat) in areas {
            writer.serialize(StatRow {
                combination,
                area,
                raw: stat.raw,
                percentage: stat.percentage,
                total: stat.total,
            })?;
        }
    }
    writer.flush()?;

    Ok(())
}
