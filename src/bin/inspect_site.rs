#!/usr/bin/env rust
//! Site File Inspection Utility
//!
//! Downloads one GSOD site file from NCEI and reports:
//! - Column layout and row count
//! - Whether the spatial columns hold a single value for the year
//! - How many measurements carry NOAA's missing-value codes

use std::{collections::HashSet, io::Cursor, sync::Arc};

use anyhow::{anyhow, Result};
use arrow::{
    array::AsArray,
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use clap::Parser;

const ACCESS_ROOT: &str = "https://www.ncei.noaa.gov/data/global-summary-of-the-day/access";

#[derive(Parser)]
#[command(about = "Inspect one GSOD site file")]
struct Args {
    /// Year folder
    #[arg(default_value = "2020")]
    year: String,
    /// Station id, the file name without `.csv`
    #[arg(default_value = "01001099999")]
    station: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let url = format!("{}/{}/{}.csv", ACCESS_ROOT, args.year, args.station);

    println!("📦 Downloading {}", url);
    let response = reqwest::get(&url).await?;
    if !response.status().is_success() {
        return Err(anyhow!("Failed to download file: {}", response.status()));
    }
    let bytes = response.bytes().await?;
    println!("✅ Downloaded {} bytes\n", bytes.len());

    let batch = read_text_table(&bytes)?;

    println!("📊 File Statistics:");
    println!("  • Rows: {}", batch.num_rows());
    println!("  • Columns: {}", batch.num_columns());

    println!("\n📋 Columns:");
    for field in batch.schema().fields() {
        println!("  • {}", field.name());
    }

    println!("\n🌍 Spatial Columns:");
    for name in ["STATION", "LATITUDE", "LONGITUDE", "ELEVATION"] {
        report_unique(&batch, name);
    }

    println!("\n🌡️ Missing Values:");
    for (name, sentinel) in [
        ("TEMP", "9999.9"),
        ("DEWP", "9999.9"),
        ("STP", "9999.9"),
        ("MIN", "9999.9"),
        ("MAX", "9999.9"),
        ("PRCP", "99.99"),
    ] {
        report_missing(&batch, name, sentinel);
    }

    Ok(())
}

fn read_text_table(bytes: &[u8]) -> Result<RecordBatch> {
    let (inferred, _) = Format::default()
        .with_header(true)
        .infer_schema(Cursor::new(bytes), Some(0))?;
    let schema = Arc::new(Schema::new(
        inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name().trim(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(Cursor::new(bytes))?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;

    Ok(concat_batches(&schema, &batches)?)
}

/// Trimmed cells of a text column, `None` where the cell is blank.
fn cells<'a>(batch: &'a RecordBatch, name: &str) -> Option<Vec<Option<&'a str>>> {
    let column = batch.column_by_name(name)?.as_string_opt::<i32>()?;
    Some(
        column
            .iter()
            .map(|v| v.map(str::trim).filter(|v| !v.is_empty()))
            .collect(),
    )
}

/// Distinct values in a column, blank counting as one value, and whether any cell is blank.
fn distinct_values(batch: &RecordBatch, name: &str) -> Option<(usize, bool)> {
    let cells = cells(batch, name)?;
    let values: HashSet<Option<&str>> = cells.into_iter().collect();
    Some((values.len(), values.contains(&None)))
}

fn report_unique(batch: &RecordBatch, name: &str) {
    let Some((distinct, has_blank)) = distinct_values(batch, name) else {
        println!("  ❌ {} is missing", name);
        return;
    };

    let marker = if distinct == 1 && !has_blank { "✅" } else { "⚠️" };
    println!("  {} {}: {} distinct value(s)", marker, name, distinct);
}

fn report_missing(batch: &RecordBatch, name: &str, sentinel: &str) {
    let Some(cells) = cells(batch, name) else {
        println!("  ❌ {} is missing", name);
        return;
    };

    let missing = cells
        .iter()
        .filter(|v| v.map_or(true, |v| v == sentinel))
        .count();
    println!("  • {}: {} of {} days missing", name, missing, cells.len());
}
