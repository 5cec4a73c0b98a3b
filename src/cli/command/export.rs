use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use crate::{
    average::{parse_year_csv, YearSiteAverage},
    cli::create_spinner,
    parquet,
    reading::{year_from_average_key, YEAR_AVERAGE_FOLDER},
    storage::{list_keys, read, AgeFilter, Store},
};

use super::make_parquet_file_name;

/// Collects every staged year average into one parquet file and returns its path.
pub async fn export(store: &Store, output: Option<PathBuf>) -> Result<String> {
    let bar = create_spinner("Reading year averages...".to_string());
    let rows = collect_year_averages(store).await?;
    bar.finish_with_message(format!("Read {} site averages", rows.len()));

    let file_path = match output {
        Some(path) => path,
        None => make_parquet_file_name("year-averages")?,
    };
    parquet::save_year_averages(&rows, &file_path)?;
    info!(rows = rows.len(), file = %file_path.display(), "Exported year averages");

    Ok(file_path.to_string_lossy().to_string())
}

async fn collect_year_averages(store: &Store) -> Result<Vec<YearSiteAverage>> {
    let keys = list_keys(store.as_ref(), YEAR_AVERAGE_FOLDER, AgeFilter::Any).await?;
    let mut rows = Vec::new();

    for key in keys {
        let Some(year) = year_from_average_key(&key).and_then(|y| y.parse::<u16>().ok()) else {
            warn!(key = %key, "Skipping file without a year in its name");
            continue;
        };
        let Some(bytes) = read(store.as_ref(), &key).await? else {
            continue;
        };

        match parse_year_csv(&bytes) {
            Ok(sites) => rows.extend(sites.into_iter().map(|site| YearSiteAverage { year, site })),
            Err(e) => warn!(key = %key, error = %e, "Skipping unreadable year average"),
        }
    }

    Ok(rows)
}

// -- Tests -------------------------------------------------------------------
