//! Pipeline parameters, resolved from the command line and environment.

use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use tracing::{debug, info};

use crate::storage::AgeFilter;

/// Where the bucket lives and how hard to retry against it.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub region: String,
    pub bucket: String,
    pub endpoint: Option<String>,
    pub local_root: Option<PathBuf>,
    pub max_retries: usize,
    pub retry_delay: Duration,
}

impl StoreConfig {
    pub fn trace_loaded(&self) {
        match &self.local_root {
            Some(root) => info!(local_root = %root.display(), "Using local directory store"),
            None => info!(
                region = %self.region,
                bucket = %self.bucket,
                endpoint = self.endpoint.as_deref().unwrap_or("aws"),
                max_retries = self.max_retries,
                "Using S3 store"
            ),
        }
        debug!(?self, "Store config loaded (full debug)");
    }
}

#[derive(Debug, Clone)]
pub struct CleanConfig {
    /// Number of site files handed to one worker.
    pub map_list_size: usize,
    /// Upper bound on site files considered in one run.
    pub total_processed: usize,
    pub age_filter: AgeFilter,
    pub workers: usize,
}

impl CleanConfig {
    pub fn trace_loaded(&self) {
        info!(
            map_list_size = self.map_list_size,
            total_processed = self.total_processed,
            age_filter = ?self.age_filter,
            workers = self.workers,
            "Loaded clean config"
        );
    }
}

#[derive(Debug, Clone)]
pub struct CalcConfig {
    /// Recalculate years that already have an average file.
    pub calc_all: bool,
    /// Year averages passing this filter count as finished.
    pub age_filter: AgeFilter,
    pub workers: usize,
}

impl CalcConfig {
    pub fn trace_loaded(&self) {
        info!(
            calc_all = self.calc_all,
            age_filter = ?self.age_filter,
            workers = self.workers,
            "Loaded calc config"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetchSource {
    /// One request per site file from the `access` listing
    Access,
    /// One tarball per year from the `archive` listing
    Archive,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Explicit years, or every year in the NCEI index when `None`.
    pub years: Option<Vec<String>>,
    pub source: FetchSource,
    pub overwrite: bool,
    pub workers: usize,
    pub max_retries: u32,
}

impl FetchConfig {
    pub fn trace_loaded(&self) {
        info!(
            years = self.years.as_ref().map(|y| y.len()).unwrap_or(0),
            source = ?self.source,
            overwrite = self.overwrite,
            workers = self.workers,
            "Loaded fetch config"
        );
        debug!(?self, "Fetch config loaded (full debug)");
    }
}

/// Parses a year selection such as `1929,1930,2000-2005`.
pub fn parse_years(selection: &str) -> Result<Vec<String>> {
    let mut years = Vec::new();

    for part in selection.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_year(start)?;
                let end = parse_year(end)?;
                if start > end {
                    return Err(anyhow!("Year range `{}` runs backwards", part));
                }
                years.extend((start..=end).map(|y| y.to_string()));
            }
            None => years.push(parse_year(part)?.to_string()),
        }
    }

    years.sort();
    years.dedup();

    if years.is_empty() {
        return Err(anyhow!("No years in selection `{}`", selection));
    }

    Ok(years)
}

fn parse_year(s: &str) -> Result<u16> {
    let s = s.trim();
    match s.parse::<u16>() {
        Ok(year) if s.len() == 4 => Ok(year),
        _ => Err(anyhow!("`{}` is not a four digit year", s)),
    }
}

// -- Tests -------------------------------------------------------------------
