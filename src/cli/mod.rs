//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::{ArgAction, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    config::{parse_years, CalcConfig, CleanConfig, FetchConfig, FetchSource, StoreConfig},
    storage::AgeFilter,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// AWS region of the bucket
    #[arg(long, env = "REGION_NAME", default_value = "us-east-1", global = true)]
    pub region: String,

    /// Bucket holding the site files
    #[arg(long, env = "BUCKET_NAME", default_value = "noaa-temperature-data", global = true)]
    pub bucket: String,

    /// S3 compatible endpoint, e.g. a local MinIO
    #[arg(long, env = "S3_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Use a local directory as the bucket
    #[arg(long, env = "GSOD_LOCAL_ROOT", global = true)]
    pub local_root: Option<PathBuf>,

    /// Tasks in flight at once
    #[arg(long, env = "GSOD_WORKERS", default_value_t = 16,
          value_parser = clap::value_parser!(u16).range(1..), global = true)]
    pub workers: u16,

    /// Retries for failed bucket and HTTP requests
    #[arg(long, env = "GSOD_MAX_RETRIES", default_value_t = 5, global = true)]
    pub max_retries: u32,

    /// Initial delay between retries, in seconds
    #[arg(long, env = "GSOD_RETRY_DELAY", default_value_t = 5, global = true)]
    pub retry_delay: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "GSOD_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

impl GlobalArgs {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            region: self.region.clone(),
            bucket: self.bucket.clone(),
            endpoint: self.endpoint.clone(),
            local_root: self.local_root.clone(),
            max_retries: self.max_retries as usize,
            retry_delay: Duration::from_secs(self.retry_delay),
        }
    }

    pub fn workers(&self) -> usize {
        usize::from(self.workers)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download GSOD site files from NCEI into the bucket
    Fetch(FetchArgs),
    /// Quarantine site files with bad spatial data
    Clean(CleanArgs),
    /// Write yearly site averages
    Calc {
        #[command(flatten)]
        age: AgeArgs,
        #[command(flatten)]
        calc: CalcArgs,
    },
    /// Clean, then calculate yearly averages
    Run {
        #[command(flatten)]
        clean: CleanArgs,
        #[command(flatten)]
        calc: CalcArgs,
    },
    /// Export yearly averages to a parquet file
    Export {
        /// Output file, defaults to the home directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Years to fetch, e.g. `1929,2000-2005`; all years when omitted
    #[arg(long)]
    pub years: Option<String>,

    #[arg(long, value_enum, default_value_t = FetchSource::Access)]
    pub source: FetchSource,

    /// Download files that are already in the bucket
    #[arg(long)]
    pub overwrite: bool,
}

impl FetchArgs {
    pub fn to_config(&self, global: &GlobalArgs) -> anyhow::Result<FetchConfig> {
        let years = self.years.as_deref().map(parse_years).transpose()?;

        Ok(FetchConfig {
            years,
            source: self.source,
            overwrite: self.overwrite,
            workers: global.workers(),
            max_retries: global.max_retries,
        })
    }
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Site files handed to one worker
    #[arg(long, env = "MAP_LIST_SIZE", default_value_t = 1000,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub map_list_size: u64,

    /// Most site files considered in one run
    #[arg(long, env = "TOTAL_PROCESSED", default_value_t = 50000)]
    pub total_processed: u64,

    #[command(flatten)]
    pub age: AgeArgs,
}

impl CleanArgs {
    pub fn to_config(&self, global: &GlobalArgs) -> CleanConfig {
        CleanConfig {
            map_list_size: self.map_list_size as usize,
            total_processed: self.total_processed as usize,
            age_filter: self.age.filter(),
            workers: global.workers(),
        }
    }
}

/// Which site files and year averages count as recently handled.
#[derive(Args, Debug)]
pub struct AgeArgs {
    /// Age threshold in minutes
    #[arg(long, env = "MINUTES_OLD", default_value_t = 1)]
    pub minutes_old: u32,

    /// Pick objects newer than the threshold (true) or older (false)
    #[arg(long, env = "TIME_LESS_THAN", default_value_t = true, action = ArgAction::Set)]
    pub time_less_than: bool,
}

impl AgeArgs {
    pub fn filter(&self) -> AgeFilter {
        AgeFilter::from_minutes(self.minutes_old, self.time_less_than)
    }
}

#[derive(Args, Debug)]
pub struct CalcArgs {
    /// Recalculate years that already have an average file
    #[arg(long, env = "CALC_ALL_YEARS")]
    pub calc_all: bool,
}

impl CalcArgs {
    /// `age_filter` picks the year averages that count as finished.
    pub fn to_config(&self, global: &GlobalArgs, age_filter: AgeFilter) -> CalcConfig {
        CalcConfig {
            calc_all: self.calc_all,
            age_filter,
            workers: global.workers(),
        }
    }
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    ProgressBar::new(size).with_message(message).with_style(
        ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .unwrap()
            .progress_chars("##-"),
    )
}

// -- Tests -------------------------------------------------------------------
