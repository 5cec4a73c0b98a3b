use std::{
    collections::BTreeSet,
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use futures::{stream, StreamExt};
use indicatif::ProgressBar;
use object_store::PutPayload;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::{
    cli::{create_progress_bar, create_spinner},
    config::{FetchConfig, FetchSource},
    download::{
        csv_files, download_with_progress, extract_tar, fetch_bytes, fetch_text, http_client,
        HttpClient,
    },
    scrape::{archive_url, site_links, site_url, year_links, year_listing_url, ACCESS_ROOT},
    storage::{self, AgeFilter, Store},
};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FetchSummary {
    pub years: usize,
    pub uploaded: usize,
    pub existing: usize,
    pub failed: usize,
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} years: {} files uploaded, {} already present, {} failed",
            self.years, self.uploaded, self.existing, self.failed
        )
    }
}

/// Downloads GSOD site files from NCEI and stores them as `{year}/{station}.csv`.
pub async fn fetch(store: &Store, config: &FetchConfig) -> Result<FetchSummary> {
    config.trace_loaded();
    let client = http_client(config.max_retries)?;

    let years = match &config.years {
        Some(years) => years.clone(),
        None => {
            let bar = create_spinner("Reading NCEI year index...".to_string());
            let index = fetch_text(&client, &format!("{}/", ACCESS_ROOT)).await?;
            let years = year_links(&index);
            bar.finish_with_message(format!("Found {} years", years.len()));
            years
        }
    };

    let mut summary = FetchSummary::default();
    for year in &years {
        let year_summary = match config.source {
            FetchSource::Access => fetch_access_year(store, &client, year, config).await?,
            FetchSource::Archive => fetch_archive_year(store, &client, year, config).await?,
        };
        info!(
            year = %year,
            uploaded = year_summary.uploaded,
            existing = year_summary.existing,
            failed = year_summary.failed,
            "Fetched year"
        );
        summary.uploaded += year_summary.uploaded;
        summary.existing += year_summary.existing;
        summary.failed += year_summary.failed;
        summary.years += 1;
    }

    Ok(summary)
}

async fn existing_files(store: &Store, year: &str) -> Result<BTreeSet<String>> {
    Ok(storage::list_keys(store.as_ref(), year, AgeFilter::Any)
        .await?
        .into_iter()
        .filter_map(|key| key.rsplit('/').next().map(str::to_string))
        .collect())
}

/// Files in the listing that still need downloading.
fn files_to_fetch(
    listed: Vec<String>,
    existing: &BTreeSet<String>,
    overwrite: bool,
) -> (Vec<String>, usize) {
    if overwrite {
        return (listed, 0);
    }
    let (present, missing): (Vec<String>, Vec<String>) =
        listed.into_iter().partition(|name| existing.contains(name));
    (missing, present.len())
}

async fn fetch_access_year(
    store: &Store,
    client: &HttpClient,
    year: &str,
    config: &FetchConfig,
) -> Result<FetchSummary> {
    let listing = fetch_text(client, &year_listing_url(year)).await?;
    let existing = existing_files(store, year).await?;
    let (todo, already) = files_to_fetch(site_links(&listing), &existing, config.overwrite);

    let pb = create_progress_bar(todo.len() as u64, format!("Downloading {}", year));
    let results: Vec<bool> = stream::iter(todo)
        .map(|file_name| {
            let pb = pb.clone();
            async move {
                let ok = fetch_site(store, client, year, &file_name).await;
                pb.inc(1);
                ok
            }
        })
        .buffer_unordered(config.workers.max(1))
        .collect()
        .await;
    pb.finish_with_message(format!("{} downloaded", year));

    Ok(tally(&results, already))
}

async fn fetch_site(store: &Store, client: &HttpClient, year: &str, file_name: &str) -> bool {
    let key = format!("{}/{}", year, file_name);

    let result = match fetch_bytes(client, &site_url(year, file_name)).await {
        Ok(bytes) => storage::put(store.as_ref(), &key, PutPayload::from(bytes)).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            let message = format!("{e:#}");
            warn!(key = %key, error = %message, "Failed to fetch site file");
            false
        }
    }
}

async fn fetch_archive_year(
    store: &Store,
    client: &HttpClient,
    year: &str,
    config: &FetchConfig,
) -> Result<FetchSummary> {
    let tmp_dir = TempDir::new()?;
    let archive_path = tmp_dir.path().join(format!("{}.tar.gz", year));

    let bar = create_spinner(format!("Downloading {} archive...", year));
    download_with_progress(client, &archive_url(year), &archive_path, &bar).await?;
    bar.finish_with_message(format!("{} archive downloaded", year));

    let extract_dir = tmp_dir.path().join(year);
    fs::create_dir_all(&extract_dir)?;
    extract_tar(&archive_path, &extract_dir)?;

    let existing = existing_files(store, year).await?;
    let (todo, already) = extracted_to_upload(&extract_dir, &existing, config.overwrite)?;

    let pb = create_progress_bar(todo.len() as u64, format!("Uploading {}", year));
    let results: Vec<bool> = stream::iter(todo)
        .map(|path| upload_extracted(store, year, path, &pb))
        .buffer_unordered(config.workers.max(1))
        .collect()
        .await;
    pb.finish_with_message(format!("{} uploaded", year));

    Ok(tally(&results, already))
}

/// Extracted CSV files still to upload, at whatever depth the archive put them.
/// Presence in the bucket is judged by file name alone.
fn extracted_to_upload(
    extract_dir: &Path,
    existing: &BTreeSet<String>,
    overwrite: bool,
) -> Result<(Vec<PathBuf>, usize)> {
    let files = csv_files(extract_dir)?;
    if overwrite {
        return Ok((files, 0));
    }

    let (present, missing): (Vec<PathBuf>, Vec<PathBuf>) = files
        .into_iter()
        .partition(|path| existing.contains(&file_name(path)));
    Ok((missing, present.len()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

async fn upload_extracted(store: &Store, year: &str, path: PathBuf, pb: &ProgressBar) -> bool {
    let key = format!("{}/{}", year, file_name(&path));

    let result = match fs::read(&path) {
        Ok(body) => storage::put(store.as_ref(), &key, PutPayload::from(body)).await,
        Err(e) => Err(e.into()),
    };
    pb.inc(1);

    match result {
        Ok(()) => true,
        Err(e) => {
            let message = format!("{e:#}");
            warn!(key = %key, error = %message, "Failed to upload site file");
            false
        }
    }
}

fn tally(results: &[bool], existing: usize) -> FetchSummary {
    let uploaded = results.iter().filter(|ok| **ok).count();
    FetchSummary {
        years: 1,
        uploaded,
        existing,
        failed: results.len() - uploaded,
    }
}

// -- Tests -------------------------------------------------------------------
