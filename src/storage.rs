//! Bucket access: year folders, age-filtered listings, quarantine and staging.

use std::{collections::BTreeSet, fs, sync::Arc};

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use futures::TryStreamExt;
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, path::Path, ObjectMeta, ObjectStore,
    PutPayload, RetryConfig,
};
use tracing::{debug, info, warn};

use crate::{
    config::StoreConfig,
    reading::{is_reserved_folder, year_average_key, SiteKey},
};

/// Shared handle to the bucket.
pub type Store = Arc<dyn ObjectStore>;

pub fn open_store(config: &StoreConfig) -> Result<Store> {
    if let Some(root) = &config.local_root {
        fs::create_dir_all(root)
            .with_context(|| format!("creating local store at `{}`", root.display()))?;
        let store = LocalFileSystem::new_with_prefix(root)?;
        return Ok(Arc::new(store));
    }

    let mut retry = RetryConfig::default();
    retry.max_retries = config.max_retries;
    retry.backoff.init_backoff = config.retry_delay;

    let mut builder = AmazonS3Builder::from_env()
        .with_region(&config.region)
        .with_bucket_name(&config.bucket)
        .with_retry(retry);
    if let Some(endpoint) = &config.endpoint {
        builder = builder.with_endpoint(endpoint).with_allow_http(true);
    }

    let store = builder
        .build()
        .with_context(|| format!("opening bucket `{}`", config.bucket))?;

    Ok(Arc::new(store))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which objects a listing keeps, by last-modified time.
pub enum AgeFilter {
    Any,
    /// Modified within the last N minutes.
    NewerThan(u32),
    /// Modified more than N minutes ago.
    OlderThan(u32),
}

impl AgeFilter {
    pub fn from_minutes(minutes_old: u32, time_less_than: bool) -> Self {
        if time_less_than {
            AgeFilter::NewerThan(minutes_old)
        } else {
            AgeFilter::OlderThan(minutes_old)
        }
    }

    pub fn keeps(&self, last_modified: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match *self {
            AgeFilter::Any => true,
            AgeFilter::NewerThan(minutes) => {
                last_modified > now - TimeDelta::minutes(i64::from(minutes))
            }
            AgeFilter::OlderThan(minutes) => {
                last_modified < now - TimeDelta::minutes(i64::from(minutes))
            }
        }
    }
}

/// Top-level folders, sorted, without the reserved ones.
pub async fn list_year_folders(store: &dyn ObjectStore) -> Result<Vec<String>> {
    let listing = store
        .list_with_delimiter(None)
        .await
        .context("listing bucket folders")?;

    let folders: BTreeSet<String> = listing
        .common_prefixes
        .iter()
        .map(|prefix| prefix.as_ref().trim_end_matches('/').to_string())
        .filter(|name| !name.is_empty() && !is_reserved_folder(name))
        .collect();

    Ok(folders.into_iter().collect())
}

/// Sorted keys under `folder/` that pass the age filter.
pub async fn list_keys(
    store: &dyn ObjectStore,
    folder: &str,
    filter: AgeFilter,
) -> Result<Vec<String>> {
    let prefix = Path::from(folder);
    let now = Utc::now();

    let objects: Vec<ObjectMeta> = store
        .list(Some(&prefix))
        .try_collect()
        .await
        .with_context(|| format!("listing `{}`", folder))?;

    let keys: BTreeSet<String> = objects
        .into_iter()
        .filter(|meta| filter.keeps(meta.last_modified, now))
        .map(|meta| meta.location.to_string())
        .collect();

    debug!(folder, keys = keys.len(), ?filter, "Listed folder");

    Ok(keys.into_iter().collect())
}

/// Object contents, or `None` when the key no longer exists.
pub async fn read(store: &dyn ObjectStore, key: &str) -> Result<Option<Bytes>> {
    match store.get(&Path::from(key)).await {
        Ok(result) => {
            let bytes = result
                .bytes()
                .await
                .with_context(|| format!("reading `{}`", key))?;
            Ok(Some(bytes))
        }
        Err(object_store::Error::NotFound { .. }) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("fetching `{}`", key)),
    }
}

pub async fn put(store: &dyn ObjectStore, key: &str, payload: PutPayload) -> Result<()> {
    store
        .put(&Path::from(key), payload)
        .await
        .with_context(|| format!("writing `{}`", key))?;
    Ok(())
}

/// Moves a site file into the data error folder, named after its year, station and `note`.
///
/// Keys that are not `year/file` are deleted without a copy.
pub async fn quarantine(store: &dyn ObjectStore, key: &str, note: &str) -> Result<()> {
    let source = Path::from(key);

    match SiteKey::parse(key) {
        Some(site) => {
            let target = Path::from(site.quarantine_key(note));
            store
                .copy(&source, &target)
                .await
                .with_context(|| format!("copying `{}` to `{}`", key, target))?;
            info!(key, target = %target, note, "Quarantined site file");
        }
        None => warn!(key, note, "Deleting unrecognised key without a copy"),
    }

    store
        .delete(&source)
        .await
        .with_context(|| format!("deleting `{}`", key))?;

    Ok(())
}

/// Rewrites an object in place so its last-modified time moves to now.
pub async fn touch(store: &dyn ObjectStore, key: &str, bytes: Bytes) -> Result<()> {
    put(store, key, PutPayload::from(bytes)).await
}

pub async fn put_year_average(store: &dyn ObjectStore, year: &str, body: String) -> Result<()> {
    put(store, &year_average_key(year), PutPayload::from(body)).await
}

// -- Tests -------------------------------------------------------------------
