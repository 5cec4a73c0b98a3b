//! Quarantine site files whose spatial columns are inconsistent, missing or unreadable.

use std::{collections::BTreeMap, fmt, sync::Arc};

use anyhow::Result;
use futures::{stream, StreamExt};
use indicatif::ProgressBar;
use object_store::ObjectStore;
use tracing::{debug, error, warn};

use crate::{
    reading::{should_skip, spatial_issue, CsvTable, SpatialIssue, TableError},
    storage::{self, Store},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Why a site file was moved out of its year folder. Becomes part of the quarantined key.
pub enum QuarantineNote {
    NonUniqueSpatial,
    MissingSpatial,
    EmptyData,
    ParserError,
    MissingColumns,
}

impl QuarantineNote {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuarantineNote::NonUniqueSpatial => "non_unique_spatial",
            QuarantineNote::MissingSpatial => "missing_spatial",
            QuarantineNote::EmptyData => "empty_data_error",
            QuarantineNote::ParserError => "parser_error",
            QuarantineNote::MissingColumns => "missing_columns",
        }
    }
}

impl fmt::Display for QuarantineNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&TableError> for QuarantineNote {
    fn from(e: &TableError) -> Self {
        match e {
            TableError::EmptyData => QuarantineNote::EmptyData,
            TableError::Malformed(_) => QuarantineNote::ParserError,
            TableError::MissingColumn(_) => QuarantineNote::MissingColumns,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    Quarantine(QuarantineNote),
}

pub fn inspect_site(bytes: &[u8]) -> Verdict {
    let issue = CsvTable::from_bytes(bytes).and_then(|table| spatial_issue(&table));

    match issue {
        Ok(None) => Verdict::Clean,
        Ok(Some(SpatialIssue::NonUnique)) => Verdict::Quarantine(QuarantineNote::NonUniqueSpatial),
        Ok(Some(SpatialIssue::Missing)) => Verdict::Quarantine(QuarantineNote::MissingSpatial),
        Err(e) => Verdict::Quarantine(QuarantineNote::from(&e)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Skipped,
    Clean,
    Quarantined(QuarantineNote),
    /// Listed, but gone by the time it was fetched.
    Vanished,
}

pub async fn clean_file(store: &dyn ObjectStore, key: &str) -> Result<FileOutcome> {
    if should_skip(key) {
        return Ok(FileOutcome::Skipped);
    }

    let Some(bytes) = storage::read(store, key).await? else {
        warn!(key, "Site file vanished before it could be cleaned");
        return Ok(FileOutcome::Vanished);
    };

    match inspect_site(&bytes) {
        Verdict::Clean => {
            storage::touch(store, key, bytes).await?;
            debug!(key, "Site file is clean");
            Ok(FileOutcome::Clean)
        }
        Verdict::Quarantine(note) => {
            storage::quarantine(store, key, note.as_str()).await?;
            Ok(FileOutcome::Quarantined(note))
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CleanSummary {
    pub clean: usize,
    pub skipped: usize,
    pub vanished: usize,
    pub failed: usize,
    pub quarantined: BTreeMap<QuarantineNote, usize>,
}

impl CleanSummary {
    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Clean => self.clean += 1,
            FileOutcome::Vanished => self.vanished += 1,
            FileOutcome::Quarantined(note) => *self.quarantined.entry(note).or_default() += 1,
        }
    }

    pub fn merge(&mut self, other: CleanSummary) {
        self.clean += other.clean;
        self.skipped += other.skipped;
        self.vanished += other.vanished;
        self.failed += other.failed;
        for (note, count) in other.quarantined {
            *self.quarantined.entry(note).or_default() += count;
        }
    }

    pub fn total_quarantined(&self) -> usize {
        self.quarantined.values().sum()
    }
}

impl fmt::Display for CleanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} clean, {} quarantined, {} skipped, {} vanished, {} failed",
            self.clean,
            self.total_quarantined(),
            self.skipped,
            self.vanished,
            self.failed
        )?;
        for (note, count) in &self.quarantined {
            write!(f, "\n  {}: {}", note, count)?;
        }
        Ok(())
    }
}

/// Flattens the per-year key lists, keeps the first `total` keys and splits them into
/// chunks of `list_size`.
pub fn prepare_chunks(
    year_lists: Vec<Vec<String>>,
    list_size: usize,
    total: usize,
) -> Vec<Vec<String>> {
    let keys: Vec<String> = year_lists.into_iter().flatten().take(total).collect();

    keys.chunks(list_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Cleans one chunk, file by file. A failing file is logged and counted.
pub async fn clean_chunk(
    store: &dyn ObjectStore,
    chunk: &[String],
    progress_bar: &ProgressBar,
) -> CleanSummary {
    let mut summary = CleanSummary::default();

    for key in chunk {
        match clean_file(store, key).await {
            Ok(outcome) => summary.record(outcome),
            Err(e) => {
                let message = format!("{e:#}");
                error!(key = %key, error = %message, "Failed to clean site file");
                summary.failed += 1;
            }
        }
        progress_bar.inc(1);
    }

    summary
}

/// Cleans chunks in parallel, with at most `workers` chunks in flight.
pub async fn clean_chunks(
    store: &Store,
    chunks: Vec<Vec<String>>,
    workers: usize,
    progress_bar: &ProgressBar,
) -> Result<CleanSummary> {
    let tasks = chunks.into_iter().map(|chunk| {
        let store = Arc::clone(store);
        let pb = progress_bar.clone();
        tokio::spawn(async move { clean_chunk(store.as_ref(), &chunk, &pb).await })
    });

    let results: Vec<_> = stream::iter(tasks)
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut summary = CleanSummary::default();
    for result in results {
        summary.merge(result?);
    }

    Ok(summary)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use object_store::{memory::InMemory, path::Path, PutPayload};

    use super::*;
    use crate::{reading::fixtures, storage::AgeFilter, test_store::FailingStore};

    async fn put(store: &dyn ObjectStore, key: &str, body: String) {
        store
            .put(&Path::from(key), PutPayload::from(body))
            .await
            .unwrap();
    }

    #[test]
    fn should_pass_good_site() {
        assert_eq!(inspect_site(fixtures::good_site().as_bytes()), Verdict::Clean);
    }

    #[test]
    fn should_classify_unreadable_files() {
        assert_eq!(
            inspect_site(b""),
            Verdict::Quarantine(QuarantineNote::EmptyData)
        );
        assert_eq!(
            inspect_site(b"STATION,LATITUDE\nA,1\nA,1,2\n"),
            Verdict::Quarantine(QuarantineNote::ParserError)
        );
        assert_eq!(
            inspect_site(b"STATION,TEMP\nA,1\n"),
            Verdict::Quarantine(QuarantineNote::MissingColumns)
        );
    }

    #[test]
    fn should_check_uniqueness_before_missing() {
        let csv = fixtures::site_with_spatial(&[
            ("1", "", "-8.66", "9.0"),
            ("1", "", "-8.66", "9.0"),
            ("2", "", "-8.66", "9.0"),
        ]);
        assert_eq!(
            inspect_site(csv.as_bytes()),
            Verdict::Quarantine(QuarantineNote::NonUniqueSpatial)
        );
    }

    #[test]
    fn should_prepare_chunks() {
        let year_lists = vec![
            vec!["1929/a.csv".to_string(), "1929/b.csv".to_string()],
            vec![
                "1930/c.csv".to_string(),
                "1930/d.csv".to_string(),
                "1930/e.csv".to_string(),
            ],
        ];

        let chunks = prepare_chunks(year_lists, 2, 4);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], vec!["1929/a.csv", "1929/b.csv"]);
        assert_eq!(chunks[1], vec!["1930/c.csv", "1930/d.csv"]);
    }

    #[tokio::test]
    async fn should_quarantine_and_keep_files() {
        let store: Store = Arc::new(InMemory::new());
        put(store.as_ref(), "1929/good.csv", fixtures::good_site()).await;
        let moving = fixtures::site_with_spatial(&[
            ("03005099999", "50.1", "-1.0", "10"),
            ("03005099999", "50.2", "-1.0", "10"),
        ]);
        put(store.as_ref(), "1929/03005099999.csv", moving).await;
        put(store.as_ref(), "1930/empty.csv", String::new()).await;

        let chunks = vec![
            vec!["1929/03005099999.csv".to_string(), "1929/good.csv".to_string()],
            vec!["1930/empty.csv".to_string(), "1930/missing.csv".to_string()],
        ];
        let summary = clean_chunks(&store, chunks, 2, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(summary.clean, 1);
        assert_eq!(summary.vanished, 1);
        assert_eq!(summary.total_quarantined(), 2);
        assert_eq!(
            summary.quarantined.get(&QuarantineNote::NonUniqueSpatial),
            Some(&1)
        );

        let errors = storage::list_keys(store.as_ref(), "_data_error", AgeFilter::Any)
            .await
            .unwrap();
        assert_eq!(
            errors,
            vec![
                "_data_error/1929-03005099999-non_unique_spatial.csv",
                "_data_error/1930-empty-empty_data_error.csv",
            ]
        );

        let remaining = storage::list_keys(store.as_ref(), "1929", AgeFilter::Any)
            .await
            .unwrap();
        assert_eq!(remaining, vec!["1929/good.csv"]);
    }

    #[tokio::test]
    async fn should_skip_reserved_keys() {
        let store = InMemory::new();

        let outcome = clean_file(&store, "year_average/avg_1929.csv").await.unwrap();

        assert_eq!(outcome, FileOutcome::Skipped);
    }

    #[tokio::test]
    async fn should_count_failed_file_and_continue_chunk() {
        let store = FailingStore::with_objects(
            "unreachable",
            &[
                ("1929/unreachable.csv", fixtures::good_site()),
                ("1929/good.csv", fixtures::good_site()),
            ],
        )
        .await;
        let chunk = vec!["1929/unreachable.csv".to_string(), "1929/good.csv".to_string()];

        let summary = clean_chunk(&store, &chunk, &ProgressBar::hidden()).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.clean, 1);
        assert_eq!(summary.total_quarantined(), 0);
    }

    #[tokio::test]
    async fn should_refresh_last_modified_of_clean_file() {
        let store = InMemory::new();
        put(&store, "1929/good.csv", fixtures::good_site()).await;
        let location = Path::from("1929/good.csv");
        let before = store.head(&location).await.unwrap().last_modified;
        std::thread::sleep(std::time::Duration::from_millis(5));

        let outcome = clean_file(&store, "1929/good.csv").await.unwrap();

        assert_eq!(outcome, FileOutcome::Clean);
        let after = store.head(&location).await.unwrap();
        assert!(after.last_modified > before);
        assert_eq!(after.size, fixtures::good_site().len());
    }
}
