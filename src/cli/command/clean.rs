use anyhow::Result;
use futures::{stream, StreamExt, TryStreamExt};
use tracing::info;

use crate::{
    clean::{clean_chunks, prepare_chunks, CleanSummary},
    cli::{create_progress_bar, create_spinner},
    config::CleanConfig,
    storage::{list_keys, list_year_folders, Store},
};

/// Lists every year folder, picks site files by age and quarantines the bad ones.
pub async fn clean(store: &Store, config: &CleanConfig) -> Result<CleanSummary> {
    config.trace_loaded();

    let bar = create_spinner("Listing year folders...".to_string());
    let years = list_year_folders(store.as_ref()).await?;
    bar.set_message(format!("Listing site files in {} year folders...", years.len()));

    let year_lists: Vec<Vec<String>> = stream::iter(&years)
        .map(|year| list_keys(store.as_ref(), year, config.age_filter))
        .buffered(config.workers.max(1))
        .try_collect()
        .await?;
    bar.finish_with_message("Site files listed");

    let chunks = prepare_chunks(year_lists, config.map_list_size, config.total_processed);
    let total_files: usize = chunks.iter().map(Vec::len).sum();
    info!(
        years = years.len(),
        files = total_files,
        chunks = chunks.len(),
        "Cleaning site files"
    );

    let pb = create_progress_bar(total_files as u64, "Cleaning site files".to_string());
    let summary = clean_chunks(store, chunks, config.workers, &pb).await?;
    pb.finish_with_message("Site files cleaned");

    info!(
        clean = summary.clean,
        quarantined = summary.total_quarantined(),
        failed = summary.failed,
        "Clean finished"
    );

    Ok(summary)
}

// -- Tests -------------------------------------------------------------------
