use std::{collections::BTreeSet, sync::Arc};

use anyhow::Result;
use futures::{stream, StreamExt};
use tracing::{error, info};

use crate::{
    average::{calculate_year, CalcSummary},
    cli::create_progress_bar,
    config::CalcConfig,
    reading::YEAR_AVERAGE_FOLDER,
    storage::{list_keys, list_year_folders, Store},
};

/// Writes one average file per year folder, in parallel across years.
///
/// A year is finished when its average file passes the config's age filter.
pub async fn calc(store: &Store, config: &CalcConfig) -> Result<CalcSummary> {
    config.trace_loaded();

    let years = list_year_folders(store.as_ref()).await?;
    let finished: Arc<BTreeSet<String>> = Arc::new(
        list_keys(store.as_ref(), YEAR_AVERAGE_FOLDER, config.age_filter)
            .await?
            .into_iter()
            .collect(),
    );
    info!(
        years = years.len(),
        finished = finished.len(),
        "Calculating year averages"
    );

    let pb = create_progress_bar(years.len() as u64, "Calculating year averages".to_string());
    let calc_all = config.calc_all;

    let tasks = years.into_iter().map(|year| {
        let store = Arc::clone(store);
        let finished = Arc::clone(&finished);
        let pb = pb.clone();
        tokio::spawn(async move {
            let outcome = calculate_year(store.as_ref(), &year, &finished, calc_all).await;
            pb.inc(1);
            (year, outcome)
        })
    });

    let results: Vec<_> = stream::iter(tasks)
        .buffer_unordered(config.workers.max(1))
        .collect()
        .await;
    pb.finish_with_message("Year averages written");

    let mut summary = CalcSummary::default();
    let mut failed = Vec::new();
    for result in results {
        let (year, outcome) = result?;
        match outcome {
            Ok(outcome) => summary.record(outcome),
            Err(e) => {
                let message = format!("{e:#}");
                error!(year = %year, error = %message, "Failed to calculate year average");
                failed.push(year);
            }
        }
    }

    if !failed.is_empty() {
        failed.sort();
        return Err(anyhow::anyhow!(
            "Year averages failed for {}",
            failed.join(", ")
        ));
    }

    Ok(summary)
}

// -- Tests -------------------------------------------------------------------
