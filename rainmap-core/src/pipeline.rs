//! End-to-end pipeline: targets → batches → concurrent fetch → reduce →
//! snapshot.
//!
//! The run as a whole never fails because some fraction of fetch units
//! failed; only configuration/setup errors and inability to write the
//! output artifact abort it.

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::Utc;
use log::info;

use crate::{
    batch,
    config::{Config, QueryMode},
    error::PipelineError,
    fetcher::{self, CurrentConditions, WeatherApiClient},
    model::{RunStatistics, Snapshot},
    reducer, snapshot, source,
};

/// Everything one run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub snapshot: Snapshot,
    pub snapshot_path: PathBuf,
    pub stats: RunStatistics,
}

/// Runs one full fetch cycle against weatherapi.com.
pub async fn run_pipeline(config: &Config) -> Result<PipelineReport, PipelineError> {
    let api_key = config.api_key()?.to_owned();
    let client = WeatherApiClient::new(
        api_key,
        config.query_mode,
        Duration::from_secs(config.request_timeout_secs),
    )?;

    run_pipeline_with(config, Arc::new(client)).await
}

/// Same cycle with the network seam injected; also the test entry point.
pub async fn run_pipeline_with(
    config: &Config,
    client: Arc<dyn CurrentConditions>,
) -> Result<PipelineReport, PipelineError> {
    config.validate()?;

    let targets = source::load_targets(config)?;
    info!("loaded {} query targets", targets.len());

    let chunk_size = match config.query_mode {
        QueryMode::Single => 1,
        QueryMode::Bulk => config.chunk_size,
    };
    let batches = batch::partition(targets, chunk_size)?;

    let outcomes = fetcher::fetch_all(client, batches, config.worker_limit).await?;
    let (records, stats) = reducer::reduce(outcomes);

    if config.save_coordinates {
        source::save_successful(&config.saved_coordinates_file, &records)?;
    }

    let (snapshot, snapshot_path) = snapshot::write(&config.data_folder, records, Utc::now())?;

    info!(
        "run complete: {}/{} targets resolved, {} raining, {} non-raining, {} skipped",
        stats.targets_with_result,
        stats.total_targets,
        stats.raining_count,
        stats.non_raining_count,
        stats.skipped_entries,
    );

    Ok(PipelineReport { snapshot, snapshot_path, stats })
}
