use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use rainmap_core::{Config, RunStatistics, run_pipeline, sampler, snapshot};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "rainmap", version, about = "Global rain-snapshot pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the weatherapi.com API key.
    Configure,

    /// Run one fetch cycle and write a snapshot.
    Run {
        /// Config file path; defaults to the platform config dir.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the number of generated sample points.
        #[arg(long)]
        count: Option<usize>,

        /// Override the snapshot output folder.
        #[arg(long)]
        data_folder: Option<PathBuf>,
    },

    /// Print uniformly sampled sphere coordinates.
    Sample {
        /// Number of points.
        #[arg(long, default_value_t = 100)]
        count: usize,
    },

    /// Show the most recent snapshot in the data folder.
    Latest {
        #[arg(long, default_value = "./data")]
        data_folder: PathBuf,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Run { config, count, data_folder } => {
                run(config, count, data_folder).await
            }
            Command::Sample { count } => sample(count),
            Command::Latest { data_folder } => latest(&data_folder),
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let key = inquire::Text::new("weatherapi.com API key:")
        .prompt()
        .context("Failed to read API key")?;

    config.api_key = Some(key.trim().to_string());
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn run(
    config_path: Option<PathBuf>,
    count: Option<usize>,
    data_folder: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    if let Some(count) = count {
        config.required_sample_count = count;
    }
    if let Some(folder) = data_folder {
        config.data_folder = folder;
    }

    let report = run_pipeline(&config).await?;

    println!("Snapshot written to {}", report.snapshot_path.display());
    print_stats(&report.stats);
    Ok(())
}

fn print_stats(stats: &RunStatistics) {
    println!("Total targets: {}", stats.total_targets);
    println!("Targets with result: {}", stats.targets_with_result);
    println!("Raining: {}", stats.raining_count);
    println!("Non-raining: {}", stats.non_raining_count);
    if stats.skipped_entries > 0 {
        println!("Skipped malformed entries: {}", stats.skipped_entries);
    }
    match stats.rain_percentage() {
        Some(pct) => println!("Rain percentage: {pct:.2}%"),
        None => println!("Rain percentage: n/a (no results)"),
    }
}

fn sample(count: usize) -> anyhow::Result<()> {
    let points = sampler::sample_uniform(count)?;
    for (i, p) in points.iter().enumerate() {
        println!("Point {}: Latitude {:.6}, Longitude {:.6}", i + 1, p.lat, p.lon);
    }
    Ok(())
}

fn latest(data_folder: &Path) -> anyhow::Result<()> {
    let Some(snapshot) = snapshot::latest(data_folder)? else {
        println!("No snapshots in {}", data_folder.display());
        return Ok(());
    };

    let age = Utc::now() - snapshot.generated_at;
    let raining = snapshot.records.iter().filter(|r| r.is_raining).count();

    println!("Latest snapshot: {}", snapshot.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Age: {} minutes", age.num_minutes());
    println!("Records: {} ({} raining)", snapshot.records.len(), raining);
    Ok(())
}
