use anyhow::{Context as _, Result};
use boxes_from_points::{
    config::Config,
    dataset::CocoCodec,
    meta,
    platform::LocalTaskWriter,
    storage::{LocalStorage, StorageClient},
    Pipeline,
};
use clap::Parser;
use prettytable::{cell, row, Table};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
/// Prepares point-to-box annotation jobs.
enum Opts {
    /// Runs the preparation pipeline and submits the jobs.
    Prepare {
        /// configuration file
        #[clap(long, default_value = "boxes-from-points.json5")]
        config_file: PathBuf,
    },
    /// Prints the job layout of a prepared run.
    Layout {
        /// configuration file
        #[clap(long, default_value = "boxes-from-points.json5")]
        config_file: PathBuf,
    },
}

fn main() -> Result<()> {
    // setup tracing
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        let filter = if std::env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        };
        filter
    };
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    match Opts::parse() {
        Opts::Prepare { config_file } => prepare(config_file),
        Opts::Layout { config_file } => print_layout(config_file),
    }
}

fn open_config(config_file: PathBuf) -> Result<Config> {
    Config::open(&config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))
}

fn prepare(config_file: PathBuf) -> Result<()> {
    let config = open_config(config_file)?;
    let source = LocalStorage::new(&config.storage.source_dir)?;
    let oracle = LocalStorage::new(&config.storage.oracle_dir)?;
    let mut platform = LocalTaskWriter::new(&oracle, config.run_id.clone());
    let codec = CocoCodec::default();

    let output = Pipeline::new(&config, &source, &oracle, &mut platform, &codec)
        .run()
        .map_err(|failure| {
            if let Some(kind) = failure.kind() {
                error!("invalid input data ({:?})", kind);
            }
            anyhow::Error::new(failure)
        })?;

    info!(
        "created {} tasks with {} RoI images in bucket '{}'",
        output.tasks.len(),
        output.roi_count,
        oracle.bucket()
    );
    Ok(())
}

fn print_layout(config_file: PathBuf) -> Result<()> {
    let config = open_config(config_file)?;
    let oracle = LocalStorage::new(&config.storage.oracle_dir)?;
    let layout = meta::read_job_layout(&oracle, &config.run_id)?;
    let roi_filenames = meta::read_roi_filenames(&oracle, &config.run_id)?;
    let mapping = meta::read_bbox_point_mapping(&oracle, &config.run_id)?;

    let gt_filenames: std::collections::HashSet<_> = mapping
        .values()
        .filter_map(|point_id| roi_filenames.get(point_id))
        .collect();

    let mut table = Table::new();
    table.add_row(row!["job", "images", "GT images", "first image"]);
    for (index, job) in layout.iter().enumerate() {
        let num_gt = job
            .iter()
            .filter(|filename| gt_filenames.contains(filename))
            .count();
        table.add_row(row![
            index,
            job.len(),
            num_gt,
            job.first().map(String::as_str).unwrap_or("")
        ]);
    }
    table.printstd();

    Ok(())
}
