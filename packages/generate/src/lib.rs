#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for converting the spatiotemporal ambulance call grid into
//! `GeoJSON` outputs.
//!
//! Two generators are provided: `points` disaggregates per-bucket call
//! rates into synthetic point events (jittered locations, randomized
//! timestamps), and `grid` exports the cell polygons themselves with
//! per-hour and per-period aggregates. Both read the same CSV table and
//! write a single `FeatureCollection` with an accompanying metadata block.

pub mod grid;
pub mod points;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ambulance_map_grid::{GridError, LoadOptions, load_grid};
use ambulance_map_simulate::progress::ProgressCallback;
use ambulance_map_simulate::{
    SimulateError, SimulationConfig, SimulationStats, simulate,
};
use geojson::FeatureCollection;
use rand::SeedableRng as _;
use rand_chacha::ChaCha8Rng;

use crate::grid::GridExportStats;

/// Errors that can occur during generation.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Output file or directory could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `GeoJSON` serialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The grid table could not be loaded.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// The simulation rejected its configuration or failed to reproject.
    #[error(transparent)]
    Simulate(#[from] SimulateError),
}

/// Parameters for the points generator.
#[derive(Debug, Clone)]
pub struct PointsOptions {
    /// Path to the grid CSV file.
    pub input: PathBuf,
    /// Path the `GeoJSON` document is written to.
    pub output: PathBuf,
    /// Column naming for the input table.
    pub load: LoadOptions,
    /// Simulation parameters (bounds, date range, jitter, scale).
    pub simulation: SimulationConfig,
    /// Seed for the random generator; `None` draws one from OS entropy.
    pub seed: Option<u64>,
}

/// Parameters for the grid polygon export.
#[derive(Debug, Clone)]
pub struct GridOptions {
    /// Path to the grid CSV file.
    pub input: PathBuf,
    /// Path the `GeoJSON` document is written to.
    pub output: PathBuf,
    /// Column naming for the input table.
    pub load: LoadOptions,
}

/// Runs the points pipeline: load, simulate, assemble, write.
///
/// Ingest-level record skips are folded into the reported `cells_skipped`
/// so the summary covers both geometry failures and inclusion rejects.
///
/// # Errors
///
/// Returns [`GenerateError`] if the input cannot be loaded, the simulation
/// configuration is invalid, or the output cannot be written.
pub fn run_points(
    options: &PointsOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<SimulationStats, GenerateError> {
    let table = load_grid(&options.input, &options.load)?;

    let mut rng = options
        .seed
        .map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);

    let mut outcome = simulate(&table.cells, &options.simulation, &mut rng, progress)?;
    outcome.stats.cells_skipped += table.skipped_records;

    let source = source_name(&options.input);
    let collection = points::feature_collection(&source, &options.simulation, &outcome);
    write_feature_collection(&options.output, &collection)?;

    log::info!(
        "Wrote {} call events to {}",
        outcome.stats.total_events,
        options.output.display()
    );
    #[allow(clippy::cast_precision_loss)]
    let period_counts: Vec<(String, f64)> = outcome
        .stats
        .events_by_period
        .iter()
        .map(|(period, &count)| (period.to_string(), count as f64))
        .collect();
    log_share_summary(period_counts.into_iter());

    Ok(outcome.stats)
}

/// Runs the grid polygon export: load, aggregate, assemble, write.
///
/// # Errors
///
/// Returns [`GenerateError`] if the input cannot be loaded or the output
/// cannot be written.
pub fn run_grid(
    options: &GridOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<GridExportStats, GenerateError> {
    let table = load_grid(&options.input, &options.load)?;

    let source = source_name(&options.input);
    let export = grid::export_cells(&table.cells, &source, progress);
    write_feature_collection(&options.output, &export.collection)?;

    log::info!(
        "Wrote {} grid cells ({:.2} total calls) to {}",
        export.stats.cells_exported,
        export.stats.total_calls,
        options.output.display()
    );
    log_share_summary(
        export
            .stats
            .calls_by_period
            .iter()
            .map(|(period, &calls)| (period.to_string(), calls)),
    );

    Ok(export.stats)
}

/// Serializes a feature collection to pretty-printed `GeoJSON` on disk,
/// creating parent directories as needed.
///
/// # Errors
///
/// Returns [`GenerateError`] if serialization or the write fails.
pub fn write_feature_collection(
    path: &Path,
    collection: &FeatureCollection,
) -> Result<(), GenerateError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(collection)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// The source identifier recorded in output metadata: the input's file
/// name, falling back to the full path.
fn source_name(input: &Path) -> String {
    input
        .file_name()
        .map_or_else(|| input.display().to_string(), |name| {
            name.to_string_lossy().into_owned()
        })
}

/// Logs a labeled share breakdown (per-period counts with percentages).
fn log_share_summary(entries: impl Iterator<Item = (String, f64)>) {
    let entries: Vec<(String, f64)> = entries.collect();
    let total: f64 = entries.iter().map(|(_, value)| value).sum();
    for (label, value) in entries {
        let pct = if total > 0.0 { value / total * 100.0 } else { 0.0 };
        log::info!("  {label:<10} {value:>10.2} ({pct:5.1}%)");
    }
}
