#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! CLI entry point for the ambulance call grid conversion tool.
//!
//! Reads the spatiotemporal grid CSV and produces `GeoJSON` outputs:
//! simulated call points (`points`), aggregated grid polygons (`grid`), or
//! both (`all`).

use std::path::PathBuf;

use ambulance_map_cli_utils::{IndicatifProgress, MultiProgress};
use ambulance_map_generate::{GridOptions, PointsOptions, run_grid, run_points};
use ambulance_map_grid::LoadOptions;
use ambulance_map_grid_models::BoundingBox;
use ambulance_map_simulate::SimulationConfig;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ambulance_map_generate", about = "Ambulance call grid conversion tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Input table location and column naming.
#[derive(Args)]
struct InputArgs {
    /// Path to the spatiotemporal grid CSV file.
    #[arg(long)]
    input: PathBuf,

    /// Header name of the cell identifier column.
    #[arg(long, default_value = "c28992r1000")]
    id_column: String,

    /// Header name of the population column.
    #[arg(long, default_value = "aantal_inwoners")]
    population_column: String,

    /// Header name of the WKT geometry column.
    #[arg(long, default_value = "geometry")]
    geometry_column: String,
}

/// Simulation parameters for the points generator.
#[derive(Args)]
struct SimulationArgs {
    /// First date events may be stamped with (YYYY-MM-DD, inclusive).
    #[arg(long)]
    start_date: NaiveDate,

    /// Last date events may be stamped with (YYYY-MM-DD, inclusive).
    #[arg(long)]
    end_date: NaiveDate,

    /// Western edge of the inclusion rectangle (RD x).
    #[arg(long, default_value_t = 118_000.0)]
    min_x: f64,

    /// Southern edge of the inclusion rectangle (RD y).
    #[arg(long, default_value_t = 480_000.0)]
    min_y: f64,

    /// Eastern edge of the inclusion rectangle (RD x).
    #[arg(long, default_value_t = 130_000.0)]
    max_x: f64,

    /// Northern edge of the inclusion rectangle (RD y).
    #[arg(long, default_value_t = 495_000.0)]
    max_y: f64,

    /// Grid cell edge length in RD units.
    #[arg(long, default_value_t = 1000.0)]
    cell_size: f64,

    /// Maximum positional jitter as a fraction of the cell size, in [0, 1).
    #[arg(long, default_value_t = 0.4)]
    jitter_fraction: f64,

    /// Multiplier applied to rates before rounding to an event count.
    #[arg(long, default_value_t = 100.0)]
    scale: f64,

    /// Seed for the random generator; omit for a nondeterministic run.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate synthetic call points from the grid rates.
    Points {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        simulation: SimulationArgs,

        /// Output `GeoJSON` path.
        #[arg(long, default_value = "data/generated/ambulance_points.geojson")]
        output: PathBuf,
    },
    /// Export the grid cells as polygons with aggregated call counts.
    Grid {
        #[command(flatten)]
        input: InputArgs,

        /// Output `GeoJSON` path.
        #[arg(long, default_value = "data/generated/ambulance_grid.geojson")]
        output: PathBuf,
    },
    /// Generate both the points and the grid outputs.
    All {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        simulation: SimulationArgs,

        /// Output `GeoJSON` path for the simulated points.
        #[arg(long, default_value = "data/generated/ambulance_points.geojson")]
        points_output: PathBuf,

        /// Output `GeoJSON` path for the grid polygons.
        #[arg(long, default_value = "data/generated/ambulance_grid.geojson")]
        grid_output: PathBuf,
    },
}

impl InputArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            id_column: self.id_column.clone(),
            population_column: self.population_column.clone(),
            geometry_column: self.geometry_column.clone(),
        }
    }
}

impl SimulationArgs {
    fn config(&self) -> SimulationConfig {
        SimulationConfig {
            bounds: BoundingBox::new(self.min_x, self.min_y, self.max_x, self.max_y),
            start_date: self.start_date,
            end_date: self.end_date,
            cell_size: self.cell_size,
            jitter_fraction: self.jitter_fraction,
            scale: self.scale,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = ambulance_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Points {
            input,
            simulation,
            output,
        } => generate_points(&multi, &input, &simulation, output)?,
        Commands::Grid { input, output } => generate_grid(&multi, &input, output)?,
        Commands::All {
            input,
            simulation,
            points_output,
            grid_output,
        } => {
            generate_points(&multi, &input, &simulation, points_output)?;
            generate_grid(&multi, &input, grid_output)?;
        }
    }

    Ok(())
}

/// Runs the points pipeline with a progress bar.
fn generate_points(
    multi: &MultiProgress,
    input: &InputArgs,
    simulation: &SimulationArgs,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = PointsOptions {
        input: input.input.clone(),
        output,
        load: input.load_options(),
        simulation: simulation.config(),
        seed: simulation.seed,
    };

    let progress = IndicatifProgress::records_bar(multi, "Simulating call events");
    let stats = run_points(&options, &progress)?;

    log::info!(
        "Points generation complete: {} events, {} cells consulted, {} skipped",
        stats.total_events,
        stats.cells_consulted,
        stats.cells_skipped
    );
    Ok(())
}

/// Runs the grid polygon export with a progress bar.
fn generate_grid(
    multi: &MultiProgress,
    input: &InputArgs,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = GridOptions {
        input: input.input.clone(),
        output,
        load: input.load_options(),
    };

    let progress = IndicatifProgress::batch_bar(multi, "Exporting grid polygons");
    let stats = run_grid(&options, &progress)?;

    log::info!(
        "Grid export complete: {} cells exported, {} empty cells omitted",
        stats.cells_exported,
        stats.cells_skipped_empty
    );
    Ok(())
}
