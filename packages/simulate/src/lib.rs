#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Disaggregation of aggregate grid call rates into discrete synthetic
//! call events.
//!
//! Each cell's per-bucket rate is expanded into `max(1, round(rate ×
//! scale))` point events: the cell centroid is perturbed by bounded uniform
//! jitter in RD coordinates, reprojected to WGS84, and stamped with a date
//! drawn uniformly from the configured range at the bucket's start hour
//! with a randomized minute. Summing events back recovers the input rates
//! up to rounding, with the deliberate min-1 floor so non-zero rates are
//! never dropped entirely.
//!
//! All randomness flows through a caller-supplied [`rand::Rng`], so seeded
//! runs are exactly reproducible.

pub mod progress;

use std::collections::BTreeMap;
use std::sync::Arc;

use ambulance_map_grid_models::{
    BoundingBox, DayPeriod, GridCell, SyntheticCallEvent, TimeBucket,
};
use ambulance_map_reproject::ReprojectError;
use chrono::{Duration, NaiveDate};
use geo::Point;
use rand::Rng;

use crate::progress::ProgressCallback;

/// Errors that can occur during simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulateError {
    /// The configured start date is after the end date.
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Configured range start.
        start: NaiveDate,
        /// Configured range end.
        end: NaiveDate,
    },

    /// The jitter fraction is outside `[0, 1)`.
    #[error("jitter fraction {0} is outside [0, 1)")]
    InvalidJitterFraction(f64),

    /// The rate scaling factor is not a positive number.
    #[error("scale factor {0} must be positive")]
    InvalidScale(f64),

    /// A jittered point fell outside the reprojection domain.
    #[error(transparent)]
    Reproject(#[from] ReprojectError),
}

/// Fixed parameters for one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Inclusion rectangle in RD coordinates; cells whose centroid falls
    /// outside contribute nothing.
    pub bounds: BoundingBox,
    /// First calendar date events may be stamped with (inclusive).
    pub start_date: NaiveDate,
    /// Last calendar date events may be stamped with (inclusive).
    pub end_date: NaiveDate,
    /// Grid cell edge length in RD units.
    pub cell_size: f64,
    /// Maximum positional perturbation as a fraction of `cell_size`, in
    /// `[0, 1)`.
    pub jitter_fraction: f64,
    /// Multiplier applied to rates before rounding to an event count.
    pub scale: f64,
}

impl SimulationConfig {
    fn validate(&self) -> Result<(), SimulateError> {
        if self.start_date > self.end_date {
            return Err(SimulateError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if !(0.0..1.0).contains(&self.jitter_fraction) {
            return Err(SimulateError::InvalidJitterFraction(self.jitter_fraction));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(SimulateError::InvalidScale(self.scale));
        }
        Ok(())
    }
}

/// Running totals accumulated across one simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimulationStats {
    /// Events produced.
    pub total_events: u64,
    /// Cells that passed the inclusion predicate and were expanded.
    pub cells_consulted: u64,
    /// Cells rejected by the inclusion predicate or with degenerate
    /// geometry.
    pub cells_skipped: u64,
    /// Event counts grouped by day period.
    pub events_by_period: BTreeMap<DayPeriod, u64>,
    /// Event counts grouped by time bucket.
    pub events_by_bucket: BTreeMap<TimeBucket, u64>,
}

/// The product of a simulation run: the event collection plus statistics.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    /// All produced events, append-ordered (per cell, per bucket, dates
    /// ascending).
    pub events: Vec<SyntheticCallEvent>,
    /// Aggregate counters for reporting.
    pub stats: SimulationStats,
}

/// Number of events a rate expands into: `max(1, round(rate × scale))`.
///
/// The minimum of 1 is deliberate: a non-zero rate is never rounded away
/// entirely, at the cost of a small upward bias for rates that would round
/// to 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn event_count(rate: f64, scale: f64) -> u64 {
    let scaled = (rate * scale).round();
    if scaled < 1.0 { 1 } else { scaled as u64 }
}

/// Expands every qualifying cell into synthetic call events.
///
/// Cells whose centroid fails the inclusion predicate are skipped and
/// counted. Buckets with rate 0 contribute nothing. An empty input (or one
/// where every cell is rejected) produces an empty outcome with zeroed
/// statistics, which is a valid terminal state.
///
/// # Errors
///
/// Returns [`SimulateError`] if the configuration is invalid or a jittered
/// point falls outside the reprojection domain.
///
/// # Panics
///
/// Never panics for validated configurations: bucket start hours are 0-23
/// by construction and minutes are drawn in 0-59.
pub fn simulate<R: Rng + ?Sized>(
    cells: &[GridCell],
    config: &SimulationConfig,
    rng: &mut R,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<SimulationOutcome, SimulateError> {
    config.validate()?;

    let day_span = (config.end_date - config.start_date).num_days() + 1;
    let max_offset = config.cell_size * config.jitter_fraction;

    let mut events = Vec::new();
    let mut stats = SimulationStats::default();

    progress.set_total(cells.len() as u64);

    for cell in cells {
        progress.inc(1);

        let Some(centroid) = cell.centroid() else {
            log::warn!("Cell {}: degenerate geometry, skipping", cell.id);
            stats.cells_skipped += 1;
            continue;
        };
        if !config.bounds.contains(centroid) {
            stats.cells_skipped += 1;
            continue;
        }
        stats.cells_consulted += 1;

        for (bucket, &rate) in &cell.rates {
            if rate <= 0.0 {
                continue;
            }

            let count = event_count(rate, config.scale);

            let mut dates: Vec<NaiveDate> = (0..count)
                .map(|_| config.start_date + Duration::days(rng.gen_range(0..day_span)))
                .collect();
            dates.sort_unstable();

            for date in dates {
                let (dx, dy) = if max_offset > 0.0 {
                    (
                        rng.gen_range(-max_offset..=max_offset),
                        rng.gen_range(-max_offset..=max_offset),
                    )
                } else {
                    (0.0, 0.0)
                };
                let location =
                    ambulance_map_reproject::rd_to_wgs84(centroid.x + dx, centroid.y + dy)?;

                let minute = rng.gen_range(0..60);
                let timestamp = date
                    .and_hms_opt(bucket.start_hour(), minute, 0)
                    .expect("bucket start hour is 0-23 and minute is 0-59");

                events.push(SyntheticCallEvent {
                    grid_id: cell.id,
                    population: cell.population,
                    location: Point(location),
                    timestamp,
                    bucket: bucket.clone(),
                    period: bucket.period(),
                    rate,
                });

                stats.total_events += 1;
                *stats.events_by_period.entry(bucket.period()).or_default() += 1;
                *stats.events_by_bucket.entry(bucket.clone()).or_default() += 1;
            }
        }
    }

    log::info!(
        "Simulation produced {} events from {} cells ({} skipped)",
        stats.total_events,
        stats.cells_consulted,
        stats.cells_skipped
    );
    progress.finish(format!("simulated {} events", stats.total_events));

    Ok(SimulationOutcome { events, stats })
}
