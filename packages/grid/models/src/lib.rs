#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Core domain types for the ambulance call grid dataset.
//!
//! This crate defines the canonical in-memory representation of the
//! spatiotemporal grid: square cells in the RD New projected coordinate
//! system carrying per-time-bucket call rates, the time bucket and day
//! period taxonomy, and the synthetic call events produced by the
//! disaggregation pipeline. No I/O lives here.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use geo::{Centroid, Coord, Point, Polygon};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Coarse grouping of hour-of-day buckets used for aggregation and
/// reporting.
///
/// The hour table is: night = {23, 0, 1, 2, 3, 4}, morning = {5..=10},
/// afternoon = {11..=16}, evening = {17..=22}.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DayPeriod {
    /// Hours 23 and 0-4.
    Night,
    /// Hours 5-10.
    Morning,
    /// Hours 11-16.
    Afternoon,
    /// Hours 17-22.
    Evening,
}

impl DayPeriod {
    /// Classifies an hour of day (0-23) into its period.
    ///
    /// Hours outside 0-23 are folded into the valid range modulo 24 so the
    /// lookup is total.
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour % 24 {
            23 | 0..=4 => Self::Night,
            5..=10 => Self::Morning,
            11..=16 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    /// All periods in reporting order.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Night, Self::Morning, Self::Afternoon, Self::Evening]
    }
}

/// Error returned when a time bucket label cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBucketError {
    /// The label that failed to parse.
    pub label: String,
}

impl std::fmt::Display for InvalidBucketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid time bucket label {:?}: expected an hour 0-23 or a \"start-end\" range",
            self.label
        )
    }
}

impl std::error::Error for InvalidBucketError {}

/// A labeled sub-day interval, identified by its start hour.
///
/// Labels come straight from the dataset's column headers. Both hourly
/// labels (`"8-9"`, `"23-0"`) and block labels (`"8-12"`) parse, as does a
/// bare start hour (`"8"`); the start hour is what identifies the bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeBucket {
    start_hour: u32,
    label: String,
}

impl TimeBucket {
    /// Parses a bucket from a column label.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBucketError`] if the label is not a bare hour or an
    /// `"start-end"` range, or if the start hour is not in 0-23.
    pub fn parse(label: &str) -> Result<Self, InvalidBucketError> {
        let start = label.split('-').next().unwrap_or(label).trim();
        let start_hour: u32 = start.parse().map_err(|_| InvalidBucketError {
            label: label.to_string(),
        })?;
        if start_hour > 23 {
            return Err(InvalidBucketError {
                label: label.to_string(),
            });
        }
        Ok(Self {
            start_hour,
            label: label.to_string(),
        })
    }

    /// The hour of day (0-23) at which this bucket starts.
    #[must_use]
    pub const fn start_hour(&self) -> u32 {
        self.start_hour
    }

    /// The original column label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The coarse day period this bucket falls in.
    #[must_use]
    pub const fn period(&self) -> DayPeriod {
        DayPeriod::from_hour(self.start_hour)
    }
}

impl std::str::FromStr for TimeBucket {
    type Err = InvalidBucketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Axis-aligned rectangle in RD New coordinates with inclusive containment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Western edge (RD x).
    pub min_x: f64,
    /// Southern edge (RD y).
    pub min_y: f64,
    /// Eastern edge (RD x).
    pub max_x: f64,
    /// Northern edge (RD y).
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates a bounding box from two opposite corners.
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Inclusive point-in-rectangle test.
    #[must_use]
    pub fn contains(&self, coord: Coord<f64>) -> bool {
        coord.x >= self.min_x
            && coord.x <= self.max_x
            && coord.y >= self.min_y
            && coord.y <= self.max_y
    }
}

/// One square cell of the spatial partition.
///
/// Holds the polygon footprint in RD New coordinates, the resident
/// population, and the per-bucket call rates. Rates are fractional expected
/// counts per bucket, not integer tallies. Cells are read-only after
/// loading.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    /// Stable integer identifier from the source table.
    pub id: i64,
    /// Cell footprint in RD New coordinates.
    pub geometry: Polygon<f64>,
    /// Resident population (0 when missing in the source).
    pub population: u32,
    /// Call rate per time bucket. Values are finite and non-negative;
    /// missing or unparseable source values are coerced to 0.
    pub rates: BTreeMap<TimeBucket, f64>,
}

impl GridCell {
    /// Centroid of the cell footprint in RD New coordinates.
    ///
    /// `None` for degenerate geometry (empty polygon).
    #[must_use]
    pub fn centroid(&self) -> Option<Coord<f64>> {
        self.geometry.centroid().map(|p| p.0)
    }

    /// Sum of all bucket rates.
    #[must_use]
    pub fn total_calls(&self) -> f64 {
        self.rates.values().sum()
    }

    /// Sum of bucket rates falling in the given period.
    #[must_use]
    pub fn calls_in_period(&self, period: DayPeriod) -> f64 {
        self.rates
            .iter()
            .filter(|(bucket, _)| bucket.period() == period)
            .map(|(_, rate)| rate)
            .sum()
    }
}

/// A discrete synthetic ambulance call produced by disaggregation.
///
/// Created once by the simulation, never mutated afterwards. The location
/// is already reprojected to WGS84 (longitude, latitude).
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticCallEvent {
    /// Identifier of the owning grid cell.
    pub grid_id: i64,
    /// Population of the owning cell.
    pub population: u32,
    /// Jittered event location in WGS84 (x = longitude, y = latitude).
    pub location: Point<f64>,
    /// Event timestamp: drawn date at the bucket's start hour with a
    /// randomized minute.
    pub timestamp: NaiveDateTime,
    /// The time bucket the event was generated from.
    pub bucket: TimeBucket,
    /// Day period of the bucket.
    pub period: DayPeriod,
    /// The original fractional rate that produced this event.
    pub rate: f64,
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    #[test]
    fn period_table_boundaries() {
        assert_eq!(DayPeriod::from_hour(23), DayPeriod::Night);
        assert_eq!(DayPeriod::from_hour(0), DayPeriod::Night);
        assert_eq!(DayPeriod::from_hour(4), DayPeriod::Night);
        assert_eq!(DayPeriod::from_hour(5), DayPeriod::Morning);
        assert_eq!(DayPeriod::from_hour(10), DayPeriod::Morning);
        assert_eq!(DayPeriod::from_hour(11), DayPeriod::Afternoon);
        assert_eq!(DayPeriod::from_hour(16), DayPeriod::Afternoon);
        assert_eq!(DayPeriod::from_hour(17), DayPeriod::Evening);
        assert_eq!(DayPeriod::from_hour(22), DayPeriod::Evening);
    }

    #[test]
    fn every_hour_has_a_period() {
        for hour in 0..24 {
            let period = DayPeriod::from_hour(hour);
            assert!(DayPeriod::all().contains(&period));
        }
    }

    #[test]
    fn parses_hourly_bucket_label() {
        let bucket = TimeBucket::parse("8-9").unwrap();
        assert_eq!(bucket.start_hour(), 8);
        assert_eq!(bucket.label(), "8-9");
        assert_eq!(bucket.period(), DayPeriod::Morning);
    }

    #[test]
    fn parses_wraparound_bucket_label() {
        let bucket = TimeBucket::parse("23-0").unwrap();
        assert_eq!(bucket.start_hour(), 23);
        assert_eq!(bucket.period(), DayPeriod::Night);
    }

    #[test]
    fn parses_bare_hour_label() {
        let bucket = TimeBucket::parse("8").unwrap();
        assert_eq!(bucket.start_hour(), 8);
        assert_eq!(bucket.label(), "8");
    }

    #[test]
    fn parses_block_bucket_label() {
        let bucket = TimeBucket::parse("20-24").unwrap();
        assert_eq!(bucket.start_hour(), 20);
        assert_eq!(bucket.period(), DayPeriod::Evening);
    }

    #[test]
    fn rejects_invalid_bucket_labels() {
        assert!(TimeBucket::parse("geometry").is_err());
        assert!(TimeBucket::parse("24-1").is_err());
        assert!(TimeBucket::parse("").is_err());
    }

    #[test]
    fn bounding_box_is_inclusive() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(bbox.contains(Coord { x: 0.0, y: 0.0 }));
        assert!(bbox.contains(Coord { x: 10.0, y: 10.0 }));
        assert!(bbox.contains(Coord { x: 5.0, y: 5.0 }));
        assert!(!bbox.contains(Coord { x: 10.1, y: 5.0 }));
        assert!(!bbox.contains(Coord { x: 5.0, y: -0.1 }));
    }

    fn unit_cell(id: i64) -> GridCell {
        GridCell {
            id,
            geometry: polygon![
                (x: 0.0, y: 0.0),
                (x: 1000.0, y: 0.0),
                (x: 1000.0, y: 1000.0),
                (x: 0.0, y: 1000.0),
                (x: 0.0, y: 0.0),
            ],
            population: 250,
            rates: BTreeMap::new(),
        }
    }

    #[test]
    fn cell_centroid_is_square_center() {
        let cell = unit_cell(1);
        let centroid = cell.centroid().unwrap();
        assert!((centroid.x - 500.0).abs() < 1e-9);
        assert!((centroid.y - 500.0).abs() < 1e-9);
    }

    #[test]
    fn cell_period_aggregation() {
        let mut cell = unit_cell(7);
        cell.rates.insert(TimeBucket::parse("2-3").unwrap(), 0.5);
        cell.rates.insert(TimeBucket::parse("8-9").unwrap(), 1.25);
        cell.rates.insert(TimeBucket::parse("9-10").unwrap(), 0.75);
        cell.rates.insert(TimeBucket::parse("18-19").unwrap(), 2.0);

        assert!((cell.total_calls() - 4.5).abs() < 1e-9);
        assert!((cell.calls_in_period(DayPeriod::Night) - 0.5).abs() < 1e-9);
        assert!((cell.calls_in_period(DayPeriod::Morning) - 2.0).abs() < 1e-9);
        assert!((cell.calls_in_period(DayPeriod::Afternoon)).abs() < 1e-9);
        assert!((cell.calls_in_period(DayPeriod::Evening) - 2.0).abs() < 1e-9);
    }
}
