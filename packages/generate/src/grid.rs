//! Grid polygon export preserving the original cell footprints.
//!
//! Instead of disaggregating rates into points, this export keeps the grid
//! structure intact: each cell becomes one polygon feature (reprojected to
//! WGS84) carrying its total calls, per-period sums, and a per-hour map.
//! Cells with no calls at all are omitted.

use std::collections::BTreeMap;
use std::sync::Arc;

use ambulance_map_grid_models::{DayPeriod, GridCell};
use ambulance_map_simulate::progress::ProgressCallback;
use geojson::{Feature, FeatureCollection, Geometry};
use serde_json::{Map, Value, json};

/// Counters accumulated across one grid export.
#[derive(Debug, Clone, Default)]
pub struct GridExportStats {
    /// Cells emitted as features.
    pub cells_exported: u64,
    /// Cells omitted because every bucket rate was 0.
    pub cells_skipped_empty: u64,
    /// Cells omitted because a vertex fell outside the reprojection
    /// domain.
    pub cells_skipped_reproject: u64,
    /// Sum of all emitted cells' call rates.
    pub total_calls: f64,
    /// Call totals grouped by day period.
    pub calls_by_period: BTreeMap<DayPeriod, f64>,
}

/// The assembled collection plus its export statistics.
pub struct GridExport {
    /// The `GeoJSON` document.
    pub collection: FeatureCollection,
    /// Counters for reporting.
    pub stats: GridExportStats,
}

/// Converts grid cells into polygon features with aggregated call counts.
#[must_use]
pub fn export_cells(
    cells: &[GridCell],
    source: &str,
    progress: &Arc<dyn ProgressCallback>,
) -> GridExport {
    let mut features = Vec::new();
    let mut stats = GridExportStats::default();

    progress.set_total(cells.len() as u64);

    for cell in cells {
        progress.inc(1);

        let total_calls = cell.total_calls();
        if total_calls <= 0.0 {
            stats.cells_skipped_empty += 1;
            continue;
        }

        let wgs_polygon = match ambulance_map_reproject::polygon_rd_to_wgs84(&cell.geometry) {
            Ok(polygon) => polygon,
            Err(e) => {
                log::warn!("Cell {}: {e}, skipping", cell.id);
                stats.cells_skipped_reproject += 1;
                continue;
            }
        };

        features.push(cell_feature(cell, &wgs_polygon, total_calls));

        stats.cells_exported += 1;
        stats.total_calls += total_calls;
        for period in DayPeriod::all() {
            *stats.calls_by_period.entry(period).or_default() +=
                cell.calls_in_period(period);
        }
    }

    progress.finish(format!("exported {} grid cells", stats.cells_exported));

    let mut foreign_members = Map::new();
    foreign_members.insert("metadata".to_string(), metadata(source, &stats));

    GridExport {
        collection: FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        },
        stats,
    }
}

fn cell_feature(cell: &GridCell, wgs_polygon: &geo::Polygon<f64>, total_calls: f64) -> Feature {
    let calls_by_hour: Map<String, Value> = cell
        .rates
        .iter()
        .map(|(bucket, rate)| (bucket.start_hour().to_string(), json!(rate)))
        .collect();

    let mut properties = Map::new();
    properties.insert("grid_id".to_string(), json!(cell.id));
    properties.insert("population".to_string(), json!(cell.population));
    properties.insert("total_calls".to_string(), json!(total_calls));
    properties.insert(
        "night_calls".to_string(),
        json!(cell.calls_in_period(DayPeriod::Night)),
    );
    properties.insert(
        "morning_calls".to_string(),
        json!(cell.calls_in_period(DayPeriod::Morning)),
    );
    properties.insert(
        "afternoon_calls".to_string(),
        json!(cell.calls_in_period(DayPeriod::Afternoon)),
    );
    properties.insert(
        "evening_calls".to_string(),
        json!(cell.calls_in_period(DayPeriod::Evening)),
    );
    properties.insert("calls_by_hour".to_string(), Value::Object(calls_by_hour));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(wgs_polygon))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn metadata(source: &str, stats: &GridExportStats) -> Value {
    let calls_by_period: Map<String, Value> = DayPeriod::all()
        .iter()
        .map(|period| {
            let calls = stats.calls_by_period.get(period).copied().unwrap_or(0.0);
            (period.to_string(), json!(calls))
        })
        .collect();

    json!({
        "source": source,
        "total_grid_cells": stats.cells_exported,
        "total_calls": stats.total_calls,
        "calls_by_period": calls_by_period,
        "note": "Grid polygons preserve the original cell footprints",
    })
}

#[cfg(test)]
mod tests {
    use ambulance_map_grid_models::TimeBucket;
    use ambulance_map_simulate::progress::null_progress;
    use geo::polygon;

    use super::*;

    fn amsterdam_cell(id: i64) -> GridCell {
        GridCell {
            id,
            geometry: polygon![
                (x: 124_500.0, y: 489_500.0),
                (x: 125_500.0, y: 489_500.0),
                (x: 125_500.0, y: 490_500.0),
                (x: 124_500.0, y: 490_500.0),
                (x: 124_500.0, y: 489_500.0),
            ],
            population: 300,
            rates: BTreeMap::new(),
        }
    }

    #[test]
    fn exports_cells_with_period_aggregates() {
        let mut cell = amsterdam_cell(11);
        cell.rates.insert(TimeBucket::parse("2-3").unwrap(), 0.5);
        cell.rates.insert(TimeBucket::parse("8-9").unwrap(), 1.5);
        cell.rates.insert(TimeBucket::parse("18-19").unwrap(), 1.0);

        let export = export_cells(&[cell], "grid.csv", &null_progress());
        assert_eq!(export.stats.cells_exported, 1);
        assert!((export.stats.total_calls - 3.0).abs() < 1e-9);

        let feature = &export.collection.features[0];
        let properties = feature.properties.as_ref().unwrap();
        assert_eq!(properties["grid_id"], json!(11));
        assert_eq!(properties["population"], json!(300));
        assert_eq!(properties["total_calls"], json!(3.0));
        assert_eq!(properties["night_calls"], json!(0.5));
        assert_eq!(properties["morning_calls"], json!(1.5));
        assert_eq!(properties["afternoon_calls"], json!(0.0));
        assert_eq!(properties["evening_calls"], json!(1.0));
        assert_eq!(properties["calls_by_hour"]["2"], json!(0.5));
        assert_eq!(properties["calls_by_hour"]["8"], json!(1.5));

        let Some(Geometry {
            value: geojson::Value::Polygon(rings),
            ..
        }) = &feature.geometry
        else {
            panic!("expected polygon geometry");
        };
        for position in &rings[0] {
            assert!((4.0..6.0).contains(&position[0]));
            assert!((52.0..53.0).contains(&position[1]));
        }
    }

    #[test]
    fn omits_cells_without_calls() {
        let mut with_calls = amsterdam_cell(1);
        with_calls
            .rates
            .insert(TimeBucket::parse("8-9").unwrap(), 0.25);
        let empty = amsterdam_cell(2);

        let export = export_cells(&[with_calls, empty], "grid.csv", &null_progress());
        assert_eq!(export.collection.features.len(), 1);
        assert_eq!(export.stats.cells_exported, 1);
        assert_eq!(export.stats.cells_skipped_empty, 1);
    }

    #[test]
    fn skips_cells_outside_the_reprojection_domain() {
        let mut cell = GridCell {
            id: 3,
            geometry: polygon![
                (x: 500_000.0, y: 489_500.0),
                (x: 501_000.0, y: 489_500.0),
                (x: 501_000.0, y: 490_500.0),
                (x: 500_000.0, y: 489_500.0),
            ],
            population: 0,
            rates: BTreeMap::new(),
        };
        cell.rates.insert(TimeBucket::parse("8-9").unwrap(), 1.0);

        let export = export_cells(&[cell], "grid.csv", &null_progress());
        assert!(export.collection.features.is_empty());
        assert_eq!(export.stats.cells_skipped_reproject, 1);
    }

    #[test]
    fn metadata_totals_match_the_export() {
        let mut a = amsterdam_cell(1);
        a.rates.insert(TimeBucket::parse("8-9").unwrap(), 1.0);
        let mut b = amsterdam_cell(2);
        b.rates.insert(TimeBucket::parse("18-19").unwrap(), 2.0);

        let export = export_cells(&[a, b], "grid.csv", &null_progress());
        let metadata = &export.collection.foreign_members.as_ref().unwrap()["metadata"];

        assert_eq!(metadata["source"], json!("grid.csv"));
        assert_eq!(metadata["total_grid_cells"], json!(2));
        assert_eq!(metadata["total_calls"], json!(3.0));
        assert_eq!(metadata["calls_by_period"]["morning"], json!(1.0));
        assert_eq!(metadata["calls_by_period"]["evening"], json!(2.0));
        assert_eq!(metadata["calls_by_period"]["night"], json!(0.0));
    }
}
