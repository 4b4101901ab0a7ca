//! Point feature assembly for simulated call events.
//!
//! Each [`SyntheticCallEvent`] becomes one `GeoJSON` point feature carrying
//! its provenance (owning cell, population, bucket, period, original rate)
//! and timestamp fields. The collection-level metadata block summarizes the
//! run: source table, date range, totals, and per-period / per-bucket
//! counts.

use ambulance_map_grid_models::{DayPeriod, SyntheticCallEvent};
use ambulance_map_simulate::{SimulationConfig, SimulationOutcome};
use geojson::{Feature, FeatureCollection, Geometry};
use serde_json::{Map, Value, json};

/// Assembles the full feature collection for a simulation run.
#[must_use]
pub fn feature_collection(
    source: &str,
    config: &SimulationConfig,
    outcome: &SimulationOutcome,
) -> FeatureCollection {
    let features = outcome.events.iter().map(event_feature).collect();

    let mut foreign_members = Map::new();
    foreign_members.insert("metadata".to_string(), metadata(source, config, outcome));

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    }
}

fn event_feature(event: &SyntheticCallEvent) -> Feature {
    let mut properties = Map::new();
    properties.insert("grid_id".to_string(), json!(event.grid_id));
    properties.insert("population".to_string(), json!(event.population));
    properties.insert(
        "timestamp".to_string(),
        json!(event.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()),
    );
    properties.insert(
        "date".to_string(),
        json!(event.timestamp.format("%Y-%m-%d").to_string()),
    );
    properties.insert(
        "time".to_string(),
        json!(event.timestamp.format("%H:%M").to_string()),
    );
    properties.insert("hour".to_string(), json!(event.bucket.label()));
    properties.insert("period".to_string(), json!(event.period.to_string()));
    properties.insert("calls".to_string(), json!(event.rate));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::Point(vec![
            event.location.x(),
            event.location.y(),
        ]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn metadata(source: &str, config: &SimulationConfig, outcome: &SimulationOutcome) -> Value {
    let events_by_period: Map<String, Value> = DayPeriod::all()
        .iter()
        .map(|period| {
            let count = outcome
                .stats
                .events_by_period
                .get(period)
                .copied()
                .unwrap_or(0);
            (period.to_string(), json!(count))
        })
        .collect();

    let events_by_hour: Map<String, Value> = outcome
        .stats
        .events_by_bucket
        .iter()
        .map(|(bucket, count)| (bucket.label().to_string(), json!(count)))
        .collect();

    json!({
        "source": source,
        "date_range": format!("{} to {}", config.start_date, config.end_date),
        "total_events": outcome.stats.total_events,
        "events_by_period": events_by_period,
        "events_by_hour": events_by_hour,
        "grid_cells": outcome.stats.cells_consulted,
    })
}

#[cfg(test)]
mod tests {
    use ambulance_map_grid_models::{BoundingBox, TimeBucket};
    use ambulance_map_simulate::SimulationStats;
    use chrono::NaiveDate;
    use geo::Point;

    use super::*;

    fn sample_outcome() -> SimulationOutcome {
        let bucket = TimeBucket::parse("8-9").unwrap();
        let timestamp = NaiveDate::from_ymd_opt(2017, 9, 1)
            .unwrap()
            .and_hms_opt(8, 23, 0)
            .unwrap();

        let event = SyntheticCallEvent {
            grid_id: 42,
            population: 100,
            location: Point::new(4.9041, 52.3676),
            timestamp,
            bucket: bucket.clone(),
            period: bucket.period(),
            rate: 0.02,
        };

        let stats = SimulationStats {
            total_events: 1,
            cells_consulted: 1,
            events_by_period: [(bucket.period(), 1)].into(),
            events_by_bucket: [(bucket, 1)].into(),
            ..Default::default()
        };

        SimulationOutcome {
            events: vec![event],
            stats,
        }
    }

    fn sample_config() -> SimulationConfig {
        SimulationConfig {
            bounds: BoundingBox::new(118_000.0, 480_000.0, 130_000.0, 495_000.0),
            start_date: NaiveDate::from_ymd_opt(2017, 9, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2017, 9, 2).unwrap(),
            cell_size: 1000.0,
            jitter_fraction: 0.4,
            scale: 100.0,
        }
    }

    #[test]
    fn event_feature_carries_provenance_properties() {
        let collection = feature_collection("grid.csv", &sample_config(), &sample_outcome());
        assert_eq!(collection.features.len(), 1);

        let feature = &collection.features[0];
        let properties = feature.properties.as_ref().unwrap();
        assert_eq!(properties["grid_id"], json!(42));
        assert_eq!(properties["population"], json!(100));
        assert_eq!(properties["timestamp"], json!("2017-09-01T08:23:00"));
        assert_eq!(properties["date"], json!("2017-09-01"));
        assert_eq!(properties["time"], json!("08:23"));
        assert_eq!(properties["hour"], json!("8-9"));
        assert_eq!(properties["period"], json!("morning"));
        assert_eq!(properties["calls"], json!(0.02));

        let Some(Geometry {
            value: geojson::Value::Point(coords),
            ..
        }) = &feature.geometry
        else {
            panic!("expected point geometry");
        };
        assert!((coords[0] - 4.9041).abs() < 1e-12);
        assert!((coords[1] - 52.3676).abs() < 1e-12);
    }

    #[test]
    fn metadata_summarizes_the_run() {
        let collection = feature_collection("grid.csv", &sample_config(), &sample_outcome());
        let metadata = &collection.foreign_members.as_ref().unwrap()["metadata"];

        assert_eq!(metadata["source"], json!("grid.csv"));
        assert_eq!(metadata["date_range"], json!("2017-09-01 to 2017-09-02"));
        assert_eq!(metadata["total_events"], json!(1));
        assert_eq!(metadata["grid_cells"], json!(1));
        assert_eq!(metadata["events_by_period"]["morning"], json!(1));
        assert_eq!(metadata["events_by_period"]["night"], json!(0));
        assert_eq!(metadata["events_by_hour"]["8-9"], json!(1));
    }

    #[test]
    fn empty_outcome_produces_an_empty_collection() {
        let outcome = SimulationOutcome {
            events: vec![],
            stats: SimulationStats::default(),
        };
        let collection = feature_collection("grid.csv", &sample_config(), &outcome);
        assert!(collection.features.is_empty());

        let metadata = &collection.foreign_members.as_ref().unwrap()["metadata"];
        assert_eq!(metadata["total_events"], json!(0));
        assert_eq!(metadata["events_by_period"]["evening"], json!(0));
    }
}
