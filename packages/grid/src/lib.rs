#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! CSV ingestion for the spatiotemporal grid.
//!
//! Reads the grid table (one row per cell: WKT polygon geometry in RD New
//! coordinates, integer id, population, and one numeric rate column per
//! time bucket) into [`GridCell`] records. Loading is lenient at the record
//! level: rows with unparseable geometry or id are skipped and counted,
//! missing or unparseable numeric fields coerce to 0, and an empty table is
//! a valid result. Only an unreadable file or a missing required column is
//! fatal.

use std::io;
use std::path::Path;

use ambulance_map_grid_models::{GridCell, TimeBucket};
use geo::{Geometry, Polygon};
use wkt::Wkt;

/// Errors that can occur while loading the grid table.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The input file could not be opened or read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The CSV header row could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent from the header row.
    #[error("missing required column {name:?}")]
    MissingColumn {
        /// Name of the absent column.
        name: String,
    },
}

/// Column naming for the grid table.
///
/// Defaults match the source dataset: 1 km RD grid identifiers in
/// `c28992r1000`, population in `aantal_inwoners`, WKT polygons in
/// `geometry`. Time-bucket columns are auto-detected from the header by
/// label shape and need no configuration.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Header name of the cell identifier column.
    pub id_column: String,
    /// Header name of the population column.
    pub population_column: String,
    /// Header name of the WKT geometry column.
    pub geometry_column: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            id_column: "c28992r1000".to_string(),
            population_column: "aantal_inwoners".to_string(),
            geometry_column: "geometry".to_string(),
        }
    }
}

/// The loaded grid table plus record-level skip accounting.
#[derive(Debug, Clone)]
pub struct GridTable {
    /// Successfully parsed cells, in file order.
    pub cells: Vec<GridCell>,
    /// Bucket columns detected in the header, in column order.
    pub buckets: Vec<TimeBucket>,
    /// Rows dropped for unparseable geometry or id.
    pub skipped_records: u64,
}

/// Loads the grid table from a CSV file.
///
/// # Errors
///
/// Returns [`GridError`] if the file cannot be opened or the header row is
/// missing a required column. Malformed data rows are skipped, not fatal.
pub fn load_grid(path: &Path, options: &LoadOptions) -> Result<GridTable, GridError> {
    let file = std::fs::File::open(path)?;
    let table = read_grid(file, options)?;
    log::info!(
        "Loaded {} grid cells ({} bucket columns, {} rows skipped) from {}",
        table.cells.len(),
        table.buckets.len(),
        table.skipped_records,
        path.display()
    );
    Ok(table)
}

/// Reads the grid table from any CSV reader.
///
/// # Errors
///
/// Returns [`GridError`] if the header row cannot be read or is missing a
/// required column.
pub fn read_grid<R: io::Read>(reader: R, options: &LoadOptions) -> Result<GridTable, GridError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let id_idx = column_index(&headers, &options.id_column)?;
    let population_idx = column_index(&headers, &options.population_column)?;
    let geometry_idx = column_index(&headers, &options.geometry_column)?;

    // Every remaining column whose header parses as a bucket label is a
    // rate column. This covers both the hourly ("0-1".."23-0") and the
    // 4-hour block dataset variants.
    let bucket_columns: Vec<(usize, TimeBucket)> = headers
        .iter()
        .enumerate()
        .filter(|&(idx, _)| idx != id_idx && idx != population_idx && idx != geometry_idx)
        .filter_map(|(idx, header)| TimeBucket::parse(header).ok().map(|bucket| (idx, bucket)))
        .collect();

    let mut cells = Vec::new();
    let mut skipped_records: u64 = 0;

    for result in csv_reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping unreadable CSV record: {e}");
                skipped_records += 1;
                continue;
            }
        };

        let Some(id) = record.get(id_idx).and_then(parse_cell_id) else {
            log::warn!("Skipping record with unparseable id {:?}", record.get(id_idx));
            skipped_records += 1;
            continue;
        };

        let Some(geometry) = record.get(geometry_idx).and_then(parse_wkt_polygon) else {
            log::warn!("Skipping cell {id}: unparseable geometry");
            skipped_records += 1;
            continue;
        };

        let population = record.get(population_idx).map_or(0, parse_population);

        let rates = bucket_columns
            .iter()
            .map(|(idx, bucket)| (bucket.clone(), record.get(*idx).map_or(0.0, parse_rate)))
            .collect();

        cells.push(GridCell {
            id,
            geometry,
            population,
            rates,
        });
    }

    Ok(GridTable {
        cells,
        buckets: bucket_columns.into_iter().map(|(_, bucket)| bucket).collect(),
        skipped_records,
    })
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, GridError> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| GridError::MissingColumn {
            name: name.to_string(),
        })
}

/// Parses a cell identifier. Accepts plain integers and integer-valued
/// floats (`"3075"`, `"3075.0"`).
#[allow(clippy::cast_possible_truncation)]
fn parse_cell_id(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(id) = s.parse::<i64>() {
        return Some(id);
    }
    let value = s.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 {
        Some(value as i64)
    } else {
        None
    }
}

/// Parses a WKT geometry string into a polygon. Non-polygon geometries are
/// rejected.
fn parse_wkt_polygon(s: &str) -> Option<Polygon<f64>> {
    let parsed: Wkt<f64> = s.trim().parse().ok()?;
    match Geometry::try_from(parsed).ok()? {
        Geometry::Polygon(polygon) => Some(polygon),
        _ => None,
    }
}

/// Parses a population value; missing, unparseable, or negative values
/// coerce to 0. Integer-valued floats are accepted.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_population(s: &str) -> u32 {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map_or(0, |v| v.round() as u32)
}

/// Parses a rate value; anything missing, unparseable, non-finite, or
/// negative coerces to 0.
fn parse_rate(s: &str) -> f64 {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "POLYGON ((125000 490000, 126000 490000, 126000 491000, 125000 491000, 125000 490000))";

    fn sample_csv() -> String {
        format!(
            "c28992r1000,aantal_inwoners,geometry,0-1,8-9,23-0\n\
             42,100,\"{SQUARE}\",0.5,0.02,1.75\n\
             43,,\"{SQUARE}\",,bogus,-3\n"
        )
    }

    #[test]
    fn loads_cells_and_detects_buckets() {
        let table = read_grid(sample_csv().as_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(table.cells.len(), 2);
        assert_eq!(table.skipped_records, 0);
        assert_eq!(
            table
                .buckets
                .iter()
                .map(TimeBucket::start_hour)
                .collect::<Vec<_>>(),
            vec![0, 8, 23]
        );

        let cell = &table.cells[0];
        assert_eq!(cell.id, 42);
        assert_eq!(cell.population, 100);
        let bucket = TimeBucket::parse("8-9").unwrap();
        assert!((cell.rates[&bucket] - 0.02).abs() < 1e-12);
    }

    #[test]
    fn coerces_missing_and_invalid_numerics_to_zero() {
        let table = read_grid(sample_csv().as_bytes(), &LoadOptions::default()).unwrap();
        let cell = &table.cells[1];
        assert_eq!(cell.population, 0);
        for rate in cell.rates.values() {
            assert!((*rate).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn skips_rows_with_bad_geometry() {
        let csv = "c28992r1000,aantal_inwoners,geometry,8-9\n\
                   1,10,not-a-polygon,0.5\n\
                   2,20,\"POINT (1 2)\",0.5\n";
        let table = read_grid(csv.as_bytes(), &LoadOptions::default()).unwrap();
        assert!(table.cells.is_empty());
        assert_eq!(table.skipped_records, 2);
    }

    #[test]
    fn skips_rows_with_bad_id() {
        let csv = format!(
            "c28992r1000,aantal_inwoners,geometry,8-9\n\
             not-an-id,10,\"{SQUARE}\",0.5\n"
        );
        let table = read_grid(csv.as_bytes(), &LoadOptions::default()).unwrap();
        assert!(table.cells.is_empty());
        assert_eq!(table.skipped_records, 1);
    }

    #[test]
    fn accepts_float_valued_ids() {
        let csv = format!(
            "c28992r1000,aantal_inwoners,geometry,8-9\n\
             3075.0,10,\"{SQUARE}\",0.5\n"
        );
        let table = read_grid(csv.as_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(table.cells[0].id, 3075);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let csv = "id,geometry,8-9\n1,\"POLYGON ((0 0, 1 0, 1 1, 0 0))\",0.5\n";
        let err = read_grid(csv.as_bytes(), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, GridError::MissingColumn { name } if name == "c28992r1000"));
    }

    #[test]
    fn header_only_table_is_valid_and_empty() {
        let csv = "c28992r1000,aantal_inwoners,geometry,0-1\n";
        let table = read_grid(csv.as_bytes(), &LoadOptions::default()).unwrap();
        assert!(table.cells.is_empty());
        assert_eq!(table.skipped_records, 0);
        assert_eq!(table.buckets.len(), 1);
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = load_grid(
            Path::new("/nonexistent/grid.csv"),
            &LoadOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GridError::Io(_)));
    }
}
