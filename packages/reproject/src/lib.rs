#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Coordinate transformation from RD New (EPSG:28992) to WGS84 (EPSG:4326).
//!
//! Implements the Schreutelkamp / Strang van Hees polynomial approximation,
//! which is accurate to roughly a decimeter across the Netherlands. The
//! transform is a pure function with no state; the only failure mode is
//! input outside the approximation domain.

use geo::{Coord, LineString, Polygon};
use thiserror::Error;

/// RD x of the reference point (Onze Lieve Vrouwetoren, Amersfoort).
const X0: f64 = 155_000.0;
/// RD y of the reference point.
const Y0: f64 = 463_000.0;
/// WGS84 latitude of the reference point, in degrees.
const PHI0: f64 = 52.155_174_40;
/// WGS84 longitude of the reference point, in degrees.
const LAM0: f64 = 5.387_206_21;

/// Approximation domain of the polynomial in RD coordinates. Outside this
/// rectangle the series diverges from the authoritative transform.
const DOMAIN_MIN_X: f64 = -7_000.0;
const DOMAIN_MAX_X: f64 = 300_000.0;
const DOMAIN_MIN_Y: f64 = 289_000.0;
const DOMAIN_MAX_Y: f64 = 629_000.0;

/// Latitude series terms: (p, q, coefficient) for `dx^p * dy^q`, in
/// seconds of arc.
const K: [(i32, i32, f64); 11] = [
    (0, 1, 3235.653_89),
    (2, 0, -32.582_97),
    (0, 2, -0.247_50),
    (2, 1, -0.849_78),
    (0, 3, -0.065_50),
    (2, 2, -0.017_09),
    (1, 0, -0.007_38),
    (4, 0, 0.005_30),
    (2, 3, -0.000_39),
    (4, 1, 0.000_33),
    (1, 1, -0.000_12),
];

/// Longitude series terms: (p, q, coefficient) for `dx^p * dy^q`, in
/// seconds of arc.
const L: [(i32, i32, f64); 12] = [
    (1, 0, 5260.529_16),
    (1, 1, 105.946_84),
    (1, 2, 2.456_56),
    (3, 0, -0.818_85),
    (1, 3, 0.055_94),
    (3, 1, -0.056_07),
    (0, 1, 0.011_99),
    (3, 2, -0.002_56),
    (1, 4, 0.001_28),
    (0, 2, 0.000_22),
    (2, 0, -0.000_22),
    (5, 0, 0.000_26),
];

/// Errors that can occur during coordinate transformation.
#[derive(Debug, Error)]
pub enum ReprojectError {
    /// The input point lies outside the polynomial's approximation domain.
    #[error(
        "RD coordinate ({x}, {y}) is outside the transformation domain \
         ({DOMAIN_MIN_X}..{DOMAIN_MAX_X}, {DOMAIN_MIN_Y}..{DOMAIN_MAX_Y})"
    )]
    OutOfDomain {
        /// RD x of the rejected point.
        x: f64,
        /// RD y of the rejected point.
        y: f64,
    },
}

/// Transforms an RD New coordinate pair into WGS84.
///
/// Returns a [`Coord`] with `x` = longitude and `y` = latitude, both in
/// degrees.
///
/// # Errors
///
/// Returns [`ReprojectError::OutOfDomain`] if the point lies outside the
/// approximation domain.
pub fn rd_to_wgs84(x: f64, y: f64) -> Result<Coord<f64>, ReprojectError> {
    if !(DOMAIN_MIN_X..=DOMAIN_MAX_X).contains(&x) || !(DOMAIN_MIN_Y..=DOMAIN_MAX_Y).contains(&y) {
        return Err(ReprojectError::OutOfDomain { x, y });
    }

    let dx = (x - X0) * 1e-5;
    let dy = (y - Y0) * 1e-5;

    let dphi: f64 = K
        .iter()
        .map(|&(p, q, k)| k * dx.powi(p) * dy.powi(q))
        .sum();
    let dlam: f64 = L
        .iter()
        .map(|&(p, q, l)| l * dx.powi(p) * dy.powi(q))
        .sum();

    Ok(Coord {
        x: LAM0 + dlam / 3600.0,
        y: PHI0 + dphi / 3600.0,
    })
}

/// Transforms every ring coordinate of an RD polygon into WGS84.
///
/// # Errors
///
/// Returns [`ReprojectError::OutOfDomain`] if any vertex lies outside the
/// approximation domain.
pub fn polygon_rd_to_wgs84(polygon: &Polygon<f64>) -> Result<Polygon<f64>, ReprojectError> {
    let exterior = ring_rd_to_wgs84(polygon.exterior())?;
    let interiors = polygon
        .interiors()
        .iter()
        .map(ring_rd_to_wgs84)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring_rd_to_wgs84(ring: &LineString<f64>) -> Result<LineString<f64>, ReprojectError> {
    ring.coords()
        .map(|c| rd_to_wgs84(c.x, c.y))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::from)
}
