//! Sampling grid generation.
//!
//! Turns a center coordinate, a radius and a grid size into an evenly
//! spaced, row-major list of sample coordinates. Rows step latitude from
//! south to north; columns step longitude from west to east.
//!
//! Every generated point is a valid coordinate. Longitudes past the
//! antimeridian wrap into [-180, 180], latitudes past a pole are clamped
//! to [`MAX_LATITUDE`], and the longitude half-span never exceeds 180°.

use crate::models::{Coordinate, GridPoint, GridSize};
use tracing::debug;

/// Kilometers per degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.32;

/// Largest absolute latitude a grid point may take.
pub const MAX_LATITUDE: f64 = 89.9999;

/// Half-extent of the grid in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegreeSpan {
    pub lat: f64,
    pub lng: f64,
}

impl DegreeSpan {
    /// Convert a radius in kilometers to degrees around `center`.
    ///
    /// Longitude degrees shrink by cos(latitude) away from the equator.
    pub fn from_radius_km(center: Coordinate, radius_km: f64) -> Self {
        let lat = radius_km / KM_PER_DEGREE;
        let lng = radius_km / (KM_PER_DEGREE * center.lat.to_radians().cos());
        Self {
            lat,
            lng: lng.min(180.0),
        }
    }
}

/// Generates sample coordinates for one grid geometry.
#[derive(Debug, Clone, Copy)]
pub struct GridSampler {
    center: Coordinate,
    span: DegreeSpan,
    size: GridSize,
}

impl GridSampler {
    /// `radius_km` must already be normalized to kilometers.
    pub fn new(center: Coordinate, radius_km: f64, size: GridSize) -> Self {
        Self {
            center,
            span: DegreeSpan::from_radius_km(center, radius_km),
            size,
        }
    }

    pub fn span(&self) -> DegreeSpan {
        self.span
    }

    /// Produce `rows * cols` points in row-major order.
    pub fn points(&self) -> Vec<GridPoint> {
        let lats = axis(self.center.lat, self.span.lat, self.size.rows);
        let lngs = axis(self.center.lng, self.span.lng, self.size.cols);

        let mut points = Vec::with_capacity(self.size.point_count());
        for (row, &lat) in (0u32..).zip(&lats) {
            for (col, &lng) in (0u32..).zip(&lngs) {
                points.push(GridPoint {
                    row,
                    col,
                    coordinate: Coordinate::new(clamp_latitude(lat), wrap_longitude(lng)),
                });
            }
        }

        debug!(
            "Generated {} grid points around {} (span {:.5}°, {:.5}°)",
            points.len(),
            self.center,
            self.span.lat,
            self.span.lng
        );

        points
    }
}

/// Convenience wrapper around [`GridSampler`].
pub fn generate_grid_points(center: Coordinate, radius_km: f64, size: GridSize) -> Vec<GridPoint> {
    GridSampler::new(center, radius_km, size).points()
}

/// Clamp to just inside the poles. In-range values are returned unchanged.
fn clamp_latitude(lat: f64) -> f64 {
    lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
}

/// Wrap into [-180, 180]. In-range values are returned unchanged.
fn wrap_longitude(lng: f64) -> f64 {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 540.0).rem_euclid(360.0) - 180.0
    }
}

/// Evenly spaced values over `[mid - half, mid + half]`, both ends included.
///
/// A single sample sits at `mid`.
fn axis(mid: f64, half: f64, count: u32) -> Vec<f64> {
    if count <= 1 {
        return vec![mid];
    }

    let start = mid - half;
    let step = (2.0 * half) / f64::from(count - 1);
    (0..count)
        .map(|i| {
            if i == count - 1 {
                mid + half
            } else {
                start + step * f64::from(i)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn size(rows: u32, cols: u32) -> GridSize {
        GridSize::new(rows, cols).unwrap()
    }

    #[test]
    fn test_point_count_and_extremes() {
        let center = Coordinate::new(37.7749, -122.4194);
        let sampler = GridSampler::new(center, 5.0, size(3, 4));
        let span = sampler.span();
        let points = sampler.points();

        assert_eq!(points.len(), 12);

        let first = points.first().unwrap().coordinate;
        assert!((first.lat - (center.lat - span.lat)).abs() < EPS);
        assert!((first.lng - (center.lng - span.lng)).abs() < EPS);

        let last = points.last().unwrap().coordinate;
        assert!((last.lat - (center.lat + span.lat)).abs() < EPS);
        assert!((last.lng - (center.lng + span.lng)).abs() < EPS);
    }

    #[test]
    fn test_row_major_order() {
        let points = generate_grid_points(Coordinate::new(10.0, 20.0), 3.0, size(2, 3));
        let order: Vec<(u32, u32)> = points.iter().map(|p| (p.row, p.col)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);

        // Within a row only longitude moves.
        assert_eq!(points[0].coordinate.lat, points[2].coordinate.lat);
        assert!(points[0].coordinate.lng < points[1].coordinate.lng);
        assert!(points[0].coordinate.lat < points[3].coordinate.lat);
    }

    #[test]
    fn test_single_point_is_center() {
        let center = Coordinate::new(51.5074, -0.1278);
        let points = generate_grid_points(center, 10.0, size(1, 1));
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].coordinate, center);
    }

    #[test]
    fn test_single_row_or_column_uses_axis_center() {
        let center = Coordinate::new(40.0, -74.0);

        let row = generate_grid_points(center, 2.0, size(1, 5));
        assert_eq!(row.len(), 5);
        assert!(row.iter().all(|p| p.coordinate.lat == center.lat));
        assert!(row.iter().all(|p| p.coordinate.lng.is_finite()));

        let column = generate_grid_points(center, 2.0, size(4, 1));
        assert_eq!(column.len(), 4);
        assert!(column.iter().all(|p| p.coordinate.lng == center.lng));
    }

    #[test]
    fn test_longitude_correction() {
        let equator = DegreeSpan::from_radius_km(Coordinate::new(0.0, 0.0), 5.0);
        assert!((equator.lat - 5.0 / KM_PER_DEGREE).abs() < EPS);
        assert!((equator.lng - equator.lat).abs() < EPS);

        let mid = DegreeSpan::from_radius_km(Coordinate::new(45.0, 0.0), 5.0);
        let north = DegreeSpan::from_radius_km(Coordinate::new(70.0, 0.0), 5.0);
        let south = DegreeSpan::from_radius_km(Coordinate::new(-70.0, 0.0), 5.0);

        // Degrees of longitude per km grow toward the poles, so the
        // span in degrees widens while ground spacing stays fixed.
        assert!(mid.lng > equator.lng);
        assert!(north.lng > mid.lng);
        assert!((north.lng - south.lng).abs() < EPS);
        assert!((mid.lat - equator.lat).abs() < EPS);
    }

    #[test]
    fn test_ground_spacing_constant_across_latitudes() {
        // Longitude step in km is the same at 0° and 60°.
        let step_km = |lat: f64| {
            let pts = generate_grid_points(Coordinate::new(lat, 0.0), 4.0, size(1, 3));
            let dlng = pts[1].coordinate.lng - pts[0].coordinate.lng;
            dlng * KM_PER_DEGREE * lat.to_radians().cos()
        };
        assert!((step_km(0.0) - 4.0).abs() < 1e-6);
        assert!((step_km(60.0) - 4.0).abs() < 1e-6);
    }

    fn invalid_points(points: &[GridPoint]) -> Vec<Coordinate> {
        points
            .iter()
            .map(|p| p.coordinate)
            .filter(|c| c.validate().is_err())
            .collect()
    }

    #[test]
    fn test_antimeridian_wraps_longitude() {
        let points = generate_grid_points(Coordinate::new(10.0, 179.99), 5.0, size(3, 3));
        assert!(invalid_points(&points).is_empty(), "{:?}", invalid_points(&points));

        // The east column lands just past -180 instead of past +180.
        let east = points[2].coordinate.lng;
        assert!(east < -179.9, "east column at {}", east);
        assert!((points[1].coordinate.lng - 179.99).abs() < EPS);

        let west = generate_grid_points(Coordinate::new(-45.0, -179.995), 3.0, size(1, 3));
        assert!(invalid_points(&west).is_empty());
        assert!(west[0].coordinate.lng > 179.9);
    }

    #[test]
    fn test_near_pole_clamps_latitude() {
        let points = generate_grid_points(Coordinate::new(89.9, 0.0), 50.0, size(3, 3));
        assert!(invalid_points(&points).is_empty(), "{:?}", invalid_points(&points));
        assert!(points.iter().all(|p| p.coordinate.lat <= MAX_LATITUDE));

        let south = generate_grid_points(Coordinate::new(-89.95, 120.0), 20.0, size(5, 5));
        assert!(invalid_points(&south).is_empty());
        assert!(south.iter().all(|p| p.coordinate.lat >= -MAX_LATITUDE));
    }

    #[test]
    fn test_longitude_span_capped() {
        let span = DegreeSpan::from_radius_km(Coordinate::new(89.99, 0.0), 50.0);
        assert_eq!(span.lng, 180.0);
    }

    #[test]
    fn test_deterministic() {
        let center = Coordinate::new(-33.8688, 151.2093);
        let a = generate_grid_points(center, 7.5, size(5, 5));
        let b = generate_grid_points(center, 7.5, size(5, 5));
        assert_eq!(a, b);
    }
}
