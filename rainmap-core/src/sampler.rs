//! Quasi-uniform point sampling on the sphere.
//!
//! Uses a Fibonacci spiral: points are evenly spaced along the vertical axis
//! and advanced by the golden angle in azimuth, which spreads them nearly
//! uniformly over the surface. One random phase offset per call rotates the
//! whole spiral so consecutive runs do not sample identical locations, while
//! the spacing between points stays deterministic for a given `n`.

use crate::{error::PipelineError, model::GeoPoint};

/// `pi * (3 - sqrt(5))`, the golden angle in radians.
fn golden_angle() -> f64 {
    std::f64::consts::PI * (3.0 - 5.0_f64.sqrt())
}

/// Generates exactly `n` quasi-uniform points on the globe.
///
/// Fails with [`PipelineError::InvalidArgument`] when `n` is zero. `n = 1`
/// is valid and yields a single equatorial point.
pub fn sample_uniform(n: usize) -> Result<Vec<GeoPoint>, PipelineError> {
    if n == 0 {
        return Err(PipelineError::InvalidArgument(
            "sample count must be at least 1".into(),
        ));
    }

    let phase = rand::random::<f64>() * n as f64;
    Ok(sample_with_phase(n, phase))
}

/// Deterministic inner construction; `phase` in `[0, n)`.
fn sample_with_phase(n: usize, phase: f64) -> Vec<GeoPoint> {
    let samples = n as f64;
    let offset = 2.0 / samples;
    let increment = golden_angle();

    (0..n)
        .map(|i| {
            let i = i as f64;
            // Evenly spaced in the cosine of the colatitude.
            let y = (i * offset - 1.0) + offset / 2.0;
            let r = (1.0 - y * y).sqrt();
            let phi = ((i + phase) % samples) * increment;

            let x = phi.cos() * r;
            let z = phi.sin() * r;

            cartesian_to_geo(x, y, z)
        })
        .collect()
}

/// Maps a unit-sphere cartesian point to latitude/longitude degrees.
fn cartesian_to_geo(x: f64, y: f64, z: f64) -> GeoPoint {
    let norm = (x * x + y * y + z * z).sqrt();
    let theta = (z / norm).acos();
    let phi = y.atan2(x);

    GeoPoint {
        lat: 90.0 - theta.to_degrees(),
        lon: phi.to_degrees(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_samples_is_invalid() {
        let err = sample_uniform(0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn single_sample_does_not_divide_by_zero() {
        let points = sample_uniform(1).unwrap();
        assert_eq!(points.len(), 1);
        assert!(points[0].lat.is_finite());
        assert!(points[0].lon.is_finite());
    }

    #[test]
    fn returns_exactly_n_points_in_valid_ranges() {
        for n in [1, 2, 10, 500] {
            let points = sample_uniform(n).unwrap();
            assert_eq!(points.len(), n);
            for p in points {
                assert!((-90.0..=90.0).contains(&p.lat), "lat out of range: {}", p.lat);
                assert!((-180.0..=180.0).contains(&p.lon), "lon out of range: {}", p.lon);
            }
        }
    }

    #[test]
    fn spacing_is_deterministic_for_fixed_phase() {
        let a = sample_with_phase(64, 3.25);
        let b = sample_with_phase(64, 3.25);
        assert_eq!(a, b);
    }

    #[test]
    fn phase_offset_rotates_but_keeps_count() {
        let a = sample_with_phase(64, 0.0);
        let b = sample_with_phase(64, 17.5);
        assert_eq!(a.len(), b.len());
        assert_ne!(a, b);
    }

    #[test]
    fn points_spread_over_both_hemispheres() {
        let points = sample_with_phase(1000, 0.0);
        let north = points.iter().filter(|p| p.lat > 0.0).count();
        let south = points.len() - north;
        // A uniform sample of 1000 should not be badly lopsided.
        assert!(north > 300 && south > 300, "north={north} south={south}");
    }
}
