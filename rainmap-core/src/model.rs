use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point on the globe. Immutable once produced.
///
/// Serializes as `{"lat": .., "lon": ..}`, the shape shared by the saved
/// coordinates file, the city list, and the snapshot artifact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// One unit the pipeline queries the remote API about.
///
/// Coordinate targets are identified by their `lat,lon` string; named-city
/// targets by the city name, carrying the country/region metadata the
/// response may not echo back.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTarget {
    Coord(GeoPoint),
    City {
        city: String,
        country: String,
        region: String,
    },
}

impl QueryTarget {
    /// The `q` parameter sent to the remote API.
    pub fn query_string(&self) -> String {
        match self {
            QueryTarget::Coord(p) => format!("{},{}", p.lat, p.lon),
            QueryTarget::City { city, .. } => city.clone(),
        }
    }

    /// Identity token used to correlate a bulk-response element back to this
    /// target. Matching is by exact equality on this value.
    pub fn custom_id(&self) -> String {
        self.query_string()
    }
}

/// An ordered, non-empty slice of targets sent in one network round trip.
///
/// Concatenating all batches of a run, in order, reproduces the original
/// target sequence exactly once each.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub targets: Vec<QueryTarget>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Final per-location output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub coord: GeoPoint,
    pub city: String,
    pub country: String,
    pub region: String,
    pub is_raining: bool,
}

/// One immutable run result. The artifact on disk is the `records` array;
/// `generated_at` (second resolution) lives in the filename and is the sole
/// identity and recency key.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub records: Vec<LocationRecord>,
}

/// Summary counters for one run. Derived, never persisted.
///
/// Invariant: `targets_with_result == raining_count + non_raining_count`, and
/// `targets_with_result <= total_targets`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStatistics {
    pub total_targets: usize,
    pub targets_with_result: usize,
    pub raining_count: usize,
    pub non_raining_count: usize,
    /// Response elements that carried a location but no usable `current`
    /// payload. Non-fatal, but may indicate an API contract change.
    pub skipped_entries: usize,
}

impl RunStatistics {
    /// Counts one resolved target.
    pub(crate) fn record(&mut self, is_raining: bool) {
        self.targets_with_result += 1;
        if is_raining {
            self.raining_count += 1;
        } else {
            self.non_raining_count += 1;
        }
    }

    /// Share of resolved targets that report rain, or `None` when nothing
    /// resolved.
    pub fn rain_percentage(&self) -> Option<f64> {
        if self.targets_with_result == 0 {
            None
        } else {
            Some(self.raining_count as f64 / self.targets_with_result as f64 * 100.0)
        }
    }
}
