//! Folding of fetch outcomes into the final record collection.
//!
//! Pure over its inputs: no ambient counters, statistics are accumulated in
//! an explicit [`RunStatistics`] value. The remote payloads are treated as
//! untrusted; anything missing the expected sub-objects is skipped, never
//! raised.
//!
//! Policy: a location is raining iff `precip_mm > 0` strictly. A missing
//! `precip_mm` with a `current` object present counts as not raining.

use std::collections::HashMap;

use log::warn;

use crate::{
    fetcher::{ApiCurrent, ApiLocation, BulkQuery, CurrentResponse, FetchOutcome, FetchedBody},
    model::{Batch, GeoPoint, LocationRecord, QueryTarget, RunStatistics},
};

/// Folds all outcomes of a run into an ordered record collection plus
/// summary statistics.
///
/// `Failure` outcomes contribute zero records; their targets still count
/// toward `total_targets`. Record order is outcome (completion) order, which
/// carries no positional correspondence to the original target sequence.
pub fn reduce(outcomes: Vec<FetchOutcome>) -> (Vec<LocationRecord>, RunStatistics) {
    let mut records = Vec::new();
    let mut stats = RunStatistics::default();

    for outcome in outcomes {
        match outcome {
            FetchOutcome::Failure { batch, reason } => {
                stats.total_targets += batch.len();
                warn!("dropping {} targets: {reason}", batch.len());
            }
            FetchOutcome::Success { batch, body } => {
                stats.total_targets += batch.len();
                match body {
                    FetchedBody::Single(response) => {
                        reduce_single(&batch, response, &mut records, &mut stats);
                    }
                    FetchedBody::Bulk(response) => {
                        // Exact identity-token lookup back to the originating
                        // targets; prefix matching on city names would
                        // cross-correlate targets whose names are prefixes of
                        // one another.
                        let by_id: HashMap<String, &QueryTarget> =
                            batch.targets.iter().map(|t| (t.custom_id(), t)).collect();
                        for entry in response.bulk {
                            reduce_bulk_entry(&by_id, entry.query, &mut records, &mut stats);
                        }
                    }
                }
            }
        }
    }

    debug_assert_eq!(stats.targets_with_result, stats.raining_count + stats.non_raining_count);
    (records, stats)
}

fn reduce_single(
    batch: &Batch,
    response: CurrentResponse,
    records: &mut Vec<LocationRecord>,
    stats: &mut RunStatistics,
) {
    if let Some(error) = response.error {
        warn!("query {:?} rejected: {}", batch.targets[0].query_string(), error.message);
        return;
    }

    let (Some(location), Some(current)) = (response.location, response.current) else {
        warn!(
            "response for {:?} missing location or current payload",
            batch.targets[0].query_string()
        );
        stats.skipped_entries += 1;
        return;
    };

    records.push(build_record(&location, &current, Some(&batch.targets[0])));
    stats.record(is_raining(&current));
}

fn reduce_bulk_entry(
    by_id: &HashMap<String, &QueryTarget>,
    query: BulkQuery,
    records: &mut Vec<LocationRecord>,
    stats: &mut RunStatistics,
) {
    if query.error.is_some() {
        return;
    }

    let Some(current) = query.current else {
        // May indicate an API contract change; surfaced for the operator.
        warn!(
            "bulk element {:?} has no current payload, skipping",
            query.custom_id.as_deref().unwrap_or("<no custom_id>")
        );
        stats.skipped_entries += 1;
        return;
    };
    let Some(location) = query.location else {
        warn!(
            "bulk element {:?} has no location payload, skipping",
            query.custom_id.as_deref().unwrap_or("<no custom_id>")
        );
        stats.skipped_entries += 1;
        return;
    };

    let target = query.custom_id.as_deref().and_then(|id| by_id.get(id).copied());

    records.push(build_record(&location, &current, target));
    stats.record(is_raining(&current));
}

fn is_raining(current: &ApiCurrent) -> bool {
    current.precip_mm.unwrap_or(0.0) > 0.0
}

/// Builds one output record. Coordinates come from the response location
/// (the API snaps to the nearest known station); country/region fall back to
/// the request target's metadata when the API does not echo them.
fn build_record(
    location: &ApiLocation,
    current: &ApiCurrent,
    target: Option<&QueryTarget>,
) -> LocationRecord {
    let (mut city, mut country, mut region) =
        (location.name.clone(), location.country.clone(), location.region.clone());

    if let Some(QueryTarget::City {
        city: req_city,
        country: req_country,
        region: req_region,
    }) = target
    {
        city = req_city.clone();
        if country.is_empty() {
            country = req_country.clone();
        }
        if region.is_empty() {
            region = req_region.clone();
        }
    }

    LocationRecord {
        coord: GeoPoint { lat: location.lat, lon: location.lon },
        city,
        country,
        region,
        is_raining: is_raining(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{BulkResponse, FetchFailure};
    use serde_json::json;

    fn coord_target(lat: f64, lon: f64) -> QueryTarget {
        QueryTarget::Coord(GeoPoint { lat, lon })
    }

    fn single_success(target: QueryTarget, body: serde_json::Value) -> FetchOutcome {
        let parsed: CurrentResponse = serde_json::from_value(body).unwrap();
        FetchOutcome::Success {
            batch: Batch { targets: vec![target] },
            body: FetchedBody::Single(parsed),
        }
    }

    fn bulk_success(targets: Vec<QueryTarget>, body: serde_json::Value) -> FetchOutcome {
        let parsed: BulkResponse = serde_json::from_value(body).unwrap();
        FetchOutcome::Success { batch: Batch { targets }, body: FetchedBody::Bulk(parsed) }
    }

    fn location_json(name: &str, lat: f64, lon: f64) -> serde_json::Value {
        json!({"name": name, "region": "R", "country": "C", "lat": lat, "lon": lon})
    }

    #[test]
    fn empty_input_reduces_to_empty_output() {
        let (records, stats) = reduce(Vec::new());
        assert!(records.is_empty());
        assert_eq!(stats, RunStatistics::default());
    }

    #[test]
    fn precip_threshold_is_strict() {
        let outcomes = vec![
            single_success(
                coord_target(0.0, 0.0),
                json!({"location": location_json("Dry", 0.0, 0.0), "current": {"precip_mm": 0.0}}),
            ),
            single_success(
                coord_target(1.0, 1.0),
                json!({"location": location_json("Wet", 1.0, 1.0), "current": {"precip_mm": 0.1}}),
            ),
        ];

        let (records, stats) = reduce(outcomes);
        assert_eq!(records.len(), 2);
        assert!(!records[0].is_raining);
        assert!(records[1].is_raining);
        assert_eq!(stats.raining_count, 1);
        assert_eq!(stats.non_raining_count, 1);
    }

    #[test]
    fn missing_precip_with_current_present_is_not_raining() {
        let outcomes = vec![single_success(
            coord_target(0.0, 0.0),
            json!({"location": location_json("X", 0.0, 0.0), "current": {}}),
        )];

        let (records, stats) = reduce(outcomes);
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_raining);
        assert_eq!(stats.targets_with_result, 1);
    }

    #[test]
    fn single_error_payload_yields_no_record() {
        let outcomes = vec![single_success(
            coord_target(0.0, 0.0),
            json!({"error": {"message": "No matching location found."}}),
        )];

        let (records, stats) = reduce(outcomes);
        assert!(records.is_empty());
        assert_eq!(stats.total_targets, 1);
        assert_eq!(stats.targets_with_result, 0);
    }

    #[test]
    fn failure_outcomes_are_counted_but_contribute_nothing() {
        let outcomes = vec![FetchOutcome::Failure {
            batch: Batch { targets: vec![coord_target(0.0, 0.0), coord_target(1.0, 1.0)] },
            reason: FetchFailure::Transport("timed out".into()),
        }];

        let (records, stats) = reduce(outcomes);
        assert!(records.is_empty());
        assert_eq!(stats.total_targets, 2);
        assert_eq!(stats.targets_with_result, 0);
    }

    #[test]
    fn bulk_error_element_is_skipped_valid_element_kept() {
        let targets = vec![coord_target(10.0, 20.0), coord_target(30.0, 40.0)];
        let outcomes = vec![bulk_success(
            targets,
            json!({"bulk": [
                {"query": {"custom_id": "10,20", "error": {"message": "no match"}}},
                {"query": {
                    "custom_id": "30,40",
                    "location": location_json("Town", 30.1, 39.9),
                    "current": {"precip_mm": 2.5}
                }},
            ]}),
        )];

        let (records, stats) = reduce(outcomes);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_raining);
        // Response coordinates win over the request's.
        assert_eq!(records[0].coord, GeoPoint { lat: 30.1, lon: 39.9 });

        assert_eq!(stats.total_targets, 2);
        assert_eq!(stats.targets_with_result, 1);
        assert_eq!(stats.raining_count + stats.non_raining_count, 1);
    }

    #[test]
    fn bulk_element_missing_current_is_skipped_and_counted() {
        let targets = vec![coord_target(1.0, 1.0)];
        let outcomes = vec![bulk_success(
            targets,
            json!({"bulk": [
                {"query": {"custom_id": "1,1", "location": location_json("X", 1.0, 1.0)}},
            ]}),
        )];

        let (records, stats) = reduce(outcomes);
        assert!(records.is_empty());
        assert_eq!(stats.skipped_entries, 1);
        assert_eq!(stats.targets_with_result, 0);
    }

    #[test]
    fn bulk_city_correlation_is_exact_not_prefix() {
        // "York" must not pick up "Yorkton"'s metadata even though it is a
        // prefix of it.
        let targets = vec![
            QueryTarget::City {
                city: "York".into(),
                country: "United Kingdom".into(),
                region: "North Yorkshire".into(),
            },
            QueryTarget::City {
                city: "Yorkton".into(),
                country: "Canada".into(),
                region: "Saskatchewan".into(),
            },
        ];

        let outcomes = vec![bulk_success(
            targets,
            json!({"bulk": [
                {"query": {
                    "custom_id": "Yorkton",
                    "location": {"name": "Yorkton", "lat": 51.2, "lon": -102.5},
                    "current": {"precip_mm": 0.0}
                }},
            ]}),
        )];

        let (records, _) = reduce(outcomes);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].country, "Canada");
        assert_eq!(records[0].region, "Saskatchewan");
    }

    #[test]
    fn city_target_metadata_fills_unechoed_fields() {
        let target = QueryTarget::City {
            city: "Bergen".into(),
            country: "Norway".into(),
            region: "Vestland".into(),
        };

        let outcomes = vec![single_success(
            target,
            json!({
                "location": {"name": "Bergen", "lat": 60.39, "lon": 5.32},
                "current": {"precip_mm": 4.0}
            }),
        )];

        let (records, _) = reduce(outcomes);
        assert_eq!(records[0].city, "Bergen");
        assert_eq!(records[0].country, "Norway");
        assert_eq!(records[0].region, "Vestland");
        assert!(records[0].is_raining);
    }

    #[test]
    fn invariant_holds_over_mixed_outcomes() {
        let outcomes = vec![
            single_success(
                coord_target(0.0, 0.0),
                json!({"location": location_json("A", 0.0, 0.0), "current": {"precip_mm": 1.0}}),
            ),
            FetchOutcome::Failure {
                batch: Batch { targets: vec![coord_target(1.0, 1.0)] },
                reason: FetchFailure::MalformedBody("not json".into()),
            },
            single_success(
                coord_target(2.0, 2.0),
                json!({"location": location_json("B", 2.0, 2.0), "current": {"precip_mm": 0.0}}),
            ),
            single_success(coord_target(3.0, 3.0), json!({"error": {"message": "nope"}})),
        ];

        let (records, stats) = reduce(outcomes);
        assert_eq!(records.len(), 2);
        assert_eq!(stats.total_targets, 4);
        assert_eq!(stats.targets_with_result, 2);
        assert_eq!(stats.raining_count + stats.non_raining_count, stats.targets_with_result);
        assert!(stats.targets_with_result <= stats.total_targets);
    }
}
