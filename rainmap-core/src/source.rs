//! Loading of the query-target sequence.
//!
//! Three sources, selected by [`CoordinateMode`]: coordinates saved from a
//! previous run (falling back to generation when absent), fresh
//! Fibonacci-sphere samples, or a static city list. Output ordering is
//! stable; downstream batching relies on it.

use std::{fs, io, path::Path};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, CoordinateMode},
    error::PipelineError,
    model::{GeoPoint, LocationRecord, QueryTarget},
    sampler,
};

/// Record shape of the saved-coordinates artifact: the location metadata of
/// a previously successful lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedLocation {
    pub coord: GeoPoint,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub region: String,
}

/// One entry of the city list file. Accepts both the legacy
/// `"city,country,region"` joined form and structured records.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CityEntry {
    Structured {
        coord: GeoPoint,
        #[allow(dead_code)]
        city: String,
    },
    Joined(String),
}

/// Produces the target sequence for a run, per the configured mode.
pub fn load_targets(config: &Config) -> Result<Vec<QueryTarget>, PipelineError> {
    match config.coordinate_source {
        CoordinateMode::Saved => from_saved_file(config),
        CoordinateMode::Generated => generate(config.required_sample_count),
        CoordinateMode::Cities => from_city_list(&config.cities_file),
    }
}

/// Generates `count` coordinate targets on the sphere.
pub fn generate(count: usize) -> Result<Vec<QueryTarget>, PipelineError> {
    info!("generating {count} coordinates");
    Ok(sampler::sample_uniform(count)?
        .into_iter()
        .map(QueryTarget::Coord)
        .collect())
}

/// Reads coordinates saved by a previous run.
///
/// A missing or empty file is recovered locally by falling back to
/// generation; a present but unparseable file is fatal.
pub fn from_saved_file(config: &Config) -> Result<Vec<QueryTarget>, PipelineError> {
    let path = &config.saved_coordinates_file;

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(
                "saved coordinates not found at {}, generating new coordinates",
                path.display()
            );
            return generate(config.required_sample_count);
        }
        Err(e) => return Err(PipelineError::Io { path: path.clone(), source: e }),
    };

    let saved: Vec<SavedLocation> = serde_json::from_str(&contents)
        .map_err(|e| PipelineError::DataCorruption { path: path.clone(), source: e })?;

    if saved.is_empty() {
        warn!("saved coordinates file {} is empty, generating", path.display());
        return generate(config.required_sample_count);
    }

    info!("using {} saved coordinates", saved.len());
    Ok(saved.into_iter().map(|s| QueryTarget::Coord(s.coord)).collect())
}

/// Reads a static city list. No network or randomness involved.
pub fn from_city_list(path: &Path) -> Result<Vec<QueryTarget>, PipelineError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| PipelineError::Io { path: path.to_path_buf(), source: e })?;

    let entries: Vec<CityEntry> = serde_json::from_str(&contents)
        .map_err(|e| PipelineError::DataCorruption { path: path.to_path_buf(), source: e })?;

    entries
        .into_iter()
        .map(|entry| match entry {
            CityEntry::Structured { coord, .. } => Ok(QueryTarget::Coord(coord)),
            CityEntry::Joined(line) => parse_joined_city(&line).ok_or_else(|| {
                PipelineError::InvalidArgument(format!(
                    "malformed city entry {line:?} in {} (expected \"city,country,region\")",
                    path.display()
                ))
            }),
        })
        .collect()
}

fn parse_joined_city(line: &str) -> Option<QueryTarget> {
    let mut parts = line.splitn(3, ',');
    let city = parts.next()?.trim();
    let country = parts.next()?.trim();
    let region = parts.next().unwrap_or("").trim();

    if city.is_empty() || country.is_empty() {
        return None;
    }

    Some(QueryTarget::City {
        city: city.to_string(),
        country: country.to_string(),
        region: region.to_string(),
    })
}

/// Writes the successfully resolved locations back to the saved-coordinates
/// file so later runs can skip the dead points.
pub fn save_successful(path: &Path, records: &[LocationRecord]) -> Result<(), PipelineError> {
    let saved: Vec<SavedLocation> = records
        .iter()
        .map(|r| SavedLocation {
            coord: r.coord,
            city: r.city.clone(),
            country: r.country.clone(),
            region: r.region.clone(),
        })
        .collect();

    let json = serde_json::to_string_pretty(&saved).map_err(PipelineError::Serialize)?;
    fs::write(path, json)
        .map_err(|e| PipelineError::Io { path: path.to_path_buf(), source: e })?;

    info!("saved {} coordinates to {}", saved.len(), path.display());
    Ok(())
}
