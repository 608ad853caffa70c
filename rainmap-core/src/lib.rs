//! Core library for the `rainmap` pipeline.
//!
//! This crate defines:
//! - Configuration handling
//! - Uniform sphere sampling and target loading
//! - The concurrent batch-fetch pipeline against weatherapi.com
//! - Reduction into timestamped rain snapshots
//!
//! It is used by `rainmap-cli`, but can also be reused by other binaries or
//! services; [`pipeline::run_pipeline`] is the single entry point for one
//! fetch cycle.

pub mod batch;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod pipeline;
pub mod reducer;
pub mod sampler;
pub mod snapshot;
pub mod source;

pub use config::{Config, CoordinateMode, QueryMode};
pub use error::PipelineError;
pub use model::{Batch, GeoPoint, LocationRecord, QueryTarget, RunStatistics, Snapshot};
pub use pipeline::{PipelineReport, run_pipeline, run_pipeline_with};
