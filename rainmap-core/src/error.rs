use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a pipeline run.
///
/// Per-unit remote failures are deliberately *not* represented here: a failed
/// network round trip becomes a [`crate::fetcher::FetchOutcome::Failure`]
/// value and is excluded from the aggregate. The pipeline only errors on
/// configuration/setup problems or on inability to produce the output
/// artifact.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad caller-supplied parameter (sample count, chunk size, worker limit).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No API key available; fatal before any network call.
    #[error("no API key configured; run `rainmap configure` first")]
    MissingApiKey,

    /// An input file exists but does not match the expected record shape.
    #[error("failed to parse {}: {source}", path.display())]
    DataCorruption {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem error on an input file or the data folder.
    #[error("io error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot artifact could not be written (disk full, permissions).
    #[error("failed to write snapshot {}", path.display())]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Records could not be serialized. Should not happen for well-formed
    /// in-memory records, but surfaced rather than swallowed.
    #[error("failed to serialize snapshot records")]
    Serialize(#[source] serde_json::Error),

    /// The shared HTTP client could not be constructed.
    #[error("failed to construct HTTP client")]
    HttpClient(#[from] reqwest::Error),
}
