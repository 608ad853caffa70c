//! Partitioning of the target sequence into bulk-request batches.

use crate::{
    error::PipelineError,
    model::{Batch, QueryTarget},
};

/// Splits `targets` into contiguous batches of at most `chunk_size`.
///
/// The last batch may be smaller; no batch is empty. Concatenating the
/// returned batches in order reproduces `targets` exactly.
///
/// `chunk_size` must be at least 1. The remote API caps bulk requests at 50
/// locations; larger values are passed through untouched and will surface as
/// per-batch failures at fetch time rather than being silently clamped here.
pub fn partition(targets: Vec<QueryTarget>, chunk_size: usize) -> Result<Vec<Batch>, PipelineError> {
    if chunk_size == 0 {
        return Err(PipelineError::InvalidArgument(
            "chunk size must be at least 1".into(),
        ));
    }

    Ok(targets
        .chunks(chunk_size)
        .map(|chunk| Batch { targets: chunk.to_vec() })
        .collect())
}
