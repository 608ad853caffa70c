//! Concurrent fan-out of fetch units against the remote weather API.
//!
//! Each [`Batch`] becomes one network round trip. A stalled or failing unit
//! never blocks or aborts its siblings; failures are classified into
//! [`FetchFailure`] values and carried through so the reducer can count them.
//! Concurrency is bounded by `worker_limit` via a buffered stream rather
//! than unbounded task-per-request fan-out.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::stream::{self, StreamExt as _};
use log::{debug, info};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::{config::QueryMode, error::PipelineError, model::Batch};

const API_URL: &str = "http://api.weatherapi.com/v1/current.json";

/// `location` object echoed by the API. `lat`/`lon` here are authoritative
/// over the request coordinates, since the API snaps to the nearest known
/// station.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiLocation {
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

/// `current` conditions object; only precipitation matters here. The field
/// is optional because the API occasionally omits it for obscure stations.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCurrent {
    pub precip_mm: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
}

/// Single-query response. All parts optional: error payloads arrive with
/// the same top-level shape.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentResponse {
    pub error: Option<ApiError>,
    pub location: Option<ApiLocation>,
    pub current: Option<ApiCurrent>,
}

/// One element of a bulk response.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkEntry {
    pub query: BulkQuery,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkQuery {
    pub custom_id: Option<String>,
    pub error: Option<ApiError>,
    pub location: Option<ApiLocation>,
    pub current: Option<ApiCurrent>,
}

/// Bulk-query response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkResponse {
    pub bulk: Vec<BulkEntry>,
}

/// Parsed body of a successful round trip.
#[derive(Debug, Clone)]
pub enum FetchedBody {
    Single(CurrentResponse),
    Bulk(BulkResponse),
}

/// Why one unit of work produced no data. Per-unit and non-fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Non-2xx HTTP status.
    BadStatus(StatusCode),
    /// 2xx but the body did not parse as the expected structure.
    MalformedBody(String),
    /// The request never completed (connect error, timeout).
    Transport(String),
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchFailure::BadStatus(status) => write!(f, "bad status: {status}"),
            FetchFailure::MalformedBody(detail) => write!(f, "malformed body: {detail}"),
            FetchFailure::Transport(detail) => write!(f, "transport error: {detail}"),
        }
    }
}

/// Result of one fetch unit, keeping the originating batch so results can be
/// correlated back to their targets regardless of completion order.
#[derive(Debug)]
pub enum FetchOutcome {
    Success { batch: Batch, body: FetchedBody },
    Failure { batch: Batch, reason: FetchFailure },
}

/// The network seam. The production implementation talks to weatherapi.com;
/// tests substitute a stub.
#[async_trait]
pub trait CurrentConditions: Send + Sync {
    async fn fetch_batch(&self, batch: Batch) -> FetchOutcome;
}

/// weatherapi.com client. One reqwest client shared across all requests of
/// a run.
#[derive(Debug, Clone)]
pub struct WeatherApiClient {
    api_key: String,
    mode: QueryMode,
    http: Client,
}

impl WeatherApiClient {
    pub fn new(
        api_key: String,
        mode: QueryMode,
        request_timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { api_key, mode, http })
    }

    async fn fetch_single(&self, batch: Batch) -> FetchOutcome {
        let q = batch.targets[0].query_string();

        let res = self
            .http
            .get(API_URL)
            .query(&[("key", self.api_key.as_str()), ("q", q.as_str())])
            .send()
            .await;

        classify_response::<CurrentResponse>(res, batch, FetchedBody::Single).await
    }

    async fn fetch_bulk(&self, batch: Batch) -> FetchOutcome {
        let body = build_bulk_request(&batch);

        let res = self
            .http
            .post(API_URL)
            .query(&[("key", self.api_key.as_str()), ("q", "bulk")])
            .json(&body)
            .send()
            .await;

        classify_response::<BulkResponse>(res, batch, FetchedBody::Bulk).await
    }
}

/// Request body for the bulk endpoint: each target's query string plus its
/// correlation token.
fn build_bulk_request(batch: &Batch) -> serde_json::Value {
    let locations: Vec<serde_json::Value> = batch
        .targets
        .iter()
        .map(|t| json!({ "q": t.query_string(), "custom_id": t.custom_id() }))
        .collect();

    json!({ "locations": locations })
}

/// Maps a raw HTTP result into a [`FetchOutcome`]: transport error, bad
/// status, malformed body, or parsed success.
async fn classify_response<T: serde::de::DeserializeOwned>(
    res: Result<reqwest::Response, reqwest::Error>,
    batch: Batch,
    wrap: fn(T) -> FetchedBody,
) -> FetchOutcome {
    let res = match res {
        Ok(res) => res,
        Err(e) => {
            return FetchOutcome::Failure {
                batch,
                reason: FetchFailure::Transport(e.to_string()),
            };
        }
    };

    let status = res.status();
    if !status.is_success() {
        return FetchOutcome::Failure { batch, reason: FetchFailure::BadStatus(status) };
    }

    let body = match res.text().await {
        Ok(body) => body,
        Err(e) => {
            return FetchOutcome::Failure {
                batch,
                reason: FetchFailure::Transport(e.to_string()),
            };
        }
    };

    match serde_json::from_str::<T>(&body) {
        Ok(parsed) => FetchOutcome::Success { batch, body: wrap(parsed) },
        Err(e) => FetchOutcome::Failure {
            batch,
            reason: FetchFailure::MalformedBody(e.to_string()),
        },
    }
}

#[async_trait]
impl CurrentConditions for WeatherApiClient {
    async fn fetch_batch(&self, batch: Batch) -> FetchOutcome {
        match self.mode {
            QueryMode::Single => self.fetch_single(batch).await,
            QueryMode::Bulk => self.fetch_bulk(batch).await,
        }
    }
}

/// Runs every batch through `client` with at most `worker_limit` requests in
/// flight, collecting one outcome per batch in completion order.
pub async fn fetch_all(
    client: Arc<dyn CurrentConditions>,
    batches: Vec<Batch>,
    worker_limit: usize,
) -> Result<Vec<FetchOutcome>, PipelineError> {
    if worker_limit == 0 {
        return Err(PipelineError::InvalidArgument(
            "worker limit must be at least 1".into(),
        ));
    }

    let total = batches.len();
    info!("fetching {total} units (worker limit {worker_limit})");

    let completed = AtomicUsize::new(0);
    let heartbeat = (total / 20).max(1);

    let outcomes: Vec<FetchOutcome> = stream::iter(batches.into_iter().map(|batch| {
        let client = Arc::clone(&client);
        let completed = &completed;
        async move {
            let outcome = client.fetch_batch(batch).await;

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % heartbeat == 0 || done == total {
                info!("fetched {done}/{total} units");
            }
            if let FetchOutcome::Failure { reason, .. } = &outcome {
                debug!("unit failed: {reason}");
            }

            outcome
        }
    }))
    .buffer_unordered(worker_limit)
    .collect()
    .await;

    Ok(outcomes)
}
