//! Rerank client for the remote scoring service.
//!
//! This crate provides a Rust client that sends feature rows to the
//! scoring service over gRPC. It handles:
//! - Channel setup (eager or lazy) with connect and request timeouts
//! - The client generated from `proto/rerank.proto` by `build.rs`
//! - Validating that one score comes back per row

use std::time::Duration;

use thiserror::Error;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request};
use tracing::{debug, error, info, warn};

// Include the generated protobuf code
pub mod rerank {
    tonic::include_proto!("rerank");
}

use rerank::reranker_client::RerankerClient as GrpcRerankerClient;
pub use rerank::{FeatureRow, ScoreRequest, ScoreResponse};

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors that can occur when talking to the scoring service
#[derive(Error, Debug)]
pub enum MLClientError {
    #[error("Failed to connect to rerank service: {0}")]
    ConnectionError(String),

    #[error("Rerank call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to score candidates: {0}")]
    ScoringError(String),

    #[error("Invalid response from rerank service: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, MLClientError>;

/// Client for the rerank scoring service.
///
/// Wraps the generated gRPC client. Cloning is cheap; clones share the
/// underlying channel.
#[derive(Clone)]
pub struct RerankClient {
    client: GrpcRerankerClient<Channel>,
    service_addr: String,
    timeout: Duration,
}

impl RerankClient {
    /// Connect to the scoring service and wait for the connection.
    ///
    /// # Arguments
    /// * `addr` - Address of the gRPC service (e.g., "http://localhost:50051")
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        info!("Connecting to rerank service at {}", addr);

        let channel = endpoint(&addr)?
            .connect()
            .await
            .map_err(|e| MLClientError::ConnectionError(format!("{addr}: {e}")))?;
        Ok(Self::from_channel(channel, addr))
    }

    /// Build a client that connects on first use.
    ///
    /// Must be called inside a tokio runtime.
    pub fn connect_lazy(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        info!("Using rerank service at {} (lazy connect)", addr);

        let channel = endpoint(&addr)?.connect_lazy();
        Ok(Self::from_channel(channel, addr))
    }

    fn from_channel(channel: Channel, service_addr: String) -> Self {
        Self {
            client: GrpcRerankerClient::new(channel),
            service_addr,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Configure the per-call timeout (default: [`DEFAULT_TIMEOUT`])
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Score `rows` for `user_id`.
    ///
    /// # Returns
    /// One score per row, in row order.
    pub async fn score(&self, user_id: &str, rows: Vec<FeatureRow>) -> Result<Vec<f64>> {
        let expected_len = rows.len();
        if expected_len == 0 {
            return Ok(Vec::new());
        }
        debug!("Scoring {} rows for user {}", expected_len, user_id);

        let mut request = Request::new(ScoreRequest {
            user_id: user_id.to_string(),
            rows,
        });
        request.set_timeout(self.timeout);

        // grpc-timeout is enforced server side only; this also bounds connecting
        let mut client = self.client.clone();
        let response = tokio::time::timeout(self.timeout, client.score_candidates(request))
            .await
            .map_err(|_| {
                warn!("Rerank call exceeded {:?}", self.timeout);
                MLClientError::Timeout(self.timeout)
            })?
            .map_err(|status| {
                error!("gRPC error while scoring candidates: {}", status);
                match status.code() {
                    Code::DeadlineExceeded | Code::Cancelled => MLClientError::Timeout(self.timeout),
                    Code::Unavailable => MLClientError::ConnectionError(status.message().to_string()),
                    _ => MLClientError::ScoringError(status.to_string()),
                }
            })?;

        let scores = response.into_inner().scores;
        check_score_count(expected_len, &scores)?;
        Ok(scores)
    }

    /// Get the address of the service this client talks to.
    pub fn service_address(&self) -> &str {
        &self.service_addr
    }
}

fn endpoint(addr: &str) -> Result<Endpoint> {
    Endpoint::from_shared(addr.to_string())
        .map(|endpoint| endpoint.connect_timeout(DEFAULT_TIMEOUT))
        .map_err(|e| MLClientError::ConnectionError(format!("invalid address {addr:?}: {e}")))
}

fn check_score_count(expected: usize, scores: &[f64]) -> Result<()> {
    if scores.len() != expected {
        error!(
            "Mismatch in number of scores returned: expected {}, got {}",
            expected,
            scores.len()
        );
        return Err(MLClientError::InvalidResponse(format!(
            "expected {} scores, got {}",
            expected,
            scores.len()
        )));
    }
    Ok(())
}
