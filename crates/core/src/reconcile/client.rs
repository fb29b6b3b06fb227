//! HTTP client for a remote misfits service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    BrandOption, DisputeOutcome, ErrorKind, MisfitFeed, ReconcileApi, ReconcileError,
    ReconcileOutcome, ReconcileRequest,
};
use crate::ledger::{FeedKind, FeedQuery};

/// Remote client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the service, e.g. `http://localhost:8080`.
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,
}

fn default_timeout_secs() -> u32 {
    30
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Talks to the misfits HTTP API. Implements [`ReconcileApi`] so the bulk
/// executor can drive a remote service.
pub struct MisfitsClient {
    client: Client,
    config: ClientConfig,
}

impl MisfitsClient {
    pub fn new(config: ClientConfig) -> Result<Self, ReconcileError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ReconcileError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v1{}", self.base_url(), endpoint)
    }

    /// Build an API URL from raw path segments, percent-encoding each one.
    fn segment_url(&self, segments: &[&str]) -> Result<Url, ReconcileError> {
        let invalid = || ReconcileError::Transport(format!("Invalid base URL: {}", self.config.url));
        let mut url = Url::parse(&self.url("")).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Fetch a feed page with suggestions.
    pub async fn feed(&self, query: &FeedQuery) -> Result<MisfitFeed, ReconcileError> {
        let mut params: Vec<(&str, String)> = vec![
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
        ];
        if let Some(kind) = query.kind {
            params.push(("type", kind_param(kind).to_string()));
        }
        if let Some(fee_type) = query.fee_type {
            params.push(("feeType", fee_type.as_str().to_string()));
        }
        if let Some(ref search) = query.search {
            params.push(("search", search.clone()));
        }

        self.send(self.client.get(self.url("/misfits")).query(&params))
            .await
    }

    /// Brand picker entries, parent bucket included.
    pub async fn brands(&self) -> Result<Vec<BrandOption>, ReconcileError> {
        self.send(self.client.get(self.url("/brands"))).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ReconcileError> {
        let response = request
            .send()
            .await
            .map_err(|e| ReconcileError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ReconcileError::Transport(format!("Invalid response body: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| {
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    body.chars().take(200).collect::<String>()
                )
            });

        debug!(status = status.as_u16(), "Remote call failed: {}", message);
        Err(ReconcileError::Remote {
            kind: kind_for_status(status),
            message,
        })
    }
}

fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorKind::Validation,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::CONFLICT => ErrorKind::Conflict,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            ErrorKind::Transport
        }
        _ => ErrorKind::Internal,
    }
}

fn kind_param(kind: FeedKind) -> &'static str {
    match kind {
        FeedKind::Credit => "credit",
        FeedKind::Unattributed => "unattributed",
        FeedKind::PendingCredits => "pending_credits",
    }
}

#[async_trait]
impl ReconcileApi for MisfitsClient {
    async fn reconcile(&self, request: ReconcileRequest) -> Result<ReconcileOutcome, ReconcileError> {
        self.send(
            self.client
                .post(self.url("/misfits/reconcile"))
                .json(&request),
        )
        .await
    }

    async fn dispute(&self, transaction_id: &str) -> Result<DisputeOutcome, ReconcileError> {
        let url = self.segment_url(&["misfits", transaction_id, "dispute"])?;
        self.send(self.client.post(url)).await
    }
}
