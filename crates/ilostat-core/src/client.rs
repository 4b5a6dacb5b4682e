//! Rate-limited client for the ILO SDMX REST API.
//!
//! # Endpoints
//!
//! | Call | Path | Accept |
//! |------|------|--------|
//! | [`fetch_catalogue`](IloClient::fetch_catalogue) | `dataflow/<agency>` | SDMX structure JSON |
//! | [`fetch_structure`](IloClient::fetch_structure) | `datastructure/<agency>/<id>` | SDMX structure JSON |
//! | [`fetch_data`](IloClient::fetch_data) | `data/<agency>,<id>,<version>/<key>` | `text/csv` |
//!
//! Every call first takes a permit from the shared [`SlidingWindowLimiter`].
//! Failures are returned as-is; nothing is retried here.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::config::ClientConfig;
use crate::http_client::{HttpClient, HttpError, HttpRequest, ReqwestHttpClient};
use crate::throttling::SlidingWindowLimiter;

pub const STRUCTURE_ACCEPT: &str = "application/vnd.sdmx.structure+json;version=1.0";
pub const CSV_ACCEPT: &str = "text/csv";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] HttpError),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Parameters of a data query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub dataflow_id: String,
    /// Dimension filter; `ALL` selects every series.
    pub key: String,
    pub start_period: Option<String>,
    pub end_period: Option<String>,
    pub version: String,
}

impl DataRequest {
    pub fn new(dataflow_id: impl Into<String>) -> Self {
        Self {
            dataflow_id: dataflow_id.into(),
            key: String::from("ALL"),
            start_period: None,
            end_period: None,
            version: String::from("1.0"),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_period(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.start_period = start;
        self.end_period = end;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

#[derive(Clone)]
pub struct IloClient {
    http: Arc<dyn HttpClient>,
    limiter: SlidingWindowLimiter,
    config: ClientConfig,
}

impl IloClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http_client(config, Arc::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(config: ClientConfig, http: Arc<dyn HttpClient>) -> Self {
        let limiter = SlidingWindowLimiter::new(config.rate_limit, config.rate_window);
        Self {
            http,
            limiter,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Lists every dataflow published by the agency.
    pub async fn fetch_catalogue(&self) -> Result<Value, FetchError> {
        let path = format!("dataflow/{}", encode_segment(&self.config.agency));
        let body = self.get(self.request(&path, STRUCTURE_ACCEPT)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Data structure definition of one dataflow.
    pub async fn fetch_structure(&self, dataflow_id: &str) -> Result<Value, FetchError> {
        let path = format!(
            "datastructure/{}/{}",
            encode_segment(&self.config.agency),
            encode_segment(dataflow_id)
        );
        let body = self.get(self.request(&path, STRUCTURE_ACCEPT)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Observations of one dataflow as SDMX-CSV text.
    pub async fn fetch_data(&self, request: &DataRequest) -> Result<String, FetchError> {
        let path = format!(
            "data/{},{},{}/{}",
            encode_segment(&self.config.agency),
            encode_segment(&request.dataflow_id),
            encode_segment(&request.version),
            encode_segment(&request.key)
        );

        let mut http_request = self.request(&path, CSV_ACCEPT);
        if let Some(start) = request.start_period.as_deref().filter(|v| !v.is_empty()) {
            http_request = http_request.with_query("startPeriod", start);
        }
        if let Some(end) = request.end_period.as_deref().filter(|v| !v.is_empty()) {
            http_request = http_request.with_query("endPeriod", end);
        }

        self.get(http_request).await
    }

    fn request(&self, path: &str, accept: &str) -> HttpRequest {
        let timeout_ms = self.config.request_timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        HttpRequest::get(format!("{}/{path}", self.config.base_url.trim_end_matches('/')))
            .with_header("Accept", accept)
            .with_timeout_ms(timeout_ms)
    }

    async fn get(&self, request: HttpRequest) -> Result<String, FetchError> {
        self.limiter.acquire().await;
        tracing::debug!(url = %request.full_url(), "GET");

        let response = self.http.execute(request).await?;
        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response.body)
    }
}

fn encode_segment(value: &str) -> String {
    // SDMX keys use '.' and '+' as dimension separators; both stay literal.
    urlencoding::encode(value).replace("%2B", "+")
}
