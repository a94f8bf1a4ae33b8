//! Search API fetcher implementation
//!
//! This module issues single paged, windowed queries against the remote search
//! API and classifies each response into a [`FetchOutcome`]:
//!
//! | Response | Outcome |
//! |----------|---------|
//! | HTTP 200 with a parseable body | `Success` |
//! | HTTP 429 | `RateLimited` |
//! | HTTP 403 | `TemporarilyBanned` |
//! | any other status | `HardError(Status)` |
//! | timeout, connection failure | `HardError(Transport)` |
//! | HTTP 200 with a malformed body | `HardError(Decode)` |
//!
//! The fetcher never retries. Retry and backoff policy belongs to the scheduler.

use crate::config::{ApiConfig, UserAgentConfig};
use crate::storage::Record;
use crate::window::TimeWindow;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// One page of one window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub window: TimeWindow,
    pub page: u32,
    pub per_page: u32,
}

impl PageQuery {
    pub fn new(window: TimeWindow, page: u32, per_page: u32) -> Self {
        Self {
            window,
            page,
            per_page,
        }
    }

    /// Renders the query string parameters understood by the search API
    pub fn params(&self, area: u32, order_by: &str) -> Vec<(&'static str, String)> {
        vec![
            ("area", area.to_string()),
            ("per_page", self.per_page.to_string()),
            ("page", self.page.to_string()),
            ("date_from", self.window.from_param()),
            ("date_to", self.window.to_param()),
            ("order_by", order_by.to_string()),
        ]
    }
}

/// A successfully decoded page
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// Records on this page, in API order
    pub items: Vec<Record>,
    /// Total matches the API reports for the whole window
    pub found: u64,
    /// Page count the API reports for the whole window
    pub pages: u32,
}

/// Why a fetch could not produce a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Unexpected HTTP status
    Status(u16),
    /// Timeout, connection refused, TLS failure and the like
    Transport(String),
    /// The body was not a valid search response
    Decode(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::Decode(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

/// Result of a single fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(PageResult),
    RateLimited,
    TemporarilyBanned,
    HardError(FetchFailure),
}

/// Anything that can serve pages of a windowed search
///
/// The scheduler is generic over this so it can be driven by the real API or by
/// a scripted source.
pub trait PageSource {
    fn fetch_page(&self, query: &PageQuery) -> impl Future<Output = FetchOutcome> + Send;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    found: u64,
    #[serde(default)]
    pages: u32,
}

/// Builds an HTTP client with the harvester's user agent and request timeout
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// The live search API
pub struct SearchClient {
    client: Client,
    base_url: String,
    area: u32,
    order_by: String,
}

impl SearchClient {
    pub fn new(api: &ApiConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent, api.request_timeout_secs)?,
            base_url: api.base_url.clone(),
            area: api.area,
            order_by: api.order_by.clone(),
        })
    }
}

impl PageSource for SearchClient {
    async fn fetch_page(&self, query: &PageQuery) -> FetchOutcome {
        let response = match self
            .client
            .get(&self.base_url)
            .query(&query.params(self.area, &self.order_by))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchOutcome::HardError(transport_failure(&e)),
        };

        let status = response.status();
        match response.bytes().await {
            Ok(body) => classify_response(status, &body),
            Err(e) => FetchOutcome::HardError(transport_failure(&e)),
        }
    }
}

fn transport_failure(e: &reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Transport("request timeout".to_string())
    } else if e.is_connect() {
        FetchFailure::Transport("connection failed".to_string())
    } else {
        FetchFailure::Transport(e.to_string())
    }
}

/// Maps a status code and body to an outcome
pub fn classify_response(status: StatusCode, body: &[u8]) -> FetchOutcome {
    match status {
        StatusCode::OK => match parse_page(body) {
            Ok(page) => FetchOutcome::Success(page),
            Err(e) => FetchOutcome::HardError(FetchFailure::Decode(e.to_string())),
        },
        StatusCode::TOO_MANY_REQUESTS => FetchOutcome::RateLimited,
        StatusCode::FORBIDDEN => FetchOutcome::TemporarilyBanned,
        other => FetchOutcome::HardError(FetchFailure::Status(other.as_u16())),
    }
}

/// Decodes a search response body
///
/// Items without a usable identity are skipped.
pub fn parse_page(body: &[u8]) -> Result<PageResult, serde_json::Error> {
    let response: SearchResponse = serde_json::from_slice(body)?;
    let total_items = response.items.len();
    let items: Vec<Record> = response
        .items
        .into_iter()
        .filter_map(Record::from_item)
        .collect();

    if items.len() < total_items {
        tracing::debug!(
            "Skipped {} item(s) without an identity",
            total_items - items.len()
        );
    }

    Ok(PageResult {
        items,
        found: response.found,
        pages: response.pages,
    })
}
