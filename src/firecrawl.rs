use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Create a static client to reuse connections across tool calls
static CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .build()
        .expect("Failed to build HTTP client")
});

#[derive(Debug, thiserror::Error)]
pub enum FirecrawlError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FirecrawlError {
    fn from(err: reqwest::Error) -> Self {
        FirecrawlError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FirecrawlError {
    fn from(err: serde_json::Error) -> Self {
        FirecrawlError::Parse(err.to_string())
    }
}

/// What a scraping backend reported for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeOutcome {
    /// HTTP status of the scraped page, not of the API call.
    pub status_code: Option<u16>,
    /// Content keyed by format name, in the order the backend returned it.
    pub content: IndexMap<String, String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub error: Option<String>,
}

impl ScrapeOutcome {
    pub fn is_ok(&self) -> bool {
        self.status_code == Some(200)
    }
}

#[async_trait]
pub trait ScrapeProvider: Send + Sync {
    async fn scrape(&self, url: &str, formats: &[String]) -> Result<ScrapeOutcome, FirecrawlError>;
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: &'a [String],
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    error: Option<String>,
}

pub struct FirecrawlClient {
    base_url: String,
    api_key: String,
}

impl FirecrawlClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ScrapeProvider for FirecrawlClient {
    async fn scrape(&self, url: &str, formats: &[String]) -> Result<ScrapeOutcome, FirecrawlError> {
        let endpoint = format!("{}/v2/scrape", self.base_url);
        tracing::debug!(url, ?formats, "Calling Firecrawl scrape");

        let res = CLIENT
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&ScrapeRequest { url, formats })
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(FirecrawlError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let parsed: ScrapeResponse = serde_json::from_str(&body)?;
        if !parsed.success {
            return Err(FirecrawlError::Api {
                status: status.as_u16(),
                message: parsed.error.unwrap_or_else(|| "Firecrawl reported failure".to_string()),
            });
        }
        let data = parsed
            .data
            .ok_or_else(|| FirecrawlError::Parse("response has no data field".to_string()))?;

        Ok(outcome_from_data(data, formats))
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Maps the untyped `data` object onto a `ScrapeOutcome`. Only the requested
/// formats are kept; non-string values (links, json extraction) keep their
/// JSON text.
fn outcome_from_data(mut data: Map<String, Value>, formats: &[String]) -> ScrapeOutcome {
    let metadata = data.remove("metadata").unwrap_or(Value::Null);
    let text = |key: &str| metadata.get(key).and_then(Value::as_str).map(str::to_string);

    let mut content = IndexMap::new();
    for format in formats {
        let value = match data.get(format) {
            Some(Value::Null) | None => continue,
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        content.insert(format.clone(), value);
    }

    ScrapeOutcome {
        status_code: metadata
            .get("statusCode")
            .or_else(|| metadata.get("status_code"))
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok()),
        content,
        title: text("title"),
        description: text("description"),
        error: text("error"),
    }
}
