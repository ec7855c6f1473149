//! HTTP quote provider.

use async_trait::async_trait;
use quotewatch_core::error::SourceError;
use quotewatch_core::traits::{ProbeReport, QuoteProvider};
use quotewatch_core::types::{DateRange, RawRecord};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// Connection settings for one HTTP provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSourceConfig {
    pub base_url: String,
    /// Path answering health probes with a JSON body
    #[serde(default = "default_health_path")]
    pub health_path: String,
    /// Daily bars path; `{symbol}` is substituted
    #[serde(default = "default_bars_path")]
    pub bars_path: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_bars_path() -> String {
    "/bars/{symbol}".to_string()
}

impl HttpSourceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            health_path: default_health_path(),
            bars_path: default_bars_path(),
            api_key: None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Quote provider speaking JSON over HTTP.
///
/// Bars come back as an array of objects, either bare or under a `data` or
/// `bars` key. Probes score by latency unless the body carries its own
/// `health_score`.
pub struct HttpQuoteProvider {
    id: String,
    config: HttpSourceConfig,
    client: Client,
    timeout: Duration,
}

impl HttpQuoteProvider {
    /// Create a new HTTP provider.
    pub fn new(
        id: impl Into<String>,
        config: HttpSourceConfig,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = &config.api_key {
            headers.insert(
                "X-API-Key",
                header::HeaderValue::from_str(key)
                    .map_err(|e| SourceError::Connection(e.to_string()))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("quotewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        Ok(Self {
            id: id.into(),
            config,
            client,
            timeout,
        })
    }

    /// Score derived from latency: 100 when instant, 0 at the timeout.
    pub fn latency_score(latency: Duration, timeout: Duration) -> f64 {
        if timeout.is_zero() {
            return 0.0;
        }
        let ratio = latency.as_secs_f64() / timeout.as_secs_f64();
        (100.0 * (1.0 - ratio)).clamp(0.0, 100.0)
    }

    /// Extract bar records from a response body.
    pub fn parse_records(body: Value) -> Result<Vec<RawRecord>, SourceError> {
        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("data").or_else(|| map.remove("bars")) {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(SourceError::MalformedPayload(
                        "expected an array of bars".into(),
                    ))
                }
            },
            other => {
                return Err(SourceError::MalformedPayload(format!(
                    "expected an array of bars, got {}",
                    other
                )))
            }
        };

        items
            .into_iter()
            .map(|item| match item {
                Value::Object(fields) => Ok(RawRecord::from(fields)),
                other => Err(SourceError::MalformedPayload(format!(
                    "bar is not an object: {}",
                    other
                ))),
            })
            .collect()
    }

    /// Health score from a probe body, if it carries one.
    pub fn parse_health(body: &Value) -> Result<Option<f64>, SourceError> {
        match body.get("health_score") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| {
                SourceError::MalformedPayload(format!("health_score is not a number: {}", value))
            }),
        }
    }
}

#[async_trait]
impl QuoteProvider for HttpQuoteProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let url = self
            .config
            .url(&self.config.bars_path.replace("{symbol}", symbol));
        let params = [
            ("start", range.start().to_string()),
            ("end", range.end().to_string()),
        ];

        let resp = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SourceError::Api(format!("{}: {}", status, text)));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| SourceError::MalformedPayload(e.to_string()))?;

        let records = Self::parse_records(body)?;
        debug!(source = %self.id, %symbol, count = records.len(), "Fetched bars");
        Ok(records)
    }

    async fn probe(&self) -> Result<ProbeReport, SourceError> {
        let url = self.config.url(&self.config.health_path);
        let start = Instant::now();

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SourceError::Api(resp.status().to_string()));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| SourceError::MalformedPayload(e.to_string()))?;
        let latency = start.elapsed();

        let score = match Self::parse_health(&body)? {
            Some(score) => score,
            None => Self::latency_score(latency, self.timeout),
        };

        Ok(ProbeReport::new(score, latency.as_millis() as u64))
    }
}
