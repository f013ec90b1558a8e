// The Odds API client for NFL moneylines.
//
// `OddsProvider` is the seam the fetch command talks to; `TheOddsApiClient`
// is the HTTP implementation. Conversion to probabilities lives in
// `lms_core::odds`.

use std::time::Duration;

use async_trait::async_trait;
use lms_core::odds::OddsEvent;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;

/// Upstream response bodies longer than this are truncated in errors.
const ERROR_BODY_LIMIT: usize = 512;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OddsClientError {
    #[error("NFL_ODDS_API_KEY is not configured; set it or add odds_api_key to config/credentials.toml")]
    MissingApiKey,

    #[error("odds request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream odds API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode odds response: {0}")]
    Decode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Source of this week's NFL moneyline events.
#[async_trait]
pub trait OddsProvider: Send + Sync {
    /// Bookmaker the events are requested for.
    fn bookmaker(&self) -> &str;

    async fn fetch_events(&self) -> Result<Vec<OddsEvent>, OddsClientError>;
}

// ---------------------------------------------------------------------------
// TheOddsApiClient
// ---------------------------------------------------------------------------

pub struct TheOddsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    regions: String,
    bookmaker: String,
}

impl TheOddsApiClient {
    /// Build a client from the odds settings and credentials in `config`.
    /// Fails before any request is made when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self, OddsClientError> {
        let api_key = config
            .credentials
            .odds_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(OddsClientError::MissingApiKey)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.odds.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.odds.base_url.clone(),
            api_key,
            regions: config.odds.regions.clone(),
            bookmaker: config.odds.bookmaker.clone(),
        })
    }

    /// Query parameters for the moneyline request, API key last.
    fn query_params(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("regions", self.regions.as_str()),
            ("markets", "h2h"),
            ("oddsFormat", "american"),
            ("bookmakers", self.bookmaker.as_str()),
            ("apiKey", self.api_key.as_str()),
        ]
    }
}

#[async_trait]
impl OddsProvider for TheOddsApiClient {
    fn bookmaker(&self) -> &str {
        &self.bookmaker
    }

    async fn fetch_events(&self) -> Result<Vec<OddsEvent>, OddsClientError> {
        debug!("Fetching odds from: {}", self.base_url);

        let response = self
            .http
            .get(&self.base_url)
            .query(&self.query_params())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(OddsClientError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let events = parse_events(&body)?;
        info!(
            "Fetched {} NFL events with {} moneylines",
            events.len(),
            self.bookmaker
        );
        Ok(events)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an odds response body. Anything other than a JSON array of events
/// yields no events.
pub fn parse_events(body: &str) -> Result<Vec<OddsEvent>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    match value {
        serde_json::Value::Array(_) => serde_json::from_value(value),
        _ => Ok(Vec::new()),
    }
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
