use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use super::payload::{decode_events, OddsEvent, ScoreEvent};
use super::provider::OddsProvider;

/// Odds provider backed by The Odds API v4.
/// Docs: <https://the-odds-api.com/liveapi/guides/v4/>
#[derive(Clone)]
pub struct OddsApiClient {
    http: Client,
    base_url: Url,
    api_key: String,
    sport: String,
}

impl OddsApiClient {
    pub fn new(base_url: &str, api_key: &str, sport: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        // Url::join drops the last path segment unless the base ends in '/'
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&base).with_context(|| format!("Invalid odds API URL {base_url}"))?;
        Ok(OddsApiClient {
            http,
            base_url,
            api_key: api_key.to_string(),
            sport: sport.to_string(),
        })
    }

    fn endpoint(&self, resource: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("sports/{}/{}/", self.sport, resource))
            .context("Failed to build odds API URL")?;
        url.query_pairs_mut()
            .extend_pairs(query.iter().copied())
            .append_pair("apiKey", &self.api_key);
        Ok(url)
    }

    async fn get_json(&self, url: Url, what: &str) -> Result<serde_json::Value> {
        debug!("Fetching {} from {}{}", what, url.host_str().unwrap_or(""), url.path());

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Odds API {what} request failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Odds API error {}: {}", status, body);
        }

        if let Some(remaining) = resp
            .headers()
            .get("x-requests-remaining")
            .and_then(|v| v.to_str().ok())
        {
            debug!("Odds API requests remaining: {}", remaining);
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse odds API {what} response"))
    }
}

#[async_trait]
impl OddsProvider for OddsApiClient {
    fn name(&self) -> &str {
        "TheOddsAPI"
    }

    async fn fetch_odds(&self) -> Result<Vec<OddsEvent>> {
        let url = self.endpoint(
            "odds",
            &[
                ("regions", "us"),
                ("markets", "spreads,totals"),
                ("oddsFormat", "american"),
            ],
        )?;
        let raw = self.get_json(url, "odds").await?;
        let events: Vec<OddsEvent> = decode_events(raw, "odds")?;
        info!("Fetched odds for {} {} event(s)", events.len(), self.sport);
        Ok(events)
    }

    async fn fetch_scores(&self, days_from: u32) -> Result<Vec<ScoreEvent>> {
        let days = days_from.to_string();
        let url = self.endpoint("scores", &[("daysFrom", days.as_str())])?;
        let raw = self.get_json(url, "scores").await?;
        let events: Vec<ScoreEvent> = decode_events(raw, "scores")?;
        info!("Fetched scores for {} {} event(s)", events.len(), self.sport);
        Ok(events)
    }
}
