//! Search and trending collaborators.
//!
//! The recommender only sees the two traits below. [`MusicApiClient`] is the
//! HTTP implementation against the music API, whose endpoints wrap their
//! payload as `{"success": true, "data": {"results": [...]}}`.

use crate::track::CandidateTrack;
use anyhow::{bail, Context, Result};
use log::trace;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Free-text track search.
pub trait SearchProvider: Send + Sync {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<CandidateTrack>>;
}

/// "Currently popular" listing, independent of any query.
pub trait TrendingProvider: Send + Sync {
    fn trending(&self, limit: usize) -> Result<Vec<CandidateTrack>>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    data: Option<ResultsData>,
}

#[derive(Debug, Deserialize)]
struct ResultsData {
    results: Option<Vec<CandidateTrack>>,
}

impl Envelope {
    fn into_results(self) -> Vec<CandidateTrack> {
        if !self.success {
            return Vec::new();
        }
        self.data.and_then(|d| d.results).unwrap_or_default()
    }
}

/// HTTP client for `<base>/music/search` and `<base>/music/trending`.
#[derive(Debug, Clone)]
pub struct MusicApiClient {
    client: Client,
    base_url: String,
}

impl MusicApiClient {
    /// `base_url` is the API root, e.g. `http://localhost:5000/api`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Vec<CandidateTrack>> {
        let url = format!("{}/music/{endpoint}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .with_context(|| format!("Request to {url} failed"))?;

        if !response.status().is_success() {
            bail!("Music API {endpoint} failed with status {}", response.status());
        }

        let envelope: Envelope = response
            .json()
            .with_context(|| format!("Malformed {endpoint} response"))?;
        let results = envelope.into_results();
        trace!("{endpoint} returned {} results", results.len());
        Ok(results)
    }
}

impl SearchProvider for MusicApiClient {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<CandidateTrack>> {
        self.fetch("search", &[("q", query.to_string()), ("limit", limit.to_string())])
    }
}

impl TrendingProvider for MusicApiClient {
    fn trending(&self, limit: usize) -> Result<Vec<CandidateTrack>> {
        self.fetch("trending", &[("limit", limit.to_string())])
    }
}
