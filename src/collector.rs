//! Remote history collector.
//!
//! Best effort replication of the event log to the API. Failures surface as
//! errors here; the tracker logs and drops them.

use crate::event_log::EventLog;
use anyhow::{bail, Context, Result};
use log::debug;
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives the full event log.
pub trait HistoryCollector: Send + Sync {
    fn sync(&self, log: &EventLog) -> Result<()>;
}

#[derive(Serialize)]
struct SyncBody<'a> {
    history: &'a EventLog,
}

/// POSTs the log to `<base>/user/history/sync` with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

impl HttpCollector {
    pub fn new(base_url: &str, access_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/user/history/sync", base_url.trim_end_matches('/')),
            access_token: access_token.filter(|t| !t.is_empty()),
        })
    }
}

impl HistoryCollector for HttpCollector {
    fn sync(&self, log: &EventLog) -> Result<()> {
        let Some(token) = &self.access_token else {
            debug!("No access token configured, skipping history sync");
            return Ok(());
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&SyncBody { history: log })
            .send()
            .with_context(|| format!("History sync to {} failed", self.endpoint))?;

        if !response.status().is_success() {
            bail!("History sync rejected with status {}", response.status());
        }
        debug!("History synced ({} plays)", log.plays.len());
        Ok(())
    }
}

/// Collector that drops everything, for offline use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCollector;

impl HistoryCollector for NullCollector {
    fn sync(&self, _log: &EventLog) -> Result<()> {
        Ok(())
    }
}
