// Live data feed for player, team, and fixture statistics.
//
// Fetches the bootstrap and fixture documents from the public fantasy API
// and converts them into a validated `StatSnapshot`. The feed is behind a
// trait so the engine and tests can run against canned snapshots.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::stats::{
    PlayerId, RawBootstrap, RawElementSummary, RawFixture, RawHistoryEntry, SnapshotError,
    StatSnapshot,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const BOOTSTRAP_PATH: &str = "bootstrap-static/";
const FIXTURES_PATH: &str = "fixtures/";

/// Matches kept per player from the `element-summary` history.
const RECENT_MATCH_WINDOW: usize = 5;
/// In-flight `element-summary` requests at a time.
const HISTORY_CONCURRENCY: usize = 8;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("feed returned status {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("feed document from {url} could not be decoded: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("feed data failed validation: {0}")]
    Invalid(#[from] SnapshotError),
}

// ---------------------------------------------------------------------------
// StatFeed
// ---------------------------------------------------------------------------

/// Source of statistics snapshots. The production implementation talks to
/// the fantasy API over HTTP; tests substitute fixed data.
#[async_trait]
pub trait StatFeed {
    async fn fetch_snapshot(&self) -> Result<StatSnapshot, FeedError>;
}

// ---------------------------------------------------------------------------
// FplFeed
// ---------------------------------------------------------------------------

/// HTTP-backed feed over the public fantasy API.
pub struct FplFeed {
    http: reqwest::Client,
    base_url: String,
}

impl FplFeed {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/{path}")
    }

    /// Pull each player's match history and keep the trailing minutes window.
    /// A player whose summary fails to load is skipped with a warning; the
    /// snapshot then falls back to treating their window as unknown.
    async fn fetch_recent_minutes(&self, ids: &[PlayerId]) -> HashMap<PlayerId, Vec<u16>> {
        let mut minutes = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(HISTORY_CONCURRENCY) {
            let mut tasks = JoinSet::new();
            for &id in chunk {
                let http = self.http.clone();
                let url = self.url(&format!("element-summary/{id}/"));
                tasks.spawn(async move {
                    (id, get_json::<RawElementSummary>(&http, url).await)
                });
            }
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((id, Ok(summary))) => {
                        minutes.insert(id, recent_window(&summary.history));
                    }
                    Ok((id, Err(error))) => {
                        warn!("match history for player {id} unavailable: {error}");
                    }
                    Err(error) => warn!("match history task failed: {error}"),
                }
            }
        }
        minutes
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(
    http: &reqwest::Client,
    url: String,
) -> Result<T, FeedError> {
    debug!("fetching {url}");

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|source| FeedError::Request {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::Status { url, status });
    }

    response
        .json::<T>()
        .await
        .map_err(|source| FeedError::Decode { url, source })
}

/// Minutes from the newest matches in a history ordered oldest first.
fn recent_window(history: &[RawHistoryEntry]) -> Vec<u16> {
    let skip = history.len().saturating_sub(RECENT_MATCH_WINDOW);
    history.iter().skip(skip).map(|entry| entry.minutes).collect()
}

#[async_trait]
impl StatFeed for FplFeed {
    async fn fetch_snapshot(&self) -> Result<StatSnapshot, FeedError> {
        let bootstrap: RawBootstrap =
            get_json(&self.http, self.url(BOOTSTRAP_PATH)).await?;
        let fixtures: Vec<RawFixture> = get_json(&self.http, self.url(FIXTURES_PATH)).await?;

        let snapshot = StatSnapshot::from_raw(bootstrap, fixtures, Utc::now())?;
        let ids: Vec<PlayerId> = snapshot.players.iter().map(|p| p.id).collect();
        let histories = self.fetch_recent_minutes(&ids).await;
        let snapshot = snapshot.with_recent_minutes(histories);
        info!(
            "snapshot fetched: {} players, {} teams, {} fixtures",
            snapshot.players.len(),
            snapshot.teams.len(),
            snapshot.fixtures.len()
        );
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
