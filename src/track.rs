//! Track descriptors shared by the history tracker and the recommender.
//!
//! Two shapes exist: [`TrackRef`] is what the caller hands to the tracker
//! when something is played or liked, and [`CandidateTrack`] is what the
//! music API returns. Candidates are external data and are never trusted to
//! be unique, so [`dedup_key`] gives the composite identity used when pools
//! from several queries are merged.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Minimal description of a track the user interacted with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRef {
    /// Provider identifier. Payloads that only carry `videoId` land here too.
    #[serde(alias = "videoId", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl TrackRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            thumbnail: None,
        }
    }

    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

/// A track as returned by the search or trending endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTrack {
    #[serde(alias = "videoId", default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Length in seconds, when the provider knows it.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

impl CandidateTrack {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }
}

impl From<&CandidateTrack> for TrackRef {
    fn from(track: &CandidateTrack) -> Self {
        Self {
            id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            thumbnail: track.thumbnail.clone(),
        }
    }
}

/// A candidate together with its re-ranking score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTrack {
    #[serde(flatten)]
    pub track: CandidateTrack,
    pub score: f64,
}

/// Composite identity of a candidate: `id-title-artist`.
#[must_use]
pub fn dedup_key(track: &CandidateTrack) -> String {
    format!("{}-{}-{}", track.id, track.title, track.artist)
}

/// Drop repeated candidates, keeping the first occurrence of each key.
#[must_use]
pub fn dedup_tracks(tracks: Vec<CandidateTrack>) -> Vec<CandidateTrack> {
    let mut seen = HashSet::with_capacity(tracks.len());
    tracks
        .into_iter()
        .filter(|track| seen.insert(dedup_key(track)))
        .collect()
}
