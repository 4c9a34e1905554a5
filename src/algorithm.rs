//! Scoring and ordering helpers for recommendation candidates.
//!
//! Everything here is side-effect free apart from drawing from the random
//! source it is handed. Callers inject the RNG so tests can seed it.

use crate::event_log::TimeOfDay;
use crate::preferences::PreferenceSnapshot;
use crate::track::{CandidateTrack, ScoredTrack};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Weights for [`score_candidates`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringContext {
    pub favorite_artist_weight: f64,
    pub favorite_artist_scale: f64,
    pub recent_play_weight: f64,
    pub recent_play_scale: f64,
    /// Upper bound (exclusive) of the uniform jitter term.
    pub jitter: f64,
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self {
            favorite_artist_weight: 0.2,
            favorite_artist_scale: 100.0,
            recent_play_weight: 0.3,
            recent_play_scale: 50.0,
            jitter: 20.0,
        }
    }
}

impl ScoringContext {
    #[must_use]
    pub fn favorite_artist_bonus(&self) -> f64 {
        self.favorite_artist_weight * self.favorite_artist_scale
    }

    #[must_use]
    pub fn recent_play_bonus(&self) -> f64 {
        self.recent_play_weight * self.recent_play_scale
    }
}

/// Deterministic part of a candidate's score.
#[must_use]
pub fn base_score(track: &CandidateTrack, prefs: &PreferenceSnapshot, context: &ScoringContext) -> f64 {
    let mut score = 0.0;
    if prefs.is_favorite_artist(&track.artist) {
        score += context.favorite_artist_bonus();
    }
    if prefs.is_recent_artist(&track.artist) {
        score += context.recent_play_bonus();
    }
    score
}

/// Re-rank candidates by artist affinity plus uniform jitter, best first.
pub fn score_candidates<R: Rng + ?Sized>(
    candidates: Vec<CandidateTrack>,
    prefs: &PreferenceSnapshot,
    context: &ScoringContext,
    rng: &mut R,
) -> Vec<ScoredTrack> {
    let mut scored: Vec<ScoredTrack> = candidates
        .into_iter()
        .map(|track| {
            let jitter = if context.jitter > 0.0 {
                rng.gen_range(0.0..context.jitter)
            } else {
                0.0
            };
            let score = base_score(&track, prefs, context) + jitter;
            ScoredTrack { track, score }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

/// Uniform Fisher-Yates shuffle, then keep at most `limit`.
pub fn shuffle_truncate<T, R: Rng + ?Sized>(mut items: Vec<T>, limit: usize, rng: &mut R) -> Vec<T> {
    items.shuffle(rng);
    items.truncate(limit);
    items
}

/// `ceil(total * percent / 100)` in integers. Split on hundreds so large
/// totals cannot overflow; saturates when `percent` exceeds 100.
#[must_use]
pub const fn share(total: usize, percent: usize) -> usize {
    let whole = (total / 100).saturating_mul(percent);
    let rest = (total % 100 * percent).div_ceil(100);
    whole.saturating_add(rest)
}

/// How the user explores new music, derived from the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryPreferences {
    pub exploration_level: f64,
    pub preferred_genres: Vec<String>,
    pub artist_diversity: f64,
    pub time_preferences: BTreeMap<TimeOfDay, u32>,
}

impl DiscoveryPreferences {
    pub fn from_snapshot(prefs: &PreferenceSnapshot) -> Self {
        Self {
            exploration_level: exploration_level(prefs),
            preferred_genres: prefs.favorite_genres.clone(),
            artist_diversity: artist_diversity(prefs),
            time_preferences: prefs.listening_patterns.time_of_day.clone(),
        }
    }
}

/// Share of distinct artists among recent plays, doubled and capped at 1.
/// Neutral 0.5 without history.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn exploration_level(prefs: &PreferenceSnapshot) -> f64 {
    let total = prefs.recently_played.len();
    if total == 0 {
        return 0.5;
    }
    let unique: HashSet<&str> = prefs
        .recently_played
        .iter()
        .map(|p| p.artist.as_str())
        .collect();
    (unique.len() as f64 / total as f64 * 2.0).min(1.0)
}

/// Shannon entropy of favorite-artist counts, normalized by its maximum.
/// Neutral 0.5 without history; a single artist has no diversity.
#[must_use]
pub fn artist_diversity(prefs: &PreferenceSnapshot) -> f64 {
    let artists = &prefs.favorite_artists;
    match artists.len() {
        0 => return 0.5,
        1 => return 0.0,
        _ => {}
    }

    let total: u32 = artists.iter().map(|a| a.count).sum();
    if total == 0 {
        return 0.0;
    }
    let total = f64::from(total);
    let entropy: f64 = artists
        .iter()
        .map(|a| f64::from(a.count) / total)
        .filter(|p| *p > 0.0)
        .map(|p| -p * p.log2())
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let max_entropy = (artists.len() as f64).log2();
    (entropy / max_entropy).min(1.0)
}
