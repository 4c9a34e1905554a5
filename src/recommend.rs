//! # Recommendation Composer
//!
//! Builds a varied list of tracks by blending independent search strategies
//! and degrading gracefully when any of them comes back empty.
//!
//! ## Personalized strategy mix
//!
//! | Strategy  | Share of limit | Queries                                              |
//! |-----------|----------------|------------------------------------------------------|
//! | Artist    | 40%            | `"<artist> songs"` for the top 3 favorite artists    |
//! | Similar   | 30%            | three variants for each of the 3 most recent plays   |
//! | Mood      | 20%            | one canned query for the current time of day         |
//! | Trending  | shortfall      | only when the first three came up short              |
//!
//! Each similarity query asks for a sixth of its strategy's share, not a
//! third, which leaves room for trending results.
//!
//! The merged pool is deduplicated (first occurrence wins), shuffled and
//! truncated. Nothing here ever returns an error: a failing query counts as
//! zero results, and if personalization cannot run at all (or produces
//! nothing) a fixed set of generic queries is used instead.
//!
//! Results are intentionally non-deterministic between calls. The random
//! source is injectable so tests can seed it.

use crate::algorithm::{self, share, DiscoveryPreferences, ScoringContext};
use crate::catalog::{SearchProvider, TrendingProvider};
use crate::clock::Clock;
use crate::event_log::TimeOfDay;
use crate::preferences::{PreferenceSnapshot, PreferenceSource};
use crate::track::{dedup_tracks, CandidateTrack, ScoredTrack};
use anyhow::Result;
use chrono::Timelike;
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const ARTIST_SHARE: usize = 40;
pub const SIMILAR_SHARE: usize = 30;
pub const MOOD_SHARE: usize = 20;

/// Favorite artists used as seeds.
pub const SEED_ARTISTS: usize = 3;
/// Recent plays used as seeds.
pub const SEED_TRACKS: usize = 3;
/// Divisor of the similarity share per query.
pub const SIMILAR_QUERY_DIVISOR: usize = 6;

pub const FALLBACK_QUERIES: [&str; 5] = [
    "popular songs",
    "trending music",
    "top hits",
    "viral songs",
    "best music",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Artist,
    Similar,
    Mood,
    Trending,
    Fallback,
    Context,
}

/// One search the composer intends to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedQuery {
    pub strategy: Strategy,
    pub query: String,
    pub limit: usize,
}

impl PlannedQuery {
    fn new(strategy: Strategy, query: impl Into<String>, limit: usize) -> Self {
        Self {
            strategy,
            query: query.into(),
            limit,
        }
    }
}

/// Canned query for the part of the day `hour` falls in.
#[must_use]
pub const fn mood_query(hour: u32) -> &'static str {
    match TimeOfDay::from_hour(hour) {
        TimeOfDay::Morning => "morning energy music",
        TimeOfDay::Afternoon => "afternoon focus music",
        TimeOfDay::Evening => "evening relaxing music",
        TimeOfDay::Night => "late night chill music",
    }
}

/// Search queries for strategies A to C, in merge order.
#[must_use]
pub fn plan_queries(prefs: &PreferenceSnapshot, limit: usize, hour: u32) -> Vec<PlannedQuery> {
    let mut plan = Vec::new();
    if limit == 0 {
        return plan;
    }

    let artist_target = share(limit, ARTIST_SHARE);
    let per_artist = artist_target.div_ceil(SEED_ARTISTS);
    plan.extend(
        prefs
            .favorite_artists
            .iter()
            .take(SEED_ARTISTS)
            .map(|fav| PlannedQuery::new(Strategy::Artist, format!("{} songs", fav.artist), per_artist)),
    );

    let similar_target = share(limit, SIMILAR_SHARE);
    let per_similar = similar_target.div_ceil(SIMILAR_QUERY_DIVISOR);
    for recent in prefs.recently_played.iter().take(SEED_TRACKS) {
        for query in [
            format!("{} similar songs", recent.artist),
            format!("songs like {}", recent.title),
            format!("{} best tracks", recent.artist),
        ] {
            plan.push(PlannedQuery::new(Strategy::Similar, query, per_similar));
        }
    }

    plan.push(PlannedQuery::new(
        Strategy::Mood,
        mood_query(hour),
        share(limit, MOOD_SHARE),
    ));

    plan
}

/// Fixed listening situations with their own canned queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListeningContext {
    Workout,
    Study,
    Party,
    Relax,
    Sleep,
}

impl ListeningContext {
    /// Unknown labels mean `relax`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Self::Relax)
    }

    #[must_use]
    pub const fn queries(self) -> &'static [&'static str] {
        match self {
            Self::Workout => &["workout music", "gym songs", "high energy music"],
            Self::Study => &["study music", "focus music", "concentration songs"],
            Self::Party => &["party music", "dance songs", "upbeat music"],
            Self::Relax => &["relaxing music", "chill songs", "calm music"],
            Self::Sleep => &["sleep music", "peaceful songs", "ambient music"],
        }
    }
}

impl FromStr for ListeningContext {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "workout" => Ok(Self::Workout),
            "study" => Ok(Self::Study),
            "party" => Ok(Self::Party),
            "relax" => Ok(Self::Relax),
            "sleep" => Ok(Self::Sleep),
            other => anyhow::bail!("Unknown listening context `{other}`"),
        }
    }
}

impl fmt::Display for ListeningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Workout => "workout",
            Self::Study => "study",
            Self::Party => "party",
            Self::Relax => "relax",
            Self::Sleep => "sleep",
        };
        f.write_str(label)
    }
}

type SharedRng = Box<dyn RngCore + Send>;

pub struct Recommender {
    preferences: Arc<dyn PreferenceSource>,
    search: Arc<dyn SearchProvider>,
    trending: Arc<dyn TrendingProvider>,
    clock: Arc<dyn Clock>,
    rng: Mutex<SharedRng>,
    scoring: ScoringContext,
}

impl fmt::Debug for Recommender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recommender")
            .field("scoring", &self.scoring)
            .finish_non_exhaustive()
    }
}

impl Recommender {
    pub fn new(
        preferences: Arc<dyn PreferenceSource>,
        search: Arc<dyn SearchProvider>,
        trending: Arc<dyn TrendingProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            preferences,
            search,
            trending,
            clock,
            rng: Mutex::new(Box::new(StdRng::from_entropy())),
            scoring: ScoringContext::default(),
        }
    }

    /// Replace the random source used for shuffling and score jitter.
    #[must_use]
    pub fn with_rng<R: RngCore + Send + 'static>(self, rng: R) -> Self {
        Self {
            rng: Mutex::new(Box::new(rng)),
            ..self
        }
    }

    #[must_use]
    pub fn with_scoring(self, scoring: ScoringContext) -> Self {
        Self { scoring, ..self }
    }

    /// Personalized mix of at most `limit` tracks. Never fails; may be empty.
    pub fn personalized(&self, limit: usize) -> Vec<CandidateTrack> {
        if limit == 0 {
            return Vec::new();
        }

        let prefs = match self.preferences.preferences() {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!("Personalization unavailable, using generic picks: {e:#}");
                return self.fallback(limit);
            }
        };

        let plan = plan_queries(&prefs, limit, self.clock.now().hour());
        debug!("Issuing {} personalized queries for {limit} tracks", plan.len());
        let mut pool = self.run_queries(&plan);

        if pool.len() < limit {
            let shortfall = limit - pool.len();
            debug!("Filling shortfall of {shortfall} from trending");
            pool.extend(self.fetch_trending(shortfall));
        }

        if pool.is_empty() {
            info!("No personalized results, using generic picks");
            return self.fallback(limit);
        }

        let unique = dedup_tracks(pool);
        algorithm::shuffle_truncate(unique, limit, &mut **self.rng())
    }

    /// Tracks for a listening situation such as `workout` or `sleep`.
    pub fn contextual(&self, context: ListeningContext, limit: usize) -> Vec<CandidateTrack> {
        if limit == 0 {
            return Vec::new();
        }
        let queries = context.queries();
        let per_query = limit.div_ceil(queries.len());
        let plan: Vec<PlannedQuery> = queries
            .iter()
            .map(|q| PlannedQuery::new(Strategy::Context, *q, per_query))
            .collect();

        let unique = dedup_tracks(self.run_queries(&plan));
        algorithm::shuffle_truncate(unique, limit, &mut **self.rng())
    }

    /// Generic, unpersonalized picks.
    pub fn fallback(&self, limit: usize) -> Vec<CandidateTrack> {
        if limit == 0 {
            return Vec::new();
        }
        let per_query = limit.div_ceil(FALLBACK_QUERIES.len());
        let plan: Vec<PlannedQuery> = FALLBACK_QUERIES
            .iter()
            .map(|q| PlannedQuery::new(Strategy::Fallback, *q, per_query))
            .collect();

        let mut picks = dedup_tracks(self.run_queries(&plan));
        picks.truncate(limit);
        picks
    }

    /// Re-rank already fetched candidates against a snapshot. No network.
    pub fn score(&self, candidates: Vec<CandidateTrack>, prefs: &PreferenceSnapshot) -> Vec<ScoredTrack> {
        algorithm::score_candidates(candidates, prefs, &self.scoring, &mut **self.rng())
    }

    /// Exploration and diversity measures for the current history.
    pub fn discovery_preferences(&self) -> Result<DiscoveryPreferences> {
        let prefs = self.preferences.preferences()?;
        Ok(DiscoveryPreferences::from_snapshot(&prefs))
    }

    /// Compute a personalized list and publish it to `feed`. Returns whether
    /// the result was accepted, i.e. no newer refresh had already published.
    pub fn refresh(&self, feed: &RecommendationFeed, limit: usize) -> bool {
        let ticket = feed.begin();
        let tracks = self.personalized(limit);
        feed.publish(ticket, tracks)
    }

    fn rng(&self) -> MutexGuard<'_, SharedRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run every query concurrently and concatenate in plan order.
    fn run_queries(&self, plan: &[PlannedQuery]) -> Vec<CandidateTrack> {
        plan.par_iter()
            .map(|query| self.search_or_empty(query))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    fn search_or_empty(&self, planned: &PlannedQuery) -> Vec<CandidateTrack> {
        if planned.limit == 0 {
            return Vec::new();
        }
        match self.search.search(&planned.query, planned.limit) {
            Ok(results) => {
                trace!(
                    "{:?} query `{}` returned {} results",
                    planned.strategy,
                    planned.query,
                    results.len()
                );
                results
            }
            Err(e) => {
                warn!("{:?} query `{}` failed: {e:#}", planned.strategy, planned.query);
                Vec::new()
            }
        }
    }

    fn fetch_trending(&self, limit: usize) -> Vec<CandidateTrack> {
        match self.trending.trending(limit) {
            Ok(results) => results,
            Err(e) => {
                warn!("Trending request failed: {e:#}");
                Vec::new()
            }
        }
    }
}

/// Handle for one in-flight refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

#[derive(Debug, Default)]
struct FeedState {
    issued: u64,
    published: u64,
    tracks: Vec<CandidateTrack>,
}

/// Latest recommendation list shown to the user.
///
/// Refreshes may overlap. Each one takes a ticket before it starts; a result
/// is only accepted if no newer ticket has already published, so a slow
/// earlier refresh cannot overwrite a newer list, and lists are always
/// replaced whole.
#[derive(Debug, Default)]
pub struct RecommendationFeed {
    state: Mutex<FeedState>,
}

impl RecommendationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self) -> FetchTicket {
        let mut state = self.state();
        state.issued += 1;
        FetchTicket(state.issued)
    }

    pub fn publish(&self, ticket: FetchTicket, tracks: Vec<CandidateTrack>) -> bool {
        let mut state = self.state();
        if ticket.0 <= state.published {
            debug!("Discarding stale recommendations (ticket {})", ticket.0);
            return false;
        }
        state.published = ticket.0;
        state.tracks = tracks;
        true
    }

    #[must_use]
    pub fn current(&self) -> Vec<CandidateTrack> {
        self.state().tracks.clone()
    }
}
