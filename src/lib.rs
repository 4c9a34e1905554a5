//! Listening history and personalized recommendations for a streaming client.
//!
//! Core modules:
//! - [`history`] - Records plays, likes, skips and searches; persists and syncs them
//! - [`preferences`] - Derives the preference snapshot from the event log
//! - [`recommend`] - Blends search strategies into recommendation lists
//! - [`algorithm`] - Scoring, shuffling and discovery measures
//!
//! ### Supporting Modules
//!
//! - [`event_log`] - Capped event sequences and their serialized form
//! - [`track`] - Track descriptors and deduplication
//! - [`storage`] - Local key-value persistence (SQLite or in-memory)
//! - [`collector`] - Remote history sync over HTTP
//! - [`catalog`] - Music API search and trending clients
//! - [`debounce`] - Trailing-edge timer used for sync coalescing
//! - [`clock`] - Injectable wall clock
//! - [`config`] - Data directory and runtime settings
//! - [`cli`] / [`completion`] - Command-line interface
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use encore::catalog::MusicApiClient;
//! use encore::clock::SystemClock;
//! use encore::collector::HttpCollector;
//! use encore::history::{HistoryTracker, TrackerOptions};
//! use encore::recommend::Recommender;
//! use encore::storage::SqliteStore;
//! use encore::track::TrackRef;
//! use std::sync::Arc;
//!
//! let store = Arc::new(SqliteStore::open(&encore::config::get_store_path()?)?);
//! let collector = Arc::new(HttpCollector::new("http://localhost:5000/api", None)?);
//! let tracker = Arc::new(HistoryTracker::open(
//!     store,
//!     collector,
//!     Arc::new(SystemClock),
//!     TrackerOptions::default(),
//! )?);
//!
//! tracker.track_play(&TrackRef::new("abc", "Song", "Artist"), 180_000);
//!
//! let api = Arc::new(MusicApiClient::new("http://localhost:5000/api")?);
//! let recommender = Recommender::new(tracker.clone(), api.clone(), api, Arc::new(SystemClock));
//! for track in recommender.personalized(20) {
//!     println!("{} - {}", track.artist, track.title);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Personalized Recommendations
//!
//! A request for `limit` tracks is split across strategies:
//! - **Artist** (40%): songs by the top three favorite artists
//! - **Similar** (30%): tracks related to the three most recent plays
//! - **Mood** (20%): a canned query for the current time of day
//! - **Trending**: tops up whatever the first three left short
//!
//! The pool is deduplicated, shuffled and truncated, so two calls with the
//! same history usually differ. If personalization produces nothing, a fixed
//! set of generic queries is used instead.
//!
//! ## Error Handling
//!
//! Fallible constructors return `anyhow::Result`. Tracking and recommending
//! never fail: storage errors, sync errors and upstream outages are logged
//! through the `log` facade and degrade to empty results.
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

pub mod algorithm;
pub mod catalog;
pub mod cli;
pub mod clock;
pub mod collector;
pub mod completion;
pub mod config;
pub mod debounce;
pub mod event_log;
pub mod history;
pub mod preferences;
pub mod recommend;
pub mod storage;
pub mod track;
