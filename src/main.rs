//! # Encore
//!
//! Command-line front end for the history tracker and recommendation
//! composer. Each invocation hydrates the tracker from the local store, runs
//! one command, and flushes any pending remote sync before exiting.
//!
//! ## Usage
//!
//! ```bash
//! # Record listening activity
//! encore play abc123 "Song" "Artist" --duration 180000
//! encore like abc123 "Song" "Artist"
//!
//! # Inspect and recommend
//! encore prefs
//! encore recommend --limit 20
//! encore context study
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser};
use encore::catalog::{MusicApiClient, SearchProvider};
use encore::cli::{self, TrackArgs};
use encore::clock::{Clock, SystemClock};
use encore::collector::HttpCollector;
use encore::completion;
use encore::config::RuntimeConfig;
use encore::history::{HistoryTracker, SyncDriver, TrackerOptions};
use encore::recommend::{ListeningContext, Recommender};
use encore::storage::SqliteStore;
use encore::track::TrackRef;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;

/// Main entry point for Encore.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug encore recommend` - Enable debug logging
/// - `RUST_LOG=encore::recommend=trace encore recommend` - Per-query details
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    if let cli::Command::Completion { shell } = args.command {
        let mut cmd = cli::Args::command();
        completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        return Ok(());
    }

    let config = runtime_config(&args)?;
    debug!("Using store {}", config.store_path.display());

    let store = Arc::new(SqliteStore::open(&config.store_path)?);
    let collector = Arc::new(HttpCollector::new(&config.api_url, config.access_token.clone())?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tracker = Arc::new(HistoryTracker::open(
        store,
        collector,
        Arc::clone(&clock),
        TrackerOptions {
            sync_delay: config.sync_delay(),
            driver: SyncDriver::Background,
        },
    )?);
    let api = Arc::new(MusicApiClient::new(&config.api_url)?);

    let result = run(args.command, &tracker, &api, clock);

    match Arc::try_unwrap(tracker) {
        Ok(mut tracker) => tracker.shutdown(),
        Err(_) => warn!("History tracker still shared at exit; pending sync flushes on drop"),
    }
    result
}

fn runtime_config(args: &cli::Args) -> Result<RuntimeConfig> {
    let config = match &args.store {
        Some(path) => RuntimeConfig::with_store_path(path.clone()),
        None => RuntimeConfig::new()?,
    };
    Ok(config
        .with_api_url(args.api_url.as_str())
        .with_access_token(args.access_token.clone()))
}

fn run(
    command: cli::Command,
    tracker: &Arc<HistoryTracker>,
    api: &Arc<MusicApiClient>,
    clock: Arc<dyn Clock>,
) -> Result<()> {
    let recommender = || {
        Recommender::new(
            Arc::clone(tracker) as _,
            Arc::clone(api) as _,
            Arc::clone(api) as _,
            Arc::clone(&clock),
        )
    };

    match command {
        cli::Command::Play { track, duration } => {
            let track = track_ref(track);
            info!("Recording play of {} by {}", track.title, track.artist);
            tracker.track_play(&track, duration);
        }
        cli::Command::Like { track } => {
            let track = track_ref(track);
            info!("Recording like of {} by {}", track.title, track.artist);
            tracker.track_like(&track);
        }
        cli::Command::Skip { track, played } => {
            let track = track_ref(track);
            info!("Recording skip of {} by {}", track.title, track.artist);
            tracker.track_skip(&track, played);
        }
        cli::Command::Search { query, limit } => {
            let results = api.search(&query, limit)?;
            tracker.track_search(&query, &results);
            print_json(&results)?;
        }
        cli::Command::Prefs => print_json(&tracker.user_preferences())?,
        cli::Command::Summary => print_json(&tracker.history_summary())?,
        cli::Command::Recommend { limit, scored } => {
            let recommender = recommender();
            let tracks = recommender.personalized(limit);
            if scored {
                let prefs = tracker.user_preferences();
                print_json(&recommender.score(tracks, &prefs))?;
            } else {
                print_json(&tracks)?;
            }
        }
        cli::Command::Context { label, limit } => {
            let context = ListeningContext::from_label(&label);
            info!("Building {context} recommendations");
            print_json(&recommender().contextual(context, limit))?;
        }
        cli::Command::Discovery => print_json(&recommender().discovery_preferences()?)?,
        cli::Command::Clear => tracker.clear_history(),
        cli::Command::Completion { .. } => {}
    }
    Ok(())
}

fn track_ref(args: TrackArgs) -> TrackRef {
    let track = TrackRef::new(args.id, args.title, args.artist);
    match args.thumbnail {
        Some(thumbnail) => track.with_thumbnail(thumbnail),
        None => track,
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
