//! Preference snapshot derived from the event log.
//!
//! Everything here is a pure function of an [`EventLog`]. Nothing is cached:
//! the tracker recomputes the snapshot on every call, which keeps it trivially
//! consistent with the log at the moment it was read.

use crate::event_log::{Event, EventLog, TimeOfDay, WEEKDAY_NAMES};
use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// How many artists the snapshot keeps.
pub const TOP_ARTISTS: usize = 10;
/// How many artists the history summary keeps.
pub const SUMMARY_TOP_ARTISTS: usize = 5;
/// How many recent plays the snapshot keeps.
pub const RECENTLY_PLAYED: usize = 10;

const QUICK_SKIP_MS: u64 = 10_000;
const MID_SKIP_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtistCount {
    pub artist: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentPlay {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub thumbnail: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListeningPatterns {
    pub time_of_day: BTreeMap<TimeOfDay, u32>,
    /// Keyed by weekday name, Sunday first.
    pub day_of_week: BTreeMap<String, u32>,
    /// Not derived yet; always zero.
    pub average_session_length: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipPatterns {
    /// Skipped within 10 seconds.
    pub quick_skips: u32,
    /// Skipped between 10 and 60 seconds.
    pub mid_skips: u32,
    /// Skipped after a minute or more.
    pub late_skips: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSnapshot {
    pub favorite_artists: Vec<ArtistCount>,
    /// There is no genre source; this is always empty.
    pub favorite_genres: Vec<String>,
    pub listening_patterns: ListeningPatterns,
    pub recently_played: Vec<RecentPlay>,
    pub skip_patterns: SkipPatterns,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub total_plays: usize,
    pub total_likes: usize,
    pub total_skips: usize,
    pub total_searches: usize,
    pub session_start: i64,
    pub favorite_artists: Vec<ArtistCount>,
}

/// Anything the recommender can read a snapshot from.
pub trait PreferenceSource: Send + Sync {
    fn preferences(&self) -> Result<PreferenceSnapshot>;
}

/// A fixed snapshot, for previews and benchmarks.
impl PreferenceSource for PreferenceSnapshot {
    fn preferences(&self) -> Result<PreferenceSnapshot> {
        Ok(self.clone())
    }
}

impl PreferenceSnapshot {
    pub fn from_log(log: &EventLog) -> Self {
        Self {
            favorite_artists: favorite_artists(log, TOP_ARTISTS),
            favorite_genres: favorite_genres(log),
            listening_patterns: listening_patterns(log),
            recently_played: recently_played(log, RECENTLY_PLAYED),
            skip_patterns: skip_patterns(log),
        }
    }

    #[must_use]
    pub fn is_favorite_artist(&self, artist: &str) -> bool {
        self.favorite_artists.iter().any(|fav| fav.artist == artist)
    }

    #[must_use]
    pub fn is_recent_artist(&self, artist: &str) -> bool {
        self.recently_played.iter().any(|recent| recent.artist == artist)
    }
}

/// Top `limit` artists by plays plus likes. Each event counts once;
/// ties keep the order in which artists first appear (plays, then likes).
#[must_use]
pub fn favorite_artists(log: &EventLog, limit: usize) -> Vec<ArtistCount> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, u32> = HashMap::new();

    for event in log.plays.iter().chain(log.likes.iter()) {
        let artist = event.track.artist.as_str();
        if artist.is_empty() {
            continue;
        }
        let count = counts.entry(artist).or_insert_with(|| {
            order.push(artist);
            0
        });
        *count += 1;
    }

    let mut ranked: Vec<ArtistCount> = order
        .into_iter()
        .map(|artist| ArtistCount {
            artist: artist.to_string(),
            count: counts[artist],
        })
        .collect();
    // Stable sort keeps first-seen order among equal counts.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

/// Genre inference has no data source, so this is empty by contract.
#[must_use]
pub fn favorite_genres(_log: &EventLog) -> Vec<String> {
    Vec::new()
}

#[must_use]
pub fn listening_patterns(log: &EventLog) -> ListeningPatterns {
    let mut patterns = ListeningPatterns::default();
    for play in &log.plays {
        *patterns.time_of_day.entry(play.time_of_day()).or_insert(0) += 1;
        let day = WEEKDAY_NAMES[usize::from(play.day_of_week())];
        *patterns.day_of_week.entry(day.to_string()).or_insert(0) += 1;
    }
    patterns
}

/// Most recent plays first.
#[must_use]
pub fn recently_played(log: &EventLog, limit: usize) -> Vec<RecentPlay> {
    log.plays
        .iter()
        .rev()
        .take(limit)
        .map(|play: &Event| RecentPlay {
            id: play.track.id.clone(),
            title: play.track.title.clone(),
            artist: play.track.artist.clone(),
            thumbnail: play.track.thumbnail.clone(),
            timestamp: play.timestamp,
        })
        .collect()
}

#[must_use]
pub fn skip_patterns(log: &EventLog) -> SkipPatterns {
    use crate::event_log::EventPayload;

    let mut patterns = SkipPatterns::default();
    for skip in &log.skips {
        let EventPayload::Skip { play_duration } = skip.payload else {
            continue;
        };
        match play_duration {
            d if d < QUICK_SKIP_MS => patterns.quick_skips += 1,
            d if d < MID_SKIP_MS => patterns.mid_skips += 1,
            _ => patterns.late_skips += 1,
        }
    }
    patterns
}

#[must_use]
pub fn history_summary(log: &EventLog) -> HistorySummary {
    HistorySummary {
        total_plays: log.plays.len(),
        total_likes: log.likes.len(),
        total_skips: log.skips.len(),
        total_searches: log.searches.len(),
        session_start: log.session_start,
        favorite_artists: favorite_artists(log, SUMMARY_TOP_ARTISTS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackRef;
    use chrono::{DateTime, Local, TimeZone};

    fn at(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, hour, 0, 0).unwrap()
    }

    fn track(artist: &str) -> TrackRef {
        TrackRef::new(format!("{artist}-id"), format!("{artist} song"), artist)
    }

    #[test]
    fn test_favorite_artists_combines_plays_and_likes() {
        let mut log = EventLog::new(0);
        for _ in 0..3 {
            log.push(Event::play(&track("A"), 0, at(10)));
        }
        log.push(Event::like(&track("B"), at(10)));
        log.push(Event::like(&track("A"), at(10)));

        let artists = favorite_artists(&log, TOP_ARTISTS);

        assert_eq!(
            artists,
            vec![
                ArtistCount { artist: "A".into(), count: 4 },
                ArtistCount { artist: "B".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_favorite_artists_ties_keep_first_seen_order() {
        let mut log = EventLog::new(0);
        log.push(Event::play(&track("Zed"), 0, at(10)));
        log.push(Event::play(&track("Abe"), 0, at(10)));
        log.push(Event::like(&track("Mid"), at(10)));

        let names: Vec<String> = favorite_artists(&log, TOP_ARTISTS)
            .into_iter()
            .map(|a| a.artist)
            .collect();

        assert_eq!(names, vec!["Zed", "Abe", "Mid"]);
    }

    #[test]
    fn test_favorite_artists_truncates_and_skips_blank() {
        let mut log = EventLog::new(0);
        for i in 0..15 {
            log.push(Event::play(&track(&format!("Artist {i}")), 0, at(10)));
        }
        log.push(Event::play(&TrackRef::new("x", "no artist", ""), 0, at(10)));

        let artists = favorite_artists(&log, TOP_ARTISTS);

        assert_eq!(artists.len(), TOP_ARTISTS);
        assert!(artists.iter().all(|a| !a.artist.is_empty()));
    }

    #[test]
    fn test_recently_played_is_newest_first() {
        let mut log = EventLog::new(0);
        for i in 0..12 {
            log.push(Event::play(&TrackRef::new(i.to_string(), "t", "a"), 0, at(10)));
        }

        let recent = recently_played(&log, RECENTLY_PLAYED);

        assert_eq!(recent.len(), RECENTLY_PLAYED);
        assert_eq!(recent[0].id, "11");
        assert_eq!(recent[9].id, "2");
    }

    #[test]
    fn test_listening_patterns_histogram() {
        let mut log = EventLog::new(0);
        log.push(Event::play(&track("A"), 0, at(5)));
        log.push(Event::play(&track("A"), 0, at(11)));
        log.push(Event::play(&track("A"), 0, at(17)));
        log.push(Event::play(&track("A"), 0, at(22)));
        log.push(Event::play(&track("A"), 0, at(23)));

        let patterns = listening_patterns(&log);

        assert_eq!(patterns.time_of_day[&TimeOfDay::Night], 1);
        assert_eq!(patterns.time_of_day[&TimeOfDay::Morning], 1);
        assert_eq!(patterns.time_of_day[&TimeOfDay::Afternoon], 1);
        assert_eq!(patterns.time_of_day[&TimeOfDay::Evening], 2);
        // 2024-03-09 is a Saturday.
        assert_eq!(patterns.day_of_week["Saturday"], 5);
        assert_eq!(patterns.average_session_length, 0);
    }

    #[test]
    fn test_skip_patterns_buckets() {
        let mut log = EventLog::new(0);
        for ms in [0, 9_999, 10_000, 59_999, 60_000, 200_000] {
            log.push(Event::skip(&track("A"), ms, at(10)));
        }

        let patterns = skip_patterns(&log);

        assert_eq!(patterns, SkipPatterns { quick_skips: 2, mid_skips: 2, late_skips: 2 });
    }

    #[test]
    fn test_empty_log_gives_default_snapshot() {
        let snapshot = PreferenceSnapshot::from_log(&EventLog::new(0));

        assert_eq!(snapshot, PreferenceSnapshot::default());
        assert!(snapshot.favorite_genres.is_empty());
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let mut log = EventLog::new(0);
        log.push(Event::play(&track("A"), 1000, at(8)));
        log.push(Event::like(&track("B"), at(8)));
        log.push(Event::skip(&track("C"), 5000, at(8)));

        assert_eq!(PreferenceSnapshot::from_log(&log), PreferenceSnapshot::from_log(&log));
    }

    #[test]
    fn test_history_summary_counts() {
        let mut log = EventLog::new(7);
        for i in 0..7 {
            log.push(Event::play(&track(&format!("A{i}")), 0, at(10)));
        }
        log.push(Event::search("query", &[], at(10)));

        let summary = history_summary(&log);

        assert_eq!(summary.total_plays, 7);
        assert_eq!(summary.total_searches, 1);
        assert_eq!(summary.session_start, 7);
        assert_eq!(summary.favorite_artists.len(), SUMMARY_TOP_ARTISTS);
    }
}
