//! The bounded event log kept by the history tracker.
//!
//! Four independent FIFO sequences, one per event kind. Each has a fixed
//! cap; pushing past it evicts from the front. The whole log serializes to
//! the JSON document that is stored locally and sent to the collector:
//!
//! ```text
//! { "plays": [...], "likes": [...], "skips": [...], "searches": [...],
//!   "sessionStart": 1700000000000 }
//! ```

use crate::track::{CandidateTrack, TrackRef};
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

pub const PLAY_CAP: usize = 100;
pub const LIKE_CAP: usize = 50;
pub const SKIP_CAP: usize = 50;
pub const SEARCH_CAP: usize = 20;

/// Number of results summarized on a search event.
pub const SEARCH_TOP_RESULTS: usize = 3;

/// Coarse part of the day a play happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Night,
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    /// `[0,6)` night, `[6,12)` morning, `[12,18)` afternoon, rest evening.
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 => Self::Night,
            6..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Night => "night",
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// What happened, plus the data specific to that kind of event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventPayload {
    #[serde(rename_all = "camelCase")]
    Play {
        /// Listened time in milliseconds.
        #[serde(default)]
        duration: u64,
        #[serde(default = "default_source")]
        source: String,
        /// Captured from the local clock when tracked. Older records lack it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_of_day: Option<TimeOfDay>,
        /// 0 = Sunday.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        day_of_week: Option<u8>,
    },
    Like,
    #[serde(rename_all = "camelCase")]
    Skip {
        #[serde(default)]
        play_duration: u64,
    },
    #[serde(rename_all = "camelCase")]
    Search {
        query: String,
        #[serde(default)]
        result_count: usize,
        #[serde(default)]
        top_results: Vec<TrackRef>,
    },
}

fn default_source() -> String {
    "home".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Play,
    Like,
    Skip,
    Search,
}

/// One recorded user action. Never mutated after it is pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub track: TrackRef,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn play(track: &TrackRef, duration_ms: u64, at: DateTime<Local>) -> Self {
        Self {
            track: track.clone(),
            timestamp: at.timestamp_millis(),
            payload: EventPayload::Play {
                duration: duration_ms,
                source: default_source(),
                time_of_day: Some(TimeOfDay::from_hour(at.hour())),
                day_of_week: Some(weekday_index(&at)),
            },
        }
    }

    pub fn like(track: &TrackRef, at: DateTime<Local>) -> Self {
        Self {
            track: track.clone(),
            timestamp: at.timestamp_millis(),
            payload: EventPayload::Like,
        }
    }

    pub fn skip(track: &TrackRef, play_duration_ms: u64, at: DateTime<Local>) -> Self {
        // Skips never carried a thumbnail.
        let track = TrackRef {
            thumbnail: None,
            ..track.clone()
        };
        Self {
            track,
            timestamp: at.timestamp_millis(),
            payload: EventPayload::Skip {
                play_duration: play_duration_ms,
            },
        }
    }

    pub fn search(query: &str, results: &[CandidateTrack], at: DateTime<Local>) -> Self {
        let top_results = results
            .iter()
            .take(SEARCH_TOP_RESULTS)
            .map(|r| TrackRef {
                thumbnail: None,
                ..TrackRef::from(r)
            })
            .collect();
        Self {
            track: TrackRef::default(),
            timestamp: at.timestamp_millis(),
            payload: EventPayload::Search {
                query: query.to_lowercase(),
                result_count: results.len(),
                top_results,
            },
        }
    }

    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Play { .. } => EventKind::Play,
            EventPayload::Like => EventKind::Like,
            EventPayload::Skip { .. } => EventKind::Skip,
            EventPayload::Search { .. } => EventKind::Search,
        }
    }

    /// Time-of-day slot of a play. Falls back to the local clock reading of
    /// the timestamp for records written before the slot was captured.
    #[must_use]
    pub fn time_of_day(&self) -> TimeOfDay {
        match &self.payload {
            EventPayload::Play {
                time_of_day: Some(slot),
                ..
            } => *slot,
            _ => TimeOfDay::from_hour(self.local_time().map_or(0, |t| t.hour())),
        }
    }

    /// Weekday index (0 = Sunday), same fallback as [`Event::time_of_day`].
    #[must_use]
    pub fn day_of_week(&self) -> u8 {
        match &self.payload {
            EventPayload::Play {
                day_of_week: Some(day),
                ..
            } => *day % 7,
            _ => self.local_time().map_or(0, |t| weekday_index(&t)),
        }
    }

    fn local_time(&self) -> Option<DateTime<Local>> {
        Local.timestamp_millis_opt(self.timestamp).single()
    }
}

fn weekday_index(at: &DateTime<Local>) -> u8 {
    // num_days_from_sunday is 0..=6
    at.weekday().num_days_from_sunday() as u8
}

/// The four bounded sequences plus the session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    #[serde(default)]
    pub plays: VecDeque<Event>,
    #[serde(default)]
    pub likes: VecDeque<Event>,
    #[serde(default)]
    pub skips: VecDeque<Event>,
    #[serde(default)]
    pub searches: VecDeque<Event>,
    #[serde(default)]
    pub session_start: i64,
}

impl EventLog {
    pub fn new(session_start: i64) -> Self {
        Self {
            plays: VecDeque::new(),
            likes: VecDeque::new(),
            skips: VecDeque::new(),
            searches: VecDeque::new(),
            session_start,
        }
    }

    /// Append to the sequence matching the event kind and evict past its cap.
    pub fn push(&mut self, event: Event) {
        let (sequence, cap) = match event.kind() {
            EventKind::Play => (&mut self.plays, PLAY_CAP),
            EventKind::Like => (&mut self.likes, LIKE_CAP),
            EventKind::Skip => (&mut self.skips, SKIP_CAP),
            EventKind::Search => (&mut self.searches, SEARCH_CAP),
        };
        sequence.push_back(event);
        while sequence.len() > cap {
            sequence.pop_front();
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
            && self.likes.is_empty()
            && self.skips.is_empty()
            && self.searches.is_empty()
    }

    /// Re-apply the caps to a log read back from storage, which may have
    /// been written by an older build with larger limits.
    pub fn enforce_caps(&mut self) {
        for (sequence, cap) in [
            (&mut self.plays, PLAY_CAP),
            (&mut self.likes, LIKE_CAP),
            (&mut self.skips, SKIP_CAP),
            (&mut self.searches, SEARCH_CAP),
        ] {
            let excess = sequence.len().saturating_sub(cap);
            sequence.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 6, hour, 30, 0).unwrap()
    }

    #[test]
    fn test_time_of_day_boundaries() {
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(11), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(18), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Evening);
    }

    #[test]
    fn test_play_captures_slot_at_tracking_time() {
        let track = TrackRef::new("1", "Song", "Artist");
        let event = Event::play(&track, 1000, at(5));

        assert_eq!(event.kind(), EventKind::Play);
        assert_eq!(event.time_of_day(), TimeOfDay::Night);
        // 2024-03-06 is a Wednesday.
        assert_eq!(event.day_of_week(), 3);
    }

    #[test]
    fn test_play_cap_evicts_oldest_first() {
        let mut log = EventLog::new(0);
        for i in 0..(PLAY_CAP + 25) {
            let track = TrackRef::new(i.to_string(), "t", "a");
            log.push(Event::play(&track, 0, at(10)));
        }

        assert_eq!(log.plays.len(), PLAY_CAP);
        assert_eq!(log.plays.front().unwrap().track.id, "25");
        assert_eq!(log.plays.back().unwrap().track.id, (PLAY_CAP + 24).to_string());
    }

    #[test]
    fn test_sequences_are_independent() {
        let mut log = EventLog::new(0);
        let track = TrackRef::new("1", "Song", "Artist");
        for _ in 0..(LIKE_CAP + 3) {
            log.push(Event::like(&track, at(9)));
        }
        log.push(Event::skip(&track, 5000, at(9)));

        assert_eq!(log.likes.len(), LIKE_CAP);
        assert_eq!(log.skips.len(), 1);
        assert!(log.plays.is_empty());
    }

    #[test]
    fn test_search_event_lowercases_and_keeps_top_three() {
        let results: Vec<CandidateTrack> = (0..5)
            .map(|i| CandidateTrack::new(format!("v{i}"), format!("Title {i}"), "Channel"))
            .collect();
        let event = Event::search("Daft PUNK", &results, at(20));

        match event.payload {
            EventPayload::Search {
                query,
                result_count,
                top_results,
            } => {
                assert_eq!(query, "daft punk");
                assert_eq!(result_count, 5);
                assert_eq!(top_results.len(), SEARCH_TOP_RESULTS);
                assert_eq!(top_results[0].id, "v0");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_serialized_shape() {
        let mut log = EventLog::new(42);
        log.push(Event::play(&TrackRef::new("p", "Song", "Artist"), 1200, at(14)));
        log.push(Event::like(&TrackRef::new("l", "Song", "Artist"), at(14)));

        let value = serde_json::to_value(&log).unwrap();

        assert_eq!(value["sessionStart"], 42);
        assert_eq!(value["plays"][0]["kind"], "play");
        assert_eq!(value["plays"][0]["id"], "p");
        assert_eq!(value["plays"][0]["timeOfDay"], "afternoon");
        assert_eq!(value["plays"][0]["source"], "home");
        assert_eq!(value["likes"][0]["kind"], "like");
        assert!(value["skips"].as_array().unwrap().is_empty());
        assert!(value["searches"].as_array().unwrap().is_empty());

        let restored: EventLog = serde_json::from_value(value).unwrap();
        assert_eq!(restored, log);
    }

    #[test]
    fn test_search_event_has_no_track_fields() {
        let results = [CandidateTrack::new("v1", "Title", "Channel")];
        let event = Event::search("lofi", &results, at(20));

        let value = serde_json::to_value(&event).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(value["kind"], "search");
        assert_eq!(value["topResults"][0]["id"], "v1");
        for key in ["id", "title", "artist", "thumbnail"] {
            assert!(!object.contains_key(key), "unexpected `{key}`");
        }

        let restored: Event = serde_json::from_value(value).unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn test_legacy_record_without_slot() {
        let json = r#"{
            "plays": [{"id":"x","title":"t","artist":"a","timestamp":0,"kind":"play","duration":3}],
            "sessionStart": 1
        }"#;
        let log: EventLog = serde_json::from_str(json).unwrap();
        let play = &log.plays[0];

        assert_eq!(play.kind(), EventKind::Play);
        assert!(play.day_of_week() < 7);
        assert!(log.likes.is_empty());
    }

    #[test]
    fn test_enforce_caps_trims_front() {
        let mut log = EventLog::new(0);
        let track = TrackRef::new("1", "t", "a");
        for _ in 0..(SEARCH_CAP + 10) {
            log.searches.push_back(Event::search("q", &[], at(1)));
        }
        log.plays.push_back(Event::play(&track, 0, at(1)));

        log.enforce_caps();

        assert_eq!(log.searches.len(), SEARCH_CAP);
        assert_eq!(log.plays.len(), 1);
    }
}
