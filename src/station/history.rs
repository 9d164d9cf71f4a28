use crate::models::Track;
use crate::station::banlist::BanList;
use anyhow::Result;
use chrono::{DateTime, Utc};
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A track suggested this many times within the overplay window is excluded.
const OVERPLAY_TIMES: u32 = 5;
const OVERPLAY_WINDOW_DAYS: i64 = 120;

/// Tracks never reappear sooner than this.
const MIN_SPACING_DAYS: i64 = 3;

/// When and how often a track has been put on the playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackHistoryEntry {
    pub first_suggested: DateTime<Utc>,
    pub last_suggested: DateTime<Utc>,
    pub times_suggested: u32,
}

/// Every track ever suggested, keyed by `Track::key()`. Entries are never
/// evicted, so the cooldown check always sees the full history.
#[derive(Debug)]
pub struct PlaylistHistory {
    path: PathBuf,
    tracks: HashMap<String, TrackHistoryEntry>,
}

#[derive(Deserialize)]
struct StoredHistory {
    #[serde(default)]
    track_history: HashMap<String, TrackHistoryEntry>,
}

#[derive(Serialize)]
struct StoredHistoryRef<'a> {
    track_history: &'a HashMap<String, TrackHistoryEntry>,
}

impl PlaylistHistory {
    /// Load from disk. A missing file is a first run; a corrupt file is
    /// replaced with an empty history rather than aborting.
    pub fn load(path: &Path) -> Self {
        let tracks = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<StoredHistory>(&contents) {
                Ok(stored) => stored.track_history,
                Err(e) => {
                    warn!(
                        "History file {} is unreadable ({}), starting fresh",
                        path.display(),
                        e
                    );
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        PlaylistHistory {
            path: path.to_path_buf(),
            tracks,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn entry(&self, track: &Track) -> Option<&TrackHistoryEntry> {
        self.tracks.get(&track.key())
    }

    /// Whether suggesting this track again now would be too soon.
    ///
    /// The probabilistic bands draw fresh randomness on every call, so the
    /// same track can flip between checks within one run. That noise is part
    /// of the variety the tool aims for.
    pub fn is_in_cooldown(&self, track: &Track) -> bool {
        let Some(entry) = self.tracks.get(&track.key()) else {
            return false;
        };

        let days_since = Utc::now()
            .signed_duration_since(entry.last_suggested)
            .num_days();

        if entry.times_suggested >= OVERPLAY_TIMES && days_since < OVERPLAY_WINDOW_DAYS {
            return true;
        }
        if days_since < MIN_SPACING_DAYS {
            return true;
        }

        let chance = cooldown_chance(days_since);
        if chance <= 0.0 {
            return false;
        }
        rand::thread_rng().gen_bool(chance)
    }

    /// Record one run's selection, skipping banned tracks. Known tracks get
    /// bumped, new ones start at one suggestion.
    pub fn record_suggestions(&mut self, tracks: &[Track], banned: &BanList) {
        let now = Utc::now();
        for track in tracks {
            if banned.is_banned(&track.title, &track.artist, None, &[]) {
                continue;
            }
            self.tracks
                .entry(track.key())
                .and_modify(|entry| {
                    entry.times_suggested += 1;
                    entry.last_suggested = now;
                })
                .or_insert_with(|| TrackHistoryEntry {
                    first_suggested: now,
                    last_suggested: now,
                    times_suggested: 1,
                });
        }
    }

    /// Persist the whole store: write a sibling temp file, then rename it
    /// over the target so a crash cannot leave a half-written history.
    pub fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&StoredHistoryRef {
            track_history: &self.tracks,
        })?;

        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| anyhow::anyhow!("Failed to create temp history file: {}", e))?;
        tmp.write_all(contents.as_bytes())?;
        tmp.persist(&self.path)
            .map_err(|e| anyhow::anyhow!("Failed to replace history file: {}", e))?;

        Ok(())
    }
}

/// Probability that a track this many days after its last suggestion is
/// still cooling down. Zero from ninety days out.
pub fn cooldown_chance(days_since: i64) -> f64 {
    if days_since < 14 {
        0.5
    } else if days_since < 30 {
        0.7
    } else if days_since < 90 {
        0.9
    } else {
        0.0
    }
}
