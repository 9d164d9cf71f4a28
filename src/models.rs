use std::fmt;

/// A track as this tool understands it: a title and an artist name.
///
/// Identity is the case-insensitive pair, rendered by `key()`. Tracks are
/// rebuilt on every fetch; nothing here owns remote state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Track {
    pub title: String,
    pub artist: String,
}

impl Track {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Track {
            title: title.into(),
            artist: artist.into(),
        }
    }

    /// Canonical identity key, also used as the history store's map key.
    pub fn key(&self) -> String {
        format!(
            "{} - {}",
            self.artist.to_lowercase(),
            self.title.to_lowercase()
        )
    }

    /// Lowercased artist name, for per-artist bookkeeping.
    pub fn artist_key(&self) -> String {
        self.artist.to_lowercase()
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// Which gathering strategy produced a candidate, for quota accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    Favorite,
    AiDiscovery,
    LastfmDiscovery,
    Discovery,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Favorite => "favorite",
            Provenance::AiDiscovery => "ai discovery",
            Provenance::LastfmDiscovery => "lastfm discovery",
            Provenance::Discovery => "discovery",
        }
    }
}

/// A track plus the strategy that surfaced it and, when known, how often the
/// user has played it. Lives only for the duration of one composition pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTrack {
    pub track: Track,
    pub provenance: Provenance,
    pub playcount: Option<u32>,
}

impl CandidateTrack {
    pub fn new(track: Track, provenance: Provenance) -> Self {
        CandidateTrack {
            track,
            provenance,
            playcount: None,
        }
    }

    pub fn with_playcount(track: Track, provenance: Provenance, playcount: Option<u32>) -> Self {
        CandidateTrack {
            track,
            provenance,
            playcount,
        }
    }
}

/// A loved track as fetched from the scrobbling service, with the user's
/// overall playcount overlaid when the charts know it.
#[derive(Debug, Clone, PartialEq)]
pub struct LovedTrack {
    pub track: Track,
    pub playcount: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_key_is_case_insensitive() {
        let a = Track::new("Yesterday", "The Beatles");
        let b = Track::new("YESTERDAY", "the beatles");
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), "the beatles - yesterday");
    }

    #[test]
    fn test_tracks_with_same_title_but_different_artist_differ() {
        let a = Track::new("Hurt", "Nine Inch Nails");
        let b = Track::new("Hurt", "Johnny Cash");
        assert_ne!(a.key(), b.key());
    }
}
