use crate::models::Track;

/// Track suitability checks using static helper functions
pub struct TrackFilters;

impl TrackFilters {
    /// Check if a track belongs on a station at all (not a live cut, demo,
    /// compilation filler, or seasonal/low-quality entry).
    pub fn is_suitable(track: &Track) -> bool {
        let title = track.title.to_lowercase();
        let artist = track.artist.to_lowercase();

        // Compilation placeholder artists
        if artist == "va" || artist == "various artists" {
            return false;
        }

        // Corrupted or placeholder metadata
        let title_len = title.chars().count();
        if title_len < 2 || title_len > 100 {
            return false;
        }

        let phrase_markers = [
            // Live-performance markers
            "live at",
            "live from",
            "live in",
            "live on",
            "(live",
            "- live",
            "acoustic version",
            "(acoustic",
            // Demos, rehearsals, and spoken content
            "(demo",
            "rehearsal",
            "interview",
            "spoken word",
            // Seasonal and low-quality markers
            "christmas",
            "xmas",
            "ai generated",
            "ai music",
            "cover version",
            "tribute",
            "karaoke",
        ];

        // Short markers that also appear inside ordinary words, matched as
        // whole words only so "Alive" or "Demolition" still pass
        let word_markers = ["live", "demo", "concert"];

        let has_phrase_marker = phrase_markers
            .iter()
            .any(|marker| title.contains(marker) || artist.contains(marker));

        let has_word_marker = word_markers.iter().any(|marker| {
            Self::contains_word(&title, marker) || Self::contains_word(&artist, marker)
        });

        !has_phrase_marker && !has_word_marker
    }

    /// Whole-word occurrence: standalone, at either end, or space-delimited.
    fn contains_word(text: &str, word: &str) -> bool {
        text == word
            || text.starts_with(&format!("{word} "))
            || text.ends_with(&format!(" {word}"))
            || text.contains(&format!(" {word} "))
            || text.split_whitespace().any(|w| w == word)
            || text.starts_with(&format!("{word}:"))
    }
}
