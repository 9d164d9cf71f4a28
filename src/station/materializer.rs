use crate::models::CandidateTrack;
use crate::spotify::{Catalog, CatalogTrack};
use crate::station::banlist::BanList;
use log::{debug, warn};
use std::collections::HashSet;

const SEARCH_LIMIT: u32 = 5;

/// A candidate matched to a catalog entry, ready to be written.
#[derive(Debug, Clone)]
pub struct ResolvedTrack {
    pub uri: String,
    pub title: String,
    pub artist: String,
    pub artist_id: Option<String>,
}

/// What happened to each candidate during resolution.
#[derive(Debug, Default)]
pub struct MaterializeOutcome {
    pub resolved: Vec<ResolvedTrack>,
    pub not_found: usize,
    pub duplicates: usize,
    pub genre_blocked: usize,
}

/// Resolves composed tracks against the streaming catalog.
pub struct Materializer<'a> {
    catalog: &'a dyn Catalog,
    banned: &'a BanList,
}

impl<'a> Materializer<'a> {
    pub fn new(catalog: &'a dyn Catalog, banned: &'a BanList) -> Self {
        Materializer { catalog, banned }
    }

    /// Resolve every candidate in order, dropping tracks the catalog cannot
    /// find, repeats of an already-resolved URI or artist, and artists whose
    /// catalog genres are banned.
    pub fn resolve_all(&self, tracks: &[CandidateTrack]) -> MaterializeOutcome {
        let mut outcome = MaterializeOutcome::default();
        let mut seen_uris: HashSet<String> = HashSet::new();
        let mut seen_artists: HashSet<String> = HashSet::new();

        for candidate in tracks {
            let Some(resolved) = self.resolve_track(&candidate.track.title, &candidate.track.artist)
            else {
                warn!("No catalog match for {}", candidate.track);
                outcome.not_found += 1;
                continue;
            };

            if !seen_uris.insert(resolved.uri.clone()) {
                outcome.duplicates += 1;
                continue;
            }
            let artist_key = resolved.artist.to_lowercase();
            if !artist_key.is_empty() && !seen_artists.insert(artist_key) {
                debug!("Dropping {} as a second track for its artist", resolved.uri);
                outcome.duplicates += 1;
                continue;
            }

            if self.genre_blocked(&resolved) {
                debug!("Dropping {} - {} for a banned genre", resolved.artist, resolved.title);
                outcome.genre_blocked += 1;
                continue;
            }

            outcome.resolved.push(resolved);
        }

        outcome
    }

    /// Search the catalog for a track, trying progressively looser queries.
    /// A result whose artist matches wins immediately; failing that, the
    /// loosest query's first hit is kept as a fallback.
    fn resolve_track(&self, title: &str, artist: &str) -> Option<ResolvedTrack> {
        let queries = [
            format!("track:{} artist:{}", title, artist),
            format!("{} {}", title, artist),
            format!("{} {}", artist, title),
            title.to_string(),
        ];
        let last = queries.len() - 1;

        let mut fallback: Option<ResolvedTrack> = None;
        for (i, query) in queries.iter().enumerate() {
            let results = match self.catalog.search_tracks(query, SEARCH_LIMIT) {
                Ok(results) => results,
                Err(e) => {
                    debug!("Catalog search '{}' failed: {}", query, e);
                    continue;
                }
            };

            for result in &results {
                if artist_matches(result, artist) {
                    return Some(to_resolved(result));
                }
            }
            if i == last {
                fallback = results.first().map(to_resolved);
            }
        }

        fallback
    }

    fn genre_blocked(&self, resolved: &ResolvedTrack) -> bool {
        if !self.banned.has_genre_bans() {
            return false;
        }
        let Some(artist_id) = resolved.artist_id.as_deref() else {
            return false;
        };
        match self.catalog.artist_genres(artist_id) {
            Ok(genres) => genres.iter().any(|g| self.banned.is_genre_banned(g)),
            Err(e) => {
                debug!("Genre lookup for {} failed: {}", resolved.artist, e);
                false
            }
        }
    }
}

fn artist_matches(result: &CatalogTrack, wanted: &str) -> bool {
    let wanted = wanted.to_lowercase();
    result.artists.iter().any(|a| {
        let got = a.name.to_lowercase();
        !got.is_empty() && (got == wanted || got.contains(&wanted) || wanted.contains(&got))
    })
}

fn to_resolved(result: &CatalogTrack) -> ResolvedTrack {
    let artist = result.artists.first();
    ResolvedTrack {
        uri: result.uri.clone(),
        title: result.name.clone(),
        artist: artist.map(|a| a.name.clone()).unwrap_or_default(),
        artist_id: artist.and_then(|a| a.id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Provenance, Track};
    use crate::spotify::{CatalogArtist, MockCatalog};

    fn candidate(title: &str, artist: &str) -> CandidateTrack {
        CandidateTrack::new(Track::new(title, artist), Provenance::Favorite)
    }

    fn hit(uri: &str, name: &str, artist: &str) -> CatalogTrack {
        CatalogTrack {
            uri: uri.to_string(),
            name: name.to_string(),
            artists: vec![CatalogArtist {
                id: Some(format!("id-{}", artist.to_lowercase())),
                name: artist.to_string(),
            }],
        }
    }

    #[test]
    fn test_field_query_match_wins() {
        let mut catalog = MockCatalog::new();
        catalog.expect_search_tracks().returning(|query, _| {
            if query.starts_with("track:") {
                Ok(vec![hit("spotify:track:1", "Karma Police", "Radiohead")])
            } else {
                Ok(Vec::new())
            }
        });

        let banned = BanList::default();
        let materializer = Materializer::new(&catalog, &banned);
        let outcome = materializer.resolve_all(&[candidate("Karma Police", "Radiohead")]);

        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(outcome.resolved[0].uri, "spotify:track:1");
        assert_eq!(outcome.not_found, 0);
    }

    #[test]
    fn test_substring_artist_names_match() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_search_tracks()
            .returning(|_, _| Ok(vec![hit("spotify:track:2", "Yesterday", "The Beatles")]));

        let banned = BanList::default();
        let materializer = Materializer::new(&catalog, &banned);
        let outcome = materializer.resolve_all(&[candidate("Yesterday", "Beatles")]);

        assert_eq!(outcome.resolved.len(), 1);
    }

    #[test]
    fn test_title_only_fallback_is_kept() {
        let mut catalog = MockCatalog::new();
        catalog.expect_search_tracks().returning(|query, _| {
            // No query ever matches the wanted artist; only the loosest
            // title-only search returns anything.
            if query == "Hurt" {
                Ok(vec![hit("spotify:track:3", "Hurt", "Nine Inch Nails")])
            } else {
                Ok(Vec::new())
            }
        });

        let banned = BanList::default();
        let materializer = Materializer::new(&catalog, &banned);
        let outcome = materializer.resolve_all(&[candidate("Hurt", "Johnny Cash")]);

        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(outcome.resolved[0].artist, "Nine Inch Nails");
    }

    #[test]
    fn test_unresolvable_tracks_are_counted() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_search_tracks()
            .returning(|_, _| Ok(Vec::new()));

        let banned = BanList::default();
        let materializer = Materializer::new(&catalog, &banned);
        let outcome = materializer.resolve_all(&[candidate("Ghost Song", "Nobody")]);

        assert!(outcome.resolved.is_empty());
        assert_eq!(outcome.not_found, 1);
    }

    #[test]
    fn test_repeat_uris_and_artists_are_dropped() {
        let mut catalog = MockCatalog::new();
        catalog.expect_search_tracks().returning(|query, _| {
            if query.contains("Creep") {
                Ok(vec![hit("spotify:track:4", "Creep", "Radiohead")])
            } else {
                Ok(vec![hit("spotify:track:5", "No Surprises", "Radiohead")])
            }
        });

        let banned = BanList::default();
        let materializer = Materializer::new(&catalog, &banned);
        let outcome = materializer.resolve_all(&[
            candidate("Creep", "Radiohead"),
            candidate("Creep", "Radiohead"),
            candidate("No Surprises", "Radiohead"),
        ]);

        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(outcome.duplicates, 2);
    }

    #[test]
    fn test_banned_catalog_genres_block_tracks() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_search_tracks()
            .returning(|_, _| Ok(vec![hit("spotify:track:6", "Louder", "Loud Band")]));
        catalog
            .expect_artist_genres()
            .returning(|_| Ok(vec!["speed metal".to_string()]));

        let banned = BanList::parse("genre:metal\n");
        let materializer = Materializer::new(&catalog, &banned);
        let outcome = materializer.resolve_all(&[candidate("Louder", "Loud Band")]);

        assert!(outcome.resolved.is_empty());
        assert_eq!(outcome.genre_blocked, 1);
    }
}
