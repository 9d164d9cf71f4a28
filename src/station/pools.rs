use crate::lastfm::MusicSource;
use crate::models::{CandidateTrack, LovedTrack, Provenance};
use crate::oracle::{Recommender, parse_artist_suggestions};
use crate::station::banlist::BanList;
use crate::station::filters::TrackFilters;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};

/// Artists below this global listener count are skipped as too obscure to
/// resolve reliably on the streaming side.
const MIN_ARTIST_LISTENERS: u64 = 10_000;

/// Cap per artist within a single pool.
const MAX_TRACKS_PER_ARTIST: usize = 2;

/// Pools are built this many times larger than their mix quota so the
/// composer can skip cooled-down and clashing tracks without running dry.
pub const POOL_OVERFETCH: usize = 2;

const SIMILAR_SEED_ARTISTS: usize = 5;
const SIMILAR_PER_SEED: u32 = 10;
const TOP_TRACKS_PER_ARTIST: u32 = 5;
const GENRE_TAG_LIMIT: u32 = 5;
const TASTE_LOVED_SAMPLE: usize = 30;
const TASTE_RECENT_SAMPLE: u32 = 15;

/// The top-played share of the favorites list, and how much of the pool is
/// drawn from it before the rest gets a turn.
const TOP_SEGMENT_PERCENT: usize = 70;
const TOP_DRAW_PERCENT: usize = 70;

/// Build the favorites pool from the user's loved tracks.
///
/// When playcounts are known, picks lean toward heavy rotation: roughly 70%
/// of the pool comes from the most-played 70% of the list, the remainder
/// from the long tail, both segments shuffled. Without playcounts the whole
/// list is drawn from uniformly.
pub fn build_favorites_pool(
    loved: &[LovedTrack],
    banned: &BanList,
    target: usize,
) -> Vec<CandidateTrack> {
    let mut rng = rand::thread_rng();

    let mut eligible: Vec<&LovedTrack> = loved
        .iter()
        .filter(|lt| TrackFilters::is_suitable(&lt.track))
        .filter(|lt| !banned.is_banned(&lt.track.title, &lt.track.artist, None, &[]))
        .collect();

    let have_playcounts = eligible.iter().any(|lt| lt.playcount.is_some());
    let ordered: Vec<&LovedTrack> = if have_playcounts {
        eligible.sort_by(|a, b| b.playcount.unwrap_or(0).cmp(&a.playcount.unwrap_or(0)));
        let split = eligible.len() * TOP_SEGMENT_PERCENT / 100;
        let (top_slice, rest_slice) = eligible.split_at(split);
        let mut top = top_slice.to_vec();
        let mut rest = rest_slice.to_vec();
        top.shuffle(&mut rng);
        rest.shuffle(&mut rng);

        let top_share = target * TOP_DRAW_PERCENT / 100;
        let top_quota = top_share.min(top.len());
        let rest_quota = (target - top_share).min(rest.len());

        top[..top_quota]
            .iter()
            .chain(rest[..rest_quota].iter())
            .chain(top[top_quota..].iter())
            .chain(rest[rest_quota..].iter())
            .copied()
            .collect()
    } else {
        eligible.shuffle(&mut rng);
        eligible
    };

    let mut pool = Vec::new();
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut artist_counts: HashMap<String, usize> = HashMap::new();

    for lt in ordered {
        if pool.len() >= target {
            break;
        }
        if !seen_keys.insert(lt.track.key()) {
            continue;
        }
        let count = artist_counts.entry(lt.track.artist_key()).or_insert(0);
        if *count >= MAX_TRACKS_PER_ARTIST {
            continue;
        }
        *count += 1;
        pool.push(CandidateTrack::with_playcount(
            lt.track.clone(),
            Provenance::Favorite,
            lt.playcount,
        ));
    }

    pool
}

/// Build the AI discovery pool: summarize the user's taste, ask the oracle
/// for artists, then expand each into its top tracks. Any failure along the
/// way degrades to an empty pool; the run continues without AI picks.
pub fn build_ai_pool(
    oracle: Option<&dyn Recommender>,
    source: &dyn MusicSource,
    loved: &[LovedTrack],
    banned: &BanList,
    target: usize,
) -> Vec<CandidateTrack> {
    let Some(oracle) = oracle else {
        debug!("No AI provider configured, skipping AI discovery pool");
        return Vec::new();
    };

    let summary = build_taste_summary(source, loved);
    let raw = match oracle.recommend(&summary) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("AI recommendation request failed: {}", e);
            return Vec::new();
        }
    };

    let suggestions = parse_artist_suggestions(&raw);
    if suggestions.is_empty() {
        warn!("AI response contained no usable suggestions");
        return Vec::new();
    }

    for suggestion in &suggestions {
        if suggestion.artist_name().is_none() {
            if let Some(text) = suggestion
                .description
                .as_deref()
                .or(suggestion.reason.as_deref())
            {
                info!("AI direction: {}", text);
            }
        }
    }

    let artists: Vec<String> = suggestions
        .iter()
        .filter_map(|s| s.artist_name())
        .map(str::to_string)
        .collect();
    info!("AI suggested {} artists to explore", artists.len());

    expand_artists(source, &artists, banned, Provenance::AiDiscovery, target)
}

/// Build the similar-artist pool: sample a few loved artists as seeds, pull
/// the service's similar artists for each, and expand those into tracks.
pub fn build_similar_pool(
    source: &dyn MusicSource,
    loved: &[LovedTrack],
    banned: &BanList,
    target: usize,
) -> Vec<CandidateTrack> {
    let mut rng = rand::thread_rng();

    let mut seen_loved: HashSet<String> = HashSet::new();
    let mut loved_artists: Vec<&str> = Vec::new();
    for lt in loved {
        if seen_loved.insert(lt.track.artist_key()) {
            loved_artists.push(&lt.track.artist);
        }
    }

    let mut similar: Vec<String> = Vec::new();
    let mut seen_similar: HashSet<String> = HashSet::new();
    for seed in loved_artists.choose_multiple(&mut rng, SIMILAR_SEED_ARTISTS) {
        match source.similar_artists(seed, SIMILAR_PER_SEED) {
            Ok(names) => {
                for name in names {
                    if seen_similar.insert(name.to_lowercase()) {
                        similar.push(name);
                    }
                }
            }
            Err(e) => warn!("Similar artist lookup for {} failed: {}", seed, e),
        }
    }
    debug!("Collected {} similar artists from seeds", similar.len());

    similar.shuffle(&mut rng);
    expand_artists(source, &similar, banned, Provenance::LastfmDiscovery, target)
}

/// Turn a list of artist names into candidate tracks via each artist's top
/// tracks, skipping banned, too-obscure and banned-genre artists.
fn expand_artists(
    source: &dyn MusicSource,
    artists: &[String],
    banned: &BanList,
    provenance: Provenance,
    target: usize,
) -> Vec<CandidateTrack> {
    let mut pool = Vec::new();
    let mut seen_keys: HashSet<String> = HashSet::new();

    for artist in artists {
        if pool.len() >= target {
            break;
        }
        if banned.is_artist_banned(artist) {
            debug!("Skipping banned artist {}", artist);
            continue;
        }
        if !artist_passes_floor(source, artist) {
            continue;
        }

        let genres = if banned.has_genre_bans() {
            source
                .artist_top_tags(artist, GENRE_TAG_LIMIT)
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        if genres.iter().any(|g| banned.is_genre_banned(g)) {
            debug!("Skipping {} for a banned genre", artist);
            continue;
        }

        let top = match source.artist_top_tracks(artist, TOP_TRACKS_PER_ARTIST) {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("Top tracks lookup for {} failed: {}", artist, e);
                continue;
            }
        };

        let mut taken = 0;
        for track in top {
            if pool.len() >= target || taken >= MAX_TRACKS_PER_ARTIST {
                break;
            }
            if !TrackFilters::is_suitable(&track) {
                continue;
            }
            if banned.is_banned(&track.title, &track.artist, None, &genres) {
                continue;
            }
            if !seen_keys.insert(track.key()) {
                continue;
            }
            pool.push(CandidateTrack::new(track, provenance));
            taken += 1;
        }
    }

    pool
}

fn artist_passes_floor(source: &dyn MusicSource, artist: &str) -> bool {
    match source.artist_listeners(artist) {
        Ok(Some(listeners)) if listeners < MIN_ARTIST_LISTENERS => {
            debug!("Skipping {} with only {} listeners", artist, listeners);
            false
        }
        Ok(_) => true,
        Err(e) => {
            debug!("Listener lookup for {} failed ({}), keeping artist", artist, e);
            true
        }
    }
}

/// A plain-text sketch of the user's taste for the oracle prompt: a random
/// sample of loved tracks plus whatever was scrobbled most recently.
pub fn build_taste_summary(source: &dyn MusicSource, loved: &[LovedTrack]) -> String {
    let mut rng = rand::thread_rng();

    let mut summary = String::from("Tracks the listener loves:\n");
    for lt in loved.choose_multiple(&mut rng, TASTE_LOVED_SAMPLE) {
        summary.push_str(&format!("- {}\n", lt.track));
    }

    match source.recent_tracks(TASTE_RECENT_SAMPLE) {
        Ok(recent) if !recent.is_empty() => {
            summary.push_str("\nRecently played:\n");
            for track in recent {
                summary.push_str(&format!("- {}\n", track));
            }
        }
        Ok(_) => {}
        Err(e) => debug!("Recent tracks unavailable for taste summary: {}", e),
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lastfm::MockMusicSource;
    use crate::models::Track;
    use crate::oracle::MockRecommender;

    fn loved(title: &str, artist: &str) -> LovedTrack {
        LovedTrack {
            track: Track::new(title, artist),
            playcount: None,
        }
    }

    fn loved_with_count(title: &str, artist: &str, playcount: u32) -> LovedTrack {
        LovedTrack {
            track: Track::new(title, artist),
            playcount: Some(playcount),
        }
    }

    #[test]
    fn test_favorites_pool_hits_target_and_caps_artists() {
        let mut tracks: Vec<LovedTrack> = (0..10)
            .map(|i| loved(&format!("Song {}", i), &format!("Artist {}", i)))
            .collect();
        for i in 0..5 {
            tracks.push(loved(&format!("Extra {}", i), "Prolific"));
        }

        let pool = build_favorites_pool(&tracks, &BanList::default(), 8);
        assert_eq!(pool.len(), 8);

        let prolific = pool
            .iter()
            .filter(|c| c.track.artist == "Prolific")
            .count();
        assert!(prolific <= MAX_TRACKS_PER_ARTIST);
        assert!(pool.iter().all(|c| c.provenance == Provenance::Favorite));
    }

    #[test]
    fn test_favorites_pool_drops_banned_and_unsuitable() {
        let tracks = vec![
            loved("Keeper", "Good Artist"),
            loved("Song Live at Wembley", "Good Artist"),
            loved("Anything", "Bad Artist"),
        ];
        let banned = BanList::parse("artist:Bad Artist\n");

        let pool = build_favorites_pool(&tracks, &banned, 10);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].track.title, "Keeper");
    }

    #[test]
    fn test_favorites_pool_leans_on_heavy_rotation() {
        // Ten tracks split 7/3 at the playcount sort; a pool of three should
        // take two from the top segment and one from the tail.
        let mut tracks: Vec<LovedTrack> = (0..7)
            .map(|i| loved_with_count(&format!("Hit {}", i), &format!("Artist {}", i), 100 - i))
            .collect();
        for i in 0..3 {
            tracks.push(loved_with_count(
                &format!("Deep Cut {}", i),
                &format!("Tail Artist {}", i),
                3 - i,
            ));
        }

        let pool = build_favorites_pool(&tracks, &BanList::default(), 3);
        assert_eq!(pool.len(), 3);
        let from_top = pool
            .iter()
            .filter(|c| c.playcount.unwrap_or(0) >= 90)
            .count();
        let from_tail = pool
            .iter()
            .filter(|c| c.playcount.unwrap_or(0) <= 3)
            .count();
        assert_eq!(from_top, 2);
        assert_eq!(from_tail, 1);
    }

    #[test]
    fn test_ai_pool_is_empty_without_oracle() {
        let source = MockMusicSource::new();
        let pool = build_ai_pool(None, &source, &[], &BanList::default(), 10);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_ai_pool_survives_oracle_failure() {
        let mut source = MockMusicSource::new();
        source.expect_recent_tracks().returning(|_| Ok(Vec::new()));

        let mut oracle = MockRecommender::new();
        oracle
            .expect_recommend()
            .returning(|_| Err(anyhow::anyhow!("rate limited")));

        let pool = build_ai_pool(
            Some(&oracle),
            &source,
            &[loved("Song", "Artist")],
            &BanList::default(),
            10,
        );
        assert!(pool.is_empty());
    }

    #[test]
    fn test_ai_pool_expands_suggested_artists() {
        let mut source = MockMusicSource::new();
        source.expect_recent_tracks().returning(|_| Ok(Vec::new()));
        source
            .expect_artist_listeners()
            .returning(|_| Ok(Some(500_000)));
        source.expect_artist_top_tracks().returning(|artist, _| {
            Ok(vec![
                Track::new("First", artist),
                Track::new("Second", artist),
                Track::new("Third", artist),
            ])
        });

        let mut oracle = MockRecommender::new();
        oracle.expect_recommend().returning(|_| {
            Ok(r#"[{"type": "artist", "name": "Boards of Canada", "reason": "warm electronica"}]"#
                .to_string())
        });

        let pool = build_ai_pool(
            Some(&oracle),
            &source,
            &[loved("Song", "Artist")],
            &BanList::default(),
            10,
        );
        assert_eq!(pool.len(), MAX_TRACKS_PER_ARTIST);
        assert!(
            pool.iter()
                .all(|c| c.provenance == Provenance::AiDiscovery)
        );
        assert!(pool.iter().all(|c| c.track.artist == "Boards of Canada"));
    }

    #[test]
    fn test_similar_pool_expands_seed_neighbours() {
        let mut source = MockMusicSource::new();
        source
            .expect_similar_artists()
            .returning(|_, _| Ok(vec!["Neighbour".to_string()]));
        source
            .expect_artist_listeners()
            .returning(|_| Ok(Some(500_000)));
        source.expect_artist_top_tracks().returning(|artist, _| {
            Ok(vec![
                Track::new("Alpha", artist),
                Track::new("Beta", artist),
                Track::new("Gamma", artist),
            ])
        });

        let tracks = vec![loved("Song A", "Seed One"), loved("Song B", "Seed Two")];
        let pool = build_similar_pool(&source, &tracks, &BanList::default(), 10);

        // Both seeds name the same neighbour, which dedupes to one artist.
        assert_eq!(pool.len(), MAX_TRACKS_PER_ARTIST);
        assert!(
            pool.iter()
                .all(|c| c.provenance == Provenance::LastfmDiscovery)
        );
        assert!(pool.iter().all(|c| c.track.artist == "Neighbour"));
    }

    #[test]
    fn test_expand_artists_skips_obscure_artists() {
        let mut source = MockMusicSource::new();
        source.expect_artist_listeners().returning(|artist| {
            if artist == "Tiny" {
                Ok(Some(500))
            } else {
                Ok(Some(1_000_000))
            }
        });
        source
            .expect_artist_top_tracks()
            .returning(|artist, _| Ok(vec![Track::new("Song", artist)]));

        let artists = vec!["Tiny".to_string(), "Big".to_string()];
        let pool = expand_artists(
            &source,
            &artists,
            &BanList::default(),
            Provenance::LastfmDiscovery,
            10,
        );
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].track.artist, "Big");
    }

    #[test]
    fn test_expand_artists_drops_banned_genres() {
        let mut source = MockMusicSource::new();
        source
            .expect_artist_listeners()
            .returning(|_| Ok(Some(1_000_000)));
        source.expect_artist_top_tags().returning(|artist, _| {
            if artist == "Loud" {
                Ok(vec!["Metal".to_string(), "Rock".to_string()])
            } else {
                Ok(vec!["Folk".to_string()])
            }
        });
        source
            .expect_artist_top_tracks()
            .returning(|artist, _| Ok(vec![Track::new("Song", artist)]));

        let banned = BanList::parse("genre:metal\n");
        let artists = vec!["Loud".to_string(), "Quiet".to_string()];
        let pool = expand_artists(&source, &artists, &banned, Provenance::AiDiscovery, 10);

        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].track.artist, "Quiet");
    }

    #[test]
    fn test_taste_summary_mentions_loved_and_recent() {
        let mut source = MockMusicSource::new();
        source
            .expect_recent_tracks()
            .returning(|_| Ok(vec![Track::new("Fresh Spin", "Current Artist")]));

        let tracks = vec![loved("Old Favourite", "Beloved Artist")];
        let summary = build_taste_summary(&source, &tracks);

        assert!(summary.contains("Beloved Artist - Old Favourite"));
        assert!(summary.contains("Recently played:"));
        assert!(summary.contains("Current Artist - Fresh Spin"));
    }
}
