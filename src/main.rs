use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, info, warn};

mod config;
mod lastfm;
mod models;
mod oracle;
mod spotify;
mod station;


use crate::config::load_config;
use crate::lastfm::{LastfmClient, MusicSource};
use crate::models::{Provenance, Track};
use crate::oracle::{OracleClient, Recommender};
use crate::spotify::{PlaylistWriter, SpotifyClient, set_playlist_tracks};
use crate::station::pools::{self, POOL_OVERFETCH};
use crate::station::{BanList, Materializer, MixPolicy, MixPools, PlaylistHistory, compose_mix, mix_order};

#[derive(Parser)]
#[command(name = "station-builder")]
#[command(about = "Builds a personalized Spotify station from Last.fm loved tracks")]
#[command(version)]
struct Args {
    /// Spotify playlist ID to write to, overriding SPOTIFY_PLAYLIST_ID
    #[arg(short = 'p', long = "playlist")]
    playlist: Option<String>,

    /// Compose and print the station instead of writing it to Spotify
    #[arg(short = 'd', long = "dry-run")]
    dry_run: bool,

    /// Quiet mode - reduce output verbosity
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.quiet {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let config = load_config()?;
    let station = config.station;

    // Connect to both services up front; neither failure is recoverable
    let lastfm = LastfmClient::new(config.lastfm);
    println!("Authenticating with Last.fm...");
    match lastfm.authenticate() {
        Ok(user) => println!("✓ Authenticated as {user}"),
        Err(e) => {
            eprintln!("✗ Last.fm authentication failed: {e}");
            return Err(e);
        }
    }

    let spotify = match SpotifyClient::connect(&config.spotify) {
        Ok(client) => {
            println!("✓ Spotify access token refreshed");
            client
        }
        Err(e) => {
            eprintln!("✗ Spotify authentication failed: {e}");
            return Err(e);
        }
    };

    let banned = BanList::load(&station.banned_path);
    info!("Loaded {} ban entries", banned.entry_count());
    let mut history = PlaylistHistory::load(&station.history_path);
    info!("History covers {} tracks", history.len());

    println!("\nFetching loved tracks...");
    let loved = lastfm.loved_tracks()?;
    println!("Fetched {} loved tracks", loved.len());
    if loved.len() < station.track_count {
        warn!(
            "Only {} loved tracks for a {}-track station; discovery pools carry the rest",
            loved.len(),
            station.track_count
        );
    }

    let oracle = OracleClient::from_provider(station.ai_provider, station.ai_api_key.as_deref());

    let policy = MixPolicy::default();
    let (favorites_quota, ai_quota, similar_quota) = policy.quotas(station.track_count);

    println!("\nGathering candidates...");
    let candidate_pools = MixPools {
        favorites: pools::build_favorites_pool(&loved, &banned, favorites_quota * POOL_OVERFETCH),
        ai: pools::build_ai_pool(
            oracle.as_ref().map(|o| o as &dyn Recommender),
            &lastfm,
            &loved,
            &banned,
            ai_quota * POOL_OVERFETCH,
        ),
        similar: pools::build_similar_pool(
            &lastfm,
            &loved,
            &banned,
            similar_quota * POOL_OVERFETCH,
        ),
    };
    println!(
        "Pools hold {} candidates ({} favorites, {} AI, {} similar)",
        candidate_pools.total_len(),
        candidate_pools.favorites.len(),
        candidate_pools.ai.len(),
        candidate_pools.similar.len()
    );

    let mix = compose_mix(
        &candidate_pools,
        station.track_count,
        &policy,
        &history,
        &banned,
    );
    let mix = mix_order(mix, station.randomness_factor);
    if mix.is_empty() {
        return Err(anyhow::anyhow!(
            "No tracks could be gathered; check the ban list and history file"
        ));
    }

    let by_provenance = |p: Provenance| mix.iter().filter(|c| c.provenance == p).count();

    if args.dry_run {
        println!("\nDRY RUN: the station would contain {} tracks:", mix.len());
        for (i, candidate) in mix.iter().enumerate() {
            println!(
                "  {}. {} [{}]",
                i + 1,
                candidate.track,
                candidate.provenance.as_str()
            );
        }
        println!(
            "\nFavorites: {} | AI: {} | Similar: {} | Backfill: {}",
            by_provenance(Provenance::Favorite),
            by_provenance(Provenance::AiDiscovery),
            by_provenance(Provenance::LastfmDiscovery),
            by_provenance(Provenance::Discovery)
        );
        println!("Nothing was written to Spotify and no history was recorded.");
        return Ok(());
    }

    let playlist_id = args
        .playlist
        .as_deref()
        .unwrap_or(&config.spotify.playlist_id);

    match spotify.playlist_track_total(playlist_id) {
        Ok(total) => info!("Replacing {} tracks currently on the playlist", total),
        Err(e) => warn!("Could not read the current playlist size: {}", e),
    }

    println!("\nResolving tracks against the Spotify catalog...");
    let materializer = Materializer::new(&spotify, &banned);
    let outcome = materializer.resolve_all(&mix);
    let uris: Vec<String> = outcome.resolved.iter().map(|t| t.uri.clone()).collect();
    println!("Resolved {} of {} tracks", uris.len(), mix.len());

    let write_ok = publish_station(&spotify, playlist_id, &uris);

    let suggested: Vec<Track> = mix.iter().map(|c| c.track.clone()).collect();
    history.record_suggestions(&suggested, &banned);
    if let Err(e) = history.save() {
        warn!("Could not save the history file: {}", e);
    }

    println!("\n=== STATION SUMMARY ===");
    if write_ok {
        println!("✓ Wrote {} tracks to playlist {playlist_id}", uris.len());
    } else {
        println!(
            "✗ Playlist write failed after resolving {} tracks; the selection is kept in history",
            uris.len()
        );
    }
    println!(
        "   Favorites: {} | AI: {} | Similar: {} | Backfill: {}",
        by_provenance(Provenance::Favorite),
        by_provenance(Provenance::AiDiscovery),
        by_provenance(Provenance::LastfmDiscovery),
        by_provenance(Provenance::Discovery)
    );
    if outcome.not_found + outcome.duplicates + outcome.genre_blocked > 0 {
        println!(
            "   Dropped in resolution: {} not found, {} duplicates, {} genre-blocked",
            outcome.not_found, outcome.duplicates, outcome.genre_blocked
        );
    }
    println!("   History now covers {} tracks", history.len());
    println!("\n🎵 https://open.spotify.com/playlist/{playlist_id}");

    Ok(())
}

/// Push the resolved URIs to the playlist. A failure here is a degraded run,
/// not an abort: the first batch may already have replaced the playlist, and
/// the selection was made either way, so the caller still records history and
/// exits zero.
fn publish_station(writer: &dyn PlaylistWriter, playlist_id: &str, uris: &[String]) -> bool {
    match set_playlist_tracks(writer, playlist_id, uris) {
        Ok(()) => true,
        Err(e) => {
            warn!("Playlist write failed: {}", e);
            false
        }
    }
}
