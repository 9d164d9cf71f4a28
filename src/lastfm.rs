use crate::config::LastfmConfig;
use crate::models::{LovedTrack, Track};
use anyhow::Result;
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use ureq::Agent;
use urlencoding::encode;

#[cfg(test)]
use mockall::automock;

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";

/// Loved tracks are paged at the API maximum.
const LOVED_PAGE_SIZE: u32 = 1000;

/// How much of the user's overall chart to join against for playcounts.
const CHART_LIMIT: u32 = 1000;

/// The slice of the scrobbling service the selection engine consumes.
#[cfg_attr(test, automock)]
pub trait MusicSource {
    /// Every track the user has loved, with overall playcounts where known.
    fn loved_tracks(&self) -> Result<Vec<LovedTrack>>;
    /// Most recently scrobbled tracks, newest first.
    fn recent_tracks(&self, limit: u32) -> Result<Vec<Track>>;
    /// Artists similar to the given one, best match first.
    fn similar_artists(&self, artist: &str, limit: u32) -> Result<Vec<String>>;
    /// Globally most-played tracks for an artist.
    fn artist_top_tracks(&self, artist: &str, limit: u32) -> Result<Vec<Track>>;
    /// Most-applied tags for an artist (genre-ish strings).
    fn artist_top_tags(&self, artist: &str, limit: u32) -> Result<Vec<String>>;
    /// Global listener count, when the service reports one.
    fn artist_listeners(&self, artist: &str) -> Result<Option<u64>>;
}

/// A Last.fm API client using session authentication with an MD5 signature
pub struct LastfmClient {
    agent: Agent,
    api_key: String,
    api_secret: String,
    username: String,
    password: String,
}

impl LastfmClient {
    pub fn new(config: LastfmConfig) -> Self {
        LastfmClient {
            agent: Agent::new(),
            api_key: config.api_key,
            api_secret: config.api_secret,
            username: config.username,
            password: config.password,
        }
    }

    /// Validate the configured credentials by opening a mobile session.
    /// Returns the session's account name on success.
    pub fn authenticate(&self) -> Result<String> {
        let api_sig = self.sign(&[
            ("api_key", self.api_key.as_str()),
            ("method", "auth.getMobileSession"),
            ("password", self.password.as_str()),
            ("username", self.username.as_str()),
        ]);

        let response = self
            .agent
            .post(LASTFM_API_BASE)
            .send_form(&[
                ("method", "auth.getMobileSession"),
                ("api_key", self.api_key.as_str()),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("api_sig", api_sig.as_str()),
                ("format", "json"),
            ])
            .map_err(|e| anyhow::anyhow!("Last.fm authentication failed: {}", e))?;

        let body = response.into_string()?;
        check_api_error(&body)?;

        let parsed: SessionResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse Last.fm session response: {}", e))?;

        Ok(parsed.session.name)
    }

    /// Signature for authenticated calls: md5 over the name-sorted parameter
    /// pairs concatenated, with the shared secret appended. The `format`
    /// parameter is excluded per the API rules.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut payload = String::new();
        for (key, value) in sorted {
            payload.push_str(key);
            payload.push_str(value);
        }
        payload.push_str(&self.api_secret);

        format!("{:x}", md5::compute(payload))
    }

    /// Perform a read call and return the raw JSON body.
    fn call_api(&self, method: &str, params: &[(&str, String)]) -> Result<String> {
        let mut url = format!(
            "{}?method={}&api_key={}&format=json",
            LASTFM_API_BASE, method, self.api_key
        );
        for (key, value) in params {
            url.push_str(&format!("&{}={}", key, encode(value)));
        }

        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| anyhow::anyhow!("Last.fm request {} failed: {}", method, e))?;

        let body = response.into_string()?;
        check_api_error(&body)?;
        Ok(body)
    }

    /// The user's overall top-track chart as a key -> playcount map, used to
    /// overlay playcounts onto loved tracks. Best effort: a failure here only
    /// costs the weighting signal.
    fn user_top_playcounts(&self) -> Result<HashMap<String, u32>> {
        let body = self.call_api(
            "user.getTopTracks",
            &[
                ("user", self.username.clone()),
                ("limit", CHART_LIMIT.to_string()),
            ],
        )?;

        let parsed: TopTracksResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse top tracks response: {}", e))?;

        let mut counts = HashMap::new();
        for entry in parsed.toptracks.track {
            let track = Track::new(entry.name, entry.artist.name);
            if let Ok(playcount) = entry.playcount.parse::<u32>() {
                counts.insert(track.key(), playcount);
            }
        }
        Ok(counts)
    }
}

impl MusicSource for LastfmClient {
    fn loved_tracks(&self) -> Result<Vec<LovedTrack>> {
        let mut tracks = Vec::new();
        let mut page = 1u32;
        let mut total_pages = 1u32;

        while page <= total_pages {
            let body = self.call_api(
                "user.getLovedTracks",
                &[
                    ("user", self.username.clone()),
                    ("limit", LOVED_PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ],
            )?;

            let parsed: LovedTracksResponse = serde_json::from_str(&body)
                .map_err(|e| anyhow::anyhow!("Failed to parse loved tracks response: {}", e))?;

            total_pages = parsed.lovedtracks.attr.total_pages.parse().unwrap_or(1);
            for entry in parsed.lovedtracks.track {
                tracks.push(Track::new(entry.name, entry.artist.name));
            }

            if total_pages > 1 {
                info!(
                    "Fetched loved tracks page {}/{} ({} tracks so far)",
                    page,
                    total_pages,
                    tracks.len()
                );
            }
            page += 1;
        }

        let counts = match self.user_top_playcounts() {
            Ok(counts) => counts,
            Err(e) => {
                warn!("Could not overlay playcounts: {}", e);
                HashMap::new()
            }
        };

        Ok(tracks
            .into_iter()
            .map(|track| {
                let playcount = counts.get(&track.key()).copied();
                LovedTrack { track, playcount }
            })
            .collect())
    }

    fn recent_tracks(&self, limit: u32) -> Result<Vec<Track>> {
        let body = self.call_api(
            "user.getRecentTracks",
            &[
                ("user", self.username.clone()),
                ("limit", limit.to_string()),
            ],
        )?;

        let parsed: RecentTracksResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse recent tracks response: {}", e))?;

        Ok(parsed
            .recenttracks
            .track
            .into_iter()
            .map(|entry| Track::new(entry.name, entry.artist.name))
            .collect())
    }

    fn similar_artists(&self, artist: &str, limit: u32) -> Result<Vec<String>> {
        let body = self.call_api(
            "artist.getSimilar",
            &[
                ("artist", artist.to_string()),
                ("limit", limit.to_string()),
            ],
        )?;

        let parsed: SimilarArtistsResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse similar artists response: {}", e))?;

        Ok(parsed
            .similarartists
            .artist
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    fn artist_top_tracks(&self, artist: &str, limit: u32) -> Result<Vec<Track>> {
        let body = self.call_api(
            "artist.getTopTracks",
            &[
                ("artist", artist.to_string()),
                ("limit", limit.to_string()),
            ],
        )?;

        let parsed: TopTracksResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse artist top tracks response: {}", e))?;

        Ok(parsed
            .toptracks
            .track
            .into_iter()
            .map(|entry| Track::new(entry.name, entry.artist.name))
            .collect())
    }

    fn artist_top_tags(&self, artist: &str, limit: u32) -> Result<Vec<String>> {
        let body = self.call_api("artist.getTopTags", &[("artist", artist.to_string())])?;

        let parsed: TopTagsResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse top tags response: {}", e))?;

        Ok(parsed
            .toptags
            .tag
            .into_iter()
            .take(limit as usize)
            .map(|tag| tag.name)
            .collect())
    }

    fn artist_listeners(&self, artist: &str) -> Result<Option<u64>> {
        let body = self.call_api("artist.getInfo", &[("artist", artist.to_string())])?;

        let parsed: ArtistInfoResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse artist info response: {}", e))?;

        Ok(parsed.artist.stats.listeners.parse().ok())
    }
}

/// Last.fm reports failures as 200s with an error envelope; surface those as
/// errors before any typed parse.
fn check_api_error(body: &str) -> Result<()> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(code) = value.get("error").and_then(|code| code.as_i64()) {
            let message = value
                .get("message")
                .and_then(|message| message.as_str())
                .unwrap_or("unknown error");
            return Err(anyhow::anyhow!("Last.fm API error {}: {}", code, message));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session: Session,
}

#[derive(Debug, Deserialize)]
struct Session {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LovedTracksResponse {
    lovedtracks: LovedTracks,
}

#[derive(Debug, Deserialize)]
struct LovedTracks {
    #[serde(default)]
    track: Vec<LovedTrackEntry>,
    #[serde(rename = "@attr", default)]
    attr: PageAttr,
}

#[derive(Debug, Deserialize)]
struct LovedTrackEntry {
    name: String,
    artist: ArtistName,
}

#[derive(Debug, Deserialize)]
struct ArtistName {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct PageAttr {
    #[serde(rename = "totalPages", default)]
    total_pages: String,
}

#[derive(Debug, Deserialize)]
struct TopTracksResponse {
    toptracks: TopTracks,
}

#[derive(Debug, Deserialize)]
struct TopTracks {
    #[serde(default)]
    track: Vec<TopTrackEntry>,
}

#[derive(Debug, Deserialize)]
struct TopTrackEntry {
    name: String,
    artist: ArtistName,
    #[serde(default)]
    playcount: String,
}

#[derive(Debug, Deserialize)]
struct SimilarArtistsResponse {
    similarartists: SimilarArtists,
}

#[derive(Debug, Deserialize)]
struct SimilarArtists {
    #[serde(default)]
    artist: Vec<SimilarArtistEntry>,
}

#[derive(Debug, Deserialize)]
struct SimilarArtistEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TopTagsResponse {
    toptags: TopTags,
}

#[derive(Debug, Deserialize)]
struct TopTags {
    #[serde(default)]
    tag: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ArtistInfoResponse {
    artist: ArtistInfo,
}

#[derive(Debug, Deserialize)]
struct ArtistInfo {
    #[serde(default)]
    stats: ArtistStats,
}

#[derive(Debug, Default, Deserialize)]
struct ArtistStats {
    #[serde(default)]
    listeners: String,
}

#[derive(Debug, Deserialize)]
struct RecentTracksResponse {
    recenttracks: RecentTracks,
}

#[derive(Debug, Deserialize)]
struct RecentTracks {
    #[serde(default)]
    track: Vec<RecentTrackEntry>,
}

#[derive(Debug, Deserialize)]
struct RecentTrackEntry {
    name: String,
    artist: RecentArtist,
}

/// Recent-track entries nest the artist as `{"#text": "..."}` rather than a
/// named object.
#[derive(Debug, Deserialize)]
struct RecentArtist {
    #[serde(rename = "#text")]
    name: String,
}
