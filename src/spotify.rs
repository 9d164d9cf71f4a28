use crate::config::SpotifyConfig;
use anyhow::Result;
use serde::Deserialize;
use ureq::Agent;
use urlencoding::encode;

#[cfg(test)]
use mockall::automock;

const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// The playlist endpoints accept at most this many track URIs per call.
pub const PLAYLIST_BATCH_SIZE: usize = 100;

/// The slice of the streaming catalog the materializer consumes.
#[cfg_attr(test, automock)]
pub trait Catalog {
    fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<CatalogTrack>>;
    fn artist_genres(&self, artist_id: &str) -> Result<Vec<String>>;
}

/// The playlist-mutation side of the streaming service, split from the
/// concrete client so the batch walk can run against a mock.
#[cfg_attr(test, automock)]
pub trait PlaylistWriter {
    /// Replace the playlist contents with one batch of URIs (at most
    /// `PLAYLIST_BATCH_SIZE`). An empty batch clears the playlist.
    fn replace_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()>;
    /// Append one batch of URIs (at most `PLAYLIST_BATCH_SIZE`).
    fn add_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()>;
}

/// Write the full track list: the first batch replaces whatever the playlist
/// held, the remaining batches append.
pub fn set_playlist_tracks(
    writer: &dyn PlaylistWriter,
    playlist_id: &str,
    uris: &[String],
) -> Result<()> {
    let mut chunks = uris.chunks(PLAYLIST_BATCH_SIZE);

    let first = chunks.next().unwrap_or(&[]);
    writer.replace_playlist_items(playlist_id, first)?;

    for chunk in chunks {
        writer.add_playlist_items(playlist_id, chunk)?;
    }
    Ok(())
}

/// A track as the catalog returns it from search.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogTrack {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<CatalogArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogArtist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// A Spotify Web API client holding a bearer token for the run
pub struct SpotifyClient {
    agent: Agent,
    access_token: String,
}

impl SpotifyClient {
    /// Exchange the stored refresh token for a bearer token. Interactive
    /// authorization is a one-time setup step outside this tool.
    pub fn connect(config: &SpotifyConfig) -> Result<Self> {
        let agent = Agent::new();

        let response = agent
            .post(SPOTIFY_TOKEN_URL)
            .send_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", config.refresh_token.as_str()),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
            ])
            .map_err(|e| anyhow::anyhow!("Spotify token refresh failed: {}", e))?;

        let body = response.into_string()?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse Spotify token response: {}", e))?;

        Ok(SpotifyClient {
            agent,
            access_token: parsed.access_token,
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// How many tracks the playlist currently holds.
    pub fn playlist_track_total(&self, playlist_id: &str) -> Result<u32> {
        let url = format!(
            "{}/playlists/{}/tracks?fields=total&limit=1",
            SPOTIFY_API_BASE, playlist_id
        );

        let response = self
            .agent
            .get(&url)
            .set("Authorization", &self.bearer())
            .call()
            .map_err(|e| anyhow::anyhow!("Failed to fetch playlist items: {}", e))?;

        let body = response.into_string()?;
        let parsed: PlaylistTotal = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse playlist response: {}", e))?;

        Ok(parsed.total)
    }

}

impl PlaylistWriter for SpotifyClient {
    fn replace_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = format!("{}/playlists/{}/tracks", SPOTIFY_API_BASE, playlist_id);

        self.agent
            .put(&url)
            .set("Authorization", &self.bearer())
            .send_json(serde_json::json!({ "uris": uris }))
            .map_err(|e| anyhow::anyhow!("Failed to replace playlist items: {}", e))?;

        Ok(())
    }

    fn add_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = format!("{}/playlists/{}/tracks", SPOTIFY_API_BASE, playlist_id);

        self.agent
            .post(&url)
            .set("Authorization", &self.bearer())
            .send_json(serde_json::json!({ "uris": uris }))
            .map_err(|e| anyhow::anyhow!("Failed to append playlist items: {}", e))?;

        Ok(())
    }
}

impl Catalog for SpotifyClient {
    fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<CatalogTrack>> {
        let url = format!(
            "{}/search?q={}&type=track&limit={}",
            SPOTIFY_API_BASE,
            encode(query),
            limit
        );

        let response = self
            .agent
            .get(&url)
            .set("Authorization", &self.bearer())
            .call()
            .map_err(|e| anyhow::anyhow!("Catalog search failed: {}", e))?;

        let body = response.into_string()?;
        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse search response: {}", e))?;

        Ok(parsed.tracks.map(|tracks| tracks.items).unwrap_or_default())
    }

    fn artist_genres(&self, artist_id: &str) -> Result<Vec<String>> {
        let url = format!("{}/artists/{}", SPOTIFY_API_BASE, artist_id);

        let response = self
            .agent
            .get(&url)
            .set("Authorization", &self.bearer())
            .call()
            .map_err(|e| anyhow::anyhow!("Artist lookup failed: {}", e))?;

        let body = response.into_string()?;
        let parsed: ArtistResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Failed to parse artist response: {}", e))?;

        Ok(parsed.genres)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistTotal {
    total: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<SearchTracks>,
}

#[derive(Debug, Deserialize)]
struct SearchTracks {
    #[serde(default)]
    items: Vec<CatalogTrack>,
}

#[derive(Debug, Deserialize)]
struct ArtistResponse {
    #[serde(default)]
    genres: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_search_response() {
        let json = r#"{
            "tracks": {
                "items": [
                    {
                        "uri": "spotify:track:abc123",
                        "name": "Paranoid Android",
                        "artists": [{"id": "4Z8W4fKeB5YxbusRsdQVPb", "name": "Radiohead"}]
                    }
                ],
                "total": 1
            }
        }"#;

        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        let items = parsed.tracks.unwrap().items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].uri, "spotify:track:abc123");
        assert_eq!(items[0].artists[0].name, "Radiohead");
    }

    #[test]
    fn test_search_response_without_tracks_is_empty() {
        let parsed: SearchResponse = serde_json::from_str(r#"{"artists": {}}"#).unwrap();
        assert!(parsed.tracks.is_none());
    }

    #[test]
    fn test_parses_artist_genres() {
        let json = r#"{"id": "x", "name": "Radiohead", "genres": ["art rock", "oxford indie"]}"#;
        let parsed: ArtistResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.genres, vec!["art rock", "oxford indie"]);
    }

    #[test]
    fn test_parses_token_response() {
        let json = r#"{"access_token": "tok", "token_type": "Bearer", "expires_in": 3600}"#;
        let parsed: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.access_token, "tok");
    }

    fn uris(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("spotify:track:{}", i)).collect()
    }

    #[test]
    fn test_single_batch_replaces_and_never_appends() {
        let mut writer = MockPlaylistWriter::new();
        writer
            .expect_replace_playlist_items()
            .withf(|id, batch| id == "pl" && batch.len() == 100)
            .times(1)
            .returning(|_, _| Ok(()));

        set_playlist_tracks(&writer, "pl", &uris(100)).unwrap();
    }

    #[test]
    fn test_oversized_list_splits_at_the_batch_bound() {
        let mut writer = MockPlaylistWriter::new();
        writer
            .expect_replace_playlist_items()
            .withf(|_, batch| batch.len() == 100 && batch[0] == "spotify:track:0")
            .times(1)
            .returning(|_, _| Ok(()));
        writer
            .expect_add_playlist_items()
            .withf(|_, batch| batch.len() == 1 && batch[0] == "spotify:track:100")
            .times(1)
            .returning(|_, _| Ok(()));

        set_playlist_tracks(&writer, "pl", &uris(101)).unwrap();
    }

    #[test]
    fn test_empty_list_clears_the_playlist() {
        let mut writer = MockPlaylistWriter::new();
        writer
            .expect_replace_playlist_items()
            .withf(|_, batch| batch.is_empty())
            .times(1)
            .returning(|_, _| Ok(()));

        set_playlist_tracks(&writer, "pl", &[]).unwrap();
    }

    #[test]
    fn test_append_failures_surface_to_the_caller() {
        let mut writer = MockPlaylistWriter::new();
        writer
            .expect_replace_playlist_items()
            .returning(|_, _| Ok(()));
        writer
            .expect_add_playlist_items()
            .returning(|_, _| Err(anyhow::anyhow!("503 from the playlist service")));

        assert!(set_playlist_tracks(&writer, "pl", &uris(150)).is_err());
    }
}
