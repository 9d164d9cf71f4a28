use anyhow::Result;
use std::path::PathBuf;

/// Which service answers artist-recommendation prompts, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    None,
    OpenAi,
    OpenRouter,
}

#[derive(Debug)]
pub struct LastfmConfig {
    pub api_key: String,
    pub api_secret: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub playlist_id: String,
}

/// Knobs for the selection engine itself.
#[derive(Debug)]
pub struct StationConfig {
    pub track_count: usize,
    pub randomness_factor: u8,
    pub history_path: PathBuf,
    pub banned_path: PathBuf,
    pub ai_provider: AiProvider,
    pub ai_api_key: Option<String>,
}

/// Configuration loaded from environment variables
#[derive(Debug)]
pub struct Config {
    pub lastfm: LastfmConfig,
    pub spotify: SpotifyConfig,
    pub station: StationConfig,
}

/// Load configuration from `.env` and environment
pub fn load_config() -> Result<Config> {
    // Load `.env` file if present
    dotenv::dotenv().ok();

    let lastfm = LastfmConfig {
        api_key: required("LASTFM_API_KEY")?,
        api_secret: required("LASTFM_API_SECRET")?,
        username: required("LASTFM_USERNAME")?,
        password: required("LASTFM_PASSWORD")?,
    };

    let spotify = SpotifyConfig {
        client_id: required("SPOTIFY_CLIENT_ID")?,
        client_secret: required("SPOTIFY_CLIENT_SECRET")?,
        refresh_token: required("SPOTIFY_REFRESH_TOKEN")?,
        playlist_id: required("SPOTIFY_PLAYLIST_ID")?,
    };

    let track_count: usize = parse_or("NUMBER_OF_TRACKS", 100)?;
    let randomness_factor = parse_or::<u8>("RANDOMNESS_FACTOR", 50)?.min(100);
    let (ai_provider, ai_api_key) = load_ai_provider();

    let station = StationConfig {
        track_count,
        randomness_factor,
        history_path: PathBuf::from(optional("HISTORY_FILE", "playlist_history.json")),
        banned_path: PathBuf::from(optional("BANNED_FILE", "banned_items.txt")),
        ai_provider,
        ai_api_key,
    };

    Ok(Config {
        lastfm,
        spotify,
        station,
    })
}

fn required(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| anyhow::anyhow!("Missing required environment variable: {}", name))
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

/// The AI provider is optional: unset, unrecognized, or missing its API key
/// all degrade to `None` so the run continues without AI discovery.
fn load_ai_provider() -> (AiProvider, Option<String>) {
    let provider = std::env::var("AI_PROVIDER")
        .unwrap_or_default()
        .to_lowercase();

    let (provider, key_var) = match provider.as_str() {
        "openai" => (AiProvider::OpenAi, "OPENAI_API_KEY"),
        "openrouter" => (AiProvider::OpenRouter, "OPENROUTER_API_KEY"),
        "" | "none" => return (AiProvider::None, None),
        other => {
            log::warn!("Unknown AI_PROVIDER '{}', AI discovery disabled", other);
            return (AiProvider::None, None);
        }
    };

    match std::env::var(key_var) {
        Ok(key) if !key.is_empty() => (provider, Some(key)),
        _ => {
            log::warn!("{} is not set, AI discovery disabled", key_var);
            (AiProvider::None, None)
        }
    }
}
