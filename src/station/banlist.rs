use log::debug;
use std::collections::HashSet;
use std::path::Path;

/// User-maintained exclusions, loaded fresh each run from a flat file of
/// `type:value` lines (`song:`, `artist:`, `album:`, `genre:`).
#[derive(Debug, Default)]
pub struct BanList {
    songs: HashSet<String>,
    artists: HashSet<String>,
    albums: HashSet<String>,
    genres: HashSet<String>,
}

impl BanList {
    /// Load from the backing file. A missing or unreadable file is a normal
    /// empty list, never an error.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(_) => {
                debug!("No banned items file at {}", path.display());
                BanList::default()
            }
        }
    }

    /// Parse the line format. Lines without a recognized prefix are ignored.
    pub fn parse(contents: &str) -> Self {
        let mut list = BanList::default();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((prefix, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().to_lowercase();
            if value.is_empty() {
                continue;
            }
            match prefix.trim().to_lowercase().as_str() {
                "song" => {
                    list.songs.insert(value);
                }
                "artist" => {
                    list.artists.insert(value);
                }
                "album" => {
                    list.albums.insert(value);
                }
                "genre" => {
                    list.genres.insert(value);
                }
                _ => {}
            }
        }
        list
    }

    /// Membership test across all ban categories. Song, artist, and album
    /// match exactly after lowercasing; genres match by substring.
    pub fn is_banned(
        &self,
        title: &str,
        artist: &str,
        album: Option<&str>,
        genres: &[String],
    ) -> bool {
        if self.songs.contains(&title.to_lowercase()) {
            return true;
        }
        if self.is_artist_banned(artist) {
            return true;
        }
        if let Some(album) = album {
            if self.albums.contains(&album.to_lowercase()) {
                return true;
            }
        }
        genres.iter().any(|genre| self.is_genre_banned(genre))
    }

    pub fn is_artist_banned(&self, artist: &str) -> bool {
        self.artists.contains(&artist.to_lowercase())
    }

    /// Substring match in both directions, so banning "metal" covers
    /// "doom metal" and banning "australian hip hop" also fires on a bare
    /// "hip hop" tag.
    pub fn is_genre_banned(&self, genre: &str) -> bool {
        let genre = genre.to_lowercase();
        if genre.is_empty() {
            return false;
        }
        self.genres
            .iter()
            .any(|banned| genre.contains(banned.as_str()) || banned.contains(genre.as_str()))
    }

    pub fn has_genre_bans(&self) -> bool {
        !self.genres.is_empty()
    }

    /// Total entries across all categories, for the run log.
    pub fn entry_count(&self) -> usize {
        self.songs.len() + self.artists.len() + self.albums.len() + self.genres.len()
    }
}
