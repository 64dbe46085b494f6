use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of media a playback event refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Episode,
    Movie,
}

impl MediaKind {
    /// Map a Plex/Tautulli `type` field ("episode", "movie", "track", ...) to a kind
    ///
    /// Returns None for media the pipeline does not handle (music, photos, whole shows).
    pub fn from_plex_type(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "episode" => Some(MediaKind::Episode),
            "movie" => Some(MediaKind::Movie),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Episode => write!(f, "episode"),
            MediaKind::Movie => write!(f, "movie"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaKind::from_plex_type(s).ok_or_else(|| format!("Unknown media kind: {}", s))
    }
}

/// Numbering scheme an identifier is expressed in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceDatabase {
    #[default]
    Tvdb,
    Tmdb,
    Anidb,
    Mal,
}

impl SourceDatabase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceDatabase::Tvdb => "tvdb",
            SourceDatabase::Tmdb => "tmdb",
            SourceDatabase::Anidb => "anidb",
            SourceDatabase::Mal => "mal",
        }
    }

    /// Parse a lowercase database token as found in agent GUIDs
    ///
    /// Agents spell MAL in more than one way ("mal", "myanimelist"), both are accepted.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "tvdb" | "thetvdb" => Some(SourceDatabase::Tvdb),
            "tmdb" | "themoviedb" => Some(SourceDatabase::Tmdb),
            "anidb" => Some(SourceDatabase::Anidb),
            "mal" | "myanimelist" => Some(SourceDatabase::Mal),
            _ => None,
        }
    }
}

impl fmt::Display for SourceDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceDatabase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceDatabase::from_token(&s.to_lowercase())
            .ok_or_else(|| format!("Unknown source database: {}", s))
    }
}
