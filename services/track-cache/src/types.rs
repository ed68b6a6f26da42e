use std::{fmt, str::FromStr};

use reqwest::blocking::RequestBuilder;
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// Namespace every cached track key lives under
pub const TRACK_KEY_PREFIX: &str = "track:";

/// Storage key `track:<n>`, assigned sequentially at store time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackKey(pub u64);

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TRACK_KEY_PREFIX}{}", self.0)
    }
}

impl FromStr for TrackKey {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(TRACK_KEY_PREFIX)
            .and_then(|n| n.parse::<u64>().ok())
            .map(TrackKey)
            .ok_or_else(|| PipelineError::Parse(format!("not a track key: {s}")))
    }
}

/// Item kinds the catalog search endpoint accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Artist,
    Album,
    Track
}

impl SearchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchKind::Artist => "artist",
            SearchKind::Album  => "album",
            SearchKind::Track  => "track"
        }
    }

    /// Key of the result page in a search response, e.g. `artists`
    pub fn plural(self) -> &'static str {
        match self {
            SearchKind::Artist => "artists",
            SearchKind::Album  => "albums",
            SearchKind::Track  => "tracks"
        }
    }
}

impl FromStr for SearchKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "artist" => Ok(SearchKind::Artist),
            "album"  => Ok(SearchKind::Album),
            "track"  => Ok(SearchKind::Track),
            other    => Err(PipelineError::InvalidKind(other.to_string()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRef {
    pub name: String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub name: String
}

/// Typed view over a cached top-track record. The cache keeps the full
/// record; this only names the fields the table needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub album: AlbumRef,
    pub artists: Vec<ArtistRef>,
    pub duration_ms: u64,
    pub explicit: bool,
    pub popularity: u8,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub track_number: Option<u32>
}

/// Bearer credential from the client-credentials grant
#[derive(Clone, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>
}

fn default_token_type() -> String { "Bearer".to_string() }

impl Credential {
    #[cfg(test)]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self { access_token: token.into(), token_type: default_token_type(), expires_in: None }
    }

    pub fn authorize(&self, request_builder: RequestBuilder) -> RequestBuilder {
        request_builder.bearer_auth(self.access_token.as_str())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_key_formats_and_parses() {
        assert_eq!(TrackKey(0).to_string(), "track:0");
        assert_eq!(TrackKey(42).to_string(), "track:42");
        assert_eq!("track:17".parse::<TrackKey>().unwrap(), TrackKey(17));
        assert!("track:".parse::<TrackKey>().is_err());
        assert!("track:-1".parse::<TrackKey>().is_err());
        assert!("album:3".parse::<TrackKey>().is_err());
    }

    #[test]
    fn only_three_kinds_parse() {
        assert_eq!("artist".parse::<SearchKind>().unwrap(), SearchKind::Artist);
        assert_eq!("album".parse::<SearchKind>().unwrap(), SearchKind::Album);
        assert_eq!("track".parse::<SearchKind>().unwrap(), SearchKind::Track);
        for bad in ["playlist", "Artist", "", "tracks"] {
            assert!(matches!(bad.parse::<SearchKind>(), Err(PipelineError::InvalidKind(_))));
        }
        assert_eq!(SearchKind::Album.plural(), "albums");
    }

    #[test]
    fn track_view_ignores_extra_fields() {
        let raw = serde_json::json!({
            "name": "Dream On",
            "album": { "name": "Aerosmith", "images": [] },
            "artists": [ { "name": "Aerosmith", "id": "7Ey4PD4MYsKc5I2dolUwbH" } ],
            "duration_ms": 267_426,
            "explicit": false,
            "popularity": 79,
            "id": "5MxNLUsfh7uzROypsoO5qe",
            "track_number": 9,
            "available_markets": ["US"]
        });
        let track: Track = serde_json::from_value(raw).unwrap();
        assert_eq!(track.album.name, "Aerosmith");
        assert_eq!(track.artists.len(), 1);
        assert_eq!(track.track_number, Some(9));
    }

    #[test]
    fn credential_defaults_and_redacts() {
        let cred: Credential = serde_json::from_value(serde_json::json!({
            "access_token": "BQD-secret-token"
        })).unwrap();
        assert_eq!(cred.token_type, "Bearer");
        assert!(!format!("{cred:?}").contains("BQD-secret-token"));
    }
}
