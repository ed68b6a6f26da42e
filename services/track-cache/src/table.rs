//!
//! src/table.rs
//!
//! Flattens cached track records into six column rows
//! for analysis
//!

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::PipelineError;
use crate::types::{Track, TrackKey};

pub const COLUMNS: [&str; 6] = [
    "Track Name",
    "Artist Name",
    "Album Name",
    "Duration (ms)",
    "Explicit",
    "Popularity",
];

/// Which entry of a track's `artists` list fills the artist column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtistSelection {
    First,
    /// Matches the tables produced by earlier runs of the analysis
    #[default]
    Last
}

impl FromStr for ArtistSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(ArtistSelection::First),
            "last"  => Ok(ArtistSelection::Last),
            other   => Err(format!("ARTIST_SELECTION must be first or last, got {other}"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackRow {
    #[serde(rename = "Track Name")]
    pub track_name: String,
    #[serde(rename = "Artist Name")]
    pub artist_name: String,
    #[serde(rename = "Album Name")]
    pub album_name: String,
    #[serde(rename = "Duration (ms)")]
    pub duration_ms: u64,
    #[serde(rename = "Explicit")]
    pub explicit: bool,
    #[serde(rename = "Popularity")]
    pub popularity: u8
}

impl TrackRow {
    pub fn project(record: &Value, selection: ArtistSelection) ->
        Result<Self, PipelineError> {
        let track = Track::deserialize(record)
            .map_err(|e| PipelineError::Parse(format!("track record: {e}")))?;

        let artist = match selection {
            ArtistSelection::First => track.artists.first(),
            ArtistSelection::Last  => track.artists.last()
        }.ok_or_else(|| PipelineError::Parse(format!(
            "track {} ({}) has no artists",
            track.name,
            track.id.as_deref().unwrap_or("no id")
        )))?;

        Ok( Self {
            artist_name: artist.name.clone(),
            album_name: track.album.name,
            track_name: track.name,
            duration_ms: track.duration_ms,
            explicit: track.explicit,
            popularity: track.popularity
        })
    }
}

/// Rows in key order plus the keys that could not be projected
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackTable {
    pub columns: Vec<&'static str>,
    pub rows: Vec<TrackRow>,
    pub skipped: Vec<String>
}

impl TrackTable {
    pub fn new() -> Self {
        Self { columns: COLUMNS.to_vec(), ..Default::default() }
    }

    pub fn from_records<'a>(
        records: impl IntoIterator<Item = (TrackKey, &'a Value)>,
        selection: ArtistSelection
    ) -> (Self, Vec<(TrackKey, PipelineError)>) {
        let mut table = Self::new();
        let mut failures = Vec::new();
        for (key, record) in records {
            match TrackRow::project(record, selection) {
                Ok(row) => table.rows.push(row),
                Err(e) => {
                    table.skipped.push(key.to_string());
                    failures.push((key, e));
                }
            }
        }
        (table, failures)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn popularity(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.popularity as f64).collect()
    }

    pub fn duration_ms(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.duration_ms as f64).collect()
    }

    pub fn explicit(&self) -> Vec<f64> {
        self.rows.iter().map(|r| if r.explicit { 1.0 } else { 0.0 }).collect()
    }
}
