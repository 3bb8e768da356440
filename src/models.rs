//! Core data models used throughout anime-scout.
//!
//! Every adapter converges on [`AnimeRecord`]. Fields a source does not
//! expose, or that are absent from a particular entry, stay `None` and
//! serialize as JSON `null`; nothing is filled in with a made-up default.

use serde::Serialize;

/// Normalized candidate produced by a source adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnimeRecord {
    /// Source label (`"crunchyroll"`, `"myanimelist"`, `"unionfansub"`).
    pub source: String,
    pub title: String,
    pub source_url: String,
    pub id: Option<String>,
    pub image_url: Option<String>,
    pub media_type: Option<String>,
    pub score: Option<String>,
    pub release_year: Option<i32>,
    pub status: Option<String>,
    pub episodes: Option<u32>,
    pub duration: Option<String>,
    pub demographic: Option<String>,
    pub genres: Option<Vec<String>>,
    pub themes: Option<Vec<String>>,
    pub producers: Option<Vec<String>>,
    pub studios: Option<Vec<String>>,
    /// Fansub group that released or is releasing the title.
    pub group: Option<String>,
    /// Release source format (BD, TV, WEB...).
    pub source_format: Option<String>,
    pub resolution: Option<String>,
    pub audio_languages: Option<Vec<String>>,
    pub subtitle_languages: Option<Vec<String>>,
    pub servers: Option<Vec<String>>,
    pub seeders: Option<u32>,
    pub leechers: Option<u32>,
    pub recommended: Option<bool>,
}

impl AnimeRecord {
    /// A record carrying only the required fields.
    pub fn new(source: &str, title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            title: title.into(),
            source_url: source_url.into(),
            ..Default::default()
        }
    }
}

/// A candidate paired with its similarity score (0–100) against the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored<T> {
    pub candidate: T,
    pub score: u8,
}

/// What a single adapter's `search` produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "result", rename_all = "snake_case")]
pub enum Resolution {
    /// Unranked candidates; ranking is left to the caller.
    Candidates(Vec<AnimeRecord>),
    /// A single resolved record, with its similarity score when the adapter
    /// ranked locally.
    Match {
        record: AnimeRecord,
        score: Option<u8>,
    },
    /// The adapter ranked its candidates and none qualified.
    NoMatch,
}
