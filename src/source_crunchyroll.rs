//! Crunchyroll streaming catalog.
//!
//! One authenticated request against the discover-search API. Results are
//! normalized but neither filtered nor ranked here; the caller ranks them.
//!
//! # Authentication
//!
//! The first search on a session runs an anonymous client-credential
//! exchange (`POST /auth/v1/token`) and the token is reused until it
//! expires. See [`Session::auth_headers`].
//!
//! # Response shape
//!
//! ```json
//! { "data": [ { "type": "series", "items": [ { "id": "G4PH0WXVJ", "title": "...",
//!     "slug_title": "...", "type": "series", "series_metadata": { ... } } ] } ] }
//! ```

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use crate::config::{self, CrunchyrollConfig, HttpConfig};
use crate::error::{ResolveError, Result};
use crate::extract::{json_i32, json_str, json_str_list, json_u32};
use crate::models::{AnimeRecord, Resolution};
use crate::session::{ensure_success, ClientCredentials, Session};
use crate::traits::{AnimeSource, SourceKind};

pub const TOKEN_PATH: &str = "auth/v1/token";
pub const SEARCH_PATH: &str = "content/v2/discover/search";
/// Maximum results requested per content type.
pub const RESULT_CAP: u32 = 6;
pub const CONTENT_TYPES: &str = "music,series,episode,top_results,movie_listing";

pub struct CrunchyrollSource {
    session: Session,
    base: Url,
    locale: String,
}

impl CrunchyrollSource {
    pub fn new(http: &HttpConfig, cfg: &CrunchyrollConfig) -> anyhow::Result<Self> {
        let base = config::base_url(&cfg.base_url)?;
        let token_url = base.join(TOKEN_PATH).context("Invalid Crunchyroll token URL")?;
        let session = Session::open(SourceKind::Crunchyroll.label(), http)?.with_client_credentials(
            ClientCredentials {
                token_url,
                client_id: cfg.client_id.clone(),
            },
        );
        Ok(Self {
            session,
            base,
            locale: cfg.locale.clone(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Fetch and normalize every search result.
    pub async fn search_candidates(&self, query: &str) -> Result<Vec<AnimeRecord>> {
        let url = self
            .base
            .join(SEARCH_PATH)
            .map_err(|e| ResolveError::parse(format!("search URL: {}", e)))?;
        let headers = self.session.auth_headers(true).await?;
        let cap = RESULT_CAP.to_string();

        tracing::debug!(%url, query, locale = %self.locale, "crunchyroll search");
        let resp = self
            .session
            .client()
            .get(url)
            .headers(headers)
            .query(&[
                ("q", query),
                ("n", cap.as_str()),
                ("type", CONTENT_TYPES),
                ("ratings", "true"),
                ("preferred_audio_language", self.locale.as_str()),
                ("locale", self.locale.as_str()),
            ])
            .send()
            .await?;
        let body = ensure_success(resp)?.text().await?;
        let value: Value = serde_json::from_str(&body)?;

        let records = parse_search_response(&value, &self.base)?;
        tracing::debug!(count = records.len(), "crunchyroll candidates");
        Ok(records)
    }
}

#[async_trait]
impl AnimeSource for CrunchyrollSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Crunchyroll
    }

    fn description(&self) -> &str {
        "Crunchyroll catalog search (token-authenticated JSON API)"
    }

    async fn search(&self, query: &str) -> Result<Resolution> {
        Ok(Resolution::Candidates(self.search_candidates(query).await?))
    }
}

/// Normalize every item of every result group, preserving upstream order.
pub fn parse_search_response(value: &Value, base: &Url) -> Result<Vec<AnimeRecord>> {
    let groups = value
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ResolveError::parse("search response has no 'data' array"))?;

    let mut records = Vec::new();
    for group in groups {
        let Some(items) = group.get("items").and_then(Value::as_array) else {
            continue;
        };
        for item in items {
            match normalize_item(item, base) {
                Some(record) => records.push(record),
                None => tracing::warn!("skipping crunchyroll item without id or title"),
            }
        }
    }
    Ok(records)
}

/// Convert one catalog item. Items lacking an id or title cannot form a
/// record and yield `None`.
fn normalize_item(item: &Value, base: &Url) -> Option<AnimeRecord> {
    let id = json_str(item, "/id")?;
    let title = json_str(item, "/title")?;
    let media_type = json_str(item, "/type");
    let slug = json_str(item, "/slug_title").unwrap_or_default();

    let section = match media_type.as_deref() {
        Some("series") => "series",
        Some("movie_listing") => "watch/movie",
        Some("music") | Some("musicVideo") => "watch/musicvideo",
        _ => "watch",
    };
    let path = if slug.is_empty() {
        format!("{}/{}", section, id)
    } else {
        format!("{}/{}/{}", section, id, slug)
    };
    let source_url = base.join(&path).ok()?.to_string();

    let release_year = json_i32(item, "/series_metadata/series_launch_year")
        .or_else(|| json_i32(item, "/movie_listing_metadata/movie_release_year"))
        .or_else(|| json_i32(item, "/episode_metadata/episode_air_date_year"));

    let episodes = json_u32(item, "/series_metadata/episode_count");

    let audio = json_str_list(item, "/series_metadata/audio_locales")
        .or_else(|| json_str_list(item, "/episode_metadata/audio_locales"));
    let subtitles = json_str_list(item, "/series_metadata/subtitle_locales")
        .or_else(|| json_str_list(item, "/episode_metadata/subtitle_locales"));

    let duration = json_u32(item, "/episode_metadata/duration_ms")
        .or_else(|| json_u32(item, "/movie_listing_metadata/duration_ms"))
        .map(|ms| format!("{} min.", ms / 60_000));

    let status = item
        .pointer("/series_metadata/is_simulcast")
        .and_then(Value::as_bool)
        .map(|simulcast| if simulcast { "Simulcast" } else { "Catalog" }.to_string());

    Some(AnimeRecord {
        id: Some(id),
        image_url: poster_url(item),
        media_type,
        score: json_str(item, "/rating/average"),
        release_year,
        status,
        episodes,
        duration,
        audio_languages: audio,
        subtitle_languages: subtitles,
        ..AnimeRecord::new(SourceKind::Crunchyroll.label(), title, source_url)
    })
}

/// Largest variant of the first tall poster.
fn poster_url(item: &Value) -> Option<String> {
    item.pointer("/images/poster_tall/0")?
        .as_array()?
        .iter()
        .filter_map(|variant| {
            let width = variant.get("width").and_then(Value::as_u64).unwrap_or(0);
            variant
                .get("source")
                .and_then(Value::as_str)
                .map(|src| (width, src))
        })
        .max_by_key(|(width, _)| *width)
        .map(|(_, src)| src.to_string())
}
