//! MyAnimeList encyclopedia.
//!
//! Two-phase resolution:
//!
//! 1. `GET search/prefix.json?type=anime&keyword=<q>&v=1` and keep the
//!    `anime` category. Its first item is taken as-is; upstream ordering is
//!    trusted and nothing is ranked locally.
//! 2. `GET` that item's detail page and read labeled fields from the
//!    `.leftside` column.
//!
//! Fields missing from the detail page stay `None` (or an empty list for
//! genres, themes, producers and studios). A page without a `.leftside`
//! column at all is a [`ResolveError::ParseInconsistency`].

use async_trait::async_trait;
use reqwest::Url;
use scraper::Html;
use serde::Deserialize;

use crate::config::{self, HttpConfig, MyAnimeListConfig};
use crate::error::{ResolveError, Result};
use crate::extract::{
    find_labeled_links, find_labeled_value, labeled_links_any, normalize_demographic,
    normalize_duration, normalize_image_url, parse_episode_count, selector,
};
use crate::models::{AnimeRecord, Resolution};
use crate::session::{ensure_success, Session};
use crate::traits::{AnimeSource, SourceKind};

const PREFIX_SEARCH_PATH: &str = "search/prefix.json";
const ANIME_CATEGORY: &str = "anime";

#[derive(Debug, Deserialize)]
struct PrefixResponse {
    #[serde(default)]
    categories: Vec<PrefixCategory>,
}

#[derive(Debug, Deserialize)]
struct PrefixCategory {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    items: Vec<PrefixItem>,
}

/// One prefix-search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct PrefixItem {
    pub id: u64,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub payload: PrefixPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrefixPayload {
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub score: Option<String>,
    #[serde(default)]
    pub start_year: Option<i32>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Fields read from the detail page's `.leftside` column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFields {
    pub episodes: Option<u32>,
    pub duration: Option<String>,
    pub demographic: Option<String>,
    pub genres: Vec<String>,
    pub themes: Vec<String>,
    pub producers: Vec<String>,
    pub studios: Vec<String>,
}

pub struct MyAnimeListSource {
    session: Session,
    base: Url,
}

impl MyAnimeListSource {
    pub fn new(http: &HttpConfig, cfg: &MyAnimeListConfig) -> anyhow::Result<Self> {
        Ok(Self {
            session: Session::open(SourceKind::Myanimelist.label(), http)?,
            base: config::base_url(&cfg.base_url)?,
        })
    }

    /// Phase 1: the first item of the `anime` category.
    pub async fn first_anime(&self, query: &str) -> Result<PrefixItem> {
        let url = self
            .base
            .join(PREFIX_SEARCH_PATH)
            .map_err(|e| ResolveError::parse(format!("prefix search URL: {}", e)))?;
        tracing::debug!(%url, query, "myanimelist prefix search");

        let resp = self
            .session
            .client()
            .get(url)
            .headers(self.session.auth_headers(false).await?)
            .query(&[("type", ANIME_CATEGORY), ("keyword", query), ("v", "1")])
            .send()
            .await?;
        let body = ensure_success(resp)?.text().await?;
        let response: PrefixResponse = serde_json::from_str(&body)?;

        first_in_anime_category(response, query)
    }

    /// Phase 2: fetch and parse the detail page of `item`.
    pub async fn detail(&self, item: &PrefixItem) -> Result<DetailFields> {
        let url = detail_url(&self.base, &item.url)?;
        tracing::debug!(%url, "myanimelist detail page");

        let resp = self
            .session
            .client()
            .get(url)
            .headers(self.session.auth_headers(false).await?)
            .send()
            .await?;
        let html = ensure_success(resp)?.text().await?;
        parse_detail_page(&html)
    }
}

#[async_trait]
impl AnimeSource for MyAnimeListSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Myanimelist
    }

    fn description(&self) -> &str {
        "MyAnimeList prefix search plus detail page"
    }

    async fn search(&self, query: &str) -> Result<Resolution> {
        let item = self.first_anime(query).await?;
        let detail = self.detail(&item).await?;
        let record = build_record(item, detail);
        tracing::info!(title = %record.title, url = %record.source_url, "myanimelist match");
        Ok(Resolution::Match {
            record,
            score: None,
        })
    }
}

fn first_in_anime_category(response: PrefixResponse, query: &str) -> Result<PrefixItem> {
    response
        .categories
        .into_iter()
        .find(|c| c.kind == ANIME_CATEGORY)
        .and_then(|c| c.items.into_iter().next())
        .ok_or_else(|| ResolveError::NotFound(format!("no anime matches '{}'", query)))
}

/// Re-root the item's URL onto the configured base so that only the path and
/// query of the upstream link are used.
fn detail_url(base: &Url, item_url: &str) -> Result<Url> {
    let path = match Url::parse(item_url) {
        Ok(absolute) => {
            let mut path = absolute.path().trim_start_matches('/').to_string();
            if let Some(query) = absolute.query() {
                path.push('?');
                path.push_str(query);
            }
            path
        }
        Err(_) => item_url.trim_start_matches('/').to_string(),
    };
    base.join(&path)
        .map_err(|e| ResolveError::parse(format!("detail URL '{}': {}", item_url, e)))
}

/// Extract the labeled fields from a detail page.
pub fn parse_detail_page(html: &str) -> Result<DetailFields> {
    let document = Html::parse_document(html);
    let leftside_sel = selector(".leftside")?;
    let leftside = document
        .select(&leftside_sel)
        .next()
        .ok_or_else(|| ResolveError::parse("detail page has no .leftside column"))?;

    let demographic = find_labeled_links(leftside, "Demographic:")
        .and_then(|links| links.into_iter().next());

    Ok(DetailFields {
        episodes: find_labeled_value(leftside, "Episodes:")
            .as_deref()
            .and_then(parse_episode_count),
        duration: find_labeled_value(leftside, "Duration:").map(|d| normalize_duration(&d)),
        demographic: normalize_demographic(demographic.as_deref()),
        genres: labeled_links_any(leftside, "Genre:", "Genres:"),
        themes: labeled_links_any(leftside, "Theme:", "Themes:"),
        producers: labeled_links_any(leftside, "Producer:", "Producers:"),
        studios: labeled_links_any(leftside, "Studio:", "Studios:"),
    })
}

fn build_record(item: PrefixItem, detail: DetailFields) -> AnimeRecord {
    AnimeRecord {
        id: Some(item.id.to_string()),
        image_url: item.image_url.as_deref().map(normalize_image_url),
        media_type: item.payload.media_type,
        score: item.payload.score,
        release_year: item.payload.start_year,
        status: item.payload.status,
        episodes: detail.episodes,
        duration: detail.duration,
        demographic: detail.demographic,
        genres: Some(detail.genres),
        themes: Some(detail.themes),
        producers: Some(detail.producers),
        studios: Some(detail.studios),
        ..AnimeRecord::new(SourceKind::Myanimelist.label(), item.name, item.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL: &str = r#"
        <html><body>
        <div class="leftside">
          <h2>Information</h2>
          <div class="spaceit_pad"><span class="dark_text">Type:</span> <a href="/topanime.php?type=tv">TV</a></div>
          <div class="spaceit_pad"><span class="dark_text">Episodes:</span>
            26
          </div>
          <div class="spaceit_pad"><span class="dark_text">Producers:</span>
            <a href="/anime/producer/23">Bandai Visual</a>
          </div>
          <div class="spaceit_pad"><span class="dark_text">Studios:</span>
            <a href="/anime/producer/14">Sunrise</a>
          </div>
          <div class="spaceit_pad"><span class="dark_text">Genres:</span>
            <a href="/anime/genre/1">Action</a>, <a href="/anime/genre/24">Sci-Fi</a>
          </div>
          <div class="spaceit_pad"><span class="dark_text">Theme:</span>
            <a href="/anime/genre/29">Space</a>
          </div>
          <div class="spaceit_pad"><span class="dark_text">Demographic:</span>
            <a href="/anime/genre/27">Shounen</a>
          </div>
          <div class="spaceit_pad"><span class="dark_text">Duration:</span>
            24 min. per ep.
          </div>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_detail_page() {
        let detail = parse_detail_page(DETAIL).unwrap();
        assert_eq!(detail.episodes, Some(26));
        assert_eq!(detail.duration.as_deref(), Some("24 min."));
        assert_eq!(detail.demographic.as_deref(), Some("Shonen"));
        assert_eq!(detail.genres, vec!["Action", "Sci-Fi"]);
        assert_eq!(detail.themes, vec!["Space"]);
        assert_eq!(detail.producers, vec!["Bandai Visual"]);
        assert_eq!(detail.studios, vec!["Sunrise"]);
    }

    #[test]
    fn test_placeholder_episode_count_is_unknown() {
        let html = DETAIL.replace("26", "?");
        assert_eq!(parse_detail_page(&html).unwrap().episodes, None);
    }

    #[test]
    fn test_missing_leftside_is_parse_inconsistency() {
        let err = parse_detail_page("<html><body><p>maintenance</p></body></html>").unwrap_err();
        assert_eq!(err.kind(), "parse_inconsistency");
    }

    #[test]
    fn test_empty_labels_yield_no_values() {
        let html = r#"
            <div class="leftside">
              <div><span class="dark_text">Demographic:</span></div>
              <div><span class="dark_text">Duration:</span> </div>
              <div><span class="dark_text">Episodes:</span></div>
            </div>
        "#;
        let detail = parse_detail_page(html).unwrap();
        assert_eq!(detail.demographic, None);
        assert_eq!(detail.duration, None);
        assert_eq!(detail.episodes, None);
    }

    #[test]
    fn test_unlinked_demographic_is_none() {
        let html = r#"<div class="leftside"><div><span class="dark_text">Demographic:</span> Seinen</div></div>"#;
        assert_eq!(parse_detail_page(html).unwrap().demographic, None);
    }

    #[test]
    fn test_sparse_leftside() {
        let detail = parse_detail_page(r#"<div class="leftside"></div>"#).unwrap();
        assert_eq!(detail, DetailFields::default());
    }

    #[test]
    fn test_first_item_of_anime_category() {
        let response: PrefixResponse = serde_json::from_value(serde_json::json!({
            "categories": [
                { "type": "manga", "items": [ { "id": 9, "name": "Manga", "url": "https://myanimelist.net/manga/9" } ] },
                { "type": "anime", "items": [
                    { "id": 1, "name": "Cowboy Bebop", "url": "https://myanimelist.net/anime/1/Cowboy_Bebop" },
                    { "id": 5, "name": "Cowboy Bebop: Movie", "url": "https://myanimelist.net/anime/5" }
                ] }
            ]
        }))
        .unwrap();
        let item = first_in_anime_category(response, "bebop").unwrap();
        assert_eq!(item.id, 1);
        assert!(item.payload.media_type.is_none());
    }

    #[test]
    fn test_empty_anime_category_is_not_found() {
        let response: PrefixResponse = serde_json::from_value(serde_json::json!({
            "categories": [ { "type": "anime", "items": [] } ]
        }))
        .unwrap();
        let err = first_in_anime_category(response, "zzz").unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let err = first_in_anime_category(PrefixResponse { categories: vec![] }, "zzz").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_detail_url_reroots_onto_base() {
        let base = Url::parse("http://127.0.0.1:9000/").unwrap();
        let url = detail_url(&base, "https://myanimelist.net/anime/1/Cowboy_Bebop").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/anime/1/Cowboy_Bebop");

        let url = detail_url(&base, "/anime/5").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/anime/5");
    }

    #[test]
    fn test_build_record_normalizes_image() {
        let item = PrefixItem {
            id: 1,
            name: "Cowboy Bebop".to_string(),
            url: "https://myanimelist.net/anime/1/Cowboy_Bebop".to_string(),
            image_url: Some(
                "https://cdn.myanimelist.net/r/116x180/images/anime/4/19644.jpg?s=29a8ec".to_string(),
            ),
            payload: PrefixPayload {
                media_type: Some("TV".to_string()),
                score: Some("8.75".to_string()),
                start_year: Some(1998),
                status: Some("Finished Airing".to_string()),
            },
        };
        let record = build_record(item, DetailFields::default());
        assert_eq!(
            record.image_url.as_deref(),
            Some("https://cdn.myanimelist.net/images/anime/4/19644l.jpg")
        );
        assert_eq!(record.id.as_deref(), Some("1"));
        assert_eq!(record.release_year, Some(1998));
        assert_eq!(record.demographic, None);
        assert_eq!(record.genres, Some(vec![]));
    }
}
