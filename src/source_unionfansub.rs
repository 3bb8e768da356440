//! Union Fansub forum.
//!
//! Two independent listings are searched and ranked separately:
//!
//! | Path | Request | Metadata | Tie-break |
//! |------|---------|----------|-----------|
//! | uploaded | `POST anime.php` (`nombre=<q>`) | full row | recommended |
//! | uploading | `GET announcements.php?aid=14` | title, URL, group | first seen |
//!
//! The path with the strictly higher score wins; an exact tie returns the
//! uploaded result.
//!
//! # Environment Variables
//!
//! - `UNIONFANSUB_USERNAME` (required)
//! - `UNIONFANSUB_PASSWORD` (required)
//!
//! (names configurable under `[unionfansub]`)

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use scraper::{ElementRef, Html};
use tokio::sync::OnceCell;

use crate::config::{self, HttpConfig, UnionFansubConfig};
use crate::error::{ResolveError, Result};
use crate::extract::{
    attr_values, element_text, own_text, parse_episode_count, selector, split_ratio_cell,
};
use crate::matcher::{pick_across, rank_records, TieBreak};
use crate::models::{AnimeRecord, Resolution, Scored};
use crate::session::{ensure_success, Session};
use crate::traits::{AnimeSource, SourceKind};

const LOGIN_PATH: &str = "member.php";
const UPLOADS_PATH: &str = "anime.php";
const UPLOADING_PATH: &str = "announcements.php?aid=14";
/// CSS class marking a recommended release row.
const RECOMMENDED_CLASS: &str = "recomendado";
/// Cells per row in the uploaded-listing table.
const UPLOADED_COLUMNS: usize = 8;

/// Forum login read from the environment.
#[derive(Clone)]
pub struct ForumCredentials {
    pub username: String,
    pub password: String,
}

impl ForumCredentials {
    pub fn from_env(cfg: &UnionFansubConfig) -> anyhow::Result<Self> {
        let username = std::env::var(&cfg.username_env)
            .with_context(|| format!("{} environment variable not set", cfg.username_env))?;
        let password = std::env::var(&cfg.password_env)
            .with_context(|| format!("{} environment variable not set", cfg.password_env))?;
        Ok(Self { username, password })
    }
}

impl std::fmt::Debug for ForumCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForumCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

pub struct UnionFansubSource {
    session: Session,
    base: Url,
    credentials: ForumCredentials,
    logged_in: OnceCell<()>,
}

impl UnionFansubSource {
    pub fn new(
        http: &HttpConfig,
        cfg: &UnionFansubConfig,
        credentials: ForumCredentials,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            session: Session::open(SourceKind::Unionfansub.label(), http)?,
            base: config::base_url(&cfg.base_url)?,
            credentials,
            logged_in: OnceCell::new(),
        })
    }

    pub fn from_env(http: &HttpConfig, cfg: &UnionFansubConfig) -> anyhow::Result<Self> {
        Self::new(http, cfg, ForumCredentials::from_env(cfg)?)
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| ResolveError::parse(format!("forum URL '{}': {}", path, e)))
    }

    /// Submit the login form. Cookies stay in the session's jar.
    pub async fn login(&self) -> Result<()> {
        self.session
            .login(
                self.url(LOGIN_PATH)?,
                &self.credentials.username,
                &self.credentials.password,
            )
            .await
    }

    /// Log in once per session; a failed attempt is retried on the next call.
    async fn ensure_logged_in(&self) -> Result<()> {
        self.logged_in.get_or_try_init(|| self.login()).await?;
        Ok(())
    }

    /// Best match in the uploaded-listing table.
    pub async fn search_uploaded(&self, query: &str) -> Result<Option<Scored<AnimeRecord>>> {
        let url = self.url(UPLOADS_PATH)?;
        tracing::debug!(%url, query, "unionfansub uploaded search");
        let resp = self
            .session
            .client()
            .post(url)
            .form(&[("nombre", query)])
            .send()
            .await?;
        let html = ensure_success(resp)?.text().await?;
        let rows = parse_uploaded(&html, &self.base)?;
        Ok(rank_records(query, rows, TieBreak::Recommended))
    }

    /// Best match in the in-progress announcement.
    pub async fn search_uploading(&self, query: &str) -> Result<Option<Scored<AnimeRecord>>> {
        let url = self.url(UPLOADING_PATH)?;
        tracing::debug!(%url, query, "unionfansub uploading search");
        let resp = self.session.client().get(url).send().await?;
        let html = ensure_success(resp)?.text().await?;
        let entries = parse_uploading(&html, &self.base)?;
        Ok(rank_records(query, entries, TieBreak::FirstSeen))
    }
}

#[async_trait]
impl AnimeSource for UnionFansubSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Unionfansub
    }

    fn description(&self) -> &str {
        "Union Fansub uploaded and in-progress listings (form login)"
    }

    async fn search(&self, query: &str) -> Result<Resolution> {
        self.ensure_logged_in().await?;
        let uploaded = self.search_uploaded(query).await?;
        let uploading = self.search_uploading(query).await?;
        tracing::debug!(
            uploaded = uploaded.as_ref().map(|s| s.score),
            uploading = uploading.as_ref().map(|s| s.score),
            "unionfansub path scores"
        );

        Ok(match pick_across(uploaded, uploading) {
            Some(best) => {
                tracing::info!(title = %best.candidate.title, score = best.score, "unionfansub match");
                Resolution::Match {
                    record: best.candidate,
                    score: Some(best.score),
                }
            }
            None => Resolution::NoMatch,
        })
    }
}

/// Parse the uploaded-listing results table.
///
/// Rows without cells (headers) are skipped; rows too short or without a
/// title link are skipped with a warning.
pub fn parse_uploaded(html: &str, base: &Url) -> Result<Vec<AnimeRecord>> {
    let document = Html::parse_document(html);
    let row_sel = selector("tr.trow2")?;
    let cell_sel = selector("td")?;

    let mut records = Vec::new();
    for row in document.select(&row_sel) {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
        if cells.is_empty() {
            continue;
        }
        match parse_uploaded_row(row, &cells, base)? {
            Some(record) => records.push(record),
            None => tracing::warn!(row = %element_text(row), "skipping malformed uploaded row"),
        }
    }
    Ok(records)
}

fn parse_uploaded_row(
    row: ElementRef<'_>,
    cells: &[ElementRef<'_>],
    base: &Url,
) -> Result<Option<AnimeRecord>> {
    if cells.len() < UPLOADED_COLUMNS {
        return Ok(None);
    }
    let link_sel = selector("a")?;
    let source_sel = selector("span.source")?;
    let resolution_sel = selector("span.resolucion")?;
    let tagged_sel = selector("span[title]")?;

    let Some(url) = link_url(cells[0], &link_sel, base) else {
        return Ok(None);
    };
    let Some((seeders, leechers)) = split_ratio_cell(&element_text(cells[7])) else {
        return Ok(None);
    };

    let source_format = cells[2]
        .select(&source_sel)
        .next()
        .and_then(|s| s.value().attr("title"))
        .map(|s| s.trim().to_string());
    let resolution = cells[2]
        .select(&resolution_sel)
        .next()
        .map(element_text)
        .filter(|r| !r.is_empty());

    Ok(Some(AnimeRecord {
        group: Some(element_text(cells[1])).filter(|g| !g.is_empty()),
        source_format,
        resolution,
        audio_languages: Some(attr_values(cells[3], &tagged_sel, "title")),
        subtitle_languages: Some(attr_values(cells[4], &tagged_sel, "title")),
        episodes: parse_episode_count(&element_text(cells[5])),
        servers: Some(attr_values(cells[6], &tagged_sel, "title")),
        seeders: Some(seeders),
        leechers: Some(leechers),
        recommended: Some(row.value().classes().any(|c| c == RECOMMENDED_CLASS)),
        ..AnimeRecord::new(SourceKind::Unionfansub.label(), element_text(cells[0]), url)
    }))
}

/// Parse the in-progress announcement's `div.listado` entries.
pub fn parse_uploading(html: &str, base: &Url) -> Result<Vec<AnimeRecord>> {
    let document = Html::parse_document(html);
    let listing_sel = selector("div.listado")?;
    let link_sel = selector("a")?;
    let group_sel = selector("span")?;

    let listing = document
        .select(&listing_sel)
        .next()
        .ok_or_else(|| ResolveError::parse("announcement page has no div.listado"))?;

    let mut records = Vec::new();
    for block in listing
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "div")
    {
        let Some(link) = block.select(&link_sel).next() else {
            tracing::warn!(block = %element_text(block), "skipping uploading entry without link");
            continue;
        };
        let Some(url) = link_url(block, &link_sel, base) else {
            continue;
        };
        let group = block.select(&group_sel).next().and_then(own_text);
        records.push(AnimeRecord {
            group,
            ..AnimeRecord::new(SourceKind::Unionfansub.label(), element_text(link), url)
        });
    }
    Ok(records)
}

/// Absolute URL of the first link inside `element`.
fn link_url(element: ElementRef<'_>, link_sel: &scraper::Selector, base: &Url) -> Option<String> {
    let href = element.select(link_sel).next()?.value().attr("href")?;
    base.join(href.trim()).ok().map(String::from)
}
