//! The common adapter interface and the closed set of sources behind it.
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │              SourceKind::open               │
//! │  ┌────────────┐ ┌────────────┐ ┌─────────┐  │
//! │  │Crunchyroll │ │MyAnimeList │ │ Union   │  │
//! │  │  catalog   │ │encyclopedia│ │ Fansub  │  │
//! │  └────────────┘ └────────────┘ └─────────┘  │
//! └──────────────────────┬─────────────────────┘
//!                        ▼
//!              search(query) → Resolution
//! ```
//!
//! There is no registration mechanism: [`SourceKind`] enumerates every
//! supported source and builds its adapter.

use anyhow::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use serde::Serialize;

use crate::config::Config;
use crate::error::ResolveError;
use crate::models::Resolution;
use crate::source_crunchyroll::CrunchyrollSource;
use crate::source_myanimelist::MyAnimeListSource;
use crate::source_unionfansub::UnionFansubSource;

/// A source adapter: turns a query into normalized candidates.
///
/// Each adapter owns its [`Session`](crate::session::Session); dropping the
/// adapter releases the network client.
#[async_trait]
pub trait AnimeSource: Send + Sync {
    /// Which source this adapter talks to.
    fn kind(&self) -> SourceKind;

    /// One-line description for `scout sources`.
    fn description(&self) -> &str;

    /// Query the source.
    ///
    /// Transport and authentication failures propagate unchanged; missing
    /// optional fields never raise.
    async fn search(&self, query: &str) -> std::result::Result<Resolution, ResolveError>;
}

/// Every supported source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Streaming catalog; returns unranked candidates.
    Crunchyroll,
    /// Encyclopedia; trusts upstream ordering and returns one detailed record.
    Myanimelist,
    /// Forum upload listings; ranks locally.
    Unionfansub,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Crunchyroll,
        SourceKind::Myanimelist,
        SourceKind::Unionfansub,
    ];

    /// Source label used in records and reports.
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Crunchyroll => "crunchyroll",
            SourceKind::Myanimelist => "myanimelist",
            SourceKind::Unionfansub => "unionfansub",
        }
    }

    /// Open a session and build the adapter for this source.
    ///
    /// Fails when the configuration is unusable or, for the forum, when the
    /// credentials are not present in the environment.
    pub fn open(self, config: &Config) -> Result<Box<dyn AnimeSource>> {
        let source: Box<dyn AnimeSource> = match self {
            SourceKind::Crunchyroll => Box::new(CrunchyrollSource::new(&config.http, &config.crunchyroll)?),
            SourceKind::Myanimelist => {
                Box::new(MyAnimeListSource::new(&config.http, &config.myanimelist)?)
            }
            SourceKind::Unionfansub => {
                Box::new(UnionFansubSource::from_env(&config.http, &config.unionfansub)?)
            }
        };
        Ok(source)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}
