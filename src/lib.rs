//! # anime-scout
//!
//! Resolve a free-text anime title into structured metadata from three
//! independent sources that share nothing: a streaming catalog API, an
//! encyclopedia site and a fansub forum.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────┐   ┌───────────┐
//! │   Session    │──▶│   Source     │──▶│ Extract  │──▶│  Matcher  │
//! │ client+token │   │  adapters    │   │ helpers  │   │ + ranking │
//! └──────────────┘   └─────────────┘   └──────────┘   └─────┬─────┘
//!                                                           ▼
//!                                                    one AnimeRecord
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scout search myanimelist "Cowboy Bebop"
//! scout resolve "Frieren"
//! scout sources
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Normalized records and outcomes |
//! | [`session`] | Network client and authentication state |
//! | [`extract`] | Defensive field extraction |
//! | [`matcher`] | Fuzzy similarity and ranking |
//! | [`traits`] | Adapter interface and source set |
//! | [`source_crunchyroll`] | Streaming catalog adapter |
//! | [`source_myanimelist`] | Encyclopedia adapter |
//! | [`source_unionfansub`] | Forum adapter |
//! | [`resolve`] | Cross-source driver |
//! | [`sources`] | Source status listing |

pub mod config;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod models;
pub mod resolve;
pub mod session;
pub mod source_crunchyroll;
pub mod source_myanimelist;
pub mod source_unionfansub;
pub mod sources;
pub mod traits;
