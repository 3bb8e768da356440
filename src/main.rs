//! # anime-scout CLI (`scout`)
//!
//! ## Usage
//!
//! ```bash
//! scout --config ./config/scout.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scout search <source> "<query>"` | Run one adapter and print its raw outcome as JSON |
//! | `scout resolve "<query>"` | Query every source and print one result per source |
//! | `scout sources` | List sources and whether they are ready |
//!
//! Logs go to stderr and are controlled by `RUST_LOG` (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use anime_scout::{config, resolve, sources, traits::SourceKind};

/// Resolve anime titles into structured metadata.
#[derive(Parser)]
#[command(
    name = "scout",
    about = "Resolve a free-text anime title into structured metadata",
    version,
    long_about = "anime-scout queries Crunchyroll, MyAnimeList and Union Fansub, normalizes their \
    results into one record shape, and picks the best match for a title using fuzzy similarity."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/scout.toml`. Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/scout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query a single source and print its outcome as JSON.
    ///
    /// Crunchyroll prints every candidate unranked; MyAnimeList and
    /// Union Fansub print their single best record.
    Search {
        /// Source to query.
        #[arg(value_enum)]
        source: SourceKind,

        /// The title to look up.
        query: String,
    },

    /// Query every source (or the selected ones) and report the best match per source.
    Resolve {
        /// The title to look up.
        query: String,

        /// Restrict to these sources (repeatable).
        #[arg(long = "source", value_enum)]
        sources: Vec<SourceKind>,

        /// Print the reports as JSON instead of one line per source.
        #[arg(long)]
        json: bool,
    },

    /// List sources, their base URLs and whether they are ready.
    Sources,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Search { source, query } => {
            let adapter = source.open(&cfg)?;
            let resolution = match adapter.search(&query).await {
                Ok(resolution) => resolution,
                Err(e) => {
                    let kind = e.kind();
                    return Err(anyhow::Error::new(e).context(format!("{} failed ({})", source, kind)));
                }
            };
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
        Commands::Resolve {
            query,
            sources,
            json,
        } => {
            let kinds = if sources.is_empty() {
                SourceKind::ALL.to_vec()
            } else {
                sources
            };
            let reports = resolve::resolve_all(&cfg, &kinds, &query).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    println!("{}", resolve::render_report(report));
                }
            }

            if reports.iter().all(|r| r.is_failure()) {
                anyhow::bail!("every source failed for \"{}\"", query);
            }
        }
        Commands::Sources => {
            sources::list_sources(&cfg);
        }
    }

    Ok(())
}
