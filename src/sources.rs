use serde::Serialize;

use crate::config::Config;
use crate::traits::SourceKind;

/// Configuration status of one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub source: SourceKind,
    pub base_url: String,
    pub auth: &'static str,
    /// Whether everything needed to query the source is available.
    pub ready: bool,
}

pub fn get_sources(config: &Config) -> Vec<SourceStatus> {
    SourceKind::ALL
        .iter()
        .map(|&source| match source {
            SourceKind::Crunchyroll => SourceStatus {
                source,
                base_url: config.crunchyroll.base_url.clone(),
                auth: "anonymous token",
                ready: true,
            },
            SourceKind::Myanimelist => SourceStatus {
                source,
                base_url: config.myanimelist.base_url.clone(),
                auth: "none",
                ready: true,
            },
            SourceKind::Unionfansub => {
                // Ready only when both credential variables are set.
                let cfg = &config.unionfansub;
                let ready = std::env::var_os(&cfg.username_env).is_some()
                    && std::env::var_os(&cfg.password_env).is_some();
                SourceStatus {
                    source,
                    base_url: cfg.base_url.clone(),
                    auth: "form login",
                    ready,
                }
            }
        })
        .collect()
}

pub fn list_sources(config: &Config) {
    println!("{:<14} {:<16} {:<6} BASE URL", "SOURCE", "AUTH", "READY");
    for status in get_sources(config) {
        println!(
            "{:<14} {:<16} {:<6} {}",
            status.source, status.auth, status.ready, status.base_url
        );
    }
}
