use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub crunchyroll: CrunchyrollConfig,
    #[serde(default)]
    pub myanimelist: MyAnimeListConfig,
    #[serde(default)]
    pub unionfansub: UnionFansubConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/58.0.3029.110 Safari/537.3"
        .to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrunchyrollConfig {
    #[serde(default = "default_crunchyroll_url")]
    pub base_url: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

impl Default for CrunchyrollConfig {
    fn default() -> Self {
        Self {
            base_url: default_crunchyroll_url(),
            locale: default_locale(),
            client_id: default_client_id(),
        }
    }
}

fn default_crunchyroll_url() -> String {
    "https://www.crunchyroll.com".to_string()
}
fn default_locale() -> String {
    "es-ES".to_string()
}
fn default_client_id() -> String {
    "cr_web".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MyAnimeListConfig {
    #[serde(default = "default_myanimelist_url")]
    pub base_url: String,
}

impl Default for MyAnimeListConfig {
    fn default() -> Self {
        Self {
            base_url: default_myanimelist_url(),
        }
    }
}

fn default_myanimelist_url() -> String {
    "https://myanimelist.net".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct UnionFansubConfig {
    #[serde(default = "default_unionfansub_url")]
    pub base_url: String,
    /// Environment variable holding the forum username.
    #[serde(default = "default_username_env")]
    pub username_env: String,
    /// Environment variable holding the forum password.
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl Default for UnionFansubConfig {
    fn default() -> Self {
        Self {
            base_url: default_unionfansub_url(),
            username_env: default_username_env(),
            password_env: default_password_env(),
        }
    }
}

fn default_unionfansub_url() -> String {
    "https://foro.unionfansub.com".to_string()
}
fn default_username_env() -> String {
    "UNIONFANSUB_USERNAME".to_string()
}
fn default_password_env() -> String {
    "UNIONFANSUB_PASSWORD".to_string()
}

/// Parse a configured base URL so that relative paths join underneath it.
///
/// `https://host/forum` and `https://host/forum/` both become
/// `https://host/forum/`.
pub fn base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&with_slash).with_context(|| format!("Invalid base URL: {}", raw))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => anyhow::bail!("Unsupported URL scheme '{}' in {}", other, raw),
    }
}

/// Load the configuration file, falling back to built-in defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.http.user_agent.trim().is_empty() {
        anyhow::bail!("http.user_agent must not be empty");
    }

    base_url(&config.crunchyroll.base_url).context("crunchyroll.base_url")?;
    base_url(&config.myanimelist.base_url).context("myanimelist.base_url")?;
    base_url(&config.unionfansub.base_url).context("unionfansub.base_url")?;

    if config.crunchyroll.locale.trim().is_empty() {
        anyhow::bail!("crunchyroll.locale must not be empty");
    }
    if config.crunchyroll.client_id.trim().is_empty() {
        anyhow::bail!("crunchyroll.client_id must not be empty");
    }

    Ok(config)
}
