//! Per-source network sessions and authentication state.
//!
//! A [`Session`] bundles one `reqwest` client (with its connection pool and
//! cookie jar) and, for token-based sources, a cached [`AuthToken`]. The
//! session is an owned value: opening it acquires the client, dropping it
//! tears the pool down, so every exit path of a resolution run releases the
//! connections, including early returns through `?`.
//!
//! # Token cache
//!
//! The cache is read-then-write. Two concurrent callers on a session without
//! a valid token may each run the exchange; the last write wins. Tokens are
//! interchangeable within their validity window so neither caller fails.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::HttpConfig;
use crate::error::{ResolveError, Result};

/// Forum body marker that only appears after a successful login.
pub const LOGIN_SUCCESS_MARKER: &str = "Has iniciado sesión correctamente.";

/// Access token returned by a client-credential exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub token_type: String,
    /// Declared lifetime in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub country: String,
    #[serde(skip, default = "Utc::now")]
    pub obtained_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.obtained_at + Duration::seconds(self.expires_in)
    }

    /// `"<token_type> <access_token>"`
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Fixed client-credential grant used to obtain anonymous tokens.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub token_url: Url,
    pub client_id: String,
}

impl ClientCredentials {
    fn basic_authorization(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:", self.client_id)))
    }
}

/// Network client plus authentication state for one source.
pub struct Session {
    source: &'static str,
    client: Client,
    user_agent: HeaderValue,
    grant: Option<ClientCredentials>,
    token: RwLock<Option<AuthToken>>,
}

impl Session {
    /// Acquire a client for `source`. The cookie store is always enabled so
    /// form-login sessions survive across requests.
    pub fn open(source: &'static str, http: &HttpConfig) -> Result<Self> {
        let user_agent = HeaderValue::from_str(&http.user_agent)?;
        let client = Client::builder()
            .user_agent(user_agent.clone())
            .cookie_store(true)
            .build()?;
        tracing::debug!(source, "session opened");
        Ok(Self {
            source,
            client,
            user_agent,
            grant: None,
            token: RwLock::new(None),
        })
    }

    /// Enable token-based authentication for this session.
    pub fn with_client_credentials(mut self, grant: ClientCredentials) -> Self {
        self.grant = Some(grant);
        self
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The currently cached token, if any (expired or not).
    pub async fn cached_token(&self) -> Option<AuthToken> {
        self.token.read().await.clone()
    }

    /// Headers for the next request.
    ///
    /// Always carries the user agent. With `require_auth`, a valid token is
    /// ensured first (running the exchange when none is cached or the cached
    /// one expired) and sent as `Authorization: <token_type> <access_token>`.
    pub async fn auth_headers(&self, require_auth: bool) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, self.user_agent.clone());
        if !require_auth {
            return Ok(headers);
        }

        let cached = self
            .token
            .read()
            .await
            .clone()
            .filter(|token| !token.is_expired());

        let token = match cached {
            Some(token) => token,
            None => match self.authenticate().await {
                Ok(token) => {
                    *self.token.write().await = Some(token.clone());
                    token
                }
                Err(e) => {
                    *self.token.write().await = None;
                    return Err(e);
                }
            },
        };

        headers.insert(AUTHORIZATION, HeaderValue::from_str(&token.authorization())?);
        Ok(headers)
    }

    /// Run the client-credential exchange against the token endpoint.
    async fn authenticate(&self) -> Result<AuthToken> {
        let grant = self.grant.as_ref().ok_or_else(|| {
            ResolveError::AuthenticationFailed(format!(
                "{} has no token endpoint configured",
                self.source
            ))
        })?;

        let anonymous_id = uuid::Uuid::new_v4().simple().to_string();
        tracing::debug!(source = self.source, url = %grant.token_url, "requesting access token");

        let resp = self
            .client
            .post(grant.token_url.clone())
            .header(USER_AGENT, self.user_agent.clone())
            .header(AUTHORIZATION, grant.basic_authorization())
            .header("ETP-Anonymous-ID", anonymous_id)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&[("grant_type", "client_id")])
            .send()
            .await
            .map_err(|e| {
                ResolveError::AuthenticationFailed(format!("token request failed: {}", e))
            })?;

        if !resp.status().is_success() {
            return Err(ResolveError::AuthenticationFailed(format!(
                "token endpoint returned HTTP {}",
                resp.status().as_u16()
            )));
        }

        let body = resp.text().await.map_err(|e| {
            ResolveError::AuthenticationFailed(format!("token response unreadable: {}", e))
        })?;
        let token: AuthToken = serde_json::from_str(&body).map_err(|e| {
            ResolveError::AuthenticationFailed(format!("token response malformed: {}", e))
        })?;

        tracing::info!(
            source = self.source,
            expires_in = token.expires_in,
            country = %token.country,
            "access token obtained"
        );
        Ok(token)
    }

    /// Form login for cookie-authenticated sources.
    ///
    /// The endpoint may answer 200 on bad credentials, so success is decided
    /// by [`LOGIN_SUCCESS_MARKER`] in the body, not by the status code.
    pub async fn login(&self, url: Url, username: &str, password: &str) -> Result<()> {
        tracing::debug!(source = self.source, %url, "logging in");
        let resp = self
            .client
            .post(url)
            .form(&[
                ("action", "do_login"),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await
            .map_err(|e| ResolveError::AuthenticationFailed(format!("login request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(ResolveError::AuthenticationFailed(format!(
                "login returned HTTP {}",
                resp.status().as_u16()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ResolveError::AuthenticationFailed(format!("login response unreadable: {}", e)))?;
        if !body.contains(LOGIN_SUCCESS_MARKER) {
            return Err(ResolveError::AuthenticationFailed(
                "login page did not confirm the session".to_string(),
            ));
        }

        tracing::info!(source = self.source, "logged in");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::debug!(source = self.source, "session closed");
    }
}

/// Fail with [`ResolveError::Transport`] on a non-success status.
pub fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(ResolveError::Transport {
            url: resp.url().to_string(),
            status: status.as_u16(),
        })
    }
}
