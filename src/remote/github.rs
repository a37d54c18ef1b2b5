//! Production HTTP backend on a blocking `ureq` agent.
//!
//! Requests carry the configured `User-Agent` and, when `GH_NAME` and
//! `GH_TOKEN` are both set, HTTP Basic credentials. Timeouts are the agent's
//! global timeout; bodies are capped at `fetch.max_archive_mb`.

use super::backend::{FetchError, HttpBackend, HttpResponse};
use crate::config::HarvestConfig;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use std::time::Duration;
use tracing::info;
use ureq::Agent;

const USERNAME_VAR: &str = "GH_NAME";
const TOKEN_VAR: &str = "GH_TOKEN";

/// Username/token pair for authenticated API requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read credentials from `GH_NAME`/`GH_TOKEN`. Both must be non-empty.
    pub fn from_env() -> Option<Self> {
        Self::from_pair(
            std::env::var(USERNAME_VAR).ok(),
            std::env::var(TOKEN_VAR).ok(),
        )
    }

    fn from_pair(username: Option<String>, token: Option<String>) -> Option<Self> {
        match (username, token) {
            (Some(username), Some(token)) if !username.is_empty() && !token.is_empty() => {
                Some(Self { username, token })
            }
            _ => None,
        }
    }

    fn authorization(&self) -> String {
        let raw = format!("{}:{}", self.username, self.token);
        format!("Basic {}", BASE64_STANDARD.encode(raw))
    }
}

/// Blocking HTTP backend shared by all download workers.
pub struct UreqBackend {
    agent: Agent,
    user_agent: String,
    authorization: Option<String>,
    max_body_bytes: u64,
}

impl UreqBackend {
    pub fn new(config: &HarvestConfig, credentials: Option<Credentials>) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.fetch.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        match &credentials {
            Some(c) => info!("API requests authenticated as {:?}", c.username),
            None => info!("no {USERNAME_VAR}/{TOKEN_VAR} set, requests are unauthenticated"),
        }

        Self {
            agent,
            user_agent: config.repository.user_agent.clone(),
            authorization: credentials.as_ref().map(Credentials::authorization),
            max_body_bytes: config.fetch.max_archive_mb.saturating_mul(1024 * 1024),
        }
    }

    /// Backend configured from the environment.
    pub fn from_env(config: &HarvestConfig) -> Self {
        Self::new(config, Credentials::from_env())
    }
}

impl HttpBackend for UreqBackend {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let mut request = self.agent.get(url).header("User-Agent", &self.user_agent);
        if let Some(auth) = &self.authorization {
            request = request.header("Authorization", auth);
        }

        let response = request.call().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(FetchError::Http {
                url: url.to_string(),
                status,
            });
        }

        let link = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .into_body()
            .with_config()
            .limit(self.max_body_bytes)
            .read_to_vec()
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(HttpResponse { body, link })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_require_both_values() {
        assert!(Credentials::from_pair(Some("me".into()), None).is_none());
        assert!(Credentials::from_pair(None, Some("tok".into())).is_none());
        assert!(Credentials::from_pair(Some("".into()), Some("tok".into())).is_none());
        assert!(Credentials::from_pair(Some("me".into()), Some("tok".into())).is_some());
    }

    #[test]
    fn authorization_is_basic_base64() {
        let creds = Credentials {
            username: "user".into(),
            token: "pass".into(),
        };
        assert_eq!(creds.authorization(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn debug_redacts_token() {
        let creds = Credentials {
            username: "user".into(),
            token: "secret".into(),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("user"));
        assert!(!shown.contains("secret"));
    }
}
