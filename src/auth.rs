//! Access gate for admin pages and mutating routes.
//!
//! The gate answers one question: does this request carry a valid session?
//! Sessions are issued elsewhere; the token is read from
//! `Authorization: Bearer <token>` or from the session cookie and handed to
//! the configured [`SessionVerifier`]s. Any verifier accepting the token is
//! enough.

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::AuthConfig;

/// Decides whether a session token is valid.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<bool>;
}

/// Accepts tokens whose SHA-256 matches one of a configured set of digests.
pub struct StaticTokenVerifier {
    digests: Vec<String>,
}

impl StaticTokenVerifier {
    pub fn new(digests: &[String]) -> Self {
        Self {
            digests: digests.iter().map(|d| d.to_ascii_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl SessionVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<bool> {
        let digest = hex::encode(Sha256::digest(token.as_bytes()));
        Ok(self.digests.iter().any(|d| *d == digest))
    }
}

/// Asks the external authentication service about a token.
///
/// The token is forwarded as a bearer header. 2xx means valid, 401/403
/// means invalid, anything else is an error.
pub struct RemoteSessionVerifier {
    url: String,
    client: reqwest::Client,
}

impl RemoteSessionVerifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SessionVerifier for RemoteSessionVerifier {
    async fn verify(&self, token: &str) -> Result<bool> {
        let resp = self
            .client
            .get(&self.url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Session check against {} failed: {}", self.url, e))?;

        let status = resp.status();
        if status.is_success() {
            Ok(true)
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            Ok(false)
        } else {
            bail!("Session service returned HTTP {}", status)
        }
    }
}

/// The capability check consumed by every admin page and mutating route.
pub struct AccessGate {
    verifiers: Vec<Box<dyn SessionVerifier>>,
    cookie_name: String,
    login_path: String,
}

impl AccessGate {
    pub fn new(
        verifiers: Vec<Box<dyn SessionVerifier>>,
        cookie_name: impl Into<String>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            verifiers,
            cookie_name: cookie_name.into(),
            login_path: login_path.into(),
        }
    }

    /// Build the gate from `[auth]`: static digests first, then the remote
    /// service if one is configured.
    pub fn from_config(config: &AuthConfig) -> Self {
        let mut verifiers: Vec<Box<dyn SessionVerifier>> = Vec::new();
        if !config.token_sha256.is_empty() {
            verifiers.push(Box::new(StaticTokenVerifier::new(&config.token_sha256)));
        }
        if let Some(ref url) = config.verify_url {
            verifiers.push(Box::new(RemoteSessionVerifier::new(url.clone())));
        }
        Self::new(verifiers, &config.cookie_name, &config.login_path)
    }

    /// Where unauthenticated page viewers are sent.
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Pull the session token from the bearer header or the session cookie.
    pub fn extract_token(&self, headers: &HeaderMap) -> Option<String> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if bearer.is_some() {
            return bearer;
        }

        let prefix = format!("{}=", self.cookie_name);
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .map(str::trim)
            .find_map(|cookie| cookie.strip_prefix(prefix.as_str()))
            .map(str::to_string)
            .filter(|t| !t.is_empty())
    }

    /// True if the request carries a token some verifier accepts.
    pub async fn is_authenticated(&self, headers: &HeaderMap) -> Result<bool> {
        let Some(token) = self.extract_token(headers) else {
            return Ok(false);
        };
        for verifier in &self.verifiers {
            if verifier.verify(&token).await? {
                return Ok(true);
            }
        }
        warn!("rejected session token");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    // sha256("test")
    const TEST_DIGEST: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    fn gate() -> AccessGate {
        AccessGate::new(
            vec![Box::new(StaticTokenVerifier::new(&[TEST_DIGEST.to_uppercase()]))],
            "folio_session",
            "/login",
        )
    }

    fn headers(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn test_extract_bearer() {
        let h = headers(header::AUTHORIZATION, "Bearer abc ");
        assert_eq!(gate().extract_token(&h).as_deref(), Some("abc"));
    }

    #[test]
    fn test_extract_cookie() {
        let h = headers(header::COOKIE, "theme=dark; folio_session=xyz; other=1");
        assert_eq!(gate().extract_token(&h).as_deref(), Some("xyz"));

        let h = headers(header::COOKIE, "folio_session_old=nope");
        assert_eq!(gate().extract_token(&h), None);
    }

    #[tokio::test]
    async fn test_static_token_accepted() {
        let h = headers(header::AUTHORIZATION, "Bearer test");
        assert!(gate().is_authenticated(&h).await.unwrap());

        let h = headers(header::COOKIE, "folio_session=wrong");
        assert!(!gate().is_authenticated(&h).await.unwrap());

        assert!(!gate().is_authenticated(&HeaderMap::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_no_verifiers_rejects_everything() {
        let gate = AccessGate::new(Vec::new(), "s", "/login");
        let h = headers(header::AUTHORIZATION, "Bearer test");
        assert!(!gate.is_authenticated(&h).await.unwrap());
    }
}
