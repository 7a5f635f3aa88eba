//! Session Authentication
//!
//! [`AuthCapability`] is the opaque capability the root methods call:
//! verify a session, issue one, or revoke it. Issuing and revoking return
//! headers, which the caller merges into the request context so they reach
//! the HTTP response.
//!
//! [`CookieAuth`] implements it with an HMAC-SHA256 signed token,
//! `base64url(payload).base64url(mac)`, where the payload is
//! `{"email", "iat", "exp"}` with Unix-second timestamps. The token travels
//! in an `HttpOnly` cookie, or in an `Authorization: Bearer` header.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use hyper::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tandem_common::RpcError;

use crate::config::ServerConfig;

type HmacSha256 = Hmac<Sha256>;

/// Sign-in credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// A verified session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    #[serde(rename = "iat")]
    pub issued_at: u64,
    #[serde(rename = "exp")]
    pub expires_at: u64,
}

/// A freshly issued session token and the headers that install it.
#[derive(Debug, Clone)]
pub struct SignedSession {
    pub token: String,
    pub headers: HeaderMap,
}

#[async_trait]
pub trait AuthCapability: Send + Sync {
    /// Verifies the session carried by request `headers`.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Session, RpcError>;

    /// Issues a session for `credentials`.
    async fn sign(&self, credentials: Credentials) -> Result<SignedSession, RpcError>;

    /// Revokes the session; the returned headers expire it on the client.
    async fn destroy(&self) -> Result<HeaderMap, RpcError>;
}

/// Cookie-based [`AuthCapability`].
#[derive(Clone)]
pub struct CookieAuth {
    secret: Vec<u8>,
    cookie: String,
    ttl: Duration,
}

impl CookieAuth {
    pub fn new(secret: impl AsRef<[u8]>, cookie: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            cookie: cookie.into(),
            ttl,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(&config.auth_secret, config.auth_cookie.clone(), config.session_ttl)
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie
    }

    fn mac(&self) -> Result<HmacSha256, RpcError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| RpcError::internal())
    }

    /// Issues a token for `email` valid from `now` (Unix seconds).
    pub fn issue_token(&self, email: &str, now: u64) -> Result<String, RpcError> {
        let session = Session {
            email: email.to_string(),
            issued_at: now,
            expires_at: now.saturating_add(self.ttl.as_secs()),
        };
        let payload = serde_json::to_vec(&session).map_err(|_| RpcError::internal())?;
        let payload = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", payload, signature))
    }

    /// Verifies `token` at time `now` (Unix seconds).
    pub fn verify_token(&self, token: &str, now: u64) -> Result<Session, RpcError> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| RpcError::unauthorized("Malformed token"))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| RpcError::unauthorized("Malformed token"))?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| RpcError::unauthorized("Invalid token signature"))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| RpcError::unauthorized("Malformed token"))?;
        let session: Session = serde_json::from_slice(&payload)
            .map_err(|_| RpcError::unauthorized("Malformed token"))?;

        if session.expires_at <= now {
            return Err(RpcError::unauthorized("Token expired"));
        }
        Ok(session)
    }

    /// Pulls the token out of the session cookie or a bearer header.
    fn token_from(&self, headers: &HeaderMap) -> Option<String> {
        let from_cookie = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie)
            .map(|(_, value)| value.to_string());

        from_cookie.or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
        })
    }

    fn set_cookie(&self, value: &str, max_age: u64) -> Result<HeaderMap, RpcError> {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie, value, max_age
        );
        let value = HeaderValue::from_str(&cookie).map_err(|_| RpcError::internal())?;

        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, value);
        Ok(headers)
    }
}

impl std::fmt::Debug for CookieAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieAuth")
            .field("cookie", &self.cookie)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[async_trait]
impl AuthCapability for CookieAuth {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Session, RpcError> {
        let token = self
            .token_from(headers)
            .ok_or_else(|| RpcError::unauthorized("Unauthorized"))?;
        self.verify_token(&token, unix_now())
    }

    async fn sign(&self, credentials: Credentials) -> Result<SignedSession, RpcError> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(RpcError::bad_request("Email and password are required"));
        }

        let token = self.issue_token(credentials.email.trim(), unix_now())?;
        let headers = self.set_cookie(&token, self.ttl.as_secs())?;
        tracing::debug!(email = %credentials.email.trim(), "Issued session");

        Ok(SignedSession { token, headers })
    }

    async fn destroy(&self) -> Result<HeaderMap, RpcError> {
        self.set_cookie("", 0)
    }
}
