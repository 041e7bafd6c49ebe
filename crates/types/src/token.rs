//! Credential, token state and status snapshot types.

use crate::{BodyEncoding, PlatformId};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use std::{
    collections::BTreeSet,
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Seconds since the unix epoch.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// One OAuth client registration for one platform.
///
/// `client_secret` stays wrapped; its `Debug` output is redacted.
#[derive(Debug)]
pub struct Credential {
    pub platform: PlatformId,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Required for authorization-code flows, absent for client credentials.
    pub redirect_uri: Option<String>,
    /// Requested scopes; empty means the platform defaults.
    pub scopes: Vec<String>,
}

impl Credential {
    /// Create a credential without redirect URI or explicit scopes.
    pub fn new(
        platform: PlatformId,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            redirect_uri: None,
            scopes: Vec::new(),
        }
    }

    /// Attach the redirect URI registered with the platform.
    #[must_use]
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Request explicit scopes instead of the platform defaults.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

/// The access credential currently held for one platform connection.
///
/// Always replaced as a whole; `expires_at > issued_at` holds by construction.
#[derive(Debug)]
pub struct TokenState {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub issued_at: u64,
    pub expires_at: u64,
    pub scope: BTreeSet<String>,
}

impl TokenState {
    /// Create a token issued now that lives for `lifetime` (at least one second).
    pub fn new(access_token: impl Into<String>, lifetime: Duration) -> Self {
        Self::from_secret(SecretString::from(access_token.into()), lifetime)
    }

    /// Same as [`TokenState::new`] for a token that is already wrapped.
    #[must_use]
    pub fn from_secret(access_token: SecretString, lifetime: Duration) -> Self {
        let issued_at = unix_now();
        Self {
            access_token,
            refresh_token: None,
            issued_at,
            expires_at: issued_at.saturating_add(lifetime.as_secs().max(1)),
            scope: BTreeSet::new(),
        }
    }

    /// Attach a refresh token.
    #[must_use]
    pub fn with_refresh(mut self, refresh_token: Option<SecretString>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    /// Set the granted scope.
    #[must_use]
    pub fn with_scope(mut self, scope: BTreeSet<String>) -> Self {
        self.scope = scope;
        self
    }
}

/// Split a scope string on commas and whitespace.
#[must_use]
pub fn parse_scope(scope: &str) -> BTreeSet<String> {
    scope
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A parsed token endpoint response.
#[derive(Debug)]
pub struct TokenGrant {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

impl TokenGrant {
    /// A grant carrying only an access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: None,
            expires_in: None,
            scope: None,
        }
    }

    /// Set the advertised lifetime in seconds.
    #[must_use]
    pub fn with_expires_in(mut self, expires_in: u64) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Attach a refresh token.
    #[must_use]
    pub fn with_refresh(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(SecretString::from(refresh_token.into()));
        self
    }

    /// Attach the granted scope string.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// A POST to a platform token endpoint.
///
/// Parameter values may hold secrets, so `Debug` prints parameter names only.
pub struct TokenRequest {
    pub url: String,
    pub encoding: BodyEncoding,
    pub params: Vec<(&'static str, String)>,
}

impl TokenRequest {
    /// Value of the first parameter named `key`.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `grant_type` parameter, if any.
    #[must_use]
    pub fn grant_type(&self) -> Option<&str> {
        self.param("grant_type")
    }
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.params.iter().map(|(k, _)| *k).collect();
        f.debug_struct("TokenRequest")
            .field("url", &self.url)
            .field("encoding", &self.encoding)
            .field("params", &keys)
            .finish()
    }
}

/// Lifecycle state of one platform connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    /// Waiting for the authorization redirect to come back.
    Authorizing,
    Connected,
    /// A token is held but past its expiry.
    Expired,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Authorizing => write!(f, "authorizing"),
            Self::Connected => write!(f, "connected"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Read-only snapshot of a connection for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub platform: PlatformId,
    pub state: ConnectionState,
    pub has_token: bool,
    pub is_valid: bool,
    /// Unix seconds.
    pub expires_at: Option<u64>,
    pub time_until_expiry: Option<Duration>,
    pub has_refresh_token: bool,
    /// Delay until the armed refresh fires.
    pub next_refresh_in: Option<Duration>,
}

impl TokenStatus {
    /// Status of a connection holding nothing.
    #[must_use]
    pub fn disconnected(platform: PlatformId, state: ConnectionState) -> Self {
        Self {
            platform,
            state,
            has_token: false,
            is_valid: false,
            expires_at: None,
            time_until_expiry: None,
            has_refresh_token: false,
            next_refresh_in: None,
        }
    }

    /// One-line human readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        use std::fmt::Write as _;
        let mut out = format!("{}: {}", self.platform, self.state);
        if let Some(left) = self.time_until_expiry {
            let _ = write!(out, ", expires in {}", human(left));
        }
        if let Some(next) = self.next_refresh_in {
            let _ = write!(out, ", refresh in {}", human(next));
        }
        if self.has_refresh_token {
            out.push_str(", refresh token held");
        }
        out
    }
}

fn human(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// Copy a secret into a fresh wrapper without leaving it exposed.
#[must_use]
pub fn duplicate_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}
