//! Platform identifiers and the grant flow each platform uses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a supported social platform connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlatformId {
    #[serde(rename = "tiktok")]
    TikTok,
    #[serde(rename = "facebook")]
    Facebook,
    #[serde(rename = "linkedin")]
    LinkedIn,
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TikTok => write!(f, "tiktok"),
            Self::Facebook => write!(f, "facebook"),
            Self::LinkedIn => write!(f, "linkedin"),
        }
    }
}

impl std::str::FromStr for PlatformId {
    type Err = crate::PatchbotError;

    /// Parse a platform name or well-known alias into a [`PlatformId`].
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::Configuration`](crate::PatchbotError::Configuration)
    /// if the string does not match any known platform name or alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tiktok" | "tik_tok" => Ok(Self::TikTok),
            "facebook" | "fb" | "meta" => Ok(Self::Facebook),
            "linkedin" | "li" => Ok(Self::LinkedIn),
            other => Err(crate::PatchbotError::Configuration(format!(
                "unknown platform: {other}"
            ))),
        }
    }
}

impl PlatformId {
    /// Returns all known platform variants.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::TikTok, Self::Facebook, Self::LinkedIn]
    }
}

/// The OAuth grant a platform uses to obtain its first access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantFlow {
    /// Client id + secret only, no user redirect.
    ClientCredentials,
    /// User-facing redirect followed by a code exchange.
    AuthorizationCode,
}

impl GrantFlow {
    /// Whether the flow needs a redirect URI and a browser round trip.
    #[must_use]
    pub const fn requires_redirect(self) -> bool {
        matches!(self, Self::AuthorizationCode)
    }
}

impl fmt::Display for GrantFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientCredentials => write!(f, "client_credentials"),
            Self::AuthorizationCode => write!(f, "authorization_code"),
        }
    }
}

/// How a token request body is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyEncoding {
    #[default]
    Form,
    Json,
}
