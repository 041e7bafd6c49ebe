//! TikTok for Developers OAuth v2.
//!
//! The content-posting integration authenticates as the app itself, so the
//! connection uses the client-credentials grant. TikTok names the client id
//! `client_key` and has no refresh token for this grant; renewal re-runs the
//! exchange.

use crate::profile::{PlatformProfile, RefreshGrant};
use patchbot_types::{BodyEncoding, GrantFlow, PlatformId};
use std::time::Duration;

/// TikTok OAuth authorization endpoint (Login Kit).
pub const AUTH_URL: &str = "https://www.tiktok.com/v2/auth/authorize/";

/// TikTok OAuth token endpoint.
pub const TOKEN_URL: &str = "https://open.tiktokapis.com/v2/oauth/token/";

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: &[&str] = &["user.info.basic", "video.list"];

/// Client access tokens live two hours.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(7200);

#[must_use]
pub fn profile() -> PlatformProfile {
    PlatformProfile {
        platform: PlatformId::TikTok,
        flow: GrantFlow::ClientCredentials,
        auth_url: AUTH_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        default_scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect(),
        scope_separator: ",",
        client_id_param: "client_key",
        encoding: BodyEncoding::Form,
        refresh: RefreshGrant::ClientCredentials,
        default_lifetime: DEFAULT_LIFETIME,
    }
}
