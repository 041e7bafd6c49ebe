//! LinkedIn OAuth 2.0 (3-legged) authorization-code flow.
//!
//! Approved apps receive a refresh token alongside the access token; both the
//! code exchange and the refresh are form-encoded POSTs to the same endpoint.

use crate::profile::{PlatformProfile, RefreshGrant};
use patchbot_types::{BodyEncoding, GrantFlow, PlatformId};
use std::time::Duration;

/// LinkedIn authorization endpoint.
pub const AUTH_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";

/// LinkedIn token endpoint.
pub const TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "w_member_social"];

/// Access tokens last sixty days.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(60 * 24 * 3600);

#[must_use]
pub fn profile() -> PlatformProfile {
    PlatformProfile {
        platform: PlatformId::LinkedIn,
        flow: GrantFlow::AuthorizationCode,
        auth_url: AUTH_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        default_scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect(),
        scope_separator: " ",
        client_id_param: "client_id",
        encoding: BodyEncoding::Form,
        refresh: RefreshGrant::RefreshToken,
        default_lifetime: DEFAULT_LIFETIME,
    }
}
