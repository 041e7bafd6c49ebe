//! Facebook Login (Graph API) authorization-code flow.
//!
//! Facebook issues no refresh token. A held user token is renewed by trading
//! it for a long-lived one with `grant_type=fb_exchange_token`.

use crate::profile::{PlatformProfile, RefreshGrant};
use patchbot_types::{BodyEncoding, GrantFlow, PlatformId};
use std::time::Duration;

/// Graph API version the endpoints are pinned to.
pub const GRAPH_VERSION: &str = "v19.0";

/// Facebook OAuth dialog.
pub const AUTH_URL: &str = "https://www.facebook.com/v19.0/dialog/oauth";

/// Facebook token endpoint (code exchange and long-lived token exchange).
pub const TOKEN_URL: &str = "https://graph.facebook.com/v19.0/oauth/access_token";

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: &[&str] = &[
    "pages_show_list",
    "pages_manage_posts",
    "pages_read_engagement",
];

/// Long-lived user tokens last about sixty days.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(60 * 24 * 3600);

#[must_use]
pub fn profile() -> PlatformProfile {
    PlatformProfile {
        platform: PlatformId::Facebook,
        flow: GrantFlow::AuthorizationCode,
        auth_url: AUTH_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        default_scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect(),
        scope_separator: ",",
        client_id_param: "client_id",
        encoding: BodyEncoding::Form,
        refresh: RefreshGrant::ExchangeAccessToken {
            grant_type: "fb_exchange_token",
            param: "fb_exchange_token",
        },
        default_lifetime: DEFAULT_LIFETIME,
    }
}
