//! Per-platform OAuth endpoint profiles and token request builders.
//!
//! A [`PlatformProfile`] captures everything that differs between platforms:
//! endpoints, grant flow, parameter naming, scope syntax and how a token is
//! renewed. The lifecycle manager itself is platform-agnostic.

use patchbot_config::PlatformConfig;
use patchbot_types::{
    BodyEncoding, Credential, GrantFlow, PatchbotError, PlatformId, TokenRequest, TokenState,
    traits::Result,
};
use secrecy::ExposeSecret as _;
use std::time::Duration;
use url::Url;

use crate::{facebook, linkedin, tiktok};

/// How a held token is renewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshGrant {
    /// Standard `grant_type=refresh_token`.
    RefreshToken,
    /// Trade the current access token for a fresh one (Facebook long-lived tokens).
    ExchangeAccessToken {
        grant_type: &'static str,
        param: &'static str,
    },
    /// Run the client-credentials exchange again.
    ClientCredentials,
}

/// OAuth endpoints and quirks of one platform.
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub platform: PlatformId,
    pub flow: GrantFlow,
    pub auth_url: String,
    pub token_url: String,
    pub default_scopes: Vec<String>,
    pub scope_separator: &'static str,
    /// Name of the client id parameter (`client_key` on TikTok).
    pub client_id_param: &'static str,
    pub encoding: BodyEncoding,
    pub refresh: RefreshGrant,
    /// Used when a token response carries no `expires_in`.
    pub default_lifetime: Duration,
}

impl PlatformProfile {
    /// Built-in profile of a platform.
    #[must_use]
    pub fn for_platform(platform: PlatformId) -> Self {
        match platform {
            PlatformId::TikTok => tiktok::profile(),
            PlatformId::Facebook => facebook::profile(),
            PlatformId::LinkedIn => linkedin::profile(),
        }
    }

    /// Apply endpoint overrides from configuration.
    #[must_use]
    pub fn with_overrides(mut self, config: &PlatformConfig) -> Self {
        if let Some(url) = &config.auth_url {
            self.auth_url.clone_from(url);
        }
        if let Some(url) = &config.token_url {
            self.token_url.clone_from(url);
        }
        self
    }

    /// Check that a credential can drive this platform's flow.
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::Configuration`] when the credential belongs to
    /// another platform, the client id or secret is empty, or an
    /// authorization-code platform lacks an absolute `http(s)` redirect URI.
    pub fn validate(&self, credential: &Credential) -> Result<()> {
        if credential.platform != self.platform {
            return Err(PatchbotError::Configuration(format!(
                "credential for {} given to {} connection",
                credential.platform, self.platform
            )));
        }
        if credential.client_id.trim().is_empty() {
            return Err(PatchbotError::Configuration(format!(
                "{}: client_id is empty",
                self.platform
            )));
        }
        if credential.client_secret.expose_secret().trim().is_empty() {
            return Err(PatchbotError::Configuration(format!(
                "{}: client_secret is empty",
                self.platform
            )));
        }
        if self.flow.requires_redirect() {
            let raw = credential.redirect_uri.as_deref().ok_or_else(|| {
                PatchbotError::Configuration(format!("{}: redirect_uri is required", self.platform))
            })?;
            validate_redirect_uri(raw)
                .map_err(|msg| PatchbotError::Configuration(format!("{}: {msg}", self.platform)))?;
        }
        Ok(())
    }

    /// Scopes to request, joined with the platform's separator.
    #[must_use]
    pub fn scope_param(&self, credential: &Credential) -> String {
        if credential.scopes.is_empty() {
            self.default_scopes.join(self.scope_separator)
        } else {
            credential.scopes.join(self.scope_separator)
        }
    }

    /// Build the user-facing authorization URL.
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::Configuration`] if the profile's authorization
    /// endpoint is not a valid URL or the credential has no redirect URI.
    pub fn authorization_url(&self, credential: &Credential, state: &str) -> Result<String> {
        let redirect_uri = credential.redirect_uri.as_deref().ok_or_else(|| {
            PatchbotError::Configuration(format!("{}: redirect_uri is required", self.platform))
        })?;
        let scope = self.scope_param(credential);
        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                (self.client_id_param, credential.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| {
            PatchbotError::Configuration(format!("{}: invalid auth_url: {e}", self.platform))
        })?;
        Ok(url.into())
    }

    /// Request for the client-credentials grant.
    #[must_use]
    pub fn client_credentials_request(&self, credential: &Credential) -> TokenRequest {
        self.request(vec![
            (self.client_id_param, credential.client_id.clone()),
            (
                "client_secret",
                credential.client_secret.expose_secret().to_owned(),
            ),
            ("grant_type", "client_credentials".to_string()),
        ])
    }

    /// Request exchanging an authorization code.
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::Configuration`] if the credential has no redirect URI.
    pub fn authorization_code_request(
        &self,
        credential: &Credential,
        code: &str,
    ) -> Result<TokenRequest> {
        let redirect_uri = credential.redirect_uri.clone().ok_or_else(|| {
            PatchbotError::Configuration(format!("{}: redirect_uri is required", self.platform))
        })?;
        Ok(self.request(vec![
            (self.client_id_param, credential.client_id.clone()),
            (
                "client_secret",
                credential.client_secret.expose_secret().to_owned(),
            ),
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri),
        ]))
    }

    /// Request renewing `token` with the platform's refresh grant.
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::RefreshUnavailable`] when the platform renews
    /// through a refresh token and none is held.
    pub fn refresh_request(&self, credential: &Credential, token: &TokenState) -> Result<TokenRequest> {
        match &self.refresh {
            RefreshGrant::ClientCredentials => Ok(self.client_credentials_request(credential)),
            RefreshGrant::RefreshToken => {
                let refresh_token = token
                    .refresh_token
                    .as_ref()
                    .ok_or(PatchbotError::RefreshUnavailable(self.platform))?;
                Ok(self.request(vec![
                    (self.client_id_param, credential.client_id.clone()),
                    (
                        "client_secret",
                        credential.client_secret.expose_secret().to_owned(),
                    ),
                    ("grant_type", "refresh_token".to_string()),
                    ("refresh_token", refresh_token.expose_secret().to_owned()),
                ]))
            }
            RefreshGrant::ExchangeAccessToken { grant_type, param } => Ok(self.request(vec![
                (self.client_id_param, credential.client_id.clone()),
                (
                    "client_secret",
                    credential.client_secret.expose_secret().to_owned(),
                ),
                ("grant_type", (*grant_type).to_string()),
                (*param, token.access_token.expose_secret().to_owned()),
            ])),
        }
    }

    fn request(&self, params: Vec<(&'static str, String)>) -> TokenRequest {
        TokenRequest {
            url: self.token_url.clone(),
            encoding: self.encoding,
            params,
        }
    }
}

fn validate_redirect_uri(raw: &str) -> std::result::Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("redirect_uri is not an absolute URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("redirect_uri scheme must be http or https, got {}", url.scheme()));
    }
    if !url.has_host() {
        return Err("redirect_uri has no host".to_string());
    }
    Ok(())
}
