//! Interactive connect flow used by the CLI.

use patchbot_types::{Credential, GrantFlow, PatchbotError, traits::Result};
use url::Url;

use crate::{
    callback,
    manager::{Initialization, TokenLifecycleManager},
};

/// Connect `manager` with `credential`, driving the browser when needed.
///
/// Client-credentials platforms connect directly. Authorization-code
/// platforms bind the redirect port on loopback, open the authorization URL
/// and complete the flow with the redirect's code.
///
/// # Errors
///
/// Returns an error if the redirect URI is not a loopback URL, the callback
/// listener fails or times out, the user denies access, or any exchange fails.
pub async fn connect(manager: &TokenLifecycleManager, credential: Credential) -> Result<()> {
    connect_with(manager, credential, open_browser).await
}

async fn connect_with<F>(
    manager: &TokenLifecycleManager,
    credential: Credential,
    open_url: F,
) -> Result<()>
where
    F: FnOnce(&str),
{
    if manager.profile().flow == GrantFlow::ClientCredentials {
        manager.initialize(credential).await?;
        return Ok(());
    }

    let port = callback_port(credential.redirect_uri.as_deref())?;
    let listener = callback::bind_callback(port).await?;
    let Initialization::Redirect { url } = manager.initialize(credential).await? else {
        return Ok(());
    };
    open_url(&url);

    let (code, state) = callback::accept_callback(listener)
        .await?
        .into_code_and_state()?;
    manager.handle_callback(&code, &state).await
}

/// Port the local callback listener must bind for `redirect_uri`.
///
/// # Errors
///
/// Returns [`PatchbotError::Configuration`] unless the URI is an `http` URL
/// on `localhost`, `127.0.0.1` or `[::1]`.
pub fn callback_port(redirect_uri: Option<&str>) -> Result<u16> {
    let raw = redirect_uri
        .ok_or_else(|| PatchbotError::Configuration("redirect_uri is required".into()))?;
    let url = Url::parse(raw)
        .map_err(|e| PatchbotError::Configuration(format!("invalid redirect_uri: {e}")))?;
    let loopback = matches!(
        url.host_str(),
        Some("localhost" | "127.0.0.1" | "[::1]")
    );
    if url.scheme() != "http" || !loopback {
        return Err(PatchbotError::Configuration(format!(
            "redirect_uri {raw} is not a loopback http URL; \
             the interactive flow can only receive redirects locally"
        )));
    }
    url.port_or_known_default()
        .ok_or_else(|| PatchbotError::Configuration("redirect_uri has no port".into()))
}

fn open_browser(url: &str) {
    eprintln!("Opening browser: {url}");
    if let Err(e) = open::that(url) {
        eprintln!("Failed to open browser automatically: {e}");
        eprintln!("Please open the following URL manually to authorize:");
        eprintln!("{url}");
    }
}
