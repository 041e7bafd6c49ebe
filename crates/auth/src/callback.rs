//! Loopback listener receiving the authorization redirect.
//!
//! Binds `127.0.0.1:<port>`, waits for the platform to redirect the browser
//! back and extracts `code`/`state` (or the reported `error`) from the query.

use patchbot_types::{PatchbotError, traits::Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

const SUCCESS_PAGE: &str = "<html><body><h1>PatchBot connected</h1>\
    <p>You may close this tab.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h1>Authorization failed</h1>\
    <p>Return to the terminal for details.</p></body></html>";

/// Query parameters of the redirect.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Split into `(code, state)`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::Auth`] when the platform reported an error or
    /// either parameter is missing.
    pub fn into_code_and_state(self) -> Result<(String, String)> {
        if let Some(error) = self.error {
            let detail = self
                .error_description
                .map(|d| format!(": {d}"))
                .unwrap_or_default();
            return Err(PatchbotError::Auth(format!(
                "authorization denied ({error}){detail}"
            )));
        }
        let code = self
            .code
            .ok_or_else(|| PatchbotError::Auth("missing code parameter in callback".into()))?;
        let state = self
            .state
            .ok_or_else(|| PatchbotError::Auth("missing state parameter in callback".into()))?;
        Ok((code, state))
    }
}

/// Bind the callback port on loopback.
///
/// Bind **before** opening the browser so the redirect cannot arrive first.
///
/// # Errors
///
/// Returns [`PatchbotError::Auth`] if the port is taken or cannot be bound.
pub async fn bind_callback(port: u16) -> Result<TcpListener> {
    TcpListener::bind(("127.0.0.1", port)).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            PatchbotError::Auth(format!(
                "callback port {port} is already in use; \
                 find the owner with `lsof -i :{port}` and retry"
            ))
        } else {
            PatchbotError::Auth(format!("cannot bind callback port {port}: {e}"))
        }
    })
}

/// Wait for one redirect on an already-bound listener (120 s timeout).
///
/// # Errors
///
/// Returns [`PatchbotError::Auth`] on accept or read failure, unparsable
/// query, or timeout.
pub async fn accept_callback(listener: TcpListener) -> Result<CallbackParams> {
    accept_callback_within(listener, CALLBACK_TIMEOUT).await
}

async fn accept_callback_within(listener: TcpListener, timeout: Duration) -> Result<CallbackParams> {
    let accept = async {
        let (mut stream, peer) = listener
            .accept()
            .await
            .map_err(|e| PatchbotError::Auth(e.to_string()))?;
        tracing::debug!(%peer, "callback connection accepted");

        let mut buf = vec![0u8; 8192];
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| PatchbotError::Auth(e.to_string()))?;

        let request = String::from_utf8_lossy(&buf[..n]);
        let params = parse_request_line(&request);
        let page = match &params {
            Ok(p) if p.error.is_none() && p.code.is_some() => SUCCESS_PAGE,
            _ => FAILURE_PAGE,
        };

        stream
            .write_all(http_response(page).as_bytes())
            .await
            .map_err(|e| PatchbotError::Auth(format!("write error: {e}")))?;
        let _ = stream.shutdown().await;

        params
    };

    tokio::time::timeout(timeout, accept)
        .await
        .map_err(|_| PatchbotError::Auth("timed out waiting for authorization callback".into()))?
}

fn http_response(page: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{page}",
        page.len()
    )
}

fn parse_request_line(request: &str) -> Result<CallbackParams> {
    // "GET /callback?code=...&state=... HTTP/1.1"
    let first_line = request.lines().next().unwrap_or("");
    let target = first_line.split_ascii_whitespace().nth(1).unwrap_or("/");
    let query = target.split_once('?').map_or("", |(_, q)| q);
    serde_urlencoded::from_str(query)
        .map_err(|e| PatchbotError::Auth(format!("invalid callback query: {e}")))
}
