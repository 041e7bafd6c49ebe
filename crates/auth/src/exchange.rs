//! HTTP token endpoint client.
//!
//! POSTs a [`TokenRequest`] with `reqwest`, maps non-2xx answers to
//! [`PatchbotError::UpstreamAuth`] and parses the OAuth token response.

use async_trait::async_trait;
use patchbot_types::{
    BodyEncoding, PatchbotError, TokenEndpoint, TokenGrant, TokenRequest, traits::Result,
};
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`TokenEndpoint`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpTokenEndpoint {
    http: reqwest::Client,
}

impl HttpTokenEndpoint {
    /// Create an endpoint with its own client (30 s timeout, no redirects).
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

impl Default for HttpTokenEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn request_token(&self, request: TokenRequest) -> Result<TokenGrant> {
        tracing::debug!(
            url = %request.url,
            grant_type = request.grant_type().unwrap_or("-"),
            "requesting token"
        );

        let builder = self
            .http
            .post(&request.url)
            .header(ACCEPT, "application/json");
        let builder = match request.encoding {
            BodyEncoding::Form => builder.form(&request.params),
            BodyEncoding::Json => builder.json(&json_body(&request.params)),
        };

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "token endpoint rejected request");
            return Err(PatchbotError::UpstreamAuth {
                status: status.as_u16(),
                body,
            });
        }

        parse_token_response(status.as_u16(), &body)
    }
}

fn json_body(params: &[(&'static str, String)]) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::String(v.clone())))
            .collect(),
    )
}

/// Parse a successful token endpoint body into a [`TokenGrant`].
///
/// Some platforms answer errors with a 2xx status and an OAuth `error` field;
/// those are reported as [`PatchbotError::UpstreamAuth`] with the body kept.
///
/// # Errors
///
/// Returns [`PatchbotError::InvalidResponse`] if the body is not JSON or has
/// no `access_token`, and [`PatchbotError::UpstreamAuth`] for embedded errors.
pub fn parse_token_response(status: u16, body: &str) -> Result<TokenGrant> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| PatchbotError::InvalidResponse(format!("token response is not JSON: {e}")))?;

    let Some(access_token) = json
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    else {
        if json.get("error").is_some() {
            return Err(PatchbotError::UpstreamAuth {
                status,
                body: body.to_string(),
            });
        }
        return Err(PatchbotError::InvalidResponse(
            "missing access_token in response".into(),
        ));
    };

    let mut grant = TokenGrant::new(access_token);
    if let Some(refresh) = json
        .get("refresh_token")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    {
        grant = grant.with_refresh(refresh);
    }
    if let Some(expires_in) = json.get("expires_in").and_then(as_seconds) {
        grant = grant.with_expires_in(expires_in);
    }
    if let Some(scope) = json.get("scope").and_then(Value::as_str) {
        grant = grant.with_scope(scope);
    }
    Ok(grant)
}

// Numbers are standard; a few endpoints send them as strings.
fn as_seconds(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Form, Json, Router, http::StatusCode, routing::post};
    use secrecy::ExposeSecret as _;
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/token")
    }

    async fn form_stub(status: StatusCode, body: &'static str) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let recorder = Arc::clone(&seen);
        let app = Router::new().route(
            "/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let recorder = Arc::clone(&recorder);
                async move {
                    recorder.lock().unwrap().push(form);
                    (status, body)
                }
            }),
        );
        (serve(app).await, seen)
    }

    fn request(url: String, encoding: BodyEncoding) -> TokenRequest {
        TokenRequest {
            url,
            encoding,
            params: vec![
                ("client_key", "key-a".into()),
                ("client_secret", "secret-b".into()),
                ("grant_type", "client_credentials".into()),
            ],
        }
    }

    #[tokio::test]
    async fn test_form_request_success() {
        let (url, seen) = form_stub(
            StatusCode::OK,
            r#"{"access_token":"tok1","expires_in":7200,"token_type":"Bearer"}"#,
        )
        .await;

        let grant = HttpTokenEndpoint::new()
            .request_token(request(url, BodyEncoding::Form))
            .await
            .unwrap();
        assert_eq!(grant.access_token.expose_secret(), "tok1");
        assert_eq!(grant.expires_in, Some(7200));
        assert!(grant.refresh_token.is_none());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["client_key"], "key-a");
        assert_eq!(seen[0]["client_secret"], "secret-b");
        assert_eq!(seen[0]["grant_type"], "client_credentials");
    }

    #[tokio::test]
    async fn test_non_success_status_preserved() {
        let (url, _) = form_stub(StatusCode::UNAUTHORIZED, r#"{"error":"invalid_client"}"#).await;

        let err = HttpTokenEndpoint::new()
            .request_token(request(url, BodyEncoding::Form))
            .await
            .unwrap_err();
        match err {
            PatchbotError::UpstreamAuth { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid_client"));
            }
            other => panic!("expected UpstreamAuth, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let (url, _) = form_stub(StatusCode::SERVICE_UNAVAILABLE, "try later").await;
        let err = HttpTokenEndpoint::new()
            .request_token(request(url, BodyEncoding::Form))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_json_request_body() {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
        let recorder = Arc::clone(&seen);
        let app = Router::new().route(
            "/token",
            post(move |Json(body): Json<Value>| {
                let recorder = Arc::clone(&recorder);
                async move {
                    recorder.lock().unwrap().push(body);
                    Json(serde_json::json!({"access_token": "json-tok", "expires_in": "3600"}))
                }
            }),
        );
        let url = serve(app).await;

        let grant = HttpTokenEndpoint::new()
            .request_token(request(url, BodyEncoding::Json))
            .await
            .unwrap();
        assert_eq!(grant.access_token.expose_secret(), "json-tok");
        assert_eq!(grant.expires_in, Some(3600));
        assert_eq!(seen.lock().unwrap()[0]["grant_type"], "client_credentials");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpTokenEndpoint::new()
            .request_token(request(format!("http://{addr}/token"), BodyEncoding::Form))
            .await
            .unwrap_err();
        assert!(matches!(err, PatchbotError::Http(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_full_response() {
        let grant = parse_token_response(
            200,
            r#"{"access_token":"at","refresh_token":"rt","expires_in":5184000,"scope":"openid,profile"}"#,
        )
        .unwrap();
        assert_eq!(grant.access_token.expose_secret(), "at");
        assert_eq!(grant.refresh_token.unwrap().expose_secret(), "rt");
        assert_eq!(grant.expires_in, Some(5_184_000));
        assert_eq!(grant.scope.as_deref(), Some("openid,profile"));
    }

    #[test]
    fn test_parse_embedded_error_on_success_status() {
        let err = parse_token_response(
            200,
            r#"{"error":"invalid_request","error_description":"Client key is invalid"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PatchbotError::UpstreamAuth { status: 200, .. }));
    }

    #[test]
    fn test_parse_missing_access_token() {
        let err = parse_token_response(200, r#"{"expires_in":60}"#).unwrap_err();
        assert!(matches!(err, PatchbotError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_not_json() {
        let err = parse_token_response(200, "<html>").unwrap_err();
        assert!(matches!(err, PatchbotError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_empty_refresh_token_ignored() {
        let grant =
            parse_token_response(200, r#"{"access_token":"at","refresh_token":""}"#).unwrap();
        assert!(grant.refresh_token.is_none());
        assert!(grant.expires_in.is_none());
    }
}
