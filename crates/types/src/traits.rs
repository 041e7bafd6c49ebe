//! Async traits shared across patchbot crates.
//!
//! Cross-crate seams live here so that higher layers depend only on
//! `patchbot-types`, not on each other.

use crate::{TokenGrant, TokenRequest};
use async_trait::async_trait;

pub use crate::error::Result;

/// Performs the server-to-server POST against a platform token endpoint.
///
/// Implementations map non-2xx answers to
/// [`PatchbotError::UpstreamAuth`](crate::PatchbotError::UpstreamAuth) with the
/// status and body preserved.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Send the request and parse the granted token.
    async fn request_token(&self, request: TokenRequest) -> Result<TokenGrant>;
}
