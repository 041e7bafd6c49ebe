//! Core types and traits for the patchbot workspace.
//!
//! This crate defines the shared abstractions used by the token lifecycle
//! layers: the error type, platform identifiers, credential and token
//! representations, and the async token endpoint seam.

pub mod error;
pub mod platform;
pub mod token;
pub mod traits;

pub use error::PatchbotError;
pub use platform::{BodyEncoding, GrantFlow, PlatformId};
pub use token::{
    ConnectionState, Credential, TokenGrant, TokenRequest, TokenState, TokenStatus,
};
pub use traits::TokenEndpoint;
