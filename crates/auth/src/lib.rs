//! OAuth token lifecycle for the supported publishing platforms.
//!
//! Each platform module declares its endpoints and quirks as a
//! [`PlatformProfile`]. The [`TokenLifecycleManager`] obtains, holds and
//! refreshes one platform's token; [`Connections`] owns one manager per
//! configured platform.

pub mod callback;
pub mod exchange;
pub mod facebook;
pub mod flow;
pub mod linkedin;
pub mod manager;
pub mod profile;
pub mod registry;
mod schedule;
pub mod state;
pub mod tiktok;

pub use exchange::HttpTokenEndpoint;
pub use manager::{Initialization, RefreshPolicy, TokenLifecycleManager};
pub use profile::{PlatformProfile, RefreshGrant};
pub use registry::Connections;
