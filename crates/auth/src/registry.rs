//! Per-platform managers owned by the application.

use patchbot_config::Config;
use patchbot_types::{PlatformId, TokenEndpoint, TokenStatus};
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    manager::{RefreshPolicy, TokenLifecycleManager},
    profile::PlatformProfile,
};

/// One [`TokenLifecycleManager`] per enabled platform.
pub struct Connections {
    managers: BTreeMap<PlatformId, TokenLifecycleManager>,
}

impl Connections {
    /// Build a manager for every enabled platform, sharing `endpoint`.
    ///
    /// Endpoint overrides and refresh timing come from `config`.
    pub fn from_config(config: &Config, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        let policy = RefreshPolicy::from(&config.refresh);
        let managers = config
            .enabled_platforms()
            .into_iter()
            .filter_map(|platform| {
                let platform_config = config.platform(platform)?;
                let profile = PlatformProfile::for_platform(platform).with_overrides(platform_config);
                let manager = TokenLifecycleManager::new(profile, Arc::clone(&endpoint), policy);
                Some((platform, manager))
            })
            .collect();
        Self { managers }
    }

    #[must_use]
    pub fn get(&self, platform: PlatformId) -> Option<&TokenLifecycleManager> {
        self.managers.get(&platform)
    }

    /// Platforms with a manager, in stable order.
    pub fn platforms(&self) -> impl Iterator<Item = PlatformId> + '_ {
        self.managers.keys().copied()
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<TokenStatus> {
        self.managers.values().map(TokenLifecycleManager::status).collect()
    }

    pub fn disconnect_all(&self) {
        for manager in self.managers.values() {
            manager.disconnect();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}
