use patchbot_types::{Credential, PlatformId};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, path::Path, path::PathBuf, time::Duration};

fn default_true() -> bool {
    true
}

/// Configuration for a single platform connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Whether this platform is enabled (defaults to `true`).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// OAuth client id (`client_key` on TikTok).
    #[serde(default)]
    pub client_id: String,
    /// OAuth client secret. Never written back out.
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
    /// Redirect URI registered with the platform (authorization-code only).
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Scopes to request instead of the platform defaults.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Override of the platform's authorization endpoint.
    #[serde(default)]
    pub auth_url: Option<String>,
    /// Override of the platform's token endpoint.
    #[serde(default)]
    pub token_url: Option<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_id: String::new(),
            client_secret: None,
            redirect_uri: None,
            scopes: Vec::new(),
            auth_url: None,
            token_url: None,
        }
    }
}

impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("enabled", &self.enabled)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl PlatformConfig {
    /// Build the credential handed to a token lifecycle manager.
    ///
    /// A missing secret becomes an empty one, which the manager rejects
    /// on `initialize`.
    #[must_use]
    pub fn credential(&self, platform: PlatformId) -> Credential {
        let mut credential = Credential::new(
            platform,
            self.client_id.clone(),
            self.client_secret.clone().unwrap_or_default(),
        )
        .with_scopes(self.scopes.iter().cloned());
        credential.redirect_uri.clone_from(&self.redirect_uri);
        credential
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` env-filter directive (defaults to `info`).
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Optional log file, rotated daily.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

fn default_safety_margin() -> u64 {
    300
}
fn default_retry_backoff() -> u64 {
    300
}

/// Timing of scheduled refreshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds before expiry at which the scheduled refresh fires (defaults to 300).
    #[serde(default = "default_safety_margin")]
    pub safety_margin_secs: u64,
    /// Wait before the single retry of a failed scheduled refresh (defaults to 300).
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            safety_margin_secs: default_safety_margin(),
            retry_backoff_secs: default_retry_backoff(),
        }
    }
}

impl RefreshConfig {
    #[must_use]
    pub fn safety_margin(&self) -> Duration {
        Duration::from_secs(self.safety_margin_secs)
    }

    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Platform configuration map.
    #[serde(default)]
    pub platforms: HashMap<PlatformId, PlatformConfig>,
}

impl Config {
    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads configuration from a file path, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn from_file(path: &Path) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .extract()
    }

    /// Loads defaults, then the optional YAML file, then `PATCHBOT_*`
    /// environment variables (`__` separates nested keys, e.g.
    /// `PATCHBOT_PLATFORMS__TIKTOK__CLIENT_SECRET`).
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if any layer cannot be parsed.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Env, Format as _, Serialized, Yaml},
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed("PATCHBOT_").split("__"))
            .extract()
    }

    /// Configuration of an enabled platform.
    #[must_use]
    pub fn platform(&self, platform: PlatformId) -> Option<&PlatformConfig> {
        self.platforms.get(&platform).filter(|p| p.enabled)
    }

    /// Enabled platforms in a stable order.
    #[must_use]
    pub fn enabled_platforms(&self) -> Vec<PlatformId> {
        let mut out: Vec<PlatformId> = self
            .platforms
            .iter()
            .filter(|(_, p)| p.enabled)
            .map(|(id, _)| *id)
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret as _;

    const SAMPLE_YAML: &str = r#"
log:
  level: debug
  format: json
refresh:
  safety_margin_secs: 120
platforms:
  tiktok:
    client_id: "tt-key"
    client_secret: "tt-secret"
  linkedin:
    client_id: "li-id"
    client_secret: "li-secret"
    redirect_uri: "http://localhost:8749/callback"
    scopes: ["openid", "profile"]
  facebook:
    enabled: false
"#;

    #[test]
    fn test_default_config() {
        let c = Config::default();
        assert_eq!(c.log.level, "info");
        assert_eq!(c.log.format, LogFormat::Text);
        assert_eq!(c.refresh.safety_margin(), Duration::from_secs(300));
        assert_eq!(c.refresh.retry_backoff(), Duration::from_secs(300));
        assert!(c.platforms.is_empty());
    }

    #[test]
    fn test_from_yaml_log_and_refresh() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        assert_eq!(c.log.level, "debug");
        assert_eq!(c.log.format, LogFormat::Json);
        assert_eq!(c.refresh.safety_margin_secs, 120);
        assert_eq!(c.refresh.retry_backoff_secs, 300); // default preserved
    }

    #[test]
    fn test_from_yaml_platforms() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        let li = c.platform(PlatformId::LinkedIn).unwrap();
        assert_eq!(li.client_id, "li-id");
        assert_eq!(li.client_secret.as_deref(), Some("li-secret"));
        assert_eq!(li.scopes, vec!["openid", "profile"]);
        assert!(c.platform(PlatformId::Facebook).is_none());
        assert_eq!(
            c.enabled_platforms(),
            vec![PlatformId::TikTok, PlatformId::LinkedIn]
        );
    }

    #[test]
    fn test_from_yaml_unknown_platform_rejected() {
        let err = Config::from_yaml("platforms:\n  myspace:\n    client_id: x\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_platform_credential() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        let cred = c
            .platform(PlatformId::LinkedIn)
            .unwrap()
            .credential(PlatformId::LinkedIn);
        assert_eq!(cred.platform, PlatformId::LinkedIn);
        assert_eq!(cred.client_id, "li-id");
        assert_eq!(
            cred.redirect_uri.as_deref(),
            Some("http://localhost:8749/callback")
        );
        assert_eq!(cred.client_secret.expose_secret(), "li-secret");
        assert_eq!(cred.scopes, vec!["openid", "profile"]);
    }

    #[test]
    fn test_platform_config_debug_redacts_secret() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        let dbg = format!("{:?}", c.platforms[&PlatformId::TikTok]);
        assert!(dbg.contains("tt-key"));
        assert!(!dbg.contains("tt-secret"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patchbot.yaml");
        std::fs::write(&path, SAMPLE_YAML).unwrap();
        let c = Config::from_file(&path).unwrap();
        assert_eq!(c.enabled_platforms().len(), 2);
    }

    #[test]
    fn test_load_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("patchbot.yaml", SAMPLE_YAML)?;
            jail.set_env("PATCHBOT_PLATFORMS__TIKTOK__CLIENT_SECRET", "from-env");
            jail.set_env("PATCHBOT_REFRESH__RETRY_BACKOFF_SECS", "60");
            let c = Config::load(Some(Path::new("patchbot.yaml")))?;
            assert_eq!(
                c.platforms[&PlatformId::TikTok].client_secret.as_deref(),
                Some("from-env")
            );
            assert_eq!(c.platforms[&PlatformId::TikTok].client_id, "tt-key");
            assert_eq!(c.refresh.retry_backoff_secs, 60);
            Ok(())
        });
    }

    #[test]
    fn test_load_without_file() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PATCHBOT_LOG__LEVEL", "warn");
            let c = Config::load(None)?;
            assert_eq!(c.log.level, "warn");
            assert!(c.platforms.is_empty());
            Ok(())
        });
    }
}
