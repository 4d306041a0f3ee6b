//! Configuration management for Fanpost
//!
//! Configuration lives in a TOML file. Every section is optional; anything
//! left out falls back to the defaults below.
//!
//! ```toml
//! [dispatch]
//! timeout_secs = 30
//!
//! [dispatch.timeouts]
//! nostr = 15
//!
//! [nostr]
//! relays = ["wss://relay.damus.io", "wss://nos.lol"]
//! ack_timeout_secs = 10
//!
//! [bluesky]
//! service = "https://bsky.social"
//!
//! [credentials]
//! path = "~/.config/fanpost/credentials.toml"
//!
//! [defaults]
//! platforms = ["nostr", "mastodon", "bluesky"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchConfig;
use crate::error::{ConfigError, Result};
use crate::types::PlatformKind;

/// Environment variable that overrides the config file location
pub const CONFIG_ENV_VAR: &str = "FANPOST_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dispatch: DispatchSection,
    pub nostr: NostrConfig,
    pub bluesky: BlueskyConfig,
    pub credentials: CredentialsConfig,
    pub defaults: DefaultsConfig,
}

/// Timeout policy for publish attempts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    /// Timeout applied to every platform, overriding adapter defaults
    pub timeout_secs: Option<u64>,

    /// Per-platform timeouts, taking precedence over `timeout_secs`
    pub timeouts: BTreeMap<PlatformKind, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NostrConfig {
    pub relays: Vec<String>,

    /// Upper bound on relay handshake plus event acknowledgment
    pub ack_timeout_secs: u64,
}

impl Default for NostrConfig {
    fn default() -> Self {
        Self {
            relays: vec![
                "wss://relay.damus.io".to_string(),
                "wss://nos.lol".to_string(),
                "wss://relay.nostr.band".to_string(),
            ],
            ack_timeout_secs: 10,
        }
    }
}

impl NostrConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueskyConfig {
    /// PDS / entryway base URL
    pub service: String,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: "https://bsky.social".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Path to the credentials TOML file (`~` and `$VARS` are expanded)
    pub path: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: "~/.config/fanpost/credentials.toml".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Platforms used when none are selected explicitly
    pub platforms: Vec<PlatformKind>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            platforms: PlatformKind::ALL.to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file is not an error; built-in defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load from `path` when given, otherwise as [`load`](Self::load) does
    ///
    /// Unlike the default location, an explicitly given file must exist.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.dispatch.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "dispatch.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        if let Some((kind, _)) = self.dispatch.timeouts.iter().find(|(_, secs)| **secs == 0) {
            return Err(ConfigError::InvalidValue {
                field: format!("dispatch.timeouts.{}", kind),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        if self.nostr.ack_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "nostr.ack_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Timeout policy derived from the `[dispatch]` section
    pub fn dispatch_config(&self) -> DispatchConfig {
        let mut dispatch = DispatchConfig::default();
        if let Some(secs) = self.dispatch.timeout_secs {
            dispatch = dispatch.with_timeout(Duration::from_secs(secs));
        }
        for (kind, secs) in &self.dispatch.timeouts {
            dispatch = dispatch.with_platform_timeout(*kind, Duration::from_secs(*secs));
        }
        dispatch
    }
}

/// Resolve the configuration file path following the XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("fanpost").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.nostr.relays.len(), 3);
        assert_eq!(config.nostr.ack_timeout(), Duration::from_secs(10));
        assert_eq!(config.bluesky.service, "https://bsky.social");
        assert_eq!(config.defaults.platforms, PlatformKind::ALL.to_vec());
        assert!(config.dispatch.timeout_secs.is_none());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[nostr]
relays = ["wss://relay.example.com"]

[defaults]
platforms = ["mastodon"]
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.nostr.relays, vec!["wss://relay.example.com"]);
        assert_eq!(config.nostr.ack_timeout_secs, 10);
        assert_eq!(config.defaults.platforms, vec![PlatformKind::Mastodon]);
        assert_eq!(config.bluesky.service, "https://bsky.social");
    }

    #[test]
    fn test_dispatch_timeouts() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[dispatch]
timeout_secs = 20

[dispatch.timeouts]
nostr = 5
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        let dispatch = config.dispatch_config();
        let fallback = Duration::from_secs(99);
        assert_eq!(
            dispatch.timeout_for(PlatformKind::Nostr, fallback),
            Duration::from_secs(5)
        );
        assert_eq!(
            dispatch.timeout_for(PlatformKind::Bluesky, fallback),
            Duration::from_secs(20)
        );
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        std::fs::write(&path, "[dispatch]\ntimeout_secs = 0\n").unwrap();
        assert!(Config::load_from_path(&path).is_err());

        std::fs::write(&path, "[dispatch.timeouts]\nmastodon = 0\n").unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("dispatch.timeouts.mastodon"));

        std::fs::write(&path, "[nostr]\nack_timeout_secs = 0\n").unwrap();
        assert!(Config::load_from_path(&path).is_err());
    }

    #[test]
    fn test_rejects_unknown_platform_in_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[defaults]\nplatforms = [\"ssb\"]\n").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_env_override() {
        std::env::set_var(CONFIG_ENV_VAR, "/tmp/fanpost-test/config.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var(CONFIG_ENV_VAR);
        assert_eq!(path, PathBuf::from("/tmp/fanpost-test/config.toml"));
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.toml");
        std::env::set_var(CONFIG_ENV_VAR, &path);
        let config = Config::load();
        std::env::remove_var(CONFIG_ENV_VAR);

        let config = config.unwrap();
        assert_eq!(config.nostr.relays.len(), 3);
    }
}
