//! Platform credentials
//!
//! Credentials are owned by the settings/storage layer and only ever read
//! here. Each platform has its own shape; secret fields are wrapped in
//! [`SecretString`] so they are redacted from `Debug` output and zeroed on
//! drop.
//!
//! A [`Credential`] is raw, unchecked input. The only way to obtain the
//! [`VerifiedCredential`] that platform adapters accept is
//! [`validation::validate`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::error::{ConfigError, Result};
use crate::types::PlatformKind;

pub mod validation;

pub use validation::{
    validate, BlueskyLogin, MastodonAccess, NostrIdentity, VerifiedCredential,
};

/// Secret material for one platform account, as stored
#[derive(Debug)]
pub enum Credential {
    /// Nostr private key, hex or `nsec1` bech32
    Nostr { secret_key: SecretString },

    /// Bluesky handle (or DID) and app password
    Bluesky {
        handle: String,
        app_password: SecretString,
    },

    /// Mastodon instance base URL and OAuth access token
    Mastodon {
        instance: String,
        access_token: SecretString,
    },
}

impl Credential {
    pub fn nostr(secret_key: impl Into<String>) -> Self {
        Credential::Nostr {
            secret_key: SecretString::from(secret_key.into()),
        }
    }

    pub fn bluesky(handle: impl Into<String>, app_password: impl Into<String>) -> Self {
        Credential::Bluesky {
            handle: handle.into(),
            app_password: SecretString::from(app_password.into()),
        }
    }

    pub fn mastodon(instance: impl Into<String>, access_token: impl Into<String>) -> Self {
        Credential::Mastodon {
            instance: instance.into(),
            access_token: SecretString::from(access_token.into()),
        }
    }

    /// The platform this credential belongs to
    pub fn kind(&self) -> PlatformKind {
        match self {
            Credential::Nostr { .. } => PlatformKind::Nostr,
            Credential::Bluesky { .. } => PlatformKind::Bluesky,
            Credential::Mastodon { .. } => PlatformKind::Mastodon,
        }
    }
}

/// Credentials keyed by platform, handed to the dispatcher for one dispatch
#[derive(Debug, Default)]
pub struct CredentialSet {
    entries: BTreeMap<PlatformKind, Credential>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential, replacing any existing one for the same platform
    pub fn insert(&mut self, credential: Credential) -> Option<Credential> {
        self.entries.insert(credential.kind(), credential)
    }

    pub fn with(mut self, credential: Credential) -> Self {
        self.insert(credential);
        self
    }

    pub fn get(&self, kind: PlatformKind) -> Option<&Credential> {
        self.entries.get(&kind)
    }

    pub fn contains(&self, kind: PlatformKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn platforms(&self) -> impl Iterator<Item = PlatformKind> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-only access to stored credentials
pub trait CredentialStore {
    /// Load the credential for `kind`, or `None` if nothing is stored
    fn load(&self, kind: PlatformKind) -> Result<Option<Credential>>;

    /// Load every stored credential among `kinds`
    fn load_set(&self, kinds: &[PlatformKind]) -> Result<CredentialSet> {
        let mut set = CredentialSet::new();
        for kind in kinds {
            if let Some(credential) = self.load(*kind)? {
                set.insert(credential);
            }
        }
        Ok(set)
    }
}

/// Credentials read from a TOML file
///
/// ```toml
/// [nostr]
/// secret_key = "nsec1..."
///
/// [bluesky]
/// handle = "alice.bsky.social"
/// app_password = "xxxx-xxxx-xxxx-xxxx"
///
/// [mastodon]
/// instance = "https://mastodon.social"
/// access_token = "..."
/// ```
///
/// A missing file means no credentials are stored.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

#[derive(Deserialize, Default)]
struct CredentialFile {
    nostr: Option<NostrEntry>,
    bluesky: Option<BlueskyEntry>,
    mastodon: Option<MastodonEntry>,
}

#[derive(Deserialize)]
struct NostrEntry {
    secret_key: String,
}

#[derive(Deserialize)]
struct BlueskyEntry {
    handle: String,
    app_password: String,
}

#[derive(Deserialize)]
struct MastodonEntry {
    instance: String,
    access_token: String,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store from a path that may contain `~` or environment variables
    pub fn from_config_path(path: &str) -> Result<Self> {
        let expanded = shellexpand::full(path).map_err(|e| ConfigError::InvalidValue {
            field: "credentials.path".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(expanded.into_owned()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<CredentialFile> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => Zeroizing::new(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "Credentials file {} not found, no credentials loaded",
                    self.path.display()
                );
                return Ok(CredentialFile::default());
            }
            Err(e) => return Err(ConfigError::ReadError(e).into()),
        };

        let file: CredentialFile = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(file)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, kind: PlatformKind) -> Result<Option<Credential>> {
        let file = self.read_file()?;

        let credential = match kind {
            PlatformKind::Nostr => file
                .nostr
                .map(|entry| Credential::nostr(entry.secret_key)),
            PlatformKind::Bluesky => file
                .bluesky
                .map(|entry| Credential::bluesky(entry.handle, entry.app_password)),
            PlatformKind::Mastodon => file
                .mastodon
                .map(|entry| Credential::mastodon(entry.instance, entry.access_token)),
        };

        Ok(credential)
    }
}
