//! Platform abstraction and implementations
//!
//! Every platform adapter implements [`Publisher`]: given the verified
//! credential for its own platform and a text, publish it and return the
//! remote post identifier. The dispatcher only ever talks to adapters through
//! this trait, so any adapter can be swapped for a [`mock::MockPublisher`].
//!
//! Each adapter names the credential type it consumes. Handing a Bluesky
//! login to the Nostr adapter does not compile.
//!
//! # Examples
//!
//! ```no_run
//! use libfanpost::config::Config;
//! use libfanpost::platforms::PlatformAdapters;
//!
//! # fn example() -> libfanpost::Result<()> {
//! let config = Config::load()?;
//! let adapters = PlatformAdapters::from_config(&config)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::config::Config;
use crate::credentials::{BlueskyLogin, MastodonAccess, NostrIdentity, VerifiedCredential};
use crate::error::{PlatformError, Result};
use crate::types::PlatformKind;

pub mod bluesky;
pub mod mastodon;
pub mod nostr;

// Mock publisher is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Result of a single publish call: the remote post identifier, or why it failed
pub type PublishOutcome = std::result::Result<String, PlatformError>;

/// Uniform publishing capability implemented by every platform adapter
#[async_trait]
pub trait Publisher: Send + Sync {
    /// The verified credential this adapter publishes with
    type Credential: Send + Sync + 'static;

    /// The platform this adapter talks to
    fn kind(&self) -> PlatformKind;

    /// How long a publish attempt may take before the dispatcher abandons it
    fn default_timeout(&self) -> Duration;

    /// Publish `text` and return the platform's identifier for the new post
    ///
    /// Failures are returned as values. Implementations must release any
    /// connection they opened, both when returning and when the future is
    /// dropped before completion.
    async fn publish(&self, credential: &Self::Credential, text: &str) -> PublishOutcome;
}

pub type NostrPublisher = dyn Publisher<Credential = NostrIdentity>;
pub type BlueskyPublisher = dyn Publisher<Credential = BlueskyLogin>;
pub type MastodonPublisher = dyn Publisher<Credential = MastodonAccess>;

/// One adapter per platform
#[derive(Clone)]
pub struct PlatformAdapters {
    pub nostr: Arc<NostrPublisher>,
    pub bluesky: Arc<BlueskyPublisher>,
    pub mastodon: Arc<MastodonPublisher>,
}

impl PlatformAdapters {
    pub fn new(
        nostr: Arc<NostrPublisher>,
        bluesky: Arc<BlueskyPublisher>,
        mastodon: Arc<MastodonPublisher>,
    ) -> Self {
        Self {
            nostr,
            bluesky,
            mastodon,
        }
    }

    /// Build the real network adapters from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configured relays or Bluesky service URL are
    /// malformed, or if an HTTP client cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        let nostr = nostr::NostrClient::from_config(&config.nostr)?;
        let bluesky = bluesky::BlueskyClient::from_config(&config.bluesky)?;
        let mastodon = mastodon::MastodonClient::new();

        Ok(Self::new(
            Arc::new(nostr),
            Arc::new(bluesky),
            Arc::new(mastodon),
        ))
    }

    /// Default timeout of the adapter for `kind`
    pub fn default_timeout(&self, kind: PlatformKind) -> Duration {
        match kind {
            PlatformKind::Nostr => self.nostr.default_timeout(),
            PlatformKind::Bluesky => self.bluesky.default_timeout(),
            PlatformKind::Mastodon => self.mastodon.default_timeout(),
        }
    }

    /// Start a publish with the adapter matching the credential's platform
    ///
    /// The returned future owns everything it needs, so it can run on its own
    /// task. Dropping it cancels the publish.
    pub fn publish(
        &self,
        credential: VerifiedCredential,
        text: Arc<str>,
    ) -> BoxFuture<'static, PublishOutcome> {
        match credential {
            VerifiedCredential::Nostr(identity) => {
                let adapter = Arc::clone(&self.nostr);
                async move { adapter.publish(&identity, &text).await }.boxed()
            }
            VerifiedCredential::Bluesky(login) => {
                let adapter = Arc::clone(&self.bluesky);
                async move { adapter.publish(&login, &text).await }.boxed()
            }
            VerifiedCredential::Mastodon(access) => {
                let adapter = Arc::clone(&self.mastodon);
                async move { adapter.publish(&access, &text).await }.boxed()
            }
        }
    }
}

/// Shorten a response body for inclusion in an error message
pub(crate) fn truncate_for_error(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX).collect();
        format!("{}...", head)
    }
}
