//! Nostr platform implementation
//!
//! A publish signs a kind-1 text note with the account's keys, connects to
//! the configured relays and sends the event. The post counts as published
//! once at least one relay acknowledges it; the `note1` id of the event is
//! returned.
//!
//! Relay connections live only for the duration of one publish. Connecting
//! is bounded by the acknowledgment timeout and never retried, and the relay
//! pool is shut down when the publish returns or is dropped midway, e.g.
//! after the dispatcher gives up on it.

use std::time::Duration;

use async_trait::async_trait;
use nostr_sdk::{Client, Event, EventBuilder, Options, RelayOptions, ToBech32};
use tracing::{debug, warn};
use url::Url;

use crate::config::NostrConfig;
use crate::credentials::NostrIdentity;
use crate::error::{ConfigError, PlatformError, Result};
use crate::platforms::{PublishOutcome, Publisher};
use crate::types::PlatformKind;

/// Slack on top of the acknowledgment timeout for signing and teardown
const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

pub struct NostrClient {
    relays: Vec<Url>,
    ack_timeout: Duration,
}

impl NostrClient {
    /// Create a client for the relays configured under `[nostr]`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no relays are configured or any relay
    /// is not a `ws://` or `wss://` URL.
    pub fn from_config(config: &NostrConfig) -> Result<Self> {
        let relays = config
            .relays
            .iter()
            .map(|relay| parse_relay_url(relay))
            .collect::<Result<Vec<_>>>()?;

        if relays.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "nostr.relays".to_string(),
                reason: "at least one relay is required".to_string(),
            }
            .into());
        }

        Ok(Self::new(relays, config.ack_timeout()))
    }

    pub fn new(relays: Vec<Url>, ack_timeout: Duration) -> Self {
        Self {
            relays,
            ack_timeout,
        }
    }

    pub fn relays(&self) -> &[Url] {
        &self.relays
    }

    async fn send(&self, session: &RelaySession, event: Event) -> PublishOutcome {
        let pool = session.client.pool();
        for relay in &self.relays {
            pool.add_relay(relay.as_str(), RelayOptions::new().reconnect(false))
                .await
                .map_err(|e| PlatformError::Network(format!("Failed to add relay {}: {}", relay, e)))?;
        }

        session.client.connect().await;

        let event_id = event.id;
        let output = session
            .client
            .send_event(event)
            .await
            .map_err(|e| PlatformError::Network(format!("Failed to send event: {}", e)))?;

        if output.success.is_empty() {
            let reasons: Vec<String> = output
                .failed
                .iter()
                .map(|(relay, reason)| format!("{}: {:?}", relay, reason))
                .collect();
            return Err(PlatformError::Posting(format!(
                "No relay accepted the event ({})",
                reasons.join(", ")
            )));
        }

        if !output.failed.is_empty() {
            warn!(
                "Event accepted by {} relay(s), rejected by {}",
                output.success.len(),
                output.failed.len()
            );
        }

        Ok(event_id.to_bech32().unwrap_or_else(|_| event_id.to_hex()))
    }
}

#[async_trait]
impl Publisher for NostrClient {
    type Credential = NostrIdentity;

    fn kind(&self) -> PlatformKind {
        PlatformKind::Nostr
    }

    fn default_timeout(&self) -> Duration {
        self.ack_timeout + TIMEOUT_GRACE
    }

    async fn publish(&self, credential: &NostrIdentity, text: &str) -> PublishOutcome {
        let keys = credential.keys();
        let event = EventBuilder::text_note(text, [])
            .to_event(keys)
            .map_err(|e| PlatformError::Posting(format!("Failed to sign event: {}", e)))?;

        debug!(
            "Publishing event {} to {} relay(s)",
            event.id,
            self.relays.len()
        );

        let options = Options::new()
            .connection_timeout(Some(self.ack_timeout))
            .send_timeout(Some(self.ack_timeout));
        let mut session = RelaySession::new(Client::with_opts(keys.clone(), options));

        let outcome = match tokio::time::timeout(self.ack_timeout, self.send(&session, event)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PlatformError::Timeout(format!(
                "no relay acknowledged the event within {:?}",
                self.ack_timeout
            ))),
        };

        session.close().await;
        outcome
    }
}

/// Relay connections opened for one publish
///
/// Shuts the relay pool down on [`close`](Self::close), or in the background
/// if dropped before that.
struct RelaySession {
    client: Client,
    closed: bool,
}

impl RelaySession {
    fn new(client: Client) -> Self {
        Self {
            client,
            closed: false,
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        shutdown(&self.client).await;
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                handle.spawn(async move { shutdown(&client).await });
            }
            Err(_) => warn!("No runtime to close relay connections on"),
        }
    }
}

async fn shutdown(client: &Client) {
    if let Err(e) = client.remove_all_relays().await {
        warn!("Failed to remove relays: {}", e);
    }
    if let Err(e) = client.shutdown().await {
        warn!("Failed to shut down relay pool: {}", e);
    }
}

fn parse_relay_url(relay: &str) -> Result<Url> {
    let url = Url::parse(relay).map_err(|e| ConfigError::InvalidValue {
        field: "nostr.relays".to_string(),
        reason: format!("'{}' is not a valid URL: {}", relay, e),
    })?;

    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(ConfigError::InvalidValue {
            field: "nostr.relays".to_string(),
            reason: format!("'{}' must use ws:// or wss://", relay),
        }
        .into());
    }

    Ok(url)
}
