//! Progress events for dispatches in flight
//!
//! The dispatcher publishes events on an [`EventBus`] so a UI can show
//! per-platform progress while attempts run. The bus is a
//! `tokio::sync::broadcast` channel: emitting never blocks, events are
//! dropped when nobody is subscribed, and a lagging subscriber loses the
//! oldest events rather than slowing the dispatch down.
//!
//! # Example
//!
//! ```no_run
//! use libfanpost::events::{Event, EventBus};
//! use libfanpost::PlatformKind;
//!
//! # async fn example() {
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus.emit(Event::AttemptStarted {
//!     post_id: "abc123".to_string(),
//!     platform: PlatformKind::Nostr,
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::dispatch::report::OverallStatus;
use crate::types::PlatformKind;

pub type EventReceiver = broadcast::Receiver<Event>;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Emit an event to all current subscribers
    pub fn emit(&self, event: Event) {
        // Err only means there are no receivers
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Events emitted while a post is dispatched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    DispatchStarted {
        post_id: String,
        platforms: Vec<PlatformKind>,
    },

    /// The platform was not attempted (over the limit, missing or invalid credential)
    AttemptSkipped {
        post_id: String,
        platform: PlatformKind,
        reason: String,
    },

    AttemptStarted {
        post_id: String,
        platform: PlatformKind,
    },

    AttemptFinished {
        post_id: String,
        platform: PlatformKind,
        /// `success`, `failure`, `timed_out` or `cancelled`
        outcome: String,
        elapsed_ms: u64,
    },

    DispatchCompleted {
        post_id: String,
        status: OverallStatus,
    },
}
