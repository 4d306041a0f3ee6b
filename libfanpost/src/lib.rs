//! Fanpost - compose once, publish to Nostr, Bluesky and Mastodon
//!
//! This library contains the multi-platform dispatch engine: credential
//! validation, per-platform content limits, the platform adapters and the
//! coordinator that fans one post out to every selected platform and folds
//! the results into a single report.

pub mod config;
pub mod constraints;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod input;
pub mod logging;
pub mod platforms;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use constraints::ConstraintCheck;
pub use credentials::{Credential, CredentialSet, CredentialStore, FileCredentialStore};
pub use dispatch::report::{AttemptOutcome, DispatchAttemptResult, DispatchReport, OverallStatus};
pub use dispatch::{DispatchConfig, Dispatcher};
pub use error::{CredentialError, FanpostError, PlatformError, Result};
pub use events::{Event, EventBus};
pub use types::{ComposedPost, PlatformKind};
