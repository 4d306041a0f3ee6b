//! Core types for Fanpost

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constraints;
use crate::error::{FanpostError, Result};

/// The fixed set of platforms a post can be dispatched to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Nostr,
    Bluesky,
    Mastodon,
}

impl PlatformKind {
    /// Every supported platform, in report order
    pub const ALL: [PlatformKind; 3] = [
        PlatformKind::Nostr,
        PlatformKind::Bluesky,
        PlatformKind::Mastodon,
    ];

    /// Lowercase identifier used in config files, CLI flags and reports
    pub fn name(&self) -> &'static str {
        match self {
            PlatformKind::Nostr => "nostr",
            PlatformKind::Bluesky => "bluesky",
            PlatformKind::Mastodon => "mastodon",
        }
    }

    /// Maximum post length, in characters, accepted by this platform
    pub fn character_limit(&self) -> usize {
        constraints::limit_for(*self)
    }

    /// Parse a comma-separated platform list such as `"nostr,bluesky"`
    pub fn parse_list(list: &str) -> Result<BTreeSet<PlatformKind>> {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(PlatformKind::from_str)
            .collect()
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlatformKind {
    type Err = FanpostError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "nostr" => Ok(PlatformKind::Nostr),
            "bluesky" => Ok(PlatformKind::Bluesky),
            "mastodon" => Ok(PlatformKind::Mastodon),
            other => Err(FanpostError::InvalidInput(format!(
                "Unknown platform '{}'. Valid options: nostr, bluesky, mastodon",
                other
            ))),
        }
    }
}

/// A message composed once and dispatched to a set of platforms
///
/// Created for a single dispatch and discarded once the report exists.
#[derive(Debug, Clone)]
pub struct ComposedPost {
    id: Uuid,
    text: Arc<str>,
    targets: BTreeSet<PlatformKind>,
    created_at: i64,
}

impl ComposedPost {
    /// Compose a post for the given platforms
    ///
    /// # Errors
    ///
    /// Returns `FanpostError::InvalidInput` if the text is empty or
    /// whitespace-only, or if no target platform was selected. Length limits
    /// are not checked here; they are enforced per platform at dispatch time.
    pub fn new<I>(text: impl Into<String>, targets: I) -> Result<Self>
    where
        I: IntoIterator<Item = PlatformKind>,
    {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(FanpostError::InvalidInput(
                "Content cannot be empty or whitespace-only".to_string(),
            ));
        }

        let targets: BTreeSet<PlatformKind> = targets.into_iter().collect();
        if targets.is_empty() {
            return Err(FanpostError::InvalidInput(
                "At least one target platform must be selected".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            text: Arc::from(text),
            targets,
            created_at: chrono::Utc::now().timestamp(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn targets(&self) -> &BTreeSet<PlatformKind> {
        &self.targets
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Length of the text in the unit `kind` counts in
    pub fn length_for(&self, kind: PlatformKind) -> usize {
        constraints::measure(kind, &self.text)
    }
}
