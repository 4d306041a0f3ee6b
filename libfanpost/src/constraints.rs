//! Per-platform content length limits
//!
//! [`measure`] is the single counting rule for the whole system. The live
//! counter shown while composing and the check performed at dispatch time
//! both go through it, so they can never disagree.
//!
//! Length is the number of Unicode scalar values (`char`s). Bluesky counts
//! grapheme clusters, which is never more than the scalar count, so this rule
//! may refuse a post Bluesky would accept but never the reverse.

use crate::types::PlatformKind;

/// Maximum post length per platform, in characters
const LIMITS: [(PlatformKind, usize); 3] = [
    (PlatformKind::Nostr, 800),
    (PlatformKind::Bluesky, 300),
    (PlatformKind::Mastodon, 500),
];

/// Outcome of checking a text against one platform's limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintCheck {
    WithinLimit,
    ExceedsLimit { limit: usize, actual: usize },
}

impl ConstraintCheck {
    pub fn is_within_limit(&self) -> bool {
        matches!(self, ConstraintCheck::WithinLimit)
    }
}

/// Character limit for `kind`
pub fn limit_for(kind: PlatformKind) -> usize {
    LIMITS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, limit)| *limit)
        .unwrap_or(0)
}

/// Length of `text` as counted for `kind`
pub fn measure(_kind: PlatformKind, text: &str) -> usize {
    text.chars().count()
}

/// Characters left before reaching the limit (negative when over)
pub fn remaining(kind: PlatformKind, text: &str) -> i64 {
    limit_for(kind) as i64 - measure(kind, text) as i64
}

/// Check `text` against the limit of `kind`
///
/// Text exactly at the limit is accepted.
pub fn check(kind: PlatformKind, text: &str) -> ConstraintCheck {
    let limit = limit_for(kind);
    let actual = measure(kind, text);

    if actual > limit {
        ConstraintCheck::ExceedsLimit { limit, actual }
    } else {
        ConstraintCheck::WithinLimit
    }
}
