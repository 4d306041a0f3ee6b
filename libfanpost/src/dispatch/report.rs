//! Dispatch results and their summary
//!
//! A [`DispatchReport`] always covers every platform the post targeted, with
//! the outcome of each attempt and an [`OverallStatus`] derived from them.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{CredentialError, PlatformError};
use crate::types::PlatformKind;

/// Why a platform did not accept the post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchFailure {
    /// Text is longer than the platform allows; the adapter was not called
    ExceedsLimit { limit: usize, actual: usize },

    /// No credential stored for the platform; the adapter was not called
    MissingCredential,

    /// The stored credential was rejected; the adapter was not called
    InvalidCredential(CredentialError),

    /// The adapter ran and the platform (or the network) refused the post
    Platform(PlatformError),
}

impl DispatchFailure {
    pub fn kind_label(&self) -> &'static str {
        match self {
            DispatchFailure::ExceedsLimit { .. } => "exceeds_limit",
            DispatchFailure::MissingCredential => "missing_credential",
            DispatchFailure::InvalidCredential(_) => "invalid_credential",
            DispatchFailure::Platform(e) => e.kind_label(),
        }
    }
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchFailure::ExceedsLimit { limit, actual } => write!(
                f,
                "content is {} characters, limit is {}",
                actual, limit
            ),
            DispatchFailure::MissingCredential => write!(f, "no credentials configured"),
            DispatchFailure::InvalidCredential(e) => write!(f, "invalid credentials: {}", e),
            DispatchFailure::Platform(e) => write!(f, "{}", e),
        }
    }
}

/// Outcome of one platform's attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success { remote_id: String },
    Failure(DispatchFailure),
    /// The attempt hit its timeout and was abandoned
    TimedOut,
    /// The whole dispatch was cancelled before this attempt finished
    Cancelled,
}

impl AttemptOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success { .. } => "success",
            AttemptOutcome::Failure(_) => "failure",
            AttemptOutcome::TimedOut => "timed_out",
            AttemptOutcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchAttemptResult {
    pub platform: PlatformKind,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
}

impl DispatchAttemptResult {
    pub fn new(platform: PlatformKind, outcome: AttemptOutcome, elapsed: Duration) -> Self {
        Self {
            platform,
            outcome,
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }

    pub fn remote_id(&self) -> Option<&str> {
        match &self.outcome {
            AttemptOutcome::Success { remote_id } => Some(remote_id),
            _ => None,
        }
    }

    /// Whether the platform's adapter was actually invoked
    pub fn was_attempted(&self) -> bool {
        !matches!(
            self.outcome,
            AttemptOutcome::Failure(
                DispatchFailure::ExceedsLimit { .. }
                    | DispatchFailure::MissingCredential
                    | DispatchFailure::InvalidCredential(_)
            )
        )
    }

    fn view(&self) -> AttemptView<'_> {
        let (error_kind, error) = match &self.outcome {
            AttemptOutcome::Failure(failure) => {
                (Some(failure.kind_label()), Some(failure.to_string()))
            }
            AttemptOutcome::TimedOut => (Some("timeout"), None),
            AttemptOutcome::Cancelled => (Some("cancelled"), None),
            AttemptOutcome::Success { .. } => (None, None),
        };

        AttemptView {
            platform: self.platform,
            outcome: self.outcome.label(),
            remote_id: self.remote_id(),
            error_kind,
            error,
            elapsed_ms: duration_millis(self.elapsed),
        }
    }
}

impl Serialize for DispatchAttemptResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.view().serialize(serializer)
    }
}

#[derive(Serialize)]
struct AttemptView<'a> {
    platform: PlatformKind,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    AllSucceeded,
    PartialSuccess,
    AllFailed,
}

impl OverallStatus {
    /// Process exit code for command-line tools
    pub fn exit_code(&self) -> i32 {
        match self {
            OverallStatus::AllSucceeded => 0,
            OverallStatus::AllFailed => 1,
            OverallStatus::PartialSuccess => 4,
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::AllSucceeded => write!(f, "all succeeded"),
            OverallStatus::PartialSuccess => write!(f, "partial success"),
            OverallStatus::AllFailed => write!(f, "all failed"),
        }
    }
}

/// Per-platform results of one dispatch
#[derive(Debug, Clone)]
pub struct DispatchReport {
    post_id: Uuid,
    results: Vec<DispatchAttemptResult>,
    status: OverallStatus,
    elapsed: Duration,
}

impl DispatchReport {
    /// Build a report; results are ordered by platform
    pub fn new(post_id: Uuid, mut results: Vec<DispatchAttemptResult>, elapsed: Duration) -> Self {
        results.sort_by_key(|result| result.platform);
        let status = summarize_results(&results);
        Self {
            post_id,
            results,
            status,
            elapsed,
        }
    }

    pub fn post_id(&self) -> Uuid {
        self.post_id
    }

    pub fn results(&self) -> &[DispatchAttemptResult] {
        &self.results
    }

    pub fn result_for(&self, platform: PlatformKind) -> Option<&DispatchAttemptResult> {
        self.results.iter().find(|result| result.platform == platform)
    }

    pub fn status(&self) -> OverallStatus {
        self.status
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &DispatchAttemptResult> {
        self.results.iter().filter(|result| result.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &DispatchAttemptResult> {
        self.results.iter().filter(|result| !result.is_success())
    }

    /// Human-readable summary, one line per platform plus a status line
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        for result in &self.results {
            let detail = match &result.outcome {
                AttemptOutcome::Success { remote_id } => format!("posted {}", remote_id),
                AttemptOutcome::Failure(failure) => format!("failed: {}", failure),
                AttemptOutcome::TimedOut => format!(
                    "timed out after {:.1}s",
                    result.elapsed.as_secs_f64()
                ),
                AttemptOutcome::Cancelled => "cancelled".to_string(),
            };
            out.push_str(&format!("{:<9} {}\n", result.platform.name(), detail));
        }

        let succeeded = self.succeeded().count();
        out.push_str(&format!(
            "{}: {} of {} platforms accepted the post\n",
            capitalize(&self.status.to_string()),
            succeeded,
            self.results.len()
        ));

        out
    }
}

impl Serialize for DispatchReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct ReportView<'a> {
            post_id: String,
            status: OverallStatus,
            elapsed_ms: u64,
            results: &'a [DispatchAttemptResult],
        }

        ReportView {
            post_id: self.post_id.to_string(),
            status: self.status,
            elapsed_ms: duration_millis(self.elapsed),
            results: &self.results,
        }
        .serialize(serializer)
    }
}

/// Overall status of a report
///
/// `AllSucceeded` iff every platform succeeded, `AllFailed` iff none did,
/// `PartialSuccess` otherwise. A report with no results counts as failed.
pub fn summarize(report: &DispatchReport) -> OverallStatus {
    summarize_results(&report.results)
}

fn summarize_results(results: &[DispatchAttemptResult]) -> OverallStatus {
    let succeeded = results.iter().filter(|result| result.is_success()).count();

    if succeeded == 0 {
        OverallStatus::AllFailed
    } else if succeeded == results.len() {
        OverallStatus::AllSucceeded
    } else {
        OverallStatus::PartialSuccess
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(platform: PlatformKind, id: &str) -> DispatchAttemptResult {
        DispatchAttemptResult::new(
            platform,
            AttemptOutcome::Success {
                remote_id: id.to_string(),
            },
            Duration::from_millis(10),
        )
    }

    fn failure(platform: PlatformKind, failure: DispatchFailure) -> DispatchAttemptResult {
        DispatchAttemptResult::new(
            platform,
            AttemptOutcome::Failure(failure),
            Duration::from_millis(1),
        )
    }

    #[test]
    fn test_all_succeeded() {
        let report = DispatchReport::new(
            Uuid::new_v4(),
            vec![
                success(PlatformKind::Nostr, "note1"),
                success(PlatformKind::Bluesky, "at://x"),
            ],
            Duration::from_millis(20),
        );
        assert_eq!(summarize(&report), OverallStatus::AllSucceeded);
        assert_eq!(report.status(), OverallStatus::AllSucceeded);
    }

    #[test]
    fn test_partial_success() {
        let report = DispatchReport::new(
            Uuid::new_v4(),
            vec![
                success(PlatformKind::Nostr, "note1"),
                DispatchAttemptResult::new(
                    PlatformKind::Mastodon,
                    AttemptOutcome::TimedOut,
                    Duration::from_secs(1),
                ),
            ],
            Duration::from_secs(1),
        );
        assert_eq!(summarize(&report), OverallStatus::PartialSuccess);
        assert_eq!(report.failed().count(), 1);
    }

    #[test]
    fn test_all_failed() {
        let report = DispatchReport::new(
            Uuid::new_v4(),
            vec![
                failure(PlatformKind::Bluesky, DispatchFailure::MissingCredential),
                DispatchAttemptResult::new(
                    PlatformKind::Nostr,
                    AttemptOutcome::Cancelled,
                    Duration::ZERO,
                ),
            ],
            Duration::ZERO,
        );
        assert_eq!(summarize(&report), OverallStatus::AllFailed);
    }

    #[test]
    fn test_empty_report_counts_as_failed() {
        let report = DispatchReport::new(Uuid::new_v4(), vec![], Duration::ZERO);
        assert_eq!(summarize(&report), OverallStatus::AllFailed);
    }

    #[test]
    fn test_results_are_ordered_by_platform() {
        let report = DispatchReport::new(
            Uuid::new_v4(),
            vec![
                success(PlatformKind::Mastodon, "1"),
                success(PlatformKind::Nostr, "2"),
                success(PlatformKind::Bluesky, "3"),
            ],
            Duration::ZERO,
        );
        let order: Vec<_> = report.results().iter().map(|r| r.platform).collect();
        assert_eq!(order, PlatformKind::ALL.to_vec());
    }

    #[test]
    fn test_was_attempted() {
        assert!(!failure(
            PlatformKind::Mastodon,
            DispatchFailure::ExceedsLimit {
                limit: 500,
                actual: 750
            }
        )
        .was_attempted());
        assert!(failure(
            PlatformKind::Mastodon,
            DispatchFailure::Platform(PlatformError::RateLimit("429".to_string()))
        )
        .was_attempted());
        assert!(success(PlatformKind::Nostr, "x").was_attempted());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(OverallStatus::AllSucceeded.exit_code(), 0);
        assert_eq!(OverallStatus::AllFailed.exit_code(), 1);
        assert_eq!(OverallStatus::PartialSuccess.exit_code(), 4);
    }

    #[test]
    fn test_json_shape() {
        let report = DispatchReport::new(
            Uuid::new_v4(),
            vec![
                success(PlatformKind::Nostr, "note1abc"),
                failure(
                    PlatformKind::Mastodon,
                    DispatchFailure::ExceedsLimit {
                        limit: 500,
                        actual: 750,
                    },
                ),
            ],
            Duration::from_millis(42),
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "partial_success");
        assert_eq!(json["elapsed_ms"], 42);

        let results = json["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["platform"], "nostr");
        assert_eq!(results[0]["outcome"], "success");
        assert_eq!(results[0]["remote_id"], "note1abc");
        assert!(results[0].get("error").is_none());

        assert_eq!(results[1]["platform"], "mastodon");
        assert_eq!(results[1]["outcome"], "failure");
        assert_eq!(results[1]["error_kind"], "exceeds_limit");
        assert_eq!(results[1]["error"], "content is 750 characters, limit is 500");
    }

    #[test]
    fn test_render_text() {
        let report = DispatchReport::new(
            Uuid::new_v4(),
            vec![
                success(PlatformKind::Nostr, "note1abc"),
                failure(
                    PlatformKind::Bluesky,
                    DispatchFailure::InvalidCredential(CredentialError::Empty {
                        field: "handle",
                    }),
                ),
            ],
            Duration::ZERO,
        );

        let text = report.render_text();
        assert!(text.contains("nostr     posted note1abc"));
        assert!(text.contains("bluesky   failed: invalid credentials: handle must not be empty"));
        assert!(text.contains("Partial success: 1 of 2 platforms accepted the post"));
    }
}
