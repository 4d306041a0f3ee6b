//! Multi-platform dispatch tests against mock adapters

use std::sync::Arc;
use std::time::{Duration, Instant};

use libfanpost::credentials::{BlueskyLogin, MastodonAccess, NostrIdentity};
use libfanpost::dispatch::report::DispatchFailure;
use libfanpost::events::{Event, EventBus};
use libfanpost::platforms::mock::{MockBehavior, MockPublisher};
use libfanpost::platforms::PlatformAdapters;
use libfanpost::{
    AttemptOutcome, ComposedPost, Credential, CredentialError, CredentialSet, DispatchConfig,
    Dispatcher, OverallStatus, PlatformError, PlatformKind,
};
use nostr_sdk::Keys;
use tokio_util::sync::CancellationToken;

/// Mock adapters for all three platforms, kept around for inspection
struct Mocks {
    nostr: Arc<MockPublisher<NostrIdentity>>,
    bluesky: Arc<MockPublisher<BlueskyLogin>>,
    mastodon: Arc<MockPublisher<MastodonAccess>>,
}

impl Mocks {
    fn new(nostr: MockBehavior, bluesky: MockBehavior, mastodon: MockBehavior) -> Self {
        let timeout = Duration::from_millis(300);
        Self {
            nostr: Arc::new(
                MockPublisher::new(PlatformKind::Nostr, nostr).with_default_timeout(timeout),
            ),
            bluesky: Arc::new(
                MockPublisher::new(PlatformKind::Bluesky, bluesky).with_default_timeout(timeout),
            ),
            mastodon: Arc::new(
                MockPublisher::new(PlatformKind::Mastodon, mastodon).with_default_timeout(timeout),
            ),
        }
    }

    fn all_succeeding() -> Self {
        Self::new(
            MockBehavior::Succeed,
            MockBehavior::Succeed,
            MockBehavior::Succeed,
        )
    }

    fn adapters(&self) -> PlatformAdapters {
        PlatformAdapters::new(
            self.nostr.clone(),
            self.bluesky.clone(),
            self.mastodon.clone(),
        )
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.adapters(), DispatchConfig::default())
    }
}

fn nostr_credential() -> Credential {
    Credential::nostr(Keys::generate().secret_key().to_secret_hex())
}

fn all_credentials() -> CredentialSet {
    CredentialSet::new()
        .with(nostr_credential())
        .with(Credential::bluesky("alice.bsky.social", "abcd-efgh-ijkl-mnop"))
        .with(Credential::mastodon("https://mastodon.social", "token-abc123"))
}

fn outcome_for(report: &libfanpost::DispatchReport, kind: PlatformKind) -> AttemptOutcome {
    report
        .result_for(kind)
        .map(|result| result.outcome.clone())
        .unwrap_or_else(|| panic!("no result for {}", kind))
}

#[tokio::test]
async fn test_750_characters_only_reaches_nostr() {
    let mocks = Mocks::all_succeeding();
    let text = "a".repeat(750);
    let post = ComposedPost::new(text.clone(), PlatformKind::ALL).unwrap();

    let report = mocks.dispatcher().dispatch(&post, &all_credentials()).await;

    assert_eq!(report.status(), OverallStatus::PartialSuccess);
    assert_eq!(report.results().len(), 3);

    assert!(matches!(
        outcome_for(&report, PlatformKind::Nostr),
        AttemptOutcome::Success { .. }
    ));
    assert_eq!(
        outcome_for(&report, PlatformKind::Mastodon),
        AttemptOutcome::Failure(DispatchFailure::ExceedsLimit {
            limit: 500,
            actual: 750
        })
    );
    assert_eq!(
        outcome_for(&report, PlatformKind::Bluesky),
        AttemptOutcome::Failure(DispatchFailure::ExceedsLimit {
            limit: 300,
            actual: 750
        })
    );

    assert_eq!(mocks.nostr.call_count(), 1);
    assert_eq!(mocks.nostr.posted_content(), vec![text]);
    assert_eq!(mocks.mastodon.call_count(), 0);
    assert_eq!(mocks.bluesky.call_count(), 0);
}

#[tokio::test]
async fn test_all_platforms_succeed_with_distinct_ids() {
    let mocks = Mocks::all_succeeding();
    let post = ComposedPost::new("b".repeat(100), PlatformKind::ALL).unwrap();

    let report = mocks.dispatcher().dispatch(&post, &all_credentials()).await;

    assert_eq!(report.status(), OverallStatus::AllSucceeded);
    assert_eq!(report.status().exit_code(), 0);

    let mut ids: Vec<&str> = report
        .results()
        .iter()
        .filter_map(|result| result.remote_id())
        .collect();
    assert_eq!(ids.len(), 3);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn test_text_at_exact_limit_is_attempted() {
    let mocks = Mocks::all_succeeding();
    let post = ComposedPost::new("c".repeat(300), [PlatformKind::Bluesky]).unwrap();

    let report = mocks.dispatcher().dispatch(&post, &all_credentials()).await;

    assert_eq!(report.status(), OverallStatus::AllSucceeded);
    assert_eq!(mocks.bluesky.call_count(), 1);
}

#[tokio::test]
async fn test_hanging_adapter_times_out_and_is_cancelled() {
    let mocks = Mocks::new(
        MockBehavior::Hang,
        MockBehavior::Succeed,
        MockBehavior::Fail(PlatformError::Authentication("token revoked".to_string())),
    );
    let post = ComposedPost::new("hello", PlatformKind::ALL).unwrap();

    let started = Instant::now();
    let report = mocks.dispatcher().dispatch(&post, &all_credentials()).await;
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_millis(300) + Duration::from_secs(2),
        "dispatch took {:?}",
        elapsed
    );
    assert_eq!(outcome_for(&report, PlatformKind::Nostr), AttemptOutcome::TimedOut);
    assert!(matches!(
        outcome_for(&report, PlatformKind::Bluesky),
        AttemptOutcome::Success { .. }
    ));
    assert_eq!(
        outcome_for(&report, PlatformKind::Mastodon),
        AttemptOutcome::Failure(DispatchFailure::Platform(PlatformError::Authentication(
            "token revoked".to_string()
        )))
    );
    assert_eq!(report.status(), OverallStatus::PartialSuccess);
    assert_eq!(mocks.nostr.cancellation_count(), 1);
}

#[tokio::test]
async fn test_outcome_independent_of_other_platforms() {
    let post = ComposedPost::new("independent", PlatformKind::ALL).unwrap();
    let neighbours = [
        MockBehavior::Succeed,
        MockBehavior::Fail(PlatformError::Network("connection reset".to_string())),
        MockBehavior::Hang,
    ];

    let mut mastodon_outcomes = Vec::new();
    for behavior in neighbours {
        let mocks = Mocks::new(behavior.clone(), behavior, MockBehavior::Succeed);
        let report = mocks.dispatcher().dispatch(&post, &all_credentials()).await;
        mastodon_outcomes.push(outcome_for(&report, PlatformKind::Mastodon));
        assert_eq!(mocks.mastodon.call_count(), 1);
    }

    assert!(mastodon_outcomes
        .iter()
        .all(|outcome| *outcome == mastodon_outcomes[0]));
    assert!(matches!(
        mastodon_outcomes[0],
        AttemptOutcome::Success { .. }
    ));
}

#[tokio::test]
async fn test_slow_platform_does_not_delay_others() {
    let mocks = Mocks::new(
        MockBehavior::Delay(Duration::from_millis(200)),
        MockBehavior::Delay(Duration::from_millis(200)),
        MockBehavior::Delay(Duration::from_millis(200)),
    );
    let post = ComposedPost::new("concurrent", PlatformKind::ALL).unwrap();

    let started = Instant::now();
    let report = mocks.dispatcher().dispatch(&post, &all_credentials()).await;

    assert_eq!(report.status(), OverallStatus::AllSucceeded);
    // Sequential attempts would take at least 600ms
    assert!(started.elapsed() < Duration::from_millis(550));
}

#[tokio::test]
async fn test_missing_credential_skips_adapter() {
    let mocks = Mocks::all_succeeding();
    let credentials = CredentialSet::new()
        .with(nostr_credential())
        .with(Credential::mastodon("mastodon.social", "token-abc123"));
    let post = ComposedPost::new("hello", PlatformKind::ALL).unwrap();

    let report = mocks.dispatcher().dispatch(&post, &credentials).await;

    assert_eq!(
        outcome_for(&report, PlatformKind::Bluesky),
        AttemptOutcome::Failure(DispatchFailure::MissingCredential)
    );
    assert_eq!(mocks.bluesky.call_count(), 0);
    assert_eq!(report.status(), OverallStatus::PartialSuccess);
    assert!(!report.result_for(PlatformKind::Bluesky).unwrap().was_attempted());
}

#[tokio::test]
async fn test_invalid_credential_skips_adapter() {
    let mocks = Mocks::all_succeeding();
    // 63 hex digits: must not be padded into a valid key
    let credentials = CredentialSet::new()
        .with(Credential::nostr("a".repeat(63)))
        .with(Credential::mastodon("ftp://mastodon.social", "token-abc123"));
    let post = ComposedPost::new("hello", [PlatformKind::Nostr, PlatformKind::Mastodon]).unwrap();

    let report = mocks.dispatcher().dispatch(&post, &credentials).await;

    assert_eq!(report.status(), OverallStatus::AllFailed);
    assert!(matches!(
        outcome_for(&report, PlatformKind::Nostr),
        AttemptOutcome::Failure(DispatchFailure::InvalidCredential(
            CredentialError::InvalidNostrKey(_)
        ))
    ));
    assert!(matches!(
        outcome_for(&report, PlatformKind::Mastodon),
        AttemptOutcome::Failure(DispatchFailure::InvalidCredential(_))
    ));
    assert_eq!(mocks.nostr.call_count(), 0);
    assert_eq!(mocks.mastodon.call_count(), 0);
}

#[tokio::test]
async fn test_limit_is_checked_before_credentials() {
    let mocks = Mocks::all_succeeding();
    let post = ComposedPost::new("d".repeat(400), [PlatformKind::Bluesky]).unwrap();

    let report = mocks.dispatcher().dispatch(&post, &CredentialSet::new()).await;

    assert!(matches!(
        outcome_for(&report, PlatformKind::Bluesky),
        AttemptOutcome::Failure(DispatchFailure::ExceedsLimit { .. })
    ));
}

#[tokio::test]
async fn test_only_targeted_platforms_are_reported() {
    let mocks = Mocks::all_succeeding();
    let post = ComposedPost::new("just mastodon", [PlatformKind::Mastodon]).unwrap();

    let report = mocks.dispatcher().dispatch(&post, &all_credentials()).await;

    assert_eq!(report.results().len(), 1);
    assert!(report.result_for(PlatformKind::Nostr).is_none());
    assert_eq!(mocks.nostr.call_count(), 0);
    assert_eq!(mocks.bluesky.call_count(), 0);
}

#[tokio::test]
async fn test_adapter_timeout_error_is_reported_as_timed_out() {
    let mocks = Mocks::new(
        MockBehavior::Fail(PlatformError::Timeout("no relay acknowledged".to_string())),
        MockBehavior::Succeed,
        MockBehavior::Succeed,
    );
    let post = ComposedPost::new("hello", [PlatformKind::Nostr]).unwrap();

    let report = mocks.dispatcher().dispatch(&post, &all_credentials()).await;

    assert_eq!(outcome_for(&report, PlatformKind::Nostr), AttemptOutcome::TimedOut);
    assert_eq!(report.status(), OverallStatus::AllFailed);
}

#[tokio::test]
async fn test_platform_timeout_override() {
    let mocks = Mocks::new(
        MockBehavior::Succeed,
        MockBehavior::Delay(Duration::from_millis(150)),
        MockBehavior::Succeed,
    );
    let config =
        DispatchConfig::default().with_platform_timeout(PlatformKind::Bluesky, Duration::from_millis(30));
    let dispatcher = Dispatcher::new(mocks.adapters(), config);
    let post = ComposedPost::new("hello", PlatformKind::ALL).unwrap();

    let report = dispatcher.dispatch(&post, &all_credentials()).await;

    assert_eq!(outcome_for(&report, PlatformKind::Bluesky), AttemptOutcome::TimedOut);
    assert_eq!(report.status(), OverallStatus::PartialSuccess);
    assert_eq!(report.status().exit_code(), 4);
}

#[tokio::test]
async fn test_cancelling_dispatch_cancels_pending_attempts() {
    let mocks = Mocks::new(
        MockBehavior::Hang,
        MockBehavior::Hang,
        MockBehavior::Succeed,
    );
    let config = DispatchConfig::default().with_timeout(Duration::from_secs(30));
    let dispatcher = Dispatcher::new(mocks.adapters(), config);
    let post = ComposedPost::new("hello", PlatformKind::ALL).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let report = dispatcher
        .dispatch_with_cancel(&post, &all_credentials(), cancel)
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome_for(&report, PlatformKind::Nostr), AttemptOutcome::Cancelled);
    assert_eq!(outcome_for(&report, PlatformKind::Bluesky), AttemptOutcome::Cancelled);
    assert!(matches!(
        outcome_for(&report, PlatformKind::Mastodon),
        AttemptOutcome::Success { .. }
    ));
    assert_eq!(mocks.nostr.cancellation_count(), 1);
    assert_eq!(mocks.bluesky.cancellation_count(), 1);
    assert_eq!(report.status(), OverallStatus::PartialSuccess);
}

#[tokio::test]
async fn test_dispatch_emits_progress_events() {
    let mocks = Mocks::all_succeeding();
    let events = EventBus::new(32);
    let mut receiver = events.subscribe();
    let dispatcher = mocks.dispatcher().with_events(events);

    let post = ComposedPost::new("e".repeat(400), PlatformKind::ALL).unwrap();
    let report = dispatcher.dispatch(&post, &all_credentials()).await;

    let mut received = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        received.push(event);
    }

    assert!(matches!(received.first(), Some(Event::DispatchStarted { .. })));
    assert_eq!(
        received.last(),
        Some(&Event::DispatchCompleted {
            post_id: post.id().to_string(),
            status: report.status(),
        })
    );

    // 400 characters: Bluesky is skipped, Nostr and Mastodon run
    let skipped: Vec<PlatformKind> = received
        .iter()
        .filter_map(|event| match event {
            Event::AttemptSkipped { platform, .. } => Some(*platform),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec![PlatformKind::Bluesky]);

    let finished = received
        .iter()
        .filter(|event| matches!(event, Event::AttemptFinished { outcome, .. } if outcome == "success"))
        .count();
    assert_eq!(finished, 2);
}

#[tokio::test]
async fn test_report_json_shape() {
    let mocks = Mocks::new(
        MockBehavior::Succeed,
        MockBehavior::Succeed,
        MockBehavior::Fail(PlatformError::RateLimit("429".to_string())),
    );
    let post = ComposedPost::new("f".repeat(400), PlatformKind::ALL).unwrap();

    let report = mocks.dispatcher().dispatch(&post, &all_credentials()).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["status"], "partial_success");
    assert_eq!(json["post_id"], post.id().to_string());

    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["platform"], "nostr");
    assert_eq!(results[0]["outcome"], "success");
    assert!(results[0]["remote_id"].is_string());
    assert_eq!(results[1]["platform"], "bluesky");
    assert_eq!(results[1]["error_kind"], "exceeds_limit");
    assert_eq!(results[2]["platform"], "mastodon");
    assert_eq!(results[2]["outcome"], "failure");
    assert_eq!(results[2]["error_kind"], "rate_limit");
}
