//! Multi-platform dispatch
//!
//! [`Dispatcher::dispatch`] sends one [`ComposedPost`] to each of its target
//! platforms:
//!
//! 1. The text is checked against the platform's length limit.
//! 2. The platform's credential is looked up and validated.
//! 3. The adapter's publish runs on its own tokio task, bounded by the
//!    platform's timeout.
//!
//! A platform failing step 1 or 2 is recorded without touching the network.
//! Attempts run concurrently and never wait on each other; the report is
//! built once every attempt has succeeded, failed, timed out or been
//! cancelled. Nothing is retried.
//!
//! # Example
//!
//! ```no_run
//! use libfanpost::config::Config;
//! use libfanpost::credentials::{CredentialStore, FileCredentialStore};
//! use libfanpost::platforms::PlatformAdapters;
//! use libfanpost::{ComposedPost, Dispatcher, PlatformKind};
//!
//! # async fn example() -> libfanpost::Result<()> {
//! let config = Config::load()?;
//! let adapters = PlatformAdapters::from_config(&config)?;
//! let dispatcher = Dispatcher::new(adapters, config.dispatch_config());
//!
//! let store = FileCredentialStore::from_config_path(&config.credentials.path)?;
//! let credentials = store.load_set(&PlatformKind::ALL)?;
//!
//! let post = ComposedPost::new("Hello, everyone!", PlatformKind::ALL)?;
//! let report = dispatcher.dispatch(&post, &credentials).await;
//! print!("{}", report.render_text());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constraints::{self, ConstraintCheck};
use crate::credentials::{validate, CredentialSet};
use crate::error::PlatformError;
use crate::events::{Event, EventBus};
use crate::platforms::{PlatformAdapters, PublishOutcome};
use crate::types::{ComposedPost, PlatformKind};

pub mod report;

use self::report::{AttemptOutcome, DispatchAttemptResult, DispatchFailure, DispatchReport};

/// Timeout policy for publish attempts
///
/// Precedence, highest first: a per-platform timeout, the global timeout,
/// the adapter's own default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchConfig {
    timeout: Option<Duration>,
    platform_timeouts: BTreeMap<PlatformKind, Duration>,
}

impl DispatchConfig {
    /// Use `timeout` for every platform without a specific override
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_platform_timeout(mut self, kind: PlatformKind, timeout: Duration) -> Self {
        self.platform_timeouts.insert(kind, timeout);
        self
    }

    /// Timeout for `kind`, falling back to `adapter_default`
    pub fn timeout_for(&self, kind: PlatformKind, adapter_default: Duration) -> Duration {
        self.platform_timeouts
            .get(&kind)
            .copied()
            .or(self.timeout)
            .unwrap_or(adapter_default)
    }
}

/// Fans a post out to its target platforms and collects the results
pub struct Dispatcher {
    adapters: PlatformAdapters,
    config: DispatchConfig,
    events: Option<EventBus>,
}

impl Dispatcher {
    pub fn new(adapters: PlatformAdapters, config: DispatchConfig) -> Self {
        Self {
            adapters,
            config,
            events: None,
        }
    }

    /// Publish progress events on `events` during each dispatch
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatch `post` to all of its targets and wait for every attempt
    pub async fn dispatch(&self, post: &ComposedPost, credentials: &CredentialSet) -> DispatchReport {
        self.dispatch_with_cancel(post, credentials, CancellationToken::new())
            .await
    }

    /// Like [`dispatch`](Self::dispatch), but stops early when `cancel` fires
    ///
    /// Attempts still running at cancellation are dropped, which closes their
    /// connections, and are reported as [`AttemptOutcome::Cancelled`]. The
    /// report still covers every target.
    pub async fn dispatch_with_cancel(
        &self,
        post: &ComposedPost,
        credentials: &CredentialSet,
        cancel: CancellationToken,
    ) -> DispatchReport {
        let started = Instant::now();
        let post_id = post.id().to_string();
        let targets: Vec<PlatformKind> = post.targets().iter().copied().collect();

        info!(
            post_id = %post_id,
            "Dispatching post to {} platform(s)",
            targets.len()
        );
        self.emit(Event::DispatchStarted {
            post_id: post_id.clone(),
            platforms: targets.clone(),
        });

        let mut results = Vec::with_capacity(targets.len());
        let mut attempts = AttemptSet::default();

        for kind in targets {
            let gate_started = Instant::now();

            let skip = match constraints::check(kind, post.text()) {
                ConstraintCheck::ExceedsLimit { limit, actual } => {
                    Some(DispatchFailure::ExceedsLimit { limit, actual })
                }
                ConstraintCheck::WithinLimit => None,
            };

            let verified = match skip {
                Some(failure) => Err(failure),
                None => match credentials.get(kind) {
                    None => Err(DispatchFailure::MissingCredential),
                    Some(credential) => {
                        validate(kind, credential).map_err(DispatchFailure::InvalidCredential)
                    }
                },
            };

            let credential = match verified {
                Ok(credential) => credential,
                Err(failure) => {
                    info!(platform = %kind, "Skipping {}: {}", kind, failure);
                    self.emit(Event::AttemptSkipped {
                        post_id: post_id.clone(),
                        platform: kind,
                        reason: failure.to_string(),
                    });
                    results.push(DispatchAttemptResult::new(
                        kind,
                        AttemptOutcome::Failure(failure),
                        gate_started.elapsed(),
                    ));
                    continue;
                }
            };

            let timeout = self
                .config
                .timeout_for(kind, self.adapters.default_timeout(kind));
            let publish = self.adapters.publish(credential, post.shared_text());

            debug!(platform = %kind, "Starting attempt with {:?} timeout", timeout);
            self.emit(Event::AttemptStarted {
                post_id: post_id.clone(),
                platform: kind,
            });

            let handle = tokio::spawn(run_attempt(kind, timeout, publish, cancel.clone()));
            attempts.push(kind, handle);
        }

        for result in attempts.join().await {
            self.emit(Event::AttemptFinished {
                post_id: post_id.clone(),
                platform: result.platform,
                outcome: result.outcome.label().to_string(),
                elapsed_ms: u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            });
            results.push(result);
        }

        let report = DispatchReport::new(post.id(), results, started.elapsed());

        info!(
            post_id = %post_id,
            status = %report.status(),
            "Dispatch finished in {:?}",
            report.elapsed()
        );
        self.emit(Event::DispatchCompleted {
            post_id,
            status: report.status(),
        });

        report
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

/// Run one publish, bounded by `timeout` and `cancel`
///
/// Whichever finishes first wins; the publish future is dropped otherwise.
async fn run_attempt(
    kind: PlatformKind,
    timeout: Duration,
    publish: BoxFuture<'static, PublishOutcome>,
    cancel: CancellationToken,
) -> DispatchAttemptResult {
    let started = Instant::now();

    let guarded = AssertUnwindSafe(publish).catch_unwind();

    let outcome = tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            info!(platform = %kind, "Attempt cancelled");
            AttemptOutcome::Cancelled
        }
        finished = tokio::time::timeout(timeout, guarded) => match finished {
            Err(_) => {
                warn!(platform = %kind, "No response within {:?}, abandoning attempt", timeout);
                AttemptOutcome::TimedOut
            }
            Ok(Err(_panic)) => {
                warn!(platform = %kind, "Adapter panicked while publishing");
                AttemptOutcome::Failure(DispatchFailure::Platform(PlatformError::Posting(
                    "adapter panicked while publishing".to_string(),
                )))
            }
            Ok(Ok(Ok(remote_id))) => {
                info!(platform = %kind, "Posted to {}: {}", kind, remote_id);
                AttemptOutcome::Success { remote_id }
            }
            Ok(Ok(Err(PlatformError::Timeout(reason)))) => {
                warn!(platform = %kind, "Adapter gave up waiting: {}", reason);
                AttemptOutcome::TimedOut
            }
            Ok(Ok(Err(e))) => {
                warn!(platform = %kind, "Failed to post to {}: {}", kind, e);
                AttemptOutcome::Failure(DispatchFailure::Platform(e))
            }
        },
    };

    DispatchAttemptResult::new(kind, outcome, started.elapsed())
}

/// Spawned attempts, aborted if dropped before being joined
#[derive(Default)]
struct AttemptSet {
    handles: Vec<(PlatformKind, Instant, JoinHandle<DispatchAttemptResult>)>,
}

impl AttemptSet {
    fn push(&mut self, kind: PlatformKind, handle: JoinHandle<DispatchAttemptResult>) {
        self.handles.push((kind, Instant::now(), handle));
    }

    /// Wait for every attempt
    ///
    /// A task that died without producing a result is reported as a failure
    /// of its own platform.
    async fn join(mut self) -> Vec<DispatchAttemptResult> {
        let waits = self.handles.iter_mut().map(|(kind, started, handle)| {
            let kind = *kind;
            let started = *started;
            async move {
                match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(platform = %kind, "Attempt task failed: {}", e);
                        DispatchAttemptResult::new(
                            kind,
                            AttemptOutcome::Failure(DispatchFailure::Platform(
                                PlatformError::Posting(format!("attempt task failed: {}", e)),
                            )),
                            started.elapsed(),
                        )
                    }
                }
            }
        });

        join_all(waits).await
    }
}

impl Drop for AttemptSet {
    fn drop(&mut self) {
        for (_, _, handle) in &self.handles {
            handle.abort();
        }
    }
}
