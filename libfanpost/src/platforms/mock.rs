//! Mock publisher for testing
//!
//! [`MockPublisher`] stands in for any platform adapter. It can succeed, fail
//! with a chosen error, respond after a delay or never respond at all, and it
//! records what happened so tests can check that the dispatcher called it,
//! skipped it, or cancelled it.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::platforms::{PublishOutcome, Publisher};
use crate::types::PlatformKind;

/// What a [`MockPublisher`] does when asked to publish
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return a fresh remote id immediately
    Succeed,
    /// Return the given error immediately
    Fail(PlatformError),
    /// Wait, then return a fresh remote id
    Delay(Duration),
    /// Never complete
    Hang,
}

/// Mock adapter for the platform whose verified credential is `C`
pub struct MockPublisher<C> {
    kind: PlatformKind,
    behavior: MockBehavior,
    default_timeout: Duration,
    calls: AtomicUsize,
    cancellations: Arc<AtomicUsize>,
    posted_content: Mutex<Vec<String>>,
    _credential: PhantomData<fn() -> C>,
}

impl<C> MockPublisher<C> {
    pub fn new(kind: PlatformKind, behavior: MockBehavior) -> Self {
        Self {
            kind,
            behavior,
            default_timeout: Duration::from_secs(5),
            calls: AtomicUsize::new(0),
            cancellations: Arc::new(AtomicUsize::new(0)),
            posted_content: Mutex::new(Vec::new()),
            _credential: PhantomData,
        }
    }

    pub fn succeeding(kind: PlatformKind) -> Self {
        Self::new(kind, MockBehavior::Succeed)
    }

    pub fn failing(kind: PlatformKind, error: PlatformError) -> Self {
        Self::new(kind, MockBehavior::Fail(error))
    }

    pub fn delayed(kind: PlatformKind, delay: Duration) -> Self {
        Self::new(kind, MockBehavior::Delay(delay))
    }

    pub fn hanging(kind: PlatformKind) -> Self {
        Self::new(kind, MockBehavior::Hang)
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Number of times publish was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of publishes dropped before they completed
    pub fn cancellation_count(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// Texts passed to publish, in call order
    pub fn posted_content(&self) -> Vec<String> {
        match self.posted_content.lock() {
            Ok(posted) => posted.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, text: &str) -> usize {
        match self.posted_content.lock() {
            Ok(mut posted) => posted.push(text.to_string()),
            Err(poisoned) => poisoned.into_inner().push(text.to_string()),
        }
        self.calls.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn remote_id(&self, call: usize) -> String {
        format!("mock-{}-{}", self.kind, call)
    }
}

#[async_trait]
impl<C> Publisher for MockPublisher<C>
where
    C: Send + Sync + 'static,
{
    type Credential = C;

    fn kind(&self) -> PlatformKind {
        self.kind
    }

    fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    async fn publish(&self, _credential: &C, text: &str) -> PublishOutcome {
        let call = self.record(text);
        let mut guard = CompletionGuard::new(Arc::clone(&self.cancellations));

        let outcome = match &self.behavior {
            MockBehavior::Succeed => Ok(self.remote_id(call)),
            MockBehavior::Fail(error) => Err(error.clone()),
            MockBehavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(self.remote_id(call))
            }
            MockBehavior::Hang => {
                futures::future::pending::<()>().await;
                Ok(self.remote_id(call))
            }
        };

        guard.completed = true;
        outcome
    }
}

/// Counts a cancellation when dropped before `completed` is set
struct CompletionGuard {
    cancellations: Arc<AtomicUsize>,
    completed: bool,
}

impl CompletionGuard {
    fn new(cancellations: Arc<AtomicUsize>) -> Self {
        Self {
            cancellations,
            completed: false,
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.cancellations.fetch_add(1, Ordering::SeqCst);
        }
    }
}
