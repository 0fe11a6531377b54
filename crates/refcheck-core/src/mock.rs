//! Mock collaborators for testing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::collaborators::{
    CollaboratorError, CollaboratorFuture, FieldComparisons, LinkStatus, LinkVerifier,
    MetadataProvider, OnlineVerifier, Registry, RegistryVerdict,
};
use crate::enrichment::EntryPatch;
use crate::{Field, ReferenceEntry};

/// A configurable mock response for [`MockProvider`].
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Return this patch.
    Patch(EntryPatch),
    /// Simulate "nothing found".
    NotFound,
    /// Simulate a collaborator failure.
    Fail(String),
}

/// A hand-rolled mock implementing [`MetadataProvider`].
///
/// Supports:
/// - A fixed reply (used for every call), **or**
/// - A sequence of replies (one per call, repeating the last if exhausted).
/// - Optional per-call latency.
/// - Call counting via [`call_count()`](MockProvider::call_count).
pub struct MockProvider {
    name: &'static str,
    /// Pending replies, reversed so `pop()` yields the next one.
    replies: Mutex<Vec<MockReply>>,
    fallback: MockReply,
    delay: Option<Duration>,
    call_count: AtomicUsize,
}

impl MockProvider {
    /// Create a mock that always returns `reply`.
    pub fn new(name: &'static str, reply: MockReply) -> Self {
        Self {
            name,
            replies: Mutex::new(Vec::new()),
            fallback: reply,
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Create a mock that returns replies in order, repeating the last one.
    pub fn with_sequence(name: &'static str, mut replies: Vec<MockReply>) -> Self {
        replies.reverse();
        let fallback = replies.first().cloned().unwrap_or(MockReply::NotFound);
        Self {
            name,
            replies: Mutex::new(replies),
            fallback,
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `fetch()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> MockReply {
        let next = match self.replies.lock() {
            Ok(mut seq) => seq.pop(),
            Err(_) => None,
        };
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

impl MetadataProvider for MockProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn fetch<'a>(
        &'a self,
        _entry: &'a ReferenceEntry,
        _wanted: &'a [Field],
    ) -> CollaboratorFuture<'a, EntryPatch> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let reply = self.next_reply();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match reply {
                MockReply::Patch(patch) => Ok(Some(patch)),
                MockReply::NotFound => Ok(None),
                MockReply::Fail(msg) => Err(CollaboratorError::Other(msg)),
            }
        })
    }
}

/// Verifier returning canned comparisons per entry label.
#[derive(Default)]
pub struct MockVerifier {
    pub comparisons: HashMap<String, FieldComparisons>,
    pub fail_labels: Vec<String>,
    pub call_count: AtomicUsize,
}

impl MockVerifier {
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl OnlineVerifier for MockVerifier {
    fn name(&self) -> &str {
        "mock-verifier"
    }

    fn verify<'a>(&'a self, entry: &'a ReferenceEntry) -> CollaboratorFuture<'a, FieldComparisons> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let label = entry.label.as_str();
            if self.fail_labels.iter().any(|l| l == label) {
                return Err(CollaboratorError::Status(503));
            }
            Ok(self.comparisons.get(label).cloned())
        })
    }
}

/// Link verifier with canned statuses per target. Unknown targets are
/// reported as reachable; targets listed in `hang` never answer.
#[derive(Default)]
pub struct MockLinkVerifier {
    pub statuses: HashMap<String, u16>,
    pub hang: Vec<String>,
    pub call_count: AtomicUsize,
}

impl MockLinkVerifier {
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl LinkVerifier for MockLinkVerifier {
    fn check<'a>(&'a self, doi_or_url: &'a str) -> CollaboratorFuture<'a, LinkStatus> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if self.hang.iter().any(|t| t == doi_or_url) {
                std::future::pending::<()>().await;
            }
            let status = self.statuses.get(doi_or_url).copied().unwrap_or(200);
            Ok(Some(LinkStatus::from_status(status)))
        })
    }
}

/// Registry matching exact names.
#[derive(Default)]
pub struct MockRegistry {
    pub names: Vec<String>,
}

impl Registry for MockRegistry {
    fn lookup(&self, venue_or_publisher: &str) -> Option<RegistryVerdict> {
        self.names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(venue_or_publisher.trim()))
            .map(|n| RegistryVerdict {
                matched_name: n.clone(),
                source: Some("mock".into()),
                matched_on: "venue".into(),
            })
    }
}
