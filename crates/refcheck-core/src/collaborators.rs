//! Capability interfaces for optional external collaborators.
//!
//! The core never performs I/O itself. Providers, verifiers and registries
//! are supplied from outside; each has a null implementation that always
//! reports "not verified" (`Ok(None)`), so the pipeline runs unchanged with
//! none of them available.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enrichment::EntryPatch;
use crate::{Field, ReferenceEntry};

/// Failure of a boundary collaborator. Caught at the enrichment and
/// verdict-collection edge and downgraded to a "verify manually" issue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("HTTP request error: {0}")]
    Http(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("rate limited")]
    RateLimited,
    #[error("timed out")]
    Timeout,
    #[error("could not parse response: {0}")]
    Parse(String),
    #[error("{0}")]
    Other(String),
}

/// Boxed future returned by async collaborators. `Ok(None)` means the
/// collaborator had nothing to say (not found, not applicable, skipped).
pub type CollaboratorFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<Option<T>, CollaboratorError>> + Send + 'a>>;

/// Fills absent fields from an authoritative source.
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch values for `wanted` (all absent on `entry`). Values for fields
    /// outside `wanted` are ignored by the merge.
    fn fetch<'a>(
        &'a self,
        entry: &'a ReferenceEntry,
        wanted: &'a [Field],
    ) -> CollaboratorFuture<'a, EntryPatch>;
}

/// One field compared against an authoritative record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub claimed: Option<String>,
    pub authoritative: Option<String>,
    pub matches: bool,
}

pub type FieldComparisons = BTreeMap<Field, FieldComparison>;

/// Compares parsed fields with an authoritative record.
pub trait OnlineVerifier: Send + Sync {
    fn name(&self) -> &str;

    fn verify<'a>(&'a self, entry: &'a ReferenceEntry) -> CollaboratorFuture<'a, FieldComparisons>;
}

/// Reachability of a DOI or URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub reachable: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl LinkStatus {
    /// Reachable when `200 <= status < 400`.
    pub fn from_status(status: u16) -> Self {
        Self {
            reachable: (200..400).contains(&status),
            status_code: Some(status),
            error: None,
        }
    }

    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            reachable: false,
            status_code: None,
            error: Some(error.into()),
        }
    }

    /// `"status 404"`, `"connection refused"`, or `"unreachable"`.
    pub fn detail(&self) -> String {
        match (self.status_code, &self.error) {
            (Some(code), _) => format!("status {}", code),
            (None, Some(err)) => err.clone(),
            (None, None) => "unreachable".to_string(),
        }
    }
}

pub trait LinkVerifier: Send + Sync {
    fn check<'a>(&'a self, doi_or_url: &'a str) -> CollaboratorFuture<'a, LinkStatus>;
}

/// A registry hit for a venue, publisher or domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryVerdict {
    pub matched_name: String,
    pub source: Option<String>,
    /// What matched: `"venue"`, `"publisher"` or `"domain"`.
    pub matched_on: String,
}

/// Data-driven venue screening (e.g. a predatory-journal list).
pub trait Registry: Send + Sync {
    fn lookup(&self, venue_or_publisher: &str) -> Option<RegistryVerdict>;

    fn lookup_url(&self, _url: &str) -> Option<RegistryVerdict> {
        None
    }
}

/// Provider that never has anything to add.
pub struct NullProvider;

impl MetadataProvider for NullProvider {
    fn name(&self) -> &str {
        "none"
    }

    fn fetch<'a>(
        &'a self,
        _entry: &'a ReferenceEntry,
        _wanted: &'a [Field],
    ) -> CollaboratorFuture<'a, EntryPatch> {
        Box::pin(async { Ok(None) })
    }
}

/// Verifier that never verifies.
pub struct NullVerifier;

impl OnlineVerifier for NullVerifier {
    fn name(&self) -> &str {
        "none"
    }

    fn verify<'a>(&'a self, _entry: &'a ReferenceEntry) -> CollaboratorFuture<'a, FieldComparisons> {
        Box::pin(async { Ok(None) })
    }
}

/// Link verifier that never checks.
pub struct NullLinkVerifier;

impl LinkVerifier for NullLinkVerifier {
    fn check<'a>(&'a self, _doi_or_url: &'a str) -> CollaboratorFuture<'a, LinkStatus> {
        Box::pin(async { Ok(None) })
    }
}

/// Registry with no records.
pub struct NullRegistry;

impl Registry for NullRegistry {
    fn lookup(&self, _venue_or_publisher: &str) -> Option<RegistryVerdict> {
        None
    }
}
