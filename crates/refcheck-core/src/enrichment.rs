//! Enrichment: filling absent entry fields from metadata providers.
//!
//! The merge is fill-if-absent and idempotent: a present value is never
//! overwritten, and `merge(merge(e, p), p) == merge(e, p)`.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use serde::{Deserialize, Serialize};

use crate::collaborators::{CollaboratorError, MetadataProvider};
use crate::validator::{StyleProfile, Verdicts, wanted_fields};
use crate::{Author, EntryType, Field, ReferenceEntry, ReferenceLabel};

/// Field values offered by a provider. Only fields that are `Some` (and
/// non-empty) can be merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPatch {
    pub authors: Option<Vec<Author>>,
    pub year: Option<u16>,
    pub title: Option<String>,
    pub venue: Option<String>,
    pub publisher: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub isbn: Option<String>,
    pub entry_type: Option<EntryType>,
}

impl EntryPatch {
    pub fn provides(&self, field: Field) -> bool {
        match field {
            Field::Authors => self.authors.as_ref().is_some_and(|a| !a.is_empty()),
            Field::Year => self.year.is_some(),
            Field::Title => non_empty(&self.title),
            Field::Venue => non_empty(&self.venue),
            Field::Publisher => non_empty(&self.publisher),
            Field::Volume => non_empty(&self.volume),
            Field::Issue => non_empty(&self.issue),
            Field::Pages => non_empty(&self.pages),
            Field::Doi => non_empty(&self.doi),
            Field::Url => non_empty(&self.url),
            Field::Isbn => non_empty(&self.isbn),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entry_type.is_none() && !Field::ALL.iter().any(|f| self.provides(*f))
    }

    /// Keep only values for `fields`. The type is always kept: it is a hint,
    /// not a field the entry claims.
    pub fn restricted_to(mut self, fields: &[Field]) -> Self {
        for field in Field::ALL {
            if fields.contains(&field) {
                continue;
            }
            match field {
                Field::Authors => self.authors = None,
                Field::Year => self.year = None,
                Field::Title => self.title = None,
                Field::Venue => self.venue = None,
                Field::Publisher => self.publisher = None,
                Field::Volume => self.volume = None,
                Field::Issue => self.issue = None,
                Field::Pages => self.pages = None,
                Field::Doi => self.doi = None,
                Field::Url => self.url = None,
                Field::Isbn => self.isbn = None,
            }
        }
        self
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn fill(slot: &mut Option<String>, value: &Option<String>) -> bool {
    if slot.is_some() {
        return false;
    }
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => {
            *slot = Some(v.to_string());
            true
        }
        _ => false,
    }
}

/// Fill absent fields of `entry` from `patch`, in place. Returns the
/// fields that were filled.
pub fn merge_patch(entry: &mut ReferenceEntry, patch: &EntryPatch) -> Vec<Field> {
    let mut filled = Vec::new();
    if entry.authors.is_empty() {
        if let Some(authors) = patch.authors.as_ref().filter(|a| !a.is_empty()) {
            entry.authors = authors.clone();
            filled.push(Field::Authors);
        }
    }
    if entry.year.is_none() {
        if let Some(year) = patch.year {
            entry.year = Some(year);
            filled.push(Field::Year);
        }
    }
    let text_slots: [(Field, &mut Option<String>, &Option<String>); 9] = [
        (Field::Title, &mut entry.title, &patch.title),
        (Field::Venue, &mut entry.venue, &patch.venue),
        (Field::Publisher, &mut entry.publisher, &patch.publisher),
        (Field::Volume, &mut entry.volume, &patch.volume),
        (Field::Issue, &mut entry.issue, &patch.issue),
        (Field::Pages, &mut entry.pages, &patch.pages),
        (Field::Doi, &mut entry.doi, &patch.doi),
        (Field::Url, &mut entry.url, &patch.url),
        (Field::Isbn, &mut entry.isbn, &patch.isbn),
    ];
    for (field, slot, value) in text_slots {
        if fill(slot, value) {
            filled.push(field);
        }
    }
    if entry.type_hint.is_none() && patch.entry_type.is_some() {
        entry.type_hint = patch.entry_type;
    }
    filled
}

/// Non-mutating form of [`merge_patch`].
pub fn merged(entry: &ReferenceEntry, patch: &EntryPatch) -> ReferenceEntry {
    let mut out = entry.clone();
    merge_patch(&mut out, patch);
    out
}

/// A field filled by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilledField {
    pub label: ReferenceLabel,
    pub field: Field,
    pub source: String,
}

/// Outcome of an enrichment pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentReport {
    pub filled: Vec<FilledField>,
    /// Provider failures, to be reported as "verify manually".
    pub failures: Verdicts,
}

/// Ask providers, in order, for the fields each entry is missing.
///
/// A provider is never called for an entry with nothing missing, and later
/// providers are only asked for what earlier ones could not supply.
/// Provider errors are caught here and recorded, never propagated.
pub async fn enrich_entries(
    entries: &mut [ReferenceEntry],
    providers: &[Arc<dyn MetadataProvider>],
    profile: StyleProfile,
    concurrency: usize,
) -> EnrichmentReport {
    let mut report = EnrichmentReport::default();
    if providers.is_empty() {
        return report;
    }

    let results: Vec<(usize, ReferenceEntry, Vec<FilledField>, Vec<String>)> =
        stream::iter(entries.iter().cloned().enumerate())
            .map(|(index, entry)| async move {
                let (entry, filled, failures) = enrich_one(entry, providers, profile).await;
                (index, entry, filled, failures)
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

    for (index, entry, filled, failures) in results {
        for reason in failures {
            report.failures.skip(&entry.label, reason);
        }
        report.filled.extend(filled);
        entries[index] = entry;
    }
    tracing::info!(filled = report.filled.len(), "enrichment complete");
    report
}

async fn enrich_one(
    mut entry: ReferenceEntry,
    providers: &[Arc<dyn MetadataProvider>],
    profile: StyleProfile,
) -> (ReferenceEntry, Vec<FilledField>, Vec<String>) {
    let mut filled = Vec::new();
    let mut failures = Vec::new();
    for provider in providers {
        let wanted = wanted_fields(&entry, profile);
        if wanted.is_empty() {
            break;
        }
        let outcome: Result<Option<EntryPatch>, CollaboratorError> =
            provider.fetch(&entry, &wanted).await;
        match outcome {
            Ok(Some(patch)) => {
                let patch = patch.restricted_to(&wanted);
                for field in merge_patch(&mut entry, &patch) {
                    tracing::debug!(label = %entry.label, %field, source = provider.name(), "filled field");
                    filled.push(FilledField {
                        label: entry.label.clone(),
                        field,
                        source: provider.name().to_string(),
                    });
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(label = %entry.label, provider = provider.name(), error = %e, "metadata provider failed");
                failures.push(format!("{}: {}", provider.name(), e));
            }
        }
    }
    (entry, filled, failures)
}
