//! Reference type classification.
//!
//! A fixed-priority table of named predicates; the first rule that returns a
//! type wins. Classification is advisory: it only decides which completeness
//! checklist the validator applies.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::matching::normalize_doi;
use crate::{EntryType, ReferenceEntry};

/// DOI prefixes of preprint servers.
pub const PREPRINT_DOI_PREFIXES: &[&str] = &[
    "10.48550", // arXiv
    "10.1101",  // bioRxiv / medRxiv
    "10.2139",  // SSRN
    "10.31219", // OSF Preprints
    "10.31234", // PsyArXiv
    "10.31235", // SocArXiv
    "10.21203", // Research Square
    "10.20944", // Preprints.org
    "10.22541", // Authorea
    "10.26434", // ChemRxiv
];

static PREPRINT_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:arxiv|biorxiv|medrxiv|chemrxiv|psyarxiv|ssrn|research\s+square|preprints?)\b|arxiv\.org/").unwrap()
});

static PRESS_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:press|publishers?|publishing|verlag|books)\b").unwrap()
});

static EDITOR_MARK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\((?:eds?|editors?)\.?\)|\beds?\.\s|\beditors?\b").unwrap());

static CONFERENCE_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:proceedings|conference|symposium|workshop|congress)\b|\b(?:proc|conf)\.")
        .unwrap()
});

static JOURNAL_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:journal|review|letters|transactions|annals|bulletin|quarterly|magazine|science|nature|lancet)\b|\b(?:j|trans)\.",
    )
    .unwrap()
});

static DATASET_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:data\s?set|repository|zenodo|dryad|figshare|data\s+archive|dataverse)\b")
        .unwrap()
});

/// One row of the classification table.
pub struct ClassificationRule {
    pub name: &'static str,
    pub decide: fn(&ReferenceEntry) -> Option<EntryType>,
}

/// Rules in priority order.
pub static RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "type_hint",
        decide: explicit_hint,
    },
    ClassificationRule {
        name: "preprint",
        decide: preprint,
    },
    ClassificationRule {
        name: "book",
        decide: book_or_chapter,
    },
    ClassificationRule {
        name: "conference",
        decide: conference,
    },
    ClassificationRule {
        name: "website",
        decide: website,
    },
    ClassificationRule {
        name: "dataset",
        decide: dataset,
    },
];

fn explicit_hint(entry: &ReferenceEntry) -> Option<EntryType> {
    entry.type_hint
}

fn preprint(entry: &ReferenceEntry) -> Option<EntryType> {
    is_preprint(entry).then_some(EntryType::Preprint)
}

fn conference(entry: &ReferenceEntry) -> Option<EntryType> {
    entry
        .venue
        .as_deref()
        .is_some_and(|v| CONFERENCE_TOKENS.is_match(v))
        .then_some(EntryType::ConferencePaper)
}

fn website(entry: &ReferenceEntry) -> Option<EntryType> {
    (entry.url.is_some() && entry.doi.is_none() && !has_journal_like_venue(entry))
        .then_some(EntryType::Website)
}

fn dataset(entry: &ReferenceEntry) -> Option<EntryType> {
    let hit = DATASET_TOKENS.is_match(&entry.raw_text)
        || entry.venue.as_deref().is_some_and(|v| DATASET_TOKENS.is_match(v));
    hit.then_some(EntryType::Dataset)
}

fn is_preprint(entry: &ReferenceEntry) -> bool {
    if let Some(doi) = &entry.doi {
        let doi = normalize_doi(doi);
        if PREPRINT_DOI_PREFIXES
            .iter()
            .any(|p| doi.strip_prefix(p).is_some_and(|rest| rest.starts_with('/')))
        {
            return true;
        }
    }
    [&entry.venue, &entry.publisher, &entry.url]
        .into_iter()
        .flatten()
        .any(|s| PREPRINT_TOKENS.is_match(s))
}

fn book_or_chapter(entry: &ReferenceEntry) -> Option<EntryType> {
    if entry.volume.is_some() || entry.issue.is_some() {
        return None;
    }
    let venue = entry.venue.as_deref().unwrap_or("");
    // Conference proceedings often carry a publisher too
    if CONFERENCE_TOKENS.is_match(venue) {
        return None;
    }
    let press = entry.publisher.is_some() || PRESS_TOKENS.is_match(venue);
    if entry.isbn.is_none() && !press {
        return None;
    }
    let in_collection = venue.starts_with("In ")
        || venue.starts_with("In:")
        || EDITOR_MARK.is_match(&entry.raw_text);
    Some(if in_collection {
        EntryType::BookChapter
    } else {
        EntryType::Book
    })
}

fn has_journal_like_venue(entry: &ReferenceEntry) -> bool {
    entry
        .venue
        .as_deref()
        .is_some_and(|v| JOURNAL_TOKENS.is_match(v) || entry.volume.is_some())
}

/// Classify an entry, also returning the name of the rule that decided.
pub fn classify_with_rule(entry: &ReferenceEntry) -> (EntryType, &'static str) {
    RULES
        .iter()
        .find_map(|rule| (rule.decide)(entry).map(|t| (t, rule.name)))
        .unwrap_or((EntryType::JournalArticle, "default"))
}

/// Pure classification: `ReferenceEntry → EntryType`.
pub fn classify(entry: &ReferenceEntry) -> EntryType {
    classify_with_rule(entry).0
}

/// Set `entry_type` on every entry.
pub fn classify_all(entries: &mut [ReferenceEntry]) {
    for entry in entries {
        let (entry_type, rule) = classify_with_rule(entry);
        tracing::debug!(label = %entry.label, %entry_type, rule, "classified reference");
        entry.entry_type = Some(entry_type);
    }
}
