use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod authors;
pub mod classify;
pub mod collaborators;
pub mod config_file;
pub mod enrichment;
pub mod matcher;
pub mod matching;
pub mod mock;
pub mod orchestrator;
pub mod validator;

// Re-export for convenience
pub use classify::{classify, classify_all};
pub use collaborators::{
    CollaboratorError, FieldComparison, FieldComparisons, LinkStatus, LinkVerifier,
    MetadataProvider, OnlineVerifier, Registry, RegistryVerdict,
};
pub use enrichment::{EntryPatch, merge_patch};
pub use matcher::{MatchConfig, match_citations};
pub use orchestrator::{CollaboratorSet, collect_verdicts};
pub use validator::{RuleSet, StyleProfile, ValidationConfig, Verdicts, build_report, validate};

/// Notation family of an in-text citation marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStyle {
    Numeric,
    AuthorYear,
}

/// A single key carried by a citation marker. `[1,3]` carries two numeric keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKey {
    Numeric(u32),
    AuthorYear {
        /// Family name of the first cited author, as written.
        family: String,
        year: u16,
        /// Disambiguation letter, e.g. the `a` of `2021a`.
        suffix: Option<char>,
    },
}

impl CitationKey {
    pub fn style(&self) -> MarkerStyle {
        match self {
            CitationKey::Numeric(_) => MarkerStyle::Numeric,
            CitationKey::AuthorYear { .. } => MarkerStyle::AuthorYear,
        }
    }
}

impl fmt::Display for CitationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationKey::Numeric(n) => write!(f, "{}", n),
            CitationKey::AuthorYear {
                family,
                year,
                suffix,
            } => {
                write!(f, "{} {}", family, year)?;
                if let Some(s) = suffix {
                    write!(f, "{}", s)?;
                }
                Ok(())
            }
        }
    }
}

/// An in-text citation marker found in body text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationMarker {
    pub raw_text: String,
    pub keys: Vec<CitationKey>,
    /// Byte span of `raw_text` within the body text.
    pub position: Range<usize>,
    pub style: MarkerStyle,
}

/// Label of a reference-list entry (`"3"`, `"doe2021"`, `"ref4"`).
///
/// Ordering is natural: numeric labels sort by value and before any
/// non-numeric label, so `"2" < "10" < "doe2021"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceLabel(pub String);

impl ReferenceLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl Ord for ReferenceLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ReferenceLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReferenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed author name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub family: String,
    pub given: Option<String>,
    /// Lowercase ASCII form of `family` used for matching.
    pub normalized_key: String,
}

impl Author {
    pub fn new(family: impl Into<String>, given: Option<String>) -> Self {
        let family = family.into();
        let normalized_key = authors::family_key(&family);
        Self {
            family,
            given,
            normalized_key,
        }
    }

    /// `"Doe, J."` style display.
    pub fn display_name(&self) -> String {
        match &self.given {
            Some(g) => format!("{}, {}", self.family, g),
            None => self.family.clone(),
        }
    }
}

/// Bibliographic type assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    JournalArticle,
    Book,
    BookChapter,
    ConferencePaper,
    Preprint,
    Website,
    Dataset,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::JournalArticle => "journal article",
            EntryType::Book => "book",
            EntryType::BookChapter => "book chapter",
            EntryType::ConferencePaper => "conference paper",
            EntryType::Preprint => "preprint",
            EntryType::Website => "website",
            EntryType::Dataset => "dataset",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bibliographic fields that rules and providers refer to by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Authors,
    Title,
    Year,
    Venue,
    Publisher,
    Volume,
    Issue,
    Pages,
    Doi,
    Url,
    Isbn,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::Authors,
        Field::Title,
        Field::Year,
        Field::Venue,
        Field::Publisher,
        Field::Volume,
        Field::Issue,
        Field::Pages,
        Field::Doi,
        Field::Url,
        Field::Isbn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Authors => "authors",
            Field::Title => "title",
            Field::Year => "year",
            Field::Venue => "venue",
            Field::Publisher => "publisher",
            Field::Volume => "volume",
            Field::Issue => "issue",
            Field::Pages => "pages",
            Field::Doi => "doi",
            Field::Url => "url",
            Field::Isbn => "isbn",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One bibliographic record from the reference list.
///
/// Every field is optional: `None` means the parser found nothing, which is
/// distinct from a present value. Only the enrichment merge (fill-if-absent)
/// and the classifier mutate an entry after parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub label: ReferenceLabel,
    /// 1-based position in the reference list.
    pub ordinal: usize,
    pub authors: Vec<Author>,
    pub year: Option<u16>,
    pub year_suffix: Option<char>,
    pub title: Option<String>,
    pub venue: Option<String>,
    pub publisher: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub isbn: Option<String>,
    /// Explicit type marker (`[Dataset]`) or a type reported by a provider.
    pub type_hint: Option<EntryType>,
    pub entry_type: Option<EntryType>,
    pub raw_text: String,
}

impl ReferenceEntry {
    pub fn new(label: impl Into<String>, ordinal: usize, raw_text: impl Into<String>) -> Self {
        Self {
            label: ReferenceLabel::new(label),
            ordinal,
            raw_text: raw_text.into(),
            ..Default::default()
        }
    }

    pub fn first_author(&self) -> Option<&Author> {
        self.authors.first()
    }

    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::Authors => !self.authors.is_empty(),
            Field::Year => self.year.is_some(),
            _ => self.text_field(field).is_some(),
        }
    }

    /// Display value of a field, if present.
    pub fn value(&self, field: Field) -> Option<String> {
        match field {
            Field::Authors => {
                if self.authors.is_empty() {
                    None
                } else {
                    Some(
                        self.authors
                            .iter()
                            .map(Author::display_name)
                            .collect::<Vec<_>>()
                            .join("; "),
                    )
                }
            }
            Field::Year => self.year.map(|y| match self.year_suffix {
                Some(s) => format!("{}{}", y, s),
                None => y.to_string(),
            }),
            _ => self.text_field(field).map(str::to_string),
        }
    }

    fn text_field(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Title => &self.title,
            Field::Venue => &self.venue,
            Field::Publisher => &self.publisher,
            Field::Volume => &self.volume,
            Field::Issue => &self.issue,
            Field::Pages => &self.pages,
            Field::Doi => &self.doi,
            Field::Url => &self.url,
            Field::Isbn => &self.isbn,
            Field::Authors | Field::Year => return None,
        };
        value.as_deref()
    }

    /// The type the completeness rules should use.
    pub fn effective_type(&self) -> EntryType {
        self.entry_type.unwrap_or_else(|| classify(self))
    }
}

/// Links between citation keys and reference labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: BTreeSet<(CitationKey, ReferenceLabel)>,
    pub unmatched_citations: BTreeSet<CitationKey>,
    pub uncited_references: BTreeSet<ReferenceLabel>,
    pub duplicate_references: BTreeSet<BTreeSet<ReferenceLabel>>,
}

impl MatchResult {
    /// The label a key resolved to, if any.
    pub fn label_for(&self, key: &CitationKey) -> Option<&ReferenceLabel> {
        self.matched
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, label)| label)
    }
}

/// What an issue is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Document,
    Citation(CitationKey),
    Reference(ReferenceLabel),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Document => f.write_str("document"),
            Subject::Citation(key) => write!(f, "citation {}", key),
            Subject::Reference(label) => write!(f, "reference [{}]", label),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum IssueKind {
    UnmatchedCitation,
    UncitedReference,
    DuplicateReference,
    IncompleteMetadata(Field),
    NoLocator,
    SuspiciousYear,
    BrokenLink,
    MetadataMismatch(Field),
    VerifyManually,
    PredatoryVenue,
    EmptyReferenceList,
    ParseAnomaly,
}

impl IssueKind {
    /// Stable identifier used in reports and for counting.
    pub fn code(&self) -> &'static str {
        match self {
            IssueKind::UnmatchedCitation => "UNMATCHED_CITATION",
            IssueKind::UncitedReference => "UNCITED_REFERENCE",
            IssueKind::DuplicateReference => "DUPLICATE_REFERENCE",
            IssueKind::IncompleteMetadata(_) => "INCOMPLETE_METADATA",
            IssueKind::NoLocator => "NO_LOCATOR",
            IssueKind::SuspiciousYear => "SUSPICIOUS_YEAR",
            IssueKind::BrokenLink => "BROKEN_LINK",
            IssueKind::MetadataMismatch(_) => "METADATA_MISMATCH",
            IssueKind::VerifyManually => "VERIFY_MANUALLY",
            IssueKind::PredatoryVenue => "PREDATORY_VENUE",
            IssueKind::EmptyReferenceList => "EMPTY_REFERENCE_LIST",
            IssueKind::ParseAnomaly => "PARSE_ANOMALY",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::IncompleteMetadata(field) | IssueKind::MetadataMismatch(field) => {
                write!(f, "{}({})", self.code(), field)
            }
            _ => f.write_str(self.code()),
        }
    }
}

/// A validation finding. Issues are values: produced once, then only
/// filtered or sorted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Issue {
    pub subject: Subject,
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub evidence: BTreeMap<String, String>,
}

impl Issue {
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        subject: Subject,
        message: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            kind,
            severity,
            message: message.into(),
            evidence: BTreeMap::new(),
        }
    }

    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }
}

/// Output of one validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Issue counts keyed by [`IssueKind::code`].
    pub counts: BTreeMap<String, usize>,
    pub issues: Vec<Issue>,
    pub matches: MatchResult,
    pub citations: Vec<CitationMarker>,
    pub entries: Vec<ReferenceEntry>,
}

impl ValidationReport {
    pub fn new(
        mut issues: Vec<Issue>,
        matches: MatchResult,
        citations: Vec<CitationMarker>,
        entries: Vec<ReferenceEntry>,
    ) -> Self {
        issues.sort();
        issues.dedup();
        let mut counts = BTreeMap::new();
        for issue in &issues {
            *counts.entry(issue.kind.code().to_string()).or_insert(0) += 1;
        }
        Self {
            counts,
            issues,
            matches,
            citations,
            entries,
        }
    }

    /// Fold issues found outside validation (e.g. parse anomalies) into the
    /// report, keeping it sorted and the counts current.
    pub fn add_issues(&mut self, extra: impl IntoIterator<Item = Issue>) {
        let mut issues = std::mem::take(&mut self.issues);
        issues.extend(extra);
        let rebuilt = Self::new(
            issues,
            std::mem::take(&mut self.matches),
            std::mem::take(&mut self.citations),
            std::mem::take(&mut self.entries),
        );
        *self = rebuilt;
    }

    pub fn count(&self, code: &str) -> usize {
        self.counts.get(code).copied().unwrap_or(0)
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn issues_for<'a>(&'a self, subject: &'a Subject) -> impl Iterator<Item = &'a Issue> {
        self.issues.iter().filter(move |i| &i.subject == subject)
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("input is empty: {0}")]
    EmptyInput(&'static str),
    #[error("unknown rule family: {0}")]
    UnknownRule(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// The two text streams a run works on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentText {
    pub body: String,
    pub references: String,
}

impl DocumentText {
    pub fn new(body: impl Into<String>, references: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            references: references.into(),
        }
    }

    /// Reject input with no text at all. An empty reference list alone is
    /// not fatal; it is reported as an issue.
    pub fn ensure_not_empty(&self) -> Result<(), CoreError> {
        if self.body.trim().is_empty() && self.references.trim().is_empty() {
            return Err(CoreError::EmptyInput("document has no text"));
        }
        Ok(())
    }
}
