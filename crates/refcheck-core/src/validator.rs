//! Rule-based validation over markers, entries and their match result.
//!
//! Every rule is a total function of its inputs: no rule fails for any
//! entry, and the resulting report is a pure function of
//! `(markers, entries, config, verdicts)`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::authors::family_key;
use crate::collaborators::{FieldComparisons, LinkStatus, RegistryVerdict};
use crate::matcher::{MatchConfig, match_citations};
use crate::{
    CitationKey, CitationMarker, CoreError, EntryType, Field, Issue, IssueKind, MatchResult,
    ReferenceEntry, ReferenceLabel, Severity, Subject, ValidationReport,
};

/// How demanding the completeness checklist is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleProfile {
    /// Journal articles need volume, issue and pages.
    #[default]
    Strict,
    /// Only authors, title and year (plus publisher for books).
    Lenient,
}

impl FromStr for StyleProfile {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(StyleProfile::Strict),
            "lenient" => Ok(StyleProfile::Lenient),
            other => Err(CoreError::Config(format!("unknown style profile: {}", other))),
        }
    }
}

impl fmt::Display for StyleProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StyleProfile::Strict => "strict",
            StyleProfile::Lenient => "lenient",
        })
    }
}

/// Independently toggleable rule families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub pairing: bool,
    pub completeness: bool,
    pub consistency: bool,
    pub links: bool,
    pub online: bool,
    pub registry: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            pairing: true,
            completeness: true,
            consistency: true,
            links: true,
            online: true,
            registry: true,
        }
    }
}

impl RuleSet {
    pub const FAMILIES: [&'static str; 6] = [
        "pairing",
        "completeness",
        "consistency",
        "links",
        "online",
        "registry",
    ];

    /// Turn a rule family on or off by name.
    pub fn set(&mut self, family: &str, enabled: bool) -> Result<(), CoreError> {
        let slot = match family.trim().to_lowercase().as_str() {
            "pairing" => &mut self.pairing,
            "completeness" => &mut self.completeness,
            "consistency" => &mut self.consistency,
            "links" => &mut self.links,
            "online" => &mut self.online,
            "registry" => &mut self.registry,
            other => return Err(CoreError::UnknownRule(other.to_string())),
        };
        *slot = enabled;
        Ok(())
    }

    pub fn disable(&mut self, family: &str) -> Result<(), CoreError> {
        self.set(family, false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    pub profile: StyleProfile,
    pub rules: RuleSet,
    /// Earliest plausible publication year (default: 1400).
    pub min_year: u16,
    /// Latest plausible publication year (default: next calendar year).
    pub max_year: u16,
    pub matching: MatchConfig,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            profile: StyleProfile::default(),
            rules: RuleSet::default(),
            min_year: 1400,
            max_year: current_year() + 1,
            matching: MatchConfig::default(),
        }
    }
}

/// The current calendar year in local time.
pub fn current_year() -> u16 {
    u16::try_from(chrono::Local::now().year()).unwrap_or(u16::MAX - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Doi,
    Url,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkKind::Doi => "DOI",
            LinkKind::Url => "URL",
        })
    }
}

/// A link verifier's answer for one target of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkVerdict {
    pub kind: LinkKind,
    pub target: String,
    pub status: LinkStatus,
}

/// Per-reference outcomes from external collaborators, keyed by label.
/// Empty when running offline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdicts {
    pub links: BTreeMap<ReferenceLabel, Vec<LinkVerdict>>,
    pub online: BTreeMap<ReferenceLabel, FieldComparisons>,
    pub registry: BTreeMap<ReferenceLabel, RegistryVerdict>,
    /// Verification that was attempted but could not complete.
    pub skipped: BTreeMap<ReferenceLabel, Vec<String>>,
}

impl Verdicts {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
            && self.online.is_empty()
            && self.registry.is_empty()
            && self.skipped.is_empty()
    }

    pub fn skip(&mut self, label: &ReferenceLabel, reason: impl Into<String>) {
        self.skipped
            .entry(label.clone())
            .or_default()
            .push(reason.into());
    }

    /// Fold another set of verdicts into this one.
    pub fn absorb(&mut self, other: Verdicts) {
        for (label, links) in other.links {
            self.links.entry(label).or_default().extend(links);
        }
        self.online.extend(other.online);
        self.registry.extend(other.registry);
        for (label, reasons) in other.skipped {
            self.skipped.entry(label).or_default().extend(reasons);
        }
    }
}

/// Fields the completeness checklist requires for a type.
pub fn required_fields(entry_type: EntryType, profile: StyleProfile) -> &'static [Field] {
    const BASE: &[Field] = &[Field::Authors, Field::Title, Field::Year];
    match (entry_type, profile) {
        (EntryType::JournalArticle, StyleProfile::Strict) => &[
            Field::Authors,
            Field::Title,
            Field::Year,
            Field::Volume,
            Field::Issue,
            Field::Pages,
        ],
        (EntryType::Book, _) => &[Field::Authors, Field::Title, Field::Year, Field::Publisher],
        (EntryType::BookChapter, StyleProfile::Strict) => &[
            Field::Authors,
            Field::Title,
            Field::Year,
            Field::Venue,
            Field::Publisher,
            Field::Pages,
        ],
        (EntryType::BookChapter, StyleProfile::Lenient) | (EntryType::ConferencePaper, _) => {
            &[Field::Authors, Field::Title, Field::Year, Field::Venue]
        }
        (EntryType::Website, StyleProfile::Strict) => {
            &[Field::Authors, Field::Title, Field::Year, Field::Url]
        }
        _ => BASE,
    }
}

/// Absent fields an enrichment pass should try to fill for this entry:
/// the checklist gaps, plus a DOI when the entry has no locator at all.
pub fn wanted_fields(entry: &ReferenceEntry, profile: StyleProfile) -> Vec<Field> {
    let mut wanted: Vec<Field> = required_fields(entry.effective_type(), profile)
        .iter()
        .copied()
        .filter(|f| !entry.has(*f))
        .collect();
    if entry.doi.is_none() && entry.url.is_none() {
        wanted.push(Field::Doi);
    }
    wanted
}

/// Run every enabled rule family.
pub fn validate(
    markers: &[CitationMarker],
    entries: &[ReferenceEntry],
    matches: &MatchResult,
    config: &ValidationConfig,
    verdicts: &Verdicts,
) -> Vec<Issue> {
    if entries.is_empty() {
        return vec![Issue::new(
            IssueKind::EmptyReferenceList,
            Severity::Info,
            Subject::Document,
            "no reference entries were found",
        )
        .with_evidence("citations", markers.len().to_string())];
    }

    let rules = &config.rules;
    let mut issues = Vec::new();
    if rules.pairing {
        issues.extend(pairing_issues(markers, entries, matches));
    }
    for entry in entries {
        if rules.completeness {
            issues.extend(completeness_issues(entry, config.profile));
        }
        if rules.consistency {
            issues.extend(year_range_issues(entry, config));
        }
        if rules.links {
            issues.extend(link_issues(entry, verdicts));
        }
        if rules.online {
            issues.extend(online_issues(entry, verdicts));
        }
        if rules.registry {
            issues.extend(registry_issues(entry, verdicts));
        }
        issues.extend(skipped_issues(entry, verdicts));
    }
    if rules.consistency {
        issues.extend(citation_year_issues(entries, matches));
    }
    issues
}

/// Classify-free entry point: match, validate and assemble the report.
pub fn build_report(
    markers: &[CitationMarker],
    entries: &[ReferenceEntry],
    config: &ValidationConfig,
    verdicts: &Verdicts,
) -> ValidationReport {
    let matches = match_citations(markers, entries, &config.matching);
    let issues = validate(markers, entries, &matches, config, verdicts);
    tracing::info!(
        citations = markers.len(),
        entries = entries.len(),
        issues = issues.len(),
        "validation complete"
    );
    ValidationReport::new(issues, matches, markers.to_vec(), entries.to_vec())
}

fn pairing_issues(
    markers: &[CitationMarker],
    entries: &[ReferenceEntry],
    matches: &MatchResult,
) -> Vec<Issue> {
    let mut issues = Vec::new();
    for key in &matches.unmatched_citations {
        let mut issue = Issue::new(
            IssueKind::UnmatchedCitation,
            Severity::Error,
            Subject::Citation(key.clone()),
            format!("citation {} has no matching reference entry", key),
        );
        if let Some(marker) = markers.iter().find(|m| m.keys.contains(key)) {
            issue = issue
                .with_evidence("marker", &marker.raw_text)
                .with_evidence("offset", marker.position.start.to_string());
        }
        issues.push(issue);
    }
    for label in &matches.uncited_references {
        let mut issue = Issue::new(
            IssueKind::UncitedReference,
            Severity::Warning,
            Subject::Reference(label.clone()),
            format!("reference [{}] is never cited in the text", label),
        );
        if let Some(entry) = entries.iter().find(|e| &e.label == label) {
            issue = issue.with_evidence("raw", &entry.raw_text);
        }
        issues.push(issue);
    }
    for group in &matches.duplicate_references {
        let Some(first) = group.first() else {
            continue;
        };
        let labels: Vec<String> = group.iter().map(|l| format!("[{}]", l)).collect();
        issues.push(
            Issue::new(
                IssueKind::DuplicateReference,
                Severity::Warning,
                Subject::Reference(first.clone()),
                format!("references {} describe the same work", labels.join(", ")),
            )
            .with_evidence("group", labels.join(" ")),
        );
    }
    issues
}

fn completeness_issues(entry: &ReferenceEntry, profile: StyleProfile) -> Vec<Issue> {
    let entry_type = entry.effective_type();
    let subject = Subject::Reference(entry.label.clone());
    let mut issues: Vec<Issue> = required_fields(entry_type, profile)
        .iter()
        .filter(|f| !entry.has(**f))
        .map(|f| {
            Issue::new(
                IssueKind::IncompleteMetadata(*f),
                Severity::Warning,
                subject.clone(),
                format!("{} [{}] is missing {}", entry_type, entry.label, f),
            )
            .with_evidence("entry_type", entry_type.as_str())
            .with_evidence("raw", &entry.raw_text)
        })
        .collect();

    if entry.doi.is_none() && entry.url.is_none() {
        issues.push(
            Issue::new(
                IssueKind::NoLocator,
                Severity::Warning,
                subject,
                format!("reference [{}] has neither a DOI nor a URL", entry.label),
            )
            .with_evidence("raw", &entry.raw_text),
        );
    }
    issues
}

fn year_range_issues(entry: &ReferenceEntry, config: &ValidationConfig) -> Option<Issue> {
    let year = entry.year?;
    if (config.min_year..=config.max_year).contains(&year) {
        return None;
    }
    Some(
        Issue::new(
            IssueKind::SuspiciousYear,
            Severity::Info,
            Subject::Reference(entry.label.clone()),
            format!(
                "year {} of reference [{}] is outside {}-{}",
                year, entry.label, config.min_year, config.max_year
            ),
        )
        .with_evidence("year", year.to_string()),
    )
}

/// An author-year citation that found no entry, while an entry by the same
/// first author carries a later year, suggests the entry's year is wrong
/// (or the citation's).
fn citation_year_issues(entries: &[ReferenceEntry], matches: &MatchResult) -> Vec<Issue> {
    let mut issues = Vec::new();
    for key in &matches.unmatched_citations {
        let CitationKey::AuthorYear { family, year, .. } = key else {
            continue;
        };
        let wanted = family_key(family);
        for entry in entries {
            let same_author = entry
                .first_author()
                .is_some_and(|a| a.normalized_key == wanted);
            let Some(entry_year) = entry.year else {
                continue;
            };
            if same_author && entry_year > *year {
                issues.push(
                    Issue::new(
                        IssueKind::SuspiciousYear,
                        Severity::Info,
                        Subject::Reference(entry.label.clone()),
                        format!(
                            "reference [{}] is dated {} but is cited as ({}, {})",
                            entry.label, entry_year, family, year
                        ),
                    )
                    .with_evidence("cited_as", key.to_string())
                    .with_evidence("entry_year", entry_year.to_string()),
                );
            }
        }
    }
    issues
}

fn link_issues(entry: &ReferenceEntry, verdicts: &Verdicts) -> Vec<Issue> {
    let Some(links) = verdicts.links.get(&entry.label) else {
        return Vec::new();
    };
    links
        .iter()
        .filter(|v| !v.status.reachable)
        .map(|v| {
            Issue::new(
                IssueKind::BrokenLink,
                Severity::Error,
                Subject::Reference(entry.label.clone()),
                format!("{} unreachable ({})", v.kind, v.status.detail()),
            )
            .with_evidence("target", &v.target)
            .with_evidence("detail", v.status.detail())
        })
        .collect()
}

fn online_issues(entry: &ReferenceEntry, verdicts: &Verdicts) -> Vec<Issue> {
    let Some(comparisons) = verdicts.online.get(&entry.label) else {
        return Vec::new();
    };
    comparisons
        .iter()
        .filter(|(_, c)| !c.matches)
        .map(|(field, c)| {
            Issue::new(
                IssueKind::MetadataMismatch(*field),
                Severity::Warning,
                Subject::Reference(entry.label.clone()),
                format!(
                    "{} of reference [{}] differs from the authoritative record",
                    field, entry.label
                ),
            )
            .with_evidence("claimed", c.claimed.as_deref().unwrap_or("(absent)"))
            .with_evidence(
                "authoritative",
                c.authoritative.as_deref().unwrap_or("(absent)"),
            )
        })
        .collect()
}

fn registry_issues(entry: &ReferenceEntry, verdicts: &Verdicts) -> Option<Issue> {
    let verdict = verdicts.registry.get(&entry.label)?;
    let mut issue = Issue::new(
        IssueKind::PredatoryVenue,
        Severity::Warning,
        Subject::Reference(entry.label.clone()),
        format!(
            "{} \"{}\" of reference [{}] is listed in a predatory-venue registry",
            verdict.matched_on, verdict.matched_name, entry.label
        ),
    )
    .with_evidence("matched_name", &verdict.matched_name)
    .with_evidence("matched_on", &verdict.matched_on);
    if let Some(source) = &verdict.source {
        issue = issue.with_evidence("source", source);
    }
    Some(issue)
}

fn skipped_issues(entry: &ReferenceEntry, verdicts: &Verdicts) -> Vec<Issue> {
    let Some(reasons) = verdicts.skipped.get(&entry.label) else {
        return Vec::new();
    };
    reasons
        .iter()
        .map(|reason| {
            Issue::new(
                IssueKind::VerifyManually,
                Severity::Info,
                Subject::Reference(entry.label.clone()),
                format!(
                    "automatic verification of reference [{}] was skipped; verify manually",
                    entry.label
                ),
            )
            .with_evidence("reason", reason)
        })
        .collect()
}
