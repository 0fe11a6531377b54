use std::collections::HashMap;

use refcheck_core::authors::family_key;
use refcheck_core::{
    DocumentText, Issue, IssueKind, ReferenceEntry, ReferenceLabel, Severity, Subject,
};

use crate::citations::Citations;
use crate::config::ParsingConfig;
use crate::fields::{self, FIELD_RULES, FieldValue, RuleInput};
use crate::section::{self, Convention, RawEntry, Segmentation};

/// Reference-list parsing pipeline.
///
/// Holds a [`ParsingConfig`] and exposes each step as a method. Use
/// [`ReferenceParser::with_config`] to supply custom patterns and thresholds.
#[derive(Debug, Clone, Default)]
pub struct ReferenceParser {
    config: ParsingConfig,
}

/// Entries of one reference list plus the anomalies met while parsing it.
#[derive(Debug, Clone)]
pub struct ParsedReferences {
    pub convention: Convention,
    pub entries: Vec<ReferenceEntry>,
    pub anomalies: Vec<Issue>,
}

impl ReferenceParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParsingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParsingConfig {
        &self.config
    }

    /// Split a whole document into body and reference-list text.
    pub fn split_document(&self, text: &str) -> DocumentText {
        section::split_document_with_config(text, &self.config)
    }

    /// In-text citation markers of the body.
    pub fn extract_citations<'a>(&self, body: &'a str) -> Citations<'a> {
        Citations::new(body, &self.config)
    }

    pub fn convention(&self, references: &str) -> Convention {
        section::detect_convention(references, &self.config)
    }

    pub fn segment(&self, references: &str) -> Segmentation {
        section::segment_references_with_config(references, &self.config)
    }

    /// Run every field rule over one entry. Never fails: an entry with no
    /// recognizable field keeps only its label and raw text.
    ///
    /// The returned flag is set when the author block was a dash run
    /// standing for the previous entry's authors.
    pub fn parse_entry(&self, label: &str, ordinal: usize, raw: &str) -> (ReferenceEntry, bool) {
        let raw = fields::normalize_whitespace(raw);
        let residual = fields::residual_text(&raw);
        let input = RuleInput {
            raw: &raw,
            residual: &residual,
            config: &self.config,
        };

        let mut entry = ReferenceEntry::new(label, ordinal, raw.as_str());
        let mut same_as_previous = false;
        for rule in FIELD_RULES {
            let Some(value) = (rule.extract)(&input) else {
                continue;
            };
            tracing::trace!(rule = rule.name, ?value, "field rule matched");
            if let FieldValue::Segments(s) = &value {
                same_as_previous = s.same_as_previous;
            }
            fields::apply(&mut entry, value);
        }
        (entry, same_as_previous)
    }

    /// Segment and parse a reference list.
    pub fn parse(&self, references: &str) -> ParsedReferences {
        let Segmentation {
            convention,
            entries: raw_entries,
            mut anomalies,
        } = self.segment(references);

        let mut entries: Vec<ReferenceEntry> = Vec::with_capacity(raw_entries.len());
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (i, RawEntry { label, text }) in raw_entries.iter().enumerate() {
            let ordinal = i + 1;
            let (mut entry, same_as_previous) = self.parse_entry("", ordinal, text);

            if same_as_previous {
                if let Some(prev) = entries.last() {
                    entry.authors = prev.authors.clone();
                }
            }

            let base = match label {
                Some(explicit) => explicit.clone(),
                None => derived_label(&entry),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            let unique = if *count == 1 {
                base.clone()
            } else {
                format!("{}-{}", base, count)
            };
            if *count > 1 && label.is_some() {
                anomalies.push(
                    Issue::new(
                        IssueKind::ParseAnomaly,
                        Severity::Info,
                        Subject::Reference(ReferenceLabel::new(unique.as_str())),
                        format!("duplicate label [{}] renamed to [{}]", base, unique),
                    )
                    .with_evidence("label", base.as_str()),
                );
            }
            entry.label = ReferenceLabel::new(unique);

            if !text.trim().is_empty()
                && entry.authors.is_empty()
                && entry.title.is_none()
                && entry.year.is_none()
            {
                anomalies.push(
                    Issue::new(
                        IssueKind::ParseAnomaly,
                        Severity::Info,
                        Subject::Reference(entry.label.clone()),
                        "no fields recognized",
                    )
                    .with_evidence("text", text.as_str()),
                );
            }
            tracing::debug!(
                label = %entry.label,
                authors = entry.authors.len(),
                year = ?entry.year,
                has_title = entry.title.is_some(),
                "parsed reference entry"
            );
            entries.push(entry);
        }

        tracing::info!(
            ?convention,
            entries = entries.len(),
            anomalies = anomalies.len(),
            "parsed reference list"
        );
        ParsedReferences {
            convention,
            entries,
            anomalies,
        }
    }
}

/// Label for an unlabeled entry: first-author family key with year and
/// suffix (`doe2021a`), or `ref<ordinal>` when either is missing.
fn derived_label(entry: &ReferenceEntry) -> String {
    match (entry.first_author(), entry.year) {
        (Some(author), Some(year)) => {
            let key = family_key(&author.family);
            if key.is_empty() {
                return format!("ref{}", entry.ordinal);
            }
            let mut label = format!("{}{}", key, year);
            if let Some(suffix) = entry.year_suffix {
                label.push(suffix);
            }
            label
        }
        _ => format!("ref{}", entry.ordinal),
    }
}
