//! Citation marker extraction and reference-list parsing.
//!
//! Everything here is pure text processing: no I/O, no network. The
//! entry points are [`extract_citations`] for body text and
//! [`ReferenceParser`] (or [`parse_document`]) for reference lists.

use once_cell::sync::Lazy;
use thiserror::Error;

use refcheck_core::{CitationMarker, CoreError, DocumentText, Issue, ReferenceEntry};

pub mod authors;
pub mod citations;
pub mod config;
pub mod extractor;
pub mod fields;
pub mod section;

pub use citations::Citations;
pub use config::{ListOverride, ParsingConfig, ParsingConfigBuilder};
pub use extractor::{ParsedReferences, ReferenceParser};
pub use fields::{FIELD_RULES, FieldRule, FieldValue};
pub use section::{
    Convention, RawEntry, Segmentation, is_reference_heading, is_section_end, segment_references,
    split_document,
};

#[derive(Error, Debug)]
pub enum ParsingError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

static DEFAULT_CONFIG: Lazy<ParsingConfig> = Lazy::new(ParsingConfig::default);

/// Lazily extract citation markers from body text with the default settings.
pub fn extract_citations(body: &str) -> Citations<'_> {
    Citations::new(body, &DEFAULT_CONFIG)
}

/// Markers and entries of one document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub markers: Vec<CitationMarker>,
    pub entries: Vec<ReferenceEntry>,
    /// `ParseAnomaly` issues met during segmentation and field extraction.
    pub anomalies: Vec<Issue>,
    pub convention: Convention,
}

/// Extract markers from the body and entries from the reference list.
///
/// Fails only when the document has no text at all; an empty reference
/// list parses to zero entries.
pub fn parse_document(
    doc: &DocumentText,
    config: &ParsingConfig,
) -> Result<ParsedDocument, ParsingError> {
    doc.ensure_not_empty()?;
    let parser = ReferenceParser::with_config(config.clone());
    let markers: Vec<CitationMarker> = parser.extract_citations(&doc.body).collect();
    let ParsedReferences {
        convention,
        entries,
        anomalies,
    } = parser.parse(&doc.references);
    tracing::info!(
        markers = markers.len(),
        entries = entries.len(),
        "parsed document"
    );
    Ok(ParsedDocument {
        markers,
        entries,
        anomalies,
        convention,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_rejects_empty_input() {
        let doc = DocumentText::new("  ", "\n");
        let err = parse_document(&doc, &ParsingConfig::default()).unwrap_err();
        assert!(matches!(err, ParsingError::Core(CoreError::EmptyInput(_))));
    }

    #[test]
    fn test_parse_document_without_references() {
        let doc = DocumentText::new("Body cites [1].", "");
        let parsed = parse_document(&doc, &ParsingConfig::default()).unwrap();
        assert_eq!(parsed.markers.len(), 1);
        assert!(parsed.entries.is_empty());
    }

    #[test]
    fn test_pattern_error_converts() {
        let err: ParsingError = ParsingConfigBuilder::new()
            .section_end_regex("(")
            .build()
            .unwrap_err()
            .into();
        assert!(matches!(err, ParsingError::Pattern(_)));
    }
}
