//! The end-to-end run: parse, enrich, classify, collect collaborator
//! verdicts, then match and validate.

use std::path::Path;

use refcheck_core::enrichment::{FilledField, enrich_entries};
use refcheck_core::{
    CollaboratorSet, DocumentText, ValidationConfig, ValidationReport, Verdicts, build_report,
    classify_all, collect_verdicts,
};
use refcheck_parsing::{Convention, ParsedDocument, ParsingConfig, ReferenceParser, parse_document};

use crate::IngestError;

/// Result of checking one document.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub report: ValidationReport,
    /// Fields supplied by metadata providers, in entry order.
    pub filled: Vec<FilledField>,
    pub convention: Convention,
}

/// Runs the whole pipeline over documents with one fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct Checker {
    parser: ReferenceParser,
    validation: ValidationConfig,
    collaborators: CollaboratorSet,
}

impl Checker {
    pub fn new(parsing: ParsingConfig, validation: ValidationConfig) -> Self {
        Self {
            parser: ReferenceParser::with_config(parsing),
            validation,
            collaborators: CollaboratorSet::default(),
        }
    }

    pub fn with_collaborators(mut self, collaborators: CollaboratorSet) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn parser(&self) -> &ReferenceParser {
        &self.parser
    }

    pub fn validation(&self) -> &ValidationConfig {
        &self.validation
    }

    /// Load a file through [`crate::load_document`] with this checker's parser.
    pub fn load(&self, path: &Path, references: Option<&Path>) -> Result<DocumentText, IngestError> {
        crate::load_document(path, references, &self.parser)
    }

    /// Parse only. Fails on a document with no text at all.
    pub fn parse(&self, doc: &DocumentText) -> Result<ParsedDocument, IngestError> {
        Ok(parse_document(doc, self.parser.config())?)
    }

    /// Check without any collaborator, even when some are configured.
    pub fn check_offline(&self, doc: &DocumentText) -> Result<CheckOutcome, IngestError> {
        let mut parsed = self.parse(doc)?;
        classify_all(&mut parsed.entries);
        Ok(self.finish(parsed, Vec::new(), &Verdicts::default()))
    }

    /// Check with the configured collaborators. Collaborator failures never
    /// fail the run; they surface as "verify manually" issues.
    pub async fn check(&self, doc: &DocumentText) -> Result<CheckOutcome, IngestError> {
        if self.collaborators.is_offline() {
            return self.check_offline(doc);
        }
        let mut parsed = self.parse(doc)?;

        let enrichment = enrich_entries(
            &mut parsed.entries,
            &self.collaborators.providers,
            self.validation.profile,
            self.collaborators.concurrency,
        )
        .await;
        // Classify after merging so provider-supplied fields and type hints count
        classify_all(&mut parsed.entries);

        let mut verdicts = collect_verdicts(&parsed.entries, &self.collaborators).await;
        verdicts.absorb(enrichment.failures);
        Ok(self.finish(parsed, enrichment.filled, &verdicts))
    }

    fn finish(
        &self,
        parsed: ParsedDocument,
        filled: Vec<FilledField>,
        verdicts: &Verdicts,
    ) -> CheckOutcome {
        let ParsedDocument {
            markers,
            entries,
            anomalies,
            convention,
        } = parsed;
        let mut report = build_report(&markers, &entries, &self.validation, verdicts);
        report.add_issues(anomalies);
        tracing::info!(
            issues = report.issues.len(),
            errors = report.has_errors(),
            ?convention,
            "check complete"
        );
        CheckOutcome {
            report,
            filled,
            convention,
        }
    }
}
