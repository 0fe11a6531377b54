use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use refcheck_core::enrichment::FilledField;
use refcheck_core::{
    CitationMarker, Issue, MatchResult, ReferenceEntry, Severity, ValidationReport,
};

use crate::ExportFormat;
use crate::bibliography::{to_bibtex, to_endnote, to_ris};

/// Render `report` in `format` and write it to `path`.
///
/// `filled` lists the fields metadata providers supplied; only the JSON
/// and text formats show it.
pub fn export_report(
    report: &ValidationReport,
    filled: &[FilledField],
    format: ExportFormat,
    path: &Path,
) -> Result<(), String> {
    let content = render(report, filled, format)?;
    let mut file =
        std::fs::File::create(path).map_err(|e| format!("Failed to create file: {}", e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| format!("Failed to write: {}", e))?;
    Ok(())
}

/// Render without touching the filesystem.
pub fn render(
    report: &ValidationReport,
    filled: &[FilledField],
    format: ExportFormat,
) -> Result<String, String> {
    match format {
        ExportFormat::Json => export_json(report, filled),
        ExportFormat::Bibtex => Ok(to_bibtex(&report.entries)),
        ExportFormat::Ris => Ok(to_ris(&report.entries)),
        ExportFormat::EndNote => Ok(to_endnote(&report.entries)),
        ExportFormat::Text => Ok(export_text(report, filled)),
    }
}

#[derive(Serialize)]
struct JsonSummary {
    citations: usize,
    entries: usize,
    errors: usize,
    warnings: usize,
    infos: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    tool: &'static str,
    version: &'static str,
    summary: JsonSummary,
    counts: &'a BTreeMap<String, usize>,
    issues: Vec<JsonIssue<'a>>,
    matches: &'a MatchResult,
    citations: &'a [CitationMarker],
    entries: &'a [ReferenceEntry],
    filled: &'a [FilledField],
}

#[derive(Serialize)]
struct JsonIssue<'a> {
    code: &'static str,
    #[serde(flatten)]
    issue: &'a Issue,
}

fn severity_count(report: &ValidationReport, severity: Severity) -> usize {
    report.issues.iter().filter(|i| i.severity == severity).count()
}

fn export_json(report: &ValidationReport, filled: &[FilledField]) -> Result<String, String> {
    let doc = JsonReport {
        tool: "refcheck",
        version: env!("CARGO_PKG_VERSION"),
        summary: JsonSummary {
            citations: report.citations.len(),
            entries: report.entries.len(),
            errors: severity_count(report, Severity::Error),
            warnings: severity_count(report, Severity::Warning),
            infos: severity_count(report, Severity::Info),
        },
        counts: &report.counts,
        issues: report
            .issues
            .iter()
            .map(|issue| JsonIssue {
                code: issue.kind.code(),
                issue,
            })
            .collect(),
        matches: &report.matches,
        citations: &report.citations,
        entries: &report.entries,
        filled,
    };
    serde_json::to_string_pretty(&doc).map_err(|e| format!("Failed to serialize report: {}", e))
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "ERROR",
        Severity::Warning => "WARNING",
        Severity::Info => "INFO",
    }
}

fn export_text(report: &ValidationReport, filled: &[FilledField]) -> String {
    let mut out = String::from("Reference Check Results\n");
    out.push_str(&"=".repeat(60));
    out.push('\n');

    let m = &report.matches;
    out.push_str(&format!(
        "  {} citations | {} entries | {} unmatched | {} uncited | {} duplicate groups\n",
        report.citations.len(),
        report.entries.len(),
        m.unmatched_citations.len(),
        m.uncited_references.len(),
        m.duplicate_references.len(),
    ));
    out.push_str(&format!(
        "  {} errors | {} warnings | {} info\n",
        severity_count(report, Severity::Error),
        severity_count(report, Severity::Warning),
        severity_count(report, Severity::Info),
    ));

    if !report.counts.is_empty() {
        out.push_str("\nIssue counts:\n");
        for (code, n) in &report.counts {
            out.push_str(&format!("  {:<22} {}\n", code, n));
        }
    }

    for severity in [Severity::Error, Severity::Warning, Severity::Info] {
        let issues: Vec<&Issue> = report
            .issues
            .iter()
            .filter(|i| i.severity == severity)
            .collect();
        if issues.is_empty() {
            continue;
        }
        let heading = format!("{} ({})", severity_label(severity), issues.len());
        out.push_str(&format!("\n{}\n{}\n", heading, "-".repeat(heading.len())));
        for issue in issues {
            out.push_str(&format!("  {} {}: {}\n", issue.kind, issue.subject, issue.message));
            for (key, value) in &issue.evidence {
                if key == "raw" {
                    continue;
                }
                out.push_str(&format!("       {}: {}\n", key, value));
            }
        }
    }

    if !filled.is_empty() {
        out.push_str("\nFilled from external sources:\n");
        for f in filled {
            out.push_str(&format!("  [{}] {} ({})\n", f.label, f.field, f.source));
        }
    }

    if report.issues.is_empty() {
        out.push_str("\nNo issues found.\n");
    }
    out
}
