use std::io::Write;

use owo_colors::OwoColorize;

use refcheck_core::enrichment::FilledField;
use refcheck_core::{Issue, ReferenceEntry, Severity, ValidationReport};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn shorten(text: &str, max: usize) -> String {
    let text: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        text
    }
}

/// Print what the parser found before any checking.
pub fn print_parse_summary(
    w: &mut dyn Write,
    file_name: &str,
    citations: usize,
    entries: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "Checking {}...", file_name.bold())?;
    } else {
        writeln!(w, "Checking {}...", file_name)?;
    }
    writeln!(
        w,
        "Found {} citation markers and {} reference entries",
        citations, entries
    )?;
    writeln!(w)?;
    Ok(())
}

/// Dry run: one block per parsed entry.
pub fn print_entries(
    w: &mut dyn Write,
    entries: &[ReferenceEntry],
    color: ColorMode,
) -> std::io::Result<()> {
    for entry in entries {
        let heading = format!("[{}] {}", entry.label, entry.effective_type());
        if color.enabled() {
            writeln!(w, "{}", heading.bold())?;
        } else {
            writeln!(w, "{}", heading)?;
        }
        for field in refcheck_core::Field::ALL {
            if let Some(value) = entry.value(field) {
                writeln!(w, "    {:<9} {}", field.as_str(), shorten(&value, 100))?;
            }
        }
        writeln!(w, "    {:<9} {}", "raw", shorten(&entry.raw_text, 160))?;
        writeln!(w)?;
    }
    Ok(())
}

fn severity_badge(severity: Severity, color: ColorMode) -> String {
    let text = match severity {
        Severity::Error => "ERROR",
        Severity::Warning => "WARN ",
        Severity::Info => "INFO ",
    };
    if !color.enabled() {
        return text.to_string();
    }
    match severity {
        Severity::Error => text.red().bold().to_string(),
        Severity::Warning => text.yellow().to_string(),
        Severity::Info => text.dimmed().to_string(),
    }
}

fn print_issue(w: &mut dyn Write, issue: &Issue, color: ColorMode) -> std::io::Result<()> {
    writeln!(
        w,
        "{} {} {}: {}",
        severity_badge(issue.severity, color),
        issue.kind,
        issue.subject,
        issue.message
    )?;
    for (key, value) in &issue.evidence {
        let line = format!("        {}: {}", key, shorten(value, 120));
        if color.enabled() {
            writeln!(w, "{}", line.dimmed())?;
        } else {
            writeln!(w, "{}", line)?;
        }
    }
    Ok(())
}

/// Print every issue, errors first.
pub fn print_issues(
    w: &mut dyn Write,
    report: &ValidationReport,
    color: ColorMode,
) -> std::io::Result<()> {
    for severity in [Severity::Error, Severity::Warning, Severity::Info] {
        for issue in report.issues.iter().filter(|i| i.severity == severity) {
            print_issue(w, issue, color)?;
        }
    }
    Ok(())
}

pub fn print_filled(
    w: &mut dyn Write,
    filled: &[FilledField],
    color: ColorMode,
) -> std::io::Result<()> {
    if filled.is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", "Filled from external sources:".bold())?;
    } else {
        writeln!(w, "Filled from external sources:")?;
    }
    for f in filled {
        writeln!(w, "  [{}] {} ({})", f.label, f.field, f.source)?;
    }
    Ok(())
}

/// Final tallies.
pub fn print_summary(
    w: &mut dyn Write,
    report: &ValidationReport,
    color: ColorMode,
) -> std::io::Result<()> {
    let count = |s: Severity| report.issues.iter().filter(|i| i.severity == s).count();
    let (errors, warnings, infos) = (
        count(Severity::Error),
        count(Severity::Warning),
        count(Severity::Info),
    );
    let m = &report.matches;

    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", "SUMMARY".bold())?;
    } else {
        writeln!(w, "SUMMARY")?;
    }
    writeln!(
        w,
        "  Citations: {} | Entries: {} | Unmatched: {} | Uncited: {} | Duplicate groups: {}",
        report.citations.len(),
        report.entries.len(),
        m.unmatched_citations.len(),
        m.uncited_references.len(),
        m.duplicate_references.len()
    )?;
    if color.enabled() {
        writeln!(
            w,
            "  {} errors, {} warnings, {} info",
            errors.red(),
            warnings.yellow(),
            infos
        )?;
    } else {
        writeln!(w, "  {} errors, {} warnings, {} info", errors, warnings, infos)?;
    }
    if report.issues.is_empty() {
        if color.enabled() {
            writeln!(w, "  {}", "No issues found.".green())?;
        } else {
            writeln!(w, "  No issues found.")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use refcheck_core::{IssueKind, MatchResult, ReferenceLabel, Subject};

    fn report() -> ValidationReport {
        ValidationReport::new(
            vec![
                Issue::new(
                    IssueKind::UncitedReference,
                    Severity::Warning,
                    Subject::Reference(ReferenceLabel::new("2")),
                    "reference [2] is never cited in the text",
                ),
                Issue::new(
                    IssueKind::BrokenLink,
                    Severity::Error,
                    Subject::Reference(ReferenceLabel::new("1")),
                    "DOI unreachable (status 404)",
                )
                .with_evidence("target", "https://doi.org/10.1/x"),
            ],
            MatchResult::default(),
            Vec::new(),
            Vec::new(),
        )
    }

    fn render(f: impl Fn(&mut dyn Write) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_issues_errors_first_plain() {
        let out = render(|w| print_issues(w, &report(), ColorMode(false)));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "ERROR BROKEN_LINK reference [1]: DOI unreachable (status 404)"
        );
        assert_eq!(lines[1], "        target: https://doi.org/10.1/x");
        assert!(lines[2].starts_with("WARN  UNCITED_REFERENCE"));
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn test_summary_counts() {
        let out = render(|w| print_summary(w, &report(), ColorMode(false)));
        assert!(out.contains("1 errors, 1 warnings, 0 info"));
        assert!(!out.contains("No issues found."));
    }

    #[test]
    fn test_color_adds_escapes() {
        let out = render(|w| print_issues(w, &report(), ColorMode(true)));
        assert!(out.contains('\u{1b}'));
    }

    #[test]
    fn test_dry_run_entries() {
        let mut entry = ReferenceEntry::new("1", 1, "Doe J. Title. 2021.");
        entry.title = Some("Title".into());
        entry.year = Some(2021);
        let out = render(|w| print_entries(w, std::slice::from_ref(&entry), ColorMode(false)));
        assert!(out.starts_with("[1] journal article\n"));
        assert!(out.contains("    title     Title\n"));
        assert!(out.contains("    year      2021\n"));
        assert!(!out.contains("venue"));
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("a  b\nc", 10), "a b c");
        assert_eq!(shorten("abcdef", 3), "abc...");
    }
}
