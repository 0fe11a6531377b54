//! End-to-end offline runs: parse text, classify, match and validate.

use refcheck_core::{
    CitationKey, Field, IssueKind, ReferenceLabel, Severity, Subject, ValidationConfig,
    ValidationReport, Verdicts, build_report, classify_all,
};
use refcheck_parsing::{ParsingConfig, extract_citations, parse_document};

fn run(body: &str, references: &str) -> anyhow::Result<ValidationReport> {
    let doc = refcheck_core::DocumentText::new(body, references);
    let mut parsed = parse_document(&doc, &ParsingConfig::default())?;
    classify_all(&mut parsed.entries);
    let mut report = build_report(
        &parsed.markers,
        &parsed.entries,
        &ValidationConfig::default(),
        &Verdicts::default(),
    );
    report.add_issues(parsed.anomalies);
    Ok(report)
}

fn label(s: &str) -> ReferenceLabel {
    ReferenceLabel::new(s)
}

#[test]
fn two_entry_journal_scenario() -> anyhow::Result<()> {
    let report = run(
        "cites [1] and [2]",
        "[1] Doe J. Title. J. 2021;10(2):123-130. doi:10.1234/x\n[2] Smith A. Other. 2020.",
    )?;

    assert!(report.matches.uncited_references.is_empty());
    assert!(report.matches.unmatched_citations.is_empty());

    let second = Subject::Reference(label("2"));
    let kinds: Vec<IssueKind> = report.issues_for(&second).map(|i| i.kind).collect();
    for field in [Field::Volume, Field::Issue, Field::Pages] {
        assert!(kinds.contains(&IssueKind::IncompleteMetadata(field)), "{:?}", kinds);
    }
    assert!(kinds.contains(&IssueKind::NoLocator));

    let first = Subject::Reference(label("1"));
    assert_eq!(report.issues_for(&first).count(), 0);
    Ok(())
}

#[test]
fn unmatched_and_uncited_scenario() -> anyhow::Result<()> {
    let report = run(
        "[1] [3]",
        "[1] Doe J. One. J. 2020;1(1):1-2.\n[2] Lee K. Two. J. 2021;2(1):3-4.",
    )?;
    assert_eq!(
        report.matches.unmatched_citations.iter().collect::<Vec<_>>(),
        vec![&CitationKey::Numeric(3)]
    );
    assert_eq!(
        report.matches.uncited_references.iter().collect::<Vec<_>>(),
        vec![&label("2")]
    );
    assert!(report.has_errors());
    Ok(())
}

#[test]
fn duplicate_entries_form_one_group() -> anyhow::Result<()> {
    let report = run(
        "[1] and [2]",
        "[1] Doe J. Learning to cite references. J Things. 2020;1(2):3-4.\n[2] J. Doe, \u{201c}Learning to Cite References,\u{201d} J. Things, vol. 1, no. 2, pp. 3-4, 2020.",
    )?;
    assert_eq!(report.matches.duplicate_references.len(), 1);
    let group = report.matches.duplicate_references.iter().next().unwrap();
    assert!(group.contains(&label("1")) && group.contains(&label("2")));
    assert_eq!(report.count("DUPLICATE_REFERENCE"), 1);
    Ok(())
}

#[test]
fn author_year_marker_matches_multi_author_entry() -> anyhow::Result<()> {
    let report = run(
        "As argued before (Doe, 2021).",
        "Doe, J., Lee, K., & Kim, S. (2021). Shared work. Journal of Things, 4(1), 1-9.",
    )?;
    let key = CitationKey::AuthorYear {
        family: "Doe".into(),
        year: 2021,
        suffix: None,
    };
    assert_eq!(report.matches.label_for(&key), Some(&label("doe2021")));
    assert!(report.matches.unmatched_citations.is_empty());
    Ok(())
}

#[test]
fn empty_reference_list_is_one_info_issue() -> anyhow::Result<()> {
    let report = run("Prose citing [1].", "")?;
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].kind, IssueKind::EmptyReferenceList);
    Ok(())
}

#[test]
fn range_marker_expands_in_order() {
    for (a, b) in [(1u32, 4u32), (3, 3), (7, 12)] {
        let text = format!("see [{}-{}]", a, b);
        let markers: Vec<_> = extract_citations(&text).collect();
        assert_eq!(markers.len(), 1);
        let expected: Vec<CitationKey> = (a..=b).map(CitationKey::Numeric).collect();
        assert_eq!(markers[0].keys, expected);
    }
}

#[test]
fn entry_count_equals_label_count() -> anyhow::Result<()> {
    let references = "[1] Doe J. One. 2020.\n[2] Lee K. Two.\ncontinued here 2021.\n[3] Kim S. Three. 2019.\n[4]";
    let doc = refcheck_core::DocumentText::new("body", references);
    let parsed = parse_document(&doc, &ParsingConfig::default())?;
    assert_eq!(parsed.entries.len(), 4);
    assert!(parsed.entries[1].raw_text.contains("continued here"));
    Ok(())
}

#[test]
fn parse_anomalies_reach_the_report() -> anyhow::Result<()> {
    let report = run("[1] [3]", "[1] Doe J. One. 2020.\n[3] Lee K. Two. 2021.")?;
    assert!(
        report
            .issues_of(IssueKind::ParseAnomaly)
            .any(|i| i.message.contains("follows label 1"))
    );
    Ok(())
}

#[test]
fn implausible_year_is_suspicious_not_missing() -> anyhow::Result<()> {
    let report = run("as shown in [1]", "[1] Doe J. Title. J. 2099;10(2):1-9. doi:10.1234/x")?;
    assert_eq!(report.entries[0].year, Some(2099));

    let kinds: Vec<IssueKind> = report.issues_for(&Subject::Reference(label("1"))).map(|i| i.kind).collect();
    assert!(!kinds.contains(&IssueKind::IncompleteMetadata(Field::Year)), "{:?}", kinds);

    let suspicious: Vec<_> = report.issues_of(IssueKind::SuspiciousYear).collect();
    assert_eq!(suspicious.len(), 1);
    assert_eq!(suspicious[0].severity, Severity::Info);
    assert_eq!(suspicious[0].evidence["year"], "2099");
    Ok(())
}

#[test]
fn wrapped_labeled_entries_all_match() -> anyhow::Result<()> {
    let references = "[1] Doe J, Lee K. A very long title about citation\nchecking that wraps across\nseveral lines. J Cit. 2021;10(2):1-9.\n[2] Smith A. Another long title\nthat also continues\nonto more lines. 2020.\n[3] Kim S. Third. 2019.";
    let report = run("see [1], [2] and [3]", references)?;
    assert_eq!(report.entries.len(), 3);
    assert!(report.matches.unmatched_citations.is_empty());
    assert!(report.matches.uncited_references.is_empty());
    Ok(())
}
