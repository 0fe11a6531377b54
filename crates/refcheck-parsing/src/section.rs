use once_cell::sync::Lazy;
use regex::Regex;

use refcheck_core::{DocumentText, Issue, IssueKind, ReferenceLabel, Severity, Subject};

use crate::config::ParsingConfig;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:#{1,6}[ \t]*)?(?:\d+\.?[ \t]+)?(?:References|Bibliography|Works[ \t]+Cited|Literature[ \t]+Cited|Reference[ \t]+List)[ \t]*:?[ \t]*$",
    )
    .unwrap()
});

static END_RE: Lazy<Regex> = Lazy::new(|| {
    // Headings that follow a reference list. "Appendix" needs a letter,
    // number or line end after it, so "Artifact Appendix: ..." inside a
    // reference does not end the section.
    Regex::new(
        r"(?im)^[ \t]*(?:#{1,6}[ \t]*)?(?:Appendix(?:[ \t]+[A-Z0-9][^\n]*)?|Acknowledge?ments?|Supplementary(?:[ \t]+\w+)*|Ethics[ \t]+Statement|Author[ \t]+Contributions|Conflicts?[ \t]+of[ \t]+Interest)[ \t]*:?[ \t]*$",
    )
    .unwrap()
});

static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\[(?P<bracket>[^\]\s]{1,16})\]\s*|(?P<number>\d{1,3})[.)](?:\s+|$))")
        .unwrap()
});

static ENTRY_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z]{1,3}\s+)*\p{Lu}[\p{L}'\u{2019}\-]+,?\s").unwrap()
});

static YEARISH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:1[4-9]\d{2}|20\d{2})[a-z]?\b|\bn\.\s?d\.").unwrap());

/// Delimiting convention of a reference list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Convention {
    /// A leading `[n]`, `n.` or `n)` label per entry; unlabeled lines continue
    /// the previous entry.
    Labeled,
    /// Blank-line separated paragraphs.
    Paragraph,
    /// One unlabeled entry per line.
    Line,
}

/// One segmented entry before field extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Label as written (`"3"` for `[3]` or `3.`), `None` when unlabeled.
    pub label: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Segmentation {
    pub convention: Convention,
    pub entries: Vec<RawEntry>,
    pub anomalies: Vec<Issue>,
}

/// Split a document into body text and reference-list text.
///
/// Uses the LAST references heading (earlier ones tend to be table or
/// section titles) and stops at the first end marker after it. Text after
/// the end marker (appendices) is kept as body. Without a heading the whole
/// text is body and the reference list is empty.
pub fn split_document(text: &str) -> DocumentText {
    split_document_with_config(text, &ParsingConfig::default())
}

/// Config-aware version of [`split_document`].
pub(crate) fn split_document_with_config(text: &str, config: &ParsingConfig) -> DocumentText {
    let header_re = config.section_header_re.as_ref().unwrap_or(&HEADER_RE);
    let Some(header) = header_re.find_iter(text).last() else {
        tracing::debug!("no reference heading found, treating whole text as body");
        return DocumentText::new(text, "");
    };

    let before = &text[..header.start()];
    let rest = &text[header.end()..];
    let end_re = config.section_end_re.as_ref().unwrap_or(&END_RE);
    let (references, after) = match end_re.find(rest) {
        Some(end) => (&rest[..end.start()], &rest[end.start()..]),
        None => (rest, ""),
    };

    let body = if after.trim().is_empty() {
        before.trim_end().to_string()
    } else {
        format!("{}\n{}", before.trim_end(), after)
    };
    DocumentText::new(body, references.trim())
}

/// Whether a single line is a reference-list heading.
pub fn is_reference_heading(line: &str) -> bool {
    HEADER_RE.is_match(line.trim_end_matches(['\n', '\r']))
}

/// Whether a single line is a heading that ends the reference list.
pub fn is_section_end(line: &str) -> bool {
    END_RE.is_match(line.trim_end_matches(['\n', '\r']))
}

fn label_of(caps: &regex::Captures<'_>) -> Option<String> {
    caps.name("bracket")
        .or_else(|| caps.name("number"))
        .map(|m| m.as_str().to_string())
}

/// Whether a line reads like the start of an unlabeled entry: a family name
/// up front and a year (or "n.d.") somewhere.
fn looks_like_entry_start(line: &str) -> bool {
    let line = line.trim_start();
    ENTRY_START_RE.is_match(line) && YEARISH_RE.is_match(line)
}

/// Pick the delimiting convention by majority vote over the first
/// `vote_window` candidate entries.
///
/// A labeled line votes `Labeled`. Unlabeled lines that follow a labeled
/// line without a blank line in between continue that entry and do not
/// vote. A line right after a blank line votes `Paragraph`. A line right
/// after another line votes `Line` when it reads like a new entry and
/// `Paragraph` (continuation) otherwise. The first line votes `Paragraph`
/// when the text has blank-line separators at all. Ties go to `Labeled`,
/// then `Paragraph`.
pub fn detect_convention(text: &str, config: &ParsingConfig) -> Convention {
    let label_re = config.label_re.as_ref().unwrap_or(&LABEL_RE);
    let has_blank_separators = text.trim().lines().any(|l| l.trim().is_empty());

    let mut votes = [0usize; 3];
    let mut prev_blank = true;
    let mut first = true;
    let mut in_labeled = false;
    let mut seen = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            prev_blank = true;
            in_labeled = false;
            continue;
        }
        let labeled = label_re.is_match(line);
        if !labeled && in_labeled {
            prev_blank = false;
            continue;
        }
        in_labeled = labeled;
        let vote = if labeled {
            Convention::Labeled
        } else if first {
            if has_blank_separators {
                Convention::Paragraph
            } else {
                Convention::Line
            }
        } else if prev_blank {
            Convention::Paragraph
        } else if looks_like_entry_start(line) {
            Convention::Line
        } else {
            Convention::Paragraph
        };
        votes[vote as usize] += 1;
        first = false;
        prev_blank = false;
        seen += 1;
        if seen >= config.vote_window() {
            break;
        }
    }

    let [labeled, paragraph, line] = votes;
    let convention = if labeled >= paragraph && labeled >= line && labeled > 0 {
        Convention::Labeled
    } else if paragraph >= line {
        Convention::Paragraph
    } else {
        Convention::Line
    };
    tracing::debug!(?convention, labeled, paragraph, line, "reference convention vote");
    convention
}

/// Append a continuation line. A trailing hyphen joins without a space.
fn join_continuation(current: &mut String, line: &str) {
    let line = line.trim();
    if current.is_empty() {
        current.push_str(line);
    } else if current.ends_with('-') {
        current.push_str(line);
    } else {
        current.push(' ');
        current.push_str(line);
    }
}

fn anomaly(subject: Subject, message: impl Into<String>) -> Issue {
    Issue::new(IssueKind::ParseAnomaly, Severity::Info, subject, message)
}

fn segment_labeled(text: &str, label_re: &Regex) -> (Vec<RawEntry>, Vec<Issue>) {
    let mut entries: Vec<RawEntry> = Vec::new();
    let mut leading = String::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(caps) = label_re.captures(line) {
            let mut body = String::new();
            join_continuation(&mut body, &line[caps.get(0).map_or(0, |m| m.end())..]);
            entries.push(RawEntry {
                label: label_of(&caps),
                text: body,
            });
        } else if let Some(current) = entries.last_mut() {
            join_continuation(&mut current.text, line);
        } else {
            join_continuation(&mut leading, line);
        }
    }

    let mut anomalies = Vec::new();
    if !leading.is_empty() {
        anomalies.push(
            anomaly(Subject::Document, "text before the first entry label was ignored")
                .with_evidence("text", leading),
        );
    }
    let mut previous: Option<u64> = None;
    for entry in &entries {
        let Some(label) = &entry.label else { continue };
        if entry.text.trim().is_empty() {
            anomalies.push(anomaly(
                Subject::Reference(ReferenceLabel::new(label.as_str())),
                format!("entry [{}] is empty", label),
            ));
        }
        if let Ok(n) = label.parse::<u64>() {
            if let Some(p) = previous {
                if n != p + 1 {
                    anomalies.push(
                        anomaly(
                            Subject::Reference(ReferenceLabel::new(label.as_str())),
                            format!("label {} follows label {}", n, p),
                        )
                        .with_evidence("expected", (p + 1).to_string()),
                    );
                }
            }
            previous = Some(n);
        }
    }
    (entries, anomalies)
}

fn segment_paragraphs(text: &str) -> Vec<RawEntry> {
    let mut entries = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                entries.push(RawEntry {
                    label: None,
                    text: std::mem::take(&mut current),
                });
            }
        } else {
            join_continuation(&mut current, line);
        }
    }
    if !current.is_empty() {
        entries.push(RawEntry {
            label: None,
            text: current,
        });
    }
    entries
}

fn segment_lines(text: &str) -> Vec<RawEntry> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| RawEntry {
            label: None,
            text: l.to_string(),
        })
        .collect()
}

/// Split reference-list text into raw entries.
pub fn segment_references(text: &str) -> Segmentation {
    segment_references_with_config(text, &ParsingConfig::default())
}

/// Config-aware version of [`segment_references`].
pub(crate) fn segment_references_with_config(text: &str, config: &ParsingConfig) -> Segmentation {
    let convention = detect_convention(text, config);
    let (entries, anomalies) = match convention {
        Convention::Labeled => {
            segment_labeled(text, config.label_re.as_ref().unwrap_or(&LABEL_RE))
        }
        Convention::Paragraph => (segment_paragraphs(text), Vec::new()),
        Convention::Line => (segment_lines(text), Vec::new()),
    };
    tracing::debug!(?convention, entries = entries.len(), "segmented reference list");
    Segmentation {
        convention,
        entries,
        anomalies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ParsingConfig {
        ParsingConfig::default()
    }

    #[test]
    fn test_split_uses_last_heading() {
        let text = "Intro cites [1].\nReferences\nnot really, a table title\nMore body [2].\n\nReferences\n[1] A. Doe. One. 2020.\n[2] B. Lee. Two. 2021.\n";
        let doc = split_document(text);
        assert!(doc.body.contains("More body [2]."));
        assert!(doc.references.starts_with("[1] A. Doe."));
        assert!(doc.references.ends_with("2021."));
    }

    #[test]
    fn test_split_stops_at_appendix() {
        let text = "Body (Doe, 2020).\n\n## Bibliography\nDoe, J. (2020). Title.\n\nAppendix A\nMore text (Lee, 2019).";
        let doc = split_document(text);
        assert_eq!(doc.references, "Doe, J. (2020). Title.");
        assert!(doc.body.contains("Body (Doe, 2020)."));
        assert!(doc.body.contains("More text (Lee, 2019)."));
    }

    #[test]
    fn test_split_without_heading() {
        let doc = split_document("Just prose [1] with no list.");
        assert_eq!(doc.body, "Just prose [1] with no list.");
        assert!(doc.references.is_empty());
    }

    #[test]
    fn test_heading_variants() {
        for heading in ["References", "REFERENCES", "Works Cited", "4. References", "# References:"] {
            let doc = split_document(&format!("Body.\n{}\nDoe J. T. 2020.", heading));
            assert_eq!(doc.references, "Doe J. T. 2020.", "{}", heading);
        }
    }

    #[test]
    fn test_single_line_headings() {
        assert!(is_reference_heading("References"));
        assert!(is_reference_heading("  Works Cited:"));
        assert!(!is_reference_heading("References to prior work are listed below."));
        assert!(is_section_end("Appendix A"));
        assert!(is_section_end("Acknowledgments"));
        assert!(!is_section_end("[4] Doe J. Artifact Appendix: setup. 2020."));
    }

    #[test]
    fn test_vote_labeled() {
        let text = "[1] Doe J. Title. 2020.\n[2] Lee K. Other. 2021.\n[3] Kim S. Third. 2019.";
        assert_eq!(detect_convention(text, &cfg()), Convention::Labeled);
        let dotted = "1. Doe J. Title. 2020.\n2. Lee K. Other. 2021.";
        assert_eq!(detect_convention(dotted, &cfg()), Convention::Labeled);
    }

    #[test]
    fn test_vote_paragraph() {
        let text = "Doe, J. (2020). A long title that\nwraps onto a second line. Journal, 1(2), 3-4.\n\nLee, K. (2021). Other. Venue.\n\nKim, S. (2019). Third.";
        assert_eq!(detect_convention(text, &cfg()), Convention::Paragraph);
    }

    #[test]
    fn test_vote_line() {
        let text = "Doe, J. (2020). Title. Journal.\nLee, K. (2021). Other. Venue.\nKim, S. (2019). Third. Press.";
        assert_eq!(detect_convention(text, &cfg()), Convention::Line);
    }

    #[test]
    fn test_labeled_continuations_joined() {
        let text = "[1] Doe J. A title that is\n    continued here. J. 2021.\n[2] Lee K. http://example.org/long-\npath. 2020.";
        let seg = segment_references(text);
        assert_eq!(seg.convention, Convention::Labeled);
        assert_eq!(seg.entries.len(), 2);
        assert_eq!(seg.entries[0].label.as_deref(), Some("1"));
        assert_eq!(seg.entries[0].text, "Doe J. A title that is continued here. J. 2021.");
        assert_eq!(seg.entries[1].text, "Lee K. http://example.org/long-path. 2020.");
        assert!(seg.anomalies.is_empty());
    }

    #[test]
    fn test_vote_ignores_labeled_continuations() {
        let text = "[1] Doe J, Lee K. A very long title about citation\nchecking that wraps across\nseveral lines. J Cit. 2021;10(2):1-9.\n[2] Smith A. Another long title\nthat also continues\nonto more lines. 2020.\n[3] Kim S. Third. 2019.";
        assert_eq!(detect_convention(text, &cfg()), Convention::Labeled);

        let seg = segment_references(text);
        assert_eq!(seg.entries.len(), 3);
        let labels: Vec<_> = seg.entries.iter().map(|e| e.label.as_deref()).collect();
        assert_eq!(labels, vec![Some("1"), Some("2"), Some("3")]);
        assert_eq!(
            seg.entries[0].text,
            "Doe J, Lee K. A very long title about citation checking that wraps across several lines. J Cit. 2021;10(2):1-9."
        );
        assert_eq!(seg.entries[1].text, "Smith A. Another long title that also continues onto more lines. 2020.");
    }

    #[test]
    fn test_entry_count_equals_label_count() {
        let text = "[1] One. 2020.\n[2]\n[4] Four. 2021.\n[5] Five. 2022.";
        let seg = segment_references(text);
        assert_eq!(seg.entries.len(), 4);
        let messages: Vec<&str> = seg.anomalies.iter().map(|a| a.message.as_str()).collect();
        assert!(messages.contains(&"entry [2] is empty"));
        assert!(messages.contains(&"label 4 follows label 2"));
        assert!(seg.anomalies.iter().all(|a| a.kind == IssueKind::ParseAnomaly));
    }

    #[test]
    fn test_leading_text_reported() {
        let text = "Sorted alphabetically\n[1] One. 2020.\n[2] Two. 2021.";
        let seg = segment_references(text);
        assert_eq!(seg.entries.len(), 2);
        assert_eq!(seg.anomalies.len(), 1);
        assert_eq!(seg.anomalies[0].subject, Subject::Document);
    }

    #[test]
    fn test_paragraph_and_line_segmentation() {
        let para = "Doe, J. (2020). A title\nthat wraps.\n\nLee, K. (2021). Other.";
        let seg = segment_references(para);
        assert_eq!(seg.entries.len(), 2);
        assert_eq!(seg.entries[0].text, "Doe, J. (2020). A title that wraps.");
        assert!(seg.entries.iter().all(|e| e.label.is_none()));

        let lines = "Doe, J. (2020). One.\nLee, K. (2021). Two.\nKim, S. (2019). Three.";
        assert_eq!(segment_references(lines).entries.len(), 3);
    }

    #[test]
    fn test_empty_text() {
        let seg = segment_references("   \n\n ");
        assert!(seg.entries.is_empty());
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let text = "[1] Doe J. Title. 2020.\n[2] Lee K. Other. 2021.";
        assert_eq!(segment_references(text).entries, segment_references(text).entries);
    }
}
