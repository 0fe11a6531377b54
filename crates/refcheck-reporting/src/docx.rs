//! Updated `.docx` output: the manuscript with its reference list rebuilt
//! from the (enriched) entries.
//!
//! Only the paragraphs between the last references heading and the next
//! end-of-section heading are replaced. Every other byte of
//! `word/document.xml` and every other part of the package is copied
//! through unchanged.

use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use std::ops::Range;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use refcheck_core::{IssueKind, ValidationReport};
use refcheck_parsing::{is_reference_heading, is_section_end};

use crate::style::ReferenceStyle;

const DOCUMENT_PART: &str = "word/document.xml";
const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// One paragraph of the rebuilt reference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListParagraph {
    Entry(String),
    /// Fields the entry still lacks after enrichment.
    MissingNote(String),
}

impl ListParagraph {
    pub fn text(&self) -> &str {
        match self {
            ListParagraph::Entry(t) | ListParagraph::MissingNote(t) => t,
        }
    }

    fn to_xml(&self) -> String {
        let run_props = match self {
            ListParagraph::Entry(_) => "",
            ListParagraph::MissingNote(_) => "<w:rPr><w:i/></w:rPr>",
        };
        format!(
            r#"<w:p><w:r>{}<w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            run_props,
            escape(self.text())
        )
    }
}

/// The reference list as paragraphs: each entry in `style`, followed by a
/// "Missing details:" note when the report flags absent fields for it.
pub fn reference_paragraphs(report: &ValidationReport, style: ReferenceStyle) -> Vec<ListParagraph> {
    let mut out = Vec::new();
    for entry in &report.entries {
        out.push(ListParagraph::Entry(format!(
            "{}. {}",
            entry.label,
            style.format(entry)
        )));

        let subject = refcheck_core::Subject::Reference(entry.label.clone());
        let missing: BTreeSet<&str> = report
            .issues_for(&subject)
            .filter_map(|issue| match issue.kind {
                IssueKind::IncompleteMetadata(field) => Some(field.as_str()),
                IssueKind::NoLocator => Some("doi or url"),
                _ => None,
            })
            .collect();
        if !missing.is_empty() {
            out.push(ListParagraph::MissingNote(format!(
                "Missing details: {}",
                missing.into_iter().collect::<Vec<_>>().join("; ")
            )));
        }
    }
    out
}

/// A top-level `w:p` of `w:body`.
#[derive(Debug)]
struct BodyParagraph {
    span: Range<usize>,
    text: String,
}

#[derive(Debug)]
struct BodyLayout {
    paragraphs: Vec<BodyParagraph>,
    /// Where new content may be appended: the body's `w:sectPr`, or its
    /// closing tag.
    insert_at: usize,
}

fn xml_error(reader: &Reader<&[u8]>, e: quick_xml::Error) -> String {
    format!("XML error at position {}: {}", reader.error_position(), e)
}

/// Locate the body's top-level paragraphs by byte offset.
fn body_layout(xml: &str) -> Result<BodyLayout, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;
    let mut current: Option<(usize, String)> = None;
    let mut in_text = false;
    let mut paragraphs = Vec::new();
    let mut insert_at = None;

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|e| xml_error(&reader, e))?;
        let at_paragraph_level = body_depth.is_some_and(|d| depth == d + 1);
        match event {
            Event::Start(e) => {
                match e.name().as_ref() {
                    b"w:body" if body_depth.is_none() => body_depth = Some(depth),
                    b"w:p" if at_paragraph_level && current.is_none() => {
                        current = Some((start, String::new()));
                    }
                    b"w:sectPr" if at_paragraph_level => {
                        insert_at.get_or_insert(start);
                    }
                    b"w:t" => in_text = true,
                    _ => {}
                }
                depth += 1;
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                let at_paragraph_level = body_depth.is_some_and(|d| depth == d + 1);
                match e.name().as_ref() {
                    b"w:t" => in_text = false,
                    b"w:p" if at_paragraph_level => {
                        if let Some((begin, text)) = current.take() {
                            paragraphs.push(BodyParagraph {
                                span: begin..reader.buffer_position() as usize,
                                text,
                            });
                        }
                    }
                    b"w:body" if body_depth == Some(depth) => {
                        insert_at.get_or_insert(start);
                        break;
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" if at_paragraph_level => paragraphs.push(BodyParagraph {
                    span: start..reader.buffer_position() as usize,
                    text: String::new(),
                }),
                b"w:sectPr" if at_paragraph_level => {
                    insert_at.get_or_insert(start);
                }
                b"w:tab" => {
                    if let Some((_, text)) = current.as_mut() {
                        text.push('\t');
                    }
                }
                _ => {}
            },
            Event::Text(e) if in_text => {
                if let Some((_, text)) = current.as_mut() {
                    let unescaped = e.unescape().map_err(|err| {
                        format!("bad text at position {}: {}", reader.buffer_position(), err)
                    })?;
                    text.push_str(&unescaped);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let insert_at = insert_at.ok_or_else(|| format!("{} has no w:body", DOCUMENT_PART))?;
    Ok(BodyLayout {
        paragraphs,
        insert_at,
    })
}

/// Replace the reference list inside `document.xml`. Without a references
/// heading, one is appended at the end of the body along with the list.
pub fn rewrite_document_xml(xml: &str, list: &[ListParagraph]) -> Result<String, String> {
    let layout = body_layout(xml)?;
    let generated: String = list.iter().map(ListParagraph::to_xml).collect();

    let heading = layout
        .paragraphs
        .iter()
        .rposition(|p| is_reference_heading(p.text.trim()));
    let Some(heading) = heading else {
        tracing::debug!("no reference heading in document, appending one");
        let heading_xml = ListParagraph::Entry("References".to_string()).to_xml();
        return Ok(format!(
            "{}{}{}{}",
            &xml[..layout.insert_at],
            heading_xml,
            generated,
            &xml[layout.insert_at..]
        ));
    };

    let after = &layout.paragraphs[heading + 1..];
    let end = after
        .iter()
        .position(|p| is_section_end(p.text.trim()))
        .unwrap_or(after.len());
    let replaced = match (after.first(), end) {
        (Some(first), n) if n > 0 => first.span.start..after[n - 1].span.end,
        _ => {
            let at = layout.paragraphs[heading].span.end;
            at..at
        }
    };
    tracing::debug!(
        paragraphs = end,
        bytes = replaced.len(),
        "replacing reference list span"
    );
    Ok(format!(
        "{}{}{}",
        &xml[..replaced.start],
        generated,
        &xml[replaced.end..]
    ))
}

/// Rebuild the reference list of an existing `.docx` held in memory.
pub fn rewrite_docx(source: &[u8], list: &[ListParagraph]) -> Result<Vec<u8>, String> {
    let mut archive = ZipArchive::new(Cursor::new(source))
        .map_err(|e| format!("not a ZIP container: {}", e))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| format!("missing {}", DOCUMENT_PART))?
        .read_to_string(&mut xml)
        .map_err(|e| format!("unreadable {}: {}", DOCUMENT_PART, e))?;
    let rewritten = rewrite_document_xml(&xml, list)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..archive.len() {
        let file = archive.by_index_raw(i).map_err(|e| e.to_string())?;
        if file.name() == DOCUMENT_PART {
            drop(file);
            writer
                .start_file(DOCUMENT_PART, SimpleFileOptions::default())
                .map_err(|e| e.to_string())?;
            writer
                .write_all(rewritten.as_bytes())
                .map_err(|e| e.to_string())?;
        } else {
            writer.raw_copy_file(file).map_err(|e| e.to_string())?;
        }
    }
    let cursor = writer.finish().map_err(|e| e.to_string())?;
    Ok(cursor.into_inner())
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#;

/// A new `.docx` for plain-text input: one paragraph per body line, a
/// "References" heading, then the list.
pub fn minimal_docx(body: &str, list: &[ListParagraph]) -> Result<Vec<u8>, String> {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{}"><w:body>"#,
        W_NS
    );
    for line in body.lines().map(str::trim_end).filter(|l| !l.trim().is_empty()) {
        xml.push_str(&ListParagraph::Entry(line.to_string()).to_xml());
    }
    xml.push_str(&ListParagraph::Entry("References".to_string()).to_xml());
    for paragraph in list {
        xml.push_str(&paragraph.to_xml());
    }
    xml.push_str("</w:body></w:document>");

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS),
        (DOCUMENT_PART, xml.as_str()),
    ] {
        writer
            .start_file(name, SimpleFileOptions::default())
            .map_err(|e| e.to_string())?;
        writer
            .write_all(content.as_bytes())
            .map_err(|e| e.to_string())?;
    }
    let cursor = writer.finish().map_err(|e| e.to_string())?;
    Ok(cursor.into_inner())
}

/// Write the updated document. `source` is the original `.docx`, if the
/// input was one; otherwise a fresh document is built from `body`.
pub fn write_updated_docx(
    path: &Path,
    source: Option<&[u8]>,
    body: &str,
    report: &ValidationReport,
    style: ReferenceStyle,
) -> Result<(), String> {
    let list = reference_paragraphs(report, style);
    let bytes = match source {
        Some(data) => rewrite_docx(data, &list)?,
        None => minimal_docx(body, &list)?,
    };
    std::fs::write(path, bytes).map_err(|e| format!("failed to write {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use refcheck_core::{
        Author, Field, Issue, MatchResult, ReferenceEntry, ReferenceLabel, Severity, Subject,
    };

    const INTRO: &str = r#"<w:p><w:pPr><w:pStyle w:val="Body"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Intro cites </w:t></w:r><w:r><w:t>[1] and [2].</w:t></w:r></w:p>"#;
    const APPENDIX: &str =
        r#"<w:p><w:r><w:t>Appendix A</w:t></w:r></w:p><w:p><w:r><w:t>Extra data (Lee, 2019).</w:t></w:r></w:p>"#;
    const SECT: &str = r#"<w:sectPr><w:pgSz w:w="12240"/></w:sectPr>"#;

    fn document(with_appendix: bool) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}"><w:body>{INTRO}<w:p/><w:p><w:r><w:t>References</w:t></w:r></w:p><w:p><w:r><w:t>[1] Doe J. Sound results. 2020.</w:t></w:r></w:p><w:p><w:r><w:t>[2] Roe R. Other &amp; more. 2019.</w:t></w:r></w:p>{}{SECT}</w:body></w:document>"#,
            if with_appendix { APPENDIX } else { "" }
        )
    }

    fn report() -> ValidationReport {
        let mut first = ReferenceEntry::new("1", 1, "Doe J. Sound results. 2020.");
        first.authors = vec![Author::new("Doe", Some("J.".into()))];
        first.year = Some(2020);
        first.title = Some("Sound results".into());
        first.venue = Some("J Good Sci".into());
        first.doi = Some("10.1/good".into());

        let mut second = ReferenceEntry::new("2", 2, "Roe R. Other & more. 2019.");
        second.authors = vec![Author::new("Roe", Some("R.".into()))];
        second.year = Some(2019);
        second.title = Some("Other & more".into());

        let subject = Subject::Reference(ReferenceLabel::new("2"));
        ValidationReport::new(
            vec![
                Issue::new(
                    IssueKind::IncompleteMetadata(Field::Venue),
                    Severity::Warning,
                    subject.clone(),
                    "journal article is missing venue",
                ),
                Issue::new(
                    IssueKind::NoLocator,
                    Severity::Warning,
                    subject.clone(),
                    "no DOI or URL",
                ),
                Issue::new(
                    IssueKind::UncitedReference,
                    Severity::Warning,
                    subject,
                    "reference [2] is never cited in the text",
                ),
            ],
            MatchResult::default(),
            Vec::new(),
            vec![first, second],
        )
    }

    fn list() -> Vec<ListParagraph> {
        reference_paragraphs(&report(), ReferenceStyle::Apa)
    }

    #[test]
    fn test_reference_paragraphs_with_missing_note() {
        let list = list();
        assert_eq!(
            list,
            vec![
                ListParagraph::Entry(
                    "1. Doe, J. (2020). Sound results. J Good Sci. https://doi.org/10.1/good"
                        .to_string()
                ),
                ListParagraph::Entry("2. Roe, R. (2019). Other & more".to_string()),
                ListParagraph::MissingNote("Missing details: doi or url; venue".to_string()),
            ]
        );
    }

    #[test]
    fn test_body_bytes_untouched() {
        let xml = document(false);
        let out = rewrite_document_xml(&xml, &list()).unwrap();
        let heading = "<w:t>References</w:t></w:r></w:p>";
        let prefix_end = xml.find(heading).unwrap() + heading.len();
        assert_eq!(&out[..prefix_end], &xml[..prefix_end]);
        assert!(out.ends_with(&format!("{SECT}</w:body></w:document>")));
        assert!(!out.contains("[1] Doe J. Sound results. 2020."));
        assert!(out.contains("Other &amp; more"));
        assert!(out.contains("<w:i/></w:rPr><w:t xml:space=\"preserve\">Missing details: doi or url; venue"));
    }

    #[test]
    fn test_appendix_after_list_is_kept() {
        let xml = document(true);
        let out = rewrite_document_xml(&xml, &list()).unwrap();
        assert!(out.ends_with(&format!("{APPENDIX}{SECT}</w:body></w:document>")));
        let appendix_at = out.find("Appendix A").unwrap();
        assert!(out.find("Missing details").unwrap() < appendix_at);
    }

    #[test]
    fn test_no_heading_appends_before_section_properties() {
        let xml = format!(
            r#"<w:document xmlns:w="{W_NS}"><w:body>{INTRO}{SECT}</w:body></w:document>"#
        );
        let out = rewrite_document_xml(&xml, &list()).unwrap();
        assert!(out.contains(&format!("{INTRO}<w:p><w:r><w:t xml:space=\"preserve\">References</w:t>")));
        assert!(out.ends_with(&format!("{SECT}</w:body></w:document>")));
    }

    #[test]
    fn test_heading_in_table_is_ignored() {
        let xml = format!(
            r#"<w:document xmlns:w="{W_NS}"><w:body><w:tbl><w:tr><w:tc><w:p><w:r><w:t>References</w:t></w:r></w:p></w:tc></w:tr></w:tbl>{INTRO}</w:body></w:document>"#
        );
        let out = rewrite_document_xml(&xml, &list()).unwrap();
        assert!(out.contains("<w:tc><w:p><w:r><w:t>References</w:t></w:r></w:p></w:tc>"));
        assert!(out.ends_with("</w:p></w:body></w:document>"));
        assert!(out.contains("1. Doe, J."));
    }

    #[test]
    fn test_missing_body_is_an_error() {
        let err = rewrite_document_xml("<w:document/>", &list()).unwrap_err();
        assert!(err.contains("w:body"));
    }

    #[test]
    fn test_minimal_docx_parts() {
        let data = minimal_docx("Intro cites [1].\n\nMore <text>.", &list()).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(data)).unwrap();
        for name in ["[Content_Types].xml", "_rels/.rels", "word/_rels/document.xml.rels"] {
            assert!(archive.by_name(name).is_ok(), "{}", name);
        }
        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert!(xml.contains("More &lt;text&gt;."));
        assert_eq!(body_layout(&xml).unwrap().paragraphs.len(), 6);
    }
}
