//! Plain text from `.docx` files: `word/document.xml`, one line per
//! paragraph.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::IngestError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract the text of a `.docx` file held in memory.
pub fn docx_text(data: &[u8]) -> Result<String, IngestError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| IngestError::Docx(format!("not a ZIP container: {}", e)))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| IngestError::Docx(format!("missing {}", DOCUMENT_PART)))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| IngestError::Docx(format!("unreadable {}: {}", DOCUMENT_PART, e)))?;
    document_xml_text(&xml)
}

/// Walk WordprocessingML: `w:t` runs carry text, `w:tab` and `w:br` are
/// whitespace, and every closed `w:p` ends a line.
pub fn document_xml_text(xml: &str) -> Result<String, IngestError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if e.name().as_ref() == b"w:t" {
                    in_text = true;
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" | b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                out.push_str(&e.unescape().unwrap_or_default());
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::Docx(format!(
                    "XML error at position {}: {}",
                    reader.error_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>
<w:p><w:r><w:t>Intro cites [1].</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Split </w:t></w:r><w:r><w:t>run</w:t></w:r><w:r><w:tab/><w:t>tabbed</w:t></w:r></w:p>
<w:p/>
<w:p><w:r><w:t>References</w:t></w:r></w:p>
<w:p><w:r><w:t>[1] Doe J. Title &amp; more. 2021.</w:t></w:r></w:p>
</w:body>
</w:document>"#;

    fn build_docx(xml: &str) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(DOCUMENT_PART, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_paragraphs_and_runs() {
        let text = document_xml_text(XML).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Intro cites [1].",
                "Split run\ttabbed",
                "",
                "References",
                "[1] Doe J. Title & more. 2021.",
            ]
        );
    }

    #[test]
    fn test_whitespace_between_tags_is_dropped() {
        let text = document_xml_text(XML).unwrap();
        assert!(!text.contains("\n\n\n"));
        assert!(!text.starts_with('\n'));
    }

    #[test]
    fn test_docx_container() {
        let text = docx_text(&build_docx(XML)).unwrap();
        assert!(text.contains("[1] Doe J."));
    }

    #[test]
    fn test_not_a_zip() {
        let err = docx_text(b"plain text").unwrap_err();
        assert!(matches!(err, IngestError::Docx(_)));
    }

    #[test]
    fn test_missing_document_part() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        let data = zip.finish().unwrap().into_inner();
        let err = docx_text(&data).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }
}
