use std::path::Path;

use thiserror::Error;

use refcheck_core::DocumentText;
use refcheck_parsing::{ParsingError, ReferenceParser};

pub mod docx;
pub mod pipeline;

// Re-export pipeline API
pub use pipeline::{CheckOutcome, Checker};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("unsupported input format: {0} (expected .txt, .md or .docx)")]
    UnsupportedFormat(String),
    #[error("invalid .docx file: {0}")]
    Docx(String),
    #[error("{0} is not valid UTF-8 text")]
    Encoding(String),
    #[error(transparent)]
    Parsing(#[from] ParsingError),
}

/// Input formats the loader understands, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Markdown,
    Docx,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "txt" | "text" => Ok(DocumentFormat::Text),
            "md" | "markdown" => Ok(DocumentFormat::Markdown),
            "docx" => Ok(DocumentFormat::Docx),
            _ => Err(IngestError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Drop Markdown list bullets so `- [1] Doe ...` reads as a labeled entry.
fn strip_markdown_bullets(text: &str) -> String {
    text.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
                .or_else(|| trimmed.strip_prefix("+ "))
                .unwrap_or(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read the full text of a `.txt`, `.md` or `.docx` file.
pub fn load_text(path: &Path) -> Result<String, IngestError> {
    let format = DocumentFormat::from_path(path)?;
    let data = std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), ?format, bytes = data.len(), "loading document");

    let text = match format {
        DocumentFormat::Docx => docx::docx_text(&data)?,
        DocumentFormat::Text | DocumentFormat::Markdown => {
            let text = String::from_utf8(data)
                .map_err(|_| IngestError::Encoding(path.display().to_string()))?;
            let text = text.strip_prefix('\u{feff}').unwrap_or(&text).replace("\r\n", "\n");
            if format == DocumentFormat::Markdown {
                strip_markdown_bullets(&text)
            } else {
                text
            }
        }
    };
    Ok(text)
}

/// Load a document as `(body, references)`.
///
/// With a separate references file the main file is all body. Otherwise
/// the text is split at its last references heading.
pub fn load_document(
    path: &Path,
    references: Option<&Path>,
    parser: &ReferenceParser,
) -> Result<DocumentText, IngestError> {
    let text = load_text(path)?;
    let doc = match references {
        Some(refs_path) => DocumentText::new(text, load_text(refs_path)?),
        None => parser.split_document(&text),
    };
    if doc.references.trim().is_empty() {
        tracing::warn!(path = %path.display(), "no reference list found");
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(suffix: &str, contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("paper.TXT")).unwrap(),
            DocumentFormat::Text
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("paper.md")).unwrap(),
            DocumentFormat::Markdown
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("paper.docx")).unwrap(),
            DocumentFormat::Docx
        );
        assert!(matches!(
            DocumentFormat::from_path(Path::new("paper.pdf")),
            Err(IngestError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_text_strips_bom_and_crlf() {
        let file = temp_file(".txt", "\u{feff}Body [1].\r\nReferences\r\n".as_bytes());
        let text = load_text(file.path()).unwrap();
        assert_eq!(text, "Body [1].\nReferences\n");
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let file = temp_file(".txt", &[0x66, 0xff, 0xfe, 0x67]);
        assert!(matches!(load_text(file.path()), Err(IngestError::Encoding(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = load_text(Path::new("/nonexistent/paper.txt")).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }

    #[test]
    fn test_markdown_bullets() {
        let file = temp_file(
            ".md",
            b"Body cites [1].\n\n## References\n\n- [1] Doe J. One. 2020.\n- [2] Lee K. Two. 2021.\n",
        );
        let doc = load_document(file.path(), None, &ReferenceParser::new()).unwrap();
        assert!(doc.references.starts_with("[1] Doe J."));
        assert!(doc.references.contains("\n[2] Lee K."));
        assert_eq!(doc.body, "Body cites [1].");
    }

    #[test]
    fn test_separate_references_file() {
        let body = temp_file(".txt", b"Body cites [1].\nReferences\nnot a list");
        let refs = temp_file(".txt", b"[1] Doe J. One. 2020.");
        let doc = load_document(body.path(), Some(refs.path()), &ReferenceParser::new()).unwrap();
        assert!(doc.body.contains("not a list"));
        assert_eq!(doc.references, "[1] Doe J. One. 2020.");
    }
}
