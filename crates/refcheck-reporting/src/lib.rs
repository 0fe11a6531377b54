//! Exporters for validation reports, (enriched) reference lists and
//! updated manuscripts.

use std::fmt;
use std::str::FromStr;

pub mod bibliography;
pub mod docx;
pub mod export;
pub mod style;

pub use docx::{ListParagraph, reference_paragraphs, rewrite_docx, write_updated_docx};
pub use export::{export_report, render};
pub use style::ReferenceStyle;

/// Output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Full report: issues, matches, citations and entries.
    Json,
    Bibtex,
    Ris,
    EndNote,
    /// Human-readable issue summary.
    Text,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Json,
        ExportFormat::Bibtex,
        ExportFormat::Ris,
        ExportFormat::EndNote,
        ExportFormat::Text,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Bibtex => "bib",
            ExportFormat::Ris => "ris",
            ExportFormat::EndNote => "enw",
            ExportFormat::Text => "txt",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Bibtex => "bibtex",
            ExportFormat::Ris => "ris",
            ExportFormat::EndNote => "endnote",
            ExportFormat::Text => "text",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "bibtex" | "bib" => Ok(ExportFormat::Bibtex),
            "ris" => Ok(ExportFormat::Ris),
            "endnote" | "enw" => Ok(ExportFormat::EndNote),
            "text" | "txt" => Ok(ExportFormat::Text),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names_round_trip() {
        for format in ExportFormat::ALL {
            assert_eq!(format.as_str().parse::<ExportFormat>(), Ok(format));
            assert_eq!(format.extension().parse::<ExportFormat>(), Ok(format));
        }
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
