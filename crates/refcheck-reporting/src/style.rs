//! Best-effort reference formatting for rewritten reference lists.
//!
//! Only fields the entry actually carries are printed; nothing is
//! abbreviated or reordered beyond the style's field order.

use std::fmt;
use std::str::FromStr;

use refcheck_core::{Field, ReferenceEntry};

/// Citation styles the rewriter can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceStyle {
    #[default]
    Apa,
    Vancouver,
    Ieee,
    Harvard,
    Chicago,
}

impl ReferenceStyle {
    pub const ALL: [ReferenceStyle; 5] = [
        ReferenceStyle::Apa,
        ReferenceStyle::Vancouver,
        ReferenceStyle::Ieee,
        ReferenceStyle::Harvard,
        ReferenceStyle::Chicago,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceStyle::Apa => "apa",
            ReferenceStyle::Vancouver => "vancouver",
            ReferenceStyle::Ieee => "ieee",
            ReferenceStyle::Harvard => "harvard",
            ReferenceStyle::Chicago => "chicago",
        }
    }

    /// Render one entry. Falls back to the raw text when the entry has no
    /// parsed fields at all.
    pub fn format(&self, entry: &ReferenceEntry) -> String {
        let parts = Parts::of(entry);
        let text = match self {
            ReferenceStyle::Apa => join(
                [
                    parts.authors.clone(),
                    parts.year.as_ref().map(|y| format!("({})", y)),
                    parts.title.clone(),
                    parts.venue.clone(),
                    parts.volume_issue(),
                    parts.pages.clone(),
                    parts.publisher.clone(),
                    parts.locator.clone(),
                ],
                ". ",
            ),
            ReferenceStyle::Vancouver => {
                let mut issue_line = parts.year.clone().unwrap_or_default();
                if let Some(vi) = parts.volume_issue() {
                    issue_line.push(';');
                    issue_line.push_str(&vi);
                }
                if let Some(pages) = &parts.pages {
                    issue_line.push(':');
                    issue_line.push_str(pages);
                }
                join(
                    [
                        parts.authors.clone(),
                        parts.title.clone(),
                        parts.container(),
                        Some(issue_line),
                        parts.locator.clone(),
                    ],
                    ". ",
                )
            }
            ReferenceStyle::Ieee => join(
                [
                    parts.authors.clone(),
                    parts.title.as_ref().map(|t| format!("\"{}\"", t)),
                    parts.container(),
                    parts.volume.as_ref().map(|v| format!("vol. {}", v)),
                    parts.issue.as_ref().map(|i| format!("no. {}", i)),
                    parts.pages.as_ref().map(|p| format!("pp. {}", p)),
                    parts.year.clone(),
                    parts.locator.clone(),
                ],
                ", ",
            ),
            ReferenceStyle::Harvard => join(
                [
                    parts.authors.clone(),
                    parts.year.clone(),
                    parts.title.clone(),
                    parts.container(),
                    parts.volume_issue(),
                    parts.pages.clone(),
                    parts.locator.clone(),
                ],
                ", ",
            ),
            ReferenceStyle::Chicago => {
                let mut source = parts.container().unwrap_or_default();
                if let Some(vi) = parts.volume_issue() {
                    if !source.is_empty() {
                        source.push(' ');
                    }
                    source.push_str(&vi);
                }
                if let Some(pages) = &parts.pages {
                    if !source.is_empty() {
                        source.push_str(", ");
                    }
                    source.push_str(pages);
                }
                if let Some(year) = &parts.year {
                    if !source.is_empty() {
                        source.push(' ');
                    }
                    source.push_str(&format!("({})", year));
                }
                join(
                    [
                        parts.authors.clone(),
                        parts.title.as_ref().map(|t| format!("\"{}\"", t)),
                        Some(source),
                        parts.locator.clone(),
                    ],
                    ". ",
                )
            }
        };
        if text.is_empty() {
            entry.raw_text.trim().to_string()
        } else {
            text
        }
    }
}

impl fmt::Display for ReferenceStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "apa" => Ok(ReferenceStyle::Apa),
            "vancouver" => Ok(ReferenceStyle::Vancouver),
            "ieee" => Ok(ReferenceStyle::Ieee),
            "harvard" => Ok(ReferenceStyle::Harvard),
            "chicago" => Ok(ReferenceStyle::Chicago),
            other => Err(format!(
                "unknown reference style: {} (expected apa, vancouver, ieee, harvard or chicago)",
                other
            )),
        }
    }
}

/// Field values with trailing sentence punctuation removed. Authors keep
/// theirs so initials stay intact.
struct Parts {
    authors: Option<String>,
    year: Option<String>,
    title: Option<String>,
    venue: Option<String>,
    publisher: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    pages: Option<String>,
    locator: Option<String>,
}

impl Parts {
    fn of(entry: &ReferenceEntry) -> Self {
        let clean = |field: Field| {
            entry
                .value(field)
                .map(|v| v.trim().trim_end_matches(['.', ',', ';']).to_string())
                .filter(|v| !v.is_empty())
        };
        let locator = clean(Field::Doi)
            .map(|doi| {
                if doi.starts_with("http") {
                    doi
                } else {
                    format!("https://doi.org/{}", doi)
                }
            })
            .or_else(|| clean(Field::Url));
        Parts {
            authors: entry
                .value(Field::Authors)
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            year: clean(Field::Year),
            title: clean(Field::Title),
            venue: clean(Field::Venue),
            publisher: clean(Field::Publisher),
            volume: clean(Field::Volume),
            issue: clean(Field::Issue),
            pages: clean(Field::Pages),
            locator,
        }
    }

    fn container(&self) -> Option<String> {
        self.venue.clone().or_else(|| self.publisher.clone())
    }

    fn volume_issue(&self) -> Option<String> {
        match (&self.volume, &self.issue) {
            (Some(v), Some(i)) => Some(format!("{}({})", v, i)),
            (Some(v), None) => Some(v.clone()),
            (None, Some(i)) => Some(format!("({})", i)),
            (None, None) => None,
        }
    }
}

/// Join present parts. A part already ending in the separator's
/// punctuation (an initial's period) does not get it twice.
fn join<const N: usize>(parts: [Option<String>; N], sep: &str) -> String {
    let punct = sep.chars().next();
    let mut out = String::new();
    for part in parts.into_iter().flatten().filter(|p| !p.is_empty()) {
        if !out.is_empty() {
            if punct.is_some() && out.chars().last() == punct {
                out.push_str(&sep[1..]);
            } else {
                out.push_str(sep);
            }
        }
        out.push_str(&part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use refcheck_core::Author;

    fn article() -> ReferenceEntry {
        let mut e = ReferenceEntry::new("1", 1, "Doe J, Roe R. Sound results. J Good Sci. 2020;3(1):1-10.");
        e.authors = vec![
            Author::new("Doe", Some("J.".into())),
            Author::new("Roe", Some("R.".into())),
        ];
        e.year = Some(2020);
        e.title = Some("Sound results.".into());
        e.venue = Some("J Good Sci".into());
        e.volume = Some("3".into());
        e.issue = Some("1".into());
        e.pages = Some("1-10".into());
        e.doi = Some("10.1/good".into());
        e
    }

    #[test]
    fn test_apa() {
        assert_eq!(
            ReferenceStyle::Apa.format(&article()),
            "Doe, J.; Roe, R. (2020). Sound results. J Good Sci. 3(1). 1-10. https://doi.org/10.1/good"
        );
    }

    #[test]
    fn test_vancouver() {
        assert_eq!(
            ReferenceStyle::Vancouver.format(&article()),
            "Doe, J.; Roe, R. Sound results. J Good Sci. 2020;3(1):1-10. https://doi.org/10.1/good"
        );
    }

    #[test]
    fn test_ieee_and_chicago() {
        assert_eq!(
            ReferenceStyle::Ieee.format(&article()),
            "Doe, J.; Roe, R., \"Sound results\", J Good Sci, vol. 3, no. 1, pp. 1-10, 2020, https://doi.org/10.1/good"
        );
        assert_eq!(
            ReferenceStyle::Chicago.format(&article()),
            "Doe, J.; Roe, R. \"Sound results\". J Good Sci 3(1), 1-10 (2020). https://doi.org/10.1/good"
        );
    }

    #[test]
    fn test_absent_fields_are_skipped() {
        let mut e = ReferenceEntry::new("2", 2, "Lee K. Notes. 2019.");
        e.authors = vec![Author::new("Lee", Some("K.".into()))];
        e.title = Some("Notes".into());
        e.url = Some("https://example.org/notes".into());
        assert_eq!(
            ReferenceStyle::Harvard.format(&e),
            "Lee, K., Notes, https://example.org/notes"
        );
    }

    #[test]
    fn test_unparsed_entry_keeps_raw_text() {
        let e = ReferenceEntry::new("3", 3, "  Something we could not parse  ");
        assert_eq!(ReferenceStyle::Apa.format(&e), "Something we could not parse");
    }

    #[test]
    fn test_style_names() {
        for style in ReferenceStyle::ALL {
            assert_eq!(style.as_str().parse::<ReferenceStyle>().unwrap(), style);
        }
        assert!("mla".parse::<ReferenceStyle>().is_err());
    }
}
