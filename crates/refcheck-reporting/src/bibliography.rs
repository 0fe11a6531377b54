//! BibTeX, RIS and EndNote renderings of reference entries.
//!
//! Absent fields are omitted, never written empty.

use std::collections::HashMap;

use refcheck_core::authors::family_key;
use refcheck_core::{Author, EntryType, ReferenceEntry};

fn bibtex_type(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::JournalArticle => "article",
        EntryType::Book => "book",
        EntryType::BookChapter => "incollection",
        EntryType::ConferencePaper => "inproceedings",
        EntryType::Preprint | EntryType::Website | EntryType::Dataset => "misc",
    }
}

fn ris_type(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::JournalArticle => "JOUR",
        EntryType::Book => "BOOK",
        EntryType::BookChapter => "CHAP",
        EntryType::ConferencePaper => "CONF",
        EntryType::Website => "ELEC",
        EntryType::Dataset => "DATA",
        EntryType::Preprint => "UNPB",
    }
}

fn endnote_type(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::JournalArticle => "Journal Article",
        EntryType::Book => "Book",
        EntryType::BookChapter => "Book Section",
        EntryType::ConferencePaper => "Conference Paper",
        EntryType::Website => "Web Page",
        EntryType::Dataset => "Dataset",
        EntryType::Preprint => "Unpublished Work",
    }
}

/// Split `"123-130"` (any dash) into first and last page.
fn page_range(pages: &str) -> (&str, Option<&str>) {
    match pages.split_once(['-', '\u{2013}', '\u{2014}']) {
        Some((first, last)) => {
            let last = last.trim_start_matches(['-', '\u{2013}', '\u{2014}']).trim();
            (first.trim(), (!last.is_empty()).then_some(last))
        }
        None => (pages.trim(), None),
    }
}

// ── BibTeX ──

/// Escape TeX specials in free text. Braces become `\{` `\}` so an
/// unbalanced title cannot break the entry.
pub fn bibtex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '{' | '}' | '&' | '%' | '$' | '#' | '_' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Identifiers keep their characters; only braces need escaping.
fn bibtex_escape_verbatim(s: &str) -> String {
    s.replace('{', "\\{").replace('}', "\\}")
}

/// Citation keys: `family + year` (`doe2021`), `ref<label>` without an
/// author. Collisions get `a`, `b`, ... in list order, so keys are stable
/// for a given list.
pub fn bibtex_keys(entries: &[ReferenceEntry]) -> Vec<String> {
    let bases: Vec<String> = entries
        .iter()
        .map(|e| {
            let family = e.first_author().map(|a| family_key(&a.family)).unwrap_or_default();
            if family.is_empty() {
                let label: String = e
                    .label
                    .as_str()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect();
                format!("ref{}", label)
            } else {
                let year = e.year.map(|y| y.to_string()).unwrap_or_else(|| "nd".into());
                format!("{}{}", family, year)
            }
        })
        .collect();

    let mut totals: HashMap<&str, usize> = HashMap::new();
    for base in &bases {
        *totals.entry(base.as_str()).or_insert(0) += 1;
    }
    let mut seen: HashMap<&str, usize> = HashMap::new();
    bases
        .iter()
        .map(|base| {
            if totals[base.as_str()] == 1 {
                return base.clone();
            }
            let n = seen.entry(base.as_str()).or_insert(0);
            let suffix = suffix_for(*n);
            *n += 1;
            format!("{}{}", base, suffix)
        })
        .collect()
}

/// `0 → a`, `25 → z`, `26 → aa`.
fn suffix_for(mut n: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push((b'a' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    out.iter().rev().collect()
}

fn bibtex_entry(entry: &ReferenceEntry, key: &str) -> String {
    let entry_type = entry.effective_type();
    let mut fields: Vec<(&str, String)> = Vec::new();

    if !entry.authors.is_empty() {
        let names: Vec<String> = entry.authors.iter().map(Author::display_name).collect();
        fields.push(("author", bibtex_escape(&names.join(" and "))));
    }
    if let Some(title) = &entry.title {
        fields.push(("title", bibtex_escape(title)));
    }
    if let Some(venue) = &entry.venue {
        let name = match entry_type {
            EntryType::JournalArticle => "journal",
            EntryType::BookChapter | EntryType::ConferencePaper => "booktitle",
            EntryType::Book => "series",
            _ => "howpublished",
        };
        fields.push((name, bibtex_escape(venue)));
    }
    if let Some(year) = entry.value(refcheck_core::Field::Year) {
        fields.push(("year", year));
    }
    if let Some(publisher) = &entry.publisher {
        fields.push(("publisher", bibtex_escape(publisher)));
    }
    if let Some(volume) = &entry.volume {
        fields.push(("volume", bibtex_escape(volume)));
    }
    if let Some(issue) = &entry.issue {
        fields.push(("number", bibtex_escape(issue)));
    }
    if let Some(pages) = &entry.pages {
        let value = match page_range(pages) {
            (first, Some(last)) => format!("{}--{}", first, last),
            (first, None) => first.to_string(),
        };
        fields.push(("pages", bibtex_escape(&value)));
    }
    if let Some(doi) = &entry.doi {
        fields.push(("doi", bibtex_escape_verbatim(doi)));
    }
    if let Some(url) = &entry.url {
        fields.push(("url", bibtex_escape_verbatim(url)));
    }
    if let Some(isbn) = &entry.isbn {
        fields.push(("isbn", bibtex_escape_verbatim(isbn)));
    }

    let mut out = format!("@{}{{{},\n", bibtex_type(entry_type), key);
    for (name, value) in fields {
        out.push_str(&format!("  {} = {{{}}},\n", name, value));
    }
    out.push('}');
    out
}

pub fn to_bibtex(entries: &[ReferenceEntry]) -> String {
    let keys = bibtex_keys(entries);
    let mut out = String::new();
    for (entry, key) in entries.iter().zip(&keys) {
        out.push_str(&bibtex_entry(entry, key));
        out.push_str("\n\n");
    }
    out
}

// ── RIS ──

fn ris_record(entry: &ReferenceEntry) -> String {
    let mut lines = vec![format!("TY  - {}", ris_type(entry.effective_type()))];
    let mut tag = |t: &str, v: &str| lines.push(format!("{}  - {}", t, v));

    for author in &entry.authors {
        tag("AU", &author.display_name());
    }
    if let Some(title) = &entry.title {
        tag("TI", title);
    }
    if let Some(venue) = &entry.venue {
        tag("T2", venue);
    }
    if let Some(year) = entry.year {
        tag("PY", &year.to_string());
    }
    if let Some(publisher) = &entry.publisher {
        tag("PB", publisher);
    }
    if let Some(volume) = &entry.volume {
        tag("VL", volume);
    }
    if let Some(issue) = &entry.issue {
        tag("IS", issue);
    }
    if let Some(pages) = &entry.pages {
        let (first, last) = page_range(pages);
        tag("SP", first);
        if let Some(last) = last {
            tag("EP", last);
        }
    }
    if let Some(doi) = &entry.doi {
        tag("DO", doi);
    }
    if let Some(url) = &entry.url {
        tag("UR", url);
    }
    if let Some(isbn) = &entry.isbn {
        tag("SN", isbn);
    }
    lines.push("ER  - ".to_string());
    lines.join("\n")
}

pub fn to_ris(entries: &[ReferenceEntry]) -> String {
    entries
        .iter()
        .map(|e| ris_record(e) + "\n")
        .collect::<Vec<_>>()
        .join("\n")
}

// ── EndNote (tagged import format) ──

fn endnote_record(entry: &ReferenceEntry) -> String {
    let entry_type = entry.effective_type();
    let mut lines = vec![format!("%0 {}", endnote_type(entry_type))];
    let mut tag = |t: &str, v: &str| lines.push(format!("{} {}", t, v));

    for author in &entry.authors {
        tag("%A", &author.display_name());
    }
    if let Some(title) = &entry.title {
        tag("%T", title);
    }
    if let Some(venue) = &entry.venue {
        let t = match entry_type {
            EntryType::JournalArticle => "%J",
            _ => "%B",
        };
        tag(t, venue);
    }
    if let Some(year) = entry.year {
        tag("%D", &year.to_string());
    }
    if let Some(publisher) = &entry.publisher {
        tag("%I", publisher);
    }
    if let Some(volume) = &entry.volume {
        tag("%V", volume);
    }
    if let Some(issue) = &entry.issue {
        tag("%N", issue);
    }
    if let Some(pages) = &entry.pages {
        tag("%P", pages);
    }
    if let Some(doi) = &entry.doi {
        tag("%R", doi);
    }
    if let Some(url) = &entry.url {
        tag("%U", url);
    }
    if let Some(isbn) = &entry.isbn {
        tag("%@", isbn);
    }
    lines.join("\n")
}

pub fn to_endnote(entries: &[ReferenceEntry]) -> String {
    entries
        .iter()
        .map(|e| endnote_record(e) + "\n")
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal() -> ReferenceEntry {
        let mut e = ReferenceEntry::new("1", 1, "raw");
        e.authors = vec![
            Author::new("Doe", Some("J.".into())),
            Author::new("Lee", Some("K.".into())),
        ];
        e.title = Some("Costs & {benefits} of 50% more".into());
        e.year = Some(2021);
        e.venue = Some("Journal of Things".into());
        e.volume = Some("10".into());
        e.issue = Some("2".into());
        e.pages = Some("123\u{2013}130".into());
        e.doi = Some("10.1234/x_y".into());
        e.entry_type = Some(EntryType::JournalArticle);
        e
    }

    fn chapter() -> ReferenceEntry {
        let mut e = ReferenceEntry::new("2", 2, "raw");
        e.authors = vec![Author::new("Roe", None)];
        e.title = Some("A chapter".into());
        e.year = Some(2019);
        e.venue = Some("In Handbook of Stuff".into());
        e.publisher = Some("Acme Press".into());
        e.entry_type = Some(EntryType::BookChapter);
        e
    }

    #[test]
    fn test_page_range() {
        assert_eq!(page_range("123-130"), ("123", Some("130")));
        assert_eq!(page_range("123--130"), ("123", Some("130")));
        assert_eq!(page_range("e1234"), ("e1234", None));
    }

    #[test]
    fn test_bibtex_escape() {
        assert_eq!(bibtex_escape("A & B {x} 5%"), "A \\& B \\{x\\} 5\\%");
    }

    #[test]
    fn test_bibtex_article() {
        let bib = to_bibtex(&[journal()]);
        assert!(bib.starts_with("@article{doe2021,\n"));
        assert!(bib.contains("  author = {Doe, J. and Lee, K.},\n"));
        assert!(bib.contains("  title = {Costs \\& \\{benefits\\} of 50\\% more},\n"));
        assert!(bib.contains("  journal = {Journal of Things},\n"));
        assert!(bib.contains("  pages = {123--130},\n"));
        assert!(bib.contains("  doi = {10.1234/x_y},\n"));
        assert!(!bib.contains("publisher"));
        assert!(bib.trim_end().ends_with('}'));
    }

    #[test]
    fn test_bibtex_chapter_uses_booktitle() {
        let bib = to_bibtex(&[chapter()]);
        assert!(bib.starts_with("@incollection{roe2019,"));
        assert!(bib.contains("booktitle = {In Handbook of Stuff}"));
        assert!(bib.contains("publisher = {Acme Press}"));
    }

    #[test]
    fn test_bibtex_keys_disambiguate() {
        let mut second = journal();
        second.label = refcheck_core::ReferenceLabel::new("2");
        let mut anonymous = ReferenceEntry::new("[3]", 3, "raw");
        anonymous.title = Some("No author".into());
        let keys = bibtex_keys(&[journal(), chapter(), second, anonymous]);
        assert_eq!(keys, vec!["doe2021a", "roe2019", "doe2021b", "ref3"]);
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(suffix_for(0), "a");
        assert_eq!(suffix_for(25), "z");
        assert_eq!(suffix_for(26), "aa");
    }

    #[test]
    fn test_ris_record() {
        let ris = to_ris(&[journal(), chapter()]);
        let records: Vec<&str> = ris.split("\n\n").collect();
        assert_eq!(records.len(), 2);
        assert!(records[0].starts_with("TY  - JOUR\nAU  - Doe, J.\nAU  - Lee, K.\n"));
        assert!(records[0].contains("SP  - 123\nEP  - 130"));
        assert!(records[0].contains("DO  - 10.1234/x_y"));
        assert!(records[0].trim_end().ends_with("ER  -"));
        assert!(records[1].starts_with("TY  - CHAP"));
        assert!(records[1].contains("PB  - Acme Press"));
    }

    #[test]
    fn test_endnote_record() {
        let enw = to_endnote(&[journal(), chapter()]);
        assert!(enw.starts_with("%0 Journal Article\n%A Doe, J.\n%A Lee, K.\n%T "));
        assert!(enw.contains("%J Journal of Things"));
        assert!(enw.contains("%0 Book Section"));
        assert!(enw.contains("%B In Handbook of Stuff"));
        assert!(enw.contains("%P 123\u{2013}130"));
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(to_bibtex(&[]), "");
        assert_eq!(to_ris(&[]), "");
        assert_eq!(to_endnote(&[]), "");
    }
}
