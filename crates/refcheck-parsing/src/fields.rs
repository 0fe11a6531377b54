//! Field extraction as an ordered table of named rules.
//!
//! Every rule sees the raw entry text and the residual text (locators and
//! access notes already removed) and returns an optional typed value. Rules
//! are independent: adding one means adding a row to [`FIELD_RULES`].

use once_cell::sync::Lazy;
use regex::Regex;

use refcheck_core::{Author, EntryType, ReferenceEntry};

use crate::authors::{SegmentedAuthors, segment_authors};
use crate::config::ParsingConfig;

/// Input handed to every rule.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub raw: &'a str,
    pub residual: &'a str,
    pub config: &'a ParsingConfig,
}

/// Author, title and venue segments of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments {
    pub authors: Vec<Author>,
    /// The author block was a dash run meaning "same authors as the entry above".
    pub same_as_previous: bool,
    pub title: Option<String>,
    pub venue: Option<String>,
}

/// Typed output of a field rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Doi(String),
    Url(String),
    Isbn(String),
    Year { year: u16, suffix: Option<char> },
    VolumeIssue { volume: Option<String>, issue: Option<String> },
    Pages(String),
    Publisher(String),
    Segments(Segments),
    TypeHint(EntryType),
}

/// A named field extraction rule.
pub struct FieldRule {
    pub name: &'static str,
    pub extract: fn(&RuleInput<'_>) -> Option<FieldValue>,
}

/// Field rules in evaluation order.
pub static FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        name: "doi",
        extract: doi_rule,
    },
    FieldRule {
        name: "url",
        extract: url_rule,
    },
    FieldRule {
        name: "isbn",
        extract: isbn_rule,
    },
    FieldRule {
        name: "year",
        extract: year_rule,
    },
    FieldRule {
        name: "volume_issue",
        extract: volume_issue_rule,
    },
    FieldRule {
        name: "pages",
        extract: pages_rule,
    },
    FieldRule {
        name: "publisher",
        extract: publisher_rule,
    },
    FieldRule {
        name: "segments",
        extract: segments_rule,
    },
    FieldRule {
        name: "type_hint",
        extract: type_hint_rule,
    },
];

/// Store a rule's value on the entry. Only absent fields are set, and
/// blank strings are never stored.
pub fn apply(entry: &mut ReferenceEntry, value: FieldValue) {
    fn set(slot: &mut Option<String>, value: String) {
        let value = value.trim();
        if slot.is_none() && !value.is_empty() {
            *slot = Some(value.to_string());
        }
    }
    match value {
        FieldValue::Doi(v) => set(&mut entry.doi, v),
        FieldValue::Url(v) => set(&mut entry.url, v),
        FieldValue::Isbn(v) => set(&mut entry.isbn, v),
        FieldValue::Year { year, suffix } => {
            if entry.year.is_none() {
                entry.year = Some(year);
                entry.year_suffix = suffix;
            }
        }
        FieldValue::VolumeIssue { volume, issue } => {
            if let Some(v) = volume {
                set(&mut entry.volume, v);
            }
            if let Some(i) = issue {
                set(&mut entry.issue, i);
            }
        }
        FieldValue::Pages(v) => set(&mut entry.pages, v),
        FieldValue::Publisher(v) => set(&mut entry.publisher, v),
        FieldValue::Segments(s) => {
            if entry.authors.is_empty() {
                entry.authors = s.authors;
            }
            if let Some(t) = s.title {
                set(&mut entry.title, t);
            }
            if let Some(v) = s.venue {
                set(&mut entry.venue, v);
            }
        }
        FieldValue::TypeHint(t) => {
            if entry.type_hint.is_none() {
                entry.type_hint = Some(t);
            }
        }
    }
}

// ── Locators ──

static DOI_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://(?:dx\.)?doi\.org/(10\.\d{4,9}/[^\s\]>},]+)").unwrap()
});

static DOI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"10\.\d{4,9}/[^\s\]>},]+").unwrap());

static DOI_HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://(?:dx\.)?doi\.org/").unwrap());

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bhttps?://[^\s<>]+").unwrap());

static ISBN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bISBN(?:-1[03])?:?\s*((?:97[89][-\s]?)?(?:\d[-\s]?){9}[\dX])\b").unwrap()
});

/// Everything the residual text drops: DOIs with their prefixes, URLs,
/// ISBNs and access notes.
static RESIDUAL_STRIP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        https?://\S+
        | \bdoi:?\s*10\.\d{4,9}/\S+
        | \b10\.\d{4,9}/\S+
        | \bISBN(?:-1[03])?:?\s*[\dX][\dX\-\s]{8,16}[\dX]
        | \[(?:online|internet|dataset|data\s+set|preprint|cited[^\]]*)\]
        | \b(?:available\s+(?:from|at|online)|retrieved\s+from)\s*:?
        | \baccessed:?\s+(?:on\s+)?[\w\s,.\-]*?\d{4}\.?
        ",
    )
    .unwrap()
});

static SPACE_BEFORE_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([.,;:])").unwrap());
static REPEATED_PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.,;:])(?:\s+[.,;:])+").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse whitespace runs to single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    WS_RE.replace_all(text.trim(), " ").into_owned()
}

/// Entry text with DOIs, URLs, ISBNs and access notes removed.
pub fn residual_text(raw: &str) -> String {
    let stripped = RESIDUAL_STRIP_RE.replace_all(raw, " ");
    let stripped = normalize_whitespace(&stripped);
    let stripped = REPEATED_PUNCT_RE.replace_all(&stripped, "$1");
    let stripped = SPACE_BEFORE_PUNCT_RE.replace_all(&stripped, "$1");
    stripped
        .trim()
        .trim_start_matches(['.', ',', ';', ':'])
        .trim()
        .to_string()
}

/// Strip unbalanced trailing brackets and trailing punctuation from a DOI.
pub fn clean_doi(doi: &str) -> String {
    let mut doi = doi.trim_end_matches(['.', ',', ';', ':']);
    loop {
        let before = doi.len();
        for (open, close) in [('(', ')'), ('[', ']'), ('{', '}')] {
            if doi.ends_with(close) && doi.matches(close).count() > doi.matches(open).count() {
                doi = &doi[..doi.len() - 1];
                doi = doi.trim_end_matches(['.', ',', ';', ':']);
            }
        }
        if doi.len() == before {
            break;
        }
    }
    doi.to_string()
}

fn clean_url(url: &str) -> String {
    let mut url = url.trim_end_matches(['.', ',', ';', ':', '>']);
    while url.ends_with(')') && url.matches(')').count() > url.matches('(').count() {
        url = url[..url.len() - 1].trim_end_matches(['.', ',', ';', ':']);
    }
    url.to_string()
}

/// DOI from a `doi.org` URL, `doi:` prefix or bare `10.xxxx/...` token.
fn doi_rule(input: &RuleInput<'_>) -> Option<FieldValue> {
    if let Some(caps) = DOI_URL_RE.captures(input.raw) {
        return Some(FieldValue::Doi(clean_doi(&caps[1])));
    }
    DOI_RE
        .find(input.raw)
        .map(|m| FieldValue::Doi(clean_doi(m.as_str())))
}

/// First scheme-prefixed URL that is not a DOI resolver link.
fn url_rule(input: &RuleInput<'_>) -> Option<FieldValue> {
    URL_RE
        .find_iter(input.raw)
        .map(|m| clean_url(m.as_str()))
        .find(|u| !DOI_HOST_RE.is_match(u))
        .map(FieldValue::Url)
}

/// ISBN-10 or ISBN-13, stored without separators.
fn isbn_rule(input: &RuleInput<'_>) -> Option<FieldValue> {
    let caps = ISBN_RE.captures(input.raw)?;
    let digits: String = caps[1]
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if digits.len() == 10 || digits.len() == 13 {
        Some(FieldValue::Isbn(digits))
    } else {
        None
    }
}

// ── Year, volume, pages ──

static PAREN_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*(\d{4})([a-z])?(?:,[^)]*)?\s*\)").unwrap());

static YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\d\-\u{2013}/.])(\d{4})([a-z])?(?:$|[^\d\-\u{2013}\p{L}])").unwrap()
});

/// Four-digit values that still read as a (mistyped) year when nothing
/// plausible is found.
const YEAR_SHAPED: std::ops::RangeInclusive<u16> = 1000..=2999;

/// Publication year: a parenthesized year wins, otherwise the first
/// standalone 4-digit token within the plausible range. Page ranges such as
/// `1999-2005` are not years.
///
/// When no candidate is plausible, an out-of-range year in year position
/// (parenthesized, or followed by `;`, `.`, `,` or the end) is still kept so
/// the range check can report it instead of a missing year.
fn year_rule(input: &RuleInput<'_>) -> Option<FieldValue> {
    let range = input.config.year_range();
    let to_value = |caps: &regex::Captures<'_>| -> Option<(u16, FieldValue)> {
        let year: u16 = caps[1].parse().ok()?;
        let suffix = caps.get(2).and_then(|m| m.as_str().chars().next());
        Some((year, FieldValue::Year { year, suffix }))
    };
    let plausible = |caps: regex::Captures<'_>| -> Option<FieldValue> {
        let (year, value) = to_value(&caps)?;
        range.contains(&year).then_some(value)
    };
    let found = PAREN_YEAR_RE
        .captures_iter(input.residual)
        .find_map(plausible)
        .or_else(|| YEAR_RE.captures_iter(input.residual).find_map(plausible));
    if found.is_some() {
        return found;
    }

    let year_shaped = |caps: &regex::Captures<'_>| -> Option<FieldValue> {
        let (year, value) = to_value(caps)?;
        YEAR_SHAPED.contains(&year).then_some(value)
    };
    PAREN_YEAR_RE
        .captures_iter(input.residual)
        .find_map(|caps| year_shaped(&caps))
        .or_else(|| {
            YEAR_RE.captures_iter(input.residual).find_map(|caps| {
                let whole = caps.get(0)?.as_str();
                let in_year_position = whole.ends_with(|c: char| c.is_ascii_digit() || c.is_ascii_lowercase())
                    || whole.ends_with([';', '.', ',']);
                if in_year_position { year_shaped(&caps) } else { None }
            })
        })
        .inspect(|value| tracing::debug!(?value, "kept out-of-range year"))
}

static VOL_ISSUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s,;:])(\d{1,5})\s*\(([\w\-\u{2013}/ ]{1,12})\)").unwrap()
});
static VOL_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bvol(?:ume)?\.?\s*(\d+[A-Za-z]?)").unwrap());
static ISSUE_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:no|nr|issue|iss)\.?\s*(\d+[A-Za-z]?)").unwrap());
static VOL_BEFORE_PAGES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r",\s*(\d{1,4}),\s*(?:pp?\.\s*)?[A-Za-z]?\d+\s*[-\u{2013}\u{2014}]").unwrap()
});

/// `10(2)`, `vol. 10, no. 2`, or a bare volume before a page range
/// (`Journal, 10, 1-9`).
fn volume_issue_rule(input: &RuleInput<'_>) -> Option<FieldValue> {
    let text = input.residual;
    for caps in VOL_ISSUE_RE.captures_iter(text) {
        let issue = caps[2].trim();
        // "2020 (3)" or "12 (2020)" are dates, not volume/issue
        let is_year = |s: &str| s.len() == 4 && s.chars().all(|c| c.is_ascii_digit());
        if is_year(issue) || is_year(&caps[1]) {
            continue;
        }
        return Some(FieldValue::VolumeIssue {
            volume: Some(caps[1].to_string()),
            issue: Some(issue.to_string()),
        });
    }

    let volume = VOL_WORD_RE.captures(text).map(|c| c[1].to_string());
    let issue = ISSUE_WORD_RE.captures(text).map(|c| c[1].to_string());
    if volume.is_some() || issue.is_some() {
        return Some(FieldValue::VolumeIssue { volume, issue });
    }

    VOL_BEFORE_PAGES_RE
        .captures(text)
        .map(|c| FieldValue::VolumeIssue {
            volume: Some(c[1].to_string()),
            issue: None,
        })
}

static PAGES_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bpp?\.\s*([A-Za-z]?\d+)(?:\s*[-\u{2013}\u{2014}]+\s*([A-Za-z]?\d+))?",
    )
    .unwrap()
});
static PAGES_COLON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":\s*([A-Za-z]?\d+)\s*[-\u{2013}\u{2014}]+\s*([A-Za-z]?\d+)").unwrap()
});
static PAGES_BARE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:^|[\s,;(])([A-Za-z]?\d+)\s*[-\u{2013}\u{2014}]+\s*([A-Za-z]?\d+)(?:$|[\s.,;)])",
    )
    .unwrap()
});

fn page_number(s: &str) -> Option<u32> {
    s.trim_start_matches(|c: char| c.is_ascii_alphabetic()).parse().ok()
}

/// Page range normalized to a hyphen: `pp. 1–9`, `:123-130`, `, 1–9`.
fn pages_rule(input: &RuleInput<'_>) -> Option<FieldValue> {
    let text = input.residual;
    if let Some(caps) = PAGES_PREFIX_RE.captures(text) {
        return Some(FieldValue::Pages(match caps.get(2) {
            Some(end) => format!("{}-{}", &caps[1], end.as_str()),
            None => caps[1].to_string(),
        }));
    }
    let range = input.config.year_range();
    let plausible = |a: &str, b: &str| -> bool {
        let (Some(x), Some(y)) = (page_number(a), page_number(b)) else {
            return false;
        };
        // 2019-2020 reads as a span of years
        let looks_like_years = a.len() == 4
            && b.len() == 4
            && range.contains(&(x as u16))
            && range.contains(&(y as u16));
        x <= y && !looks_like_years
    };
    PAGES_COLON_RE
        .captures_iter(text)
        .chain(PAGES_BARE_RE.captures_iter(text))
        .find(|c| plausible(&c[1], &c[2]))
        .map(|c| FieldValue::Pages(format!("{}-{}", &c[1], &c[2])))
}

// ── Publisher ──

static SEGMENT_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\s+|;\s*").unwrap());

/// Whether a segment names a publisher.
pub fn is_publisher_segment(segment: &str, config: &ParsingConfig) -> bool {
    let lower = segment.to_lowercase();
    if lower.split_whitespace().count() > 8 {
        return false;
    }
    config.publisher_tokens().iter().any(|token| {
        lower
            .match_indices(token.as_str())
            .any(|(i, _)| is_word_boundary(&lower, i, i + token.len()))
    })
}

fn is_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

/// The last short segment carrying a publisher token, minus any leading
/// place of publication (`New York: Springer` → `Springer`).
fn publisher_rule(input: &RuleInput<'_>) -> Option<FieldValue> {
    let candidate = SEGMENT_SPLIT_RE
        .split(input.residual)
        .map(|s| s.trim().trim_end_matches(['.', ',']).trim())
        .filter(|s| !s.is_empty() && !s.starts_with("In ") && !s.starts_with("In:"))
        .filter(|s| is_publisher_segment(s, input.config))
        .last()?;
    let name = match candidate.rsplit_once(':') {
        Some((_, name)) if !name.trim().is_empty() => name.trim(),
        _ => candidate,
    };
    // "Springer (2020)" / "Wiley, 2019"
    let name = name
        .split(" (")
        .next()
        .unwrap_or(name)
        .trim_end_matches(|c: char| c.is_ascii_digit() || c == ',' || c == ' ');
    if name.is_empty() {
        None
    } else {
        Some(FieldValue::Publisher(name.to_string()))
    }
}

// ── Authors, title, venue ──

static LEADING_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\s.,:;]*(?:\(\s*(?:\d{4}[a-z]?|n\.\s?d\.)(?:,[^)]*)?\s*\)|\d{4}[a-z]?|n\.\s?d\.)[\s.,:;]*")
        .unwrap()
});

static VENUE_STOP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\(\s*pp?\.|\bpp?\.\s*\d|\bvol(?:ume)?\.?\s*\d|\bno\.\s*\d|[,;:]\s*\d|\d+\s*\(|\b(?:1[4-9]|20)\d{2}[a-z]?\b",
    )
    .unwrap()
});

/// Lowercase abbreviations that never end a sentence.
const MID_SENTENCE_ABBREVIATIONS: &[&str] = &["vs", "e.g", "i.e", "cf", "al", "fig", "eq", "no", "vol", "pp", "ed", "eds"];

/// Journal abbreviations longer than four letters.
const VENUE_ABBREVIATIONS: &[&str] = &[
    "comput", "assoc", "mater", "biochem", "physiol", "environ", "psychol", "neurosci",
    "sociol", "educ", "behav", "intell", "struct", "technol", "commun", "mech", "chem",
];

/// Byte index where the first sentence of `text` ends (exclusive), keeping a
/// trailing `?` or `!`. In venue mode short capitalized words (`Proc.`,
/// `Rev.`) count as abbreviations too.
pub fn sentence_end(text: &str, venue_mode: bool) -> usize {
    for (i, c) in text.char_indices() {
        if !matches!(c, '.' | '?' | '!') {
            continue;
        }
        let next = text[i + 1..].chars().next();
        if !next.map_or(true, char::is_whitespace) {
            continue;
        }
        if c != '.' {
            return i + 1;
        }
        let word_start = text[..i]
            .rfind(|ch: char| ch.is_whitespace() || ch == '(')
            .map_or(0, |p| p + 1);
        let word = &text[word_start..i];
        let lower = word.to_lowercase();
        let is_initial = word.chars().count() == 1 && word.chars().all(char::is_uppercase);
        if is_initial || MID_SENTENCE_ABBREVIATIONS.contains(&lower.as_str()) {
            continue;
        }
        if venue_mode {
            let short_cap = word.chars().count() <= 4
                && word.chars().next().is_some_and(char::is_uppercase)
                && word.chars().all(char::is_alphabetic);
            if short_cap || VENUE_ABBREVIATIONS.contains(&lower.as_str()) {
                continue;
            }
        }
        return i;
    }
    text.len()
}

fn has_letters(s: &str) -> bool {
    s.chars().any(char::is_alphabetic)
}

fn trim_segment(s: &str) -> &str {
    s.trim()
        .trim_start_matches(['.', ',', ';', ':'])
        .trim_end_matches(['.', ',', ';', ':'])
        .trim()
}

fn split_title(rest: &str) -> (Option<String>, &str) {
    let rest = rest.trim_start();
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\u{2018}', '\u{2019}')] {
        if let Some(inner) = rest.strip_prefix(open) {
            if let Some(end) = inner.find(close) {
                let title = trim_segment(&inner[..end]);
                let after = &inner[end + close.len_utf8()..];
                return (has_letters(title).then(|| title.to_string()), after);
            }
        }
    }
    let end = sentence_end(rest, false);
    let title = trim_segment(&rest[..end]);
    let after = rest.get(end + 1..).unwrap_or("");
    (has_letters(title).then(|| title.to_string()), after)
}

fn split_venue(rest: &str, config: &ParsingConfig) -> Option<String> {
    let rest = trim_segment(rest);
    let mut end = sentence_end(rest, true);
    if let Some(m) = VENUE_STOP_RE.find(rest) {
        end = end.min(m.start());
    }
    let venue = trim_segment(&rest[..end]);
    if !has_letters(venue) {
        return None;
    }
    let venue = match venue.strip_prefix("in ") {
        Some(tail) => format!("In {}", tail),
        None => venue.to_string(),
    };
    let chapter_like = venue.starts_with("In ") || venue.starts_with("In:");
    if !chapter_like && is_publisher_segment(&venue, config) {
        return None;
    }
    Some(venue)
}

/// Author block, then title (quoted text or the next sentence), then venue.
fn segments_rule(input: &RuleInput<'_>) -> Option<FieldValue> {
    let text = input.residual;
    if text.is_empty() {
        return None;
    }
    let SegmentedAuthors {
        authors,
        same_as_previous,
        rest,
    } = segment_authors(text, input.config.max_authors);

    let rest = LEADING_YEAR_RE.replace(rest, "");
    let (title, after_title) = split_title(&rest);
    let venue = split_venue(after_title, input.config);

    // A title that is just the publisher (book with no separate title found)
    let title = title.filter(|t| !is_publisher_segment(t, input.config) || venue.is_some());

    Some(FieldValue::Segments(Segments {
        authors,
        same_as_previous,
        title,
        venue,
    }))
}

static TYPE_HINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\[(dataset|data\s+set|preprint|internet|conference\s+(?:paper|presentation))\]|\b(available\s+from):",
    )
    .unwrap()
});

/// Explicit type markers: `[Dataset]`, `[Preprint]`, `[Internet]`,
/// `Available from:`.
fn type_hint_rule(input: &RuleInput<'_>) -> Option<FieldValue> {
    let caps = TYPE_HINT_RE.captures(input.raw)?;
    let marker = caps
        .get(1)
        .or_else(|| caps.get(2))?
        .as_str()
        .to_lowercase();
    let hint = if marker.starts_with("data") {
        EntryType::Dataset
    } else if marker == "preprint" {
        EntryType::Preprint
    } else if marker.starts_with("conference") {
        EntryType::ConferencePaper
    } else {
        EntryType::Website
    };
    Some(FieldValue::TypeHint(hint))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(rule: fn(&RuleInput<'_>) -> Option<FieldValue>, raw: &str) -> Option<FieldValue> {
        let config = ParsingConfig::default();
        let residual = residual_text(raw);
        rule(&RuleInput {
            raw,
            residual: &residual,
            config: &config,
        })
    }

    fn segments(raw: &str) -> Segments {
        match run(segments_rule, raw) {
            Some(FieldValue::Segments(s)) => s,
            other => panic!("expected segments, got {:?}", other),
        }
    }

    #[test]
    fn test_rule_names_in_order() {
        let names: Vec<&str> = FIELD_RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "doi",
                "url",
                "isbn",
                "year",
                "volume_issue",
                "pages",
                "publisher",
                "segments",
                "type_hint"
            ]
        );
    }

    #[test]
    fn test_doi_variants() {
        let cases = [
            ("doi:10.1234/x.", "10.1234/x"),
            ("https://doi.org/10.1145/3442188.3445922", "10.1145/3442188.3445922"),
            ("(10.1016/0021-9681(87)90171-8)", "10.1016/0021-9681(87)90171-8"),
            ("see 10.1000/abc].", "10.1000/abc"),
        ];
        for (raw, expected) in cases {
            assert_eq!(
                run(doi_rule, raw),
                Some(FieldValue::Doi(expected.to_string())),
                "{}",
                raw
            );
        }
        assert_eq!(run(doi_rule, "no identifier 10.12/x"), None);
    }

    #[test]
    fn test_doi_url_is_not_a_url() {
        assert_eq!(run(url_rule, "https://doi.org/10.1234/x"), None);
        assert_eq!(
            run(url_rule, "https://doi.org/10.1/x and (https://example.org/page)."),
            Some(FieldValue::Url("https://example.org/page".to_string()))
        );
    }

    #[test]
    fn test_isbn() {
        assert_eq!(
            run(isbn_rule, "Oxford. ISBN 978-0-19-852663-6."),
            Some(FieldValue::Isbn("9780198526636".to_string()))
        );
        assert_eq!(
            run(isbn_rule, "ISBN: 0-306-40615-2"),
            Some(FieldValue::Isbn("0306406152".to_string()))
        );
        assert_eq!(run(isbn_rule, "ISBN 12345"), None);
    }

    #[test]
    fn test_year_prefers_parenthesized_and_skips_page_ranges() {
        assert_eq!(
            run(year_rule, "Doe, J. (2020a). Title. J, 1999-2005."),
            Some(FieldValue::Year {
                year: 2020,
                suffix: Some('a')
            })
        );
        assert_eq!(
            run(year_rule, "Doe J. Title. J. 2021;10(2):123-130."),
            Some(FieldValue::Year {
                year: 2021,
                suffix: None
            })
        );
        assert_eq!(run(year_rule, "Doe J. Title. pp. 1999-2005."), None);
        assert_eq!(run(year_rule, "Doe J. Title. 9999."), None);
    }

    #[test]
    fn test_out_of_range_year_kept_for_range_check() {
        assert_eq!(
            run(year_rule, "Doe J. Title. J. 2099;10(2):1-9."),
            Some(FieldValue::Year {
                year: 2099,
                suffix: None
            })
        );
        assert_eq!(
            run(year_rule, "Doe J. (1066). Title. Press."),
            Some(FieldValue::Year {
                year: 1066,
                suffix: None
            })
        );
        // A plausible year still wins over an earlier implausible one
        assert_eq!(
            run(year_rule, "Doe J. Title 1066. J. 2020;1(1):1-2."),
            Some(FieldValue::Year {
                year: 2020,
                suffix: None
            })
        );
        // Not in year position: a count, not a date
        assert_eq!(run(year_rule, "Doe J. Survey of 1200 patients"), None);
    }

    #[test]
    fn test_year_ignores_doi_digits() {
        assert_eq!(run(year_rule, "Doe J. Title. doi:10.1234/2019.5"), None);
    }

    #[test]
    fn test_volume_issue_forms() {
        assert_eq!(
            run(volume_issue_rule, "J. 2021;10(2):123-130."),
            Some(FieldValue::VolumeIssue {
                volume: Some("10".into()),
                issue: Some("2".into())
            })
        );
        assert_eq!(
            run(volume_issue_rule, "IEEE Trans. X, vol. 5, no. 2, pp. 1-9, 2020."),
            Some(FieldValue::VolumeIssue {
                volume: Some("5".into()),
                issue: Some("2".into())
            })
        );
        assert_eq!(
            run(volume_issue_rule, "Journal of Things, 12, 33-45."),
            Some(FieldValue::VolumeIssue {
                volume: Some("12".into()),
                issue: None
            })
        );
        assert_eq!(run(volume_issue_rule, "Doe, J. (2020). Title."), None);
    }

    #[test]
    fn test_pages_normalized() {
        for (raw, expected) in [
            ("pp. 1\u{2013}9", "1-9"),
            ("J. 2021;10(2):123-130.", "123-130"),
            ("Journal, 12, 33\u{2013}45.", "33-45"),
            ("p. 17.", "17"),
            ("Vol. 3, pp. S12-S19.", "S12-S19"),
        ] {
            assert_eq!(
                run(pages_rule, raw),
                Some(FieldValue::Pages(expected.to_string())),
                "{}",
                raw
            );
        }
        assert_eq!(run(pages_rule, "Report covering 2019-2020."), None);
    }

    #[test]
    fn test_publisher() {
        assert_eq!(
            run(publisher_rule, "Doe, J. (2020). Book title. Oxford University Press."),
            Some(FieldValue::Publisher("Oxford University Press".into()))
        );
        assert_eq!(
            run(publisher_rule, "Doe J. Title. London: Routledge; 2020."),
            Some(FieldValue::Publisher("Routledge".into()))
        );
        assert_eq!(run(publisher_rule, "Doe J. Title. Nature. 2020."), None);
    }

    #[test]
    fn test_segments_vancouver() {
        let s = segments("Doe J. Title. J. 2021;10(2):123-130. doi:10.1234/x");
        assert_eq!(s.authors.len(), 1);
        assert_eq!(s.authors[0].family, "Doe");
        assert_eq!(s.title.as_deref(), Some("Title"));
        assert_eq!(s.venue.as_deref(), Some("J"));
    }

    #[test]
    fn test_segments_apa() {
        let s = segments("Doe, J., & Lee, K. (2020). Learning to cite. Journal of Things, 12(3), 33-45.");
        let families: Vec<&str> = s.authors.iter().map(|a| a.family.as_str()).collect();
        assert_eq!(families, vec!["Doe", "Lee"]);
        assert_eq!(s.title.as_deref(), Some("Learning to cite"));
        assert_eq!(s.venue.as_deref(), Some("Journal of Things"));
    }

    #[test]
    fn test_segments_ieee_quoted() {
        let s = segments(
            "J. Doe, A. Lee, and K. Kim, \u{201c}Fast things,\u{201d} in Proc. Conf. Stuff, 2020, pp. 1-9.",
        );
        let families: Vec<&str> = s.authors.iter().map(|a| a.family.as_str()).collect();
        assert_eq!(families, vec!["Doe", "Lee", "Kim"]);
        assert_eq!(s.title.as_deref(), Some("Fast things"));
        assert_eq!(s.venue.as_deref(), Some("In Proc. Conf. Stuff"));
    }

    #[test]
    fn test_segments_acm_year_after_authors() {
        let s = segments("Jane Doe and John Lee. 2020. A study of things. In Proceedings of the Web Conference. 1-9.");
        assert_eq!(s.authors.len(), 2);
        assert_eq!(s.title.as_deref(), Some("A study of things"));
        assert_eq!(s.venue.as_deref(), Some("In Proceedings of the Web Conference"));
    }

    #[test]
    fn test_segments_book_has_no_venue() {
        let s = segments("Doe, J. (2020). Book title. Oxford University Press.");
        assert_eq!(s.title.as_deref(), Some("Book title"));
        assert_eq!(s.venue, None);
    }

    #[test]
    fn test_segments_chapter() {
        let s = segments("Doe, J. (2020). Chapter title. In K. Lee (Ed.), Handbook of things (pp. 1-9). Oxford University Press.");
        assert_eq!(s.title.as_deref(), Some("Chapter title"));
        assert_eq!(s.venue.as_deref(), Some("In K. Lee (Ed.), Handbook of things"));
    }

    #[test]
    fn test_segments_same_as_previous() {
        let s = segments("\u{2014}\u{2014}\u{2014}. 2021. Another title. Venue.");
        assert!(s.same_as_previous);
        assert!(s.authors.is_empty());
        assert_eq!(s.title.as_deref(), Some("Another title"));
    }

    #[test]
    fn test_type_hints() {
        assert_eq!(
            run(type_hint_rule, "Doe J. Survey data [Dataset]. Zenodo. 2020."),
            Some(FieldValue::TypeHint(EntryType::Dataset))
        );
        assert_eq!(
            run(type_hint_rule, "Doe J. Page [Internet]. 2020. Available from: https://x.org"),
            Some(FieldValue::TypeHint(EntryType::Website))
        );
        assert_eq!(
            run(type_hint_rule, "Doe J. Draft [Preprint]. 2020."),
            Some(FieldValue::TypeHint(EntryType::Preprint))
        );
        assert_eq!(run(type_hint_rule, "Doe J. Plain. 2020."), None);
    }

    #[test]
    fn test_residual_drops_locators() {
        let residual = residual_text(
            "Doe J. Title. 2020. Available from: https://example.org/x [cited 2021 Mar 3]. doi:10.1000/abc",
        );
        assert_eq!(residual, "Doe J. Title. 2020.");
    }

    #[test]
    fn test_apply_never_overwrites_or_stores_blank() {
        let mut entry = ReferenceEntry::new("1", 1, "raw");
        entry.title = Some("Kept".into());
        apply(
            &mut entry,
            FieldValue::Segments(Segments {
                title: Some("Other".into()),
                venue: Some("  ".into()),
                ..Default::default()
            }),
        );
        assert_eq!(entry.title.as_deref(), Some("Kept"));
        assert_eq!(entry.venue, None);
    }

    #[test]
    fn test_sentence_end() {
        assert_eq!(sentence_end("A title. Venue", false), 7);
        assert_eq!(sentence_end("Deep vs. shallow nets. J", false), 21);
        assert_eq!(sentence_end("Why not? Venue", false), 8);
        assert_eq!(sentence_end("Phys. Rev. Letters. Next", true), 18);
        assert_eq!(sentence_end("no end", false), 6);
    }
}
