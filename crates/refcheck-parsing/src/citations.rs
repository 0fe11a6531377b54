//! In-text citation marker extraction.
//!
//! Two marker families are recognized: bracketed numeric markers (`[4]`,
//! `[1,3]`, `[2-5]`) and parenthetical author-year markers (`(Doe, 2021)`,
//! `(Doe & Lee, 2020; Kim et al., 2019a)`). Anything else in brackets or
//! parentheses is skipped; extraction never fails.

use once_cell::sync::Lazy;
use regex::Regex;

use refcheck_core::{CitationKey, CitationMarker, MarkerStyle};

use crate::config::ParsingConfig;

static CANDIDATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(?P<num>[^\[\]\n]{1,64})\]|\((?P<paren>[^()\n]{1,300})\)").unwrap()
});

static NUMERIC_PART_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,5})(?:\s*[-\u{2013}\u{2014}]\s*(\d{1,5}))?$").unwrap());

static AUTHOR_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)^
        (?P<authors>
            (?:[a-z]{1,3}\s+)*\p{Lu}[\p{L}'\u{2019}\-]+
            (?:\s+\p{Lu}[\p{L}'\u{2019}\-]+)*
            (?:\s*(?:,|&|\band\b)\s*(?:[a-z]{1,3}\s+)*\p{Lu}[\p{L}'\u{2019}\-]+(?:\s+\p{Lu}[\p{L}'\u{2019}\-]+)*)*
            (?:\s+et\s+al\.?)?
        )
        ,?\s+
        (?P<years>\d{4}[a-z]?(?:\s*,\s*\d{4}[a-z]?)*)
        (?:\s*,\s*(?:pp?\.|ch(?:ap)?\.|sec\.|\u{a7})\s*[\w\-\u{2013}]+)?
        $",
    )
    .unwrap()
});

static YEAR_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})([a-z])?").unwrap());

/// Lazy, restartable iterator over the citation markers of a body text.
///
/// A clone continues from the same position without disturbing the
/// original, so `iter.clone().count()` leaves `iter` untouched.
#[derive(Debug, Clone)]
pub struct Citations<'a> {
    text: &'a str,
    pos: usize,
    max_range_span: u32,
    prefixes: Vec<String>,
}

impl<'a> Citations<'a> {
    pub fn new(text: &'a str, config: &ParsingConfig) -> Self {
        let mut prefixes = config.citation_prefixes();
        // Longest first so "see also" wins over "see"
        prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));
        Self {
            text,
            pos: 0,
            max_range_span: config.max_range_span(),
            prefixes,
        }
    }
}

impl Iterator for Citations<'_> {
    type Item = CitationMarker;

    fn next(&mut self) -> Option<CitationMarker> {
        while self.pos < self.text.len() {
            let caps = CANDIDATE_RE.captures_at(self.text, self.pos)?;
            let whole = caps.get(0)?;
            // Step past the opening delimiter only, so a rejected "(see [3])"
            // still yields the bracketed marker inside it
            self.pos = whole.start() + 1;

            let parsed = if let Some(num) = caps.name("num") {
                parse_numeric(num.as_str(), self.max_range_span)
                    .map(|keys| (keys, MarkerStyle::Numeric))
            } else if let Some(paren) = caps.name("paren") {
                parse_author_year(paren.as_str(), &self.prefixes)
                    .map(|keys| (keys, MarkerStyle::AuthorYear))
            } else {
                None
            };

            if let Some((keys, style)) = parsed {
                self.pos = whole.end();
                return Some(CitationMarker {
                    raw_text: whole.as_str().to_string(),
                    keys,
                    position: whole.range(),
                    style,
                });
            }
        }
        None
    }
}

/// Parse the inside of a bracketed numeric marker.
///
/// Returns `None` for anything that is not a comma-separated list of numbers
/// and ranges, for descending ranges and for ranges covering more than
/// `max_span` numbers.
pub fn parse_numeric(content: &str, max_span: u32) -> Option<Vec<CitationKey>> {
    let mut keys = Vec::new();
    for part in content.split([',', ';']) {
        let part = part.trim();
        let caps = NUMERIC_PART_RE.captures(part)?;
        let start: u32 = caps[1].parse().ok()?;
        if start == 0 {
            return None;
        }
        let end: u32 = match caps.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => start,
        };
        if end < start {
            tracing::debug!(marker = content, "descending citation range skipped");
            return None;
        }
        if end - start >= max_span {
            tracing::debug!(marker = content, "citation range too wide, skipped");
            return None;
        }
        for n in start..=end {
            let key = CitationKey::Numeric(n);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    if keys.is_empty() { None } else { Some(keys) }
}

fn strip_prefix<'s>(part: &'s str, prefixes: &[String]) -> &'s str {
    let trimmed = part.trim();
    for prefix in prefixes {
        if trimmed.len() > prefix.len()
            && trimmed.is_char_boundary(prefix.len())
            && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            let rest = &trimmed[prefix.len()..];
            // "see" must not eat the start of "Seeger"
            if prefix.ends_with(|c: char| c.is_alphabetic())
                && !rest.starts_with(char::is_whitespace)
            {
                continue;
            }
            return rest.trim_start();
        }
    }
    trimmed
}

/// First author family of an author group: `"Doe & Lee"` → `"Doe"`.
fn first_family(authors: &str) -> &str {
    let mut end = authors.len();
    for sep in [",", "&", " and ", " et al"] {
        if let Some(i) = authors.find(sep) {
            end = end.min(i);
        }
    }
    authors[..end].trim()
}

/// Parse the inside of a parenthetical author-year marker. Parts that do not
/// look like `Name[ & Name | et al.], Year` are dropped; `None` when no part
/// survives.
pub fn parse_author_year(content: &str, prefixes: &[String]) -> Option<Vec<CitationKey>> {
    let mut keys = Vec::new();
    for part in content.split(';') {
        let part = strip_prefix(part, prefixes);
        let Some(caps) = AUTHOR_YEAR_RE.captures(part) else {
            continue;
        };
        let family = first_family(&caps["authors"]).to_string();
        for year_caps in YEAR_TOKEN_RE.captures_iter(&caps["years"]) {
            let Ok(year) = year_caps[1].parse::<u16>() else {
                continue;
            };
            let suffix = year_caps.get(2).and_then(|m| m.as_str().chars().next());
            let key = CitationKey::AuthorYear {
                family: family.clone(),
                year,
                suffix,
            };
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    if keys.is_empty() { None } else { Some(keys) }
}
