use once_cell::sync::Lazy;
use regex::Regex;

use refcheck_core::Author;
use refcheck_core::authors::{is_initials, parse_author};

/// Author block of an entry plus the text that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedAuthors<'a> {
    pub authors: Vec<Author>,
    /// The block was a dash run (`———.`): same authors as the previous entry.
    pub same_as_previous: bool,
    pub rest: &'a str,
}

static DASH_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\u{2014}\u{2013}\-_]{2,}\s*[.,]?").unwrap());

static OPEN_QUOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["\u{201c}]"#).unwrap());

static PAREN_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\s*(?:\d{4}[a-z]?|n\.\s?d\.)(?:,[^)]*)?\s*\)").unwrap()
});

/// LNCS style: `Doe, J., Lee, K.: Title`.
static LNCS_COLON_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Lu}\.\s*:").unwrap());

/// ACM style: `Doe, J. and Lee, K. 2020. Title`.
static ACM_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\s*(?:1[5-9]|20)\d{2}[a-z]?\.(?:\s|$)").unwrap());

/// Vancouver style: `Doe J, Lee KA.` (family name then bare initials).
static VANCOUVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[a-z]{1,3}\s+)*\p{Lu}[\p{L}'\u{2019}\-]+(?:\s+\p{Lu}[\p{L}'\u{2019}\-]+)*\s+\p{Lu}{1,3}(?:[,.]|$)",
    )
    .unwrap()
});

/// Split the author block off the front of an entry.
///
/// The block ends at the earliest of: an opening quote (IEEE), a
/// parenthesized year (APA, Springer), a `. 2020.` year sentence (ACM), an
/// initial followed by a colon (LNCS), or the first sentence period. For
/// Vancouver lists the first period counts even after an initial; otherwise
/// periods after initials are skipped.
pub fn segment_authors(text: &str, max_authors: usize) -> SegmentedAuthors<'_> {
    let text = text.trim();
    if let Some(m) = DASH_RUN_RE.find(text) {
        return SegmentedAuthors {
            authors: Vec::new(),
            same_as_previous: true,
            rest: &text[m.end()..],
        };
    }

    // (end of block, start of rest)
    let mut candidates: Vec<(usize, usize)> = Vec::new();
    if let Some(m) = OPEN_QUOTE_RE.find(text) {
        candidates.push((m.start(), m.start()));
    }
    if let Some(m) = PAREN_YEAR_RE.find(text) {
        candidates.push((m.start(), m.start()));
    }
    if let Some(m) = ACM_YEAR_RE.find(text) {
        candidates.push((m.start(), m.start() + 1));
    }
    if let Some(m) = LNCS_COLON_RE.find(text) {
        // keep the initial's period in the block
        candidates.push((m.start() + 2, m.end()));
    }
    let period = if VANCOUVER_RE.is_match(text) {
        text.find(". ").or_else(|| text.strip_suffix('.').map(str::len))
    } else {
        find_first_real_period(text)
    };
    if let Some(p) = period {
        candidates.push((p, p + 1));
    }

    let Some((end, rest_start)) = candidates.into_iter().min_by_key(|(end, _)| *end) else {
        return SegmentedAuthors {
            authors: Vec::new(),
            same_as_previous: false,
            rest: text,
        };
    };

    SegmentedAuthors {
        authors: split_author_block(&text[..end], max_authors),
        same_as_previous: false,
        rest: &text[rest_start..],
    }
}

/// Position of the first period followed by whitespace (or ending the
/// text) that does not close an initial like `J.`.
pub fn find_first_real_period(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    for (pos, _) in text.match_indices('.') {
        let at_end = pos + 1 == text.len();
        if !at_end && !bytes[pos + 1].is_ascii_whitespace() {
            continue;
        }
        if pos == 0 {
            continue;
        }
        let before = text[..pos].chars().next_back();
        let before_that = text[..pos].chars().rev().nth(1);
        if before.is_some_and(char::is_uppercase)
            && !before_that.is_some_and(char::is_alphabetic)
        {
            continue;
        }
        return Some(pos);
    }
    None
}

static ET_AL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i),?\s*\bet\s+al\.?").unwrap());
static AND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*,?\s*(?:&|\band\b)\s+").unwrap());

fn all_initials(token: &str) -> bool {
    let words: Vec<&str> = token.split_whitespace().collect();
    !words.is_empty() && words.iter().all(|w| is_initials(w))
}

fn looks_like_name(part: &str) -> bool {
    if part.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let words = part.split_whitespace().count();
    (1..=5).contains(&words) && part.chars().any(char::is_uppercase)
}

/// Split an author block into authors.
///
/// Semicolons separate authors when present. Otherwise comma tokens are
/// paired into `Family, Given` when the given part is all initials, or
/// when every other token is a single word (`Bail, Christopher A., Smith, John`).
pub fn split_author_block(block: &str, max_authors: usize) -> Vec<Author> {
    let block = block.trim().trim_end_matches([',', ';', ':']).trim();
    let block = ET_AL_RE.replace_all(block, "");
    let block = AND_RE.replace_all(&block, ", ");
    let block = block.trim().trim_start_matches(',').trim();
    if block.is_empty() {
        return Vec::new();
    }

    let names: Vec<String> = if block.contains(';') {
        block
            .split(';')
            .map(|s| s.trim().trim_start_matches(',').trim().to_string())
            .collect()
    } else {
        let tokens: Vec<&str> = block
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        let family_first = tokens.len() >= 2
            && tokens.len() % 2 == 0
            && tokens.iter().step_by(2).all(|t| !t.contains(' '))
            && tokens
                .iter()
                .skip(1)
                .step_by(2)
                .all(|t| t.chars().next().is_some_and(char::is_uppercase));

        let mut names = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let pair = tokens.get(i + 1).is_some_and(|next| {
                family_first || (all_initials(next) && !all_initials(tokens[i]))
            });
            if pair {
                names.push(format!("{}, {}", tokens[i], tokens[i + 1]));
                i += 2;
            } else {
                names.push(tokens[i].to_string());
                i += 1;
            }
        }
        names
    };

    let mut authors: Vec<Author> = names
        .iter()
        .filter(|n| looks_like_name(n))
        .filter_map(|n| parse_author(n))
        .collect();
    authors.truncate(max_authors);
    authors
}
