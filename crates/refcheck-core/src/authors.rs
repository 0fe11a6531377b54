use once_cell::sync::Lazy;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

use crate::Author;

/// Common surname prefixes (case-insensitive).
static SURNAME_PREFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "van", "von", "der", "den", "de", "del", "della", "di", "da", "dos", "du", "al", "el",
        "la", "le", "ben", "ibn", "bin", "ter", "mac", "mc", "o",
    ]
    .into_iter()
    .collect()
});

/// Name suffixes to strip.
static NAME_SUFFIXES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["jr", "sr", "ii", "iii", "iv", "v"].into_iter().collect());

/// Matching key for a family name: NFKD, ASCII alphanumerics only, lowercase.
///
/// `"Müller"` → `"muller"`, `"van der Berg"` → `"vanderberg"`.
pub fn family_key(family: &str) -> String {
    family
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Whether a token is a run of initials: `"J."`, `"JA"`, `"J.-P."`.
pub fn is_initials(token: &str) -> bool {
    let letters: Vec<char> = token
        .chars()
        .filter(|c| *c != '.' && *c != '-')
        .collect();
    if letters.is_empty() || letters.len() > 3 {
        return false;
    }
    if !letters.iter().all(|c| c.is_uppercase()) {
        return false;
    }
    // "Li" is a surname, "LI" or "L.I." are initials
    letters.len() == 1 || token.contains('.') || letters.len() == token.chars().count()
}

/// Extract surname from name parts, handling multi-word surnames and suffixes.
fn get_surname_from_parts<'a>(parts: &[&'a str]) -> (Vec<&'a str>, Vec<&'a str>) {
    let mut parts = parts.to_vec();
    while parts.len() >= 2
        && parts
            .last()
            .is_some_and(|p| NAME_SUFFIXES.contains(p.to_lowercase().trim_end_matches('.')))
    {
        parts.pop();
    }

    // Walk left from the last word while the preceding word is a prefix:
    // "De La Cruz", "van der Berg"
    let mut start = parts.len().saturating_sub(1);
    while start > 0 && SURNAME_PREFIXES.contains(parts[start - 1].to_lowercase().as_str()) {
        start -= 1;
    }
    (parts[..start].to_vec(), parts[start..].to_vec())
}

/// Parse one author name in any of the common reference-list layouts.
///
/// - `"Doe, J."` / `"Doe, John A."` (family first, comma)
/// - `"Doe JA"` (Vancouver: family then initials)
/// - `"J. Doe"` / `"John Doe"` / `"Jay Van Bavel"`
///
/// Returns `None` when nothing name-like remains.
pub fn parse_author(name: &str) -> Option<Author> {
    let name = name
        .trim()
        .trim_start_matches(['&', ','])
        .trim_start_matches("and ")
        .trim_end_matches([',', ';'])
        .trim();
    let name = name.strip_suffix("et al.").unwrap_or(name);
    let name = name.strip_suffix("et al").unwrap_or(name).trim();
    if name.is_empty() {
        return None;
    }

    if let Some((family, given)) = name.split_once(',') {
        let family = family.trim();
        let given = given.trim();
        if !family.chars().any(char::is_alphabetic) {
            return None;
        }
        let given = if given.is_empty()
            || NAME_SUFFIXES.contains(given.to_lowercase().trim_end_matches('.'))
        {
            None
        } else {
            Some(given.to_string())
        };
        return Some(Author::new(family, given));
    }

    let parts: Vec<&str> = name.split_whitespace().collect();
    let (given, family) = if parts.len() >= 2 && parts.last().is_some_and(|p| is_initials(p)) {
        // Vancouver "Doe JA", "van der Berg AB"
        let split = parts.len() - 1;
        (parts[split..].to_vec(), parts[..split].to_vec())
    } else {
        get_surname_from_parts(&parts)
    };

    let family = family.join(" ");
    let family = family.trim_end_matches('.');
    if !family.chars().any(char::is_alphabetic) {
        return None;
    }
    let given = if given.is_empty() {
        None
    } else {
        Some(given.join(" "))
    };
    Some(Author::new(family, given))
}

/// Whether two author lists plausibly describe the same people: same first
/// author family, and one family list contained in the other (covers
/// "et al." truncation).
pub fn author_lists_agree(a: &[Author], b: &[Author]) -> bool {
    match (a.first(), b.first()) {
        (None, None) => true,
        (Some(x), Some(y)) => {
            if x.normalized_key != y.normalized_key {
                return false;
            }
            let keys_a: HashSet<&str> = a.iter().map(|x| x.normalized_key.as_str()).collect();
            let keys_b: HashSet<&str> = b.iter().map(|x| x.normalized_key.as_str()).collect();
            keys_a.is_subset(&keys_b) || keys_b.is_subset(&keys_a)
        }
        _ => false,
    }
}

/// Whether at least one family name appears in both lists.
pub fn validate_authors(claimed: &[Author], found: &[Author]) -> bool {
    if claimed.is_empty() || found.is_empty() {
        return false;
    }
    let found_keys: HashSet<&str> = found.iter().map(|a| a.normalized_key.as_str()).collect();
    claimed.iter().any(|a| {
        found_keys.contains(a.normalized_key.as_str())
            || found_keys.iter().any(|f| {
                // Multi-word surname written partially: "bavel" vs "vanbavel"
                a.normalized_key.len() >= 4
                    && f.len() >= 4
                    && (f.ends_with(a.normalized_key.as_str()) || a.normalized_key.ends_with(f))
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(name: &str) -> (String, Option<String>) {
        let a = parse_author(name).unwrap();
        (a.family, a.given)
    }

    #[test]
    fn test_family_first_with_comma() {
        assert_eq!(parsed("Doe, J."), ("Doe".into(), Some("J.".into())));
        assert_eq!(
            parsed("Bail, Christopher A."),
            ("Bail".into(), Some("Christopher A.".into()))
        );
    }

    #[test]
    fn test_vancouver() {
        assert_eq!(parsed("Doe J"), ("Doe".into(), Some("J".into())));
        assert_eq!(parsed("Smith JA"), ("Smith".into(), Some("JA".into())));
        assert_eq!(
            parsed("van der Berg AB"),
            ("van der Berg".into(), Some("AB".into()))
        );
    }

    #[test]
    fn test_given_first() {
        assert_eq!(parsed("John Smith"), ("Smith".into(), Some("John".into())));
        assert_eq!(parsed("J. Smith"), ("Smith".into(), Some("J.".into())));
        assert_eq!(
            parsed("Jay Van Bavel"),
            ("Van Bavel".into(), Some("Jay".into()))
        );
        assert_eq!(
            parsed("Martin Luther King Jr."),
            ("King".into(), Some("Martin Luther".into()))
        );
    }

    #[test]
    fn test_surname_only() {
        assert_eq!(parsed("Li"), ("Li".into(), None));
        assert_eq!(parsed("Smith et al."), ("Smith".into(), None));
    }

    #[test]
    fn test_not_a_name() {
        assert!(parse_author("").is_none());
        assert!(parse_author("2021").is_none());
        assert!(parse_author(" , ").is_none());
    }

    #[test]
    fn test_family_key() {
        assert_eq!(family_key("Müller"), "muller");
        assert_eq!(family_key("van der Berg"), "vanderberg");
        assert_eq!(family_key("O'Brien"), "obrien");
    }

    #[test]
    fn test_is_initials() {
        assert!(is_initials("J."));
        assert!(is_initials("JA"));
        assert!(is_initials("J.-P."));
        assert!(!is_initials("Li"));
        assert!(!is_initials("John"));
    }

    #[test]
    fn test_author_lists_agree_truncated() {
        let full = vec![Author::new("Doe", None), Author::new("Lee", None)];
        let short = vec![Author::new("Doe", Some("J".into()))];
        assert!(author_lists_agree(&full, &short));
        let other = vec![Author::new("Lee", None)];
        assert!(!author_lists_agree(&full, &other));
    }

    #[test]
    fn test_validate_authors() {
        let claimed = vec![Author::new("Bavel", None)];
        let found = vec![Author::new("Van Bavel", Some("Jay".into()))];
        assert!(validate_authors(&claimed, &found));
        assert!(!validate_authors(&claimed, &[Author::new("Smith", None)]));
        assert!(!validate_authors(&[], &found));
    }
}
