use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Greek letters that NFKD leaves non-ASCII, transliterated so that
/// "α-synuclein" and "alpha-synuclein" normalize alike.
const GREEK: &[(&[char], &str)] = &[
    (&['α', 'Α'], "alpha"),
    (&['β', 'Β'], "beta"),
    (&['γ', 'Γ'], "gamma"),
    (&['δ', 'Δ'], "delta"),
    (&['ε', 'Ε'], "epsilon"),
    (&['θ', 'Θ'], "theta"),
    (&['κ', 'Κ'], "kappa"),
    (&['λ', 'Λ'], "lambda"),
    (&['μ', 'Μ'], "mu"),
    (&['π', 'Π'], "pi"),
    (&['σ', 'ς', 'Σ'], "sigma"),
    (&['τ', 'Τ'], "tau"),
    (&['φ', 'Φ'], "phi"),
    (&['χ', 'Χ'], "chi"),
    (&['ψ', 'Ψ'], "psi"),
    (&['ω', 'Ω'], "omega"),
];

/// Normalize a title for comparison: lowercase ASCII alphanumerics only.
///
/// Steps (order matters):
/// 1. Unescape common HTML entities
/// 2. Transliterate Greek letters
/// 3. NFKD and strip to ASCII
/// 4. Keep only `[a-z0-9]`
pub fn normalize_title(title: &str) -> String {
    let mut title = title
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");

    for (letters, name) in GREEK {
        if title.contains(*letters) {
            title = title.replace(*letters, name);
        }
    }

    title
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Similarity of two titles in `[0, 1]` after normalization.
/// Empty titles never match anything.
pub fn title_similarity(title_a: &str, title_b: &str) -> f64 {
    let norm_a = normalize_title(title_a);
    let norm_b = normalize_title(title_b);
    if norm_a.is_empty() || norm_b.is_empty() {
        return 0.0;
    }
    rapidfuzz::fuzz::ratio(norm_a.chars(), norm_b.chars())
}

/// Check if two titles match at the given similarity threshold.
pub fn titles_match(title_a: &str, title_b: &str, threshold: f64) -> bool {
    title_similarity(title_a, title_b) >= threshold
}

/// Levenshtein distance between two normalized keys.
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Normalize a reference label or numeric citation key: strip brackets,
/// trailing punctuation and whitespace, lowercase.
///
/// `"[12]"` → `"12"`, `"3."` → `"3"`, `" (4) "` → `"4"`.
pub fn normalize_label(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '[' | ']' | '(' | ')' | '.' | ':' | ',') || c.is_whitespace())
        .to_lowercase()
}

/// Canonical DOI form for comparison: no resolver prefix, lowercase.
pub fn normalize_doi(doi: &str) -> String {
    static PREFIX: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^(?:https?://(?:dx\.)?doi\.org/|doi:\s*)").unwrap()
    });
    PREFIX.replace(doi.trim(), "").to_lowercase()
}

/// Lowercase, collapse whitespace, drop punctuation. Used for venue and
/// publisher comparison.
pub fn normalize_text(text: &str) -> String {
    text.nfkd()
        .filter(|c| c.is_ascii())
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
