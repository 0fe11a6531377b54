use regex::Regex;

use refcheck_core::validator::current_year;

/// Controls how a list of patterns/values is overridden from its defaults.
#[derive(Debug, Clone, Default)]
pub enum ListOverride<T> {
    /// Use the built-in defaults.
    #[default]
    Default,
    /// Completely replace the defaults with these values.
    Replace(Vec<T>),
    /// Append these values to the defaults.
    Extend(Vec<T>),
}

impl<T: Clone> ListOverride<T> {
    /// Resolve this override against the given defaults.
    pub fn resolve(&self, defaults: &[T]) -> Vec<T> {
        match self {
            ListOverride::Default => defaults.to_vec(),
            ListOverride::Replace(v) => v.clone(),
            ListOverride::Extend(v) => {
                let mut result = defaults.to_vec();
                result.extend(v.iter().cloned());
                result
            }
        }
    }
}

/// Tokens that mark a reference segment as a publisher name.
pub const DEFAULT_PUBLISHER_TOKENS: &[&str] = &[
    "press",
    "publisher",
    "publishers",
    "publishing",
    "verlag",
    "springer",
    "wiley",
    "elsevier",
    "routledge",
    "sage",
    "taylor & francis",
    "pearson",
    "mcgraw-hill",
    "o'reilly",
    "addison-wesley",
    "prentice hall",
    "palgrave",
    "birkhäuser",
    "de gruyter",
];

/// Words that may open an author-year citation without being part of it.
pub const DEFAULT_CITATION_PREFIXES: &[&str] =
    &["see also", "see", "e.g.,", "e.g.", "cf.", "i.e.,", "i.e.", "for example,"];

/// Configuration for citation extraction and reference-list parsing.
///
/// Regex fields are `Option<Regex>`; `None` means "use the built-in default".
/// Use [`ParsingConfigBuilder`] to construct with string patterns.
#[derive(Debug, Clone)]
pub struct ParsingConfig {
    // ── section.rs ──
    /// Regex locating the reference-list heading (the last match is used).
    pub(crate) section_header_re: Option<Regex>,
    /// Regex finding the first heading after the reference list.
    pub(crate) section_end_re: Option<Regex>,
    /// Regex recognizing an entry label at the start of a line.
    pub(crate) label_re: Option<Regex>,
    /// Number of leading candidate lines that vote on the convention (default: 5).
    pub(crate) vote_window: usize,

    // ── citations.rs ──
    /// Widest accepted numeric range: `[1-300]` is malformed by default (default: 200).
    pub(crate) max_range_span: u32,
    pub(crate) citation_prefixes: ListOverride<String>,

    // ── fields.rs ──
    pub(crate) publisher_tokens: ListOverride<String>,
    /// Plausible year bounds for the year rule (default: 1400 ..= next year).
    pub(crate) min_year: u16,
    pub(crate) max_year: u16,
    /// Maximum number of authors kept per entry (default: 50).
    pub(crate) max_authors: usize,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            section_header_re: None,
            section_end_re: None,
            label_re: None,
            vote_window: 5,
            max_range_span: 200,
            citation_prefixes: ListOverride::Default,
            publisher_tokens: ListOverride::Default,
            min_year: 1400,
            max_year: current_year() + 1,
            max_authors: 50,
        }
    }
}

impl ParsingConfig {
    pub fn vote_window(&self) -> usize {
        self.vote_window
    }

    pub fn max_range_span(&self) -> u32 {
        self.max_range_span
    }

    pub fn year_range(&self) -> std::ops::RangeInclusive<u16> {
        self.min_year..=self.max_year
    }

    pub(crate) fn publisher_tokens(&self) -> Vec<String> {
        let defaults: Vec<String> = DEFAULT_PUBLISHER_TOKENS.iter().map(|s| s.to_string()).collect();
        self.publisher_tokens.resolve(&defaults)
    }

    pub(crate) fn citation_prefixes(&self) -> Vec<String> {
        let defaults: Vec<String> = DEFAULT_CITATION_PREFIXES
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.citation_prefixes.resolve(&defaults)
    }
}

/// Builder for [`ParsingConfig`].
///
/// Accepts string patterns that are compiled to `Regex` in [`build()`](Self::build).
/// Fails fast with `regex::Error` if any pattern is invalid.
#[derive(Debug, Clone, Default)]
pub struct ParsingConfigBuilder {
    section_header_re: Option<String>,
    section_end_re: Option<String>,
    label_re: Option<String>,
    vote_window: Option<usize>,
    max_range_span: Option<u32>,
    citation_prefixes: ListOverride<String>,
    publisher_tokens: ListOverride<String>,
    min_year: Option<u16>,
    max_year: Option<u16>,
    max_authors: Option<usize>,
}

impl ParsingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Sections and segmentation ──

    pub fn section_header_regex(mut self, pattern: &str) -> Self {
        self.section_header_re = Some(pattern.to_string());
        self
    }

    pub fn section_end_regex(mut self, pattern: &str) -> Self {
        self.section_end_re = Some(pattern.to_string());
        self
    }

    pub fn label_regex(mut self, pattern: &str) -> Self {
        self.label_re = Some(pattern.to_string());
        self
    }

    pub fn vote_window(mut self, n: usize) -> Self {
        self.vote_window = Some(n);
        self
    }

    // ── Citations ──

    pub fn max_range_span(mut self, span: u32) -> Self {
        self.max_range_span = Some(span);
        self
    }

    pub fn set_citation_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.citation_prefixes = ListOverride::Replace(prefixes);
        self
    }

    pub fn add_citation_prefix(mut self, prefix: String) -> Self {
        match &mut self.citation_prefixes {
            ListOverride::Extend(v) => v.push(prefix),
            _ => self.citation_prefixes = ListOverride::Extend(vec![prefix]),
        }
        self
    }

    // ── Fields ──

    pub fn set_publisher_tokens(mut self, tokens: Vec<String>) -> Self {
        self.publisher_tokens = ListOverride::Replace(tokens);
        self
    }

    pub fn add_publisher_token(mut self, token: String) -> Self {
        match &mut self.publisher_tokens {
            ListOverride::Extend(v) => v.push(token),
            _ => self.publisher_tokens = ListOverride::Extend(vec![token]),
        }
        self
    }

    pub fn year_range(mut self, min: u16, max: u16) -> Self {
        self.min_year = Some(min);
        self.max_year = Some(max);
        self
    }

    pub fn max_authors(mut self, n: usize) -> Self {
        self.max_authors = Some(n);
        self
    }

    /// Compile all string patterns into regexes and produce a [`ParsingConfig`].
    pub fn build(self) -> Result<ParsingConfig, regex::Error> {
        let compile = |opt: Option<String>| -> Result<Option<Regex>, regex::Error> {
            opt.map(|p| Regex::new(&p)).transpose()
        };
        let defaults = ParsingConfig::default();

        Ok(ParsingConfig {
            section_header_re: compile(self.section_header_re)?,
            section_end_re: compile(self.section_end_re)?,
            label_re: compile(self.label_re)?,
            vote_window: self.vote_window.unwrap_or(defaults.vote_window).max(1),
            max_range_span: self.max_range_span.unwrap_or(defaults.max_range_span),
            citation_prefixes: self.citation_prefixes,
            publisher_tokens: self.publisher_tokens,
            min_year: self.min_year.unwrap_or(defaults.min_year),
            max_year: self.max_year.unwrap_or(defaults.max_year),
            max_authors: self.max_authors.unwrap_or(defaults.max_authors),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ParsingConfig::default();
        assert_eq!(config.vote_window, 5);
        assert_eq!(config.max_range_span, 200);
        assert_eq!(config.min_year, 1400);
        assert!(config.max_year > 2000);
    }

    #[test]
    fn test_builder_basic() {
        let config = ParsingConfigBuilder::new()
            .vote_window(9)
            .max_range_span(50)
            .year_range(1800, 2030)
            .build()
            .unwrap();
        assert_eq!(config.vote_window, 9);
        assert_eq!(config.max_range_span, 50);
        assert_eq!(config.year_range(), 1800..=2030);
    }

    #[test]
    fn test_builder_custom_regex() {
        let config = ParsingConfigBuilder::new()
            .section_header_regex(r"(?im)^\s*Literatur\s*$")
            .build()
            .unwrap();
        assert!(config.section_header_re.is_some());
    }

    #[test]
    fn test_builder_invalid_regex() {
        let result = ParsingConfigBuilder::new().label_regex(r"[invalid").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_token_overrides() {
        let config = ParsingConfigBuilder::new()
            .add_publisher_token("hachette".into())
            .set_citation_prefixes(vec!["vgl.".into()])
            .build()
            .unwrap();
        let tokens = config.publisher_tokens();
        assert!(tokens.contains(&"press".to_string()));
        assert!(tokens.contains(&"hachette".to_string()));
        assert_eq!(config.citation_prefixes(), vec!["vgl.".to_string()]);
    }

    #[test]
    fn test_list_override_resolve() {
        let defaults = vec!["a".to_string(), "b".to_string()];

        let d: ListOverride<String> = ListOverride::Default;
        assert_eq!(d.resolve(&defaults), defaults);

        let r: ListOverride<String> = ListOverride::Replace(vec!["x".to_string()]);
        assert_eq!(r.resolve(&defaults), vec!["x".to_string()]);

        let e: ListOverride<String> = ListOverride::Extend(vec!["c".to_string()]);
        assert_eq!(
            e.resolve(&defaults),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
