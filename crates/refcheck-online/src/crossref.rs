//! Crossref REST API: metadata provider and online verifier.
//!
//! Lookup is by DOI (`/works/{doi}`) when the entry has one, otherwise by a
//! bibliographic query whose hits are only accepted above a title
//! similarity threshold.

use std::time::Duration;

use refcheck_core::authors::family_key;
use refcheck_core::collaborators::CollaboratorFuture;
use refcheck_core::matching::{normalize_doi, normalize_text, title_similarity, titles_match};
use refcheck_core::{
    Author, CollaboratorError, EntryPatch, EntryType, Field, FieldComparison, FieldComparisons,
    MetadataProvider, OnlineVerifier, ReferenceEntry,
};

use crate::{check_status, request_error};

const DEFAULT_BASE_URL: &str = "https://api.crossref.org";

/// A work record as returned by Crossref, reduced to what refcheck uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossrefWork {
    pub doi: Option<String>,
    pub title: Option<String>,
    pub authors: Vec<Author>,
    pub year: Option<u16>,
    pub container_title: Option<String>,
    pub short_container_title: Option<String>,
    pub publisher: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub page: Option<String>,
    pub isbn: Option<String>,
    pub url: Option<String>,
    pub work_type: Option<String>,
}

pub struct Crossref {
    client: reqwest::Client,
    mailto: Option<String>,
    base_url: String,
    timeout: Duration,
    /// Minimum title similarity for a bibliographic-query hit (default: 0.9).
    title_threshold: f64,
}

impl Crossref {
    pub fn new(client: reqwest::Client, mailto: Option<String>) -> Self {
        Self {
            client,
            mailto,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: crate::DEFAULT_TIMEOUT,
            title_threshold: 0.9,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_title_threshold(mut self, threshold: f64) -> Self {
        self.title_threshold = threshold;
        self
    }

    fn with_mailto(&self, mut url: String) -> String {
        if let Some(ref email) = self.mailto {
            let sep = if url.contains('?') { '&' } else { '?' };
            url.push(sep);
            url.push_str(&format!("mailto={}", urlencoding::encode(email)));
        }
        url
    }

    async fn get_json(&self, url: &str) -> Result<Option<serde_json::Value>, CollaboratorError> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(request_error)?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        check_status(resp.status())?;
        let data = resp.json().await.map_err(request_error)?;
        Ok(Some(data))
    }

    /// Fetch the work registered under a DOI. `Ok(None)` when Crossref does
    /// not know it.
    pub async fn work_by_doi(&self, doi: &str) -> Result<Option<CrossrefWork>, CollaboratorError> {
        let url = self.with_mailto(format!(
            "{}/works/{}",
            self.base_url,
            urlencoding::encode(&normalize_doi(doi))
        ));
        let Some(data) = self.get_json(&url).await? else {
            return Ok(None);
        };
        parse_work(&data["message"])
            .map(Some)
            .ok_or_else(|| CollaboratorError::Parse("work record has no message".into()))
    }

    /// Search by title, first author and year; keep the best hit above the
    /// title threshold.
    pub async fn search(&self, entry: &ReferenceEntry) -> Result<Option<CrossrefWork>, CollaboratorError> {
        let Some(title) = entry.title.as_deref() else {
            return Ok(None);
        };
        let query = bibliographic_query(entry);
        let url = self.with_mailto(format!(
            "{}/works?query.bibliographic={}&rows=5",
            self.base_url,
            urlencoding::encode(&query)
        ));
        let Some(data) = self.get_json(&url).await? else {
            return Ok(None);
        };
        let items: Vec<CrossrefWork> = data["message"]["items"]
            .as_array()
            .map(|arr| arr.iter().filter_map(parse_work).collect())
            .unwrap_or_default();
        Ok(best_hit(items, title, entry.year, self.title_threshold))
    }

    /// DOI lookup when possible, bibliographic search otherwise.
    pub async fn lookup(&self, entry: &ReferenceEntry) -> Result<Option<CrossrefWork>, CollaboratorError> {
        match entry.doi.as_deref() {
            Some(doi) => self.work_by_doi(doi).await,
            None => self.search(entry).await,
        }
    }
}

impl MetadataProvider for Crossref {
    fn name(&self) -> &str {
        "Crossref"
    }

    fn fetch<'a>(
        &'a self,
        entry: &'a ReferenceEntry,
        wanted: &'a [Field],
    ) -> CollaboratorFuture<'a, EntryPatch> {
        Box::pin(async move {
            if wanted.is_empty() {
                return Ok(None);
            }
            let work = self.lookup(entry).await?;
            Ok(work.map(|w| work_to_patch(&w)))
        })
    }
}

impl OnlineVerifier for Crossref {
    fn name(&self) -> &str {
        "Crossref"
    }

    fn verify<'a>(&'a self, entry: &'a ReferenceEntry) -> CollaboratorFuture<'a, FieldComparisons> {
        Box::pin(async move {
            let work = self.lookup(entry).await?;
            Ok(work.map(|w| compare(entry, &w)).filter(|c| !c.is_empty()))
        })
    }
}

fn first_str(value: &serde_json::Value) -> Option<String> {
    let s = match value {
        serde_json::Value::Array(arr) => arr.first()?.as_str()?,
        serde_json::Value::String(s) => s.as_str(),
        _ => return None,
    };
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn year_of(value: &serde_json::Value) -> Option<u16> {
    value["date-parts"]
        .as_array()?
        .first()?
        .as_array()?
        .first()?
        .as_u64()
        .and_then(|y| u16::try_from(y).ok())
}

/// Parse one Crossref work object. `None` when the value is not an object.
pub fn parse_work(item: &serde_json::Value) -> Option<CrossrefWork> {
    if !item.is_object() {
        return None;
    }
    let authors = item["author"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|a| {
                    let given = a["given"].as_str().map(str::to_string);
                    match a["family"].as_str() {
                        Some(family) => Some(Author::new(family, given)),
                        // Group authors only carry a name
                        None => a["name"].as_str().map(|n| Author::new(n, None)),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let year = ["issued", "published-print", "published-online", "created"]
        .iter()
        .find_map(|key| year_of(&item[*key]));

    Some(CrossrefWork {
        doi: first_str(&item["DOI"]),
        title: first_str(&item["title"]),
        authors,
        year,
        container_title: first_str(&item["container-title"]),
        short_container_title: first_str(&item["short-container-title"]),
        publisher: first_str(&item["publisher"]),
        volume: first_str(&item["volume"]),
        issue: first_str(&item["issue"]),
        page: first_str(&item["page"]),
        isbn: first_str(&item["ISBN"]),
        url: first_str(&item["URL"]),
        work_type: first_str(&item["type"]),
    })
}

/// Map a Crossref work type onto an entry type.
pub fn map_type(work_type: &str) -> Option<EntryType> {
    Some(match work_type {
        "journal-article" => EntryType::JournalArticle,
        "book" | "monograph" | "edited-book" | "reference-book" | "report" => EntryType::Book,
        "book-chapter" | "book-section" | "book-part" | "reference-entry" => EntryType::BookChapter,
        "proceedings-article" => EntryType::ConferencePaper,
        "posted-content" => EntryType::Preprint,
        "dataset" => EntryType::Dataset,
        _ => return None,
    })
}

fn bibliographic_query(entry: &ReferenceEntry) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(title) = &entry.title {
        parts.push(title.clone());
    }
    if let Some(author) = entry.first_author() {
        parts.push(author.family.clone());
    }
    if let Some(year) = entry.year {
        parts.push(year.to_string());
    }
    parts.join(" ")
}

/// Best-scoring hit with a title similarity of at least `threshold` and,
/// when both sides have one, the same year.
pub fn best_hit(
    items: Vec<CrossrefWork>,
    title: &str,
    year: Option<u16>,
    threshold: f64,
) -> Option<CrossrefWork> {
    items
        .into_iter()
        .filter(|w| match (year, w.year) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        })
        .filter_map(|w| {
            let score = title_similarity(title, w.title.as_deref()?);
            (score >= threshold).then_some((score, w))
        })
        .fold(None, |best: Option<(f64, CrossrefWork)>, (score, w)| match best {
            Some((s, _)) if s >= score => best,
            _ => Some((score, w)),
        })
        .map(|(_, w)| w)
}

/// Patch with every value Crossref has. The merge keeps only wanted,
/// absent fields.
pub fn work_to_patch(work: &CrossrefWork) -> EntryPatch {
    let is_container_book = work
        .work_type
        .as_deref()
        .is_some_and(|t| map_type(t) == Some(EntryType::BookChapter));
    EntryPatch {
        authors: (!work.authors.is_empty()).then(|| work.authors.clone()),
        year: work.year,
        title: work.title.clone(),
        venue: work.container_title.as_ref().map(|c| {
            if is_container_book {
                format!("In {}", c)
            } else {
                c.clone()
            }
        }),
        publisher: work.publisher.clone(),
        volume: work.volume.clone(),
        issue: work.issue.clone(),
        pages: work.page.as_ref().map(|p| p.replace(['\u{2013}', '\u{2014}'], "-")),
        doi: work.doi.clone(),
        url: None,
        isbn: work.isbn.clone(),
        entry_type: work.work_type.as_deref().and_then(map_type),
    }
}

/// Whether a claimed venue names the authoritative one: same normalized
/// text, containment, or a word-by-word abbreviation (`J. Things` for
/// `Journal of Things`).
pub fn venues_agree(claimed: &str, authoritative: &str) -> bool {
    let a = normalize_text(claimed.trim_start_matches("In ").trim_start_matches("in "));
    let b = normalize_text(authoritative);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b || (a.len().min(b.len()) >= 4 && (b.contains(&a) || a.contains(&b))) {
        return true;
    }
    const STOP: &[&str] = &["of", "the", "and", "on", "for", "in", "de", "la", "und"];
    let long: Vec<&str> = b.split(' ').filter(|w| !STOP.contains(w)).collect();
    let short: Vec<&str> = a.split(' ').filter(|w| !STOP.contains(w)).collect();
    short.len() == long.len() && short.iter().zip(&long).all(|(s, l)| l.starts_with(s))
}

fn comparison(claimed: Option<String>, authoritative: Option<String>, matches: bool) -> FieldComparison {
    FieldComparison {
        claimed,
        authoritative,
        matches,
    }
}

/// Compare title, first author, year, DOI and venue. Fields missing on
/// either side are left out.
pub fn compare(entry: &ReferenceEntry, work: &CrossrefWork) -> FieldComparisons {
    let mut out = FieldComparisons::new();

    if let (Some(claimed), Some(found)) = (&entry.title, &work.title) {
        out.insert(
            Field::Title,
            comparison(
                Some(claimed.clone()),
                Some(found.clone()),
                titles_match(claimed, found, 0.9),
            ),
        );
    }
    if let (Some(claimed), Some(found)) = (entry.first_author(), work.authors.first()) {
        let matches = family_key(&claimed.family) == found.normalized_key;
        out.insert(
            Field::Authors,
            comparison(Some(claimed.display_name()), Some(found.display_name()), matches),
        );
    }
    if let (Some(claimed), Some(found)) = (entry.year, work.year) {
        out.insert(
            Field::Year,
            comparison(
                Some(claimed.to_string()),
                Some(found.to_string()),
                claimed == found,
            ),
        );
    }
    if let (Some(claimed), Some(found)) = (&entry.doi, &work.doi) {
        out.insert(
            Field::Doi,
            comparison(
                Some(claimed.clone()),
                Some(found.clone()),
                normalize_doi(claimed) == normalize_doi(found),
            ),
        );
    }
    if let (Some(claimed), Some(found)) = (&entry.venue, &work.container_title) {
        let matches = venues_agree(claimed, found)
            || work
                .short_container_title
                .as_deref()
                .is_some_and(|short| venues_agree(claimed, short));
        out.insert(
            Field::Venue,
            comparison(Some(claimed.clone()), Some(found.clone()), matches),
        );
    }
    out
}
