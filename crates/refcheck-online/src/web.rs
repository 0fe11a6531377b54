//! Metadata from a landing page's `citation_*` meta tags (the Highwire
//! tags Google Scholar reads), with `og:title` and `<title>` as title
//! fallbacks.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use refcheck_core::authors::parse_author;
use refcheck_core::collaborators::CollaboratorFuture;
use refcheck_core::matching::normalize_doi;
use refcheck_core::{Author, CollaboratorError, EntryPatch, Field, MetadataProvider, ReferenceEntry};

use crate::{check_status, request_error};

/// Values read from a page's meta tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub date: Option<String>,
    pub journal: Option<String>,
    pub conference: Option<String>,
    pub publisher: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub first_page: Option<String>,
    pub last_page: Option<String>,
    pub doi: Option<String>,
    pub isbn: Option<String>,
}

/// Provider for entries that point at a web page and carry no DOI.
pub struct WebPageProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebPageProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: crate::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch_page(&self, url: &str) -> Result<Option<String>, CollaboratorError> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(request_error)?;
        check_status(resp.status())?;
        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_none_or(|ct| ct.contains("html"));
        if !is_html {
            tracing::debug!(url, "not an HTML page, skipping metadata");
            return Ok(None);
        }
        resp.text().await.map(Some).map_err(request_error)
    }
}

impl MetadataProvider for WebPageProvider {
    fn name(&self) -> &str {
        "web page"
    }

    fn fetch<'a>(
        &'a self,
        entry: &'a ReferenceEntry,
        wanted: &'a [Field],
    ) -> CollaboratorFuture<'a, EntryPatch> {
        Box::pin(async move {
            let Some(url) = entry.url.as_deref() else {
                return Ok(None);
            };
            if entry.doi.is_some() || wanted.is_empty() || !url.starts_with("http") {
                return Ok(None);
            }
            let Some(html) = self.fetch_page(url).await? else {
                return Ok(None);
            };
            // scraper's document types are !Send; parse off the async task
            let metadata = tokio::task::spawn_blocking(move || parse_page_metadata(&html))
                .await
                .map_err(|e| CollaboratorError::Other(e.to_string()))?;
            let patch = metadata_to_patch(&metadata);
            Ok((!patch.is_empty()).then_some(patch))
        })
    }
}

fn clean(text: &str) -> Option<String> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Read `citation_*` meta tags from an HTML document.
pub fn parse_page_metadata(html: &str) -> PageMetadata {
    let document = scraper::Html::parse_document(html);
    let meta_sel = scraper::Selector::parse("meta[content]").unwrap();
    let title_sel = scraper::Selector::parse("title").unwrap();

    let mut meta = PageMetadata::default();
    let mut og_title = None;
    for el in document.select(&meta_sel) {
        let attrs = el.value();
        let Some(key) = attrs.attr("name").or_else(|| attrs.attr("property")) else {
            continue;
        };
        let Some(value) = attrs.attr("content").and_then(clean) else {
            continue;
        };
        let slot = match key.to_ascii_lowercase().as_str() {
            "citation_title" | "dc.title" => &mut meta.title,
            "citation_author" | "dc.creator" => {
                meta.authors.push(value);
                continue;
            }
            "citation_publication_date" | "citation_date" | "dc.date" => &mut meta.date,
            "citation_journal_title" => &mut meta.journal,
            "citation_conference_title" => &mut meta.conference,
            "citation_publisher" | "dc.publisher" => &mut meta.publisher,
            "citation_volume" => &mut meta.volume,
            "citation_issue" => &mut meta.issue,
            "citation_firstpage" => &mut meta.first_page,
            "citation_lastpage" => &mut meta.last_page,
            "citation_doi" => &mut meta.doi,
            "citation_isbn" => &mut meta.isbn,
            "og:title" => &mut og_title,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    if meta.title.is_none() {
        meta.title = og_title.or_else(|| {
            document
                .select(&title_sel)
                .next()
                .and_then(|t| clean(&t.text().collect::<String>()))
        });
    }
    meta
}

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(1[5-9]\d{2}|20\d{2})\b").unwrap());

pub fn metadata_to_patch(meta: &PageMetadata) -> EntryPatch {
    // Meta tags write "Doe, Jane" or "Jane Doe"
    let authors: Vec<Author> = meta.authors.iter().filter_map(|a| parse_author(a)).collect();
    let pages = match (&meta.first_page, &meta.last_page) {
        (Some(first), Some(last)) if first != last => Some(format!("{}-{}", first, last)),
        (Some(first), _) => Some(first.clone()),
        _ => None,
    };
    EntryPatch {
        authors: (!authors.is_empty()).then_some(authors),
        year: meta
            .date
            .as_deref()
            .and_then(|d| YEAR_RE.captures(d))
            .and_then(|c| c[1].parse().ok()),
        title: meta.title.clone(),
        venue: meta.journal.clone().or_else(|| meta.conference.clone()),
        publisher: meta.publisher.clone(),
        volume: meta.volume.clone(),
        issue: meta.issue.clone(),
        pages,
        doi: meta.doi.as_deref().map(normalize_doi),
        url: None,
        isbn: meta.isbn.clone(),
        entry_type: None,
    }
}
