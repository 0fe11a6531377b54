//! Venue screening against a CSV list of journals, publishers and domains.
//!
//! The file needs a header row. Recognised columns (case-insensitive, any
//! order) are `name`, `publisher`, `domain` and `source`; at least one of
//! `name`, `publisher` or `domain` must be present. Extra columns are
//! ignored.
//!
//! ```text
//! name,publisher,domain,source
//! Journal of Advanced Everything,Acme Open Press,acme-open.example,Beall's list
//! ```

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

use refcheck_core::matching::normalize_text;
use refcheck_core::{Registry, RegistryVerdict};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read registry {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed registry CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("registry CSV has none of the columns name, publisher, domain")]
    MissingColumn,
}

/// One row of the registry file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryRecord {
    pub name: Option<String>,
    pub publisher: Option<String>,
    pub domain: Option<String>,
    pub source: Option<String>,
}

/// In-memory index over registry records.
#[derive(Debug, Default)]
pub struct PredatoryRegistry {
    records: Vec<RegistryRecord>,
    by_name: HashMap<String, usize>,
    by_publisher: HashMap<String, usize>,
    by_domain: HashMap<String, usize>,
}

#[derive(Default)]
struct Columns {
    name: Option<usize>,
    publisher: Option<usize>,
    domain: Option<usize>,
    source: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, RegistryError> {
        let mut cols = Columns::default();
        for (i, header) in headers.iter().enumerate() {
            let slot = match header.trim().to_ascii_lowercase().as_str() {
                "name" => &mut cols.name,
                "publisher" => &mut cols.publisher,
                "domain" => &mut cols.domain,
                "source" => &mut cols.source,
                _ => continue,
            };
            slot.get_or_insert(i);
        }
        if cols.name.is_none() && cols.publisher.is_none() && cols.domain.is_none() {
            return Err(RegistryError::MissingColumn);
        }
        Ok(cols)
    }

    fn record(&self, row: &csv::StringRecord) -> RegistryRecord {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        RegistryRecord {
            name: cell(self.name),
            publisher: cell(self.publisher),
            domain: cell(self.domain),
            source: cell(self.source),
        }
    }
}

/// Host part of a URL or bare domain, lowercased and without `www.`.
pub fn domain_of(url_or_domain: &str) -> Option<String> {
    let text = url_or_domain.trim();
    let host = if text.contains("://") {
        url::Url::parse(text).ok()?.host_str()?.to_string()
    } else {
        text.split('/').next()?.to_string()
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    (host.contains('.')).then_some(host)
}

impl PredatoryRegistry {
    /// Load a registry from a CSV file.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let file = std::fs::File::open(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_reader(file)?;
        tracing::info!(path = %path.display(), records = registry.len(), "registry loaded");
        Ok(registry)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, RegistryError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let columns = Columns::from_headers(csv_reader.headers()?)?;

        let mut records = Vec::new();
        for row in csv_reader.records() {
            let record = columns.record(&row?);
            if record.name.is_some() || record.publisher.is_some() || record.domain.is_some() {
                records.push(record);
            }
        }
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<RegistryRecord>) -> Self {
        let mut registry = Self::default();
        for (i, record) in records.iter().enumerate() {
            if let Some(key) = record.name.as_deref().map(normalize_text) {
                registry.by_name.entry(key).or_insert(i);
            }
            if let Some(key) = record.publisher.as_deref().map(normalize_text) {
                registry.by_publisher.entry(key).or_insert(i);
            }
            if let Some(key) = record.domain.as_deref().and_then(domain_of) {
                registry.by_domain.entry(key).or_insert(i);
            }
        }
        registry.by_name.remove("");
        registry.by_publisher.remove("");
        registry.records = records;
        registry
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn verdict(&self, index: usize, matched_on: &str) -> RegistryVerdict {
        let record = &self.records[index];
        let matched_name = match matched_on {
            "publisher" => record.publisher.as_ref(),
            "domain" => record.domain.as_ref(),
            _ => record.name.as_ref(),
        }
        .or(record.name.as_ref())
        .or(record.publisher.as_ref())
        .cloned()
        .unwrap_or_default();
        RegistryVerdict {
            matched_name,
            source: record.source.clone(),
            matched_on: matched_on.to_string(),
        }
    }
}

impl Registry for PredatoryRegistry {
    fn lookup(&self, venue_or_publisher: &str) -> Option<RegistryVerdict> {
        let key = normalize_text(venue_or_publisher);
        if key.is_empty() {
            return None;
        }
        if let Some(&i) = self.by_name.get(&key) {
            return Some(self.verdict(i, "venue"));
        }
        self.by_publisher
            .get(&key)
            .map(|&i| self.verdict(i, "publisher"))
    }

    /// Matches the URL's host or any parent domain of it.
    fn lookup_url(&self, url: &str) -> Option<RegistryVerdict> {
        let host = domain_of(url)?;
        let mut candidate = host.as_str();
        loop {
            if let Some(&i) = self.by_domain.get(candidate) {
                tracing::debug!(host = %host, matched = candidate, "registry domain hit");
                return Some(self.verdict(i, "domain"));
            }
            let (_, parent) = candidate.split_once('.')?;
            if !parent.contains('.') {
                return None;
            }
            candidate = parent;
        }
    }
}
