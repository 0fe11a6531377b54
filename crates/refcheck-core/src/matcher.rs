//! Bipartite linking of citation keys to reference labels.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::authors::{author_lists_agree, family_key};
use crate::matching::{edit_distance, normalize_doi, normalize_label, title_similarity};
use crate::{CitationKey, CitationMarker, MatchResult, ReferenceEntry, ReferenceLabel};

/// Tunable matching thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Largest family-name edit distance still accepted (default: 1).
    pub max_family_distance: usize,
    /// Family names shorter than this must match exactly (default: 4).
    /// Without it, "Li" would match "Lu" and "Wu".
    pub min_fuzzy_family_len: usize,
    /// Title similarity at which two entries count as duplicates (default: 0.92).
    pub duplicate_title_threshold: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_family_distance: 1,
            min_fuzzy_family_len: 4,
            duplicate_title_threshold: 0.92,
        }
    }
}

/// Link every citation key to at most one reference entry.
///
/// Deterministic and order-independent: keys are deduplicated into an
/// ordered set and ties between candidate entries break on ordinal, never on
/// scan position.
pub fn match_citations(
    markers: &[CitationMarker],
    entries: &[ReferenceEntry],
    config: &MatchConfig,
) -> MatchResult {
    let keys: BTreeSet<&CitationKey> = markers.iter().flat_map(|m| m.keys.iter()).collect();

    let mut by_label: BTreeMap<String, &ReferenceEntry> = BTreeMap::new();
    for entry in entries {
        by_label
            .entry(normalize_label(entry.label.as_str()))
            .and_modify(|e| {
                if entry.ordinal < e.ordinal {
                    *e = entry;
                }
            })
            .or_insert(entry);
    }

    let mut result = MatchResult::default();
    for key in keys {
        let found = match key {
            CitationKey::Numeric(n) => by_label.get(&n.to_string()).copied(),
            CitationKey::AuthorYear {
                family,
                year,
                suffix,
            } => best_author_year(family, *year, *suffix, entries, config),
        };
        match found {
            Some(entry) => {
                result.matched.insert((key.clone(), entry.label.clone()));
            }
            None => {
                tracing::debug!(%key, "citation has no matching reference");
                result.unmatched_citations.insert(key.clone());
            }
        }
    }

    let cited: BTreeSet<&ReferenceLabel> = result.matched.iter().map(|(_, l)| l).collect();
    result.uncited_references = entries
        .iter()
        .map(|e| &e.label)
        .filter(|l| !cited.contains(l))
        .cloned()
        .collect();
    result.duplicate_references = find_duplicates(entries, config);
    result
}

fn best_author_year<'a>(
    family: &str,
    year: u16,
    suffix: Option<char>,
    entries: &'a [ReferenceEntry],
    config: &MatchConfig,
) -> Option<&'a ReferenceEntry> {
    let wanted = family_key(family);
    if wanted.is_empty() {
        return None;
    }
    entries
        .iter()
        .filter(|e| e.year == Some(year))
        .filter(|e| match (suffix, e.year_suffix) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(&b),
            _ => true,
        })
        .filter_map(|e| {
            let author = e.first_author()?;
            let distance = edit_distance(&wanted, &author.normalized_key);
            let fuzzy_ok = wanted.len() >= config.min_fuzzy_family_len
                && author.normalized_key.len() >= config.min_fuzzy_family_len
                && distance <= config.max_family_distance;
            if distance == 0 || fuzzy_ok {
                // Exact suffix agreement beats an entry without a suffix
                let suffix_rank = usize::from(suffix.is_some() && e.year_suffix.is_none());
                Some(((distance, suffix_rank, e.ordinal), e))
            } else {
                None
            }
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, e)| e)
}

/// Group entries that describe the same work: same DOI, or agreeing author
/// families, same year and similar titles.
fn find_duplicates(
    entries: &[ReferenceEntry],
    config: &MatchConfig,
) -> BTreeSet<BTreeSet<ReferenceLabel>> {
    let mut sorted: Vec<&ReferenceEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.label.cmp(&b.label).then(a.ordinal.cmp(&b.ordinal)));

    // Union-find over positions in `sorted`
    let mut parent: Vec<usize> = (0..sorted.len()).collect();
    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            if is_duplicate(sorted[i], sorted[j], config) {
                let (ri, rj) = (root(&mut parent, i), root(&mut parent, j));
                if ri != rj {
                    parent[ri.max(rj)] = ri.min(rj);
                }
            }
        }
    }

    let mut groups: BTreeMap<usize, BTreeSet<ReferenceLabel>> = BTreeMap::new();
    for i in 0..sorted.len() {
        let r = root(&mut parent, i);
        groups.entry(r).or_default().insert(sorted[i].label.clone());
    }
    groups.into_values().filter(|g| g.len() > 1).collect()
}

fn is_duplicate(a: &ReferenceEntry, b: &ReferenceEntry, config: &MatchConfig) -> bool {
    if let (Some(da), Some(db)) = (&a.doi, &b.doi) {
        return normalize_doi(da) == normalize_doi(db);
    }
    let (Some(ta), Some(tb)) = (&a.title, &b.title) else {
        return false;
    };
    a.year == b.year
        && author_lists_agree(&a.authors, &b.authors)
        && title_similarity(ta, tb) >= config.duplicate_title_threshold
}
