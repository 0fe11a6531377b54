//! Concurrent collection of collaborator verdicts.
//!
//! This is the only place the pipeline runs anything concurrently: link
//! checks, online verification and registry lookups for many entries, with
//! bounded parallelism and a per-call timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;

use crate::collaborators::{
    CollaboratorError, FieldComparisons, LinkVerifier, MetadataProvider, OnlineVerifier, Registry,
    RegistryVerdict,
};
use crate::validator::{LinkKind, LinkVerdict, Verdicts};
use crate::{ReferenceEntry, ReferenceLabel};

/// External collaborators available to a run. The default has none: the
/// pipeline then runs fully offline.
#[derive(Clone)]
pub struct CollaboratorSet {
    pub providers: Vec<Arc<dyn MetadataProvider>>,
    pub verifier: Option<Arc<dyn OnlineVerifier>>,
    pub link_verifier: Option<Arc<dyn LinkVerifier>>,
    pub registry: Option<Arc<dyn Registry>>,
    /// Entries processed at once (default: 4).
    pub concurrency: usize,
    /// Per-call timeout (default: 10 s).
    pub timeout: Duration,
}

impl Default for CollaboratorSet {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            verifier: None,
            link_verifier: None,
            registry: None,
            concurrency: 4,
            timeout: Duration::from_secs(10),
        }
    }
}

impl std::fmt::Debug for CollaboratorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let provider_names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("CollaboratorSet")
            .field("providers", &provider_names)
            .field("verifier", &self.verifier.as_ref().map(|v| v.name()))
            .field("link_verifier", &self.link_verifier.is_some())
            .field("registry", &self.registry.is_some())
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CollaboratorSet {
    pub fn is_offline(&self) -> bool {
        self.providers.is_empty()
            && self.verifier.is_none()
            && self.link_verifier.is_none()
            && self.registry.is_none()
    }
}

/// Everything collected for one entry.
#[derive(Default)]
struct EntryVerdicts {
    links: Vec<LinkVerdict>,
    online: Option<FieldComparisons>,
    registry: Option<RegistryVerdict>,
    skipped: Vec<String>,
}

/// Link targets for an entry: the DOI (as a resolver URL) and the URL,
/// deduplicated.
pub fn link_targets(entry: &ReferenceEntry) -> Vec<(LinkKind, String)> {
    let mut targets = Vec::new();
    if let Some(doi) = &entry.doi {
        let url = if doi.starts_with("http") {
            doi.clone()
        } else {
            format!("https://doi.org/{}", doi)
        };
        targets.push((LinkKind::Doi, url));
    }
    if let Some(url) = &entry.url {
        if !targets.iter().any(|(_, t)| t == url) {
            targets.push((LinkKind::Url, url.clone()));
        }
    }
    targets
}

async fn with_timeout<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<Option<T>, CollaboratorError>>,
) -> Result<Option<T>, CollaboratorError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout),
    }
}

async fn verdicts_for_entry(entry: &ReferenceEntry, set: &CollaboratorSet) -> EntryVerdicts {
    let mut out = EntryVerdicts::default();

    if let Some(checker) = &set.link_verifier {
        for (kind, target) in link_targets(entry) {
            match with_timeout(set.timeout, checker.check(&target)).await {
                Ok(Some(status)) => out.links.push(LinkVerdict {
                    kind,
                    target,
                    status,
                }),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(label = %entry.label, %target, error = %e, "link check failed");
                    out.skipped.push(format!("link check of {}: {}", target, e));
                }
            }
        }
    }

    if let Some(verifier) = &set.verifier {
        match with_timeout(set.timeout, verifier.verify(entry)).await {
            Ok(found) => out.online = found,
            Err(e) => {
                tracing::warn!(label = %entry.label, verifier = verifier.name(), error = %e, "online verification failed");
                out.skipped.push(format!("{}: {}", verifier.name(), e));
            }
        }
    }

    if let Some(registry) = &set.registry {
        out.registry = [&entry.venue, &entry.publisher]
            .into_iter()
            .flatten()
            .find_map(|name| registry.lookup(name))
            .or_else(|| entry.url.as_deref().and_then(|u| registry.lookup_url(u)));
    }

    out
}

/// Run link checks, online verification and registry lookups for every
/// entry. Collaborator failures and timeouts become `skipped` notes; this
/// function never fails.
pub async fn collect_verdicts(entries: &[ReferenceEntry], set: &CollaboratorSet) -> Verdicts {
    let mut verdicts = Verdicts::default();
    if set.link_verifier.is_none() && set.verifier.is_none() && set.registry.is_none() {
        return verdicts;
    }

    let per_entry: Vec<(ReferenceLabel, EntryVerdicts)> = stream::iter(entries.iter())
        .map(|entry| async move { (entry.label.clone(), verdicts_for_entry(entry, set).await) })
        .buffered(set.concurrency.max(1))
        .collect()
        .await;

    for (label, found) in per_entry {
        if !found.links.is_empty() {
            verdicts.links.insert(label.clone(), found.links);
        }
        if let Some(comparisons) = found.online {
            verdicts.online.insert(label.clone(), comparisons);
        }
        if let Some(hit) = found.registry {
            verdicts.registry.insert(label.clone(), hit);
        }
        for reason in found.skipped {
            verdicts.skip(&label, reason);
        }
    }
    tracing::info!(
        links = verdicts.links.len(),
        online = verdicts.online.len(),
        registry_hits = verdicts.registry.len(),
        skipped = verdicts.skipped.len(),
        "collaborator verdicts collected"
    );
    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_targets() {
        let mut e = ReferenceEntry::new("1", 1, "raw");
        assert!(link_targets(&e).is_empty());
        e.doi = Some("10.1/x".into());
        e.url = Some("https://doi.org/10.1/x".into());
        let targets = link_targets(&e);
        assert_eq!(targets, vec![(LinkKind::Doi, "https://doi.org/10.1/x".to_string())]);
        e.url = Some("https://example.org".into());
        assert_eq!(link_targets(&e).len(), 2);
    }

    #[test]
    fn test_offline_default() {
        let set = CollaboratorSet::default();
        assert!(set.is_offline());
        assert_eq!(set.concurrency, 4);
    }

    use crate::Field;
    use crate::collaborators::{FieldComparison, NullRegistry};
    use crate::mock::{MockLinkVerifier, MockRegistry, MockVerifier};
    use std::collections::{BTreeMap, HashMap};

    fn entry(label: &str, doi: Option<&str>, venue: Option<&str>) -> ReferenceEntry {
        let mut e = ReferenceEntry::new(label, 1, "raw");
        e.doi = doi.map(String::from);
        e.venue = venue.map(String::from);
        e
    }

    #[tokio::test]
    async fn test_offline_collects_nothing() {
        let entries = vec![entry("1", Some("10.1/a"), None)];
        let verdicts = collect_verdicts(&entries, &CollaboratorSet::default()).await;
        assert!(verdicts.is_empty());
    }

    #[tokio::test]
    async fn test_broken_doi_reported() {
        let links = MockLinkVerifier {
            statuses: HashMap::from([("https://doi.org/10.1/dead".to_string(), 404)]),
            ..Default::default()
        };
        let set = CollaboratorSet {
            link_verifier: Some(Arc::new(links)),
            ..Default::default()
        };
        let entries = vec![
            entry("1", Some("10.1/dead"), None),
            entry("2", Some("10.1/alive"), None),
        ];
        let verdicts = collect_verdicts(&entries, &set).await;

        let dead = &verdicts.links[&ReferenceLabel::new("1")][0];
        assert_eq!(dead.kind, LinkKind::Doi);
        assert!(!dead.status.reachable);
        assert_eq!(dead.status.status_code, Some(404));
        assert!(verdicts.links[&ReferenceLabel::new("2")][0].status.reachable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_link_becomes_skip() {
        let links = MockLinkVerifier {
            hang: vec!["https://doi.org/10.1/slow".to_string()],
            ..Default::default()
        };
        let set = CollaboratorSet {
            link_verifier: Some(Arc::new(links)),
            timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let entries = vec![entry("7", Some("10.1/slow"), None)];
        let verdicts = collect_verdicts(&entries, &set).await;

        assert!(verdicts.links.is_empty());
        let reasons = &verdicts.skipped[&ReferenceLabel::new("7")];
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("timed out"), "{}", reasons[0]);
    }

    #[tokio::test]
    async fn test_verifier_results_and_failures() {
        let mut comparisons = BTreeMap::new();
        comparisons.insert(
            Field::Year,
            FieldComparison {
                claimed: Some("2019".into()),
                authoritative: Some("2018".into()),
                matches: false,
            },
        );
        let verifier = Arc::new(MockVerifier {
            comparisons: HashMap::from([("1".to_string(), comparisons)]),
            fail_labels: vec!["2".to_string()],
            ..Default::default()
        });
        let set = CollaboratorSet {
            verifier: Some(verifier.clone()),
            ..Default::default()
        };
        let entries = vec![entry("1", None, None), entry("2", None, None)];
        let verdicts = collect_verdicts(&entries, &set).await;

        assert_eq!(verifier.call_count(), 2);
        assert!(!verdicts.online[&ReferenceLabel::new("1")][&Field::Year].matches);
        assert!(!verdicts.online.contains_key(&ReferenceLabel::new("2")));
        assert!(verdicts.skipped[&ReferenceLabel::new("2")][0].starts_with("mock-verifier"));
    }

    #[tokio::test]
    async fn test_registry_checks_venue_then_publisher() {
        let registry = MockRegistry {
            names: vec!["Global Journal of Everything".to_string()],
        };
        let set = CollaboratorSet {
            registry: Some(Arc::new(registry)),
            ..Default::default()
        };
        let mut by_publisher = entry("2", None, Some("Nature"));
        by_publisher.publisher = Some("Global Journal of Everything".into());
        let entries = vec![
            entry("1", None, Some("Global Journal of Everything")),
            by_publisher,
            entry("3", None, Some("Nature")),
        ];
        let verdicts = collect_verdicts(&entries, &set).await;
        assert_eq!(verdicts.registry.len(), 2);
        assert!(!verdicts.registry.contains_key(&ReferenceLabel::new("3")));
    }

    #[tokio::test]
    async fn test_null_registry_finds_nothing() {
        let set = CollaboratorSet {
            registry: Some(Arc::new(NullRegistry)),
            ..Default::default()
        };
        let entries = vec![entry("1", None, Some("Anything"))];
        let verdicts = collect_verdicts(&entries, &set).await;
        assert!(verdicts.is_empty());
    }
}
