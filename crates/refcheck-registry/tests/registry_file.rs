use std::io::Write;
use std::sync::Arc;

use refcheck_core::{
    CollaboratorSet, IssueKind, ReferenceEntry, ValidationConfig, build_report, collect_verdicts,
};
use refcheck_registry::{PredatoryRegistry, RegistryError};

fn write_registry(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn load_from_disk() {
    let file = write_registry("name,source\nJournal of Stuff,list\n");
    let registry = PredatoryRegistry::load(file.path()).unwrap();
    assert_eq!(registry.len(), 1);
}

#[test]
fn missing_file_is_io_error() {
    let err = PredatoryRegistry::load(std::path::Path::new("/nonexistent/registry.csv")).unwrap_err();
    assert!(matches!(err, RegistryError::Io { .. }));
}

#[tokio::test]
async fn registry_hit_becomes_predatory_venue_issue() {
    let file = write_registry("name,publisher,domain,source\nJournal of Stuff,,,list-a\n");
    let registry = PredatoryRegistry::load(file.path()).unwrap();

    let mut flagged = ReferenceEntry::new("1", 1, "raw one");
    flagged.venue = Some("Journal of Stuff".into());
    let mut clean = ReferenceEntry::new("2", 2, "raw two");
    clean.venue = Some("Journal of Things".into());
    let entries = vec![flagged, clean];

    let set = CollaboratorSet {
        registry: Some(Arc::new(registry)),
        ..Default::default()
    };
    let verdicts = collect_verdicts(&entries, &set).await;
    assert_eq!(verdicts.registry.len(), 1);

    let report = build_report(&[], &entries, &ValidationConfig::default(), &verdicts);
    let hits: Vec<_> = report.issues_of(IssueKind::PredatoryVenue).collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].subject.to_string(), "reference [1]");
}
