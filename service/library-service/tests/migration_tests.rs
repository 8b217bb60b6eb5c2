mod common;

use library_model::{DocType, Partners};
use library_service::migrations::{unknown_keys, Cleanup, ConceptToLinks, Repair};
use library_service::LibraryService;
use library_store::orchestrator::Migration;
use library_store::{ContentRead, DocSelector};

use common::{post, seeded_repo, RecordingStore};

#[test]
fn cleanup_drops_unknown_keys_and_joins_partners() {
    let svc = LibraryService::new(seeded_repo());
    let report = svc.run_migration(&Cleanup, false).expect("cleanup");
    assert_eq!(report.scanned, 4);
    assert_eq!(report.changed, 1);
    assert_eq!(report.failed, 0);

    let p4 = post(svc.store(), "p4");
    assert!(unknown_keys(&p4).is_empty());
    assert_eq!(p4.partners, Some(Partners::Text("Clean Water Org".into())));
    assert_eq!(p4.title.as_deref(), Some("Water Governance"));
}

#[test]
fn cleanup_dry_run_commits_nothing() {
    let store = RecordingStore::new(seeded_repo());
    let svc = LibraryService::new(store);
    let report = svc.run_migration(&Cleanup, true).expect("dry run");
    assert!(report.dry_run);
    assert_eq!(report.changed, 1);
    assert_eq!(svc.store().commits(), 0);
    assert_eq!(unknown_keys(&post(&svc.store().inner, "p4")), vec!["concept", "legacyField"]);
}

#[test]
fn repair_backfills_keys_and_is_idempotent() {
    let svc = LibraryService::new(seeded_repo());
    let first = svc.run_migration(&Repair, false).expect("first run");
    assert_eq!(first.changed, 1);

    let p4 = post(svc.store(), "p4");
    let blocks = p4.description.expect("description kept");
    assert!(blocks[0].key.is_some());
    assert!(blocks[0].children.iter().flatten().all(|s| s.key.is_some()));
    assert!(p4.links.expect("links kept").iter().all(|l| l.key.is_some()));
    assert!(p4.extra.is_empty());

    let second = svc.run_migration(&Repair, false).expect("second run");
    assert_eq!(second.scanned, 4);
    assert_eq!(second.changed, 0);
    assert_eq!(second.unchanged, 4);
}

#[test]
fn repair_keys_unkeyed_references() {
    let repo = seeded_repo();
    let mut p2 = post(&repo, "p2");
    for r in p2.sdgs.iter_mut().flatten() {
        r.key = None;
    }
    repo.upsert_documents(&[library_model::Document::Post(p2)]).expect("store unkeyed refs");

    let doc = repo.get_document("p2").expect("get").expect("exists");
    let patch = Repair.plan(&doc).expect("refs need keys");
    assert!(patch.describe().contains("sdgs"));
    assert!(!patch.describe().contains("themes"));
}

#[test]
fn concept_moves_into_links() {
    let svc = LibraryService::new(seeded_repo());
    let selector = ConceptToLinks.selector();
    assert_eq!(svc.store().count(&selector).expect("count"), 1);

    let report = svc.run_migration(&ConceptToLinks, false).expect("migrate");
    assert_eq!(report.changed, 1);

    let p4 = post(svc.store(), "p4");
    assert!(!p4.extra.contains_key("concept"));
    let links = p4.links.expect("links");
    let titles: Vec<Option<&str>> = links.iter().map(|l| l.title.as_deref()).collect();
    assert_eq!(titles, vec![Some("Report"), Some("Concept note")]);
    assert_eq!(links[1].url.as_deref(), Some("https://example.org/concept.pdf"));
    assert!(links[1].key.is_some());

    let again = svc.run_migration(&ConceptToLinks, false).expect("second run");
    assert_eq!(again.scanned, 0);
    assert_eq!(svc.store().count(&DocSelector::OfType(DocType::Post)).expect("count"), 4);
}
