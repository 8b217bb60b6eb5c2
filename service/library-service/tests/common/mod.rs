#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use library_model::{Document, PostCard, SeriesOption, ThemeOption};
use library_store::sqlite_repo::SqliteRepo;
use library_store::{CommitReceipt, ContentRead, ContentWrite, DocSelector, Fetched, PostFilter, StoreError, Transaction};
use serde_json::{json, Value};

pub fn doc(value: Value) -> Document {
    Document::from_value(value).expect("fixture document decodes")
}

fn reference(target: &str) -> Value {
    json!({"_type": "reference", "_ref": target, "_key": format!("k-{target}")})
}

fn post_json(id: &str, title: &str, slug: &str, date: &str, series: Option<&str>, sdgs: &[&str], themes: &[&str]) -> Value {
    let mut v = json!({
        "_id": id,
        "_type": "post",
        "title": title,
        "slug": {"_type": "slug", "current": slug},
        "date": date,
        "sdgs": sdgs.iter().map(|s| reference(s)).collect::<Vec<_>>(),
        "themes": themes.iter().map(|t| reference(t)).collect::<Vec<_>>(),
    });
    if let Some(s) = series {
        v["series"] = json!({"_type": "reference", "_ref": s});
    }
    v
}

/// | post | slug                   | date       | series | sdgs   | themes   | partners                  |
/// |------|------------------------|------------|--------|--------|----------|---------------------------|
/// | p1   | solar-mini-grids       | 2025-03-01 | 2025   | 7, 13  | t-energy | Clean Energy Partnership  |
/// | p2   | health-systems         | 2024-06-10 | 2024   | 3, 13  | t-water  | WHO                       |
/// | p3   | energy-access-dialogue | 2024-01-05 | 2024   | 13     | t-energy | Energy Council            |
/// | p4   | water-governance       | 2023-11-01 | none   | none   | none     | ["Clean Water Org", null] |
///
/// p4 is the untidy one: an undeclared key, a legacy `concept`, list partners,
/// and description blocks and links without `_key`s.
pub fn fixture_documents() -> Vec<Document> {
    let mut p1 = post_json("p1", "Solar Mini-Grids", "solar-mini-grids", "2025-03-01", Some("s2025"), &["sdg-7", "sdg-13"], &["t-energy"]);
    p1["partners"] = json!("Clean Energy Partnership");
    p1["youtube"] = json!("https://youtu.be/dQw4w9WgXcQ");
    let mut p2 = post_json("p2", "Health Systems", "health-systems", "2024-06-10", Some("s2024"), &["sdg-3", "sdg-13"], &["t-water"]);
    p2["partners"] = json!("WHO");
    let mut p3 = post_json("p3", "Energy Access Dialogue", "energy-access-dialogue", "2024-01-05", Some("s2024"), &["sdg-13"], &["t-energy"]);
    p3["partners"] = json!("Energy Council");
    let mut p4 = post_json("p4", "Water Governance", "water-governance", "2023-11-01", None, &[], &[]);
    p4["partners"] = json!(["Clean Water Org", null]);
    p4["legacyField"] = json!(1);
    p4["concept"] = json!("https://example.org/concept.pdf");
    p4["links"] = json!([{"_type": "linkItem", "title": "Report", "url": "https://example.org/report"}]);
    p4["description"] = json!([{
        "_type": "block", "style": "normal", "markDefs": [],
        "children": [{"_type": "span", "text": "Governance of shared rivers", "marks": []}]
    }]);

    vec![
        doc(json!({"_id": "sdg-3", "_type": "sdg", "title": "Good Health and Well-being", "number": 3})),
        doc(json!({"_id": "sdg-7", "_type": "sdg", "title": "Affordable and Clean Energy", "number": 7})),
        doc(json!({"_id": "sdg-13", "_type": "sdg", "title": "Climate Action", "number": 13})),
        doc(json!({"_id": "s2024", "_type": "series", "title": "HLPF", "year": 2024})),
        doc(json!({"_id": "s2025", "_type": "series", "year": 2025})),
        doc(json!({"_id": "t-water", "_type": "theme", "title": "Water"})),
        doc(json!({"_id": "t-energy", "_type": "theme", "title": "Energy", "link": "https://sdgs.un.org/topics/energy"})),
        doc(json!({"_id": "t-forests", "_type": "theme", "title": "forests"})),
        doc(p1),
        doc(p2),
        doc(p3),
        doc(p4),
    ]
}

pub fn seeded_repo() -> SqliteRepo {
    let repo = SqliteRepo::open_in_memory().expect("in-memory sqlite opens");
    repo.upsert_documents(&fixture_documents()).expect("fixture loads");
    repo
}

pub fn post(repo: &SqliteRepo, id: &str) -> library_model::PostDoc {
    match repo.get_document(id).expect("lookup").expect("post exists") {
        Document::Post(p) => p,
        other => panic!("expected post, got {}", other.doc_type()),
    }
}

/// Wraps a store and counts commits.
pub struct RecordingStore<S> {
    pub inner: S,
    commits: AtomicUsize,
}

impl<S> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, commits: AtomicUsize::new(0) }
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl<S: ContentRead> ContentRead for RecordingStore<S> {
    fn find_posts(&self, filter: &PostFilter) -> Result<Vec<PostCard>, StoreError> {
        self.inner.find_posts(filter)
    }
    fn list_themes(&self) -> Result<Vec<ThemeOption>, StoreError> {
        self.inner.list_themes()
    }
    fn list_series(&self) -> Result<Vec<SeriesOption>, StoreError> {
        self.inner.list_series()
    }
    fn used_theme_ids(&self) -> Result<Vec<String>, StoreError> {
        self.inner.used_theme_ids()
    }
    fn fetch_checked(&self, selector: &DocSelector, limit: Option<usize>) -> Result<Fetched, StoreError> {
        self.inner.fetch_checked(selector, limit)
    }
    fn count(&self, selector: &DocSelector) -> Result<usize, StoreError> {
        self.inner.count(selector)
    }
}

impl<S: ContentWrite> ContentWrite for RecordingStore<S> {
    fn commit(&self, tx: &Transaction) -> Result<CommitReceipt, StoreError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit(tx)
    }
    fn ensure_writable(&self) -> Result<(), StoreError> {
        self.inner.ensure_writable()
    }
}
