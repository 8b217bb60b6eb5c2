#![allow(dead_code)]

use library_model::Document;
use library_store::sqlite_repo::SqliteRepo;
use serde_json::{json, Value};

pub fn doc(value: Value) -> Document {
    Document::from_value(value).expect("fixture document decodes")
}

fn post(id: &str, title: &str, date: &str, series: Option<&str>, sdgs: &[&str], themes: &[&str]) -> Value {
    let mut v = json!({
        "_id": id,
        "_type": "post",
        "title": title,
        "slug": {"_type": "slug", "current": id},
        "date": date,
        "sdgs": sdgs.iter().map(|s| json!({"_type": "reference", "_ref": s, "_key": format!("k-{s}")})).collect::<Vec<_>>(),
        "themes": themes.iter().map(|t| json!({"_type": "reference", "_ref": t, "_key": format!("k-{t}")})).collect::<Vec<_>>(),
    });
    if let Some(s) = series {
        v["series"] = json!({"_type": "reference", "_ref": s});
    }
    v
}

/// Small dataset: three SDGs, two series, two themes, four posts.
///
/// | post | date       | series | sdgs   | themes   | text                          |
/// |------|------------|--------|--------|----------|-------------------------------|
/// | p1   | 2025-03-01 | 2025   | 7, 13  | t-energy | title "Clean Energy for All"  |
/// | p2   | 2024-06-10 | 2024   | 3      | t-water  |                               |
/// | p3   | 2024-01-05 | 2024   | 13     |          | title has both words reversed |
/// | p4   | 2023-11-01 | none   | none   |          | description mentions both     |
pub fn fixture_documents() -> Vec<Document> {
    let mut p1 = post("p1", "Clean Energy for All", "2025-03-01", Some("s2025"), &["sdg-7", "sdg-13"], &["t-energy"]);
    p1["partners"] = json!("UNDP");
    let p2 = post("p2", "Health Systems", "2024-06-10", Some("s2024"), &["sdg-3"], &["t-water"]);
    let p3 = post("p3", "Energy in cities, made clean", "2024-01-05", Some("s2024"), &["sdg-13"], &[]);
    let mut p4 = post("p4", "Water Governance", "2023-11-01", None, &[], &[]);
    p4["partners"] = json!(["Clean Water Org", null]);
    p4["description"] = json!([{
        "_type": "block", "_key": "b1", "style": "normal", "markDefs": [],
        "children": [{"_type": "span", "_key": "s1", "text": "Financing a clean energy transition", "marks": []}]
    }]);

    vec![
        doc(json!({"_id": "sdg-3", "_type": "sdg", "title": "Good Health and Well-being", "number": 3})),
        doc(json!({"_id": "sdg-7", "_type": "sdg", "title": "Affordable and Clean Energy", "number": 7})),
        doc(json!({"_id": "sdg-13", "_type": "sdg", "title": "Climate Action", "number": 13})),
        doc(json!({"_id": "s2024", "_type": "series", "title": "2024", "year": 2024})),
        doc(json!({"_id": "s2025", "_type": "series", "title": "2025", "year": 2025})),
        doc(json!({"_id": "t-water", "_type": "theme", "title": "Water"})),
        doc(json!({"_id": "t-energy", "_type": "theme", "title": "Energy"})),
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
