mod common;

use chrono::NaiveDate;
use library_model::DocType;
use library_store::{
    ContentRead, ContentWrite, DeleteTarget, DocSelector, Mutation, Patch, PostFilter, RawFilterParams, StoreError,
    Transaction,
};
use serde_json::json;

use common::seeded_repo;

fn filter(series: Option<&str>, sdgs: Option<&str>, themes: Option<&str>, q: Option<&str>) -> PostFilter {
    PostFilter::from_params(&RawFilterParams {
        series: series.map(str::to_string),
        sdgs: sdgs.map(str::to_string),
        themes: themes.map(str::to_string),
        q: q.map(str::to_string),
    })
}

fn ids(repo: &impl ContentRead, f: &PostFilter) -> Vec<String> {
    repo.find_posts(f)
        .expect("query runs")
        .into_iter()
        .map(|c| c.id.0)
        .collect()
}

#[test]
fn unfiltered_returns_all_posts_newest_first() {
    let repo = seeded_repo();
    assert_eq!(ids(&repo, &PostFilter::default()), vec!["p1", "p2", "p3", "p4"]);
}

#[test]
fn sdg_facet_is_any_of_and_keeps_date_order() {
    let repo = seeded_repo();
    assert_eq!(ids(&repo, &filter(None, Some("3,13"), None, None)), vec!["p1", "p2", "p3"]);
    assert_eq!(ids(&repo, &filter(None, Some("7"), None, None)), vec!["p1"]);
}

#[test]
fn facets_combine_with_and() {
    let repo = seeded_repo();
    assert_eq!(ids(&repo, &filter(Some("2024"), Some("3,13"), None, None)), vec!["p2", "p3"]);
    assert_eq!(ids(&repo, &filter(Some("2024"), Some("7"), None, None)), Vec::<String>::new());
    assert_eq!(ids(&repo, &filter(None, None, Some("t-energy"), None)), vec!["p1"]);
    assert_eq!(ids(&repo, &filter(Some("2024,2025"), None, Some("t-water,t-energy"), None)), vec!["p1", "p2"]);
}

#[test]
fn out_of_range_values_are_no_constraint() {
    let repo = seeded_repo();
    assert_eq!(ids(&repo, &filter(Some("1999"), Some("0,18"), Some(" , "), Some("   "))).len(), 4);
}

#[test]
fn text_search_needs_every_term_in_one_field() {
    let repo = seeded_repo();
    // p1 and p3 by title (either order), p4 by description.
    assert_eq!(ids(&repo, &filter(None, None, None, Some("clean  energy"))), vec!["p1", "p3", "p4"]);
    assert_eq!(ids(&repo, &filter(None, None, None, Some("CLEAN water"))), vec!["p4"]);
    assert_eq!(ids(&repo, &filter(None, None, None, Some("undp"))), vec!["p1"]);
    assert_eq!(ids(&repo, &filter(None, None, None, Some("100%"))), Vec::<String>::new());
}

#[test]
fn post_cards_carry_resolved_facets() {
    let repo = seeded_repo();
    let cards = repo.find_posts(&filter(None, Some("7"), None, None)).expect("query runs");
    let card = &cards[0];
    let mut sdgs = card.sdg_nums.clone();
    sdgs.sort();
    assert_eq!(sdgs, vec![7, 13]);
    assert_eq!(card.theme_ids, vec!["t-energy".to_string()]);
    assert_eq!(card.series.as_ref().and_then(|s| s.title.as_deref()), Some("2025"));
    assert_eq!(card.slug_str(), Some("p1"));
    assert_eq!(card.partners_text().as_deref(), Some("UNDP"));

    let p4 = repo.find_posts(&filter(None, None, None, Some("governance"))).expect("query runs");
    assert!(p4[0].series.is_none());
    assert!(p4[0].sdg_nums.is_empty());
}

#[test]
fn option_lists_are_ordered() {
    let repo = seeded_repo();
    let themes: Vec<String> = repo.list_themes().unwrap().into_iter().map(|t| t.title).collect();
    assert_eq!(themes, vec!["Energy", "Water"]);
    let years: Vec<Option<i32>> = repo.list_series().unwrap().into_iter().map(|s| s.year).collect();
    assert_eq!(years, vec![Some(2025), Some(2024)]);
    assert_eq!(repo.used_theme_ids().unwrap(), vec!["t-energy", "t-water"]);
}

#[test]
fn selectors_count_and_fetch() {
    let repo = seeded_repo();
    assert_eq!(repo.count(&DocSelector::OfType(DocType::Post)).unwrap(), 4);
    assert_eq!(repo.count(&DocSelector::Posts { series_year: Some(2024), before: None }).unwrap(), 2);
    let before = NaiveDate::from_ymd_opt(2024, 1, 1);
    assert_eq!(repo.count(&DocSelector::Posts { series_year: None, before }).unwrap(), 1);
    assert_eq!(repo.count(&DocSelector::PostsWithField("partners".into())).unwrap(), 2);

    let found = repo.fetch_documents(&DocSelector::PostBySlug("p3".into()), None).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title(), Some("Energy in cities, made clean"));
    let limited = repo.fetch_documents(&DocSelector::OfType(DocType::Sdg), Some(2)).unwrap();
    assert_eq!(limited.len(), 2);
}

#[test]
fn groq_selectors_are_rejected_locally() {
    let repo = seeded_repo();
    let err = repo.count(&DocSelector::Groq("*[_type == \"post\"]".into())).unwrap_err();
    assert!(matches!(err, StoreError::Unsupported(_)));
}

#[test]
fn patches_apply_in_order_and_refresh_search_columns() {
    let repo = seeded_repo();
    let patch = Patch::new("p2")
        .set("title", json!("Health and Clean Energy"))
        .set_if_missing("links", json!([]))
        .append("links", vec![json!({"_type": "linkItem", "_key": "l1", "title": "Report", "url": "https://x.org"})])
        .unset(["date"]);
    repo.commit(&Transaction::new().with(Mutation::Patch(patch))).expect("patch commits");

    let doc = repo.get_document("p2").unwrap().expect("p2 exists");
    let post = doc.as_post().unwrap();
    assert_eq!(post.links.as_ref().map(Vec::len), Some(1));
    assert!(post.date.is_none());
    assert!(post.system.updated_at.is_some());
    assert!(ids(&repo, &filter(None, None, None, Some("clean energy"))).contains(&"p2".to_string()));
}

#[test]
fn create_conflicts_and_transaction_rolls_back() {
    let repo = seeded_repo();
    let dup = Mutation::Create(json!({
        "_id": "p1", "_type": "post", "title": "Again", "slug": {"_type": "slug", "current": "p1-again"}
    }));
    let tx = Transaction::new()
        .with(Mutation::Delete(DeleteTarget::Id("p4".into())))
        .with(dup);
    assert!(matches!(repo.commit(&tx), Err(StoreError::Conflict(_))));
    assert!(repo.get_document("p4").unwrap().is_some(), "earlier mutation rolled back");

    let slug_clash = Mutation::Create(json!({
        "_type": "post", "title": "Other", "slug": {"_type": "slug", "current": "p1"}
    }));
    assert!(matches!(repo.commit(&Transaction::new().with(slug_clash)), Err(StoreError::Conflict(_))));

    let missing = Mutation::Patch(Patch::new("nope").set("title", json!("x")));
    assert!(matches!(repo.commit(&Transaction::new().with(missing)), Err(StoreError::NotFound(_))));
}

#[test]
fn invalid_documents_are_rejected_and_roll_back() {
    let repo = seeded_repo();
    let bad_goal = Mutation::Create(json!({"_id": "sdg-99", "_type": "sdg", "title": "Nope", "number": 99}));
    let err = repo.commit(&Transaction::new().with(bad_goal.clone())).unwrap_err();
    assert!(matches!(err, StoreError::Model(_)), "{err}");
    assert_eq!(repo.count(&DocSelector::OfType(DocType::Sdg)).unwrap(), 3);

    let good_goal = Mutation::Create(json!({"_id": "sdg-4", "_type": "sdg", "title": "Quality Education", "number": 4}));
    let tx = Transaction::new().with(good_goal).with(bad_goal);
    assert!(matches!(repo.commit(&tx), Err(StoreError::Model(_))));
    assert!(repo.get_document("sdg-4").unwrap().is_none(), "valid create rolled back with the invalid one");

    let yearless = Mutation::CreateOrReplace(json!({"_id": "s2024", "_type": "series", "title": "No year"}));
    assert!(matches!(repo.commit(&Transaction::new().with(yearless)), Err(StoreError::Model(_))));
    assert_eq!(repo.get_document("s2024").unwrap().and_then(|d| d.title().map(str::to_string)).as_deref(), Some("2024"));

    let untitled = Mutation::Patch(Patch::new("p2").unset(["title"]));
    assert!(matches!(repo.commit(&Transaction::new().with(untitled)), Err(StoreError::Model(_))));
    assert_eq!(repo.get_document("p2").unwrap().and_then(|d| d.title().map(str::to_string)).as_deref(), Some("Health Systems"));
}

#[test]
fn transactions_check_created_documents_without_a_store() {
    let ok = Transaction::new()
        .with(Mutation::Create(json!({"_type": "theme", "title": "Oceans"})))
        .with(Mutation::Patch(Patch::new("p1").unset(["title"])));
    assert!(ok.check_documents().is_ok());

    let bad = Transaction::new().with(Mutation::CreateOrReplace(json!({"_id": "x", "_type": "sdg", "number": 0})));
    assert!(matches!(bad.check_documents(), Err(StoreError::Model(_))));
}

#[test]
fn create_assigns_ids_and_delete_by_query_removes_matches() {
    let repo = seeded_repo();
    let receipt = repo
        .commit(&Transaction::new().with(Mutation::Create(json!({"_type": "theme", "title": "Oceans"}))))
        .expect("create commits");
    assert_eq!(receipt.document_ids.len(), 1);
    assert_eq!(repo.count(&DocSelector::OfType(DocType::Theme)).unwrap(), 3);

    let selector = DocSelector::Posts { series_year: Some(2024), before: None };
    let receipt = repo
        .commit(&Transaction::new().with(Mutation::Delete(DeleteTarget::Query(selector.clone()))))
        .expect("delete commits");
    let mut deleted = receipt.document_ids;
    deleted.sort();
    assert_eq!(deleted, vec!["p2", "p3"]);
    assert_eq!(repo.count(&selector).unwrap(), 0);
    assert_eq!(repo.count(&DocSelector::OfType(DocType::Post)).unwrap(), 2);
}

#[test]
fn file_backed_mirror_persists() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("mirror.sqlite");
    {
        let repo = library_store::sqlite_repo::SqliteRepo::open(&path).expect("open file");
        repo.upsert_documents(&common::fixture_documents()).unwrap();
    }
    let reopened = library_store::sqlite_repo::SqliteRepo::open(&path).expect("reopen");
    assert_eq!(reopened.count(&DocSelector::OfType(DocType::Series)).unwrap(), 2);
    let counts = reopened.type_counts().unwrap();
    assert!(counts.contains(&("post".to_string(), 4)));
}
