use library_model::DocType;
use library_store::config::{ConfigError, StoreConfig, DEFAULT_API_VERSION};
use library_store::filters::{parse_sdgs, parse_theme_ids, parse_years, TextPattern};
use library_store::groq::{compose_post_query, count_query, fetch_query, selector_query};
use library_store::{DeleteTarget, DocSelector, Mutation, Patch, PostFilter, RawFilterParams, Transaction};
use serde_json::{json, Value};

#[test]
fn integer_lists_are_trimmed_ranged_and_deduplicated() {
    assert_eq!(parse_years(Some("2024, 1999,abc,2025,2024")), Some(vec![2024, 2025]));
    assert_eq!(parse_years(Some("2101")), None);
    assert_eq!(parse_sdgs(Some("0,3,18, 13")), Some(vec![3, 13]));
    assert_eq!(parse_sdgs(Some("")), None);
    assert_eq!(parse_sdgs(None), None);
    assert_eq!(parse_theme_ids(Some(" a, ,b ,a")), Some(vec!["a".to_string(), "b".to_string()]));
    assert_eq!(parse_theme_ids(Some(" , ")), None);
}

#[test]
fn integer_parts_must_be_whole_numbers() {
    // A trailing suffix or a fraction drops the part instead of reading its leading digits.
    assert_eq!(parse_sdgs(Some("3x, 13")), Some(vec![13]));
    assert_eq!(parse_sdgs(Some("3x")), None);
    assert_eq!(parse_years(Some("2024.5")), None);
    assert_eq!(parse_years(Some("2024.5, 2025")), Some(vec![2025]));
    assert_eq!(parse_years(Some("+2024")), Some(vec![2024]));
}

#[test]
fn text_pattern_wraps_and_joins_terms() {
    let p = TextPattern::parse("  clean \t energy ").expect("non-empty");
    assert_eq!(p.pattern(), "*clean*energy*");
    assert_eq!(p.term_patterns(), vec!["*clean*", "*energy*"]);
    assert!(p.matches("ENERGY that is clean"));
    assert!(!p.matches("clean water"));
    assert!(TextPattern::parse("   ").is_none());
}

#[test]
fn raw_params_pick_known_keys() {
    let raw = RawFilterParams::from_pairs([("sdgs", "3"), ("page", "2"), ("q", "water")]);
    assert_eq!(raw.sdgs.as_deref(), Some("3"));
    assert_eq!(raw.q.as_deref(), Some("water"));
    assert!(raw.series.is_none());
    assert!(PostFilter::from_params(&RawFilterParams::default()).is_empty());
}

#[test]
fn composed_query_binds_null_for_inactive_facets() {
    let filter = PostFilter::from_params(&RawFilterParams {
        series: Some("2024".into()),
        q: Some("clean energy".into()),
        ..Default::default()
    });
    let composed = compose_post_query(&filter);
    assert_eq!(composed.params["years"], json!([2024]));
    assert_eq!(composed.params["sdgs"], Value::Null);
    assert_eq!(composed.params["themes"], Value::Null);
    assert_eq!(composed.params["qPattern"], json!("*clean*energy*"));
    assert_eq!(composed.params["qTerms"], json!(["*clean*", "*energy*"]));
    assert!(composed.query.starts_with(r#"*[_type == "post""#));
    assert!(composed.query.contains("| order(date desc)"));
    assert!(composed.query.contains(r#""sdgNums": sdgs[]->number"#));
    assert!(composed.query.contains("series->year in $years"));
}

#[test]
fn selectors_render_as_document_queries() {
    assert_eq!(selector_query(&DocSelector::OfType(DocType::Theme)).unwrap(), r#"*[_type == "theme"]"#);
    assert_eq!(
        selector_query(&DocSelector::PostBySlug("a\"b".into())).unwrap(),
        r#"*[_type == "post" && slug.current == "a\"b"]"#
    );
    let sel = DocSelector::Posts {
        series_year: Some(2023),
        before: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
    };
    assert_eq!(
        selector_query(&sel).unwrap(),
        r#"*[_type == "post" && series->year == 2023 && defined(date) && date < "2024-01-01"]"#
    );
    assert_eq!(count_query(&DocSelector::PostsWithField("concept".into())).unwrap(), r#"count(*[_type == "post" && defined(concept)])"#);
    assert!(selector_query(&DocSelector::PostsWithField("bad field".into())).is_err());
    assert_eq!(fetch_query(&DocSelector::OfType(DocType::Sdg), Some(10)).unwrap(), r#"*[_type == "sdg"][0...10]"#);
}

#[test]
fn transaction_wire_keeps_patch_op_order() {
    let patch = Patch::new("p1")
        .set_if_missing("links", json!([]))
        .append("links", vec![json!({"_key": "k"})])
        .unset(["concept"])
        .unset(Vec::<String>::new());
    assert_eq!(patch.ops.len(), 3);
    assert_eq!(patch.describe(), "setIfMissing links; append 1 to links; unset [concept]");

    let tx = Transaction::new()
        .with(Mutation::Patch(patch))
        .with(Mutation::Delete(DeleteTarget::Query(DocSelector::OfType(DocType::Theme))))
        .with(Mutation::CreateOrReplace(json!({"_id": "t1", "_type": "theme"})));
    let wire = tx.to_wire().unwrap();
    assert_eq!(
        wire,
        json!({"mutations": [
            {"patch": {"id": "p1", "setIfMissing": {"links": []}}},
            {"patch": {"id": "p1", "insert": {"after": "links[-1]", "items": [{"_key": "k"}]}}},
            {"patch": {"id": "p1", "unset": ["concept"]}},
            {"delete": {"query": "*[_type == \"theme\"]"}},
            {"createOrReplace": {"_id": "t1", "_type": "theme"}},
        ]})
    );
}

#[test]
fn patch_applies_dotted_paths() {
    let mut body = json!({"slug": {"current": "old"}, "keep": 1}).as_object().cloned().unwrap();
    Patch::new("x")
        .set("slug.current", json!("new"))
        .set_if_missing("keep", json!(2))
        .set_if_missing("meta.source", json!("csv"))
        .unset(["slug._type", "gone"])
        .apply(&mut body)
        .unwrap();
    assert_eq!(Value::Object(body), json!({"slug": {"current": "new"}, "keep": 1, "meta": {"source": "csv"}}));
}

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let owned: Vec<(String, String)> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key: &str| owned.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

#[test]
fn config_reads_fallback_keys_and_defaults() {
    let cfg = StoreConfig::from_lookup(env(&[
        ("NEXT_PUBLIC_SANITY_PROJECT_ID", "abc123"),
        ("SANITY_DATASET", "production"),
        ("SANITY_AUTH_TOKEN", "tok"),
    ]))
    .expect("valid config");
    assert_eq!(cfg.project_id, "abc123");
    assert_eq!(cfg.api_version, DEFAULT_API_VERSION);
    assert_eq!(cfg.token.as_deref(), Some("tok"));
    assert_eq!(cfg.query_url(), "https://abc123.api.sanity.io/v2025-09-13/data/query/production");
    assert!(cfg.mutate_url().starts_with("https://abc123.api.sanity.io/v2025-09-13/data/mutate/production"));
}

#[test]
fn config_errors_name_the_missing_key() {
    assert_eq!(
        StoreConfig::from_lookup(env(&[("SANITY_DATASET", "production")])),
        Err(ConfigError::Missing("SANITY_PROJECT_ID"))
    );
    assert_eq!(
        StoreConfig::from_lookup(env(&[("SANITY_PROJECT_ID", "p"), ("SANITY_DATASET", "  ")])),
        Err(ConfigError::Missing("SANITY_DATASET"))
    );
    let bad_cdn = StoreConfig::from_lookup(env(&[("SANITY_PROJECT_ID", "p"), ("SANITY_DATASET", "d"), ("SANITY_USE_CDN", "maybe")]));
    assert!(matches!(bad_cdn, Err(ConfigError::Invalid { .. })));

    let cdn = StoreConfig::from_lookup(env(&[("SANITY_PROJECT_ID", "p"), ("SANITY_DATASET", "d"), ("SANITY_USE_CDN", "true")])).unwrap();
    assert_eq!(cdn.query_url(), "https://p.apicdn.sanity.io/v2025-09-13/data/query/d");
    assert!(cdn.require_token().is_err());
}
