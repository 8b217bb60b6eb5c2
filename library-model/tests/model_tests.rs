use library_model::media::{classify_video, image_asset_url, youtube_id, Thumbnail, VideoKind};
use library_model::portable_text::{blocks_to_plain_text, text_to_blocks};
use library_model::sdg::sdg_title;
use library_model::text::{clean_string, new_key, parse_day_month_year, slugify};
use library_model::{Document, ModelError, Partners, PostCard};
use serde_json::json;

#[test]
fn post_document_keeps_unknown_keys_out_of_typed_fields() {
    let raw = json!({
        "_id": "post-1",
        "_type": "post",
        "_rev": "abc",
        "title": "Financing the Goals",
        "slug": {"_type": "slug", "current": "financing-the-goals"},
        "partners": ["UNDP", null, "", "World Bank"],
        "concept": "https://example.org/cn.pdf",
        "legacyNotes": "x",
        "sdgs": [{"_type": "reference", "_ref": "sdg-17"}]
    });
    let doc = Document::from_value(raw).expect("post decodes");
    let post = doc.as_post().expect("post variant");
    assert_eq!(post.system.id.as_str(), "post-1");
    assert_eq!(post.system.rev.as_deref(), Some("abc"));
    assert_eq!(post.partners_text().as_deref(), Some("UNDP, World Bank"));
    let unknown: Vec<&str> = post.extra.keys().map(String::as_str).collect();
    assert_eq!(unknown, vec!["concept", "legacyNotes"]);
    assert_eq!(post.sdg_refs().collect::<Vec<_>>(), vec!["sdg-17"]);
    assert!(post.sdgs.as_ref().unwrap()[0].key.is_none());
}

#[test]
fn document_round_trip_restores_type_and_extra_keys() {
    let raw = json!({
        "_id": "theme-1",
        "_type": "theme",
        "title": "Energy",
        "imageUrl": "https://sdgs.un.org/a.jpg",
        "color": "green"
    });
    let doc = Document::from_value(raw.clone()).unwrap();
    assert_eq!(doc.to_value(), raw);
}

#[test]
fn unknown_types_are_kept_verbatim() {
    let raw = json!({"_id": "c-1", "_type": "country", "title": "Kenya"});
    let doc = Document::from_value(raw.clone()).unwrap();
    assert_eq!(doc.doc_type(), "country");
    assert_eq!(doc.id(), Some("c-1"));
    assert_eq!(doc.title(), Some("Kenya"));
    assert_eq!(doc.to_value(), raw);
}

#[test]
fn boundary_rejects_non_objects_and_untyped_documents() {
    assert_eq!(Document::from_value(json!([1, 2])), Err(ModelError::NotAnObject));
    assert_eq!(Document::from_value(json!({"_id": "x"})), Err(ModelError::MissingType));
}

#[test]
fn validation_enforces_ranges_and_required_fields() {
    let sdg = Document::from_value(json!({"_id": "s", "_type": "sdg", "number": 18})).unwrap();
    assert!(sdg.validate().is_err());
    let series = Document::from_value(json!({"_id": "r", "_type": "series", "year": 2024, "title": "2024"})).unwrap();
    assert!(series.validate().is_ok());
    let old = Document::from_value(json!({"_id": "r", "_type": "series", "year": 1999})).unwrap();
    assert!(old.validate().is_err());
    let untitled = Document::from_value(json!({"_id": "p", "_type": "post", "slug": {"current": "p"}})).unwrap();
    assert!(untitled.validate().is_err());
}

#[test]
fn post_card_drops_dangling_references() {
    let card: PostCard = serde_json::from_value(json!({
        "_id": "p1",
        "title": "Water",
        "sdgNums": [6, null, 42],
        "themeIds": ["t1", null],
        "series": {"_id": "s2024", "title": "2024 SDGs in Practice"}
    }))
    .unwrap();
    assert_eq!(card.sdg_nums, vec![6]);
    assert_eq!(card.theme_ids, vec!["t1".to_string()]);
    assert_eq!(card.thumbnail(), Thumbnail::Fallback);
}

#[test]
fn slugify_matches_studio_slugs() {
    assert_eq!(slugify("  Climate & Energy: 2030!  "), "climate-and-energy-2030");
    assert_eq!(slugify("“Quoted” title"), "quoted-title");
    let long = "word ".repeat(40);
    let slug = slugify(&long);
    assert!(slug.len() <= 96);
    assert!(!slug.ends_with('-'));
}

#[test]
fn clean_string_normalises_cells() {
    assert_eq!(clean_string("  \"Hello\u{00A0}  world\"  "), "Hello world");
    assert_eq!(clean_string("it\u{2019}s"), "it's");
}

#[test]
fn day_month_year_dates() {
    assert_eq!(parse_day_month_year("12-Jul-23").as_deref(), Some("2023-07-12"));
    assert_eq!(parse_day_month_year("1-jan-2021").as_deref(), Some("2021-01-01"));
    assert_eq!(parse_day_month_year("2023-07-12"), None);
    assert_eq!(parse_day_month_year("32-Jul-23"), None);
    assert_eq!(parse_day_month_year(""), None);
}

#[test]
fn paragraphs_become_keyed_blocks_and_flatten_back() {
    let blocks = text_to_blocks("First  paragraph\nstill first\n\n\nSecond one");
    assert_eq!(blocks.len(), 2);
    assert!(blocks.iter().all(|b| b.key.is_some()));
    assert_eq!(blocks_to_plain_text(&blocks), "First paragraph still first\n\nSecond one");
}

#[test]
fn video_helpers() {
    assert_eq!(classify_video("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some(VideoKind::YouTube));
    assert_eq!(classify_video("https://webtv.un.org/en/asset/k1x"), Some(VideoKind::UnWebTv));
    assert_eq!(classify_video("https://cdnapisec.kaltura.com/p/1"), Some(VideoKind::Kaltura));
    assert_eq!(classify_video("not a url"), None);
    assert_eq!(youtube_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(youtube_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(youtube_id("dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(youtube_id("https://webtv.un.org/en/asset/k1x"), None);
}

#[test]
fn image_urls_are_built_from_asset_refs() {
    let image = json!({"_type": "image", "asset": {"_ref": "image-abc123-2000x3000-jpg"}});
    assert_eq!(
        image_asset_url("proj", "production", &image, 600, 400).as_deref(),
        Some("https://cdn.sanity.io/images/proj/production/abc123-2000x3000.jpg?w=600&h=400&fit=crop&auto=format")
    );
}

#[test]
fn misc_helpers() {
    assert_eq!(sdg_title(13), Some("Climate Action"));
    assert_eq!(sdg_title(0), None);
    let key = new_key("lnk");
    assert!(key.starts_with("lnk_") && key.len() == 16);
    assert!(Partners::List(vec![]).is_list());
}
