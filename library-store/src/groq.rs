//! GROQ text for the queries the library issues against the hosted store.

use serde_json::{json, Map, Value};

use crate::filters::PostFilter;
use crate::{DocSelector, StoreError};

/// Fields returned for each post card. Reference lists are dereferenced server-side.
pub const POST_CARD_PROJECTION: &str = r#"{
  _id, title, slug, partners, mainImage, youtube,
  "sdgNums": sdgs[]->number,
  "themeIds": themes[]._ref,
  series->{ _id, title }
}"#;

// Every facet is always present; an inactive one is `null` and its clause is a tautology.
const POST_FILTER: &str = r#"_type == "post" && (
  ($years == null || (defined(series->year) && series->year in $years)) &&
  ($sdgs == null || count((sdgs[]->number)[@ in $sdgs]) > 0) &&
  ($themes == null || count(themes[@._ref in $themes]) > 0) &&
  ($qPattern == null || (
    coalesce(title, "") match $qTerms ||
    coalesce(partners, "") match $qTerms ||
    coalesce(pt::text(description), "") match $qTerms
  ))
)"#;

pub const THEMES_QUERY: &str = r#"*[_type == "theme"] | order(title asc){ _id, title }"#;
pub const SERIES_QUERY: &str = r#"*[_type == "series"] | order(year desc, title asc){ _id, title, year }"#;
pub const USED_THEME_IDS_QUERY: &str = r#"array::unique(*[_type == "post" && count(themes) > 0].themes[]._ref)"#;

/// A query string plus its bound parameters (names without the `$`).
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    pub query: String,
    pub params: Map<String, Value>,
}

pub fn compose_post_query(filter: &PostFilter) -> ComposedQuery {
    let mut params = Map::new();
    params.insert("years".into(), json!(filter.years));
    params.insert("sdgs".into(), json!(filter.sdgs));
    params.insert("themes".into(), json!(filter.themes));
    params.insert("qPattern".into(), json!(filter.text.as_ref().map(|t| t.pattern())));
    // `match` against an array requires every pattern to hit, which gives all-terms semantics.
    params.insert("qTerms".into(), json!(filter.text.as_ref().map(|t| t.term_patterns())));
    ComposedQuery {
        query: format!("*[{POST_FILTER}] | order(date desc){POST_CARD_PROJECTION}"),
        params,
    }
}

/// Document query (`*[...]`) for a selector. Values are inlined as JSON literals.
pub fn selector_query(selector: &DocSelector) -> Result<String, StoreError> {
    let filter = match selector {
        DocSelector::OfType(t) => format!("_type == {}", literal(t.as_str())),
        DocSelector::PostBySlug(slug) => format!(r#"_type == "post" && slug.current == {}"#, literal(slug)),
        DocSelector::PostsWithField(field) => {
            if !is_identifier(field) {
                return Err(StoreError::Unsupported(format!("field name {field:?}")));
            }
            format!(r#"_type == "post" && defined({field})"#)
        }
        DocSelector::Posts { series_year, before } => {
            let mut clauses = vec![r#"_type == "post""#.to_string()];
            if let Some(y) = series_year {
                clauses.push(format!("series->year == {y}"));
            }
            if let Some(d) = before {
                clauses.push(format!("defined(date) && date < {}", literal(&d.format("%Y-%m-%d").to_string())));
            }
            clauses.join(" && ")
        }
        DocSelector::Groq(q) => return Ok(q.trim().to_string()),
    };
    Ok(format!("*[{filter}]"))
}

pub fn count_query(selector: &DocSelector) -> Result<String, StoreError> {
    Ok(format!("count({})", selector_query(selector)?))
}

pub fn fetch_query(selector: &DocSelector, limit: Option<usize>) -> Result<String, StoreError> {
    let base = selector_query(selector)?;
    Ok(match limit {
        Some(n) => format!("{base}[0...{n}]"),
        None => base,
    })
}

fn literal(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
