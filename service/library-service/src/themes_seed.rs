//! Replace every theme with the canonical UN topic list.
//!
//! Card images come from the topic-card markup bundled under `data/`; a topic
//! with no card there is created without `imageUrl`.

use std::collections::HashMap;

use library_model::text::{collapse_whitespace, slugify};
use library_model::DocType;
use library_store::{ContentRead, ContentWrite, DeleteTarget, DocSelector, Mutation, Transaction};
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::info;
use url::Url;

use crate::ServiceError;

pub const TOPICS_BASE: &str = "https://sdgs.un.org";

const TOPIC_CARDS_HTML: &str = include_str!("../data/topic_cards.html");

/// Canonical topics as `(title, link)`.
pub const TOPICS: [(&str, &str); 39] = [
    ("Africa", "https://sdgs.un.org/topics/africa"),
    ("Atmosphere", "https://sdgs.un.org/topics/atmosphere"),
    ("Biodiversity and ecosystems", "https://sdgs.un.org/topics/biodiversity-and-ecosystems"),
    ("Capacity Development", "https://sdgs.un.org/topics/capacity-development"),
    ("Chemicals and waste", "https://sdgs.un.org/topics/chemicals-and-waste"),
    ("Climate Action and Synergies", "https://sdgs.un.org/topics/climate-action-and-synergies"),
    (
        "Desertification, land degradation and drought",
        "https://sdgs.un.org/topics/desertification-land-degradation-and-drought",
    ),
    ("Disaster risk reduction", "https://sdgs.un.org/topics/disaster-risk-reduction"),
    ("Education", "https://sdgs.un.org/topics/education"),
    (
        "Employment, decent work for all and social protection",
        "https://sdgs.un.org/topics/employment-decent-work-for-all-and-social-protection",
    ),
    ("Energy", "https://sdgs.un.org/topics/energy"),
    ("Finance", "https://sdgs.un.org/topics/finance"),
    ("Financial inclusion", "https://sdgs.un.org/topics/financial-inclusion"),
    (
        "Food security and nutrition and sustainable agriculture",
        "https://sdgs.un.org/topics/food-security-and-nutrition-and-sustainable-agriculture",
    ),
    ("Forests", "https://sdgs.un.org/topics/forests"),
    (
        "Gender equality and women\u{2019}s empowerment",
        "https://sdgs.un.org/topics/gender-equality-and-womens-empowerment",
    ),
    ("Green economy", "https://sdgs.un.org/topics/green-economy"),
    ("Health and population", "https://sdgs.un.org/topics/health-and-population"),
    ("Indicators", "https://sdgs.un.org/topics/indicators"),
    ("Industry", "https://sdgs.un.org/topics/industry"),
    (
        "Information for integrated Decision-Making and Participation",
        "https://sdgs.un.org/topics/information-integrated-decision-making-and-participation",
    ),
    (
        "Institutional Frameworks and international cooperation for Sustainable Development",
        "https://sdgs.un.org/topics/institutional-frameworks-and-international-cooperation-sustainable-development",
    ),
    ("Mountains", "https://sdgs.un.org/topics/mountains"),
    ("Multi-stakeholder partnerships", "https://sdgs.un.org/topics/multi-stakeholder-partnerships"),
    ("National strategies and SDG integration", "https://sdgs.un.org/topics/national-strategies-and-sdg-integration"),
    ("Poverty eradication", "https://sdgs.un.org/topics/poverty-eradication"),
    ("Rural Development", "https://sdgs.un.org/topics/rural-development"),
    ("Science", "https://sdgs.un.org/topics/science"),
    ("Small Island Developing States", "https://sdgs.un.org/topics/small-island-developing-states"),
    ("Sustainable cities and human settlements", "https://sdgs.un.org/topics/sustainable-cities-and-human-settlements"),
    ("Sustainable consumption and production", "https://sdgs.un.org/topics/sustainable-consumption-and-production"),
    ("Sustainable tourism", "https://sdgs.un.org/topics/sustainable-tourism"),
    ("Sustainable transport", "https://sdgs.un.org/topics/sustainable-transport"),
    ("Technical Cooperation", "https://sdgs.un.org/topics/technical-cooperation"),
    ("Technology", "https://sdgs.un.org/topics/technology"),
    ("Trade", "https://sdgs.un.org/topics/trade"),
    ("Violence against children", "https://sdgs.un.org/topics/violence-against-children"),
    ("Stakeholder Engagement", "https://sdgs.un.org/topics/stakeholder-engagement"),
    ("Voluntary National Reviews (VNRs)", "https://sdgs.un.org/topics/voluntary-national-reviews-vnrs"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Themes present before seeding.
    pub deleted: usize,
    pub created: usize,
    pub with_image: usize,
    pub dry_run: bool,
}

/// Drop a trailing `/` from the path; unparseable input is only trimmed.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(mut url) => {
            let path = url.path().trim_end_matches('/').to_string();
            url.set_path(&path);
            url.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

/// Resolve a site-relative path against [`TOPICS_BASE`].
pub fn absolutize(path_or_url: &str) -> Option<String> {
    let p = path_or_url.trim();
    if p.is_empty() {
        return None;
    }
    let lower = p.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(p.to_string());
    }
    if p.starts_with('/') {
        return Some(format!("{TOPICS_BASE}{p}"));
    }
    Some(format!("{TOPICS_BASE}/{}", p.trim_start_matches('/')))
}

/// Card title -> absolute background image URL.
pub fn extract_image_map(html: &str) -> Result<HashMap<String, String>, regex::Error> {
    let card = Regex::new(r#"(?i)<div\s+class=["']card\b[^>]*>"#)?;
    let title = Regex::new(r#"(?i)<h4[^>]*class=["']card-title["'][^>]*>([^<]+)</h4>"#)?;
    let style = Regex::new(r#"(?i)style=["'][^"']*background:\s*url\(['"]?([^)'"]+)['"]?\)"#)?;

    let mut map = HashMap::new();
    for block in card.split(html).skip(1) {
        let (Some(t), Some(s)) = (title.captures(block), style.captures(block)) else { continue };
        if let Some(url) = absolutize(&s[1]) {
            map.insert(collapse_whitespace(&t[1]), url);
        }
    }
    Ok(map)
}

/// Theme documents to create, with stable ids derived from the title.
pub fn theme_documents() -> Result<Vec<Value>, ServiceError> {
    let images = extract_image_map(TOPIC_CARDS_HTML).map_err(|e| ServiceError::Invalid(e.to_string()))?;
    Ok(TOPICS
        .iter()
        .map(|(title, link)| {
            let title = collapse_whitespace(title);
            let mut doc = Map::new();
            doc.insert("_id".into(), json!(format!("theme-{}", slugify(&title))));
            doc.insert("_type".into(), json!(DocType::Theme.as_str()));
            doc.insert("link".into(), json!(normalize_url(link)));
            if let Some(url) = images.get(&title) {
                doc.insert("imageUrl".into(), json!(url));
            }
            doc.insert("title".into(), json!(title));
            Value::Object(doc)
        })
        .collect())
}

/// Delete all themes and write the canonical set in one transaction.
/// Ids are derived from titles, so each theme is written with create-or-replace.
pub fn seed_themes<S>(store: &S, dry_run: bool) -> Result<SeedReport, ServiceError>
where
    S: ContentRead + ContentWrite + ?Sized,
{
    if !dry_run {
        store.ensure_writable()?;
    }
    let selector = DocSelector::OfType(DocType::Theme);
    let docs = theme_documents()?;
    let report = SeedReport {
        deleted: store.count(&selector)?,
        created: docs.len(),
        with_image: docs.iter().filter(|d| d.get("imageUrl").is_some()).count(),
        dry_run,
    };

    if dry_run {
        info!(existing = report.deleted, "would DELETE all theme docs");
        for d in &docs {
            let title = d.get("title").and_then(Value::as_str).unwrap_or_default();
            info!(title, image = d.get("imageUrl").is_some(), "would CREATE theme");
        }
        return Ok(report);
    }

    let mut tx = Transaction::new().with(Mutation::Delete(DeleteTarget::Query(selector)));
    for d in docs {
        tx.push(Mutation::CreateOrReplace(d));
    }
    store.commit(&tx)?;
    info!(deleted = report.deleted, created = report.created, with_image = report.with_image, "themes seeded");
    Ok(report)
}
