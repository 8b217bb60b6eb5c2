//! Bulk edits over existing posts, run through [`library_store::orchestrator::run_migration`].

mod cleanup;
mod concept_links;
mod repair;

pub use cleanup::Cleanup;
pub use concept_links::{ConceptToLinks, CONCEPT_FIELD, CONCEPT_LINK_TITLE};
pub use repair::Repair;

use library_model::{PostDoc, SYSTEM_KEYS};
use library_store::Patch;
use serde_json::Value;

/// Fields the post schema declares, on top of [`SYSTEM_KEYS`].
pub const POST_FIELDS: [&str; 13] = [
    "title", "slug", "date", "time", "venue", "partners", "description",
    "links", "youtube", "sdgs", "themes", "series", "mainImage",
];

/// Undeclared top-level keys, sorted.
pub fn unknown_keys(post: &PostDoc) -> Vec<String> {
    post.extra
        .keys()
        .filter(|k| !SYSTEM_KEYS.contains(&k.as_str()) && !POST_FIELDS.contains(&k.as_str()))
        .cloned()
        .collect()
}

/// Shared first step of cleanup and repair: drop unknown keys, flatten list partners.
fn normalize_top_level(post: &PostDoc) -> Patch {
    let mut patch = Patch::new(post.system.id.clone()).unset(unknown_keys(post));
    if let Some(p) = post.partners.as_ref().filter(|p| p.is_list()) {
        patch = patch.set("partners", Value::String(p.to_text()));
    }
    patch
}
