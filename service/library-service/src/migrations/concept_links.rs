use library_model::text::new_key;
use library_model::{Document, LinkItem};
use library_store::orchestrator::Migration;
use library_store::{DocSelector, Patch};
use serde_json::json;

pub const CONCEPT_FIELD: &str = "concept";
pub const CONCEPT_LINK_TITLE: &str = "Concept note";

/// Move the legacy `concept` URL into `links` as a "Concept note" link.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConceptToLinks;

impl Migration for ConceptToLinks {
    fn name(&self) -> &'static str {
        "concept-to-links"
    }

    fn selector(&self) -> DocSelector {
        DocSelector::PostsWithField(CONCEPT_FIELD.to_string())
    }

    fn plan(&self, doc: &Document) -> Option<Patch> {
        let post = doc.as_post()?;
        let concept = post.extra.get(CONCEPT_FIELD).filter(|v| !v.is_null())?;
        let patch = Patch::new(post.system.id.clone());
        // A blank or non-string value carries no link; it is only removed.
        let patch = match concept.as_str().map(str::trim).filter(|s| !s.is_empty()) {
            Some(url) => {
                let link = LinkItem::new(CONCEPT_LINK_TITLE, url);
                let item = json!({
                    "_type": link.kind,
                    "_key": new_key("lnk"),
                    "title": link.title,
                    "url": link.url,
                });
                patch.set_if_missing("links", json!([])).append("links", vec![item])
            }
            None => patch,
        };
        Some(patch.unset([CONCEPT_FIELD]))
    }
}
