use library_model::{DocType, Document};
use library_store::orchestrator::Migration;
use library_store::{DocSelector, Patch};

use super::normalize_top_level;

/// Remove undeclared top-level fields and turn list-valued partners into text.
#[derive(Debug, Default, Clone, Copy)]
pub struct Cleanup;

impl Migration for Cleanup {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn selector(&self) -> DocSelector {
        DocSelector::OfType(DocType::Post)
    }

    fn plan(&self, doc: &Document) -> Option<Patch> {
        let post = doc.as_post()?;
        Some(normalize_top_level(post)).filter(|p| !p.is_empty())
    }
}
