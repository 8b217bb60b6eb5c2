use library_model::text::new_key;
use library_model::{DocType, Document, Reference};
use library_store::orchestrator::Migration;
use library_store::{DocSelector, Patch};
use serde_json::Value;

use super::normalize_top_level;

/// Cleanup plus missing `_key`s on description blocks, their spans,
/// SDG and theme references, and links.
///
/// Arrays are only rewritten when a key was actually added, so a second
/// run over the same data plans nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Repair;

fn keyed_refs(refs: &Option<Vec<Reference>>) -> Option<Vec<Reference>> {
    let mut refs = refs.clone()?;
    let mut changed = false;
    for r in refs.iter_mut().filter(|r| r.is_reference() && r.key.is_none()) {
        r.key = Some(new_key("ref"));
        changed = true;
    }
    changed.then_some(refs)
}

fn to_value<T: serde::Serialize>(v: &T) -> Option<Value> {
    match serde_json::to_value(v) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(error = %e, "could not encode repaired field");
            None
        }
    }
}

impl Migration for Repair {
    fn name(&self) -> &'static str {
        "repair"
    }

    fn selector(&self) -> DocSelector {
        DocSelector::OfType(DocType::Post)
    }

    fn plan(&self, doc: &Document) -> Option<Patch> {
        let post = doc.as_post()?;
        let mut patch = normalize_top_level(post);

        if let Some(mut blocks) = post.description.clone() {
            let mut changed = false;
            for b in blocks.iter_mut() {
                changed |= b.ensure_keys();
            }
            if changed {
                if let Some(v) = to_value(&blocks) {
                    patch = patch.set("description", v);
                }
            }
        }
        for (field, refs) in [("sdgs", &post.sdgs), ("themes", &post.themes)] {
            if let Some(v) = keyed_refs(refs).as_ref().and_then(to_value) {
                patch = patch.set(field, v);
            }
        }
        if let Some(mut links) = post.links.clone() {
            let mut changed = false;
            for l in links.iter_mut().filter(|l| l.key.is_none()) {
                l.key = Some(new_key("lnk"));
                changed = true;
            }
            if changed {
                if let Some(v) = to_value(&links) {
                    patch = patch.set("links", v);
                }
            }
        }

        Some(patch).filter(|p| !p.is_empty())
    }
}
