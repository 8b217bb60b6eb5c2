//! Write operations and their wire encoding.

use std::fmt::Write as _;

use library_model::{Document, DocumentId};
use serde_json::{json, Map, Value};

use crate::groq::selector_query;
use crate::{DocSelector, StoreError};

/// One field-level change. Paths are dotted (`slug.current`) from the document root.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    Set { path: String, value: Value },
    Unset(Vec<String>),
    SetIfMissing { path: String, value: Value },
    /// Insert `items` after the last element of the array at `path`.
    Append { path: String, items: Vec<Value> },
}

impl PatchOp {
    fn to_wire(&self, id: &DocumentId) -> Value {
        let body = match self {
            PatchOp::Set { path, value } => json!({ "set": { path.as_str(): value } }),
            PatchOp::Unset(paths) => json!({ "unset": paths }),
            PatchOp::SetIfMissing { path, value } => json!({ "setIfMissing": { path.as_str(): value } }),
            PatchOp::Append { path, items } => {
                json!({ "insert": { "after": format!("{path}[-1]"), "items": items } })
            }
        };
        let mut patch = Map::new();
        patch.insert("id".into(), Value::String(id.0.clone()));
        if let Value::Object(ops) = body {
            patch.extend(ops);
        }
        json!({ "patch": patch })
    }

    /// Apply to a document body in place.
    pub fn apply(&self, doc: &mut Map<String, Value>) -> Result<(), StoreError> {
        match self {
            PatchOp::Set { path, value } => {
                *slot_mut(doc, path)? = value.clone();
            }
            PatchOp::Unset(paths) => {
                for path in paths {
                    remove_path(doc, path);
                }
            }
            PatchOp::SetIfMissing { path, value } => {
                let slot = slot_mut(doc, path)?;
                if slot.is_null() {
                    *slot = value.clone();
                }
            }
            PatchOp::Append { path, items } => {
                let slot = slot_mut(doc, path)?;
                if slot.is_null() {
                    *slot = Value::Array(Vec::new());
                }
                match slot {
                    Value::Array(arr) => arr.extend(items.iter().cloned()),
                    _ => return Err(StoreError::Conflict(format!("{path} is not an array"))),
                }
            }
        }
        Ok(())
    }

    fn describe(&self, out: &mut String) {
        let _ = match self {
            PatchOp::Set { path, .. } => write!(out, "set {path}"),
            PatchOp::Unset(paths) => write!(out, "unset [{}]", paths.join(", ")),
            PatchOp::SetIfMissing { path, .. } => write!(out, "setIfMissing {path}"),
            PatchOp::Append { path, items } => write!(out, "append {} to {path}", items.len()),
        };
    }
}

// Walks (and creates) intermediate objects. Missing leaves come back as `Null`.
fn slot_mut<'a>(doc: &'a mut Map<String, Value>, path: &str) -> Result<&'a mut Value, StoreError> {
    let mut segments = path.split('.');
    let first = segments.next().filter(|s| !s.is_empty()).ok_or_else(|| StoreError::Conflict("empty patch path".into()))?;
    let mut current = doc.entry(first.to_string()).or_insert(Value::Null);
    for seg in segments {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(seg.to_string()).or_insert(Value::Null),
            _ => return Err(StoreError::Conflict(format!("{path}: {seg} has a non-object parent"))),
        };
    }
    Ok(current)
}

fn remove_path(doc: &mut Map<String, Value>, path: &str) {
    match path.rsplit_once('.') {
        None => {
            doc.remove(path);
        }
        Some((parent, leaf)) => {
            let mut current = doc;
            for seg in parent.split('.') {
                match current.get_mut(seg) {
                    Some(Value::Object(map)) => current = map,
                    _ => return,
                }
            }
            current.remove(leaf);
        }
    }
}

/// Ordered changes to one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub id: DocumentId,
    pub ops: Vec<PatchOp>,
}

impl Patch {
    pub fn new(id: impl Into<DocumentId>) -> Self {
        Patch { id: id.into(), ops: Vec::new() }
    }

    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.ops.push(PatchOp::Set { path: path.into(), value });
        self
    }

    /// No-op when `paths` is empty.
    pub fn unset<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        if !paths.is_empty() {
            self.ops.push(PatchOp::Unset(paths));
        }
        self
    }

    pub fn set_if_missing(mut self, path: impl Into<String>, value: Value) -> Self {
        self.ops.push(PatchOp::SetIfMissing { path: path.into(), value });
        self
    }

    pub fn append(mut self, path: impl Into<String>, items: Vec<Value>) -> Self {
        self.ops.push(PatchOp::Append { path: path.into(), items });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn apply(&self, doc: &mut Map<String, Value>) -> Result<(), StoreError> {
        self.ops.iter().try_for_each(|op| op.apply(doc))
    }

    /// Short human summary for logs, e.g. `set partners; unset [legacy]`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                out.push_str("; ");
            }
            op.describe(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteTarget {
    Id(DocumentId),
    Query(DocSelector),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Fails if a document with the same `_id` exists. A missing `_id` is assigned by the store.
    Create(Value),
    CreateOrReplace(Value),
    Patch(Patch),
    Delete(DeleteTarget),
}

impl Mutation {
    fn push_wire(&self, out: &mut Vec<Value>) -> Result<(), StoreError> {
        match self {
            Mutation::Create(doc) => out.push(json!({ "create": doc })),
            Mutation::CreateOrReplace(doc) => out.push(json!({ "createOrReplace": doc })),
            // One wire mutation per op keeps their order; the server would otherwise
            // apply the kinds in its own fixed order.
            Mutation::Patch(p) => out.extend(p.ops.iter().map(|op| op.to_wire(&p.id))),
            Mutation::Delete(DeleteTarget::Id(id)) => out.push(json!({ "delete": { "id": id } })),
            Mutation::Delete(DeleteTarget::Query(sel)) => {
                out.push(json!({ "delete": { "query": selector_query(sel)? } }))
            }
        }
        Ok(())
    }
}

/// Mutations committed together, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    mutations: Vec<Mutation>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, m: Mutation) {
        self.mutations.push(m);
    }

    pub fn with(mut self, m: Mutation) -> Self {
        self.push(m);
        self
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Decode and validate every whole document the transaction writes.
    /// Patched documents are checked by the store that applies the patch.
    pub fn check_documents(&self) -> Result<(), StoreError> {
        for m in &self.mutations {
            if let Mutation::Create(doc) | Mutation::CreateOrReplace(doc) = m {
                Document::from_value(doc.clone())?.validate()?;
            }
        }
        Ok(())
    }

    /// Body for `POST /data/mutate/{dataset}`.
    pub fn to_wire(&self) -> Result<Value, StoreError> {
        let mut out = Vec::with_capacity(self.mutations.len());
        for m in &self.mutations {
            m.push_wire(&mut out)?;
        }
        Ok(json!({ "mutations": out }))
    }
}
