//! Portable-text blocks as used by post descriptions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::text::{clean_string, new_key};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "_type", default = "block_type")]
    pub kind: String,
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Span>>,
    /// `markDefs`, `listItem`, `level` and anything else the editor writes.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "_type", default = "span_type")]
    pub kind: String,
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

fn block_type() -> String {
    "block".to_string()
}

fn span_type() -> String {
    "span".to_string()
}

impl Block {
    /// A keyed `normal` paragraph holding one unmarked span.
    pub fn paragraph(text: impl Into<String>) -> Self {
        let mut rest = Map::new();
        rest.insert("markDefs".into(), Value::Array(Vec::new()));
        let mut span_rest = Map::new();
        span_rest.insert("marks".into(), Value::Array(Vec::new()));
        Block {
            kind: block_type(),
            key: Some(new_key("blk")),
            style: Some("normal".into()),
            children: Some(vec![Span {
                kind: span_type(),
                key: Some(new_key("spn")),
                text: Some(text.into()),
                rest: span_rest,
            }]),
            rest,
        }
    }

    pub fn is_text_block(&self) -> bool {
        self.kind == "block"
    }

    /// Concatenated span text of this block.
    pub fn plain_text(&self) -> String {
        self.children
            .iter()
            .flatten()
            .filter_map(|s| s.text.as_deref())
            .collect()
    }

    /// Fill in missing `_key`s on the block and its spans. Returns true when anything was added.
    pub fn ensure_keys(&mut self) -> bool {
        let mut changed = false;
        if self.key.is_none() {
            self.key = Some(new_key("blk"));
            changed = true;
        }
        for span in self.children.iter_mut().flatten() {
            if span.key.is_none() {
                span.key = Some(new_key("spn"));
                changed = true;
            }
        }
        changed
    }
}

/// Split raw text into paragraphs on blank lines; each becomes one block.
pub fn text_to_blocks(raw: &str) -> Vec<Block> {
    let normalized = raw.replace("\r\n", "\n");
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in normalized.split('\n') {
        if line.trim().is_empty() {
            push_paragraph(&mut out, &current);
            current.clear();
        } else {
            current.push(line);
        }
    }
    push_paragraph(&mut out, &current);
    out
}

fn push_paragraph(out: &mut Vec<Block>, lines: &[&str]) {
    if lines.is_empty() {
        return;
    }
    let text = clean_string(&lines.join(" "));
    if !text.is_empty() {
        out.push(Block::paragraph(text));
    }
}

/// Flatten text blocks into plain text, blocks separated by a blank line.
pub fn blocks_to_plain_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .filter(|b| b.is_text_block())
        .map(Block::plain_text)
        .collect::<Vec<_>>()
        .join("\n\n")
}
