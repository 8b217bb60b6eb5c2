//! Shared document model for the SDGs In Practice library dataset

pub mod media;
pub mod portable_text;
pub mod sdg;
pub mod text;
pub mod views;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use portable_text::{Block, Span};
pub use views::{PostCard, SeriesLabel, SeriesOption, ThemeOption};

pub const SDG_MIN: u8 = 1;
pub const SDG_MAX: u8 = 17;
pub const SERIES_YEAR_MIN: i32 = 2000;
pub const SERIES_YEAR_MAX: i32 = 2100;
/// Slugs are cut to this many characters, matching the studio's slug field.
pub const SLUG_MAX_LEN: usize = 96;

/// Identifier assigned by the content store (`_id`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        DocumentId(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        DocumentId(value)
    }
}

/// Document type discriminator (`_type`) for the types this library knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocType {
    Post,
    Sdg,
    Theme,
    Series,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Post => "post",
            DocType::Sdg => "sdg",
            DocType::Theme => "theme",
            DocType::Series => "series",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "post" => Some(DocType::Post),
            "sdg" => Some(DocType::Sdg),
            "theme" => Some(DocType::Theme),
            "series" => Some(DocType::Series),
            _ => None,
        }
    }

    pub const ALL: [DocType; 4] = [DocType::Sdg, DocType::Series, DocType::Theme, DocType::Post];
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("document has no _type")]
    MissingType,
    #[error("invalid {doc_type} document: {message}")]
    Invalid { doc_type: String, message: String },
}

impl ModelError {
    fn invalid(doc_type: DocType, message: impl Into<String>) -> Self {
        ModelError::Invalid { doc_type: doc_type.as_str().to_string(), message: message.into() }
    }
}

/// Store-managed fields present on every document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemFields {
    #[serde(rename = "_id", default)]
    pub id: DocumentId,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(rename = "_createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "_updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Top-level keys the store manages itself. Never treated as unknown.
pub const SYSTEM_KEYS: [&str; 5] = ["_id", "_type", "_rev", "_createdAt", "_updatedAt"];

/// Reference to another document, as stored in `sdgs[]`, `themes[]` and `series`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "_type", default = "reference_type")]
    pub kind: String,
    #[serde(rename = "_ref", default)]
    pub target: String,
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

fn reference_type() -> String {
    "reference".to_string()
}

impl Reference {
    pub fn to(target: impl Into<String>) -> Self {
        Self { kind: reference_type(), target: target.into(), key: None, rest: Map::new() }
    }

    pub fn keyed(target: impl Into<String>, key: impl Into<String>) -> Self {
        Self { key: Some(key.into()), ..Self::to(target) }
    }

    pub fn is_reference(&self) -> bool {
        self.kind == "reference"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slug {
    #[serde(rename = "_type", default = "slug_type")]
    pub kind: String,
    #[serde(default)]
    pub current: String,
}

fn slug_type() -> String {
    "slug".to_string()
}

impl Slug {
    pub fn new(current: impl Into<String>) -> Self {
        Self { kind: slug_type(), current: current.into() }
    }
}

/// External link attached to a post (`links[]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkItem {
    #[serde(rename = "_type", default = "link_item_type")]
    pub kind: String,
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn link_item_type() -> String {
    "linkItem".to_string()
}

impl LinkItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self { kind: link_item_type(), key: None, title: Some(title.into()), url: Some(url.into()) }
    }
}

/// Partners text. Older imports stored a list of organisation names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Partners {
    Text(String),
    List(Vec<Option<String>>),
}

impl Partners {
    /// Plain text form; list entries are joined with `", "`, empty entries dropped.
    pub fn to_text(&self) -> String {
        match self {
            Partners::Text(s) => s.clone(),
            Partners::List(items) => items
                .iter()
                .filter_map(|s| s.as_deref())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Partners::List(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDoc {
    #[serde(flatten)]
    pub system: SystemFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<Slug>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partners: Option<Partners>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<Block>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<LinkItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdgs: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themes: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_image: Option<Value>,
    /// Top-level keys the post schema does not declare.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PostDoc {
    pub fn slug_str(&self) -> Option<&str> {
        self.slug.as_ref().map(|s| s.current.as_str()).filter(|s| !s.is_empty())
    }

    pub fn partners_text(&self) -> Option<String> {
        self.partners.as_ref().map(Partners::to_text)
    }

    pub fn description_text(&self) -> String {
        self.description.as_deref().map(portable_text::blocks_to_plain_text).unwrap_or_default()
    }

    pub fn sdg_refs(&self) -> impl Iterator<Item = &str> {
        self.sdgs.iter().flatten().map(|r| r.target.as_str())
    }

    pub fn theme_refs(&self) -> impl Iterator<Item = &str> {
        self.themes.iter().flatten().map(|r| r.target.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SdgDoc {
    #[serde(flatten)]
    pub system: SystemFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeDoc {
    #[serde(flatten)]
    pub system: SystemFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesDoc {
    #[serde(flatten)]
    pub system: SystemFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A document as stored, keyed by its `_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Post(PostDoc),
    Sdg(SdgDoc),
    Theme(ThemeDoc),
    Series(SeriesDoc),
    /// Any other type (studio internals, legacy types); kept verbatim.
    Other { doc_type: String, body: Map<String, Value> },
}

impl Document {
    /// Decode a raw store document. `_type` selects the variant.
    pub fn from_value(value: Value) -> Result<Self, ModelError> {
        let mut body = match value {
            Value::Object(map) => map,
            _ => return Err(ModelError::NotAnObject),
        };
        let doc_type = match body.remove("_type") {
            Some(Value::String(t)) => t,
            _ => return Err(ModelError::MissingType),
        };
        let Some(kind) = DocType::parse(&doc_type) else {
            body.insert("_type".into(), Value::String(doc_type.clone()));
            return Ok(Document::Other { doc_type, body });
        };
        let body = Value::Object(body);
        let decoded = match kind {
            DocType::Post => serde_json::from_value(body).map(Document::Post),
            DocType::Sdg => serde_json::from_value(body).map(Document::Sdg),
            DocType::Theme => serde_json::from_value(body).map(Document::Theme),
            DocType::Series => serde_json::from_value(body).map(Document::Series),
        };
        decoded.map_err(|e| ModelError::invalid(kind, e.to_string()))
    }

    /// Encode back to the store's JSON shape, `_type` included.
    pub fn to_value(&self) -> Value {
        let encoded = match self {
            Document::Post(d) => serde_json::to_value(d),
            Document::Sdg(d) => serde_json::to_value(d),
            Document::Theme(d) => serde_json::to_value(d),
            Document::Series(d) => serde_json::to_value(d),
            Document::Other { body, .. } => return Value::Object(body.clone()),
        };
        let mut map = match encoded {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert("_type".into(), Value::String(self.doc_type().to_string()));
        Value::Object(map)
    }

    pub fn doc_type(&self) -> &str {
        match self {
            Document::Post(_) => DocType::Post.as_str(),
            Document::Sdg(_) => DocType::Sdg.as_str(),
            Document::Theme(_) => DocType::Theme.as_str(),
            Document::Series(_) => DocType::Series.as_str(),
            Document::Other { doc_type, .. } => doc_type,
        }
    }

    pub fn id(&self) -> Option<&str> {
        let id = match self {
            Document::Post(d) => d.system.id.as_str(),
            Document::Sdg(d) => d.system.id.as_str(),
            Document::Theme(d) => d.system.id.as_str(),
            Document::Series(d) => d.system.id.as_str(),
            Document::Other { body, .. } => body.get("_id").and_then(Value::as_str).unwrap_or_default(),
        };
        Some(id).filter(|s| !s.is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Document::Post(d) => d.title.as_deref(),
            Document::Sdg(d) => d.title.as_deref(),
            Document::Theme(d) => d.title.as_deref(),
            Document::Series(d) => d.title.as_deref(),
            Document::Other { body, .. } => body.get("title").and_then(Value::as_str),
        }
    }

    pub fn slug(&self) -> Option<&str> {
        match self {
            Document::Post(d) => d.slug_str(),
            Document::Other { body, .. } => body
                .get("slug")
                .and_then(|s| s.get("current"))
                .and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn as_post(&self) -> Option<&PostDoc> {
        match self {
            Document::Post(d) => Some(d),
            _ => None,
        }
    }

    /// Schema-level checks applied before documents are written.
    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            Document::Post(d) => {
                if d.title.as_deref().map(str::trim).unwrap_or_default().is_empty() {
                    return Err(ModelError::invalid(DocType::Post, "title is required"));
                }
                if d.slug_str().is_none() {
                    return Err(ModelError::invalid(DocType::Post, "slug is required"));
                }
                Ok(())
            }
            Document::Sdg(d) => match d.number {
                Some(n) if (SDG_MIN as i64..=SDG_MAX as i64).contains(&n) => Ok(()),
                Some(n) => Err(ModelError::invalid(DocType::Sdg, format!("number {n} outside 1..=17"))),
                None => Err(ModelError::invalid(DocType::Sdg, "number is required")),
            },
            Document::Theme(d) => {
                if d.title.as_deref().map(str::trim).unwrap_or_default().is_empty() {
                    return Err(ModelError::invalid(DocType::Theme, "title is required"));
                }
                Ok(())
            }
            Document::Series(d) => match d.year {
                Some(y) if (SERIES_YEAR_MIN as i64..=SERIES_YEAR_MAX as i64).contains(&y) => Ok(()),
                Some(y) => Err(ModelError::invalid(DocType::Series, format!("year {y} outside 2000..=2100"))),
                None => Err(ModelError::invalid(DocType::Series, "year is required")),
            },
            Document::Other { .. } => Ok(()),
        }
    }
}

impl TryFrom<Value> for Document {
    type Error = ModelError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Document::from_value(value)
    }
}
