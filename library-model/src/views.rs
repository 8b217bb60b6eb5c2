//! Read projections returned by list queries.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::media::{choose_thumbnail, Thumbnail};
use crate::sdg::is_sdg_number;
use crate::{DocumentId, Partners, Slug};

/// One post as shown in the filtered result grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCard {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<Slug>,
    #[serde(default)]
    pub partners: Option<Partners>,
    #[serde(rename = "mainImage", default)]
    pub main_image: Option<Value>,
    #[serde(default)]
    pub youtube: Option<String>,
    /// Resolved SDG numbers (not reference ids).
    #[serde(rename = "sdgNums", default, deserialize_with = "sdg_numbers")]
    pub sdg_nums: Vec<u8>,
    /// Theme reference ids.
    #[serde(rename = "themeIds", default, deserialize_with = "compact_strings")]
    pub theme_ids: Vec<String>,
    #[serde(default)]
    pub series: Option<SeriesLabel>,
}

impl PostCard {
    pub fn title_or_untitled(&self) -> &str {
        self.title.as_deref().filter(|t| !t.is_empty()).unwrap_or("Untitled")
    }

    pub fn slug_str(&self) -> Option<&str> {
        self.slug.as_ref().map(|s| s.current.as_str()).filter(|s| !s.is_empty())
    }

    pub fn partners_text(&self) -> Option<String> {
        self.partners.as_ref().map(Partners::to_text).filter(|s| !s.is_empty())
    }

    pub fn thumbnail(&self) -> Thumbnail {
        choose_thumbnail(self.main_image.as_ref(), self.youtube.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesLabel {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeOption {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesOption {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl SeriesOption {
    pub fn label(&self) -> String {
        match (self.year, self.title.as_deref()) {
            (Some(y), _) => y.to_string(),
            (None, Some(t)) => t.to_string(),
            (None, None) => self.id.to_string(),
        }
    }
}

// Dereferenced lists contain nulls for dangling references; drop them.
fn compact_strings<'de, D>(de: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Option<String>>> = Option::deserialize(de)?;
    Ok(raw.unwrap_or_default().into_iter().flatten().collect())
}

fn sdg_numbers<'de, D>(de: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Option<i64>>> = Option::deserialize(de)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter(|n| is_sdg_number(*n))
        .map(|n| n as u8)
        .collect())
}
