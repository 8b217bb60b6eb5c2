//! Facet parameters as they arrive from a URL query string, and their parsed form.

use library_model::{SDG_MAX, SDG_MIN, SERIES_YEAR_MAX, SERIES_YEAR_MIN};

/// Raw, unvalidated facet values (`?series=2024,2025&sdgs=3&themes=t1&q=clean energy`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFilterParams {
    pub series: Option<String>,
    pub sdgs: Option<String>,
    pub themes: Option<String>,
    pub q: Option<String>,
}

impl RawFilterParams {
    /// Pick the known keys out of `key=value` pairs; unknown keys are ignored.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut out = RawFilterParams::default();
        for (k, v) in pairs {
            let slot = match k {
                "series" => &mut out.series,
                "sdgs" => &mut out.sdgs,
                "themes" => &mut out.themes,
                "q" => &mut out.q,
                _ => continue,
            };
            *slot = Some(v.to_string());
        }
        out
    }
}

/// Parsed facets. `None` means "no constraint" for that facet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub years: Option<Vec<i32>>,
    pub sdgs: Option<Vec<u8>>,
    pub themes: Option<Vec<String>>,
    pub text: Option<TextPattern>,
}

impl PostFilter {
    pub fn from_params(raw: &RawFilterParams) -> Self {
        PostFilter {
            years: parse_years(raw.series.as_deref()),
            sdgs: parse_sdgs(raw.sdgs.as_deref()),
            themes: parse_theme_ids(raw.themes.as_deref()),
            text: raw.q.as_deref().and_then(TextPattern::parse),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_none() && self.sdgs.is_none() && self.themes.is_none() && self.text.is_none()
    }

    pub fn selects_year(&self, year: i32) -> bool {
        self.years.as_ref().is_some_and(|v| v.contains(&year))
    }

    pub fn selects_sdg(&self, number: u8) -> bool {
        self.sdgs.as_ref().is_some_and(|v| v.contains(&number))
    }

    pub fn selects_theme(&self, id: &str) -> bool {
        self.themes.as_ref().is_some_and(|v| v.iter().any(|t| t == id))
    }
}

/// Parts that are not whole integers (`3x`, `2024.5`) are dropped, never truncated.
fn parse_int_list<T>(raw: Option<&str>, keep: impl Fn(i64) -> Option<T>) -> Option<Vec<T>>
where
    T: PartialEq,
{
    let mut out: Vec<T> = Vec::new();
    for part in raw?.split(',') {
        let Ok(n) = part.trim().parse::<i64>() else { continue };
        if let Some(v) = keep(n) {
            if !out.contains(&v) {
                out.push(v);
            }
        }
    }
    Some(out).filter(|v| !v.is_empty())
}

/// Series years: comma-separated integers within 2000..=2100.
pub fn parse_years(raw: Option<&str>) -> Option<Vec<i32>> {
    parse_int_list(raw, |n| {
        (SERIES_YEAR_MIN as i64..=SERIES_YEAR_MAX as i64)
            .contains(&n)
            .then_some(n as i32)
    })
}

/// SDG numbers: comma-separated integers within 1..=17.
pub fn parse_sdgs(raw: Option<&str>) -> Option<Vec<u8>> {
    parse_int_list(raw, |n| (SDG_MIN as i64..=SDG_MAX as i64).contains(&n).then_some(n as u8))
}

/// Theme ids: comma-separated, trimmed, empties dropped.
pub fn parse_theme_ids(raw: Option<&str>) -> Option<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for part in raw?.split(',') {
        let id = part.trim();
        if !id.is_empty() && !out.iter().any(|t| t == id) {
            out.push(id.to_string());
        }
    }
    Some(out).filter(|v| !v.is_empty())
}

/// Free-text search turned into a wildcard pattern: `clean  energy` -> `*clean*energy*`.
///
/// A field matches when it contains every term, case-insensitively, in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPattern {
    text: String,
    pattern: String,
    terms: Vec<String>,
}

impl TextPattern {
    pub fn parse(raw: &str) -> Option<Self> {
        let terms: Vec<String> = raw.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return None;
        }
        let words: Vec<&str> = raw.split_whitespace().collect();
        Some(TextPattern { text: words.join(" "), pattern: format!("*{}*", words.join("*")), terms })
    }

    /// The search text as entered, whitespace collapsed.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Lowercased search terms.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Per-term wildcard patterns (`*clean*`, `*energy*`).
    pub fn term_patterns(&self) -> Vec<String> {
        self.terms.iter().map(|t| format!("*{t}*")).collect()
    }

    pub fn matches(&self, field: &str) -> bool {
        let haystack = field.to_lowercase();
        self.terms.iter().all(|t| haystack.contains(t.as_str()))
    }
}
