//! Facet options shown next to the result grid.
//!
//! Availability comes from the current (already filtered) results. An option
//! stays enabled while selected so it can always be toggled off.

use std::collections::{BTreeMap, HashSet};

use library_model::sdg::{sdg_numbers, sdg_title};
use library_model::{PostCard, SeriesOption, ThemeOption};
use library_store::PostFilter;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetOption<V> {
    pub value: V,
    pub label: String,
    pub selected: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    /// All 17 goals, ascending.
    pub sdgs: Vec<FacetOption<u8>>,
    /// Themes used by at least one post, plus any selected; by title, case-insensitive.
    pub themes: Vec<FacetOption<String>>,
    /// One option per series year, newest first. Series sharing a year share the
    /// option; series without a year cannot be filtered on and are left out.
    pub series: Vec<FacetOption<i32>>,
}

/// Values present in a result set.
#[derive(Debug, Default)]
struct Available<'a> {
    sdgs: HashSet<u8>,
    themes: HashSet<&'a str>,
    series: HashSet<&'a str>,
}

impl<'a> Available<'a> {
    fn collect(posts: &'a [PostCard]) -> Self {
        let mut out = Available::default();
        for p in posts {
            out.sdgs.extend(p.sdg_nums.iter().copied());
            out.themes.extend(p.theme_ids.iter().map(String::as_str));
            if let Some(s) = &p.series {
                out.series.insert(s.id.as_str());
            }
        }
        out
    }
}

pub fn build_facets(
    posts: &[PostCard],
    filter: &PostFilter,
    themes: &[ThemeOption],
    series: &[SeriesOption],
    used_theme_ids: &[String],
) -> Facets {
    let available = Available::collect(posts);

    let sdgs = sdg_numbers()
        .map(|n| {
            let selected = filter.selects_sdg(n);
            FacetOption {
                value: n,
                label: format!("{n}. {}", sdg_title(n).unwrap_or_default()),
                selected,
                enabled: selected || available.sdgs.contains(&n),
            }
        })
        .collect();

    let used: HashSet<&str> = used_theme_ids.iter().map(String::as_str).collect();
    let mut theme_opts: Vec<FacetOption<String>> = themes
        .iter()
        .filter(|t| used.contains(t.id.as_str()) || filter.selects_theme(t.id.as_str()))
        .map(|t| {
            let selected = filter.selects_theme(t.id.as_str());
            FacetOption {
                value: t.id.0.clone(),
                label: t.title.clone(),
                selected,
                enabled: selected || available.themes.contains(t.id.as_str()),
            }
        })
        .collect();
    theme_opts.sort_by(|a, b| a.label.to_lowercase().cmp(&b.label.to_lowercase()));

    // year -> some series of that year appears in the results
    let mut years: BTreeMap<i32, bool> = BTreeMap::new();
    for s in series {
        if let Some(year) = s.year {
            *years.entry(year).or_default() |= available.series.contains(s.id.as_str());
        }
    }
    let series_opts = years
        .into_iter()
        .rev()
        .map(|(year, present)| {
            let selected = filter.selects_year(year);
            FacetOption { value: year, label: year.to_string(), selected, enabled: selected || present }
        })
        .collect();

    Facets { sdgs, themes: theme_opts, series: series_opts }
}

/// One facet value to switch on or off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    Sdg(u8),
    Theme(String),
    Year(i32),
}

/// Query string for the current filter with one value toggled, e.g. `series=2025&sdgs=3,13`.
///
/// SDGs are written ascending, years descending, themes in selection order.
pub fn toggle_query(filter: &PostFilter, toggle: &Toggle) -> String {
    fn flip<T: PartialEq + Clone>(current: Option<&Vec<T>>, v: &T) -> Vec<T> {
        let mut out: Vec<T> = current.cloned().unwrap_or_default();
        match out.iter().position(|x| x == v) {
            Some(i) => {
                out.remove(i);
            }
            None => out.push(v.clone()),
        }
        out
    }

    let mut years = filter.years.clone().unwrap_or_default();
    let mut sdgs = filter.sdgs.clone().unwrap_or_default();
    let mut themes = filter.themes.clone().unwrap_or_default();
    match toggle {
        Toggle::Sdg(n) => sdgs = flip(filter.sdgs.as_ref(), n),
        Toggle::Theme(id) => themes = flip(filter.themes.as_ref(), id),
        Toggle::Year(y) => years = flip(filter.years.as_ref(), y),
    }
    sdgs.sort_unstable();
    years.sort_unstable_by(|a, b| b.cmp(a));

    let join = |items: Vec<String>| items.join(",");
    let mut ser = url::form_urlencoded::Serializer::new(String::new());
    if !years.is_empty() {
        ser.append_pair("series", &join(years.iter().map(i32::to_string).collect()));
    }
    if !sdgs.is_empty() {
        ser.append_pair("sdgs", &join(sdgs.iter().map(u8::to_string).collect()));
    }
    if !themes.is_empty() {
        ser.append_pair("themes", &join(themes));
    }
    if let Some(t) = &filter.text {
        ser.append_pair("q", t.text());
    }
    ser.finish()
}
