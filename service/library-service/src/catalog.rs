//! Whole-dataset view used for post detail, related posts and export.

use std::collections::{HashMap, HashSet};

use library_model::media::{choose_thumbnail, classify_video, Thumbnail, VideoKind};
use library_model::{DocType, Document, LinkItem, PostDoc, SdgDoc, SeriesDoc, ThemeDoc};
use library_store::{ContentRead, DocSelector};

use crate::{join_lookup, ServiceError};

/// Every post, SDG, theme and series, with references resolvable by id.
#[derive(Debug, Default)]
pub struct Catalog {
    posts: Vec<PostDoc>,
    sdgs: HashMap<String, SdgDoc>,
    themes: HashMap<String, ThemeDoc>,
    series: HashMap<String, SeriesDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdgSummary {
    pub number: u8,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeSummary {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub image_url: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSummary {
    pub title: Option<String>,
    pub year: Option<i64>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLink {
    pub url: String,
    pub kind: Option<VideoKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostDetail {
    pub id: String,
    pub title: String,
    pub slug: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub venue: Option<String>,
    pub partners: Option<String>,
    pub description: String,
    pub links: Vec<LinkItem>,
    pub sdgs: Vec<SdgSummary>,
    pub themes: Vec<ThemeSummary>,
    pub series: Option<SeriesSummary>,
    pub video: Option<VideoLink>,
    pub thumbnail: Thumbnail,
    pub related: Vec<RelatedPost>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedPost {
    pub id: String,
    pub title: String,
    pub slug: Option<String>,
    pub date: Option<String>,
    /// SDG plus theme references shared with the post being viewed.
    pub shared: usize,
}

/// One line of the content export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub title: String,
    pub slug: String,
    pub series: String,
    pub description: String,
    pub partners: String,
    pub sdgs: String,
    pub themes: String,
}

impl ExportRow {
    pub const HEADERS: [&'static str; 7] = ["Title", "Slug", "Series / Year", "Description", "Partners", "SDGs", "Themes"];

    pub fn fields(&self) -> [&str; 7] {
        [&self.title, &self.slug, &self.series, &self.description, &self.partners, &self.sdgs, &self.themes]
    }
}

/// `YEAR (TITLE)`, `YEAR`, `TITLE` or an em dash when neither is set.
pub fn series_label(series: Option<&SeriesDoc>) -> String {
    let title = series.and_then(|s| s.title.as_deref()).filter(|t| !t.is_empty());
    match (series.and_then(|s| s.year), title) {
        (Some(y), Some(t)) => format!("{y} ({t})"),
        (Some(y), None) => y.to_string(),
        (None, Some(t)) => t.to_string(),
        (None, None) => "\u{2014}".to_string(),
    }
}

fn untitled(title: Option<&str>) -> String {
    title.filter(|t| !t.trim().is_empty()).unwrap_or("Untitled").to_string()
}

impl Catalog {
    /// Fetch the four document types concurrently and index them.
    pub fn load<S: ContentRead + ?Sized>(store: &S) -> Result<Self, ServiceError> {
        let fetch = |t: DocType| store.fetch_documents(&DocSelector::OfType(t), None);
        let (posts, sdgs, themes, series) = std::thread::scope(|s| {
            let posts = s.spawn(|| fetch(DocType::Post));
            let sdgs = s.spawn(|| fetch(DocType::Sdg));
            let themes = s.spawn(|| fetch(DocType::Theme));
            let series = s.spawn(|| fetch(DocType::Series));
            (join_lookup(posts), join_lookup(sdgs), join_lookup(themes), join_lookup(series))
        });
        let docs = [posts?, sdgs?, themes?, series?].into_iter().flatten();
        Ok(Self::from_documents(docs))
    }

    pub fn from_documents<I: IntoIterator<Item = Document>>(docs: I) -> Self {
        let mut cat = Catalog::default();
        for doc in docs {
            match doc {
                Document::Post(p) => cat.posts.push(p),
                Document::Sdg(d) => {
                    cat.sdgs.insert(d.system.id.to_string(), d);
                }
                Document::Theme(d) => {
                    cat.themes.insert(d.system.id.to_string(), d);
                }
                Document::Series(d) => {
                    cat.series.insert(d.system.id.to_string(), d);
                }
                Document::Other { .. } => {}
            }
        }
        // Newest first; undated posts last.
        cat.posts.sort_by(|a, b| match (&a.date, &b.date) {
            (Some(x), Some(y)) => y.cmp(x).then_with(|| a.system.id.cmp(&b.system.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.system.id.cmp(&b.system.id),
        });
        cat
    }

    pub fn posts(&self) -> &[PostDoc] {
        &self.posts
    }

    pub fn post_by_slug(&self, slug: &str) -> Option<&PostDoc> {
        self.posts.iter().find(|p| p.slug_str() == Some(slug))
    }

    fn series_of(&self, post: &PostDoc) -> Option<&SeriesDoc> {
        post.series.as_ref().and_then(|r| self.series.get(&r.target))
    }

    fn sdg_numbers_of(&self, post: &PostDoc) -> Vec<u8> {
        let mut nums: Vec<u8> = post
            .sdg_refs()
            .filter_map(|id| self.sdgs.get(id)?.number)
            .filter_map(|n| u8::try_from(n).ok())
            .collect();
        nums.sort_unstable();
        nums.dedup();
        nums
    }

    pub fn detail(&self, slug: &str, related_limit: usize) -> Option<PostDetail> {
        let post = self.post_by_slug(slug)?;

        let mut sdgs: Vec<SdgSummary> = post
            .sdg_refs()
            .filter_map(|id| self.sdgs.get(id))
            .filter_map(|d| {
                Some(SdgSummary { number: u8::try_from(d.number?).ok()?, title: d.title.clone().unwrap_or_default() })
            })
            .collect();
        sdgs.sort_by_key(|s| s.number);

        let themes = post
            .theme_refs()
            .filter_map(|id| self.themes.get(id))
            .map(|t| ThemeSummary {
                id: t.system.id.to_string(),
                title: untitled(t.title.as_deref()),
                link: t.link.clone(),
                image_url: t.image_url.clone(),
                text: t.text.clone(),
            })
            .collect();

        let series = self.series_of(post).map(|s| SeriesSummary {
            title: s.title.clone(),
            year: s.year,
            link: s.link.clone(),
        });

        let video = post
            .youtube
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| VideoLink { url: u.to_string(), kind: classify_video(u) });

        Some(PostDetail {
            id: post.system.id.to_string(),
            title: untitled(post.title.as_deref()),
            slug: post.slug_str().map(str::to_string),
            date: post.date.clone(),
            time: post.time.clone(),
            venue: post.venue.clone(),
            partners: post.partners_text().filter(|p| !p.is_empty()),
            description: post.description_text(),
            links: post.links.clone().unwrap_or_default(),
            sdgs,
            themes,
            series,
            video,
            thumbnail: choose_thumbnail(post.main_image.as_ref(), post.youtube.as_deref()),
            related: self.related(post, related_limit),
        })
    }

    /// Other posts sharing an SDG or theme, most shared references first, then newest.
    pub fn related(&self, post: &PostDoc, limit: usize) -> Vec<RelatedPost> {
        let sdg_refs: HashSet<&str> = post.sdg_refs().collect();
        let theme_refs: HashSet<&str> = post.theme_refs().collect();

        let mut scored: Vec<(usize, &PostDoc)> = self
            .posts
            .iter()
            .filter(|p| p.system.id != post.system.id)
            .map(|p| {
                let shared = p.sdg_refs().filter(|r| sdg_refs.contains(r)).count()
                    + p.theme_refs().filter(|r| theme_refs.contains(r)).count();
                (shared, p)
            })
            .filter(|(shared, _)| *shared > 0)
            .collect();
        // `posts` is already newest-first, so a stable sort on the score keeps date order on ties.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(limit)
            .map(|(shared, p)| RelatedPost {
                id: p.system.id.to_string(),
                title: untitled(p.title.as_deref()),
                slug: p.slug_str().map(str::to_string),
                date: p.date.clone(),
                shared,
            })
            .collect()
    }

    pub fn export_rows(&self) -> Vec<ExportRow> {
        self.posts
            .iter()
            .map(|p| {
                let sdgs = self.sdg_numbers_of(p).iter().map(u8::to_string).collect::<Vec<_>>().join(", ");
                let themes = p
                    .theme_refs()
                    .filter_map(|id| self.themes.get(id)?.title.clone())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ");
                ExportRow {
                    title: p.title.clone().unwrap_or_default(),
                    slug: p.slug_str().unwrap_or_default().to_string(),
                    series: series_label(self.series_of(p)),
                    description: p.description_text(),
                    partners: p.partners_text().unwrap_or_default(),
                    sdgs,
                    themes,
                }
            })
            .collect()
    }
}

/// Write rows as TSV (header first). Embedded tabs and newlines are quoted.
pub fn write_tsv<W: std::io::Write>(rows: &[ExportRow], out: W) -> Result<(), csv::Error> {
    let mut w = csv::WriterBuilder::new().delimiter(b'\t').from_writer(out);
    w.write_record(ExportRow::HEADERS)?;
    for row in rows {
        w.write_record(row.fields())?;
    }
    w.flush()?;
    Ok(())
}
