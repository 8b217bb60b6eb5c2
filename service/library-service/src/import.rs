//! Spreadsheet import: one post per CSV row, upserted by slug.
//!
//! Headers are matched loosely (case, punctuation and a leading BOM are
//! ignored) against a fixed alias table; unrecognised columns are reported and
//! skipped. SDGs, series and themes are resolved against documents already in
//! the store, which are loaded once up front.

use std::collections::HashMap;
use std::path::Path;

use csv::ReaderBuilder;
use library_model::portable_text::text_to_blocks;
use library_model::sdg::is_sdg_number;
use library_model::text::{clean_string, new_key, parse_day_month_year, slugify};
use library_model::{DocType, Document, LinkItem, Reference, Slug};
use library_store::{ContentRead, ContentWrite, DocSelector, Mutation, Patch, Transaction};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::migrations::CONCEPT_LINK_TITLE;
use crate::ServiceError;

/// Columns the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Title,
    Date,
    Venue,
    Partners,
    Description,
    Series,
    Sdgs,
    ConceptNote,
    YouTube,
    Themes,
    Image,
}

impl Column {
    /// Match a raw header cell, e.g. `"\u{feff}YouTube Link"` -> `YouTube`.
    pub fn from_header(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| !matches!(*c, '\u{feff}' | '\u{2000}'..='\u{200D}' | '\u{2060}'))
            .flat_map(char::to_lowercase)
            .filter(char::is_ascii_alphanumeric)
            .collect();
        Some(match key.as_str() {
            "title" => Column::Title,
            "date" => Column::Date,
            "venue" => Column::Venue,
            "partners" => Column::Partners,
            "description" => Column::Description,
            "series" => Column::Series,
            "sdgs" | "sdg" => Column::Sdgs,
            "conceptnote" | "concept" => Column::ConceptNote,
            "youtubelink" | "youtubeurl" | "youtube" => Column::YouTube,
            "theme" | "themes" => Column::Themes,
            "image" => Column::Image,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub rows: usize,
    pub created: usize,
    pub patched: usize,
    /// Rows without a title.
    pub skipped: usize,
    pub failed: usize,
    pub ignored_headers: Vec<String>,
    pub dry_run: bool,
}

/// SDG numbers from a cell like `"SDG 3, sdg13, 7"`: kept within 1..=17, unique, ascending.
pub fn parse_sdg_list(raw: &str) -> Vec<u8> {
    let s = clean_string(raw);
    let mut out: Vec<u8> = s
        .split(',')
        .filter_map(|part| {
            let digits: String = part.to_lowercase().replace("sdg", "").chars().filter(char::is_ascii_digit).collect();
            digits.parse::<i64>().ok()
        })
        .filter(|n| is_sdg_number(*n))
        .map(|n| n as u8)
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Leading integer of a cell (`"2024 (HLPF)"` -> 2024).
fn leading_int(s: &str) -> Option<i64> {
    let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Existing documents the rows are resolved against.
#[derive(Debug, Default)]
struct Lookups {
    sdg_by_number: HashMap<u8, String>,
    series_by_year: HashMap<i64, String>,
    series_by_title: HashMap<String, String>,
    theme_by_title: HashMap<String, String>,
    post_by_slug: HashMap<String, String>,
}

impl Lookups {
    fn load<S: ContentRead + ?Sized>(store: &S) -> Result<Self, ServiceError> {
        let mut out = Lookups::default();
        for t in [DocType::Sdg, DocType::Series, DocType::Theme, DocType::Post] {
            for doc in store.fetch_documents(&DocSelector::OfType(t), None)? {
                match doc {
                    Document::Sdg(d) => {
                        if let Some(n) = d.number.filter(|n| is_sdg_number(*n)) {
                            out.sdg_by_number.entry(n as u8).or_insert(d.system.id.0);
                        }
                    }
                    Document::Series(d) => {
                        if let Some(y) = d.year {
                            out.series_by_year.entry(y).or_insert_with(|| d.system.id.0.clone());
                        }
                        if let Some(t) = d.title {
                            out.series_by_title.entry(t).or_insert(d.system.id.0);
                        }
                    }
                    Document::Theme(d) => {
                        if let Some(t) = d.title {
                            out.theme_by_title.entry(t.trim().to_lowercase()).or_insert(d.system.id.0);
                        }
                    }
                    Document::Post(d) => {
                        if let Some(slug) = d.slug_str() {
                            out.post_by_slug.insert(slug.to_string(), d.system.id.0.clone());
                        }
                    }
                    Document::Other { .. } => {}
                }
            }
        }
        Ok(out)
    }

    fn sdg_refs(&self, raw: &str) -> Vec<Reference> {
        parse_sdg_list(raw)
            .into_iter()
            .filter_map(|n| match self.sdg_by_number.get(&n) {
                Some(id) => Some(Reference::keyed(id.clone(), new_key("sdg"))),
                None => {
                    warn!(sdg = n, "SDG not found; skipping");
                    None
                }
            })
            .collect()
    }

    fn series_ref(&self, raw: &str) -> Option<Reference> {
        let s = clean_string(raw);
        if s.is_empty() {
            return None;
        }
        let by_year = leading_int(&s).and_then(|y| self.series_by_year.get(&y));
        match by_year.or_else(|| self.series_by_title.get(&s)) {
            Some(id) => Some(Reference::to(id.clone())),
            None => {
                warn!(series = %s, "series not found; leaving unset");
                None
            }
        }
    }

    fn theme_refs(&self, raw: &str) -> Vec<Reference> {
        clean_string(raw)
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .filter_map(|t| match self.theme_by_title.get(&t.to_lowercase()) {
                Some(id) => Some(Reference::keyed(id.clone(), new_key("thm"))),
                None => {
                    warn!(theme = %t, "theme not found; skipping");
                    None
                }
            })
            .collect()
    }
}

/// Fields for one row, only those the row actually provides.
fn row_fields(lookups: &Lookups, cell: impl Fn(Column) -> String) -> Result<Option<Map<String, Value>>, ServiceError> {
    let title = clean_string(&cell(Column::Title));
    if title.is_empty() {
        return Ok(None);
    }
    let mut doc = Map::new();
    let mut put = |k: &str, v: Value| {
        doc.insert(k.to_string(), v);
    };

    put("slug", encode(&Slug::new(slugify(&title)))?);
    put("title", Value::String(title));
    if let Some(d) = parse_day_month_year(&cell(Column::Date)) {
        put("date", Value::String(d));
    }
    for (col, key) in [(Column::Venue, "venue"), (Column::Partners, "partners"), (Column::YouTube, "youtube")] {
        let v = clean_string(&cell(col));
        if !v.is_empty() {
            put(key, Value::String(v));
        }
    }
    let blocks = text_to_blocks(&cell(Column::Description));
    if !blocks.is_empty() {
        put("description", encode(&blocks)?);
    }
    let sdgs = lookups.sdg_refs(&cell(Column::Sdgs));
    if !sdgs.is_empty() {
        put("sdgs", encode(&sdgs)?);
    }
    let themes = lookups.theme_refs(&cell(Column::Themes));
    if !themes.is_empty() {
        put("themes", encode(&themes)?);
    }
    if let Some(series) = lookups.series_ref(&cell(Column::Series)) {
        put("series", encode(&series)?);
    }
    let concept = clean_string(&cell(Column::ConceptNote));
    if !concept.is_empty() {
        let mut link = LinkItem::new(CONCEPT_LINK_TITLE, concept);
        link.key = Some(new_key("lnk"));
        put("links", encode(&vec![link])?);
    }
    Ok(Some(doc))
}

fn encode<T: serde::Serialize>(v: &T) -> Result<Value, ServiceError> {
    serde_json::to_value(v).map_err(|e| ServiceError::Invalid(e.to_string()))
}

pub fn import_csv<S>(store: &S, path: &Path, opts: &ImportOptions) -> Result<ImportReport, ServiceError>
where
    S: ContentRead + ContentWrite + ?Sized,
{
    if !opts.dry_run {
        store.ensure_writable()?;
    }
    let mut input = std::fs::read_to_string(path)?;
    if input.starts_with('\u{feff}') {
        input.remove(0);
    }
    let mut reader = ReaderBuilder::new().has_headers(false).flexible(true).from_reader(input.as_bytes());
    let mut records = reader.records();

    let mut report = ImportReport { dry_run: opts.dry_run, ..Default::default() };
    let Some(header) = records.next().transpose()? else {
        return Ok(report);
    };
    let mut columns: HashMap<Column, usize> = HashMap::new();
    for (i, h) in header.iter().enumerate() {
        match Column::from_header(h) {
            Some(c) => {
                columns.entry(c).or_insert(i);
            }
            None if h.trim().is_empty() => {}
            None => report.ignored_headers.push(h.to_string()),
        }
    }
    if !report.ignored_headers.is_empty() {
        warn!(headers = %report.ignored_headers.join(", "), "ignored CSV headers");
    }
    if !columns.contains_key(&Column::Title) {
        return Err(ServiceError::Invalid("CSV has no Title column".into()));
    }

    let mut lookups = Lookups::load(store)?;
    info!(path = %path.display(), dry_run = opts.dry_run, "import started");

    for (i, record) in records.enumerate() {
        // Spreadsheet row number: header is row 1.
        let row_no = i + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(row = row_no, error = %e, "unreadable row");
                report.failed += 1;
                continue;
            }
        };
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        report.rows += 1;
        let cell = |c: Column| columns.get(&c).and_then(|&i| record.get(i)).unwrap_or_default().to_string();

        let fields = match row_fields(&lookups, cell) {
            Ok(Some(f)) => f,
            Ok(None) => {
                warn!(row = row_no, "missing title; skipped");
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!(row = row_no, error = %e, "row failed");
                report.failed += 1;
                continue;
            }
        };
        let title = fields.get("title").and_then(Value::as_str).unwrap_or_default().to_string();
        let slug = fields
            .get("slug")
            .and_then(|s| s.get("current"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match lookups.post_by_slug.get(&slug).cloned() {
            Some(id) => {
                if opts.dry_run {
                    info!(row = row_no, doc_id = %id, title = %title, "would PATCH");
                    report.patched += 1;
                    continue;
                }
                let patch = fields.into_iter().fold(Patch::new(id.clone()), |p, (k, v)| p.set(k, v));
                match store.commit(&Transaction::new().with(Mutation::Patch(patch))) {
                    Ok(_) => {
                        info!(row = row_no, doc_id = %id, title = %title, "patched");
                        report.patched += 1;
                    }
                    Err(e) => {
                        warn!(row = row_no, doc_id = %id, error = %e, "row failed");
                        report.failed += 1;
                    }
                }
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                let mut doc = fields;
                doc.insert("_id".into(), json!(id));
                doc.insert("_type".into(), json!(DocType::Post.as_str()));
                let doc = Value::Object(doc);
                if let Err(e) = Document::from_value(doc.clone()).and_then(|d| d.validate()) {
                    warn!(row = row_no, title = %title, error = %e, "row failed");
                    report.failed += 1;
                    continue;
                }
                if opts.dry_run {
                    info!(row = row_no, title = %title, "would CREATE");
                    report.created += 1;
                    continue;
                }
                match store.commit(&Transaction::new().with(Mutation::Create(doc))) {
                    Ok(_) => {
                        info!(row = row_no, doc_id = %id, title = %title, "created");
                        lookups.post_by_slug.insert(slug, id);
                        report.created += 1;
                    }
                    Err(e) => {
                        warn!(row = row_no, error = %e, "row failed");
                        report.failed += 1;
                    }
                }
            }
        }
    }

    info!(
        created = report.created,
        patched = report.patched,
        skipped = report.skipped,
        failed = report.failed,
        "import finished"
    );
    Ok(report)
}
