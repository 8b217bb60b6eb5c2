//! Interactive delete-by-query for posts.

use std::io::{BufRead, Write};

use chrono::NaiveDate;
use library_store::groq::selector_query;
use library_store::orchestrator::delete_matching;
use library_store::{ContentRead, ContentWrite, DocSelector};

use crate::ServiceError;

pub const CONFIRM_PHRASE: &str = "DELETE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    NothingToDelete,
    /// Preview only; `--apply` was not given.
    DryRun { matched: usize },
    /// The confirmation phrase did not match.
    Aborted { matched: usize },
    Deleted { count: usize },
}

/// A free-form query wins over the series/date flags.
pub fn purge_selector(series_year: Option<i32>, before: Option<NaiveDate>, query: Option<&str>) -> DocSelector {
    match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => DocSelector::Groq(q.to_string()),
        None => DocSelector::Posts { series_year, before },
    }
}

/// Print what `selector` matches and, when `apply` is set and the operator types
/// [`CONFIRM_PHRASE`], delete it all with a single delete-by-query mutation.
pub fn purge<S, R, W>(
    store: &S,
    selector: &DocSelector,
    apply: bool,
    sample_size: usize,
    input: &mut R,
    out: &mut W,
) -> Result<PurgeOutcome, ServiceError>
where
    S: ContentRead + ContentWrite + ?Sized,
    R: BufRead,
    W: Write,
{
    if apply {
        store.ensure_writable()?;
    }
    let query = selector_query(selector)?;
    let matched = store.count(selector)?;
    writeln!(out, "\nQuery: {query}")?;
    writeln!(out, "Matching documents: {matched}\n")?;
    if matched == 0 {
        return Ok(PurgeOutcome::NothingToDelete);
    }

    writeln!(out, "Sample (first {sample_size}):")?;
    for doc in store.fetch_documents(selector, Some(sample_size))? {
        let id = doc.id().unwrap_or_default();
        let title = doc.title().filter(|t| !t.is_empty()).unwrap_or("(no title)");
        match doc.slug() {
            Some(slug) => writeln!(out, " - {id} | {title} (/{slug})")?,
            None => writeln!(out, " - {id} | {title}")?,
        }
    }
    writeln!(out)?;

    if !apply {
        writeln!(out, "Dry-run complete. Add --apply to actually delete.")?;
        return Ok(PurgeOutcome::DryRun { matched });
    }

    write!(out, "Type {CONFIRM_PHRASE} to confirm permanent deletion: ")?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    if answer.trim() != CONFIRM_PHRASE {
        writeln!(out, "Aborted.")?;
        return Ok(PurgeOutcome::Aborted { matched });
    }

    let count = delete_matching(store, selector)?;
    writeln!(out, "\nDeleted {count} document(s).")?;
    Ok(PurgeOutcome::Deleted { count })
}
