use library_model::Document;
use tracing::{info, warn};

use crate::{ContentRead, ContentWrite, DeleteTarget, DocSelector, Mutation, Patch, StoreError, Transaction};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// One bulk edit: which documents to scan and what to change in each.
pub trait Migration {
    fn name(&self) -> &'static str;
    fn selector(&self) -> DocSelector;
    /// Changes for `doc`, or `None` when it is already in the target shape.
    fn plan(&self, doc: &Document) -> Option<Patch>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub scanned: usize,
    /// Patched (or, in a dry run, would be patched).
    pub changed: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub dry_run: bool,
}

/// Fetch every selected document and commit each planned patch on its own.
///
/// A failed commit is logged and counted; the batch carries on, and so does a
/// document that does not decode. A failed fetch aborts, as does a store that
/// cannot write (checked before the fetch unless this is a dry run).
pub fn run_migration<S>(store: &S, migration: &dyn Migration, dry_run: bool) -> Result<MigrationReport, OrchestratorError>
where
    S: ContentRead + ContentWrite + ?Sized,
{
    if !dry_run {
        store.ensure_writable()?;
    }
    let fetched = store.fetch_checked(&migration.selector(), None)?;
    let total = fetched.documents.len() + fetched.rejected.len();
    info!(migration = migration.name(), total, dry_run, "migration started");
    let mut report = MigrationReport { dry_run, ..Default::default() };

    for r in &fetched.rejected {
        warn!(doc_id = %r.id, error = %r.error, "document does not decode");
        report.scanned += 1;
        report.failed += 1;
    }
    for doc in &fetched.documents {
        report.scanned += 1;
        let Some(patch) = migration.plan(doc).filter(|p| !p.is_empty()) else {
            report.unchanged += 1;
            continue;
        };
        if dry_run {
            info!(doc_id = %patch.id, ops = %patch.describe(), "would patch");
            report.changed += 1;
            continue;
        }
        let ops = patch.describe();
        let id = patch.id.clone();
        match store.commit(&Transaction::new().with(Mutation::Patch(patch))) {
            Ok(_) => {
                info!(doc_id = %id, ops = %ops, "patched");
                report.changed += 1;
            }
            Err(e) => {
                warn!(doc_id = %id, error = %e, "patch failed");
                report.failed += 1;
            }
        }
    }

    info!(
        migration = migration.name(),
        scanned = report.scanned,
        changed = report.changed,
        unchanged = report.unchanged,
        failed = report.failed,
        "migration finished"
    );
    Ok(report)
}

/// Delete everything `selector` matches in a single mutation. Returns the pre-delete count.
pub fn delete_matching<S>(store: &S, selector: &DocSelector) -> Result<usize, OrchestratorError>
where
    S: ContentRead + ContentWrite + ?Sized,
{
    store.ensure_writable()?;
    let n = store.count(selector)?;
    if n == 0 {
        return Ok(0);
    }
    store.commit(&Transaction::new().with(Mutation::Delete(DeleteTarget::Query(selector.clone()))))?;
    info!(deleted = n, "delete by query committed");
    Ok(n)
}
