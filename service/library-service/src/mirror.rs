//! Copy the hosted dataset into a local SQLite mirror.

use library_model::DocType;
use library_store::sqlite_repo::SqliteRepo;
use library_store::{ContentRead, DocSelector};
use tracing::info;

use crate::ServiceError;

/// Replace the mirror's posts, SDGs, themes and series with the source's.
/// Returns the number of documents written.
pub fn mirror_into<S: ContentRead + ?Sized>(source: &S, target: &SqliteRepo) -> Result<usize, ServiceError> {
    let mut docs = Vec::new();
    for t in DocType::ALL {
        let batch = source.fetch_documents(&DocSelector::OfType(t), None)?;
        info!(doc_type = t.as_str(), count = batch.len(), "fetched");
        docs.extend(batch);
    }
    let written = target.replace_types(&DocType::ALL, &docs)?;
    info!(written, "mirror refreshed");
    Ok(written)
}
