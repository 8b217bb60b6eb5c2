pub mod config;
pub mod filters;
pub mod groq;
pub mod http_store;
pub mod mutation;
pub mod orchestrator;
pub mod sqlite_repo;

use chrono::NaiveDate;
use library_model::{DocType, Document, ModelError, PostCard, SeriesOption, ThemeOption};
use serde_json::Value;

pub use filters::{PostFilter, RawFilterParams, TextPattern};
pub use mutation::{DeleteTarget, Mutation, Patch, PatchOp, Transaction};

/// Read side of a content store. Implementations must answer the same
/// questions with the same semantics whether they are remote or local.
pub trait ContentRead: Send + Sync {
    /// Posts matching every active facet of `filter`, newest first.
    fn find_posts(&self, filter: &PostFilter) -> Result<Vec<PostCard>, StoreError>;
    /// All themes ordered by title.
    fn list_themes(&self) -> Result<Vec<ThemeOption>, StoreError>;
    /// All series ordered by year (desc), then title.
    fn list_series(&self) -> Result<Vec<SeriesOption>, StoreError>;
    /// Distinct theme ids referenced by at least one post.
    fn used_theme_ids(&self) -> Result<Vec<String>, StoreError>;
    /// Selected documents, with the ones that fail the model boundary kept apart.
    fn fetch_checked(&self, selector: &DocSelector, limit: Option<usize>) -> Result<Fetched, StoreError>;
    fn count(&self, selector: &DocSelector) -> Result<usize, StoreError>;

    /// Selected documents; undecodable ones are logged and skipped.
    fn fetch_documents(&self, selector: &DocSelector, limit: Option<usize>) -> Result<Vec<Document>, StoreError> {
        let fetched = self.fetch_checked(selector, limit)?;
        for r in &fetched.rejected {
            tracing::warn!(doc_id = %r.id, error = %r.error, "skipping undecodable document");
        }
        Ok(fetched.documents)
    }
}

/// Write side: an ordered list of mutations applied atomically.
pub trait ContentWrite {
    fn commit(&self, tx: &Transaction) -> Result<CommitReceipt, StoreError>;

    /// Fails when no commit could succeed, e.g. a remote store without a write token.
    /// Write runs call this before their first read.
    fn ensure_writable(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub trait ContentStore: ContentRead + ContentWrite {}

impl<T: ContentRead + ContentWrite + ?Sized> ContentStore for T {}

impl<T: ContentRead + ?Sized> ContentRead for Box<T> {
    fn find_posts(&self, filter: &PostFilter) -> Result<Vec<PostCard>, StoreError> {
        (**self).find_posts(filter)
    }
    fn list_themes(&self) -> Result<Vec<ThemeOption>, StoreError> {
        (**self).list_themes()
    }
    fn list_series(&self) -> Result<Vec<SeriesOption>, StoreError> {
        (**self).list_series()
    }
    fn used_theme_ids(&self) -> Result<Vec<String>, StoreError> {
        (**self).used_theme_ids()
    }
    fn fetch_checked(&self, selector: &DocSelector, limit: Option<usize>) -> Result<Fetched, StoreError> {
        (**self).fetch_checked(selector, limit)
    }
    fn fetch_documents(&self, selector: &DocSelector, limit: Option<usize>) -> Result<Vec<Document>, StoreError> {
        (**self).fetch_documents(selector, limit)
    }
    fn count(&self, selector: &DocSelector) -> Result<usize, StoreError> {
        (**self).count(selector)
    }
}

impl<T: ContentWrite + ?Sized> ContentWrite for Box<T> {
    fn commit(&self, tx: &Transaction) -> Result<CommitReceipt, StoreError> {
        (**self).commit(tx)
    }
    fn ensure_writable(&self) -> Result<(), StoreError> {
        (**self).ensure_writable()
    }
}

/// Which documents a fetch, count or delete applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocSelector {
    OfType(DocType),
    PostBySlug(String),
    /// Posts where a top-level field is present and non-null.
    PostsWithField(String),
    /// Posts of one series year and/or dated strictly before a day.
    Posts { series_year: Option<i32>, before: Option<NaiveDate> },
    /// Free-form GROQ document query, e.g. `*[_type=="post" && defined(youtube)]`.
    Groq(String),
}

/// A stored document that failed to decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    /// `_id`, or `?` when the body had none.
    pub id: String,
    pub error: ModelError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fetched {
    pub documents: Vec<Document>,
    pub rejected: Vec<Rejected>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub transaction_id: Option<String>,
    pub document_ids: Vec<String>,
    pub mutations: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unsupported by this store: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

/// Decode raw documents, setting aside any that fail the model boundary.
pub(crate) fn decode_documents(values: Vec<Value>) -> Fetched {
    let mut out = Fetched { documents: Vec::with_capacity(values.len()), rejected: Vec::new() };
    for value in values {
        let id = value.get("_id").and_then(Value::as_str).unwrap_or("?").to_string();
        match Document::from_value(value) {
            Ok(doc) => out.documents.push(doc),
            Err(error) => out.rejected.push(Rejected { id, error }),
        }
    }
    out
}
