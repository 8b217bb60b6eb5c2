//! Library operations on top of a content store: faceted browse, post
//! detail, export and the maintenance scripts.

pub mod catalog;
pub mod facets;
pub mod import;
pub mod migrations;
pub mod mirror;
pub mod purge;
pub mod themes_seed;

use std::io::{BufRead, Write};
use std::path::Path;
use std::thread::ScopedJoinHandle;

use library_model::PostCard;
use library_store::orchestrator::{self, Migration, MigrationReport, OrchestratorError};
use library_store::{ContentRead, ContentStore, DocSelector, PostFilter, RawFilterParams, StoreError};
use tracing::debug;

pub use catalog::{Catalog, ExportRow, PostDetail, RelatedPost};
pub use facets::{build_facets, toggle_query, FacetOption, Facets, Toggle};
pub use import::{ImportOptions, ImportReport};
pub use purge::{purge_selector, PurgeOutcome};
pub use themes_seed::SeedReport;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("batch error: {0}")]
    Batch(#[from] OrchestratorError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("worker thread panicked during {0}")]
    Worker(&'static str),
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How many related posts a detail view carries.
    pub related_limit: usize,
    /// How many matching documents a purge preview lists.
    pub purge_sample: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { related_limit: 5, purge_sample: 10 }
    }
}

/// One page of filtered results plus the facet options to render beside it.
#[derive(Debug, Clone)]
pub struct BrowsePage {
    pub filter: PostFilter,
    pub posts: Vec<PostCard>,
    pub facets: Facets,
}

pub(crate) fn join_lookup<T>(handle: ScopedJoinHandle<'_, Result<T, StoreError>>) -> Result<T, ServiceError> {
    match handle.join() {
        Ok(res) => res.map_err(ServiceError::from),
        Err(_) => Err(ServiceError::Worker("store lookup")),
    }
}

pub struct LibraryService<S> {
    store: S,
    cfg: ServiceConfig,
}

impl<S> LibraryService<S> {
    pub fn new(store: S) -> Self {
        Self { store, cfg: ServiceConfig::default() }
    }

    pub fn with_config(store: S, cfg: ServiceConfig) -> Self {
        Self { store, cfg }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.cfg
    }
}

impl<S: ContentRead> LibraryService<S> {
    /// Parse the raw facet parameters and run the four browse lookups together.
    pub fn browse(&self, raw: &RawFilterParams) -> Result<BrowsePage, ServiceError> {
        let filter = PostFilter::from_params(raw);
        debug!(?filter, "browse");
        let store = &self.store;
        let (posts, themes, series, used) = std::thread::scope(|s| {
            let posts = s.spawn(|| store.find_posts(&filter));
            let themes = s.spawn(|| store.list_themes());
            let series = s.spawn(|| store.list_series());
            let used = s.spawn(|| store.used_theme_ids());
            (join_lookup(posts), join_lookup(themes), join_lookup(series), join_lookup(used))
        });
        let (posts, themes, series, used) = (posts?, themes?, series?, used?);
        let facets = build_facets(&posts, &filter, &themes, &series, &used);
        Ok(BrowsePage { filter, posts, facets })
    }

    pub fn post_detail(&self, slug: &str) -> Result<PostDetail, ServiceError> {
        let catalog = Catalog::load(&self.store)?;
        catalog
            .detail(slug, self.cfg.related_limit)
            .ok_or_else(|| ServiceError::NotFound(format!("post with slug {slug:?}")))
    }

    pub fn export_rows(&self) -> Result<Vec<ExportRow>, ServiceError> {
        Ok(Catalog::load(&self.store)?.export_rows())
    }

    /// Export rows as tab-separated values with a header line.
    pub fn write_export<W: Write>(&self, out: W) -> Result<usize, ServiceError> {
        let rows = self.export_rows()?;
        catalog::write_tsv(&rows, out)?;
        Ok(rows.len())
    }
}

impl<S: ContentStore> LibraryService<S> {
    pub fn run_migration(&self, migration: &dyn Migration, dry_run: bool) -> Result<MigrationReport, ServiceError> {
        Ok(orchestrator::run_migration(&self.store, migration, dry_run)?)
    }

    pub fn import_csv(&self, path: &Path, opts: &ImportOptions) -> Result<ImportReport, ServiceError> {
        import::import_csv(&self.store, path, opts)
    }

    pub fn seed_themes(&self, dry_run: bool) -> Result<SeedReport, ServiceError> {
        themes_seed::seed_themes(&self.store, dry_run)
    }

    /// Preview, confirm and delete. See [`purge::purge`].
    pub fn purge<R: BufRead, W: Write>(
        &self,
        selector: &DocSelector,
        apply: bool,
        input: &mut R,
        output: &mut W,
    ) -> Result<PurgeOutcome, ServiceError> {
        purge::purge(&self.store, selector, apply, self.cfg.purge_sample, input, output)
    }
}
