use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use library_model::media::Thumbnail;
use library_service::migrations::{Cleanup, ConceptToLinks, Repair};
use library_service::{FacetOption, ImportOptions, LibraryService, PurgeOutcome};
use library_store::config::StoreConfig;
use library_store::http_store::SanityHttpStore;
use library_store::orchestrator::{Migration, MigrationReport};
use library_store::sqlite_repo::SqliteRepo;
use library_store::{ContentStore, RawFilterParams};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Back-office tool for the SDGs In Practice library dataset.
#[derive(Debug, Parser)]
#[command(name = "library-admin", version, about)]
struct Cli {
    /// Work against a local SQLite mirror instead of the hosted dataset.
    #[arg(long, global = true, env = "LIBRARY_SQLITE")]
    sqlite: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List posts matching the facet filters, with facet options.
    Browse(BrowseArgs),
    /// Show one post with its related posts.
    Post { slug: String },
    /// Write every post as TSV.
    Export {
        /// Output file; stdout when omitted.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Upsert posts from a CSV file, matched by slug.
    Import {
        csv: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove undeclared fields and flatten list-valued partners.
    Cleanup {
        #[arg(long)]
        dry_run: bool,
    },
    /// Cleanup plus missing array item keys.
    Repair {
        #[arg(long)]
        dry_run: bool,
    },
    /// Move legacy `concept` URLs into `links`.
    MigrateConcept {
        #[arg(long)]
        dry_run: bool,
    },
    /// Replace all themes with the canonical topic list.
    SeedThemes {
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete posts by series year, date or a GROQ query.
    Purge(PurgeArgs),
    /// Copy posts, SDGs, themes and series from the hosted dataset into a SQLite file.
    Mirror {
        #[arg(long)]
        to: PathBuf,
    },
}

#[derive(Debug, Args)]
struct BrowseArgs {
    /// Series years, e.g. `2024,2025`.
    #[arg(long)]
    series: Option<String>,
    /// SDG numbers, e.g. `3,13`.
    #[arg(long)]
    sdgs: Option<String>,
    /// Theme ids.
    #[arg(long)]
    themes: Option<String>,
    /// Free-text search over title, partners and description.
    #[arg(long, short)]
    q: Option<String>,
    /// Print posts and facets as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct PurgeArgs {
    #[arg(long)]
    series: Option<i32>,
    /// Only posts dated strictly before this day (YYYY-MM-DD).
    #[arg(long)]
    before: Option<NaiveDate>,
    /// GROQ document query; overrides --series and --before.
    #[arg(long)]
    query: Option<String>,
    /// Actually delete (asks for confirmation).
    #[arg(long)]
    apply: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn open_store(sqlite: Option<&PathBuf>) -> Result<Box<dyn ContentStore>> {
    match sqlite {
        Some(path) => {
            let repo = SqliteRepo::open(path).with_context(|| format!("opening {}", path.display()))?;
            info!(path = %path.display(), "using sqlite mirror");
            Ok(Box::new(repo))
        }
        None => Ok(Box::new(hosted_store()?)),
    }
}

fn hosted_store() -> Result<SanityHttpStore> {
    let cfg = StoreConfig::from_env().context("hosted dataset configuration")?;
    info!(project = %cfg.project_id, dataset = %cfg.dataset, api = %cfg.api_version, "using hosted dataset");
    Ok(SanityHttpStore::new(cfg)?)
}

fn main() -> Result<()> {
    // .env.local first: dotenvy never overrides a variable that is already set.
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing();

    let sqlite = cli.sqlite;
    let service = || -> Result<LibraryService<Box<dyn ContentStore>>> {
        Ok(LibraryService::new(open_store(sqlite.as_ref())?))
    };
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match cli.command {
        Command::Browse(args) => browse(&service()?, args, &mut out)?,
        Command::Post { slug } => post(&service()?, &slug, &mut out)?,
        Command::Export { out: None } => {
            service()?.write_export(&mut out)?;
        }
        Command::Export { out: Some(path) } => {
            let file = std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            let n = service()?.write_export(BufWriter::new(file))?;
            writeln!(out, "Exported {n} post(s) to {}", path.display())?;
        }
        Command::Import { csv, dry_run } => {
            let r = service()?.import_csv(&csv, &ImportOptions { dry_run })?;
            if !r.ignored_headers.is_empty() {
                writeln!(out, "Ignored CSV headers: {}", r.ignored_headers.join(", "))?;
            }
            writeln!(
                out,
                "Done{}. Rows: {}. Created: {}. Patched: {}. Skipped: {}. Failed: {}.",
                if r.dry_run { " (dry-run)" } else { "" },
                r.rows,
                r.created,
                r.patched,
                r.skipped,
                r.failed
            )?;
        }
        Command::Cleanup { dry_run } => migrate(&service()?, &Cleanup, dry_run, &mut out)?,
        Command::Repair { dry_run } => migrate(&service()?, &Repair, dry_run, &mut out)?,
        Command::MigrateConcept { dry_run } => migrate(&service()?, &ConceptToLinks, dry_run, &mut out)?,
        Command::SeedThemes { dry_run } => {
            let r = service()?.seed_themes(dry_run)?;
            writeln!(
                out,
                "Done{}. Deleted: {}. Created: {} ({} with image).",
                if r.dry_run { " (dry-run)" } else { "" },
                r.deleted,
                r.created,
                r.with_image
            )?;
        }
        Command::Purge(args) => {
            let selector = library_service::purge_selector(args.series, args.before, args.query.as_deref());
            let stdin = io::stdin();
            let outcome = service()?.purge(&selector, args.apply, &mut stdin.lock(), &mut out)?;
            if let PurgeOutcome::Deleted { count } = outcome {
                info!(count, "purge applied");
            }
        }
        Command::Mirror { to } => {
            if sqlite.is_some() {
                bail!("mirror reads from the hosted dataset; drop --sqlite");
            }
            let target = SqliteRepo::open(&to).with_context(|| format!("opening {}", to.display()))?;
            let written = library_service::mirror::mirror_into(&hosted_store()?, &target)?;
            writeln!(out, "Mirrored {written} document(s) into {}", to.display())?;
            for (doc_type, n) in target.type_counts()? {
                writeln!(out, "  {doc_type}: {n}")?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn migrate<S: ContentStore, W: Write>(
    svc: &LibraryService<S>,
    migration: &dyn Migration,
    dry_run: bool,
    out: &mut W,
) -> Result<()> {
    let MigrationReport { scanned, changed, unchanged, failed, dry_run } = svc.run_migration(migration, dry_run)?;
    writeln!(
        out,
        "{}{}: scanned {scanned}, changed {changed}, unchanged {unchanged}, failed {failed}.",
        migration.name(),
        if dry_run { " (dry-run)" } else { "" }
    )?;
    if failed > 0 {
        bail!("{failed} document(s) failed; see log");
    }
    Ok(())
}

fn marker<V>(o: &FacetOption<V>) -> &'static str {
    match (o.selected, o.enabled) {
        (true, _) => "[x]",
        (false, true) => "[ ]",
        (false, false) => "[-]",
    }
}

fn browse<S: ContentStore, W: Write>(svc: &LibraryService<S>, args: BrowseArgs, out: &mut W) -> Result<()> {
    let raw = RawFilterParams { series: args.series, sdgs: args.sdgs, themes: args.themes, q: args.q };
    let page = svc.browse(&raw)?;

    if args.json {
        let body = serde_json::json!({ "posts": page.posts, "facets": page.facets });
        writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
        return Ok(());
    }

    writeln!(out, "{} post(s)", page.posts.len())?;
    for p in &page.posts {
        let sdgs = p.sdg_nums.iter().map(u8::to_string).collect::<Vec<_>>().join(", ");
        let series = p.series.as_ref().and_then(|s| s.title.as_deref()).unwrap_or("-");
        writeln!(out, " - {} (/{}) | series {series} | SDGs {sdgs}", p.title_or_untitled(), p.slug_str().unwrap_or(""))?;
        if let Some(partners) = p.partners_text() {
            writeln!(out, "     {partners}")?;
        }
    }

    writeln!(out, "\nSeries:")?;
    for o in &page.facets.series {
        writeln!(out, "  {} {}", marker(o), o.label)?;
    }
    writeln!(out, "SDGs:")?;
    for o in &page.facets.sdgs {
        writeln!(out, "  {} {}", marker(o), o.label)?;
    }
    writeln!(out, "Themes:")?;
    for o in &page.facets.themes {
        writeln!(out, "  {} {} ({})", marker(o), o.label, o.value)?;
    }
    Ok(())
}

fn post<S: ContentStore, W: Write>(svc: &LibraryService<S>, slug: &str, out: &mut W) -> Result<()> {
    let d = svc.post_detail(slug)?;
    writeln!(out, "{}", d.title)?;
    let when = [d.date.as_deref(), d.time.as_deref(), d.venue.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" | ");
    if !when.is_empty() {
        writeln!(out, "{when}")?;
    }
    if let Some(p) = &d.partners {
        writeln!(out, "Partners: {p}")?;
    }
    if let Some(s) = &d.series {
        let label = match (s.year, s.title.as_deref()) {
            (Some(y), Some(t)) => format!("{y} ({t})"),
            (Some(y), None) => y.to_string(),
            (None, Some(t)) => t.to_string(),
            (None, None) => "-".to_string(),
        };
        writeln!(out, "Series: {label}")?;
    }
    for s in &d.sdgs {
        writeln!(out, "SDG {}: {}", s.number, s.title)?;
    }
    for t in &d.themes {
        writeln!(out, "Theme: {}{}", t.title, t.link.as_deref().map(|l| format!(" <{l}>")).unwrap_or_default())?;
    }
    if let Some(v) = &d.video {
        let kind = v.kind.map(|k| k.label()).unwrap_or("video");
        writeln!(out, "{kind}: {}", v.url)?;
    }
    match &d.thumbnail {
        Thumbnail::Uploaded => writeln!(out, "Image: uploaded")?,
        Thumbnail::YouTube(url) => writeln!(out, "Image: {url}")?,
        Thumbnail::Fallback => {}
    }
    for l in &d.links {
        writeln!(out, "Link: {} {}", l.title.as_deref().unwrap_or("link"), l.url.as_deref().unwrap_or(""))?;
    }
    if !d.description.is_empty() {
        writeln!(out, "\n{}", d.description)?;
    }
    if !d.related.is_empty() {
        writeln!(out, "\nRelated:")?;
        for r in &d.related {
            writeln!(
                out,
                " - {} (/{}) {}",
                r.title,
                r.slug.as_deref().unwrap_or(""),
                r.date.as_deref().unwrap_or("")
            )?;
        }
    }
    Ok(())
}
