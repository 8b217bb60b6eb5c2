use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use library_model::{DocType, Document, PostCard, SeriesOption, ThemeOption};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use serde_json::{json, Map, Value};

use crate::{
    decode_documents, CommitReceipt, ContentRead, ContentWrite, DeleteTarget, DocSelector, Fetched, Mutation,
    PostFilter, StoreError, Transaction,
};

/// Local mirror of the dataset in one SQLite file.
///
/// Documents are stored whole as JSON; a few derived columns (lowercased
/// search text, slug, date) are kept alongside for filtering and ordering.
/// Facet filters run as JSON1 subqueries so the semantics match the hosted
/// query: any-of within a facet, all facets combined with AND.
pub struct SqliteRepo {
    conn: Mutex<Connection>,
}

fn backend(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(e.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

fn decode_err(e: serde_json::Error) -> StoreError {
    StoreError::Decode(e.to_string())
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

impl SqliteRepo {
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::init(&conn, false).map_err(backend)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open a file-backed mirror at `path`, creating the schema if absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        Self::init(&conn, true).map_err(backend)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init(conn: &Connection, on_disk: bool) -> rusqlite::Result<()> {
        if on_disk {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
            conn.pragma_update(None, "synchronous", "FULL")?;
        }
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                doc_id TEXT PRIMARY KEY,
                doc_type TEXT NOT NULL,
                body_json TEXT NOT NULL,
                slug TEXT,
                date TEXT,
                title_search TEXT,
                partners_search TEXT,
                description_search TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_type ON documents(doc_type);
            CREATE INDEX IF NOT EXISTS idx_documents_date ON documents(date);

            -- Post slugs are unique; other types do not carry one.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_post_slug
                ON documents(slug) WHERE doc_type = 'post' AND slug IS NOT NULL;
            "#,
        )
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Backend("sqlite connection mutex poisoned".into()))
    }

    /// Insert or replace whole documents (mirroring and fixtures). Returns rows written.
    pub fn upsert_documents(&self, docs: &[Document]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate).map_err(backend)?;
        for doc in docs {
            write_row(&tx, doc, true)?;
        }
        tx.commit().map_err(backend)?;
        Ok(docs.len())
    }

    pub fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row("SELECT body_json FROM documents WHERE doc_id = ?1", [id], |r| r.get(0))
            .optional()
            .map_err(backend)?;
        match body {
            Some(b) => Ok(Some(Document::from_value(serde_json::from_str(&b).map_err(decode_err)?)?)),
            None => Ok(None),
        }
    }

    /// Row count per document type, for status output.
    pub fn type_counts(&self) -> Result<Vec<(String, i64)>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT doc_type, count(*) FROM documents GROUP BY doc_type ORDER BY doc_type")
            .map_err(backend)?;
        let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?))).map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }
}

struct Derived {
    slug: Option<String>,
    date: Option<String>,
    title: Option<String>,
    partners: Option<String>,
    description: Option<String>,
}

fn derive(doc: &Document) -> Derived {
    let lower = |s: Option<String>| s.map(|s| s.to_lowercase());
    match doc {
        Document::Post(p) => Derived {
            slug: p.slug_str().map(str::to_string),
            date: p.date.clone().filter(|d| !d.is_empty()),
            title: lower(p.title.clone()),
            partners: lower(p.partners_text()),
            description: lower(Some(p.description_text())),
        },
        other => Derived {
            slug: other.slug().map(str::to_string),
            date: None,
            title: lower(other.title().map(str::to_string)),
            partners: None,
            description: None,
        },
    }
}

fn write_row(tx: &rusqlite::Transaction<'_>, doc: &Document, replace: bool) -> Result<(), StoreError> {
    let id = doc.id().ok_or_else(|| StoreError::Conflict("document has no _id".into()))?.to_string();
    let body = serde_json::to_string(&doc.to_value()).map_err(decode_err)?;
    let d = derive(doc);
    let conflict = if replace {
        r#"ON CONFLICT(doc_id) DO UPDATE SET
            doc_type = excluded.doc_type,
            body_json = excluded.body_json,
            slug = excluded.slug,
            date = excluded.date,
            title_search = excluded.title_search,
            partners_search = excluded.partners_search,
            description_search = excluded.description_search,
            updated_at = excluded.updated_at"#
    } else {
        ""
    };
    let sql = format!(
        "INSERT INTO documents (doc_id, doc_type, body_json, slug, date, title_search, partners_search, description_search, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) {conflict}"
    );
    tx.execute(
        &sql,
        params![id, doc.doc_type(), body, d.slug, d.date, d.title, d.partners, d.description, now_iso()],
    )
    .map_err(backend)?;
    Ok(())
}

fn push_placeholders(sql: &mut String, n: usize) {
    sql.push('(');
    for i in 0..n {
        if i > 0 {
            sql.push(',');
        }
        sql.push('?');
    }
    sql.push(')');
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

// Series year of post `p` via its `series` reference.
const SERIES_YEAR_OF_P: &str = "(SELECT json_extract(s.body_json, '$.year') FROM documents s \
     WHERE s.doc_type = 'series' AND s.doc_id = json_extract(p.body_json, '$.series._ref'))";

/// WHERE clause over `documents p` for the facet filter.
fn post_filter_sql(filter: &PostFilter) -> (String, Vec<SqlValue>) {
    let mut where_sql = String::from("WHERE p.doc_type = 'post'");
    let mut params: Vec<SqlValue> = Vec::new();

    if let Some(years) = &filter.years {
        where_sql.push_str(&format!(" AND {SERIES_YEAR_OF_P} IN "));
        push_placeholders(&mut where_sql, years.len());
        params.extend(years.iter().map(|y| SqlValue::Integer(*y as i64)));
    }
    if let Some(sdgs) = &filter.sdgs {
        where_sql.push_str(
            " AND EXISTS (SELECT 1 FROM json_each(p.body_json, '$.sdgs') r \
             JOIN documents s ON s.doc_id = json_extract(r.value, '$._ref') \
             WHERE s.doc_type = 'sdg' AND json_extract(s.body_json, '$.number') IN ",
        );
        push_placeholders(&mut where_sql, sdgs.len());
        where_sql.push(')');
        params.extend(sdgs.iter().map(|n| SqlValue::Integer(*n as i64)));
    }
    if let Some(themes) = &filter.themes {
        where_sql.push_str(
            " AND EXISTS (SELECT 1 FROM json_each(p.body_json, '$.themes') r \
             WHERE json_extract(r.value, '$._ref') IN ",
        );
        push_placeholders(&mut where_sql, themes.len());
        where_sql.push(')');
        params.extend(themes.iter().cloned().map(SqlValue::Text));
    }
    if let Some(text) = &filter.text {
        // A field matches when it contains every term; any matching field selects the post.
        let mut fields = Vec::new();
        for col in ["p.title_search", "p.partners_search", "p.description_search"] {
            let all_terms = text
                .terms()
                .iter()
                .map(|_| format!("coalesce({col}, '') LIKE ? ESCAPE '\\'"))
                .collect::<Vec<_>>()
                .join(" AND ");
            fields.push(format!("({all_terms})"));
            params.extend(text.terms().iter().map(|t| SqlValue::Text(format!("%{}%", escape_like(t)))));
        }
        where_sql.push_str(&format!(" AND ({})", fields.join(" OR ")));
    }
    (where_sql, params)
}

/// WHERE clause (without the keyword) over bare `documents` for a selector.
fn selector_sql(selector: &DocSelector) -> Result<(String, Vec<SqlValue>), StoreError> {
    let mut params: Vec<SqlValue> = Vec::new();
    let sql = match selector {
        DocSelector::OfType(t) => {
            params.push(SqlValue::Text(t.as_str().to_string()));
            "doc_type = ?".to_string()
        }
        DocSelector::PostBySlug(slug) => {
            params.push(SqlValue::Text(slug.clone()));
            "doc_type = 'post' AND slug = ?".to_string()
        }
        DocSelector::PostsWithField(field) => {
            params.push(SqlValue::Text(format!("$.\"{}\"", field.replace('"', ""))));
            // json_type is NULL for a missing path and 'null' for an explicit null.
            "doc_type = 'post' AND json_type(body_json, ?) != 'null'".to_string()
        }
        DocSelector::Posts { series_year, before } => {
            let mut sql = String::from("doc_type = 'post'");
            if let Some(y) = series_year {
                sql.push_str(
                    " AND (SELECT json_extract(s.body_json, '$.year') FROM documents s \
                     WHERE s.doc_type = 'series' AND s.doc_id = json_extract(documents.body_json, '$.series._ref')) = ?",
                );
                params.push(SqlValue::Integer(*y as i64));
            }
            if let Some(d) = before {
                sql.push_str(" AND date IS NOT NULL AND date < ?");
                params.push(SqlValue::Text(d.format("%Y-%m-%d").to_string()));
            }
            sql
        }
        DocSelector::Groq(q) => {
            return Err(StoreError::Unsupported(format!("GROQ selector on the sqlite mirror: {q}")))
        }
    };
    Ok((sql, params))
}

fn theme_ids_of(body: &Value) -> Vec<String> {
    body.get("themes")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|r| r.get("_ref").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl ContentRead for SqliteRepo {
    fn find_posts(&self, filter: &PostFilter) -> Result<Vec<PostCard>, StoreError> {
        let (where_sql, params) = post_filter_sql(filter);
        let sql = format!(
            r#"SELECT p.doc_id, p.body_json,
                (SELECT json_group_array(json_extract(s.body_json, '$.number'))
                   FROM json_each(p.body_json, '$.sdgs') r
                   JOIN documents s ON s.doc_id = json_extract(r.value, '$._ref')
                  WHERE s.doc_type = 'sdg') AS sdg_nums,
                (SELECT json_object('_id', s.doc_id, 'title', json_extract(s.body_json, '$.title'))
                   FROM documents s
                  WHERE s.doc_type = 'series' AND s.doc_id = json_extract(p.body_json, '$.series._ref')) AS series_json
            FROM documents p
            {where_sql}
            ORDER BY p.date IS NULL, p.date DESC, p.doc_id ASC"#
        );
        let rows: Vec<(String, String, String, Option<String>)> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&sql).map_err(backend)?;
            let mapped = stmt
                .query_map(params_from_iter(params.iter()), |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))
                .map_err(backend)?;
            mapped.collect::<Result<_, _>>().map_err(backend)?
        };

        let mut out = Vec::with_capacity(rows.len());
        for (doc_id, body_json, sdg_nums, series_json) in rows {
            let body: Value = serde_json::from_str(&body_json).map_err(decode_err)?;
            let sdg_nums: Value = serde_json::from_str(&sdg_nums).map_err(decode_err)?;
            let series: Value = match series_json {
                Some(s) => serde_json::from_str(&s).map_err(decode_err)?,
                None => Value::Null,
            };
            let card = json!({
                "_id": doc_id,
                "title": body.get("title"),
                "slug": body.get("slug"),
                "partners": body.get("partners"),
                "mainImage": body.get("mainImage"),
                "youtube": body.get("youtube"),
                "sdgNums": sdg_nums,
                "themeIds": theme_ids_of(&body),
                "series": series,
            });
            out.push(serde_json::from_value(card).map_err(decode_err)?);
        }
        Ok(out)
    }

    fn list_themes(&self) -> Result<Vec<ThemeOption>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT doc_id, json_extract(body_json, '$.title') AS title FROM documents
                 WHERE doc_type = 'theme' ORDER BY title ASC, doc_id ASC",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map([], |r| {
                let title: Option<String> = r.get(1)?;
                Ok(ThemeOption { id: r.get::<_, String>(0)?.into(), title: title.unwrap_or_default() })
            })
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }

    fn list_series(&self) -> Result<Vec<SeriesOption>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT doc_id, json_extract(body_json, '$.title') AS title, json_extract(body_json, '$.year') AS year
                 FROM documents WHERE doc_type = 'series' ORDER BY year DESC, title ASC",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map([], |r| {
                let year: Option<i64> = r.get(2)?;
                Ok(SeriesOption {
                    id: r.get::<_, String>(0)?.into(),
                    title: r.get(1)?,
                    year: year.and_then(|y| i32::try_from(y).ok()),
                })
            })
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }

    fn used_theme_ids(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT json_extract(r.value, '$._ref') AS theme_id
                 FROM documents p, json_each(p.body_json, '$.themes') r
                 WHERE p.doc_type = 'post' AND json_extract(r.value, '$._ref') IS NOT NULL
                 ORDER BY theme_id",
            )
            .map_err(backend)?;
        let rows = stmt.query_map([], |r| r.get(0)).map_err(backend)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(backend)
    }

    fn fetch_checked(&self, selector: &DocSelector, limit: Option<usize>) -> Result<Fetched, StoreError> {
        let (cond, mut params) = selector_sql(selector)?;
        params.push(SqlValue::Integer(limit.map(|n| n as i64).unwrap_or(-1)));
        let sql = format!("SELECT body_json FROM documents WHERE {cond} ORDER BY rowid LIMIT ?");
        let bodies: Vec<String> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&sql).map_err(backend)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |r| r.get(0)).map_err(backend)?;
            rows.collect::<Result<_, _>>().map_err(backend)?
        };
        let values = bodies
            .iter()
            .map(|b| serde_json::from_str(b))
            .collect::<Result<Vec<Value>, _>>()
            .map_err(decode_err)?;
        Ok(decode_documents(values))
    }

    fn count(&self, selector: &DocSelector) -> Result<usize, StoreError> {
        let (cond, params) = selector_sql(selector)?;
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row(&format!("SELECT count(*) FROM documents WHERE {cond}"), params_from_iter(params.iter()), |r| {
                r.get(0)
            })
            .map_err(backend)?;
        Ok(n as usize)
    }
}

fn stamp(body: &mut Map<String, Value>, creating: bool) {
    let now = Value::String(now_iso());
    if creating && !body.contains_key("_createdAt") {
        body.insert("_createdAt".into(), now.clone());
    }
    body.insert("_updatedAt".into(), now);
}

fn into_object(value: &Value) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        _ => Err(StoreError::Model(library_model::ModelError::NotAnObject)),
    }
}

impl ContentWrite for SqliteRepo {
    /// Applies every mutation inside one SQLite transaction; any failure rolls all of them back.
    /// Every written document must pass [`Document::validate`].
    fn commit(&self, txn: &Transaction) -> Result<CommitReceipt, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate).map_err(backend)?;
        let mut ids = Vec::new();

        for m in txn.mutations() {
            match m {
                Mutation::Create(value) => {
                    let mut body = into_object(value)?;
                    let has_id = body.get("_id").and_then(Value::as_str).is_some_and(|s| !s.is_empty());
                    if !has_id {
                        body.insert("_id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
                    }
                    stamp(&mut body, true);
                    let doc = Document::from_value(Value::Object(body))?;
                    doc.validate()?;
                    write_row(&tx, &doc, false)?;
                    ids.extend(doc.id().map(str::to_string));
                }
                Mutation::CreateOrReplace(value) => {
                    let mut body = into_object(value)?;
                    stamp(&mut body, true);
                    let doc = Document::from_value(Value::Object(body))?;
                    doc.validate()?;
                    write_row(&tx, &doc, true)?;
                    ids.extend(doc.id().map(str::to_string));
                }
                Mutation::Patch(patch) => {
                    let body: Option<String> = tx
                        .query_row("SELECT body_json FROM documents WHERE doc_id = ?1", [patch.id.as_str()], |r| r.get(0))
                        .optional()
                        .map_err(backend)?;
                    let body = body.ok_or_else(|| StoreError::NotFound(patch.id.to_string()))?;
                    let mut body = match serde_json::from_str::<Value>(&body).map_err(decode_err)? {
                        Value::Object(map) => map,
                        _ => return Err(StoreError::Decode(format!("{}: stored body is not an object", patch.id))),
                    };
                    patch.apply(&mut body)?;
                    stamp(&mut body, false);
                    let doc = Document::from_value(Value::Object(body))?;
                    doc.validate()?;
                    write_row(&tx, &doc, true)?;
                    ids.push(patch.id.to_string());
                }
                Mutation::Delete(DeleteTarget::Id(id)) => {
                    tx.execute("DELETE FROM documents WHERE doc_id = ?1", [id.as_str()]).map_err(backend)?;
                    ids.push(id.to_string());
                }
                Mutation::Delete(DeleteTarget::Query(selector)) => {
                    let (cond, params) = selector_sql(selector)?;
                    let mut deleted: Vec<String> = {
                        let mut stmt = tx
                            .prepare(&format!("SELECT doc_id FROM documents WHERE {cond}"))
                            .map_err(backend)?;
                        let rows = stmt.query_map(params_from_iter(params.iter()), |r| r.get(0)).map_err(backend)?;
                        rows.collect::<Result<_, _>>().map_err(backend)?
                    };
                    tx.execute(&format!("DELETE FROM documents WHERE {cond}"), params_from_iter(params.iter()))
                        .map_err(backend)?;
                    ids.append(&mut deleted);
                }
            }
        }

        tx.commit().map_err(backend)?;
        Ok(CommitReceipt { transaction_id: Some(uuid::Uuid::new_v4().to_string()), document_ids: ids, mutations: txn.len() })
    }
}

impl SqliteRepo {
    /// Replace the mirror's contents with `docs` for the given types.
    pub fn replace_types(&self, types: &[DocType], docs: &[Document]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate).map_err(backend)?;
        for t in types {
            tx.execute("DELETE FROM documents WHERE doc_type = ?1", [t.as_str()]).map_err(backend)?;
        }
        for doc in docs {
            write_row(&tx, doc, true)?;
        }
        tx.commit().map_err(backend)?;
        Ok(docs.len())
    }
}
