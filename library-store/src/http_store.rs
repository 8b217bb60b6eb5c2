//! Content store backed by the hosted HTTP query and mutate endpoints.

use std::time::Duration;

use library_model::{PostCard, SeriesOption, ThemeOption};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::StoreConfig;
use crate::groq::{self, compose_post_query};
use crate::{
    decode_documents, CommitReceipt, ContentRead, ContentWrite, DocSelector, Fetched, PostFilter, StoreError, Transaction,
};

pub struct SanityHttpStore {
    config: StoreConfig,
    client: Client,
}

#[derive(Deserialize)]
struct QueryResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct MutateResponse {
    #[serde(rename = "transactionId", default)]
    transaction_id: Option<String>,
    #[serde(default)]
    results: Vec<MutateResult>,
}

#[derive(Deserialize)]
struct MutateResult {
    #[serde(default)]
    id: Option<String>,
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Transport(e.to_string())
    }
}

impl SanityHttpStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("library-store/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(SanityHttpStore { config, client })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.config.token.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Run a GROQ query and decode its `result`.
    pub fn query<T: DeserializeOwned>(&self, query: &str, params: &Map<String, Value>) -> Result<T, StoreError> {
        debug!(query = %query, "groq query");
        let req = self
            .client
            .post(self.config.query_url())
            .json(&json!({ "query": query, "params": params }));
        let body = send(self.authorize(req))?;
        let parsed: QueryResponse<T> =
            serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(parsed.result)
    }

    fn query_plain<T: DeserializeOwned>(&self, query: &str) -> Result<T, StoreError> {
        self.query(query, &Map::new())
    }
}

fn send(req: RequestBuilder) -> Result<String, StoreError> {
    let resp = req.send()?;
    let status = resp.status();
    let body = resp.text()?;
    if status.is_success() {
        return Ok(body);
    }
    Err(StoreError::Http { status: status.as_u16(), message: error_message(&body) })
}

// Error bodies look like `{"error":{"description":"..."}}`; fall back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            let err = v.get("error")?;
            err.get("description")
                .or_else(|| err.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| err.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.chars().take(500).collect())
}

impl ContentRead for SanityHttpStore {
    fn find_posts(&self, filter: &PostFilter) -> Result<Vec<PostCard>, StoreError> {
        let composed = compose_post_query(filter);
        self.query(&composed.query, &composed.params)
    }

    fn list_themes(&self) -> Result<Vec<ThemeOption>, StoreError> {
        self.query_plain(groq::THEMES_QUERY)
    }

    fn list_series(&self) -> Result<Vec<SeriesOption>, StoreError> {
        self.query_plain(groq::SERIES_QUERY)
    }

    fn used_theme_ids(&self) -> Result<Vec<String>, StoreError> {
        let ids: Vec<Option<String>> = self.query_plain(groq::USED_THEME_IDS_QUERY)?;
        Ok(ids.into_iter().flatten().collect())
    }

    fn fetch_checked(&self, selector: &DocSelector, limit: Option<usize>) -> Result<Fetched, StoreError> {
        let raw: Vec<Value> = self.query_plain(&groq::fetch_query(selector, limit)?)?;
        Ok(decode_documents(raw))
    }

    fn count(&self, selector: &DocSelector) -> Result<usize, StoreError> {
        self.query_plain(&groq::count_query(selector)?)
    }
}

impl ContentWrite for SanityHttpStore {
    fn commit(&self, tx: &Transaction) -> Result<CommitReceipt, StoreError> {
        if tx.is_empty() {
            return Ok(CommitReceipt::default());
        }
        let token = self.config.require_token()?;
        tx.check_documents()?;
        let req = self
            .client
            .post(self.config.mutate_url())
            .bearer_auth(token)
            .json(&tx.to_wire()?);
        let body = send(req)?;
        let parsed: MutateResponse =
            serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))?;
        debug!(transaction = ?parsed.transaction_id, mutations = tx.len(), "committed");
        Ok(CommitReceipt {
            transaction_id: parsed.transaction_id,
            document_ids: parsed.results.into_iter().filter_map(|r| r.id).collect(),
            mutations: tx.len(),
        })
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        self.config.require_token()?;
        Ok(())
    }
}
