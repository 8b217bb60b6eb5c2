//! Connection settings for the hosted content store, read from the environment.

pub const ENV_PROJECT_ID: &str = "SANITY_PROJECT_ID";
pub const ENV_PUBLIC_PROJECT_ID: &str = "NEXT_PUBLIC_SANITY_PROJECT_ID";
pub const ENV_DATASET: &str = "SANITY_DATASET";
pub const ENV_PUBLIC_DATASET: &str = "NEXT_PUBLIC_SANITY_DATASET";
pub const ENV_API_VERSION: &str = "SANITY_API_VERSION";
pub const ENV_PUBLIC_API_VERSION: &str = "NEXT_PUBLIC_SANITY_API_VERSION";
pub const ENV_WRITE_TOKEN: &str = "SANITY_WRITE_TOKEN";
pub const ENV_AUTH_TOKEN: &str = "SANITY_AUTH_TOKEN";
pub const ENV_USE_CDN: &str = "SANITY_USE_CDN";

pub const DEFAULT_API_VERSION: &str = "2025-09-13";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub project_id: String,
    pub dataset: String,
    pub api_version: String,
    pub token: Option<String>,
    /// Serve reads from the edge cache. Only used when no token is set.
    pub use_cdn: bool,
    pub timeout_secs: u64,
}

impl StoreConfig {
    pub fn new(project_id: impl Into<String>, dataset: impl Into<String>) -> Self {
        StoreConfig {
            project_id: project_id.into(),
            dataset: dataset.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token: None,
            use_cdn: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let project_id = get(ENV_PROJECT_ID)
            .or_else(|| get(ENV_PUBLIC_PROJECT_ID))
            .ok_or(ConfigError::Missing(ENV_PROJECT_ID))?;
        let dataset = get(ENV_DATASET)
            .or_else(|| get(ENV_PUBLIC_DATASET))
            .ok_or(ConfigError::Missing(ENV_DATASET))?;
        let mut cfg = StoreConfig::new(project_id, dataset);
        if let Some(v) = get(ENV_API_VERSION).or_else(|| get(ENV_PUBLIC_API_VERSION)) {
            cfg.api_version = v.trim_start_matches('v').to_string();
        }
        cfg.token = get(ENV_WRITE_TOKEN).or_else(|| get(ENV_AUTH_TOKEN));
        if let Some(v) = get(ENV_USE_CDN) {
            cfg.use_cdn = match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(ConfigError::Invalid { name: ENV_USE_CDN, value: v }),
            };
        }
        Ok(cfg)
    }

    /// Mutations need a token; reads do not.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.token.as_deref().ok_or(ConfigError::Missing(ENV_WRITE_TOKEN))
    }

    fn host(&self, cdn: bool) -> String {
        let api = if cdn { "apicdn" } else { "api" };
        format!("https://{}.{}.sanity.io/v{}", self.project_id, api, self.api_version)
    }

    pub fn query_url(&self) -> String {
        let cdn = self.use_cdn && self.token.is_none();
        format!("{}/data/query/{}", self.host(cdn), self.dataset)
    }

    pub fn mutate_url(&self) -> String {
        format!("{}/data/mutate/{}?returnIds=true&visibility=sync", self.host(false), self.dataset)
    }
}
