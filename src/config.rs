//! Process-wide settings resolved from the environment, immutable after
//! first read.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::domain::ClassifyError;

static GLOBAL: OnceLock<Settings> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Settings {
    /// Path of the catalogue database file.
    pub db_dsn: String,
    pub embed_model: String,
    /// Dimensionality of the stored vectors; query embeddings must match.
    pub embed_dim: usize,
    pub llm_model: String,
    pub rrf_k: f32,
    /// Default candidate pool size for Stage 1.
    pub retrieval_n: usize,
    /// Default result count.
    pub top_k: usize,
    pub embed_batch_size: usize,
    pub embed_retries: u32,
    pub llm_retries: u32,
    pub db_retries: u32,
    pub embed_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    /// Continue on the surviving search leg when exactly one fails.
    /// Trades silent precision loss for availability; off by default.
    pub allow_degraded_retrieval: bool,
    pub gcp_project: Option<String>,
    pub gcp_location: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_dsn: "anzsic.duckdb".to_string(),
            embed_model: "text-embedding-004".to_string(),
            embed_dim: 768,
            llm_model: "gemini-2.0-flash".to_string(),
            rrf_k: 60.0,
            retrieval_n: 20,
            top_k: 5,
            embed_batch_size: 50,
            embed_retries: 3,
            llm_retries: 3,
            db_retries: 3,
            embed_timeout_secs: 5,
            llm_timeout_secs: 30,
            allow_degraded_retrieval: false,
            gcp_project: None,
            gcp_location: "us-central1".to_string(),
        }
    }
}

impl Settings {
    /// Resolve settings from the environment, falling back to defaults
    /// per option, then validate the result.
    pub fn from_env() -> Result<Self, ClassifyError> {
        let defaults = Self::default();
        let settings = Self {
            db_dsn: env_string("DB_DSN", defaults.db_dsn),
            embed_model: env_string("EMBED_MODEL", defaults.embed_model),
            embed_dim: env_parse("EMBED_DIM", defaults.embed_dim)?,
            llm_model: env_string("LLM_MODEL", defaults.llm_model),
            rrf_k: env_parse("RRF_K", defaults.rrf_k)?,
            retrieval_n: env_parse("RETRIEVAL_N", defaults.retrieval_n)?,
            top_k: env_parse("TOP_K", defaults.top_k)?,
            embed_batch_size: env_parse("EMBED_BATCH_SIZE", defaults.embed_batch_size)?,
            embed_retries: env_parse("EMBED_RETRIES", defaults.embed_retries)?,
            llm_retries: env_parse("LLM_RETRIES", defaults.llm_retries)?,
            db_retries: env_parse("DB_RETRIES", defaults.db_retries)?,
            embed_timeout_secs: env_parse("EMBED_TIMEOUT_SECS", defaults.embed_timeout_secs)?,
            llm_timeout_secs: env_parse("LLM_TIMEOUT_SECS", defaults.llm_timeout_secs)?,
            allow_degraded_retrieval: env_parse(
                "ALLOW_DEGRADED_RETRIEVAL",
                defaults.allow_degraded_retrieval,
            )?,
            gcp_project: std::env::var("GCP_PROJECT").ok().filter(|v| !v.is_empty()),
            gcp_location: env_string("GCP_LOCATION", defaults.gcp_location),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// The process-wide instance, resolved from the environment on first
    /// access and frozen afterwards.
    pub fn global() -> Result<&'static Settings, ClassifyError> {
        if let Some(settings) = GLOBAL.get() {
            return Ok(settings);
        }
        let settings = Self::from_env()?;
        Ok(GLOBAL.get_or_init(|| settings))
    }

    pub fn validate(&self) -> Result<(), ClassifyError> {
        if self.embed_dim == 0 {
            return Err(ClassifyError::configuration("EMBED_DIM must be positive"));
        }
        if self.rrf_k <= 0.0 {
            return Err(ClassifyError::configuration("RRF_K must be positive"));
        }
        if self.top_k < 1 || self.top_k > 20 {
            return Err(ClassifyError::configuration(
                "TOP_K must be between 1 and 20",
            ));
        }
        if self.retrieval_n < 5 || self.retrieval_n > 100 {
            return Err(ClassifyError::configuration(
                "RETRIEVAL_N must be between 5 and 100",
            ));
        }
        if self.retrieval_n < self.top_k {
            return Err(ClassifyError::configuration(
                "RETRIEVAL_N must be at least TOP_K",
            ));
        }
        if self.embed_batch_size == 0 {
            return Err(ClassifyError::configuration(
                "EMBED_BATCH_SIZE must be positive",
            ));
        }
        Ok(())
    }
}

fn env_string(key: &str, default: String) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default,
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ClassifyError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map_err(|e| ClassifyError::configuration(format!("invalid {key}: {e}"))),
        _ => Ok(default),
    }
}
