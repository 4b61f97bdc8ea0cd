use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::pipeline::retry::RetryPolicy;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Remote retrieval backend. Unset = in-process store.
    pub retrieval_url: Option<String>,
    /// PDF renderer. Unset = rendering disabled.
    pub render_url: Option<String>,
    pub pipeline: PipelineConfig,
}

/// Tunables of the generation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub retrieval_top_k: usize,
    pub context_budget_chars: usize,
    /// `None` = unlimited refinements.
    pub max_refinements: Option<u32>,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval_top_k: 5,
            context_budget_chars: 24_000,
            max_refinements: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: env_or("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            retrieval_url: optional_env("RETRIEVAL_URL"),
            render_url: optional_env("RENDER_URL"),
            pipeline: PipelineConfig::from_env()?,
        })
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = RetryPolicy::default();
        let config = PipelineConfig {
            retrieval_top_k: env_or("RETRIEVAL_TOP_K", 5)?,
            context_budget_chars: env_or("CONTEXT_BUDGET_CHARS", 24_000)?,
            max_refinements: optional_env("MAX_REFINEMENTS")
                .map(|v| v.parse::<u32>())
                .transpose()
                .context("MAX_REFINEMENTS must be a non-negative integer")?,
            retry: RetryPolicy {
                output_retries: env_or("STAGE_OUTPUT_RETRIES", defaults.output_retries)?,
                transient_max_attempts: env_or(
                    "TRANSIENT_MAX_ATTEMPTS",
                    defaults.transient_max_attempts,
                )?,
                backoff_base: Duration::from_millis(env_or("BACKOFF_BASE_MS", 1000)?),
                backoff_factor: env_or("BACKOFF_FACTOR", defaults.backoff_factor)?,
                call_timeout: Duration::from_secs(env_or("CALL_TIMEOUT_SECS", 45)?),
            },
        };

        if config.retry.transient_max_attempts == 0 {
            anyhow::bail!("TRANSIENT_MAX_ATTEMPTS must be at least 1");
        }
        if config.retry.backoff_factor < 1.0 {
            anyhow::bail!("BACKOFF_FACTOR must be at least 1.0");
        }
        Ok(config)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}
