use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::screening::upload_cache::CacheKeyMode;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Application configuration loaded from environment variables (and `.env`).
/// CLI flags in `main` override the path settings after loading.
#[derive(Debug, Clone)]
pub struct Config {
    /// Required by `run`; `serve` takes the credential per request.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model: String,
    pub uploads_dir: PathBuf,
    pub job_file: PathBuf,
    pub cache_file: PathBuf,
    pub report_dir: PathBuf,
    pub file_delay: Duration,
    pub retry_delay: Duration,
    pub cache_key: CacheKeyMode,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_base_url: optional_env("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: optional_env("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            uploads_dir: path_env("SCREENER_UPLOADS_DIR", "uploads"),
            job_file: path_env("SCREENER_JOB_FILE", "job.txt"),
            cache_file: path_env("SCREENER_CACHE_FILE", "uploaded_files_cache.json"),
            report_dir: path_env("SCREENER_REPORT_DIR", "."),
            file_delay: millis_env("SCREENER_FILE_DELAY_MS", 2000)?,
            retry_delay: millis_env("SCREENER_RETRY_DELAY_MS", 2000)?,
            cache_key: parse_cache_key(optional_env("SCREENER_CACHE_KEY").as_deref())?,
            port: optional_env("PORT")
                .unwrap_or_else(|| "8000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Returns the API key or a configuration fault naming the missing variable.
    pub fn require_api_key(&self) -> Result<String> {
        self.openai_api_key
            .clone()
            .context("Required environment variable 'OPENAI_API_KEY' is not set")
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn path_env(key: &str, default: &str) -> PathBuf {
    optional_env(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn millis_env(key: &str, default: u64) -> Result<Duration> {
    match optional_env(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .with_context(|| format!("{key} must be a whole number of milliseconds")),
        None => Ok(Duration::from_millis(default)),
    }
}

fn parse_cache_key(raw: Option<&str>) -> Result<CacheKeyMode> {
    match raw.map(str::trim) {
        None | Some("filename") => Ok(CacheKeyMode::FileName),
        Some("content-hash") => Ok(CacheKeyMode::ContentHash),
        Some(other) => bail!(
            "Unknown SCREENER_CACHE_KEY '{other}'. Must be 'filename' or 'content-hash'."
        ),
    }
}
