// src/config/mod.rs
// All tunables load from the environment (with .env support); code never
// hardcodes them at call sites.

use once_cell::sync::Lazy;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct MnemoConfig {
    // ── Database Configuration
    pub database_url: String,
    pub sqlite_max_connections: u32,

    // ── Retrieval Configuration
    /// Default token budget applied when a query carries no max_tokens.
    pub max_retrieval_tokens: u32,
    pub tag_weight: f32,
    pub entity_weight: f32,
    pub recency_weight: f32,
    pub recency_half_life_hours: f32,

    // ── Summarization Configuration
    /// Running raw-token estimate at which a session becomes pending.
    pub summarize_threshold_tokens: u32,
    /// Default target size for generated summaries.
    pub summary_target_tokens: u32,
    /// Upper bound on a single external summarizer call.
    pub summarizer_timeout_secs: u64,

    // ── Server Configuration
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,

    // ── Logging Configuration
    pub log_level: String,
}

// Handles values with trailing comments and whitespace.
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl MnemoConfig {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            database_url: env_var_or("DATABASE_URL", "sqlite:./mnemo.db".to_string()),
            sqlite_max_connections: env_var_or("SQLITE_MAX_CONNECTIONS", 5),
            max_retrieval_tokens: env_var_or("MNEMO_MAX_RETRIEVAL_TOKENS", 2048),
            tag_weight: env_var_or("MNEMO_TAG_WEIGHT", 8.0),
            entity_weight: env_var_or("MNEMO_ENTITY_WEIGHT", 2.0),
            recency_weight: env_var_or("MNEMO_RECENCY_WEIGHT", 1.0),
            recency_half_life_hours: env_var_or("MNEMO_RECENCY_HALF_LIFE_HOURS", 168.0),
            summarize_threshold_tokens: env_var_or("MNEMO_SUMMARIZE_THRESHOLD_TOKENS", 1500),
            summary_target_tokens: env_var_or("MNEMO_SUMMARY_TARGET_TOKENS", 64),
            summarizer_timeout_secs: env_var_or("MNEMO_SUMMARIZER_TIMEOUT", 30),
            host: env_var_or("MNEMO_HOST", "127.0.0.1".to_string()),
            port: env_var_or("MNEMO_PORT", 3400),
            request_timeout_secs: env_var_or("MNEMO_REQUEST_TIMEOUT", 30),
            log_level: env_var_or("MNEMO_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<MnemoConfig> = Lazy::new(MnemoConfig::from_env);
