//! Environment-driven configuration.
//!
//! Everything is read once at startup by [`AppConfig::from_env`]; malformed
//! values are boot-time errors rather than silent defaults. The variable
//! names and defaults are the published configuration surface.

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent.
    #[error("missing required environment variable {key}")]
    Missing { key: &'static str },

    /// A variable is present but unparsable.
    #[error("failed to parse environment variable {key}: {message}")]
    Parse { key: &'static str, message: String },
}

/// Application configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub web_search_api_key: Option<String>,
    pub use_hybrid_agent: bool,

    pub embedding_model: String,
    pub llm_model: String,
    pub llm_temperature: f64,

    pub chunk_tokens: usize,
    pub chunk_overlap_tokens: usize,
    pub min_chars: usize,
    pub max_digit_ratio: f64,

    pub default_search_k: usize,
    pub relevance_threshold: f32,
    pub web_search_results_limit: usize,
    pub web_search_days_back: u32,

    pub max_history_messages: usize,
    pub persist_dir: String,

    pub retrieval_deadline: Duration,
    pub turn_deadline: Duration,
    pub provider_timeout: Duration,
    pub context_char_budget: usize,
}

impl AppConfig {
    /// Load and validate configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openai_api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing {
                key: "OPENAI_API_KEY",
            })?;

        let use_hybrid_agent = parse_or("USE_HYBRID_AGENT", true, parse_bool)?;
        let web_search_api_key = env::var("WEB_SEARCH_API_KEY").ok().filter(|v| !v.is_empty());
        if use_hybrid_agent && web_search_api_key.is_none() {
            return Err(ConfigError::Missing {
                key: "WEB_SEARCH_API_KEY",
            });
        }

        Ok(Self {
            openai_api_key,
            web_search_api_key,
            use_hybrid_agent,
            embedding_model: string_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            llm_model: string_or("LLM_MODEL", "gpt-4o-mini"),
            llm_temperature: parse_or("LLM_TEMPERATURE", 0.7, |v| v.parse())?,
            chunk_tokens: parse_or("CHUNK_TOKENS", 800, |v| v.parse())?,
            chunk_overlap_tokens: parse_or("CHUNK_OVERLAP_TOKENS", 100, |v| v.parse())?,
            min_chars: parse_or("MIN_CHARS", 100, |v| v.parse())?,
            max_digit_ratio: parse_or("MAX_DIGIT_RATIO", 0.5, |v| v.parse())?,
            default_search_k: parse_or("DEFAULT_SEARCH_K", 4, |v| v.parse())?,
            relevance_threshold: parse_or("RELEVANCE_THRESHOLD", 0.2, |v| v.parse())?,
            web_search_results_limit: parse_or("WEB_SEARCH_RESULTS_LIMIT", 3, |v| v.parse())?,
            web_search_days_back: parse_or("WEB_SEARCH_DAYS_BACK", 90, |v| v.parse())?,
            max_history_messages: parse_or("MAX_HISTORY_MESSAGES", 10, |v| v.parse())?,
            persist_dir: string_or("CHROMA_PERSIST_DIR", "./chroma_db"),
            retrieval_deadline: Duration::from_millis(parse_or(
                "RETRIEVAL_DEADLINE_MS",
                8_000,
                |v| v.parse(),
            )?),
            turn_deadline: Duration::from_millis(parse_or("TURN_DEADLINE_MS", 60_000, |v| {
                v.parse()
            })?),
            provider_timeout: Duration::from_secs(10),
            context_char_budget: parse_or("CONTEXT_CHAR_BUDGET", 16_000, |v| v.parse())?,
        })
    }
}

fn string_or(key: &'static str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T, E: std::fmt::Display>(
    key: &'static str,
    default: T,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.is_empty() => parse(&raw).map_err(|err| ConfigError::Parse {
            key,
            message: err.to_string(),
        }),
        _ => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}
