//! Environment configuration
//!
//! Read once at startup after `dotenv` has populated the process env.

use crate::completion::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::error::AssistantError;
use crate::prompt::FINANCIAL_DEFAULT;
use crate::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 512;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_DB_CONNECTIONS: u32 = 5;

/// Decoding settings for the fallback completion call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionSettings {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Empty when unset; the fallback then answers with the generic error
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub completion: CompletionSettings,
    /// `None` uses the embedded default template
    pub prompt_template_dir: Option<PathBuf>,
    /// Template id rendered for the fallback prompt
    pub prompt_template: String,
    /// `None` uses the in-memory ledger
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub port: u16,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_MODEL.to_string(),
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            completion: CompletionSettings::default(),
            prompt_template_dir: None,
            prompt_template: FINANCIAL_DEFAULT.to_string(),
            database_url: None,
            database_max_connections: DEFAULT_DB_CONNECTIONS,
            port: DEFAULT_PORT,
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let temperature: f32 =
            parse_or(get("COMPLETION_TEMPERATURE"), "COMPLETION_TEMPERATURE", DEFAULT_TEMPERATURE)?;

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            completion: CompletionSettings {
                max_output_tokens: parse_or(
                    get("COMPLETION_MAX_TOKENS"),
                    "COMPLETION_MAX_TOKENS",
                    DEFAULT_MAX_OUTPUT_TOKENS,
                )?,
                temperature: temperature.clamp(0.0, 1.0),
            },
            prompt_template_dir: get("PROMPT_TEMPLATE_DIR").map(PathBuf::from),
            prompt_template: get("PROMPT_TEMPLATE")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.prompt_template),
            database_url: get("DATABASE_URL").or_else(|| get("POSTGRES_URL")),
            database_max_connections: parse_or(
                get("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DB_CONNECTIONS,
            )?,
            port: parse_or(get("PORT").or_else(|| get("API_PORT")), "PORT", DEFAULT_PORT)?,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AssistantError::ConfigError(format!("{} has an invalid value: {}", key, raw))
        }),
    }
}
