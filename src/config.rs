//! Process-wide configuration
//!
//! Read once at startup and handed to each resolver. Nothing downstream
//! touches the environment directly.

use crate::error::AgentError;
use crate::Result;
use std::env;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_FX_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_API_PORT: u16 = 8080;

#[derive(Clone)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub google_maps_api_key: String,
    pub gemini_model: String,
    /// Unset means no cap is sent to the model.
    pub gemini_max_output_tokens: Option<u32>,
    pub fx_timeout: Duration,
    pub api_port: u16,
}

impl AppConfig {
    /// Load from the process environment. Call `dotenv::dotenv()` first if a
    /// `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gemini_api_key = lookup("GEMINI_API_KEY").unwrap_or_default();
        if gemini_api_key.is_empty() {
            warn!("GEMINI_API_KEY not set; fact extraction will fail");
        }

        let google_maps_api_key = lookup("GOOGLE_MAPS_API_KEY").unwrap_or_default();
        if google_maps_api_key.is_empty() {
            warn!("GOOGLE_MAPS_API_KEY not set; geocoding will fail");
        }

        let gemini_model = lookup("GEMINI_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let gemini_max_output_tokens = match lookup("GEMINI_MAX_OUTPUT_TOKENS") {
            Some(raw) if !raw.trim().is_empty() => Some(raw.trim().parse::<u32>().map_err(|e| {
                AgentError::Config(format!("GEMINI_MAX_OUTPUT_TOKENS must be an integer: {}", e))
            })?),
            _ => None,
        };

        let fx_timeout_secs = match lookup("FX_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                AgentError::Config(format!("FX_TIMEOUT_SECS must be an integer: {}", e))
            })?,
            None => DEFAULT_FX_TIMEOUT_SECS,
        };

        let api_port = match lookup("PORT").or_else(|| lookup("API_PORT")) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                AgentError::Config(format!("PORT must be a valid port number: {}", e))
            })?,
            None => DEFAULT_API_PORT,
        };

        Ok(Self {
            gemini_api_key,
            google_maps_api_key,
            gemini_model,
            gemini_max_output_tokens,
            fx_timeout: Duration::from_secs(fx_timeout_secs),
            api_port,
        })
    }
}

// Keys stay out of debug output.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("google_maps_api_key", &redact(&self.google_maps_api_key))
            .field("gemini_model", &self.gemini_model)
            .field("gemini_max_output_tokens", &self.gemini_max_output_tokens)
            .field("fx_timeout", &self.fx_timeout)
            .field("api_port", &self.api_port)
            .finish()
    }
}

fn redact(key: &str) -> &'static str {
    if key.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}
