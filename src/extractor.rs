//! Country fact extraction
//!
//! Asks the model for a fixed JSON shape and parses whatever comes back into
//! [`CountryFacts`]. The raw text is always kept for display, whether or not
//! it parsed. A malformed answer is final for the query and is never
//! re-prompted.

use crate::models::{CountryFacts, Notice};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

const JSON_FENCE_OPEN: &str = "```json\n";
const FENCE_CLOSE: &str = "\n```";

/// Anything that turns a prompt into free-form text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Outcome of one extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub facts: Option<CountryFacts>,
    pub raw_text: String,
    pub notice: Option<Notice>,
}

pub struct FactExtractor {
    generator: Arc<dyn TextGenerator>,
}

impl FactExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Query the model for `country`. Never fails: transport errors come back
    /// as absent facts with an `Error: ...` raw text and an error notice.
    pub async fn extract(&self, country: &str) -> Extraction {
        let prompt = build_prompt(country);

        let raw_text = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(%country, "Fact extraction request failed: {}", e);
                return Extraction {
                    facts: None,
                    raw_text: format!("Error: {}", e),
                    notice: Some(Notice::error(format!("Error querying Gemini API: {}", e))),
                };
            }
        };

        let facts = parse_facts(&raw_text);
        match &facts {
            Some(parsed) => info!(
                %country,
                exchanges = parsed.exchanges.len(),
                "Parsed country facts"
            ),
            None => warn!(%country, "Model response is not valid fact JSON"),
        }

        Extraction {
            facts,
            raw_text,
            notice: None,
        }
    }
}

/// Fixed instructional prompt with a literal example of the expected JSON.
pub fn build_prompt(country: &str) -> String {
    format!(
        r#"For the country: {country}, provide the following information in a structured JSON format:

1. Currency: The official currency name and its ISO code (exactly 3 letters)
2. Stock Exchanges: List all major stock exchanges with their full names and index symbols
3. Main Exchange Location: The specific address of the main stock exchange headquarters

Format your response as a JSON object with the following structure:
{{
    "currency": {{
        "name": "Currency Name",
        "code": "ISO"
    }},
    "exchanges": [
        {{
            "name": "Exchange Name",
            "indices": [
                {{
                    "name": "Index Name",
                    "symbol": "Symbol"
                }}
            ]
        }}
    ],
    "main_exchange_location": "Full address of main exchange"
}}

The currency code must be the standard 3-letter ISO code (like USD, EUR, JPY, etc.).
Please provide accurate and up-to-date information."#
    )
}

/// First ```json fenced block, or the whole text when there is none.
pub fn extract_json_candidate(text: &str) -> &str {
    text.find(JSON_FENCE_OPEN)
        .map(|start| &text[start + JSON_FENCE_OPEN.len()..])
        .and_then(|after| after.find(FENCE_CLOSE).map(|end| &after[..end]))
        .unwrap_or(text)
}

/// Parse model text into facts, `None` unless it is a JSON object.
pub fn parse_facts(text: &str) -> Option<CountryFacts> {
    match serde_json::from_str::<serde_json::Value>(extract_json_candidate(text)).ok()? {
        value @ serde_json::Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    }
}
