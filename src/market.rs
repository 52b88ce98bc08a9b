//! Market index resolution
//!
//! Looks up the latest price for each index the model listed. Symbols are
//! guessed from index names when the model gave a bare one. Every index is
//! resolved on its own and a failure only affects that entry.

use crate::error::AgentError;
use crate::models::{IndexRef, IndexValue, IndexValues, DATA_UNAVAILABLE, NO_SYMBOL_AVAILABLE};
use crate::normalizer::guess_ticker_symbol;
use crate::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const ERROR_DETAIL_CHARS: usize = 50;

/// A source of latest prices by ticker.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// `Ok(None)` when the provider knows the symbol but has no price.
    async fn latest_price(&self, symbol: &str) -> Result<Option<f64>>;
}

/// Yahoo Finance chart API.
pub struct YahooQuoteProvider {
    client: Client,
    base_url: String,
}

impl YahooQuoteProvider {
    pub fn new() -> Result<Self> {
        Self::with_base_url(YAHOO_CHART_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        // Yahoo rejects requests without a browser-like user agent.
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            ),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QuoteProvider for YahooQuoteProvider {
    async fn latest_price(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(symbol));
        debug!(%symbol, %url, "Fetching Yahoo quote");

        let response = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", "1d")])
            .send()
            .await
            .map_err(|e| AgentError::Provider(format!("Request failed for {}: {}", symbol, e)))?;

        let status = response.status();
        let body = response.text().await?;
        let data: Value = serde_json::from_str(&body).map_err(|e| {
            AgentError::Provider(format!("HTTP {} for {}: {}", status, symbol, e))
        })?;

        // Yahoo reports unknown symbols as a 404 carrying a chart.error object.
        let price = parse_regular_market_price(symbol, &data)?;
        if !status.is_success() {
            error!(%symbol, %status, "Yahoo API error");
            return Err(AgentError::Provider(format!("HTTP error for {}: {}", symbol, status)));
        }
        Ok(price)
    }
}

/// `chart.result[0].meta.regularMarketPrice`, or the chart error if Yahoo
/// sent one.
pub fn parse_regular_market_price(symbol: &str, data: &Value) -> Result<Option<f64>> {
    if let Some(error) = data
        .get("chart")
        .and_then(|c| c.get("error"))
        .and_then(Value::as_object)
    {
        let code = error.get("code").and_then(Value::as_str).unwrap_or("unknown");
        let desc = error
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("No description");
        return Err(AgentError::Provider(format!(
            "Yahoo API error for {}: {} - {}",
            symbol, code, desc
        )));
    }

    Ok(data
        .get("chart")
        .and_then(|c| c.get("result"))
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("meta"))
        .and_then(|m| m.get("regularMarketPrice"))
        .and_then(Value::as_f64))
}

pub struct IndexResolver {
    provider: Arc<dyn QuoteProvider>,
}

impl IndexResolver {
    pub fn new(provider: Arc<dyn QuoteProvider>) -> Self {
        Self { provider }
    }

    /// Resolve each index in order. Indices without a symbol are skipped
    /// without a provider call.
    pub async fn resolve(&self, indices: &[IndexRef]) -> IndexValues {
        let mut values = IndexValues::new();

        for index in indices {
            if index.symbol.is_empty() {
                values.insert(
                    index.name.clone(),
                    IndexValue::Unavailable(NO_SYMBOL_AVAILABLE.to_string()),
                );
                continue;
            }

            let ticker = guess_ticker_symbol(&index.name, &index.symbol);
            let value = match self.provider.latest_price(&ticker).await {
                Ok(Some(price)) if price.is_finite() && price != 0.0 => IndexValue::Price(price),
                Ok(_) => {
                    debug!(index = %index.name, %ticker, "No price returned");
                    IndexValue::Unavailable(DATA_UNAVAILABLE.to_string())
                }
                Err(e) => {
                    warn!(index = %index.name, %ticker, "Index lookup failed: {}", e);
                    IndexValue::Unavailable(format!(
                        "Error: {}...",
                        truncate_chars(&e.to_string(), ERROR_DETAIL_CHARS)
                    ))
                }
            };
            values.insert(index.name.clone(), value);
        }

        values
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
