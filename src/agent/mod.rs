//! Country pipeline - one query in, one report out
//!
//! EXTRACT → NORMALIZE → RATES → INDICES → LOCATION
//!
//! Stages run in order. A failed stage leaves its part of the report
//! empty and adds a notice. It never stops later stages. The exception is
//! unparseable facts: nothing downstream has input, so the report stops
//! at the raw model text.

use crate::config::AppConfig;
use crate::extractor::{FactExtractor, TextGenerator};
use crate::fx::providers::build_fx_client;
use crate::fx::{ExchangeRateHost, Frankfurter, FxProvider, OpenErApi, RateResolver};
use crate::gemini::GeminiClient;
use crate::geocode::{Geocoder, GoogleGeocoder, LocationResolver};
use crate::market::{IndexResolver, QuoteProvider, YahooQuoteProvider};
use crate::models::{CountryReport, Notice};
use crate::normalizer::normalize_currency_code;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub struct CountryFinanceAgent {
    extractor: FactExtractor,
    rates: RateResolver,
    indices: IndexResolver,
    locations: LocationResolver,
}

impl CountryFinanceAgent {
    pub fn new(
        extractor: FactExtractor,
        rates: RateResolver,
        indices: IndexResolver,
        locations: LocationResolver,
    ) -> Self {
        Self {
            extractor,
            rates,
            indices,
            locations,
        }
    }

    /// Wire the production providers from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let generator: Arc<dyn TextGenerator> = Arc::new(
            GeminiClient::new(config.gemini_api_key.clone(), &config.gemini_model)?
                .with_max_output_tokens(config.gemini_max_output_tokens),
        );

        let fx_client = build_fx_client(config.fx_timeout)?;
        let primary: Arc<dyn FxProvider> = Arc::new(ExchangeRateHost::new(fx_client.clone()));
        let secondary: Arc<dyn FxProvider> = Arc::new(OpenErApi::new(fx_client.clone()));
        let tertiary: Arc<dyn FxProvider> = Arc::new(Frankfurter::new(fx_client));

        let quotes: Arc<dyn QuoteProvider> = Arc::new(YahooQuoteProvider::new()?);
        let geocoder: Arc<dyn Geocoder> =
            Arc::new(GoogleGeocoder::new(config.google_maps_api_key.clone())?);

        Ok(Self::new(
            FactExtractor::new(generator),
            RateResolver::new(primary, secondary, tertiary),
            IndexResolver::new(quotes),
            LocationResolver::new(geocoder),
        ))
    }

    /// Build the report for `country`. Never fails: every upstream problem
    /// is recorded as a notice on the report.
    pub async fn run(&self, country: &str) -> CountryReport {
        let started = Instant::now();
        let country = country.trim();
        let mut report = CountryReport::new(country);

        info!(query_id = %report.query_id, %country, "Gathering country information");

        // === EXTRACT ===
        let extraction = self.extractor.extract(country).await;
        report.raw_response = extraction.raw_text;
        let Some(facts) = extraction.facts else {
            match extraction.notice {
                Some(notice) => report.notices.push(notice),
                None => report.notices.push(Notice::warning(
                    "Could not parse structured data from the model response",
                )),
            }
            warn!(query_id = %report.query_id, "No structured facts; skipping data lookups");
            return report;
        };

        // === NORMALIZE + RATES ===
        let code = facts
            .currency
            .as_ref()
            .map(|c| normalize_currency_code(&c.code))
            .unwrap_or_default();

        if code.is_empty() {
            report
                .notices
                .push(Notice::warning("No currency code available for exchange rates"));
        } else {
            info!(query_id = %report.query_id, %code, "Getting exchange rates");
            report.rates = self.rates.resolve_report(&code, &mut report.notices).await;
            report.currency_code = Some(code);
        }

        // === INDICES ===
        if facts.exchanges.is_empty() {
            report
                .notices
                .push(Notice::warning("No stock exchange information available"));
        } else {
            let indices = facts.all_indices();
            if !indices.is_empty() {
                info!(query_id = %report.query_id, count = indices.len(), "Fetching index values");
                report.index_values = self.indices.resolve(&indices).await;
            }
        }

        // === LOCATION ===
        if let Some(address) = facts.main_location() {
            info!(query_id = %report.query_id, "Geocoding main exchange");
            report.location = self.locations.resolve(address, &mut report.notices).await;
        }

        report.facts = Some(facts);

        info!(
            query_id = %report.query_id,
            notices = report.notices.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Country report complete"
        );

        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::geocode::GeocodeResponse;
    use crate::models::{IndexValue, RateMethod, TargetCurrency, NO_SYMBOL_AVAILABLE};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) const JAPAN_RESPONSE: &str = r#"Sure! Here is the information:
```json
{
    "currency": {"name": "Japanese Yen", "code": "jpy "},
    "exchanges": [
        {
            "name": "Tokyo Stock Exchange",
            "indices": [
                {"name": "Nikkei 225", "symbol": "N225"},
                {"name": "TOPIX", "symbol": ""}
            ]
        }
    ],
    "main_exchange_location": "2-1 Nihombashi Kabuto-cho, Chuo-ku, Tokyo 103-8224, Japan"
}
```"#;

    pub(crate) struct FixedText(pub &'static str);

    #[async_trait]
    impl TextGenerator for FixedText {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Default)]
    pub(crate) struct CountingFx {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl FxProvider for CountingFx {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn latest(&self, base: &str, _targets: &[&str]) -> Result<HashMap<String, f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if base != "JPY" {
                return Err(AgentError::Provider("unsupported base".into()));
            }
            Ok([("USD", 0.0067), ("INR", 0.56), ("GBP", 0.0053), ("EUR", 0.0062)]
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect())
        }
    }

    #[derive(Default)]
    pub(crate) struct CountingQuotes {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl QuoteProvider for CountingQuotes {
        async fn latest_price(&self, symbol: &str) -> Result<Option<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((symbol == "^N225").then_some(38_000.0))
        }
    }

    #[derive(Default)]
    pub(crate) struct CountingGeocoder {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl Geocoder for CountingGeocoder {
        async fn geocode(&self, _address: &str) -> Result<GeocodeResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_str(
                r#"{"status": "OK", "results": [{
                    "formatted_address": "Tokyo Stock Exchange, Tokyo, Japan",
                    "geometry": {"location": {"lat": 35.6824, "lng": 139.7788}}
                }]}"#,
            )?)
        }
    }

    pub(crate) struct Harness {
        pub fx: Arc<CountingFx>,
        pub quotes: Arc<CountingQuotes>,
        pub geocoder: Arc<CountingGeocoder>,
        pub agent: CountryFinanceAgent,
    }

    pub(crate) fn harness(model_reply: &'static str) -> Harness {
        let fx = Arc::new(CountingFx::default());
        let quotes = Arc::new(CountingQuotes::default());
        let geocoder = Arc::new(CountingGeocoder::default());

        let agent = CountryFinanceAgent::new(
            FactExtractor::new(Arc::new(FixedText(model_reply))),
            RateResolver::new(fx.clone(), fx.clone(), fx.clone()),
            IndexResolver::new(quotes.clone()),
            LocationResolver::new(geocoder.clone()),
        );

        Harness {
            fx,
            quotes,
            geocoder,
            agent,
        }
    }

    #[tokio::test]
    async fn test_full_pipeline() {
        let h = harness(JAPAN_RESPONSE);
        let report = h.agent.run("  Japan ").await;

        assert_eq!(report.country, "Japan");
        assert_eq!(report.raw_response, JAPAN_RESPONSE);
        assert_eq!(report.currency_code.as_deref(), Some("JPY"));

        let rates = report.rates.unwrap();
        assert_eq!(rates.method, RateMethod::Direct);
        assert_eq!(rates.rates.get(TargetCurrency::Inr), Some(0.56));

        assert_eq!(report.index_values.get("Nikkei 225"), Some(&IndexValue::Price(38_000.0)));
        assert_eq!(
            report.index_values.get("TOPIX"),
            Some(&IndexValue::Unavailable(NO_SYMBOL_AVAILABLE.into()))
        );
        // TOPIX has no symbol, so only one quote lookup.
        assert_eq!(h.quotes.calls.load(Ordering::SeqCst), 1);

        let location = report.location.unwrap();
        assert_eq!(location.link, "https://www.google.com/maps?q=35.6824,139.7788");
        assert!(report.notices.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_response_stops_pipeline() {
        let h = harness("I'm sorry, I can't help with that.");
        let report = h.agent.run("Atlantis").await;

        assert!(report.facts.is_none());
        assert_eq!(report.raw_response, "I'm sorry, I can't help with that.");
        assert!(report.rates.is_none());
        assert!(report.index_values.is_empty());
        assert!(report.location.is_none());
        assert_eq!(report.notices.len(), 1);

        assert_eq!(h.fx.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.quotes.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_partial_facts_skip_missing_stages() {
        let h = harness(r#"{"currency": {"name": "Yen", "code": "JPY"}}"#);
        let report = h.agent.run("Japan").await;

        assert!(report.facts.is_some());
        assert!(report.rates.is_some());
        assert!(report.location.is_none());
        assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 0);
        assert!(report
            .notices
            .iter()
            .any(|n| n.message == "No stock exchange information available"));
    }

    #[tokio::test]
    async fn test_missing_currency_code_skips_rates() {
        let h = harness(r#"{"currency": {"name": "Yen", "code": "¥"}, "exchanges": []}"#);
        let report = h.agent.run("Japan").await;

        assert!(report.currency_code.is_none());
        assert!(report.rates.is_none());
        assert_eq!(h.fx.calls.load(Ordering::SeqCst), 0);
    }
}
