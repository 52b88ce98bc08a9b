//! HTTP-backed FX providers
//!
//! All three speak the same shape: a JSON object with a `rates` table.

use super::FxProvider;
use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const EXCHANGERATE_HOST_URL: &str = "https://api.exchangerate.host";
const OPEN_ER_API_URL: &str = "https://open.er-api.com";
const FRANKFURTER_URL: &str = "https://api.frankfurter.app";

/// Shared client for FX lookups; every request is bounded by `timeout`.
pub fn build_fx_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(4)
        .timeout(timeout)
        .build()?)
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    rates: Option<HashMap<String, Value>>,
}

/// Decode a provider body into a numeric `rates` table. Non-numeric entries
/// are dropped; a body without `rates` yields an empty table.
pub fn parse_rates(body: &str) -> Result<HashMap<String, f64>> {
    let response: RatesResponse = serde_json::from_str(body)?;
    Ok(response
        .rates
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(code, rate)| rate.as_f64().map(|r| (code, r)))
        .collect())
}

async fn fetch_rates(
    client: &Client,
    provider: &str,
    url: &str,
    query: &[(&str, &str)],
) -> Result<HashMap<String, f64>> {
    debug!(%provider, %url, "Fetching exchange rates");

    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| AgentError::Provider(format!("{} request failed: {}", provider, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AgentError::Provider(format!(
            "{} returned {}",
            provider, status
        )));
    }

    let body = response.text().await?;
    parse_rates(&body)
        .map_err(|e| AgentError::Provider(format!("{} sent invalid JSON: {}", provider, e)))
}

/// Primary: exchangerate.host `/latest?base=CODE`.
pub struct ExchangeRateHost {
    client: Client,
    base_url: String,
}

impl ExchangeRateHost {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, EXCHANGERATE_HOST_URL)
    }

    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FxProvider for ExchangeRateHost {
    fn name(&self) -> &'static str {
        "exchangerate.host"
    }

    async fn latest(&self, base: &str, _targets: &[&str]) -> Result<HashMap<String, f64>> {
        let url = format!("{}/latest", self.base_url);
        fetch_rates(&self.client, self.name(), &url, &[("base", base)]).await
    }
}

/// Secondary: open.er-api.com `/v6/latest/CODE`.
pub struct OpenErApi {
    client: Client,
    base_url: String,
}

impl OpenErApi {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, OPEN_ER_API_URL)
    }

    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FxProvider for OpenErApi {
    fn name(&self) -> &'static str {
        "open.er-api.com"
    }

    async fn latest(&self, base: &str, _targets: &[&str]) -> Result<HashMap<String, f64>> {
        let url = format!("{}/v6/latest/{}", self.base_url, urlencoding::encode(base));
        fetch_rates(&self.client, self.name(), &url, &[]).await
    }
}

/// Tertiary: frankfurter.app `/latest?from=CODE&to=A,B,C`.
pub struct Frankfurter {
    client: Client,
    base_url: String,
}

impl Frankfurter {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, FRANKFURTER_URL)
    }

    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FxProvider for Frankfurter {
    fn name(&self) -> &'static str {
        "frankfurter.app"
    }

    async fn latest(&self, base: &str, targets: &[&str]) -> Result<HashMap<String, f64>> {
        let url = format!("{}/latest", self.base_url);
        let to = targets.join(",");
        fetch_rates(&self.client, self.name(), &url, &[("from", base), ("to", to.as_str())]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::{StatusCode, Uri};
    use axum::response::Html;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

    async fn rates_handler(
        State(seen): State<Seen>,
        uri: Uri,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        seen.lock().unwrap().push((uri.path().to_string(), params));
        Json(serde_json::json!({"rates": {"USD": 0.0067, "INR": 0.56, "EUR": 0.0062}}))
    }

    async fn server_error() -> (StatusCode, &'static str) {
        (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
    }

    async fn html_page() -> Html<&'static str> {
        Html("<html>rate limited</html>")
    }

    /// Local stand-in for the rate APIs; returns its base URL and the
    /// requests it has seen.
    async fn serve_rates() -> (String, Seen) {
        let seen = Seen::default();
        let router = Router::new()
            .route("/latest", get(rates_handler))
            .route("/v6/latest/:code", get(rates_handler))
            .route("/broken/latest", get(server_error))
            .route("/broken/v6/latest/:code", get(server_error))
            .route("/html/latest", get(html_page))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        (format!("http://{}", addr), seen)
    }

    fn client() -> Client {
        build_fx_client(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_parse_open_er_api_body() {
        let body = r#"{
            "result": "success",
            "base_code": "JPY",
            "rates": {"JPY": 1, "USD": 0.006712, "EUR": 0.006189, "INR": 0.5601}
        }"#;
        let rates = parse_rates(body).unwrap();
        assert_eq!(rates.get("JPY"), Some(&1.0));
        assert_eq!(rates.get("USD"), Some(&0.006712));
        assert!(!rates.contains_key("GBP"));
    }

    #[test]
    fn test_parse_body_without_rates() {
        let body = r#"{"success": false, "error": {"code": 101, "type": "missing_access_key"}}"#;
        assert!(parse_rates(body).unwrap().is_empty());

        let body = r#"{"rates": null}"#;
        assert!(parse_rates(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_drops_non_numeric_rates() {
        let body = r#"{"rates": {"USD": "n/a", "EUR": 0.92, "GBP": null}}"#;
        let rates = parse_rates(body).unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates.get("EUR"), Some(&0.92));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(parse_rates("<html>rate limited</html>").is_err());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = build_fx_client(Duration::from_secs(1)).unwrap();
        let provider = Frankfurter::with_base_url(client, "http://localhost:9000/");
        assert_eq!(provider.base_url, "http://localhost:9000");
    }

    #[tokio::test]
    async fn test_exchangerate_host_sends_base_param() {
        let (url, seen) = serve_rates().await;
        let provider = ExchangeRateHost::with_base_url(client(), &url);

        let rates = provider.latest("JPY", &["USD", "INR"]).await.unwrap();
        assert_eq!(rates.get("INR"), Some(&0.56));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "/latest");
        assert_eq!(seen[0].1.get("base").map(String::as_str), Some("JPY"));
        assert_eq!(seen[0].1.len(), 1);
    }

    #[tokio::test]
    async fn test_open_er_api_puts_code_in_path() {
        let (url, seen) = serve_rates().await;
        let provider = OpenErApi::with_base_url(client(), &format!("{}/", url));

        let rates = provider.latest("JPY", &["USD"]).await.unwrap();
        assert_eq!(rates.get("USD"), Some(&0.0067));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "/v6/latest/JPY");
        assert!(seen[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_frankfurter_sends_from_and_to() {
        let (url, seen) = serve_rates().await;
        let provider = Frankfurter::with_base_url(client(), &url);

        provider.latest("USD", &["INR", "GBP", "EUR"]).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "/latest");
        assert_eq!(seen[0].1.get("from").map(String::as_str), Some("USD"));
        assert_eq!(seen[0].1.get("to").map(String::as_str), Some("INR,GBP,EUR"));
    }

    #[tokio::test]
    async fn test_server_error_status_is_err() {
        let (url, _) = serve_rates().await;
        let broken = format!("{}/broken", url);

        let err = ExchangeRateHost::with_base_url(client(), &broken)
            .latest("JPY", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
        assert!(err.to_string().contains("500"));

        let err = OpenErApi::with_base_url(client(), &broken)
            .latest("JPY", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("open.er-api.com returned 500"));
    }

    #[tokio::test]
    async fn test_html_body_is_err() {
        let (url, _) = serve_rates().await;
        let provider = ExchangeRateHost::with_base_url(client(), &format!("{}/html", url));

        let err = provider.latest("JPY", &[]).await.unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }
}
