//! Core data models for the country finance agent
//!
//! Everything here is request-scoped: built for one country query and
//! dropped once the report has been rendered.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

//
// ================= Country Facts =================
//

/// Structured facts parsed out of the model response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryFacts {
    #[serde(default, deserialize_with = "lenient_currency")]
    pub currency: Option<Currency>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub exchanges: Vec<Exchange>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub main_exchange_location: Option<String>,
}

impl CountryFacts {
    /// All indices across all exchanges, in listing order.
    pub fn all_indices(&self) -> Vec<IndexRef> {
        self.exchanges
            .iter()
            .flat_map(|exchange| exchange.indices.iter().cloned())
            .collect()
    }

    /// Main exchange address, if the model gave a non-blank one.
    pub fn main_location(&self) -> Option<&str> {
        self.main_exchange_location
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    #[serde(default = "unknown_currency", deserialize_with = "lenient_currency_name")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    #[serde(default = "unknown_exchange", deserialize_with = "lenient_exchange_name")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub indices: Vec<IndexRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRef {
    #[serde(default = "unknown_index", deserialize_with = "lenient_index_name")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub symbol: String,
}

fn unknown_currency() -> String {
    "Unknown".to_string()
}

fn unknown_exchange() -> String {
    "Unknown Exchange".to_string()
}

fn unknown_index() -> String {
    "Unknown Index".to_string()
}

// Model output is loosely typed. A number in a text field keeps its digits,
// and any other non-string counts as absent, the same as `null`.
fn text_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(text_value(Value::deserialize(d)?))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_text(d)?.unwrap_or_default())
}

fn lenient_currency_name<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_text(d)?.unwrap_or_else(unknown_currency))
}

fn lenient_exchange_name<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_text(d)?.unwrap_or_else(unknown_exchange))
}

fn lenient_index_name<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_text(d)?.unwrap_or_else(unknown_index))
}

/// Objects only; anything else means the model gave no currency.
fn lenient_currency<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Currency>, D::Error> {
    Ok(match Value::deserialize(d)? {
        value @ Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

/// Arrays only; entries that are not objects are skipped.
fn lenient_list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

//
// ================= Exchange Rates =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetCurrency {
    Usd,
    Inr,
    Gbp,
    Eur,
}

impl TargetCurrency {
    pub const ALL: [TargetCurrency; 4] = [
        TargetCurrency::Usd,
        TargetCurrency::Inr,
        TargetCurrency::Gbp,
        TargetCurrency::Eur,
    ];

    pub fn code(self) -> &'static str {
        match self {
            TargetCurrency::Usd => "USD",
            TargetCurrency::Inr => "INR",
            TargetCurrency::Gbp => "GBP",
            TargetCurrency::Eur => "EUR",
        }
    }
}

impl fmt::Display for TargetCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Rates for one base currency against the fixed target set.
///
/// An absent entry means "unavailable". It is never read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RateSet {
    rates: BTreeMap<TargetCurrency, Option<f64>>,
}

impl RateSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Pick the target currencies out of a provider's `rates` table.
    pub fn from_table(table: &HashMap<String, f64>) -> Self {
        let rates = TargetCurrency::ALL
            .iter()
            .map(|target| (*target, table.get(target.code()).copied()))
            .collect();
        Self { rates }
    }

    pub fn insert(&mut self, target: TargetCurrency, rate: Option<f64>) {
        self.rates.insert(target, rate);
    }

    pub fn get(&self, target: TargetCurrency) -> Option<f64> {
        self.rates.get(&target).copied().flatten()
    }

    /// True when the mapping has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// True when at least one target has a usable rate.
    pub fn has_any_rate(&self) -> bool {
        self.rates.values().any(Option::is_some)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateMethod {
    /// Quoted directly with the currency as base.
    Direct,
    /// Derived from USD-based quotes by inversion.
    InverseUsd,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateReport {
    pub base: String,
    pub method: RateMethod,
    pub rates: RateSet,
}

//
// ================= Index Values =================
//

pub const NO_SYMBOL_AVAILABLE: &str = "No symbol available";
pub const DATA_UNAVAILABLE: &str = "Data unavailable";

/// Latest value for an index, or a marker explaining why there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndexValue {
    Price(f64),
    Unavailable(String),
}

impl IndexValue {
    pub fn price(&self) -> Option<f64> {
        match self {
            IndexValue::Price(p) => Some(*p),
            IndexValue::Unavailable(_) => None,
        }
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Price(p) => write!(f, "{}", p),
            IndexValue::Unavailable(reason) => f.write_str(reason),
        }
    }
}

/// Insertion-ordered map from index display name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexValues {
    entries: Vec<(String, IndexValue)>,
}

impl IndexValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace in place, keeping the first-seen position.
    pub fn insert(&mut self, name: String, value: IndexValue) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&IndexValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for IndexValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

//
// ================= Location =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub link: String,
    pub lat: f64,
    pub lng: f64,
    pub formatted_address: String,
}

//
// ================= Notices & Report =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// A recoverable, user-visible message raised while building a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Everything gathered for one country query.
#[derive(Debug, Clone, Serialize)]
pub struct CountryReport {
    pub query_id: Uuid,
    pub country: String,
    pub generated_at: DateTime<Utc>,
    pub raw_response: String,
    pub facts: Option<CountryFacts>,
    pub currency_code: Option<String>,
    pub rates: Option<RateReport>,
    pub index_values: IndexValues,
    pub location: Option<GeoLocation>,
    pub notices: Vec<Notice>,
}

impl CountryReport {
    pub fn new(country: impl Into<String>) -> Self {
        Self {
            query_id: Uuid::new_v4(),
            country: country.into(),
            generated_at: Utc::now(),
            raw_response: String::new(),
            facts: None,
            currency_code: None,
            rates: None,
            index_values: IndexValues::new(),
            location: None,
            notices: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facts_defaults_for_missing_and_null_fields() {
        let json = r#"{
            "currency": {"code": "JPY"},
            "exchanges": [
                {"indices": [{"name": null, "symbol": null}]},
                {"name": "Osaka Exchange", "indices": null}
            ],
            "main_exchange_location": null
        }"#;

        let facts: CountryFacts = serde_json::from_str(json).unwrap();
        let currency = facts.currency.clone().unwrap();
        assert_eq!(currency.name, "Unknown");
        assert_eq!(currency.code, "JPY");
        assert_eq!(facts.exchanges[0].name, "Unknown Exchange");
        assert_eq!(facts.exchanges[0].indices[0].name, "Unknown Index");
        assert_eq!(facts.exchanges[0].indices[0].symbol, "");
        assert!(facts.exchanges[1].indices.is_empty());
        assert!(facts.main_location().is_none());
    }

    #[test]
    fn test_facts_tolerate_mistyped_leaves() {
        let json = r#"{
            "currency": {"name": 42, "code": ["JPY"]},
            "exchanges": [
                {"name": "Japan Exchange", "indices": [{"name": "Nikkei", "symbol": 225}, "TOPIX"]},
                {"name": {"en": "Osaka"}, "indices": "none"}
            ],
            "main_exchange_location": {"x": 1}
        }"#;

        let facts: CountryFacts = serde_json::from_str(json).unwrap();
        let currency = facts.currency.clone().unwrap();
        assert_eq!(currency.name, "42");
        assert_eq!(currency.code, "");
        assert_eq!(facts.exchanges[0].indices.len(), 1);
        assert_eq!(facts.exchanges[0].indices[0].symbol, "225");
        assert_eq!(facts.exchanges[1].name, "Unknown Exchange");
        assert!(facts.exchanges[1].indices.is_empty());
        assert!(facts.main_exchange_location.is_none());
    }

    #[test]
    fn test_non_object_currency_and_list_are_absent() {
        let json = r#"{"currency": "Yen", "exchanges": {"name": "JPX"}}"#;

        let facts: CountryFacts = serde_json::from_str(json).unwrap();
        assert!(facts.currency.is_none());
        assert!(facts.exchanges.is_empty());
    }

    #[test]
    fn test_all_indices_preserves_order() {
        let facts = CountryFacts {
            currency: None,
            exchanges: vec![
                Exchange {
                    name: "NSE".into(),
                    indices: vec![IndexRef { name: "NIFTY 50".into(), symbol: "^NSEI".into() }],
                },
                Exchange {
                    name: "BSE".into(),
                    indices: vec![IndexRef { name: "SENSEX".into(), symbol: "".into() }],
                },
            ],
            main_exchange_location: Some("  ".into()),
        };

        let names: Vec<_> = facts.all_indices().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["NIFTY 50", "SENSEX"]);
        assert!(facts.main_location().is_none());
    }

    #[test]
    fn test_rate_set_absent_is_not_zero() {
        let mut table = HashMap::new();
        table.insert("USD".to_string(), 0.0067);
        table.insert("EUR".to_string(), 0.0062);

        let rates = RateSet::from_table(&table);
        assert!(!rates.is_empty());
        assert!(rates.has_any_rate());
        assert_eq!(rates.get(TargetCurrency::Usd), Some(0.0067));
        assert_eq!(rates.get(TargetCurrency::Inr), None);

        let json = serde_json::to_value(&rates).unwrap();
        assert_eq!(json["INR"], serde_json::Value::Null);
        assert_eq!(json["EUR"], serde_json::json!(0.0062));
    }

    #[test]
    fn test_index_values_replace_in_place() {
        let mut values = IndexValues::new();
        values.insert("Nikkei 225".into(), IndexValue::Unavailable(DATA_UNAVAILABLE.into()));
        values.insert("TOPIX".into(), IndexValue::Price(2710.5));
        values.insert("Nikkei 225".into(), IndexValue::Price(38000.0));

        let names: Vec<_> = values.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Nikkei 225", "TOPIX"]);
        assert_eq!(values.get("Nikkei 225").and_then(IndexValue::price), Some(38000.0));

        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"{"Nikkei 225":38000.0,"TOPIX":2710.5}"#);
    }
}
