//! Exchange rate resolution
//!
//! Rates for one currency against USD, INR, GBP and EUR, tried across an
//! ordered chain of public providers. When nothing quotes the currency
//! directly, rates are derived from USD-based quotes by inversion.

use crate::models::{Notice, RateMethod, RateReport, RateSet, TargetCurrency};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod providers;
pub use providers::{ExchangeRateHost, Frankfurter, OpenErApi};

const USD: &str = "USD";

/// A source of latest FX quotes for a base currency.
#[async_trait]
pub trait FxProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Latest `code → rate` table for `base`. `targets` is a hint: providers
    /// that need an explicit symbol list use it, others return everything.
    /// Transport failures, non-success statuses and undecodable bodies are
    /// errors. A body without rates is an empty table.
    async fn latest(&self, base: &str, targets: &[&str]) -> Result<HashMap<String, f64>>;
}

/// Ordered provider chain: primary, secondary, then tertiary for USD only.
pub struct RateResolver {
    primary: Arc<dyn FxProvider>,
    secondary: Arc<dyn FxProvider>,
    tertiary: Arc<dyn FxProvider>,
}

impl RateResolver {
    pub fn new(
        primary: Arc<dyn FxProvider>,
        secondary: Arc<dyn FxProvider>,
        tertiary: Arc<dyn FxProvider>,
    ) -> Self {
        Self {
            primary,
            secondary,
            tertiary,
        }
    }

    /// Rates quoted directly with `code` as base. Empty when every provider
    /// failed; entries are absent when a provider did not list them.
    pub async fn resolve(&self, code: &str, notices: &mut Vec<Notice>) -> RateSet {
        let targets = target_codes();
        match self.resolve_table(code, &targets).await {
            Some(table) => RateSet::from_table(&table),
            None => {
                warn!(%code, "All exchange rate providers failed");
                notices.push(Notice::warning(format!(
                    "Exchange rate APIs failed for {}",
                    code
                )));
                RateSet::empty()
            }
        }
    }

    /// Rates for `code` derived from USD-based quotes:
    /// rate(code → X) = rate(USD → X) / rate(USD → code).
    pub async fn resolve_inverse(&self, code: &str, notices: &mut Vec<Notice>) -> RateSet {
        let mut targets: Vec<&str> = target_codes();
        if !targets.contains(&code) {
            targets.push(code);
        }

        let Some(usd_table) = self.resolve_table(USD, &targets).await else {
            notices.push(Notice::warning(format!(
                "Could not fetch USD exchange rates for {}",
                code
            )));
            return RateSet::empty();
        };

        match invert_usd_rates(code, &usd_table) {
            Some(rates) => rates,
            None => {
                notices.push(Notice::warning(format!(
                    "Could not calculate exchange rates for {}",
                    code
                )));
                RateSet::empty()
            }
        }
    }

    /// Direct rates, falling back to USD inversion when the direct set has
    /// no usable rate. `None` when neither produced anything.
    pub async fn resolve_report(&self, code: &str, notices: &mut Vec<Notice>) -> Option<RateReport> {
        let direct = self.resolve(code, notices).await;
        if direct.has_any_rate() {
            return Some(RateReport {
                base: code.to_string(),
                method: RateMethod::Direct,
                rates: direct,
            });
        }

        // Inverting USD against itself would repeat the same calls.
        if code == USD {
            return None;
        }

        notices.push(Notice::warning(format!(
            "Attempting alternative method for {} exchange rates...",
            code
        )));

        let inverse = self.resolve_inverse(code, notices).await;
        if inverse.has_any_rate() {
            info!(%code, "Derived exchange rates from USD quotes");
            Some(RateReport {
                base: code.to_string(),
                method: RateMethod::InverseUsd,
                rates: inverse,
            })
        } else {
            None
        }
    }

    /// Run the provider chain for `base`. `None` means every step failed.
    async fn resolve_table(&self, base: &str, targets: &[&str]) -> Option<HashMap<String, f64>> {
        // 1. Primary, only if it quotes every target.
        match self.primary.latest(base, targets).await {
            Ok(table) if targets.iter().all(|t| table.contains_key(*t)) => {
                debug!(provider = self.primary.name(), %base, "Primary provider complete");
                return Some(table);
            }
            Ok(_) => debug!(
                provider = self.primary.name(),
                %base,
                "Primary provider missing target currencies"
            ),
            Err(e) => warn!(provider = self.primary.name(), %base, "FX lookup failed: {}", e),
        }

        // 2. Secondary, partial results allowed.
        match self.secondary.latest(base, targets).await {
            Ok(table) => {
                debug!(provider = self.secondary.name(), %base, "Using secondary provider");
                return Some(table);
            }
            Err(e) => warn!(provider = self.secondary.name(), %base, "FX lookup failed: {}", e),
        }

        // 3. Tertiary, USD base only.
        if base == USD {
            let tertiary_targets: Vec<&str> =
                targets.iter().copied().filter(|t| *t != USD).collect();
            match self.tertiary.latest(USD, &tertiary_targets).await {
                Ok(mut table) => {
                    debug!(provider = self.tertiary.name(), "Using tertiary provider");
                    table.insert(USD.to_string(), 1.0);
                    return Some(table);
                }
                Err(e) => warn!(provider = self.tertiary.name(), "FX lookup failed: {}", e),
            }
        }

        None
    }
}

fn target_codes() -> Vec<&'static str> {
    TargetCurrency::ALL.iter().map(|t| t.code()).collect()
}

/// Invert a USD-based table into rates for `code`. `None` unless
/// rate(USD → code) is present and positive. Targets whose USD rate is
/// absent or non-positive stay absent.
pub fn invert_usd_rates(code: &str, usd_table: &HashMap<String, f64>) -> Option<RateSet> {
    let usd_to_code = usd_table.get(code).copied().filter(|r| *r > 0.0)?;

    let mut rates = RateSet::empty();
    for target in TargetCurrency::ALL {
        let usd_to_target = match target {
            TargetCurrency::Usd => Some(1.0),
            _ => usd_table.get(target.code()).copied(),
        };
        let rate = usd_to_target
            .filter(|r| *r > 0.0)
            .map(|r| r / usd_to_code);
        rates.insert(target, rate);
    }
    Some(rates)
}
