//! Country Finance Agent
//!
//! Aggregates country-level financial facts for a renderer:
//! - Currency and stock exchanges, extracted from a Gemini answer
//! - Exchange rates against USD, INR, GBP and EUR, with provider fallback
//! - Latest index values from Yahoo Finance
//! - Main exchange location, geocoded with Google Maps
//!
//! PIPELINE:
//! COUNTRY → EXTRACT → NORMALIZE → RATES → INDICES → LOCATION → REPORT

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fx;
pub mod gemini;
pub mod geocode;
pub mod market;
pub mod models;
pub mod normalizer;
pub mod report;

pub use error::Result;

// Re-export common types
pub use agent::CountryFinanceAgent;
pub use config::AppConfig;
pub use models::*;
