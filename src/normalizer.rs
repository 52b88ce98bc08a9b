//! Currency code and ticker symbol normalization
//!
//! Model output is loose: codes arrive as "usd", "US$" or "JPY (Yen)", and
//! index symbols are often bare names the market-data provider cannot
//! resolve. These helpers map both to the forms the providers expect.

use tracing::{debug, info};

/// Codes seen often enough that an unfamiliar result is worth a log line.
/// Unknown codes are still returned as-is.
pub const COMMON_CURRENCY_CODES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "AUD", "CAD", "CHF", "CNY", "INR",
    "KRW", "MXN", "BRL", "SGD", "HKD", "THB", "RUB", "ZAR", "NZD",
];

/// Index-name fragment → Yahoo Finance ticker, checked in order.
/// First match wins, so "DOW" shadows "NASDAQ" for names carrying both.
pub const TICKER_TABLE: &[(&str, &str)] = &[
    ("NIFTY", "^NSEI"),
    ("SENSEX", "^BSESN"),
    ("NIKKEI", "^N225"),
    ("FTSE", "^FTSE"),
    ("DOW", "^DJI"),
    ("S&P", "^GSPC"),
    ("SPX", "^GSPC"),
    ("NASDAQ", "^IXIC"),
    ("KOSPI", "^KS11"),
    ("SHANGHAI", "000001.SS"),
    ("HANG SENG", "^HSI"),
    ("DAX", "^GDAXI"),
    ("CAC", "^FCHI"),
];

/// Keep ASCII letters only, uppercase, first three.
pub fn normalize_currency_code(code: &str) -> String {
    let normalized: String = code
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .take(3)
        .collect();

    if !normalized.is_empty() && !COMMON_CURRENCY_CODES.contains(&normalized.as_str()) {
        info!(code = %normalized, "Uncommon currency code, using as-is");
    }

    normalized
}

/// True when the symbol already carries an exchange qualifier.
pub fn is_qualified_symbol(symbol: &str) -> bool {
    symbol.contains('^') || symbol.contains('.')
}

/// Best-guess provider ticker for an index.
pub fn guess_ticker_symbol(name: &str, symbol: &str) -> String {
    if is_qualified_symbol(symbol) {
        return symbol.to_string();
    }

    let upper = name.to_uppercase();
    match TICKER_TABLE
        .iter()
        .find(|(fragment, _)| upper.contains(fragment))
    {
        Some((fragment, ticker)) => {
            debug!(index = %name, %fragment, %ticker, "Mapped index name to ticker");
            ticker.to_string()
        }
        None => symbol.to_string(),
    }
}
