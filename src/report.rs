//! Plain-text rendering of a country report for the CLI

use crate::models::{CountryReport, NoticeLevel, RateMethod, TargetCurrency};

pub fn render_text(report: &CountryReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== {} ===\n\n", report.country));

    let Some(facts) = &report.facts else {
        out.push_str("Could not extract structured data. Raw model response:\n\n");
        out.push_str(&report.raw_response);
        out.push('\n');
        render_notices(report, &mut out);
        return out;
    };

    // ── Currency ──
    let currency_name = facts
        .currency
        .as_ref()
        .map(|c| c.name.as_str())
        .unwrap_or("Unknown");
    let code = report.currency_code.as_deref().unwrap_or("");
    out.push_str(&format!("Official Currency: {} ({})\n", currency_name, code));

    if let Some(rates) = &report.rates {
        out.push_str(&format!("\n1 {} equals:\n", rates.base));
        for target in TargetCurrency::ALL {
            match rates.rates.get(target) {
                Some(rate) => out.push_str(&format!("  - {}: {:.4}\n", target, rate)),
                // Inverted sets only list what could be derived.
                None if rates.method == RateMethod::InverseUsd => {}
                None => out.push_str(&format!("  - {}: Data unavailable\n", target)),
            }
        }
        if rates.method == RateMethod::InverseUsd {
            out.push_str("  (derived from USD rates)\n");
        }
    }

    // ── Exchanges ──
    if !facts.exchanges.is_empty() {
        out.push_str("\nStock Exchanges and Indices\n");
        for exchange in &facts.exchanges {
            out.push_str(&format!("\n{}\n", exchange.name));
            if exchange.indices.is_empty() {
                out.push_str("  No indices information available\n");
            }
            for index in &exchange.indices {
                let symbol = if index.symbol.is_empty() {
                    "No symbol"
                } else {
                    index.symbol.as_str()
                };
                out.push_str(&format!("  - {} ({})\n", index.name, symbol));
            }
        }
    }

    if !report.index_values.is_empty() {
        out.push_str("\nCurrent Index Values\n");
        for (name, value) in report.index_values.iter() {
            out.push_str(&format!("  - {}: {}\n", name, value));
        }
    }

    // ── Location ──
    if let Some(address) = facts.main_location() {
        out.push_str(&format!("\nMain Stock Exchange Location\n  {}\n", address));
        if let Some(location) = &report.location {
            out.push_str(&format!("  {}\n", location.formatted_address));
            out.push_str(&format!("  Open in Google Maps: {}\n", location.link));
        }
    }

    render_notices(report, &mut out);
    out
}

fn render_notices(report: &CountryReport, out: &mut String) {
    if report.notices.is_empty() {
        return;
    }

    out.push_str("\nNotices\n");
    for notice in &report.notices {
        let tag = match notice.level {
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        out.push_str(&format!("  [{}] {}\n", tag, notice.message));
    }
}
