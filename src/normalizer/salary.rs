// Salary text -> Compensation. Compensation is only ever what the page
// states; no number in the text means no Compensation at all.
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Compensation, PayInterval};

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)\s*([kK])?").unwrap()
});

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(USD|EUR|GBP|CAD|AUD|CHF|SEK|PLN|INR|JPY)\b").unwrap());

fn detect_currency(text: &str) -> Option<String> {
    if let Some(caps) = CODE_RE.captures(text) {
        return Some(caps[1].to_string());
    }
    for (symbol, code) in [("$", "USD"), ("€", "EUR"), ("£", "GBP")] {
        if text.contains(symbol) {
            return Some(code.to_string());
        }
    }
    None
}

fn detect_interval(text: &str) -> Option<PayInterval> {
    let lower = text.to_lowercase();
    if lower.contains("/yr") || lower.contains("year") || lower.contains("annum") {
        Some(PayInterval::Yearly)
    } else if lower.contains("/mo") || lower.contains("month") {
        Some(PayInterval::Monthly)
    } else if lower.contains("/wk") || lower.contains("week") {
        Some(PayInterval::Weekly)
    } else if lower.contains("/day") || lower.contains("daily") {
        Some(PayInterval::Daily)
    } else if lower.contains("/hr") || lower.contains("hour") {
        Some(PayInterval::Hourly)
    } else {
        None
    }
}

fn parse_amount(caps: &regex::Captures) -> Option<f64> {
    let number: f64 = caps[1].replace(',', "").parse().ok()?;
    Some(if caps.get(2).is_some() { number * 1_000.0 } else { number })
}

/// Extracts the numeric range, currency and pay interval from salary text
/// such as "$120,000 - $150,000/yr" or "€45k/yr". A single figure sets
/// `min == max`. Text with no figures yields `None`, not a zero range.
pub fn parse_compensation(raw: &str) -> Option<Compensation> {
    let amounts: Vec<f64> = AMOUNT_RE
        .captures_iter(raw)
        .filter_map(|caps| parse_amount(&caps))
        .take(2)
        .collect();
    let (&min_amount, &max_amount) = match amounts.as_slice() {
        [] => return None,
        [single] => (single, single),
        [first, second, ..] => {
            if first <= second {
                (first, second)
            } else {
                (second, first)
            }
        }
    };

    Some(Compensation {
        min_amount,
        max_amount,
        currency: detect_currency(raw).unwrap_or_else(|| "USD".to_string()),
        interval: detect_interval(raw),
    })
}
