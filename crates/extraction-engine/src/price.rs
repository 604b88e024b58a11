//! Price extraction from sampled element text.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

fn currency_amount() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[¥￥]\s*([0-9]+(?:\.[0-9]{1,2})?)").expect("currency regex is valid")
    })
}

fn bare_amount() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]+\.[0-9]{1,2})\b").expect("amount regex is valid"))
}

fn min_batch() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([0-9]+)\s*件?\s*起批|起批量\D{0,3}([0-9]+)").expect("batch regex is valid")
    })
}

/// Pull a monetary amount out of noisy element text. A currency-marked
/// amount wins over a bare decimal; integers without a currency mark are
/// ignored (they are usually counts, not prices).
pub fn parse_price(text: &str) -> Option<Decimal> {
    if let Some(caps) = currency_amount().captures(text) {
        return Decimal::from_str(&caps[1]).ok();
    }
    if let Some(caps) = bare_amount().captures(text) {
        return Decimal::from_str(&caps[1]).ok();
    }
    None
}

/// Pull a minimum order quantity out of listing text. Wholesale listings
/// phrase it as "N件起批" or "起批量: N"; retail listings omit it.
pub fn parse_min_quantity(text: &str) -> Option<u32> {
    let caps = min_batch().captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}
