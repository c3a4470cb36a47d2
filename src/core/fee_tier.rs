//! Tiered fee resolution.
//!
//! Fee and commission schedules are stored as ordered JSON tables of
//! `{ "range": "<min>-<max>" | "<min>+" | "<min>", "fee_percent": "5%" }` entries.
//! Ranges and percentages are human-entered strings, so all parsing goes through
//! [`parse_range`] and [`parse_number`] and nothing else re-parses them.
//!
//! Resolution is first-match in table order: the first tier that parses and contains
//! the amount wins, even when a later tier is narrower. Tables are never re-sorted.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

const RANGE_SEPARATORS: [char; 3] = ['-', '\u{2013}', '\u{2014}'];
const CURRENCY_SYMBOLS: [char; 9] = ['$', '€', '£', '¥', '₫', '₹', '₩', 'đ', 'Đ'];

/// How digit groups and decimals are written in a tier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberFormat {
    /// `1,234.5`: commas group digits, dot marks decimals
    #[default]
    DotDecimal,
    /// `1.234,5`: dots group digits, comma marks decimals
    CommaDecimal,
}

/// Inclusive amount range of one tier; `max = None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierRange {
    /// Lower bound, inclusive
    pub min: Decimal,
    /// Upper bound, inclusive
    pub max: Option<Decimal>,
}

impl TierRange {
    /// Whether `amount` falls inside the range.
    #[must_use]
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min && self.max.is_none_or(|max| amount <= max)
    }
}

/// One raw row of a tier table.
///
/// Both fields are kept as strings: JSON numbers are converted to their text form so
/// that string and numeric tables go through the same parser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tier {
    /// Range text, e.g. `"0-999"` or `"1000+"`
    #[serde(default, deserialize_with = "string_or_number")]
    pub range: String,
    /// Percentage text, e.g. `"5%"`; commission tables call this `rate`
    #[serde(
        default,
        rename = "fee_percent",
        alias = "rate",
        alias = "fee",
        deserialize_with = "string_or_number"
    )]
    pub percent: String,
}

impl Tier {
    /// Convenience constructor.
    #[must_use]
    pub fn new(range: &str, percent: &str) -> Self {
        Self {
            range: range.to_string(),
            percent: percent.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn is_noise(c: char) -> bool {
    c.is_whitespace() || c == '%' || CURRENCY_SYMBOLS.contains(&c) || c.is_alphabetic()
}

/// Parses a human-entered number such as `"$1,000"`, `"5%"` or `"1.000,5 đ"`.
///
/// Returns `None` for empty or unparsable input.
#[must_use]
pub fn parse_number(raw: &str, format: NumberFormat) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| !is_noise(*c)).collect();
    let normalized = match format {
        NumberFormat::DotDecimal => cleaned.replace(',', ""),
        NumberFormat::CommaDecimal => cleaned.replace('.', "").replace(',', "."),
    };
    if normalized.is_empty() {
        return None;
    }
    Decimal::from_str(&normalized).ok()
}

/// Parses a range string: `"min-max"`, `"min+"` or a bare `"min"`.
///
/// A bare number and a trailing `+` both mean "from `min` upward". An empty upper
/// side (`"500-"`) is also unbounded. Returns `None` when the lower bound does not parse.
#[must_use]
pub fn parse_range(raw: &str, format: NumberFormat) -> Option<TierRange> {
    let trimmed = raw.trim();
    let open_ended = trimmed.ends_with('+');
    let body = trimmed.trim_end_matches('+');

    match body.split_once(RANGE_SEPARATORS) {
        Some((low, high)) => {
            let min = parse_number(low, format)?;
            let max = if open_ended || high.trim().is_empty() {
                None
            } else {
                Some(parse_number(high, format)?)
            };
            Some(TierRange { min, max })
        }
        None => parse_number(body, format).map(|min| TierRange { min, max: None }),
    }
}

/// Parses a tier percentage; zero, negative and unparsable values disqualify the tier.
#[must_use]
pub fn parse_percent(raw: &str, format: NumberFormat) -> Option<Decimal> {
    parse_number(raw, format).filter(|p| p.is_sign_positive() && !p.is_zero())
}

/// Resolves `amount` against an ordered tier table using [`NumberFormat::DotDecimal`].
#[must_use]
pub fn resolve_fee_percent(amount: Decimal, tiers: &[Tier]) -> Option<Decimal> {
    resolve_fee_percent_with(amount, tiers, NumberFormat::default())
}

/// Resolves `amount` against an ordered tier table.
///
/// Tiers whose range or percent does not parse are skipped, not matched.
#[must_use]
pub fn resolve_fee_percent_with(
    amount: Decimal,
    tiers: &[Tier],
    format: NumberFormat,
) -> Option<Decimal> {
    tiers.iter().find_map(|tier| {
        let range = parse_range(&tier.range, format)?;
        let percent = parse_percent(&tier.percent, format)?;
        range.contains(amount).then_some(percent)
    })
}

/// Decodes a stored tier table.
///
/// Accepts a JSON array, or a JSON string holding an encoded array (older rows were
/// saved double-encoded). `null` decodes to an empty table.
pub fn decode_tier_table(value: &serde_json::Value) -> Result<Vec<Tier>> {
    let decoded = match value {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::String(encoded) => serde_json::from_str(encoded),
        other => serde_json::from_value(other.clone()),
    };
    decoded.map_err(|e| Error::InvalidTierTable {
        message: e.to_string(),
    })
}

/// Decodes a stored tier table and resolves `amount` against it.
pub fn resolve_from_json(amount: Decimal, value: &serde_json::Value) -> Result<Option<Decimal>> {
    let tiers = decode_tier_table(value)?;
    Ok(resolve_fee_percent(amount, &tiers))
}
