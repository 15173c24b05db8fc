//! Validation and normalization of raw feed records into asset rows.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;
use serde_json::Value;

use crate::error::ValidationError;
use crate::services::feed::RawAsset;

/// Penalty applied to the quality score for each missing or empty field
const QUALITY_PENALTIES: &[(&str, f64)] = &[
    ("current_price", 5.0),
    ("market_cap", 10.0),
    ("total_volume", 5.0),
    ("price_change_percentage_24h", 5.0),
    ("image", 2.0),
    ("market_cap_rank", 3.0),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedAsset {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    /// Fraction (0.025 = +2.5%)
    pub change_24h: Decimal,
    pub market_cap: Decimal,
    pub volume_24h: Decimal,
    pub high_24h: Decimal,
    pub low_24h: Decimal,
    pub circulating_supply: Decimal,
    pub total_supply: Decimal,
    pub max_supply: Option<Decimal>,
    pub ath: Decimal,
    pub ath_change: Decimal,
    pub atl: Decimal,
    pub atl_change: Decimal,
    pub market_cap_rank: Option<i32>,
    pub image_url: Option<String>,
    pub quality_score: f64,
    pub last_updated: DateTime<Utc>,
}

/// Result of normalizing one fetched snapshot
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub assets: Vec<NormalizedAsset>,
    pub rejected: usize,
    pub duplicates: usize,
}

/// Normalize a single record. `fallback_ts` is used when the feed omits
/// `last_updated` or sends something unparseable.
pub fn normalize(raw: &RawAsset, fallback_ts: DateTime<Utc>) -> Result<NormalizedAsset, ValidationError> {
    let id = required_text(&raw.id, "id")?.to_lowercase();
    let symbol = required_text(&raw.symbol, "symbol")?.to_lowercase();
    let name = required_text(&raw.name, "name")?;

    if raw.current_price.is_none() {
        return Err(ValidationError::MissingField("current_price"));
    }

    let last_updated = raw
        .last_updated
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback_ts);

    Ok(NormalizedAsset {
        id,
        symbol,
        name,
        price: non_negative(decimal_or_zero(&raw.current_price)),
        change_24h: percent_to_fraction(decimal_or_zero(&raw.price_change_percentage_24h)),
        market_cap: non_negative(decimal_or_zero(&raw.market_cap)),
        volume_24h: non_negative(decimal_or_zero(&raw.total_volume)),
        high_24h: decimal_or_zero(&raw.high_24h),
        low_24h: decimal_or_zero(&raw.low_24h),
        circulating_supply: decimal_or_zero(&raw.circulating_supply),
        total_supply: decimal_or_zero(&raw.total_supply),
        max_supply: raw.max_supply.as_ref().and_then(to_decimal),
        ath: decimal_or_zero(&raw.ath),
        ath_change: percent_to_fraction(decimal_or_zero(&raw.ath_change_percentage)),
        atl: decimal_or_zero(&raw.atl),
        atl_change: percent_to_fraction(decimal_or_zero(&raw.atl_change_percentage)),
        market_cap_rank: raw.market_cap_rank.as_ref().and_then(to_rank),
        image_url: raw
            .image
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        quality_score: quality_score(raw),
        last_updated,
    })
}

/// Normalize a whole snapshot. Invalid records are logged and dropped, and
/// for duplicate identifiers the first occurrence wins.
pub fn normalize_all(raws: &[RawAsset], fallback_ts: DateTime<Utc>) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    let mut seen = HashSet::new();

    for (index, raw) in raws.iter().enumerate() {
        match normalize(raw, fallback_ts) {
            Ok(asset) => {
                if seen.insert(asset.id.clone()) {
                    outcome.assets.push(asset);
                } else {
                    tracing::debug!(asset_id = %asset.id, "Dropping duplicate asset record");
                    outcome.duplicates += 1;
                }
            }
            Err(e) => {
                tracing::warn!(
                    index,
                    id = ?raw.id,
                    error = %e,
                    "Dropping invalid asset record"
                );
                outcome.rejected += 1;
            }
        }
    }

    outcome
}

/// 100 minus the weighted penalties for missing fields, never below zero
pub fn quality_score(raw: &RawAsset) -> f64 {
    let score = QUALITY_PENALTIES
        .iter()
        .filter(|(field, _)| is_blank(field_value(raw, field)))
        .fold(100.0_f64, |score, (_, penalty)| score - *penalty);

    score.max(0.0)
}

fn field_value<'a>(raw: &'a RawAsset, field: &str) -> Option<&'a Value> {
    match field {
        "current_price" => raw.current_price.as_ref(),
        "market_cap" => raw.market_cap.as_ref(),
        "total_volume" => raw.total_volume.as_ref(),
        "price_change_percentage_24h" => raw.price_change_percentage_24h.as_ref(),
        "image" => raw.image.as_ref(),
        "market_cap_rank" => raw.market_cap_rank.as_ref(),
        _ => None,
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Bool(b)) => !b,
        Some(_) => false,
    }
}

fn required_text(value: &Option<Value>, field: &'static str) -> Result<String, ValidationError> {
    let text = match value {
        None | Some(Value::Null) => return Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(ValidationError::InvalidField(field)),
    };

    if text.is_empty() {
        return Err(ValidationError::InvalidField(field));
    }

    Ok(text)
}

/// Accepts JSON numbers and numeric strings, including exponent notation
pub fn to_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };

    if text.is_empty() {
        return None;
    }

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
        .or_else(|| value.as_f64().and_then(Decimal::from_f64))
}

fn decimal_or_zero(value: &Option<Value>) -> Decimal {
    value.as_ref().and_then(to_decimal).unwrap_or(Decimal::ZERO)
}

fn non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

fn percent_to_fraction(value: Decimal) -> Decimal {
    value / Decimal::ONE_HUNDRED
}

fn to_rank(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|r| i32::try_from(r).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawAsset {
        serde_json::from_value(value).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_normalize_full_record() {
        let record = raw(json!({
            "id": "  Bitcoin ",
            "symbol": "BTC",
            "name": " Bitcoin ",
            "image": "https://img.test/btc.png",
            "current_price": 64000.5,
            "market_cap": 1260000000000u64,
            "market_cap_rank": 1,
            "total_volume": "35000000000",
            "price_change_percentage_24h": 2.5,
            "ath_change_percentage": -12.0,
            "max_supply": 21000000,
            "last_updated": "2026-10-01T11:59:30.123Z"
        }));

        let asset = normalize(&record, now()).unwrap();

        assert_eq!(asset.id, "bitcoin");
        assert_eq!(asset.symbol, "btc");
        assert_eq!(asset.name, "Bitcoin");
        assert_eq!(asset.price, dec!(64000.5));
        assert_eq!(asset.volume_24h, dec!(35000000000));
        assert_eq!(asset.change_24h, dec!(0.025));
        assert_eq!(asset.ath_change, dec!(-0.12));
        assert_eq!(asset.max_supply, Some(dec!(21000000)));
        assert_eq!(asset.market_cap_rank, Some(1));
        assert_eq!(asset.quality_score, 100.0);
        assert_ne!(asset.last_updated, now());
    }

    #[test]
    fn test_missing_numerics_default_to_zero() {
        let record = raw(json!({
            "id": "newcoin",
            "symbol": "new",
            "name": "New Coin",
            "current_price": "not-a-number",
            "market_cap": null,
            "total_volume": ""
        }));

        let asset = normalize(&record, now()).unwrap();

        assert_eq!(asset.price, Decimal::ZERO);
        assert_eq!(asset.market_cap, Decimal::ZERO);
        assert_eq!(asset.volume_24h, Decimal::ZERO);
        assert_eq!(asset.change_24h, Decimal::ZERO);
        assert_eq!(asset.max_supply, None);
        assert_eq!(asset.market_cap_rank, None);
        assert_eq!(asset.image_url, None);
        assert_eq!(asset.last_updated, now());
    }

    #[test]
    fn test_negative_values_clamped() {
        let record = raw(json!({
            "id": "weird",
            "symbol": "wrd",
            "name": "Weird",
            "current_price": -1.5,
            "market_cap": -100,
            "total_volume": -3,
            "price_change_percentage_24h": -40
        }));

        let asset = normalize(&record, now()).unwrap();

        assert_eq!(asset.price, Decimal::ZERO);
        assert_eq!(asset.market_cap, Decimal::ZERO);
        assert_eq!(asset.volume_24h, Decimal::ZERO);
        // Change is signed and keeps its sign
        assert_eq!(asset.change_24h, dec!(-0.4));
    }

    #[test]
    fn test_required_fields() {
        let no_price = raw(json!({"id": "a", "symbol": "a", "name": "A"}));
        assert_eq!(
            normalize(&no_price, now()),
            Err(ValidationError::MissingField("current_price"))
        );

        let null_symbol = raw(json!({"id": "a", "symbol": null, "name": "A", "current_price": 1}));
        assert_eq!(
            normalize(&null_symbol, now()),
            Err(ValidationError::MissingField("symbol"))
        );

        let blank_id = raw(json!({"id": "   ", "symbol": "a", "name": "A", "current_price": 1}));
        assert_eq!(
            normalize(&blank_id, now()),
            Err(ValidationError::InvalidField("id"))
        );
    }

    #[test]
    fn test_exponent_notation() {
        assert_eq!(to_decimal(&json!("1.5e3")), Some(dec!(1500)));
        assert_eq!(to_decimal(&json!(2.5e-7)), Some(dec!(0.00000025)));
        assert_eq!(to_decimal(&json!(true)), None);
    }

    #[test]
    fn test_quality_score_penalties() {
        let bare = raw(json!({"id": "a", "symbol": "a", "name": "A", "current_price": 0}));
        // every weighted field is missing or zero: 100 - 30
        assert_eq!(quality_score(&bare), 70.0);

        let no_image = raw(json!({
            "id": "a", "symbol": "a", "name": "A",
            "current_price": 1, "market_cap": 10, "total_volume": 5,
            "price_change_percentage_24h": 1.2, "market_cap_rank": 9
        }));
        assert_eq!(quality_score(&no_image), 98.0);
    }

    #[test]
    fn test_normalize_all_drops_invalid_and_duplicates() {
        let records = vec![
            raw(json!({"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 100})),
            raw(json!({"id": "broken", "symbol": "brk", "name": "Broken"})),
            raw(json!({"id": "BITCOIN", "symbol": "btc", "name": "Bitcoin", "current_price": 200})),
            raw(json!({"id": "ethereum", "symbol": "eth", "name": "Ethereum", "current_price": 10})),
        ];

        let outcome = normalize_all(&records, now());

        assert_eq!(outcome.assets.len(), 2);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.assets[0].id, "bitcoin");
        assert_eq!(outcome.assets[0].price, dec!(100));
        assert_eq!(outcome.assets[1].id, "ethereum");
    }
}
