pub mod asset;
pub mod common;
pub mod health;
pub mod market;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Decimal columns are exposed as JSON numbers
pub(crate) fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}
