//! Exact money parsing.
//!
//! Amounts are held as `i64` minor units. Decimal amounts are parsed from
//! their text so `49.90` is exactly 4990, never a float approximation.

use serde_json::Value;

use crate::domain::foundation::ValidationError;

/// Parses decimal text (`"49.9"`, `"1,234.50"`, `"49,90"`) into minor units.
///
/// A lone comma followed by one or two digits is read as the decimal
/// separator. More than two fraction digits are rounded half-up.
pub fn parse_minor_units(raw: &str) -> Result<i64, ValidationError> {
    let invalid = |reason: &str| ValidationError::invalid_format("amount", reason.to_string());

    let mut text = raw.trim().to_string();
    if text.is_empty() {
        return Err(invalid("empty amount"));
    }

    if !text.contains('.') {
        if let Some((_, frac)) = text.rsplit_once(',') {
            if (1..=2).contains(&frac.len()) && text.matches(',').count() == 1 {
                text = text.replacen(',', ".", 1);
            }
        }
    }
    text.retain(|c| c != ',' && c != '_');

    let negative = text.starts_with('-');
    let unsigned = text.trim_start_matches(|c: char| c == '-' || c == '+');
    let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("non-numeric characters"));
    }

    let whole_value: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("amount too large"))?
    };

    let digits: Vec<i64> = frac
        .chars()
        .filter_map(|c| c.to_digit(10).map(i64::from))
        .collect();
    let tenths = digits.first().copied().unwrap_or(0);
    let hundredths = digits.get(1).copied().unwrap_or(0);
    let round_up = digits.get(2).map(|d| *d >= 5).unwrap_or(false);

    let minor = whole_value
        .checked_mul(100)
        .and_then(|v| v.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
        .ok_or_else(|| invalid("amount too large"))?;

    Ok(if negative { -minor } else { minor })
}

/// Reads a decimal amount from a JSON value (number or string).
pub fn decimal_value_to_minor(value: &Value) -> Result<i64, ValidationError> {
    match value {
        Value::Number(n) => parse_minor_units(&n.to_string()),
        Value::String(s) => parse_minor_units(s),
        Value::Null => Ok(0),
        _ => Err(ValidationError::invalid_format(
            "amount",
            "expected number or string",
        )),
    }
}
