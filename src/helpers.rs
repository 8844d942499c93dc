use alloy_primitives::{utils::format_units, U256};

use crate::error::Error;

/// Render a fixed-point integer as a decimal string, dividing by
/// `10^decimals` without losing precision.
///
/// Trailing zeros are trimmed but one fractional digit is always kept:
/// `1000.0`, `1.5`, `0.000000000000000001`.
pub fn format_amount(value: U256, decimals: u8) -> Result<String, Error> {
    let formatted = format_units(value, decimals)?;

    let Some((whole, fraction)) = formatted.split_once('.') else {
        return Ok(format!("{}.0", formatted));
    };

    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        return Ok(format!("{}.0", whole));
    }

    Ok(format!("{}.{}", whole, fraction))
}
