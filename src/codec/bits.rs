//! # Bit Packing Helpers
//!
//! Conversions between integer fields and symbol sequences, plus the small
//! parsers shared by the protocol request handlers.

use serde_json::Value;

use super::{Fields, Symbols};
use crate::error::{GatewayError, Result};

/// Append `bits` bits of `value`, least significant first
///
/// Set bits become `high`, cleared bits become symbol 0.
pub fn push_lsb(symbols: &mut Symbols, value: u32, bits: u8, high: u8) {
    for bit in 0..bits as u32 {
        symbols.push(if (value >> bit) & 1 == 1 { high } else { 0 });
    }
}

/// Append `bits` bits of `value`, most significant first
pub fn push_msb(symbols: &mut Symbols, value: u32, bits: u8, high: u8) {
    for bit in (0..bits as u32).rev() {
        symbols.push(if (value >> bit) & 1 == 1 { high } else { 0 });
    }
}

/// Read symbols as bits, first symbol is bit 0; any non-zero symbol is a 1
pub fn read_lsb(symbols: &[u8]) -> u32 {
    symbols
        .iter()
        .take(32)
        .enumerate()
        .filter(|&(_, &s)| s != 0)
        .fold(0, |acc, (i, _)| acc | 1 << i)
}

/// Read symbols as bits, first symbol is the most significant
pub fn read_msb(symbols: &[u8]) -> u32 {
    symbols
        .iter()
        .fold(0, |acc, &s| (acc << 1) | u32::from(s != 0))
}

/// Segment `index` of a `/`-separated path, `None` when absent or empty
pub fn path_segment(path: &str, index: usize) -> Option<&str> {
    path.split('/')
        .nth(index)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
}

/// Parse a decimal number bounded by `max`
pub fn parse_number(field: &'static str, text: &str, max: u32) -> Result<u32> {
    let value: u32 = text
        .trim()
        .parse()
        .map_err(|_| GatewayError::invalid(field, format!("'{}' is not a number", text)))?;
    if value > max {
        return Err(GatewayError::invalid(field, format!("{} exceeds {}", value, max)));
    }
    Ok(value)
}

/// Parse an `on`/`off` command, case-insensitive
pub fn parse_switch(field: &'static str, text: &str) -> Result<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(GatewayError::invalid(field, format!("expected on|off, got '{}'", other))),
    }
}

/// Text field of a structured request
pub fn field_str<'a>(fields: &'a Fields, field: &'static str) -> Result<&'a str> {
    fields
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::invalid(field, "missing or not a string"))
}

/// Optional numeric field, given either as a JSON number or a decimal string
pub fn field_number(fields: &Fields, field: &'static str, max: u32) -> Result<Option<u32>> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let value = n
                .as_u64()
                .ok_or_else(|| GatewayError::invalid(field, format!("{} is not a positive integer", n)))?;
            if value > max as u64 {
                return Err(GatewayError::invalid(field, format!("{} exceeds {}", value, max)));
            }
            Ok(Some(value as u32))
        }
        Some(Value::String(s)) => parse_number(field, s, max).map(Some),
        Some(_) => Err(GatewayError::invalid(field, "expected a number")),
    }
}

/// Numeric field that must be present
pub fn require_number(fields: &Fields, field: &'static str, max: u32) -> Result<u32> {
    field_number(fields, field, max)?.ok_or_else(|| GatewayError::invalid(field, "missing"))
}
