//! # EV1527 Codec
//!
//! Pulse-width code 1:3 of the EV1527 encoder chip (EMYLO, logilight, REV
//! and Heitronic door bells, ...).
//!
//! ```text
//!              ____
//! Bit 0    : _|    |____________
//!             |<1T>|    <3T>    |
//!              ____________
//! Bit 1    : _|            |____
//!             |    <3T>    |<1T>|
//! ```
//!
//! Frame (LSB first): 20-bit code, 4-bit data. [`Emylo`] reuses the same
//! frame and maps the data nibble to remote buttons A-D.

use super::bits::{field_str, parse_number, path_segment, push_lsb, read_lsb, require_number};
use super::{Codec, CodecParams, Fields, Symbols, STANDARD_FOOTER};
use crate::error::{GatewayError, Result};
use crate::event::DecodedEvent;

/// Largest transmitter code (20 bits)
pub const MAX_CODE: u32 = (1 << 20) - 1;

/// Largest data nibble
pub const MAX_DATA: u32 = 0x0F;

pub static PARAMS: CodecParams = CodecParams {
    timebase: 250,
    timebase_min: 220,
    timebase_max: 360,
    num_symbols: 24,
    auto_timebase_symbols: 24,
    pulses_per_symbol: 2,
    quality: 3,
    footer: STANDARD_FOOTER,
    tx_repeats: 5,
    shapes: &[
        &[1, 3], // 0
        &[3, 1], // 1
    ],
};

/// Pack code and data into the 24-symbol frame
pub fn frame_symbols(code: u32, data: u8) -> Result<Symbols> {
    if code > MAX_CODE {
        return Err(GatewayError::invalid("id", format!("{} exceeds {}", code, MAX_CODE)));
    }
    if data as u32 > MAX_DATA {
        return Err(GatewayError::invalid("data", format!("{} exceeds {}", data, MAX_DATA)));
    }

    let mut symbols = Symbols::new();
    push_lsb(&mut symbols, code, 20, 1);
    push_lsb(&mut symbols, data as u32, 4, 1);
    Ok(symbols)
}

/// Split a 24-symbol frame into code and data
pub fn frame_fields(symbols: &[u8]) -> (u32, u8) {
    let code = read_lsb(&symbols[..symbols.len().min(20)]);
    let data = symbols.get(20..24).map(read_lsb).unwrap_or(0) as u8;
    (code, data)
}

/// Generic EV1527 transmitters, path `<code>/<data>`
#[derive(Debug, Default)]
pub struct Ev1527;

impl Ev1527 {
    pub const NAME: &'static str = "EV1527";

    pub fn new() -> Self {
        Self
    }
}

impl Codec for Ev1527 {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> &'static CodecParams {
        &PARAMS
    }

    fn encode_path(&self, path: &str, _payload: &str) -> Result<Symbols> {
        let code = path_segment(path, 0)
            .ok_or_else(|| GatewayError::invalid("id", "missing"))
            .and_then(|s| parse_number("id", s, MAX_CODE))?;
        let data = path_segment(path, 1)
            .ok_or_else(|| GatewayError::invalid("data", "missing"))
            .and_then(|s| parse_number("data", s, MAX_DATA))?;
        frame_symbols(code, data as u8)
    }

    fn encode_fields(&self, fields: &Fields) -> Result<Symbols> {
        let code = require_number(fields, "id", MAX_CODE)?;
        let data = require_number(fields, "data", MAX_DATA)?;
        frame_symbols(code, data as u8)
    }

    fn notify(&self, symbols: &Symbols) -> Option<DecodedEvent> {
        let (code, data) = frame_fields(symbols);
        Some(
            DecodedEvent::new(Self::NAME, format!("{}/{}", code, data), "press")
                .with("id", code)
                .with("data", data),
        )
    }
}

/// Data nibble of each EMYLO button
const KEYS: [(char, u8); 4] = [('A', 0b1000), ('B', 0b0100), ('C', 0b0010), ('D', 0b0001)];

/// EMYLO four-button remotes, path `<id>`, payload button `A`-`D`
///
/// Delegates framing and pulse handling to [`Ev1527`].
#[derive(Debug, Default)]
pub struct Emylo {
    frame: Ev1527,
}

impl Emylo {
    pub const NAME: &'static str = "emylo";

    pub fn new() -> Self {
        Self { frame: Ev1527 }
    }

    fn key_data(key: &str) -> Result<u8> {
        let key = key.trim().to_ascii_uppercase();
        KEYS.iter()
            .find(|(k, _)| key.len() == 1 && key.starts_with(*k))
            .map(|&(_, data)| data)
            .ok_or_else(|| GatewayError::invalid("key", format!("'{}' is not A-D", key)))
    }
}

impl Codec for Emylo {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> &'static CodecParams {
        self.frame.params()
    }

    fn encode_path(&self, path: &str, payload: &str) -> Result<Symbols> {
        let code = path_segment(path, 0)
            .ok_or_else(|| GatewayError::invalid("id", "missing"))
            .and_then(|s| parse_number("id", s, MAX_CODE))?;
        frame_symbols(code, Self::key_data(payload)?)
    }

    fn encode_fields(&self, fields: &Fields) -> Result<Symbols> {
        let code = require_number(fields, "id", MAX_CODE)?;
        frame_symbols(code, Self::key_data(field_str(fields, "key")?)?)
    }

    fn decode_pulses(&self, pulses: &[u8]) -> Option<Symbols> {
        self.frame.decode_pulses(pulses)
    }

    fn encode_pulses(&self, symbols: &Symbols) -> Vec<u8> {
        self.frame.encode_pulses(symbols)
    }

    fn notify(&self, symbols: &Symbols) -> Option<DecodedEvent> {
        let (code, data) = frame_fields(symbols);
        let (key, _) = KEYS.iter().find(|&&(_, d)| d == data)?;
        Some(
            DecodedEvent::new(Self::NAME, code.to_string(), key.to_string())
                .with("id", code)
                .with("key", key.to_string()),
        )
    }
}
