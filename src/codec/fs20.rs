//! # FS20 Codec
//!
//! 868 MHz FS20 home automation frames.
//!
//! ```text
//!              ________
//! Bit 0    : _|        |________
//!             |  <2T>  |  <2T>  |
//!              ____________
//! Bit 1    : _|            |____________
//!             |    <3T>    |    <3T>    |
//! ```
//!
//! Symbols differ in length, so there is no timebase estimation. A frame is
//! a preamble of twelve `0` followed by a `1`, five 9-bit words (8 data bits
//! MSB first plus an even parity bit) and a single `0` end marker:
//!
//! ```text
//! 0 x12 1 | hc1 p | hc2 p | adr p | cmd p | chk p | 0 | footer
//! ```
//!
//! The checksum is `0x06 + hc1 + hc2 + adr + cmd` modulo 256. Decoding
//! anchors on the tail of the received frame because the preamble is often
//! cut short; only the 40 data bits are kept as symbols.

use tracing::trace;

use super::bits::{path_segment, push_msb, read_msb, require_number};
use super::matcher::{self, MatchTable};
use super::{Codec, CodecParams, Fields, Symbols, FOOTER_LEN, STANDARD_FOOTER};
use crate::error::{GatewayError, Result};
use crate::event::DecodedEvent;

pub static PARAMS: CodecParams = CodecParams {
    timebase: 200,
    timebase_min: 150,
    timebase_max: 250,
    num_symbols: 40,
    auto_timebase_symbols: 0,
    pulses_per_symbol: 2,
    quality: 5,
    footer: STANDARD_FOOTER,
    tx_repeats: 3,
    shapes: &[
        &[2, 2], // 0
        &[3, 3], // 1
    ],
};

/// Leading `0` symbols of the transmitted preamble
pub const PREAMBLE_ZEROS: usize = 12;

/// Data bytes per frame: house code (2), address, command, checksum
pub const FRAME_BYTES: usize = 5;

/// Bits per transmitted word (data plus parity)
const WORD_BITS: usize = 9;

/// Fixed checksum offset of switch frames
const CHECKSUM_BASE: u8 = 0x06;

/// Command codes with a name
pub const CMD_OFF: u8 = 0x00;
pub const CMD_ON: u8 = 0x11;
pub const CMD_TOGGLE: u8 = 0x12;

/// Highest plain command code; `0x20` and above carry the extension flag
pub const MAX_COMMAND: u8 = 0x1F;

/// Pulses needed from the sync bit to the end of the footer
const TAIL_PULSES: usize = (1 + FRAME_BYTES * WORD_BITS + 1) * 2 + FOOTER_LEN;

/// Decoded or requested FS20 command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fs20Command {
    pub house: u16,
    pub address: u8,
    pub command: u8,
}

impl Fs20Command {
    fn checksum(&self) -> u8 {
        [(self.house >> 8) as u8, self.house as u8, self.address, self.command]
            .iter()
            .fold(CHECKSUM_BASE, |acc, &b| acc.wrapping_add(b))
    }

    /// 40 data symbols, checksum included
    pub fn to_symbols(&self) -> Result<Symbols> {
        if self.command > MAX_COMMAND {
            return Err(GatewayError::invalid(
                "command",
                format!("0x{:02X} needs an extension byte", self.command),
            ));
        }

        let mut symbols = Symbols::new();
        push_msb(&mut symbols, self.house as u32, 16, 1);
        push_msb(&mut symbols, self.address as u32, 8, 1);
        push_msb(&mut symbols, self.command as u32, 8, 1);
        push_msb(&mut symbols, self.checksum() as u32, 8, 1);
        Ok(symbols)
    }

    /// Interpret 40 data symbols, `None` on a checksum mismatch
    pub fn from_symbols(symbols: &[u8]) -> Option<Self> {
        if symbols.len() != FRAME_BYTES * 8 {
            return None;
        }
        let bytes: Vec<u8> = symbols.chunks_exact(8).map(|b| read_msb(b) as u8).collect();
        let command = Self {
            house: u16::from(bytes[0]) << 8 | u16::from(bytes[1]),
            address: bytes[2],
            command: bytes[3],
        };
        (command.checksum() == bytes[4]).then_some(command)
    }

    fn payload(&self) -> String {
        match self.command {
            CMD_OFF => "off".to_string(),
            CMD_ON => "on".to_string(),
            CMD_TOGGLE => "toggle".to_string(),
            other => other.to_string(),
        }
    }
}

fn parse_hex(field: &'static str, text: &str, max: u32) -> Result<u32> {
    let value = u32::from_str_radix(text.trim(), 16)
        .map_err(|_| GatewayError::invalid(field, format!("'{}' is not hex", text)))?;
    if value > max {
        return Err(GatewayError::invalid(field, format!("0x{:X} exceeds 0x{:X}", value, max)));
    }
    Ok(value)
}

fn parse_command(text: &str) -> Result<u8> {
    match text.trim().to_ascii_lowercase().as_str() {
        "on" => Ok(CMD_ON),
        "off" => Ok(CMD_OFF),
        "toggle" => Ok(CMD_TOGGLE),
        other => other
            .parse::<u8>()
            .ok()
            .filter(|&code| code <= MAX_COMMAND)
            .ok_or_else(|| {
                GatewayError::invalid("command", format!("expected on|off|toggle|0-31, got '{}'", other))
            }),
    }
}

/// Match one 9-bit word and check its parity, returning the data byte
fn match_word(table: &MatchTable, pulses: &[u8]) -> Option<u8> {
    let mut bits = Symbols::new();
    if matcher::match_symbols(table, pulses, false, &mut bits) != WORD_BITS {
        return None;
    }
    let data = read_msb(&bits[..8]) as u8;
    let parity = bits[8] != 0;
    if (data.count_ones() % 2 == 1) != parity {
        trace!(data, "parity mismatch");
        return None;
    }
    Some(data)
}

/// FS20 switches and dimmers, path `<house hex>/<address hex>`
#[derive(Debug, Default)]
pub struct Fs20;

impl Fs20 {
    pub const NAME: &'static str = "FS20";

    pub fn new() -> Self {
        Self
    }
}

impl Codec for Fs20 {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> &'static CodecParams {
        &PARAMS
    }

    fn encode_path(&self, path: &str, payload: &str) -> Result<Symbols> {
        let house = path_segment(path, 0)
            .ok_or_else(|| GatewayError::invalid("house", "missing"))
            .and_then(|s| parse_hex("house", s, u16::MAX as u32))?;
        let address = path_segment(path, 1)
            .ok_or_else(|| GatewayError::invalid("address", "missing"))
            .and_then(|s| parse_hex("address", s, u8::MAX as u32))?;

        Fs20Command {
            house: house as u16,
            address: address as u8,
            command: parse_command(payload)?,
        }
        .to_symbols()
    }

    fn encode_fields(&self, fields: &Fields) -> Result<Symbols> {
        let command = match fields.get("command").and_then(|v| v.as_str()) {
            Some(text) => parse_command(text)?,
            None => require_number(fields, "command", MAX_COMMAND as u32)? as u8,
        };

        Fs20Command {
            house: require_number(fields, "house", u16::MAX as u32)? as u16,
            address: require_number(fields, "address", u8::MAX as u32)? as u8,
            command,
        }
        .to_symbols()
    }

    fn decode_pulses(&self, pulses: &[u8]) -> Option<Symbols> {
        if pulses.len() < TAIL_PULSES {
            return None;
        }

        let table = MatchTable::new(&PARAMS, PARAMS.timebase as u32);
        let tail = &pulses[pulses.len() - TAIL_PULSES..];
        let (sync, rest) = tail.split_at(2);
        let (words, rest) = rest.split_at(FRAME_BYTES * WORD_BITS * 2);
        let eot = &rest[..2];

        if table.find_shape(sync, 0) != Some(1) || table.find_shape(eot, 0) != Some(0) {
            return None;
        }

        let mut symbols = Symbols::new();
        for word in words.chunks_exact(WORD_BITS * 2) {
            push_msb(&mut symbols, match_word(&table, word)? as u32, 8, 1);
        }

        if Fs20Command::from_symbols(&symbols).is_none() {
            trace!("checksum mismatch");
            return None;
        }
        Some(symbols)
    }

    fn encode_pulses(&self, symbols: &Symbols) -> Vec<u8> {
        let mut framed = Vec::with_capacity(PREAMBLE_ZEROS + 1 + FRAME_BYTES * WORD_BITS + 1);
        framed.extend(std::iter::repeat(0).take(PREAMBLE_ZEROS));
        framed.push(1);
        for byte in symbols.chunks(8) {
            framed.extend_from_slice(byte);
            let ones = byte.iter().filter(|&&s| s != 0).count();
            framed.push((ones % 2) as u8);
        }
        framed.push(0);

        framed
            .iter()
            .filter_map(|&s| PARAMS.shapes.get(s as usize))
            .flat_map(|widths| widths.iter().map(|&w| matcher::pulse_ticks(PARAMS.timebase as u32, w)))
            .collect()
    }

    fn notify(&self, symbols: &Symbols) -> Option<DecodedEvent> {
        let command = Fs20Command::from_symbols(symbols)?;
        let payload = command.payload();
        Some(
            DecodedEvent::new(
                Self::NAME,
                format!("{:04X}/{:02X}", command.house, command.address),
                payload.clone(),
            )
            .with("house", command.house)
            .with("address", command.address)
            .with("command", payload),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::received;
    use serde_json::json;

    fn transmit(path: &str, payload: &str) -> Vec<u8> {
        Fs20.encode_pulses(&Fs20.encode_path(path, payload).unwrap())
    }

    /// Replace the pulse pair of frame symbol `index` with `shape`
    fn set_symbol(pulses: &mut [u8], index: usize, shape: usize) {
        let widths = PARAMS.shapes[shape];
        pulses[index * 2] = matcher::pulse_ticks(PARAMS.timebase as u32, widths[0]);
        pulses[index * 2 + 1] = matcher::pulse_ticks(PARAMS.timebase as u32, widths[1]);
    }

    #[test]
    fn test_checksum() {
        let command = Fs20Command {
            house: 0x1A2B,
            address: 0x3C,
            command: CMD_ON,
        };
        // 0x06 + 0x1A + 0x2B + 0x3C + 0x11
        assert_eq!(command.checksum(), 0x98);
    }

    #[test]
    fn test_pulse_layout() {
        let pulses = transmit("1A2B/3C", "on");
        assert_eq!(pulses.len(), (PREAMBLE_ZEROS + 1 + FRAME_BYTES * WORD_BITS + 1) * 2);
        assert!(pulses[..PREAMBLE_ZEROS * 2].iter().all(|&p| p == 8));
        assert_eq!(&pulses[PREAMBLE_ZEROS * 2..PREAMBLE_ZEROS * 2 + 2], &[12, 12]);
        assert_eq!(&pulses[pulses.len() - 2..], &[8, 8]);
    }

    #[test]
    fn test_round_trip() {
        let pulses = transmit("1A2B/3C", "on");
        let symbols = Fs20.decode_pulses(&received(&pulses)).expect("frame should decode");
        let event = Fs20.notify(&symbols).unwrap();
        assert_eq!(event.path, "1A2B/3C");
        assert_eq!(event.command, "on");
        assert_eq!(event.fields["house"], 0x1A2B);
        assert_eq!(event.fields["address"], 0x3C);
    }

    #[test]
    fn test_round_trip_commands() {
        for (payload, expected) in [("off", "off"), ("TOGGLE", "toggle"), ("16", "16"), ("0", "off")] {
            let pulses = transmit("FFFF/00", payload);
            let symbols = Fs20.decode_pulses(&received(&pulses)).unwrap();
            assert_eq!(Fs20.notify(&symbols).unwrap().command, expected);
        }
    }

    #[test]
    fn test_truncated_preamble_still_decodes() {
        let pulses = transmit("0001/02", "off");
        let frame = received(&pulses[PREAMBLE_ZEROS * 2 - 3..]);
        assert!(Fs20.decode_pulses(&frame).is_some());
    }

    #[test]
    fn test_too_short() {
        let pulses = transmit("0001/02", "off");
        let frame = received(&pulses[PREAMBLE_ZEROS * 2 + 1..]);
        assert!(Fs20.decode_pulses(&frame).is_none());
    }

    #[test]
    fn test_parity_error() {
        // house byte 0x1A, first data bit is 0
        let mut pulses = transmit("1A2B/3C", "on");
        set_symbol(&mut pulses, PREAMBLE_ZEROS + 1, 1);
        assert!(Fs20.decode_pulses(&received(&pulses)).is_none());
    }

    #[test]
    fn test_checksum_error() {
        // flip a data bit and its parity bit so only the checksum catches it
        let mut pulses = transmit("1A2B/3C", "on");
        set_symbol(&mut pulses, PREAMBLE_ZEROS + 1, 1);
        set_symbol(&mut pulses, PREAMBLE_ZEROS + 1 + 8, 0);
        assert!(Fs20.decode_pulses(&received(&pulses)).is_none());
    }

    #[test]
    fn test_notify_rejects_bad_checksum() {
        let mut symbols = Fs20.encode_path("1A2B/3C", "on").unwrap().to_vec();
        symbols[39] ^= 1;
        assert!(Fs20.notify(&Symbols::from(&symbols[..])).is_none());
    }

    #[test]
    fn test_missing_sync() {
        let mut pulses = transmit("1A2B/3C", "on");
        set_symbol(&mut pulses, PREAMBLE_ZEROS, 0);
        assert!(Fs20.decode_pulses(&received(&pulses)).is_none());
    }

    #[test]
    fn test_invalid_requests() {
        assert!(Fs20.encode_path("1A2B/3C", "32").is_err());
        assert!(Fs20.encode_path("1A2B/3C", "dim").is_err());
        assert!(Fs20.encode_path("12345/01", "on").is_err());
        assert!(Fs20.encode_path("1A2B/100", "on").is_err());
        assert!(Fs20.encode_path("1A2B", "on").is_err());
        assert!(Fs20.encode_path("XYZ/01", "on").is_err());
    }

    #[test]
    fn test_extension_commands_rejected() {
        let command = Fs20Command {
            house: 1,
            address: 2,
            command: 0x31,
        };
        assert!(command.to_symbols().is_err());
    }

    #[test]
    fn test_encode_fields() {
        let fields = json!({"protocol": "FS20", "house": 0x1A2B, "address": 0x3C, "command": "on"});
        let from_fields = Fs20.encode_fields(fields.as_object().unwrap()).unwrap();
        assert_eq!(from_fields, Fs20.encode_path("1A2B/3C", "on").unwrap());

        let numeric = json!({"house": 1, "address": 2, "command": 5});
        let symbols = Fs20.encode_fields(numeric.as_object().unwrap()).unwrap();
        assert_eq!(Fs20.notify(&symbols).unwrap().command, "5");
    }
}
