//! # Pilota Casa Codec
//!
//! Pulse-width code 1:2.
//!
//! ```text
//!              ________
//! Bit 0    : _|        |____
//!             |  <2T>  |<1T>|
//!              ____
//! Bit 1    : _|    |________
//!             |<1T>|  <2T>  |
//! ```
//!
//! Frame (32 bits, MSB first): bits 29..24 hold a command code from a fixed
//! table keyed by group, channel and on/off; bits 23..8 hold the remote id.

use super::bits::{field_number, field_str, parse_number, parse_switch, path_segment, push_msb, read_msb, require_number};
use super::{Codec, CodecParams, Fields, Symbols, STANDARD_FOOTER};
use crate::error::{GatewayError, Result};
use crate::event::DecodedEvent;

pub static PARAMS: CodecParams = CodecParams {
    timebase: 600,
    timebase_min: 500,
    timebase_max: 700,
    num_symbols: 32,
    auto_timebase_symbols: 32,
    pulses_per_symbol: 2,
    quality: 3,
    footer: STANDARD_FOOTER,
    tx_repeats: 5,
    shapes: &[
        &[2, 1], // 0
        &[1, 2], // 1
    ],
};

/// One command table row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandCode {
    pub code: u8,
    /// 1-4, 0 for all groups
    pub group: u8,
    /// 1-3, 0 for all channels
    pub channel: u8,
    pub on: bool,
}

const fn row(code: u8, group: u8, channel: u8, on: bool) -> CommandCode {
    CommandCode {
        code,
        group,
        channel,
        on,
    }
}

pub static COMMANDS: [CommandCode; 26] = [
    row(0b110001, 1, 1, true),
    row(0b111110, 1, 1, false),
    row(0b011001, 1, 2, true),
    row(0b010001, 1, 2, false),
    row(0b101001, 1, 3, true),
    row(0b100001, 1, 3, false),
    row(0b111010, 2, 1, true),
    row(0b110010, 2, 1, false),
    row(0b010110, 2, 2, true),
    row(0b011010, 2, 2, false),
    row(0b100110, 2, 3, true),
    row(0b101010, 2, 3, false),
    row(0b110111, 3, 1, true),
    row(0b111011, 3, 1, false),
    row(0b011111, 3, 2, true),
    row(0b010111, 3, 2, false),
    row(0b101111, 3, 3, true),
    row(0b100111, 3, 3, false),
    row(0b111101, 4, 1, true),
    row(0b110101, 4, 1, false),
    row(0b010011, 4, 2, true),
    row(0b011101, 4, 2, false),
    row(0b100011, 4, 3, true),
    row(0b101101, 4, 3, false),
    row(0b101100, 0, 0, true),
    row(0b011100, 0, 0, false),
];

/// Decoded or requested Pilota command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PilotaCommand {
    pub id: u16,
    pub group: u8,
    pub channel: u8,
    pub on: bool,
}

impl PilotaCommand {
    pub fn to_symbols(&self) -> Result<Symbols> {
        let entry = COMMANDS
            .iter()
            .find(|c| c.group == self.group && c.channel == self.channel && c.on == self.on)
            .ok_or_else(|| {
                GatewayError::invalid(
                    "channel",
                    format!("no command for group {} channel {}", self.group, self.channel),
                )
            })?;

        let data = (entry.code as u32) << 24 | (self.id as u32) << 8;
        let mut symbols = Symbols::new();
        push_msb(&mut symbols, data, 32, 1);
        Ok(symbols)
    }

    pub fn from_symbols(symbols: &[u8]) -> Option<Self> {
        let data = read_msb(symbols);
        let code = ((data >> 24) & 0x3F) as u8;
        let entry = COMMANDS.iter().find(|c| c.code == code)?;
        Some(Self {
            id: (data >> 8) as u16,
            group: entry.group,
            channel: entry.channel,
            on: entry.on,
        })
    }
}

/// Pilota Casa remotes, path `<id>/<group>/<channel>`
#[derive(Debug, Default)]
pub struct Pilota;

impl Pilota {
    pub const NAME: &'static str = "pilota";

    pub fn new() -> Self {
        Self
    }
}

impl Codec for Pilota {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> &'static CodecParams {
        &PARAMS
    }

    fn encode_path(&self, path: &str, payload: &str) -> Result<Symbols> {
        let id = path_segment(path, 0)
            .ok_or_else(|| GatewayError::invalid("id", "missing"))
            .and_then(|s| parse_number("id", s, u16::MAX as u32))?;
        let group = path_segment(path, 1).map(|s| parse_number("group", s, 4)).transpose()?;
        let channel = path_segment(path, 2).map(|s| parse_number("channel", s, 3)).transpose()?;

        PilotaCommand {
            id: id as u16,
            group: group.unwrap_or(0) as u8,
            channel: channel.unwrap_or(0) as u8,
            on: parse_switch("command", payload)?,
        }
        .to_symbols()
    }

    fn encode_fields(&self, fields: &Fields) -> Result<Symbols> {
        let id = require_number(fields, "id", u16::MAX as u32)?;
        PilotaCommand {
            id: id as u16,
            group: field_number(fields, "group", 4)?.unwrap_or(0) as u8,
            channel: field_number(fields, "channel", 3)?.unwrap_or(0) as u8,
            on: parse_switch("command", field_str(fields, "command")?)?,
        }
        .to_symbols()
    }

    fn notify(&self, symbols: &Symbols) -> Option<DecodedEvent> {
        let command = PilotaCommand::from_symbols(symbols)?;
        let payload = if command.on { "on" } else { "off" };

        let mut event = DecodedEvent::new(Self::NAME, command.id.to_string(), payload);
        if command.channel > 0 {
            event.path = format!("{}/{}/{}", command.id, command.group, command.channel);
        }
        Some(
            event
                .with("id", command.id)
                .with("group", command.group)
                .with("channel", command.channel)
                .with("command", payload),
        )
    }
}
