//! # Intertechno Self-Learning Codec
//!
//! 32-bit pulse-position code used by self-learning Intertechno, HAMA, Nexus
//! and Telldus devices.
//!
//! ```text
//!              ____      ____
//! Bit 0    : _|    |____|    |____________________
//!             |<1T>|<1T>|<1T>|<--------5T-------->|
//!              ____                      ____
//! Bit 1    : _|    |____________________|    |____
//!             |<1T>|<--------5T-------->|<1T>|<1T>|
//!              ____      ____
//! Bit X    : _|    |____|    |____
//!             |<1T>|<1T>|<1T>|<1T>|
//! ```
//!
//! Frame (MSB first): 26-bit id, group flag, on flag, 4-bit channel.

use super::bits::{field_number, field_str, parse_number, parse_switch, path_segment, push_msb, read_msb, require_number};
use super::{Codec, CodecParams, Fields, Symbols, STANDARD_FOOTER};
use crate::error::{GatewayError, Result};
use crate::event::DecodedEvent;

/// Largest transmitter id (26 bits)
pub const MAX_ID: u32 = (1 << 26) - 1;

/// Sync pulse pair sent ahead of the symbols, in sample ticks
pub const SYNC_PULSES: [u8; 2] = [1, 60];

pub static PARAMS: CodecParams = CodecParams {
    timebase: 275,
    timebase_min: 250,
    timebase_max: 350,
    num_symbols: 32,
    // dimmer frames may carry X symbols in the trailing bits
    auto_timebase_symbols: 27,
    pulses_per_symbol: 4,
    quality: 3,
    footer: STANDARD_FOOTER,
    tx_repeats: 5,
    shapes: &[
        &[1, 1, 1, 5], // 0
        &[1, 5, 1, 1], // 1
        &[1, 1, 1, 1], // X
    ],
};

/// Decoded or requested self-learning command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfLearningCommand {
    pub id: u32,
    /// Channel 1-16, `None` for a group command
    pub channel: Option<u8>,
    pub on: bool,
}

impl SelfLearningCommand {
    pub fn to_symbols(&self) -> Result<Symbols> {
        if self.id > MAX_ID {
            return Err(GatewayError::invalid("id", format!("{} exceeds {}", self.id, MAX_ID)));
        }
        let channel_bits = match self.channel {
            Some(channel @ 1..=16) => channel as u32 - 1,
            Some(channel) => {
                return Err(GatewayError::invalid("channel", format!("{} is not 1-16", channel)))
            }
            None => 0,
        };

        let mut symbols = Symbols::new();
        push_msb(&mut symbols, self.id, 26, 1);
        push_msb(&mut symbols, u32::from(self.channel.is_none()), 1, 1);
        push_msb(&mut symbols, u32::from(self.on), 1, 1);
        push_msb(&mut symbols, channel_bits, 4, 1);
        Ok(symbols)
    }

    pub fn from_symbols(symbols: &[u8]) -> Self {
        let data = read_msb(symbols);
        let group = (data >> 5) & 1 == 1;
        Self {
            id: data >> 6,
            channel: (!group).then_some((data & 0x0F) as u8 + 1),
            on: (data >> 4) & 1 == 1,
        }
    }
}

/// Intertechno self-learning switches, path `<id>/<channel>`
#[derive(Debug, Default)]
pub struct Intertechno;

impl Intertechno {
    pub const NAME: &'static str = "intertechno";

    pub fn new() -> Self {
        Self
    }
}

impl Codec for Intertechno {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> &'static CodecParams {
        &PARAMS
    }

    fn encode_path(&self, path: &str, payload: &str) -> Result<Symbols> {
        let id = path_segment(path, 0)
            .ok_or_else(|| GatewayError::invalid("id", "missing"))
            .and_then(|s| parse_number("id", s, MAX_ID))?;
        let channel = path_segment(path, 1)
            .map(|s| parse_number("channel", s, 16))
            .transpose()?
            .map(|c| c as u8);

        SelfLearningCommand {
            id,
            channel,
            on: parse_switch("command", payload)?,
        }
        .to_symbols()
    }

    fn encode_fields(&self, fields: &Fields) -> Result<Symbols> {
        let id = require_number(fields, "id", MAX_ID)?;
        let channel = field_number(fields, "channel", 16)?.map(|c| c as u8);
        let on = parse_switch("command", field_str(fields, "command")?)?;

        SelfLearningCommand { id, channel, on }.to_symbols()
    }

    fn encode_pulses(&self, symbols: &Symbols) -> Vec<u8> {
        let mut pulses = SYNC_PULSES.to_vec();
        pulses.extend(super::matcher::encode(&PARAMS, symbols));
        pulses
    }

    fn notify(&self, symbols: &Symbols) -> Option<DecodedEvent> {
        let command = SelfLearningCommand::from_symbols(symbols);
        let payload = if command.on { "on" } else { "off" };

        let mut event = DecodedEvent::new(Self::NAME, command.id.to_string(), payload).with("id", command.id);
        if let Some(channel) = command.channel {
            event.path = format!("{}/{}", command.id, channel);
            event = event.with("channel", channel);
        }
        Some(event.with("command", payload))
    }
}
