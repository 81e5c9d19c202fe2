//! # Tristate Codec
//!
//! Old-style Intertechno (and compatible) code-wheel switches.
//!
//! ```text
//!           ____              ____
//! Bit 0 : _|    |____________|    |____________
//!          |<4a>|<---12a---->|<4a>|<---12a--->|
//!           ____________      ____________
//! Bit 1 : _|            |____|            |____
//!          |<---12a---->|<4a>|<---12a---->|<4a>|
//!           ____              ____________
//! Bit F : _|    |____________|            |____
//!          |<4a>|<---12a---->|<---12a---->|<4a>|
//!           ____              ____
//! Bit X : _|    |____________|    |____
//!          |<4a>|<---12a---->|<4a>|<4a>|
//! ```
//!
//! A frame is 12 symbols: 4 house bits, 2 channel bits, 2 group bits, the
//! fixed marker `0F` and the command pair (`FF` on, `F0` off), all LSB first
//! with `F` standing for a set bit. Channel and group bits are all `X` when
//! the command addresses the whole house.

use super::bits::{field_number, field_str, parse_switch, path_segment, push_lsb, read_lsb};
use super::{Codec, CodecParams, Fields, Symbols, STANDARD_FOOTER};
use crate::error::{GatewayError, Result};
use crate::event::DecodedEvent;
use tracing::warn;

/// Symbol index of a plain `0`
pub const SYMBOL_ZERO: u8 = 0;
/// Symbol index of `F`, used for set bits
pub const SYMBOL_F: u8 = 2;
/// Symbol index of `X`, used for "all channels/groups"
pub const SYMBOL_X: u8 = 3;

pub static PARAMS: CodecParams = CodecParams {
    timebase: 350,
    timebase_min: 300,
    timebase_max: 400,
    num_symbols: 12,
    // the house code is always present, later symbols may be shorter X bits
    auto_timebase_symbols: 4,
    pulses_per_symbol: 4,
    quality: 2,
    footer: STANDARD_FOOTER,
    tx_repeats: 5,
    shapes: &[
        &[1, 3, 1, 3], // 0
        &[3, 1, 3, 1], // 1
        &[1, 3, 3, 1], // F
        &[1, 3, 1, 1], // X
    ],
};

/// Decoded or requested tristate command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TristateCommand {
    /// House code `'A'..='P'`
    pub house: char,
    /// Group and channel, both 1-4; `None` addresses every device in the house
    pub unit: Option<(u8, u8)>,
    pub on: bool,
}

impl TristateCommand {
    /// Build the 12-symbol frame
    pub fn to_symbols(&self) -> Result<Symbols> {
        let house = match self.house {
            'A'..='P' => self.house as u32 - 'A' as u32,
            'a'..='p' => self.house as u32 - 'a' as u32,
            other => return Err(GatewayError::invalid("house", format!("'{}' is not A-P", other))),
        };

        let mut symbols = Symbols::new();
        push_lsb(&mut symbols, house, 4, SYMBOL_F);

        match self.unit {
            Some((group, channel)) if (1..=4).contains(&group) && (1..=4).contains(&channel) => {
                push_lsb(&mut symbols, channel as u32 - 1, 2, SYMBOL_F);
                push_lsb(&mut symbols, group as u32 - 1, 2, SYMBOL_F);
            }
            _ => {
                push_lsb(&mut symbols, 0b11, 2, SYMBOL_X);
                push_lsb(&mut symbols, 0b11, 2, SYMBOL_X);
            }
        }

        push_lsb(&mut symbols, 0b10, 2, SYMBOL_F);
        push_lsb(&mut symbols, if self.on { 0b11 } else { 0b01 }, 2, SYMBOL_F);
        Ok(symbols)
    }

    /// Interpret a 12-symbol frame, `None` for an unknown command pair
    pub fn from_symbols(symbols: &[u8]) -> Option<Self> {
        if symbols.len() != PARAMS.num_symbols as usize {
            return None;
        }

        let bin = read_lsb(symbols);
        let on = match bin >> 10 {
            0b11 => true,
            0b01 => false,
            _ => return None,
        };

        let house = char::from(b'A' + (bin & 0x0F) as u8);
        let unit = if symbols[4..8].iter().all(|&s| s == SYMBOL_X) {
            None
        } else {
            let channel = ((bin >> 4) & 0x03) as u8 + 1;
            let group = ((bin >> 6) & 0x03) as u8 + 1;
            Some((group, channel))
        };

        Some(Self { house, unit, on })
    }
}

fn parse_house(text: &str) -> Result<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(house), None) => Ok(house),
        _ => Err(GatewayError::invalid("house", format!("'{}' is not a single letter", text))),
    }
}

/// Group and channel to address, `None` for the whole house
///
/// A unit that was asked for but is incomplete or outside 1-4 still falls
/// back to the whole house, with a warning.
fn requested_unit(group: Option<u8>, channel: Option<u8>, given: bool) -> Option<(u8, u8)> {
    match (group, channel) {
        (Some(g), Some(c)) if (1..=4).contains(&g) && (1..=4).contains(&c) => Some((g, c)),
        _ => {
            if given {
                warn!(
                    "Group {:?} / channel {:?} is not a valid unit, addressing the whole house",
                    group, channel
                );
            }
            None
        }
    }
}

/// Intertechno tristate switches, path `<house>/<group>/<channel>`
#[derive(Debug, Default)]
pub struct ItTristate;

impl ItTristate {
    pub const NAME: &'static str = "ittristate";

    pub fn new() -> Self {
        Self
    }
}

impl Codec for ItTristate {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> &'static CodecParams {
        &PARAMS
    }

    fn encode_path(&self, path: &str, payload: &str) -> Result<Symbols> {
        let house = path_segment(path, 0)
            .ok_or_else(|| GatewayError::invalid("house", "missing"))
            .and_then(parse_house)?;
        let given = path_segment(path, 1).is_some() || path_segment(path, 2).is_some();
        let group = path_segment(path, 1).and_then(|s| s.parse::<u8>().ok());
        let channel = path_segment(path, 2).and_then(|s| s.parse::<u8>().ok());

        TristateCommand {
            house,
            unit: requested_unit(group, channel, given),
            on: parse_switch("command", payload)?,
        }
        .to_symbols()
    }

    fn encode_fields(&self, fields: &Fields) -> Result<Symbols> {
        let house = parse_house(field_str(fields, "house")?)?;
        let on = parse_switch("command", field_str(fields, "command")?)?;
        let given = fields.contains_key("group") || fields.contains_key("channel");
        let group = field_number(fields, "group", 255)?.map(|g| g as u8);
        let channel = field_number(fields, "channel", 255)?.map(|c| c as u8);

        TristateCommand {
            house,
            unit: requested_unit(group, channel, given),
            on,
        }
        .to_symbols()
    }

    fn notify(&self, symbols: &Symbols) -> Option<DecodedEvent> {
        let command = TristateCommand::from_symbols(symbols)?;
        let payload = if command.on { "on" } else { "off" };

        let house = command.house.to_string();
        let mut event = DecodedEvent::new(Self::NAME, house.clone(), payload).with("house", house);
        if let Some((group, channel)) = command.unit {
            event.path = format!("{}/{}/{}", command.house, group, channel);
            event = event.with("group", group).with("channel", channel);
        }
        Some(event.with("command", payload))
    }
}
