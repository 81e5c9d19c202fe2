//! # RF Codec Module
//!
//! Pulse-timing codecs for sub-GHz remote-control protocols.
//!
//! Every protocol is described by a static [`CodecParams`] table and shares
//! one generic symbol matcher ([`matcher`]). Protocol modules only add the
//! bit packing that maps symbol sequences to device addresses and commands.
//!
//! This module handles:
//! - Codec descriptors and the fixed-capacity [`Symbols`] result
//! - The [`Codec`] capability trait
//! - Timebase estimation and tolerance-window matching
//! - The [`registry::CodecRegistry`] that owns the active codecs

pub mod bits;
pub mod ev1527;
pub mod fs20;
pub mod intertechno;
pub mod matcher;
pub mod pilota;
pub mod registry;
pub mod tristate;

use std::fmt;

use crate::error::Result;
use crate::event::DecodedEvent;

/// Sampling bitrate of the radio in bit/s
pub const BITRATE: u32 = 20_000;

/// Duration of one sample tick in µs
pub const TICK_US: u32 = 1_000_000 / BITRATE;

/// Maximum number of symbols a single decode or encode can hold
pub const SYMBOL_CAPACITY: usize = 40;

/// Number of trailing pulses that close a received frame
pub const FOOTER_LEN: usize = 2;

/// Footer shared by every protocol: a 5-tick high run and a 150-tick gap
pub const STANDARD_FOOTER: [u8; FOOTER_LEN] = [5, 150];

/// Structured encode request, keyed by field name
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Immutable timing and shape description of one protocol
#[derive(Debug)]
pub struct CodecParams {
    /// Nominal timebase in µs
    pub timebase: u16,
    /// Lowest accepted estimated timebase in µs
    pub timebase_min: u16,
    /// Highest accepted estimated timebase in µs
    pub timebase_max: u16,
    /// Symbols per frame
    pub num_symbols: u8,
    /// Leading symbols used to estimate the timebase, 0 disables estimation
    pub auto_timebase_symbols: u8,
    /// Pulses that make up one symbol
    pub pulses_per_symbol: u8,
    /// Quality divisor q: windows span nominal·(q-1)/q ..= nominal·(q+1)/q
    pub quality: u8,
    /// Trailing high run and inter-repeat gap in ticks
    pub footer: [u8; FOOTER_LEN],
    /// Total number of transmissions per send
    pub tx_repeats: u8,
    /// Symbol shapes, each `pulses_per_symbol` widths in timebase units
    pub shapes: &'static [&'static [u8]],
}

impl CodecParams {
    /// Number of distinct symbol shapes
    pub fn num_shapes(&self) -> usize {
        self.shapes.len()
    }

    /// Pulses in the symbol part of a frame
    pub fn frame_pulses(&self) -> usize {
        self.num_symbols as usize * self.pulses_per_symbol as usize
    }

    /// Total width of a shape in timebase units
    pub fn shape_width(&self, shape: usize) -> u32 {
        self.shapes
            .get(shape)
            .map(|widths| widths.iter().map(|&w| w as u32).sum())
            .unwrap_or(0)
    }
}

/// Fixed-capacity sequence of decoded or to-be-encoded symbols
///
/// Pushing beyond [`SYMBOL_CAPACITY`] silently drops the symbol.
#[derive(Clone, Copy)]
pub struct Symbols {
    buf: [u8; SYMBOL_CAPACITY],
    len: usize,
}

impl Symbols {
    pub const fn new() -> Self {
        Self {
            buf: [0; SYMBOL_CAPACITY],
            len: 0,
        }
    }

    /// Append a symbol, ignoring it once the capacity is reached
    pub fn push(&mut self, symbol: u8) {
        if self.len < SYMBOL_CAPACITY {
            self.buf[self.len] = symbol;
            self.len += 1;
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Symbols {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for Symbols {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq for Symbols {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Symbols {}

impl fmt::Debug for Symbols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl FromIterator<u8> for Symbols {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut symbols = Symbols::new();
        for symbol in iter {
            symbols.push(symbol);
        }
        symbols
    }
}

impl From<&[u8]> for Symbols {
    fn from(slice: &[u8]) -> Self {
        slice.iter().copied().collect()
    }
}

/// Pulse sequence ready for the transmit path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Name of the codec that produced the frame
    pub protocol: &'static str,
    /// Total number of transmissions
    pub repeats: u8,
    /// Runs sent after the pulses of every transmission
    pub footer: [u8; FOOTER_LEN],
    /// Pulse widths in sample ticks, first pulse is high
    pub pulses: Vec<u8>,
}

/// Capability interface of one protocol
///
/// `decode_pulses` and `encode_pulses` default to the shared matcher; only
/// protocols with special framing override them.
pub trait Codec: Send {
    /// Protocol name used for request routing and published topics
    fn name(&self) -> &'static str;

    /// Timing and shape descriptor
    fn params(&self) -> &'static CodecParams;

    /// Build symbols from a path remainder (protocol name stripped) and payload
    fn encode_path(&self, path: &str, payload: &str) -> Result<Symbols>;

    /// Build symbols from a structured request
    fn encode_fields(&self, fields: &Fields) -> Result<Symbols>;

    /// Parse a received frame into symbols
    fn decode_pulses(&self, pulses: &[u8]) -> Option<Symbols> {
        matcher::decode(self.params(), pulses)
    }

    /// Expand symbols into pulse widths
    fn encode_pulses(&self, symbols: &Symbols) -> Vec<u8> {
        matcher::encode(self.params(), symbols)
    }

    /// Interpret decoded symbols as a protocol event
    fn notify(&self, symbols: &Symbols) -> Option<DecodedEvent>;
}

impl fmt::Debug for dyn Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").field("name", &self.name()).finish_non_exhaustive()
    }
}
