//! # Pulse Transceiver Module
//!
//! Converts between the radio's raw bit stream and pulse-width sequences.
//!
//! The radio samples the OOK line at [`BITRATE`](crate::codec::BITRATE), so
//! every bit is one tick and a pulse is a run of equal bits.
//!
//! This module handles:
//! - Receive framing: runs are collected in a [`ring::PulseRing`] and a
//!   frame is closed by a gap longer than [`SEPARATION_LEN`]
//! - Transmit pacing: pulse runs are packed MSB first into bytes and fed to
//!   the radio FIFO only while it has room
//!
//! Both paths are driven by [`PulseTransceiver::poll`] from an external tick
//! and never block.

pub mod ring;

use std::time::Instant;

use tracing::{debug, info, trace, warn};

use crate::codec::registry::CodecRegistry;
use crate::codec::{EncodedFrame, BITRATE, FOOTER_LEN, STANDARD_FOOTER};
use crate::event::EventSink;
use crate::radio::{FifoLevel, Radio, RadioSettings};
use ring::PulseRing;

/// Longest stored run in ticks; a longer gap ends a received frame
pub const SEPARATION_LEN: u8 = 120;

/// Bytes read from the radio per poll
pub const RX_CHUNK: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Idle,
    Symbols,
    Footer1,
    Footer2,
}

/// Receive and transmit state machine on top of a [`Radio`]
#[derive(Debug)]
pub struct PulseTransceiver<R: Radio> {
    radio: R,
    ring: PulseRing,
    /// Current line level
    last_bit: bool,
    /// Ticks left in the current TX run, or length of the current RX run
    run: u16,
    tx_state: TxState,
    tx_pulses: Vec<u8>,
    tx_index: usize,
    tx_remaining: u8,
    tx_footer: [u8; FOOTER_LEN],
}

impl<R: Radio> PulseTransceiver<R> {
    /// Configure the radio for OOK sampling and start receiving
    pub fn new(mut radio: R, settings: &RadioSettings) -> Self {
        radio.set_bitrate(BITRATE);
        radio.set_sync(&[]);
        radio.set_tx_power(settings.tx_power_dbm);
        radio.set_frequency(settings.frequency_hz);
        radio.start_receive(0);

        info!(
            "Transceiver ready at {} Hz, {} dBm",
            settings.frequency_hz, settings.tx_power_dbm
        );

        Self {
            radio,
            ring: PulseRing::new(),
            last_bit: false,
            run: 1,
            tx_state: TxState::Idle,
            tx_pulses: Vec::new(),
            tx_index: 0,
            tx_remaining: 0,
            tx_footer: STANDARD_FOOTER,
        }
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn is_transmitting(&self) -> bool {
        self.tx_state != TxState::Idle
    }

    /// Start sending an encoded frame
    ///
    /// A transmission still in progress is abandoned in favour of the new
    /// frame.
    pub fn transmit(&mut self, frame: EncodedFrame) {
        let Some(&first) = frame.pulses.first() else {
            warn!("Ignoring empty {} frame", frame.protocol);
            return;
        };
        if self.is_transmitting() {
            warn!("Replacing transmission in progress with {}", frame.protocol);
        }

        info!(
            "Transmitting {} ({} pulses, {} times)",
            frame.protocol,
            frame.pulses.len(),
            frame.repeats.max(1)
        );

        self.tx_pulses = frame.pulses;
        self.tx_index = 1;
        self.tx_remaining = frame.repeats.saturating_sub(1);
        self.tx_footer = frame.footer;
        self.run = u16::from(first.max(1));
        self.last_bit = true;
        self.tx_state = TxState::Symbols;
        self.radio.begin_unlimited_transmit();
    }

    /// Advance whichever path is active by the work available right now
    pub fn poll(&mut self, registry: &mut CodecRegistry, sink: &mut dyn EventSink, now: Instant) {
        if self.is_transmitting() {
            self.step_transmit();
        } else {
            self.step_receive(registry, sink, now);
        }
    }

    fn step_transmit(&mut self) {
        while self.radio.fifo_level() != FifoLevel::Full {
            let mut byte = 0u8;
            let mut mask = 0x80u8;

            while mask != 0 {
                if self.last_bit {
                    byte |= mask;
                }
                mask >>= 1;

                self.run -= 1;
                if self.run == 0 {
                    if !self.next_run() {
                        // flush the partial byte
                        self.radio.write_fifo(&[byte]);
                        self.finish_transmit();
                        return;
                    }
                    self.last_bit = !self.last_bit;
                }
            }

            self.radio.write_fifo(&[byte]);
        }
    }

    /// Load the next run, `false` once the last repeat is complete
    fn next_run(&mut self) -> bool {
        match self.tx_state {
            TxState::Symbols => match self.tx_pulses.get(self.tx_index) {
                Some(&pulse) => {
                    self.tx_index += 1;
                    self.run = u16::from(pulse.max(1));
                }
                None => {
                    self.run = u16::from(self.tx_footer[0].max(1));
                    self.tx_state = TxState::Footer1;
                }
            },
            TxState::Footer1 => {
                self.run = u16::from(self.tx_footer[1].max(1));
                self.tx_state = TxState::Footer2;
            }
            TxState::Footer2 if self.tx_remaining > 0 => {
                self.tx_remaining -= 1;
                self.tx_index = 1;
                self.run = u16::from(self.tx_pulses.first().copied().unwrap_or(1).max(1));
                self.tx_state = TxState::Symbols;
            }
            TxState::Footer2 | TxState::Idle => return false,
        }
        true
    }

    fn finish_transmit(&mut self) {
        debug!("Transmission complete, back to receive");
        self.tx_state = TxState::Idle;
        self.tx_pulses.clear();
        self.radio.start_receive(0);

        self.last_bit = false;
        self.run = 1;
        self.ring.clear();
    }

    fn step_receive(&mut self, registry: &mut CodecRegistry, sink: &mut dyn EventSink, now: Instant) {
        let mut buf = [0u8; RX_CHUNK];
        let count = self.radio.get_payload(&mut buf);

        for &byte in &buf[..count] {
            for shift in (0..8).rev() {
                let bit = (byte >> shift) & 1 == 1;

                if bit != self.last_bit {
                    self.ring.push(self.run.min(u16::from(SEPARATION_LEN)) as u8);
                    self.last_bit = bit;
                    self.run = 1;
                    continue;
                }

                self.run = self.run.saturating_add(1);
                if self.run > u16::from(SEPARATION_LEN) && !self.ring.is_empty() {
                    let frame = self.ring.close_frame(SEPARATION_LEN);
                    trace!(pulses = frame.len(), "frame closed");
                    if !registry.decode_all(frame, now, sink) {
                        sink.unmatched(frame);
                    }
                    self.ring.clear();
                }
            }
        }
    }
}
