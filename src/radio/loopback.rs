//! Loopback radio
//!
//! Software stand-in for the radio chip: bytes written during a transmission
//! are put "on air" and read back by the receive path afterwards, so a send
//! request comes back as a decoded event. Used by the binary when no
//! hardware is attached.

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::{FifoLevel, Radio};

/// FIFO size of the emulated chip in bytes
pub const FIFO_SIZE: usize = 66;

/// Fill level reported as [`FifoLevel::Threshold`]
pub const FIFO_THRESHOLD: usize = 15;

/// Idle bytes appended after every transmission
const TRAILING_SILENCE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Standby,
    Receive,
    Transmit,
}

/// Radio that loops its own transmissions back into the receiver
#[derive(Debug)]
pub struct LoopbackRadio {
    mode: Mode,
    fifo: VecDeque<u8>,
    air: VecDeque<u8>,
    bitrate: u32,
    frequency_hz: u32,
    tx_power_dbm: i8,
    sync: Vec<u8>,
}

impl Default for LoopbackRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackRadio {
    pub fn new() -> Self {
        Self {
            mode: Mode::Standby,
            fifo: VecDeque::with_capacity(FIFO_SIZE),
            air: VecDeque::new(),
            bitrate: 0,
            frequency_hz: 0,
            tx_power_dbm: 0,
            sync: Vec::new(),
        }
    }

    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    pub fn tx_power_dbm(&self) -> i8 {
        self.tx_power_dbm
    }

    /// Sync pattern last configured, empty when detection is off
    pub fn sync(&self) -> &[u8] {
        &self.sync
    }

    pub fn is_receiving(&self) -> bool {
        self.mode == Mode::Receive
    }

    /// Bytes on air not yet read by the receiver
    pub fn air_len(&self) -> usize {
        self.air.len()
    }

    /// Send half of the FIFO, the way the chip empties it at the bitrate
    fn shift_out(&mut self) {
        let count = self.fifo.len().div_ceil(2);
        self.air.extend(self.fifo.drain(..count));
    }
}

impl Radio for LoopbackRadio {
    fn start_receive(&mut self, _max_len: u8) {
        if self.mode == Mode::Transmit {
            self.air.extend(self.fifo.drain(..));
            self.air.extend(std::iter::repeat(0).take(TRAILING_SILENCE));
            debug!("Loopback transmission finished, {} bytes on air", self.air.len());
        }
        self.mode = Mode::Receive;
    }

    fn get_payload(&mut self, buf: &mut [u8]) -> usize {
        if self.mode != Mode::Receive {
            return 0;
        }
        let count = buf.len().min(self.air.len());
        for (slot, byte) in buf.iter_mut().zip(self.air.drain(..count)) {
            *slot = byte;
        }
        count
    }

    fn fifo_level(&mut self) -> FifoLevel {
        match self.fifo.len() {
            0 => FifoLevel::Empty,
            n if n >= FIFO_SIZE => {
                self.shift_out();
                FifoLevel::Full
            }
            n if n >= FIFO_THRESHOLD => FifoLevel::Threshold,
            _ => FifoLevel::NotEmpty,
        }
    }

    fn write_fifo(&mut self, data: &[u8]) {
        if self.mode != Mode::Transmit {
            trace!("FIFO write outside transmit mode dropped");
            return;
        }
        self.fifo.extend(data.iter().copied());
    }

    fn begin_unlimited_transmit(&mut self) {
        self.fifo.clear();
        self.mode = Mode::Transmit;
    }

    fn set_bitrate(&mut self, bitrate: u32) {
        self.bitrate = bitrate;
    }

    fn set_sync(&mut self, pattern: &[u8]) {
        self.sync = pattern.to_vec();
    }

    fn set_tx_power(&mut self, dbm: i8) {
        self.tx_power_dbm = dbm;
    }

    fn set_frequency(&mut self, hz: u32) {
        self.frequency_hz = hz;
    }
}
