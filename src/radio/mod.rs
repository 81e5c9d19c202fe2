//! # Radio Module
//!
//! Contract of the OOK radio chip used in continuous packet mode.
//!
//! This module handles:
//! - The [`Radio`] trait consumed by the pulse transceiver
//! - FIFO fill levels reported by the chip
//! - Per-mode radio settings
//! - A loopback implementation that feeds transmitted bytes back to the receiver

pub mod loopback;

pub use loopback::LoopbackRadio;

/// Default transmit power in dBm
pub const DEFAULT_TX_POWER_DBM: i8 = 13;

/// Fill level of the chip's FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FifoLevel {
    Empty,
    NotEmpty,
    /// At or above the chip's FIFO threshold
    Threshold,
    Full,
}

/// Register-level details stay behind this trait; every call is non-blocking.
pub trait Radio {
    /// Enter receive mode, `max_len` 0 for unlimited length
    fn start_receive(&mut self, max_len: u8);

    /// Copy received bytes into `buf`, returning how many were written
    fn get_payload(&mut self, buf: &mut [u8]) -> usize;

    fn fifo_level(&mut self) -> FifoLevel;

    fn write_fifo(&mut self, data: &[u8]);

    /// Start a transmission of unlimited length fed through [`Radio::write_fifo`]
    fn begin_unlimited_transmit(&mut self);

    fn set_bitrate(&mut self, bitrate: u32);

    /// Sync pattern, empty disables sync word detection
    fn set_sync(&mut self, pattern: &[u8]);

    fn set_tx_power(&mut self, dbm: i8);

    fn set_frequency(&mut self, hz: u32);
}

/// Settings applied when a transceiver takes over the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioSettings {
    pub frequency_hz: u32,
    pub tx_power_dbm: i8,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 433_920_000,
            tx_power_dbm: DEFAULT_TX_POWER_DBM,
        }
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Call recorded by [`MockRadio`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RadioCall {
        StartReceive(u8),
        BeginTransmit,
        Bitrate(u32),
        Sync(Vec<u8>),
        TxPower(i8),
        Frequency(u32),
    }

    #[derive(Debug, Default)]
    struct State {
        calls: Vec<RadioCall>,
        /// Bytes waiting to be read by `get_payload`
        rx: VecDeque<u8>,
        /// Bytes written but not yet sent
        fifo: Vec<u8>,
        /// Every byte that left the FIFO
        sent: Vec<u8>,
        fifo_capacity: usize,
    }

    /// Shared-state fake radio
    ///
    /// Clones share state, so a test keeps one handle while the transceiver
    /// owns the other. The TX FIFO only empties when the test calls
    /// [`MockRadio::drain`].
    #[derive(Debug, Clone)]
    pub struct MockRadio {
        state: Arc<Mutex<State>>,
    }

    impl MockRadio {
        pub fn new(fifo_capacity: usize) -> Self {
            Self {
                state: Arc::new(Mutex::new(State {
                    fifo_capacity,
                    ..State::default()
                })),
            }
        }

        pub fn calls(&self) -> Vec<RadioCall> {
            self.state.lock().unwrap().calls.clone()
        }

        pub fn clear_calls(&self) {
            self.state.lock().unwrap().calls.clear();
        }

        /// Queue bytes for the receive path
        pub fn push_rx(&self, bytes: &[u8]) {
            self.state.lock().unwrap().rx.extend(bytes.iter().copied());
        }

        pub fn rx_pending(&self) -> usize {
            self.state.lock().unwrap().rx.len()
        }

        /// Move everything in the TX FIFO to the sent log
        pub fn drain(&self) {
            let mut state = self.state.lock().unwrap();
            let pending = std::mem::take(&mut state.fifo);
            state.sent.extend(pending);
        }

        pub fn fifo_len(&self) -> usize {
            self.state.lock().unwrap().fifo.len()
        }

        /// Sent bytes plus whatever is still in the FIFO
        pub fn transmitted(&self) -> Vec<u8> {
            let state = self.state.lock().unwrap();
            let mut bytes = state.sent.clone();
            bytes.extend_from_slice(&state.fifo);
            bytes
        }
    }

    impl Radio for MockRadio {
        fn start_receive(&mut self, max_len: u8) {
            self.state.lock().unwrap().calls.push(RadioCall::StartReceive(max_len));
        }

        fn get_payload(&mut self, buf: &mut [u8]) -> usize {
            let mut state = self.state.lock().unwrap();
            let count = buf.len().min(state.rx.len());
            for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..count)) {
                *slot = byte;
            }
            count
        }

        fn fifo_level(&mut self) -> FifoLevel {
            let state = self.state.lock().unwrap();
            match state.fifo.len() {
                0 => FifoLevel::Empty,
                n if n >= state.fifo_capacity => FifoLevel::Full,
                _ => FifoLevel::NotEmpty,
            }
        }

        fn write_fifo(&mut self, data: &[u8]) {
            self.state.lock().unwrap().fifo.extend_from_slice(data);
        }

        fn begin_unlimited_transmit(&mut self) {
            self.state.lock().unwrap().calls.push(RadioCall::BeginTransmit);
        }

        fn set_bitrate(&mut self, bitrate: u32) {
            self.state.lock().unwrap().calls.push(RadioCall::Bitrate(bitrate));
        }

        fn set_sync(&mut self, pattern: &[u8]) {
            self.state.lock().unwrap().calls.push(RadioCall::Sync(pattern.to_vec()));
        }

        fn set_tx_power(&mut self, dbm: i8) {
            self.state.lock().unwrap().calls.push(RadioCall::TxPower(dbm));
        }

        fn set_frequency(&mut self, hz: u32) {
            self.state.lock().unwrap().calls.push(RadioCall::Frequency(hz));
        }
    }
}
