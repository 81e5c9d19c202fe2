//! # RF Gateway Library
//!
//! Send and receive 433/868 MHz remote-control telegrams through an OOK
//! radio transceiver.
//!
//! This library provides the pulse-timing codecs for common remote-control
//! protocols, the cooperative transceiver loop that moves pulses between the
//! codecs and the radio FIFO, and the request/event surfaces around them.

pub mod app;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod radio;
pub mod request;
pub mod transceiver;
