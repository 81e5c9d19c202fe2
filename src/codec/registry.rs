//! # Codec Registry
//!
//! Owns the active codecs, routes received frames to all of them and
//! encode requests to the one named in the request.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{Codec, EncodedFrame, Fields, Symbols};
use crate::error::{GatewayError, Result};
use crate::event::EventSink;

/// Identical decodes closer together than this are reported once
pub const DEBOUNCE: Duration = Duration::from_millis(500);

struct Entry {
    codec: Box<dyn Codec>,
    /// Symbols and time of the last successful decode
    last: Option<(Symbols, Instant)>,
}

impl Entry {
    /// Record a decode and tell whether it should be reported
    fn record(&mut self, symbols: Symbols, now: Instant) -> bool {
        let fresh = match &self.last {
            Some((previous, at)) => *previous != symbols || now.saturating_duration_since(*at) >= DEBOUNCE,
            None => true,
        };
        self.last = Some((symbols, now));
        fresh
    }
}

/// Ordered set of codecs; registration order breaks ties
#[derive(Default)]
pub struct CodecRegistry {
    entries: Vec<Entry>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|e| e.codec.name())).finish()
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, codec: Box<dyn Codec>) {
        debug!("Registered codec {}", codec.name());
        self.entries.push(Entry { codec, last: None });
    }

    /// Drop every registered codec
    pub fn release_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.codec.name()).collect()
    }

    /// Offer a received frame to every codec
    ///
    /// Each codec that parses the frame is debounced against its own last
    /// decode before its event reaches `sink`.
    ///
    /// # Arguments
    ///
    /// * `pulses` - Closed frame, oldest pulse first, ending with the separator
    /// * `now` - Receive time used for debouncing
    /// * `sink` - Receiver of the published events
    ///
    /// # Returns
    ///
    /// * `bool` - Whether any codec parsed the frame
    pub fn decode_all(&mut self, pulses: &[u8], now: Instant, sink: &mut dyn EventSink) -> bool {
        let mut matched = false;

        for entry in &mut self.entries {
            let Some(symbols) = entry.codec.decode_pulses(pulses) else {
                continue;
            };
            matched = true;

            if !entry.record(symbols, now) {
                trace!("{} repeat suppressed", entry.codec.name());
                continue;
            }
            if let Some(event) = entry.codec.notify(&symbols) {
                debug!("{} decoded {} {}", event.protocol, event.path, event.command);
                sink.publish(&event);
            }
        }

        matched
    }

    /// Codec by name, ignoring ASCII case
    pub fn find_by_name(&self, name: &str) -> Option<&dyn Codec> {
        self.entries
            .iter()
            .find(|e| e.codec.name().eq_ignore_ascii_case(name))
            .map(|e| e.codec.as_ref())
    }

    fn require(&self, name: &str) -> Result<&dyn Codec> {
        self.find_by_name(name)
            .ok_or_else(|| GatewayError::UnknownProtocol(name.to_string()))
    }

    /// Encode a path-style request
    ///
    /// # Arguments
    ///
    /// * `path` - `<protocol>/<rest>`, surrounding slashes are ignored
    /// * `payload` - Command text handed to the codec, e.g. `on`
    ///
    /// # Returns
    ///
    /// * `Result<EncodedFrame>` - Pulses and repeat count for the transmitter
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The protocol name is empty (`MalformedRequest`)
    /// - No registered codec carries that name (`UnknownProtocol`)
    /// - The codec rejects the path or payload (`InvalidField`)
    pub fn encode_by_path(&self, path: &str, payload: &str) -> Result<EncodedFrame> {
        let path = path.trim_matches('/');
        let (name, rest) = path.split_once('/').unwrap_or((path, ""));
        if name.is_empty() {
            return Err(GatewayError::MalformedRequest("empty protocol name".to_string()));
        }

        let codec = self.require(name)?;
        let symbols = codec.encode_path(rest, payload)?;
        Ok(Self::frame(codec, &symbols))
    }

    /// Encode a structured request whose `protocol` field names the codec
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `protocol` is missing or not a string (`MalformedRequest`)
    /// - No registered codec carries that name (`UnknownProtocol`)
    /// - A field is missing or out of range (`InvalidField`)
    pub fn encode_by_fields(&self, fields: &Fields) -> Result<EncodedFrame> {
        let name = fields
            .get("protocol")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::MalformedRequest("missing \"protocol\"".to_string()))?;

        let codec = self.require(name)?;
        let symbols = codec.encode_fields(fields)?;
        Ok(Self::frame(codec, &symbols))
    }

    fn frame(codec: &dyn Codec, symbols: &Symbols) -> EncodedFrame {
        let pulses = codec.encode_pulses(symbols);
        debug!("Encoded {} symbols into {} pulses for {}", symbols.len(), pulses.len(), codec.name());
        EncodedFrame {
            protocol: codec.name(),
            repeats: codec.params().tx_repeats,
            footer: codec.params().footer,
            pulses,
        }
    }
}
