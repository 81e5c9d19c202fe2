//! # Decoded Event Module
//!
//! Events produced by the codecs and the sinks that consume them.
//!
//! This module handles:
//! - The [`DecodedEvent`] value (protocol, identifier path, command, fields)
//! - Topic naming for the messaging layer
//! - Logging events and unmatched raw frames as JSON Lines

use std::io::Write;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::codec::Fields;

/// One decoded protocol event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedEvent {
    /// Codec name
    pub protocol: &'static str,
    /// Identifier path, e.g. `B/2/3` or `12345`
    pub path: String,
    /// Command or value, e.g. `on`, `press`, `A`
    pub command: String,
    /// Structured fields in the same shape an encode request accepts
    pub fields: Fields,
}

impl DecodedEvent {
    pub fn new(protocol: &'static str, path: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            protocol,
            path: path.into(),
            command: command.into(),
            fields: Fields::new(),
        }
    }

    /// Add a structured field
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Topic the command is published on: `<base>/<protocol>/<path>`
    pub fn topic(&self, base: &str) -> String {
        format!("{}/{}/{}", base, self.protocol, self.path)
    }

    /// Topic for the JSON document of every received event
    pub fn received_topic(base: &str) -> String {
        format!("{}/received", base)
    }

    /// Request path that would transmit this event again
    pub fn send_path(&self) -> String {
        let mut path = format!("send/{}/{}", self.protocol, self.path);
        if !self.command.is_empty() {
            path.push('/');
            path.push_str(&self.command);
        }
        path
    }

    /// Fields plus the protocol name, suitable for `encode_by_fields`
    pub fn document(&self) -> Value {
        let mut doc = self.fields.clone();
        doc.insert("protocol".to_string(), Value::from(self.protocol));
        Value::Object(doc)
    }
}

/// Consumer of decoder output
#[cfg_attr(test, mockall::automock)]
pub trait EventSink {
    /// A codec decoded a frame and the debounce rule let it through
    fn publish(&mut self, event: &DecodedEvent);

    /// No codec matched a received frame
    fn unmatched(&mut self, pulses: &[u8]);
}

/// Sink that only emits tracing records
#[derive(Debug, Clone)]
pub struct TracingSink {
    base_topic: String,
}

impl TracingSink {
    pub fn new(base_topic: impl Into<String>) -> Self {
        Self {
            base_topic: base_topic.into(),
        }
    }
}

impl EventSink for TracingSink {
    fn publish(&mut self, event: &DecodedEvent) {
        info!(
            "Received protocol {}: {} {}",
            event.protocol,
            event.topic(&self.base_topic),
            event.command
        );
        debug!("Replay with {}", event.send_path());
    }

    fn unmatched(&mut self, pulses: &[u8]) {
        info!("RAW: {:?}", pulses);
    }
}

/// Both sinks receive every record
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn publish(&mut self, event: &DecodedEvent) {
        self.0.publish(event);
        self.1.publish(event);
    }

    fn unmatched(&mut self, pulses: &[u8]) {
        self.0.unmatched(pulses);
        self.1.unmatched(pulses);
    }
}

/// Sink that writes one JSON object per line
///
/// Decoded events carry the topic, payload and JSON document; unmatched
/// frames carry the raw pulse list.
pub struct JsonlEventLog<W: Write> {
    writer: W,
    base_topic: String,
    records: u64,
}

impl<W: Write> std::fmt::Debug for JsonlEventLog<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlEventLog")
            .field("base_topic", &self.base_topic)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl<W: Write> JsonlEventLog<W> {
    pub fn new(writer: W, base_topic: impl Into<String>) -> Self {
        Self {
            writer,
            base_topic: base_topic.into(),
            records: 0,
        }
    }

    /// Number of lines written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &Value) {
        let result = serde_json::to_writer(&mut self.writer, record)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush());

        match result {
            Ok(()) => self.records += 1,
            Err(e) => warn!("Failed to write event log record: {}", e),
        }
    }
}

impl<W: Write> EventSink for JsonlEventLog<W> {
    fn publish(&mut self, event: &DecodedEvent) {
        let record = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "kind": "decoded",
            "topic": event.topic(&self.base_topic),
            "payload": event.command,
            "received_topic": DecodedEvent::received_topic(&self.base_topic),
            "document": event.document(),
        });
        self.write_record(&record);
    }

    fn unmatched(&mut self, pulses: &[u8]) {
        let record = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "kind": "raw",
            "pulses": pulses,
        });
        self.write_record(&record);
    }
}
