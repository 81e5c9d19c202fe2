//! # Application Module
//!
//! Ties one codec registry and one pulse transceiver to a radio for a
//! single operating mode.
//!
//! Modes are exclusive: every [`RcApplication`] builds its own registry, and
//! switching mode means dropping the application (even mid-transmission) and
//! building a new one.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::Deserialize;
use tracing::info;

use crate::codec::ev1527::{Emylo, Ev1527};
use crate::codec::fs20::Fs20;
use crate::codec::intertechno::Intertechno;
use crate::codec::pilota::Pilota;
use crate::codec::registry::CodecRegistry;
use crate::codec::tristate::ItTristate;
use crate::codec::Fields;
use crate::error::{GatewayError, Result};
use crate::event::EventSink;
use crate::radio::{Radio, RadioSettings, DEFAULT_TX_POWER_DBM};
use crate::request::Request;
use crate::transceiver::PulseTransceiver;

/// Operating mode of the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// 433.92 MHz remote controls
    Rc433,
    /// 868.35 MHz FS20
    Fs20,
}

impl Mode {
    pub fn frequency_hz(&self) -> u32 {
        match self {
            Mode::Rc433 => 433_920_000,
            Mode::Fs20 => 868_350_000,
        }
    }

    /// Radio settings of the mode before any configured override
    pub fn default_settings(&self) -> RadioSettings {
        RadioSettings {
            frequency_hz: self.frequency_hz(),
            tx_power_dbm: DEFAULT_TX_POWER_DBM,
        }
    }

    /// Fresh registry holding the codecs of this mode
    pub fn registry(&self) -> CodecRegistry {
        let mut registry = CodecRegistry::new();
        match self {
            Mode::Rc433 => {
                registry.register(Box::new(ItTristate::new()));
                registry.register(Box::new(Intertechno::new()));
                registry.register(Box::new(Pilota::new()));
                registry.register(Box::new(Ev1527::new()));
                registry.register(Box::new(Emylo::new()));
            }
            Mode::Fs20 => {
                registry.register(Box::new(Fs20::new()));
            }
        }
        registry
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Rc433 => write!(f, "rc433"),
            Mode::Fs20 => write!(f, "fs20"),
        }
    }
}

impl FromStr for Mode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rc433" => Ok(Mode::Rc433),
            "fs20" => Ok(Mode::Fs20),
            other => Err(GatewayError::invalid("mode", format!("expected rc433|fs20, got '{}'", other))),
        }
    }
}

/// Remote-control gateway for one mode
#[derive(Debug)]
pub struct RcApplication<R: Radio> {
    mode: Mode,
    registry: CodecRegistry,
    transceiver: PulseTransceiver<R>,
}

impl<R: Radio> RcApplication<R> {
    pub fn new(mode: Mode, radio: R, settings: &RadioSettings) -> Self {
        let registry = mode.registry();
        info!("Starting {} application with codecs {:?}", mode, registry.names());

        Self {
            mode,
            registry,
            transceiver: PulseTransceiver::new(radio, settings),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn radio(&self) -> &R {
        self.transceiver.radio()
    }

    pub fn is_transmitting(&self) -> bool {
        self.transceiver.is_transmitting()
    }

    /// One scheduler tick
    pub fn poll(&mut self, sink: &mut dyn EventSink) {
        self.poll_at(Instant::now(), sink);
    }

    /// One scheduler tick at a given time, used for debouncing
    pub fn poll_at(&mut self, now: Instant, sink: &mut dyn EventSink) {
        self.transceiver.poll(&mut self.registry, sink, now);
    }

    /// Encode `<protocol>/<path...>` with a payload and start sending it
    pub fn send_path(&mut self, path: &str, payload: &str) -> Result<()> {
        let frame = self.registry.encode_by_path(path, payload)?;
        self.transceiver.transmit(frame);
        Ok(())
    }

    /// Encode a structured request and start sending it
    pub fn send_fields(&mut self, fields: &Fields) -> Result<()> {
        let frame = self.registry.encode_by_fields(fields)?;
        self.transceiver.transmit(frame);
        Ok(())
    }

    /// Encode a parsed request and start sending it
    ///
    /// # Errors
    ///
    /// Returns the encoding error; nothing is transmitted in that case
    pub fn handle(&mut self, request: Request) -> Result<()> {
        match &request {
            Request::Path { path, payload } => self.send_path(path, payload),
            Request::Fields(fields) => self.send_fields(fields),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MockEventSink;
    use crate::radio::LoopbackRadio;
    use serde_json::json;

    /// Poll until the loopback radio has nothing left to deliver
    fn run_until_idle(app: &mut RcApplication<LoopbackRadio>, sink: &mut MockEventSink) {
        let now = Instant::now();
        for _ in 0..10_000 {
            app.poll_at(now, sink);
            if !app.is_transmitting() && app.radio().air_len() == 0 {
                return;
            }
        }
        panic!("loopback did not settle");
    }

    fn rc433() -> RcApplication<LoopbackRadio> {
        RcApplication::new(Mode::Rc433, LoopbackRadio::new(), &Mode::Rc433.default_settings())
    }

    #[test]
    fn test_mode_registries() {
        assert_eq!(
            Mode::Rc433.registry().names(),
            vec!["ittristate", "intertechno", "pilota", "EV1527", "emylo"]
        );
        assert_eq!(Mode::Fs20.registry().names(), vec!["FS20"]);
    }

    #[test]
    fn test_mode_frequencies() {
        let app = RcApplication::new(Mode::Fs20, LoopbackRadio::new(), &Mode::Fs20.default_settings());
        assert_eq!(app.radio().frequency_hz(), 868_350_000);
        assert_eq!(app.radio().bitrate(), 20_000);
        assert!(app.radio().is_receiving());
    }

    #[test]
    fn test_mode_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: Mode,
        }
        let wrapper: Wrapper = toml::from_str("mode = \"fs20\"").unwrap();
        assert_eq!(wrapper.mode, Mode::Fs20);
        assert_eq!(wrapper.mode.to_string(), "fs20");
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("FS20".parse::<Mode>().unwrap(), Mode::Fs20);
        assert_eq!(" rc433 ".parse::<Mode>().unwrap(), Mode::Rc433);
        assert!("x10".parse::<Mode>().is_err());
    }

    #[test]
    fn test_intertechno_loopback() {
        let mut app = rc433();
        app.send_path("intertechno/4242/3", "on").unwrap();
        assert!(app.is_transmitting());

        let mut sink = MockEventSink::new();
        sink.expect_publish()
            .withf(|e| e.protocol == "intertechno" && e.path == "4242/3" && e.command == "on")
            .times(1)
            .return_const(());
        sink.expect_unmatched().never();

        run_until_idle(&mut app, &mut sink);
        assert!(app.radio().is_receiving());
    }

    #[test]
    fn test_tristate_request_loopback() {
        let mut app = rc433();
        app.handle(Request::from_url("/send/ittristate/B/2/3/on").unwrap()).unwrap();

        let mut sink = MockEventSink::new();
        sink.expect_publish()
            .withf(|e| e.protocol == "ittristate" && e.path == "B/2/3" && e.command == "on")
            .times(1)
            .return_const(());
        // F and 0 tristate symbols are also valid EV1527 bit pairs
        sink.expect_publish()
            .withf(|e| e.protocol == "EV1527")
            .times(1)
            .return_const(());
        sink.expect_unmatched().never();

        run_until_idle(&mut app, &mut sink);
    }

    #[test]
    fn test_emylo_fields_loopback() {
        let mut app = rc433();
        let fields = json!({"protocol": "emylo", "id": 4711, "key": "D"});
        app.send_fields(fields.as_object().unwrap()).unwrap();

        let mut sink = MockEventSink::new();
        sink.expect_publish()
            .withf(|e| e.protocol == "emylo" && e.path == "4711" && e.command == "D")
            .times(1)
            .return_const(());
        sink.expect_publish()
            .withf(|e| e.protocol == "EV1527" && e.path == "4711/1")
            .times(1)
            .return_const(());

        run_until_idle(&mut app, &mut sink);
    }

    #[test]
    fn test_fs20_loopback() {
        let mut app = RcApplication::new(Mode::Fs20, LoopbackRadio::new(), &Mode::Fs20.default_settings());
        app.send_path("FS20/1A2B/3C", "toggle").unwrap();

        let mut sink = MockEventSink::new();
        sink.expect_publish()
            .withf(|e| e.protocol == "FS20" && e.path == "1A2B/3C" && e.command == "toggle")
            .times(1)
            .return_const(());
        sink.expect_unmatched().never();

        run_until_idle(&mut app, &mut sink);
    }

    #[test]
    fn test_modes_are_exclusive() {
        let mut app = RcApplication::new(Mode::Fs20, LoopbackRadio::new(), &Mode::Fs20.default_settings());
        assert!(matches!(
            app.send_path("ittristate/A/1/1", "on"),
            Err(GatewayError::UnknownProtocol(_))
        ));
        assert!(!app.is_transmitting());
    }

    #[test]
    fn test_rejected_request_does_not_transmit() {
        let mut app = rc433();
        assert!(app.handle(Request::from_url("/send/pilota/1/9/1/on").unwrap()).is_err());
        assert!(!app.is_transmitting());
    }
}
