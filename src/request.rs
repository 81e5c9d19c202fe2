//! # Request Module
//!
//! Turns the outer request surfaces (URL paths, messaging topics, JSON
//! bodies, console lines) into encode requests for the codec registry.

use serde_json::Value;

use crate::codec::Fields;
use crate::error::{GatewayError, Result};

/// URL prefix of send requests
pub const SEND_PREFIX: &str = "send/";

/// Topic suffix of path-style send requests
pub const SET_SUFFIX: &str = "/set";

/// One encode request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// `<protocol>/<path...>` plus payload
    Path { path: String, payload: String },
    /// JSON object with a `protocol` member
    Fields(Fields),
}

impl Request {
    /// Parse `/send/<protocol>/<path...>/<payload>`
    ///
    /// The last segment is the payload and is removed from the path.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim().split('?').next().unwrap_or_default();
        let rest = url
            .trim_start_matches('/')
            .strip_prefix(SEND_PREFIX)
            .ok_or_else(|| GatewayError::MalformedRequest(format!("'{}' is not a send URL", url)))?
            .trim_end_matches('/');

        match rest.rsplit_once('/') {
            Some((path, payload)) if !path.is_empty() && !payload.is_empty() => Ok(Self::Path {
                path: path.to_string(),
                payload: payload.to_string(),
            }),
            _ => Err(GatewayError::MalformedRequest(format!(
                "'{}' needs a protocol and a payload",
                url
            ))),
        }
    }

    /// Parse a message published on `<base>/<protocol>/<path...>/set` or
    /// `<base>/send`
    ///
    /// # Errors
    ///
    /// Topics outside `<base>/` are rejected as malformed
    pub fn from_topic(base: &str, topic: &str, payload: &str) -> Result<Self> {
        let relative = topic
            .strip_prefix(base)
            .and_then(|t| t.strip_prefix('/'))
            .ok_or_else(|| GatewayError::MalformedRequest(format!("topic '{}' is outside '{}'", topic, base)))?;

        if relative == "send" {
            return Self::from_json(payload);
        }

        match relative.strip_suffix(SET_SUFFIX) {
            Some(path) if !path.is_empty() => Ok(Self::Path {
                path: path.to_string(),
                payload: payload.trim().to_string(),
            }),
            _ => Err(GatewayError::MalformedRequest(format!(
                "topic '{}' is neither <protocol>/.../set nor send",
                topic
            ))),
        }
    }

    /// Parse a JSON object body
    pub fn from_json(body: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(body)? {
            Value::Object(fields) => Ok(Self::Fields(fields)),
            _ => Err(GatewayError::MalformedRequest("expected a JSON object".to_string())),
        }
    }

    /// Parse one console line
    ///
    /// Accepts a JSON object, a send URL, or `<topic> <payload>`.
    pub fn from_line(base: &str, line: &str) -> Result<Self> {
        let line = line.trim();
        if line.starts_with('{') {
            return Self::from_json(line);
        }
        if line.trim_start_matches('/').starts_with(SEND_PREFIX) {
            return Self::from_url(line);
        }

        let (topic, payload) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        Self::from_topic(base, topic, payload)
    }

    /// Protocol named by the request, if any
    pub fn protocol(&self) -> Option<&str> {
        match self {
            Self::Path { path, .. } => path.split('/').next().filter(|p| !p.is_empty()),
            Self::Fields(fields) => fields.get("protocol").and_then(Value::as_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(path: &str, payload: &str) -> Request {
        Request::Path {
            path: path.to_string(),
            payload: payload.to_string(),
        }
    }

    #[test]
    fn test_from_url() {
        let request = Request::from_url("/send/ittristate/B/2/3/on").unwrap();
        assert_eq!(request, path("ittristate/B/2/3", "on"));
        assert_eq!(request.protocol(), Some("ittristate"));
    }

    #[test]
    fn test_from_url_ignores_query_and_trailing_slash() {
        assert_eq!(
            Request::from_url("/send/emylo/4711/A/?x=1").unwrap(),
            path("emylo/4711", "A")
        );
    }

    #[test]
    fn test_from_url_errors() {
        assert!(Request::from_url("/status").is_err());
        assert!(Request::from_url("/send/").is_err());
        assert!(Request::from_url("/send/on").is_err());
    }

    #[test]
    fn test_from_topic_set() {
        let request = Request::from_topic("rfgw", "rfgw/intertechno/4242/3/set", " off ").unwrap();
        assert_eq!(request, path("intertechno/4242/3", "off"));
    }

    #[test]
    fn test_from_topic_send_json() {
        let request = Request::from_topic("rfgw", "rfgw/send", r#"{"protocol":"EV1527","id":1,"data":2}"#).unwrap();
        match request {
            Request::Fields(fields) => {
                assert_eq!(fields["protocol"], "EV1527");
                assert_eq!(fields["data"], 2);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_from_topic_errors() {
        assert!(Request::from_topic("rfgw", "rfgw/ittristate/A/1/1", "on").is_err());
        assert!(Request::from_topic("rfgw", "rfgw/set", "on").is_err());
        assert!(matches!(
            Request::from_topic("rfgw", "rfgw/send", "not json"),
            Err(GatewayError::Json(_))
        ));
    }

    #[test]
    fn test_from_topic_outside_base() {
        assert!(matches!(
            Request::from_topic("rfgw", "other/intertechno/4242/3/set", "on"),
            Err(GatewayError::MalformedRequest(_))
        ));
        assert!(Request::from_topic("rfgw", "intertechno/4242/3/set", "on").is_err());
        assert!(Request::from_topic("rfgw", "rfgwx/intertechno/4242/3/set", "on").is_err());
        assert!(Request::from_line("rfgw", "other/send {\"protocol\":\"pilota\"}").is_err());
    }

    #[test]
    fn test_from_json_requires_object() {
        assert!(matches!(
            Request::from_json("[1, 2]"),
            Err(GatewayError::MalformedRequest(_))
        ));
        let request = Request::from_json(r#"{"protocol": "pilota"}"#).unwrap();
        assert_eq!(request.protocol(), Some("pilota"));
    }

    #[test]
    fn test_from_line() {
        assert_eq!(
            Request::from_line("rfgw", "send/FS20/1A2B/3C/toggle").unwrap(),
            path("FS20/1A2B/3C", "toggle")
        );
        assert_eq!(
            Request::from_line("rfgw", "rfgw/pilota/5/1/1/set on").unwrap(),
            path("pilota/5/1/1", "on")
        );
        assert_eq!(
            Request::from_line("rfgw", r#"{"protocol": "emylo", "id": 1, "key": "B"}"#).unwrap(),
            Request::Fields(
                json!({"protocol": "emylo", "id": 1, "key": "B"})
                    .as_object()
                    .cloned()
                    .unwrap()
            )
        );
        assert!(Request::from_line("rfgw", "hello").is_err());
    }
}
