//! Event types for the ES event bridge
//!
//! Events arrive from the upstream bus as a kind name plus an untyped JSON
//! payload. Only the closed set of [`EventKind`]s is ever persisted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of telemetry event the bridge knows how to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Radio decoding: a transmitter as heard by one or more receivers
    Raddec,
    /// Dynamic ambient: sensor readings reported by a device
    Dynamb,
    /// Spatial-temporal: a device position as a GeoJSON feature collection
    Spatem,
}

impl EventKind {
    /// All supported kinds
    pub const ALL: [EventKind; 3] = [Self::Raddec, Self::Dynamb, Self::Spatem];

    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raddec => "raddec",
            Self::Dynamb => "dynamb",
            Self::Spatem => "spatem",
        }
    }

    /// Index every event of this kind is written to
    pub fn index(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a kind name is outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raddec" => Ok(Self::Raddec),
            "dynamb" => Ok(Self::Dynamb),
            "spatem" => Ok(Self::Spatem),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// An event as emitted by the upstream bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, e.g. "raddec"
    pub kind: String,

    /// Kind-specific payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Parse a single NDJSON line
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
        assert_eq!(
            "raddec2".parse::<EventKind>(),
            Err(UnknownKind("raddec2".to_string()))
        );
        assert!("Raddec".parse::<EventKind>().is_err());

        let err = "tiraid".parse::<EventKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown event kind 'tiraid'");
    }

    #[test]
    fn test_event_from_line() {
        let event =
            Event::from_json_line(r#"{"kind":"dynamb","payload":{"deviceId":"abc"}}"#).unwrap();
        assert_eq!(event.kind, "dynamb");
        assert_eq!(event.payload["deviceId"], "abc");

        let bare = Event::from_json_line(r#"{"kind":"spatem"}"#).unwrap();
        assert!(bare.payload.is_null());
    }
}
