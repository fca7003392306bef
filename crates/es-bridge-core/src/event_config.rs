//! Which event kinds are stored, and how each is normalized

use crate::error::{BridgeError, Result};
use crate::event::EventKind;
use crate::normalize::{
    DynambNormalizer, Normalizer, RaddecNormalizer, RaddecOptions, SpatemNormalizer,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Normalization options for one event kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOptions {
    Raddec(RaddecOptions),
    Dynamb,
    Spatem,
}

impl EventOptions {
    /// Default options for `kind`
    pub fn default_for(kind: EventKind) -> Self {
        match kind {
            EventKind::Raddec => Self::Raddec(RaddecOptions::default()),
            EventKind::Dynamb => Self::Dynamb,
            EventKind::Spatem => Self::Spatem,
        }
    }

    /// Parse the options object supplied for `kind`.
    ///
    /// `null` and `{}` both mean defaults.
    pub fn from_value(kind: EventKind, value: &Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default_for(kind));
        }
        if !value.is_object() {
            return Err(BridgeError::config(format!(
                "options for '{}' must be an object",
                kind
            )));
        }

        match kind {
            EventKind::Raddec => serde_json::from_value(value.clone())
                .map(Self::Raddec)
                .map_err(|e| {
                    BridgeError::config(format!("invalid options for '{}': {}", kind, e))
                }),
            EventKind::Dynamb => Ok(Self::Dynamb),
            EventKind::Spatem => Ok(Self::Spatem),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Raddec(_) => EventKind::Raddec,
            Self::Dynamb => EventKind::Dynamb,
            Self::Spatem => EventKind::Spatem,
        }
    }

    /// Build the normalizer these options describe
    pub fn normalizer(&self) -> Box<dyn Normalizer> {
        match self {
            Self::Raddec(options) => Box::new(RaddecNormalizer::new(options.clone())),
            Self::Dynamb => Box::new(DynambNormalizer),
            Self::Spatem => Box::new(SpatemNormalizer),
        }
    }
}

/// The set of stored event kinds with their options.
///
/// Fixed once handed to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventConfig {
    events: BTreeMap<EventKind, EventOptions>,
}

impl EventConfig {
    /// Store nothing
    pub fn empty() -> Self {
        Self {
            events: BTreeMap::new(),
        }
    }

    /// Builder: store an event kind with the given options
    pub fn with(mut self, options: EventOptions) -> Self {
        self.events.insert(options.kind(), options);
        self
    }

    /// Builder: store an event kind with default options
    pub fn with_kind(self, kind: EventKind) -> Self {
        self.with(EventOptions::default_for(kind))
    }

    /// Build from a caller-supplied `kind name -> options` map.
    ///
    /// Names outside the supported set are dropped.
    pub fn from_requested<'a>(
        requested: impl IntoIterator<Item = (&'a String, &'a Value)>,
    ) -> Result<Self> {
        let mut config = Self::empty();
        for (name, value) in requested {
            match name.parse::<EventKind>() {
                Ok(kind) => {
                    config = config.with(EventOptions::from_value(kind, value)?);
                }
                Err(e) => {
                    debug!(error = %e, "Ignoring unsupported event kind");
                }
            }
        }
        Ok(config)
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.events.contains_key(&kind)
    }

    pub fn options(&self, kind: EventKind) -> Option<&EventOptions> {
        self.events.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.events.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventOptions> {
        self.events.values()
    }
}

impl Default for EventConfig {
    /// Radio decodings and dynamic ambient readings
    fn default() -> Self {
        Self::empty()
            .with_kind(EventKind::Raddec)
            .with_kind(EventKind::Dynamb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requested(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = EventConfig::default();
        assert!(config.contains(EventKind::Raddec));
        assert!(config.contains(EventKind::Dynamb));
        assert!(!config.contains(EventKind::Spatem));
        assert_eq!(
            config.options(EventKind::Raddec),
            Some(&EventOptions::Raddec(RaddecOptions::default()))
        );
    }

    #[test]
    fn test_unknown_kinds_are_dropped() {
        let map = requested(json!({
            "spatem": {},
            "futurekind": { "anything": true },
            "raddec": null
        }));
        let config = EventConfig::from_requested(&map).unwrap();

        assert_eq!(
            config.kinds().collect::<Vec<_>>(),
            vec![EventKind::Raddec, EventKind::Spatem]
        );
    }

    #[test]
    fn test_raddec_options() {
        let map = requested(json!({ "raddec": { "includePackets": true } }));
        let config = EventConfig::from_requested(&map).unwrap();
        assert_eq!(
            config.options(EventKind::Raddec),
            Some(&EventOptions::Raddec(RaddecOptions {
                include_packets: true
            }))
        );

        let bad = requested(json!({ "raddec": { "includePackets": "yes" } }));
        assert!(EventConfig::from_requested(&bad).is_err());

        let not_object = requested(json!({ "dynamb": 7 }));
        assert!(EventConfig::from_requested(&not_object).is_err());
    }

    #[test]
    fn test_normalizer_matches_kind() {
        for kind in EventKind::ALL {
            assert_eq!(EventOptions::default_for(kind).normalizer().kind(), kind);
        }
    }
}
