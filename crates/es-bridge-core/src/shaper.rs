//! Backend shaping
//!
//! Elasticsearch client generations disagree on two things: the field the
//! event time lives in and the parameter that carries the document.
//!
//! | Generation | Timestamp field | Envelope key | Kinds                  |
//! |------------|-----------------|--------------|------------------------|
//! | V7         | `timestamp`     | `body`       | raddec, dynamb         |
//! | V8         | `@timestamp`    | `document`   | raddec, dynamb, spatem |

use crate::error::BridgeError;
use crate::event::EventKind;
use crate::normalize::NormalizedDocument;
use serde::de::{self, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Elasticsearch API generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiGeneration {
    /// 7.x clients
    V7,
    /// 8.x clients
    #[default]
    V8,
}

impl fmt::Display for ApiGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V7 => f.write_str("v7"),
            Self::V8 => f.write_str("v8"),
        }
    }
}

impl FromStr for ApiGeneration {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "7" | "v7" => Ok(Self::V7),
            "8" | "v8" => Ok(Self::V8),
            other => Err(BridgeError::config(format!(
                "unsupported API generation '{}'",
                other
            ))),
        }
    }
}

/// Accepts the same values as `FromStr`, as a string or a bare major version
impl<'de> Deserialize<'de> for ApiGeneration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GenerationVisitor;

        impl Visitor<'_> for GenerationVisitor {
            type Value = ApiGeneration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an API generation: 7, 8, \"v7\" or \"v8\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ApiGeneration, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ApiGeneration, E> {
                self.visit_str(&v.to_string())
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ApiGeneration, E> {
                self.visit_str(&v.to_string())
            }
        }

        deserializer.deserialize_any(GenerationVisitor)
    }
}

/// Parameter the document is passed under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKey {
    Body,
    Document,
}

impl EnvelopeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Document => "document",
        }
    }
}

/// How documents are shaped for one API generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendProfile {
    pub generation: ApiGeneration,
    pub timestamp_field: &'static str,
    pub envelope_key: EnvelopeKey,
}

impl BackendProfile {
    pub fn for_generation(generation: ApiGeneration) -> Self {
        match generation {
            ApiGeneration::V7 => Self {
                generation,
                timestamp_field: "timestamp",
                envelope_key: EnvelopeKey::Body,
            },
            ApiGeneration::V8 => Self {
                generation,
                timestamp_field: "@timestamp",
                envelope_key: EnvelopeKey::Document,
            },
        }
    }

    /// Whether documents of `kind` can be stored with this generation
    pub fn supports(&self, kind: EventKind) -> bool {
        match self.generation {
            ApiGeneration::V7 => matches!(kind, EventKind::Raddec | EventKind::Dynamb),
            ApiGeneration::V8 => true,
        }
    }
}

impl From<ApiGeneration> for BackendProfile {
    fn from(generation: ApiGeneration) -> Self {
        Self::for_generation(generation)
    }
}

/// A single-document index request
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedRequest {
    /// Target index
    pub index: String,

    /// Document id; `None` lets the store assign one
    pub id: Option<String>,

    /// Parameter name carrying the document
    pub envelope_key: EnvelopeKey,

    /// Document including its timestamp field
    pub document: Map<String, Value>,
}

impl ShapedRequest {
    /// Request parameters as JSON, e.g. `{"index": .., "id": .., "document": {..}}`
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for ShapedRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.id.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("index", &self.index)?;
        if let Some(ref id) = self.id {
            map.serialize_entry("id", id)?;
        }
        map.serialize_entry(self.envelope_key.as_str(), &self.document)?;
        map.end()
    }
}

/// Attach the timestamp and wrap `document` for `profile`
pub fn shape(
    index: impl Into<String>,
    document: NormalizedDocument,
    profile: &BackendProfile,
) -> ShapedRequest {
    let NormalizedDocument {
        mut fields,
        timestamp,
        id,
    } = document;
    fields.insert(profile.timestamp_field.to_string(), Value::String(timestamp));

    ShapedRequest {
        index: index.into(),
        id,
        envelope_key: profile.envelope_key,
        document: fields,
    }
}
