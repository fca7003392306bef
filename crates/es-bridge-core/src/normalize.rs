//! Event normalizers
//!
//! One [`Normalizer`] per [`EventKind`], each turning a raw payload into a
//! flat [`NormalizedDocument`] with an ISO-8601 timestamp and a deterministic
//! identifier. Anything that cannot be persisted is reported as a
//! [`SkipReason`], never as an error.
//!
//! ```text
//! payload ──► Normalizer ──┬──► Document { fields, timestamp, id }
//!                          └──► Skip(reason)
//! ```

use crate::event::EventKind;
use crate::geo;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Payload key holding the event time
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Separator between device id and id type in a device signature
pub const SIGNATURE_SEPARATOR: char = '/';

/// Why an event produced nothing to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The event kind is not in the configured set
    UnconfiguredKind,
    /// The backend generation cannot store this kind
    UnsupportedByBackend,
    /// Payload is not an object, or a nested structure has the wrong shape
    MalformedPayload,
    /// A field required for the document or its identifier is absent
    MissingField(&'static str),
    /// The timestamp could not be converted to ISO-8601
    InvalidTimestamp,
    /// No feature qualifies as the device position
    NoDevicePosition,
}

impl SkipReason {
    /// Metric label
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::UnconfiguredKind => "unconfigured_kind",
            Self::UnsupportedByBackend => "unsupported_by_backend",
            Self::MalformedPayload => "malformed_payload",
            Self::MissingField(_) => "missing_field",
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::NoDevicePosition => "no_device_position",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing field '{}'", field),
            other => f.write_str(other.as_label()),
        }
    }
}

/// A flat document ready for backend shaping
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    /// Document fields, without the timestamp
    pub fields: Map<String, Value>,

    /// Event time as ISO-8601 UTC with millisecond precision
    pub timestamp: String,

    /// Deterministic identifier, or `None` to let the store assign one
    pub id: Option<String>,
}

/// Outcome of normalizing one payload
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Document(NormalizedDocument),
    Skip(SkipReason),
}

impl Normalized {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip(_))
    }
}

impl From<std::result::Result<NormalizedDocument, SkipReason>> for Normalized {
    fn from(result: std::result::Result<NormalizedDocument, SkipReason>) -> Self {
        match result {
            Ok(doc) => Self::Document(doc),
            Err(reason) => Self::Skip(reason),
        }
    }
}

type Normalization = std::result::Result<NormalizedDocument, SkipReason>;

/// Converts payloads of a single event kind
pub trait Normalizer: Send + Sync {
    /// Kind this normalizer handles
    fn kind(&self) -> EventKind;

    /// Normalize one payload
    fn normalize(&self, payload: &Value) -> Normalized;
}

/// Convert a payload timestamp to ISO-8601.
///
/// Accepts epoch milliseconds (JSON number or string of digits) and RFC 3339
/// strings. Returns `None` for anything else or for out-of-range values.
pub fn iso8601(value: &Value) -> Option<String> {
    let datetime = match value {
        Value::Number(n) => {
            let millis = match n.as_i64() {
                Some(ms) => ms,
                None => {
                    let ms = n.as_f64()?;
                    if !ms.is_finite() || ms.abs() >= i64::MAX as f64 {
                        return None;
                    }
                    ms.trunc() as i64
                }
            };
            DateTime::<Utc>::from_timestamp_millis(millis)?
        }
        Value::String(s) => match s.parse::<i64>() {
            Ok(millis) => DateTime::<Utc>::from_timestamp_millis(millis)?,
            Err(_) => DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc),
        },
        _ => return None,
    };

    Some(datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Render a scalar as an identifier component
fn id_component(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> std::result::Result<&'a Value, SkipReason> {
    object
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or(SkipReason::MissingField(field))
}

fn required_component(
    object: &Map<String, Value>,
    field: &'static str,
) -> std::result::Result<String, SkipReason> {
    required(object, field).and_then(|v| id_component(v).ok_or(SkipReason::MissingField(field)))
}

/// Build `{timestamp}-{a}-{b}` from the raw payload values
fn hyphenated_id(
    object: &Map<String, Value>,
    first: &'static str,
    second: &'static str,
) -> std::result::Result<String, SkipReason> {
    let timestamp = required_component(object, TIMESTAMP_KEY)?;
    let a = required_component(object, first)?;
    let b = required_component(object, second)?;
    Ok(format!("{}-{}-{}", timestamp, a, b))
}

/// Remove the timestamp from `fields` and convert it
fn take_timestamp(fields: &mut Map<String, Value>) -> std::result::Result<String, SkipReason> {
    let raw = fields
        .remove(TIMESTAMP_KEY)
        .filter(|v| !v.is_null())
        .ok_or(SkipReason::MissingField(TIMESTAMP_KEY))?;
    iso8601(&raw).ok_or(SkipReason::InvalidTimestamp)
}

fn as_object(payload: &Value) -> std::result::Result<&Map<String, Value>, SkipReason> {
    payload.as_object().ok_or(SkipReason::MalformedPayload)
}

// ============================================================================
// Raddec
// ============================================================================

/// Options for flattening radio decodings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaddecOptions {
    /// Keep the raw packet payloads in the document
    #[serde(default, alias = "includepackets", alias = "include_packets")]
    pub include_packets: bool,
}

/// Fields lifted from the strongest receiver of the rssi signature
const STRONGEST_RECEIVER_FIELDS: [&str; 5] = [
    "receiverId",
    "receiverIdType",
    "rssi",
    "numberOfDecodings",
    "receiverAntenna",
];

/// Flattens radio decodings into one record per transmitter
#[derive(Debug, Clone, Default)]
pub struct RaddecNormalizer {
    options: RaddecOptions,
}

impl RaddecNormalizer {
    pub fn new(options: RaddecOptions) -> Self {
        Self { options }
    }

    /// Flatten a raddec into a single-level map
    pub fn flatten(&self, raddec: &Map<String, Value>) -> Map<String, Value> {
        let mut flat: Map<String, Value> = raddec
            .iter()
            .filter(|(_, v)| !v.is_null() && !v.is_object() && !v.is_array())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        match raddec.get("rssiSignature").and_then(Value::as_array) {
            Some(signature) => {
                if let Some(strongest) = signature.first().and_then(Value::as_object) {
                    for field in STRONGEST_RECEIVER_FIELDS {
                        if let Some(value) = strongest.get(field) {
                            flat.insert(field.to_string(), value.clone());
                        }
                    }
                }
                flat.insert("numberOfReceivers".into(), signature.len().into());
            }
            None => {
                flat.entry("numberOfReceivers").or_insert_with(|| 0.into());
            }
        }

        match raddec.get("packets").and_then(Value::as_array) {
            Some(packets) => {
                flat.insert("numberOfPackets".into(), packets.len().into());
                if self.options.include_packets {
                    flat.insert("packets".into(), Value::Array(packets.clone()));
                }
            }
            None => {
                flat.entry("numberOfPackets").or_insert_with(|| 0.into());
            }
        }

        if let Some(events) = raddec.get("events").filter(|v| v.is_array()) {
            flat.insert("events".into(), events.clone());
        }

        flat
    }

    fn try_normalize(&self, payload: &Value) -> Normalization {
        let mut fields = self.flatten(as_object(payload)?);
        let id = hyphenated_id(&fields, "transmitterId", "transmitterIdType")?;
        let timestamp = take_timestamp(&mut fields)?;
        Ok(NormalizedDocument {
            fields,
            timestamp,
            id: Some(id),
        })
    }
}

impl Normalizer for RaddecNormalizer {
    fn kind(&self) -> EventKind {
        EventKind::Raddec
    }

    fn normalize(&self, payload: &Value) -> Normalized {
        self.try_normalize(payload).into()
    }
}

// ============================================================================
// Dynamb
// ============================================================================

/// Copies dynamic ambient readings as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct DynambNormalizer;

impl DynambNormalizer {
    fn try_normalize(&self, payload: &Value) -> Normalization {
        let mut fields = as_object(payload)?.clone();
        let id = hyphenated_id(&fields, "deviceId", "deviceIdType")?;
        let timestamp = take_timestamp(&mut fields)?;
        Ok(NormalizedDocument {
            fields,
            timestamp,
            id: Some(id),
        })
    }
}

impl Normalizer for DynambNormalizer {
    fn kind(&self) -> EventKind {
        EventKind::Dynamb
    }

    fn normalize(&self, payload: &Value) -> Normalized {
        self.try_normalize(payload).into()
    }
}

// ============================================================================
// Spatem
// ============================================================================

/// Reduces a spatial event to the device's 2D position
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatemNormalizer;

impl SpatemNormalizer {
    fn try_normalize(&self, payload: &Value) -> Normalization {
        let spatem = as_object(payload)?;
        let device_id = required_component(spatem, "deviceId")?;
        let device_id_type = required_component(spatem, "deviceIdType")?;

        let features = spatem
            .get("data")
            .and_then(|data| data.get("features"))
            .and_then(Value::as_array)
            .ok_or(SkipReason::MalformedPayload)?;
        let position = geo::device_position(features).ok_or(SkipReason::NoDevicePosition)?;

        let mut fields = Map::new();
        fields.insert("deviceId".into(), spatem["deviceId"].clone());
        fields.insert("deviceIdType".into(), spatem["deviceIdType"].clone());
        if let Some(kind) = spatem.get("type").filter(|v| !v.is_null()) {
            fields.insert("type".into(), kind.clone());
        }
        fields.insert(
            "text".into(),
            format!("{}{}{}", device_id, SIGNATURE_SEPARATOR, device_id_type).into(),
        );
        fields.insert("location".into(), position.to_geojson());

        let raw = required(spatem, TIMESTAMP_KEY)?;
        let timestamp = iso8601(raw).ok_or(SkipReason::InvalidTimestamp)?;

        Ok(NormalizedDocument {
            fields,
            timestamp,
            id: None,
        })
    }
}

impl Normalizer for SpatemNormalizer {
    fn kind(&self) -> EventKind {
        EventKind::Spatem
    }

    fn normalize(&self, payload: &Value) -> Normalized {
        self.try_normalize(payload).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(normalized: Normalized) -> NormalizedDocument {
        match normalized {
            Normalized::Document(doc) => doc,
            Normalized::Skip(reason) => panic!("unexpected skip: {}", reason),
        }
    }

    fn raddec() -> Value {
        json!({
            "transmitterId": "fee150bada55",
            "transmitterIdType": 2,
            "rssiSignature": [
                { "receiverId": "001bc50940810000", "receiverIdType": 1,
                  "rssi": -62, "numberOfDecodings": 3, "receiverAntenna": 1 },
                { "receiverId": "001bc50940810001", "receiverIdType": 1,
                  "rssi": -81, "numberOfDecodings": 1 }
            ],
            "packets": ["061bfee150bada55020106", "061bfee150bada55020107"],
            "events": [0],
            "timestamp": 1554000000000u64
        })
    }

    #[test]
    fn test_iso8601_conversion() {
        assert_eq!(
            iso8601(&json!(1554000000000u64)).as_deref(),
            Some("2019-03-31T02:40:00.000Z")
        );
        assert_eq!(iso8601(&json!(0)).as_deref(), Some("1970-01-01T00:00:00.000Z"));
        assert_eq!(
            iso8601(&json!(1554000000123.9)).as_deref(),
            Some("2019-03-31T02:40:00.123Z")
        );
        assert_eq!(
            iso8601(&json!("1554000000000")).as_deref(),
            Some("2019-03-31T02:40:00.000Z")
        );
        assert_eq!(
            iso8601(&json!("2019-03-31T04:40:00+02:00")).as_deref(),
            Some("2019-03-31T02:40:00.000Z")
        );
        assert_eq!(iso8601(&json!("yesterday")), None);
        assert_eq!(iso8601(&json!(true)), None);
        assert_eq!(iso8601(&json!({"ms": 1})), None);
        assert_eq!(iso8601(&json!(1e300)), None);
    }

    #[test]
    fn test_raddec_flattening() {
        let doc = document(RaddecNormalizer::default().normalize(&raddec()));

        assert_eq!(doc.id.as_deref(), Some("1554000000000-fee150bada55-2"));
        assert_eq!(doc.timestamp, "2019-03-31T02:40:00.000Z");
        assert!(!doc.fields.contains_key(TIMESTAMP_KEY));
        assert!(!doc.fields.contains_key("rssiSignature"));
        assert!(!doc.fields.contains_key("packets"));
        assert_eq!(doc.fields["receiverId"], "001bc50940810000");
        assert_eq!(doc.fields["rssi"], -62);
        assert_eq!(doc.fields["receiverAntenna"], 1);
        assert_eq!(doc.fields["numberOfReceivers"], 2);
        assert_eq!(doc.fields["numberOfPackets"], 2);
        assert_eq!(doc.fields["events"], json!([0]));
    }

    #[test]
    fn test_raddec_include_packets() {
        let normalizer = RaddecNormalizer::new(RaddecOptions {
            include_packets: true,
        });
        let doc = document(normalizer.normalize(&raddec()));
        assert_eq!(doc.fields["packets"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_raddec_without_timestamp_is_skipped() {
        let mut payload = raddec();
        payload.as_object_mut().unwrap().remove("timestamp");
        assert_eq!(
            RaddecNormalizer::default().normalize(&payload),
            Normalized::Skip(SkipReason::MissingField("timestamp"))
        );

        payload["timestamp"] = json!({"nested": 1554000000000u64});
        assert!(RaddecNormalizer::default().normalize(&payload).is_skip());
    }

    #[test]
    fn test_raddec_is_deterministic() {
        let normalizer = RaddecNormalizer::default();
        assert_eq!(normalizer.normalize(&raddec()), normalizer.normalize(&raddec()));
    }

    #[test]
    fn test_raddec_without_signature() {
        let payload = json!({
            "transmitterId": "abc", "transmitterIdType": 3, "timestamp": 1000
        });
        let doc = document(RaddecNormalizer::default().normalize(&payload));
        assert_eq!(doc.fields["numberOfReceivers"], 0);
        assert_eq!(doc.fields["numberOfPackets"], 0);
        assert_eq!(doc.id.as_deref(), Some("1000-abc-3"));
    }

    #[test]
    fn test_dynamb_copy() {
        let payload = json!({
            "deviceId": "bada55beac0d",
            "deviceIdType": 2,
            "batteryPercentage": 67,
            "acceleration": [-0.15, -0.22, 0.97],
            "timestamp": 1554000000000u64
        });
        let doc = document(DynambNormalizer.normalize(&payload));

        assert_eq!(doc.id.as_deref(), Some("1554000000000-bada55beac0d-2"));
        assert_eq!(doc.timestamp, "2019-03-31T02:40:00.000Z");
        assert_eq!(doc.fields["acceleration"], json!([-0.15, -0.22, 0.97]));
        assert_eq!(doc.fields.len(), 4);
    }

    #[test]
    fn test_dynamb_skips() {
        let no_device = json!({ "deviceIdType": 2, "timestamp": 1 });
        assert_eq!(
            DynambNormalizer.normalize(&no_device),
            Normalized::Skip(SkipReason::MissingField("deviceId"))
        );

        let bad_time = json!({ "deviceId": "a", "deviceIdType": 2, "timestamp": "soon" });
        assert_eq!(
            DynambNormalizer.normalize(&bad_time),
            Normalized::Skip(SkipReason::InvalidTimestamp)
        );

        assert_eq!(
            DynambNormalizer.normalize(&json!([1, 2, 3])),
            Normalized::Skip(SkipReason::MalformedPayload)
        );
    }

    fn spatem(features: Value) -> Value {
        json!({
            "deviceId": "fee150bada55",
            "deviceIdType": 2,
            "type": "location",
            "data": { "type": "FeatureCollection", "features": features },
            "timestamp": 1554000000000u64
        })
    }

    #[test]
    fn test_spatem_location() {
        let payload = spatem(json!([{
            "type": "Feature",
            "properties": { "isDevicePosition": true },
            "geometry": { "type": "Point", "coordinates": [12.34, 56.78, 100] }
        }]));
        let doc = document(SpatemNormalizer.normalize(&payload));

        assert_eq!(doc.id, None);
        assert_eq!(doc.fields["location"]["type"], "Point");
        assert_eq!(doc.fields["location"]["coordinates"], json!([12.34, 56.78]));
        assert_eq!(doc.fields["text"], "fee150bada55/2");
        assert_eq!(doc.fields["type"], "location");
        assert!(!doc.fields.contains_key("data"));
    }

    #[test]
    fn test_spatem_malformed() {
        let mut payload = spatem(json!({ "not": "an array" }));
        assert_eq!(
            SpatemNormalizer.normalize(&payload),
            Normalized::Skip(SkipReason::MalformedPayload)
        );

        payload.as_object_mut().unwrap().remove("data");
        assert_eq!(
            SpatemNormalizer.normalize(&payload),
            Normalized::Skip(SkipReason::MalformedPayload)
        );

        let unflagged = spatem(json!([{
            "properties": {},
            "geometry": { "type": "Point", "coordinates": [1, 2] }
        }]));
        assert_eq!(
            SpatemNormalizer.normalize(&unflagged),
            Normalized::Skip(SkipReason::NoDevicePosition)
        );
    }
}
