//! Device position extraction from GeoJSON feature collections

use serde_json::Value;

/// A 2D position, stored as a GeoJSON `Point`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lon: f64,
    pub lat: f64,
}

impl Position {
    /// GeoJSON representation: `{"type": "Point", "coordinates": [lon, lat]}`
    pub fn to_geojson(&self) -> Value {
        serde_json::json!({
            "type": "Point",
            "coordinates": [self.lon, self.lat],
        })
    }
}

/// Find the device position among `features`.
///
/// Every feature is inspected and the last one flagged with
/// `properties.isDevicePosition == true` whose geometry is a `Point` with at
/// least two numeric coordinates wins. Altitude and any further components
/// are dropped.
pub fn device_position(features: &[Value]) -> Option<Position> {
    features.iter().filter_map(feature_position).last()
}

fn feature_position(feature: &Value) -> Option<Position> {
    let flagged = feature
        .pointer("/properties/isDevicePosition")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !flagged {
        return None;
    }

    let geometry = feature.get("geometry")?;
    if geometry.get("type").and_then(Value::as_str) != Some("Point") {
        return None;
    }

    match geometry.get("coordinates")?.as_array()?.as_slice() {
        [lon, lat, ..] => Some(Position {
            lon: lon.as_f64()?,
            lat: lat.as_f64()?,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(coordinates: Value, is_device: bool) -> Value {
        json!({
            "type": "Feature",
            "properties": { "isDevicePosition": is_device },
            "geometry": { "type": "Point", "coordinates": coordinates }
        })
    }

    #[test]
    fn test_truncates_to_two_dimensions() {
        let features = vec![point(json!([12.34, 56.78, 100]), true)];
        let position = device_position(&features).unwrap();
        assert_eq!(position, Position { lon: 12.34, lat: 56.78 });
        assert_eq!(
            position.to_geojson(),
            json!({"type": "Point", "coordinates": [12.34, 56.78]})
        );
    }

    #[test]
    fn test_last_flagged_feature_wins() {
        let features = vec![
            point(json!([1.0, 2.0]), true),
            point(json!([9.0, 9.0]), false),
            point(json!([3.0, 4.0]), true),
        ];
        assert_eq!(
            device_position(&features),
            Some(Position { lon: 3.0, lat: 4.0 })
        );
    }

    #[test]
    fn test_unqualified_features_are_ignored() {
        let features = vec![
            point(json!([1.0, 2.0]), false),
            point(json!([5.0]), true),
            point(json!(["a", "b"]), true),
            json!({
                "properties": { "isDevicePosition": true },
                "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [1, 1], [1, 0]]] }
            }),
            json!({ "properties": { "isDevicePosition": "true" },
                    "geometry": { "type": "Point", "coordinates": [1, 2] } }),
            json!("not a feature"),
        ];
        assert_eq!(device_position(&features), None);
        assert_eq!(device_position(&[]), None);
    }

    #[test]
    fn test_later_invalid_feature_does_not_clear_earlier_match() {
        let features = vec![point(json!([1, 2]), true), point(json!([7]), true)];
        assert_eq!(
            device_position(&features),
            Some(Position { lon: 1.0, lat: 2.0 })
        );
    }
}
