//! Event codec: transport and persisted representations of [`SensorEvent`].
//!
//! The feed delivers comma-separated text
//! (`<timestamp>,<location>,<motionFlag:int>,<batteryPercent:int>`); local
//! storage holds JSON objects with the same four logical fields. Both
//! decoders are total: a malformed field degrades to its sentinel value and
//! decoding continues, so one bad reading never takes down the pipeline.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::model::{Location, SensorEvent};

/// Sentinel battery value meaning "no reading".
pub const NO_BATTERY_READING: i32 = -1;

/// Location name used when the persisted record carries none.
pub const UNKNOWN_LOCATION: &str = "Unknown";

impl SensorEvent {
    /// Decode a raw transport payload.
    ///
    /// Splits on commas into four fields. An unparseable timestamp yields
    /// `None` (non-fatal); the motion flag is truthy when it parses as a
    /// positive integer; an unparseable battery field yields `-1`. No
    /// clamping happens at decode time.
    pub fn from_transport(payload: &str) -> SensorEvent {
        let mut fields = payload.split(',');

        let timestamp = fields.next().and_then(parse_timestamp);
        let location = match fields.next() {
            Some(name) => Location::from_name(name.trim()),
            None => Location::from_name(UNKNOWN_LOCATION),
        };
        let motion_detected = fields
            .next()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map(|flag| flag > 0)
            .unwrap_or(false);
        let battery_percent = fields
            .next()
            .and_then(|raw| raw.trim().parse::<i32>().ok())
            .unwrap_or(NO_BATTERY_READING);

        SensorEvent {
            timestamp,
            location,
            motion_detected,
            battery_percent,
        }
    }

    /// Decode a persisted JSON value.
    ///
    /// Missing or mistyped fields degrade: location falls back to
    /// `"Unknown"`, battery to `-1`, motion to JSON truthiness and the
    /// timestamp to `None`.
    pub fn from_persisted(value: &Value) -> SensorEvent {
        let timestamp = value
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);

        let location = match value.get("location").and_then(Value::as_str) {
            Some(name) => Location::from_name(name),
            None => Location::from_name(UNKNOWN_LOCATION),
        };

        let motion_detected = value.get("motionDetected").is_some_and(json_truthy);

        let battery_percent = value
            .get("batteryPercent")
            .and_then(|raw| {
                raw.as_i64()
                    .or_else(|| raw.as_f64().map(|f| f as i64))
            })
            .map(|n| n as i32)
            .unwrap_or(NO_BATTERY_READING);

        if battery_percent < 0 {
            tracing::trace!(?value, "persisted event carries no battery reading");
        }

        SensorEvent {
            timestamp,
            location,
            motion_detected,
            battery_percent,
        }
    }

    /// Identity projection of the four fields, ready for JSON storage.
    ///
    /// The timestamp serializes as an RFC 3339 string (or null), which
    /// [`SensorEvent::from_persisted`] reads back exactly.
    pub fn to_json(&self) -> Value {
        // Serialize derives from the model; infallible for this shape.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Parse a feed timestamp leniently.
///
/// RFC 3339 first, then two date-time layouts seen in older device
/// firmware; all interpreted as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for layout in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(parsed.and_utc());
        }
    }

    None
}

/// JSON truthiness as the persisted format defines it: `false`, `0`, null,
/// and the empty string are false; everything else is true.
fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
