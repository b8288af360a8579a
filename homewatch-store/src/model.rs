//! The immutable sensor event model.

use chrono::{DateTime, Utc};
use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// A room identifier from the monitored home.
///
/// The device feed knows a fixed small set of rooms; anything else falls
/// into [`Location::Other`], which keeps the raw name it arrived with. The
/// storage-key mapping in [`crate::store`] buckets every `Other` under one
/// catch-all key, so this is a many-to-one mapping by design.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Bedroom,
    Living,
    Toilet,
    Kitchen,
    Dining,
    Other(String),
}

impl Location {
    /// Map a raw location name from the feed onto the known set.
    ///
    /// Unknown names are preserved inside `Other` rather than dropped, so
    /// display collaborators can still show what the sensor reported.
    pub fn from_name(name: &str) -> Self {
        match name {
            "bedroom" => Location::Bedroom,
            "living" => Location::Living,
            "toilet" => Location::Toilet,
            "kitchen" => Location::Kitchen,
            "dining" => Location::Dining,
            other => Location::Other(other.to_string()),
        }
    }

    /// The name as reported by (or reportable to) the feed.
    pub fn name(&self) -> &str {
        match self {
            Location::Bedroom => "bedroom",
            Location::Living => "living",
            Location::Toilet => "toilet",
            Location::Kitchen => "kitchen",
            Location::Dining => "dining",
            Location::Other(name) => name,
        }
    }

    /// The five known rooms, in the order the dashboard lists them.
    pub fn known() -> [Location; 5] {
        [
            Location::Bedroom,
            Location::Living,
            Location::Toilet,
            Location::Kitchen,
            Location::Dining,
        ]
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer).map_err(D::Error::custom)?;
        Ok(Location::from_name(&name))
    }
}

/// One reading from the monitoring device.
///
/// Immutable once constructed; the codec in [`crate::codec`] is the only
/// constructor surface. Decoding never fails outright; malformed fields
/// degrade to documented sentinels (`None` timestamp, `"Unknown"` location,
/// `-1` battery).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorEvent {
    /// Event time as reported by the feed; `None` when unparseable.
    pub timestamp: Option<DateTime<Utc>>,
    /// Room the reading came from.
    pub location: Location,
    /// Whether motion/presence was raised.
    pub motion_detected: bool,
    /// Battery percent, nominally 0-100. `-1` means "no reading". Stored
    /// raw; use [`SensorEvent::battery_display`] for rendering.
    pub battery_percent: i32,
}

impl SensorEvent {
    /// Battery percent clamped to 0-100 for charts and cards.
    ///
    /// Storage keeps the raw value so out-of-range readings stay visible to
    /// diagnostics.
    pub fn battery_display(&self) -> i32 {
        self.battery_percent.clamp(0, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_known_name() {
        assert_eq!(Location::from_name("kitchen"), Location::Kitchen);
        assert_eq!(Location::from_name("bedroom"), Location::Bedroom);
        assert_eq!(Location::from_name("living"), Location::Living);
        assert_eq!(Location::from_name("toilet"), Location::Toilet);
        assert_eq!(Location::from_name("dining"), Location::Dining);
    }

    #[test]
    fn test_location_from_unknown_name_preserves_string() {
        let location = Location::from_name("garage");
        assert_eq!(location, Location::Other("garage".to_string()));
        assert_eq!(location.name(), "garage");
    }

    #[test]
    fn test_location_name_round_trip() {
        for location in Location::known() {
            assert_eq!(Location::from_name(location.name()), location);
        }
    }

    #[test]
    fn test_battery_display_clamps() {
        let mut event = SensorEvent {
            timestamp: None,
            location: Location::Kitchen,
            motion_detected: false,
            battery_percent: 150,
        };
        assert_eq!(event.battery_display(), 100);

        event.battery_percent = -1;
        assert_eq!(event.battery_display(), 0);

        event.battery_percent = 42;
        assert_eq!(event.battery_display(), 42);
    }
}
