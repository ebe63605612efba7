use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{ControlCommand, HttpResult, KvResult, PreferenceKey, TimerOutput};
use crate::config::ViewerConfig;
use crate::cycle::Ticket;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid coordinate: lat={0}, lng={1}")]
    InvalidCoordinate(f64, f64),
    #[error("invalid zoom: {0}")]
    InvalidZoom(i64),
    #[error("invalid map type: {0:?}")]
    InvalidMapType(String),
    #[error("invalid interval for {field}: must be greater than zero")]
    ZeroInterval { field: &'static str },
}

// --- Coordinate: validated, NaN-safe ---

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = ValidationError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lng)
    }
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite()
            || !lng.is_finite()
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lng)
        {
            return Err(ValidationError::InvalidCoordinate(lat, lng));
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }
    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.lat.to_bits() == other.lat.to_bits() && self.lng.to_bits() == other.lng.to_bits()
    }
}

impl Eq for Coordinate {}

// --- Zoom: integer map zoom level ---

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "i64", into = "i64")]
pub struct Zoom(u8);

impl Zoom {
    pub const MAX: u8 = 25;

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if !(0..=i64::from(Self::MAX)).contains(&value) {
            return Err(ValidationError::InvalidZoom(value));
        }
        Ok(Self(value as u8))
    }

    /// Builds a zoom from a known-good level, saturating at `MAX`.
    pub const fn saturating(value: u8) -> Self {
        if value > Self::MAX {
            Self(Self::MAX)
        } else {
            Self(value)
        }
    }

    /// Parses the string-encoded form kept in the preference store.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|_| ValidationError::InvalidZoom(-1))?;
        Self::new(value)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Zoom {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Zoom> for i64 {
    fn from(zoom: Zoom) -> Self {
        i64::from(zoom.0)
    }
}

impl fmt::Display for Zoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Map rendering mode, stored verbatim in the preference store ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct MapType(String);

impl MapType {
    const MAX_LENGTH: usize = 64;

    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        let valid = !s.is_empty()
            && s.len() <= Self::MAX_LENGTH
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ValidationError::InvalidMapType(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MapType {
    fn default() -> Self {
        Self(crate::DEFAULT_MAP_TYPE.to_string())
    }
}

impl TryFrom<String> for MapType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MapType> for String {
    fn from(map_type: MapType) -> Self {
        map_type.0
    }
}

// --- Navigation ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Live,
    Map,
    Sensors,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ZoomDirection {
    In,
    Out,
}

// --- Event enum: shell-originated events first, capability responses last ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle
    Startup {
        device_url: String,
        #[serde(default)]
        config: Option<Box<ViewerConfig>>,
    },
    Shutdown,
    MapSdkReady,

    // Navigation
    TabSelected(Tab),

    // Live tab controls
    ZoomPressed(ZoomDirection),
    ZoomReleased(ZoomDirection),
    TorchToggleRequested,
    AutofocusRequested,

    // Map gestures
    MapPanned,
    MarkerClicked,
    MarkerDoubleClicked,
    MapZoomChanged {
        zoom: Zoom,
    },
    MapTypeChanged {
        map_type: MapType,
    },

    // Capability Responses (boxed to keep enum size small)
    #[serde(skip)]
    StatusFetched {
        ticket: Ticket,
        result: Box<HttpResult>,
    },
    #[serde(skip)]
    TimerSettled(TimerOutput),
    #[serde(skip)]
    PreferenceLoaded {
        key: PreferenceKey,
        result: Box<KvResult>,
    },
    #[serde(skip)]
    ControlSent {
        command: ControlCommand,
        result: Box<HttpResult>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_rejects_nan() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn coordinate_rejects_out_of_range() {
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, 181.0).is_err());
        assert!(Coordinate::new(-91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, -181.0).is_err());
    }

    #[test]
    fn coordinate_accepts_valid() {
        assert!(Coordinate::new(45.0, -73.0).is_ok());
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn coordinate_deserialization_is_validated() {
        let ok: Result<Coordinate, _> = serde_json::from_str(r#"{"lat":10.0,"lng":20.0}"#);
        assert_eq!(ok.unwrap(), Coordinate::new(10.0, 20.0).unwrap());

        let bad: Result<Coordinate, _> = serde_json::from_str(r#"{"lat":100.0,"lng":20.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn zoom_rejects_invalid() {
        assert!(Zoom::new(-1).is_err());
        assert!(Zoom::new(26).is_err());
        assert!(Zoom::new(15).is_ok());
    }

    #[test]
    fn zoom_saturates_known_levels() {
        assert_eq!(Zoom::saturating(18).value(), 18);
        assert_eq!(Zoom::saturating(200).value(), Zoom::MAX);
    }

    #[test]
    fn zoom_parses_preference_string() {
        assert_eq!(Zoom::parse("15").unwrap().value(), 15);
        assert_eq!(Zoom::parse(" 18 ").unwrap().value(), 18);
        assert!(Zoom::parse("").is_err());
        assert!(Zoom::parse("fifteen").is_err());
        assert!(Zoom::parse("99").is_err());
    }

    #[test]
    fn map_type_rejects_cookie_unsafe_values() {
        assert!(MapType::new("satellite").is_ok());
        assert!(MapType::new("").is_err());
        assert!(MapType::new("road;map").is_err());
        assert!(MapType::new("a=b").is_err());
        assert_eq!(MapType::default().as_str(), "roadmap");
    }

    #[test]
    fn gesture_events_deserialize_from_shell_json() {
        let event: Event = serde_json::from_str(r#"{"MapZoomChanged":{"zoom":12}}"#).unwrap();
        assert_eq!(
            event,
            Event::MapZoomChanged {
                zoom: Zoom::new(12).unwrap()
            }
        );

        let event: Event = serde_json::from_str(r#"{"TabSelected":"map"}"#).unwrap();
        assert_eq!(event, Event::TabSelected(Tab::Map));

        let bad: Result<Event, _> = serde_json::from_str(r#"{"MapZoomChanged":{"zoom":40}}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn event_size_is_reasonable() {
        // Ensure boxing keeps the enum small.
        let size = std::mem::size_of::<Event>();
        assert!(
            size <= 128,
            "Event enum is {} bytes, too large; box more variants",
            size
        );
    }
}
