//! Device status payloads and the indicators derived from them.

use serde::{Deserialize, Serialize};

use crate::capabilities::{HttpResult, Resource};
use crate::event::Coordinate;
use crate::ErrorKind;

/// One decoded response of `/status` or `/sensors`. Each resource fills in only its
/// own sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub battery: Option<Battery>,
    #[serde(default, rename = "torch")]
    pub torch_on: Option<bool>,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default, rename = "MJPEG_stream")]
    pub mjpeg_stream: bool,
    #[serde(default, rename = "H264_stream")]
    pub h264_stream: bool,
    #[serde(default)]
    pub client_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    #[serde(default, rename = "connection")]
    pub power: PowerSource,
    pub level: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerSource {
    #[serde(rename = "unplugged")]
    Unplugged,
    #[serde(rename = "USB")]
    Usb,
    #[serde(rename = "AC")]
    Ac,
    #[default]
    #[serde(rename = "unknown", other)]
    Unknown,
}

impl PowerSource {
    pub fn is_charging(&self) -> bool {
        !matches!(self, PowerSource::Unplugged)
    }
}

fn accuracy_unavailable() -> f64 {
    crate::ACCURACY_UNAVAILABLE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default = "accuracy_unavailable")]
    pub accuracy: f64,
    #[serde(default)]
    pub time: i64,
}

/// A usable location report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub position: Coordinate,
    pub accuracy_m: f64,
    pub time_ms: i64,
}

impl Location {
    /// `None` when the device has no fix: accuracy is the sentinel (or any negative
    /// value) or the coordinates are out of range.
    pub fn fix(&self) -> Option<Fix> {
        if !self.accuracy.is_finite() || self.accuracy < 0.0 {
            return None;
        }
        let position = Coordinate::new(self.latitude, self.longitude).ok()?;
        Some(Fix {
            position,
            accuracy_m: self.accuracy,
            time_ms: self.time,
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("device answered HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Transport(_) => ErrorKind::Transport,
            FetchError::HttpStatus { .. } => ErrorKind::HttpStatus,
            FetchError::Malformed(_) => ErrorKind::MalformedPayload,
        }
    }
}

/// Decodes a status fetch. Only HTTP 200 counts as success.
pub fn classify(result: HttpResult, resource: Resource) -> Result<StatusSnapshot, FetchError> {
    let response = result.map_err(|e| FetchError::Transport(e.to_string()))?;
    if response.status() != 200 {
        return Err(FetchError::HttpStatus {
            status: response.status(),
        });
    }

    let snapshot: StatusSnapshot = response
        .json()
        .map_err(|e| FetchError::Malformed(e.to_string()))?;

    if resource == Resource::Sensors && (snapshot.battery.is_none() || snapshot.torch_on.is_none())
    {
        return Err(FetchError::Malformed(
            "sensors payload without battery or torch".to_string(),
        ));
    }

    Ok(snapshot)
}

// --- Indicators ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamIndicator {
    pub active_streams: usize,
    /// `"Clients:"` followed by one line per client, empty when nobody streams.
    pub tooltip: String,
}

impl StreamIndicator {
    fn from_clients<'a>(clients: impl Iterator<Item = &'a str>) -> Self {
        let mut indicator = Self::default();
        let mut tooltip = String::from("Clients:");
        for client in clients {
            indicator.active_streams += 1;
            tooltip.push('\n');
            tooltip.push_str(client);
        }
        if indicator.active_streams > 0 {
            indicator.tooltip = tooltip;
        }
        indicator
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamIndicators {
    pub mjpeg: StreamIndicator,
    pub h264: StreamIndicator,
}

impl StreamIndicators {
    pub fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        let connections = &snapshot.connections;
        Self {
            mjpeg: StreamIndicator::from_clients(
                connections
                    .iter()
                    .filter(|c| c.mjpeg_stream)
                    .map(|c| c.client_address.as_str()),
            ),
            h264: StreamIndicator::from_clients(
                connections
                    .iter()
                    .filter(|c| c.h264_stream)
                    .map(|c| c.client_address.as_str()),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryIndicator {
    pub charging: bool,
    pub level_percent: u8,
    /// Icon bucket in steps of 20.
    pub bucket: u8,
    pub title: String,
}

impl BatteryIndicator {
    pub fn new(battery: &Battery) -> Self {
        let level_percent = battery.level.round().clamp(0.0, 100.0) as u8;
        let bucket = ((battery.level / 20.0).round() * 20.0).clamp(0.0, 100.0) as u8;
        Self {
            charging: battery.power.is_charging(),
            level_percent,
            bucket,
            title: format!("Battery level {level_percent}%"),
        }
    }

    /// e.g. `battery_charging_060`
    pub fn icon_name(&self) -> String {
        let state = if self.charging {
            "charging"
        } else {
            "discharging"
        };
        format!("battery_{state}_{:03}", self.bucket)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorIndicators {
    pub battery: BatteryIndicator,
    pub torch_on: bool,
    pub torch_title: String,
}

impl SensorIndicators {
    pub fn from_snapshot(snapshot: &StatusSnapshot) -> Option<Self> {
        let battery = snapshot.battery.as_ref()?;
        let torch_on = snapshot.torch_on?;
        Some(Self {
            battery: BatteryIndicator::new(battery),
            torch_on,
            torch_title: if torch_on { "Torch on" } else { "Torch off" }.to_string(),
        })
    }
}
