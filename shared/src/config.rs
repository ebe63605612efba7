use serde::{Deserialize, Serialize};

use crate::event::{MapType, ValidationError, Zoom};

/// Cadences and defaults of the viewer. The shell may override any field in
/// `Event::Startup`; missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub status_ok_interval_ms: u64,
    pub status_retry_interval_ms: u64,
    pub location_fix_interval_ms: u64,
    pub location_degraded_interval_ms: u64,
    pub location_error_interval_ms: u64,
    pub zoom_first_repeat_ms: u64,
    pub zoom_repeat_ms: u64,
    pub zoom_step: u8,
    pub default_map_zoom: Zoom,
    pub marker_snap_zoom: Zoom,
    pub default_map_type: MapType,
    pub preference_expiry_days: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            status_ok_interval_ms: crate::STATUS_OK_INTERVAL_MS,
            status_retry_interval_ms: crate::STATUS_RETRY_INTERVAL_MS,
            location_fix_interval_ms: crate::LOCATION_FIX_INTERVAL_MS,
            location_degraded_interval_ms: crate::LOCATION_DEGRADED_INTERVAL_MS,
            location_error_interval_ms: crate::LOCATION_ERROR_INTERVAL_MS,
            zoom_first_repeat_ms: crate::ZOOM_FIRST_REPEAT_MS,
            zoom_repeat_ms: crate::ZOOM_REPEAT_MS,
            zoom_step: crate::ZOOM_STEP,
            default_map_zoom: Zoom::saturating(crate::DEFAULT_MAP_ZOOM),
            marker_snap_zoom: Zoom::saturating(crate::MARKER_SNAP_ZOOM),
            default_map_type: MapType::default(),
            preference_expiry_days: crate::PREFERENCE_EXPIRY_DAYS,
        }
    }
}

impl ViewerConfig {
    /// A zero interval would turn a polling cycle into a busy loop.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let intervals = [
            ("status_ok_interval_ms", self.status_ok_interval_ms),
            ("status_retry_interval_ms", self.status_retry_interval_ms),
            ("location_fix_interval_ms", self.location_fix_interval_ms),
            (
                "location_degraded_interval_ms",
                self.location_degraded_interval_ms,
            ),
            ("location_error_interval_ms", self.location_error_interval_ms),
            ("zoom_first_repeat_ms", self.zoom_first_repeat_ms),
            ("zoom_repeat_ms", self.zoom_repeat_ms),
        ];
        match intervals.iter().find(|(_, ms)| *ms == 0) {
            Some((field, _)) => Err(ValidationError::ZeroInterval { field: *field }),
            None => Ok(()),
        }
    }
}
