//! Shared core of the remote camera viewer.
//!
//! The core polls the device's status endpoints, keeps the telemetry indicators up to
//! date and keeps a map in sync with the location reported by the device. It never
//! performs I/O itself: HTTP, timers, the map SDK and preference storage are capabilities
//! executed by the shell.

pub mod capabilities;
pub mod config;
pub mod cycle;
pub mod event;
pub mod location;
pub mod model;
pub mod poller;
pub mod router;
pub mod status;
pub mod zoom;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use serde::{Deserialize, Serialize};

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::ViewerConfig;
pub use event::{Coordinate, Event, MapType, Tab, Zoom, ZoomDirection};
pub use model::{Model, ViewModel};

pub const STATUS_OK_INTERVAL_MS: u64 = 2_500;
pub const STATUS_RETRY_INTERVAL_MS: u64 = 5_000;
pub const LOCATION_FIX_INTERVAL_MS: u64 = 5_000;
pub const LOCATION_DEGRADED_INTERVAL_MS: u64 = 20_000;
pub const LOCATION_ERROR_INTERVAL_MS: u64 = 30_000;
pub const ZOOM_FIRST_REPEAT_MS: u64 = 500;
pub const ZOOM_REPEAT_MS: u64 = 150;
pub const ZOOM_STEP: u8 = 20;
pub const DEFAULT_MAP_ZOOM: u8 = 15;
pub const MARKER_SNAP_ZOOM: u8 = 18;
pub const DEFAULT_MAP_TYPE: &str = "roadmap";
pub const PREFERENCE_EXPIRY_DAYS: u32 = 365 * 10;

/// Reported accuracy meaning "no location fix available".
pub const ACCURACY_UNAVAILABLE: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Network failure, the request never produced a response.
    Transport,
    /// The device answered with a non-200 status.
    HttpStatus,
    /// The device answered 200 but the body could not be decoded.
    MalformedPayload,
    /// The device answered 200 but reported the accuracy sentinel.
    DataUnavailable,
    Validation,
    Storage,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Transport => "TRANSPORT_ERROR",
            Self::HttpStatus => "HTTP_STATUS",
            Self::MalformedPayload => "MALFORMED_PAYLOAD",
            Self::DataUnavailable => "DATA_UNAVAILABLE",
            Self::Validation => "VALIDATION_ERROR",
            Self::Storage => "STORAGE_ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for AppError {}

impl From<event::ValidationError> for AppError {
    fn from(e: event::ValidationError) -> Self {
        Self::new(ErrorKind::Validation, e.to_string())
    }
}

impl From<capabilities::HttpError> for AppError {
    fn from(e: capabilities::HttpError) -> Self {
        Self::new(ErrorKind::Validation, e.to_string())
    }
}

pub mod app {
    use tracing::{debug, warn};
    use uuid::Uuid;

    use crate::capabilities::{Capabilities, HttpResponse};
    use crate::cycle::Action;
    use crate::event::Event;
    use crate::model::{Model, ViewModel};

    #[derive(Default)]
    pub struct App;

    impl App {
        fn dispatch(action: Action, model: &Model, caps: &Capabilities) {
            match action {
                Action::Fetch(fetch) => {
                    // Model::handle answers fetches locally while no endpoint is configured.
                    let Some(endpoint) = model.endpoint.as_ref() else {
                        warn!(owner = ?fetch.ticket.owner, "fetch dropped, no device endpoint");
                        return;
                    };
                    match endpoint.status_request(&caps.http, fetch.resource, fetch.precise_location)
                    {
                        Ok(request) => {
                            let request_id = Uuid::new_v4().to_string();
                            debug!(
                                request_id = %request_id,
                                resource = fetch.resource.path(),
                                owner = ?fetch.ticket.owner,
                                "status request"
                            );
                            let ticket = fetch.ticket;
                            let host = endpoint.host().to_string();
                            request.send(move |result| Event::StatusFetched {
                                ticket,
                                result: Box::new(HttpResponse::from_shell(
                                    result, &host, request_id,
                                )),
                            });
                        }
                        Err(e) => warn!(error = %e, "could not build status request"),
                    }
                }
                Action::StartTimer { id, delay_ms } => {
                    caps.timer.start(id, delay_ms, Event::TimerSettled);
                }
                Action::ClearTimer(id) => caps.timer.clear(id),
                Action::Map(operation) => caps.map_view.apply(operation),
                Action::LoadPreference(key) => {
                    caps.preferences.get(key, move |result| Event::PreferenceLoaded {
                        key,
                        result: Box::new(result),
                    });
                }
                Action::Persist { key, value } => {
                    caps.preferences
                        .set(key, value, model.config.preference_expiry_days);
                }
                Action::Control(command) => {
                    let Some(endpoint) = model.endpoint.as_ref() else {
                        warn!(?command, "control command dropped, no device endpoint");
                        return;
                    };
                    match endpoint.control_request(&caps.http, command) {
                        Ok(request) => {
                            let request_id = Uuid::new_v4().to_string();
                            let host = endpoint.host().to_string();
                            request.send(move |result| Event::ControlSent {
                                command,
                                result: Box::new(HttpResponse::from_shell(
                                    result, &host, request_id,
                                )),
                            });
                        }
                        Err(e) => warn!(error = %e, "could not build control request"),
                    }
                }
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            for action in model.handle(event) {
                Self::dispatch(action, model, caps);
            }
            caps.render.render();
        }

        fn view(&self, model: &Model) -> ViewModel {
            model.view()
        }
    }
}
