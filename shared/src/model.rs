use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::capabilities::{
    ControlCommand, DeviceEndpoint, HttpError, HttpResult, KvOutput, KvResult, PreferenceKey,
    TimerOutput,
};
use crate::config::ViewerConfig;
use crate::cycle::{Action, Owner, Ticket};
use crate::event::{Event, MapType, Tab, ValidationError, Zoom};
use crate::location::{MapReadiness, MapTabView};
use crate::poller::StatusPoller;
use crate::router::{ViewRouter, ViewState};
use crate::status::{SensorIndicators, StreamIndicators};
use crate::{AppError, ErrorKind};

/// Indicator state: nothing received yet, the latest data, or hidden after a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Telemetry<T> {
    #[default]
    Pending,
    Live(T),
    Hidden(ErrorKind),
}

impl<T> Telemetry<T> {
    pub fn live(&self) -> Option<&T> {
        match self {
            Telemetry::Live(value) => Some(value),
            _ => None,
        }
    }
}

/// Map preferences restored from, and mirrored to, the preference store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPreferences {
    pub map_type: Option<MapType>,
    pub zoom: Option<Zoom>,
}

impl ViewPreferences {
    pub fn apply(&mut self, key: PreferenceKey, value: &str) -> Result<(), ValidationError> {
        match key {
            PreferenceKey::MapTypeId => self.map_type = Some(MapType::new(value)?),
            PreferenceKey::MapZoom => self.zoom = Some(Zoom::parse(value)?),
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Model {
    pub config: ViewerConfig,
    pub endpoint: Option<DeviceEndpoint>,
    pub streams: StatusPoller,
    pub sensors: StatusPoller,
    pub stream_indicators: Telemetry<StreamIndicators>,
    pub sensor_indicators: Telemetry<SensorIndicators>,
    pub router: ViewRouter,
    pub map_readiness: MapReadiness,
    pub preferences: ViewPreferences,
    pub active_error: Option<AppError>,
}

impl Default for Model {
    fn default() -> Self {
        let config = ViewerConfig::default();
        Self {
            streams: StatusPoller::streams(&config),
            sensors: StatusPoller::sensors(&config),
            router: ViewRouter::new(&config),
            config,
            endpoint: None,
            stream_indicators: Telemetry::Pending,
            sensor_indicators: Telemetry::Pending,
            map_readiness: MapReadiness::NotReady,
            preferences: ViewPreferences::default(),
            active_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub active_tab: Tab,
    pub device_url: Option<String>,
    pub h264_url: Option<String>,
    pub streams: Telemetry<StreamIndicators>,
    pub sensors: Telemetry<SensorIndicators>,
    pub map: Option<MapTabView>,
    pub zoom_hold_active: bool,
    pub error: Option<AppError>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event and returns the side effects to perform. Fetches that cannot
    /// be sent for lack of an endpoint are failed locally and fed back in.
    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        let mut queue = VecDeque::from([event]);
        let mut actions = Vec::new();

        while let Some(event) = queue.pop_front() {
            for action in self.apply(event) {
                match action {
                    Action::Fetch(fetch) if self.endpoint.is_none() => {
                        queue.push_back(Event::StatusFetched {
                            ticket: fetch.ticket,
                            result: Box::new(Err(HttpError::NotConfigured)),
                        });
                    }
                    action => {
                        if let Action::Persist { key, value } = &action {
                            if let Err(e) = self.preferences.apply(*key, value) {
                                warn!(key = key.as_str(), error = %e, "preference not cached");
                            }
                        }
                        actions.push(action);
                    }
                }
            }
        }

        actions
    }

    fn apply(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::Startup { device_url, config } => self.start(&device_url, config),
            Event::Shutdown => {
                let mut actions = self.streams.stop();
                actions.extend(self.sensors.stop());
                actions.extend(self.router.shutdown(&self.config));
                self.stream_indicators = Telemetry::Pending;
                self.sensor_indicators = Telemetry::Pending;
                info!("viewer stopped");
                actions
            }
            Event::MapSdkReady => {
                self.map_readiness = MapReadiness::Ready;
                self.router
                    .map_mut()
                    .map(|map| map.on_map_ready())
                    .unwrap_or_default()
            }

            Event::TabSelected(tab) => self.router.navigate(tab, self.map_readiness, &self.config),

            Event::ZoomPressed(direction) => match self.router.live_mut() {
                Some(live) => live.zoom_mut(direction).press(),
                None => {
                    debug!(?direction, "zoom press outside live tab ignored");
                    Vec::new()
                }
            },
            Event::ZoomReleased(direction) => self
                .router
                .live_mut()
                .map(|live| live.zoom_mut(direction).release())
                .unwrap_or_default(),
            Event::TorchToggleRequested => self.live_control(ControlCommand::TorchToggle),
            Event::AutofocusRequested => self.live_control(ControlCommand::AutofocusStart),

            Event::MapPanned => {
                if let Some(map) = self.router.map_mut() {
                    map.on_pan();
                }
                Vec::new()
            }
            Event::MarkerClicked => self
                .router
                .map_mut()
                .map(|map| map.on_marker_click())
                .unwrap_or_default(),
            Event::MarkerDoubleClicked => self
                .router
                .map_mut()
                .map(|map| map.on_marker_double_click())
                .unwrap_or_default(),
            Event::MapZoomChanged { zoom } => self
                .router
                .map_mut()
                .map(|map| map.on_zoom_changed(zoom))
                .unwrap_or_default(),
            Event::MapTypeChanged { map_type } => self
                .router
                .map_mut()
                .map(|map| map.on_map_type_changed(map_type))
                .unwrap_or_default(),

            Event::StatusFetched { ticket, result } => self.on_status(ticket, *result),
            Event::TimerSettled(output) => match output {
                TimerOutput::Fired(id) => match id.owner {
                    Owner::StreamPoller => self.streams.on_timer(id),
                    Owner::SensorPoller => self.sensors.on_timer(id),
                    _ => self.router.on_timer(id),
                },
                TimerOutput::Cleared(id) => {
                    debug!(?id, "timer cleared");
                    Vec::new()
                }
            },
            Event::PreferenceLoaded { key, result } => {
                self.on_preference(key, *result);
                Vec::new()
            }
            Event::ControlSent { command, result } => {
                Self::log_control(command, &result);
                Vec::new()
            }
        }
    }

    fn start(&mut self, device_url: &str, config: Option<Box<ViewerConfig>>) -> Vec<Action> {
        self.active_error = None;
        if let Some(config) = config {
            match config.validate() {
                Ok(()) => self.config = *config,
                Err(e) => {
                    warn!(error = %e, "config override rejected, keeping defaults");
                    self.active_error = Some(e.into());
                }
            }
        }
        self.streams.set_delays(&self.config);
        self.sensors.set_delays(&self.config);

        let mut actions = self.streams.stop();
        actions.extend(self.sensors.stop());
        actions.extend(self.router.shutdown(&self.config));
        actions.extend(PreferenceKey::ALL.map(Action::LoadPreference));

        match DeviceEndpoint::new(device_url) {
            Ok(endpoint) => {
                info!(device = endpoint.as_str(), "viewer started");
                self.endpoint = Some(endpoint);
                actions.extend(self.streams.start());
                actions.extend(self.sensors.start());
            }
            Err(e) => {
                warn!(error = %e, "invalid device URL");
                self.endpoint = None;
                self.active_error = Some(e.into());
            }
        }
        actions
    }

    fn on_status(&mut self, ticket: Ticket, result: HttpResult) -> Vec<Action> {
        match ticket.owner {
            Owner::StreamPoller => match self.streams.on_response(ticket, result) {
                Some(step) => {
                    self.stream_indicators = match &step.outcome {
                        Ok(snapshot) => Telemetry::Live(StreamIndicators::from_snapshot(snapshot)),
                        Err(e) => Telemetry::Hidden(e.kind()),
                    };
                    vec![step.next]
                }
                None => Vec::new(),
            },
            Owner::SensorPoller => match self.sensors.on_response(ticket, result) {
                Some(step) => {
                    self.sensor_indicators = match &step.outcome {
                        Ok(snapshot) => SensorIndicators::from_snapshot(snapshot)
                            .map_or(Telemetry::Hidden(ErrorKind::MalformedPayload), Telemetry::Live),
                        Err(e) => Telemetry::Hidden(e.kind()),
                    };
                    vec![step.next]
                }
                None => Vec::new(),
            },
            Owner::LocationSync => match self.router.map_mut() {
                Some(map) => map.on_response(ticket, result, &self.preferences),
                None => {
                    debug!(generation = ticket.generation, "location response after map closed");
                    Vec::new()
                }
            },
            Owner::ZoomIn | Owner::ZoomOut => Vec::new(),
        }
    }

    fn on_preference(&mut self, key: PreferenceKey, result: KvResult) {
        match result {
            Ok(KvOutput::Value(Some(value))) => {
                if let Err(e) = self.preferences.apply(key, &value) {
                    warn!(key = key.as_str(), error = %e, "ignoring stored preference");
                }
            }
            Ok(KvOutput::Value(None)) => debug!(key = key.as_str(), "no stored preference"),
            Ok(KvOutput::Written) => {}
            Err(e) => warn!(key = key.as_str(), error = %e, "preference load failed"),
        }
    }

    fn live_control(&mut self, command: ControlCommand) -> Vec<Action> {
        if self.router.tab() == Tab::Live {
            vec![Action::Control(command)]
        } else {
            debug!(?command, "control outside live tab ignored");
            Vec::new()
        }
    }

    fn log_control(command: ControlCommand, result: &HttpResult) {
        match result {
            Ok(response) if response.is_success() => {
                debug!(body = %command.body(), "control command accepted");
            }
            Ok(response) => warn!(
                body = %command.body(),
                status = response.status(),
                "control command rejected"
            ),
            Err(e) => warn!(body = %command.body(), error = %e, "control command failed"),
        }
    }

    pub fn view_state(&self) -> ViewState {
        self.router.view_state()
    }

    pub fn view(&self) -> ViewModel {
        ViewModel {
            active_tab: self.router.tab(),
            device_url: self.endpoint.as_ref().map(|e| e.as_str().to_string()),
            h264_url: self.endpoint.as_ref().map(DeviceEndpoint::h264_url),
            streams: self.stream_indicators.clone(),
            sensors: self.sensor_indicators.clone(),
            map: self.router.map().map(|map| map.view()),
            zoom_hold_active: self.view_state().zoom_hold_active,
            error: self.active_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{HttpResponse, Resource};
    use crate::location::MapPhase;
    use assert_matches::assert_matches;

    fn started() -> (Model, Vec<Action>) {
        let mut model = Model::new();
        let actions = model.handle(Event::Startup {
            device_url: "http://camera.local:8080".to_string(),
            config: None,
        });
        (model, actions)
    }

    fn fetch_ticket(actions: &[Action], resource: Resource) -> Ticket {
        actions
            .iter()
            .find_map(|a| match a {
                Action::Fetch(f) if f.resource == resource => Some(f.ticket),
                _ => None,
            })
            .expect("fetch for resource")
    }

    fn ok(body: &str) -> Box<HttpResult> {
        Box::new(Ok(HttpResponse::new(
            200,
            body.as_bytes().to_vec(),
            "req".to_string(),
        )))
    }

    #[test]
    fn startup_loads_preferences_and_starts_pollers() {
        let (model, actions) = started();
        assert!(actions.contains(&Action::LoadPreference(PreferenceKey::MapTypeId)));
        assert!(actions.contains(&Action::LoadPreference(PreferenceKey::MapZoom)));
        fetch_ticket(&actions, Resource::Status);
        fetch_ticket(&actions, Resource::Sensors);
        assert_eq!(model.router.tab(), Tab::Live);
        assert_eq!(
            model.view().h264_url.as_deref(),
            Some("rtsp://camera.local:8080/video/h264")
        );
    }

    #[test]
    fn invalid_device_url_is_reported() {
        let mut model = Model::new();
        let actions = model.handle(Event::Startup {
            device_url: "ftp://camera".to_string(),
            config: None,
        });
        assert!(!actions.iter().any(|a| matches!(a, Action::Fetch(_))));
        assert_matches!(
            model.view().error,
            Some(AppError {
                kind: ErrorKind::Validation,
                ..
            })
        );
    }

    #[test]
    fn config_override_changes_cadence() {
        let mut model = Model::new();
        let config = ViewerConfig {
            status_ok_interval_ms: 1_000,
            ..ViewerConfig::default()
        };
        let actions = model.handle(Event::Startup {
            device_url: "http://camera.local:8080".to_string(),
            config: Some(Box::new(config)),
        });
        let ticket = fetch_ticket(&actions, Resource::Status);
        let actions = model.handle(Event::StatusFetched {
            ticket,
            result: ok("{}"),
        });
        assert_matches!(
            actions.as_slice(),
            [Action::StartTimer { delay_ms: 1_000, .. }]
        );
    }

    #[test]
    fn invalid_config_override_keeps_defaults() {
        let mut model = Model::new();
        let config = ViewerConfig {
            zoom_repeat_ms: 0,
            ..ViewerConfig::default()
        };
        model.handle(Event::Startup {
            device_url: "http://camera.local:8080".to_string(),
            config: Some(Box::new(config)),
        });
        assert_eq!(model.config, ViewerConfig::default());
        assert_matches!(
            model.view().error,
            Some(AppError {
                kind: ErrorKind::Validation,
                ..
            })
        );
        assert!(model.streams.is_running());
    }

    #[test]
    fn stream_response_updates_indicators() {
        let (mut model, actions) = started();
        let ticket = fetch_ticket(&actions, Resource::Status);
        let actions = model.handle(Event::StatusFetched {
            ticket,
            result: ok(r#"{"connections":[{"MJPEG_stream":true,"H264_stream":false,"client_address":"1.2.3.4"}]}"#),
        });
        assert_matches!(
            actions.as_slice(),
            [Action::StartTimer { delay_ms: 2_500, .. }]
        );
        let indicators = model.view().streams;
        assert_eq!(indicators.live().unwrap().mjpeg.active_streams, 1);
        assert_eq!(indicators.live().unwrap().mjpeg.tooltip, "Clients:\n1.2.3.4");
    }

    #[test]
    fn sensor_failure_hides_indicators() {
        let (mut model, actions) = started();
        let ticket = fetch_ticket(&actions, Resource::Sensors);
        let actions = model.handle(Event::StatusFetched {
            ticket,
            result: Box::new(Ok(HttpResponse::new(
                500,
                Vec::new(),
                "req".to_string(),
            ))),
        });
        assert_matches!(
            actions.as_slice(),
            [Action::StartTimer { delay_ms: 5_000, .. }]
        );
        assert_eq!(
            model.view().sensors,
            Telemetry::Hidden(ErrorKind::HttpStatus)
        );
    }

    #[test]
    fn malformed_sensor_payload_is_reported_as_such() {
        let (mut model, actions) = started();
        let ticket = fetch_ticket(&actions, Resource::Sensors);
        model.handle(Event::StatusFetched {
            ticket,
            result: ok("{{{"),
        });
        assert_eq!(
            model.view().sensors,
            Telemetry::Hidden(ErrorKind::MalformedPayload)
        );
    }

    #[test]
    fn controls_only_work_on_live_tab() {
        let (mut model, _) = started();
        assert_eq!(
            model.handle(Event::TorchToggleRequested),
            vec![Action::Control(ControlCommand::TorchToggle)]
        );
        model.handle(Event::TabSelected(Tab::Sensors));
        assert!(model.handle(Event::AutofocusRequested).is_empty());
        assert!(model
            .handle(Event::ZoomPressed(crate::ZoomDirection::In))
            .is_empty());
    }

    #[test]
    fn loaded_preferences_are_cached() {
        let (mut model, _) = started();
        model.handle(Event::PreferenceLoaded {
            key: PreferenceKey::MapZoom,
            result: Box::new(Ok(KvOutput::Value(Some("12".to_string())))),
        });
        model.handle(Event::PreferenceLoaded {
            key: PreferenceKey::MapTypeId,
            result: Box::new(Ok(KvOutput::Value(Some("bad;value".to_string())))),
        });
        assert_eq!(model.preferences.zoom, Some(Zoom::new(12).unwrap()));
        assert_eq!(model.preferences.map_type, None);
    }

    #[test]
    fn map_before_startup_fails_locally() {
        let mut model = Model::new();
        model.handle(Event::MapSdkReady);
        let actions = model.handle(Event::TabSelected(Tab::Map));
        assert!(actions.is_empty());
        assert_eq!(
            model.view().map.unwrap().phase,
            MapPhase::Unreachable {
                kind: ErrorKind::Transport
            }
        );
    }

    #[test]
    fn shutdown_stops_everything() {
        let (mut model, actions) = started();
        let ticket = fetch_ticket(&actions, Resource::Status);
        model.handle(Event::StatusFetched {
            ticket,
            result: ok("{}"),
        });
        let actions = model.handle(Event::Shutdown);
        assert_matches!(actions.as_slice(), [Action::ClearTimer(_)]);
        assert!(!model.streams.is_running());
        assert!(!model.sensors.is_running());
        assert_eq!(model.view().streams, Telemetry::Pending);
    }
}
