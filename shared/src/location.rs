//! Map tab: initial fix, location synchronization and map gestures.
//!
//! A [`MapTabController`] lives exactly as long as one visit to the map tab. It owns the
//! map primitives and the location cycle; dropping it through [`MapTabController::teardown`]
//! clears the pending timer and disposes the map.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capabilities::{FixColor, HttpResult, MapOperation, PreferenceKey, Resource};
use crate::config::ViewerConfig;
use crate::cycle::{Action, FetchRequest, Owner, PollCycle, Ticket, TimerId};
use crate::event::{Coordinate, MapType, Zoom};
use crate::model::ViewPreferences;
use crate::status::{classify, FetchError, Fix, StatusSnapshot};
use crate::ErrorKind;

/// Whether the shell's map SDK has finished loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapReadiness {
    #[default]
    NotReady,
    Ready,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyCircle {
    pub center: Coordinate,
    pub radius_m: f64,
    pub color: FixColor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub center: Coordinate,
    pub zoom: Zoom,
    pub map_type: MapType,
}

/// Core-side mirror of what the shell has drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct MapPrimitives {
    pub marker: Coordinate,
    pub circle: AccuracyCircle,
    pub viewport: Viewport,
}

/// What one location fetch produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FixReport {
    Valid(Fix),
    /// The device answered but has no usable fix.
    Degraded,
    Failed(FetchError),
}

impl FixReport {
    pub fn from_outcome(outcome: Result<StatusSnapshot, FetchError>) -> Self {
        match outcome {
            Ok(StatusSnapshot {
                location: Some(location),
                ..
            }) => location.fix().map_or(FixReport::Degraded, FixReport::Valid),
            Ok(_) => FixReport::Failed(FetchError::Malformed(
                "status payload without location".to_string(),
            )),
            Err(e) => FixReport::Failed(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapPhase {
    WaitingForMapSdk,
    Locating,
    /// The device has no fix; the tab shows a warning instead of a map.
    LocationUnavailable,
    /// The initial fetch failed; the tab stays empty.
    Unreachable { kind: ErrorKind },
    Live,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapTabView {
    pub phase: MapPhase,
    pub auto_center: bool,
    pub fix_color: Option<FixColor>,
    pub accuracy_m: Option<f64>,
}

#[derive(Debug, Clone)]
enum Stage {
    AwaitingMapSdk,
    Locating,
    NoFix,
    Unreachable(ErrorKind),
    Live(MapPrimitives),
}

#[derive(Debug, Clone)]
pub struct MapTabController {
    session: u64,
    stage: Stage,
    cycle: PollCycle,
    auto_center: bool,
    last_applied_fix_ms: Option<i64>,
    fix_delay_ms: u64,
    degraded_delay_ms: u64,
    error_delay_ms: u64,
    default_zoom: Zoom,
    snap_zoom: Zoom,
    default_map_type: MapType,
}

impl MapTabController {
    pub fn new(session: u64, config: &ViewerConfig) -> Self {
        Self {
            session,
            stage: Stage::AwaitingMapSdk,
            cycle: PollCycle::with_generation(Owner::LocationSync, session),
            auto_center: false,
            last_applied_fix_ms: None,
            fix_delay_ms: config.location_fix_interval_ms,
            degraded_delay_ms: config.location_degraded_interval_ms,
            error_delay_ms: config.location_error_interval_ms,
            default_zoom: config.default_map_zoom,
            snap_zoom: config.marker_snap_zoom,
            default_map_type: config.default_map_type.clone(),
        }
    }

    /// Requests the initial fix, or waits for the map SDK if it is not loaded yet.
    pub fn activate(&mut self, readiness: MapReadiness) -> Vec<Action> {
        match readiness {
            MapReadiness::NotReady => {
                debug!(session = self.session, "map tab waiting for map SDK");
                self.stage = Stage::AwaitingMapSdk;
                Vec::new()
            }
            MapReadiness::Ready => {
                self.stage = Stage::Locating;
                self.cycle.begin().map(Self::fetch).into_iter().collect()
            }
        }
    }

    /// Continuation registered by `activate` while the SDK was not ready. Runs once.
    pub fn on_map_ready(&mut self) -> Vec<Action> {
        match self.stage {
            Stage::AwaitingMapSdk => self.activate(MapReadiness::Ready),
            _ => Vec::new(),
        }
    }

    pub fn on_response(
        &mut self,
        ticket: Ticket,
        result: HttpResult,
        preferences: &ViewPreferences,
    ) -> Vec<Action> {
        if !self.cycle.accept_response(ticket) {
            return Vec::new();
        }
        let report = FixReport::from_outcome(classify(result, Resource::Status));

        match self.stage {
            Stage::Locating => self.on_initial_fix(report, preferences),
            Stage::Live(_) => self.on_sync(report),
            _ => {
                debug!(session = self.session, "no map primitives, dropping location");
                self.cycle.park();
                Vec::new()
            }
        }
    }

    fn on_initial_fix(&mut self, report: FixReport, preferences: &ViewPreferences) -> Vec<Action> {
        match report {
            FixReport::Valid(fix) => {
                let viewport = Viewport {
                    center: fix.position,
                    zoom: preferences.zoom.unwrap_or(self.default_zoom),
                    map_type: preferences
                        .map_type
                        .clone()
                        .unwrap_or_else(|| self.default_map_type.clone()),
                };
                let circle = AccuracyCircle {
                    center: fix.position,
                    radius_m: fix.accuracy_m,
                    color: FixColor::Green,
                };
                let actions = vec![
                    Action::Map(MapOperation::Create {
                        center: viewport.center,
                        zoom: viewport.zoom,
                        map_type: viewport.map_type.clone(),
                    }),
                    Action::Map(MapOperation::PlaceMarker {
                        position: fix.position,
                    }),
                    Action::Map(MapOperation::DrawAccuracyCircle {
                        center: circle.center,
                        radius_m: circle.radius_m,
                        color: circle.color,
                    }),
                    self.cycle.rearm(self.fix_delay_ms),
                ];
                self.stage = Stage::Live(MapPrimitives {
                    marker: fix.position,
                    circle,
                    viewport,
                });
                self.auto_center = true;
                self.last_applied_fix_ms = Some(fix.time_ms);
                info!(session = self.session, "map created");
                actions
            }
            FixReport::Degraded => {
                info!(session = self.session, "location not available on device");
                self.stage = Stage::NoFix;
                self.cycle.park();
                Vec::new()
            }
            FixReport::Failed(e) => {
                warn!(session = self.session, error = %e, "initial location fetch failed");
                self.stage = Stage::Unreachable(e.kind());
                self.cycle.park();
                Vec::new()
            }
        }
    }

    fn on_sync(&mut self, report: FixReport) -> Vec<Action> {
        let Stage::Live(primitives) = &mut self.stage else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        let delay_ms = match report {
            FixReport::Valid(fix) => {
                primitives.marker = fix.position;
                primitives.circle = AccuracyCircle {
                    center: fix.position,
                    radius_m: fix.accuracy_m,
                    color: FixColor::Green,
                };
                actions.push(Action::Map(MapOperation::MoveMarker {
                    position: fix.position,
                }));
                actions.push(Action::Map(MapOperation::UpdateAccuracyCircle {
                    center: fix.position,
                    radius_m: fix.accuracy_m,
                    color: FixColor::Green,
                }));

                if self.last_applied_fix_ms.map_or(true, |last| fix.time_ms > last) {
                    if self.auto_center {
                        primitives.viewport.center = fix.position;
                        actions.push(Action::Map(MapOperation::SetCenter {
                            center: fix.position,
                        }));
                    }
                    self.last_applied_fix_ms = Some(fix.time_ms);
                } else {
                    debug!(time_ms = fix.time_ms, "fix not newer than last applied");
                }
                self.fix_delay_ms
            }
            FixReport::Degraded => {
                primitives.circle.color = FixColor::Red;
                actions.push(Action::Map(MapOperation::SetCircleColor {
                    color: FixColor::Red,
                }));
                self.degraded_delay_ms
            }
            FixReport::Failed(e) => {
                warn!(kind = e.kind().code(), error = %e, "location sync failed");
                primitives.circle.color = FixColor::Red;
                actions.push(Action::Map(MapOperation::SetCircleColor {
                    color: FixColor::Red,
                }));
                self.error_delay_ms
            }
        };

        actions.push(self.cycle.rearm(delay_ms));
        actions
    }

    pub fn on_timer(&mut self, id: TimerId) -> Vec<Action> {
        self.cycle.accept_timer(id).map(Self::fetch).into_iter().collect()
    }

    pub fn on_pan(&mut self) {
        if matches!(self.stage, Stage::Live(_)) {
            self.auto_center = false;
        }
    }

    pub fn on_marker_click(&mut self) -> Vec<Action> {
        let Stage::Live(primitives) = &mut self.stage else {
            return Vec::new();
        };
        self.auto_center = true;
        primitives.viewport.center = primitives.marker;
        vec![Action::Map(MapOperation::SetCenter {
            center: primitives.marker,
        })]
    }

    /// Snaps to the close-up zoom and recenters, regardless of fix times.
    pub fn on_marker_double_click(&mut self) -> Vec<Action> {
        let Stage::Live(primitives) = &mut self.stage else {
            return Vec::new();
        };
        self.auto_center = true;
        primitives.viewport.zoom = self.snap_zoom;
        primitives.viewport.center = primitives.marker;
        vec![
            Action::Map(MapOperation::SetZoom {
                zoom: self.snap_zoom,
            }),
            Action::Map(MapOperation::SetCenter {
                center: primitives.marker,
            }),
            Action::Persist {
                key: PreferenceKey::MapZoom,
                value: self.snap_zoom.to_string(),
            },
        ]
    }

    pub fn on_zoom_changed(&mut self, zoom: Zoom) -> Vec<Action> {
        match &mut self.stage {
            Stage::Live(primitives) if primitives.viewport.zoom != zoom => {
                primitives.viewport.zoom = zoom;
                vec![Action::Persist {
                    key: PreferenceKey::MapZoom,
                    value: zoom.to_string(),
                }]
            }
            _ => Vec::new(),
        }
    }

    pub fn on_map_type_changed(&mut self, map_type: MapType) -> Vec<Action> {
        match &mut self.stage {
            Stage::Live(primitives) if primitives.viewport.map_type != map_type => {
                let value = map_type.as_str().to_string();
                primitives.viewport.map_type = map_type;
                vec![Action::Persist {
                    key: PreferenceKey::MapTypeId,
                    value,
                }]
            }
            _ => Vec::new(),
        }
    }

    pub fn teardown(mut self) -> Vec<Action> {
        let mut actions: Vec<Action> = self.cycle.retire().into_iter().collect();
        if matches!(self.stage, Stage::Live(_)) {
            actions.push(Action::Map(MapOperation::Dispose));
        }
        debug!(session = self.session, "map tab torn down");
        actions
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn phase(&self) -> MapPhase {
        match self.stage {
            Stage::AwaitingMapSdk => MapPhase::WaitingForMapSdk,
            Stage::Locating => MapPhase::Locating,
            Stage::NoFix => MapPhase::LocationUnavailable,
            Stage::Unreachable(kind) => MapPhase::Unreachable { kind },
            Stage::Live(_) => MapPhase::Live,
        }
    }

    pub fn primitives(&self) -> Option<&MapPrimitives> {
        match &self.stage {
            Stage::Live(primitives) => Some(primitives),
            _ => None,
        }
    }

    pub fn auto_center(&self) -> bool {
        self.auto_center && self.primitives().is_some()
    }

    pub fn last_applied_fix_ms(&self) -> Option<i64> {
        self.last_applied_fix_ms
    }

    pub fn pending_timer(&self) -> Option<TimerId> {
        self.cycle.pending_timer()
    }

    pub fn view(&self) -> MapTabView {
        let circle = self.primitives().map(|p| &p.circle);
        MapTabView {
            phase: self.phase(),
            auto_center: self.auto_center(),
            fix_color: circle.map(|c| c.color),
            accuracy_m: circle.map(|c| c.radius_m),
        }
    }

    fn fetch(ticket: Ticket) -> Action {
        Action::Fetch(FetchRequest {
            ticket,
            resource: Resource::Status,
            precise_location: true,
        })
    }
}
