//! Tab switching. Every transition tears the previous tab down before building the next.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ViewerConfig;
use crate::cycle::{Action, Owner, TimerId};
use crate::event::{Tab, ZoomDirection};
use crate::location::{MapReadiness, MapTabController};
use crate::zoom::HoldToRepeat;

#[derive(Debug, Clone)]
pub struct LiveTab {
    pub zoom_in: HoldToRepeat,
    pub zoom_out: HoldToRepeat,
}

impl LiveTab {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            zoom_in: HoldToRepeat::new(ZoomDirection::In, config),
            zoom_out: HoldToRepeat::new(ZoomDirection::Out, config),
        }
    }

    /// Applies new cadences. Session tokens carry over.
    pub fn configure(&mut self, config: &ViewerConfig) {
        self.zoom_in.configure(config);
        self.zoom_out.configure(config);
    }

    pub fn zoom_mut(&mut self, direction: ZoomDirection) -> &mut HoldToRepeat {
        match direction {
            ZoomDirection::In => &mut self.zoom_in,
            ZoomDirection::Out => &mut self.zoom_out,
        }
    }

    fn release_all(&mut self) -> Vec<Action> {
        let mut actions = self.zoom_in.release();
        actions.extend(self.zoom_out.release());
        actions
    }

    fn active_zoom(&self) -> Option<&HoldToRepeat> {
        [&self.zoom_in, &self.zoom_out]
            .into_iter()
            .find(|zoom| zoom.is_active())
    }
}

#[derive(Debug, Clone)]
pub enum ActiveTab {
    Live,
    Map(MapTabController),
    Sensors,
}

impl ActiveTab {
    pub fn tab(&self) -> Tab {
        match self {
            ActiveTab::Live => Tab::Live,
            ActiveTab::Map(_) => Tab::Map,
            ActiveTab::Sensors => Tab::Sensors,
        }
    }
}

/// Snapshot of the active tab's controller state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub active_tab: Tab,
    pub zoom_hold_active: bool,
    pub zoom_repeat_count: u64,
    pub auto_center_enabled: bool,
    pub last_applied_fix_time: Option<i64>,
    pub pending_timer: Option<TimerId>,
}

/// The live tab's zoom controllers outlive its visits so their session tokens never
/// repeat. Leaving the tab only releases them.
#[derive(Debug, Clone)]
pub struct ViewRouter {
    active: ActiveTab,
    live: LiveTab,
    map_sessions: u64,
}

impl ViewRouter {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            active: ActiveTab::Live,
            live: LiveTab::new(config),
            map_sessions: 0,
        }
    }

    pub fn tab(&self) -> Tab {
        self.active.tab()
    }

    pub fn navigate(
        &mut self,
        destination: Tab,
        readiness: MapReadiness,
        config: &ViewerConfig,
    ) -> Vec<Action> {
        let previous = std::mem::replace(&mut self.active, ActiveTab::Sensors);
        let from = previous.tab();
        let mut actions = self.teardown(previous);

        self.active = match destination {
            Tab::Live => ActiveTab::Live,
            Tab::Map => {
                self.map_sessions += 1;
                let mut controller = MapTabController::new(self.map_sessions, config);
                actions.extend(controller.activate(readiness));
                ActiveTab::Map(controller)
            }
            Tab::Sensors => ActiveTab::Sensors,
        };

        info!(?from, to = ?destination, "tab changed");
        actions
    }

    /// Tears down the active tab and returns to an idle live tab.
    pub fn shutdown(&mut self, config: &ViewerConfig) -> Vec<Action> {
        let previous = std::mem::replace(&mut self.active, ActiveTab::Live);
        let actions = self.teardown(previous);
        self.live.configure(config);
        actions
    }

    fn teardown(&mut self, tab: ActiveTab) -> Vec<Action> {
        match tab {
            ActiveTab::Live => self.live.release_all(),
            ActiveTab::Map(controller) => controller.teardown(),
            ActiveTab::Sensors => Vec::new(),
        }
    }

    /// Routes a timer to the controller that owns it, if that controller still exists.
    pub fn on_timer(&mut self, id: TimerId) -> Vec<Action> {
        match (&mut self.active, id.owner) {
            (ActiveTab::Live, Owner::ZoomIn) => self.live.zoom_in.on_timer(id),
            (ActiveTab::Live, Owner::ZoomOut) => self.live.zoom_out.on_timer(id),
            (ActiveTab::Map(map), Owner::LocationSync) => map.on_timer(id),
            _ => {
                debug!(?id, "timer for inactive tab ignored");
                Vec::new()
            }
        }
    }

    pub fn live_mut(&mut self) -> Option<&mut LiveTab> {
        match self.active {
            ActiveTab::Live => Some(&mut self.live),
            _ => None,
        }
    }

    pub fn map(&self) -> Option<&MapTabController> {
        match &self.active {
            ActiveTab::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn map_mut(&mut self) -> Option<&mut MapTabController> {
        match &mut self.active {
            ActiveTab::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn view_state(&self) -> ViewState {
        let mut state = ViewState {
            active_tab: self.tab(),
            ..ViewState::default()
        };
        match &self.active {
            ActiveTab::Live => {
                if let Some(zoom) = self.live.active_zoom() {
                    state.zoom_hold_active = true;
                    state.zoom_repeat_count = zoom.repeat_count();
                    state.pending_timer = zoom.pending_timer();
                }
            }
            ActiveTab::Map(map) => {
                state.auto_center_enabled = map.auto_center();
                state.last_applied_fix_time = map.last_applied_fix_ms();
                state.pending_timer = map.pending_timer();
            }
            ActiveTab::Sensors => {}
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::MapPhase;
    use assert_matches::assert_matches;

    #[test]
    fn starts_on_live() {
        let router = ViewRouter::new(&ViewerConfig::default());
        assert_eq!(router.tab(), Tab::Live);
        assert_eq!(router.view_state(), ViewState::default());
    }

    #[test]
    fn leaving_live_releases_zoom_hold() {
        let config = ViewerConfig::default();
        let mut router = ViewRouter::new(&config);
        router.live_mut().unwrap().zoom_in.press();
        let pending = router.view_state().pending_timer.unwrap();

        let actions = router.navigate(Tab::Sensors, MapReadiness::Ready, &config);
        assert_eq!(actions, vec![Action::ClearTimer(pending)]);
        assert!(router.on_timer(pending).is_empty());
    }

    #[test]
    fn zoom_timer_from_earlier_live_visit_stays_stale() {
        let config = ViewerConfig::default();
        let mut router = ViewRouter::new(&config);
        router.live_mut().unwrap().zoom_in.press();
        let old = router.view_state().pending_timer.unwrap();

        router.navigate(Tab::Sensors, MapReadiness::Ready, &config);
        router.navigate(Tab::Live, MapReadiness::Ready, &config);
        router.live_mut().unwrap().zoom_in.press();
        let current = router.view_state().pending_timer.unwrap();

        assert_ne!(current, old);
        assert!(router.on_timer(old).is_empty());
        assert_eq!(router.view_state().zoom_repeat_count, 1);
        assert_eq!(router.view_state().pending_timer, Some(current));
    }

    #[test]
    fn shutdown_keeps_zoom_sessions_distinct() {
        let config = ViewerConfig::default();
        let mut router = ViewRouter::new(&config);
        router.live_mut().unwrap().zoom_out.press();
        let old = router.view_state().pending_timer.unwrap();

        assert_eq!(router.shutdown(&config), vec![Action::ClearTimer(old)]);
        router.live_mut().unwrap().zoom_out.press();

        assert!(router.on_timer(old).is_empty());
        assert_eq!(router.view_state().zoom_repeat_count, 1);
    }

    #[test]
    fn entering_map_fetches_fix_when_ready() {
        let config = ViewerConfig::default();
        let mut router = ViewRouter::new(&config);
        let actions = router.navigate(Tab::Map, MapReadiness::Ready, &config);
        assert_matches!(actions.as_slice(), [Action::Fetch(_)]);
        assert_eq!(router.map().unwrap().phase(), MapPhase::Locating);
    }

    #[test]
    fn entering_map_waits_for_sdk() {
        let config = ViewerConfig::default();
        let mut router = ViewRouter::new(&config);
        assert!(router
            .navigate(Tab::Map, MapReadiness::NotReady, &config)
            .is_empty());
        assert_eq!(router.map().unwrap().phase(), MapPhase::WaitingForMapSdk);
    }

    #[test]
    fn every_map_visit_gets_a_new_session() {
        let config = ViewerConfig::default();
        let mut router = ViewRouter::new(&config);
        router.navigate(Tab::Map, MapReadiness::Ready, &config);
        let first = router.map().unwrap().session();
        router.navigate(Tab::Map, MapReadiness::Ready, &config);
        assert!(router.map().unwrap().session() > first);
    }

    #[test]
    fn zoom_timer_on_other_tab_is_ignored() {
        let config = ViewerConfig::default();
        let mut router = ViewRouter::new(&config);
        router.navigate(Tab::Sensors, MapReadiness::Ready, &config);
        let id = TimerId {
            owner: Owner::ZoomIn,
            generation: 1,
            seq: 1,
        };
        assert!(router.on_timer(id).is_empty());
        assert!(router.live_mut().is_none());
    }
}
