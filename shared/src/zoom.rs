//! Hold-to-repeat camera zoom.

use tracing::debug;

use crate::capabilities::ControlCommand;
use crate::config::ViewerConfig;
use crate::cycle::{Action, Owner, TimerId};
use crate::event::ZoomDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldState {
    Idle,
    Active { count: u64, pending: TimerId },
}

/// Sends a zoom command on press, again after the first repeat delay and then at the
/// repeat cadence until released. Each press starts a new session token; timers from
/// older sessions are ignored.
#[derive(Debug, Clone)]
pub struct HoldToRepeat {
    direction: ZoomDirection,
    token: u64,
    state: HoldState,
    first_delay_ms: u64,
    repeat_delay_ms: u64,
    step: u8,
}

impl HoldToRepeat {
    pub fn new(direction: ZoomDirection, config: &ViewerConfig) -> Self {
        Self {
            direction,
            token: 0,
            state: HoldState::Idle,
            first_delay_ms: config.zoom_first_repeat_ms,
            repeat_delay_ms: config.zoom_repeat_ms,
            step: config.zoom_step,
        }
    }

    /// Takes effect from the next press.
    pub fn configure(&mut self, config: &ViewerConfig) {
        self.first_delay_ms = config.zoom_first_repeat_ms;
        self.repeat_delay_ms = config.zoom_repeat_ms;
        self.step = config.zoom_step;
    }

    pub fn owner(&self) -> Owner {
        match self.direction {
            ZoomDirection::In => Owner::ZoomIn,
            ZoomDirection::Out => Owner::ZoomOut,
        }
    }

    pub fn press(&mut self) -> Vec<Action> {
        let mut actions = self.release();
        self.token += 1;
        debug!(direction = ?self.direction, token = self.token, "zoom hold started");
        actions.extend(self.fire(1, self.first_delay_ms));
        actions
    }

    pub fn on_timer(&mut self, id: TimerId) -> Vec<Action> {
        match self.state {
            HoldState::Active { count, pending } if pending == id => {
                self.fire(count + 1, self.repeat_delay_ms)
            }
            _ => {
                debug!(direction = ?self.direction, ?id, "discarding stale zoom repeat");
                Vec::new()
            }
        }
    }

    pub fn release(&mut self) -> Vec<Action> {
        match self.state {
            HoldState::Active { pending, count } => {
                debug!(direction = ?self.direction, count, "zoom hold released");
                self.token += 1;
                self.state = HoldState::Idle;
                vec![Action::ClearTimer(pending)]
            }
            HoldState::Idle => Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, HoldState::Active { .. })
    }

    /// Commands sent in the current hold.
    pub fn repeat_count(&self) -> u64 {
        match self.state {
            HoldState::Active { count, .. } => count,
            HoldState::Idle => 0,
        }
    }

    pub fn pending_timer(&self) -> Option<TimerId> {
        match self.state {
            HoldState::Active { pending, .. } => Some(pending),
            HoldState::Idle => None,
        }
    }

    fn fire(&mut self, count: u64, delay_ms: u64) -> Vec<Action> {
        let pending = TimerId {
            owner: self.owner(),
            generation: self.token,
            seq: count,
        };
        self.state = HoldState::Active { count, pending };
        vec![
            Action::Control(ControlCommand::Zoom {
                direction: self.direction,
                step: self.step,
            }),
            Action::StartTimer {
                id: pending,
                delay_ms,
            },
        ]
    }
}
