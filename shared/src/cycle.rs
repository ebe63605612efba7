//! Generation-tagged request/timer cycles.
//!
//! Every controller that talks to the outside world owns a [`PollCycle`]. Each request
//! it issues carries a [`Ticket`] and each timer a [`TimerId`]; both embed the cycle's
//! generation. Retiring the cycle bumps the generation, so anything still in flight
//! from the old generation is recognised and dropped when it eventually comes back.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capabilities::{ControlCommand, MapOperation, PreferenceKey, Resource};

/// The controller a request or timer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Owner {
    StreamPoller,
    SensorPoller,
    LocationSync,
    ZoomIn,
    ZoomOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticket {
    pub owner: Owner,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId {
    pub owner: Owner,
    pub generation: u64,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: Ticket,
    pub resource: Resource,
    pub precise_location: bool,
}

/// Side effects requested by the controllers, executed by the app glue.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Fetch(FetchRequest),
    StartTimer { id: TimerId, delay_ms: u64 },
    ClearTimer(TimerId),
    Map(MapOperation),
    LoadPreference(PreferenceKey),
    Persist { key: PreferenceKey, value: String },
    Control(ControlCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    InFlight,
    /// Response accepted, scheduling decision not made yet.
    Settling,
    Waiting(TimerId),
}

#[derive(Debug, Clone)]
pub struct PollCycle {
    owner: Owner,
    generation: u64,
    seq: u64,
    phase: Phase,
}

impl PollCycle {
    pub fn new(owner: Owner) -> Self {
        Self::with_generation(owner, 0)
    }

    pub fn with_generation(owner: Owner, generation: u64) -> Self {
        Self {
            owner,
            generation,
            seq: 0,
            phase: Phase::Idle,
        }
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            owner: self.owner,
            generation: self.generation,
        }
    }

    /// Starts a cycle from idle. Returns `None` while a request or timer is outstanding.
    pub fn begin(&mut self) -> Option<Ticket> {
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::InFlight;
                Some(self.ticket())
            }
            _ => None,
        }
    }

    /// Accepts the response for the in-flight request of the current generation.
    pub fn accept_response(&mut self, ticket: Ticket) -> bool {
        if ticket == self.ticket() && self.phase == Phase::InFlight {
            self.phase = Phase::Settling;
            true
        } else {
            debug!(
                owner = ?self.owner,
                generation = self.generation,
                stale_generation = ticket.generation,
                "discarding stale response"
            );
            false
        }
    }

    /// Schedules the next cycle.
    pub fn rearm(&mut self, delay_ms: u64) -> Action {
        self.seq += 1;
        let id = TimerId {
            owner: self.owner,
            generation: self.generation,
            seq: self.seq,
        };
        self.phase = Phase::Waiting(id);
        debug!(owner = ?self.owner, delay_ms, seq = self.seq, "next cycle scheduled");
        Action::StartTimer { id, delay_ms }
    }

    /// Ends the current cycle without scheduling another one.
    pub fn park(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Accepts a timer firing if it is the one this cycle is waiting for, moving
    /// straight into the next request.
    pub fn accept_timer(&mut self, id: TimerId) -> Option<Ticket> {
        if self.phase == Phase::Waiting(id) {
            self.phase = Phase::InFlight;
            Some(self.ticket())
        } else {
            debug!(owner = ?self.owner, ?id, "discarding stale timer");
            None
        }
    }

    /// Invalidates everything issued so far and returns to idle.
    pub fn retire(&mut self) -> Option<Action> {
        let pending = self.pending_timer();
        self.generation += 1;
        self.seq = 0;
        self.phase = Phase::Idle;
        pending.map(Action::ClearTimer)
    }

    pub fn pending_timer(&self) -> Option<TimerId> {
        match self.phase {
            Phase::Waiting(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn in_flight(&self) -> bool {
        self.phase == Phase::InFlight
    }
}
