//! Virtual-time shell for driving [`Model`] in tests.
//!
//! `FakeShell` performs the actions returned by `Model::handle` the way a real shell
//! would: fetches wait for an explicit response, timers fire when the virtual clock is
//! advanced past them, everything else is recorded.

use std::collections::BTreeMap;

use crate::capabilities::{
    ControlCommand, HttpError, HttpResponse, HttpResult, MapOperation,
    PreferenceKey, TimerOutput,
};
use crate::cycle::{Action, FetchRequest, Owner, TimerId};
use crate::event::Event;
use crate::model::Model;

pub const DEVICE_URL: &str = "http://192.168.1.20:8080";

pub fn ok_json(body: &str) -> HttpResult {
    Ok(HttpResponse::new(
        200,
        body.as_bytes().to_vec(),
        "fake".to_string(),
    ))
}

pub fn status_error(status: u16) -> HttpResult {
    Ok(HttpResponse::new(
        status,
        Vec::new(),
        "fake".to_string(),
    ))
}

pub fn transport_error() -> HttpResult {
    Err(HttpError::ConnectionError {
        host: "192.168.1.20".to_string(),
        message: "connection refused".to_string(),
    })
}

pub fn location_json(lat: f64, lng: f64, accuracy: f64, time: i64) -> String {
    format!(
        r#"{{"connections":[],"location":{{"latitude":{lat},"longitude":{lng},"accuracy":{accuracy},"time":{time}}}}}"#
    )
}

#[derive(Debug, Default)]
pub struct FakeShell {
    pub model: Model,
    now_ms: u64,
    timers: BTreeMap<TimerId, u64>,
    fetches: Vec<FetchRequest>,
    /// Every `StartTimer` ever requested, with its delay.
    pub scheduled: Vec<(TimerId, u64)>,
    /// Control commands with the virtual time they were sent at.
    pub controls: Vec<(u64, ControlCommand)>,
    pub map_ops: Vec<MapOperation>,
    pub persisted: Vec<(PreferenceKey, String)>,
    pub preference_loads: Vec<PreferenceKey>,
}

impl FakeShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// A shell that has sent `Startup` and answered nothing yet.
    pub fn started() -> Self {
        let mut shell = Self::new();
        shell.send(Event::Startup {
            device_url: DEVICE_URL.to_string(),
            config: None,
        });
        shell
    }

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    pub fn send(&mut self, event: Event) {
        let actions = self.model.handle(event);
        self.perform(actions);
    }

    fn perform(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Fetch(fetch) => self.fetches.push(fetch),
                Action::StartTimer { id, delay_ms } => {
                    self.timers.insert(id, self.now_ms + delay_ms);
                    self.scheduled.push((id, delay_ms));
                }
                Action::ClearTimer(id) => {
                    self.timers.remove(&id);
                }
                Action::Map(operation) => self.map_ops.push(operation),
                Action::LoadPreference(key) => self.preference_loads.push(key),
                Action::Persist { key, value } => self.persisted.push((key, value)),
                Action::Control(command) => self.controls.push((self.now_ms, command)),
            }
        }
    }

    pub fn outstanding_fetches(&self) -> &[FetchRequest] {
        &self.fetches
    }

    pub fn outstanding_for(&self, owner: Owner) -> usize {
        self.fetches
            .iter()
            .filter(|f| f.ticket.owner == owner)
            .count()
    }

    /// Answers the oldest outstanding fetch of `owner`. Returns false if there is none.
    pub fn respond(&mut self, owner: Owner, result: HttpResult) -> bool {
        let Some(index) = self.fetches.iter().position(|f| f.ticket.owner == owner) else {
            return false;
        };
        let fetch = self.fetches.remove(index);
        self.send(Event::StatusFetched {
            ticket: fetch.ticket,
            result: Box::new(result),
        });
        true
    }

    pub fn respond_json(&mut self, owner: Owner, body: &str) -> bool {
        self.respond(owner, ok_json(body))
    }

    pub fn fail(&mut self, owner: Owner) -> bool {
        self.respond(owner, transport_error())
    }

    /// Moves the clock forward, firing due timers in order.
    pub fn advance(&mut self, ms: u64) {
        let target = self.now_ms + ms;
        loop {
            let next = self
                .timers
                .iter()
                .filter(|(_, due)| **due <= target)
                .min_by_key(|(id, due)| (**due, **id))
                .map(|(id, due)| (*id, *due));
            let Some((id, due)) = next else {
                break;
            };
            self.timers.remove(&id);
            self.now_ms = due;
            self.send(Event::TimerSettled(TimerOutput::Fired(id)));
        }
        self.now_ms = target;
    }

    /// Pending timers with their due times.
    pub fn pending_timers(&self) -> Vec<(TimerId, u64)> {
        self.timers.iter().map(|(id, due)| (*id, *due)).collect()
    }

    pub fn pending_timers_for(&self, owner: Owner) -> usize {
        self.timers.keys().filter(|id| id.owner == owner).count()
    }

    pub fn last_delay(&self, owner: Owner) -> Option<u64> {
        self.scheduled
            .iter()
            .rev()
            .find(|(id, _)| id.owner == owner)
            .map(|(_, delay)| *delay)
    }
}
