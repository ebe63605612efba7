//! Process-wide status pollers.

use tracing::{debug, warn};

use crate::capabilities::{HttpResult, Resource};
use crate::config::ViewerConfig;
use crate::cycle::{Action, FetchRequest, Owner, PollCycle, Ticket, TimerId};
use crate::status::{classify, FetchError, StatusSnapshot};

/// Outcome of one accepted poll, together with the timer for the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct PollStep {
    pub outcome: Result<StatusSnapshot, FetchError>,
    pub next: Action,
}

/// Fetches one resource forever: short delay after success, longer after failure.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    resource: Resource,
    cycle: PollCycle,
    ok_delay_ms: u64,
    retry_delay_ms: u64,
}

impl StatusPoller {
    pub fn new(owner: Owner, resource: Resource, config: &ViewerConfig) -> Self {
        Self {
            resource,
            cycle: PollCycle::new(owner),
            ok_delay_ms: config.status_ok_interval_ms,
            retry_delay_ms: config.status_retry_interval_ms,
        }
    }

    pub fn streams(config: &ViewerConfig) -> Self {
        Self::new(Owner::StreamPoller, Resource::Status, config)
    }

    pub fn sensors(config: &ViewerConfig) -> Self {
        Self::new(Owner::SensorPoller, Resource::Sensors, config)
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn owner(&self) -> Owner {
        self.cycle.owner()
    }

    pub fn set_delays(&mut self, config: &ViewerConfig) {
        self.ok_delay_ms = config.status_ok_interval_ms;
        self.retry_delay_ms = config.status_retry_interval_ms;
    }

    pub fn is_running(&self) -> bool {
        self.cycle.is_active()
    }

    pub fn pending_timer(&self) -> Option<TimerId> {
        self.cycle.pending_timer()
    }

    /// Issues the first fetch. Does nothing while already running.
    pub fn start(&mut self) -> Vec<Action> {
        match self.cycle.begin() {
            Some(ticket) => {
                debug!(resource = self.resource.path(), "polling started");
                vec![self.fetch(ticket)]
            }
            None => Vec::new(),
        }
    }

    /// Cancels the pending timer; any response still in flight becomes inert.
    pub fn stop(&mut self) -> Vec<Action> {
        debug!(resource = self.resource.path(), "polling stopped");
        self.cycle.retire().into_iter().collect()
    }

    pub fn on_response(&mut self, ticket: Ticket, result: HttpResult) -> Option<PollStep> {
        if !self.cycle.accept_response(ticket) {
            return None;
        }

        let outcome = classify(result, self.resource);
        if let Err(e) = &outcome {
            warn!(
                resource = self.resource.path(),
                kind = e.kind().code(),
                error = %e,
                "status poll failed"
            );
        }
        let next = self.cycle.rearm(self.delay_for(&outcome));
        Some(PollStep { outcome, next })
    }

    pub fn on_timer(&mut self, id: TimerId) -> Vec<Action> {
        match self.cycle.accept_timer(id) {
            Some(ticket) => vec![self.fetch(ticket)],
            None => Vec::new(),
        }
    }

    pub fn delay_for(&self, outcome: &Result<StatusSnapshot, FetchError>) -> u64 {
        match outcome {
            Ok(_) => self.ok_delay_ms,
            Err(_) => self.retry_delay_ms,
        }
    }

    fn fetch(&self, ticket: Ticket) -> Action {
        Action::Fetch(FetchRequest {
            ticket,
            resource: self.resource,
            precise_location: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{HttpError, HttpResponse};
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn ok(body: &str) -> HttpResult {
        Ok(HttpResponse::new(
            200,
            body.as_bytes().to_vec(),
            "req".to_string(),
        ))
    }

    fn started(poller: &mut StatusPoller) -> Ticket {
        match poller.start().as_slice() {
            [Action::Fetch(fetch)] => fetch.ticket,
            other => panic!("expected a single fetch, got {other:?}"),
        }
    }

    fn next_delay(step: &PollStep) -> u64 {
        match step.next {
            Action::StartTimer { delay_ms, .. } => delay_ms,
            ref other => panic!("expected a timer, got {other:?}"),
        }
    }

    #[test]
    fn success_schedules_short_delay() {
        let mut poller = StatusPoller::streams(&ViewerConfig::default());
        let ticket = started(&mut poller);
        let step = poller.on_response(ticket, ok(r#"{"connections":[]}"#)).unwrap();
        assert!(step.outcome.is_ok());
        assert_eq!(next_delay(&step), 2_500);
    }

    #[test]
    fn transport_error_schedules_retry_delay() {
        let mut poller = StatusPoller::sensors(&ViewerConfig::default());
        let ticket = started(&mut poller);
        let step = poller
            .on_response(
                ticket,
                Err(HttpError::ConnectionError {
                    host: "camera".into(),
                    message: "unreachable".into(),
                }),
            )
            .unwrap();
        assert_matches!(step.outcome, Err(FetchError::Transport(_)));
        assert_eq!(next_delay(&step), 5_000);
    }

    #[test]
    fn malformed_body_schedules_retry_delay() {
        let mut poller = StatusPoller::streams(&ViewerConfig::default());
        let ticket = started(&mut poller);
        let step = poller.on_response(ticket, ok("not json")).unwrap();
        assert_matches!(step.outcome, Err(FetchError::Malformed(_)));
        assert_eq!(next_delay(&step), 5_000);
    }

    #[test]
    fn timer_issues_next_fetch() {
        let mut poller = StatusPoller::streams(&ViewerConfig::default());
        let ticket = started(&mut poller);
        poller.on_response(ticket, ok("{}")).unwrap();
        let id = poller.pending_timer().unwrap();
        assert_matches!(
            poller.on_timer(id).as_slice(),
            [Action::Fetch(FetchRequest {
                resource: Resource::Status,
                precise_location: false,
                ..
            })]
        );
    }

    #[test]
    fn start_is_idempotent() {
        let mut poller = StatusPoller::streams(&ViewerConfig::default());
        started(&mut poller);
        assert!(poller.start().is_empty());
    }

    #[test]
    fn response_after_stop_is_discarded() {
        let mut poller = StatusPoller::streams(&ViewerConfig::default());
        let ticket = started(&mut poller);
        assert!(poller.stop().is_empty());
        assert!(poller.on_response(ticket, ok("{}")).is_none());
        assert!(!poller.is_running());
    }

    #[test]
    fn stop_clears_pending_timer() {
        let mut poller = StatusPoller::streams(&ViewerConfig::default());
        let ticket = started(&mut poller);
        poller.on_response(ticket, ok("{}")).unwrap();
        let id = poller.pending_timer().unwrap();
        assert_eq!(poller.stop(), vec![Action::ClearTimer(id)]);
        assert!(poller.on_timer(id).is_empty());
    }

    proptest! {
        #[test]
        fn delay_depends_only_on_http_200(status in 100u16..600) {
            let mut poller = StatusPoller::streams(&ViewerConfig::default());
            let ticket = started(&mut poller);
            let result = Ok(HttpResponse::new(
                status,
                b"{}".to_vec(),
                "req".to_string(),
            ));
            let step = poller.on_response(ticket, result).unwrap();
            let expected = if status == 200 { 2_500 } else { 5_000 };
            prop_assert_eq!(next_delay(&step), expected);
        }
    }
}
