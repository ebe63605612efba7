use crux_core::capability::{CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::cycle::TimerId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimerOperation {
    Start { id: TimerId, millis: u64 },
    Clear { id: TimerId },
}

impl Operation for TimerOperation {
    type Output = TimerOutput;
}

/// Resolution of a `Start` request. The shell answers `Cleared` when it drops a
/// timer in response to `Clear`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimerOutput {
    Fired(TimerId),
    Cleared(TimerId),
}

impl TimerOutput {
    pub fn id(&self) -> TimerId {
        match self {
            TimerOutput::Fired(id) | TimerOutput::Cleared(id) => *id,
        }
    }
}

#[derive(crux_core::macros::Capability)]
pub struct Timer<Ev> {
    context: CapabilityContext<TimerOperation, Ev>,
}

impl<Ev> Timer<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<TimerOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn start<F>(&self, id: TimerId, millis: u64, callback: F)
    where
        F: FnOnce(TimerOutput) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let output = ctx
                .request_from_shell(TimerOperation::Start { id, millis })
                .await;
            ctx.update_app(callback(output));
        });
    }

    pub fn clear(&self, id: TimerId) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(TimerOperation::Clear { id }).await;
        });
    }
}
