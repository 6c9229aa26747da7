//! Waiting for long-running provider operations.
//!
//! Every mutating provider request returns an [`Operation`] which has to be polled until it is
//! done. The progress of a single operation is modelled as an explicit state machine, see
//! [`OperationPhase`] and [`transition`]. All waiting happens through a [`Clock`].

use std::time::Duration;

use dataproc_shared::time;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, warn};

use crate::api::{ApiError, Operation, ProviderClient};

pub use self::{
    clock::{Clock, SystemClock},
    retry::{RetryConfig, retry_rate_limited},
};

pub(crate) mod clock;
mod retry;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to submit request for {description}"))]
    Submit {
        source: ApiError,
        description: String,
    },

    #[snafu(display("failed to poll operation {operation:?} for {description}"))]
    Poll {
        source: ApiError,
        operation: String,
        description: String,
    },

    #[snafu(display("{description} failed with code {code}: {message}"))]
    OperationFailed {
        description: String,
        operation: String,
        code: i32,
        message: String,
    },

    #[snafu(display(
        "timed out after {timeout} waiting for {description} (operation {operation:?})"
    ))]
    TimedOut {
        description: String,
        operation: String,
        timeout: time::Duration,
    },
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// The phases a single operation goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OperationPhase {
    Requested,
    Polling,
    Done,
    Failed,
    TimedOut,
}

/// Observations which move an operation from one [`OperationPhase`] to the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollEvent {
    /// The provider accepted the request.
    Submitted,

    /// The operation is still running.
    Pending,

    /// The operation finished without error.
    Completed,

    /// The operation finished with an error.
    Errored,

    /// The timeout elapsed before the operation finished.
    DeadlineExceeded,
}

/// Returns the phase following `phase` once `event` was observed.
///
/// Terminal phases are never left.
pub fn transition(phase: OperationPhase, event: PollEvent) -> OperationPhase {
    match (phase, event) {
        (OperationPhase::Done | OperationPhase::Failed | OperationPhase::TimedOut, _) => phase,
        (_, PollEvent::Submitted | PollEvent::Pending) => OperationPhase::Polling,
        (_, PollEvent::Completed) => OperationPhase::Done,
        (_, PollEvent::Errored) => OperationPhase::Failed,
        (_, PollEvent::DeadlineExceeded) => OperationPhase::TimedOut,
    }
}

/// How long and how often an operation is polled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,

    /// Used for both submitting the request and polling the operation.
    pub retry: RetryConfig,
}

/// Submits requests and waits for the resulting operations.
pub struct OperationPoller<'a, C: ?Sized> {
    client: &'a C,
    clock: &'a dyn Clock,
    policy: PollPolicy,
}

impl<'a, C> OperationPoller<'a, C>
where
    C: ProviderClient + ?Sized,
{
    pub fn new(client: &'a C, clock: &'a dyn Clock, policy: PollPolicy) -> Self {
        Self {
            client,
            clock,
            policy,
        }
    }

    /// Submits a request, retrying it while it is rate limited.
    pub fn submit<F>(&self, description: &str, request: F) -> Result<Operation>
    where
        F: FnMut() -> Result<Operation, ApiError>,
    {
        let operation = retry_rate_limited(self.clock, &self.policy.retry, description, request)
            .context(SubmitSnafu { description })?;
        debug!(
            description,
            operation = %operation.name,
            phase = %transition(OperationPhase::Requested, PollEvent::Submitted),
            "request accepted"
        );
        Ok(operation)
    }

    /// Polls `operation` until it is done or the timeout elapsed.
    ///
    /// A timeout doesn't cancel the operation on the provider side.
    pub fn wait(&self, description: &str, mut operation: Operation) -> Result<Operation> {
        let PollPolicy {
            timeout,
            poll_interval,
            retry,
        } = self.policy;
        let deadline = self.clock.now() + timeout;
        let mut phase = OperationPhase::Polling;
        let mut rate_limited = 0;

        loop {
            let now = self.clock.now();
            let event = match (operation.done, operation.error.is_some()) {
                (true, false) => PollEvent::Completed,
                (true, true) => PollEvent::Errored,
                (false, _) if now >= deadline => PollEvent::DeadlineExceeded,
                (false, _) => PollEvent::Pending,
            };
            phase = transition(phase, event);

            match phase {
                OperationPhase::Requested | OperationPhase::Polling => {}
                OperationPhase::Done => {
                    info!(description, operation = %operation.name, "operation finished");
                    return Ok(operation);
                }
                OperationPhase::Failed => {
                    let status = operation.error.unwrap_or_default();
                    return OperationFailedSnafu {
                        description,
                        operation: operation.name,
                        code: status.code,
                        message: status.message,
                    }
                    .fail();
                }
                OperationPhase::TimedOut => {
                    warn!(description, operation = %operation.name, "operation timed out");
                    return TimedOutSnafu {
                        description,
                        operation: operation.name,
                        timeout,
                    }
                    .fail();
                }
            }

            self.clock
                .sleep(poll_interval.min(deadline.saturating_duration_since(now)));

            match self.client.get_operation(&operation.name) {
                Ok(polled) => {
                    debug!(description, operation = %polled.name, done = polled.done, "polled operation");
                    operation = polled;
                    rate_limited = 0;
                }
                Err(err) if err.is_rate_limited() && rate_limited + 1 < retry.max_attempts => {
                    rate_limited += 1;
                    warn!(
                        description,
                        operation = %operation.name,
                        attempt = rate_limited,
                        error = %err,
                        "polling was rate limited"
                    );
                }
                Err(source) => {
                    return Err(source).context(PollSnafu {
                        operation: operation.name,
                        description,
                    });
                }
            }
        }
    }
}
