// factory-pipeline/src/pacer.rs
use crate::cancel::CancellationToken;
use crossbeam_channel::{select, tick, Receiver};
use std::time::{Duration, Instant};

/// Fixed-rate wait that gives up as soon as the token is cancelled.
///
/// Lane workers use it for the sampling interval, the dispatcher for its
/// idle poll; neither ever sleeps past a shutdown.
pub struct Pacer {
    ticker: Receiver<Instant>,
    token: CancellationToken,
    interval: Duration,
}

impl Pacer {
    pub fn new(interval: Duration, token: CancellationToken) -> Self {
        Self {
            ticker: tick(interval),
            token,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the next tick. Returns `false` if cancelled instead.
    pub fn wait(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        select! {
            recv(self.ticker) -> _ => !self.token.is_cancelled(),
            recv(self.token.cancelled()) -> _ => false,
        }
    }
}
