//! One deadline per request, shared by every downstream call.

use std::future::Future;
use std::time::Duration;

use tokio::time::{error::Elapsed, timeout_at, Instant};

/// The point in time by which a request must finish.
#[derive(Debug, Clone, Copy)]
pub struct RequestDeadline {
    at: Instant,
}

impl RequestDeadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// The smaller of `limit` and the time left.
    pub fn cap(&self, limit: Duration) -> Duration {
        limit.min(self.remaining())
    }

    /// Run `future`, abandoning it when the deadline passes.
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, Elapsed> {
        timeout_at(self.at, future).await
    }
}
