//! Run context shared by concurrent traversals
//!
//! Carries the run deadline and the cancellation token. Traversals only ever
//! read it, at fetch boundaries.

use super::error::ScrapeError;
use super::model::ResourceKind;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default wall-clock budget for one run
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline and cancellation signal for one run
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    cancel: CancellationToken,
    deadline: Instant,
}

impl ScrapeContext {
    /// Create a context whose deadline is `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Instant::now() + timeout,
        }
    }

    /// Signal every traversal sharing this context to stop
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Check whether a traversal of `kind` may issue its next fetch.
    /// The deadline is checked first so an expired run reports as such
    /// even after siblings were cancelled.
    pub fn check(&self, kind: ResourceKind) -> Result<(), ScrapeError> {
        if Instant::now() >= self.deadline {
            return Err(ScrapeError::DeadlineExceeded { kind });
        }
        if self.cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled { kind });
        }
        Ok(())
    }
}

impl Default for ScrapeContext {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_RUN_TIMEOUT)
    }
}
