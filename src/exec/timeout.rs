//! Execution Timeout Management
//!
//! This module provides the wall-clock bound applied to every spawned command.

use super::error::ExecutionFailure;
use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Default bound on a single command, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Execution timeout configuration
///
/// Timeouts are enforced to prevent commands from hanging indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    /// The timeout duration
    duration: Duration,
}

impl Default for ExecutionTimeout {
    fn default() -> Self {
        Self::from_secs(DEFAULT_TIMEOUT_SECS)
    }
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use elemia_gateway::exec::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.duration(), Duration::from_secs(30));
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Create a timeout from seconds
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Get the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Diagnostic reported when the bound expires
    pub fn expired_message(&self) -> String {
        format!(
            "Command timed out after {:.1}s and was terminated",
            self.duration.as_secs_f64()
        )
    }

    /// Race a future against the bound
    ///
    /// Returns the future's output if it completes in time, or
    /// [`ExecutionFailure::Timeout`] otherwise. The future is dropped on expiry.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, ExecutionFailure>
    where
        F: Future,
    {
        time::timeout(self.duration, future)
            .await
            .map_err(|_| ExecutionFailure::Timeout(self.expired_message()))
    }
}
