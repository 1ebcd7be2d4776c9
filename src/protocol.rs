//! Gateway Wire Protocol
//!
//! Request and response payloads exchanged between the governance console
//! and the execution service. Both travel as JSON over HTTP.
//!
//! # Return codes
//!
//! `return_code` carries the literal exit status of the spawned process.
//! The value `-1` ([`REJECTED_RETURN_CODE`]) is reserved for outcomes where no
//! genuine exit status exists: a gate rejection, an invocation failure or a
//! timeout. The diagnostic for those outcomes travels in `stderr`.

use serde::{Deserialize, Serialize};

/// Return code reported when no process exit status is available
pub const REJECTED_RETURN_CODE: i32 = -1;

/// Message returned in `stderr` when a request is not authorized
pub const GATE_REJECTION_MESSAGE: &str =
    "Guardian, only you can authorize an act of this magnitude. Confirm your identity.";

/// A request to run one shell command line on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Opaque shell command line, passed verbatim to the host shell
    pub command: String,

    /// Explicit acknowledgment that the caller wants the command executed
    #[serde(alias = "i_am_the_guardian")]
    pub authorized: bool,
}

impl CommandRequest {
    /// Create a request with the authorization flag asserted
    pub fn authorized(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            authorized: true,
        }
    }

    /// Create a request without the authorization flag
    pub fn unauthorized(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            authorized: false,
        }
    }
}

/// Outcome of a single [`CommandRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Echo of the requested command line
    pub command: String,

    /// Captured standard output
    #[serde(default)]
    pub stdout: String,

    /// Captured standard error, or the diagnostic for a non-process outcome
    #[serde(default)]
    pub stderr: String,

    /// Process exit status, or [`REJECTED_RETURN_CODE`]
    #[serde(rename = "returnCode", alias = "return_code")]
    pub return_code: i32,
}

impl CommandResult {
    /// Result of a process that ran to completion
    pub fn completed(
        command: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        return_code: i32,
    ) -> Self {
        Self {
            command: command.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            return_code,
        }
    }

    /// Result of a request that never produced an exit status
    pub fn failed(command: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdout: String::new(),
            stderr: diagnostic.into(),
            return_code: REJECTED_RETURN_CODE,
        }
    }

    /// Whether the process exited with status 0
    pub fn is_success(&self) -> bool {
        self.return_code == 0
    }
}

/// Payload of the liveness endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeMessage {
    /// Human-readable greeting
    pub message: String,
}
