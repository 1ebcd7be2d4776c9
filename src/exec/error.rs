//! Execution Failure Types
//!
//! Every way a request can end without a genuine process exit status.

use crate::protocol::CommandResult;

/// Closed set of non-process outcomes
///
/// Each variant carries the diagnostic reported to the caller in `stderr`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionFailure {
    /// The request did not assert authorization; nothing was spawned
    #[error("{0}")]
    GateRejection(String),

    /// The shell could not be spawned, waited on, or its output decoded
    #[error("The command met unexpected resistance: {0}")]
    Invocation(String),

    /// The wall-clock bound expired and the process group was killed
    #[error("{0}")]
    Timeout(String),
}

impl ExecutionFailure {
    /// Short label used for logs and the `outcome` metric
    pub fn outcome(&self) -> &'static str {
        match self {
            ExecutionFailure::GateRejection(_) => "rejected",
            ExecutionFailure::Invocation(_) => "failed",
            ExecutionFailure::Timeout(_) => "timed_out",
        }
    }

    /// Fold the failure into the wire result for `command`
    pub fn into_result(self, command: impl Into<String>) -> CommandResult {
        CommandResult::failed(command, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::REJECTED_RETURN_CODE;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(ExecutionFailure::GateRejection("no".into()).outcome(), "rejected");
        assert_eq!(ExecutionFailure::Invocation("no".into()).outcome(), "failed");
        assert_eq!(ExecutionFailure::Timeout("no".into()).outcome(), "timed_out");
    }

    #[test]
    fn test_into_result() {
        let result = ExecutionFailure::Timeout("Command timed out after 60s".into())
            .into_result("sleep 100");

        assert_eq!(result.command, "sleep 100");
        assert_eq!(result.return_code, REJECTED_RETURN_CODE);
        assert!(result.stdout.is_empty());
        assert_eq!(result.stderr, "Command timed out after 60s");
    }

    #[test]
    fn test_invocation_message_is_distinct_from_timeout() {
        let invocation = ExecutionFailure::Invocation("spawn failed".into()).to_string();
        assert!(invocation.contains("spawn failed"));
        assert!(!invocation.contains("timed out"));
    }
}
