//! Execution Service
//!
//! The authorization gate in front of [`ShellExecutor`]. Every request yields
//! exactly one [`CommandResult`]; no failure escapes as an error.

use crate::config::ExecutionConfig;
use crate::exec::{ExecutionFailure, ExecutorConfig, ProcessOutput, ShellExecutor};
use crate::metrics::{self, EXECUTIONS_IN_FLIGHT, OUTCOME_COMPLETED};
use crate::protocol::{CommandRequest, CommandResult, GATE_REJECTION_MESSAGE};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Longest command prefix written to the log
const LOG_PREVIEW_CHARS: usize = 80;

/// Stateless execution service
///
/// Cheap to clone; concurrent calls share nothing but the host OS.
#[derive(Debug, Clone, Default)]
pub struct ExecutionService {
    executor: ShellExecutor,
}

impl ExecutionService {
    pub fn new(executor: ShellExecutor) -> Self {
        Self { executor }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(ShellExecutor::with_config(ExecutorConfig::from(config)))
    }

    pub fn executor(&self) -> &ShellExecutor {
        &self.executor
    }

    /// Run one request to completion
    ///
    /// Unauthorized requests are answered without spawning anything. All
    /// other failures are folded into a result with return code `-1`.
    ///
    /// The command runs on its own task, so dropping the returned future
    /// (for example when an HTTP client disconnects) does not cut the run
    /// short; the timeout still governs it.
    pub async fn execute(&self, request: CommandRequest) -> CommandResult {
        let request_id = Uuid::new_v4();
        let start = Instant::now();

        let (result, outcome) = match self.run(&request, request_id).await {
            Ok(output) => (
                CommandResult::completed(
                    request.command,
                    output.stdout,
                    output.stderr,
                    output.exit_code,
                ),
                OUTCOME_COMPLETED,
            ),
            Err(failure) => {
                let outcome = failure.outcome();
                (failure.into_result(request.command), outcome)
            }
        };

        let elapsed = start.elapsed();
        metrics::record_execution(outcome, elapsed);
        info!(
            %request_id,
            outcome,
            return_code = result.return_code,
            duration_ms = elapsed.as_millis() as u64,
            "Execution request finished"
        );

        result
    }

    async fn run(
        &self,
        request: &CommandRequest,
        request_id: Uuid,
    ) -> Result<ProcessOutput, ExecutionFailure> {
        if !request.authorized {
            info!(%request_id, "Rejected execution request without authorization");
            return Err(ExecutionFailure::GateRejection(
                GATE_REJECTION_MESSAGE.to_string(),
            ));
        }

        info!(%request_id, "Executing: {}", preview(&request.command));

        let executor = self.executor.clone();
        let command = request.command.clone();
        let task = tokio::spawn(async move {
            EXECUTIONS_IN_FLIGHT.inc();
            let output = executor.execute(&command).await;
            EXECUTIONS_IN_FLIGHT.dec();
            output
        });

        match task.await {
            Ok(output) => output,
            Err(e) => {
                warn!(%request_id, "Execution task aborted: {}", e);
                Err(ExecutionFailure::Invocation(format!(
                    "execution task aborted: {}",
                    e
                )))
            }
        }
    }
}

fn preview(command: &str) -> String {
    if command.chars().count() > LOG_PREVIEW_CHARS {
        let head: String = command.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("{}... ({} chars)", head, command.chars().count())
    } else {
        command.to_string()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::protocol::REJECTED_RETURN_CODE;
    use proptest::prelude::*;
    use std::time::Duration;

    fn service_with_timeout(timeout: Duration) -> ExecutionService {
        let config = ExecutorConfig::default().with_timeout(timeout);
        ExecutionService::new(ShellExecutor::with_config(config))
    }

    #[tokio::test]
    async fn test_gate_rejects_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("written");
        let command = format!("touch {}", marker.display());

        let service = ExecutionService::default();
        let result = service
            .execute(CommandRequest::unauthorized(command.clone()))
            .await;

        assert_eq!(result.return_code, REJECTED_RETURN_CODE);
        assert_eq!(result.command, command);
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, GATE_REJECTION_MESSAGE);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_authorized_request_has_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("written");
        let command = format!("touch {}", marker.display());

        let service = ExecutionService::default();
        let result = service.execute(CommandRequest::authorized(command)).await;

        assert_eq!(result.return_code, 0);
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_echo_hi() {
        let service = ExecutionService::default();
        let result = service.execute(CommandRequest::authorized("echo hi")).await;

        assert!(result.stdout.contains("hi"));
        assert_eq!(result.stderr, "");
        assert_eq!(result.return_code, 0);
    }

    #[tokio::test]
    async fn test_exit_status_passthrough() {
        let service = ExecutionService::default();
        let result = service.execute(CommandRequest::authorized("exit 7")).await;

        assert_eq!(result.return_code, 7);
        assert_eq!(result.command, "exit 7");
    }

    #[tokio::test]
    async fn test_output_fidelity() {
        let service = ExecutionService::default();
        let result = service
            .execute(CommandRequest::authorized("echo \"hello\""))
            .await;

        assert_eq!(result.stdout.trim_end_matches('\n'), "hello");
        assert_eq!(result.return_code, 0);
    }

    #[tokio::test]
    async fn test_timeout_is_folded_into_result() {
        let service = service_with_timeout(Duration::from_secs(1));
        let start = Instant::now();

        let result = service.execute(CommandRequest::authorized("sleep 30")).await;

        assert_eq!(result.return_code, REJECTED_RETURN_CODE);
        assert!(result.stderr.contains("timed out"));
        assert!(result.stdout.is_empty());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_invocation_failure_is_folded_into_result() {
        let config = ExecutorConfig::default()
            .with_shell("/nonexistent/shell-12345", vec!["-c".to_string()]);
        let service = ExecutionService::new(ShellExecutor::with_config(config));

        let result = service.execute(CommandRequest::authorized("echo hi")).await;

        assert_eq!(result.return_code, REJECTED_RETURN_CODE);
        assert!(!result.stderr.is_empty());
        assert!(!result.stderr.contains("timed out"));
    }

    #[tokio::test]
    async fn test_concurrent_requests() {
        let service = ExecutionService::default();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .execute(CommandRequest::authorized(format!("echo {}", i)))
                        .await
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.unwrap();
            assert_eq!(result.stdout.trim(), i.to_string());
            assert_eq!(result.return_code, 0);
        }
    }

    #[test]
    fn test_preview_truncates_long_commands() {
        assert_eq!(preview("ls"), "ls");

        let long = "x".repeat(200);
        let shown = preview(&long);
        assert!(shown.starts_with(&"x".repeat(LOG_PREVIEW_CHARS)));
        assert!(shown.ends_with("(200 chars)"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_rejection_echoes_command(command in ".*") {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let service = ExecutionService::default();

            let result = runtime.block_on(
                service.execute(CommandRequest::unauthorized(command.clone()))
            );

            prop_assert_eq!(result.command, command);
            prop_assert_eq!(result.return_code, -1);
        }
    }
}
