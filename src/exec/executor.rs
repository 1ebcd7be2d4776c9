//! Shell Executor
//!
//! Runs one command line through the host shell with a wall-clock bound,
//! capturing standard output and standard error as text.
//!
//! The child is placed in its own process group so that a timeout can take
//! down everything the command started, not only the shell itself. Output is
//! drained on dedicated tasks while the child runs, so a chatty command can
//! never block on a full pipe.

use super::error::ExecutionFailure;
use super::timeout::{ExecutionTimeout, DEFAULT_TIMEOUT_SECS};
use crate::protocol::REJECTED_RETURN_CODE;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Maximum captured size per stream in bytes (8MB)
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 8 * 1024 * 1024;

/// Appended to a stream that was cut at the size limit
const TRUNCATION_MARKER: &str = "...";

/// Host shell used when none is configured
pub fn default_shell() -> (String, Vec<String>) {
    if cfg!(windows) {
        ("cmd".to_string(), vec!["/C".to_string()])
    } else {
        ("/bin/sh".to_string(), vec!["-c".to_string()])
    }
}

/// Output of a process that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Standard output (truncated if too large)
    pub stdout: String,

    /// Standard error (truncated if too large)
    pub stderr: String,

    /// Exit status; `128 + signal` for a signal-terminated process on Unix
    pub exit_code: i32,

    /// Wall-clock time from spawn to completion
    pub duration: Duration,
}

/// Configuration for shell execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Shell interpreter (default: `/bin/sh`, `cmd` on Windows)
    pub shell: String,

    /// Arguments placed before the command line (default: `-c`, `/C` on Windows)
    pub shell_args: Vec<String>,

    /// Timeout for execution (default: 60 seconds)
    pub timeout: Duration,

    /// Maximum captured bytes per stream (default: 8MB)
    pub max_output_size: usize,

    /// Working directory for command execution (default: inherited)
    pub working_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let (shell, shell_args) = default_shell();
        Self {
            shell,
            shell_args,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            working_dir: None,
        }
    }
}

impl ExecutorConfig {
    /// Set the wall-clock bound
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-stream capture limit
    pub fn with_max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }

    /// Run commands from a fixed directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Use a different shell interpreter
    pub fn with_shell(mut self, shell: impl Into<String>, shell_args: Vec<String>) -> Self {
        self.shell = shell.into();
        self.shell_args = shell_args;
        self
    }
}

/// Executor for shell command lines
///
/// Stateless apart from its configuration: clones are cheap and concurrent
/// calls to [`ShellExecutor::execute`] never share anything but the host OS.
///
/// # Example
///
/// ```ignore
/// use elemia_gateway::exec::ShellExecutor;
///
/// #[tokio::main]
/// async fn main() {
///     let executor = ShellExecutor::new();
///     let output = executor.execute("echo hello").await.unwrap();
///     assert_eq!(output.stdout, "hello\n");
///     assert_eq!(output.exit_code, 0);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    config: ExecutorConfig,
}

impl ShellExecutor {
    /// Create a new executor with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new executor with custom configuration
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the config
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `command` through the configured shell
    ///
    /// # Errors
    ///
    /// - [`ExecutionFailure::Invocation`] if the shell cannot be spawned, the
    ///   wait or a pipe read fails, or a stream is not valid UTF-8
    /// - [`ExecutionFailure::Timeout`] if the command (including anything it
    ///   left holding its output pipes) outlives the configured bound
    pub async fn execute(&self, command: &str) -> Result<ProcessOutput, ExecutionFailure> {
        let start = Instant::now();
        debug!(shell = %self.config.shell, "Spawning command");

        let mut process = Command::new(&self.config.shell);
        process
            .args(&self.config.shell_args)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.config.working_dir {
            process.current_dir(dir);
        }

        #[cfg(unix)]
        {
            process.process_group(0);
        }

        let mut child = process.spawn().map_err(|e| {
            ExecutionFailure::Invocation(format!(
                "failed to spawn shell '{}': {}",
                self.config.shell, e
            ))
        })?;
        let pid = child.id();

        let limit = self.config.max_output_size;
        let mut stdout_reader = spawn_reader(child.stdout.take(), limit);
        let mut stderr_reader = spawn_reader(child.stderr.take(), limit);

        let timeout = ExecutionTimeout::new(self.config.timeout);
        let outcome = timeout
            .run(async {
                let status = child.wait().await.map_err(|e| {
                    ExecutionFailure::Invocation(format!("failed to wait for process: {}", e))
                })?;
                let stdout = join_reader(&mut stdout_reader, "stdout").await?;
                let stderr = join_reader(&mut stderr_reader, "stderr").await?;
                Ok::<_, ExecutionFailure>((status, stdout, stderr))
            })
            .await;

        let (status, stdout, stderr) = match outcome {
            Ok(Ok(collected)) => collected,
            Ok(Err(failure)) | Err(failure) => {
                if matches!(failure, ExecutionFailure::Timeout(_)) {
                    warn!(
                        "Command timed out after {:?}, killing process group",
                        self.config.timeout
                    );
                }
                terminate(&mut child, pid).await;
                stdout_reader.abort();
                stderr_reader.abort();
                return Err(failure);
            }
        };

        let duration = start.elapsed();
        let exit_code = exit_code(status);
        info!(exit_code, duration_ms = duration.as_millis() as u64, "Command finished");

        Ok(ProcessOutput {
            stdout: decode_stream("stdout", stdout, limit)?,
            stderr: decode_stream("stderr", stderr, limit)?,
            exit_code,
            duration,
        })
    }
}

/// Drain a child stream, keeping at most `limit + 1` bytes
///
/// The extra byte tells the decoder the stream overflowed. Anything beyond is
/// read and discarded so the child never blocks on a full pipe.
fn spawn_reader<R>(stream: Option<R>, limit: usize) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut captured = Vec::new();
        if let Some(mut stream) = stream {
            let cap = (limit as u64).saturating_add(1);
            (&mut stream).take(cap).read_to_end(&mut captured).await?;
            tokio::io::copy(&mut stream, &mut tokio::io::sink()).await?;
        }
        Ok(captured)
    })
}

async fn join_reader(
    reader: &mut JoinHandle<std::io::Result<Vec<u8>>>,
    stream: &str,
) -> Result<Vec<u8>, ExecutionFailure> {
    match reader.await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(ExecutionFailure::Invocation(format!(
            "failed to read {}: {}",
            stream, e
        ))),
        Err(e) => Err(ExecutionFailure::Invocation(format!(
            "{} reader stopped: {}",
            stream, e
        ))),
    }
}

/// Kill the child's process group (Unix) and the child itself, then reap it
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            // SAFETY: killpg only sends a signal; the group id is the pid of
            // the leader we spawned with process_group(0).
            let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
            if rc != 0 {
                debug!(
                    "killpg({}) failed: {}",
                    pid,
                    std::io::Error::last_os_error()
                );
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }

    if let Err(e) = child.kill().await {
        debug!("Child already gone: {}", e);
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    REJECTED_RETURN_CODE
}

/// Decode a captured stream as strict UTF-8, applying the size limit
///
/// A multi-byte character split by the limit is dropped rather than reported
/// as a decoding failure.
fn decode_stream(stream: &str, mut bytes: Vec<u8>, limit: usize) -> Result<String, ExecutionFailure> {
    let truncated = bytes.len() > limit;
    if truncated {
        bytes.truncate(limit);
    }

    let mut text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) if truncated && e.utf8_error().error_len().is_none() => {
            let valid = e.utf8_error().valid_up_to();
            String::from_utf8_lossy(&e.as_bytes()[..valid]).into_owned()
        }
        Err(e) => {
            return Err(ExecutionFailure::Invocation(format!(
                "{} is not valid UTF-8: {}",
                stream,
                e.utf8_error()
            )))
        }
    };

    if truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    Ok(text)
}
