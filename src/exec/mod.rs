//! Command Execution Subsystem
//!
//! This module runs operator-supplied command lines through the host shell.
//! It does not restrict *what* may run; that decision belongs to whoever
//! asserts authorization. What it guarantees is the mechanics around each run.
//!
//! # Guarantees
//!
//! - **Bounded**: every run is raced against a wall-clock timeout (default 60s)
//! - **Contained**: on timeout the whole process group is killed, not just the shell
//! - **Captured**: stdout and stderr are drained concurrently and decoded as UTF-8
//! - **Classified**: every non-process outcome is an [`ExecutionFailure`] variant
//!
//! # Architecture
//!
//! - `executor.rs`: subprocess spawning, output capture and termination
//! - `timeout.rs`: the wall-clock bound
//! - `error.rs`: the closed failure taxonomy

mod error;
mod executor;
mod timeout;

pub use error::ExecutionFailure;
pub use executor::{
    default_shell, ExecutorConfig, ProcessOutput, ShellExecutor, DEFAULT_MAX_OUTPUT_SIZE,
};
pub use timeout::{ExecutionTimeout, DEFAULT_TIMEOUT_SECS};
