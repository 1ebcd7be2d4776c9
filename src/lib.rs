//! Elemia Gateway Library
//!
//! Authorized remote execution: an HTTP execution service that runs shell
//! command lines behind a confirmation gate, and the interactive governance
//! console that drives it.

pub mod client;
pub mod config;
pub mod console;
pub mod exec;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod service;

pub use client::{ClientError, Gateway, GatewayClient};
pub use config::Config;
pub use console::{ConsoleState, GovernanceConsole, Termination};
pub use exec::{ExecutionFailure, ShellExecutor};
pub use protocol::{CommandRequest, CommandResult, WelcomeMessage};
pub use service::ExecutionService;
