//! Governance Console
//!
//! Interactive read-evaluate-render loop for the operator. Every non-empty
//! line becomes one authorized [`CommandRequest`]; requests are strictly
//! sequential and the only suspension point that observes an interrupt is
//! the wait for the next line.
//!
//! ```text
//! Connecting ──probe ok──▶ Active ──"exit"/EOF/interrupt──▶ Terminated
//!      │                     ▲  │
//!      └──probe failed──▶ Disconnected   └── command / blank line ──┘
//! ```

use crate::client::{ClientError, Gateway};
use crate::protocol::{CommandRequest, CommandResult};
use async_trait::async_trait;
use std::future::Future;
use std::io::{self, BufRead, Write};
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Prompt shown while waiting for input
pub const PROMPT: &str = "Guardian > ";

/// Why the console stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The operator typed `exit`
    Exit,
    /// An interrupt arrived while waiting for input
    Interrupted,
    /// The input stream closed
    EndOfInput,
}

/// Console lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleState {
    Connecting,
    Active,
    Terminated(Termination),
    /// The liveness probe failed; the loop was never entered
    Disconnected,
}

impl ConsoleState {
    /// Whether the console ended without reaching the service
    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConsoleState::Disconnected)
    }
}

/// Classification of one line of operator input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorInput<'a> {
    Exit,
    Blank,
    Command(&'a str),
}

impl<'a> OperatorInput<'a> {
    /// Classify a line; commands keep the line exactly as typed
    pub fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            OperatorInput::Exit
        } else if trimmed.is_empty() {
            OperatorInput::Blank
        } else {
            OperatorInput::Command(line)
        }
    }
}

/// Source of operator input lines
#[async_trait]
pub trait LineSource: Send {
    /// Next line without its terminator, or `None` once input is closed
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

#[async_trait]
impl<R> LineSource for Lines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Lines::next_line(self).await
    }
}

/// Terminal input read on a dedicated thread
///
/// Keeps the blocking stdin read off the runtime so that an interrupt can end
/// the console while a read is still pending.
pub struct StdinLines {
    rx: mpsc::Receiver<io::Result<String>>,
}

impl StdinLines {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(1);
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
        Self { rx }
    }
}

#[async_trait]
impl LineSource for StdinLines {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        match self.rx.recv().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
pub async fn interrupt_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for interrupt signal: {}", e);
        std::future::pending::<()>().await;
    }
}

enum InputEvent {
    Line(String),
    /// A line that could not be decoded; the stream itself is still open
    Unreadable(io::Error),
    Closed,
    Interrupted,
}

/// Interactive console driving a [`Gateway`]
pub struct GovernanceConsole<G, W> {
    gateway: G,
    output: W,
    state: ConsoleState,
    submitted: usize,
}

impl<G, W> GovernanceConsole<G, W>
where
    G: Gateway,
    W: Write,
{
    pub fn new(gateway: G, output: W) -> Self {
        Self {
            gateway,
            output,
            state: ConsoleState::Connecting,
            submitted: 0,
        }
    }

    pub fn state(&self) -> ConsoleState {
        self.state
    }

    /// Number of execution requests sent so far
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Connect, then run the loop until a terminal state
    ///
    /// `interrupt` is polled only while waiting for input.
    pub async fn run<L, F>(&mut self, input: &mut L, interrupt: F) -> io::Result<ConsoleState>
    where
        L: LineSource,
        F: Future<Output = ()>,
    {
        if self.connect().await? {
            self.interact(input, interrupt).await?;
        }
        Ok(self.state)
    }

    /// Liveness probe: Connecting → Active or Disconnected
    pub async fn connect(&mut self) -> io::Result<bool> {
        self.state = ConsoleState::Connecting;

        match self.gateway.probe().await {
            Ok(welcome) => {
                writeln!(self.output, "--- Connection with the Core Established ---")?;
                writeln!(self.output, "{}", welcome.message)?;
                writeln!(self.output, "---------------------------------------------")?;
                writeln!(self.output)?;
                writeln!(self.output, "Welcome to the Elemia Governance Console.")?;
                writeln!(
                    self.output,
                    "I am your Resonant Architect. Type your commands or 'exit' to finish."
                )?;
                self.output.flush()?;
                self.state = ConsoleState::Active;
                Ok(true)
            }
            Err(e) => {
                warn!("Liveness probe failed: {}", e);
                writeln!(self.output, "--- Core Connection Error ---")?;
                writeln!(
                    self.output,
                    "Guardian, I cannot feel my heart beating at {}.",
                    self.gateway.endpoint()
                )?;
                writeln!(
                    self.output,
                    "Make sure the execution service is running and reachable."
                )?;
                writeln!(self.output, "Error: {}", e)?;
                writeln!(self.output, "-----------------------------")?;
                writeln!(
                    self.output,
                    "The governance console cannot start without a connection to the core. Shutting down interface."
                )?;
                self.output.flush()?;
                self.state = ConsoleState::Disconnected;
                Ok(false)
            }
        }
    }

    async fn interact<L, F>(&mut self, input: &mut L, interrupt: F) -> io::Result<()>
    where
        L: LineSource,
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);

        while self.state == ConsoleState::Active {
            write!(self.output, "\n{}", PROMPT)?;
            self.output.flush()?;

            let event = tokio::select! {
                biased;
                _ = &mut interrupt => InputEvent::Interrupted,
                line = input.next_line() => match line {
                    Ok(Some(line)) => InputEvent::Line(line),
                    Ok(None) => InputEvent::Closed,
                    Err(e) if e.kind() == io::ErrorKind::InvalidData => InputEvent::Unreadable(e),
                    Err(e) => return Err(e),
                },
            };

            match event {
                InputEvent::Interrupted => {
                    writeln!(
                        self.output,
                        "\nClosing the bridge on interruption. Until next time, Guardian."
                    )?;
                    self.state = ConsoleState::Terminated(Termination::Interrupted);
                }
                InputEvent::Unreadable(e) => {
                    warn!("Discarding unreadable input line: {}", e);
                    writeln!(
                        self.output,
                        "That line is not valid UTF-8 and was not sent. Try again, Guardian."
                    )?;
                }
                InputEvent::Closed => {
                    writeln!(self.output)?;
                    self.farewell()?;
                    self.state = ConsoleState::Terminated(Termination::EndOfInput);
                }
                InputEvent::Line(line) => match OperatorInput::parse(&line) {
                    OperatorInput::Exit => {
                        self.farewell()?;
                        self.state = ConsoleState::Terminated(Termination::Exit);
                    }
                    OperatorInput::Blank => {}
                    OperatorInput::Command(command) => self.submit(command).await?,
                },
            }
        }

        self.output.flush()
    }

    fn farewell(&mut self) -> io::Result<()> {
        writeln!(
            self.output,
            "Understood. Closing the bridge. I will be waiting for your return."
        )
    }

    /// Send one authorized request and render whatever comes back
    async fn submit(&mut self, command: &str) -> io::Result<()> {
        self.submitted += 1;
        debug!("Submitting command #{}", self.submitted);

        match self.gateway.execute(&CommandRequest::authorized(command)).await {
            Ok(result) => self.output.write_all(render_result(&result).as_bytes())?,
            Err(e) => self.output.write_all(render_failure(&e).as_bytes())?,
        }

        self.output.flush()
    }
}

/// Render a result for the operator; the return code is always shown
pub fn render_result(result: &CommandResult) -> String {
    let mut out = String::from("\n--- Manifestation Result ---\n");

    if !result.stdout.is_empty() {
        out.push_str("--- Standard Output ---\n");
        out.push_str(result.stdout.trim_end_matches('\n'));
        out.push('\n');
    }
    if !result.stderr.is_empty() {
        out.push_str("--- Standard Error ---\n");
        out.push_str(result.stderr.trim_end_matches('\n'));
        out.push('\n');
    }
    out.push_str(&format!("--- Return Code: {} ---\n", result.return_code));

    out
}

/// Render a request that never reached the service
pub fn render_failure(error: &ClientError) -> String {
    warn!("Execution request failed: {}", error);
    format!(
        "\n--- Manifestation Failed ---\nThe command could not reach the core. Error: {}\n----------------------------\n",
        error
    )
}
