// Elemia Gateway - Main Entry Point
//
// One binary, two roles:
// - `serve`: the execution service behind HTTP
// - `console`: the interactive governance console that drives it

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use elemia_gateway::config::Config;
use elemia_gateway::console::{interrupt_signal, GovernanceConsole, StdinLines};
use elemia_gateway::logging::init_logging;
use elemia_gateway::{server, GatewayClient};
use std::path::PathBuf;
use tracing::{info, Level};

/// Elemia: authorized remote execution gateway
#[derive(Parser, Debug)]
#[command(name = "elemia")]
#[command(author = "Elemia Contributors")]
#[command(version)]
#[command(about = "Authorized remote execution gateway and governance console", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to a TOML configuration file (default: ~/.config/elemia/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the execution service
    Serve {
        /// Address to bind
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Start the interactive governance console
    Console {
        /// Base address of the execution service
        #[arg(long)]
        url: Option<String>,
    },
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::load_from_path(path)?
        }
        None => Config::load()?,
    };

    match args.command {
        Some(Commands::Serve { ref bind, port }) => {
            if let Some(bind) = bind {
                config.server.bind_address = bind.clone();
            }
            if let Some(port) = port {
                config.server.port = port;
            }
        }
        Some(Commands::Console { ref url }) => {
            if let Some(url) = url {
                config.console.base_url = url.clone();
            }
        }
        None => {}
    }

    config.validate().context("Invalid configuration")?;
    if matches!(args.command, Some(Commands::Console { .. })) {
        config
            .validate_console()
            .context("Invalid console configuration")?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let level = if args.verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };
    init_logging(level, &config.logging.format)?;

    info!("Elemia gateway v{} starting...", env!("CARGO_PKG_VERSION"));

    match args.command {
        Some(Commands::Serve { .. }) => {
            server::run_server(&config).await?;
        }
        Some(Commands::Console { .. }) => {
            run_console(&config).await?;
        }
        None => {
            info!("No command specified. Use \"elemia --help\" for usage.");
        }
    }

    Ok(())
}

/// Run the console against the configured service
async fn run_console(config: &Config) -> Result<()> {
    let client = GatewayClient::new(
        config.console.base_url.clone(),
        config.console.request_timeout(),
    )?;

    println!("Starting governance interface protocol...");

    let mut console = GovernanceConsole::new(client, std::io::stdout());
    let mut input = StdinLines::spawn();
    let state = console.run(&mut input, interrupt_signal()).await?;

    info!("Console finished in state {:?}", state);
    if state.is_disconnected() {
        std::process::exit(1);
    }

    Ok(())
}
