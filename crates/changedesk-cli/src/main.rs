// crates/changedesk-cli/src/main.rs
// ============================================================================
// Module: Changedesk CLI
// Description: Binary entry point for the Changedesk server.
// Purpose: Load configuration and run the HTTP facade.
// Dependencies: changedesk-server, clap, tokio
// ============================================================================

//! ## Overview
//! `changedesk serve` boots the backplane against the configured object
//! store; `changedesk validate-config` checks a configuration file and
//! exits. Configuration resolution follows the server crate: explicit
//! `--config` path, then `CHANGEDESK_CONFIG`, then `changedesk.toml`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use changedesk_server::AppState;
use changedesk_server::ChangedeskConfig;
use clap::Parser;
use clap::Subcommand;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Changedesk change- and announcement-management backplane.
#[derive(Debug, Parser)]
#[command(name = "changedesk", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP facade.
    Serve,
    /// Validate the configuration file and exit.
    ValidateConfig,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Parses arguments and dispatches the selected subcommand.
fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match ChangedeskConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "configuration rejected: {err}");
            return ExitCode::FAILURE;
        }
    };
    match cli.command {
        Command::ValidateConfig => {
            let _ = writeln!(std::io::stdout(), "configuration ok");
            ExitCode::SUCCESS
        }
        Command::Serve => run_server(&config),
    }
}

/// Builds the runtime and serves until shutdown.
fn run_server(config: &ChangedeskConfig) -> ExitCode {
    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "startup failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "runtime start failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    let bind = config.server.bind.clone();
    match runtime.block_on(changedesk_server::serve(state, &bind)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "server failed: {err}");
            ExitCode::FAILURE
        }
    }
}
