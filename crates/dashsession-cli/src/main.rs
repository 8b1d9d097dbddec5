//! dashsession - command-line client for the admin dashboard API.
//!
//! Logs in, keeps the session's tokens on disk, and sends authenticated
//! requests through the session manager so expired tokens are refreshed
//! (or the session ended) the same way the dashboard does it.

mod cli;
mod commands;

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dashsession_core::{AuthApi, Config, EventBus, FileStore, SessionEvent, SessionManager};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Command};

/// Log file name prefix inside `--log-dir`
const LOG_FILE_PREFIX: &str = "dashsession.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn build_manager(config: Config) -> Result<SessionManager> {
    let store = Arc::new(FileStore::open(config.session_path()?));
    let api = AuthApi::new(config)?;
    let manager = SessionManager::new(api, store, Arc::new(EventBus::new()));

    // Route guard: send the user back to login whenever the session ends
    manager.events().subscribe(|event| match event {
        SessionEvent::Logout => warn!("Session ended, login required"),
        SessionEvent::TokenRefreshed { .. } => info!("Session token refreshed"),
    });

    Ok(manager)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if commands::needs_login(&e) {
                eprintln!("{}", commands::LOGIN_HINT);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    info!(api = %config.api_base_url, "dashsession starting");

    let manager = build_manager(config)?;

    match cli.command {
        Command::Login { email } => commands::login(&manager, email).await,
        Command::Status => {
            commands::status(&manager);
            Ok(())
        }
        Command::Check => commands::check(&manager).await,
        Command::Refresh => commands::refresh(&manager).await,
        Command::Logout => commands::logout(&manager),
        Command::Call {
            method,
            path,
            data,
            headers,
        } => commands::call(&manager, &method, &path, data.as_deref(), &headers).await,
    }
}
