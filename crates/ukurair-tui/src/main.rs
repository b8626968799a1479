//! `ukurair`: terminal dashboard for the UKURAIR water-level network.
//!
//! Built on [ratatui](https://ratatui.rs) with reactive state from
//! `ukurair-core`. The public dashboard shows one card per monitoring
//! point; Enter opens its history chart. `a` opens the admin panel (after
//! logging in) for managing devices, tokens and the ingestion API key.
//!
//! Logs are written to a file (default in the platform cache dir) so they
//! never corrupt the terminal UI.
//!
//! Entry point: CLI argument parsing, tracing setup, panic hooks, and app launch.

mod action;
mod app;
mod component;
mod data_bridge;
mod event;
mod screens;
mod theme;
mod tui;
mod widgets;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ukurair_config::ProfileOverrides;
use ukurair_core::{BackendKind, Controller};

use crate::app::App;
use crate::screens::login::LoginPrefill;

/// Terminal dashboard for monitoring river and canal water levels.
#[derive(Parser, Debug)]
#[command(name = "ukurair", version, about)]
struct Cli {
    /// Config profile to use (defaults to `default_profile`)
    #[arg(short, long, env = "UKURAIR_PROFILE")]
    profile: Option<String>,

    /// Backend binding: rest or realtime
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// REST API base URL
    #[arg(long, env = "UKURAIR_API_URL")]
    api_url: Option<String>,

    /// Realtime database URL
    #[arg(long, env = "UKURAIR_DATABASE_URL")]
    database_url: Option<String>,

    /// Log file path (defaults to the platform cache dir)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write the log as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> ProfileOverrides {
        ProfileOverrides {
            backend: self.backend,
            api_url: self.api_url.clone(),
            database_url: self.database_url.clone(),
        }
    }
}

/// Set up file-based tracing. We MUST NOT log to stdout/stderr, that would
/// corrupt the TUI output. The returned guard must be held for the
/// lifetime of the application so logs are flushed.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "ukurair={log_level},ukurair_core={log_level},\
             ukurair_api={log_level},ukurair_config={log_level}"
        ))
    });

    let log_file = cli.log_file.clone().unwrap_or_else(ukurair_config::log_path);
    let log_dir = log_file
        .parent()
        .map_or_else(std::env::temp_dir, PathBuf::from);
    let log_filename = log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("ukurair.log"));
    let _ = std::fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::never(&log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let text_layer = (!cli.log_json).then(|| {
        fmt::layer()
            .with_writer(non_blocking.clone())
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
    });
    let json_layer = cli.log_json.then(|| {
        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_current_span(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Install panic/error hooks BEFORE entering the terminal
    tui::install_hooks()?;

    // Tracing to file; hold the guard so logs flush on exit
    let _log_guard = setup_tracing(&cli);

    // Priority: CLI flags > profile > built-in defaults
    let config = ukurair_config::load_config()?;
    let (profile_name, mut profile) = config.profile(cli.profile.as_deref())?;
    profile.apply(&cli.overrides());
    let core_config =
        ukurair_config::profile_to_core_config(&profile, &profile_name, &config.defaults)?;

    info!(
        profile = %profile_name,
        backend = %profile.backend,
        "starting ukurair"
    );

    let prefill = match ukurair_config::resolve_login(&profile, &profile_name) {
        Ok((username, password)) => LoginPrefill {
            username: Some(username),
            password: Some(password),
        },
        Err(e) => {
            debug!(error = %e, "no stored login");
            LoginPrefill {
                username: profile.username.clone(),
                password: None,
            }
        }
    };

    let controller = Controller::from_config(&core_config)?;
    let mut app = App::new(controller, prefill);
    app.run().await?;

    Ok(())
}
