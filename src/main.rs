// ABOUTME: Main entry point for the pegashell CLI

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::terminal::disable_raw_mode;

mod config;
mod interactive;
mod models;
mod relay;
mod resolver;

use config::AppConfig;
use models::SessionTarget;

/// Open an interactive shell on a cluster node through the PegaProx relay.
#[derive(Debug, Parser)]
#[command(name = "pegashell", version, about)]
struct Cli {
    /// Cluster identifier
    cluster: String,

    /// Node name within the cluster
    node: String,

    /// API origin, e.g. https://pegaprox.example:8006/api
    #[arg(long)]
    api_base: Option<String>,

    /// Session ticket for the console session
    #[arg(long, env = "PEGASHELL_TICKET")]
    ticket: String,

    /// Skip TLS verification on the node-ip lookup
    #[arg(long)]
    insecure: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    setup_panic_handler();

    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }
    if cli.insecure {
        config.insecure = true;
    }

    let target = SessionTarget::new(cli.cluster, cli.node);
    interactive::run(&config, target, &cli.ticket)
        .await
        .context("shell session failed")
}

fn setup_logging() {
    use std::fs::OpenOptions;
    use std::path::PathBuf;
    use tracing_subscriber::prelude::*;

    let log_dir = std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".pegashell").join("logs"))
        .unwrap_or_else(|_| PathBuf::from(".pegashell/logs"));

    let _ = std::fs::create_dir_all(&log_dir);

    let log_file = log_dir.join(format!(
        "pegashell-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));

    let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_file) else {
        // Shell output owns the terminal; without a log file we stay silent
        return;
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(file)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pegashell=info".into()),
        )
        .init();
}

fn setup_panic_handler() {
    use tracing::error;

    std::panic::set_hook(Box::new(|panic_info| {
        // Give the hosting terminal back before reporting
        let _ = disable_raw_mode();

        error!("application panicked: {}", panic_info);
        eprintln!("pegashell panicked: {panic_info}");
        eprintln!("Please check the logs for more details.");
    }));
}
