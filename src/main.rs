use anyhow::Context;
use clap::{Parser, Subcommand};

mod app;
mod auth;
mod config;
mod db;
mod error;
mod mailer;
mod notify;
mod state;
mod subscriptions;

use crate::{config::AppConfig, notify::scheduler, state::AppState};

#[derive(Debug, Parser)]
#[command(name = "earnings-tracker", about = "Earnings reminder subscriptions API and notifier")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Run the reminder matcher once and exit; meant for an external scheduler.
    Notify,
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "earnings_tracker=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("load configuration")?;
    let app_state = AppState::init(config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            if let Some(period) = app_state.config.matcher_interval() {
                let matcher = app_state.matcher.clone();
                tokio::spawn(scheduler::run_periodically(matcher, period));
            }
            app::serve(app::build_app(app_state)).await
        }
        Command::Notify => {
            let report = app_state
                .matcher
                .run()
                .await
                .context("matcher run aborted")?;
            tracing::info!(?report, "notify complete");
            Ok(())
        }
    }
}
