//! hotspot-login - Auto-login client for HTTP captive portals
//!
//! Checks whether the network is intercepted by a captive portal and, if so,
//! submits the portal's login form. Runs once and exits; schedule it with a
//! timer or cron job.

mod config;
mod http;
mod models;
mod parser;
mod portal;
mod probe;
mod resolver;
mod submit;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, LoggingConfig};
use models::RunOutcome;
use portal::PortalLogin;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hotspot-login", version)]
#[command(about = "Captive Portal Auto Login Client", long_about = None)]
struct Args {
    /// Portal profile to use (default: from config, SSID, or the only profile)
    #[arg(short, long)]
    profile: Option<String>,

    /// Config file path (default: ./hotspot-login.toml, then system locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List available profiles and exit
    #[arg(long)]
    list_profiles: bool,

    /// Print the outcome as a JSON line on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Load configuration
    let cfg = Config::load(args.config.as_deref())?;

    // Initialize logging
    init_logging(&cfg.logging)?;

    if args.list_profiles {
        list_profiles(&cfg)?;
        return Ok(ExitCode::SUCCESS);
    }

    let profile = cfg.select_profile(args.profile.as_deref(), || {
        utils::current_ssid().unwrap_or_else(|e| {
            tracing::warn!("Failed to check WiFi status: {}", e);
            None
        })
    })?;

    tracing::info!(
        "hotspot-login v{} - profile '{}'",
        env!("CARGO_PKG_VERSION"),
        profile.name
    );

    let engine = PortalLogin::new(profile, &cfg.http)?;
    let outcome = engine.run().await;
    report(engine.name(), &outcome, args.json)?;

    Ok(ExitCode::from(outcome.exit_code()))
}

/// Logs go to stderr (or the configured file) so stdout stays free for `--json`
fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    if cfg.log_file.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.log_file)
            .with_context(|| format!("Failed to open log file {}", cfg.log_file))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }

    Ok(())
}

fn list_profiles(cfg: &Config) -> Result<()> {
    for profile in cfg.all_profiles()? {
        let marker = if cfg.profiles.iter().any(|p| p.name == profile.name) {
            ""
        } else {
            " (built-in)"
        };
        println!("{}{}", profile.name, marker);
        if !profile.ssids.is_empty() {
            println!("    ssids:  {}", profile.ssids.join(", "));
        }
        if let Some(url) = &profile.portal_fallback_url {
            println!("    portal: {}", url);
        }
    }
    Ok(())
}

fn report(name: &str, outcome: &RunOutcome, json: bool) -> Result<()> {
    match outcome {
        RunOutcome::Online => tracing::info!("[{}] DONE: online", name),
        RunOutcome::LoggedIn => tracing::info!("[{}] DONE: logged in", name),
        RunOutcome::Failed(reason) => {
            tracing::error!("[{}] FAILED: {} (exit {})", name, reason, reason.exit_code())
        }
    }

    if json {
        println!("{}", serde_json::to_string(outcome)?);
    }
    Ok(())
}
