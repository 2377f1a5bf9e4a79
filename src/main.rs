use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use log::{info, warn};
use tokio::sync::mpsc;

mod api;
mod config;
mod crypto;
mod dashboard;
mod lifecycle;
mod supervisor;
mod theme;

use api::LightNodeClient;
use config::{AppConfig, DEFAULT_BASE_URL};
use crypto::signer::WalletIdentity;
use dashboard::{InputEvent, RedrawHandle};
use supervisor::Supervisor;

/// Environment variable holding the ordered private key list.
/// Entries are separated by newlines, commas or semicolons.
const PRIVATE_KEYS_VAR: &str = "WALLET_PRIVATE_KEYS";

#[derive(Parser)]
#[command(name = "edgefleet")]
#[command(author, version)]
#[command(about = "⛓  LayerEdge light-node fleet dashboard")]
#[command(styles = get_styles())]
struct Cli {
    /// Reward service base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Seconds between refresh cycles for each wallet
    #[arg(long, default_value_t = 30)]
    interval: u64,

    /// Wallets shown per dashboard page
    #[arg(long, default_value_t = 5)]
    page_size: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

impl Cli {
    fn to_config(&self) -> AppConfig {
        AppConfig {
            base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(self.timeout.max(1)),
            ping_interval: Duration::from_secs(self.interval.max(1)),
            page_size: self.page_size.max(1),
            ..AppConfig::default()
        }
    }
}

fn get_styles() -> clap::builder::Styles {
    use clap::builder::styling::*;
    clap::builder::Styles::styled()
        .header(AnsiColor::BrightMagenta.on_default().bold())
        .usage(AnsiColor::BrightCyan.on_default().bold())
        .literal(AnsiColor::BrightGreen.on_default())
        .placeholder(AnsiColor::Cyan.on_default())
        .error(AnsiColor::BrightRed.on_default().bold())
}

/// Route log output to a file when RUST_LOG is set; anything written to
/// stderr would glitch behind the raw-mode dashboard.
fn init_logging() -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        return Ok(());
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("/tmp/edgefleet.log")
        .context("Failed to open /tmp/edgefleet.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}

/// Split a raw credential list and derive identities, counting entries
/// that failed to parse.
fn parse_identities(raw: &str) -> (Vec<WalletIdentity>, usize) {
    let mut identities = Vec::new();
    let mut skipped = 0;
    for entry in raw.split(['\n', ',', ';']) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match WalletIdentity::from_private_key(entry) {
            Ok(identity) => identities.push(identity),
            Err(err) => {
                warn!("skipping invalid private key: {}", err);
                eprintln!(
                    "{} skipping invalid private key: {}",
                    "Warning:".bright_yellow().bold(),
                    err
                );
                skipped += 1;
            }
        }
    }
    (identities, skipped)
}

fn load_identities() -> Result<Vec<WalletIdentity>> {
    let raw = std::env::var(PRIVATE_KEYS_VAR).unwrap_or_default();
    let (identities, skipped) = parse_identities(&raw);
    if identities.is_empty() {
        bail!(
            "no valid private keys found in ${} ({} invalid entries)",
            PRIVATE_KEYS_VAR,
            skipped
        );
    }
    for identity in &identities {
        info!("[{}] credential loaded", identity.address());
    }
    Ok(identities)
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{} {:#}", "Error:".bright_red().bold(), err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    init_logging()?;

    let cfg = Arc::new(cli.to_config());
    let identities = load_identities()?;
    let client =
        Arc::new(LightNodeClient::new(&cfg).context("Failed to build the HTTP client")?);

    let (redraw_tx, redraw_rx) = mpsc::unbounded_channel();
    let redraw = RedrawHandle::new(redraw_tx);
    let mut supervisor = Supervisor::new(cfg.clone(), client, identities, redraw.clone());

    dashboard::setup_terminal().context("Failed to enter raw terminal mode")?;
    let renderer = dashboard::spawn_renderer(
        supervisor.board(),
        cfg.clone(),
        redraw_rx,
        supervisor.shutdown_signal(),
    );
    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    let input = dashboard::spawn_input_reader(input_tx, supervisor.shutdown_signal());
    supervisor.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = input_rx.recv() => match event {
                Some(InputEvent::Quit) | None => break,
                Some(nav) => supervisor.handle_input(nav),
            },
        }
    }

    supervisor.shutdown().await;
    let _ = renderer.await;
    let _ = input.await;
    dashboard::restore_terminal().context("Failed to restore the terminal")?;
    println!("{}", "Shutting down...".bright_cyan());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identities_skips_invalid_entries() {
        let raw = "\n0x0000000000000000000000000000000000000000000000000000000000000001,\
                   not-a-key;\
                   0x0000000000000000000000000000000000000000000000000000000000000002\n\n";
        let (identities, skipped) = parse_identities(raw);
        assert_eq!(identities.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(
            identities[0].address(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn test_parse_identities_empty_input() {
        let (identities, skipped) = parse_identities("");
        assert!(identities.is_empty());
        assert_eq!(skipped, 0);
    }
}
