use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use home_dash_rs::events::EventBridge;
use home_dash_rs::push::{DisabledTransport, Dispatcher, PushTransport, WebPushTransport};
use home_dash_rs::scan::{ScanCommand, ScanCoordinator};
use home_dash_rs::server::{self, AppState};
use home_dash_rs::subs::SubscriptionStore;
use home_dash_rs::netdetect;

/// home-dash-rs — self-hosted home-server dashboard with Docker control,
/// LAN discovery scans and web push alerts.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "home-dash-rs",
    version,
    about = "Self-hosted home-server dashboard: Docker control, LAN discovery scans and web push alerts.",
    long_about = None
)]
struct Cli {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Directory for persisted state (scan results, subscriptions).
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Default subnet to scan (e.g. 192.168.1.0/24). If omitted, derived from
    /// the first non-loopback IPv4 interface at scan time.
    #[arg(long)]
    subnet: Option<String>,

    /// Network discovery program. Must accept `-n -sn <subnet>`.
    #[arg(long, default_value = "nmap")]
    nmap_bin: String,

    /// Docker CLI used for container listing, control and the event stream.
    #[arg(long, default_value = "docker")]
    docker_bin: String,

    /// VAPID subject claim sent to push services.
    #[arg(long, default_value = "mailto:admin@localhost")]
    vapid_subject: String,

    /// Keep subscriptions in memory only instead of the data dir.
    #[arg(long, default_value_t = false)]
    volatile_subscriptions: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("failed to create data dir {}", cli.data_dir.display()))?;

    let default_subnet = cli
        .subnet
        .as_deref()
        .map(netdetect::parse_subnet)
        .transpose()
        .context("invalid --subnet")?;

    let store = if cli.volatile_subscriptions {
        SubscriptionStore::in_memory()
    } else {
        SubscriptionStore::with_file(cli.data_dir.join("subscriptions.json")).await?
    };

    let transport: Arc<dyn PushTransport> = match std::env::var("VAPID_PRIVATE_KEY") {
        Ok(key) if !key.is_empty() => {
            Arc::new(WebPushTransport::new(key, cli.vapid_subject.clone())?)
        }
        _ => {
            warn!("VAPID_PRIVATE_KEY not set, push notifications are disabled");
            Arc::new(DisabledTransport)
        }
    };
    let dispatcher = Dispatcher::new(store.clone(), transport);

    let bridge = EventBridge::new(dispatcher.clone(), cli.docker_bin.clone());
    bridge.start();

    let scanner = ScanCoordinator::new(
        cli.data_dir.join("lan-scan.json"),
        ScanCommand::nmap(cli.nmap_bin.clone()),
        default_subnet,
    );

    let state = AppState {
        store,
        dispatcher,
        scanner,
        docker_program: cli.docker_bin,
    };

    server::spawn_server(&cli.bind, state).await
}
