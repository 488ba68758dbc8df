use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sync_monitor::config::Config;
use sync_monitor::event_bus::EventError;
use sync_monitor::node::{ConnectionWatcher, EthersTransport, NodeLifecycle, NodeTransport};
use sync_monitor::sync::{MonitorConfig, SkipSignal, SyncEvent, SyncMonitor};
use sync_monitor::utils;

/// Create the transport matching the configured endpoint scheme
async fn connect(config: &Config) -> Result<Arc<dyn NodeTransport>> {
    let transport: Arc<dyn NodeTransport> = if config.uses_websocket() {
        Arc::new(
            EthersTransport::ws(&config.node_rpc_url)
                .await
                .context("Failed to connect to node")?,
        )
    } else {
        Arc::new(EthersTransport::http(&config.node_rpc_url).context("Invalid node RPC URL")?)
    };
    Ok(transport)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    utils::logger::init_logger(&config.log_level);
    info!("Starting node sync monitor");
    utils::config_logger::log_config(&config);

    let transport = connect(&config).await?;
    let lifecycle = NodeLifecycle::default();
    let monitor = SyncMonitor::new(
        Arc::clone(&transport),
        &lifecycle,
        SkipSignal::new(),
        MonitorConfig::from(&config),
    );
    let mut events = monitor.subscribe();

    // The watcher drives the monitor through node state transitions
    let shutdown = CancellationToken::new();
    let watcher = tokio::spawn(
        ConnectionWatcher::new(transport, lifecycle)
            .with_interval(config.node_check_interval())
            .run(shutdown.clone()),
    );

    println!("{}", "=".repeat(80).bright_blue());
    println!("{}", "NODE SYNC MONITOR".bold().bright_green());
    println!("{} {}", "Watching".bright_cyan(), config.node_rpc_url.bright_cyan());
    println!("{}", "Press Ctrl+C to skip the sync check".bright_black());
    println!("{}", "=".repeat(80).bright_blue());

    let result = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(outcome) = display_event(&event) {
                        break outcome;
                    }
                }
                Err(EventError::Lagged(missed)) => warn!(missed, "Display fell behind sync events"),
                Err(EventError::Closed) => break Err(anyhow!("Sync event feed closed")),
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    break Err(anyhow!("Failed to listen for Ctrl+C: {}", e));
                }
                if monitor.is_active().await {
                    monitor.skip().await;
                } else {
                    info!("Shutdown signal received");
                    break Ok(());
                }
            }
        }
    };

    // Shut down the watcher, then make sure no session outlives it
    shutdown.cancel();
    if let Err(e) = watcher.await {
        error!("Connection watcher failed: {}", e);
    }
    monitor.stop().await;

    match &result {
        Ok(()) => info!("Sync monitor shutdown gracefully"),
        Err(e) => error!("Sync monitor failed: {}", e),
    }
    result
}

/// Print one sync event; returns the final outcome once the session has ended
fn display_event(event: &SyncEvent) -> Option<Result<()>> {
    let now = chrono::Utc::now().format("[%H:%M:%S]").to_string().bright_black();

    match event {
        SyncEvent::Starting { session_id } => {
            println!("{} {} (session {})", now, "Checking node sync status".bright_yellow(), session_id);
            None
        }
        SyncEvent::Progress { progress, .. } => {
            println!("{} {} {}", now, "Syncing".yellow().bold(), progress.to_string().cyan());
            None
        }
        SyncEvent::Finished { skipped: false, .. } => {
            println!("{} {}", now, "Node is in sync".bold().bright_green());
            Some(Ok(()))
        }
        SyncEvent::Finished { skipped: true, .. } => {
            println!("{} {}", now, "Sync check skipped".bold().bright_yellow());
            Some(Ok(()))
        }
        SyncEvent::Error { error, .. } => {
            println!("{} {}: {}", now, "Sync failed".bold().red(), error);
            Some(Err(anyhow!(error.clone())))
        }
        SyncEvent::Stopped { session_id } => {
            println!("{} {} (session {})", now, "Sync check stopped".bright_black(), session_id);
            None
        }
    }
}
