//! MagicQ GW - OSC gateway for ChamSys MagicQ consoles
//!
//! Runs the console driver with hot-reloaded configuration, an optional HTTP
//! API and an interactive REPL.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use magicq_gw::api::{self, ApiState};
use magicq_gw::cli::{self, ReplCommand};
use magicq_gw::config::{AppConfig, ConfigWatcher};
use magicq_gw::drivers::{Driver, MagicQDriver};
use magicq_gw::host::VariableTable;
use magicq_gw::sniffer;

/// MagicQ Gateway - drive a ChamSys MagicQ console over OSC
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "MAGICQ_CONFIG", default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Print inbound OSC traffic instead of running the gateway
    #[arg(long)]
    sniffer: bool,

    /// Run without the interactive prompt
    #[arg(long)]
    no_repl: bool,

    /// Serve the HTTP API on this port (overrides the config file)
    #[arg(long)]
    api_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.log_json)?;

    info!("Starting MagicQ GW v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    // Load configuration with hot-reload watcher
    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    if args.sniffer {
        return sniffer::run_cli_sniffer(&initial_config.console).await;
    }

    run_app(args, initial_config, config_watcher).await?;

    info!("MagicQ GW shutdown complete");
    Ok(())
}

async fn run_app(args: Args, config: AppConfig, mut config_watcher: ConfigWatcher) -> Result<()> {
    let host = VariableTable::shared();
    let driver = Arc::new(MagicQDriver::new(config.console.clone(), host.clone()));

    // A failed bind is reported through the status; reconfiguration retries
    if let Err(e) = driver.init().await {
        warn!("⚠️  MagicQ driver started without transport: {:#}", e);
    }

    let api_port = args
        .api_port
        .or_else(|| config.api_enabled().map(|api| api.port));
    let api_task = api_port.map(|port| {
        let state = Arc::new(ApiState {
            driver: driver.clone(),
            host: host.clone(),
        });
        tokio::spawn(async move {
            if let Err(e) = api::start_server(state, port).await {
                warn!("API server stopped: {:#}", e);
            }
        })
    });

    // repl_tx stays alive for the whole loop, so without a REPL the channel
    // never closes and only Ctrl+C ends the loop
    let (repl_tx, mut repl_rx) = mpsc::unbounded_channel::<ReplCommand>();
    if !args.no_repl {
        cli::spawn_repl(repl_tx.clone())?;
        println!("Type 'help' for commands.");
    }

    info!("Ready");

    loop {
        tokio::select! {
            Some(command) = repl_rx.recv() => {
                if !cli::handle_command(command, &driver, &host).await {
                    break;
                }
            }

            Some(new_config) = config_watcher.next_config() => {
                info!("📝 Configuration file changed, reloading...");
                match driver.reconfigure(new_config.console).await {
                    Ok(()) => {
                        if let Err(e) = driver.sync().await {
                            warn!("Failed to republish state: {:#}", e);
                        }
                        info!("✅ Configuration applied");
                    }
                    Err(e) => warn!("⚠️  Failed to apply console settings: {}", e),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    drop(repl_tx);
    if let Some(task) = api_task {
        task.abort();
    }
    driver.shutdown().await?;

    Ok(())
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init();
    }

    Ok(())
}
