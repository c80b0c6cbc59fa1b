mod catalogue;
mod config;
mod error;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use bridge::{
    AppSessionCoordinator, CommandSwitcher, HelperCommand, HostBridge, NoopSwitcher, PollTransport,
    ProcessTransport, Switcher, http,
};
use clap::{Parser, Subcommand};
use registry::Category;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use config::{BridgeConfig, Config, Transport};
use error::{Error, Result};

#[derive(Parser)]
#[command(name = "deskbridge")]
#[command(about = "MCP server that drives desktop office applications", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ./deskbridge.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve tools over MCP on stdio
    Serve,
    /// List the tool catalogue
    Tools,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    // A blocked stdin read would otherwise hold the runtime open.
    std::process::exit(0);
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::discover(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Serve) | None => {
            logging::init(&config.log_level)?;
            cmd_serve(config).await
        }
        Some(Commands::Tools) => cmd_tools(&config),
    }
}

/// Poll endpoints running in the background.
struct PollServer {
    stop: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl PollServer {
    async fn stop(self) -> Result<()> {
        let _ = self.stop.send(());
        match self.task.await {
            Ok(result) => result.map_err(Error::PollServer),
            Err(e) => {
                warn!(error = %e, "poll server task failed");
                Ok(())
            }
        }
    }
}

/// Bridge for the configured transport. The poll transport is returned
/// too, since its endpoints must be served.
fn build_bridge(config: &BridgeConfig) -> (Arc<HostBridge>, Option<PollTransport>) {
    let coordinator = Arc::new(build_coordinator(config));
    match config.strategy.resolve() {
        Transport::Poll => {
            let poll = PollTransport::new();
            let host_bridge = HostBridge::polling(poll.clone(), coordinator)
                .with_request_timeout(config.request_timeout());
            (Arc::new(host_bridge), Some(poll))
        }
        Transport::Process => {
            let helper =
                HelperCommand::new(&config.process.program).with_args(&config.process.args);
            let host_bridge = HostBridge::new(Arc::new(ProcessTransport::new(helper)), coordinator)
                .with_request_timeout(config.request_timeout());
            (Arc::new(host_bridge), None)
        }
    }
}

async fn cmd_serve(config: Config) -> Result<()> {
    let (host_bridge, poll) = build_bridge(&config.bridge);
    let poll_server = match poll {
        Some(poll) => {
            Some(spawn_poll_server(&config.bridge, poll, Arc::clone(&host_bridge)).await?)
        }
        None => None,
    };

    info!(
        transport = host_bridge.transport_name(),
        timeout_ms = config.bridge.request_timeout_ms,
        "host bridge ready"
    );

    let registry = Arc::new(catalogue::build_registry(Arc::clone(&host_bridge))?);
    let server = mcp::Server::new(registry);

    let served = tokio::select! {
        result = server.run_stdio() => result.map_err(Error::from),
        signal = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            signal.map_err(Error::from)
        }
    };

    host_bridge.shutdown().await;
    if let Some(poll_server) = poll_server {
        poll_server.stop().await?;
    }
    info!("deskbridge stopped");
    served
}

fn build_coordinator(config: &BridgeConfig) -> AppSessionCoordinator {
    let switcher: Arc<dyn Switcher> = match &config.switch.program {
        Some(program) => Arc::new(CommandSwitcher::new(program).with_args(&config.switch.args)),
        None => Arc::new(NoopSwitcher),
    };
    AppSessionCoordinator::new(switcher)
        .with_switch_timeout(config.switch.timeout())
        .with_settle_delay(config.switch.settle_delay())
}

async fn spawn_poll_server(
    config: &BridgeConfig,
    poll: PollTransport,
    host_bridge: Arc<HostBridge>,
) -> Result<PollServer> {
    let listener = TcpListener::bind(config.poll.bind)
        .await
        .map_err(Error::PollServer)?;
    let (stop, stopped) = oneshot::channel::<()>();
    let state = http::PollServerState {
        poll,
        bridge: host_bridge,
    };
    let task = tokio::spawn(http::serve(listener, state, async move {
        let _ = stopped.await;
    }));
    Ok(PollServer { stop, task })
}

fn cmd_tools(config: &Config) -> Result<()> {
    let (host_bridge, _) = build_bridge(&config.bridge);
    let registry = catalogue::build_registry(host_bridge)?;
    let width = registry
        .list_tools()
        .iter()
        .map(|d| d.name.len())
        .max()
        .unwrap_or(0);

    for category in Category::ALL {
        let defs = registry.list_by_category(category);
        if defs.is_empty() {
            continue;
        }
        println!("{category}");
        for def in defs {
            println!("  {:<width$}  {}", def.name, def.description);
            for param in def.input_schema.params() {
                let marker = if param.required { "*" } else { " " };
                println!("  {:<width$}    {marker} {}: {}", "", param.name, param.description);
            }
        }
        println!();
    }
    Ok(())
}
