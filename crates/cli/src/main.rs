use clap::{Parser, Subcommand};
use lib::chat::ChatBridge;
use lib::commands::CommandDispatcher;
use lib::config::{self, Config};
use lib::mesh::{MeshListener, TcpMeshConnector, WellKnownNames};
use lib::relay::{ChatSink, RelayForwarder, WebhookSink};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "meshbot")]
#[command(about = "Packet-radio mesh to chat bridge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the bridge: connect to the mesh device, relay channel traffic to chat,
    /// and serve bot commands from both sides.
    Run {
        /// Config file path (default: MESHBOT_CONFIG_PATH or ~/.meshbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Mesh device host (overrides config and MESH_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Mesh device port (default from config or 5000)
        #[arg(long, short)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("meshbot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Run { config, host, port }) => {
            if let Err(e) = run_bridge(config, host, port).await {
                log::error!("bridge failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn chat_sink(config: &Config) -> Option<Arc<dyn ChatSink>> {
    if config.debug {
        log::info!("debug mode: chat delivery disabled");
        return None;
    }
    match config::resolve_webhook_url(config) {
        Some(url) => Some(Arc::new(WebhookSink::new(url))),
        None => {
            log::info!("no webhook configured; mesh traffic will not reach chat");
            None
        }
    }
}

async fn run_bridge(
    config_path: Option<std::path::PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    use anyhow::Context;

    let (config, _path) = config::load_config(config_path)?;
    let host = host
        .or_else(|| config::resolve_mesh_host(&config))
        .context("mesh host not configured (set MESH_HOST or mesh.host)")?;
    let port = port.unwrap_or(config.mesh.port);

    let names = WellKnownNames {
        public: config.mesh.public_name.clone(),
        test: config.mesh.test_name.clone(),
        bot: config.mesh.bot_name.clone(),
    };

    let (outbound_tx, outbound_rx) = tokio::sync::mpsc::channel(32);
    let listener = MeshListener::new(
        Arc::new(TcpMeshConnector::new(host.clone(), port)),
        CommandDispatcher::new(&config.mesh.mention),
        RelayForwarder::new(chat_sink(&config)),
        names,
        config.mesh.no_mirror_name.clone(),
        outbound_rx,
    );
    let listener_handle = listener.handle();

    let bridge = if config.debug {
        None
    } else {
        match (
            config::resolve_bot_token(&config),
            config::resolve_chat_channel_id(&config),
        ) {
            (Some(token), Some(channel_id)) => {
                let bridge = Arc::new(ChatBridge::new(
                    config.chat.api_base.clone(),
                    token,
                    channel_id,
                    outbound_tx.clone(),
                ));
                let task = Arc::clone(&bridge).start();
                Some((bridge, task))
            }
            _ => {
                log::info!("chat command surface disabled (missing bot token or channel id)");
                None
            }
        }
    };

    log::info!("starting mesh listener on {}:{}", host, port);
    let listener_task = tokio::spawn(listener.run());

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down");
    listener_handle.stop();
    if let Some((bridge, task)) = bridge {
        bridge.stop();
        let _ = task.await;
    }
    let _ = listener_task.await;
    Ok(())
}
