//! chatwire - command-line client
//!
//! Probes a chat server's health endpoint, listens to its real-time feed or
//! sends a single message.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chatwire::chat::ChatChannel;
use chatwire::config::ClientConfig;
use chatwire::connectivity::ManualConnectivity;
use chatwire::health::{HealthMonitor, HttpProbe};
use chatwire::notice::TracingNotifier;
use chatwire::session::{SessionGate, SessionStore, User};
use chatwire::transport::{handler, TransportClient, TransportEvent};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "chatwire")]
#[command(about = "Real-time chat client")]
#[command(version)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true, env = "CHATWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Server base URL (overrides the config file)
    #[arg(long, global = true, env = "CHATWIRE_SERVER_URL")]
    server_url: Option<String>,

    /// WebSocket endpoint (overrides the config file)
    #[arg(long, global = true, env = "CHATWIRE_WS_URL")]
    ws_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the server's health endpoint once
    Health,

    /// Connect and print incoming frames until Ctrl-C
    Listen {
        /// Auth token
        #[arg(long, env = "CHATWIRE_TOKEN")]
        token: String,

        /// Frame types to print
        #[arg(long = "type", default_values = ["new_message", "typing_indicator"])]
        types: Vec<String>,
    },

    /// Connect, send one chat message and disconnect
    Send {
        /// Auth token
        #[arg(long, env = "CHATWIRE_TOKEN")]
        token: String,

        /// Conversation ID
        #[arg(long)]
        conversation: String,

        /// Message text
        content: String,

        /// Seconds to wait for the connection
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "chatwire.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("chatwire=info".parse()?))
        .init();

    let cli = Cli::parse();

    if let Commands::InitConfig { output } = &cli.command {
        return init_config(output);
    }

    let config = load_config(&cli)?;
    match cli.command {
        Commands::Health => health(&config).await,
        Commands::Listen { token, types } => listen(&config, &token, &types).await,
        Commands::Send {
            token,
            conversation,
            content,
            timeout,
        } => send(&config, &token, &conversation, &content, Duration::from_secs(timeout)).await,
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = &cli.server_url {
        config.server_url.clone_from(url);
    }
    if let Some(url) = &cli.ws_url {
        config.ws_url.clone_from(url);
    }
    config.validate()?;
    Ok(config)
}

fn init_config(output: &Path) -> anyhow::Result<()> {
    let json = ClientConfig::default().to_json()?;
    std::fs::write(output, json)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Config written to: {}", output.display());
    Ok(())
}

fn monitor(config: &ClientConfig) -> anyhow::Result<Arc<HealthMonitor>> {
    let health = config.health_monitor();
    let probe = HttpProbe::new(&config.server_url, &config.health_path, health.probe_timeout)?;
    info!(url = %probe.url(), "health endpoint");
    Ok(Arc::new(HealthMonitor::new(
        Arc::new(probe),
        Arc::new(ManualConnectivity::new(true)),
        Arc::new(TracingNotifier),
        health,
    )))
}

async fn health(config: &ClientConfig) -> anyhow::Result<()> {
    let monitor = monitor(config)?;
    let healthy = monitor.check_connection().await;
    let state = monitor.state();

    println!("status: {}", state.status);
    if let Some(description) = state.describe() {
        println!("{description}");
    }
    if !healthy {
        bail!("server is {}", state.status);
    }
    Ok(())
}

/// Start the monitor and a transport signed in with `token`.
async fn connect(
    config: &ClientConfig,
    token: &str,
) -> anyhow::Result<(Arc<HealthMonitor>, Arc<TransportClient>)> {
    let monitor = monitor(config)?;
    if !monitor.start().await {
        bail!("server is {}", monitor.network_status());
    }

    let session = Arc::new(SessionStore::new());
    session.sign_in(User {
        id: 0,
        name: None,
        email: None,
        token: Some(token.to_string()),
        is_logged_in: true,
    });

    let transport = Arc::new(TransportClient::start(
        config.transport(),
        SessionGate::new(session),
        monitor.clone(),
        Arc::new(TracingNotifier),
    ));
    Ok((monitor, transport))
}

async fn listen(config: &ClientConfig, token: &str, types: &[String]) -> anyhow::Result<()> {
    let (monitor, transport) = connect(config, token).await?;

    for message_type in types {
        let label = message_type.clone();
        transport.subscribe(
            message_type,
            handler(move |payload| println!("{label} {payload}")),
        );
    }

    let mut events = transport.events();
    transport.connect(&config.ws_url, Some(token))?;
    info!(types = ?types, "listening, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(TransportEvent::Reconnecting { attempt, delay }) => {
                    info!(attempt, ?delay, "reconnecting");
                }
                Ok(TransportEvent::Connected { flushed }) => info!(flushed, "connected"),
                Ok(TransportEvent::Disconnected) => break,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed transport events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    transport.shutdown().await;
    monitor.stop();
    Ok(())
}

async fn send(
    config: &ClientConfig,
    token: &str,
    conversation: &str,
    content: &str,
    wait: Duration,
) -> anyhow::Result<()> {
    let (monitor, transport) = connect(config, token).await?;
    let chat = ChatChannel::new(transport.clone());

    let mut events = transport.events();
    transport.connect(&config.ws_url, Some(token))?;
    chat.send_message(conversation, content)?;

    let delivered = tokio::time::timeout(wait, async {
        while let Ok(event) = events.recv().await {
            if let TransportEvent::Connected { flushed } = event {
                return flushed > 0;
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    transport.shutdown().await;
    monitor.stop();

    if !delivered {
        bail!("message not delivered within {}s", wait.as_secs());
    }
    println!("sent");
    Ok(())
}
