// ============================
// realtime-cli/src/main.rs
// ============================
//! Command line entry point: listen as an identity, publish one envelope,
//! or run the dev broker.

mod console;

use anyhow::Context;
use clap::{Parser, Subcommand};
use realtime_client::{
    ConnectionState, Envelope, Identity, MessageKind, RealtimeHub, Role, RoleRouter, Settings,
};
use realtime_dev_broker::BrokerState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "realtime-cli", about = "Portal real-time client tools")]
struct Cli {
    /// Settings file (defaults to ./realtime.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect as an identity and print routed actions until Ctrl-C
    Listen {
        #[arg(long)]
        id: String,
        #[arg(long)]
        role: Role,
    },
    /// Publish one envelope and exit
    Publish {
        #[arg(long)]
        destination: String,
        #[arg(long = "type")]
        kind: String,
        /// JSON payload
        #[arg(long)]
        payload: Option<String>,
    },
    /// Run the development broker
    Broker {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
        /// Require this token in Connect frames
        #[arg(long)]
        token: Option<String>,
    },
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    Ok(settings)
}

async fn wait_until_connected(hub: &RealtimeHub, timeout: Duration) -> anyhow::Result<()> {
    let mut state = hub.watch_state();
    tokio::time::timeout(timeout, state.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .context("timed out waiting for the broker")?
        .context("connection manager went away")?;
    Ok(())
}

async fn listen(settings: Settings, identity: Identity) -> anyhow::Result<()> {
    let hub = RealtimeHub::from_settings(&settings);
    let services = Arc::new(console::ConsoleServices::new(identity.clone()));
    let router = RoleRouter::for_role(identity.role);

    let _mount = hub.mount(identity.clone(), router, services)?;
    tracing::info!("Listening as {} ({}) with the {:?} router", identity.id, identity.role, router);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    hub.disconnect();
    Ok(())
}

async fn publish(settings: Settings, destination: String, kind: String, payload: Option<String>) -> anyhow::Result<()> {
    let payload = match payload {
        Some(raw) => serde_json::from_str(&raw).context("payload is not valid JSON")?,
        None => serde_json::Value::Null,
    };
    let envelope = Envelope::new(MessageKind::from_wire(&kind), payload);

    let hub = RealtimeHub::from_settings(&settings);
    hub.connect(Identity::new("cli", Role::Admin));
    wait_until_connected(&hub, settings.transport.handshake_timeout()).await?;

    hub.send(&destination, &envelope.to_json());
    println!("published {} to {}", envelope.kind, destination);

    hub.disconnect();
    // Let the session task flush the queued frames before the runtime stops
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_ref())?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| settings.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Listen { id, role } => listen(settings, Identity::new(id, role)).await,
        Command::Publish {
            destination,
            kind,
            payload,
        } => publish(settings, destination, kind, payload).await,
        Command::Broker { bind, token } => {
            let state = match token {
                Some(token) => BrokerState::with_token(token),
                None => BrokerState::new(),
            };
            let listener = tokio::net::TcpListener::bind(bind).await?;
            println!("listening on {}", listener.local_addr()?);
            realtime_dev_broker::serve(listener, state).await
        },
    }
}
