use std::sync::Arc;

use clap::Parser;
use mqtti_store::{InMemoryStore, KubeResourceStore, ResourceStore};
use mqtti_transport::{TransportConfig, TransportSession};
use mqtti_sender::Sender;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "sender", version, about = "Answers list/watch requests over MQTT against a local cluster")]
struct Args {
    /// Broker URL, e.g. mqtt://broker.local:1883
    #[arg(long, env = "MQTTI_BROKER_URL")]
    broker_url: String,

    /// MQTT client id for this sender.
    #[arg(long, env = "MQTTI_CLIENT_ID", default_value = "mqtti-sender")]
    client_id: String,

    /// Topic informers publish requests to.
    #[arg(long, env = "MQTTI_SIGNAL_TOPIC", default_value = "mqtti/signal")]
    signal_topic: String,

    /// Topic this sender publishes responses to.
    #[arg(long, env = "MQTTI_PAYLOAD_TOPIC", default_value = "mqtti/payload")]
    payload_topic: String,

    /// MQTT QoS (0, 1, or 2).
    #[arg(long, env = "MQTTI_QOS", default_value_t = 0)]
    qos: u8,

    /// Use the in-memory fixture store instead of a real cluster. Intended
    /// for local testing; a production sender always talks to a cluster.
    #[arg(long)]
    memory_store: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "sender starting");

    let mut config = TransportConfig::new(
        args.broker_url.as_str(),
        args.client_id.as_str(),
        args.signal_topic.as_str(),
        args.payload_topic.as_str(),
    );
    config.qos = args.qos;

    let transport = match TransportSession::connect(config).await {
        Ok(session) => Arc::new(session),
        Err(e) => {
            eprintln!("FATAL: failed to connect to broker: {e}");
            std::process::exit(1);
        }
    };

    let store: Arc<dyn ResourceStore> = if args.memory_store {
        Arc::new(InMemoryStore::new())
    } else {
        match kube::Client::try_default().await {
            Ok(client) => Arc::new(KubeResourceStore::new(client)),
            Err(e) => {
                eprintln!("FATAL: failed to build kube client: {e}");
                std::process::exit(1);
            }
        }
    };

    let sender = Sender::new(transport, store, args.client_id.clone());
    let shutdown = CancellationToken::new();
    let signal_handle = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        signal_handle.cancel();
    });

    if let Err(e) = sender.run(shutdown).await {
        eprintln!("FATAL: sender loop exited with error: {e}");
        std::process::exit(1);
    }
}
