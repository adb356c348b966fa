use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mqtti_informer::{InformerConfig, SharedInformerFactory};
use mqtti_protocol::Gvr;
use mqtti_store::{DynamicClient, InMemoryDynamicClient, KubeDynamicClient};
use mqtti_transport::{TransportConfig, TransportSession};
use mqtti_controlplane::ProjectionHandler;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "controlplane", version, about = "Projects objects from one cluster into another over MQTT")]
struct Args {
    /// Broker URL, e.g. mqtt://broker.local:1883
    #[arg(long, env = "MQTTI_BROKER_URL")]
    broker_url: String,

    /// MQTT client id for this control plane.
    #[arg(long, env = "MQTTI_CLIENT_ID", default_value = "mqtti-controlplane")]
    client_id: String,

    /// Topic this control plane publishes requests to.
    #[arg(long, env = "MQTTI_SIGNAL_TOPIC", default_value = "mqtti/signal")]
    signal_topic: String,

    /// Topic responses are delivered on.
    #[arg(long, env = "MQTTI_PAYLOAD_TOPIC", default_value = "mqtti/payload")]
    payload_topic: String,

    /// MQTT QoS (0, 1, or 2).
    #[arg(long, env = "MQTTI_QOS", default_value_t = 0)]
    qos: u8,

    /// API group of the resource kind to project (empty for the core group).
    #[arg(long, default_value = "")]
    group: String,

    /// API version of the resource kind to project.
    #[arg(long, default_value = "v1")]
    version: String,

    /// Plural resource name to project, e.g. "secrets".
    #[arg(long)]
    resource: String,

    /// Restrict the projected informer to one source namespace; omitted
    /// means all namespaces.
    #[arg(long)]
    namespace: Option<String>,

    /// Label key on source objects naming the destination namespace and
    /// participating in rewritten identity.
    #[arg(long, env = "MQTTI_CLUSTER_LABEL", default_value = "cluster")]
    cluster_label: String,

    /// Local cache resync period.
    #[arg(long, default_value_t = 300)]
    resync_seconds: u64,

    /// Use the in-memory fake destination client instead of a real cluster.
    /// Intended for local testing; a production control plane always talks
    /// to a cluster.
    #[arg(long)]
    memory_sink: bool,
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
    info!(version = env!("CARGO_PKG_VERSION"), "controlplane starting");

    let mut transport_config = TransportConfig::new(
        args.broker_url.as_str(),
        args.client_id.as_str(),
        args.signal_topic.as_str(),
        args.payload_topic.as_str(),
    );
    transport_config.qos = args.qos;

    let transport = match TransportSession::connect(transport_config).await {
        Ok(session) => Arc::new(session),
        Err(e) => {
            eprintln!("FATAL: failed to connect to broker: {e}");
            std::process::exit(1);
        }
    };

    let client: Arc<dyn DynamicClient> = if args.memory_sink {
        Arc::new(InMemoryDynamicClient::new())
    } else {
        match kube::Client::try_default().await {
            Ok(client) => Arc::new(KubeDynamicClient::new(client)),
            Err(e) => {
                eprintln!("FATAL: failed to build destination kube client: {e}");
                std::process::exit(1);
            }
        }
    };

    let shutdown = CancellationToken::new();
    let factory = match SharedInformerFactory::new(transport, args.client_id.clone(), shutdown.clone()).await {
        Ok(factory) => factory,
        Err(e) => {
            eprintln!("FATAL: failed to subscribe to payload topic: {e}");
            std::process::exit(1);
        }
    };

    let gvr = Gvr::new(args.group, args.version, args.resource);
    let informer_config = InformerConfig {
        namespace: args.namespace,
        resync_period: Duration::from_secs(args.resync_seconds),
        ..InformerConfig::default()
    };
    let informer = factory.for_resource(gvr.clone(), informer_config);

    let handler = ProjectionHandler::new(gvr.clone(), client, args.cluster_label);
    informer.add_event_handler(handler.event_handlers());

    factory.start();

    let sync_deadline = shutdown.clone();
    let synced = factory.wait_for_cache_sync(&sync_deadline).await;
    for (gvr, ok) in &synced {
        if !ok {
            warn!(%gvr, "cache did not sync before shutdown");
        }
    }
    info!(%gvr, "initial cache synced, projecting events");

    let signal_handle = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        signal_handle.cancel();
    });

    shutdown.cancelled().await;
    info!("controlplane shutting down");
}
