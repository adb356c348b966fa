//! The transport session: connect, subscribe-by-topic, publish, disconnect.
//! Delivery is at-least-once over MQTT; reconnection is
//! automatic and transparent to callers, but missed messages are never
//! replayed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mqtti_protocol::Frame;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::error::TransportError;

/// Callback invoked with each decoded frame delivered on a subscribed topic.
pub type FrameHandler = Arc<dyn Fn(Frame) + Send + Sync>;

struct Subscription {
    qos: QoS,
    handler: FrameHandler,
}

/// A connected session, shared by both the sender and the informer sides.
pub struct TransportSession {
    client: AsyncClient,
    config: TransportConfig,
    subscriptions: Arc<Mutex<HashMap<String, Subscription>>>,
    event_loop_task: JoinHandle<()>,
}

impl TransportSession {
    /// Connect to the broker named in `config`. The returned session has no
    /// subscriptions yet; call [`TransportSession::subscribe`] for each
    /// topic of interest.
    pub async fn connect(config: TransportConfig) -> Result<Self, TransportError> {
        let (host, port) = parse_host_port(&config.broker_url)?;
        let mut opts = MqttOptions::new(config.client_id.clone(), host, port);
        opts.set_keep_alive(config.keep_alive);

        let (client, mut event_loop) = AsyncClient::new(opts, 256);
        let subscriptions: Arc<Mutex<HashMap<String, Subscription>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let task_subscriptions = subscriptions.clone();
        let task_client = client.clone();
        let event_loop_task = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        let handler = {
                            let subs = task_subscriptions.lock().await;
                            subs.get(&publish.topic).map(|s| s.handler.clone())
                        };
                        let Some(handler) = handler else {
                            debug!(topic = %publish.topic, "no handler for incoming publish");
                            continue;
                        };
                        match serde_json::from_slice::<Frame>(&publish.payload) {
                            Ok(frame) => handler(frame),
                            Err(e) => warn!(error = %e, topic = %publish.topic, "dropping malformed frame"),
                        }
                    }
                    Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                        if !ack.session_present {
                            resubscribe_all(&task_client, &task_subscriptions).await;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "transport connection error, reconnect is automatic");
                        tokio::time::sleep(Duration::from_millis(250)).await;
                    }
                }
            }
        });

        Ok(Self {
            client,
            config,
            subscriptions,
            event_loop_task,
        })
    }

    /// Subscribe to `topic`, invoking `handler` for each frame delivered on
    /// it. Re-issued automatically after a reconnect.
    pub async fn subscribe(&self, topic: &str, handler: FrameHandler) -> Result<(), TransportError> {
        let qos = self.config.mqtt_qos();
        self.client
            .subscribe(topic, qos)
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;
        self.subscriptions
            .lock()
            .await
            .insert(topic.to_owned(), Subscription { qos, handler });
        Ok(())
    }

    /// Publish a frame to `topic` with the session's configured QoS and
    /// retained flag.
    pub async fn publish(&self, topic: &str, frame: &Frame) -> Result<(), TransportError> {
        let bytes = serde_json::to_vec(frame)?;
        self.client
            .publish(topic, self.config.mqtt_qos(), self.config.retained, bytes)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))?;
        Ok(())
    }

    /// The configured signal topic (requests flow informer -> sender).
    pub fn signal_topic(&self) -> &str {
        &self.config.signal_topic
    }

    /// The configured payload topic (responses flow sender -> informer).
    pub fn payload_topic(&self) -> &str {
        &self.config.payload_topic
    }

    /// Disconnect from the broker and stop the background poll task.
    pub async fn disconnect(self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        self.event_loop_task.abort();
        Ok(())
    }
}

async fn resubscribe_all(client: &AsyncClient, subscriptions: &Mutex<HashMap<String, Subscription>>) {
    let subs = subscriptions.lock().await;
    for (topic, sub) in subs.iter() {
        if let Err(e) = client.subscribe(topic, sub.qos).await {
            warn!(topic = %topic, error = %e, "failed to resubscribe after reconnect");
        }
    }
}

fn parse_host_port(broker_url: &str) -> Result<(String, u16), TransportError> {
    let without_scheme = broker_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(broker_url);
    match without_scheme.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| TransportError::Connect(format!("invalid port in '{broker_url}'")))?;
            Ok((host.to_owned(), port))
        }
        None => Ok((without_scheme.to_owned(), 1883)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port_with_scheme() {
        let (host, port) = parse_host_port("mqtt://broker.local:8883").unwrap();
        assert_eq!(host, "broker.local");
        assert_eq!(port, 8883);
    }

    #[test]
    fn defaults_to_1883_without_port() {
        let (host, port) = parse_host_port("broker.local").unwrap();
        assert_eq!(host, "broker.local");
        assert_eq!(port, 1883);
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(parse_host_port("broker.local:abc").is_err());
    }
}
