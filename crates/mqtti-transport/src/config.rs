use std::time::Duration;

/// Client certificate/key and CA paths for a TLS broker connection.
///
/// Loading and parsing the actual certificate material is an external
/// collaborator concern; this record only carries the paths
/// through to whatever connects them at startup.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub ca_cert_path: Option<String>,
    pub client_cert_path: Option<String>,
    pub client_key_path: Option<String>,
}

/// An immutable configuration record threaded explicitly into every
/// constructor. No hidden singletons.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub broker_url: String,
    pub client_id: String,
    pub signal_topic: String,
    pub payload_topic: String,
    pub qos: u8,
    pub retained: bool,
    pub tls: Option<TlsConfig>,
    pub keep_alive: Duration,
}

impl TransportConfig {
    pub fn new(
        broker_url: impl Into<String>,
        client_id: impl Into<String>,
        signal_topic: impl Into<String>,
        payload_topic: impl Into<String>,
    ) -> Self {
        Self {
            broker_url: broker_url.into(),
            client_id: client_id.into(),
            signal_topic: signal_topic.into(),
            payload_topic: payload_topic.into(),
            qos: 0,
            retained: false,
            tls: None,
            keep_alive: Duration::from_secs(30),
        }
    }

    pub(crate) fn mqtt_qos(&self) -> rumqttc::QoS {
        match self.qos {
            1 => rumqttc::QoS::AtLeastOnce,
            2 => rumqttc::QoS::ExactlyOnce,
            _ => rumqttc::QoS::AtMostOnce,
        }
    }
}
