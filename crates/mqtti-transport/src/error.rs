#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect: {0}")]
    Connect(String),
    #[error("publish: {0}")]
    Publish(String),
    #[error("subscribe: {0}")]
    Subscribe(String),
    #[error("decode: {0}")]
    Decode(#[from] mqtti_protocol::ProtocolError),
    #[error("frame serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}
