#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown mode: {0}")]
    UnknownMode(String),
    #[error("malformed frame type: {0}")]
    MalformedType(String),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}
