#[derive(Debug, thiserror::Error)]
pub enum InformerError {
    #[error("transport error: {0}")]
    Transport(#[from] mqtti_transport::TransportError),
    #[error("informer cancelled")]
    Cancelled,
}
