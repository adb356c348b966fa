#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("destination client error: {0}")]
    Client(#[from] mqtti_store::ClientError),
    #[error("source object carries no cluster-identity label {label:?}")]
    MissingClusterLabel { label: String },
}
