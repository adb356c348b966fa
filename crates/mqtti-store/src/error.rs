#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("list failed: {0}")]
    List(String),
    #[error("watch failed: {0}")]
    Watch(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("get failed: {0}")]
    Get(String),
    #[error("create failed: {0}")]
    Create(String),
    #[error("update failed: {0}")]
    Update(String),
    #[error("delete failed: {0}")]
    Delete(String),
}
