#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {entity} '{id}'")]
    NotFound { entity: &'static str, id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
