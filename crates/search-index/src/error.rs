#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("{0} index has not been built")]
    NotReady(&'static str),

    #[error("unsupported snapshot format version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl From<serde_json::Error> for IndexError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
