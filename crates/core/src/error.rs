/// Result alias that carries the custom [`MosError`] type.
pub type Result<T> = std::result::Result<T, MosError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MosError {
    /// Free-form failure surfaced to the user as-is.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors, most commonly a failed ledger write.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The config file or ledger document could not be (de)serialised.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// A rating outside the 1..=5 MOS scale.
    #[error("score {0} is outside the MOS scale 1-5")]
    InvalidScore(u8),
    /// The configuration was readable but semantically invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MosError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}
