use thiserror::Error;

/// Which retrieval backend a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Lexical,
    Vector,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Lexical => f.write_str("lexical"),
            Backend::Vector => f.write_str("vector"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Backend unavailable ({backend}): {reason}")]
    BackendUnavailable { backend: Backend, reason: String },

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Cache entry corrupt: {0}")]
    CacheCorruption(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn lexical_unavailable(reason: impl std::fmt::Display) -> Self {
        Error::BackendUnavailable { backend: Backend::Lexical, reason: reason.to_string() }
    }

    pub fn vector_unavailable(reason: impl std::fmt::Display) -> Self {
        Error::BackendUnavailable { backend: Backend::Vector, reason: reason.to_string() }
    }

    /// Errors a caller of the public operations is allowed to see.
    /// Everything else is recovered inside the engine.
    pub fn is_caller_visible(&self) -> bool {
        matches!(
            self,
            Error::InvalidQuery(_) | Error::ConfigInvalid(_) | Error::QueryFailed(_) | Error::NotFound(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self { Error::Operation(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, Error>;
