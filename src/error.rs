use thiserror::Error;

/// Errors surfaced by backends, the apply pipeline and the webhook client.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Invalid or incomplete configuration; fatal at construction time.
    #[error("configuration error: {0}")]
    Config(String),

    /// No project id in config, environment or the metadata server.
    #[error("failed to auto-detect the project id: {0}")]
    ProjectDetection(String),

    /// The request never produced a response (connect, timeout, decode).
    #[error("{operation}: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    /// The remote API answered with a non-success status.
    #[error("{operation} returned {status}: {body}")]
    Api {
        operation: String,
        status: u16,
        body: String,
    },

    /// A body that should be JSON could not be read or written as such.
    #[error("{operation}: invalid JSON: {source}")]
    Json {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// The backend refused a change transaction as a whole.
    #[error("change rejected for zone {zone}: {reason}")]
    ChangeRejected { zone: String, reason: String },

    /// The caller's deadline expired before the operation finished.
    #[error("{operation} did not finish within {seconds}s")]
    DeadlineExceeded { operation: String, seconds: u64 },
}

impl ProviderError {
    pub(crate) fn transport(operation: impl Into<String>, source: reqwest::Error) -> Self {
        ProviderError::Transport {
            operation: operation.into(),
            source,
        }
    }
}

pub type Result<T, E = ProviderError> = std::result::Result<T, E>;
