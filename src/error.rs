use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Upstream error: {0}")]
    UpstreamMessage(String),

    #[error("Malformed stream: {0}")]
    MalformedStream(String),

    #[error("Vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("No usable input: {0}")]
    EmptyInput(String),

    #[error("Unknown message sender: {0}")]
    UnknownSender(String),

    #[error("Stream buffer exceeded {limit} bytes without a parseable element")]
    StreamOverflow { limit: usize },

    #[error("Config error: {0}")]
    Config(String),
}

impl ChatError {
    /// True for failures of the network or the remote service itself,
    /// including a missing or rejected credential.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ChatError::Http(_)
                | ChatError::Upstream { .. }
                | ChatError::UpstreamMessage(_)
                | ChatError::Auth(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
