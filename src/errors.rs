use thiserror::Error;

pub type Result<T> = std::result::Result<T, HandrailError>;

/// Every failure the crate can surface, in one place.
///
/// Configuration problems fail at construction time, transport problems at
/// the store boundary, and domain-validation problems when a status is read
/// or written. User denial is *not* an error — it is a normal terminal state
/// reported through [`crate::approval::Outcome`].
#[derive(Debug, Error)]
pub enum HandrailError {
    #[error("no API key found: set {key} or pass api_key for backend approvals", key = crate::config::API_KEY_ENV)]
    MissingApiKey,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("duplicate option name: {0:?}")]
    DuplicateOptionName(String),

    #[error("backend returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("still pending: {0}")]
    StillPending(String),

    #[error("a denial must carry a comment")]
    MissingDenialComment,

    #[error("{0} requires a backend; did you forget your API key?")]
    BackendRequired(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HandrailError {
    /// True for errors raised by the HTTP transport rather than by local
    /// validation.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HandrailError::Api { .. } | HandrailError::Transport(_) | HandrailError::Decode(_)
        )
    }
}
