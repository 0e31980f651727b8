use thiserror::Error;

// Basic error handling with thiserror
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseFailed(#[from] serde_json::Error),

    #[error("URL encoding failed: {0}")]
    UrlEncodingFailed(#[from] serde_urlencoded::ser::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("No API token configured")]
    MissingCredential, // Configuration error, never retried

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot connect to device {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Device is not connected")]
    NotConnected,

    #[error("Device command failed: {0}")]
    Device(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No response for {0} before the deadline")]
    ResponseTimeout(String),

    #[error("Request for {0} was abandoned")]
    ResponseAbandoned(String), // Registration removed without a response

    #[error("Task panicked or cancelled")]
    TaskJoinError(#[from] tokio::task::JoinError),
}

impl RemoteError {
    /// True for failures of the network or device transport, as opposed to
    /// configuration or payload problems.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RemoteError::RequestFailed(_)
                | RemoteError::IoError(_)
                | RemoteError::Device(_)
                | RemoteError::ResponseTimeout(_)
                | RemoteError::ResponseAbandoned(_)
        )
    }
}
