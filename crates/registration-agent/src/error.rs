//! Error types for the registration agent

use thiserror::Error;

/// Registration agent error type
#[derive(Error, Debug)]
pub enum Error {
    /// The registry could not be reached (connect failure, timeout, broken stream)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The registry answered with a non-success status
    #[error("Registry returned {status}: {body}")]
    Protocol {
        /// HTTP status code
        status: u16,
        /// Response body, as received
        body: String,
    },

    /// The registry answered with a payload we could not interpret
    #[error("Malformed registry response: {0}")]
    MalformedResponse(String),

    /// Missing or invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal state machine inconsistency
    #[error("State invariant violated: {0}")]
    InvariantViolation(&'static str),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Error::Protocol {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => Error::Transport(err.to_string()),
        }
    }
}

impl Error {
    /// Whether the error came from the network layer rather than the registry itself
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
