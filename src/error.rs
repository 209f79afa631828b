//! Unified error types for Visit-Session

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Visit-Session
#[derive(Error, Debug)]
pub enum Error {
    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parse errors
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The runtime could not evaluate a script at all
    #[error("Script evaluation failed: {0}")]
    ScriptEvaluation(String),

    /// The runtime evaluated a call but it raised an exception
    #[error("Script function {function} raised: {message}\n{stack}")]
    ScriptException {
        function: String,
        message: String,
        stack: String,
    },

    /// Inbound message could not be decoded
    #[error("Invalid script message: {0}")]
    InvalidMessage(String),

    /// Call arguments could not be encoded
    #[error("Invalid call arguments: {0}")]
    InvalidArguments(String),

    /// A coordination channel was closed
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Rendering surface errors
    #[error("Surface error: {0}")]
    Surface(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new script evaluation error
    pub fn script_evaluation<S: Into<String>>(msg: S) -> Self {
        Error::ScriptEvaluation(msg.into())
    }

    /// Create a new script exception error
    pub fn script_exception<F, M, S>(function: F, message: M, stack: S) -> Self
    where
        F: Into<String>,
        M: Into<String>,
        S: Into<String>,
    {
        Error::ScriptException {
            function: function.into(),
            message: message.into(),
            stack: stack.into(),
        }
    }

    /// Create a new invalid message error
    pub fn invalid_message<S: Into<String>>(msg: S) -> Self {
        Error::InvalidMessage(msg.into())
    }

    /// Create a new invalid arguments error
    pub fn invalid_arguments<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArguments(msg.into())
    }

    /// Create a new channel closed error
    pub fn channel_closed<S: Into<String>>(msg: S) -> Self {
        Error::ChannelClosed(msg.into())
    }

    /// Create a new surface error
    pub fn surface<S: Into<String>>(msg: S) -> Self {
        Error::Surface(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether this error came out of the script bridge
    pub fn is_script_failure(&self) -> bool {
        matches!(self, Error::ScriptEvaluation(_) | Error::ScriptException { .. })
    }
}

/// Why a visit ended in the `Failed` state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VisitFailure {
    /// The runtime reported a failed request
    #[error("Request failed with status code {status_code}")]
    RequestFailed { status_code: u16 },

    /// The rendering surface could not load the location
    #[error("Load failed: {0}")]
    LoadFailed(String),

    /// The bridge call that drives the visit could not be issued
    #[error("Bridge call failed: {0}")]
    BridgeCall(String),
}

impl VisitFailure {
    /// HTTP status code, when the failure carries one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            VisitFailure::RequestFailed { status_code } => Some(*status_code),
            _ => None,
        }
    }
}
