//! Error taxonomy shared by every client operation.

use thiserror::Error;

/// Failure of a remote file operation.
///
/// The variant tells the caller what happened to the session: a
/// [`ClientError::Connection`] always discards it, while the other variants
/// leave it usable for the next call.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The control connection could not be established or was lost.
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The server answered, but rejected the command.
    #[error("server replied {code}: {text}")]
    Protocol { code: String, text: String },

    /// A caller-supplied argument is unusable; nothing was sent.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// Local file I/O failed before any command was issued.
    #[error("local I/O error: {0}")]
    Local(#[source] std::io::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn protocol(code: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Protocol {
            code: code.into(),
            text: text.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this failure invalidates the session.
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Reply code carried by a protocol failure.
    pub fn reply_code(&self) -> Option<&str> {
        match self {
            Self::Protocol { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Connection {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Reject empty remote names before they reach the wire.
pub(crate) fn require_name<'a>(what: &str, value: &'a str) -> ClientResult<&'a str> {
    if value.trim().is_empty() {
        return Err(ClientError::validation(format!("{what} must not be empty")));
    }
    Ok(value)
}
