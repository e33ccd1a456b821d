// ── Core error types ──
//
// Errors returned synchronously by the session API. Remote rejections of
// property sets never come back this way; they reach the per-object
// error callbacks. The `From<connui_bus::Error>` impl folds transport
// failures into this taxonomy.

use connui_bus::ErrorReply;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("resource exhausted: {message}")]
    ResourceExhausted { message: String },

    #[error("{property} already being set on {path}")]
    AlreadyInProgress { path: String, property: String },

    #[error("rejected by remote: {0}")]
    RemoteRejected(ErrorReply),

    #[error("protocol violation: {message}")]
    ProtocolViolation { message: String },

    #[error("bus transport failed: {0}")]
    Bus(#[source] connui_bus::Error),

    #[error("{operation} was canceled before completing")]
    Canceled { operation: String },

    #[error("event loop is no longer running")]
    LoopClosed,
}

impl CoreError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn not_initialized(component: &str) -> Self {
        Self::invalid(format!("{component} is not initialized"))
    }

    pub(crate) fn unknown_object(kind: &str, path: &str) -> Self {
        Self::invalid(format!("unknown {kind} {path}"))
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
        }
    }
}

impl From<connui_bus::Error> for CoreError {
    fn from(err: connui_bus::Error) -> Self {
        match err {
            connui_bus::Error::Access(e) => Self::ProtocolViolation {
                message: e.to_string(),
            },
            connui_bus::Error::Exhausted(message) => Self::ResourceExhausted { message },
            other => Self::Bus(other),
        }
    }
}

impl From<connui_bus::AccessError> for CoreError {
    fn from(err: connui_bus::AccessError) -> Self {
        Self::ProtocolViolation {
            message: err.to_string(),
        }
    }
}

impl From<ErrorReply> for CoreError {
    fn from(err: ErrorReply) -> Self {
        Self::RemoteRejected(err)
    }
}
