// ── Bus error types ──
//
// Failures raised by the transport seam and by typed value access.
// `connui-core` translates these into its own error taxonomy.

use thiserror::Error;

use crate::access::AccessError;

#[derive(Debug, Error)]
pub enum Error {
    /// A value did not have the expected shape.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// The connection to the bus is gone.
    #[error("bus connection lost")]
    Disconnected,

    /// The transport refused to queue a message.
    #[error("failed to send {member} to {path}: {reason}")]
    SendFailed {
        path: String,
        member: String,
        reason: String,
    },

    /// The transport ran out of buffers, serials or similar.
    #[error("bus resources exhausted: {0}")]
    Exhausted(String),

    /// An object is already exported at this path/interface.
    #[error("object already exported at {path} ({interface})")]
    ObjectExists { path: String, interface: String },
}
