//! Error types.

use thiserror::Error;

use crate::registry::ListenerId;

/// Errors surfaced by the viewport runtime.
///
/// Missing environments and malformed timeouts are not errors: they degrade
/// to zero sizes and disabled timers.
#[derive(Debug, Error)]
pub enum ViewportError {
    /// Terminal I/O failed while waiting for events.
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A subscriber panicked during delivery.
    #[error("listener {0} panicked: {1}")]
    ListenerPanicked(ListenerId, String),

    /// A dimension filter name other than `w`, `h` or `both`.
    #[error("unknown dimension {0:?}, expected \"w\", \"h\" or \"both\"")]
    UnknownDimension(String),
}

pub type Result<T> = std::result::Result<T, ViewportError>;

/// Render a panic payload for logging.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
