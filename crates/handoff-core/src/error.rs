//! Error taxonomy for the coordination layer.
//!
//! None of these are fatal: every path that produces one also has a local
//! playback fallback.

use crate::transport::TransportError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandoffError {
    /// A remote command was issued while no session is connected.
    #[error("no active cast session")]
    NoActiveSession,
    /// The transport rejected a connect request.
    #[error("session failed to start: {0}")]
    SessionStartFailure(String),
    /// The remote client failed a load/play/pause/seek before acknowledging it.
    #[error("remote command failed: {0}")]
    RemoteCommandFailure(#[from] TransportError),
    /// The media item could not be built.
    #[error("invalid media item: {0}")]
    InvalidMedia(String),
    /// The device is not in the registry.
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    /// A viewer command was issued with no viewer open.
    #[error("no viewer is open")]
    NoViewer,
}
