use thiserror::Error;

/// Per-poll failure reported by a location provider. Never ends the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Timed out waiting for a position fix")]
    Timeout,

    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),
}
