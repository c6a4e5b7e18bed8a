//! Device position input: the provider seam and the polling source built on it.

pub mod error;
pub mod replay;
pub mod source;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use super::geo::{Coordinate, Heading};

pub use error::LocationError;
pub use replay::ReplayLocationProvider;
pub use source::{PositionEvent, PositionSource, SessionId};

/// One reported device position. Superseded by later fixes, never edited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    pub heading: Heading,
    pub timestamp: Instant,
}

impl PositionFix {
    /// A fix captured now.
    pub fn new(coordinate: Coordinate, heading: Heading) -> Self {
        Self {
            coordinate,
            heading,
            timestamp: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AccuracyMode {
    #[default]
    High,
    Balanced,
}

/// Options passed to the provider for a single poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRequest {
    pub accuracy: AccuracyMode,
    pub timeout: Duration,
    /// Oldest cached fix the provider may hand back.
    pub maximum_age: Duration,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Fetches one fix. Implementations do not need to enforce `request.timeout`;
    /// the polling source bounds every call itself.
    async fn current_position(&self, request: &PositionRequest)
        -> Result<PositionFix, LocationError>;
}
