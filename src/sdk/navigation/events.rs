use crate::sdk::location::LocationError;
use crate::sdk::routing::{RouteError, RouteInfo};

use super::state::Destination;

/// Notifications for the presentation layer, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    DestinationAccepted(Destination),
    InvalidDestinationInput { input: String, reason: String },
    RouteReady(RouteInfo),
    RouteUnavailable(RouteError),
    NavigationStarted,
    NavigationEnded,
    /// Non-blocking; the state does not change.
    PositionWarning {
        consecutive_failures: u32,
        last_error: LocationError,
    },
    LowBattery { level: u8, threshold: u8 },
}

/// User actions fed to [`super::NavigationController::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationCommand {
    SetDestination(String),
    Start,
    End,
    Unmount,
}
