//! The navigation lifecycle: Idle → DestinationPending → RouteReady →
//! Navigating → Idle.

pub mod controller;
pub mod error;
pub mod events;
pub mod state;

pub use controller::{Collaborators, ControllerInput, NavigationController, RouteResponse};
pub use error::NavigationError;
pub use events::{NavigationCommand, NavigationEvent};
pub use state::{
    Affordances, Destination, DestinationSource, NavigationState, PrimaryAction, RequestId,
    RouteSummary,
};
