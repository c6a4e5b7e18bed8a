use serde::Serialize;
use std::fmt;

use crate::sdk::geo::Coordinate;
use crate::sdk::routing::RouteInfo;

/// Identifies one route request; only the latest one is ever applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DestinationSource {
    /// Typed or selected as `lat,lon`.
    Coordinates,
    /// Looked up by place description.
    Geocoded,
}

/// A resolved routing target together with what the user typed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Destination {
    pub input: String,
    pub coordinate: Coordinate,
    pub source: DestinationSource,
}

/// Lifecycle of one screen session. Each variant carries exactly the data
/// that is valid in it, so "ready without a route" cannot be expressed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NavigationState {
    #[default]
    Idle,
    /// `request` is `None` until a first fix gives the route an origin.
    DestinationPending {
        destination: Destination,
        request: Option<RequestId>,
    },
    RouteReady {
        destination: Destination,
        route: RouteInfo,
    },
    Navigating {
        destination: Destination,
        route: RouteInfo,
    },
}

impl NavigationState {
    pub fn name(&self) -> &'static str {
        match self {
            NavigationState::Idle => "idle",
            NavigationState::DestinationPending { .. } => "destination pending",
            NavigationState::RouteReady { .. } => "route ready",
            NavigationState::Navigating { .. } => "navigating",
        }
    }

    pub fn destination(&self) -> Option<&Destination> {
        match self {
            NavigationState::Idle => None,
            NavigationState::DestinationPending { destination, .. }
            | NavigationState::RouteReady { destination, .. }
            | NavigationState::Navigating { destination, .. } => Some(destination),
        }
    }

    pub fn route(&self) -> Option<&RouteInfo> {
        match self {
            NavigationState::RouteReady { route, .. } | NavigationState::Navigating { route, .. } => {
                Some(route)
            }
            _ => None,
        }
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        match self {
            NavigationState::DestinationPending { request, .. } => *request,
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, NavigationState::Idle)
    }

    pub fn is_navigating(&self) -> bool {
        matches!(self, NavigationState::Navigating { .. })
    }

    /// What the screen may offer, derived from the state alone.
    ///
    /// `input_present` is whether the destination field holds any text.
    pub fn affordances(&self, input_present: bool) -> Affordances {
        let primary = match self {
            NavigationState::Navigating { .. } => Some(PrimaryAction::EndRoute),
            NavigationState::RouteReady { .. } => Some(PrimaryAction::StartRoute),
            NavigationState::DestinationPending { .. } => Some(PrimaryAction::ShowDirections),
            NavigationState::Idle if input_present => Some(PrimaryAction::ShowDirections),
            NavigationState::Idle => None,
        };
        Affordances {
            primary,
            show_current_marker: !self.is_navigating(),
            show_animated_marker: self.is_navigating(),
            show_destination_marker: self.destination().is_some(),
            summary: self.route().map(|r| RouteSummary {
                distance_km: r.distance_km,
                duration_min: r.duration_min,
            }),
        }
    }
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrimaryAction {
    ShowDirections,
    StartRoute,
    EndRoute,
}

impl PrimaryAction {
    pub fn label(&self) -> &'static str {
        match self {
            PrimaryAction::ShowDirections => "Show Directions",
            PrimaryAction::StartRoute => "Start Route",
            PrimaryAction::EndRoute => "End Route",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteSummary {
    pub distance_km: f64,
    pub duration_min: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Affordances {
    pub primary: Option<PrimaryAction>,
    pub show_current_marker: bool,
    pub show_animated_marker: bool,
    pub show_destination_marker: bool,
    pub summary: Option<RouteSummary>,
}
