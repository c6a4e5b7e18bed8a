pub mod error;
pub mod provider;
pub mod route;
pub mod service;

pub use error::{RouteError, RoutingError};
pub use provider::OrsProvider;
pub use route::{Directions, RouteInfo, TravelMode};
pub use service::{RouteService, RoutingProvider};
