pub mod sdk;

pub use sdk::animation::{MarkerAnimator, MarkerFrame};
pub use sdk::battery::{BatteryMonitor, BatteryWatcher, SysfsBatteryMonitor};
pub use sdk::config::{ProviderConfig, TrackingConfig};
pub use sdk::geo::{Coordinate, Heading};
pub use sdk::location::{LocationProvider, PositionFix, PositionSource, ReplayLocationProvider};
pub use sdk::navigation::{
    Collaborators, NavigationCommand, NavigationController, NavigationEvent, NavigationState,
};
pub use sdk::routing::{OrsProvider, RouteInfo, RouteService, RoutingProvider, TravelMode};
