use std::{mem, sync::Arc};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use super::error::NavigationError;
use super::events::{NavigationCommand, NavigationEvent};
use super::state::{Affordances, Destination, DestinationSource, NavigationState, RequestId};
use crate::sdk::animation::{MarkerAnimator, MarkerFrame};
use crate::sdk::battery::BatteryMonitor;
use crate::sdk::config::TrackingConfig;
use crate::sdk::geo::{Coordinate, CoordinateError};
use crate::sdk::location::{LocationProvider, PositionEvent, PositionFix, PositionSource, SessionId};
use crate::sdk::routing::{RouteError, RouteInfo, RouteService, RoutingError, RoutingProvider};

/// The external services a controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub routing: Arc<dyn RoutingProvider>,
    pub location: Arc<dyn LocationProvider>,
    pub battery: Arc<dyn BatteryMonitor>,
}

/// Answer of a spawned route request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    pub request: RequestId,
    pub result: Result<RouteInfo, RouteError>,
}

/// Something the controller has to react to.
#[derive(Debug)]
pub enum ControllerInput {
    Command(NavigationCommand),
    Position(PositionEvent),
    Route(RouteResponse),
}

/// Owns the navigation lifecycle of one screen session.
///
/// Every transition happens through `&mut self`, on whichever task drives the
/// controller. Polling, marker frames and route requests run as separate
/// tasks and only reach the state through [`ControllerInput`]s, which is what
/// makes session and request ids sufficient to discard late arrivals.
pub struct NavigationController {
    config: TrackingConfig,
    state: NavigationState,
    routes: RouteService,
    battery: Arc<dyn BatteryMonitor>,
    source: PositionSource,
    animator: MarkerAnimator,
    mounted: bool,
    last_fix: Option<PositionFix>,
    consecutive_failures: u32,
    warned: bool,
    requests_issued: u64,
    route_task: Option<JoinHandle<()>>,
    route_tx: mpsc::UnboundedSender<RouteResponse>,
    route_rx: mpsc::UnboundedReceiver<RouteResponse>,
    events: mpsc::UnboundedSender<NavigationEvent>,
}

impl NavigationController {
    pub fn new(
        config: TrackingConfig,
        collaborators: Collaborators,
    ) -> (Self, mpsc::UnboundedReceiver<NavigationEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (route_tx, route_rx) = mpsc::unbounded_channel();
        let source = PositionSource::new(
            collaborators.location,
            config.poll_timeout,
            config.max_fix_age,
        );
        let animator = MarkerAnimator::new(config.initial_marker, config.frame_interval);
        let controller = Self {
            state: NavigationState::Idle,
            routes: RouteService::new(collaborators.routing),
            battery: collaborators.battery,
            source,
            animator,
            mounted: false,
            last_fix: None,
            consecutive_failures: 0,
            warned: false,
            requests_issued: 0,
            route_task: None,
            route_tx,
            route_rx,
            events,
            config,
        };
        (controller, events_rx)
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn affordances(&self, input_present: bool) -> Affordances {
        self.state.affordances(input_present)
    }

    /// Last good fix; errors never overwrite it.
    pub fn last_fix(&self) -> Option<&PositionFix> {
        self.last_fix.as_ref()
    }

    pub fn animator(&self) -> &MarkerAnimator {
        &self.animator
    }

    pub fn marker_frames(&self) -> watch::Receiver<MarkerFrame> {
        self.animator.subscribe()
    }

    pub fn session(&self) -> Option<SessionId> {
        self.source.session()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Screen appeared: check the battery and start polling.
    pub async fn mount(&mut self) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        log::info!("Tracking session mounted");
        self.check_battery().await;
        self.restart_polling();
    }

    /// Screen went away: stop every task the controller started and forget
    /// the session's position. Idempotent.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.source.stop();
        self.animator.jump_to(self.config.initial_marker);
        self.cancel_route_request();
        self.state = NavigationState::Idle;
        // The next session routes from its own first fix.
        self.last_fix = None;
        self.consecutive_failures = 0;
        self.warned = false;
        log::info!("Tracking session unmounted");
    }

    /// Accepts `lat,lon` or a place description and requests a route to it.
    ///
    /// A rejected input leaves the state untouched. A geocoder outage clears
    /// the destination back to Idle.
    pub async fn set_destination_input(&mut self, text: &str) -> Result<(), NavigationError> {
        self.check_battery().await;
        if self.state.is_navigating() {
            return Err(NavigationError::InvalidAction {
                action: "set a destination",
                state: self.state.name(),
            });
        }

        let destination = match self.resolve_destination(text.trim()).await {
            Ok(destination) => destination,
            Err(err) => {
                match &err {
                    NavigationError::Input { input, reason } => {
                        log::warn!("Rejected destination {:?}: {}", input, reason);
                        self.emit(NavigationEvent::InvalidDestinationInput {
                            input: input.clone(),
                            reason: reason.clone(),
                        });
                    }
                    NavigationError::Provider(route_err) => {
                        log::warn!("Geocoding failed, clearing destination: {}", route_err);
                        self.cancel_route_request();
                        self.state = NavigationState::Idle;
                        self.emit(NavigationEvent::RouteUnavailable(route_err.clone()));
                    }
                    NavigationError::InvalidAction { .. } => {}
                }
                return Err(err);
            }
        };

        self.cancel_route_request();
        log::info!(
            "Destination {:?} accepted at {}",
            destination.input,
            destination.coordinate
        );
        self.emit(NavigationEvent::DestinationAccepted(destination.clone()));
        self.state = NavigationState::DestinationPending {
            destination,
            request: None,
        };
        self.request_route();
        Ok(())
    }

    /// RouteReady → Navigating.
    pub fn start(&mut self) -> Result<(), NavigationError> {
        match mem::take(&mut self.state) {
            NavigationState::RouteReady { destination, route } => {
                log::info!(
                    "Navigation started to {} ({:.1} km, {:.0} min)",
                    destination.coordinate,
                    route.distance_km,
                    route.duration_min
                );
                self.state = NavigationState::Navigating { destination, route };
                if let Some(fix) = self.last_fix {
                    self.animator.jump_to(fix.coordinate);
                    self.animator.set_heading(fix.heading);
                }
                self.consecutive_failures = 0;
                self.warned = false;
                self.restart_polling();
                self.emit(NavigationEvent::NavigationStarted);
                Ok(())
            }
            other => {
                let state = other.name();
                self.state = other;
                Err(NavigationError::InvalidAction {
                    action: "start navigation",
                    state,
                })
            }
        }
    }

    /// Back to Idle, clearing destination and route. A no-op when idle.
    pub fn end(&mut self) {
        match mem::take(&mut self.state) {
            NavigationState::Idle => {}
            NavigationState::Navigating { destination, .. } => {
                self.animator.cancel();
                // New session id: fixes already in flight are now stale.
                self.restart_polling();
                self.consecutive_failures = 0;
                self.warned = false;
                log::info!("Navigation to {} ended", destination.coordinate);
                self.emit(NavigationEvent::NavigationEnded);
            }
            pending => {
                self.cancel_route_request();
                log::info!("Cancelled destination while {}", pending.name());
            }
        }
    }

    /// Applies one polled position event.
    pub fn handle_position(&mut self, event: PositionEvent) {
        if self.source.session() != Some(event.session) {
            log::debug!("Dropping position event from stale session {}", event.session);
            return;
        }
        match event.result {
            Ok(fix) => {
                self.last_fix = Some(fix);
                self.consecutive_failures = 0;
                self.warned = false;
                if self.state.is_navigating() {
                    self.animator.set_heading(fix.heading);
                    self.animator
                        .set_target(fix.coordinate, self.config.animation_duration);
                } else if matches!(
                    self.state,
                    NavigationState::DestinationPending { request: None, .. }
                ) {
                    self.request_route();
                }
            }
            Err(err) => {
                if !self.state.is_navigating() {
                    log::debug!("Position fix failed while {}: {}", self.state, err);
                    return;
                }
                self.consecutive_failures += 1;
                log::warn!(
                    "Position fix failed ({} in a row): {}",
                    self.consecutive_failures,
                    err
                );
                if self.consecutive_failures >= self.config.failure_warning_threshold
                    && !self.warned
                {
                    self.warned = true;
                    self.emit(NavigationEvent::PositionWarning {
                        consecutive_failures: self.consecutive_failures,
                        last_error: err,
                    });
                }
            }
        }
    }

    /// Applies a route answer if it belongs to the latest request.
    pub fn handle_route_response(&mut self, response: RouteResponse) {
        if self.state.pending_request() != Some(response.request) {
            log::debug!("Dropping stale route response {}", response.request);
            return;
        }
        self.route_task = None;
        let NavigationState::DestinationPending { destination, .. } = mem::take(&mut self.state)
        else {
            return;
        };
        match response.result {
            Ok(route) => {
                log::info!(
                    "Route ready: {:.1} km, {:.0} min, {} points",
                    route.distance_km,
                    route.duration_min,
                    route.path.len()
                );
                self.state = NavigationState::RouteReady {
                    destination,
                    route: route.clone(),
                };
                self.emit(NavigationEvent::RouteReady(route));
            }
            Err(err) => {
                log::warn!("No route to {}: {}", destination.coordinate, err);
                self.emit(NavigationEvent::RouteUnavailable(err));
            }
        }
    }

    /// Waits for the next position event or route response.
    pub async fn next_input(&mut self) -> ControllerInput {
        let source = &mut self.source;
        let routes = &mut self.route_rx;
        tokio::select! {
            Some(event) = source.next() => ControllerInput::Position(event),
            Some(response) = routes.recv() => ControllerInput::Route(response),
            else => std::future::pending::<ControllerInput>().await,
        }
    }

    /// Waits for one background input and applies it.
    pub async fn step(&mut self) {
        let input = self.next_input().await;
        self.dispatch(input).await;
    }

    pub async fn dispatch(&mut self, input: ControllerInput) {
        match input {
            ControllerInput::Position(event) => self.handle_position(event),
            ControllerInput::Route(response) => self.handle_route_response(response),
            ControllerInput::Command(command) => self.execute(command).await,
        }
    }

    /// Drives the session until `Unmount` arrives or the command channel
    /// closes.
    pub async fn run(mut self, mut commands: mpsc::Receiver<NavigationCommand>) {
        self.mount().await;
        loop {
            let input = tokio::select! {
                command = commands.recv() => match command {
                    Some(NavigationCommand::Unmount) | None => break,
                    Some(command) => ControllerInput::Command(command),
                },
                input = self.next_input() => input,
            };
            self.dispatch(input).await;
        }
        self.unmount();
    }

    async fn execute(&mut self, command: NavigationCommand) {
        let result = match command {
            NavigationCommand::SetDestination(text) => self.set_destination_input(&text).await,
            NavigationCommand::Start => self.start(),
            NavigationCommand::End => {
                self.end();
                Ok(())
            }
            NavigationCommand::Unmount => {
                self.unmount();
                Ok(())
            }
        };
        if let Err(NavigationError::InvalidAction { action, state }) = result {
            log::warn!("Ignored command: cannot {} while {}", action, state);
        }
    }

    async fn resolve_destination(&self, input: &str) -> Result<Destination, NavigationError> {
        let reject = |reason: String| NavigationError::Input {
            input: input.to_string(),
            reason,
        };
        if input.is_empty() {
            return Err(reject("destination is empty".to_string()));
        }
        match input.parse::<Coordinate>() {
            Ok(coordinate) => Ok(Destination {
                input: input.to_string(),
                coordinate,
                source: DestinationSource::Coordinates,
            }),
            // Numbers in the right shape but out of range are not place names.
            Err(err @ CoordinateError::LatitudeOutOfRange(_))
            | Err(err @ CoordinateError::LongitudeOutOfRange(_)) => Err(reject(err.to_string())),
            Err(parse_err) => {
                log::debug!("{:?} is not lat,lon ({}), geocoding", input, parse_err);
                match self.routes.resolve_place(input).await {
                    Ok(coordinate) => Ok(Destination {
                        input: input.to_string(),
                        coordinate,
                        source: DestinationSource::Geocoded,
                    }),
                    Err(RoutingError::PlaceNotFound(_)) => {
                        Err(reject("location not found".to_string()))
                    }
                    Err(geo_err) => Err(NavigationError::Provider(
                        RouteError::ProviderUnavailable(geo_err.to_string()),
                    )),
                }
            }
        }
    }

    /// Spawns the route request for a pending destination once an origin
    /// fix exists.
    fn request_route(&mut self) {
        let NavigationState::DestinationPending {
            destination,
            request,
        } = &mut self.state
        else {
            return;
        };
        if request.is_some() {
            return;
        }
        let Some(origin) = self.last_fix.map(|fix| fix.coordinate) else {
            log::info!("Waiting for a first position fix before routing");
            return;
        };

        self.requests_issued += 1;
        let id = RequestId(self.requests_issued);
        *request = Some(id);

        let target = destination.coordinate;
        let mode = self.config.travel_mode;
        let routes = self.routes.clone();
        let tx = self.route_tx.clone();
        log::debug!("Issuing {} {} -> {}", id, origin, target);
        self.route_task = Some(tokio::spawn(async move {
            let result = routes.compute_route(origin, target, mode).await;
            let _ = tx.send(RouteResponse {
                request: id,
                result,
            });
        }));
    }

    fn cancel_route_request(&mut self) {
        if let Some(task) = self.route_task.take() {
            task.abort();
        }
    }

    fn restart_polling(&mut self) {
        if self.mounted {
            self.source
                .start(self.config.poll_interval, self.config.accuracy);
        }
    }

    async fn check_battery(&mut self) {
        let threshold = self.config.low_battery_threshold;
        match self.battery.battery_level().await {
            Ok(level) if level < threshold => {
                log::warn!(
                    "Battery low ({}% < {}%): battery saver may throttle location updates",
                    level,
                    threshold
                );
                self.emit(NavigationEvent::LowBattery { level, threshold });
            }
            Ok(level) => log::debug!("Battery at {}%", level),
            Err(e) => log::debug!("Battery level unavailable: {}", e),
        }
    }

    fn emit(&self, event: NavigationEvent) {
        // Nobody listening is fine; the state is still authoritative.
        let _ = self.events.send(event);
    }
}

impl Drop for NavigationController {
    fn drop(&mut self) {
        self.cancel_route_request();
    }
}
