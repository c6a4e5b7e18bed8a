use async_trait::async_trait;
use route_tracker::sdk::battery::BatteryError;
use route_tracker::sdk::location::{LocationError, PositionEvent, PositionRequest};
use route_tracker::sdk::navigation::{
    ControllerInput, DestinationSource, NavigationError, PrimaryAction, RouteResponse,
};
use route_tracker::sdk::routing::{Directions, RouteError, RoutingError};
use route_tracker::{
    BatteryMonitor, Collaborators, Coordinate, Heading, LocationProvider, NavigationCommand,
    NavigationController, NavigationEvent, NavigationState, PositionFix, RouteInfo,
    RoutingProvider, TrackingConfig, TravelMode,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

fn c(lat: f64, lon: f64) -> Coordinate {
    Coordinate::new(lat, lon).unwrap()
}

fn home() -> Coordinate {
    c(30.7046, 76.7179)
}

enum Step {
    Fix(Coordinate, Heading),
    Fail(LocationError),
    Hang,
}

/// Plays scripted steps, then keeps reporting the last good coordinate.
struct ScriptedDevice {
    steps: Mutex<VecDeque<Step>>,
    resting: Mutex<Coordinate>,
}

impl ScriptedDevice {
    fn at(origin: Coordinate) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(VecDeque::new()),
            resting: Mutex::new(origin),
        })
    }

    fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }
}

#[async_trait]
impl LocationProvider for ScriptedDevice {
    async fn current_position(
        &self,
        _request: &PositionRequest,
    ) -> Result<PositionFix, LocationError> {
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Fix(coordinate, heading)) => {
                *self.resting.lock().unwrap() = coordinate;
                Ok(PositionFix::new(coordinate, heading))
            }
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => std::future::pending().await,
            None => {
                let coordinate = *self.resting.lock().unwrap();
                Ok(PositionFix::new(coordinate, Heading::Unknown))
            }
        }
    }
}

struct MockRouting {
    distance_m: f64,
    duration_s: f64,
    unroutable: bool,
    geocoder_down: bool,
    delay: Duration,
    places: Vec<(&'static str, Coordinate)>,
    geocode_calls: AtomicU32,
    origins: Mutex<Vec<Coordinate>>,
}

impl MockRouting {
    fn new() -> Self {
        Self {
            distance_m: 12_400.0,
            duration_s: 1_080.0,
            unroutable: false,
            geocoder_down: false,
            delay: Duration::ZERO,
            places: vec![("Sector 17, Chandigarh", c(30.7398, 76.7827))],
            geocode_calls: AtomicU32::new(0),
            origins: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RoutingProvider for MockRouting {
    async fn geocode(&self, place: &str) -> Result<Coordinate, RoutingError> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        if self.geocoder_down {
            return Err(RoutingError::RawApiError("503 Service Unavailable".into()));
        }
        self.places
            .iter()
            .find(|(name, _)| *name == place)
            .map(|(_, coordinate)| *coordinate)
            .ok_or_else(|| RoutingError::PlaceNotFound(place.to_string()))
    }

    async fn directions(
        &self,
        start: Coordinate,
        end: Coordinate,
        _mode: TravelMode,
    ) -> Result<Directions, RoutingError> {
        self.origins.lock().unwrap().push(start);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.unroutable {
            return Err(RoutingError::UnroutablePoint);
        }
        Ok(Directions {
            distance_m: self.distance_m,
            duration_s: self.duration_s,
            path: vec![start, start.lerp(&end, 0.5), end],
        })
    }
}

struct FixedBattery(u8);

#[async_trait]
impl BatteryMonitor for FixedBattery {
    async fn battery_level(&self) -> Result<u8, BatteryError> {
        Ok(self.0)
    }
}

struct Harness {
    controller: NavigationController,
    events: mpsc::UnboundedReceiver<NavigationEvent>,
    device: Arc<ScriptedDevice>,
    routing: Arc<MockRouting>,
}

fn harness_with(routing: MockRouting, battery: u8) -> Harness {
    let device = ScriptedDevice::at(home());
    let routing = Arc::new(routing);
    let (controller, events) = NavigationController::new(
        TrackingConfig::default(),
        Collaborators {
            routing: routing.clone(),
            location: device.clone(),
            battery: Arc::new(FixedBattery(battery)),
        },
    );
    Harness {
        controller,
        events,
        device,
        routing,
    }
}

fn harness() -> Harness {
    harness_with(MockRouting::new(), 80)
}

impl Harness {
    async fn step_until<F>(&mut self, what: &str, done: F)
    where
        F: Fn(&NavigationController) -> bool,
    {
        for _ in 0..20 {
            if done(&self.controller) {
                return;
            }
            self.controller.step().await;
        }
        panic!("controller never reached: {}", what);
    }

    /// Mounted with a first fix at `home()`.
    async fn mounted(&mut self) {
        self.controller.mount().await;
        self.step_until("first fix", |c| c.last_fix().is_some()).await;
    }

    /// Mounted, with a route to `destination` ready.
    async fn ready(&mut self, destination: &str) {
        self.mounted().await;
        self.controller
            .set_destination_input(destination)
            .await
            .unwrap();
        self.step_until("route ready", |c| {
            matches!(c.state(), NavigationState::RouteReady { .. })
        })
        .await;
    }

    fn drain(&mut self) -> Vec<NavigationEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            seen.push(event);
        }
        seen
    }
}

#[tokio::test(start_paused = true)]
async fn typed_coordinates_become_the_pending_destination() {
    let mut h = harness();
    h.mounted().await;

    h.controller
        .set_destination_input("30.7046,76.7179")
        .await
        .unwrap();

    match h.controller.state() {
        NavigationState::DestinationPending {
            destination,
            request,
        } => {
            assert_eq!(destination.coordinate, c(30.7046, 76.7179));
            assert_eq!(destination.source, DestinationSource::Coordinates);
            assert!(request.is_some());
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(
        h.controller.affordances(true).primary,
        Some(PrimaryAction::ShowDirections)
    );
    assert!(matches!(
        h.drain().as_slice(),
        [NavigationEvent::DestinationAccepted(_)]
    ));
    assert_eq!(h.routing.geocode_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn malformed_input_leaves_the_controller_idle() {
    let mut h = harness();
    h.mounted().await;

    for input in ["", "   ", "abc,", "1,2,3", "91,10", "10,200"] {
        let result = h.controller.set_destination_input(input).await;
        assert!(
            matches!(result, Err(NavigationError::Input { .. })),
            "{:?} gave {:?}",
            input,
            result
        );
        assert!(h.controller.state().is_idle());
        assert!(matches!(
            h.drain().as_slice(),
            [NavigationEvent::InvalidDestinationInput { .. }]
        ));
    }
    // Only the non-numeric shapes fall back to geocoding.
    assert_eq!(h.routing.geocode_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn place_names_are_geocoded() {
    let mut h = harness();
    h.mounted().await;

    h.controller
        .set_destination_input("Sector 17, Chandigarh")
        .await
        .unwrap();

    let destination = h.controller.state().destination().unwrap();
    assert_eq!(destination.coordinate, c(30.7398, 76.7827));
    assert_eq!(destination.source, DestinationSource::Geocoded);
}

#[tokio::test(start_paused = true)]
async fn route_summary_is_reported_in_km_and_minutes() {
    let mut h = harness();
    h.ready("30.75,76.80").await;

    let route = h.controller.state().route().unwrap().clone();
    assert_eq!(route.distance_km, 12.4);
    assert_eq!(route.duration_min, 18.0);

    let affordances = h.controller.affordances(true);
    assert_eq!(affordances.primary, Some(PrimaryAction::StartRoute));
    assert_eq!(affordances.summary.unwrap().distance_km, 12.4);

    let events = h.drain();
    assert!(matches!(events.last(), Some(NavigationEvent::RouteReady(r)) if *r == route));
}

#[tokio::test(start_paused = true)]
async fn destination_before_first_fix_waits_for_an_origin() {
    let mut h = harness();
    let origin = c(30.71, 76.72);
    h.device.push(Step::Fix(origin, Heading::Unknown));
    h.controller.mount().await;

    h.controller
        .set_destination_input("30.75,76.80")
        .await
        .unwrap();
    assert_eq!(h.controller.state().pending_request(), None);

    h.step_until("route ready", |c| {
        matches!(c.state(), NavigationState::RouteReady { .. })
    })
    .await;
    assert_eq!(*h.routing.origins.lock().unwrap(), vec![origin]);
}

#[tokio::test(start_paused = true)]
async fn unroutable_destination_returns_to_idle() {
    let mut routing = MockRouting::new();
    routing.unroutable = true;
    let mut h = harness_with(routing, 80);
    h.mounted().await;

    h.controller
        .set_destination_input("30.75,76.80")
        .await
        .unwrap();
    h.step_until("route answer", |c| c.state().is_idle()).await;

    let events = h.drain();
    assert!(matches!(
        events.last(),
        Some(NavigationEvent::RouteUnavailable(RouteError::NoRouteFound { .. }))
    ));
    assert_eq!(h.controller.affordances(false).primary, None);
}

#[tokio::test(start_paused = true)]
async fn superseded_route_responses_are_dropped() {
    let mut routing = MockRouting::new();
    routing.delay = Duration::from_secs(5);
    let mut h = harness_with(routing, 80);
    h.mounted().await;

    h.controller
        .set_destination_input("30.75,76.80")
        .await
        .unwrap();
    let first = h.controller.state().pending_request().unwrap();
    h.controller
        .set_destination_input("30.76,76.81")
        .await
        .unwrap();
    let second = h.controller.state().pending_request().unwrap();
    assert_ne!(first, second);

    let late = RouteInfo {
        distance_km: 99.0,
        duration_min: 99.0,
        path: vec![home(), c(30.75, 76.80)],
    };
    h.controller
        .dispatch(ControllerInput::Route(RouteResponse {
            request: first,
            result: Ok(late),
        }))
        .await;
    assert_eq!(h.controller.state().pending_request(), Some(second));

    h.step_until("route ready", |c| {
        matches!(c.state(), NavigationState::RouteReady { .. })
    })
    .await;
    let state = h.controller.state();
    assert_eq!(state.destination().unwrap().coordinate, c(30.76, 76.81));
    assert_eq!(state.route().unwrap().distance_km, 12.4);
}

#[tokio::test(start_paused = true)]
async fn start_requires_a_ready_route() {
    let mut h = harness();
    h.mounted().await;

    assert!(matches!(
        h.controller.start(),
        Err(NavigationError::InvalidAction { .. })
    ));
    assert!(h.controller.state().is_idle());

    h.controller
        .set_destination_input("30.75,76.80")
        .await
        .unwrap();
    h.step_until("route ready", |c| {
        matches!(c.state(), NavigationState::RouteReady { .. })
    })
    .await;
    h.controller.start().unwrap();
    assert!(h.controller.state().is_navigating());

    let again = h.controller.set_destination_input("30.76,76.81").await;
    assert!(matches!(again, Err(NavigationError::InvalidAction { .. })));
    assert!(h.controller.state().is_navigating());
}

#[tokio::test(start_paused = true)]
async fn navigating_fixes_drive_the_marker() {
    let mut h = harness();
    h.ready("30.75,76.80").await;
    let ahead = c(30.72, 76.74);
    h.device.push(Step::Fix(ahead, Heading::from_degrees(90.0)));
    h.device.push(Step::Fix(c(30.73, 76.75), Heading::Unknown));

    h.controller.start().unwrap();
    let affordances = h.controller.affordances(false);
    assert!(affordances.show_animated_marker);
    assert!(!affordances.show_current_marker);
    assert_eq!(h.controller.animator().current_position(), home());

    h.controller.step().await;
    assert_eq!(h.controller.animator().target(), ahead);
    assert_eq!(h.controller.animator().heading(), 90.0);

    h.controller.step().await;
    assert_eq!(h.controller.animator().target(), c(30.73, 76.75));
    // Unknown heading keeps the previous rotation.
    assert_eq!(h.controller.animator().heading(), 90.0);
}

#[tokio::test(start_paused = true)]
async fn repeated_fix_failures_warn_once_and_keep_navigating() {
    let mut h = harness();
    h.ready("30.75,76.80").await;
    h.device.push(Step::Hang);
    h.device
        .push(Step::Fail(LocationError::PositionUnavailable("no signal".into())));
    h.device.push(Step::Fail(LocationError::Timeout));
    h.device.push(Step::Fail(LocationError::Timeout));
    h.controller.start().unwrap();
    h.drain();

    for _ in 0..4 {
        h.controller.step().await;
    }

    let warnings: Vec<_> = h
        .drain()
        .into_iter()
        .filter(|e| matches!(e, NavigationEvent::PositionWarning { .. }))
        .collect();
    assert_eq!(
        warnings,
        vec![NavigationEvent::PositionWarning {
            consecutive_failures: 3,
            last_error: LocationError::Timeout,
        }]
    );
    assert!(h.controller.state().is_navigating());
    assert_eq!(h.controller.last_fix().unwrap().coordinate, home());
}

#[tokio::test(start_paused = true)]
async fn end_is_idempotent() {
    let mut h = harness();
    h.controller.end();
    assert!(h.controller.state().is_idle());

    h.ready("30.75,76.80").await;
    h.controller.start().unwrap();
    h.drain();

    h.controller.end();
    h.controller.end();

    assert!(h.controller.state().is_idle());
    assert_eq!(h.drain(), vec![NavigationEvent::NavigationEnded]);
    let affordances = h.controller.affordances(false);
    assert!(!affordances.show_destination_marker);
    assert!(affordances.summary.is_none());
}

#[tokio::test(start_paused = true)]
async fn fixes_from_an_ended_session_never_reach_the_marker() {
    let mut h = harness();
    h.ready("30.75,76.80").await;
    h.controller.start().unwrap();
    let navigating = h.controller.session().unwrap();
    h.controller.step().await;

    h.controller.end();
    assert_ne!(h.controller.session(), Some(navigating));
    let frozen = h.controller.animator().target();
    let last = h.controller.last_fix().copied();

    h.controller.handle_position(PositionEvent {
        session: navigating,
        result: Ok(PositionFix::new(c(31.0, 77.0), Heading::from_degrees(45.0))),
    });

    assert_eq!(h.controller.animator().target(), frozen);
    assert_eq!(h.controller.last_fix().copied(), last);
}

#[tokio::test(start_paused = true)]
async fn low_battery_is_reported_on_mount_and_destination() {
    let mut h = harness_with(MockRouting::new(), 12);
    h.mounted().await;
    h.controller
        .set_destination_input("30.75,76.80")
        .await
        .unwrap();

    let low: Vec<_> = h
        .drain()
        .into_iter()
        .filter(|e| matches!(e, NavigationEvent::LowBattery { .. }))
        .collect();
    assert_eq!(
        low,
        vec![
            NavigationEvent::LowBattery {
                level: 12,
                threshold: 20
            };
            2
        ]
    );

    let mut charged = harness();
    charged.mounted().await;
    assert!(charged.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unmount_stops_everything() {
    let mut h = harness();
    h.ready("30.75,76.80").await;
    h.controller.start().unwrap();

    h.controller.unmount();
    h.controller.unmount();

    assert!(!h.controller.is_mounted());
    assert!(h.controller.session().is_none());
    assert!(h.controller.state().is_idle());
    assert!(!h.controller.animator().is_animating());
}

#[tokio::test(start_paused = true)]
async fn typed_coordinates_reach_route_ready_with_provider_values() {
    let mut h = harness();
    h.device.push(Step::Fix(c(30.69, 76.70), Heading::Unknown));
    h.ready("30.7046,76.7179").await;

    let state = h.controller.state();
    assert_eq!(state.destination().unwrap().coordinate, c(30.7046, 76.7179));
    let route = state.route().unwrap();
    assert_eq!(route.distance_km, 12.4);
    assert_eq!(route.duration_min, 18.0);
}

#[tokio::test(start_paused = true)]
async fn end_while_route_in_flight_cancels_it() {
    let mut routing = MockRouting::new();
    routing.delay = Duration::from_secs(5);
    let mut h = harness_with(routing, 80);
    h.mounted().await;
    h.controller
        .set_destination_input("30.75,76.80")
        .await
        .unwrap();
    let pending = h.controller.state().pending_request().unwrap();
    h.drain();

    h.controller.end();
    assert!(h.controller.state().is_idle());

    h.controller
        .dispatch(ControllerInput::Route(RouteResponse {
            request: pending,
            result: Ok(RouteInfo {
                distance_km: 12.4,
                duration_min: 18.0,
                path: vec![home(), c(30.75, 76.80)],
            }),
        }))
        .await;
    // Past the provider delay and into the next poll.
    h.controller.step().await;

    assert!(h.controller.state().is_idle());
    assert!(h.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn end_from_route_ready_clears_the_route() {
    let mut h = harness();
    h.ready("30.75,76.80").await;
    h.drain();

    h.controller.end();

    assert!(h.controller.state().is_idle());
    assert!(h.controller.state().route().is_none());
    assert!(h.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn bad_input_keeps_the_ready_route() {
    let mut h = harness();
    h.ready("30.75,76.80").await;
    let before = h.controller.state().clone();

    let result = h.controller.set_destination_input("abc,").await;

    assert!(matches!(result, Err(NavigationError::Input { .. })));
    assert_eq!(*h.controller.state(), before);
}

#[tokio::test(start_paused = true)]
async fn geocoder_outage_clears_the_destination() {
    let mut routing = MockRouting::new();
    routing.geocoder_down = true;
    let mut h = harness_with(routing, 80);
    h.ready("30.75,76.80").await;
    h.drain();

    let result = h
        .controller
        .set_destination_input("Sector 17, Chandigarh")
        .await;

    assert!(matches!(
        result,
        Err(NavigationError::Provider(RouteError::ProviderUnavailable(_)))
    ));
    assert!(h.controller.state().is_idle());
    assert!(matches!(
        h.drain().as_slice(),
        [NavigationEvent::RouteUnavailable(RouteError::ProviderUnavailable(_))]
    ));
}

#[tokio::test(start_paused = true)]
async fn remount_waits_for_a_fresh_origin() {
    let mut h = harness();
    h.device.push(Step::Fix(c(10.0, 10.0), Heading::Unknown));
    h.mounted().await;
    h.controller.unmount();
    assert!(h.controller.last_fix().is_none());
    assert_eq!(h.controller.animator().current_position(), home());

    h.device.push(Step::Hang);
    h.controller.mount().await;
    h.controller.set_destination_input("11,11").await.unwrap();

    assert_eq!(h.controller.state().pending_request(), None);
    assert!(h.routing.origins.lock().unwrap().is_empty());
}

async fn wait_for<F>(events: &mut mpsc::UnboundedReceiver<NavigationEvent>, wanted: F)
where
    F: Fn(&NavigationEvent) -> bool,
{
    while let Some(event) = events.recv().await {
        if wanted(&event) {
            return;
        }
    }
    panic!("event stream closed");
}

#[tokio::test(start_paused = true)]
async fn run_loop_follows_commands() {
    let h = harness();
    let Harness {
        controller,
        mut events,
        ..
    } = h;
    let (commands, rx) = mpsc::channel(8);
    let session = tokio::spawn(controller.run(rx));

    commands
        .send(NavigationCommand::SetDestination("30.75,76.80".into()))
        .await
        .unwrap();
    wait_for(&mut events, |e| matches!(e, NavigationEvent::RouteReady(_))).await;

    commands.send(NavigationCommand::Start).await.unwrap();
    wait_for(&mut events, |e| *e == NavigationEvent::NavigationStarted).await;

    commands.send(NavigationCommand::End).await.unwrap();
    wait_for(&mut events, |e| *e == NavigationEvent::NavigationEnded).await;

    commands.send(NavigationCommand::Unmount).await.unwrap();
    session.await.unwrap();
    // The controller and its sender are gone.
    assert!(events.recv().await.is_none());
}
