use anyhow::{bail, Context};
use clap::Parser;
use route_tracker::{
    sdk::config::{ProviderConfig, TrackingConfig},
    sdk::util::{log::init_logging, rate_limit::ors_limiter},
    BatteryMonitor, BatteryWatcher, Collaborators, Coordinate, NavigationCommand,
    NavigationController, NavigationEvent, OrsProvider, ReplayLocationProvider,
    SysfsBatteryMonitor, TravelMode,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;

/// Route to a destination and follow it with a replayed device position
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Destination as "lat,lon" or a place name (e.g., "Sector 17, Chandigarh")
    #[arg(short, long)]
    destination: String,

    /// Where the replayed device starts, as "lat,lon"
    #[arg(short, long, default_value = "30.7046,76.7179")]
    origin: Coordinate,

    /// [Optional] Travel mode: driving, walking or cycling
    #[arg(short, long)]
    mode: Option<TravelMode>,

    /// [Optional] Seconds between position polls
    #[arg(long)]
    poll_secs: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    // --- 1. Configuration ---
    let mut config = TrackingConfig::from_env().context("Invalid TRACKER_* setting")?;
    if let Some(mode) = cli.mode {
        config.travel_mode = mode;
    }
    if let Some(secs) = cli.poll_secs {
        let interval = Duration::try_from_secs_f64(secs).unwrap_or_default();
        if interval < Duration::from_millis(1) {
            bail!("--poll-secs must be at least 0.001 seconds");
        }
        config.poll_interval = interval;
    }
    let provider_config = ProviderConfig::from_env()?;

    // --- 2. Collaborators ---
    let limiter = ors_limiter(config.requests_per_minute);
    let routing = Arc::new(
        OrsProvider::from_config(&provider_config, limiter)
            .context("Failed to build the routing client")?,
    );
    let device = Arc::new(ReplayLocationProvider::parked(cli.origin));
    let battery: Arc<dyn BatteryMonitor> = Arc::new(SysfsBatteryMonitor::new());

    // The platform alert runs on its own, whatever the controller does.
    let _platform_alert = BatteryWatcher::spawn(
        Arc::clone(&battery),
        config.low_battery_threshold,
        Duration::from_secs(60),
        |level| log::warn!("Battery is low! ({}%)", level),
    );

    let (controller, mut events) = NavigationController::new(
        config,
        Collaborators {
            routing,
            location: device.clone(),
            battery,
        },
    );
    let mut frames = controller.marker_frames();
    let (commands, commands_rx) = mpsc::channel(8);
    let session = tokio::spawn(controller.run(commands_rx));

    // --- 3. Drive the session ---
    log::info!("Origin set to: {}", cli.origin);
    commands
        .send(NavigationCommand::SetDestination(cli.destination.clone()))
        .await?;

    let mut arrival: Option<Coordinate> = None;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    NavigationEvent::DestinationAccepted(destination) => {
                        log::info!("Destination {:?} -> {}", destination.input, destination.coordinate);
                    }
                    NavigationEvent::RouteReady(route) => {
                        log::info!(
                            "Distance: {:.1} km, Duration: {:.0} min",
                            route.distance_km,
                            route.duration_min
                        );
                        if let Some(view) = route.viewport() {
                            log::info!(
                                "Viewport: S {:.4} W {:.4} N {:.4} E {:.4}",
                                view.south, view.west, view.north, view.east
                            );
                        }
                        arrival = route.path.last().copied();
                        device.follow(route.path);
                        commands.send(NavigationCommand::Start).await?;
                    }
                    NavigationEvent::RouteUnavailable(err) => {
                        log::error!("Route unavailable: {}", err);
                        break;
                    }
                    NavigationEvent::InvalidDestinationInput { input, reason } => {
                        log::error!("Invalid destination {:?}: {}", input, reason);
                        break;
                    }
                    NavigationEvent::NavigationStarted => log::info!("🚗 Navigation started"),
                    NavigationEvent::NavigationEnded => {
                        log::info!("🏁 Navigation ended");
                        break;
                    }
                    NavigationEvent::PositionWarning { consecutive_failures, last_error } => {
                        log::warn!(
                            "Location is unreliable: {} failed fixes ({})",
                            consecutive_failures,
                            last_error
                        );
                    }
                    NavigationEvent::LowBattery { level, threshold } => {
                        log::warn!(
                            "Battery Low! {}% is under {}%. Battery saver may affect location tracking.",
                            level,
                            threshold
                        );
                    }
                }
            }
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = *frames.borrow_and_update();
                log::debug!("Marker at {} heading {:.0}°", frame.coordinate, frame.heading);
                if arrival == Some(frame.coordinate) && device.finished() {
                    commands.send(NavigationCommand::End).await?;
                    arrival = None;
                }
            }
        }
    }

    commands.send(NavigationCommand::Unmount).await.ok();
    session.await.context("Tracking session panicked")?;
    Ok(())
}
