//! Smooth marker movement between position fixes.
//!
//! The animator owns the single logical "where is the marker right now"
//! value. A new target always wins immediately: the running segment is cut
//! at its current point and a new segment starts from there, so the rendered
//! marker never jumps.

use serde::Serialize;
use std::time::Duration;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use super::geo::{Coordinate, Heading};

/// What the map surface draws for the tracked marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerFrame {
    pub coordinate: Coordinate,
    /// Rotation in degrees.
    pub heading: f64,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    from: Coordinate,
    to: Coordinate,
    started: Instant,
    duration: Duration,
}

impl Segment {
    fn still(at: Coordinate) -> Self {
        Self {
            from: at,
            to: at,
            started: Instant::now(),
            duration: Duration::ZERO,
        }
    }

    fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    fn position_at(&self, now: Instant) -> Coordinate {
        self.from.lerp(&self.to, self.progress(now))
    }
}

pub struct MarkerAnimator {
    segment: Segment,
    heading: f64,
    frame_interval: Duration,
    frames: watch::Sender<MarkerFrame>,
    driver: Option<JoinHandle<()>>,
}

impl MarkerAnimator {
    pub fn new(initial: Coordinate, frame_interval: Duration) -> Self {
        let (frames, _) = watch::channel(MarkerFrame {
            coordinate: initial,
            heading: 0.0,
        });
        Self {
            segment: Segment::still(initial),
            heading: 0.0,
            frame_interval,
            frames,
            driver: None,
        }
    }

    /// Animates from the current on-screen position to `target`.
    pub fn set_target(&mut self, target: Coordinate, duration: Duration) {
        let now = Instant::now();
        let from = self.segment.position_at(now);
        self.stop_driver();
        self.segment = Segment {
            from,
            to: target,
            started: now,
            duration,
        };
        log::trace!("Marker {} -> {} over {} ms", from, target, duration.as_millis());
        self.publish(from);
        if !duration.is_zero() {
            self.driver = Some(tokio::spawn(drive(
                self.segment,
                self.heading,
                self.frame_interval,
                self.frames.clone(),
            )));
        } else {
            self.publish(target);
        }
    }

    /// Places the marker without animating.
    pub fn jump_to(&mut self, at: Coordinate) {
        self.stop_driver();
        self.segment = Segment::still(at);
        self.publish(at);
    }

    /// Instant rotation. `Unknown` keeps the previous heading.
    pub fn set_heading(&mut self, heading: Heading) {
        if let Some(degrees) = heading.degrees() {
            self.heading = degrees;
            let at = self.current_position();
            self.publish(at);
            // A running driver carries its own heading copy.
            if self.is_animating() {
                let remaining = self.segment;
                self.stop_driver();
                self.driver = Some(tokio::spawn(drive(
                    remaining,
                    self.heading,
                    self.frame_interval,
                    self.frames.clone(),
                )));
            }
        }
    }

    /// Freezes the marker where it currently is. Idempotent.
    pub fn cancel(&mut self) {
        let at = self.current_position();
        self.stop_driver();
        self.segment = Segment::still(at);
        self.publish(at);
    }

    pub fn current_position(&self) -> Coordinate {
        self.segment.position_at(Instant::now())
    }

    /// Where the current segment ends.
    pub fn target(&self) -> Coordinate {
        self.segment.to
    }

    /// Where the current segment started.
    pub fn origin(&self) -> Coordinate {
        self.segment.from
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn is_animating(&self) -> bool {
        self.segment.progress(Instant::now()) < 1.0
    }

    pub fn subscribe(&self) -> watch::Receiver<MarkerFrame> {
        self.frames.subscribe()
    }

    fn publish(&self, coordinate: Coordinate) {
        self.frames.send_replace(MarkerFrame {
            coordinate,
            heading: self.heading,
        });
    }

    fn stop_driver(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

impl Drop for MarkerAnimator {
    fn drop(&mut self) {
        self.stop_driver();
    }
}

async fn drive(
    segment: Segment,
    heading: f64,
    frame_interval: Duration,
    frames: watch::Sender<MarkerFrame>,
) {
    let mut ticker = time::interval(frame_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let now = Instant::now();
        frames.send_replace(MarkerFrame {
            coordinate: segment.position_at(now),
            heading,
        });
        if segment.progress(now) >= 1.0 {
            break;
        }
    }
}
