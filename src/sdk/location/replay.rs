use async_trait::async_trait;
use std::sync::Mutex;

use super::{LocationError, LocationProvider, PositionFix, PositionRequest};
use crate::sdk::geo::{Coordinate, Heading};

struct ReplayState {
    path: Vec<Coordinate>,
    next: usize,
    heading: Heading,
}

/// Walks a polyline one vertex per poll, then stays on the last vertex.
///
/// Heading is the bearing from the previous vertex. Used to drive the
/// tracker without a device GPS.
pub struct ReplayLocationProvider {
    state: Mutex<ReplayState>,
}

impl ReplayLocationProvider {
    /// Starts parked on `origin`.
    pub fn parked(origin: Coordinate) -> Self {
        Self {
            state: Mutex::new(ReplayState {
                path: vec![origin],
                next: 0,
                heading: Heading::Unknown,
            }),
        }
    }

    /// Replaces the path; the next poll returns its first vertex.
    pub fn follow(&self, path: Vec<Coordinate>) {
        if path.is_empty() {
            return;
        }
        let mut state = self.lock();
        log::debug!("Replaying a path of {} points", path.len());
        state.path = path;
        state.next = 0;
    }

    /// True once the last vertex has been handed out.
    pub fn finished(&self) -> bool {
        let state = self.lock();
        state.next >= state.path.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReplayState> {
        // A poisoned replay is still a valid path.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LocationProvider for ReplayLocationProvider {
    async fn current_position(
        &self,
        _request: &PositionRequest,
    ) -> Result<PositionFix, LocationError> {
        let mut state = self.lock();
        let last = state.path.len() - 1;
        let index = state.next.min(last);
        let coordinate = state.path[index];
        if index > 0 {
            let previous = state.path[index - 1];
            if previous != coordinate {
                state.heading = Heading::from_degrees(previous.bearing_to(&coordinate));
            }
        }
        if state.next <= last {
            state.next += 1;
        }
        Ok(PositionFix::new(coordinate, state.heading))
    }
}
