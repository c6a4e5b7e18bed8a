use std::{fmt, sync::Arc, time::Duration};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use super::{AccuracyMode, LocationError, LocationProvider, PositionFix, PositionRequest};

/// Shortest polling period; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Identifies one run of the polling loop, from `start` to `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionEvent {
    pub session: SessionId,
    pub result: Result<PositionFix, LocationError>,
}

struct ActivePoll {
    session: SessionId,
    task: JoinHandle<()>,
    events: mpsc::Receiver<PositionEvent>,
}

/// Periodic position polling bound to an explicit start/stop pair.
///
/// Every poll is independent: a failed poll is yielded as an error event and
/// the next tick polls again. Once `stop` returns the receiving side is gone,
/// so no further event can be observed from that session.
pub struct PositionSource {
    provider: Arc<dyn LocationProvider>,
    timeout: Duration,
    maximum_age: Duration,
    sessions_started: u64,
    active: Option<ActivePoll>,
}

impl PositionSource {
    pub fn new(provider: Arc<dyn LocationProvider>, timeout: Duration, maximum_age: Duration) -> Self {
        Self {
            provider,
            timeout,
            maximum_age,
            sessions_started: 0,
            active: None,
        }
    }

    /// Starts a fresh polling session, replacing any running one.
    ///
    /// The first poll happens immediately, then one every `interval`.
    pub fn start(&mut self, interval: Duration, accuracy: AccuracyMode) -> SessionId {
        self.stop();
        self.sessions_started += 1;
        let session = SessionId(self.sessions_started);
        let request = PositionRequest {
            accuracy,
            timeout: self.timeout,
            maximum_age: self.maximum_age,
        };
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.provider),
            session,
            interval,
            request,
            tx,
        ));
        log::debug!(
            "Position polling {} started every {} ms ({:?})",
            session,
            interval.as_millis(),
            accuracy
        );
        self.active = Some(ActivePoll {
            session,
            task,
            events: rx,
        });
        session
    }

    /// Stops polling. Calling it while stopped is a no-op.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
            log::debug!("Position polling {} stopped", active.session);
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.session)
    }

    /// Next event of the running session, `None` when stopped.
    ///
    /// Cancel safe, so it can sit in a `tokio::select!` branch.
    pub async fn next(&mut self) -> Option<PositionEvent> {
        match self.active.as_mut() {
            Some(active) => active.events.recv().await,
            None => None,
        }
    }
}

impl Drop for PositionSource {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    provider: Arc<dyn LocationProvider>,
    session: SessionId,
    interval: Duration,
    request: PositionRequest,
    tx: mpsc::Sender<PositionEvent>,
) {
    let mut ticker = time::interval(interval.max(MIN_INTERVAL));
    // A poll can outlive the interval; never fire a burst to catch up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let result = match time::timeout(request.timeout, provider.current_position(&request)).await
        {
            Ok(Ok(fix)) if fix.age() > request.maximum_age => {
                log::debug!("Discarding fix {} ms old", fix.age().as_millis());
                Err(LocationError::PositionUnavailable(format!(
                    "cached fix is {} ms old",
                    fix.age().as_millis()
                )))
            }
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout),
        };
        if let Err(e) = &result {
            log::debug!("Poll in session {} failed: {}", session, e);
        }
        if tx.send(PositionEvent { session, result }).await.is_err() {
            break;
        }
    }
}
