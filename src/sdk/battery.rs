//! Battery level input.
//!
//! The platform keeps its own low battery alert running independently of the
//! navigation controller. The controller only asks for the current level at a
//! few points and raises its own alert; the two are not merged.

use async_trait::async_trait;
use std::{path::PathBuf, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatteryError {
    #[error("No battery found")]
    NoBattery,

    #[error("Failed to read battery level: {0}")]
    Read(String),
}

#[async_trait]
pub trait BatteryMonitor: Send + Sync {
    /// Charge level as a percentage, 0..=100.
    async fn battery_level(&self) -> Result<u8, BatteryError>;
}

/// Reads `capacity` from the Linux power supply class.
pub struct SysfsBatteryMonitor {
    root: PathBuf,
}

impl SysfsBatteryMonitor {
    pub fn new() -> Self {
        Self::with_root("/sys/class/power_supply")
    }

    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl Default for SysfsBatteryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatteryMonitor for SysfsBatteryMonitor {
    async fn battery_level(&self) -> Result<u8, BatteryError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(_) => return Err(BatteryError::NoBattery),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BatteryError::Read(e.to_string()))?
        {
            let kind = tokio::fs::read_to_string(entry.path().join("type"))
                .await
                .unwrap_or_default();
            if kind.trim() != "Battery" {
                continue;
            }
            let raw = tokio::fs::read_to_string(entry.path().join("capacity"))
                .await
                .map_err(|e| BatteryError::Read(e.to_string()))?;
            let level: u32 = raw
                .trim()
                .parse()
                .map_err(|_| BatteryError::Read(format!("bad capacity {:?}", raw.trim())))?;
            return Ok(level.min(100) as u8);
        }
        Err(BatteryError::NoBattery)
    }
}

/// Platform-side watcher: polls the level on its own schedule, keeps the last
/// known value and fires its own alert whenever the level is below threshold.
pub struct BatteryWatcher {
    level: watch::Receiver<Option<u8>>,
    task: JoinHandle<()>,
}

impl BatteryWatcher {
    pub fn spawn<F>(
        monitor: Arc<dyn BatteryMonitor>,
        threshold: u8,
        every: Duration,
        on_low: F,
    ) -> Self
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match monitor.battery_level().await {
                    Ok(level) => {
                        tx.send_replace(Some(level));
                        if level < threshold {
                            on_low(level);
                        }
                    }
                    Err(e) => log::debug!("Battery watcher: {}", e),
                }
            }
        });
        Self { level: rx, task }
    }

    pub fn last_level(&self) -> Option<u8> {
        *self.level.borrow()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for BatteryWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
