use std::{env, str::FromStr, time::Duration};
use thiserror::Error;

use super::geo::Coordinate;
use super::location::AccuracyMode;
use super::routing::TravelMode;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Set ORS_API_KEY (hosted) or ORS_LOCAL_URL (self-hosted)")]
    MissingProvider,

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Where routing and geocoding requests go.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    Remote { api_key: String },
    Local { base_url: String },
}

impl ProviderConfig {
    /// A self-hosted instance wins when both are configured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());
        if let Some(base_url) = present("ORS_LOCAL_URL") {
            return Ok(ProviderConfig::Local { base_url });
        }
        present("ORS_API_KEY")
            .map(|api_key| ProviderConfig::Remote { api_key })
            .ok_or(ConfigError::MissingProvider)
    }
}

/// Timing and threshold knobs of a tracking session.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    pub poll_interval: Duration,
    /// Absolute bound on one poll, independent of the interval.
    pub poll_timeout: Duration,
    /// Oldest cached fix still accepted.
    pub max_fix_age: Duration,
    pub accuracy: AccuracyMode,
    pub animation_duration: Duration,
    pub frame_interval: Duration,
    /// Consecutive failed polls before the warning is raised.
    pub failure_warning_threshold: u32,
    /// Battery percentage below which the low battery alert fires.
    pub low_battery_threshold: u8,
    pub travel_mode: TravelMode,
    /// Where the marker sits before the first fix arrives.
    pub initial_marker: Coordinate,
    pub requests_per_minute: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10_000),
            poll_timeout: Duration::from_millis(20_000),
            max_fix_age: Duration::from_millis(1_000),
            accuracy: AccuracyMode::High,
            animation_duration: Duration::from_millis(5_000),
            frame_interval: Duration::from_millis(50),
            failure_warning_threshold: 3,
            low_battery_threshold: 20,
            travel_mode: TravelMode::Driving,
            initial_marker: default_marker(),
            requests_per_minute: 40,
        }
    }
}

fn default_marker() -> Coordinate {
    Coordinate::new(30.7046, 76.7179).expect("default marker is in range")
}

impl TrackingConfig {
    /// Defaults overridden by `TRACKER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        // Periods feed tokio intervals and timeouts, which need a non-zero length.
        let millis = |key: &str, into: &mut Duration, allow_zero: bool| {
            if let Some(v) = parse_var::<u64, _>(&lookup, key)? {
                if v == 0 && !allow_zero {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: v.to_string(),
                    });
                }
                *into = Duration::from_millis(v);
            }
            Ok::<(), ConfigError>(())
        };
        millis("TRACKER_POLL_INTERVAL_MS", &mut config.poll_interval, false)?;
        millis("TRACKER_POLL_TIMEOUT_MS", &mut config.poll_timeout, false)?;
        millis("TRACKER_MAX_FIX_AGE_MS", &mut config.max_fix_age, true)?;
        millis("TRACKER_ANIMATION_MS", &mut config.animation_duration, true)?;
        millis("TRACKER_FRAME_MS", &mut config.frame_interval, false)?;

        if let Some(v) = parse_var(&lookup, "TRACKER_FAILURE_WARNING")? {
            config.failure_warning_threshold = v;
        }
        if let Some(v) = parse_var::<u8, _>(&lookup, "TRACKER_LOW_BATTERY")? {
            if v > 100 {
                return Err(ConfigError::InvalidValue {
                    key: "TRACKER_LOW_BATTERY".to_string(),
                    value: v.to_string(),
                });
            }
            config.low_battery_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "TRACKER_TRAVEL_MODE")? {
            config.travel_mode = v;
        }
        if let Some(v) = parse_var(&lookup, "TRACKER_INITIAL_MARKER")? {
            config.initial_marker = v;
        }
        if let Some(v) = parse_var(&lookup, "TRACKER_REQUESTS_PER_MINUTE")? {
            config.requests_per_minute = v;
        }
        if let Some(v) = lookup("TRACKER_ACCURACY") {
            config.accuracy = match v.trim().to_ascii_lowercase().as_str() {
                "high" => AccuracyMode::High,
                "balanced" => AccuracyMode::Balanced,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "TRACKER_ACCURACY".to_string(),
                        value: v,
                    })
                }
            };
        }
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_timings() {
        let config = TrackingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, TrackingConfig::default());
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.poll_timeout, Duration::from_secs(20));
        assert_eq!(config.animation_duration, Duration::from_secs(5));
        assert_eq!(config.failure_warning_threshold, 3);
        assert_eq!(config.low_battery_threshold, 20);
    }

    #[test]
    fn env_overrides_apply() {
        let config = TrackingConfig::from_lookup(lookup(&[
            ("TRACKER_POLL_INTERVAL_MS", "2500"),
            ("TRACKER_LOW_BATTERY", "15"),
            ("TRACKER_TRAVEL_MODE", "walking"),
            ("TRACKER_ACCURACY", "Balanced"),
            ("TRACKER_INITIAL_MARKER", "48.85,2.35"),
        ]))
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(2500));
        assert_eq!(config.low_battery_threshold, 15);
        assert_eq!(config.travel_mode, TravelMode::Walking);
        assert_eq!(config.accuracy, AccuracyMode::Balanced);
        assert_eq!(config.initial_marker, Coordinate::new(48.85, 2.35).unwrap());
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = TrackingConfig::from_lookup(lookup(&[("TRACKER_POLL_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "TRACKER_POLL_TIMEOUT_MS".into(),
                value: "soon".into()
            }
        );
        assert!(TrackingConfig::from_lookup(lookup(&[("TRACKER_LOW_BATTERY", "120")])).is_err());
    }

    #[test]
    fn zero_periods_are_rejected() {
        for key in [
            "TRACKER_POLL_INTERVAL_MS",
            "TRACKER_POLL_TIMEOUT_MS",
            "TRACKER_FRAME_MS",
        ] {
            assert_eq!(
                TrackingConfig::from_lookup(lookup(&[(key, "0")])),
                Err(ConfigError::InvalidValue {
                    key: key.into(),
                    value: "0".into()
                })
            );
        }
        // A zero animation jumps straight to the target.
        let config =
            TrackingConfig::from_lookup(lookup(&[("TRACKER_ANIMATION_MS", "0")])).unwrap();
        assert_eq!(config.animation_duration, Duration::ZERO);
    }

    #[test]
    fn provider_selection() {
        assert_eq!(
            ProviderConfig::from_lookup(lookup(&[("ORS_API_KEY", "abc")])),
            Ok(ProviderConfig::Remote {
                api_key: "abc".into()
            })
        );
        assert_eq!(
            ProviderConfig::from_lookup(lookup(&[
                ("ORS_API_KEY", "abc"),
                ("ORS_LOCAL_URL", "http://localhost:8080/ors")
            ])),
            Ok(ProviderConfig::Local {
                base_url: "http://localhost:8080/ors".into()
            })
        );
        assert_eq!(
            ProviderConfig::from_lookup(lookup(&[("ORS_API_KEY", "  ")])),
            Err(ConfigError::MissingProvider)
        );
    }
}
