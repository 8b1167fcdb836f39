//! Process configuration from `POSEHID_*` environment variables.
//!
//! Unset or unparsable values fall back to their defaults.

use crate::driver::DriverConfig;
use crate::linuxtrack::DEFAULT_LIBRARY;
use crate::mapping::MapperKind;
use crate::protocol::{DEFAULT_DEVICE_NAME, FOOHID_SERVICE};
use crate::tracking::ReadinessPolicy;
use crate::types::DeviceIdentity;
use crate::{PosehidError, Result};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub device_name: String,
    pub service: String,
    /// `None` = run until stopped.
    pub iterations: Option<u64>,
    pub interval: Duration,
    pub mapper: MapperKind,
    pub heading_gain: f32,
    pub tracking: bool,
    pub require_tracking: bool,
    pub tracking_profile: Option<String>,
    pub readiness: ReadinessPolicy,
    pub tracker_library: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            service: FOOHID_SERVICE.to_string(),
            iterations: Some(10_000),
            interval: Duration::ZERO,
            mapper: MapperKind::Random,
            heading_gain: 4.0,
            tracking: false,
            require_tracking: false,
            tracking_profile: None,
            readiness: ReadinessPolicy::default(),
            tracker_library: DEFAULT_LIBRARY.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Self::default();
        let env = Env(&lookup);

        let mapper = match env.string("POSEHID_MAPPER") {
            None => d.mapper,
            Some(v) => v.parse::<MapperKind>().unwrap_or_else(|e| {
                log::warn!("{}; using random", e);
                MapperKind::Random
            }),
        };

        let iterations = match env.parsed::<u64>("POSEHID_ITERATIONS") {
            Some(0) => None,
            Some(n) => Some(n),
            None => d.iterations,
        };

        let config = Self {
            device_name: env.string("POSEHID_DEVICE_NAME").unwrap_or(d.device_name),
            service: env.string("POSEHID_SERVICE").unwrap_or(d.service),
            iterations,
            interval: env
                .parsed::<u64>("POSEHID_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.interval),
            mapper,
            heading_gain: env
                .parsed::<f32>("POSEHID_HEADING_GAIN")
                .filter(|g| g.is_finite())
                .unwrap_or(d.heading_gain),
            tracking: env.flag("POSEHID_TRACKING", d.tracking),
            require_tracking: env.flag("POSEHID_REQUIRE_TRACKING", d.require_tracking),
            tracking_profile: env.string("POSEHID_TRACKING_PROFILE"),
            readiness: ReadinessPolicy {
                max_attempts: env
                    .parsed::<u32>("POSEHID_TRACKING_ATTEMPTS")
                    .unwrap_or(d.readiness.max_attempts),
                interval: env
                    .parsed::<u64>("POSEHID_TRACKING_POLL_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(d.readiness.interval),
            },
            tracker_library: env.string("POSEHID_TRACKER_LIB").unwrap_or(d.tracker_library),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() {
            return Err(PosehidError::Config("device name is empty".into()));
        }
        if self.service.is_empty() {
            return Err(PosehidError::Config("service name is empty".into()));
        }
        if self.require_tracking && !self.tracking {
            log::warn!("POSEHID_REQUIRE_TRACKING set without POSEHID_TRACKING; ignoring");
        }
        Ok(())
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.device_name.clone())
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            iterations: self.iterations,
            interval: self.interval,
            tracking_profile: self.tracking_profile.clone(),
            readiness: self.readiness,
            require_tracking: self.tracking && self.require_tracking,
        }
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Trimmed, non-empty value.
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.string(name)?;
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                log::warn!("Ignoring unparsable {}='{}'", name, raw);
                None
            }
        }
    }

    fn flag(&self, name: &str, default: bool) -> bool {
        self.string(name)
            .and_then(|v| match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            })
            .unwrap_or(default)
    }
}
