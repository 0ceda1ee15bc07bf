//! Configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration, `config/default.toml` by default)
//! 2. Environment variables (prefixed with `MOTION_SPECTRUM_`, nested keys split on `__`)
//!
//! # Example
//! ```no_run
//! use motion_spectrum::config::Settings;
//!
//! let settings = Settings::load()?;
//! settings.validate()?;
//! println!("window: {}", settings.sampler.window_size);
//! # Ok::<(), motion_spectrum::error::SamplerError>(())
//! ```
//!
//! Example override: `MOTION_SPECTRUM_SAMPLER__WINDOW_SIZE=256`

use crate::error::{SamplerError, SamplerResult};
use crate::sensor::SensorRate;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

/// Smallest window the FFT accepts.
pub const MIN_WINDOW_SIZE: usize = 2;
/// Largest window accepted; 1024 and above is out of bounds.
pub const MAX_WINDOW_SIZE: usize = 512;
/// Window sizes outside this range work but are rarely useful for motion data.
pub const RECOMMENDED_WINDOW_RANGE: std::ops::RangeInclusive<usize> = 32..=MAX_WINDOW_SIZE;

/// Default path used by [`Settings::load`].
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "MOTION_SPECTRUM_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Sampler settings
    #[serde(default)]
    pub sampler: SamplerConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

/// Sampling pipeline configuration.
///
/// `window_size` and `sensor_rate` are captured when the worker starts;
/// `update_period` is re-read by the timing loop on every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Number of magnitude samples per FFT (power of two).
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Delay between spectral snapshots.
    #[serde(default = "default_update_period", with = "humantime_serde")]
    pub update_period: Duration,
    /// Rate hint forwarded to the sensor collaborator.
    #[serde(default)]
    pub sensor_rate: SensorRate,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            update_period: default_update_period(),
            sensor_rate: SensorRate::default(),
        }
    }
}

// Default value functions
fn default_name() -> String {
    "motion_spectrum".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_window_size() -> usize {
    128
}

fn default_update_period() -> Duration {
    Duration::from_millis(1000)
}

impl SamplerConfig {
    /// Check window size and update period.
    pub fn validate(&self) -> SamplerResult<()> {
        validate_window_size(self.window_size)?;
        validate_update_period(self.update_period)
    }
}

/// Reject window sizes the FFT cannot handle.
///
/// Sizes outside [`RECOMMENDED_WINDOW_RANGE`] are accepted with a warning.
pub fn validate_window_size(size: usize) -> SamplerResult<()> {
    if !size.is_power_of_two() || !(MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&size) {
        return Err(SamplerError::InvalidWindowSize { size });
    }
    if !RECOMMENDED_WINDOW_RANGE.contains(&size) {
        warn!(
            window_size = size,
            "Window size outside recommended range {:?}", RECOMMENDED_WINDOW_RANGE
        );
    }
    Ok(())
}

/// Reject a zero update period.
pub fn validate_update_period(period: Duration) -> SamplerResult<()> {
    if period.is_zero() {
        return Err(SamplerError::InvalidUpdatePeriod);
    }
    Ok(())
}

impl Settings {
    /// Load configuration from `config/default.toml` and environment variables
    pub fn load() -> SamplerResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    ///
    /// Missing files are not an error: defaults apply, then env overrides.
    pub fn load_from<P: AsRef<Path>>(path: P) -> SamplerResult<Self> {
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> SamplerResult<()> {
        crate::logging::parse_log_level(&self.application.log_level)?;
        self.sampler.validate()
    }
}

/// Update period shared between the controller and a running timing loop.
///
/// Stored as nanoseconds so setters take effect on the next tick without locking.
#[derive(Debug)]
pub struct SharedPeriod(AtomicU64);

impl SharedPeriod {
    /// Create from an initial period.
    pub fn new(period: Duration) -> Self {
        Self(AtomicU64::new(duration_to_nanos(period)))
    }

    /// Current period.
    pub fn get(&self) -> Duration {
        Duration::from_nanos(self.0.load(Ordering::Acquire))
    }

    /// Replace the period; a running loop picks it up on its next tick.
    pub fn set(&self, period: Duration) {
        self.0.store(duration_to_nanos(period), Ordering::Release);
    }
}

fn duration_to_nanos(period: Duration) -> u64 {
    u64::try_from(period.as_nanos()).unwrap_or(u64::MAX)
}
