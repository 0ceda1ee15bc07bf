//! Tracing setup
//!
//! One `fmt` layer in the chosen [`OutputFormat`], filtered by `RUST_LOG` when
//! set and by the configured level otherwise. Thread names are on by default:
//! the sensor callback and the timing loop log from different threads.
//!
//! # Example
//! ```no_run
//! use motion_spectrum::{config::Settings, logging};
//! use tracing::info;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! logging::init_from_settings(&settings)?;
//! info!("Sampler starting");
//! # Ok(())
//! # }
//! ```

use crate::config::Settings;
use crate::error::{SamplerError, SamplerResult};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

/// Output format for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Multi-line, colored; for a terminal
    Pretty,
    /// One line per event, no colors
    Compact,
    /// Newline-delimited JSON
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "Invalid output format '{other}'. Must be one of: pretty, compact, json"
            )),
        }
    }
}

/// Subscriber options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
    /// Tag events with the emitting thread
    pub with_thread_names: bool,
    /// ANSI colors; only honored by [`OutputFormat::Pretty`]
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl TracingConfig {
    /// Options from `[application] log_level`.
    pub fn from_settings(settings: &Settings) -> SamplerResult<Self> {
        Ok(Self::new(parse_log_level(&settings.application.log_level)?))
    }

    /// Pretty output at `level`.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            format: OutputFormat::Pretty,
            with_thread_names: true,
            with_ansi: true,
        }
    }

    /// Set output format
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable ANSI colors
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer().with_thread_names(self.with_thread_names);
        match self.format {
            OutputFormat::Pretty => layer.pretty().with_ansi(self.with_ansi).boxed(),
            OutputFormat::Compact => layer.compact().with_ansi(false).boxed(),
            OutputFormat::Json => layer.json().boxed(),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .from_env_lossy()
    }
}

/// Initialize tracing from loaded settings
pub fn init_from_settings(settings: &Settings) -> SamplerResult<()> {
    init(TracingConfig::from_settings(settings)?)
}

/// Install the global subscriber.
///
/// Idempotent: if a global subscriber is already installed this returns `Ok(())`.
pub fn init(config: TracingConfig) -> SamplerResult<()> {
    let result = tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(config.env_filter())
        .try_init();

    result.or_else(|e| {
        // Already initialized is expected in tests and embedding applications
        if e.to_string().contains("already") {
            Ok(())
        } else {
            Err(SamplerError::Tracing(e.to_string()))
        }
    })
}

/// Parse a level name, case-insensitively.
pub fn parse_log_level(level: &str) -> SamplerResult<Level> {
    Level::from_str(level).map_err(|_| SamplerError::InvalidLogLevel(level.to_string()))
}
