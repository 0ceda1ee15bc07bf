//! CLI entry point for motion_spectrum
//!
//! Runs the sampler against the mock accelerometer and logs the dominant
//! frequency bin of every spectral sample.
//!
//! # Usage
//!
//! ```bash
//! motion_spectrum --window-size 64 --period-ms 500 --signal-hz 3 --duration-secs 10
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use motion_spectrum::config::Settings;
use motion_spectrum::logging::{self, OutputFormat, TracingConfig};
use motion_spectrum::sensor::mock::SignalConfig;
use motion_spectrum::sensor::MockSensorSource;
use motion_spectrum::{Controller, SampleSink, SpectralSample};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "motion_spectrum")]
#[command(about = "Accelerometer magnitude spectra from a simulated sensor", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = motion_spectrum::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the FFT window size (power of two)
    #[arg(long)]
    window_size: Option<usize>,

    /// Override the update period in milliseconds
    #[arg(long)]
    period_ms: Option<u64>,

    /// How long to sample before stopping
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,

    /// Frequency of the simulated motion
    #[arg(long, default_value_t = 2.0)]
    signal_hz: f64,

    /// Log output format (pretty, compact, json)
    #[arg(long, default_value = "pretty")]
    format: OutputFormat,

    /// Disable ANSI colors in pretty output
    #[arg(long)]
    no_color: bool,
}

/// Logs the strongest non-DC bin of each sample.
struct DominantBinLogger {
    bin_hz: f64,
}

impl SampleSink for DominantBinLogger {
    fn accept(&self, sample: Arc<SpectralSample>) {
        let dc = sample.magnitude(0).unwrap_or_default() / sample.len() as f64;
        match sample.dominant_bin() {
            Some((bin, magnitude)) => info!(
                bin,
                frequency_hz = bin as f64 * self.bin_hz,
                magnitude,
                mean_magnitude = dc,
                timestamp = %sample.timestamp(),
                "Spectral sample"
            ),
            None => info!(mean_magnitude = dc, "Spectral sample without AC bins"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(window_size) = cli.window_size {
        settings.sampler.window_size = window_size;
    }
    if let Some(period_ms) = cli.period_ms {
        settings.sampler.update_period = Duration::from_millis(period_ms);
    }
    settings.validate()?;

    let tracing_config = TracingConfig::from_settings(&settings)?
        .with_format(cli.format)
        .with_ansi(!cli.no_color);
    logging::init(tracing_config)?;

    info!(name = %settings.application.name, "Starting");

    let sensors = Arc::new(MockSensorSource::new());
    let signal = SignalConfig {
        frequency_hz: cli.signal_hz,
        interval: settings.sampler.sensor_rate.nominal_interval(),
        ..SignalConfig::default()
    };
    let generator = sensors.spawn_generator(signal)?;

    let sample_rate_hz = 1.0 / signal.interval.as_secs_f64();
    let bin_hz = sample_rate_hz / settings.sampler.window_size as f64;

    let controller = Controller::new(sensors.clone(), settings.sampler.clone())?;
    let sink: Arc<dyn SampleSink> = Arc::new(DominantBinLogger { bin_hz });
    if !controller.add_sink(sink.clone())? {
        warn!("Sampler did not start");
    }

    tokio::time::sleep(Duration::from_secs(cli.duration_secs)).await;

    if let Some(stopped) = controller.remove_sink(&sink) {
        stopped.wait().await;
    }
    generator.stop();
    info!("Done");
    Ok(())
}
