//! Lifecycle facade over the sampling worker.
//!
//! The controller owns configuration and the sink registry, and keeps a
//! worker running exactly while at least one sink is registered (and an
//! accelerometer is available).
//!
//! Construct one explicitly and share it with `Arc`:
//!
//! ```no_run
//! use motion_spectrum::{config::SamplerConfig, controller::Controller, sensor::MockSensorSource};
//! use motion_spectrum::data::SpectralSample;
//! use motion_spectrum::sink::SampleSink;
//! use std::sync::Arc;
//!
//! let controller = Controller::new(Arc::new(MockSensorSource::new()), SamplerConfig::default())?;
//! let sink: Arc<dyn SampleSink> = Arc::new(|s: Arc<SpectralSample>| {
//!     println!("DC = {:?}", s.magnitude(0));
//! });
//! controller.add_sink(sink.clone())?;
//! // ...
//! controller.remove_sink(&sink);
//! # Ok::<(), motion_spectrum::error::SamplerError>(())
//! ```

use crate::config::{validate_update_period, validate_window_size, SamplerConfig, SharedPeriod};
use crate::error::SamplerResult;
use crate::sensor::{SensorRate, SensorSource};
use crate::sink::{SampleSink, SinkRegistry};
use crate::worker::{SamplingWorker, StopSignal, WorkerState};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Starts and stops sampling as sinks come and go.
pub struct Controller {
    sensors: Arc<dyn SensorSource>,
    sinks: SinkRegistry,
    config: RwLock<SamplerConfig>,
    period: Arc<SharedPeriod>,
    worker: Mutex<Option<SamplingWorker>>,
}

impl Controller {
    /// Create a stopped controller.
    ///
    /// # Errors
    /// If `config` fails validation.
    pub fn new(sensors: Arc<dyn SensorSource>, config: SamplerConfig) -> SamplerResult<Self> {
        config.validate()?;
        Ok(Self {
            sensors,
            sinks: SinkRegistry::new(),
            period: Arc::new(SharedPeriod::new(config.update_period)),
            config: RwLock::new(config),
            worker: Mutex::new(None),
        })
    }

    /// Register `sink` and make sure sampling is running.
    ///
    /// Returns whether the worker is running afterwards; `false` means no
    /// accelerometer was available. The sink stays registered either way.
    pub fn add_sink(&self, sink: Arc<dyn SampleSink>) -> SamplerResult<bool> {
        if self.sinks.add(sink) {
            debug!(sinks = self.sinks.len(), "Sink added");
        }
        self.start()
    }

    /// Unregister `sink`; stop sampling if no sink remains.
    ///
    /// Returns the stop signal of the worker if this call stopped it.
    pub fn remove_sink(&self, sink: &Arc<dyn SampleSink>) -> Option<StopSignal> {
        if self.sinks.remove(sink) {
            debug!(sinks = self.sinks.len(), "Sink removed");
        }
        // Checked under the worker lock so a concurrent add_sink either sees
        // the slot emptied and starts a new worker, or keeps this one alive.
        let mut slot = self.worker.lock();
        if !self.sinks.is_empty() {
            return None;
        }
        Self::stop_worker(slot.take())
    }

    /// Start a worker with the current configuration if sinks are registered
    /// and none is running.
    pub fn start(&self) -> SamplerResult<bool> {
        let mut slot = self.worker.lock();
        if slot.is_some() {
            return Ok(true);
        }
        if self.sinks.is_empty() {
            return Ok(false);
        }

        let config = self.config.read().clone();
        let worker = SamplingWorker::with_shared_period(
            Arc::clone(&self.sensors),
            self.sinks.clone(),
            &config,
            Arc::clone(&self.period),
        )?;
        if worker.start()? {
            *slot = Some(worker);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Request the running worker to stop. Does not wait.
    pub fn stop(&self) -> Option<StopSignal> {
        let worker = self.worker.lock().take();
        Self::stop_worker(worker)
    }

    fn stop_worker(worker: Option<SamplingWorker>) -> Option<StopSignal> {
        let worker = worker?;
        let signal = worker.stop_signal();
        worker.stop();
        Some(signal)
    }

    /// Stop, then start with the current configuration.
    ///
    /// The previous loop may still be winding down when the new one starts;
    /// they share nothing but the sink registry.
    pub fn restart(&self) -> SamplerResult<bool> {
        info!("Restarting sampler");
        self.stop();
        self.start()
    }

    /// True while a worker is `Running`.
    pub fn is_running(&self) -> bool {
        self.worker_state() == WorkerState::Running
    }

    /// State of the current worker, `Stopped` if there is none.
    pub fn worker_state(&self) -> WorkerState {
        self.worker
            .lock()
            .as_ref()
            .map_or(WorkerState::Stopped, SamplingWorker::state)
    }

    /// The registry that receives samples.
    pub fn sinks(&self) -> &SinkRegistry {
        &self.sinks
    }

    /// Copy of the current configuration.
    pub fn config(&self) -> SamplerConfig {
        self.config.read().clone()
    }

    /// Configured window size.
    pub fn window_size(&self) -> usize {
        self.config.read().window_size
    }

    /// Change the window size. Takes effect on the next start.
    pub fn set_window_size(&self, window_size: usize) -> SamplerResult<()> {
        validate_window_size(window_size)?;
        self.config.write().window_size = window_size;
        Ok(())
    }

    /// Configured update period.
    pub fn update_period(&self) -> Duration {
        self.config.read().update_period
    }

    /// Change the update period. A running loop picks it up on its next tick.
    pub fn set_update_period(&self, period: Duration) -> SamplerResult<()> {
        validate_update_period(period)?;
        self.config.write().update_period = period;
        self.period.set(period);
        Ok(())
    }

    /// Configured sensor rate hint.
    pub fn sensor_rate(&self) -> SensorRate {
        self.config.read().sensor_rate
    }

    /// Change the sensor rate hint. Takes effect on the next start.
    pub fn set_sensor_rate(&self, rate: SensorRate) {
        self.config.write().sensor_rate = rate;
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config())
            .field("sinks", &self.sinks.len())
            .field("state", &self.worker_state())
            .finish()
    }
}
