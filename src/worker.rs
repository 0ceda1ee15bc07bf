//! Sampling worker: ring buffer, timing loop, FFT and fan-out.
//!
//! # Threads
//!
//! - The sensor collaborator calls [`SensorListener::on_sensor_event`] (and
//!   through it [`SamplingWorker::on_reading`]) on its own delivery thread.
//! - `start()` spawns a timing-loop thread that snapshots the buffer once per
//!   update period, transforms it and publishes a [`SpectralSample`].
//!
//! The two meet only in the lock-free [`RingBuffer`] and the atomic state flag.
//!
//! # States
//!
//! ```text
//! Stopped --start()--> Running --stop()--> Stopping --loop exits--> Stopped
//! ```
//!
//! `stop()` never blocks. Use [`SamplingWorker::stop_signal`] to wait until the
//! loop thread has actually exited.

use crate::config::{validate_window_size, SamplerConfig, SharedPeriod};
use crate::data::{FftEngine, RingBuffer, SpectralSample};
use crate::error::{SamplerError, SamplerResult};
use crate::sensor::{
    magnitude, SensorEvent, SensorKind, SensorListener, SensorRate, SensorSource, SubscriptionId,
};
use crate::sink::{FanOutReport, SinkRegistry};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Name given to the timing-loop thread.
pub const LOOP_THREAD_NAME: &str = "spectrum-sampler";

/// Lifecycle state of a [`SamplingWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkerState {
    /// Not sampling. Initial and terminal state.
    Stopped = 0,
    /// Sampling; the timing loop is active.
    Running = 1,
    /// Stop requested; the loop exits on its next state check.
    Stopping = 2,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

/// State shared between the owner, the sensor callback and the loop thread.
struct Shared {
    /// Read lock-free on every reading.
    state: AtomicU8,
    /// Mirrors `state` for waiters. Every transition happens inside the watch
    /// lock so observers never see transitions out of order.
    state_tx: watch::Sender<WorkerState>,
    buffer: RingBuffer,
}

impl Shared {
    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move `from -> to`; returns the state found if it was not `from`.
    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), WorkerState> {
        let mut outcome = Ok(());
        self.state_tx.send_if_modified(|published| {
            match self.state.compare_exchange(
                from as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    *published = to;
                    true
                }
                Err(actual) => {
                    outcome = Err(WorkerState::from_u8(actual));
                    false
                }
            }
        });
        outcome
    }

    fn set(&self, to: WorkerState) {
        self.state_tx.send_modify(|published| {
            self.state.store(to as u8, Ordering::Release);
            *published = to;
        });
    }

    #[inline]
    fn on_reading(&self, value: f64) {
        if self.state() == WorkerState::Running {
            self.buffer.write(value);
        }
    }
}

impl SensorListener for Shared {
    fn on_sensor_event(&self, event: &SensorEvent) {
        if event.kind == SensorKind::Accelerometer {
            self.on_reading(magnitude(event.values));
        } else {
            trace!(kind = ?event.kind, "Ignoring non-accelerometer event");
        }
    }
}

/// Resolves once a worker is `Stopped`.
///
/// Taken from a running worker, this waits for the timing loop to exit. Taken
/// from a worker that is already `Stopped` (never started, or no sensor), it
/// resolves immediately.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<WorkerState>,
}

impl StopSignal {
    /// True if the worker is already `Stopped`.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() == WorkerState::Stopped
    }

    /// Wait until the worker reaches `Stopped`.
    pub async fn wait(mut self) {
        // The sender lives as long as the worker's shared state; if it is gone
        // the loop has exited too.
        let _ = self.rx.wait_for(|s| *s == WorkerState::Stopped).await;
    }
}

/// Periodically publishes the spectrum of the most recent magnitude window.
pub struct SamplingWorker {
    shared: Arc<Shared>,
    sensors: Arc<dyn SensorSource>,
    sinks: SinkRegistry,
    period: Arc<SharedPeriod>,
    window_size: usize,
    sensor_rate: SensorRate,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl SamplingWorker {
    /// Worker with its own update period.
    pub fn new(
        sensors: Arc<dyn SensorSource>,
        sinks: SinkRegistry,
        config: &SamplerConfig,
    ) -> SamplerResult<Self> {
        let period = Arc::new(SharedPeriod::new(config.update_period));
        Self::with_shared_period(sensors, sinks, config, period)
    }

    /// Worker whose update period is owned elsewhere and read on every tick.
    ///
    /// `config.update_period` is ignored in favour of `period`.
    pub fn with_shared_period(
        sensors: Arc<dyn SensorSource>,
        sinks: SinkRegistry,
        config: &SamplerConfig,
        period: Arc<SharedPeriod>,
    ) -> SamplerResult<Self> {
        validate_window_size(config.window_size)?;
        let (state_tx, _) = watch::channel(WorkerState::Stopped);
        Ok(Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(WorkerState::Stopped as u8),
                state_tx,
                buffer: RingBuffer::new(config.window_size)?,
            }),
            sensors,
            sinks,
            period,
            window_size: config.window_size,
            sensor_rate: config.sensor_rate,
            subscription: Mutex::new(None),
        })
    }

    /// Current state.
    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    /// Window size fixed for this worker.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Receiver that observes every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.shared.state_tx.subscribe()
    }

    /// Notification for the worker reaching `Stopped`. Already resolved if the
    /// worker is not running; see [`StopSignal`].
    pub fn stop_signal(&self) -> StopSignal {
        StopSignal {
            rx: self.subscribe_state(),
        }
    }

    /// Begin sampling.
    ///
    /// Returns `Ok(false)` and stays `Stopped` if no accelerometer is available.
    ///
    /// # Errors
    /// `InvalidState` unless the worker is `Stopped`; `Io` if the loop thread
    /// cannot be spawned.
    pub fn start(&self) -> SamplerResult<bool> {
        let current = self.state();
        if current != WorkerState::Stopped {
            return Err(SamplerError::InvalidState {
                expected: WorkerState::Stopped,
                actual: current,
            });
        }

        let Some(sensor) = self.sensors.default_sensor(SensorKind::Accelerometer) else {
            warn!("No accelerometer available; sampler stays stopped");
            return Ok(false);
        };

        let engine = FftEngine::new(self.window_size)?;
        self.shared.buffer.reset();
        self.shared
            .transition(WorkerState::Stopped, WorkerState::Running)
            .map_err(|actual| SamplerError::InvalidState {
                expected: WorkerState::Stopped,
                actual,
            })?;

        let listener: Arc<dyn SensorListener> = self.shared.clone();
        let id = self.sensors.subscribe(&sensor, listener, self.sensor_rate);
        *self.subscription.lock() = Some(id);

        let timing = TimingLoop {
            shared: Arc::clone(&self.shared),
            sinks: self.sinks.clone(),
            period: Arc::clone(&self.period),
            real: vec![0.0; self.window_size],
            imaginary: vec![0.0; self.window_size],
            engine,
        };

        let spawned = thread::Builder::new()
            .name(LOOP_THREAD_NAME.to_string())
            .spawn(move || timing.run());

        match spawned {
            Ok(_) => {
                info!(
                    sensor = %sensor.name,
                    window_size = self.window_size,
                    update_period_ms = self.period.get().as_millis() as u64,
                    sensor_rate = ?self.sensor_rate,
                    "Sampling started"
                );
                Ok(true)
            }
            Err(err) => {
                if let Some(id) = self.subscription.lock().take() {
                    self.sensors.unsubscribe(id);
                }
                self.shared.set(WorkerState::Stopped);
                Err(err.into())
            }
        }
    }

    /// Request the loop to stop. No-op unless `Running`; never blocks.
    pub fn stop(&self) {
        if self
            .shared
            .transition(WorkerState::Running, WorkerState::Stopping)
            .is_err()
        {
            return;
        }
        if let Some(id) = self.subscription.lock().take() {
            self.sensors.unsubscribe(id);
        }
        info!("Sampling stop requested");
    }

    /// Feed one magnitude sample. Dropped unless `Running`.
    pub fn on_reading(&self, magnitude: f64) {
        self.shared.on_reading(magnitude);
    }

    /// Current window contents, oldest first.
    pub fn window_snapshot(&self) -> Vec<f64> {
        self.shared.buffer.snapshot_ordered()
    }
}

impl Drop for SamplingWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SamplingWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingWorker")
            .field("state", &self.state())
            .field("window_size", &self.window_size)
            .field("sensor_rate", &self.sensor_rate)
            .finish()
    }
}

/// Everything the loop thread owns.
struct TimingLoop {
    shared: Arc<Shared>,
    sinks: SinkRegistry,
    period: Arc<SharedPeriod>,
    engine: FftEngine,
    real: Vec<f64>,
    imaginary: Vec<f64>,
}

impl TimingLoop {
    fn run(mut self) {
        let mut scheduled = Instant::now() + self.period.get();
        let mut ticks = 0u64;

        while self.shared.state() == WorkerState::Running {
            let now = Instant::now();
            let delay = if scheduled > now {
                scheduled - now
            } else {
                // Behind schedule: restart the cadence from now instead of
                // firing a burst of catch-up ticks.
                let overrun = now - scheduled;
                if overrun > Duration::ZERO {
                    debug!(overrun_ms = overrun.as_millis() as u64, "Tick overrun");
                }
                scheduled = now;
                Duration::ZERO
            };
            thread::sleep(delay);
            scheduled += self.period.get();

            if self.shared.state() != WorkerState::Running {
                break;
            }
            let report = self.update();
            ticks += 1;
            trace!(tick = ticks, delivered = report.delivered, "Tick");
        }

        self.shared.set(WorkerState::Stopped);
        info!(ticks, "Sampling loop exited");
    }

    /// One snapshot, transform and publish.
    fn update(&mut self) -> FanOutReport {
        self.shared.buffer.snapshot_into(&mut self.real);
        self.imaginary.fill(0.0);
        self.engine.transform(&mut self.real, &mut self.imaginary);

        let sample = SpectralSample::new(self.real.clone(), self.imaginary.clone(), Utc::now());
        self.sinks.fan_out(sample)
    }
}
