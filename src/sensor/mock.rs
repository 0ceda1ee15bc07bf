//! Mock sensor source
//!
//! Simulated [`SensorSource`] for tests and the demo binary.
//!
//! - `MockSensorSource::new()` exposes one accelerometer
//! - `MockSensorSource::without_accelerometer()` exposes none, for the
//!   "sensor unavailable" path
//! - `emit` delivers an event synchronously on the caller's thread
//! - `spawn_generator` drives a gravity-plus-sine signal from a background thread

use super::{
    SensorEvent, SensorInfo, SensorKind, SensorListener, SensorRate, SensorSource,
    SubscriptionId, STANDARD_GRAVITY,
};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

struct Subscription {
    listener: Arc<dyn SensorListener>,
    rate: SensorRate,
}

/// In-memory sensor service.
pub struct MockSensorSource {
    accelerometer: Option<SensorInfo>,
    subscriptions: Mutex<BTreeMap<u64, Subscription>>,
    next_id: AtomicU64,
}

impl MockSensorSource {
    /// Mock device with one accelerometer.
    pub fn new() -> Self {
        Self {
            accelerometer: Some(SensorInfo {
                name: "Mock Accelerometer".to_string(),
                kind: SensorKind::Accelerometer,
            }),
            subscriptions: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Mock device with no accelerometer.
    pub fn without_accelerometer() -> Self {
        Self {
            accelerometer: None,
            ..Self::new()
        }
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Rate hints of live subscriptions, in subscription order.
    pub fn subscribed_rates(&self) -> Vec<SensorRate> {
        self.subscriptions.lock().values().map(|s| s.rate).collect()
    }

    /// Deliver `event` to every subscriber on the calling thread.
    ///
    /// Returns the number of listeners called.
    pub fn emit(&self, event: SensorEvent) -> usize {
        // Snapshot so listeners may (un)subscribe from inside the callback
        let listeners: Vec<Arc<dyn SensorListener>> = self
            .subscriptions
            .lock()
            .values()
            .map(|s| Arc::clone(&s.listener))
            .collect();
        for listener in &listeners {
            listener.on_sensor_event(&event);
        }
        listeners.len()
    }

    /// Deliver an accelerometer event with the given components.
    pub fn emit_acceleration(&self, values: [f64; 3]) -> usize {
        self.emit(SensorEvent::accelerometer(values))
    }

    /// Start a background thread producing accelerometer events.
    pub fn spawn_generator(
        self: &Arc<Self>,
        signal: SignalConfig,
    ) -> std::io::Result<GeneratorHandle> {
        let source = Arc::clone(self);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let join = thread::Builder::new()
            .name("mock-accelerometer".to_string())
            .spawn(move || {
                let started = Instant::now();
                let mut rng = rand::thread_rng();
                let mut emitted = 0u64;
                while flag.load(Ordering::Acquire) {
                    let t = started.elapsed().as_secs_f64();
                    let wave = signal.amplitude * (2.0 * PI * signal.frequency_hz * t).sin();
                    let noise = if signal.noise > 0.0 {
                        rng.gen_range(-signal.noise..signal.noise)
                    } else {
                        0.0
                    };
                    source.emit_acceleration([noise, 0.0, STANDARD_GRAVITY + wave]);
                    emitted += 1;
                    thread::sleep(signal.interval);
                }
                debug!(emitted, "Mock accelerometer generator exiting");
            })?;

        info!(
            frequency_hz = signal.frequency_hz,
            interval_ms = signal.interval.as_millis() as u64,
            "Mock accelerometer generator started"
        );
        Ok(GeneratorHandle {
            running,
            join: Some(join),
        })
    }
}

impl Default for MockSensorSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for MockSensorSource {
    fn default_sensor(&self, kind: SensorKind) -> Option<SensorInfo> {
        self.accelerometer
            .as_ref()
            .filter(|info| info.kind == kind)
            .cloned()
    }

    fn subscribe(
        &self,
        sensor: &SensorInfo,
        listener: Arc<dyn SensorListener>,
        rate: SensorRate,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscriptions
            .lock()
            .insert(id, Subscription { listener, rate });
        debug!(sensor = %sensor.name, id, ?rate, "Mock sensor subscribed");
        SubscriptionId(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if self.subscriptions.lock().remove(&id.0).is_some() {
            debug!(id = id.0, "Mock sensor unsubscribed");
        }
    }
}

/// Shape of the generated signal.
#[derive(Debug, Clone, Copy)]
pub struct SignalConfig {
    /// Sine frequency added on the Z axis, Hz.
    pub frequency_hz: f64,
    /// Sine amplitude, m/s².
    pub amplitude: f64,
    /// Uniform noise bound on the X axis, m/s².
    pub noise: f64,
    /// Delay between events.
    pub interval: Duration,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 2.0,
            amplitude: 1.5,
            noise: 0.05,
            interval: SensorRate::Game.nominal_interval(),
        }
    }
}

/// Stops the generator thread when stopped or dropped.
pub struct GeneratorHandle {
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl GeneratorHandle {
    /// Signal the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for GeneratorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counting {
        events: AtomicUsize,
    }

    impl SensorListener for Counting {
        fn on_sensor_event(&self, _event: &SensorEvent) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn without_accelerometer_has_no_default_sensor() {
        let source = MockSensorSource::without_accelerometer();
        assert!(source.default_sensor(SensorKind::Accelerometer).is_none());
    }

    #[test]
    fn only_accelerometer_is_offered() {
        let source = MockSensorSource::new();
        assert!(source.default_sensor(SensorKind::Accelerometer).is_some());
        assert!(source.default_sensor(SensorKind::Gyroscope).is_none());
    }

    #[test]
    fn emit_reaches_subscribers_until_unsubscribed() {
        let source = MockSensorSource::new();
        let sensor = source.default_sensor(SensorKind::Accelerometer).unwrap();
        let listener = Arc::new(Counting::default());

        let id = source.subscribe(&sensor, listener.clone(), SensorRate::Fastest);
        assert_eq!(source.subscribed_rates(), vec![SensorRate::Fastest]);
        assert_eq!(source.emit_acceleration([0.0, 0.0, 1.0]), 1);

        source.unsubscribe(id);
        assert_eq!(source.emit_acceleration([0.0, 0.0, 1.0]), 0);
        assert_eq!(listener.events.load(Ordering::SeqCst), 1);
        assert_eq!(source.subscription_count(), 0);
    }

    #[test]
    fn generator_emits_until_stopped() {
        let source = Arc::new(MockSensorSource::new());
        let sensor = source.default_sensor(SensorKind::Accelerometer).unwrap();
        let listener = Arc::new(Counting::default());
        source.subscribe(&sensor, listener.clone(), SensorRate::Fastest);

        let handle = source
            .spawn_generator(SignalConfig {
                interval: Duration::from_millis(1),
                ..SignalConfig::default()
            })
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        handle.stop();

        let seen = listener.events.load(Ordering::SeqCst);
        assert!(seen > 0);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(listener.events.load(Ordering::SeqCst), seen);
    }
}
