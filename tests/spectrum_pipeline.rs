// End-to-end pipeline tests
//
// Sensor events flow through magnitude extraction, the ring buffer, the
// timing loop and the FFT to registered sinks.

use motion_spectrum::config::SamplerConfig;
use motion_spectrum::sensor::{MockSensorSource, SensorRate, STANDARD_GRAVITY};
use motion_spectrum::{SampleSink, SamplingWorker, SinkRegistry, SpectralSample, WorkerState};
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(3);

fn config(window_size: usize, period_ms: u64) -> SamplerConfig {
    SamplerConfig {
        window_size,
        update_period: Duration::from_millis(period_ms),
        sensor_rate: SensorRate::Fastest,
    }
}

fn channel_sink() -> (Arc<dyn SampleSink>, mpsc::UnboundedReceiver<Arc<SpectralSample>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink: Arc<dyn SampleSink> = Arc::new(move |s: Arc<SpectralSample>| {
        let _ = tx.send(s);
    });
    (sink, rx)
}

async fn stop_and_wait(worker: &SamplingWorker) {
    let signal = worker.stop_signal();
    worker.stop();
    timeout(WAIT, signal.wait())
        .await
        .expect("loop thread did not exit");
    assert_eq!(worker.state(), WorkerState::Stopped);
}

#[tokio::test]
async fn constant_readings_give_pure_dc() {
    let sensors = Arc::new(MockSensorSource::new());
    let sinks = SinkRegistry::new();
    let (sink, mut rx) = channel_sink();
    sinks.add(sink);

    let worker = SamplingWorker::new(sensors.clone(), sinks, &config(8, 100)).unwrap();
    assert!(worker.start().unwrap());

    // |(0, 0, 10)| == 10 for all eight readings
    for _ in 0..8 {
        sensors.emit_acceleration([0.0, 0.0, 10.0]);
    }

    let sample = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(sample.len(), 8);
    assert!((sample.real()[0] - 80.0).abs() < 1e-9);
    assert!(sample.imaginary()[0].abs() < 1e-9);
    for (k, magnitude) in sample.magnitudes().iter().enumerate().skip(1) {
        assert!(*magnitude < 1e-9, "bin {k} = {magnitude}");
    }

    stop_and_wait(&worker).await;
}

#[tokio::test]
async fn cold_window_reads_as_gravity() {
    let sensors = Arc::new(MockSensorSource::new());
    let sinks = SinkRegistry::new();
    let (sink, mut rx) = channel_sink();
    sinks.add(sink);

    let worker = SamplingWorker::new(sensors, sinks, &config(16, 30)).unwrap();
    worker.start().unwrap();

    let sample = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    let expected_dc = 16.0 * STANDARD_GRAVITY;
    assert!((sample.magnitude(0).unwrap() - expected_dc).abs() < 1e-9);
    assert!(sample.dominant_bin().unwrap().1 < 1e-9);

    stop_and_wait(&worker).await;
}

#[tokio::test]
async fn oscillating_magnitude_peaks_at_its_bin() {
    let n = 32;
    let cycles = 4.0;
    let sensors = Arc::new(MockSensorSource::new());
    let sinks = SinkRegistry::new();
    let (sink, mut rx) = channel_sink();
    sinks.add(sink);

    let worker = SamplingWorker::new(sensors.clone(), sinks, &config(n, 150)).unwrap();
    worker.start().unwrap();

    // Magnitude oscillates around gravity; stays positive so the norm keeps its sign
    for i in 0..n {
        let wave = 2.0 * (2.0 * PI * cycles * i as f64 / n as f64).sin();
        sensors.emit_acceleration([0.0, 0.0, STANDARD_GRAVITY + wave]);
    }

    let sample = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    let (bin, magnitude) = sample.dominant_bin().unwrap();
    assert_eq!(bin, 4);
    assert!((magnitude - n as f64).abs() < 1e-6);
    assert!((sample.magnitude(n - 4).unwrap() - magnitude).abs() < 1e-9);

    stop_and_wait(&worker).await;
}

#[tokio::test]
async fn panicking_sink_does_not_starve_others() {
    let sensors = Arc::new(MockSensorSource::new());
    let sinks = SinkRegistry::new();
    sinks.add(Arc::new(|_s: Arc<SpectralSample>| panic!("bad observer")));
    let (sink, mut rx) = channel_sink();
    sinks.add(sink);

    let worker = SamplingWorker::new(sensors, sinks, &config(8, 20)).unwrap();
    worker.start().unwrap();

    for _ in 0..3 {
        timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    }
    assert_eq!(worker.state(), WorkerState::Running);

    stop_and_wait(&worker).await;
}

#[tokio::test]
async fn readings_after_stop_are_ignored() {
    let sensors = Arc::new(MockSensorSource::new());
    let worker = SamplingWorker::new(sensors.clone(), SinkRegistry::new(), &config(4, 20)).unwrap();

    worker.start().unwrap();
    stop_and_wait(&worker).await;

    worker.on_reading(1.0);
    // Unsubscribed on stop: the mock has no listener left to call
    assert_eq!(sensors.emit_acceleration([1.0, 1.0, 1.0]), 0);
    assert_eq!(worker.window_snapshot(), vec![STANDARD_GRAVITY; 4]);
}

#[tokio::test]
async fn generator_drives_a_live_spectrum() {
    let sensors = Arc::new(MockSensorSource::new());
    let sinks = SinkRegistry::new();
    let (sink, mut rx) = channel_sink();
    sinks.add(sink);

    let worker = SamplingWorker::new(sensors.clone(), sinks, &config(32, 100)).unwrap();
    worker.start().unwrap();
    let generator = sensors
        .spawn_generator(motion_spectrum::sensor::mock::SignalConfig {
            interval: Duration::from_millis(2),
            ..Default::default()
        })
        .unwrap();

    // Skip the first tick, which may still contain the gravity prefill
    timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    let sample = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    let mean = sample.magnitude(0).unwrap() / 32.0;
    assert!((mean - STANDARD_GRAVITY).abs() < 2.0, "mean magnitude {mean}");

    generator.stop();
    stop_and_wait(&worker).await;
}
