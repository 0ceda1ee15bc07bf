//! # Motion Spectrum
//!
//! Continuously samples the magnitude of an accelerometer into a rolling
//! window and, once per update period, publishes the window's FFT to any
//! number of registered sinks.
//!
//! ## Crate Structure
//!
//! - **`sensor`**: the sensor collaborator interface (`SensorSource`,
//!   `SensorListener`), `magnitude`, and a `MockSensorSource`.
//! - **`data`**: the lock-free `RingBuffer`, the radix-2 `FftEngine` and the
//!   `SpectralSample` value handed to sinks.
//! - **`sink`**: the `SampleSink` trait and the copy-on-write `SinkRegistry`.
//! - **`worker`**: `SamplingWorker`, which owns the buffer and runs the
//!   drift-correcting timing loop on its own thread.
//! - **`controller`**: `Controller`, which holds configuration and runs a worker
//!   while sinks are registered.
//! - **`config`**: figment-based `Settings` loading and validation.
//! - **`logging`**: tracing subscriber setup.
//! - **`error`**: the crate-wide `SamplerError`.

pub mod config;
pub mod controller;
pub mod data;
pub mod error;
pub mod logging;
pub mod sensor;
pub mod sink;
pub mod worker;

pub use config::{SamplerConfig, Settings};
pub use controller::Controller;
pub use data::SpectralSample;
pub use error::{SamplerError, SamplerResult};
pub use sink::{SampleSink, SinkRegistry};
pub use worker::{SamplingWorker, StopSignal, WorkerState};
