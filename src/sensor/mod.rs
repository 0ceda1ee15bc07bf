//! Motion sensor collaborator interface
//!
//! The sampler does not talk to sensor hardware itself. A platform layer
//! implements [`SensorSource`] and calls back into a [`SensorListener`] from
//! whatever thread it delivers readings on.
//!
//! # Contract
//!
//! - `default_sensor` selects one sensor of the requested kind, or `None`
//! - `subscribe` starts asynchronous delivery to the listener at (roughly) the
//!   requested rate and returns an id for `unsubscribe`
//! - events of other kinds may still arrive; listeners filter on
//!   [`SensorEvent::kind`]
//!
//! # Thread Safety
//!
//! Both traits require `Send + Sync`. Listener callbacks must return promptly:
//! they run on the platform's delivery thread.

pub mod mock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use mock::MockSensorSource;

/// Standard gravity in m/s².
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Kind of motion sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Tri-axis accelerometer including gravity, m/s².
    Accelerometer,
    /// Tri-axis gyroscope, rad/s.
    Gyroscope,
    /// Tri-axis magnetometer, µT.
    MagneticField,
}

/// Requested delivery rate. Opaque to the sampler; forwarded as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorRate {
    /// As fast as the hardware allows; cadence is not uniform.
    Fastest,
    /// Fast and uniform, but may withhold events below a change threshold.
    #[default]
    Game,
    /// Rate suitable for UI updates.
    Ui,
    /// Slow rate suitable for orientation changes.
    Normal,
}

impl SensorRate {
    /// Typical interval between events at this rate.
    pub fn nominal_interval(self) -> Duration {
        match self {
            SensorRate::Fastest => Duration::from_millis(5),
            SensorRate::Game => Duration::from_millis(20),
            SensorRate::Ui => Duration::from_millis(66),
            SensorRate::Normal => Duration::from_millis(200),
        }
    }
}

/// A sensor selected through [`SensorSource::default_sensor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorInfo {
    /// Human-readable sensor name.
    pub name: String,
    /// What the sensor measures.
    pub kind: SensorKind,
}

/// One reading delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    /// Kind of the sensor that produced the reading.
    pub kind: SensorKind,
    /// X, Y, Z components.
    pub values: [f64; 3],
    /// When the platform captured the reading.
    pub timestamp: DateTime<Utc>,
}

impl SensorEvent {
    /// Accelerometer reading stamped with the current time.
    pub fn accelerometer(values: [f64; 3]) -> Self {
        Self {
            kind: SensorKind::Accelerometer,
            values,
            timestamp: Utc::now(),
        }
    }
}

/// Handle returned by [`SensorSource::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receives readings on the platform's delivery thread.
pub trait SensorListener: Send + Sync {
    /// Called once per reading.
    fn on_sensor_event(&self, event: &SensorEvent);
}

/// Platform sensor service.
pub trait SensorSource: Send + Sync {
    /// Select the default sensor of `kind`, if the device has one.
    fn default_sensor(&self, kind: SensorKind) -> Option<SensorInfo>;

    /// Start delivering readings of `sensor` to `listener`.
    fn subscribe(
        &self,
        sensor: &SensorInfo,
        listener: Arc<dyn SensorListener>,
        rate: SensorRate,
    ) -> SubscriptionId;

    /// Stop delivery for `id`. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Euclidean norm of a tri-axis reading.
#[inline]
pub fn magnitude(values: [f64; 3]) -> f64 {
    let [x, y, z] = values;
    (x * x + y * y + z * z).sqrt()
}
