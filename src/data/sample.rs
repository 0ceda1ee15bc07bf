//! Spectral snapshot handed to sinks.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One FFT of the magnitude window.
///
/// Immutable after construction. Sinks receive it behind an `Arc`, so every
/// sink of a fan-out sees the same data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectralSample {
    real: Vec<f64>,
    imaginary: Vec<f64>,
    timestamp: DateTime<Utc>,
}

impl SpectralSample {
    /// Build from transform output.
    ///
    /// # Panics
    /// If `real` and `imaginary` differ in length.
    pub fn new(real: Vec<f64>, imaginary: Vec<f64>, timestamp: DateTime<Utc>) -> Self {
        assert_eq!(
            real.len(),
            imaginary.len(),
            "real and imaginary parts must have equal length"
        );
        Self {
            real,
            imaginary,
            timestamp,
        }
    }

    /// Real parts, bin 0 first.
    pub fn real(&self) -> &[f64] {
        &self.real
    }

    /// Imaginary parts, bin 0 first.
    pub fn imaginary(&self) -> &[f64] {
        &self.imaginary
    }

    /// Wall-clock time of capture.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Number of bins (the window size).
    pub fn len(&self) -> usize {
        self.real.len()
    }

    /// True for a zero-length sample.
    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }

    /// Magnitude of bin `k`, or `None` past the end.
    pub fn magnitude(&self, k: usize) -> Option<f64> {
        Some(self.real.get(k)?.hypot(*self.imaginary.get(k)?))
    }

    /// Magnitudes of all bins.
    pub fn magnitudes(&self) -> Vec<f64> {
        self.real
            .iter()
            .zip(&self.imaginary)
            .map(|(re, im)| re.hypot(*im))
            .collect()
    }

    /// Index and magnitude of the strongest bin in `1..=N/2`, ignoring DC.
    pub fn dominant_bin(&self) -> Option<(usize, f64)> {
        (1..=self.len() / 2)
            .filter_map(|k| self.magnitude(k).map(|m| (k, m)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}
