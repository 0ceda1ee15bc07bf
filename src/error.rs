//! Custom error types for the sampler.
//!
//! `SamplerError` is the single error type of the crate. It follows the same
//! pattern as the rest of the stack: a `thiserror` enum with `#[from]`
//! conversions so `?` works across configuration loading, thread spawning and
//! validation.
//!
//! ## Error Categories
//!
//! - **`InvalidWindowSize`** / **`InvalidUpdatePeriod`**: semantic configuration
//!   errors. These fail fast and are never silently coerced.
//! - **`InvalidState`**: a lifecycle call made from the wrong worker state
//!   (e.g. `start()` while a previous run is still stopping).
//! - **`Config`**: wraps `figment` extraction errors (file parsing, env overrides).
//! - **`Io`**: wraps `std::io::Error`, in practice a failure to spawn the
//!   timing-loop thread.
//! - **`InvalidLogLevel`** / **`Tracing`**: logging setup problems.
//!
//! A missing sensor is deliberately *not* an error: `start()` reports it as
//! `Ok(false)` because it is an expected environmental condition.

use crate::worker::WorkerState;
use thiserror::Error;

/// Convenience alias for results using the sampler error type.
pub type SamplerResult<T> = std::result::Result<T, SamplerError>;

/// Errors produced by the sampling pipeline.
#[derive(Error, Debug)]
pub enum SamplerError {
    /// Window size is not a power of two or lies outside the supported range.
    #[error(
        "Invalid window size {size}: must be a power of two between {min} and {max}",
        min = crate::config::MIN_WINDOW_SIZE,
        max = crate::config::MAX_WINDOW_SIZE
    )]
    InvalidWindowSize {
        /// The rejected size.
        size: usize,
    },

    /// Update period must be strictly positive.
    #[error("Invalid update period: must be greater than zero")]
    InvalidUpdatePeriod,

    /// A lifecycle operation was requested from a state that does not allow it.
    #[error("Invalid worker state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        /// State the operation requires.
        expected: WorkerState,
        /// State the worker was actually in.
        actual: WorkerState,
    },

    /// Configuration could not be loaded or extracted.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// I/O failure, typically spawning the timing-loop thread.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown log level string.
    #[error("Invalid log level '{0}'. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// The tracing subscriber could not be installed.
    #[error("Failed to initialize tracing: {0}")]
    Tracing(String),
}

impl From<figment::Error> for SamplerError {
    fn from(value: figment::Error) -> Self {
        SamplerError::Config(Box::new(value))
    }
}
