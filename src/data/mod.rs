//! Sample storage and spectral processing.
pub mod fft;
pub mod ring_buffer;
pub mod sample;

pub use fft::FftEngine;
pub use ring_buffer::RingBuffer;
pub use sample::SpectralSample;
