//! Lock-free rolling window of magnitude samples.
//!
//! One writer (the sensor delivery thread) and one reader (the timing loop)
//! share the buffer without locks.
//!
//! # Memory Ordering
//! - Slots are `AtomicU64` holding `f64` bits, stored and loaded `Relaxed`
//! - The cursor is published with `Release` after each slot store and read
//!   with `Acquire` before a snapshot, so every slot written before the
//!   observed cursor is visible
//!
//! A snapshot that races with a write may see that single slot either before
//! or after the store. Each slot is always a whole `f64`, never a mix of two.

use crate::error::{SamplerError, SamplerResult};
use crate::sensor::STANDARD_GRAVITY;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Fixed-capacity circular buffer of `f64` samples.
///
/// Capacity is a power of two. Unwritten positions hold [`STANDARD_GRAVITY`]
/// so a partly warmed-up window looks like a device at rest.
#[derive(Debug)]
pub struct RingBuffer {
    slots: Box<[AtomicU64]>,
    /// Next write position, which is also the position of the oldest sample.
    cursor: AtomicUsize,
    mask: usize,
}

impl RingBuffer {
    /// Create a buffer of `capacity` slots pre-filled with gravity.
    ///
    /// # Errors
    /// `InvalidWindowSize` if `capacity` is zero or not a power of two.
    pub fn new(capacity: usize) -> SamplerResult<Self> {
        if !capacity.is_power_of_two() {
            return Err(SamplerError::InvalidWindowSize { size: capacity });
        }
        let slots = (0..capacity)
            .map(|_| AtomicU64::new(STANDARD_GRAVITY.to_bits()))
            .collect();
        Ok(Self {
            slots,
            cursor: AtomicUsize::new(0),
            mask: capacity - 1,
        })
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store `value` at the cursor and advance it.
    ///
    /// Must only be called from one thread at a time.
    #[inline]
    pub fn write(&self, value: f64) {
        let idx = self.cursor.load(Ordering::Relaxed);
        self.slots[idx].store(value.to_bits(), Ordering::Relaxed);
        self.cursor.store((idx + 1) & self.mask, Ordering::Release);
    }

    /// Copy of the window, oldest sample first.
    pub fn snapshot_ordered(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.capacity()];
        self.snapshot_into(&mut out);
        out
    }

    /// Fill `out` with the window, oldest sample first, without allocating.
    ///
    /// # Panics
    /// If `out.len()` differs from the capacity.
    pub fn snapshot_into(&self, out: &mut [f64]) {
        assert_eq!(
            out.len(),
            self.capacity(),
            "snapshot target length must equal ring buffer capacity"
        );
        let start = self.cursor.load(Ordering::Acquire);
        for (i, slot) in out.iter_mut().enumerate() {
            let bits = self.slots[(start + i) & self.mask].load(Ordering::Relaxed);
            *slot = f64::from_bits(bits);
        }
    }

    /// Refill with gravity and rewind the cursor.
    ///
    /// Only call while no writer is active.
    pub fn reset(&self) {
        for slot in self.slots.iter() {
            slot.store(STANDARD_GRAVITY.to_bits(), Ordering::Relaxed);
        }
        self.cursor.store(0, Ordering::Release);
    }
}
