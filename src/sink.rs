//! Sample sinks and the copy-on-write registry that fans samples out to them.
//!
//! Writers (`add`/`remove`) clone the current list, edit the clone and swap
//! it in. Readers (`fan_out`) take the current `Arc` and iterate it with no
//! lock held, so a sink may add or remove sinks, including itself, from
//! inside `accept`. Changes show up on the next fan-out.
//!
//! A sink that panics is isolated: the panic is caught, logged and counted,
//! and the remaining sinks still receive the sample. A sink that blocks is
//! *not* isolated; it delays every sink after it.

use crate::data::SpectralSample;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{trace, warn};

/// Receives spectral samples.
pub trait SampleSink: Send + Sync {
    /// Take one sample. Should return promptly.
    fn accept(&self, sample: Arc<SpectralSample>);
}

impl<F> SampleSink for F
where
    F: Fn(Arc<SpectralSample>) + Send + Sync,
{
    fn accept(&self, sample: Arc<SpectralSample>) {
        self(sample)
    }
}

type SinkList = Arc<[Arc<dyn SampleSink>]>;

/// Outcome of one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Sinks that returned normally.
    pub delivered: usize,
    /// Sinks that panicked.
    pub failed: usize,
}

/// Shared, copy-on-write set of sinks. Clones share the same set.
#[derive(Clone)]
pub struct SinkRegistry {
    sinks: Arc<RwLock<SinkList>>,
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("len", &self.len())
            .finish()
    }
}

fn same_sink(a: &Arc<dyn SampleSink>, b: &Arc<dyn SampleSink>) -> bool {
    // Compare data pointers only; vtable pointers may differ across codegen units
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl SinkRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            sinks: Arc::new(RwLock::new(Arc::from(Vec::new()))),
        }
    }

    /// Register `sink`. Returns false if this exact handle is already present.
    pub fn add(&self, sink: Arc<dyn SampleSink>) -> bool {
        let mut guard = self.sinks.write();
        if guard.iter().any(|s| same_sink(s, &sink)) {
            return false;
        }
        let mut next = guard.to_vec();
        next.push(sink);
        *guard = next.into();
        true
    }

    /// Unregister `sink`. Returns false if it was not present.
    pub fn remove(&self, sink: &Arc<dyn SampleSink>) -> bool {
        let mut guard = self.sinks.write();
        let before = guard.len();
        let next: Vec<_> = guard
            .iter()
            .filter(|s| !same_sink(s, sink))
            .cloned()
            .collect();
        if next.len() == before {
            return false;
        }
        *guard = next.into();
        true
    }

    /// Whether `sink` is registered.
    pub fn contains(&self, sink: &Arc<dyn SampleSink>) -> bool {
        self.snapshot().iter().any(|s| same_sink(s, sink))
    }

    /// Number of registered sinks.
    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    /// True when no sink is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frozen view of the current sinks, in registration order.
    pub fn snapshot(&self) -> SinkList {
        Arc::clone(&self.sinks.read())
    }

    /// Deliver `sample` to every sink registered at call time.
    pub fn fan_out(&self, sample: SpectralSample) -> FanOutReport {
        let sample = Arc::new(sample);
        let sinks = self.snapshot();
        let mut report = FanOutReport::default();

        for (index, sink) in sinks.iter().enumerate() {
            let delivery = panic::catch_unwind(AssertUnwindSafe(|| {
                sink.accept(Arc::clone(&sample));
            }));
            match delivery {
                Ok(()) => report.delivered += 1,
                Err(payload) => {
                    report.failed += 1;
                    warn!(
                        sink = index,
                        reason = %panic_message(payload.as_ref()),
                        "Sample sink panicked; continuing with remaining sinks"
                    );
                }
            }
        }

        trace!(
            delivered = report.delivered,
            failed = report.failed,
            "Fan-out complete"
        );
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
