//! The ordered item process chain.

use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::item::Item;
use crate::plugin::ItemProcessor;

/// Applies the configured processors to one item at a time, in order: the
/// output of processor `k` is the input of `k + 1`. `Ok(None)` from a
/// processor ends the chain cleanly; an error short-circuits it and is
/// surfaced to the caller. The in-flight counter covers the whole traversal
/// and is decremented on every exit path, so idleness checks stay accurate
/// across failing or panicking processors.
pub struct ProcessChain {
    processors: Vec<ItemProcessor>,
    processing: AtomicU64,
}

impl ProcessChain {
    pub fn new(processors: Vec<ItemProcessor>) -> Self {
        Self {
            processors,
            processing: AtomicU64::new(0),
        }
    }

    /// Sends one item through the chain.
    pub fn send(&self, item: Item) -> anyhow::Result<()> {
        let _guard = InFlight::enter(&self.processing);
        let mut current = item;
        for (index, processor) in self.processors.iter().enumerate() {
            current = match processor(current)? {
                Some(next) => next,
                None => {
                    debug!("item dropped by processor {}", index);
                    return Ok(());
                }
            };
        }
        Ok(())
    }

    /// Items currently inside the chain.
    pub fn processing_count(&self) -> u64 {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "processors: {}, processing: {}",
            self.len(),
            self.processing_count()
        )
    }
}

// Counter guard so the decrement also happens while unwinding out of a
// panicking processor.
struct InFlight<'a>(&'a AtomicU64);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicU64) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
