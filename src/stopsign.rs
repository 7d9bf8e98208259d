//! One-shot stop broadcast with per-module acknowledgement counting.
//!
//! One party signs the sign; every cooperating module observes it at its next
//! safe point, acknowledges with its module code, and exits. The per-code
//! counters make shutdown traceable: `summary` shows exactly which modules
//! have reacted.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

/// The stop broadcast. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct StopSign {
    signed: AtomicBool,
    // BTreeMap keeps the summary deterministic across runs.
    deal_counts: RwLock<BTreeMap<String, u32>>,
}

impl StopSign {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Only the first call returns true.
    pub fn sign(&self) -> bool {
        !self.signed.swap(true, Ordering::SeqCst)
    }

    /// Whether the signal has been raised. Lock-free.
    pub fn signed(&self) -> bool {
        self.signed.load(Ordering::SeqCst)
    }

    /// Clears the signal and all acknowledgement records.
    ///
    /// Only legal while no driver is observing the sign, i.e. between runs.
    pub fn reset(&self) {
        let mut counts = self.deal_counts.write();
        self.signed.store(false, Ordering::SeqCst);
        counts.clear();
    }

    /// Records that the module identified by `code` has handled the signal.
    /// A no-op while the sign is not raised.
    pub fn deal(&self, code: &str) {
        if !self.signed() {
            return;
        }
        *self.deal_counts.write().entry(code.to_string()).or_insert(0) += 1;
    }

    pub fn deal_count(&self, code: &str) -> u32 {
        self.deal_counts.read().get(code).copied().unwrap_or(0)
    }

    pub fn deal_total(&self) -> u32 {
        self.deal_counts.read().values().sum()
    }

    pub fn summary(&self) -> String {
        if !self.signed() {
            return "Signed: false".to_string();
        }
        let counts = self.deal_counts.read();
        let entries: Vec<String> = counts.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        format!("signed: true, dealCount: {{{}}}", entries.join(", "))
    }
}
