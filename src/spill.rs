//! The unbounded buffer in front of the bounded request queue.
//!
//! Analyzers may discover an unbounded number of follow-up requests per
//! response. Letting them block on a full request queue stalls the analyze
//! stage, which stalls the download stage behind it, and the pipeline
//! deadlocks. Discovered requests therefore land here, and the scheduler's
//! feeder moves them into the request queue as capacity frees up.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::SegQueue;

use crate::request::Request;

#[derive(Debug, Default)]
pub struct RequestSpillBuffer {
    inner: SegQueue<Request>,
    closed: AtomicBool,
}

impl RequestSpillBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request. Never blocks; returns false once closed.
    pub fn put(&self, request: Request) -> bool {
        if self.is_closed() {
            return false;
        }
        self.inner.push(request);
        true
    }

    /// Pops the oldest request, or `None` if the buffer is empty.
    pub fn get(&self) -> Option<Request> {
        self.inner.pop()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Only the first call returns true.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn summary(&self) -> String {
        let status = if self.is_closed() { "closed" } else { "open" };
        format!("status: {}, length: {}", status, self.len())
    }
}
