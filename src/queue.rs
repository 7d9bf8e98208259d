//! Bounded typed queues and the registry that owns the pipeline's four lanes.
//!
//! ## Overview
//!
//! Every hand-off between pipeline stages goes through a [`SpiderQueue`]: a
//! bounded FIFO whose `put` suspends until space exists and whose `get`
//! suspends until a value arrives or the queue closes. The four lanes
//! (requests, responses, items, errors) share one generic implementation;
//! static typing at the endpoints replaces the runtime type assertions the
//! equivalent dynamically-typed design needs.
//!
//! The [`QueueRegistry`] owns all four lanes. It is born initialized (all four
//! queues are registered at construction, so a half-registered registry cannot
//! be observed) and dies closed; accessors fail once it has closed so no stage
//! can pick up a lane after shutdown began.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kanal::{AsyncReceiver, AsyncSender};

use crate::config::EngineConfig;
use crate::error::{EngineError, SpiderError};
use crate::item::Item;
use crate::request::Request;
use crate::response::Response;

/// A bounded FIFO channel with close semantics.
///
/// Handles are cheap clones sharing one queue; `close` is idempotent and wakes
/// every suspended `put` and `get`.
#[derive(Debug)]
pub struct SpiderQueue<T> {
    tx: AsyncSender<T>,
    rx: AsyncReceiver<T>,
    capacity: usize,
    closed: Arc<AtomicBool>,
}

impl<T> Clone for SpiderQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            capacity: self.capacity,
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<T> SpiderQueue<T> {
    /// Creates a queue holding at most `capacity` values.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = kanal::bounded_async(capacity);
        Self {
            tx,
            rx,
            capacity,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enqueues `value`, waiting for space. Fails once the queue is closed.
    pub async fn put(&self, value: T) -> Result<(), EngineError> {
        if self.is_closed() {
            return Err(EngineError::QueueClosed);
        }
        self.tx
            .send(value)
            .await
            .map_err(|_| EngineError::QueueClosed)
    }

    /// Enqueues `value` without waiting. `Ok(false)` means the queue was full.
    pub fn try_put(&self, value: T) -> Result<bool, EngineError> {
        if self.is_closed() {
            return Err(EngineError::QueueClosed);
        }
        self.tx.try_send(value).map_err(|_| EngineError::QueueClosed)
    }

    /// Dequeues the next value, waiting for one. `None` means the queue has
    /// closed and no further value will be observed on this handle.
    pub async fn get(&self) -> Option<T> {
        self.rx.recv().await.ok()
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cap(&self) -> usize {
        self.capacity
    }

    /// Closes the queue. Only the first call returns true.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.tx.close();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// The registry over the four pipeline lanes.
#[derive(Debug)]
pub struct QueueRegistry {
    request: SpiderQueue<Request>,
    response: SpiderQueue<Response>,
    item: SpiderQueue<Item>,
    error: SpiderQueue<SpiderError>,
    closed: AtomicBool,
}

impl QueueRegistry {
    /// Registers all four lanes at the configured capacities.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            request: SpiderQueue::new(config.request_chan_capacity),
            response: SpiderQueue::new(config.response_chan_capacity),
            item: SpiderQueue::new(config.item_chan_capacity),
            error: SpiderQueue::new(config.error_chan_capacity),
            closed: AtomicBool::new(false),
        }
    }

    fn check(&self) -> Result<(), EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::QueueUnavailable("closed"));
        }
        Ok(())
    }

    pub fn request(&self) -> Result<&SpiderQueue<Request>, EngineError> {
        self.check()?;
        Ok(&self.request)
    }

    pub fn response(&self) -> Result<&SpiderQueue<Response>, EngineError> {
        self.check()?;
        Ok(&self.response)
    }

    pub fn item(&self) -> Result<&SpiderQueue<Item>, EngineError> {
        self.check()?;
        Ok(&self.item)
    }

    pub fn error(&self) -> Result<&SpiderQueue<SpiderError>, EngineError> {
        self.check()?;
        Ok(&self.error)
    }

    pub fn is_initialized(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Closes every registered queue. Idempotent.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.request.close();
        self.response.close();
        self.item.close();
        self.error.close();
        true
    }

    pub fn status_name(&self) -> &'static str {
        if self.is_initialized() {
            "initialized"
        } else {
            "closed"
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "status: {}, requestQueue: {}/{}, responseQueue: {}/{}, itemQueue: {}/{}, errorQueue: {}/{}",
            self.status_name(),
            self.request.len(),
            self.request.cap(),
            self.response.len(),
            self.response.cap(),
            self.item.len(),
            self.item.cap(),
            self.error.len(),
            self.error.cap(),
        )
    }
}
