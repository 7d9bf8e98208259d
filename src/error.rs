//! Error types for the crawl engine.
//!
//! Two families exist and must not be conflated:
//!
//! - [`SpiderError`] is the non-fatal, queue-borne error record. Every failure
//!   that happens after a successful start (a transport error, a panicking
//!   parser, a processor rejection) is captured by the nearest driver,
//!   classified by [`ErrorKind`], and posted to the error queue for the user
//!   to consume.
//! - [`EngineError`] is the fatal family: start-up validation failures and
//!   lifecycle misuse. Once `start` has returned successfully, no engine
//!   operation produces an `EngineError` that terminates the crawl.

use std::fmt;

use thiserror::Error;

/// Classifies a [`SpiderError`] by the pipeline stage that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// HTTP transport failure while downloading.
    Downloader,
    /// A user parser returned an error or panicked.
    Analyzer,
    /// An item processor returned an error or panicked.
    Processor,
    /// Internal failure surfaced at runtime (pool exhaustion, registry lookup).
    Scheduler,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Downloader => "Downloader Error",
            ErrorKind::Analyzer => "Analyzer Error",
            ErrorKind::Processor => "Processor Error",
            ErrorKind::Scheduler => "Scheduler Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal error record routed through the error queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiderError {
    kind: ErrorKind,
    message: String,
}

impl SpiderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn downloader(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Downloader, message)
    }

    pub fn analyzer(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Analyzer, message)
    }

    pub fn processor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Processor, message)
    }

    pub fn scheduler(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Scheduler, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SpiderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Spider Error: {}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SpiderError {}

/// Fatal engine errors: start-up validation and lifecycle misuse.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("cannot extract a primary domain from host {0:?}")]
    InvalidHost(String),

    #[error("the scheduler has already been started")]
    AlreadyRunning,

    #[error("queue registry is {0}, queues are unavailable")]
    QueueUnavailable(&'static str),

    #[error("pool registry is {0}, pools are unavailable")]
    PoolUnavailable(&'static str),

    #[error("queue is closed")]
    QueueClosed,

    #[error("entity pool is closed")]
    PoolClosed,
}
