//! # spider-engine
//!
//! Core orchestration engine of a pluggable web crawler: a four-stage
//! concurrent pipeline (download, analyze, process, collect) driven by a
//! central [`Scheduler`] and watched by a [`monitor`].
//!
//! The engine owns the plumbing. User logic arrives through the
//! [`SpiderPlugin`] seam as an HTTP client, a list of response parsers, and a
//! list of item processors; the engine runs them inside bounded worker pools,
//! regulates flow with bounded typed queues and an unbounded request spill
//! buffer, enforces scope, depth, and duplicate admission on every discovered
//! request, and coordinates a cooperative shutdown in which every module
//! acknowledges the stop sign.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use spider_engine::{monitoring, EngineConfig, Request, Scheduler};
//!
//! async fn crawl(plugin: Arc<dyn spider_engine::SpiderPlugin>) -> anyhow::Result<()> {
//!     let config = EngineConfig::default();
//!     let scheduler = Arc::new(Scheduler::new(config.clone()));
//!     scheduler.start(
//!         plugin.http_client(),
//!         plugin.response_parsers(),
//!         plugin.item_processors(),
//!         Request::get("http://example.com/")?,
//!     )?;
//!
//!     let record = Arc::new(|level, message: &str| eprintln!("[{:?}] {}", level, message));
//!     let check_count = monitoring(
//!         Arc::clone(&scheduler),
//!         config.check_interval,
//!         config.max_idle_count,
//!         true,
//!         false,
//!         record,
//!     );
//!     let checks = check_count.recv().await?;
//!     eprintln!("monitor performed {} idle checks", checks);
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod config;
pub mod downloader;
pub mod error;
pub mod item;
pub mod monitor;
pub mod plugin;
pub mod pool;
pub mod processchain;
pub mod queue;
pub mod request;
pub mod response;
pub mod scheduler;
pub mod spill;
pub mod stopsign;
pub mod util;

pub use analyzer::Analyzer;
pub use config::EngineConfig;
pub use downloader::Downloader;
pub use error::{EngineError, ErrorKind, SpiderError};
pub use item::{Item, ParseOutput};
pub use monitor::{monitoring, Record, RecordLevel};
pub use plugin::{ItemProcessor, ResponseParser, SpiderPlugin};
pub use pool::{EntityPool, PoolEntity, PoolLease, PoolRegistry};
pub use processchain::ProcessChain;
pub use queue::{QueueRegistry, SpiderQueue};
pub use request::Request;
pub use response::Response;
pub use scheduler::{module_code, ModuleRole, SchedSummary, Scheduler};
pub use spill::RequestSpillBuffer;
pub use stopsign::StopSign;
pub use util::{primary_domain, IdGenerator};
