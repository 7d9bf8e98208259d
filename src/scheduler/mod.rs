//! The central coordinator of the crawl pipeline.
//!
//! ## Overview
//!
//! The scheduler owns every other component: the four typed queues, the two
//! worker pools, the request spill buffer, the stop sign, the process chain,
//! and the URL-seen set. `start` wires them together, launches one long-lived
//! driver task per pipeline stage plus the feeder, and seeds the crawl.
//! `stop` raises the stop sign and closes everything; drivers acknowledge and
//! exit at their next safe point.
//!
//! ## Admission control
//!
//! Requests discovered by analyzers pass through admission before they are
//! scheduled: the URL scheme must be allowed, the URL must not have been
//! scheduled before, the host must resolve to the seed's primary domain, and
//! the depth must not exceed the configured maximum. Admitted requests are
//! marked seen first and then appended to the spill buffer, so any given URL
//! is scheduled at most once even under concurrent analyzers.

mod drivers;
mod summary;

pub use summary::SchedSummary;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, ErrorKind, SpiderError};
use crate::item::Item;
use crate::plugin::{ItemProcessor, ResponseParser};
use crate::pool::PoolRegistry;
use crate::processchain::ProcessChain;
use crate::queue::{QueueRegistry, SpiderQueue};
use crate::request::Request;
use crate::spill::RequestSpillBuffer;
use crate::stopsign::StopSign;
use crate::util::primary_domain;

const RUN_STATE_INITIAL: u8 = 0;
const RUN_STATE_RUNNING: u8 = 1;
const RUN_STATE_STOPPED: u8 = 2;

/// Pipeline roles, used in module codes for stop acknowledgement and error
/// attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleRole {
    Downloader,
    Analyzer,
    ProcessChain,
    Scheduler,
}

impl ModuleRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleRole::Downloader => "DOWNLOADER",
            ModuleRole::Analyzer => "ANALYZER",
            ModuleRole::ProcessChain => "PROCESS_CHAIN",
            ModuleRole::Scheduler => "SCHEDULER",
        }
    }

    /// The error classification for failures attributed to this role.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            ModuleRole::Downloader => ErrorKind::Downloader,
            ModuleRole::Analyzer => ErrorKind::Analyzer,
            ModuleRole::ProcessChain => ErrorKind::Processor,
            ModuleRole::Scheduler => ErrorKind::Scheduler,
        }
    }

    /// Recovers the role from a module code such as `"DOWNLOADER-3"`.
    pub fn from_code(code: &str) -> Option<Self> {
        let role = code.split_once('-').map(|(role, _)| role).unwrap_or(code);
        match role {
            "DOWNLOADER" => Some(ModuleRole::Downloader),
            "ANALYZER" => Some(ModuleRole::Analyzer),
            "PROCESS_CHAIN" => Some(ModuleRole::ProcessChain),
            "SCHEDULER" => Some(ModuleRole::Scheduler),
            _ => None,
        }
    }
}

/// Builds the `"<ROLE>-<id>"` code identifying one module instance.
pub fn module_code(role: ModuleRole, id: u64) -> String {
    format!("{}-{}", role.as_str(), id)
}

/// Everything a running crawl owns. Built by `start`, shared with the driver
/// tasks, torn down by `stop`.
pub(crate) struct EngineCore {
    pub(crate) grab_max_depth: u32,
    pub(crate) allowed_schemes: Vec<String>,
    pub(crate) primary_domain: String,
    pub(crate) feed_interval: Duration,
    pub(crate) parsers: Vec<ResponseParser>,
    pub(crate) queues: QueueRegistry,
    pub(crate) pools: PoolRegistry,
    pub(crate) stop_sign: Arc<StopSign>,
    pub(crate) spill: RequestSpillBuffer,
    pub(crate) chain: ProcessChain,
    pub(crate) url_seen: DashMap<String, bool>,
    pub(crate) error_overflow: AtomicU64,
}

impl EngineCore {
    fn new(
        config: &EngineConfig,
        client: reqwest::Client,
        parsers: Vec<ResponseParser>,
        processors: Vec<ItemProcessor>,
        primary_domain: String,
        stop_sign: Arc<StopSign>,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            grab_max_depth: config.grab_max_depth,
            allowed_schemes: config
                .allowed_schemes
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
            primary_domain,
            feed_interval: config.feed_interval,
            parsers,
            queues: QueueRegistry::new(config),
            pools: PoolRegistry::new(config, client)?,
            stop_sign,
            spill: RequestSpillBuffer::new(),
            chain: ProcessChain::new(processors),
            url_seen: DashMap::new(),
            error_overflow: AtomicU64::new(0),
        })
    }

    /// Admission checks in order: scheme, duplicate, domain scope, depth.
    /// Structural validity is guaranteed by the `Request` type itself.
    fn check_request(&self, request: &Request) -> bool {
        let url = request.url();

        let scheme = url.scheme().to_ascii_lowercase();
        if !self.allowed_schemes.iter().any(|s| *s == scheme) {
            warn!("ignoring request, scheme {:?} is not allowed (url={})", scheme, url);
            return false;
        }

        if self.url_seen.contains_key(url.as_str()) {
            debug!("ignoring request, url was already scheduled (url={})", url);
            return false;
        }

        let Some(host) = url.host_str() else {
            warn!("ignoring request, url has no host (url={})", url);
            return false;
        };
        match primary_domain(host) {
            Ok(domain) if domain == self.primary_domain => {}
            Ok(domain) => {
                warn!(
                    "ignoring request, host {:?} is outside primary domain {:?} (url={})",
                    domain, self.primary_domain, url
                );
                return false;
            }
            Err(_) => {
                warn!("ignoring request, host {:?} is unparseable (url={})", host, url);
                return false;
            }
        }

        if request.depth() > self.grab_max_depth {
            warn!(
                "ignoring request, depth {} is greater than {} (url={})",
                request.depth(),
                self.grab_max_depth,
                url
            );
            return false;
        }

        true
    }

    /// Runs admission for a discovered request and, if admitted, marks its
    /// URL seen and appends it to the spill buffer. The final insert is the
    /// atomic claim: under racing analyzers only one wins the URL.
    pub(crate) fn accept_discovered_request(&self, request: Request) -> bool {
        if !self.check_request(&request) {
            return false;
        }
        if self.stop_sign.signed() {
            return false;
        }
        if self
            .url_seen
            .insert(request.url().to_string(), true)
            .is_some()
        {
            debug!(
                "ignoring request, url was claimed concurrently (url={})",
                request.url()
            );
            return false;
        }
        self.spill.put(request)
    }

    /// Forwards one item to the item queue. Drops it once stop is signed.
    pub(crate) async fn send_item(&self, item: Item) -> bool {
        if self.stop_sign.signed() {
            return false;
        }
        let Ok(queue) = self.queues.item() else {
            return false;
        };
        queue.put(item).await.is_ok()
    }

    /// Posts one error to the error queue, best effort. A full queue bumps
    /// the overflow counter instead of suspending or spawning.
    pub(crate) fn send_error(&self, message: impl Into<String>, code: &str) -> bool {
        let Some(role) = ModuleRole::from_code(code) else {
            return false;
        };
        if self.stop_sign.signed() {
            return false;
        }
        let Ok(queue) = self.queues.error() else {
            return false;
        };
        let error = SpiderError::new(role.error_kind(), message);
        match queue.try_put(error) {
            Ok(true) => true,
            Ok(false) => {
                self.error_overflow.fetch_add(1, Ordering::SeqCst);
                warn!("error queue is full, dropping an error from {}", code);
                false
            }
            Err(_) => false,
        }
    }

    pub(crate) fn idle(&self) -> bool {
        let downloaders_idle = self
            .pools
            .downloader()
            .map(|p| p.used() == 0)
            .unwrap_or(true);
        let analyzers_idle = self
            .pools
            .analyzer()
            .map(|p| p.used() == 0)
            .unwrap_or(true);
        downloaders_idle && analyzers_idle && self.chain.processing_count() == 0
    }
}

/// The crawl coordinator. See the module documentation for the lifecycle.
pub struct Scheduler {
    config: EngineConfig,
    running: AtomicU8,
    stop_sign: Arc<StopSign>,
    core: RwLock<Option<Arc<EngineCore>>>,
}

impl Scheduler {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            running: AtomicU8::new(RUN_STATE_INITIAL),
            stop_sign: Arc::new(StopSign::new()),
            core: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts the crawl. Must be called within a Tokio runtime: the driver
    /// tasks are spawned onto it.
    ///
    /// Single shot: starting an already running scheduler fails. A stopped
    /// scheduler may be started again and reuses its stop sign after a reset.
    pub fn start(
        &self,
        client: reqwest::Client,
        parsers: Vec<ResponseParser>,
        processors: Vec<ItemProcessor>,
        seed: Request,
    ) -> Result<(), EngineError> {
        self.config.validate()?;
        let host = seed
            .url()
            .host_str()
            .ok_or_else(|| EngineError::InvalidHost(seed.url().to_string()))?;
        let domain = primary_domain(host)?;

        let previous = self.running.load(Ordering::SeqCst);
        if previous == RUN_STATE_RUNNING {
            return Err(EngineError::AlreadyRunning);
        }

        self.stop_sign.reset();
        let core = Arc::new(EngineCore::new(
            &self.config,
            client,
            parsers,
            processors,
            domain,
            Arc::clone(&self.stop_sign),
        )?);

        // The CAS is the single-shot gate: a concurrent start loses here.
        if self
            .running
            .compare_exchange(previous, RUN_STATE_RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::AlreadyRunning);
        }
        *self.core.write() = Some(Arc::clone(&core));

        drivers::spawn_downloader_driver(Arc::clone(&core));
        drivers::spawn_analyzer_driver(Arc::clone(&core));
        drivers::spawn_process_driver(Arc::clone(&core));
        drivers::spawn_feeder(Arc::clone(&core));

        // The seed enters through the spill buffer like every other request,
        // so the feeder stays the request queue's only producer.
        let seed = seed.with_depth(0);
        core.url_seen.insert(seed.url().to_string(), true);
        core.spill.put(seed);
        Ok(())
    }

    /// Stops the crawl: raises the stop sign, closes the queues, the spill
    /// buffer, and the pools. Returns false unless the scheduler was running.
    pub fn stop(&self) -> bool {
        if self
            .running
            .compare_exchange(
                RUN_STATE_RUNNING,
                RUN_STATE_STOPPED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return false;
        }
        let Some(core) = self.core.read().clone() else {
            return false;
        };
        core.stop_sign.sign();
        core.queues.close();
        core.spill.close();
        core.pools.close();
        true
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst) == RUN_STATE_RUNNING
    }

    /// Whether no entity is checked out and no item is inside the process
    /// chain. False before the first start.
    pub fn idle(&self) -> bool {
        match self.core.read().as_ref() {
            Some(core) => core.idle(),
            None => false,
        }
    }

    /// Hands out the error queue for consumption.
    ///
    /// Both registries are checked first: after a stop the queue must not be
    /// handed to new readers, and before a start there is nothing to hand out.
    pub fn error_queue(&self) -> Result<SpiderQueue<SpiderError>, EngineError> {
        let core = self
            .core
            .read()
            .clone()
            .ok_or(EngineError::QueueUnavailable("uninitialized"))?;
        if !core.pools.is_initialized() {
            return Err(EngineError::PoolUnavailable("closed"));
        }
        Ok(core.queues.error()?.clone())
    }

    /// A snapshot of every observable counter. `None` before the first start.
    pub fn summary(&self, prefix: &str) -> Option<SchedSummary> {
        let core = self.core.read().clone()?;
        Some(SchedSummary::collect(&core, self.running(), prefix))
    }

    pub fn stop_sign(&self) -> &StopSign {
        &self.stop_sign
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> Option<Arc<EngineCore>> {
        self.core.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_core(config: EngineConfig, domain: &str) -> EngineCore {
        EngineCore::new(
            &config,
            reqwest::Client::new(),
            Vec::new(),
            Vec::new(),
            domain.to_string(),
            Arc::new(StopSign::new()),
        )
        .unwrap()
    }

    fn request(url: &str, depth: u32) -> Request {
        Request::get(url).unwrap().with_depth(depth)
    }

    #[test]
    fn module_codes_round_trip() {
        assert_eq!(module_code(ModuleRole::Downloader, 3), "DOWNLOADER-3");
        assert_eq!(module_code(ModuleRole::ProcessChain, 0), "PROCESS_CHAIN-0");
        assert_eq!(
            ModuleRole::from_code("ANALYZER-12"),
            Some(ModuleRole::Analyzer)
        );
        assert_eq!(ModuleRole::from_code("SCHEDULER-0"), Some(ModuleRole::Scheduler));
        assert_eq!(ModuleRole::from_code("JANITOR-1"), None);
    }

    #[test]
    fn roles_map_to_error_kinds() {
        assert_eq!(ModuleRole::Downloader.error_kind(), ErrorKind::Downloader);
        assert_eq!(ModuleRole::ProcessChain.error_kind(), ErrorKind::Processor);
    }

    #[tokio::test]
    async fn admission_accepts_in_scope_requests() {
        let core = test_core(EngineConfig::default(), "h.test");
        assert!(core.accept_discovered_request(request("http://h.test/a", 1)));
        assert_eq!(core.spill.len(), 1);
        assert!(core.url_seen.contains_key("http://h.test/a"));
    }

    #[tokio::test]
    async fn admission_drops_disallowed_schemes() {
        let core = test_core(EngineConfig::default(), "h.test");
        assert!(!core.accept_discovered_request(request("https://h.test/secure", 1)));
        assert_eq!(core.spill.len(), 0);
        assert!(!core.url_seen.contains_key("https://h.test/secure"));
    }

    #[tokio::test]
    async fn admission_scheme_set_is_configurable() {
        let mut config = EngineConfig::default();
        config.allowed_schemes = vec!["http".to_string(), "https".to_string()];
        let core = test_core(config, "h.test");
        assert!(core.accept_discovered_request(request("https://h.test/secure", 1)));
    }

    #[tokio::test]
    async fn admission_deduplicates_urls() {
        let core = test_core(EngineConfig::default(), "h.test");
        assert!(core.accept_discovered_request(request("http://h.test/x", 1)));
        assert!(!core.accept_discovered_request(request("http://h.test/x", 1)));
        assert!(core.accept_discovered_request(request("http://h.test/y", 1)));
        assert_eq!(core.spill.len(), 2);
    }

    #[tokio::test]
    async fn admission_drops_off_domain_requests() {
        let core = test_core(EngineConfig::default(), "h.test");
        assert!(!core.accept_discovered_request(request("http://other.test/page", 1)));
        // A subdomain of the primary domain is in scope.
        assert!(core.accept_discovered_request(request("http://news.h.test/page", 1)));
    }

    #[tokio::test]
    async fn admission_enforces_the_depth_limit() {
        let mut config = EngineConfig::default();
        config.grab_max_depth = 2;
        let core = test_core(config, "h.test");
        assert!(core.accept_discovered_request(request("http://h.test/d2", 2)));
        assert!(!core.accept_discovered_request(request("http://h.test/d3", 3)));
    }

    #[tokio::test]
    async fn admission_rejects_everything_after_stop_is_signed() {
        let core = test_core(EngineConfig::default(), "h.test");
        core.stop_sign.sign();
        assert!(!core.accept_discovered_request(request("http://h.test/late", 1)));
    }

    #[tokio::test]
    async fn idle_tracks_pool_checkouts_and_chain_occupancy() {
        let core = test_core(EngineConfig::default(), "h.test");
        assert!(core.idle());

        let lease = core.pools.downloader().unwrap().acquire().await.unwrap();
        assert!(!core.idle());
        drop(lease);
        assert!(core.idle());

        let lease = core.pools.analyzer().unwrap().acquire().await.unwrap();
        assert!(!core.idle());
        drop(lease);
        assert!(core.idle());
    }

    #[tokio::test]
    async fn send_error_classifies_by_module_code() {
        let core = test_core(EngineConfig::default(), "h.test");
        assert!(core.send_error("boom", "DOWNLOADER-7"));
        let error = core.queues.error().unwrap().get().await.unwrap();
        assert_eq!(error.kind(), ErrorKind::Downloader);
        assert_eq!(error.message(), "boom");
    }

    #[tokio::test]
    async fn send_error_overflows_instead_of_blocking() {
        let mut config = EngineConfig::default();
        config.error_chan_capacity = 1;
        let core = test_core(config, "h.test");
        assert!(core.send_error("first", "ANALYZER-1"));
        assert!(!core.send_error("second", "ANALYZER-1"));
        assert_eq!(core.error_overflow.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_validates_the_configuration() {
        let mut config = EngineConfig::default();
        config.downloader_pool_size = 0;
        let scheduler = Scheduler::new(config);
        let result = scheduler.start(
            reqwest::Client::new(),
            Vec::new(),
            Vec::new(),
            Request::get("http://h.test/").unwrap(),
        );
        assert!(matches!(result, Err(EngineError::Configuration(_))));
        assert!(!scheduler.running());
    }

    #[tokio::test]
    async fn start_is_single_shot_and_stop_is_once() {
        let scheduler = Scheduler::new(EngineConfig::default());
        let client = reqwest::Client::new();
        scheduler
            .start(
                client.clone(),
                Vec::new(),
                Vec::new(),
                Request::get("http://127.0.0.1:1/").unwrap(),
            )
            .unwrap();
        assert!(scheduler.running());

        let again = scheduler.start(
            client,
            Vec::new(),
            Vec::new(),
            Request::get("http://127.0.0.1:1/").unwrap(),
        );
        assert!(matches!(again, Err(EngineError::AlreadyRunning)));

        assert!(scheduler.stop());
        assert!(!scheduler.running());
        assert!(!scheduler.stop());
        assert!(scheduler.error_queue().is_err());
    }

    #[tokio::test]
    async fn start_seeds_through_the_spill_buffer() {
        let scheduler = Scheduler::new(EngineConfig::default());
        scheduler
            .start(
                reqwest::Client::new(),
                Vec::new(),
                Vec::new(),
                Request::get("http://127.0.0.1:1/seed").unwrap(),
            )
            .unwrap();
        let core = scheduler.core().unwrap();
        assert!(core.url_seen.contains_key("http://127.0.0.1:1/seed"));
        scheduler.stop();
    }

    #[tokio::test]
    async fn summary_snapshots_compare_like_for_like() {
        let scheduler = Scheduler::new(EngineConfig::default());
        assert!(scheduler.summary("  ").is_none());
        scheduler
            .start(
                reqwest::Client::new(),
                Vec::new(),
                Vec::new(),
                Request::get("http://127.0.0.1:1/").unwrap(),
            )
            .unwrap();
        let first = scheduler.summary("  ").unwrap();
        assert!(first.same(&first.clone()));
        scheduler.stop();
        // The running flag flipped, so the snapshots must no longer compare equal.
        let after_stop = scheduler.summary("  ").unwrap();
        assert!(!first.same(&after_stop));
    }
}
