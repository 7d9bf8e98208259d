//! The long-lived driver tasks, one per pipeline stage, plus the feeder.
//!
//! Each driver loops over its stage's queue and spawns one child task per
//! unit of work; the child acquires a pool entity where the stage has one, so
//! stage concurrency is bounded by pool capacity while the driver itself stays
//! unblocked. Every child is panic-guarded: user code failing never takes the
//! engine down. On observing the stop sign or a closed, drained queue, a
//! driver acknowledges via the stop sign and exits.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, trace, warn};

use super::{module_code, EngineCore, ModuleRole};
use crate::queue::SpiderQueue;
use crate::request::Request;
use crate::response::Response;
use crate::util::panic_message;

pub(super) fn spawn_downloader_driver(core: Arc<EngineCore>) {
    tokio::spawn(async move {
        let (request_queue, response_queue) = match (core.queues.request(), core.queues.response())
        {
            (Ok(req), Ok(resp)) => (req.clone(), resp.clone()),
            _ => return,
        };
        loop {
            if core.stop_sign.signed() {
                break;
            }
            let Some(request) = request_queue.get().await else {
                break;
            };
            let core = Arc::clone(&core);
            let response_queue = response_queue.clone();
            tokio::spawn(async move {
                let task = download_one(&core, request, response_queue);
                if let Err(payload) = AssertUnwindSafe(task).catch_unwind().await {
                    warn!("download task panicked: {}", panic_message(payload));
                }
            });
        }
        core.stop_sign.deal(&module_code(ModuleRole::Downloader, 0));
        trace!("downloader driver exited");
    });
}

async fn download_one(core: &EngineCore, request: Request, response_queue: SpiderQueue<Response>) {
    let scheduler_code = module_code(ModuleRole::Scheduler, 0);
    let pool = match core.pools.downloader() {
        Ok(pool) => pool,
        Err(e) => {
            core.send_error(format!("downloader pool unavailable: {}", e), &scheduler_code);
            return;
        }
    };
    let lease = match pool.acquire().await {
        Ok(lease) => lease,
        Err(e) => {
            core.send_error(format!("downloader pool error: {}", e), &scheduler_code);
            return;
        }
    };
    let code = module_code(ModuleRole::Downloader, lease.id());

    // The lease is held across the queue hand-off: a full response queue must
    // hold downloads back, not let children pile up behind it.
    match lease.download(&request).await {
        Ok(response) => {
            if core.stop_sign.signed() {
                return;
            }
            if response_queue.put(response).await.is_err() {
                debug!("response queue closed, discarding response for {}", request.url());
            }
        }
        Err(err) => {
            core.send_error(err.message().to_string(), &code);
        }
    }
}

pub(super) fn spawn_analyzer_driver(core: Arc<EngineCore>) {
    tokio::spawn(async move {
        let response_queue = match core.queues.response() {
            Ok(queue) => queue.clone(),
            Err(_) => return,
        };
        loop {
            if core.stop_sign.signed() {
                break;
            }
            let Some(response) = response_queue.get().await else {
                break;
            };
            let core = Arc::clone(&core);
            tokio::spawn(async move {
                let task = analyze_one(&core, response);
                if let Err(payload) = AssertUnwindSafe(task).catch_unwind().await {
                    warn!("analysis task panicked: {}", panic_message(payload));
                }
            });
        }
        core.stop_sign.deal(&module_code(ModuleRole::Analyzer, 0));
        trace!("analyzer driver exited");
    });
}

async fn analyze_one(core: &EngineCore, response: Response) {
    let scheduler_code = module_code(ModuleRole::Scheduler, 0);
    let pool = match core.pools.analyzer() {
        Ok(pool) => pool,
        Err(e) => {
            core.send_error(format!("analyzer pool unavailable: {}", e), &scheduler_code);
            return;
        }
    };
    let lease = match pool.acquire().await {
        Ok(lease) => lease,
        Err(e) => {
            core.send_error(format!("analyzer pool error: {}", e), &scheduler_code);
            return;
        }
    };
    let code = module_code(ModuleRole::Analyzer, lease.id());
    let depth = response.depth();

    // User parsers run here; a panic in any of them becomes a single
    // analyzer error and the entity still returns to its pool.
    let output = match catch_unwind(AssertUnwindSafe(|| lease.analyze(&core.parsers, &response))) {
        Ok(output) => output,
        Err(payload) => {
            let message = format!("parser panicked: {}", panic_message(payload));
            warn!("{}", message);
            core.send_error(message, &code);
            return;
        }
    };

    let (items, requests, errors) = output.into_parts();
    for item in items {
        if !core.send_item(item).await {
            break;
        }
    }
    for request in requests {
        let request = request.with_depth(depth.saturating_add(1));
        core.accept_discovered_request(request);
    }
    for error in errors {
        core.send_error(error.to_string(), &code);
    }
}

pub(super) fn spawn_process_driver(core: Arc<EngineCore>) {
    tokio::spawn(async move {
        let item_queue = match core.queues.item() {
            Ok(queue) => queue.clone(),
            Err(_) => return,
        };
        loop {
            if core.stop_sign.signed() {
                break;
            }
            let Some(item) = item_queue.get().await else {
                break;
            };
            let core = Arc::clone(&core);
            tokio::spawn(async move {
                let code = module_code(ModuleRole::ProcessChain, 0);
                match catch_unwind(AssertUnwindSafe(|| core.chain.send(item))) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        core.send_error(err.to_string(), &code);
                    }
                    Err(payload) => {
                        let message = format!("processor panicked: {}", panic_message(payload));
                        warn!("{}", message);
                        core.send_error(message, &code);
                    }
                }
            });
        }
        core.stop_sign.deal(&module_code(ModuleRole::ProcessChain, 0));
        trace!("process chain driver exited");
    });
}

/// Moves spilled requests into the bounded request queue, once per tick, never
/// injecting more than the queue's free space. This is the request queue's
/// only producer.
pub(super) fn spawn_feeder(core: Arc<EngineCore>) {
    tokio::spawn(async move {
        let request_queue = match core.queues.request() {
            Ok(queue) => queue.clone(),
            Err(_) => return,
        };
        let interval = core.feed_interval;
        'feed: loop {
            if core.stop_sign.signed() {
                break;
            }
            let mut remainder = request_queue.cap().saturating_sub(request_queue.len());
            while remainder > 0 {
                if core.stop_sign.signed() {
                    break 'feed;
                }
                let Some(request) = core.spill.get() else {
                    break;
                };
                if request_queue.put(request).await.is_err() {
                    break 'feed;
                }
                remainder -= 1;
            }
            tokio::time::sleep(interval).await;
        }
        core.stop_sign.deal(&module_code(ModuleRole::Scheduler, 0));
        trace!("feeder exited");
    });
}
