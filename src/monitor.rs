//! Watches a running scheduler: reports errors, logs summary changes, and
//! stops the crawl once it has been idle long enough.
//!
//! ## Overview
//!
//! [`monitoring`] spawns three cooperating tasks around a scheduler:
//!
//! 1. an **error reporter** draining the scheduler's error queue into the
//!    caller's record callback,
//! 2. a **summary recorder** sampling the scheduler summary once a second and
//!    logging it only when something observable changed, and
//! 3. an **idleness supervisor** counting consecutive idle checks and, after
//!    the configured streak, optionally stopping the scheduler.
//!
//! All three wait for the scheduler to start before doing anything. When the
//! supervisor finishes it notifies the other two and emits its total check
//! count on the returned channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kanal::{AsyncReceiver, AsyncSender};

use crate::scheduler::Scheduler;

/// Severity passed to the record callback: 0 info, 1 warn, 2 error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordLevel {
    Info = 0,
    Warn = 1,
    Error = 2,
}

/// The leveled sink the monitor reports through.
pub type Record = Arc<dyn Fn(RecordLevel, &str) + Send + Sync>;

/// Starts monitoring `scheduler`. Returns the channel on which the final
/// idle-check count arrives once monitoring ends.
///
/// `check_interval` is clamped up to 1 ms and `max_idle_count` up to 1000 so
/// degenerate parameters cannot stop a crawl that is merely between requests.
pub fn monitoring(
    scheduler: Arc<Scheduler>,
    mut check_interval: Duration,
    mut max_idle_count: usize,
    auto_stop: bool,
    detail_summary: bool,
    record: Record,
) -> AsyncReceiver<u64> {
    if check_interval < Duration::from_millis(1) {
        check_interval = Duration::from_millis(1);
    }
    if max_idle_count < 1000 {
        max_idle_count = 1000;
    }

    let (stop_tx, stop_rx) = kanal::bounded_async::<u8>(2);
    spawn_error_reporter(Arc::clone(&scheduler), Arc::clone(&record), stop_rx.clone());
    spawn_summary_recorder(
        Arc::clone(&scheduler),
        detail_summary,
        Arc::clone(&record),
        stop_rx,
    );

    let (count_tx, count_rx) = kanal::bounded_async::<u64>(2);
    spawn_idleness_supervisor(
        scheduler,
        check_interval,
        max_idle_count,
        auto_stop,
        record,
        count_tx,
        stop_tx,
    );
    count_rx
}

async fn wait_for_running(scheduler: &Scheduler) {
    while !scheduler.running() {
        tokio::time::sleep(Duration::from_micros(1)).await;
    }
}

fn spawn_error_reporter(scheduler: Arc<Scheduler>, record: Record, stop_rx: AsyncReceiver<u8>) {
    tokio::spawn(async move {
        wait_for_running(&scheduler).await;
        let Ok(errors) = scheduler.error_queue() else {
            return;
        };
        loop {
            tokio::select! {
                _ = stop_rx.recv() => return,
                maybe = errors.get() => {
                    match maybe {
                        Some(err) => record(
                            RecordLevel::Error,
                            &format!("Error (received from error queue): {}", err),
                        ),
                        // Queue closed and drained: the crawl is over.
                        None => return,
                    }
                }
            }
        }
    });
}

fn spawn_summary_recorder(
    scheduler: Arc<Scheduler>,
    detail_summary: bool,
    record: Record,
    stop_rx: AsyncReceiver<u8>,
) {
    tokio::spawn(async move {
        wait_for_running(&scheduler).await;
        let start = Instant::now();
        let mut previous: Option<crate::scheduler::SchedSummary> = None;
        let mut record_count: u64 = 1;
        loop {
            match stop_rx.try_recv() {
                Ok(None) => {}
                _ => return,
            }
            if let Some(current) = scheduler.summary("    ") {
                let changed = previous.as_ref().map_or(true, |prev| !prev.same(&current));
                if changed {
                    let body = if detail_summary {
                        current.detail()
                    } else {
                        current.to_string()
                    };
                    record(
                        RecordLevel::Info,
                        &format!(
                            "Monitor - Collected information[{}]:\n  Scheduler:\n{}  Escaped time: {:?}\n",
                            record_count,
                            body,
                            start.elapsed(),
                        ),
                    );
                    previous = Some(current);
                    record_count += 1;
                }
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    });
}

#[allow(clippy::too_many_arguments)]
fn spawn_idleness_supervisor(
    scheduler: Arc<Scheduler>,
    check_interval: Duration,
    max_idle_count: usize,
    auto_stop: bool,
    record: Record,
    count_tx: AsyncSender<u64>,
    stop_tx: AsyncSender<u8>,
) {
    tokio::spawn(async move {
        let mut check_count: u64 = 0;
        wait_for_running(&scheduler).await;

        let mut idle_count: usize = 0;
        let mut first_idle_time = Instant::now();
        loop {
            if scheduler.idle() {
                idle_count += 1;
                if idle_count == 1 {
                    first_idle_time = Instant::now();
                }
                if idle_count >= max_idle_count {
                    record(
                        RecordLevel::Info,
                        &format!(
                            "The scheduler has been idle for a period of time (about {:?}). Now consider whether to stop it.",
                            first_idle_time.elapsed(),
                        ),
                    );
                    // Re-check once: a request may have landed meanwhile.
                    if scheduler.idle() {
                        if auto_stop {
                            let result = if scheduler.stop() { "success" } else { "failing" };
                            record(RecordLevel::Info, &format!("Stop scheduler...{}.", result));
                        }
                        break;
                    }
                    idle_count = 0;
                }
            } else {
                idle_count = 0;
            }
            check_count += 1;
            tokio::time::sleep(check_interval).await;
        }

        let _ = stop_tx.try_send(1);
        let _ = stop_tx.try_send(2);
        let _ = count_tx.send(check_count).await;
    });
}
