//! Observable snapshots of a running scheduler.

use std::fmt;
use std::sync::atomic::Ordering;

use serde::Serialize;

use super::EngineCore;

/// One snapshot of every observable scheduler counter.
///
/// Two snapshots compare equal through [`same`](SchedSummary::same) exactly
/// when all counters match; the monitor uses this to suppress duplicate log
/// lines. The prefix and the seen-URL listing are presentation, not state,
/// and are excluded from the comparison.
#[derive(Debug, Clone, Serialize)]
pub struct SchedSummary {
    #[serde(skip)]
    prefix: String,
    running: bool,
    grab_max_depth: u32,
    queues: String,
    spill: String,
    pools: String,
    process_chain: String,
    processing_count: u64,
    url_count: usize,
    #[serde(skip)]
    url_detail: String,
    error_overflow: u64,
    stop_sign: String,
}

impl SchedSummary {
    pub(crate) fn collect(core: &EngineCore, running: bool, prefix: &str) -> Self {
        let url_count = core.url_seen.len();
        let url_detail = if url_count > 0 {
            let mut detail = String::from("\n");
            for entry in core.url_seen.iter() {
                detail.push_str(prefix);
                detail.push_str(prefix);
                detail.push_str(entry.key());
                detail.push('\n');
            }
            detail
        } else {
            String::from("\n")
        };

        Self {
            prefix: prefix.to_string(),
            running,
            grab_max_depth: core.grab_max_depth,
            queues: core.queues.summary(),
            spill: core.spill.summary(),
            pools: core.pools.summary(),
            process_chain: core.chain.summary(),
            processing_count: core.chain.processing_count(),
            url_count,
            url_detail,
            error_overflow: core.error_overflow.load(Ordering::SeqCst),
            stop_sign: core.stop_sign.summary(),
        }
    }

    /// Field-by-field comparison of the observable counters.
    pub fn same(&self, other: &SchedSummary) -> bool {
        self.running == other.running
            && self.grab_max_depth == other.grab_max_depth
            && self.queues == other.queues
            && self.spill == other.spill
            && self.pools == other.pools
            && self.process_chain == other.process_chain
            && self.processing_count == other.processing_count
            && self.url_count == other.url_count
            && self.error_overflow == other.error_overflow
            && self.stop_sign == other.stop_sign
    }

    pub fn url_count(&self) -> usize {
        self.url_count
    }

    pub fn running(&self) -> bool {
        self.running
    }

    fn render(&self, detail: bool) -> String {
        let prefix = &self.prefix;
        let urls = if detail {
            self.url_detail.clone()
        } else {
            String::from("<concealed>\n")
        };
        format!(
            "{p}Running: {}\n\
             {p}Grab max depth: {}\n\
             {p}Queues: {}\n\
             {p}Request spill buffer: {}\n\
             {p}Pools: {}\n\
             {p}Process chain: {}\n\
             {p}Urls({}): {}\
             {p}Error overflow: {}\n\
             {p}Stop sign: {}\n",
            self.running,
            self.grab_max_depth,
            self.queues,
            self.spill,
            self.pools,
            self.process_chain,
            self.url_count,
            urls,
            self.error_overflow,
            self.stop_sign,
            p = prefix,
        )
    }

    /// The long form, including every seen URL.
    pub fn detail(&self) -> String {
        self.render(true)
    }
}

impl fmt::Display for SchedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}
