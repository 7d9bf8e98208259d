//! The analyze worker: applies the user's parsers to one response.

use crate::item::ParseOutput;
use crate::plugin::ResponseParser;
use crate::pool::PoolEntity;
use crate::response::Response;
use crate::util::IdGenerator;

static ANALYZER_IDS: IdGenerator = IdGenerator::new();

/// A pooled analyze worker. Stateless apart from its identity; the parser
/// list is handed in per call so the pool holds nothing user-specific.
#[derive(Debug, Clone)]
pub struct Analyzer {
    id: u64,
}

impl Analyzer {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            id: ANALYZER_IDS.next_id(),
        }
    }

    /// Runs every parser in order and concatenates their outputs, also in
    /// order. Panic recovery is the driving task's job, not this worker's.
    pub fn analyze(&self, parsers: &[ResponseParser], response: &Response) -> ParseOutput {
        let mut output = ParseOutput::new();
        for parser in parsers {
            output.extend(parser(response));
        }
        output
    }
}

impl PoolEntity for Analyzer {
    fn id(&self) -> u64 {
        self.id
    }
}
