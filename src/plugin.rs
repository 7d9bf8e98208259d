//! The user-facing plugin contract.
//!
//! A plugin supplies the three pieces of user logic the engine treats as
//! opaque: an HTTP client factory, an ordered list of response parsers, and an
//! ordered list of item processors. The engine invokes parsers and processors
//! as plain functions and never inspects what they do.

use std::sync::Arc;

use crate::item::{Item, ParseOutput};
use crate::response::Response;

/// Parses one response into items, follow-up requests, and errors.
///
/// Parsers run inside a pooled analyzer; a panicking parser is recovered by
/// the driving task and surfaced as a single analyzer error.
pub type ResponseParser = Arc<dyn Fn(&Response) -> ParseOutput + Send + Sync>;

/// One stage of the item process chain.
///
/// Returning `Ok(Some(item))` passes the (possibly rewritten) item to the next
/// processor, `Ok(None)` ends the chain cleanly, and `Err` short-circuits it.
pub type ItemProcessor = Arc<dyn Fn(Item) -> anyhow::Result<Option<Item>> + Send + Sync>;

/// A crawl plugin: the bundle of user logic selected by the configuration's
/// `plugin_key`.
pub trait SpiderPlugin: Send + Sync {
    /// Builds the HTTP client the downloader pool shares.
    ///
    /// The client must carry a total request timeout; without one a slow peer
    /// holds its downloader slot forever.
    fn http_client(&self) -> reqwest::Client;

    /// The ordered parser list applied to every response.
    fn response_parsers(&self) -> Vec<ResponseParser>;

    /// The ordered processor list every item is sent through.
    fn item_processors(&self) -> Vec<ItemProcessor>;
}
