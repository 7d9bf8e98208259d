//! The request descriptor that flows through the crawl pipeline.

use std::collections::HashMap;

use reqwest::Method;
use url::Url;

/// An HTTP request descriptor plus its crawl depth.
///
/// The seed request has depth 0; a request discovered while analyzing a
/// response at depth `d` carries depth `d + 1`. A `Request` is immutable once
/// built: construction always yields a parsed, non-empty URL, which discharges
/// the structural validity check that admission control would otherwise need.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HashMap<String, String>,
    body: Option<Vec<u8>>,
    depth: u32,
}

impl Request {
    /// Creates a GET request for `url` at depth 0.
    pub fn new(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HashMap::new(),
            body: None,
            depth: 0,
        }
    }

    /// Convenience constructor parsing `url` first.
    pub fn get(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?))
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_depth_is_zero() {
        let req = Request::get("http://h.test/").unwrap();
        assert_eq!(req.depth(), 0);
        assert_eq!(req.method(), &Method::GET);
    }

    #[test]
    fn depth_tagging_rebuilds_the_request() {
        let req = Request::get("http://h.test/a").unwrap().with_depth(3);
        assert_eq!(req.depth(), 3);
        assert_eq!(req.url().as_str(), "http://h.test/a");
    }
}
