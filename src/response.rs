//! The response record handed from the download stage to the analyze stage.

use std::borrow::Cow;
use std::collections::HashMap;

use reqwest::StatusCode;
use url::Url;

/// An HTTP response body plus the depth inherited from its [`Request`].
///
/// The body is fully buffered by the downloader; ownership of the bytes moves
/// to the analyzer and from there to the user parsers. An empty body is a
/// legal response and must produce no items and no requests downstream.
///
/// [`Request`]: crate::request::Request
#[derive(Debug, Clone)]
pub struct Response {
    url: Url,
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    depth: u32,
}

impl Response {
    pub fn new(
        url: Url,
        status: StatusCode,
        headers: HashMap<String, String>,
        body: Vec<u8>,
        depth: u32,
    ) -> Self {
        Self {
            url,
            status,
            headers,
            body,
            depth,
        }
    }

    /// The URL the response originated from, after any redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body decoded as UTF-8, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}
