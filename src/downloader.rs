//! The download worker: executes one HTTP round trip per request.

use std::collections::HashMap;

use crate::error::SpiderError;
use crate::pool::PoolEntity;
use crate::request::Request;
use crate::response::Response;
use crate::util::IdGenerator;

static DOWNLOADER_IDS: IdGenerator = IdGenerator::new();

/// A pooled download worker. Stateless apart from its identity and the HTTP
/// client every downloader in the pool shares.
#[derive(Debug, Clone)]
pub struct Downloader {
    id: u64,
    client: reqwest::Client,
}

impl Downloader {
    /// The client must carry a total timeout; without one a stalled peer
    /// leaks this worker's pool slot permanently.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            id: DOWNLOADER_IDS.next_id(),
            client,
        }
    }

    /// Performs the round trip and buffers the body. The response inherits
    /// the request's depth; transport failures come back as downloader errors
    /// naming the URL.
    pub async fn download(&self, request: &Request) -> Result<Response, SpiderError> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| SpiderError::downloader(format!("{} (url={})", e, request.url())))?;

        let status = resp.status();
        let url = resp.url().clone();
        let headers: HashMap<String, String> = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = resp
            .bytes()
            .await
            .map_err(|e| SpiderError::downloader(format!("{} (url={})", e, request.url())))?
            .to_vec();

        Ok(Response::new(url, status, headers, body, request.depth()))
    }
}

impl PoolEntity for Downloader {
    fn id(&self) -> u64 {
        self.id
    }
}
