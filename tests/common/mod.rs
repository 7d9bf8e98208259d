//! Shared fixtures for the pipeline tests: a minimal in-process HTTP site and
//! the parser/processor closures the tests drive the engine with.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use spider_engine::{Item, ItemProcessor, ParseOutput, Request, Response, ResponseParser};

/// A tiny HTTP/1.1 site serving fixed plain-text pages and recording every
/// path it was asked for.
pub struct TestSite {
    addr: SocketAddr,
    hits: Arc<Mutex<Vec<String>>>,
}

impl TestSite {
    /// Binds an ephemeral port and serves `pages` (path to body) until the
    /// test process ends. The literal `{base}` inside a body is replaced with
    /// the site's own base URL, so pages can link to each other without
    /// knowing the port in advance.
    pub async fn serve(pages: HashMap<String, String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base = format!("http://127.0.0.1:{}", addr.port());
        let pages: HashMap<String, String> = pages
            .into_iter()
            .map(|(path, body)| (path, body.replace("{base}", &base)))
            .collect();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let pages = Arc::new(pages);

        let accept_hits = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let pages = Arc::clone(&pages);
                let hits = Arc::clone(&accept_hits);
                tokio::spawn(async move {
                    let (read_half, mut write_half) = stream.split();
                    let mut reader = BufReader::new(read_half);

                    let mut request_line = String::new();
                    if reader.read_line(&mut request_line).await.is_err() {
                        return;
                    }
                    loop {
                        let mut line = String::new();
                        match reader.read_line(&mut line).await {
                            Ok(0) => break,
                            Ok(_) if line == "\r\n" || line == "\n" => break,
                            Ok(_) => {}
                            Err(_) => return,
                        }
                    }

                    let path = request_line
                        .split_whitespace()
                        .nth(1)
                        .unwrap_or("/")
                        .to_string();
                    hits.lock().unwrap().push(path.clone());

                    let response = match pages.get(&path) {
                        Some(body) => format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        ),
                        None => String::from(
                            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        ),
                    };
                    let _ = write_half.write_all(response.as_bytes()).await;
                    let _ = write_half.shutdown().await;
                });
            }
        });

        Self { addr, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.addr.port(), path)
    }

    pub fn seed(&self, path: &str) -> Request {
        Request::get(&self.url(path)).unwrap()
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hit_count(&self, path: &str) -> usize {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }
}

/// A parser that emits one item per page (url plus depth) and follows every
/// line of the body that looks like an absolute URL.
pub fn link_parser() -> ResponseParser {
    Arc::new(|response: &Response| {
        let mut output = ParseOutput::new();

        let mut item = Item::new();
        item.insert("url", response.url().as_str());
        item.insert("depth", response.depth());
        output.add_item(item);

        for line in response.text().lines() {
            let line = line.trim();
            if line.starts_with("http://") || line.starts_with("https://") {
                match Request::get(line) {
                    Ok(request) => output.add_request(request),
                    Err(err) => output.add_error(err.into()),
                }
            }
        }
        output
    })
}

/// A processor that appends every item it sees to `sink` and passes it on.
pub fn collecting_processor(sink: Arc<Mutex<Vec<Item>>>) -> ItemProcessor {
    Arc::new(move |item: Item| {
        sink.lock().unwrap().push(item.clone());
        Ok(Some(item))
    })
}
