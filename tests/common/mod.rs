//! Shared fakes for integration tests.
//!
//! Nothing here touches the network except [`StubServer`], which listens on
//! a loopback port and answers with scripted responses.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use hsbc_assist::{CompletionRequest, Embedding, EmbeddingError, EmbeddingProvider};
use hsbc_assist::{LlmCallError, LlmProvider};

/// Keyword embedder: one dimension per keyword group, counted in the
/// lowercased text.
pub struct KeywordEmbedder {
    pub calls: Arc<AtomicUsize>,
}

const KEYWORDS: [&[&str]; 4] = [
    &["one", "first"],
    &["two", "second"],
    &["three", "third"],
    &["paragraph"],
];

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn vector(text: &str) -> Embedding {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        KEYWORDS
            .iter()
            .map(|group| words.iter().filter(|w| group.contains(w)).count() as f32)
            .collect()
    }
}

impl EmbeddingProvider for KeywordEmbedder {
    fn dimension(&self) -> usize {
        KEYWORDS.len()
    }

    fn max_batch_size(&self) -> usize {
        2
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(inputs.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Embeds one text per call and fails on call number `fail_on` (1-based).
pub struct FailingEmbedder {
    pub fail_on: usize,
    pub calls: AtomicUsize,
}

impl FailingEmbedder {
    pub fn new(fail_on: usize) -> Self {
        Self {
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }
}

impl EmbeddingProvider for FailingEmbedder {
    fn dimension(&self) -> usize {
        KEYWORDS.len()
    }

    fn max_batch_size(&self) -> usize {
        1
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(EmbeddingError::RateLimited("quota exhausted".to_string()));
        }
        Ok(inputs.iter().map(|t| KeywordEmbedder::vector(t)).collect())
    }
}

/// LLM that records prompts and returns a fixed reply.
#[derive(Clone)]
pub struct CannedLlm {
    pub reply: String,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl CannedLlm {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl LlmProvider for CannedLlm {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmCallError> {
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// A request captured by [`StubServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// A scripted reply. `{base}` in a header value is replaced by the server URL.
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StubResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// One-connection-per-response HTTP server on 127.0.0.1.
pub struct StubServer {
    pub url: String,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

impl StubServer {
    /// Serve `responses` in order as `(status, body)` pairs, then stop.
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        Self::start_scripted(
            responses
                .into_iter()
                .map(|(status, body)| StubResponse::new(status, body))
                .collect(),
        )
    }

    /// Serve `responses` in order, then stop.
    pub fn start_scripted(responses: Vec<StubResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let base = url.clone();

        let handle = thread::spawn(move || {
            for reply in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                if let Some(request) = read_request(&mut stream) {
                    recorded.lock().unwrap().push(request);
                }
                let extra: String = reply
                    .headers
                    .iter()
                    .map(|(k, v)| format!("{k}: {}\r\n", v.replace("{base}", &base)))
                    .collect();
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{extra}Connection: close\r\n\r\n{}",
                    reply.status,
                    reason(reply.status),
                    reply.body.len(),
                    reply.body
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        Self {
            url,
            requests,
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Wait until every scripted response has been served.
    pub fn finish(mut self) -> Vec<RecordedRequest> {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
        self.requests()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        202 => "Accepted",
        401 => "Unauthorized",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

fn read_request(stream: &mut std::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n").filter(|l| !l.is_empty());
    let request_line = lines.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body_end = (header_end + content_length).min(buf.len());
    Some(RecordedRequest {
        request_line,
        headers,
        body: String::from_utf8_lossy(&buf[header_end..body_end]).to_string(),
    })
}
