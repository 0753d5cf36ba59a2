//! Scripted transports for exercising `HttpClient` without a network.

use qakit::http::{HttpError, HttpRequest, HttpResponse, LoadTestExtras, LoadTestSession, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub fn response(status: u16, url: &str, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        url: url.to_string(),
        headers: vec![("content-type".into(), "application/json".into())],
        body: body.as_bytes().to_vec(),
    }
}

/// Answers with queued responses, in order, and records every request.
/// When the queue runs dry it answers `200 {}`.
#[derive(Clone, Default)]
pub struct FakeTransport {
    pub sent: Arc<Mutex<Vec<HttpRequest>>>,
    replies: Arc<Mutex<VecDeque<(u16, String)>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: &str) -> Self {
        self.replies.lock().unwrap().push_back((status, body.to_string()));
        self
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        self.sent.lock().unwrap().push(request.clone());
        let (status, body) = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((200, "{}".to_string()));
        Ok(response(status, &request.url, &body))
    }
}

/// A transport that always fails to reach the server.
pub struct Unreachable;

impl Transport for Unreachable {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        Err(HttpError::Transport(format!("connection refused: {}", request.url)))
    }
}

/// Records what a load-testing harness would have been asked to do.
#[derive(Clone, Default)]
pub struct FakeLoadTest {
    pub calls: Arc<Mutex<Vec<(String, LoadTestExtras)>>>,
}

impl FakeLoadTest {
    pub fn calls(&self) -> Vec<(String, LoadTestExtras)> {
        self.calls.lock().unwrap().clone()
    }
}

impl LoadTestSession for FakeLoadTest {
    fn request(&self, request: &HttpRequest, extras: &LoadTestExtras) -> Result<HttpResponse, HttpError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.url.clone(), extras.clone()));
        Ok(response(200, &request.url, "not json"))
    }
}
