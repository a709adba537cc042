// Canned HTTP backend for unit tests

use super::{HttpHandler, HttpRequest, HttpResponse};
use crate::errors::Result;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use url::Url;

/// Canned response for the fake handler.
#[derive(Clone, Debug)]
pub struct CannedResponse {
    pub status: u16,
    pub body: Bytes,
    /// Final URL reported back, to simulate redirects
    pub redirect: Option<Url>,
}

impl CannedResponse {
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            status: 200,
            body: Bytes::from(value.to_string()),
            redirect: None,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: Bytes::new(),
            redirect: None,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            body: Bytes::from(body.to_string()),
            redirect: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn redirected_to(mut self, url: &str) -> Self {
        self.redirect = Url::parse(url).ok();
        self
    }
}

/// A fake handler that serves canned responses by URL substring and records requests.
#[derive(Clone, Default)]
pub struct FakeHandler {
    responses: Arc<Mutex<Vec<(String, CannedResponse)>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl FakeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a canned response for URLs containing `url_contains`.
    pub fn with_response(self, url_contains: &str, response: CannedResponse) -> Self {
        self.responses
            .lock()
            .push((url_contains.to_string(), response));
        self
    }

    /// Replace the canned response for a pattern after construction.
    pub fn set_response(&self, url_contains: &str, response: CannedResponse) {
        let mut responses = self.responses.lock();
        responses.retain(|(pattern, _)| pattern != url_contains);
        responses.push((url_contains.to_string(), response));
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests whose URL contains `url_contains`.
    pub fn count(&self, url_contains: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.as_str().contains(url_contains))
            .count()
    }

    fn find_response(&self, url: &str) -> Option<CannedResponse> {
        // Longest pattern wins so "permissions" does not shadow "permissions?claim=x"
        self.responses
            .lock()
            .iter()
            .filter(|(pattern, _)| url.contains(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, response)| response.clone())
    }
}

#[async_trait]
impl HttpHandler for FakeHandler {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        self.requests.lock().push(request);

        let response = self
            .find_response(url.as_str())
            .unwrap_or_else(|| CannedResponse::text(404, "not found"));

        Ok(HttpResponse {
            status: response.status,
            url: response.redirect.unwrap_or(url),
            body: response.body,
        })
    }
}
