// HTTP seam for the grant API
//
// Every call goes through `HttpHandler`: the signing reqwest stack in
// production, a canned backend in tests.

mod signing;
mod transport;

#[cfg(test)]
pub mod testing;

pub use signing::SigningHandler;
pub use transport::ReqwestHandler;

use crate::errors::{PecanError, Result};
use crate::grant::types::ServiceError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

/// An outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a JSON GET
    pub fn get_json(url: Url) -> Self {
        Self::new(Method::GET, url).with_header("accept", "application/json")
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Replace any header with the same (case-insensitive) name
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Path and query as sent on the request line
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

/// A fully buffered response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL after redirects
    pub url: Url,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport abstraction for the grant API
#[async_trait]
pub trait HttpHandler: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Fetch JSON from a URL; `None` when the server answers with an empty body.
pub async fn get_json<T: DeserializeOwned>(handler: &dyn HttpHandler, url: Url) -> Result<Option<T>> {
    let response = handler.send(HttpRequest::get_json(url)).await?;
    decode_response(response)
}

/// POST a JSON payload and decode the JSON answer.
pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
    handler: &dyn HttpHandler,
    url: Url,
    payload: &B,
) -> Result<Option<T>> {
    let mut request = HttpRequest::new(Method::POST, url)
        .with_header("accept", "application/json")
        .with_header("content-type", "application/json; charset=utf-8");
    request.body = Some(Bytes::from(serde_json::to_vec(payload)?));

    let response = handler.send(request).await?;
    decode_response(response)
}

pub(crate) fn decode_response<T: DeserializeOwned>(response: HttpResponse) -> Result<Option<T>> {
    if !response.is_success() {
        return Err(error_from_response(&response));
    }
    if response.body.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&response.body)?))
}

/// Map a failed response onto a service error, keeping the server's error body when it has one
pub(crate) fn error_from_response(response: &HttpResponse) -> PecanError {
    tracing::warn!(status = response.status, url = %response.url, "Grant API request failed");

    match serde_json::from_slice::<ServiceError>(&response.body) {
        Ok(error) => PecanError::Service {
            status: response.status,
            error,
        },
        Err(_) => PecanError::unexpected(
            response.status,
            "An unexpected response was received from the server",
            String::from_utf8_lossy(&response.body),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{CannedResponse, FakeHandler};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let url = Url::parse("https://example.com/grant/").unwrap();
        let request = HttpRequest::get_json(url).with_header("Accept", "text/plain");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("ACCEPT"), Some("text/plain"));
    }

    #[test]
    fn test_path_and_query() {
        let url = Url::parse("https://example.com/grant/manifest?artifact=a&version=2").unwrap();
        let request = HttpRequest::new(Method::GET, url);
        assert_eq!(request.path_and_query(), "/grant/manifest?artifact=a&version=2");
    }

    #[tokio::test]
    async fn test_get_json_decodes_body() {
        let handler = FakeHandler::new().with_response("thing", CannedResponse::json(json!({"a": 1})));
        let url = Url::parse("https://example.com/thing").unwrap();

        let value: Option<serde_json::Value> = get_json(&handler, url).await.unwrap();
        assert_eq!(value.unwrap()["a"], 1);
        assert_eq!(handler.requests()[0].header("accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_get_json_empty_body_is_none() {
        let handler = FakeHandler::new().with_response("empty", CannedResponse::empty(200));
        let url = Url::parse("https://example.com/empty").unwrap();

        let value: Option<serde_json::Value> = get_json(&handler, url).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_service_error_body_is_kept() {
        let handler = FakeHandler::new().with_response(
            "denied",
            CannedResponse::json(json!({
                "code": "security.1001",
                "title": "Access denied",
                "detail": "Signature mismatch",
                "errors": []
            }))
            .with_status(403),
        );
        let url = Url::parse("https://example.com/denied").unwrap();

        let result: Result<Option<serde_json::Value>> = get_json(&handler, url).await;
        match result {
            Err(PecanError::Service { status, error }) => {
                assert_eq!(status, 403);
                assert_eq!(error.code, "security.1001");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unstructured_error_falls_back() {
        let handler = FakeHandler::new().with_response(
            "broken",
            CannedResponse::text(500, "upstream exploded"),
        );
        let url = Url::parse("https://example.com/broken").unwrap();

        let result: Result<Option<serde_json::Value>> = get_json(&handler, url).await;
        match result {
            Err(PecanError::Service { status, error }) => {
                assert_eq!(status, 500);
                assert_eq!(error.code, "evaluation.3000");
                assert_eq!(error.detail, "upstream exploded");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_post_json_sends_body() {
        let handler = FakeHandler::new().with_response("echo", CannedResponse::json(json!({"ok": true})));
        let url = Url::parse("https://example.com/echo").unwrap();

        let _: Option<serde_json::Value> = post_json(&handler, url, &json!({"account_id": "x"}))
            .await
            .unwrap();

        let sent = &handler.requests()[0];
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.body.as_deref(), Some(br#"{"account_id":"x"}"#.as_slice()));
        assert_eq!(sent.header("content-type"), Some("application/json; charset=utf-8"));
    }
}
