use super::{HttpHandler, HttpRequest, HttpResponse};
use crate::config::ClientConfig;
use crate::errors::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Production transport over a shared reqwest client
#[derive(Clone)]
pub struct ReqwestHandler {
    client: reqwest::Client,
}

impl ReqwestHandler {
    /// Create a transport with the configured timeout and user agent
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::build(config.timeout(), &config.user_agent)
    }

    pub fn build(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpHandler for ReqwestHandler {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(url = %request.url, error = %e, "Grant API transport failure");
            e
        })?;

        let status = response.status().as_u16();
        let url = response.url().clone();
        let body = response.bytes().await?;

        tracing::debug!(
            method = %request.method,
            url = %url,
            status = status,
            "Grant API response"
        );

        Ok(HttpResponse { status, url, body })
    }
}
