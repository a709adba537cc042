use super::{HttpHandler, HttpRequest, HttpResponse};
use crate::crypto::RequestSigner;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::Utc;

/// Signs every request before handing it to the inner transport
pub struct SigningHandler<H> {
    inner: H,
    signer: RequestSigner,
}

impl<H: HttpHandler> SigningHandler<H> {
    pub fn new(inner: H, signer: RequestSigner) -> Self {
        Self { inner, signer }
    }

    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }
}

#[async_trait]
impl<H: HttpHandler> HttpHandler for SigningHandler<H> {
    async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        self.signer.sign(&mut request, Utc::now());
        self.inner.send(request).await
    }
}
