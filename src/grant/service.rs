use super::resource::{fetch_link, GrantResource, Link};
use super::types::{ArtifactDetails, EntrypointLinks, ServiceDetails};
use crate::errors::Result;
use crate::http::{error_from_response, HttpHandler, HttpRequest};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Entrypoint to the grant API
#[derive(Clone)]
pub struct GrantService {
    handler: Arc<dyn HttpHandler>,
    uri: Url,
}

impl GrantService {
    /// Create a service rooted at `uri`, ignoring its query and trailing slash
    pub fn new(handler: Arc<dyn HttpHandler>, mut uri: Url) -> Self {
        uri.set_query(None);
        uri.set_fragment(None);
        let trimmed = uri.path().trim_end_matches('/').to_string();
        uri.set_path(&trimmed);
        Self { handler, uri }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn handler(&self) -> Arc<dyn HttpHandler> {
        self.handler.clone()
    }

    /// Discover the root resource and its links
    pub async fn get(&self) -> Result<GrantResource> {
        let response = self
            .handler
            .send(HttpRequest::get_json(self.uri.clone()))
            .await?;

        let origin = resource_origin(&response.url);
        debug!(origin = %origin, status = response.status, "Grant entrypoint resolved");

        if response.status == 204 {
            return Ok(GrantResource::new(self.handler.clone(), Some(origin), None));
        }
        if !response.is_success() {
            return Err(error_from_response(&response));
        }

        let body: EntrypointLinks = if response.body.is_empty() {
            EntrypointLinks::default()
        } else {
            serde_json::from_slice(&response.body)?
        };
        Ok(GrantResource::new(self.handler.clone(), Some(origin), body.links))
    }

    /// Open an artifact directly by its claim group
    pub async fn to_artifact(&self, claim_group: &str) -> Result<Link<ArtifactDetails>> {
        let url = self.deep_link(&["artifact", claim_group])?;
        fetch_link(&self.handler, url, Some(resource_origin(&self.uri)), "artifact").await
    }

    /// Open a service directly by its claim and resource groups
    pub async fn to_service(&self, claim_group: &str, resource_group: &str) -> Result<Link<ServiceDetails>> {
        let url = self.deep_link(&["service", claim_group, resource_group])?;
        fetch_link(&self.handler, url, Some(resource_origin(&self.uri)), "service").await
    }

    fn deep_link(&self, segments: &[&str]) -> Result<Url> {
        let path = segments
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Ok(Url::parse(&format!("{}/{}", self.uri.as_str().trim_end_matches('/'), path))?)
    }
}

/// Directory form of the URL the entrypoint was served from
fn resource_origin(served: &Url) -> Url {
    let mut origin = served.clone();
    origin.set_fragment(None);
    if !served.as_str().ends_with('/') {
        origin.set_query(None);
        let path = format!("{}/", origin.path());
        origin.set_path(&path);
    } else if origin.query().is_some() {
        origin.set_query(None);
    }
    origin
}
