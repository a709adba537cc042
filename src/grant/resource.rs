// Hypermedia navigation over the grant API links

use super::results::ResultSet;
use super::types::{
    AccountAssertion, AppManifest, ArtifactDetails, Links, RefreshProfile, ResultPage,
    ServiceDetails, ServicePermission, UserProfile,
};
use crate::errors::{PecanError, Result};
use crate::http::{get_json, post_json, HttpHandler};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Key under which the resource origin is persisted alongside its links
const ORIGIN_LINK: &str = "grant";

pub const MANIFEST: &str = "manifest";
pub const REFRESH_PROFILE: &str = "refresh_profile";
pub const PERMISSIONS: &str = "permissions";
pub const LOOKUP_ACCOUNT: &str = "lookup_account";

// Administration links
pub const ARTIFACT: &str = "artifact";
pub const SERVICE: &str = "service";
pub const ROLE: &str = "role";
pub const CLAIM: &str = "claim";
pub const PROVIDER: &str = "provider";
pub const ACCOUNT: &str = "account";
pub const POLICY: &str = "policy";
pub const ASSERTION: &str = "assertion";
pub const ORGANIZATION: &str = "organization";

/// A payload reached by following a link, and the resource its own links open
#[derive(Debug, Clone)]
pub struct Link<T> {
    pub data: T,
    pub resource: GrantResource,
}

#[derive(Deserialize)]
struct Linked<T> {
    #[serde(flatten)]
    data: T,
    #[serde(rename = "@links", default)]
    links: Option<Links>,
}

/// The root resource of the grant API, as discovered from the entrypoint
#[derive(Clone)]
pub struct GrantResource {
    handler: Arc<dyn HttpHandler>,
    origin: Option<Url>,
    links: Option<Links>,
}

impl std::fmt::Debug for GrantResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantResource")
            .field("origin", &self.origin)
            .field("links", &self.links)
            .finish_non_exhaustive()
    }
}

impl GrantResource {
    pub fn new(handler: Arc<dyn HttpHandler>, origin: Option<Url>, links: Option<Links>) -> Self {
        Self {
            handler,
            origin,
            links,
        }
    }

    /// Rebuild a resource from persisted links
    pub fn try_load(handler: Arc<dyn HttpHandler>, links: &Links) -> Option<Self> {
        let origin = links.get(ORIGIN_LINK)?.clone();
        Some(Self::new(handler, Some(origin), Some(links.clone())))
    }

    /// Links to persist, including the origin; `None` without an origin
    pub fn try_save(&self) -> Option<Links> {
        let origin = self.origin.clone()?;
        let mut links = self.links.clone().unwrap_or_default();
        links.insert(ORIGIN_LINK.to_string(), origin);
        Some(links)
    }

    pub fn origin(&self) -> Option<&Url> {
        self.origin.as_ref()
    }

    /// A link that is present and lives under this resource's origin
    pub fn link(&self, name: &str) -> Option<&Url> {
        let origin = self.origin.as_ref()?;
        self.links
            .as_ref()?
            .get(name)
            .filter(|uri| is_base_of(origin, uri))
    }

    pub fn has_link(&self, name: &str) -> bool {
        self.link(name).is_some()
    }

    fn require(&self, name: &str) -> Result<Url> {
        self.link(name)
            .cloned()
            .ok_or_else(|| PecanError::MissingLink(name.to_string()))
    }

    pub fn has_manifest(&self) -> bool {
        self.has_link(MANIFEST)
    }

    pub fn has_refresh_profile(&self) -> bool {
        self.has_link(REFRESH_PROFILE)
    }

    pub fn has_permissions(&self) -> bool {
        self.has_link(PERMISSIONS)
    }

    pub fn has_lookup_account(&self) -> bool {
        self.has_link(LOOKUP_ACCOUNT)
    }

    pub fn has_artifact(&self) -> bool {
        self.has_link(ARTIFACT)
    }

    pub fn has_service(&self) -> bool {
        self.has_link(SERVICE)
    }

    /// GET a named link, rebasing navigation on the links of the payload
    pub async fn follow<T: DeserializeOwned>(&self, name: &str) -> Result<Link<T>> {
        let url = self.require(name)?;
        fetch_link(&self.handler, url, self.origin.clone(), name).await
    }

    /// The resource behind a named link, when only its links matter
    pub async fn navigate(&self, name: &str) -> Result<GrantResource> {
        let link: Link<serde_json::Map<String, serde_json::Value>> = self.follow(name).await?;
        Ok(link.resource)
    }

    pub async fn to_artifact(&self) -> Result<Link<ArtifactDetails>> {
        self.follow(ARTIFACT).await
    }

    pub async fn to_service(&self) -> Result<Link<ServiceDetails>> {
        self.follow(SERVICE).await
    }

    /// Fetch the manifest of an artifact, optionally pinned to a schema version
    pub async fn manifest(&self, artifact: &str, version: Option<i32>) -> Result<Option<AppManifest>> {
        let url = with_query(
            self.require(MANIFEST)?,
            &[
                ("artifact", Some(artifact.to_string())),
                ("version", version.map(|v| v.to_string())),
            ],
        );
        debug!(artifact = %artifact, version = ?version, "Fetching manifest");
        get_json(self.handler.as_ref(), url).await
    }

    /// Refresh and return the claim profile of an account
    pub async fn refresh_profile(&self, account_id: Uuid) -> Result<UserProfile> {
        let url = self.require(REFRESH_PROFILE)?;
        let payload = RefreshProfile { account_id };
        post_json(self.handler.as_ref(), url, &payload)
            .await?
            .ok_or_else(|| empty_response("refresh profile"))
    }

    /// Resource registrations of a permission claim at a given version
    pub async fn permissions(&self, claim: &str, version: i32) -> Result<ResultSet<ServicePermission>> {
        let url = with_query(
            self.require(PERMISSIONS)?,
            &[
                ("claim", Some(claim.to_string())),
                ("version", Some(version.to_string())),
            ],
        );
        let page: ResultPage<ServicePermission> = get_json(self.handler.as_ref(), url)
            .await?
            .unwrap_or_default();
        Ok(ResultSet::new(self.handler.clone(), page))
    }

    /// Look up an account using a key-valued claim
    pub async fn lookup_account(
        &self,
        key: &str,
        value: &str,
        tenant: Option<&str>,
    ) -> Result<Option<AccountAssertion>> {
        let url = with_query(
            self.require(LOOKUP_ACCOUNT)?,
            &[
                ("key", Some(key.to_string())),
                ("value", Some(value.to_string())),
                ("tenant", tenant.map(str::to_string)),
            ],
        );
        get_json(self.handler.as_ref(), url).await
    }
}

/// GET a linked payload; the new resource keeps `origin` and adopts the payload's links
pub(crate) async fn fetch_link<T: DeserializeOwned>(
    handler: &Arc<dyn HttpHandler>,
    url: Url,
    origin: Option<Url>,
    label: &str,
) -> Result<Link<T>> {
    debug!(url = %url, "Following {} link", label);
    let linked: Linked<T> = get_json(handler.as_ref(), url)
        .await?
        .ok_or_else(|| empty_response(label))?;
    Ok(Link {
        data: linked.data,
        resource: GrantResource::new(handler.clone(), origin, linked.links),
    })
}

fn empty_response(label: &str) -> PecanError {
    PecanError::unexpected(
        200,
        "An unexpected empty response was received from the server",
        format!(
            "The {} service returned an empty response, a 404 [NotFound] or a valid payload are expected.",
            label
        ),
    )
}

/// Replace the query with percent-encoded parameters, skipping absent ones
fn with_query(mut url: Url, params: &[(&str, Option<String>)]) -> Url {
    let query = params
        .iter()
        .filter_map(|(name, value)| {
            value
                .as_ref()
                .map(|v| format!("{}={}", name, urlencoding::encode(v)))
        })
        .collect::<Vec<_>>()
        .join("&");
    url.set_query(if query.is_empty() { None } else { Some(&query) });
    url
}

/// Whether `uri` lives under the directory of `base` on the same host
pub(crate) fn is_base_of(base: &Url, uri: &Url) -> bool {
    if base.scheme() != uri.scheme()
        || base.host_str() != uri.host_str()
        || base.port_or_known_default() != uri.port_or_known_default()
        || base.username() != uri.username()
    {
        return false;
    }

    let base_path = base.path();
    let directory = match base_path.rfind('/') {
        Some(idx) => &base_path[..=idx],
        None => "/",
    };
    uri.path().starts_with(directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{CannedResponse, FakeHandler};
    use serde_json::json;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn resource(fake: &FakeHandler) -> GrantResource {
        let mut links = Links::new();
        links.insert(MANIFEST.to_string(), url("https://api.example.com/grant/manifest"));
        links.insert(LOOKUP_ACCOUNT.to_string(), url("https://api.example.com/grant/lookup"));
        links.insert(PERMISSIONS.to_string(), url("https://evil.example.com/grant/permissions"));
        links.insert(ARTIFACT.to_string(), url("https://api.example.com/grant/artifact/billing"));
        GrantResource::new(
            Arc::new(fake.clone()),
            Some(url("https://api.example.com/grant/")),
            Some(links),
        )
    }

    #[test]
    fn test_is_base_of() {
        let base = url("https://api.example.com/grant/");
        assert!(is_base_of(&base, &url("https://api.example.com/grant/manifest")));
        assert!(is_base_of(&base, &url("https://api.example.com/grant/a/b?c=d")));
        assert!(!is_base_of(&base, &url("https://api.example.com/other/manifest")));
        assert!(!is_base_of(&base, &url("http://api.example.com/grant/manifest")));
        assert!(!is_base_of(&base, &url("https://api.example.com:8443/grant/manifest")));
    }

    #[test]
    fn test_foreign_links_are_ignored() {
        let fake = FakeHandler::new();
        let resource = resource(&fake);
        assert!(resource.has_manifest());
        assert!(resource.has_lookup_account());
        assert!(!resource.has_permissions());
        assert!(!resource.has_refresh_profile());
    }

    #[test]
    fn test_save_and_load_round_trip_origin() {
        let fake = FakeHandler::new();
        let saved = resource(&fake).try_save().unwrap();
        assert_eq!(saved.get("grant"), Some(&url("https://api.example.com/grant/")));

        let loaded = GrantResource::try_load(Arc::new(fake), &saved).unwrap();
        assert!(loaded.has_manifest());
        assert_eq!(loaded.origin(), Some(&url("https://api.example.com/grant/")));
    }

    #[test]
    fn test_load_without_origin_fails() {
        let links = Links::new();
        assert!(GrantResource::try_load(Arc::new(FakeHandler::new()), &links).is_none());
        let orphan = GrantResource::new(Arc::new(FakeHandler::new()), None, None);
        assert!(orphan.try_save().is_none());
    }

    #[tokio::test]
    async fn test_lookup_account_encodes_query() {
        let fake = FakeHandler::new().with_response(
            "lookup",
            CannedResponse::json(json!({
                "account_id": "6f1c1f3e-8c55-4c2e-9a42-1b1f7f0f2a10",
                "modified": "2024-03-01T10:00:00Z"
            })),
        );
        let found = resource(&fake)
            .lookup_account("email", "a b@example.com", None)
            .await
            .unwrap();

        assert!(found.is_some());
        let sent = &fake.requests()[0];
        assert_eq!(sent.url.query(), Some("key=email&value=a%20b%40example.com"));
    }

    #[tokio::test]
    async fn test_manifest_query_with_version() {
        let fake = FakeHandler::new().with_response("manifest", CannedResponse::empty(200));
        let manifest = resource(&fake).manifest("billing app", Some(4)).await.unwrap();

        assert!(manifest.is_none());
        assert_eq!(
            fake.requests()[0].url.query(),
            Some("artifact=billing%20app&version=4")
        );
    }

    #[tokio::test]
    async fn test_missing_link_is_an_error() {
        let fake = FakeHandler::new();
        let result = resource(&fake).permissions("billing", 1).await;
        assert!(matches!(result, Err(PecanError::MissingLink(name)) if name == PERMISSIONS));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn test_follow_rebases_on_payload_links() {
        let fake = FakeHandler::new().with_response(
            "artifact/billing",
            CannedResponse::json(json!({
                "name": "billing",
                "description": "Invoices and payments",
                "published": 2,
                "@links": {
                    "service": "https://api.example.com/grant/service/billing/invoices",
                    "manifest": "https://other.example.com/grant/manifest"
                }
            })),
        );
        let link = resource(&fake).to_artifact().await.unwrap();

        assert_eq!(link.data.name, "billing");
        assert_eq!(link.data.published, Some(rust_decimal::Decimal::from(2)));
        assert_eq!(link.resource.origin(), Some(&url("https://api.example.com/grant/")));
        assert!(link.resource.has_service());
        assert!(!link.resource.has_manifest());
        assert!(!link.resource.has_artifact());
    }

    #[tokio::test]
    async fn test_empty_navigation_is_a_service_error() {
        let fake = FakeHandler::new().with_response("artifact", CannedResponse::empty(200));
        let result = resource(&fake).navigate(ARTIFACT).await;

        match result {
            Err(PecanError::Service { status, error }) => {
                assert_eq!(status, 200);
                assert_eq!(error.code, "evaluation.3000");
                assert!(error.detail.starts_with("The artifact service"));
            }
            other => panic!("expected an empty response error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_navigate_foreign_link_is_missing() {
        let fake = FakeHandler::new();
        let result = resource(&fake).navigate(PERMISSIONS).await;
        assert!(matches!(result, Err(PecanError::MissingLink(name)) if name == PERMISSIONS));
        assert!(resource(&fake).to_service().await.is_err());
        assert!(fake.requests().is_empty());
    }
}
