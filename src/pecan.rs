// Pecan service object
//
// Holds the compiled authorization schema of one artifact version together
// with the navigated grant API resource used to refresh it.

use crate::authz::permissions::{version_from_prefix, Permissions};
use crate::authz::schema::{Schema, ServiceRegistration};
use crate::authz::session::Session;
use crate::config::{ClientConfig, DEFAULT_BASE_URL};
use crate::crypto::RequestSigner;
use crate::domain::{ClaimResponse, Principal, ServiceState};
use crate::errors::{PecanError, Result};
use crate::grant::types::AccountAssertion;
use crate::grant::{GrantResource, GrantService};
use crate::http::{HttpHandler, ReqwestHandler, SigningHandler};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

/// Length of the base64 prefix that identifies a claim version
const PREFIX_LEN: usize = 6;

/// The main service object, caching everything about the authorization schema
pub struct Pecan {
    handler: Arc<dyn HttpHandler>,
    compiled: RwLock<Arc<Schema>>,
    user: Principal,
    account_id: Uuid,
    artifact: String,
    schema: i32,
    service: GrantService,
    resource: GrantResource,
}

impl std::fmt::Debug for Pecan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pecan")
            .field("artifact", &self.artifact)
            .field("schema", &self.schema)
            .field("account_id", &self.account_id)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl Pecan {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Connect with application credentials over the signing reqwest transport
    pub async fn connect(
        key_id: &str,
        secret: &str,
        artifact: &str,
        schema: i32,
        uri: Option<Url>,
        settings: &ClientConfig,
    ) -> Result<Self> {
        let signer = RequestSigner::from_base64(key_id, secret)?;
        let handler = SigningHandler::new(ReqwestHandler::new(settings)?, signer);
        Self::connect_with(Arc::new(handler), artifact, schema, uri).await
    }

    /// Connect through a custom HTTP handler
    pub async fn connect_with(
        handler: Arc<dyn HttpHandler>,
        artifact: &str,
        schema: i32,
        uri: Option<Url>,
    ) -> Result<Self> {
        let uri = match uri {
            Some(uri) => uri,
            None => Url::parse(DEFAULT_BASE_URL)?,
        };
        let service = GrantService::new(handler.clone(), uri);
        let resource = service.get().await?;

        let manifest = resource
            .manifest(artifact, Some(schema))
            .await?
            .ok_or_else(|| PecanError::ArtifactNotFound(artifact.to_string()))?;
        let profile = resource.refresh_profile(manifest.account_id).await?;

        let user = Principal::from_pairs(
            &manifest.authority,
            profile.assertions.into_iter().map(|a| (a.key, a.value)),
        );
        let compiled = Schema::compile(manifest);
        info!(
            artifact = %artifact,
            schema = schema,
            services = compiled.services().len(),
            registrations = compiled.registration_count(),
            "Pecan service connected"
        );

        Ok(Self {
            handler,
            compiled: RwLock::new(Arc::new(compiled)),
            user,
            account_id: profile.account_id,
            artifact: artifact.to_string(),
            schema,
            service,
            resource,
        })
    }

    /// Rebuild a service from cached state using application credentials
    ///
    /// Returns `None` whenever the cached state cannot be trusted for this
    /// artifact and schema version.
    pub fn restore(
        state_json: &[u8],
        key_id: &str,
        secret: &str,
        artifact: &str,
        schema: i32,
        settings: &ClientConfig,
    ) -> Option<Self> {
        let signer = match RequestSigner::from_base64(key_id, secret) {
            Ok(signer) => signer,
            Err(e) => {
                debug!(error = %e, "Cannot restore service state");
                return None;
            }
        };
        let transport = match ReqwestHandler::new(settings) {
            Ok(transport) => transport,
            Err(e) => {
                debug!(error = %e, "Cannot build transport for restored service");
                return None;
            }
        };
        Self::restore_with(
            state_json,
            Arc::new(SigningHandler::new(transport, signer)),
            artifact,
            schema,
        )
    }

    /// Rebuild a service from cached state through a custom HTTP handler
    pub fn restore_with(
        state_json: &[u8],
        handler: Arc<dyn HttpHandler>,
        artifact: &str,
        schema: i32,
    ) -> Option<Self> {
        let state: ServiceState = match serde_json::from_slice(state_json) {
            Ok(state) => state,
            Err(e) => {
                debug!(error = %e, "Cached service state is not valid JSON");
                return None;
            }
        };

        if state.artifact != artifact || state.version != schema {
            debug!(
                cached_artifact = %state.artifact,
                cached_schema = state.version,
                "Cached service state is for another artifact version"
            );
            return None;
        }
        let Some(resource) = state
            .links
            .as_ref()
            .and_then(|links| GrantResource::try_load(handler.clone(), links))
        else {
            debug!("Cached service state has no usable links");
            return None;
        };

        let service = GrantService::new(handler.clone(), state.uri);
        let user = Principal::from_pairs(&state.manifest.authority, state.user);
        Some(Self {
            handler,
            compiled: RwLock::new(Arc::new(Schema::compile(state.manifest))),
            user,
            account_id: state.account_id,
            artifact: artifact.to_string(),
            schema,
            service,
            resource,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The system user
    pub fn user(&self) -> &Principal {
        &self.user
    }

    /// Account identifier of the system user
    pub fn account_id(&self) -> Uuid {
        self.account_id
    }

    /// The issuing authority of the current manifest
    pub fn issuer(&self) -> String {
        self.compiled().authority().to_string()
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// Schema version of the artifact
    pub fn schema(&self) -> i32 {
        self.schema
    }

    pub fn service(&self) -> &GrantService {
        &self.service
    }

    pub fn resource(&self) -> &GrantResource {
        &self.resource
    }

    pub fn handler(&self) -> Arc<dyn HttpHandler> {
        self.handler.clone()
    }

    /// Snapshot of the compiled schema; a reload never mutates a snapshot
    pub fn compiled(&self) -> Arc<Schema> {
        self.compiled.read().clone()
    }

    /// Every registered service claim by service name
    pub fn registrations(&self) -> HashMap<String, Arc<ServiceRegistration>> {
        self.compiled().services().clone()
    }

    /// Full system permissions by claim type
    pub fn permissions(&self) -> Arc<HashMap<String, Permissions>> {
        self.compiled().permissions()
    }

    /// System permissions without restricted bits
    pub fn restricted(&self) -> HashMap<String, Permissions> {
        self.compiled().restricted().clone()
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Evaluate access to a resource for a permissions bitset
    pub fn check_access(&self, permissions: &Permissions, access: &str, resource_id: Uuid) -> bool {
        self.compiled().check_access(permissions, access, resource_id)
    }

    /// Look up an account using a key-valued claim
    pub async fn find(
        &self,
        key: &str,
        value: &str,
        tenant: Option<&str>,
    ) -> Result<Option<AccountAssertion>> {
        if !self.resource.has_lookup_account() {
            return Ok(None);
        }
        self.resource.lookup_account(key, value, tenant).await
    }

    /// Load every claim of an account
    pub async fn load(&self, account_id: Uuid) -> Result<ClaimResponse> {
        if !self.resource.has_refresh_profile() {
            debug!(account_id = %account_id, "Refresh profile link unavailable");
            return Ok(ClaimResponse::default());
        }

        let profile = self.resource.refresh_profile(account_id).await?;
        let claims: BTreeMap<String, String> = profile
            .assertions
            .into_iter()
            .map(|a| (format!("{}{}", a.issuer, a.key), a.value))
            .collect();
        self.resolve_versions(&claims).await?;

        Ok(ClaimResponse {
            success: true,
            issuer: profile.authority,
            accountability: account_id,
            display: profile.display,
            claims,
        })
    }

    /// Start an authorization session for a principal
    pub fn session(&self, principal: Option<Principal>) -> Session {
        Session::new(self, principal)
    }

    /// Persist the current service state as JSON
    pub fn state_json(&self) -> Result<Vec<u8>> {
        let compiled = self.compiled();
        let state = ServiceState {
            uri: self.service.uri().clone(),
            artifact: self.artifact.clone(),
            version: self.schema,
            manifest: compiled.manifest().clone(),
            user: self.user.to_map(),
            account_id: self.account_id,
            links: self.resource.try_save(),
        };
        Ok(serde_json::to_vec(&state)?)
    }

    /// Persist a claim response as JSON
    pub fn response_json(&self, response: &ClaimResponse) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(response)?)
    }

    /// Load claims from a cached response
    ///
    /// The API is only called for permission claims whose version has no
    /// registrations yet. Invalid JSON yields an unsuccessful response.
    pub async fn from_json(&self, bytes: &[u8]) -> Result<ClaimResponse> {
        let response: ClaimResponse = match serde_json::from_slice(bytes) {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Cached claim response is not valid JSON");
                return Ok(ClaimResponse::default());
            }
        };
        self.resolve_versions(&response.claims).await?;
        Ok(response)
    }

    /// Refetch the manifest and swap in a freshly compiled schema
    pub async fn reload(&self) -> Result<bool> {
        if !self.resource.has_manifest() {
            return Ok(false);
        }
        let Some(manifest) = self
            .resource
            .manifest(&self.artifact, Some(self.schema))
            .await?
        else {
            debug!(artifact = %self.artifact, schema = self.schema, "No manifest to reload");
            return Ok(false);
        };

        let compiled = Arc::new(Schema::compile(manifest));
        info!(
            artifact = %self.artifact,
            schema = self.schema,
            services = compiled.services().len(),
            registrations = compiled.registration_count(),
            "Authorization schema reloaded"
        );
        *self.compiled.write() = compiled;
        Ok(true)
    }

    /// Fetch registrations for permission claims at versions not seen before
    async fn resolve_versions(&self, claims: &BTreeMap<String, String>) -> Result<()> {
        let compiled = self.compiled();
        for (key, value) in claims {
            let Some(claim) = compiled.claims.get(key) else {
                continue;
            };
            if value.starts_with(&claim.prefix) {
                continue;
            }
            let Some(prefix) = value.get(..PREFIX_LEN) else {
                continue;
            };
            if claim.versions.contains_key(prefix) || !self.resource.has_permissions() {
                continue;
            }
            if let Some(version) = self.lazy_load(prefix, &claim.key).await? {
                claim.versions.insert(prefix.to_string(), version);
            }
        }
        Ok(())
    }

    async fn lazy_load(&self, prefix: &str, claim: &str) -> Result<Option<i32>> {
        let Some(version) = version_from_prefix(prefix) else {
            debug!(claim = %claim, prefix = %prefix, "Claim prefix is not base64");
            return Ok(None);
        };

        let rows = self
            .resource
            .permissions(claim, version)
            .await?
            .collect_all()
            .await?;

        let compiled = self.compiled();
        for entry in &rows {
            compiled.register(entry, version);
        }
        debug!(
            claim = %claim,
            version = version,
            registrations = rows.len(),
            "Loaded registrations for claim version"
        );
        Ok(Some(version))
    }
}
