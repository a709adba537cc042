// Authorization schema compiled from an application manifest

use super::permissions::{version_prefix, Permissions};
use crate::grant::types::{AppManifest, ServicePermission};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Where a resource's bits live within a claim version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub resource_id: Uuid,
    pub version: i32,
    pub position: i32,
    pub mask: i32,
}

impl Registration {
    fn from_permission(entry: &ServicePermission, version: i32) -> Self {
        Self {
            resource_id: entry.resource_id,
            version,
            position: entry.position,
            mask: entry.mask,
        }
    }
}

/// Information about the permission claim of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    pub name: String,
    /// Fully qualified permission claim type
    pub claim: String,
    /// Resource identifiers by name
    pub resources: HashMap<String, Uuid>,
    /// Subject claim type, if the service has a primary subject identifier
    pub subject: Option<String>,
    /// Tenant claim type, if the service is multi-tenanted
    pub tenant: Option<String>,
}

/// A permission claim and the claim versions seen for it so far
#[derive(Debug)]
pub(crate) struct PermissionClaim {
    /// Claim name as known to the API
    pub key: String,
    /// Base64 prefix of claims at the current version
    pub prefix: String,
    pub versions: DashMap<String, i32>,
}

/// Immutable compiled view of a manifest plus lazily learned registrations
#[derive(Debug)]
pub struct Schema {
    manifest: AppManifest,
    masks: HashMap<String, i32>,
    services: HashMap<String, Arc<ServiceRegistration>>,
    pub(crate) claims: HashMap<String, PermissionClaim>,
    permissions: Arc<HashMap<String, Permissions>>,
    restricted: HashMap<String, Permissions>,
    registrations: DashMap<(Uuid, i32), Registration>,
}

impl Schema {
    /// Compile the masks, services, claims and registrations of a manifest
    pub fn compile(manifest: AppManifest) -> Self {
        let masks = manifest
            .permissions
            .iter()
            .map(|p| (p.key.clone(), p.mask))
            .collect();

        let mut services = HashMap::new();
        let mut claims = HashMap::new();
        let mut permissions = HashMap::new();
        let mut restricted = HashMap::new();
        let registrations = DashMap::new();

        for entry in &manifest.services {
            let mut resources = HashMap::with_capacity(entry.permissions.len());
            let mut system = Permissions::builder(entry.version, entry.hwm);
            let mut worker = Permissions::builder(entry.version, entry.hwm);
            let mut include = false;

            for child in &entry.permissions {
                resources.insert(child.name.clone(), child.resource_id);
                system.grant(child.position, child.mask);

                let unrestricted = child.mask & !child.restricted;
                if unrestricted > 0 {
                    include = true;
                    worker.grant(child.position, unrestricted);
                }
                registrations.insert(
                    (child.resource_id, entry.version),
                    Registration::from_permission(child, entry.version),
                );
            }

            let key = format!("{}{}", entry.authority, entry.claim);
            services.insert(
                entry.name.clone(),
                Arc::new(ServiceRegistration {
                    name: entry.name.clone(),
                    claim: key.clone(),
                    resources,
                    subject: entry
                        .subject
                        .as_ref()
                        .map(|s| format!("{}{}", entry.authority, s)),
                    tenant: entry
                        .tenant
                        .as_ref()
                        .map(|t| format!("{}{}", entry.authority, t)),
                }),
            );

            claims.insert(
                key.clone(),
                PermissionClaim {
                    key: entry.claim.clone(),
                    prefix: version_prefix(entry.version),
                    versions: DashMap::new(),
                },
            );
            permissions.insert(key.clone(), system.build());
            if include {
                restricted.insert(key, worker.build());
            }
        }

        Self {
            manifest,
            masks,
            services,
            claims,
            permissions: Arc::new(permissions),
            restricted,
            registrations,
        }
    }

    pub fn manifest(&self) -> &AppManifest {
        &self.manifest
    }

    /// Issuing authority of every claim in the schema
    pub fn authority(&self) -> &str {
        &self.manifest.authority
    }

    pub fn mask(&self, access: &str) -> Option<i32> {
        self.masks.get(access).copied()
    }

    pub fn service(&self, name: &str) -> Option<Arc<ServiceRegistration>> {
        self.services.get(name).cloned()
    }

    pub fn services(&self) -> &HashMap<String, Arc<ServiceRegistration>> {
        &self.services
    }

    /// Full system permissions by claim type
    pub fn permissions(&self) -> Arc<HashMap<String, Permissions>> {
        self.permissions.clone()
    }

    /// Permissions without restricted bits, only for services that have any
    pub fn restricted(&self) -> &HashMap<String, Permissions> {
        &self.restricted
    }

    pub fn registration(&self, resource_id: Uuid, version: i32) -> Option<Registration> {
        self.registrations
            .get(&(resource_id, version))
            .map(|entry| *entry.value())
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Record where a resource lives in an older or newer claim version
    pub fn register(&self, entry: &ServicePermission, version: i32) {
        self.registrations.insert(
            (entry.resource_id, version),
            Registration::from_permission(entry, version),
        );
    }

    /// Evaluate access to a resource for a permissions bitset
    pub fn check_access(&self, permissions: &Permissions, access: &str, resource_id: Uuid) -> bool {
        let Some(mask) = self.mask(access) else {
            return false;
        };
        let Some(registration) = self.registration(resource_id, permissions.version()) else {
            return false;
        };
        if registration.mask & mask != mask {
            return false;
        }
        mask == 0 || permissions.has_permissions(registration.version, registration.position, mask)
    }
}
