// Wire types of the grant API

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;
use uuid::Uuid;

/// Hypermedia links attached to a payload
pub type Links = HashMap<String, Url>;

// ============================================================================
// Manifest
// ============================================================================

/// The authorization schema of an artifact at a given version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppManifest {
    pub authority: String,
    pub account_id: Uuid,
    pub permissions: Vec<Permission>,
    pub services: Vec<ServiceClaim>,
    #[serde(rename = "@links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

/// A named access level and its bit mask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub key: String,
    pub mask: i32,
    #[serde(default)]
    pub description: String,
}

/// A service and the permission claim its resources are encoded in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceClaim {
    pub authority: String,
    #[serde(default)]
    pub provider: String,
    pub name: String,
    pub claim: String,
    pub version: i32,
    /// High water mark: number of bits used by the claim
    pub hwm: i32,
    pub permissions: Vec<ServicePermission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

/// The bit range a resource occupies in a permission claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePermission {
    pub resource_id: Uuid,
    #[serde(default)]
    pub name: String,
    pub mask: i32,
    pub position: i32,
    #[serde(default)]
    pub restricted: i32,
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub authority: String,
    pub account_id: Uuid,
    pub display: String,
    pub assertions: Vec<UserClaim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<UserTenant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaim {
    pub claim_id: Uuid,
    pub issuer: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTenant {
    pub account_id: Uuid,
    pub display: String,
}

/// Result of looking up an account by a key-valued claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountAssertion {
    pub account_id: Uuid,
    pub modified: DateTime<FixedOffset>,
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub secret: Option<Vec<u8>>,
}

/// Payload for refreshing an account profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshProfile {
    pub account_id: Uuid,
}

// ============================================================================
// Navigation
// ============================================================================

/// A published artifact and its release state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDetails {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Latest published schema version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetails {
    pub name: String,
    pub claim: String,
    #[serde(default)]
    pub description: String,
    pub provider: ProviderMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<DateTime<FixedOffset>>,
}

/// The identity provider a service trusts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

// ============================================================================
// Paging and errors
// ============================================================================

/// A single page of a scrollable collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPage<T> {
    #[serde(default = "Vec::new")]
    pub rows: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(rename = "@next", default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Url>,
}

impl<T> Default for ResultPage<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            cursor: None,
            next: None,
        }
    }
}

/// Links-only body returned by the entrypoint
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct EntrypointLinks {
    #[serde(rename = "@links", default)]
    pub links: Option<Links>,
}

/// Error body returned by the grant API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub errors: Vec<DataError>,
}

impl ServiceError {
    pub fn new(code: &str, title: &str, detail: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            title: title.to_string(),
            detail: detail.into(),
            errors: Vec::new(),
        }
    }
}

/// A field-level validation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataError {
    pub code: String,
    pub title: String,
    pub detail: String,
    pub source: String,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manifest_parses_wire_names() {
        let manifest: AppManifest = serde_json::from_value(json!({
            "authority": "https://auth.example.com/",
            "account_id": "6f1c1f3e-8c55-4c2e-9a42-1b1f7f0f2a10",
            "permissions": [{"key": "read", "mask": 1, "description": "Read"}],
            "services": [{
                "authority": "https://auth.example.com/",
                "provider": "pecan",
                "name": "billing",
                "claim": "billing",
                "version": 7,
                "hwm": 40,
                "permissions": [{
                    "resource_id": "0b0c7d5e-37f4-4f3e-9d8a-2f8d9c1a7b11",
                    "name": "invoices",
                    "mask": 3,
                    "position": 32,
                    "restricted": 2
                }],
                "tenant": "tenant"
            }],
            "@links": {"self": "https://www.pecanhq.com/grant/manifest"}
        }))
        .unwrap();

        assert_eq!(manifest.permissions[0].mask, 1);
        assert_eq!(manifest.services[0].hwm, 40);
        assert_eq!(manifest.services[0].permissions[0].restricted, 2);
        assert_eq!(manifest.services[0].subject, None);
        assert_eq!(manifest.services[0].tenant.as_deref(), Some("tenant"));
        assert!(manifest.links.unwrap().contains_key("self"));
    }

    #[test]
    fn test_account_assertion_secret_is_base64() {
        let assertion: AccountAssertion = serde_json::from_value(json!({
            "account_id": "6f1c1f3e-8c55-4c2e-9a42-1b1f7f0f2a10",
            "modified": "2024-03-01T10:00:00+00:00",
            "secret": "AQID"
        }))
        .unwrap();
        assert_eq!(assertion.secret, Some(vec![1, 2, 3]));

        let without: AccountAssertion = serde_json::from_value(json!({
            "account_id": "6f1c1f3e-8c55-4c2e-9a42-1b1f7f0f2a10",
            "modified": "2024-03-01T10:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(without.secret, None);
    }

    #[test]
    fn test_service_details_nest_provider() {
        let details: ServiceDetails = serde_json::from_value(json!({
            "name": "billing",
            "claim": "billing",
            "provider": {"name": "pecan", "subject": "sub"},
            "modified": "2024-03-01T10:00:00+00:00",
            "@links": {"self": "https://www.pecanhq.com/grant/service/billing/invoices"}
        }))
        .unwrap();
        assert_eq!(details.provider.subject.as_deref(), Some("sub"));
        assert_eq!(details.provider.tenant, None);
        assert!(details.archived.is_none());
        assert!(details.modified.is_some());
    }

    #[test]
    fn test_result_page_next_link() {
        let page: ResultPage<ServicePermission> = serde_json::from_value(json!({
            "rows": [],
            "@next": "https://www.pecanhq.com/grant/permissions?cursor=abc"
        }))
        .unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.next.unwrap().query(), Some("cursor=abc"));
    }
}
