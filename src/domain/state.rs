use crate::grant::types::{AppManifest, Links};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;
use uuid::Uuid;

/// Persisted state of a service, enough to restart without contacting the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceState {
    pub uri: Url,
    pub artifact: String,
    /// Schema version of the artifact
    pub version: i32,
    pub manifest: AppManifest,
    /// Claims of the system user
    pub user: BTreeMap<String, String>,
    pub account_id: Uuid,
    #[serde(rename = "@links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}
