// Claims principals and cached claim responses

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A single typed claim about a principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim type, e.g. `https://auth.example.com/email`
    pub kind: String,
    pub value: String,
    /// Authority that issued the claim
    pub issuer: String,
}

impl Claim {
    pub fn new(kind: impl Into<String>, value: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            issuer: issuer.into(),
        }
    }
}

/// The authenticated party an authorization session is evaluated for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub claims: Vec<Claim>,
}

impl Principal {
    pub fn new(claims: Vec<Claim>) -> Self {
        Self { claims }
    }

    /// Build a principal whose claims all come from one issuer
    pub fn from_pairs<I, K, V>(issuer: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            claims: pairs
                .into_iter()
                .map(|(kind, value)| Claim::new(kind, value, issuer))
                .collect(),
        }
    }

    pub fn with_claim(mut self, claim: Claim) -> Self {
        self.claims.push(claim);
        self
    }

    /// First claim of a type from a given issuer
    pub fn find(&self, issuer: &str, kind: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.issuer == issuer && c.kind == kind)
            .map(|c| c.value.as_str())
    }

    /// Claim values keyed by type; later duplicates win
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.claims
            .iter()
            .map(|c| (c.kind.clone(), c.value.clone()))
            .collect()
    }
}

/// Claims loaded for an account, suitable for caching between requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub success: bool,
    pub issuer: String,
    pub accountability: Uuid,
    pub display: String,
    #[serde(with = "key_value_list")]
    pub claims: BTreeMap<String, String>,
}

impl ClaimResponse {
    /// Principal carrying every claim of this response, issued by its authority
    pub fn to_principal(&self) -> Principal {
        Principal::from_pairs(&self.issuer, self.claims.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

/// Claims are exchanged as `[{"Key": .., "Value": ..}]` lists
mod key_value_list {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize)]
    struct Entry {
        #[serde(rename = "Key")]
        key: String,
        #[serde(rename = "Value")]
        value: String,
    }

    pub fn serialize<S: Serializer>(map: &BTreeMap<String, String>, serializer: S) -> Result<S::Ok, S::Error> {
        map.iter()
            .map(|(key, value)| Entry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|e| (e.key, e.value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_matches_issuer_and_kind() {
        let principal = Principal::new(vec![
            Claim::new("email", "a@example.com", "https://other/"),
            Claim::new("email", "b@example.com", "https://auth/"),
        ]);
        assert_eq!(principal.find("https://auth/", "email"), Some("b@example.com"));
        assert_eq!(principal.find("https://auth/", "name"), None);
    }

    #[test]
    fn test_claim_response_wire_format() {
        let mut claims = BTreeMap::new();
        claims.insert("https://auth/email".to_string(), "a@example.com".to_string());
        let response = ClaimResponse {
            success: true,
            issuer: "https://auth/".to_string(),
            accountability: Uuid::nil(),
            display: "Alice".to_string(),
            claims,
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value["claims"],
            json!([{"Key": "https://auth/email", "Value": "a@example.com"}])
        );

        let parsed: ClaimResponse = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_default_response_is_unsuccessful() {
        let response = ClaimResponse::default();
        assert!(!response.success);
        assert!(response.claims.is_empty());
    }

    #[test]
    fn test_to_principal_uses_response_issuer() {
        let mut claims = BTreeMap::new();
        claims.insert("https://auth/role".to_string(), "admin".to_string());
        let response = ClaimResponse {
            success: true,
            issuer: "https://auth/".to_string(),
            claims,
            ..Default::default()
        };

        let principal = response.to_principal();
        assert_eq!(principal.find("https://auth/", "https://auth/role"), Some("admin"));
    }
}
