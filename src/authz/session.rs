// Per-principal authorization session
//
// Memoizes service registrations, typed claim values and decoded permission
// bitsets for the lifetime of a single request. A session evaluates against
// the schema that was current when it was opened.

use super::permissions::Permissions;
use super::schema::{Schema, ServiceRegistration};
use crate::domain::Principal;
use crate::pecan::Pecan;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// A memoized claim value
#[derive(Debug, Clone, PartialEq)]
enum CachedValue {
    /// The principal has no such claim
    Missing,
    Bool(bool),
    Uuid(Uuid),
    I32(i32),
    I64(i64),
    Decimal(Decimal),
    F32(f32),
    F64(f64),
    DateTime(DateTime<FixedOffset>),
    /// Decoded permission claim
    Bytes(Vec<u8>),
}

/// Permission bitsets by claim type
#[derive(Debug, Clone)]
enum PermissionCache {
    Local(HashMap<String, Permissions>),
    /// Full system permissions shared with the service
    Escalated(Arc<HashMap<String, Permissions>>),
}

impl PermissionCache {
    fn get(&self, claim: &str) -> Option<&Permissions> {
        match self {
            PermissionCache::Local(map) => map.get(claim),
            PermissionCache::Escalated(map) => map.get(claim),
        }
    }

    fn insert(&mut self, claim: &str, permissions: Permissions) {
        if let PermissionCache::Local(map) = self {
            map.entry(claim.to_string()).or_insert(permissions);
        }
    }
}

/// A stateful cache of authorization data for one principal
///
/// Clone a session before [`Session::escalate_privileges`] to keep a copy
/// with the principal's own permissions.
#[derive(Debug, Clone)]
pub struct Session {
    schema: Arc<Schema>,
    principal: Option<Principal>,
    registrations: HashMap<String, Option<Arc<ServiceRegistration>>>,
    values: HashMap<String, CachedValue>,
    cache: PermissionCache,
}

/// Generates a memoizing typed getter over [`Session::get_string`]
macro_rules! typed_getter {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $variant:ident, $parse:expr) => {
        $(#[$meta])*
        pub fn $name(&mut self, claim: &str) -> Option<$ty> {
            match self.values.get(claim) {
                Some(CachedValue::$variant(value)) => return Some(value.clone()),
                Some(CachedValue::Missing) => return None,
                _ => {}
            }
            let Some(selected) = self.get_string(claim) else {
                self.values.insert(claim.to_string(), CachedValue::Missing);
                return None;
            };
            let parse: fn(&str) -> Option<$ty> = $parse;
            let value = parse(&selected)?;
            self.values
                .insert(claim.to_string(), CachedValue::$variant(value.clone()));
            Some(value)
        }
    };
}

impl Session {
    pub fn new(pecan: &Pecan, principal: Option<Principal>) -> Self {
        Self {
            schema: pecan.compiled(),
            principal,
            registrations: HashMap::new(),
            values: HashMap::new(),
            cache: PermissionCache::Local(HashMap::new()),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Whether the principal has a level of access to a resource of a service
    pub fn has_permissions(&mut self, service: &str, resource: &str, access: &str) -> bool {
        let Some(registration) = self.registration(service) else {
            return false;
        };
        let Some(resource_id) = registration.resources.get(resource).copied() else {
            return false;
        };
        let Some(permissions) = self.try_get_permissions(&registration.claim) else {
            return false;
        };
        self.schema.check_access(&permissions, access, resource_id)
    }

    /// Grant the session every active resource of the service
    pub fn escalate_privileges(&mut self) {
        self.cache = PermissionCache::Escalated(self.schema.permissions());
    }

    /// First claim of a type issued by the service authority
    pub fn get_string(&self, claim: &str) -> Option<String> {
        self.principal
            .as_ref()?
            .find(self.schema.authority(), claim)
            .map(str::to_string)
    }

    typed_getter!(
        /// A boolean claim, accepting `true`/`false` in any case
        get_bool,
        bool,
        Bool,
        |s| match s.trim() {
            t if t.eq_ignore_ascii_case("true") => Some(true),
            f if f.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    );

    typed_getter!(get_uuid, Uuid, Uuid, |s| Uuid::parse_str(s.trim()).ok());

    typed_getter!(get_i32, i32, I32, |s| s.trim().parse().ok());

    typed_getter!(get_i64, i64, I64, |s| s.trim().parse().ok());

    typed_getter!(get_decimal, Decimal, Decimal, |s| Decimal::from_str(s.trim()).ok());

    typed_getter!(get_f32, f32, F32, |s| s.trim().parse().ok());

    typed_getter!(get_f64, f64, F64, |s| s.trim().parse().ok());

    typed_getter!(
        /// A timestamp claim in RFC 3339 or RFC 2822 form
        get_datetime,
        DateTime<FixedOffset>,
        DateTime,
        |s| {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .or_else(|_| DateTime::parse_from_rfc2822(s))
                .ok()
        }
    );

    fn registration(&mut self, service: &str) -> Option<Arc<ServiceRegistration>> {
        if let Some(memoized) = self.registrations.get(service) {
            return memoized.clone();
        }

        let active = self.schema.service(service).filter(|active| {
            let has = |claim: &Option<String>| {
                claim
                    .as_deref()
                    .map_or(true, |claim| self.get_string(claim).is_some())
            };
            has(&active.subject) && has(&active.tenant)
        });
        self.registrations.insert(service.to_string(), active.clone());
        active
    }

    fn try_get_permissions(&mut self, claim: &str) -> Option<Permissions> {
        if let Some(permissions) = self.cache.get(claim) {
            return Some(permissions.clone());
        }

        match self.values.get(claim) {
            Some(CachedValue::Bytes(bytes)) => {
                let permissions = Permissions::from_bytes(bytes)?;
                self.cache.insert(claim, permissions.clone());
                return Some(permissions);
            }
            Some(_) => return None,
            None => {}
        }

        let Some(selected) = self.get_string(claim) else {
            self.values.insert(claim.to_string(), CachedValue::Missing);
            return None;
        };
        let bytes = STANDARD.decode(selected.trim()).ok()?;
        let permissions = Permissions::from_bytes(&bytes)?;
        self.values
            .insert(claim.to_string(), CachedValue::Bytes(bytes));
        self.cache.insert(claim, permissions.clone());
        Some(permissions)
    }
}
