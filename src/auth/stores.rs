//! Narrow interfaces to the host's identity, attempt and configuration stores.

use std::fmt;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::StoreError;

/// Opaque internal user identifier, distinct from the external account name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub u64);

impl Uid {
    /// Key of the user's profile object in the host's object store.
    #[must_use]
    pub fn profile_key(self) -> String {
        format!("user:{}", self.0)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Data for creating a local identity from an account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIdentity {
    pub username: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn uid_by_username(&self, username: &str) -> Result<Option<Uid>, StoreError>;

    /// Create an identity; `None` means the store declined to create one.
    async fn create_identity(&self, identity: NewIdentity) -> Result<Option<Uid>, StoreError>;

    async fn is_administrator(&self, uid: Uid) -> Result<bool, StoreError>;

    /// Read `fields` of the object stored under `key`; missing fields are omitted or null.
    async fn get_fields(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Map<String, JsonValue>, StoreError>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Record a login attempt. Stores may refuse (e.g. a locked account), which ends the login.
    async fn log_attempt(&self, uid: Uid, source: IpAddr) -> Result<(), StoreError>;

    async fn clear_attempts(&self, uid: Uid) -> Result<(), StoreError>;
}

/// Read-only view of site-wide settings, consulted fresh on every check.
pub trait SiteConfig: Send + Sync {
    fn setting(&self, key: &str) -> Option<JsonValue>;
}

/// Thread-safe in-memory settings that the host can update while the pipeline runs.
#[derive(Debug, Default)]
pub struct SettingsMap {
    values: RwLock<Map<String, JsonValue>>,
}

impl SettingsMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: JsonValue) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<JsonValue> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}

impl From<Map<String, JsonValue>> for SettingsMap {
    fn from(values: Map<String, JsonValue>) -> Self {
        Self {
            values: RwLock::new(values),
        }
    }
}

impl SiteConfig for SettingsMap {
    fn setting(&self, key: &str) -> Option<JsonValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}
