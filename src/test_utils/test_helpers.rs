//! Helper utilities for testing and development.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::auth::{AttemptStore, IdentityStore, NewIdentity, Uid};
use crate::error::StoreError;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct IdentityState {
    by_name: HashMap<String, Uid>,
    profiles: HashMap<String, Map<String, JsonValue>>,
    admins: HashSet<Uid>,
    created: Vec<NewIdentity>,
    next_uid: u64,
}

/// Identity and profile store held in memory.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    state: Mutex<IdentityState>,
    lookups: AtomicUsize,
    fail_admin: AtomicBool,
    fail_fields: AtomicBool,
    decline_create: AtomicBool,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_user(&self, username: &str, uid: Uid) {
        let mut state = lock(&self.state);
        state.by_name.insert(username.to_string(), uid);
        state.next_uid = state.next_uid.max(uid.0);
    }

    pub fn set_admin(&self, uid: Uid, admin: bool) {
        let mut state = lock(&self.state);
        if admin {
            state.admins.insert(uid);
        } else {
            state.admins.remove(&uid);
        }
    }

    pub fn set_field(&self, uid: Uid, field: &str, value: JsonValue) {
        lock(&self.state)
            .profiles
            .entry(uid.profile_key())
            .or_default()
            .insert(field.to_string(), value);
    }

    #[must_use]
    pub fn uid_of(&self, username: &str) -> Option<Uid> {
        lock(&self.state).by_name.get(username).copied()
    }

    /// Identities created through [`IdentityStore::create_identity`], in order.
    #[must_use]
    pub fn created(&self) -> Vec<NewIdentity> {
        lock(&self.state).created.clone()
    }

    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn fail_admin_lookups(&self, fail: bool) {
        self.fail_admin.store(fail, Ordering::SeqCst);
    }

    pub fn fail_profile_reads(&self, fail: bool) {
        self.fail_fields.store(fail, Ordering::SeqCst);
    }

    pub fn decline_creates(&self, decline: bool) {
        self.decline_create.store(decline, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn uid_by_username(&self, username: &str) -> Result<Option<Uid>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.uid_of(username))
    }

    async fn create_identity(&self, identity: NewIdentity) -> Result<Option<Uid>, StoreError> {
        if self.decline_create.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let mut state = lock(&self.state);
        if state.by_name.contains_key(&identity.username) {
            return Err(StoreError::Backend(format!(
                "username {} is taken",
                identity.username
            )));
        }
        state.next_uid += 1;
        let uid = Uid(state.next_uid);
        state.by_name.insert(identity.username.clone(), uid);
        let mut profile = Map::new();
        profile.insert("username".to_string(), JsonValue::from(identity.username.clone()));
        if let Some(email) = &identity.email {
            profile.insert("email".to_string(), JsonValue::from(email.clone()));
        }
        state.profiles.insert(uid.profile_key(), profile);
        state.created.push(identity);
        Ok(Some(uid))
    }

    async fn is_administrator(&self, uid: Uid) -> Result<bool, StoreError> {
        if self.fail_admin.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("group lookup failed".to_string()));
        }
        Ok(lock(&self.state).admins.contains(&uid))
    }

    async fn get_fields(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Map<String, JsonValue>, StoreError> {
        if self.fail_fields.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("object read failed".to_string()));
        }
        let state = lock(&self.state);
        let profile = state.profiles.get(key);
        Ok(fields
            .iter()
            .map(|field| {
                let value = profile
                    .and_then(|p| p.get(*field))
                    .cloned()
                    .unwrap_or(JsonValue::Null);
                ((*field).to_string(), value)
            })
            .collect())
    }
}

/// Login attempt counters held in memory.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    attempts: Mutex<HashMap<Uid, Vec<IpAddr>>>,
    cleared: Mutex<Vec<Uid>>,
    fail_log: AtomicBool,
    fail_clear: AtomicBool,
    clear_delay: Mutex<Duration>,
}

impl MemoryAttemptStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn attempts_for(&self, uid: Uid) -> usize {
        lock(&self.attempts).get(&uid).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn total_logged(&self) -> usize {
        lock(&self.attempts).values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn cleared(&self) -> Vec<Uid> {
        lock(&self.cleared).clone()
    }

    pub fn fail_logging(&self, fail: bool) {
        self.fail_log.store(fail, Ordering::SeqCst);
    }

    pub fn fail_clearing(&self, fail: bool) {
        self.fail_clear.store(fail, Ordering::SeqCst);
    }

    /// Make `clear_attempts` take at least `delay` before it does anything.
    pub fn set_clear_delay(&self, delay: Duration) {
        *lock(&self.clear_delay) = delay;
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn log_attempt(&self, uid: Uid, source: IpAddr) -> Result<(), StoreError> {
        if self.fail_log.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("[[error:account-locked]]".to_string()));
        }
        lock(&self.attempts).entry(uid).or_default().push(source);
        Ok(())
    }

    async fn clear_attempts(&self, uid: Uid) -> Result<(), StoreError> {
        let delay = *lock(&self.clear_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("attempt counter unavailable".to_string()));
        }
        lock(&self.attempts).remove(&uid);
        lock(&self.cleared).push(uid);
        Ok(())
    }
}
