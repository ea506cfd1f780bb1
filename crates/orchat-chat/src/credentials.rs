//! API key persistence and status tracking.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Store key the API key record lives under
pub const API_KEY_STORAGE_KEY: &str = "openrouter_api_key";

/// String key/value persistence
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store; contents are lost with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Validation state of the stored key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiKeyStatus {
    #[default]
    NotSet,
    Valid,
    Invalid,
}

/// Persisted key record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyData {
    pub key: String,
    pub status: ApiKeyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validated: Option<DateTime<Utc>>,
}

impl ApiKeyData {
    /// Interpret a stored value; anything that isn't a record is a bare key
    fn from_stored(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| Self {
            key: raw.to_string(),
            status: ApiKeyStatus::NotSet,
            last_validated: None,
        })
    }
}

/// Owns the current key record and mirrors every change into a store
pub struct CredentialManager<S: KeyValueStore> {
    store: S,
    data: ApiKeyData,
}

impl<S: KeyValueStore> CredentialManager<S> {
    /// Load whatever the store holds
    pub fn load(store: S) -> Result<Self> {
        let data = store
            .get(API_KEY_STORAGE_KEY)?
            .filter(|raw| !raw.is_empty())
            .map(|raw| ApiKeyData::from_stored(&raw))
            .unwrap_or_default();
        Ok(Self { store, data })
    }

    pub fn data(&self) -> &ApiKeyData {
        &self.data
    }

    pub fn has_key(&self) -> bool {
        !self.data.key.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.data.status == ApiKeyStatus::Valid
    }

    /// The key, only when it has been validated
    pub fn valid_key(&self) -> Option<&str> {
        self.is_valid().then_some(self.data.key.as_str())
    }

    /// Replace the key. An empty key removes the stored record.
    pub fn save(&mut self, key: &str, status: ApiKeyStatus) -> Result<()> {
        let key = key.trim();
        let data = ApiKeyData {
            key: key.to_string(),
            status,
            last_validated: (status == ApiKeyStatus::Valid).then(Utc::now),
        };

        if key.is_empty() {
            self.store.remove(API_KEY_STORAGE_KEY)?;
        } else {
            self.store
                .set(API_KEY_STORAGE_KEY, &serde_json::to_string(&data)?)?;
        }
        self.data = data;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.remove(API_KEY_STORAGE_KEY)?;
        self.data = ApiKeyData::default();
        Ok(())
    }

    /// Record a validation outcome for the current key
    pub fn update_status(&mut self, status: ApiKeyStatus) -> Result<()> {
        let mut updated = self.data.clone();
        updated.status = status;
        if status == ApiKeyStatus::Valid {
            updated.last_validated = Some(Utc::now());
        }

        if !updated.key.is_empty() {
            self.store
                .set(API_KEY_STORAGE_KEY, &serde_json::to_string(&updated)?)?;
        }
        self.data = updated;
        Ok(())
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store() {
        let manager = CredentialManager::load(MemoryStore::new()).unwrap();
        assert!(!manager.has_key());
        assert!(!manager.is_valid());
        assert_eq!(manager.data(), &ApiKeyData::default());
    }

    #[test]
    fn test_plain_string_is_unvalidated_key() {
        let store = MemoryStore::new();
        store.set(API_KEY_STORAGE_KEY, "sk-or-legacy").unwrap();

        let manager = CredentialManager::load(store).unwrap();
        assert_eq!(manager.data().key, "sk-or-legacy");
        assert_eq!(manager.data().status, ApiKeyStatus::NotSet);
        assert!(manager.valid_key().is_none());
    }

    #[test]
    fn test_save_valid_persists_record() {
        let mut manager = CredentialManager::load(MemoryStore::new()).unwrap();
        manager.save("  sk-or-abc ", ApiKeyStatus::Valid).unwrap();
        assert_eq!(manager.valid_key(), Some("sk-or-abc"));
        assert!(manager.data().last_validated.is_some());

        let raw = manager
            .into_store()
            .get(API_KEY_STORAGE_KEY)
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["key"], "sk-or-abc");
        assert_eq!(json["status"], "valid");
        assert!(json["lastValidated"].is_string());
    }

    #[test]
    fn test_round_trip_through_store() {
        let mut manager = CredentialManager::load(MemoryStore::new()).unwrap();
        manager.save("sk-or-abc", ApiKeyStatus::Invalid).unwrap();

        let reloaded = CredentialManager::load(manager.into_store()).unwrap();
        assert_eq!(reloaded.data().key, "sk-or-abc");
        assert_eq!(reloaded.data().status, ApiKeyStatus::Invalid);
        assert!(reloaded.data().last_validated.is_none());
    }

    #[test]
    fn test_save_empty_removes_entry() {
        let mut manager = CredentialManager::load(MemoryStore::new()).unwrap();
        manager.save("sk-or-abc", ApiKeyStatus::NotSet).unwrap();
        manager.save("   ", ApiKeyStatus::NotSet).unwrap();
        assert!(!manager.has_key());
        assert!(manager.into_store().get(API_KEY_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_update_status_keeps_key() {
        let mut manager = CredentialManager::load(MemoryStore::new()).unwrap();
        manager.save("sk-or-abc", ApiKeyStatus::NotSet).unwrap();
        manager.update_status(ApiKeyStatus::Valid).unwrap();
        assert!(manager.is_valid());
        let validated_at = manager.data().last_validated;
        assert!(validated_at.is_some());

        manager.update_status(ApiKeyStatus::Invalid).unwrap();
        assert_eq!(manager.data().key, "sk-or-abc");
        assert_eq!(manager.data().last_validated, validated_at);
    }

    #[test]
    fn test_update_status_without_key_does_not_write() {
        let mut manager = CredentialManager::load(MemoryStore::new()).unwrap();
        manager.update_status(ApiKeyStatus::Invalid).unwrap();
        assert_eq!(manager.data().status, ApiKeyStatus::Invalid);
        assert!(manager.into_store().get(API_KEY_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_clear() {
        let mut manager = CredentialManager::load(MemoryStore::new()).unwrap();
        manager.save("sk-or-abc", ApiKeyStatus::Valid).unwrap();
        manager.clear().unwrap();
        assert_eq!(manager.data(), &ApiKeyData::default());
        assert!(manager.into_store().get(API_KEY_STORAGE_KEY).unwrap().is_none());
    }
}
