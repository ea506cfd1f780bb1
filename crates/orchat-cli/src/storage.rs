//! File-backed key/value store
//!
//! Stores entries in ~/.config/orchat/credentials.json with restricted
//! permissions (0o600)

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use orchat_chat::{KeyValueStore, Result};

use crate::config::Config;

/// JSON object of string entries in a single file
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store next to the config file
    pub fn default_location() -> Self {
        Self::new(Config::config_dir().join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file reads as empty; a file that can't be read is an error
    fn load(&self) -> io::Result<HashMap<String, String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e),
        };

        Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed store {}: {}", self.path.display(), e);
            HashMap::new()
        }))
    }

    fn save(&self, entries: &HashMap<String, String>) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
                #[cfg(unix)]
                fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
            }
        }

        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content)?;

        // Owner read/write only
        #[cfg(unix)]
        fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    fn storage_error(&self, e: io::Error) -> orchat_chat::Error {
        orchat_chat::Error::Storage(format!("{}: {}", self.path.display(), e))
    }

    fn update(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> Result<()> {
        let mut entries = self.load().map_err(|e| self.storage_error(e))?;
        f(&mut entries);
        self.save(&entries).map_err(|e| self.storage_error(e))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.load().map_err(|e| self.storage_error(e))?;
        Ok(entries.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchat_chat::{ApiKeyStatus, CredentialManager};

    fn temp_store() -> FileStore {
        let dir = std::env::temp_dir().join(format!("orchat-test-{}", uuid::Uuid::new_v4()));
        FileStore::new(dir.join("credentials.json"))
    }

    #[test]
    fn test_set_get_remove() {
        let store = temp_store();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));

        let _ = fs::remove_dir_all(store.path().parent().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions() {
        let store = temp_store();
        store.set("k", "v").unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let _ = fs::remove_dir_all(store.path().parent().unwrap());
    }

    #[test]
    fn test_credentials_survive_reload() {
        let store = temp_store();
        let path = store.path().to_path_buf();

        let mut manager = CredentialManager::load(store).unwrap();
        manager.save("sk-or-abc", ApiKeyStatus::Valid).unwrap();

        let reloaded = CredentialManager::load(FileStore::new(&path)).unwrap();
        assert_eq!(reloaded.valid_key(), Some("sk-or-abc"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let store = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not json").unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        let _ = fs::remove_dir_all(store.path().parent().unwrap());
    }

    #[test]
    fn test_unreadable_file_is_not_overwritten() {
        let store = temp_store();
        // A directory at the store path can't be read as a file
        fs::create_dir_all(store.path().join("keep")).unwrap();

        assert!(store.get("k").is_err());
        assert!(matches!(
            store.set("k", "v"),
            Err(orchat_chat::Error::Storage(_))
        ));
        assert!(store.remove("k").is_err());
        assert!(store.path().join("keep").is_dir());

        let _ = fs::remove_dir_all(store.path().parent().unwrap());
    }
}
