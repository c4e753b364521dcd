use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};

use super::KeyValueStore;

/// Store file name in the storage directory
const STORE_FILE: &str = "session_store.json";

/// JSON-file-backed key-value store.
///
/// Every operation reads the full map, applies the change, and writes the
/// file back, matching the granularity of the browser storage it replaces.
/// The mutex keeps read-modify-write sequences from interleaving when the
/// store is shared across tasks.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Create a store rooted at the given directory, creating it if needed.
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
        Ok(Self {
            path: dir.join(STORE_FILE),
            lock: Mutex::new(()),
        })
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read session store file")?;
        serde_json::from_str(&contents).context("Failed to parse session store file")
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let contents = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, contents).context("Failed to write session store file")?;
        Ok(())
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Session store lock poisoned"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.guard()?;
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.guard()?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.guard()?;
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("plateful-store-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_set_get_remove_roundtrip() {
        let dir = temp_dir("roundtrip");
        let store = FileStore::new(dir.clone()).unwrap();

        assert_eq!(store.get("rememberMe").unwrap(), None);
        store.set("rememberMe", "true").unwrap();
        assert_eq!(store.get("rememberMe").unwrap(), Some("true".to_string()));

        store.remove("rememberMe").unwrap();
        assert_eq!(store.get("rememberMe").unwrap(), None);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = temp_dir("reopen");
        {
            let store = FileStore::new(dir.clone()).unwrap();
            store.set("lastActivity", "1700000000000").unwrap();
        }
        let store = FileStore::new(dir.clone()).unwrap();
        assert_eq!(
            store.get("lastActivity").unwrap(),
            Some("1700000000000".to_string())
        );

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_remove_missing_key_is_noop() {
        let dir = temp_dir("missing");
        let store = FileStore::new(dir.clone()).unwrap();
        store.remove("no-such-key").unwrap();

        let _ = std::fs::remove_dir_all(dir);
    }
}
