use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;

use super::KeyValueStore;

/// In-process key-value store. Used by tests and by embedders that do not
/// want session bookkeeping on disk.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.map
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.guard()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.guard()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.guard()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("userEmail").unwrap(), None);

        store.set("userEmail", "a@b.com").unwrap();
        assert_eq!(store.get("userEmail").unwrap(), Some("a@b.com".to_string()));

        store.set("userEmail", "c@d.com").unwrap();
        assert_eq!(store.get("userEmail").unwrap(), Some("c@d.com".to_string()));

        store.remove("userEmail").unwrap();
        assert_eq!(store.get("userEmail").unwrap(), None);
    }
}
