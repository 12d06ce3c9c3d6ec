//! Local overrides set by the host, consulted before the snapshot.
//!
//! Overridden results carry the rule ID `"override"` and the `LocalOverride`
//! evaluation reason, and log no layer parameter exposures.
use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::{Map, Value};

#[derive(Default)]
pub(crate) struct OverrideStore {
    gates: RwLock<HashMap<String, bool>>,
    configs: RwLock<HashMap<String, Map<String, Value>>>,
    layers: RwLock<HashMap<String, Map<String, Value>>>,
}

impl OverrideStore {
    pub fn new() -> OverrideStore {
        OverrideStore::default()
    }

    pub fn gate(&self, name: &str) -> Option<bool> {
        self.gates.read().unwrap().get(name).copied()
    }

    pub fn config(&self, name: &str) -> Option<Map<String, Value>> {
        self.configs.read().unwrap().get(name).cloned()
    }

    pub fn layer(&self, name: &str) -> Option<Map<String, Value>> {
        self.layers.read().unwrap().get(name).cloned()
    }

    pub fn set_gate(&self, name: &str, value: bool) {
        self.gates.write().unwrap().insert(name.to_owned(), value);
    }

    pub fn set_config(&self, name: &str, value: Map<String, Value>) {
        self.configs.write().unwrap().insert(name.to_owned(), value);
    }

    pub fn set_layer(&self, name: &str, value: Map<String, Value>) {
        self.layers.write().unwrap().insert(name.to_owned(), value);
    }

    /// Remove any override stored under `name`, in all three categories.
    pub fn remove(&self, name: &str) {
        self.gates.write().unwrap().remove(name);
        self.configs.write().unwrap().remove(name);
        self.layers.write().unwrap().remove(name);
    }

    pub fn remove_all(&self) {
        self.gates.write().unwrap().clear();
        self.configs.write().unwrap().clear();
        self.layers.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::OverrideStore;

    #[test]
    fn remove_clears_all_categories() {
        let store = OverrideStore::new();
        store.set_gate("name", true);
        store.set_config("name", Default::default());
        store.set_layer("name", Default::default());

        store.remove("name");

        assert!(store.gate("name").is_none());
        assert!(store.config("name").is_none());
        assert!(store.layer("name").is_none());
    }
}
