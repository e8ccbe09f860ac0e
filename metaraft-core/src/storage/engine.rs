use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::storage::command::Command;

/// The replicated key-value map. Cloning yields another handle onto the
/// same map, so readers never contend on the consensus lock.
///
/// Only the consensus engine applies commands; everyone else reads.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, command: &Command) {
        match command {
            Command::Put { key, value } => {
                self.data.write().insert(key.clone(), value.clone());
            }
            Command::Delete { key } => {
                self.data.write().remove(key);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.data.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Sorted copy of the whole map.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
