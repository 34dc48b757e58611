//! Named-store registry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::info;
use trellis_codec::PayloadStore;
use trellis_store::MemoryStore;
use trellis_types::DescriptorProvider;

use crate::client::StoreClient;

/// Lazily opens and caches one [`StoreClient`] per store name.
///
/// Every store shares the same schema; each gets its own backend and a
/// payload directory under `base/<name>/payloads`.
pub struct StoreManager {
    base: PathBuf,
    schema: Arc<dyn DescriptorProvider>,
    clients: Mutex<HashMap<String, StoreClient<MemoryStore>>>,
}

impl StoreManager {
    pub fn new(base: impl Into<PathBuf>, schema: Arc<dyn DescriptorProvider>) -> Self {
        Self {
            base: base.into(),
            schema,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The client for `name`, opening the store on first use. Repeated
    /// calls with the same name return clones sharing one backend.
    pub fn client(&self, name: &str) -> StoreClient<MemoryStore> {
        let mut clients = self.clients.lock().expect("lock poisoned");
        clients
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(name, "opening store");
                StoreClient::new(
                    MemoryStore::new(),
                    Arc::clone(&self.schema),
                    PayloadStore::new(self.base.join(name).join("payloads")),
                )
            })
            .clone()
    }

    /// Names of every store opened so far.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .clients
            .lock()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
