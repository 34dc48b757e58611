use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::traits::{EntityId, EntityStore, PropertyValue, Transaction};

#[derive(Clone, Debug)]
struct EntityData {
    entity_type: Arc<str>,
    properties: BTreeMap<String, PropertyValue>,
    links: BTreeMap<String, Vec<EntityId>>,
    blobs: BTreeMap<String, Vec<u8>>,
}

impl EntityData {
    fn new(entity_type: &str) -> Self {
        Self {
            entity_type: Arc::from(entity_type),
            properties: BTreeMap::new(),
            links: BTreeMap::new(),
            blobs: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct StoreState {
    // BTreeMap keyed by id keeps `all()` in creation order.
    entities: BTreeMap<EntityId, EntityData>,
    next_id: u64,
}

#[derive(Debug, Default)]
struct Versioned {
    state: StoreState,
    version: u64,
}

/// In-memory entity-link store.
///
/// Intended for tests and embedding. Each transaction clones the full state
/// as its snapshot; `flush()` commits only when no other transaction has
/// flushed since the snapshot was taken, otherwise it refreshes the
/// snapshot and reports `false` so the caller replays its block. This
/// mirrors the flush contract of snapshot-isolated entity stores.
pub struct MemoryStore {
    inner: RwLock<Versioned>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Versioned::default()),
        }
    }

    /// Number of entities currently committed.
    pub fn entity_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").state.entities.len()
    }

    /// Number of committed entities of one type.
    pub fn count_of_type(&self, entity_type: &str) -> usize {
        self.inner
            .read()
            .expect("lock poisoned")
            .state
            .entities
            .values()
            .filter(|e| &*e.entity_type == entity_type)
            .count()
    }

    /// Returns `true` if no entities are committed.
    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0
    }

    fn begin_with(&self, read_only: bool) -> StoreResult<Box<dyn Transaction + '_>> {
        let guard = self.inner.read().expect("lock poisoned");
        Ok(Box::new(MemoryTransaction {
            store: self,
            state: guard.state.clone(),
            base_version: guard.version,
            read_only,
        }))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore for MemoryStore {
    fn begin(&self) -> StoreResult<Box<dyn Transaction + '_>> {
        self.begin_with(false)
    }

    fn begin_read_only(&self) -> StoreResult<Box<dyn Transaction + '_>> {
        self.begin_with(true)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entity_count", &self.entity_count())
            .finish()
    }
}

/// Snapshot transaction over a [`MemoryStore`]. Dropping it without a
/// successful flush discards every mutation.
struct MemoryTransaction<'s> {
    store: &'s MemoryStore,
    state: StoreState,
    base_version: u64,
    read_only: bool,
}

impl MemoryTransaction<'_> {
    fn entity(&self, id: EntityId) -> StoreResult<&EntityData> {
        self.state
            .entities
            .get(&id)
            .ok_or(StoreError::UnknownEntity(id))
    }

    fn entity_mut(&mut self, id: EntityId) -> StoreResult<&mut EntityData> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.state
            .entities
            .get_mut(&id)
            .ok_or(StoreError::UnknownEntity(id))
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn new_entity(&mut self, entity_type: &str) -> StoreResult<EntityId> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let id = EntityId(self.state.next_id);
        self.state.next_id += 1;
        self.state.entities.insert(id, EntityData::new(entity_type));
        Ok(id)
    }

    fn delete_entity(&mut self, id: EntityId) -> StoreResult<bool> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(self.state.entities.remove(&id).is_some())
    }

    fn entity_type(&self, id: EntityId) -> StoreResult<Arc<str>> {
        Ok(Arc::clone(&self.entity(id)?.entity_type))
    }

    fn set_property(&mut self, id: EntityId, name: &str, value: PropertyValue) -> StoreResult<()> {
        self.entity_mut(id)?.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn property(&self, id: EntityId, name: &str) -> StoreResult<Option<PropertyValue>> {
        Ok(self.entity(id)?.properties.get(name).cloned())
    }

    fn property_names(&self, id: EntityId) -> StoreResult<Vec<String>> {
        Ok(self.entity(id)?.properties.keys().cloned().collect())
    }

    fn set_blob(&mut self, id: EntityId, name: &str, data: Vec<u8>) -> StoreResult<()> {
        self.entity_mut(id)?.blobs.insert(name.to_string(), data);
        Ok(())
    }

    fn blob(&self, id: EntityId, name: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entity(id)?.blobs.get(name).cloned())
    }

    fn set_link(&mut self, id: EntityId, name: &str, target: EntityId) -> StoreResult<()> {
        self.entity_mut(id)?.links.insert(name.to_string(), vec![target]);
        Ok(())
    }

    fn add_link(&mut self, id: EntityId, name: &str, target: EntityId) -> StoreResult<()> {
        self.entity_mut(id)?
            .links
            .entry(name.to_string())
            .or_default()
            .push(target);
        Ok(())
    }

    fn link(&self, id: EntityId, name: &str) -> StoreResult<Option<EntityId>> {
        Ok(self
            .entity(id)?
            .links
            .get(name)
            .and_then(|targets| targets.first().copied()))
    }

    fn links(&self, id: EntityId, name: &str) -> StoreResult<Vec<EntityId>> {
        Ok(self.entity(id)?.links.get(name).cloned().unwrap_or_default())
    }

    fn link_names(&self, id: EntityId) -> StoreResult<Vec<String>> {
        Ok(self.entity(id)?.links.keys().cloned().collect())
    }

    fn delete_links(&mut self, id: EntityId, name: &str) -> StoreResult<()> {
        self.entity_mut(id)?.links.remove(name);
        Ok(())
    }

    fn all(&self, entity_type: &str) -> StoreResult<Vec<EntityId>> {
        Ok(self
            .state
            .entities
            .iter()
            .filter(|(_, e)| &*e.entity_type == entity_type)
            .map(|(id, _)| *id)
            .collect())
    }

    fn find(
        &self,
        entity_type: &str,
        property: &str,
        value: &PropertyValue,
    ) -> StoreResult<Vec<EntityId>> {
        Ok(self
            .state
            .entities
            .iter()
            .filter(|(_, e)| {
                &*e.entity_type == entity_type && e.properties.get(property) == Some(value)
            })
            .map(|(id, _)| *id)
            .collect())
    }

    fn find_starting_with(
        &self,
        entity_type: &str,
        property: &str,
        prefix: &str,
    ) -> StoreResult<Vec<EntityId>> {
        Ok(self
            .state
            .entities
            .iter()
            .filter(|(_, e)| {
                &*e.entity_type == entity_type
                    && e.properties
                        .get(property)
                        .and_then(PropertyValue::as_str)
                        .is_some_and(|s| s.starts_with(prefix))
            })
            .map(|(id, _)| *id)
            .collect())
    }

    fn flush(&mut self) -> StoreResult<bool> {
        if self.read_only {
            return Ok(true);
        }
        let mut guard = self.store.inner.write().expect("lock poisoned");
        if guard.version == self.base_version {
            guard.state = self.state.clone();
            guard.version += 1;
            tracing::trace!(version = guard.version, "committed transaction");
            Ok(true)
        } else {
            // Superseded by a concurrent commit: refresh and let the caller
            // replay its block against the new snapshot.
            self.state = guard.state.clone();
            self.base_version = guard.version;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Core entity CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn create_and_read_entity() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        let id = txn.new_entity("Sample").unwrap();
        txn.set_property(id, "name", PropertyValue::from("a")).unwrap();
        assert_eq!(&*txn.entity_type(id).unwrap(), "Sample");
        assert_eq!(
            txn.property(id, "name").unwrap(),
            Some(PropertyValue::from("a"))
        );
        assert_eq!(txn.property_names(id).unwrap(), ["name"]);
        assert!(txn.flush().unwrap());
        assert_eq!(store.entity_count(), 1);
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let store = MemoryStore::new();
        let txn = store.begin().unwrap();
        let err = txn.property(EntityId(99), "x").unwrap_err();
        assert!(matches!(err, StoreError::UnknownEntity(_)));
    }

    #[test]
    fn delete_entity_reports_existence() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        let id = txn.new_entity("Sample").unwrap();
        assert!(txn.delete_entity(id).unwrap());
        assert!(!txn.delete_entity(id).unwrap());
    }

    #[test]
    fn blob_roundtrip() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        let id = txn.new_entity("Sample").unwrap();
        txn.set_blob(id, "data", vec![1, 2, 3]).unwrap();
        assert_eq!(txn.blob(id, "data").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(txn.blob(id, "missing").unwrap(), None);
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    #[test]
    fn multi_links_keep_add_order() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        let parent = txn.new_entity("Parent").unwrap();
        let a = txn.new_entity("Child").unwrap();
        let b = txn.new_entity("Child").unwrap();
        let c = txn.new_entity("Child").unwrap();
        txn.add_link(parent, "items", b).unwrap();
        txn.add_link(parent, "items", a).unwrap();
        txn.add_link(parent, "items", c).unwrap();
        assert_eq!(txn.links(parent, "items").unwrap(), vec![b, a, c]);
        assert_eq!(txn.link(parent, "items").unwrap(), Some(b));
    }

    #[test]
    fn set_link_replaces_targets() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        let parent = txn.new_entity("Parent").unwrap();
        let a = txn.new_entity("Child").unwrap();
        let b = txn.new_entity("Child").unwrap();
        txn.set_link(parent, "inner", a).unwrap();
        txn.set_link(parent, "inner", b).unwrap();
        assert_eq!(txn.links(parent, "inner").unwrap(), vec![b]);
    }

    #[test]
    fn link_names_and_delete_links() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        let parent = txn.new_entity("Parent").unwrap();
        let child = txn.new_entity("Child").unwrap();
        txn.set_link(parent, "inner", child).unwrap();
        txn.add_link(parent, "items", child).unwrap();
        let mut names = txn.link_names(parent).unwrap();
        names.sort();
        assert_eq!(names, ["inner", "items"]);
        txn.delete_links(parent, "items").unwrap();
        assert!(txn.links(parent, "items").unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    #[test]
    fn find_exact_match() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        let a = txn.new_entity("Sample").unwrap();
        let b = txn.new_entity("Sample").unwrap();
        let other = txn.new_entity("Other").unwrap();
        txn.set_property(a, "n", PropertyValue::Int(1)).unwrap();
        txn.set_property(b, "n", PropertyValue::Int(2)).unwrap();
        txn.set_property(other, "n", PropertyValue::Int(1)).unwrap();
        assert_eq!(
            txn.find("Sample", "n", &PropertyValue::Int(1)).unwrap(),
            vec![a]
        );
        assert!(txn
            .find("Sample", "n", &PropertyValue::Int(9))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn find_starting_with_matches_string_prefix() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        let a = txn.new_entity("Sample").unwrap();
        let b = txn.new_entity("Sample").unwrap();
        txn.set_property(a, "id", PropertyValue::from("abc")).unwrap();
        txn.set_property(b, "id", PropertyValue::from("xyz")).unwrap();
        assert_eq!(
            txn.find_starting_with("Sample", "id", "ab").unwrap(),
            vec![a]
        );
    }

    #[test]
    fn all_returns_entities_in_creation_order() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        let first = txn.new_entity("Sample").unwrap();
        let _other = txn.new_entity("Other").unwrap();
        let second = txn.new_entity("Sample").unwrap();
        assert_eq!(txn.all("Sample").unwrap(), vec![first, second]);
    }

    // -----------------------------------------------------------------------
    // Transaction semantics
    // -----------------------------------------------------------------------

    #[test]
    fn drop_without_flush_discards_mutations() {
        let store = MemoryStore::new();
        {
            let mut txn = store.begin().unwrap();
            txn.new_entity("Sample").unwrap();
            // dropped without flush
        }
        assert!(store.is_empty());
    }

    #[test]
    fn stale_flush_refreshes_and_reports_false() {
        let store = MemoryStore::new();
        let mut first = store.begin().unwrap();
        first.new_entity("A").unwrap();

        let mut second = store.begin().unwrap();
        second.new_entity("B").unwrap();
        assert!(second.flush().unwrap());

        // First snapshot is now stale: flush refreshes it for a replay.
        assert!(!first.flush().unwrap());
        first.new_entity("A").unwrap();
        assert!(first.flush().unwrap());

        assert_eq!(store.count_of_type("A"), 1);
        assert_eq!(store.count_of_type("B"), 1);
    }

    #[test]
    fn read_only_transaction_rejects_mutation() {
        let store = MemoryStore::new();
        let mut txn = store.begin_read_only().unwrap();
        assert!(matches!(
            txn.new_entity("Sample").unwrap_err(),
            StoreError::ReadOnly
        ));
        // flush on a read-only transaction is a no-op success
        assert!(txn.flush().unwrap());
    }

    #[test]
    fn read_only_sees_committed_state() {
        let store = MemoryStore::new();
        let mut w = store.begin().unwrap();
        let id = w.new_entity("Sample").unwrap();
        w.set_property(id, "n", PropertyValue::Int(7)).unwrap();
        assert!(w.flush().unwrap());

        let r = store.begin_read_only().unwrap();
        assert_eq!(
            r.property(id, "n").unwrap(),
            Some(PropertyValue::Int(7))
        );
    }

    // -----------------------------------------------------------------------
    // Concurrent access
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_writers_all_land() {
        use std::thread;

        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let mut txn = store.begin().unwrap();
                    loop {
                        txn.new_entity("Sample").unwrap();
                        if txn.flush().unwrap() {
                            break;
                        }
                        // replay: the refreshed snapshot dropped our entity
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(store.count_of_type("Sample"), 4);
    }
}
