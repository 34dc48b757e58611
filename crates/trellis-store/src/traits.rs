use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Store-assigned identifier of an entity. Stable within one store, never
/// reused after delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity-{}", self.0)
    }
}

/// A scalar property value the store can hold and compare exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
}

impl PropertyValue {
    /// The string contents, if this is a string property.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer contents, if this is an int property.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(Arc::from(v))
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(Arc::from(v.as_str()))
    }
}

impl From<Arc<str>> for PropertyValue {
    fn from(v: Arc<str>) -> Self {
        Self::String(v)
    }
}

/// One transaction over the entity-link store.
///
/// All implementations must satisfy these invariants:
/// - Mutations are visible only inside this transaction until `flush()`
///   returns `true`.
/// - `flush()` returning `false` means the snapshot was superseded by a
///   concurrent commit; the snapshot has been refreshed and the caller must
///   replay its block.
/// - Dropping a transaction without a successful flush aborts it.
/// - Multi-links yield targets in the order they were added.
pub trait Transaction {
    /// Create a new entity of the given type and return its id.
    fn new_entity(&mut self, entity_type: &str) -> StoreResult<EntityId>;

    /// Delete an entity. Returns `true` if it existed. Links pointing at
    /// the deleted entity from elsewhere are not chased; recursive cleanup
    /// is the caller's concern.
    fn delete_entity(&mut self, id: EntityId) -> StoreResult<bool>;

    /// The type tag an entity was created with.
    fn entity_type(&self, id: EntityId) -> StoreResult<Arc<str>>;

    /// Set a scalar property, replacing any previous value.
    fn set_property(&mut self, id: EntityId, name: &str, value: PropertyValue) -> StoreResult<()>;

    /// Read a scalar property. `Ok(None)` if unset.
    fn property(&self, id: EntityId, name: &str) -> StoreResult<Option<PropertyValue>>;

    /// Names of every property present on an entity.
    fn property_names(&self, id: EntityId) -> StoreResult<Vec<String>>;

    /// Set a named blob, replacing any previous contents.
    fn set_blob(&mut self, id: EntityId, name: &str, data: Vec<u8>) -> StoreResult<()>;

    /// Read a named blob. `Ok(None)` if unset.
    fn blob(&self, id: EntityId, name: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Set a single-valued link, replacing any previous targets.
    fn set_link(&mut self, id: EntityId, name: &str, target: EntityId) -> StoreResult<()>;

    /// Append a target to a multi-valued link.
    fn add_link(&mut self, id: EntityId, name: &str, target: EntityId) -> StoreResult<()>;

    /// First target of a named link. `Ok(None)` if the link is absent.
    fn link(&self, id: EntityId, name: &str) -> StoreResult<Option<EntityId>>;

    /// All targets of a named link, in add order.
    fn links(&self, id: EntityId, name: &str) -> StoreResult<Vec<EntityId>>;

    /// Names of every link present on an entity.
    fn link_names(&self, id: EntityId) -> StoreResult<Vec<String>>;

    /// Remove every target of a named link.
    fn delete_links(&mut self, id: EntityId, name: &str) -> StoreResult<()>;

    /// All entities of a type, in creation order.
    fn all(&self, entity_type: &str) -> StoreResult<Vec<EntityId>>;

    /// Entities of a type whose property equals `value` exactly.
    fn find(
        &self,
        entity_type: &str,
        property: &str,
        value: &PropertyValue,
    ) -> StoreResult<Vec<EntityId>>;

    /// Entities of a type whose string property starts with `prefix`.
    fn find_starting_with(
        &self,
        entity_type: &str,
        property: &str,
        prefix: &str,
    ) -> StoreResult<Vec<EntityId>>;

    /// Attempt to commit. `Ok(true)` on success; `Ok(false)` when the
    /// snapshot was stale and has been refreshed for a replay.
    fn flush(&mut self) -> StoreResult<bool>;
}

/// A transactional entity-link store.
pub trait EntityStore: Send + Sync {
    /// Begin a read-write transaction.
    fn begin(&self) -> StoreResult<Box<dyn Transaction + '_>>;

    /// Begin a read-only transaction; mutations fail with
    /// [`StoreError::ReadOnly`](crate::StoreError::ReadOnly).
    fn begin_read_only(&self) -> StoreResult<Box<dyn Transaction + '_>>;
}
