//! Entity-link store abstraction for Trellis.
//!
//! The store holds typed, identified entities carrying named scalar
//! properties, named links (single or multi-valued) to other entities, and
//! named blobs. The structural codec reads and writes exclusively through
//! the [`Transaction`] trait, so any backend with transactional snapshot
//! semantics can sit underneath.
//!
//! # Backends
//!
//! - [`MemoryStore`] -- versioned snapshot-clone backend for tests and
//!   embedding. Each transaction works on a full copy of the state;
//!   `flush()` commits when no other transaction has flushed since the
//!   snapshot was taken, and otherwise refreshes the snapshot and returns
//!   `false` so the caller can replay its block.
//!
//! # Design Rules
//!
//! 1. Multi-links yield their targets in the order they were added; decode
//!    order is defined by store iteration order.
//! 2. A transaction that is dropped without a successful `flush()` leaves
//!    the store untouched.
//! 3. Read-only transactions reject every mutation with
//!    [`StoreError::ReadOnly`].

pub mod error;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use traits::{EntityId, EntityStore, PropertyValue, Transaction};
