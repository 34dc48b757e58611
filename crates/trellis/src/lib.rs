//! Trellis persists plain object graphs into a transactional entity-link
//! store without per-type storage code.
//!
//! A record's shape is described once by field descriptors; the structural
//! codec walks the descriptor and the value together, mapping scalars to
//! properties, nested records to owned child entities, collections to
//! links or holder entities, bytes to blobs, and flagged fields to
//! compressed out-of-band payload files. On top of that sit:
//!
//! - [`StoreClient`] -- blocking persistence operations per store, plus an
//!   async facade over the blocking thread pool
//! - [`Query`] -- ordered conjunctive field predicates, resolved through
//!   store indexes where possible
//! - [`StoreManager`] -- lazy registry of named stores sharing one schema
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//! use trellis::{
//!     FieldDescriptor, FieldKind, MemoryStore, PayloadStore, Record,
//!     ScalarKind, SchemaRegistry, StoreClient, TypeDescriptor,
//! };
//!
//! # fn main() -> trellis::Result<()> {
//! let schema = SchemaRegistry::new().with(TypeDescriptor::new(
//!     "Note",
//!     [
//!         FieldDescriptor::new("id", FieldKind::Scalar(ScalarKind::String)).identity(),
//!         FieldDescriptor::new("text", FieldKind::Scalar(ScalarKind::String)),
//!     ],
//! ));
//! let dir = tempfile::tempdir().unwrap();
//! let client = StoreClient::new(
//!     MemoryStore::new(),
//!     Arc::new(schema),
//!     PayloadStore::new(dir.path()),
//! );
//!
//! let note = Record::new("Note")
//!     .with_field("id", "n-1")
//!     .with_field("text", "hello");
//! client.store_blocking(&note)?;
//! let loaded = client.find_by_id_blocking("Note", &"n-1".into())?;
//! assert_eq!(loaded.as_ref(), Some(&note));
//! # Ok(())
//! # }
//! ```
//!
//! # Design Rules
//!
//! 1. `store` fully replaces: the previous record's subtree and payload
//!    files are deleted before the new graph is written.
//! 2. Transaction blocks must be replay-safe; a lost commit race refreshes
//!    the snapshot and runs the block again.
//! 3. Identity is a single flagged field per type, canonicalized to a
//!    string property that doubles as the by-id index key.

pub mod client;
pub mod error;
pub mod expr;
pub mod manager;

// Re-export primary types at crate root for ergonomic imports.
pub use client::StoreClient;
pub use error::{Error, Result};
pub use expr::{Predicate, Query};
pub use manager::StoreManager;

pub use trellis_codec::{
    delete_recursively, CodecError, CodecResult, Decoder, Encoder, PayloadStore,
};
pub use trellis_store::{
    EntityId, EntityStore, MemoryStore, PropertyValue, StoreError, StoreResult, Transaction,
};
pub use trellis_types::{
    collect_external_fields, Compression, DescriptorProvider, ExternalEncoding, FieldDescriptor,
    FieldKind, PayloadFormat, Record, ScalarKind, SchemaRegistry, TypeDescriptor, TypeError,
    TypeResult, Value,
};
