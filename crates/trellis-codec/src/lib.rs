//! Structural codec for Trellis.
//!
//! Converts descriptor-described [`Record`](trellis_types::Record) graphs
//! into entity-link store primitives and back:
//!
//! - [`Encoder`] -- recursive walk from a record + its field descriptors to
//!   entity properties, links, holder entities, and blobs
//! - [`Decoder`] -- the mirror walk, dispatching on descriptor kind (the
//!   stored entity carries no shape information beyond its type tag)
//! - [`identity`] -- canonical string form for identity-flagged values
//! - [`payload`] -- the out-of-band escape path: binary codec + optional
//!   compression + external file, with string interning on reload
//! - [`intern`] -- process-wide best-effort string pool
//! - [`delete_recursively`] -- depth-first teardown of an owned entity tree,
//!   including payload file cleanup
//!
//! # Design Rules
//!
//! 1. One dispatch per field on the tagged descriptor kind; the runtime
//!    value is never probed to rediscover its shape.
//! 2. Nullable absence encodes as nothing and decodes as `Value::Null`; a
//!    missing required property or link is fatal corruption.
//! 3. The walk is synchronous and single-threaded per call; all side
//!    effects go through the active transaction and, for flagged fields,
//!    the payload directory.

pub mod decode;
pub mod delete;
pub mod encode;
pub mod error;
pub mod identity;
pub mod intern;
pub mod payload;

// Re-export primary types at crate root for ergonomic imports.
pub use decode::Decoder;
pub use delete::delete_recursively;
pub use encode::Encoder;
pub use error::{CodecError, CodecResult};
pub use identity::{decode_identity, encode_identity};
pub use intern::intern;
pub use payload::PayloadStore;

/// Property name holding the element count on collection/map holder
/// entities.
pub const SIZE_PROPERTY: &str = "size";
