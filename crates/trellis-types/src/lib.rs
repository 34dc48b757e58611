//! Foundation types for Trellis.
//!
//! Trellis persists plain object graphs into a transactional entity-link
//! store without per-type storage code. This crate holds the pieces every
//! other layer builds on:
//!
//! - [`Value`] / [`Record`] -- the dynamic representation of user data
//! - [`FieldDescriptor`] / [`FieldKind`] -- ordered, tagged field metadata
//! - [`DescriptorProvider`] / [`SchemaRegistry`] -- type-indexed descriptor
//!   lookup, injected into the codec so it stays free of any specific
//!   introspection or code-generation mechanism
//!
//! # Design Rules
//!
//! 1. Descriptors are immutable once registered; field order is stable and
//!    defines encode/decode order.
//! 2. The codec dispatches once per field on [`FieldKind`], never on the
//!    runtime shape of a value.
//! 3. Strings are shared (`Arc<str>`) so decoded values can be interned.

pub mod descriptor;
pub mod error;
pub mod value;

// Re-export primary types at crate root for ergonomic imports.
pub use descriptor::{
    Compression, DescriptorProvider, ExternalEncoding, FieldDescriptor, FieldKind, PayloadFormat,
    ScalarKind, SchemaRegistry, TypeDescriptor, collect_external_fields,
};
pub use error::{TypeError, TypeResult};
pub use value::{Record, Value};
