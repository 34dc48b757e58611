use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// The scalar property kinds the entity store can hold directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    String,
}

/// Binary codec used for out-of-band payload fields.
///
/// The codec owns its own internal framing; Trellis treats the bytes as
/// opaque and only stores the file path they were written to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadFormat {
    Bincode,
}

/// Compression applied to an out-of-band payload stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    None,
    Zstd,
}

/// Settings for a field persisted via the out-of-band payload path instead
/// of the entity-link graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEncoding {
    pub format: PayloadFormat,
    pub compression: Compression,
}

impl ExternalEncoding {
    pub fn bincode(compression: Compression) -> Self {
        Self {
            format: PayloadFormat::Bincode,
            compression,
        }
    }
}

/// Tagged description of what a field holds.
///
/// The codec switches once per field on this variant; it never rediscovers
/// the kind by probing the runtime value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    Scalar(ScalarKind),
    /// Enum with its ordered variant list; values are persisted as the
    /// variant's ordinal.
    Enum { variants: Vec<String> },
    /// Raw bytes, persisted as an entity blob.
    Bytes,
    /// Nested record of the named type, persisted as an owned child entity.
    Record(String),
    /// Ordered list of elements.
    List(Box<FieldKind>),
    /// Insertion-ordered set of unique elements.
    Set(Box<FieldKind>),
    /// Map with arbitrary key and value kinds.
    Map {
        key: Box<FieldKind>,
        value: Box<FieldKind>,
    },
}

impl FieldKind {
    /// Enum variant helper taking string-ish variants.
    pub fn enumeration(variants: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Enum {
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    /// Ordinal of a symbolic variant in this enum's variant list.
    pub fn enum_ordinal(&self, symbol: &str) -> TypeResult<i64> {
        match self {
            Self::Enum { variants } => variants
                .iter()
                .position(|v| v == symbol)
                .map(|p| p as i64)
                .ok_or_else(|| TypeError::UnknownVariant {
                    symbol: symbol.to_string(),
                }),
            other => Err(TypeError::NotAnEnum {
                kind: other.name().to_string(),
            }),
        }
    }

    /// Symbolic variant for an ordinal in this enum's variant list.
    pub fn enum_symbol(&self, ordinal: i64) -> TypeResult<&str> {
        match self {
            Self::Enum { variants } => usize::try_from(ordinal)
                .ok()
                .and_then(|i| variants.get(i))
                .map(String::as_str)
                .ok_or(TypeError::OrdinalOutOfRange {
                    ordinal,
                    count: variants.len(),
                }),
            other => Err(TypeError::NotAnEnum {
                kind: other.name().to_string(),
            }),
        }
    }

    /// Short name of this kind, for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scalar(ScalarKind::Bool) => "bool",
            Self::Scalar(ScalarKind::Int) => "int",
            Self::Scalar(ScalarKind::Float) => "float",
            Self::Scalar(ScalarKind::String) => "string",
            Self::Enum { .. } => "enum",
            Self::Bytes => "bytes",
            Self::Record(_) => "record",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map { .. } => "map",
        }
    }
}

/// Metadata for one field of a type: name, kind, nullability, identity
/// flag, and the optional out-of-band encoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub nullable: bool,
    pub identity: bool,
    pub external: Option<ExternalEncoding>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            identity: false,
            external: None,
        }
    }

    /// Mark this field nullable; absence is encoded as nothing and decoded
    /// back as [`Value::Null`](crate::Value::Null).
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark this field as the type's identity; its canonicalized string is
    /// the exact-match lookup key for by-id operations.
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Route this field through the out-of-band payload store.
    pub fn external(mut self, encoding: ExternalEncoding) -> Self {
        self.external = Some(encoding);
        self
    }
}

/// Ordered field metadata for one type. Immutable once registered; the
/// field sequence is stable and defines encode/decode order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub type_name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn new(
        type_name: impl Into<String>,
        fields: impl IntoIterator<Item = FieldDescriptor>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            fields: fields.into_iter().collect(),
        }
    }

    /// The identity-flagged field, if the type declares one.
    pub fn identity_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.identity)
    }

    /// Look up a field descriptor by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Type-indexed source of field descriptors.
///
/// Implementations resolve descriptors recursively: every nested record
/// type reachable from a registered type must itself resolve.
pub trait DescriptorProvider: Send + Sync {
    fn descriptor(&self, type_name: &str) -> Option<&TypeDescriptor>;

    /// Resolve a descriptor or fail with a schema error.
    fn require(&self, type_name: &str) -> TypeResult<&TypeDescriptor> {
        self.descriptor(type_name)
            .ok_or_else(|| TypeError::UnknownType(type_name.to_string()))
    }
}

/// Map-backed [`DescriptorProvider`] for embedders and tests.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, replacing any previous descriptor of the same name.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.types
            .insert(descriptor.type_name.clone(), descriptor);
        self
    }

    /// Builder-style registration.
    pub fn with(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl DescriptorProvider for SchemaRegistry {
    fn descriptor(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }
}

/// Collect the names of every external-encoded field reachable from
/// `type_name`, including fields of nested record types.
///
/// Recursive delete matches these names against every entity in a deleted
/// subtree, so names are collected flat. A visited set guards against
/// recursive type definitions.
pub fn collect_external_fields(provider: &dyn DescriptorProvider, type_name: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    collect_into(provider, type_name, &mut visited, &mut out);
    out
}

fn collect_into(
    provider: &dyn DescriptorProvider,
    type_name: &str,
    visited: &mut HashSet<String>,
    out: &mut Vec<String>,
) {
    if !visited.insert(type_name.to_string()) {
        return;
    }
    let Some(desc) = provider.descriptor(type_name) else {
        return;
    };
    for field in &desc.fields {
        if field.external.is_some() && !out.contains(&field.name) {
            out.push(field.name.clone());
        }
        collect_kind(provider, &field.kind, visited, out);
    }
}

fn collect_kind(
    provider: &dyn DescriptorProvider,
    kind: &FieldKind,
    visited: &mut HashSet<String>,
    out: &mut Vec<String>,
) {
    match kind {
        FieldKind::Record(tn) => collect_into(provider, tn, visited, out),
        FieldKind::List(elem) | FieldKind::Set(elem) => collect_kind(provider, elem, visited, out),
        FieldKind::Map { key, value } => {
            collect_kind(provider, key, visited, out);
            collect_kind(provider, value, visited, out);
        }
        _ => {}
    }
}
