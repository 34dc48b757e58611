use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A dynamically-typed value in the Trellis data model.
///
/// Every user object the codec can persist is expressed as a `Value` tree.
/// The shape a value is *expected* to have is described separately by a
/// [`FieldKind`](crate::FieldKind); the codec dispatches on the descriptor,
/// not on the runtime variant, so a mismatch between the two surfaces as a
/// type error rather than silent coercion.
///
/// Strings (and enum symbols) are `Arc<str>` so the decode path can hand
/// out shared, reference-identical instances from the intern pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value for a nullable field.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    /// Raw binary payload, stored as a blob on the owning entity.
    Bytes(Vec<u8>),
    /// Symbolic enum variant; persisted as its ordinal in the descriptor's
    /// variant list.
    Enum(Arc<str>),
    /// Nested record, persisted as an owned child entity.
    Record(Record),
    /// Ordered list; element order is preserved across a round-trip.
    List(Vec<Value>),
    /// Insertion-ordered set; holds unique values by equality.
    Set(Vec<Value>),
    /// Insertion-ordered map with arbitrary key/value kinds.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Build a set value, de-duplicating by equality while preserving the
    /// order of first occurrence.
    pub fn set(values: impl IntoIterator<Item = Value>) -> Self {
        let mut unique: Vec<Value> = Vec::new();
        for v in values {
            if !unique.contains(&v) {
                unique.push(v);
            }
        }
        Self::Set(unique)
    }

    /// Build a map value from key/value pairs, keeping insertion order.
    pub fn map(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Self::Map(pairs.into_iter().collect())
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The string contents, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer contents, if this is an int value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The nested record, if this is a record value.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Short name of the runtime variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Enum(_) => "enum",
            Self::Record(_) => "record",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(Arc::from(v.as_str()))
    }
}

impl From<Arc<str>> for Value {
    fn from(v: Arc<str>) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Self::Record(v)
    }
}

/// An instance of a user type: a runtime type name plus named field values
/// in descriptor order.
///
/// Records exist only transiently in memory. One record maps to exactly one
/// root entity in the store, plus the auxiliary entities its collections and
/// nested records require.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    type_name: Arc<str>,
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Create an empty record of the given type.
    pub fn new(type_name: impl Into<Arc<str>>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Set a field, replacing any previous value under the same name.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    /// The runtime type name of this record.
    pub fn type_name(&self) -> &Arc<str> {
        &self.type_name
    }

    /// Look up a field value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterate fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Decompose into the type name and owned field pairs.
    pub fn into_parts(self) -> (Arc<str>, Vec<(String, Value)>) {
        (self.type_name, self.fields)
    }

    /// Rebuild a record from parts produced by [`into_parts`](Self::into_parts).
    pub fn from_parts(type_name: Arc<str>, fields: Vec<(String, Value)>) -> Self {
        Self { type_name, fields }
    }

    /// Number of fields set on this record.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no fields are set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
